/*
 * Copyright 2021 Luca Fulchir <luker@fenrirproject.org>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use ::parking_lot::{Mutex, MutexGuard};

/// Lock around a cache or a controller.
///
/// Neither does any locking on its own: if you share one between threads,
/// take the guard and hold it for the whole logical operation (a search and
/// the update of the returned record, a `packet_in`, an iteration...).
/// The lock is released when the guard is dropped.
#[derive(Debug, Default)]
pub struct Shared<T> {
    inner: Mutex<T>,
}

impl<T> Shared<T> {
    pub fn new(inner: T) -> Shared<T> {
        Shared {
            inner: Mutex::new(inner),
        }
    }
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock()
    }
    /// No locking needed: we are the only owner
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tscache::Cache;
    use ::std::sync::Arc;

    #[test]
    fn guard_releases_on_drop() {
        let shared = Shared::new(0u32);
        {
            let mut g = shared.lock();
            *g += 1;
            assert!(shared.try_lock().is_none());
        }
        assert_eq!(*shared.try_lock().unwrap(), 1);
    }

    #[test]
    fn owner_gets_the_value_back() {
        let mut shared = Shared::new(Cache::<u32>::for_payload(2, 4, 4).unwrap());
        {
            let c = shared.get_mut();
            let mut e = c.search(b"abcd", 1).unwrap().unwrap();
            e.occupy(b"abcd");
            *e.payload_mut() = 9;
        }
        shared.lock().search(b"efgh", 2).unwrap().unwrap().occupy(b"efgh");
        let mut c = shared.into_inner();
        assert_eq!(c.len(), 2);
        let e = c.search(b"abcd", 3).unwrap().unwrap();
        assert_eq!(*e.payload(), 9);
    }

    #[test]
    fn threads_share_one_cache() {
        let cache = Cache::<u64>::for_payload(4, 8, 64).unwrap();
        let shared = Arc::new(Shared::new(cache));
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let shared = Arc::clone(&shared);
                ::std::thread::spawn(move || {
                    for i in 0..16u64 {
                        let key = (t * 16 + i).to_le_bytes();
                        let mut c = shared.lock();
                        let mut e = c.search(&key, 1 + i).unwrap().unwrap();
                        if !e.is_valid() {
                            e.occupy(&key);
                            *e.payload_mut() = t;
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let c = shared.lock();
        assert!(c.len() <= 64);
        assert!(c.iter().all(|e| {
            let k = u64::from_le_bytes([
                e.key()[0], e.key()[1], e.key()[2], e.key()[3],
                e.key()[4], e.key()[5], e.key()[6], e.key()[7],
            ]);
            k / 16 == *e.payload()
        }));
    }
}
