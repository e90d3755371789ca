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

use crate::results::Outcome;
use ::bitfield::bitfield;

// Full 32 bit eviction counter, the validity of the record goes in the
// bit right above it
bitfield! {
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    struct Flags(u64);
    impl Debug;
    u32;
    valid, set_valid: 32;
    evictions, set_evictions: 31, 0;
}

/// Bookkeeping shared by all records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    flags: Flags,
    last_access: u64,
}

impl Header {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.flags.valid()
    }
    /// How many times this record was flushed to make room for another key.
    /// Wraps at 2^32
    #[inline]
    pub fn evictions(&self) -> u32 {
        self.flags.evictions()
    }
    #[inline]
    pub fn last_access(&self) -> u64 {
        self.last_access
    }
    #[inline]
    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.flags.set_valid(valid);
    }
    #[inline]
    pub(crate) fn touch(&mut self, now: u64) {
        self.last_access = now;
    }
    pub(crate) fn evict(&mut self, now: u64) {
        let evictions = self.flags.evictions().wrapping_add(1);
        self.flags.set_evictions(evictions);
        self.flags.set_valid(false);
        self.last_access = now;
    }
}

#[derive(Default)]
pub(crate) struct Record<P> {
    pub(crate) header: Header,
    pub(crate) payload: P,
}

/// Read-only view of a cache record
#[derive(Debug)]
pub struct Entry<'a, P> {
    pub(crate) slot: usize,
    pub(crate) header: &'a Header,
    pub(crate) key: &'a [u8],
    pub(crate) payload: &'a P,
}

impl<'a, P> Entry<'a, P> {
    /// Position of the record in the table. Stable for the cache lifetime
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }
    #[inline]
    pub fn header(&self) -> &'a Header {
        self.header
    }
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.header.is_valid()
    }
    #[inline]
    pub fn key(&self) -> &'a [u8] {
        self.key
    }
    #[inline]
    pub fn payload(&self) -> &'a P {
        self.payload
    }
}

/// Record returned by a search.
///
/// On a miss the record is not valid: the caller is expected to copy the
/// key, fill the payload and call `set_valid(true)`. Dropping the entry
/// without doing so leaves the slot free.
#[derive(Debug)]
pub struct EntryMut<'a, P> {
    pub(crate) slot: usize,
    pub(crate) outcome: Outcome,
    pub(crate) header: &'a mut Header,
    pub(crate) key: &'a mut [u8],
    pub(crate) payload: &'a mut P,
}

impl<'a, P> EntryMut<'a, P> {
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }
    #[inline]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }
    #[inline]
    pub fn header(&self) -> &Header {
        &*self.header
    }
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.header.is_valid()
    }
    #[inline]
    pub fn set_valid(&mut self, valid: bool) {
        self.header.set_valid(valid)
    }
    #[inline]
    pub fn last_access(&self) -> u64 {
        self.header.last_access()
    }
    #[inline]
    pub fn evictions(&self) -> u32 {
        self.header.evictions()
    }
    #[inline]
    pub fn key(&self) -> &[u8] {
        &*self.key
    }
    #[inline]
    pub fn key_mut(&mut self) -> &mut [u8] {
        &mut *self.key
    }
    #[inline]
    pub fn payload(&self) -> &P {
        &*self.payload
    }
    #[inline]
    pub fn payload_mut(&mut self) -> &mut P {
        &mut *self.payload
    }
    /// copy the key and mark the record valid
    pub fn occupy(&mut self, key: &[u8]) {
        self.key.copy_from_slice(key);
        self.header.set_valid(true);
    }
}
