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

use ::flowgate::tscache::Cache;
use ::flowgate::Outcome;
use ::rand::{Rng, SeedableRng};
use ::std::collections::HashMap;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Index(u64);

/// first `count` 4-byte keys that land in `block`
fn keys_in_block(c: &Cache<Index>, block: u32, count: usize) -> Vec<[u8; 4]> {
    (0u32..)
        .map(|i| i.to_le_bytes())
        .filter(|k| c.block_of(&k[..]) == block)
        .take(count)
        .collect()
}

fn insert(c: &mut Cache<Index>, key: &[u8], now: u64) -> usize {
    let mut e = c.search(key, now).unwrap().unwrap();
    assert!(!e.is_valid());
    e.occupy(key);
    e.slot()
}

fn snapshot(c: &Cache<Index>) -> Vec<(bool, u64, u32)> {
    (0..c.geometry().block_count())
        .flat_map(|b| {
            c.block(b)
                .unwrap()
                .map(|e| {
                    (
                        e.is_valid(),
                        e.header().last_access(),
                        e.header().evictions(),
                    )
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn two_way_scenario() {
    let mut c = Cache::<Index>::new(2, 4, 16, 8).unwrap();
    assert_eq!(c.geometry().block_count(), 4);

    let block = c.block_of(b"AAAA");
    let other = (0u32..)
        .map(|i| [b'B', b'B', (i >> 8) as u8, i as u8])
        .find(|k| c.block_of(&k[..]) == block && k != b"AAAA")
        .unwrap();
    let third = (0u32..)
        .map(|i| [b'C', b'C', (i >> 8) as u8, i as u8])
        .find(|k| c.block_of(&k[..]) == block)
        .unwrap();

    let a = insert(&mut c, b"AAAA", 5);
    let b = insert(&mut c, &other, 6);
    assert_ne!(a, b);
    assert_eq!(c.search(&other, 7).unwrap().unwrap().slot(), b);
    assert_eq!(c.search(b"AAAA", 8).unwrap().unwrap().slot(), a);

    // AAAA was touched last, so the other key is the oldest
    let e = c.search(&third, 9).unwrap().unwrap();
    assert_eq!(e.outcome(), Outcome::Evicted);
    assert_eq!(e.slot(), b);
}

#[test]
fn eviction_at_time_one() {
    let mut c = Cache::<Index>::new(2, 4, 16, 8).unwrap();
    let keys = keys_in_block(&c, 1, 3);
    let first = insert(&mut c, &keys[0], 1);
    insert(&mut c, &keys[1], 1);
    // equal timestamps: the first record in storage order goes
    let e = c.search(&keys[2], 1).unwrap().unwrap();
    assert_eq!(e.outcome(), Outcome::Evicted);
    assert_eq!(e.slot(), first);
    assert_eq!(e.evictions(), 1);
}

#[test]
fn blocks_are_isolated() {
    let mut c = Cache::<Index>::new(4, 4, 16, 16).unwrap();
    let hot = keys_in_block(&c, 0, 40);
    let cold = keys_in_block(&c, 3, 2);
    for (t, k) in cold.iter().enumerate() {
        insert(&mut c, &k[..], 1 + t as u64);
    }
    let before: Vec<_> = c
        .block(3)
        .unwrap()
        .map(|e| (e.slot(), e.header().last_access(), e.key().to_vec()))
        .collect();
    let mut now = 100;
    for k in hot.iter() {
        now += 1;
        let mut e = c.search(&k[..], now).unwrap().unwrap();
        if !e.is_valid() {
            e.occupy(&k[..]);
        }
    }
    let after: Vec<_> = c
        .block(3)
        .unwrap()
        .map(|e| (e.slot(), e.header().last_access(), e.key().to_vec()))
        .collect();
    assert_eq!(before, after);
    for k in cold.iter() {
        assert_eq!(
            c.search(&k[..], 0).unwrap().unwrap().outcome(),
            Outcome::Hit
        );
    }
    assert_eq!(c.len(), 4 + 2);
}

#[test]
fn zero_time_never_modifies_full_block() {
    let mut c = Cache::<Index>::new(2, 4, 16, 8).unwrap();
    let keys = keys_in_block(&c, 2, 5);
    insert(&mut c, &keys[0], 10);
    insert(&mut c, &keys[1], 20);
    let before = snapshot(&c);
    for k in keys[2..].iter() {
        assert!(c.search(&k[..], 0).unwrap().is_none());
    }
    assert_eq!(before, snapshot(&c));
}

#[test]
fn block_keeps_most_recent_keys() {
    let mut c = Cache::<Index>::new(4, 4, 16, 32).unwrap();
    let keys = keys_in_block(&c, 5, 5);
    let mut now = 0;
    for k in keys.iter() {
        now += 1;
        insert(&mut c, &k[..], now);
    }
    // keys[0] was evicted to make room for keys[4]
    let stored: Vec<_> = c.block(5).unwrap().map(|e| e.key().to_vec()).collect();
    assert!(!stored.contains(&keys[0].to_vec()));
    for k in keys[1..].iter() {
        assert!(stored.contains(&k.to_vec()));
    }
}

#[test]
fn seeded_random_workload() {
    let mut rng = ::rand::rngs::StdRng::seed_from_u64(0x5eed);
    let mut c = Cache::<Index>::new(8, 4, 32, 256).unwrap();
    let mut model: HashMap<[u8; 4], u64> = HashMap::new();
    let mut now = 0u64;
    for _ in 0..20_000 {
        now += rng.gen_range(1..10);
        let key = rng.gen_range(0u32..1024).to_le_bytes();
        let mut e = c.search(&key[..], now).unwrap().unwrap();
        match e.outcome() {
            Outcome::Hit => {
                assert_eq!(e.payload().0, model[&key]);
                e.payload_mut().0 += 1;
                *model.get_mut(&key).unwrap() += 1;
            }
            Outcome::Vacant | Outcome::Evicted => {
                assert!(!model.contains_key(&key));
                e.occupy(&key[..]);
                *e.payload_mut() = Index(0);
                model.insert(key, 0);
            }
        }
        // drop the keys the cache forgot
        model.retain(|k, _| {
            c.block(c.block_of(&k[..]))
                .unwrap()
                .any(|e| e.is_valid() && e.key() == &k[..])
        });
    }

    // no key is stored twice
    let mut seen = ::std::collections::HashSet::new();
    for e in c.iter() {
        assert!(seen.insert(e.key().to_vec()));
        assert_eq!(c.block_of(e.key()), (e.slot() / 8) as u32);
    }
    assert_eq!(seen.len(), model.len());
}

#[test]
fn random_searches_hit_their_slot() {
    let mut rng = ::rand::rngs::StdRng::seed_from_u64(42);
    let mut c = Cache::<Index>::new(8, 4, 32, 1024).unwrap();
    let keys: Vec<[u8; 4]> = (0..64).map(|_| rng.gen::<u32>().to_le_bytes()).collect();
    let mut slots = HashMap::new();
    for (i, k) in keys.iter().enumerate() {
        let mut e = c.search(&k[..], 1 + i as u64).unwrap().unwrap();
        if !e.is_valid() {
            e.occupy(&k[..]);
            e.payload_mut().0 = i as u64;
        }
        slots.insert(*k, e.slot());
    }
    for k in keys.iter() {
        let e = c.search(&k[..], 1000).unwrap().unwrap();
        assert_eq!(e.outcome(), Outcome::Hit);
        assert_eq!(e.slot(), slots[k]);
    }
}
