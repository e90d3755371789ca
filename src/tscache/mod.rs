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

//! N-way set-associative cache with time-stamped eviction
//!
//! The table is split in blocks of `n` records. A key only ever lives in
//! the block selected by `hash(key) % block_count`, and only those `n`
//! records are scanned on a search.
//!
//! # Eviction
//! Every search carries a timestamp `now`. When a key misses on a full
//! block, the record with the smallest timestamp of that block is flushed
//! and handed back for reuse. This is LRU, but only within a block, like
//! an hardware N-way cache.
//! `now == 0` disables eviction: a miss on a full block returns nothing
//! and nothing is modified. Hits with `now == 0` do not refresh the
//! timestamp.
//!
//! # Memory
//! All keys live in a single arena and all headers and payloads in a
//! single array, allocated once when the cache is built. The cache never
//! grows or shrinks and never allocates again.
//!
//! # Single thread
//! Searches are not synchronized. Wrap the cache in
//! [`Shared`](crate::shared::Shared) and keep the guard for the whole
//! operation if you need to share it.

mod record;

pub use record::{Entry, EntryMut, Header};

use crate::murmur;
use crate::results::{Error, Outcome};
use record::Record;
use ::std::fmt;
use ::tracing::{error, trace};

/// Shape of the cache table
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Geometry {
    n: u32,
    key_size: u32,
    record_size: u32,
    capacity: u32,
}

impl Geometry {
    /// * n: associativity, number of records per block
    /// * key_size: size in bytes of the keys
    /// * record_size: size in bytes of a whole record. Must be bigger than
    ///   the key
    /// * capacity: total number of records, multiple of `n`
    pub fn new(
        n: u32,
        key_size: u32,
        record_size: u32,
        capacity: u32,
    ) -> Result<Geometry, Error> {
        let valid = record_size != 0
            && capacity != 0
            && n != 0
            && (capacity % n) == 0
            && key_size < record_size;
        match valid {
            true => Ok(Geometry {
                n,
                key_size,
                record_size,
                capacity,
            }),
            false => {
                error!(
                    n = n,
                    key_size = key_size,
                    record_size = record_size,
                    capacity = capacity,
                    "invalid cache geometry"
                );
                Err(Error::Geometry {
                    n,
                    key_size,
                    record_size,
                    capacity,
                })
            }
        }
    }
    #[inline]
    pub fn associativity(&self) -> u32 {
        self.n
    }
    #[inline]
    pub fn key_size(&self) -> u32 {
        self.key_size
    }
    /// Record size as given to [`Geometry::new`]. It is only checked
    /// against the key size: the actual layout is a `Header`, the key and
    /// the payload, see [`Cache::for_payload`]
    #[inline]
    pub fn record_size(&self) -> u32 {
        self.record_size
    }
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
    #[inline]
    pub fn block_count(&self) -> u32 {
        self.capacity / self.n
    }
}

pub struct Cache<P> {
    geometry: Geometry,
    keys: Box<[u8]>,
    records: Box<[Record<P>]>,
}

impl<P: Default> Cache<P> {
    pub fn new(
        n: u32,
        key_size: u32,
        record_size: u32,
        capacity: u32,
    ) -> Result<Cache<P>, Error> {
        let geometry = Geometry::new(n, key_size, record_size, capacity)?;
        let keys =
            vec![0u8; (capacity as usize) * (key_size as usize)].into_boxed_slice();
        let records = (0..capacity)
            .map(|_| Record::default())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Cache {
            geometry,
            keys,
            records,
        })
    }
    /// Build a cache whose record size is derived from the header, key and
    /// payload sizes
    pub fn for_payload(
        n: u32,
        key_size: u32,
        capacity: u32,
    ) -> Result<Cache<P>, Error> {
        let record_size = ::std::mem::size_of::<Header>()
            + (key_size as usize)
            + ::std::mem::size_of::<P>();
        Cache::new(n, key_size, record_size as u32, capacity)
    }
    /// Invalidate all records and reset their payload
    pub fn clear(&mut self) {
        for b in self.keys.iter_mut() {
            *b = 0;
        }
        for r in self.records.iter_mut() {
            *r = Record::default();
        }
    }
}

impl<P> Cache<P> {
    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
    #[inline]
    fn key_range(&self, slot: usize) -> ::std::ops::Range<usize> {
        let ks = self.geometry.key_size as usize;
        (slot * ks)..((slot + 1) * ks)
    }
    fn block_first(&self, block: u32) -> Result<usize, Error> {
        let block_count = self.geometry.block_count();
        if block >= block_count {
            error!(
                block = block,
                block_count = block_count,
                "block out of range"
            );
            return Err(Error::BlockOutOfRange { block, block_count });
        }
        Ok((block as usize) * (self.geometry.n as usize))
    }
    fn check_key(&self, key: &[u8]) -> Result<(), Error> {
        let expected = self.geometry.key_size as usize;
        match key.len() == expected {
            true => Ok(()),
            false => Err(Error::KeyLength {
                expected,
                actual: key.len(),
            }),
        }
    }
    fn entry(&self, slot: usize) -> Entry<'_, P> {
        let record = &self.records[slot];
        Entry {
            slot,
            header: &record.header,
            key: &self.keys[self.key_range(slot)],
            payload: &record.payload,
        }
    }
    fn entry_mut(&mut self, slot: usize, outcome: Outcome) -> EntryMut<'_, P> {
        let range = self.key_range(slot);
        let record = &mut self.records[slot];
        EntryMut {
            slot,
            outcome,
            header: &mut record.header,
            key: &mut self.keys[range],
            payload: &mut record.payload,
        }
    }

    /// Block selected by a key
    pub fn block_of(&self, key: &[u8]) -> u32 {
        murmur::hash(key, 0) % self.geometry.block_count()
    }

    /// Search `key` in the given block.
    ///
    /// Returns:
    /// * the valid record holding the key, if found
    /// * a free record of the block (not valid), on a miss
    /// * the flushed oldest record of the block (not valid), on a miss with
    ///   a full block and `now != 0`
    /// * `None` on a miss with a full block and `now == 0`
    pub fn search_block(
        &mut self,
        block: u32,
        key: &[u8],
        now: u64,
    ) -> Result<Option<EntryMut<'_, P>>, Error> {
        let first = self.block_first(block)?;
        self.check_key(key)?;

        // Search all records of this block.
        // Keep track of the first empty one and of the oldest one, so we
        // don't have to scan again on a miss
        let mut hit = None;
        let mut empty = None;
        let mut oldest = first;
        for slot in first..(first + self.geometry.n as usize) {
            let header = &self.records[slot].header;
            match header.is_valid() {
                true => {
                    if self.keys[self.key_range(slot)] == *key {
                        hit = Some(slot);
                        break;
                    }
                    // strict: on equal timestamps the first one is the oldest
                    if header.last_access()
                        < self.records[oldest].header.last_access()
                    {
                        oldest = slot;
                    }
                }
                false => {
                    if empty.is_none() {
                        empty = Some(slot);
                    }
                }
            }
        }

        if let Some(slot) = hit {
            if now != 0 {
                self.records[slot].header.touch(now);
            }
            return Ok(Some(self.entry_mut(slot, Outcome::Hit)));
        }
        if let Some(slot) = empty {
            self.records[slot].header.touch(now);
            return Ok(Some(self.entry_mut(slot, Outcome::Vacant)));
        }
        match now {
            0 => Ok(None),
            now => {
                let header = &mut self.records[oldest].header;
                header.evict(now);
                trace!(
                    block = block,
                    slot = oldest,
                    evictions = header.evictions(),
                    "evicted"
                );
                Ok(Some(self.entry_mut(oldest, Outcome::Evicted)))
            }
        }
    }
    /// Search `key` in block `hash % block_count`
    pub fn search_hash(
        &mut self,
        hash: u32,
        key: &[u8],
        now: u64,
    ) -> Result<Option<EntryMut<'_, P>>, Error> {
        let block = hash % self.geometry.block_count();
        self.search_block(block, key, now)
    }
    /// Search `key`, hashing all of it
    pub fn search(
        &mut self,
        key: &[u8],
        now: u64,
    ) -> Result<Option<EntryMut<'_, P>>, Error> {
        let hash = murmur::hash(key, 0);
        self.search_hash(hash, key, now)
    }

    /// Number of valid records. Scans the whole table
    pub fn len(&self) -> usize {
        self.records.iter().filter(|r| r.header.is_valid()).count()
    }
    pub fn is_empty(&self) -> bool {
        self.records.iter().all(|r| !r.header.is_valid())
    }
    /// All valid records, in storage order
    pub fn iter(&self) -> impl Iterator<Item = Entry<'_, P>> + '_ {
        (0..self.records.len())
            .map(move |slot| self.entry(slot))
            .filter(|e| e.is_valid())
    }
    /// All records of a block, valid or not, in storage order
    pub fn block(
        &self,
        block: u32,
    ) -> Result<impl Iterator<Item = Entry<'_, P>> + '_, Error> {
        let first = self.block_first(block)?;
        let last = first + self.geometry.n as usize;
        Ok((first..last).map(move |slot| self.entry(slot)))
    }

    fn dump_block(
        &self,
        block: u32,
        out: &mut dyn fmt::Write,
        mut custom: Option<&mut dyn FnMut(&P, &mut dyn fmt::Write) -> fmt::Result>,
    ) -> Result<(), Error> {
        let entries = self.block(block)?;
        writeln!(out, "block {}:", block)?;
        for e in entries {
            write!(
                out,
                "    valid={} e={}",
                e.is_valid() as u8,
                e.header().evictions()
            )?;
            if e.is_valid() {
                write!(out, " ts={} key=[ ", e.header().last_access())?;
                for b in e.key() {
                    write!(out, "{:02x} ", b)?;
                }
                write!(out, "]")?;
                if let Some(f) = custom.as_mut() {
                    write!(out, " :: ")?;
                    f(e.payload(), &mut *out)?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
    /// Write a human readable dump of a block
    pub fn show_block(
        &self,
        block: u32,
        out: &mut dyn fmt::Write,
    ) -> Result<(), Error> {
        self.dump_block(block, out, None)
    }
    /// Like `show_block`, but let the caller print the payload
    pub fn show_block_with<F>(
        &self,
        block: u32,
        out: &mut dyn fmt::Write,
        mut custom: F,
    ) -> Result<(), Error>
    where
        F: FnMut(&P, &mut dyn fmt::Write) -> fmt::Result,
    {
        self.dump_block(block, out, Some(&mut custom))
    }
    /// Dump every block
    pub fn show(&self, out: &mut dyn fmt::Write) -> Result<(), Error> {
        for block in 0..self.geometry.block_count() {
            self.dump_block(block, out, None)?;
        }
        Ok(())
    }
    pub fn show_with<F>(
        &self,
        out: &mut dyn fmt::Write,
        mut custom: F,
    ) -> Result<(), Error>
    where
        F: FnMut(&P, &mut dyn fmt::Write) -> fmt::Result,
    {
        for block in 0..self.geometry.block_count() {
            self.dump_block(block, out, Some(&mut custom))?;
        }
        Ok(())
    }
}
