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

use crate::config::{MAX_PRIORITY_DAS, MAX_PRIORITY_ETHERTYPES};
use crate::results::Error;

/// below this, the type/length field is an 802.3 length
const ETHERTYPE_MIN: u16 = 0x0600;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_OFFSET: usize = 12;
const VLAN_ETHERTYPE_OFFSET: usize = 16;

pub type Mac = [u8; 6];

/// Small set with inline storage. Never allocates.
/// Order is not preserved across removals
#[derive(Debug, Clone, Copy)]
pub struct FixedList<T, const N: usize> {
    values: [T; N],
    len: usize,
}

impl<T: Copy + Default + PartialEq, const N: usize> Default for FixedList<T, N> {
    fn default() -> Self {
        FixedList {
            values: [T::default(); N],
            len: 0,
        }
    }
}

impl<T: Copy + Default + PartialEq, const N: usize> FixedList<T, N> {
    pub fn new() -> Self {
        Self::default()
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    #[inline]
    pub fn capacity(&self) -> usize {
        N
    }
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.values[..self.len]
    }
    #[inline]
    pub fn contains(&self, value: &T) -> bool {
        self.as_slice().iter().any(|v| v == value)
    }
    /// Adding a value already present does nothing
    pub fn insert(&mut self, value: T) -> Result<(), Error> {
        if self.contains(&value) {
            return Ok(());
        }
        if self.len == N {
            return Err(Error::PriorityListFull { capacity: N });
        }
        self.values[self.len] = value;
        self.len += 1;
        Ok(())
    }
    /// Swap with the last element and shrink.
    /// Returns whether the value was present
    pub fn remove(&mut self, value: &T) -> bool {
        match self.as_slice().iter().position(|v| v == value) {
            None => false,
            Some(idx) => {
                self.values[idx] = self.values[self.len - 1];
                self.len -= 1;
                true
            }
        }
    }
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

#[inline]
fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
}

/// EtherType of an Ethernet II frame, looking through one 802.1Q tag.
/// `None` for 802.3 frames and for frames too short to carry it
pub fn ethertype(data: &[u8]) -> Option<u16> {
    match read_u16(data, ETHERTYPE_OFFSET)? {
        // 802.3, assumed LLC. SNAP is not decoded
        x if x < ETHERTYPE_MIN => None,
        // assume single tagged
        ETHERTYPE_VLAN => read_u16(data, VLAN_ETHERTYPE_OFFSET),
        x => Some(x),
    }
}

/// destination MAC address
#[inline]
pub fn destination(data: &[u8]) -> Option<&[u8]> {
    data.get(..6)
}

/// Traffic classes that skip every limit
#[derive(Debug, Clone, Default)]
pub struct PriorityLists {
    pub(crate) ethertypes: FixedList<u16, MAX_PRIORITY_ETHERTYPES>,
    pub(crate) das: FixedList<Mac, MAX_PRIORITY_DAS>,
}

impl PriorityLists {
    pub fn matches(&self, data: &[u8]) -> bool {
        if !self.ethertypes.is_empty() {
            if let Some(et) = ethertype(data) {
                if self.ethertypes.contains(&et) {
                    return true;
                }
            }
        }
        if !self.das.is_empty() {
            if let Some(da) = destination(data) {
                return self.das.as_slice().iter().any(|d| d[..] == *da);
            }
        }
        false
    }
}
