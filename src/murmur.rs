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

//! MurmurHash3, x86 32 bit variant.
//!
//! Blocks are always read as little-endian words, so the same key selects
//! the same cache block on every platform.
//!
//! The hash can also be computed incrementally over whole words:
//! ```
//! let words = [0x6c6c6568u32, 0x6f77206f];
//! let mut state = 42;
//! for w in words.iter() {
//!     state = flowgate::murmur::round(state, *w);
//! }
//! let h = flowgate::murmur::finish(state, 8);
//! assert_eq!(h, flowgate::murmur::hash(b"hello wo", 42));
//! ```
//! Incremental hashing does not match [`hash`] when the length is not a
//! multiple of 4 bytes.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

#[inline]
pub fn fmix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

#[inline]
fn scramble(mut k: u32) -> u32 {
    k = k.wrapping_mul(C1);
    k = k.rotate_left(15);
    k.wrapping_mul(C2)
}

/// Mix one 32-bit word into the hash state
#[inline]
pub fn round(state: u32, data: u32) -> u32 {
    let state = state ^ scramble(data);
    state.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64)
}

/// Finalize the hash state. `len` is the total number of bytes hashed.
#[inline]
pub fn finish(state: u32, len: usize) -> u32 {
    // the reference algorithm only mixes the low 32 bits of the length
    fmix(state ^ (len as u32))
}

/// Hash `data` with the given `seed`
pub fn hash(data: &[u8], seed: u32) -> u32 {
    let mut h1 = seed;
    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h1 = round(h1, k1);
    }

    let tail = blocks.remainder();
    let mut k1: u32 = 0;
    if tail.len() >= 3 {
        k1 ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        k1 ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        k1 ^= tail[0] as u32;
        h1 ^= scramble(k1);
    }

    finish(h1, data.len())
}
