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

//! Fixed-size caches and packet-in admission control for software switches
//!
//! # Time-stamped cache
//! [`tscache`] is an N-way set-associative table: every key maps to a
//! single block of `n` records and only that block is ever scanned.
//! Eviction is LRU within the block, driven by the timestamp the caller
//! passes on each search. Memory is allocated once.
//!
//! # Admission control
//! [`admission`] decides what to do with each packet a switch sends to its
//! controller. Priority traffic goes through untouched, everything else is
//! shaped by a global limiter, optional per-group limiters and one limiter
//! per flow, tracked in a time-stamped cache.
//!
//! # Single thread
//! Nothing here locks on its own. Use [`Shared`] to share a cache or a
//! controller between threads.

/// packet-in classification
pub mod admission;
pub mod config;
pub mod murmur;
pub mod ratelimit;
/// common errors and search results
pub mod results;
pub mod shared;
pub mod tscache;

pub use admission::{Action, Controller};
pub use results::{Error, Outcome};
pub use shared::Shared;
pub use tscache::Cache;
