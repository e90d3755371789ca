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

//! Static bounds and declarative configuration of the admission controller
//!
//! Only the configuration can be (de)serialized: nothing the controller
//! learns at runtime is ever saved.
//!
//! ```toml
//! block_size = 8
//! capacity = 256
//!
//! [flow]
//! pps = 100
//!
//! [global]
//! pps = 800
//! burst = 16
//!
//! [[groups]]
//! id = 1
//! pps = 500
//!
//! [priority]
//! ethertypes = [0x88cc, 0x8809]
//! destinations = [[0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]]
//! ```

use ::serde::{Deserialize, Serialize};

/// Size of the flow keys
pub const KEY_SIZE: usize = 64;
/// Number of user-defined groups
pub const GROUP_COUNT: usize = 64;
pub const MAX_PRIORITY_ETHERTYPES: usize = 8;
pub const MAX_PRIORITY_DAS: usize = 8;

pub const DEFAULT_BLOCK_SIZE: u32 = 8;
pub const DEFAULT_CAPACITY: u32 = 256;

/// Rate of a limiter. `pps == 0` disables it
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateConfig {
    pub pps: u32,
    pub burst: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub id: usize,
    pub pps: u32,
    #[serde(default)]
    pub burst: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriorityConfig {
    pub ethertypes: Vec<u16>,
    pub destinations: Vec<[u8; 6]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdmissionConfig {
    /// associativity of the flow cache
    pub block_size: u32,
    /// total number of flows tracked
    pub capacity: u32,
    pub flow: RateConfig,
    pub global: RateConfig,
    pub groups: Vec<GroupConfig>,
    pub priority: PriorityConfig,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        AdmissionConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            capacity: DEFAULT_CAPACITY,
            flow: RateConfig::default(),
            global: RateConfig::default(),
            groups: Vec::new(),
            priority: PriorityConfig::default(),
        }
    }
}
