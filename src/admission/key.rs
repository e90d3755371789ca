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

use crate::config::KEY_SIZE;

pub type FlowKey = [u8; KEY_SIZE];

/// Result of building a flow key
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum KeyVerdict {
    /// the key was written, go on with the flow lookup
    Continue,
    /// drop the packet without looking at the flow cache
    Drop,
    /// forward the packet as a new flow without looking at the flow cache
    Forward,
    /// the packet can not be classified
    Error,
}

/// Builds the flow key of a packet.
///
/// Runs only after the priority, global and group checks passed.
/// Implemented for any `FnMut(port, data, key) -> KeyVerdict`
pub trait KeyBuilder {
    /// `key` is zeroed on entry
    fn build(&mut self, port: u32, data: &[u8], key: &mut FlowKey) -> KeyVerdict;
}

impl<F> KeyBuilder for F
where
    F: FnMut(u32, &[u8], &mut FlowKey) -> KeyVerdict,
{
    fn build(&mut self, port: u32, data: &[u8], key: &mut FlowKey) -> KeyVerdict {
        self(port, data, key)
    }
}

/// First bytes of the packet, zero padded
pub fn default_key(data: &[u8], key: &mut FlowKey) {
    let len = ::std::cmp::min(data.len(), KEY_SIZE);
    key[..len].copy_from_slice(&data[..len]);
}

/// Key made of the ingress port followed by the first bytes of the packet,
/// so the same packet on two ports is two flows
#[derive(Debug, Default, Copy, Clone)]
pub struct PortPrefixKey;

impl KeyBuilder for PortPrefixKey {
    fn build(&mut self, port: u32, data: &[u8], key: &mut FlowKey) -> KeyVerdict {
        let (head, tail) = key.split_at_mut(4);
        head.copy_from_slice(&port.to_be_bytes());
        let len = ::std::cmp::min(data.len(), tail.len());
        tail[..len].copy_from_slice(&data[..len]);
        KeyVerdict::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_key_pads() {
        let mut key = [0u8; KEY_SIZE];
        default_key(&[1, 2, 3], &mut key);
        assert_eq!(&key[..4], &[1, 2, 3, 0]);
        let long = [9u8; 100];
        default_key(&long, &mut key);
        assert!(key.iter().all(|b| *b == 9));
    }

    #[test]
    fn port_prefix() {
        let mut key = [0u8; KEY_SIZE];
        let mut b = PortPrefixKey;
        assert_eq!(b.build(0x0102_0304, &[0xaa; 70], &mut key), KeyVerdict::Continue);
        assert_eq!(&key[..5], &[1, 2, 3, 4, 0xaa]);
        assert_eq!(key[KEY_SIZE - 1], 0xaa);
    }

    #[test]
    fn closures_are_builders() {
        let mut calls = 0;
        let mut f = |_port: u32, _data: &[u8], key: &mut FlowKey| {
            calls += 1;
            key[0] = 1;
            KeyVerdict::Continue
        };
        let mut key = [0u8; KEY_SIZE];
        assert_eq!(f.build(0, &[], &mut key), KeyVerdict::Continue);
        assert_eq!(key[0], 1);
        drop(f);
        assert_eq!(calls, 1);
    }
}
