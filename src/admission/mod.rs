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

//! Packet-in admission control
//!
//! Every packet sent to the controller goes through, in order:
//! * priority classes: matching EtherTypes or destination MACs are
//!   forwarded right away, without touching any limiter
//! * the global limiter, shared by all packets
//! * the limiter of the packet group, if any
//! * the per-flow limiter. Flows are tracked in a [`Cache`], so a flow
//!   that is not seen for a while is eventually evicted and starts anew.
//!
//! Time is in microseconds and must never be 0 once flow limiting is
//! enabled, since 0 disables the cache eviction.
//!
//! # Single thread
//! Nothing here is synchronized, use one controller per packet-in
//! pipeline or wrap it in [`Shared`](crate::shared::Shared).

mod action;
mod key;
mod priority;

pub use action::Action;
pub use key::{default_key, FlowKey, KeyBuilder, KeyVerdict, PortPrefixKey};
pub use priority::{destination, ethertype, FixedList, Mac, PriorityLists};

use crate::config::{AdmissionConfig, GROUP_COUNT, KEY_SIZE};
use crate::ratelimit::RateLimiter;
use crate::results::Error;
use crate::tscache::Cache;
use ::tracing::{debug, error, warn};

/// Payload of the flow cache records
#[derive(Debug, Default, Clone, Copy)]
pub struct FlowState {
    limiter: RateLimiter,
    port: u32,
}

impl FlowState {
    /// ingress port of the flow
    #[inline]
    pub fn port(&self) -> u32 {
        self.port
    }
    #[inline]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Group {
    pps: u32,
    burst: u32,
    limiter: RateLimiter,
}

impl Group {
    fn configure(&mut self, pps: u32, burst: u32) {
        self.pps = pps;
        self.burst = burst;
        if pps != 0 {
            self.limiter = RateLimiter::from_pps(pps, burst);
        }
    }
    #[inline]
    fn admit(&mut self, now: u64) -> bool {
        self.pps == 0 || self.limiter.consume(now).is_allowed()
    }
}

pub struct Controller {
    flows: Cache<FlowState>,
    flow_pps: u32,
    flow_burst: u32,
    global: Group,
    groups: [Group; GROUP_COUNT],
    priority: PriorityLists,
    key_builder: Option<Box<dyn KeyBuilder + Send>>,
}

impl Controller {
    /// * block_size: associativity of the flow cache
    /// * capacity: number of flows tracked, multiple of `block_size`
    pub fn new(block_size: u32, capacity: u32) -> Result<Controller, Error> {
        let flows =
            Cache::for_payload(block_size, KEY_SIZE as u32, capacity)?;
        Ok(Controller {
            flows,
            flow_pps: 0,
            flow_burst: 0,
            global: Group::default(),
            groups: [Group::default(); GROUP_COUNT],
            priority: PriorityLists::default(),
            key_builder: None,
        })
    }
    pub fn from_config(config: &AdmissionConfig) -> Result<Controller, Error> {
        let mut ctrl = Controller::new(config.block_size, config.capacity)?;
        ctrl.apply_config(config)?;
        Ok(ctrl)
    }
    /// Apply rates and priority classes. The priority lists are replaced,
    /// groups not listed are left as they are.
    /// The flow cache is not cleared.
    /// On error the controller is left untouched
    pub fn apply_config(&mut self, config: &AdmissionConfig) -> Result<(), Error> {
        if let Some(g) = config.groups.iter().find(|g| g.id >= GROUP_COUNT) {
            error!(group = g.id, "group is invalid");
            return Err(Error::InvalidGroup { group: g.id });
        }
        let mut priority = PriorityLists::default();
        for et in config.priority.ethertypes.iter() {
            priority.ethertypes.insert(*et).map_err(|e| {
                error!(ethertype = *et, "{}", e);
                e
            })?;
        }
        for da in config.priority.destinations.iter() {
            priority.das.insert(*da).map_err(|e| {
                error!(da = ?da, "{}", e);
                e
            })?;
        }

        self.set_flow_pps(config.flow.pps, config.flow.burst);
        self.set_global_pps(config.global.pps, config.global.burst);
        for g in config.groups.iter() {
            self.set_group_pps(g.id, g.pps, g.burst)?;
        }
        self.priority = priority;
        Ok(())
    }

    /// Classify a packet-in.
    /// * port: ingress port
    /// * group: optional group. Groups that are out of range or have no
    ///   rate are ignored
    /// * data: the packet, starting from the Ethernet header
    /// * now: current time, in microseconds
    pub fn packet_in(
        &mut self,
        port: u32,
        group: Option<usize>,
        data: &[u8],
        now: u64,
    ) -> Action {
        if self.priority.matches(data) {
            return Action::ForwardPriority;
        }
        if !self.global.admit(now) {
            return Action::Drop;
        }
        if let Some(g) = group.and_then(|g| self.groups.get_mut(g)) {
            if !g.admit(now) {
                return Action::Drop;
            }
        }
        self.flow_action(port, data, now)
    }

    fn flow_action(&mut self, port: u32, data: &[u8], now: u64) -> Action {
        if self.flow_pps == 0 {
            return Action::ForwardNew;
        }

        let mut key: FlowKey = [0; KEY_SIZE];
        match self.key_builder.as_mut() {
            None => default_key(data, &mut key),
            Some(builder) => match builder.build(port, data, &mut key) {
                KeyVerdict::Continue => {}
                KeyVerdict::Drop => return Action::Drop,
                KeyVerdict::Forward => return Action::ForwardNew,
                KeyVerdict::Error => return Action::Error,
            },
        }

        let (pps, burst) = (self.flow_pps, self.flow_burst);
        let mut entry = match self.flows.search(&key, now) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                // only possible with now == 0
                warn!(now = now, "flow search returned nothing, forwarding");
                return Action::ForwardNew;
            }
            Err(e) => {
                warn!(error = %e, "flow search failed, forwarding");
                return Action::ForwardNew;
            }
        };
        if entry.is_valid() && entry.payload().port == port {
            return match entry.payload_mut().limiter.consume(now).is_allowed() {
                true => Action::ForwardExisting,
                false => Action::Drop,
            };
        }
        // new flow, evicted flow, or the ingress port changed
        entry.occupy(&key);
        let state = entry.payload_mut();
        state.limiter = RateLimiter::from_pps(pps, burst);
        // always allowed on a fresh limiter
        let _ = state.limiter.consume(now);
        state.port = port;
        Action::ForwardNew
    }

    /// Rate of each flow.
    /// Flows already tracked keep their old rate until they are evicted or
    /// the cache is cleared with [`clear`](Controller::clear)
    pub fn set_flow_pps(&mut self, pps: u32, burst: u32) {
        debug!(pps = pps, burst = burst, "flow rate");
        self.flow_pps = pps;
        self.flow_burst = burst;
    }
    /// Rate of all packets, priority classes excluded
    pub fn set_global_pps(&mut self, pps: u32, burst: u32) {
        debug!(pps = pps, burst = burst, "global rate");
        self.global.configure(pps, burst);
    }
    /// Rate of a group. Use groups to shape traffic on a meta-property, like
    /// the ingress port
    pub fn set_group_pps(
        &mut self,
        group: usize,
        pps: u32,
        burst: u32,
    ) -> Result<(), Error> {
        match self.groups.get_mut(group) {
            Some(g) => {
                debug!(group = group, pps = pps, burst = burst, "group rate");
                g.configure(pps, burst);
                Ok(())
            }
            None => {
                error!(group = group, "group is invalid");
                Err(Error::InvalidGroup { group })
            }
        }
    }
    /// Forget all flows
    pub fn clear(&mut self) {
        debug!("flow cache cleared");
        self.flows.clear();
    }

    /// Packets with this EtherType skip all limits
    pub fn add_priority_ethertype(&mut self, ethertype: u16) -> Result<(), Error> {
        self.priority.ethertypes.insert(ethertype).map_err(|e| {
            error!(ethertype = ethertype, "{}", e);
            e
        })
    }
    pub fn remove_priority_ethertype(&mut self, ethertype: u16) {
        self.priority.ethertypes.remove(&ethertype);
    }
    /// Packets sent to this destination MAC skip all limits
    pub fn add_priority_da(&mut self, da: Mac) -> Result<(), Error> {
        self.priority.das.insert(da).map_err(|e| {
            error!(da = ?da, "{}", e);
            e
        })
    }
    pub fn remove_priority_da(&mut self, da: Mac) {
        self.priority.das.remove(&da);
    }

    /// Build flow keys with `builder` instead of the packet prefix
    pub fn set_key_builder<B>(&mut self, builder: B)
    where
        B: KeyBuilder + Send + 'static,
    {
        self.key_builder = Some(Box::new(builder));
    }
    pub fn clear_key_builder(&mut self) {
        self.key_builder = None;
    }

    #[inline]
    pub fn flow_pps(&self) -> u32 {
        self.flow_pps
    }
    #[inline]
    pub fn flow_burst(&self) -> u32 {
        self.flow_burst
    }
    #[inline]
    pub fn global_pps(&self) -> u32 {
        self.global.pps
    }
    pub fn group_pps(&self, group: usize) -> Option<u32> {
        self.groups.get(group).map(|g| g.pps)
    }
    pub fn priority_ethertypes(&self) -> &[u16] {
        self.priority.ethertypes.as_slice()
    }
    pub fn priority_das(&self) -> &[Mac] {
        self.priority.das.as_slice()
    }
    /// The flow cache, for inspection
    pub fn cache(&self) -> &Cache<FlowState> {
        &self.flows
    }
}
