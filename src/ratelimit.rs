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

//! Token bucket driven by a caller-provided clock
//!
//! Time is in microseconds. One token is added every `interval`
//! microseconds and up to `burst` extra tokens can be banked.
//!
//! The bucket is tracked as time credit instead of whole tokens, so
//! a clock that ticks slower than `interval` still converges to the
//! configured rate: partial intervals are not lost between calls.

pub const MICROS_PER_SEC: u64 = 1_000_000;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Verdict {
    Allowed,
    Denied,
}

impl Verdict {
    #[inline]
    pub fn is_allowed(self) -> bool {
        self == Verdict::Allowed
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct RateLimiter {
    interval: u64,
    burst: u32,
    credit: u64,
    // None until the first consume: a fresh bucket is full no matter
    // what the clock says
    last: Option<u64>,
}

impl RateLimiter {
    /// A limiter allowing one event every `interval` microseconds, plus
    /// `burst` banked events. An `interval` of 0 never limits.
    pub fn new(interval: u64, burst: u32) -> Self {
        let mut rl = RateLimiter {
            interval,
            burst,
            credit: 0,
            last: None,
        };
        rl.reset();
        rl
    }
    /// A limiter allowing `pps` events per second.
    /// `pps == 0` returns a limiter that never limits: callers use the
    /// pps value itself to decide whether limiting is enabled.
    pub fn from_pps(pps: u32, burst: u32) -> Self {
        match pps {
            0 => RateLimiter::new(0, burst),
            pps => RateLimiter::new(MICROS_PER_SEC / (pps as u64), burst),
        }
    }
    #[inline]
    pub fn interval(&self) -> u64 {
        self.interval
    }
    #[inline]
    pub fn burst(&self) -> u32 {
        self.burst
    }
    #[inline]
    fn max_credit(&self) -> u64 {
        self.interval.saturating_mul(self.burst as u64 + 1)
    }
    /// refill the bucket, as if it was just created
    pub fn reset(&mut self) {
        self.credit = self.max_credit();
        self.last = None;
    }
    /// Try to take one token at time `now`
    pub fn consume(&mut self, now: u64) -> Verdict {
        if self.interval == 0 {
            return Verdict::Allowed;
        }
        if let Some(last) = self.last {
            // a clock going backwards adds nothing
            let elapsed = now.saturating_sub(last);
            self.credit = self
                .credit
                .saturating_add(elapsed)
                .min(self.max_credit());
        }
        self.last = Some(now);
        match self.credit >= self.interval {
            true => {
                self.credit -= self.interval;
                Verdict::Allowed
            }
            false => Verdict::Denied,
        }
    }
}
