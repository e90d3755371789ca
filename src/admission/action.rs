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

use crate::results::Error;

/// What to do with a packet-in
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum Action {
    Error,
    /// first packet of a flow, or flow limiting is disabled
    ForwardNew,
    /// known flow, within its rate
    ForwardExisting,
    /// matched a priority class, no limit applied
    ForwardPriority,
    Drop,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Error,
        Action::ForwardNew,
        Action::ForwardExisting,
        Action::ForwardPriority,
        Action::Drop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Action::Error => "ERROR",
            Action::ForwardNew => "FORWARD_NEW",
            Action::ForwardExisting => "FORWARD_EXISTING",
            Action::ForwardPriority => "FORWARD_PRIORITY",
            Action::Drop => "DROP",
        }
    }
    pub fn description(self) -> &'static str {
        match self {
            Action::Error => "the packet could not be classified",
            Action::ForwardNew => "forward, new or untracked flow",
            Action::ForwardExisting => "forward, tracked flow within its rate",
            Action::ForwardPriority => "forward, prioritized traffic",
            Action::Drop => "drop, a rate limit was exceeded",
        }
    }
    #[inline]
    pub fn is_forward(self) -> bool {
        match self {
            Action::ForwardNew
            | Action::ForwardExisting
            | Action::ForwardPriority => true,
            Action::Error | Action::Drop => false,
        }
    }
}

impl ::std::fmt::Display for Action {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        f.write_str(self.name())
    }
}

impl ::std::str::FromStr for Action {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownAction(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for a in Action::ALL.iter() {
            assert_eq!(a.to_string().parse::<Action>(), Ok(*a));
        }
        assert_eq!("drop".parse::<Action>(), Ok(Action::Drop));
        assert_eq!(
            "FORWARD".parse::<Action>(),
            Err(Error::UnknownAction("FORWARD".to_owned()))
        );
    }

    #[test]
    fn forwarding() {
        assert!(Action::ForwardPriority.is_forward());
        assert!(!Action::Drop.is_forward());
        assert!(!Action::Error.is_forward());
    }
}
