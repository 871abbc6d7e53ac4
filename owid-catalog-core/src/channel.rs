//! Pipeline channels
//!
//! A channel is a tier of the data pipeline and partitions the top level of
//! every catalog. The set is closed: directories or index rows naming any
//! other channel are not part of the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named tier of the data pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Snapshot,
    Walden,
    Meadow,
    Garden,
    Grapher,
    Explorers,
    OpenNumbers,
    Examples,
    External,
}

impl Channel {
    /// Every known channel
    pub const ALL: [Channel; 9] = [
        Channel::Snapshot,
        Channel::Walden,
        Channel::Meadow,
        Channel::Garden,
        Channel::Grapher,
        Channel::Explorers,
        Channel::OpenNumbers,
        Channel::Examples,
        Channel::External,
    ];

    /// The publication-ready tier searched when no channel is given
    pub const DEFAULT: Channel = Channel::Garden;

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Snapshot => "snapshot",
            Channel::Walden => "walden",
            Channel::Meadow => "meadow",
            Channel::Garden => "garden",
            Channel::Grapher => "grapher",
            Channel::Explorers => "explorers",
            Channel::OpenNumbers => "open_numbers",
            Channel::Examples => "examples",
            Channel::External => "external",
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Channel::DEFAULT
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .iter()
            .find(|channel| channel.as_str() == s)
            .copied()
            .ok_or_else(|| {
                let valid: Vec<&str> = Channel::ALL.iter().map(|c| c.as_str()).collect();
                format!("Unknown channel '{}'. Valid channels: {}", s, valid.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_channel() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("Garden".parse::<Channel>().is_err());
        assert!("scratch".parse::<Channel>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Channel::OpenNumbers).unwrap();
        assert_eq!(json, "\"open_numbers\"");

        let channel: Channel = serde_json::from_str("\"meadow\"").unwrap();
        assert_eq!(channel, Channel::Meadow);
    }

    #[test]
    fn test_default_is_garden() {
        assert_eq!(Channel::default(), Channel::Garden);
    }
}
