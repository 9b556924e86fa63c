//! Wi-Fi channel numbers and sweep lists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Channels the receiver sweeps when nothing else is configured: the
/// non-overlapping 2.4 GHz channels followed by the UNII-1 and UNII-3 blocks.
pub const DEFAULT_CHANNELS: [u16; 11] = [1, 6, 11, 36, 40, 44, 48, 149, 153, 157, 161];

/// Frequency band of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    /// 2.4 GHz ISM band, channels 1-14.
    TwoPointFourGhz,
    /// 5 GHz band.
    FiveGhz,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TwoPointFourGhz => write!(f, "2.4 GHz"),
            Self::FiveGhz => write!(f, "5 GHz"),
        }
    }
}

/// A validated 802.11 channel number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Channel(u16);

impl Channel {
    /// Create a channel, rejecting numbers that are not 2.4/5 GHz channels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChannel`] for unknown channel numbers.
    pub fn new(number: u16) -> Result<Self> {
        if Self::band_of(number).is_some() {
            Ok(Self(number))
        } else {
            Err(Error::InvalidChannel {
                value: number.to_string(),
            })
        }
    }

    fn band_of(number: u16) -> Option<Band> {
        match number {
            1..=14 => Some(Band::TwoPointFourGhz),
            32..=64 | 100..=144 if number % 4 == 0 => Some(Band::FiveGhz),
            68 | 96 => Some(Band::FiveGhz),
            149..=177 if number % 4 == 1 => Some(Band::FiveGhz),
            _ => None,
        }
    }

    /// The channel number.
    #[must_use]
    pub fn number(self) -> u16 {
        self.0
    }

    /// The band this channel belongs to.
    #[must_use]
    pub fn band(self) -> Band {
        if self.0 <= 14 {
            Band::TwoPointFourGhz
        } else {
            Band::FiveGhz
        }
    }

    /// Centre frequency in MHz.
    #[must_use]
    pub fn frequency_mhz(self) -> u32 {
        let n = u32::from(self.0);
        match self.0 {
            14 => 2484,
            1..=13 => 2407 + 5 * n,
            _ => 5000 + 5 * n,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Channel {
    type Error = Error;

    fn try_from(number: u16) -> Result<Self> {
        Self::new(number)
    }
}

impl From<Channel> for u16 {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let number = trimmed.parse::<u16>().map_err(|_| Error::InvalidChannel {
            value: trimmed.to_string(),
        })?;
        Self::new(number)
    }
}

/// An ordered, non-empty list of channels to sweep.
///
/// Duplicates are kept: revisiting busy channels within one sweep is a
/// legitimate pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelList(Vec<Channel>);

impl ChannelList {
    /// Create a channel list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChannelList`] if `channels` is empty.
    pub fn new(channels: Vec<Channel>) -> Result<Self> {
        if channels.is_empty() {
            return Err(Error::InvalidChannelList {
                message: "at least one channel is required".to_string(),
            });
        }
        Ok(Self(channels))
    }

    /// Build a list from raw channel numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or any number is not a channel.
    pub fn from_numbers(numbers: &[u16]) -> Result<Self> {
        let channels = numbers
            .iter()
            .map(|&n| Channel::new(n))
            .collect::<Result<Vec<_>>>()?;
        Self::new(channels)
    }

    /// The channels in sweep order.
    #[must_use]
    pub fn as_slice(&self) -> &[Channel] {
        &self.0
    }

    /// Number of channels (duplicates included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the channels in sweep order.
    pub fn iter(&self) -> std::slice::Iter<'_, Channel> {
        self.0.iter()
    }

    /// Channel numbers in sweep order.
    #[must_use]
    pub fn numbers(&self) -> Vec<u16> {
        self.0.iter().map(|c| c.number()).collect()
    }
}

impl Default for ChannelList {
    fn default() -> Self {
        Self(DEFAULT_CHANNELS.iter().map(|&n| Channel(n)).collect())
    }
}

impl<'a> IntoIterator for &'a ChannelList {
    type Item = &'a Channel;
    type IntoIter = std::slice::Iter<'a, Channel>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ChannelList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{joined}")
    }
}

impl FromStr for ChannelList {
    type Err = Error;

    /// Parse a comma-separated list such as `1,6,11`.
    fn from_str(s: &str) -> Result<Self> {
        let channels = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Channel>>>()?;
        Self::new(channels)
    }
}
