// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wearable provider discriminator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Third-party wearable data source.
///
/// Every provider-dispatch site matches on this exhaustively, so adding a
/// provider fails to compile until each site handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Fitbit,
    Oura,
    GoogleFit,
}

impl Provider {
    /// All providers, in scheduling order.
    pub const ALL: [Provider; 3] = [Provider::Fitbit, Provider::Oura, Provider::GoogleFit];

    /// Storage/wire name of the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Fitbit => "fitbit",
            Provider::Oura => "oura",
            Provider::GoogleFit => "google_fit",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fitbit" => Ok(Provider::Fitbit),
            "oura" => Ok(Provider::Oura),
            "google_fit" => Ok(Provider::GoogleFit),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}
