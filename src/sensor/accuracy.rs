//! Platform-reported sensor accuracy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reliability level reported by the platform sensor service.
///
/// Values mirror the platform's status constants, so raw integers coming
/// from a host adapter can be wrapped directly with [`Accuracy::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Accuracy(i32);

impl Accuracy {
    /// The sensor is not in contact with what it measures.
    pub const NO_CONTACT: Accuracy = Accuracy(-1);
    /// Values cannot be trusted.
    pub const UNRELIABLE: Accuracy = Accuracy(0);
    pub const LOW: Accuracy = Accuracy(1);
    pub const MEDIUM: Accuracy = Accuracy(2);
    pub const HIGH: Accuracy = Accuracy(3);

    pub fn from_raw(value: i32) -> Self {
        Self(value)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }

    /// Check whether readings at this accuracy may be reported to callers.
    pub fn is_reportable(&self) -> bool {
        *self >= Accuracy::MEDIUM
    }
}

impl Default for Accuracy {
    fn default() -> Self {
        Accuracy::UNRELIABLE
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Accuracy::NO_CONTACT => f.write_str("no_contact"),
            Accuracy::UNRELIABLE => f.write_str("unreliable"),
            Accuracy::LOW => f.write_str("low"),
            Accuracy::MEDIUM => f.write_str("medium"),
            Accuracy::HIGH => f.write_str("high"),
            Accuracy(other) => write!(f, "level-{}", other),
        }
    }
}

impl FromStr for Accuracy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_contact" | "no-contact" => Ok(Accuracy::NO_CONTACT),
            "unreliable" => Ok(Accuracy::UNRELIABLE),
            "low" => Ok(Accuracy::LOW),
            "medium" => Ok(Accuracy::MEDIUM),
            "high" => Ok(Accuracy::HIGH),
            other => other
                .parse::<i32>()
                .map(Accuracy)
                .map_err(|_| format!("unknown accuracy level: {}", s)),
        }
    }
}
