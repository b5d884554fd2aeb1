//! Callback identifier type.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for callback ID generation.
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one caller waiting on results from the plugin.
///
/// IDs come from an atomic counter and are unique within a process
/// lifetime. They are displayed as `cb-XXXXXXXX` in hexadecimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    /// Create a new unique callback ID.
    pub fn new() -> Self {
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Create a CallbackId from a raw u64 value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl Default for CallbackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb-{:08x}", self.0)
    }
}

impl FromStr for CallbackId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("cb-")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .map(CallbackId)
            .ok_or_else(|| format!("invalid callback id: {}", s))
    }
}
