//! Ambient temperature sensor session.
//!
//! This module holds the subscription lifecycle state machine together with
//! the platform contracts it consumes: the sensor registry, the listener
//! callbacks, a one-shot timer and a wall clock.

mod accuracy;
mod clock;
mod service;
mod session;
mod status;
mod timer;

pub use accuracy::Accuracy;
pub use clock::{Clock, SystemClock};
pub use service::{SamplingRate, SensorInfo, SensorKind, SensorListener, SensorService};
pub use session::{
    Reading, SensorSession, SessionOptions, SupersedePolicy, DEFAULT_START_TIMEOUT,
};
pub use status::SensorStatus;
pub use timer::{SessionEpoch, TimerHandle, TimerService};
