//! Charge-control surface bridging firmware tasks with `extender-core`.

#![allow(dead_code)]

pub mod controller;

use core::ops::Add;
use core::time::Duration as CoreDuration;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Duration, Instant};

use extender_core::cap::ChargeLimitRequest;
use extender_core::command::{ExtenderParams, HostCommandError};
use extender_core::console::{ConsoleCommand, ConsoleReply};
use extender_core::extender::{ExtenderStatus, TickInstant};

/// Depth of the request/reply queues shared between transports and the
/// controller task.
pub const REQUEST_QUEUE_DEPTH: usize = 4;

#[cfg(target_os = "none")]
type ChargeMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ChargeMutex = NoopRawMutex;

/// Monotonic timestamp driving the extender, backed by the Embassy clock.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    /// Samples the Embassy clock.
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Builds an instant from raw microseconds.
    pub const fn from_micros(micros: u64) -> Self {
        Self(Instant::from_micros(micros))
    }

    /// Unwraps to the Embassy instant.
    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

fn core_duration_to_embassy(duration: CoreDuration) -> Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

impl Add<CoreDuration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: CoreDuration) -> Self {
        Self(self.0 + core_duration_to_embassy(rhs))
    }
}

impl TickInstant for FirmwareInstant {
    fn saturating_duration_since(self, earlier: Self) -> CoreDuration {
        CoreDuration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }
}

/// Request delivered to the controller task by a transport.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControllerRequest {
    /// Extender configuration command (write/read).
    Extender(ExtenderParams),
    /// Absolute-cap channel command.
    ChargeLimit(ChargeLimitRequest),
    /// Debug-console verb.
    Console(ConsoleCommand),
}

/// Reply produced by the controller task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControllerReply {
    Ack,
    Status(ExtenderStatus),
    CapByte(u8),
    Console(ConsoleReply),
    Rejected(HostCommandError),
}

/// Queue carrying requests into the controller task.
pub type RequestQueue = Channel<ChargeMutex, ControllerRequest, REQUEST_QUEUE_DEPTH>;

/// Convenience sender type alias for the request queue.
pub type RequestSender<'a> = Sender<'a, ChargeMutex, ControllerRequest, REQUEST_QUEUE_DEPTH>;

/// Convenience receiver type alias for the request queue.
pub type RequestReceiver<'a> = Receiver<'a, ChargeMutex, ControllerRequest, REQUEST_QUEUE_DEPTH>;

/// Queue carrying replies back to the requesting transport.
pub type ReplyQueue = Channel<ChargeMutex, ControllerReply, REQUEST_QUEUE_DEPTH>;

/// Convenience sender type alias for the reply queue.
pub type ReplySender<'a> = Sender<'a, ChargeMutex, ControllerReply, REQUEST_QUEUE_DEPTH>;

/// Convenience receiver type alias for the reply queue.
pub type ReplyReceiver<'a> = Receiver<'a, ChargeMutex, ControllerReply, REQUEST_QUEUE_DEPTH>;
