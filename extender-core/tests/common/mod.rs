#![allow(dead_code)]

//! Shared doubles for the integration suites.

use core::ops::Add;
use core::time::Duration;

use extender_core::cap::CapStore;
use extender_core::extender::{ChargeExtender, PowerMonitor, TickInstant};
use extender_core::sustain::{ChargeControlMode, SustainActuator, SustainBand};

/// Monotonic microsecond counter standing in for the platform clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(pub u64);

impl MockInstant {
    pub fn micros(value: u64) -> Self {
        Self(value)
    }

    pub fn secs(value: u64) -> Self {
        Self(value * 1_000_000)
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.as_micros() as u64)
    }
}

impl TickInstant for MockInstant {
    fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

/// Externally controllable power signals.
pub struct TestPower {
    pub present: bool,
    pub factory: bool,
}

impl PowerMonitor for TestPower {
    fn external_power_present(&mut self) -> bool {
        self.present
    }

    fn factory_mode_active(&mut self) -> bool {
        self.factory
    }
}

/// Actuator double keeping the full command history.
#[derive(Default)]
pub struct RecordingActuator {
    pub band: Option<SustainBand>,
    pub mode: Option<ChargeControlMode>,
    pub band_commands: Vec<SustainBand>,
}

impl SustainActuator for RecordingActuator {
    fn sustain(&mut self, band: SustainBand) {
        self.band = Some(band);
        self.band_commands.push(band);
    }

    fn set_control_mode(&mut self, mode: ChargeControlMode) {
        self.mode = Some(mode);
    }
}

/// In-memory single-byte store with a programmable failure mode.
pub struct MemStore {
    pub byte: Result<u8, ()>,
    pub writes: Vec<u8>,
}

impl MemStore {
    pub fn holding(byte: u8) -> Self {
        Self {
            byte: Ok(byte),
            writes: Vec::new(),
        }
    }

    pub fn broken() -> Self {
        Self {
            byte: Err(()),
            writes: Vec::new(),
        }
    }
}

impl CapStore for MemStore {
    type Error = ();

    fn load(&mut self) -> Result<u8, ()> {
        self.byte
    }

    fn store(&mut self, raw: u8) -> Result<(), ()> {
        self.writes.push(raw);
        self.byte = Ok(raw);
        Ok(())
    }
}

pub type TestExtender = ChargeExtender<MockInstant, TestPower, RecordingActuator, MemStore>;

/// Controller started at t=0 with the supplied persisted cap byte.
pub fn controller(cap_byte: u8, plugged: bool) -> TestExtender {
    ChargeExtender::new(
        TestPower {
            present: plugged,
            factory: false,
        },
        RecordingActuator::default(),
        MemStore::holding(cap_byte),
        MockInstant::secs(0),
    )
}
