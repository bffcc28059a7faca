//! Host configuration surface.
//!
//! The transport that frames, versions, and delivers these requests lives
//! outside this crate; only the parameter/response records and the dispatch
//! semantics are defined here. Both operations run to completion without
//! interleaving with a tick — the host environment serializes them onto the
//! controller's logical thread of control.

use core::fmt;

use crate::cap::{CapRequestError, CapStore, ChargeLimitRequest};
use crate::events::EventRecorder;
use crate::extender::{ChargeExtender, ExtenderStatus, PowerMonitor, Stage, TickInstant};
use crate::sustain::SustainActuator;

/// Write discriminator of the extender command.
pub const EXTENDER_WRITE_CMD: u8 = 0;

/// Read discriminator of the extender command.
pub const EXTENDER_READ_CMD: u8 = 1;

/// Wire parameters of the extender configuration command.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ExtenderParams {
    pub disable: bool,
    /// 0 = no change requested, 1–99 = new trigger interval in days.
    pub trigger_days: u8,
    /// 0 = no change requested, 1–9999 = new reset interval in minutes.
    pub reset_minutes: u16,
    /// Selects write (0) or read (1) semantics.
    pub cmd: u8,
}

/// Errors reported back to the host.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostCommandError {
    /// The command discriminator was not recognized; nothing was mutated.
    UnknownCommand,
    /// The cap channel rejected the requested ceiling.
    CapBelowMinimum,
}

impl fmt::Display for HostCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCommandError::UnknownCommand => write!(f, "unrecognized command selector"),
            HostCommandError::CapBelowMinimum => write!(f, "charge cap below minimum"),
        }
    }
}

impl From<CapRequestError> for HostCommandError {
    fn from(error: CapRequestError) -> Self {
        match error {
            CapRequestError::BelowMinimum => HostCommandError::CapBelowMinimum,
        }
    }
}

impl<I, P, A, S> ChargeExtender<I, P, A, S>
where
    I: TickInstant,
    P: PowerMonitor,
    A: SustainActuator,
    S: CapStore,
{
    /// Dispatches the extender configuration command.
    ///
    /// A write applies each valid field independently — an out-of-range
    /// interval is ignored without failing the rest of the request. A read
    /// returns the current snapshot and mutates nothing.
    pub fn handle_extender_command(
        &mut self,
        params: &ExtenderParams,
        now: I,
    ) -> Result<Option<ExtenderStatus>, HostCommandError> {
        match params.cmd {
            EXTENDER_WRITE_CMD => {
                self.request_trigger_days(params.trigger_days, now);
                self.request_reset_minutes(params.reset_minutes, now);
                self.set_disabled(params.disable, now);
                Ok(None)
            }
            EXTENDER_READ_CMD => Ok(Some(self.status(now))),
            _ => Err(HostCommandError::UnknownCommand),
        }
    }

    /// Dispatches a request on the absolute-cap channel.
    ///
    /// Mutations persist immediately. The actuator side is re-applied right
    /// away only while the controller sits in the normal stage; a staged
    /// controller picks the change up through the debounced tick path.
    pub fn handle_charge_limit_command<R: EventRecorder>(
        &mut self,
        request: ChargeLimitRequest,
        events: &mut R,
    ) -> Result<Option<u8>, HostCommandError> {
        let response = self.cap.apply_request(request, &mut self.store, events)?;
        if self.stage == Stage::Normal {
            self.cap
                .reconcile(&mut self.actuator, &mut self.store, events);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cap::ChargeLimitModes;
    use crate::events::NoopRecorder;
    use crate::extender::NoopPowerMonitor;
    use crate::sustain::NoopSustainActuator;
    use core::ops::Add;
    use core::time::Duration;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

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

    struct MemStore(u8);

    impl CapStore for MemStore {
        type Error = ();

        fn load(&mut self) -> Result<u8, ()> {
            Ok(self.0)
        }

        fn store(&mut self, raw: u8) -> Result<(), ()> {
            self.0 = raw;
            Ok(())
        }
    }

    fn controller()
    -> ChargeExtender<MockInstant, NoopPowerMonitor, NoopSustainActuator, MemStore> {
        ChargeExtender::new(
            NoopPowerMonitor::new(),
            NoopSustainActuator::new(),
            MemStore(0),
            MockInstant(0),
        )
    }

    #[test]
    fn unknown_discriminator_is_a_parameter_error() {
        let mut extender = controller();
        let params = ExtenderParams {
            cmd: 7,
            ..ExtenderParams::default()
        };
        let before = extender.status(MockInstant(0));

        let result = extender.handle_extender_command(&params, MockInstant(0));

        assert_eq!(result, Err(HostCommandError::UnknownCommand));
        assert_eq!(extender.status(MockInstant(0)), before);
    }

    #[test]
    fn read_reports_configuration_without_side_effects() {
        let mut extender = controller();
        let params = ExtenderParams {
            cmd: EXTENDER_READ_CMD,
            ..ExtenderParams::default()
        };

        let first = extender
            .handle_extender_command(&params, MockInstant(0))
            .unwrap()
            .unwrap();
        let second = extender
            .handle_extender_command(&params, MockInstant(0))
            .unwrap()
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.trigger_days, 5);
        assert_eq!(first.reset_minutes, 30);
    }

    #[test]
    fn cap_error_maps_to_host_error() {
        let mut extender = controller();
        let request = ChargeLimitRequest {
            modes: ChargeLimitModes::SET_LIMIT,
            max_percentage: 10,
        };

        let result =
            extender.handle_charge_limit_command(request, &mut NoopRecorder::new());

        assert_eq!(result, Err(HostCommandError::CapBelowMinimum));
    }
}
