//! Binds the core state machine to firmware logging and request servicing.

#![allow(dead_code)]

use extender_core::cap::CapStore;
use extender_core::events::{EventRecorder, ExtenderEvent};
use extender_core::extender::{ChargeExtender, PowerMonitor, Stage};
use extender_core::sustain::{SustainActuator, SustainBand};

use super::{ControllerReply, ControllerRequest, FirmwareInstant};

/// The core extender plus the firmware-side event mirror.
pub struct ChargeController<P, A, S> {
    extender: ChargeExtender<FirmwareInstant, P, A, S>,
}

impl<P, A, S> ChargeController<P, A, S>
where
    P: PowerMonitor,
    A: SustainActuator,
    S: CapStore,
{
    /// Creates a controller whose staging deadlines start at `now`.
    pub fn new(power: P, actuator: A, store: S, now: FirmwareInstant) -> Self {
        Self {
            extender: ChargeExtender::new(power, actuator, store, now),
        }
    }

    /// Returns the wrapped extender.
    pub fn extender(&self) -> &ChargeExtender<FirmwareInstant, P, A, S> {
        &self.extender
    }

    /// Runs one state-machine tick, mirroring events to the log.
    pub fn on_tick(&mut self, now: FirmwareInstant) {
        self.extender.tick(now, &mut LogRecorder);
    }

    /// Services one configuration request between ticks.
    pub fn on_request(&mut self, request: ControllerRequest, now: FirmwareInstant) -> ControllerReply {
        match request {
            ControllerRequest::Extender(params) => {
                match self.extender.handle_extender_command(&params, now) {
                    Ok(Some(status)) => ControllerReply::Status(status),
                    Ok(None) => ControllerReply::Ack,
                    Err(error) => ControllerReply::Rejected(error),
                }
            }
            ControllerRequest::ChargeLimit(request) => {
                match self
                    .extender
                    .handle_charge_limit_command(request, &mut LogRecorder)
                {
                    Ok(Some(byte)) => ControllerReply::CapByte(byte),
                    Ok(None) => ControllerReply::Ack,
                    Err(error) => ControllerReply::Rejected(error),
                }
            }
            ControllerRequest::Console(command) => {
                ControllerReply::Console(command.apply(&mut self.extender, now))
            }
        }
    }
}

struct LogRecorder;

impl EventRecorder for LogRecorder {
    fn record(&mut self, event: ExtenderEvent) {
        log_event(&event);
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Normal => "normal",
        Stage::Mild => "mild",
        Stage::Deep => "deep",
    }
}

#[cfg(target_os = "none")]
fn log_event(event: &ExtenderEvent) {
    match *event {
        ExtenderEvent::CapApplied { cap, band } => match band {
            SustainBand::Engaged { lower, upper } => {
                defmt::info!("extender: user cap {=u8}% -> band {=u8}-{=u8}", cap, lower, upper);
            }
            SustainBand::Disengaged => {
                defmt::info!("extender: user cap {=u8}% -> disengaged", cap);
            }
        },
        ExtenderEvent::CapUnmanaged => {
            defmt::info!("extender: no user cap, charger unmanaged");
        }
        ExtenderEvent::StageEngaged { stage, band } => match band {
            SustainBand::Engaged { lower, upper } => defmt::info!(
                "extender: stage {=str} engaged, band {=u8}-{=u8}",
                stage_label(stage),
                lower,
                upper
            ),
            SustainBand::Disengaged => {
                defmt::info!("extender: stage {=str} engaged", stage_label(stage));
            }
        },
        ExtenderEvent::CycleReset => {
            defmt::info!("extender: off external power long enough, cycle reset");
        }
        ExtenderEvent::Halted => {
            defmt::info!("extender: halted (disabled or factory mode)");
        }
        ExtenderEvent::StoreFailed => {
            defmt::warn!("extender: cap store access failed");
        }
    }
}

#[cfg(not(target_os = "none"))]
fn log_event(event: &ExtenderEvent) {
    match *event {
        ExtenderEvent::CapApplied { cap, band } => match band {
            SustainBand::Engaged { lower, upper } => {
                println!("extender: user cap {cap}% -> band {lower}-{upper}");
            }
            SustainBand::Disengaged => println!("extender: user cap {cap}% -> disengaged"),
        },
        ExtenderEvent::CapUnmanaged => println!("extender: no user cap, charger unmanaged"),
        ExtenderEvent::StageEngaged { stage, band } => match band {
            SustainBand::Engaged { lower, upper } => println!(
                "extender: stage {} engaged, band {lower}-{upper}",
                stage_label(stage)
            ),
            SustainBand::Disengaged => {
                println!("extender: stage {} engaged", stage_label(stage));
            }
        },
        ExtenderEvent::CycleReset => {
            println!("extender: off external power long enough, cycle reset");
        }
        ExtenderEvent::Halted => println!("extender: halted (disabled or factory mode)"),
        ExtenderEvent::StoreFailed => println!("extender: cap store access failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extender_core::cap::{ChargeLimitModes, ChargeLimitRequest};
    use extender_core::command::{EXTENDER_READ_CMD, ExtenderParams};
    use extender_core::console::{ConsoleCommand, ConsoleReply};
    use extender_core::extender::NoopPowerMonitor;
    use extender_core::sustain::NoopSustainActuator;

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

    fn controller() -> ChargeController<NoopPowerMonitor, NoopSustainActuator, MemStore> {
        ChargeController::new(
            NoopPowerMonitor::new(),
            NoopSustainActuator::new(),
            MemStore(0),
            FirmwareInstant::from_micros(0),
        )
    }

    #[test]
    fn read_request_yields_a_status_reply() {
        let mut controller = controller();
        let request = ControllerRequest::Extender(ExtenderParams {
            cmd: EXTENDER_READ_CMD,
            ..ExtenderParams::default()
        });

        let reply = controller.on_request(request, FirmwareInstant::from_micros(0));
        match reply {
            ControllerReply::Status(status) => {
                assert_eq!(status.trigger_days, 5);
                assert_eq!(status.reset_minutes, 30);
            }
            other => panic!("expected status reply, got {other:?}"),
        }
    }

    #[test]
    fn cap_query_round_trips_through_the_reply_queue_types() {
        let mut controller = controller();
        let request = ControllerRequest::ChargeLimit(ChargeLimitRequest {
            modes: ChargeLimitModes::SET_LIMIT | ChargeLimitModes::GET_LIMIT,
            max_percentage: 60,
        });

        let reply = controller.on_request(request, FirmwareInstant::from_micros(0));
        assert_eq!(reply, ControllerReply::CapByte(60));
    }

    #[test]
    fn console_status_travels_as_a_console_reply() {
        let mut controller = controller();
        let reply = controller.on_request(
            ControllerRequest::Console(ConsoleCommand::Status),
            FirmwareInstant::from_micros(0),
        );
        assert!(matches!(reply, ControllerReply::Console(ConsoleReply::Status(_))));
    }

    #[test]
    fn ticks_are_cheap_and_reentrant_on_the_host() {
        let mut controller = controller();
        for second in 1..=10 {
            controller.on_tick(FirmwareInstant::from_micros(second * 1_000_000));
        }
        assert_eq!(controller.extender().stage(), Stage::Normal);
    }
}
