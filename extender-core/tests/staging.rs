//! End-to-end staging scenarios driven through the tick entry point.

mod common;

use core::time::Duration;

use common::{MockInstant, controller};
use extender_core::command::{EXTENDER_WRITE_CMD, ExtenderParams};
use extender_core::config::days;
use extender_core::events::{EventLog, ExtenderEvent};
use extender_core::extender::Stage;
use extender_core::sustain::{ChargeControlMode, SustainBand};

const DAY_SECS: u64 = 86_400;

#[test]
fn stages_engage_at_exactly_trigger_and_trigger_plus_two_days() {
    let mut extender = controller(0, true);
    let mut events = EventLog::<16>::new();

    extender.tick(MockInstant::secs(1), &mut events);
    assert_eq!(extender.stage(), Stage::Normal);
    // No cap configured: the integrator leaves the charger unmanaged.
    assert_eq!(extender.actuator().band, Some(SustainBand::Disengaged));

    extender.tick(MockInstant::secs(5 * DAY_SECS - 1), &mut events);
    assert_eq!(extender.stage(), Stage::Normal);

    extender.tick(MockInstant::secs(5 * DAY_SECS), &mut events);
    assert_eq!(extender.stage(), Stage::Mild);
    assert_eq!(extender.actuator().band, Some(SustainBand::engaged(90, 95)));

    extender.tick(MockInstant::secs(7 * DAY_SECS - 1), &mut events);
    assert_eq!(extender.stage(), Stage::Mild);

    extender.tick(MockInstant::secs(7 * DAY_SECS), &mut events);
    assert_eq!(extender.stage(), Stage::Deep);
    assert_eq!(extender.actuator().band, Some(SustainBand::engaged(85, 87)));

    assert!(events.events().contains(&ExtenderEvent::StageEngaged {
        stage: Stage::Mild,
        band: SustainBand::engaged(90, 95),
    }));
    assert!(events.events().contains(&ExtenderEvent::StageEngaged {
        stage: Stage::Deep,
        band: SustainBand::engaged(85, 87),
    }));
}

#[test]
fn unplugging_for_the_reset_interval_restarts_the_cycle() {
    let mut extender = controller(0, true);
    let mut events = EventLog::<16>::new();

    // Reach the mild stage; the last plugged tick pushes the reset deadline
    // thirty minutes past it.
    extender.tick(MockInstant::secs(5 * DAY_SECS), &mut events);
    assert_eq!(extender.stage(), Stage::Mild);

    extender.power_mut().present = false;

    let just_before = MockInstant::secs(5 * DAY_SECS + 30 * 60 - 1);
    extender.tick(just_before, &mut events);
    assert_eq!(extender.stage(), Stage::Mild);

    let reset_at = MockInstant::secs(5 * DAY_SECS + 30 * 60);
    extender.tick(reset_at, &mut events);
    assert_eq!(extender.stage(), Stage::Normal);
    assert_eq!(extender.actuator().band, Some(SustainBand::Disengaged));
    assert_eq!(extender.actuator().mode, Some(ChargeControlMode::Normal));
    assert!(events.events().contains(&ExtenderEvent::CycleReset));

    // Deadlines reseed from the reset instant.
    let status = extender.console_status(reset_at);
    assert_eq!(status.stage1_remaining, Some(days(5)));
    assert_eq!(status.stage2_remaining, Some(days(7)));
}

#[test]
fn a_brief_unplug_does_not_reset_the_cycle() {
    let mut extender = controller(0, true);
    let mut events = EventLog::<16>::new();

    extender.tick(MockInstant::secs(5 * DAY_SECS), &mut events);
    assert_eq!(extender.stage(), Stage::Mild);

    // Ten minutes on battery, then power returns.
    extender.power_mut().present = false;
    extender.tick(MockInstant::secs(5 * DAY_SECS + 10 * 60), &mut events);
    extender.power_mut().present = true;
    extender.tick(MockInstant::secs(5 * DAY_SECS + 10 * 60 + 1), &mut events);

    // The original reset deadline has long passed; the push kept it ahead.
    extender.tick(MockInstant::secs(5 * DAY_SECS + 40 * 60), &mut events);
    assert_eq!(extender.stage(), Stage::Mild);
    assert!(!events.events().contains(&ExtenderEvent::CycleReset));
}

#[test]
fn disable_mid_cycle_forces_normal_and_reenable_reseeds() {
    let mut extender = controller(0, true);
    let mut events = EventLog::<16>::new();

    extender.tick(MockInstant::secs(5 * DAY_SECS), &mut events);
    assert_eq!(extender.stage(), Stage::Mild);

    let disable_at = MockInstant::secs(5 * DAY_SECS + 5);
    let write = ExtenderParams {
        cmd: EXTENDER_WRITE_CMD,
        disable: true,
        ..ExtenderParams::default()
    };
    extender.handle_extender_command(&write, disable_at).unwrap();

    assert_eq!(extender.stage(), Stage::Normal);
    assert_eq!(extender.actuator().band, Some(SustainBand::Disengaged));
    assert_eq!(extender.actuator().mode, Some(ChargeControlMode::Normal));

    // The deep deadline that was about to fire stays dead.
    extender.tick(MockInstant::secs(7 * DAY_SECS + 1), &mut events);
    assert_eq!(extender.stage(), Stage::Normal);

    let enable_at = MockInstant::secs(8 * DAY_SECS);
    let write = ExtenderParams {
        cmd: EXTENDER_WRITE_CMD,
        disable: false,
        ..ExtenderParams::default()
    };
    extender.handle_extender_command(&write, enable_at).unwrap();

    let status = extender.status(enable_at);
    assert_eq!(status.trigger_remaining, days(5));
    assert_eq!(status.reset_remaining, Duration::from_secs(30 * 60));
}

#[test]
fn one_day_trigger_with_no_cap_pins_the_unmanaged_interaction() {
    let mut extender = controller(0, true);
    let mut events = EventLog::<16>::new();

    let write = ExtenderParams {
        cmd: EXTENDER_WRITE_CMD,
        trigger_days: 1,
        reset_minutes: 1,
        disable: false,
    };
    extender
        .handle_extender_command(&write, MockInstant::secs(0))
        .unwrap();

    extender.tick(MockInstant::secs(1), &mut events);
    assert_eq!(extender.actuator().band, Some(SustainBand::Disengaged));

    extender.tick(MockInstant::secs(DAY_SECS - 1), &mut events);
    assert_eq!(extender.stage(), Stage::Normal);

    // With no cap the seeded 100/100 target degenerates to the plain stage
    // caps once the mild stage engages.
    extender.tick(MockInstant::secs(DAY_SECS), &mut events);
    assert_eq!(extender.stage(), Stage::Mild);
    assert_eq!(extender.actuator().band, Some(SustainBand::engaged(90, 95)));
}

#[test]
fn override_bit_keeps_the_charger_unmanaged_across_staging() {
    let mut extender = controller(0x80 | 90, true);
    let mut events = EventLog::<16>::new();

    extender.tick(MockInstant::secs(1), &mut events);
    assert_eq!(extender.actuator().band, Some(SustainBand::Disengaged));
    assert_eq!(extender.actuator().mode, Some(ChargeControlMode::Normal));
    assert!(events.events().contains(&ExtenderEvent::CapUnmanaged));

    // Stage transitions still command their bands, but the control mode is
    // never switched away from normal.
    extender.tick(MockInstant::secs(5 * DAY_SECS), &mut events);
    assert_eq!(extender.stage(), Stage::Mild);
    assert_eq!(extender.actuator().band, Some(SustainBand::engaged(90, 95)));
    assert_eq!(extender.actuator().mode, Some(ChargeControlMode::Normal));
}

#[test]
fn factory_mode_halts_staging_until_cleared() {
    let mut extender = controller(0, true);
    let mut events = EventLog::<16>::new();

    extender.tick(MockInstant::secs(1), &mut events);
    extender.power_mut().factory = true;
    extender.tick(MockInstant::secs(2), &mut events);
    assert!(events.events().contains(&ExtenderEvent::Halted));

    // Way past the original trigger: nothing fires while factory mode holds.
    extender.tick(MockInstant::secs(6 * DAY_SECS), &mut events);
    assert_eq!(extender.stage(), Stage::Normal);

    // Clearing factory mode leaves the deadlines unset; staging stays off
    // until a configuration write re-arms it.
    extender.power_mut().factory = false;
    extender.tick(MockInstant::secs(6 * DAY_SECS + 1), &mut events);
    assert_eq!(extender.stage(), Stage::Normal);
    assert_eq!(
        extender
            .console_status(MockInstant::secs(6 * DAY_SECS + 1))
            .stage1_remaining,
        None
    );
}
