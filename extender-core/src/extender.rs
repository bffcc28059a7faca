//! Staged charge-extender state machine.
//!
//! A timestamp-driven finite-state machine evaluated once per second. The
//! longer the device stays on external power, the lower the enforced charge
//! band drops (normal → mild → deep); a sustained stretch off external power
//! resets the cycle. Everything here is deterministic and bounded: one "now"
//! sample per tick, integer comparisons, and at most one actuator band
//! command.

use core::ops::Add;
use core::time::Duration;

use crate::cap::{CapIntegrator, CapStore, ChargeCap};
use crate::config::{ExtenderConfig, REAPPLY_DEBOUNCE, STAGE2_EXTRA};
use crate::events::{EventRecorder, ExtenderEvent};
use crate::sustain::{
    ChargeControlMode, DEEP_STAGE_CAP, MILD_STAGE_CAP, SUSTAIN_BAND_SPREAD, SustainActuator,
    SustainBand, UNMANAGED_CEILING,
};

/// Monotonic timestamp consumed by the state machine.
///
/// Firmware binds this to the Embassy clock, the emulator to a simulated
/// counter, and tests to a plain integer wrapper.
pub trait TickInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Duration elapsed from `earlier` to `self`; zero when `earlier` is not
    /// in the past.
    fn saturating_duration_since(self, earlier: Self) -> Duration;
}

/// Charge-limiting aggressiveness level.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Stage {
    Normal,
    Mild,
    Deep,
}

impl Stage {
    /// Wire ordinal reported by the read command.
    pub const fn ordinal(self) -> u8 {
        match self {
            Stage::Normal => 0,
            Stage::Mild => 1,
            Stage::Deep => 2,
        }
    }
}

/// Platform power signals sampled once per tick.
pub trait PowerMonitor {
    /// Reports whether external power is currently attached.
    fn external_power_present(&mut self) -> bool;

    /// Reports whether the unit runs in factory/test mode, which suspends
    /// all staging.
    fn factory_mode_active(&mut self) -> bool {
        false
    }
}

/// Monitor reporting no external power and no factory mode.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopPowerMonitor;

impl NoopPowerMonitor {
    /// Creates a new no-op monitor.
    pub const fn new() -> Self {
        Self
    }
}

impl PowerMonitor for NoopPowerMonitor {
    fn external_power_present(&mut self) -> bool {
        false
    }
}

/// Snapshot answering the host read command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ExtenderStatus {
    pub current_stage: Stage,
    pub disabled: bool,
    /// Time until the mild stage engages; zero when unarmed or expired.
    pub trigger_remaining: Duration,
    pub trigger_days: u16,
    /// Time until the cycle resets; zero when unarmed or expired.
    pub reset_remaining: Duration,
    pub reset_minutes: u16,
}

/// Full snapshot for the debug console.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConsoleStatus {
    pub disabled: bool,
    pub stage: Stage,
    pub trigger_interval: Duration,
    pub reset_interval: Duration,
    pub stage1_remaining: Option<Duration>,
    pub stage2_remaining: Option<Duration>,
    pub reset_remaining: Option<Duration>,
    pub sustain_lower: u8,
    pub sustain_upper: u8,
    pub cap: Option<ChargeCap>,
}

/// The staged charge-limit controller.
///
/// Owns its configuration, the live deadlines, the cached sustain target,
/// the cap integrator, and the platform collaborators. The host environment
/// must serialize calls to [`ChargeExtender::tick`] and the configuration
/// entry points; the controller itself never blocks and never spawns work.
pub struct ChargeExtender<I, P, A, S> {
    pub(crate) config: ExtenderConfig,
    pub(crate) stage: Stage,
    pub(crate) stage1_deadline: Option<I>,
    pub(crate) stage2_deadline: Option<I>,
    pub(crate) reset_deadline: Option<I>,
    pub(crate) sustain_lower: u8,
    pub(crate) sustain_upper: u8,
    pub(crate) cap: CapIntegrator,
    pub(crate) power: P,
    pub(crate) actuator: A,
    pub(crate) store: S,
}

impl<I, P, A, S> ChargeExtender<I, P, A, S>
where
    I: TickInstant,
    P: PowerMonitor,
    A: SustainActuator,
    S: CapStore,
{
    /// Creates a controller with default configuration, staging deadlines
    /// seeded from `now`.
    pub fn new(power: P, actuator: A, store: S, now: I) -> Self {
        Self::with_config(ExtenderConfig::new(), power, actuator, store, now)
    }

    /// Creates a controller with the supplied configuration.
    pub fn with_config(config: ExtenderConfig, power: P, actuator: A, store: S, now: I) -> Self {
        let mut extender = Self {
            config,
            stage: Stage::Normal,
            stage1_deadline: None,
            stage2_deadline: None,
            reset_deadline: None,
            sustain_lower: UNMANAGED_CEILING,
            sustain_upper: UNMANAGED_CEILING,
            cap: CapIntegrator::new(),
            power,
            actuator,
            store,
        };
        extender.arm_stage_deadlines(now);
        extender
    }

    /// Returns the current stage.
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &ExtenderConfig {
        &self.config
    }

    /// Returns the cap integrator state.
    pub fn cap(&self) -> &CapIntegrator {
        &self.cap
    }

    /// Returns the sustain actuator.
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Mutably accesses the sustain actuator.
    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    /// Mutably accesses the power monitor.
    pub fn power_mut(&mut self) -> &mut P {
        &mut self.power
    }

    /// Mutably accesses the cap store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Once-per-second transition function.
    ///
    /// Evaluates, in fixed priority order: cap reconciliation (normal stage
    /// only), the disable/factory override, the reset-deadline push while on
    /// external power, sustain-target changes, reset expiry, and finally
    /// stage expiry (deep before mild — the deep deadline always sits at or
    /// past the mild one, and firing deep supersedes mild for the cycle).
    pub fn tick<R: EventRecorder>(&mut self, now: I, events: &mut R) {
        if self.stage == Stage::Normal {
            self.cap
                .reconcile(&mut self.actuator, &mut self.store, events);
        }

        if self.config.disabled() || self.power.factory_mode_active() {
            let was_active = self.stage != Stage::Normal
                || self.stage1_deadline.is_some()
                || self.stage2_deadline.is_some()
                || self.reset_deadline.is_some();
            self.stage = Stage::Normal;
            self.stage1_deadline = None;
            self.stage2_deadline = None;
            self.reset_deadline = None;
            if was_active {
                events.record(ExtenderEvent::Halted);
            }
            return;
        }

        if self.power.external_power_present() && !self.config.reset_interval().is_zero() {
            // Keeps retreating into the future for as long as power remains
            // connected; the controller can only reset once the charger stays
            // unplugged for the full interval.
            self.reset_deadline = Some(now + self.config.reset_interval());
        }

        let ceiling = self.cap.sustain_ceiling();
        if ceiling != self.sustain_upper {
            self.sustain_upper = ceiling;
            self.sustain_lower = ceiling.saturating_sub(SUSTAIN_BAND_SPREAD);
            // Already staged: collapse the matching deadline so the new band
            // is re-applied shortly instead of immediately.
            match self.stage {
                Stage::Mild => self.stage1_deadline = Some(now + REAPPLY_DEBOUNCE),
                Stage::Deep => self.stage2_deadline = Some(now + REAPPLY_DEBOUNCE),
                Stage::Normal => {}
            }
        }

        if let Some(deadline) = self.reset_deadline
            && now >= deadline
        {
            self.reset_deadline = None;
            self.stage = Stage::Normal;
            self.arm_stage_deadlines(now);
            self.actuator.sustain(SustainBand::Disengaged);
            self.actuator.set_control_mode(ChargeControlMode::Normal);
            events.record(ExtenderEvent::CycleReset);
            return;
        }

        if let Some(deadline) = self.stage2_deadline
            && now >= deadline
        {
            self.stage2_deadline = None;
            self.stage = Stage::Deep;
            let band = DEEP_STAGE_CAP.clamp(self.sustain_lower, self.sustain_upper);
            self.actuator.sustain(band);
            events.record(ExtenderEvent::StageEngaged {
                stage: Stage::Deep,
                band,
            });
        } else if let Some(deadline) = self.stage1_deadline
            && now >= deadline
        {
            self.stage1_deadline = None;
            self.stage = Stage::Mild;
            let band = MILD_STAGE_CAP.clamp(self.sustain_lower, self.sustain_upper);
            self.actuator.sustain(band);
            events.record(ExtenderEvent::StageEngaged {
                stage: Stage::Mild,
                band,
            });
        }
    }

    /// Applies a host-requested trigger interval; reseeds the staging
    /// deadlines when the interval actually changed.
    pub fn request_trigger_days(&mut self, days: u8, now: I) -> bool {
        if self.config.request_trigger_days(u16::from(days)) {
            self.arm_stage_deadlines(now);
            true
        } else {
            false
        }
    }

    /// Applies a host-requested reset interval; reseeds the reset deadline
    /// when the interval actually changed.
    pub fn request_reset_minutes(&mut self, minutes: u16, now: I) -> bool {
        if self.config.request_reset_minutes(minutes) {
            self.reset_deadline = Some(now + self.config.reset_interval());
            true
        } else {
            false
        }
    }

    /// Enables or disables the whole controller.
    ///
    /// Disabling releases the actuator and drops the live deadlines while
    /// keeping the configured intervals; enabling re-arms every deadline as
    /// if the controller had just started at `now`.
    pub fn set_disabled(&mut self, disabled: bool, now: I) -> bool {
        if !self.config.set_disabled(disabled) {
            return false;
        }

        if disabled {
            self.actuator.sustain(SustainBand::Disengaged);
            self.actuator.set_control_mode(ChargeControlMode::Normal);
            self.stage = Stage::Normal;
            self.stage1_deadline = None;
            self.stage2_deadline = None;
            self.reset_deadline = None;
        } else {
            self.arm_stage_deadlines(now);
            self.reset_deadline = if self.config.reset_interval().is_zero() {
                None
            } else {
                Some(now + self.config.reset_interval())
            };
        }
        true
    }

    /// Console override: replaces the trigger interval without touching the
    /// live deadlines.
    pub fn force_trigger_interval(&mut self, interval: Duration) {
        self.config.set_trigger_interval(interval);
    }

    /// Console override: replaces the reset interval without touching the
    /// live deadlines.
    pub fn force_reset_interval(&mut self, interval: Duration) {
        self.config.set_reset_interval(interval);
    }

    /// Console override: forces the mild-stage deadline to `now + delay`.
    pub fn force_stage1_deadline(&mut self, delay: Duration, now: I) {
        self.stage1_deadline = Some(now + delay);
    }

    /// Console override: forces the deep-stage deadline to `now + delay`.
    pub fn force_stage2_deadline(&mut self, delay: Duration, now: I) {
        self.stage2_deadline = Some(now + delay);
    }

    /// Console override: forces the reset deadline to `now + delay`.
    pub fn force_reset_deadline(&mut self, delay: Duration, now: I) {
        self.reset_deadline = Some(now + delay);
    }

    /// Builds the host read response. Purely observational.
    pub fn status(&self, now: I) -> ExtenderStatus {
        ExtenderStatus {
            current_stage: self.stage,
            disabled: self.config.disabled(),
            trigger_remaining: remaining(self.stage1_deadline, now),
            trigger_days: self.config.trigger_days(),
            reset_remaining: remaining(self.reset_deadline, now),
            reset_minutes: self.config.reset_minutes(),
        }
    }

    /// Builds the console status snapshot. Purely observational.
    pub fn console_status(&self, now: I) -> ConsoleStatus {
        ConsoleStatus {
            disabled: self.config.disabled(),
            stage: self.stage,
            trigger_interval: self.config.trigger_interval(),
            reset_interval: self.config.reset_interval(),
            stage1_remaining: self.stage1_deadline.map(|d| d.saturating_duration_since(now)),
            stage2_remaining: self.stage2_deadline.map(|d| d.saturating_duration_since(now)),
            reset_remaining: self.reset_deadline.map(|d| d.saturating_duration_since(now)),
            sustain_lower: self.sustain_lower,
            sustain_upper: self.sustain_upper,
            cap: self.cap.cached(),
        }
    }

    fn arm_stage_deadlines(&mut self, now: I) {
        let trigger = self.config.trigger_interval();
        if trigger.is_zero() {
            self.stage1_deadline = None;
            self.stage2_deadline = None;
        } else {
            self.stage1_deadline = Some(now + trigger);
            self.stage2_deadline = Some(now + trigger + STAGE2_EXTRA);
        }
    }
}

fn remaining<I: TickInstant>(deadline: Option<I>, now: I) -> Duration {
    deadline.map_or(Duration::ZERO, |deadline| {
        deadline.saturating_duration_since(now)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::days;
    use crate::events::NoopRecorder;

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

    struct FixedPower {
        present: bool,
        factory: bool,
    }

    impl PowerMonitor for FixedPower {
        fn external_power_present(&mut self) -> bool {
            self.present
        }

        fn factory_mode_active(&mut self) -> bool {
            self.factory
        }
    }

    #[derive(Default)]
    struct RecordingActuator {
        band: Option<SustainBand>,
        mode: Option<ChargeControlMode>,
    }

    impl SustainActuator for RecordingActuator {
        fn sustain(&mut self, band: SustainBand) {
            self.band = Some(band);
        }

        fn set_control_mode(&mut self, mode: ChargeControlMode) {
            self.mode = Some(mode);
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

    fn controller(
        byte: u8,
        present: bool,
    ) -> ChargeExtender<MockInstant, FixedPower, RecordingActuator, MemStore> {
        ChargeExtender::new(
            FixedPower {
                present,
                factory: false,
            },
            RecordingActuator::default(),
            MemStore(byte),
            MockInstant(0),
        )
    }

    #[test]
    fn construction_arms_both_stage_deadlines() {
        let extender = controller(0, true);
        let status = extender.console_status(MockInstant(0));
        assert_eq!(status.stage1_remaining, Some(days(5)));
        assert_eq!(status.stage2_remaining, Some(days(7)));
        assert_eq!(status.reset_remaining, None);
    }

    #[test]
    fn cap_reconciliation_runs_even_while_disabled() {
        let mut extender = controller(80, true);
        extender.set_disabled(true, MockInstant(0));
        extender.tick(MockInstant(0), &mut NoopRecorder::new());
        // Stage management is halted but the user cap stays enforced.
        assert_eq!(
            extender.actuator().band,
            Some(SustainBand::engaged(75, 80))
        );
        assert_eq!(extender.stage(), Stage::Normal);
    }

    #[test]
    fn factory_mode_collapses_deadlines_without_touching_the_band() {
        let mut extender = controller(0, true);
        extender.tick(MockInstant(0), &mut NoopRecorder::new());
        extender.power_mut().factory = true;
        extender.tick(MockInstant(1), &mut NoopRecorder::new());

        let status = extender.console_status(MockInstant(1));
        assert_eq!(status.stage1_remaining, None);
        assert_eq!(status.stage2_remaining, None);
        assert_eq!(status.reset_remaining, None);
    }

    #[test]
    fn reset_deadline_retreats_while_plugged() {
        let mut extender = controller(0, true);
        extender.tick(MockInstant(0), &mut NoopRecorder::new());
        let first = extender.console_status(MockInstant(0)).reset_remaining;

        let later = MockInstant(0) + Duration::from_secs(60);
        extender.tick(later, &mut NoopRecorder::new());
        let second = extender.console_status(later).reset_remaining;

        assert_eq!(first, second);
    }

    #[test]
    fn zero_reset_interval_never_arms_the_reset_deadline() {
        let mut extender = controller(0, true);
        extender.force_reset_interval(Duration::ZERO);
        extender.tick(MockInstant(0), &mut NoopRecorder::new());
        assert_eq!(
            extender.console_status(MockInstant(0)).reset_remaining,
            None
        );
    }
}
