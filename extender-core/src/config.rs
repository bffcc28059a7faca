//! Mutable configuration for the charge extender.
//!
//! The intervals are stored as plain [`Duration`]s; the host configuration
//! protocol speaks whole days and whole minutes, so the wire-facing setters
//! validate against those ranges while the console-facing setters accept any
//! duration (including zero, the "disarmed" sentinel).

use core::ops::RangeInclusive;
use core::time::Duration;

pub const SECS_PER_MINUTE: u64 = 60;
pub const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
pub const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Builds a duration from a whole number of days.
pub const fn days(count: u64) -> Duration {
    Duration::from_secs(count * SECS_PER_DAY)
}

/// Builds a duration from a whole number of minutes.
pub const fn minutes(count: u64) -> Duration {
    Duration::from_secs(count * SECS_PER_MINUTE)
}

/// Default staging trigger: five days of continuous external power.
pub const DEFAULT_TRIGGER_DAYS: u16 = 5;

/// Default reset interval: thirty minutes off external power.
pub const DEFAULT_RESET_MINUTES: u16 = 30;

/// Trigger interval values the host write command accepts, in days.
pub const TRIGGER_DAYS_RANGE: RangeInclusive<u16> = 1..=99;

/// Reset interval values the host write command accepts, in minutes.
pub const RESET_MINUTES_RANGE: RangeInclusive<u16> = 1..=9999;

/// Fixed gap between the mild-stage and deep-stage deadlines.
pub const STAGE2_EXTRA: Duration = days(2);

/// Delay before a changed sustain target is re-applied to an already staged
/// controller.
pub const REAPPLY_DEBOUNCE: Duration = Duration::from_secs(5);

/// Runtime-adjustable parameters of the extender state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ExtenderConfig {
    trigger_interval: Duration,
    reset_interval: Duration,
    disabled: bool,
}

impl ExtenderConfig {
    /// Creates a configuration holding the factory defaults.
    pub const fn new() -> Self {
        Self {
            trigger_interval: days(DEFAULT_TRIGGER_DAYS as u64),
            reset_interval: minutes(DEFAULT_RESET_MINUTES as u64),
            disabled: false,
        }
    }

    /// Time on external power before the mild stage engages. Zero means the
    /// staging timers are disarmed.
    pub const fn trigger_interval(&self) -> Duration {
        self.trigger_interval
    }

    /// Time off external power before the controller resets to normal. Zero
    /// means the reset timer is disarmed.
    pub const fn reset_interval(&self) -> Duration {
        self.reset_interval
    }

    /// Returns `true` when the whole controller is inert.
    pub const fn disabled(&self) -> bool {
        self.disabled
    }

    /// Trigger interval rounded down to whole days for the read response.
    pub fn trigger_days(&self) -> u16 {
        whole_units(self.trigger_interval, SECS_PER_DAY)
    }

    /// Reset interval rounded down to whole minutes for the read response.
    pub fn reset_minutes(&self) -> u16 {
        whole_units(self.reset_interval, SECS_PER_MINUTE)
    }

    /// Applies a host-requested trigger interval.
    ///
    /// Out-of-range and unchanged values are silently ignored. Returns `true`
    /// when the interval actually changed, in which case the caller must
    /// reseed the staging deadlines.
    pub fn request_trigger_days(&mut self, requested: u16) -> bool {
        if !TRIGGER_DAYS_RANGE.contains(&requested) || requested == self.trigger_days() {
            return false;
        }
        self.trigger_interval = days(requested as u64);
        true
    }

    /// Applies a host-requested reset interval; same ignore-on-invalid policy
    /// as [`ExtenderConfig::request_trigger_days`].
    pub fn request_reset_minutes(&mut self, requested: u16) -> bool {
        if !RESET_MINUTES_RANGE.contains(&requested) || requested == self.reset_minutes() {
            return false;
        }
        self.reset_interval = minutes(requested as u64);
        true
    }

    /// Flips the disabled flag. Returns `true` when the flag changed.
    pub fn set_disabled(&mut self, disabled: bool) -> bool {
        if self.disabled == disabled {
            return false;
        }
        self.disabled = disabled;
        true
    }

    /// Console-facing raw setter; accepts any duration, zero included.
    pub fn set_trigger_interval(&mut self, interval: Duration) {
        self.trigger_interval = interval;
    }

    /// Console-facing raw setter; accepts any duration, zero included.
    pub fn set_reset_interval(&mut self, interval: Duration) {
        self.reset_interval = interval;
    }
}

impl Default for ExtenderConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn whole_units(interval: Duration, unit_secs: u64) -> u16 {
    u16::try_from(interval.as_secs() / unit_secs).unwrap_or(u16::MAX)
}
