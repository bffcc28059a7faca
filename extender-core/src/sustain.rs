//! Abstraction over the battery sustainer hardware.
//!
//! The controller never talks to a charger directly; it emits a sustain band
//! (or the disengage sentinel) plus a charge-control mode through this trait
//! and lets the firmware translate those into register writes.

/// Width of the band derived from a single ceiling percentage: the floor sits
/// five points below the ceiling.
pub const SUSTAIN_BAND_SPREAD: u8 = 5;

/// Ceiling assumed when no user cap is configured.
pub const UNMANAGED_CEILING: u8 = 100;

/// Charge band enforced on the battery charger.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SustainBand {
    /// No band enforced; the charger runs its own termination logic.
    Disengaged,
    /// Hold the state of charge between `lower` and `upper` percent.
    Engaged { lower: u8, upper: u8 },
}

impl SustainBand {
    /// Builds an engaged band from a floor/ceiling pair.
    pub const fn engaged(lower: u8, upper: u8) -> Self {
        SustainBand::Engaged { lower, upper }
    }

    /// Returns `true` when a band is actively enforced.
    pub const fn is_engaged(self) -> bool {
        matches!(self, SustainBand::Engaged { .. })
    }
}

/// Charger operating mode commanded alongside the band.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChargeControlMode {
    Normal,
    Custom,
}

/// Upper bounds applied to a stage's band, on top of the user's own ceiling.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BandCap {
    pub lower: u8,
    pub upper: u8,
}

impl BandCap {
    pub const fn new(lower: u8, upper: u8) -> Self {
        Self { lower, upper }
    }

    /// Clamps a working floor/ceiling pair to this cap.
    ///
    /// Both sides take the literal minimum; nothing re-orders the pair when
    /// the inputs sit above the cap.
    pub fn clamp(self, lower: u8, upper: u8) -> SustainBand {
        SustainBand::engaged(lower.min(self.lower), upper.min(self.upper))
    }
}

/// Band cap for the mild stage.
pub const MILD_STAGE_CAP: BandCap = BandCap::new(90, 95);

/// Band cap for the deep stage; tighter and lower than mild.
pub const DEEP_STAGE_CAP: BandCap = BandCap::new(85, 87);

/// Interface to whatever enforces a charge band on hardware.
pub trait SustainActuator {
    /// Applies the requested band, or releases it when disengaged.
    fn sustain(&mut self, band: SustainBand);

    /// Switches the charger between its normal and custom control modes.
    fn set_control_mode(&mut self, mode: ChargeControlMode);
}

/// Sustain actuator that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSustainActuator;

impl NoopSustainActuator {
    /// Creates a new no-op actuator.
    pub const fn new() -> Self {
        Self
    }
}

impl SustainActuator for NoopSustainActuator {
    fn sustain(&mut self, _: SustainBand) {}

    fn set_control_mode(&mut self, _: ChargeControlMode) {}
}
