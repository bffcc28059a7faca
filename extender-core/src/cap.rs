//! User charge cap handling.
//!
//! The cap lives in a single non-volatile byte: the percentage ceiling in the
//! low seven bits and the override flag in bit 7. Internally it is carried as
//! a structured [`ChargeCap`]; the raw byte only appears at the storage
//! boundary. The [`CapIntegrator`] owns the cached copy, the lazy first
//! fetch, and the translation into the sustain band consumed by the state
//! machine.

use bitflags::bitflags;
use core::fmt;

use crate::events::{EventRecorder, ExtenderEvent};
use crate::sustain::{
    ChargeControlMode, SUSTAIN_BAND_SPREAD, SustainActuator, SustainBand, UNMANAGED_CEILING,
};

/// Lowest ceiling the cap channel accepts.
pub const MIN_CAP_PERCENT: u8 = 20;

/// Floor applied to both sides of the user-derived band.
pub const CAP_BAND_FLOOR: u8 = 20;

const OVERRIDE_BIT: u8 = 0x80;
const VALUE_MASK: u8 = 0x7F;

/// Decoded form of the persisted cap byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChargeCap {
    value: u8,
    override_active: bool,
}

impl ChargeCap {
    /// Cap record meaning "no ceiling configured".
    pub const fn none() -> Self {
        Self {
            value: 0,
            override_active: false,
        }
    }

    /// Cap record holding a plain percentage ceiling.
    pub const fn limited(value: u8) -> Self {
        Self {
            value,
            override_active: false,
        }
    }

    /// Decodes the persisted byte, clamping the raw value to 0–100.
    pub const fn decode(raw: u8) -> Self {
        let value = raw & VALUE_MASK;
        Self {
            value: if value > 100 { 100 } else { value },
            override_active: raw & OVERRIDE_BIT != 0,
        }
    }

    /// Encodes the record back into the persisted byte layout.
    pub const fn encode(self) -> u8 {
        if self.override_active {
            self.value | OVERRIDE_BIT
        } else {
            self.value
        }
    }

    /// Configured ceiling percentage; zero when unset.
    pub const fn value(self) -> u8 {
        self.value
    }

    /// Returns `true` when the override flag is set.
    pub const fn override_active(self) -> bool {
        self.override_active
    }

    /// Returns `true` when no ceiling should be enforced.
    pub const fn unmanaged(self) -> bool {
        self.override_active || self.value == 0
    }
}

/// Single-byte non-volatile cell backing the cap.
pub trait CapStore {
    type Error;

    /// Reads the persisted byte.
    fn load(&mut self) -> Result<u8, Self::Error>;

    /// Writes the persisted byte.
    fn store(&mut self, raw: u8) -> Result<(), Self::Error>;
}

bitflags! {
    /// Sub-operations selected by the absolute-cap request mask. `OVERRIDE`
    /// deliberately shares its bit with the persisted override flag.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct ChargeLimitModes: u8 {
        const DISABLE = 0x01;
        const SET_LIMIT = 0x02;
        const GET_LIMIT = 0x08;
        const OVERRIDE = 0x80;
    }
}

/// Request arriving on the absolute-cap configuration channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChargeLimitRequest {
    pub modes: ChargeLimitModes,
    pub max_percentage: u8,
}

/// Failure reported by the cap channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CapRequestError {
    /// `SET_LIMIT` asked for a ceiling below [`MIN_CAP_PERCENT`]; the whole
    /// request is rejected before any state changes.
    BelowMinimum,
}

impl fmt::Display for CapRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapRequestError::BelowMinimum => {
                write!(f, "requested ceiling below {MIN_CAP_PERCENT} percent")
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AppliedState {
    Unmanaged,
    Band(u8),
}

/// Reconciles the user cap into sustain commands.
#[derive(Copy, Clone, Debug, Default)]
pub struct CapIntegrator {
    cached: Option<ChargeCap>,
    applied: Option<AppliedState>,
}

impl CapIntegrator {
    /// Creates an integrator that has not yet touched the store.
    pub const fn new() -> Self {
        Self {
            cached: None,
            applied: None,
        }
    }

    /// Returns the cached cap, `None` before the first fetch.
    pub const fn cached(&self) -> Option<ChargeCap> {
        self.cached
    }

    /// Ceiling the state machine should currently assume.
    pub fn sustain_ceiling(&self) -> u8 {
        match self.cached {
            Some(cap) if !cap.unmanaged() => cap.value(),
            _ => UNMANAGED_CEILING,
        }
    }

    /// Applies the cached cap to the actuator, fetching it from the store on
    /// the first call. Repeated calls with an unchanged cap are no-ops.
    pub fn reconcile<A, S, R>(&mut self, actuator: &mut A, store: &mut S, events: &mut R)
    where
        A: SustainActuator,
        S: CapStore,
        R: EventRecorder,
    {
        let cap = self.fetch(store, events);

        if cap.unmanaged() {
            if self.applied != Some(AppliedState::Unmanaged) {
                self.applied = Some(AppliedState::Unmanaged);
                actuator.sustain(SustainBand::Disengaged);
                actuator.set_control_mode(ChargeControlMode::Normal);
                events.record(ExtenderEvent::CapUnmanaged);
            }
            return;
        }

        if self.applied != Some(AppliedState::Band(cap.value())) {
            self.applied = Some(AppliedState::Band(cap.value()));
            let band = SustainBand::engaged(
                cap.value().saturating_sub(SUSTAIN_BAND_SPREAD).max(CAP_BAND_FLOOR),
                cap.value().max(CAP_BAND_FLOOR),
            );
            actuator.sustain(band);
            events.record(ExtenderEvent::CapApplied {
                cap: cap.value(),
                band,
            });
        }
    }

    /// Executes a cap-channel request: validates, mutates the cached record,
    /// persists every mutation, and answers `GET_LIMIT` with the encoded
    /// byte. The actuator side runs separately through
    /// [`CapIntegrator::reconcile`].
    pub fn apply_request<S, R>(
        &mut self,
        request: ChargeLimitRequest,
        store: &mut S,
        events: &mut R,
    ) -> Result<Option<u8>, CapRequestError>
    where
        S: CapStore,
        R: EventRecorder,
    {
        if request.modes.contains(ChargeLimitModes::SET_LIMIT)
            && request.max_percentage < MIN_CAP_PERCENT
        {
            return Err(CapRequestError::BelowMinimum);
        }

        let mut cap = self.fetch(store, events);
        let mut mutated = false;

        if request.modes.contains(ChargeLimitModes::DISABLE) {
            cap = ChargeCap::none();
            mutated = true;
        }

        if request.modes.contains(ChargeLimitModes::SET_LIMIT) {
            cap = ChargeCap::limited(request.max_percentage.min(100));
            mutated = true;
        }

        if request.modes.contains(ChargeLimitModes::OVERRIDE) {
            cap = ChargeCap {
                override_active: true,
                ..cap
            };
            mutated = true;
        }

        if mutated {
            self.cached = Some(cap);
            if store.store(cap.encode()).is_err() {
                events.record(ExtenderEvent::StoreFailed);
            }
        }

        if request.modes.contains(ChargeLimitModes::GET_LIMIT) {
            Ok(Some(cap.encode()))
        } else {
            Ok(None)
        }
    }

    fn fetch<S, R>(&mut self, store: &mut S, events: &mut R) -> ChargeCap
    where
        S: CapStore,
        R: EventRecorder,
    {
        if let Some(cap) = self.cached {
            return cap;
        }

        let cap = match store.load() {
            Ok(raw) => ChargeCap::decode(raw),
            Err(_) => {
                // An unreadable store degrades to "no management" rather than
                // failing the controller.
                events.record(ExtenderEvent::StoreFailed);
                ChargeCap::none()
            }
        };
        self.cached = Some(cap);
        cap
    }
}
