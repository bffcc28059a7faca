//! Board bindings for the charge controller.
//!
//! The sustain actuator talks to the smart-battery charger over I2C1, the
//! persisted cap byte lives in an FRAM on I2C2, and external power presence
//! plus the factory-mode strap arrive on plain GPIO inputs. Bus failures are
//! logged and swallowed: charge limiting is a best-effort longevity feature,
//! never worth wedging the EC over.

use embassy_stm32::gpio::Input;
use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;

use extender_core::cap::CapStore;
use extender_core::extender::PowerMonitor;
use extender_core::sustain::{ChargeControlMode, SustainActuator, SustainBand};

use crate::charge::controller::ChargeController;

/// SMBus address of the smart-battery charger.
const CHARGER_ADDR: u8 = 0x09;

/// Charger register selecting normal vs. host-driven charge behavior.
const REG_CHARGE_MODE: u8 = 0x12;

/// Charger register taking the sustain floor/ceiling pair, in percent.
const REG_SUSTAIN_BAND: u8 = 0x3E;

/// Value written to both band bytes to release the sustainer.
const SUSTAIN_RELEASED: u8 = 0xFF;

const MODE_NORMAL: u8 = 0x00;
const MODE_CUSTOM: u8 = 0x01;

/// I2C address of the FRAM holding the persisted cap byte.
const FRAM_ADDR: u8 = 0x50;

/// Offset of the cap byte within the FRAM.
const CAP_BYTE_OFFSET: u8 = 0x00;

/// Controller fully bound to this board's hardware.
pub type HardwareController =
    ChargeController<AcPowerInputs<'static>, ChargerPort<'static>, FramCapStore<'static>>;

/// External power and factory-strap sampling.
pub struct AcPowerInputs<'d> {
    ac_present: Input<'d>,
    factory_strap: Input<'d>,
}

impl<'d> AcPowerInputs<'d> {
    pub fn new(ac_present: Input<'d>, factory_strap: Input<'d>) -> Self {
        Self {
            ac_present,
            factory_strap,
        }
    }
}

impl<'d> PowerMonitor for AcPowerInputs<'d> {
    fn external_power_present(&mut self) -> bool {
        self.ac_present.is_high()
    }

    fn factory_mode_active(&mut self) -> bool {
        // The factory fixture pulls the strap low.
        self.factory_strap.is_low()
    }
}

/// Sustain actuator writing the charger's band registers.
pub struct ChargerPort<'d> {
    bus: I2c<'d, Blocking>,
}

impl<'d> ChargerPort<'d> {
    pub fn new(bus: I2c<'d, Blocking>) -> Self {
        Self { bus }
    }
}

impl<'d> SustainActuator for ChargerPort<'d> {
    fn sustain(&mut self, band: SustainBand) {
        let (lower, upper) = match band {
            SustainBand::Engaged { lower, upper } => (lower, upper),
            SustainBand::Disengaged => (SUSTAIN_RELEASED, SUSTAIN_RELEASED),
        };

        if self
            .bus
            .blocking_write(CHARGER_ADDR, &[REG_SUSTAIN_BAND, lower, upper])
            .is_err()
        {
            defmt::warn!("charger: sustain band write failed");
        }
    }

    fn set_control_mode(&mut self, mode: ChargeControlMode) {
        let value = match mode {
            ChargeControlMode::Normal => MODE_NORMAL,
            ChargeControlMode::Custom => MODE_CUSTOM,
        };

        if self
            .bus
            .blocking_write(CHARGER_ADDR, &[REG_CHARGE_MODE, value])
            .is_err()
        {
            defmt::warn!("charger: control mode write failed");
        }
    }
}

/// Single-byte cap cell in the external FRAM.
pub struct FramCapStore<'d> {
    bus: I2c<'d, Blocking>,
}

impl<'d> FramCapStore<'d> {
    pub fn new(bus: I2c<'d, Blocking>) -> Self {
        Self { bus }
    }
}

impl<'d> CapStore for FramCapStore<'d> {
    type Error = embassy_stm32::i2c::Error;

    fn load(&mut self) -> Result<u8, Self::Error> {
        let mut byte = [0u8; 1];
        self.bus
            .blocking_write_read(FRAM_ADDR, &[CAP_BYTE_OFFSET], &mut byte)?;
        Ok(byte[0])
    }

    fn store(&mut self, raw: u8) -> Result<(), Self::Error> {
        self.bus.blocking_write(FRAM_ADDR, &[CAP_BYTE_OFFSET, raw])
    }
}
