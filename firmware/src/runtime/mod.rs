use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Pull};
use embassy_stm32::i2c::I2c;
use embassy_stm32::time::Hertz;
use embassy_sync::channel::Channel;

use crate::charge::{self, FirmwareInstant, ReplyQueue, RequestQueue};
use crate::hw::{AcPowerInputs, ChargerPort, FramCapStore};

mod console_task;
mod controller_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static REQUEST_QUEUE: RequestQueue = Channel::new();
pub(super) static REPLY_QUEUE: ReplyQueue = Channel::new();

const I2C_FREQ: Hertz = Hertz(100_000);

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA2,
        PA3,
        PA11,
        PA12,
        PB6,
        PB7,
        I2C1,
        I2C2,
        USART2,
        ..
    } = hal::init(config);

    let power = AcPowerInputs::new(Input::new(PA0, Pull::None), Input::new(PA1, Pull::Up));
    let charger = ChargerPort::new(I2c::new_blocking(
        I2C1,
        PB6,
        PB7,
        I2C_FREQ,
        Default::default(),
    ));
    let cap_store = FramCapStore::new(I2c::new_blocking(
        I2C2,
        PA11,
        PA12,
        I2C_FREQ,
        Default::default(),
    ));

    let controller =
        charge::controller::ChargeController::new(power, charger, cap_store, FirmwareInstant::now());

    spawner
        .spawn(controller_task::run(
            controller,
            REQUEST_QUEUE.receiver(),
            REPLY_QUEUE.sender(),
        ))
        .expect("failed to spawn charge controller task");

    spawner
        .spawn(console_task::run(
            USART2,
            PA3,
            PA2,
            REQUEST_QUEUE.sender(),
            REPLY_QUEUE.receiver(),
        ))
        .expect("failed to spawn console task");

    core::future::pending::<()>().await;
}
