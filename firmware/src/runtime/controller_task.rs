use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Ticker};

use crate::charge::{FirmwareInstant, ReplySender, RequestReceiver};
use crate::hw::HardwareController;

/// Fixed cadence of the extender state machine.
const TICK_PERIOD: Duration = Duration::from_secs(1);

#[embassy_executor::task]
pub async fn run(
    mut controller: HardwareController,
    requests: RequestReceiver<'static>,
    replies: ReplySender<'static>,
) -> ! {
    let mut ticker = Ticker::every(TICK_PERIOD);
    loop {
        // Ticks and configuration requests are serviced by this one task, so
        // they can never interleave mid-operation.
        match select(ticker.next(), requests.receive()).await {
            Either::First(()) => controller.on_tick(FirmwareInstant::now()),
            Either::Second(request) => {
                let reply = controller.on_request(request, FirmwareInstant::now());
                replies.send(reply).await;
            }
        }
    }
}
