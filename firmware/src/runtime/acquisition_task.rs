use embassy_stm32::usart::BufferedUartTx;
use gnss_core::config::AcquisitionConfig;
use gnss_core::scheduler::CycleScheduler;

use super::FIX_MAILBOX;
use crate::clock::EmbassyClock;
use crate::modem::{ModemGnss, SignalledReplies};
use crate::telemetry::FirmwareTelemetry;

#[embassy_executor::task]
pub async fn run(
    modem: ModemGnss<BufferedUartTx<'static>, SignalledReplies>,
    config: AcquisitionConfig,
) -> ! {
    let mut telemetry = FirmwareTelemetry::new();
    let mut scheduler = CycleScheduler::new(modem, &FIX_MAILBOX, EmbassyClock, config);

    let error = scheduler.run(&mut telemetry).await;
    defmt::error!(
        "gnss: positioning stopped after {} cycles: {}",
        scheduler.cycles_completed(),
        defmt::Display2Format(&error)
    );

    loop {
        core::future::pending::<()>().await;
    }
}
