use embassy_stm32::usart::BufferedUartRx;
use embassy_time::{Duration, Timer};
use embedded_io_async::Read;

use crate::modem::notification::{LineAssembler, decode_fix_ready, final_result, is_fix_ready};
use crate::modem::{NotifierSlot, ReplySignal};

const MODEM_READ_CHUNK: usize = 64;

#[embassy_executor::task]
pub async fn run(
    mut uart_rx: BufferedUartRx<'static>,
    notifier_slot: &'static NotifierSlot,
    replies: &'static ReplySignal,
) -> ! {
    let notifier = *notifier_slot.get().await;
    let mut assembler = LineAssembler::new();
    let mut chunk = [0u8; MODEM_READ_CHUNK];

    loop {
        let count = match uart_rx.read(&mut chunk).await {
            Ok(count) => count,
            Err(_) => {
                defmt::warn!("modem: UART read error");
                Timer::after(Duration::from_millis(5)).await;
                continue;
            }
        };

        for &byte in &chunk[..count] {
            let Some(line) = assembler.push(byte) else {
                continue;
            };
            if let Some(result) = final_result(line) {
                replies.signal(result);
                continue;
            }
            if !is_fix_ready(line) {
                defmt::debug!("modem: {}", line);
                continue;
            }

            match decode_fix_ready(line) {
                Ok(fix) => {
                    if notifier.deliver(fix) {
                        defmt::warn!("modem: previous fix overwritten before it was taken");
                    }
                }
                Err(error) => defmt::warn!("modem: {}", defmt::Display2Format(&error)),
            }
        }
    }
}
