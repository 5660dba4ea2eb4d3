use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::Duration;
use gnss_core::config::AcquisitionConfig;
use gnss_core::mailbox::FixMailbox;
use static_cell::StaticCell;

use crate::hw;
use crate::modem::{ModemGnss, NotifierSlot, ReplySignal, SignalledReplies};

mod acquisition_task;
mod modem_task;

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

const MODEM_UART_BAUD: u32 = 115_200;
const MODEM_UART_BUFFER_SIZE: usize = 256;
const MODEM_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) static FIX_MAILBOX: FixMailbox = FixMailbox::new();
pub(super) static FIX_NOTIFIER: NotifierSlot = NotifierSlot::new();
static MODEM_REPLIES: ReplySignal = ReplySignal::new();

static UART_TX_BUFFER: StaticCell<[u8; MODEM_UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; MODEM_UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PB0, PB1, USART5, ..
    } = hal::init(config);

    hw::log_banner();

    let mut uart_config = UartConfig::default();
    uart_config.baudrate = MODEM_UART_BAUD;
    uart_config.data_bits = DataBits::DataBits8;
    uart_config.stop_bits = StopBits::STOP1;
    uart_config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        USART5,
        PB1,
        PB0,
        UART_TX_BUFFER.init([0; MODEM_UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; MODEM_UART_BUFFER_SIZE]),
        UartIrqs,
        uart_config,
    )
    .expect("failed to initialize modem UART");
    let (uart_tx, uart_rx) = uart.split();

    spawner
        .spawn(modem_task::run(uart_rx, &FIX_NOTIFIER, &MODEM_REPLIES))
        .expect("failed to spawn modem receive task");

    let replies = SignalledReplies::new(&MODEM_REPLIES, MODEM_REPLY_TIMEOUT);
    let modem = ModemGnss::new(uart_tx, replies, &FIX_NOTIFIER);
    spawner
        .spawn(acquisition_task::run(modem, AcquisitionConfig::default()))
        .expect("failed to spawn acquisition task");

    core::future::pending::<()>().await;
}
