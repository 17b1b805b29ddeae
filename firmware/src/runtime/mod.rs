use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use sentinel_core::Agent;
use sentinel_core::session::SessionId;
use static_cell::StaticCell;

use crate::hw::{BlockingPause, Board, entropy};
use crate::modem::Modem;
use crate::settings::{self, NETWORK};

mod agent_task;

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
const MODEM_UART_BUFFER_SIZE: usize = 1024;

static MODEM_TX_BUFFER: StaticCell<[u8; MODEM_UART_BUFFER_SIZE]> = StaticCell::new();
static MODEM_RX_BUFFER: StaticCell<[u8; MODEM_UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA2,
        PA4,
        PB0,
        PB1,
        ADC1,
        USART5,
        ..
    } = hal::init(config);

    // Both sense lines idle high through the pull-ups; the button output idles released.
    let power_sense = Input::new(PA0, Pull::Up);
    let chassis_sense = Input::new(PA1, Pull::Up);
    let power_button = Output::new(PA2, Level::Low, Speed::Low);

    let mut uart_config = UartConfig::default();
    uart_config.baudrate = MODEM_UART_BAUD;
    uart_config.data_bits = DataBits::DataBits8;
    uart_config.stop_bits = StopBits::STOP1;
    uart_config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        USART5,
        PB1,
        PB0,
        MODEM_TX_BUFFER.init([0; MODEM_UART_BUFFER_SIZE]),
        MODEM_RX_BUFFER.init([0; MODEM_UART_BUFFER_SIZE]),
        UartIrqs,
        uart_config,
    )
    .expect("failed to initialize modem UART");
    let modem = Modem::new(uart, BlockingPause, NETWORK);

    let session_id = SessionId::from_seed(entropy::boot_seed(ADC1, PA4));
    let agent = Agent::new(settings::agent_config(), session_id);
    let board = Board::new(power_sense, chassis_sense, power_button, modem);

    spawner
        .spawn(agent_task::run(agent, board))
        .expect("failed to spawn agent task");

    core::future::pending::<()>().await;
}
