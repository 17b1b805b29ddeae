//! Board wiring: sense inputs, the power-button output, and the modem link.

use core::time::Duration;

use embassy_stm32::gpio::{Input, Output};
use embassy_stm32::usart::BufferedUart;
use embassy_time::block_for;
use sentinel_core::command::{ActuatorAction, ActuatorDriver};
use sentinel_core::link::{LinkControl, LinkState};
use sentinel_core::session::{HttpReply, ReportTransport};
use sentinel_core::signals::{InputLine, Level, SignalInputs};

use crate::clock::to_embassy;
use crate::modem::{Modem, ModemError, Pause};

pub mod entropy;

/// Busy-waits on the embassy clock; the tick task owns the only executor slot.
pub struct BlockingPause;

impl Pause for BlockingPause {
    fn pause(&mut self, duration: Duration) {
        block_for(to_embassy(duration));
    }
}

pub type BoardModem<'d> = Modem<BufferedUart<'d>, BlockingPause>;

/// Every port the agent drives on this board.
pub struct Board<'d> {
    power_sense: Input<'d>,
    chassis_sense: Input<'d>,
    power_button: Output<'d>,
    modem: BoardModem<'d>,
}

impl<'d> Board<'d> {
    pub fn new(
        power_sense: Input<'d>,
        chassis_sense: Input<'d>,
        power_button: Output<'d>,
        modem: BoardModem<'d>,
    ) -> Self {
        Self {
            power_sense,
            chassis_sense,
            power_button,
            modem,
        }
    }

    pub fn modem_mut(&mut self) -> &mut BoardModem<'d> {
        &mut self.modem
    }
}

impl SignalInputs for Board<'_> {
    fn read(&mut self, line: InputLine) -> Level {
        let input = match line {
            InputLine::PowerSense => &self.power_sense,
            InputLine::ChassisSense => &self.chassis_sense,
        };
        Level::from_high(input.is_high())
    }
}

impl ActuatorDriver for Board<'_> {
    fn apply(&mut self, action: ActuatorAction) {
        match action {
            ActuatorAction::Press => self.power_button.set_high(),
            ActuatorAction::Release => self.power_button.set_low(),
        }
    }

    fn hold(&mut self, duration: Duration) {
        block_for(to_embassy(duration));
    }
}

impl LinkControl for Board<'_> {
    fn poll(&mut self) -> LinkState {
        self.modem.poll()
    }

    fn request_connect(&mut self) {
        self.modem.request_connect();
    }
}

impl ReportTransport for Board<'_> {
    type Error = ModemError;

    fn post(&mut self, body: &[u8], response: &mut [u8]) -> Result<HttpReply, ModemError> {
        self.modem.post(body, response)
    }
}
