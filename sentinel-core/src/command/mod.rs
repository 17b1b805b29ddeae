//! Power-button actuator and the command executor that drives it.

use core::{ops::Add, time::Duration};

use crate::cooldown::CooldownWindow;
use crate::latch::{EventLatch, LatchedState};
use crate::session::{Ack, Command};

/// Action applied to the actuator output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorAction {
    Press,
    Release,
}

/// Abstraction over the power-button output.
pub trait ActuatorDriver {
    /// Drives the output to the level matching `action`.
    fn apply(&mut self, action: ActuatorAction);

    /// Blocks for `duration` while the output holds its level.
    fn hold(&mut self, duration: Duration);
}

/// Keeps the button pressed for as long as it lives.
///
/// Dropping the guard always releases the output, so an early return or an
/// unwinding panic between press and release cannot leave the PC's power
/// button held down.
pub struct PressGuard<'a, A: ActuatorDriver + ?Sized> {
    driver: &'a mut A,
}

impl<'a, A: ActuatorDriver + ?Sized> PressGuard<'a, A> {
    pub fn press(driver: &'a mut A) -> Self {
        driver.apply(ActuatorAction::Press);
        Self { driver }
    }

    pub fn hold(&mut self, duration: Duration) {
        self.driver.hold(duration);
    }
}

impl<A: ActuatorDriver + ?Sized> Drop for PressGuard<'_, A> {
    fn drop(&mut self) {
        self.driver.apply(ActuatorAction::Release);
    }
}

/// Emulates a momentary front-panel press of `duration`.
pub fn pulse<A: ActuatorDriver + ?Sized>(driver: &mut A, duration: Duration) {
    let mut guard = PressGuard::press(driver);
    guard.hold(duration);
}

/// What the executor did with an acknowledgement.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Execution<I> {
    /// Latch cleared, no command.
    Acknowledged,
    /// Latch cleared, command field unreadable and ignored.
    IgnoredMalformed,
    /// Latch cleared, button pulsed, cooldown armed until the instant.
    PoweredOff { cooldown_until: I },
}

/// Applies acknowledged reports to the latch, actuator, and cooldown.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandExecutor {
    pulse: Duration,
    cooldown: Duration,
}

impl CommandExecutor {
    pub const fn new(pulse: Duration, cooldown: Duration) -> Self {
        Self { pulse, cooldown }
    }

    pub const fn pulse_duration(&self) -> Duration {
        self.pulse
    }

    /// Handles `ack` for the report that carried `delivered`.
    ///
    /// The latch is cleared for every acknowledgement because the report
    /// itself round-tripped. A power-off command additionally pulses the
    /// button and arms the cooldown, measured from the release.
    pub fn execute<A, I>(
        &self,
        ack: Ack,
        delivered: LatchedState,
        latch: &mut EventLatch,
        cooldown: &mut CooldownWindow<I>,
        driver: &mut A,
        now: I,
    ) -> Execution<I>
    where
        A: ActuatorDriver + ?Sized,
        I: Copy + Ord + Add<Duration, Output = I>,
    {
        latch.clear_on_ack(delivered);

        match ack.command {
            Command::None => Execution::Acknowledged,
            Command::Malformed => Execution::IgnoredMalformed,
            Command::PowerOff => {
                pulse(driver, self.pulse);
                let released_at = now + self.pulse;
                cooldown.arm(released_at, self.cooldown);
                Execution::PoweredOff {
                    cooldown_until: released_at + self.cooldown,
                }
            }
        }
    }
}
