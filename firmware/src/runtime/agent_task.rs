use embassy_time::Timer;
use sentinel_core::Agent;

use crate::clock::{AgentInstant, to_embassy};
use crate::hw::Board;
use crate::telemetry::{self, TelemetryRecorder};

#[embassy_executor::task]
pub async fn run(agent: Agent, mut board: Board<'static>) -> ! {
    let mut telemetry = TelemetryRecorder::new();
    let period = to_embassy(agent.config().tick_period);

    if let Err(error) = board.modem_mut().configure() {
        telemetry::log_modem_error("configure failed", error);
    }

    let identity = agent.session().identity();
    telemetry::log_boot(agent.session().session_id(), identity.name);
    let mut state = agent.boot(&mut board);

    loop {
        let now = AgentInstant::now();
        let tick = agent.tick(state, &mut board, now);
        telemetry.record_tick(&tick.report, now);
        if let Some(error) = board.modem_mut().take_error() {
            telemetry::log_modem_error("port call failed", error);
        }
        state = tick.state;

        Timer::after(period).await;
    }
}
