//! Fixed-cadence engine loop.
//!
//! Drives the executor at `tick_interval_ms` and services the control
//! channel between ticks, so command effects always land on a tick
//! boundary. Closing the control channel shuts the engine down.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use pmm_core::EngineStatus;

use crate::control::{CloseScope, ControlCommand};
use crate::error::EngineResult;
use crate::executor::Executor;

fn wall_clock_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Executor plus its control channel.
pub struct Engine {
    executor: Executor,
    control_rx: mpsc::Receiver<ControlCommand>,
}

impl Engine {
    pub fn new(executor: Executor, control_rx: mpsc::Receiver<ControlCommand>) -> Self {
        Self {
            executor,
            control_rx,
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Initialize the session and run until the control channel closes.
    pub async fn run(mut self) -> EngineResult<()> {
        let now = wall_clock_ms();
        self.executor.initialize(now).await?;

        let mut interval =
            tokio::time::interval(Duration::from_millis(self.executor.config().tick_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.executor.status() != EngineStatus::Stopped {
                        self.executor.tick(wall_clock_ms()).await;
                    }
                }
                cmd = self.control_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            let reinterval = self.handle_command(cmd).await;
                            if reinterval {
                                interval = tokio::time::interval(Duration::from_millis(
                                    self.executor.config().tick_interval_ms,
                                ));
                                interval.set_missed_tick_behavior(
                                    tokio::time::MissedTickBehavior::Delay,
                                );
                            }
                        }
                        None => {
                            info!("Control channel closed, shutting down");
                            self.executor.stop(wall_clock_ms()).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Handle one control command. Returns true when the tick interval
    /// must be rebuilt (cadence change).
    async fn handle_command(&mut self, cmd: ControlCommand) -> bool {
        let now = wall_clock_ms();
        match cmd {
            ControlCommand::Start => {
                if let Err(e) = self.executor.start(now) {
                    warn!(error = %e, "Start refused");
                }
                false
            }
            ControlCommand::Stop => {
                self.executor.stop(now).await;
                false
            }
            ControlCommand::UpdateConfig(patch) => {
                let old_interval = self.executor.config().tick_interval_ms;
                match patch.apply(self.executor.config()) {
                    Ok(merged) => {
                        let changed = merged.tick_interval_ms != old_interval;
                        self.executor.apply_config(merged);
                        changed
                    }
                    Err(e) => {
                        warn!(error = %e, "Config patch rejected");
                        false
                    }
                }
            }
            ControlCommand::SetHedgeEnabled(enabled) => {
                match self.executor.hedge_engine() {
                    Some(hedge) => hedge.set_enabled(enabled),
                    None => warn!("No hedge engine configured"),
                }
                false
            }
            ControlCommand::SetInstantCloseEnabled(enabled) => {
                self.executor.set_instant_close(enabled);
                false
            }
            ControlCommand::CloseAll(scope) => {
                if matches!(scope, CloseScope::Primary | CloseScope::Both) {
                    self.executor.close_primary(now).await;
                }
                if matches!(scope, CloseScope::Hedge | CloseScope::Both) {
                    match self.executor.hedge_engine() {
                        Some(hedge) => {
                            hedge.close_all().await;
                        }
                        None => warn!("No hedge engine configured"),
                    }
                }
                false
            }
            ControlCommand::ClearLiquidationHalt => {
                self.executor.clear_liquidation_halt(now);
                false
            }
        }
    }
}
