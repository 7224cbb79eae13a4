// Distribution Scheduler - drives the distributor forever
//
// Loop Strategy:
// - Success: persist the advanced checkpoint, sleep `loop_sleep`
// - Any failure (event query, settlement, checkpoint save): log it,
//   sleep the shorter `exception_sleep`, retry the whole cycle
// - No retry cap and no backoff growth; config errors need a restart
// - Stops only when the cancellation token fires

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    error::AppResult,
    settlement::distributor::{CreditDistributor, CycleReport},
    state::{State, StateManager},
};

/// Sleep configuration
#[derive(Debug, Clone)]
pub struct DistributionScheduleConfig {
    /// Pause after a successful cycle
    pub loop_sleep: Duration,
    /// Pause before retrying a failed cycle
    pub exception_sleep: Duration,
}

/// Distribution scheduler - owns the in-memory checkpoint between cycles
pub struct DistributionScheduler {
    config: DistributionScheduleConfig,
    distributor: Arc<CreditDistributor>,
    state_manager: StateManager,
    state: State,
}

impl DistributionScheduler {
    pub fn new(
        config: DistributionScheduleConfig,
        distributor: Arc<CreditDistributor>,
        state_manager: StateManager,
        initial_state: State,
    ) -> Self {
        Self {
            config,
            distributor,
            state_manager,
            state: initial_state,
        }
    }

    /// Last checkpoint that was durably saved (or loaded at startup)
    pub fn state(&self) -> State {
        self.state
    }

    /// Start the scheduler (runs in background); resolves to the final state
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<State> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Run cycles until `cancel` fires
    ///
    /// An in-flight cycle is allowed to finish; cancellation is observed
    /// before each cycle and during the sleeps.
    pub async fn run(mut self, cancel: CancellationToken) -> State {
        info!(
            "🚀 Distribution loop starting at block {}",
            self.state.from_block
        );

        while !cancel.is_cancelled() {
            info!("🔄 Starting credit distribution cycle");

            let pause = match self.run_once().await {
                Ok(report) => {
                    info!(
                        "✓ Cycle {} completed: {} events, {} fulfilled, {} already fulfilled, next block {}",
                        report.cycle_id,
                        report.events_found,
                        report.fulfilled(),
                        report.already_fulfilled,
                        report.state.from_block
                    );
                    info!(
                        "Sleeping for {} seconds before next cycle",
                        self.config.loop_sleep.as_secs()
                    );
                    self.config.loop_sleep
                }
                Err(e) => {
                    error!(
                        "❌ Error during credit distribution cycle from block {}: {}",
                        self.state.from_block, e
                    );
                    info!(
                        "Sleeping for {} seconds before retrying",
                        self.config.exception_sleep.as_secs()
                    );
                    self.config.exception_sleep
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(
            "🛑 Distribution loop stopped at block {}",
            self.state.from_block
        );
        self.state
    }

    /// One cycle plus checkpoint save
    ///
    /// The in-memory checkpoint only moves once the new value is on disk, so
    /// a failed save replays the cycle from the last durable block.
    pub async fn run_once(&mut self) -> AppResult<CycleReport> {
        let report = self.distributor.run_cycle(self.state).await?;
        self.state_manager.save(&report.state)?;
        self.state = report.state;
        Ok(report)
    }
}
