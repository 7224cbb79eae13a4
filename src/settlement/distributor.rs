// Credit Distributor - one scan/fulfill/advance cycle
//
// Cycle Flow:
// 1. Fetch PaymentReceived events for our schain since the checkpoint
// 2. Fulfill each unsettled payment, strictly in event order
// 3. Advance the checkpoint past the last event seen
//
// The first failure aborts the cycle. The caller keeps the old checkpoint,
// so the next attempt re-scans the same range and the ledger's isFulfilled
// check skips payments that already went through.

use ethers::types::{TxHash, U256};
use std::sync::Arc;
use tracing::{debug, field, info, instrument, Span};
use uuid::Uuid;

use crate::{
    adapters::traits::{FulfillmentLedger, PaymentEventSource},
    error::AppResult,
    ledger::models::{PaymentEvent, PaymentId},
    state::State,
};

#[derive(Debug, Clone)]
pub struct DistributorConfig {
    /// Target chain identity used to filter mainnet payments
    pub schain_name: String,
    /// Fixed payout per payment
    pub payment_value_wei: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    Fulfilled { tx_hash: TxHash },
    AlreadyFulfilled,
}

/// Result of a cycle that ran to completion
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub events_found: usize,
    /// Payments settled in this cycle, with their transaction hashes
    pub settled: Vec<(PaymentId, TxHash)>,
    pub already_fulfilled: usize,
    /// Advanced checkpoint, not yet persisted
    pub state: State,
}

impl CycleReport {
    pub fn fulfilled(&self) -> usize {
        self.settled.len()
    }
}

pub struct CreditDistributor {
    config: DistributorConfig,
    events: Arc<dyn PaymentEventSource>,
    ledger: Arc<dyn FulfillmentLedger>,
}

impl CreditDistributor {
    pub fn new(
        config: DistributorConfig,
        events: Arc<dyn PaymentEventSource>,
        ledger: Arc<dyn FulfillmentLedger>,
    ) -> Self {
        Self {
            config,
            events,
            ledger,
        }
    }

    /// Run one distribution cycle starting at `state.from_block`
    #[instrument(skip(self, state), fields(cycle_id = field::Empty, from_block = state.from_block))]
    pub async fn run_cycle(&self, state: State) -> AppResult<CycleReport> {
        let cycle_id = Uuid::new_v4();
        Span::current().record("cycle_id", field::display(cycle_id));

        let events = self
            .events
            .get_payment_events(state.from_block, &self.config.schain_name)
            .await?;

        if events.is_empty() {
            info!("No new PaymentReceived events found.");
        } else {
            info!("📊 Found {} PaymentReceived events", events.len());
        }

        let mut settled = Vec::new();
        let mut already_fulfilled = 0;

        for event in &events {
            match self.fulfill_payment(event).await? {
                FulfillmentOutcome::Fulfilled { tx_hash } => {
                    settled.push((event.payment_id, tx_hash))
                }
                FulfillmentOutcome::AlreadyFulfilled => already_fulfilled += 1,
            }
        }

        let next = State::new(next_from_block(state.from_block, &events));

        Ok(CycleReport {
            cycle_id,
            events_found: events.len(),
            settled,
            already_fulfilled,
            state: next,
        })
    }

    /// Settle one payment unless the ledger already reports it settled
    pub async fn fulfill_payment(&self, event: &PaymentEvent) -> AppResult<FulfillmentOutcome> {
        info!(
            "Checking payment: {} (block {}, source tx {:?})",
            event.payment_id, event.block_number, event.transaction_hash
        );

        if self.ledger.is_fulfilled(&event.payment_id).await? {
            debug!("Payment {} is already fulfilled.", event.payment_id);
            return Ok(FulfillmentOutcome::AlreadyFulfilled);
        }

        info!(
            "Fulfilling payment: {} -> {:?} ({} wei)",
            event.payment_id, event.to_address, self.config.payment_value_wei
        );

        let tx_hash = self
            .ledger
            .fulfill(
                &event.payment_id,
                &event.to_address,
                self.config.payment_value_wei,
            )
            .await?;

        info!(
            "✓ Payment {} fulfilled successfully (tx: {:?})",
            event.payment_id, tx_hash
        );

        Ok(FulfillmentOutcome::Fulfilled { tx_hash })
    }
}

/// Checkpoint after processing `events`: one past the last event's block,
/// never moving backwards
fn next_from_block(from_block: u64, events: &[PaymentEvent]) -> u64 {
    match events.last() {
        Some(last) => from_block.max(last.block_number.saturating_add(1)),
        None => from_block,
    }
}
