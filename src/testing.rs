// In-memory event source and ledger for distributor tests

use async_trait::async_trait;
use ethers::types::{TxHash, U256};
use parking_lot::Mutex;
use std::collections::HashSet;

use crate::{
    adapters::traits::{FulfillmentLedger, PaymentEventSource},
    error::{AppResult, RpcError},
    ledger::models::{Address, PaymentEvent, PaymentId},
};

pub fn event(payment_id: u64, block_number: u64) -> PaymentEvent {
    PaymentEvent {
        payment_id: PaymentId::from(payment_id),
        to_address: Address::from_low_u64_be(0x1000 + payment_id),
        block_number,
        log_index: 0,
        transaction_hash: None,
    }
}

fn injected(method: &str) -> RpcError {
    RpcError::provider(method, "injected failure")
}

/// Emulates the mainnet log query: returns every stored event at or after `from_block`
#[derive(Default)]
pub struct MockEventSource {
    events: Mutex<Vec<PaymentEvent>>,
    queries: Mutex<Vec<(u64, String)>>,
    fail_next: Mutex<u32>,
    /// Return events verbatim, ignoring `from_block`
    unfiltered: bool,
}

impl MockEventSource {
    pub fn with_events(events: Vec<PaymentEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Default::default()
        }
    }

    /// Source that hands back its events even when they precede `from_block`
    pub fn unfiltered(events: Vec<PaymentEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            unfiltered: true,
            ..Default::default()
        }
    }

    pub fn push(&self, event: PaymentEvent) {
        self.events.lock().push(event);
    }

    pub fn fail_next(&self, times: u32) {
        *self.fail_next.lock() = times;
    }

    pub fn queries(&self) -> Vec<(u64, String)> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl PaymentEventSource for MockEventSource {
    async fn get_payment_events(
        &self,
        from_block: u64,
        schain_name: &str,
    ) -> AppResult<Vec<PaymentEvent>> {
        self.queries.lock().push((from_block, schain_name.to_string()));

        {
            let mut fail = self.fail_next.lock();
            if *fail > 0 {
                *fail -= 1;
                return Err(injected("eth_getLogs").into());
            }
        }

        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| self.unfiltered || e.block_number >= from_block)
            .cloned()
            .collect())
    }
}

/// Ledger with an in-memory settled set and call recording
#[derive(Default)]
pub struct MockLedger {
    fulfilled: Mutex<HashSet<PaymentId>>,
    fulfill_calls: Mutex<Vec<(PaymentId, Address, U256)>>,
    status_queries: Mutex<Vec<PaymentId>>,
    failing: Mutex<HashSet<PaymentId>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a payment as settled by someone else
    pub fn mark_fulfilled(&self, payment_id: PaymentId) {
        self.fulfilled.lock().insert(payment_id);
    }

    /// Make `fulfill` fail for this payment until cleared
    pub fn fail_payment(&self, payment_id: PaymentId) {
        self.failing.lock().insert(payment_id);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn fulfill_calls(&self) -> Vec<(PaymentId, Address, U256)> {
        self.fulfill_calls.lock().clone()
    }

    pub fn fulfill_count(&self, payment_id: &PaymentId) -> usize {
        self.fulfill_calls
            .lock()
            .iter()
            .filter(|(id, _, _)| id == payment_id)
            .count()
    }

    pub fn status_queries(&self) -> Vec<PaymentId> {
        self.status_queries.lock().clone()
    }

    pub fn is_settled(&self, payment_id: &PaymentId) -> bool {
        self.fulfilled.lock().contains(payment_id)
    }
}

#[async_trait]
impl FulfillmentLedger for MockLedger {
    async fn is_fulfilled(&self, payment_id: &PaymentId) -> AppResult<bool> {
        self.status_queries.lock().push(*payment_id);
        Ok(self.fulfilled.lock().contains(payment_id))
    }

    async fn fulfill(
        &self,
        payment_id: &PaymentId,
        to: &Address,
        value_wei: U256,
    ) -> AppResult<TxHash> {
        self.fulfill_calls.lock().push((*payment_id, *to, value_wei));

        if self.failing.lock().contains(payment_id) {
            return Err(injected("eth_sendTransaction").into());
        }

        self.fulfilled.lock().insert(*payment_id);
        Ok(TxHash::from_low_u64_be(payment_id.low_u64()))
    }
}
