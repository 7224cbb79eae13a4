use async_trait::async_trait;
use ethers::types::{TxHash, U256};

use crate::error::AppResult;
use crate::ledger::models::{Address, PaymentEvent, PaymentId};

/// Source of PaymentReceived events on the paying chain
#[async_trait]
pub trait PaymentEventSource: Send + Sync {
    /// All payments for `schain_name` emitted at or after `from_block`
    ///
    /// INVARIANTS:
    /// - Ordered by block number, then by position inside the block
    /// - Covers everything up to the current head; an empty result is a
    ///   normal answer
    async fn get_payment_events(
        &self,
        from_block: u64,
        schain_name: &str,
    ) -> AppResult<Vec<PaymentEvent>>;
}

/// Settlement side of the bridge
///
/// The ledger is the single source of truth for idempotency. Callers must
/// query `is_fulfilled` fresh before every `fulfill`.
#[async_trait]
pub trait FulfillmentLedger: Send + Sync {
    async fn is_fulfilled(&self, payment_id: &PaymentId) -> AppResult<bool>;

    /// Pay `value_wei` to `to` for `payment_id` and wait until it is mined.
    /// Returns the transaction hash.
    async fn fulfill(
        &self,
        payment_id: &PaymentId,
        to: &Address,
        value_wei: U256,
    ) -> AppResult<TxHash>;
}
