pub use ethers::types::Address;
use ethers::types::{TxHash, U256};

/// Payment identifier as emitted by the CreditStation contract (`uint256`)
pub type PaymentId = U256;

/// PaymentReceived event observed on mainnet
///
/// Events are consumed within a single cycle and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    pub payment_id: PaymentId,
    pub to_address: Address,
    pub block_number: u64,
    /// Position of the log inside its block
    pub log_index: u64,
    pub transaction_hash: Option<TxHash>,
}
