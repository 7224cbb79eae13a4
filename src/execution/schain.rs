use async_trait::async_trait;
use ethers::contract::{abigen, ContractCall};
use ethers::providers::{Middleware, PendingTransaction};
use ethers::types::{TransactionReceipt, TxHash, U256, U64};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::{
    adapters::traits::FulfillmentLedger,
    error::{AppResult, LedgerError, RpcError},
    ledger::models::{Address, PaymentId},
};

abigen!(
    LedgerContract,
    r#"[
        function isFulfilled(uint256 paymentId) external view returns (bool)
        function fulfill(uint256 paymentId, address to) external payable
    ]"#
);

#[derive(Debug, Clone)]
pub struct SchainLedgerConfig {
    pub contract: Address,
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

/// Ledger contract on the SKALE chain
///
/// `M` must be able to sign for the account holding the fulfill role.
pub struct SchainLedger<M> {
    config: SchainLedgerConfig,
    contract: LedgerContract<M>,
}

impl<M: Middleware + 'static> SchainLedger<M> {
    pub fn new(config: SchainLedgerConfig, client: Arc<M>) -> Self {
        let contract = LedgerContract::new(config.contract, client);
        Self { config, contract }
    }

    fn fulfill_call(
        &self,
        payment_id: &PaymentId,
        to: &Address,
        value_wei: U256,
    ) -> ContractCall<M, ()> {
        self.contract.fulfill(*payment_id, *to).value(value_wei)
    }

    /// Wait until mined or the confirmation timeout elapses
    async fn wait_for_receipt(
        &self,
        pending: PendingTransaction<'_, M::Provider>,
    ) -> AppResult<TransactionReceipt> {
        let tx_hash = *pending;
        let timeout = self.config.confirmation_timeout;

        let receipt = tokio::time::timeout(
            timeout,
            pending.interval(self.config.receipt_poll_interval),
        )
        .await
        .map_err(|_| LedgerError::ConfirmationTimeout {
            tx_hash,
            timeout_secs: timeout.as_secs(),
        })?
        .map_err(|e| RpcError::provider("eth_getTransactionReceipt", e))?;

        receipt.ok_or_else(|| LedgerError::Dropped { tx_hash }.into())
    }
}

#[async_trait]
impl<M: Middleware + 'static> FulfillmentLedger for SchainLedger<M> {
    async fn is_fulfilled(&self, payment_id: &PaymentId) -> AppResult<bool> {
        let fulfilled = self
            .contract
            .is_fulfilled(*payment_id)
            .call()
            .await
            .map_err(|e| RpcError::contract("isFulfilled", e))?;
        Ok(fulfilled)
    }

    #[instrument(skip(self), fields(payment_id = %payment_id, to = ?to))]
    async fn fulfill(
        &self,
        payment_id: &PaymentId,
        to: &Address,
        value_wei: U256,
    ) -> AppResult<TxHash> {
        let call = self.fulfill_call(payment_id, to, value_wei);
        let pending = call
            .send()
            .await
            .map_err(|e| RpcError::contract("fulfill", e))?;

        info!("📤 Fulfill transaction submitted: {:?}", *pending);

        let receipt = self.wait_for_receipt(pending).await?;
        debug!(
            "Fulfill mined in block {:?}, gas used {:?}",
            receipt.block_number, receipt.gas_used
        );
        check_receipt(payment_id, &receipt)?;

        Ok(receipt.transaction_hash)
    }
}

fn check_receipt(payment_id: &PaymentId, receipt: &TransactionReceipt) -> AppResult<()> {
    if receipt.status != Some(U64::from(1)) {
        return Err(LedgerError::Reverted {
            payment_id: *payment_id,
            tx_hash: receipt.transaction_hash,
        }
        .into());
    }
    Ok(())
}
