use async_trait::async_trait;
use ethers::providers::Middleware;
use ethers::types::{Filter, Log, H256, U256};
use ethers::utils::keccak256;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::{
    adapters::traits::PaymentEventSource,
    error::{AppResult, RpcError},
    ledger::models::{Address, PaymentEvent},
};

#[derive(Debug, Clone)]
pub struct CreditStationConfig {
    pub contract: Address,
    /// e.g. `PaymentReceived(uint256,bytes32,address)`
    pub payment_event_signature: String,
    /// Widest range sent in one eth_getLogs request
    pub max_block_range: u64,
}

/// CreditStation contract on mainnet, read through `eth_getLogs`
///
/// Log layout: topic1 = payment id, topic2 = keccak256(schain name),
/// topic3 = recipient.
pub struct MainnetCreditStation<M> {
    config: CreditStationConfig,
    provider: Arc<M>,
}

impl<M: Middleware> MainnetCreditStation<M> {
    pub fn new(config: CreditStationConfig, provider: Arc<M>) -> Self {
        Self { config, provider }
    }

    fn log_filter(&self, schain_name: &str, start_block: u64, end_block: u64) -> Filter {
        Filter::new()
            .address(self.config.contract)
            .event(&self.config.payment_event_signature)
            .topic2(schain_hash(schain_name))
            .from_block(start_block)
            .to_block(end_block)
    }

    async fn latest_block(&self) -> AppResult<u64> {
        let block = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| RpcError::provider("eth_blockNumber", e))?;
        Ok(block.as_u64())
    }

    async fn query_logs(
        &self,
        schain_name: &str,
        start_block: u64,
        end_block: u64,
    ) -> AppResult<Vec<Log>> {
        let filter = self.log_filter(schain_name, start_block, end_block);
        let logs = self.provider.get_logs(&filter).await.map_err(|e| {
            error!("eth_getLogs failed. Filter: {:?}. Error {}", filter, e);
            RpcError::provider("eth_getLogs", e)
        })?;

        // Safeguard against providers that ignore the address filter
        if let Some(log) = logs.iter().find(|log| log.address != self.config.contract) {
            return Err(RpcError::Malformed {
                method: "eth_getLogs".to_string(),
                message: format!("log from unexpected contract {:?}", log.address),
            }
            .into());
        }

        Ok(logs)
    }
}

#[async_trait]
impl<M: Middleware + 'static> PaymentEventSource for MainnetCreditStation<M> {
    #[instrument(skip(self))]
    async fn get_payment_events(
        &self,
        from_block: u64,
        schain_name: &str,
    ) -> AppResult<Vec<PaymentEvent>> {
        let latest = self.latest_block().await?;
        if from_block > latest {
            debug!("Block {} not produced yet (head {})", from_block, latest);
            return Ok(Vec::new());
        }

        let mut logs = Vec::new();
        for (start, end) in block_ranges(from_block, latest, self.config.max_block_range) {
            logs.extend(self.query_logs(schain_name, start, end).await?);
        }

        let total = logs.len();
        let events = decode_logs(logs)?;

        debug!(
            "Fetched {} PaymentReceived logs in blocks {}..={} ({} usable)",
            total,
            from_block,
            latest,
            events.len()
        );

        Ok(events)
    }
}

/// SKALE identifies chains by the hash of their name
pub fn schain_hash(schain_name: &str) -> H256 {
    H256::from(keccak256(schain_name.as_bytes()))
}

/// Split `from..=to` into inclusive ranges of at most `max_range` blocks
fn block_ranges(from: u64, to: u64, max_range: u64) -> Vec<(u64, u64)> {
    let step = max_range.max(1);
    let mut ranges = Vec::new();
    let mut start = from;

    while start <= to {
        let end = start.saturating_add(step - 1).min(to);
        ranges.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }

    ranges
}

fn decode_logs(logs: Vec<Log>) -> AppResult<Vec<PaymentEvent>> {
    let mut events = Vec::with_capacity(logs.len());

    for log in logs {
        if log.removed == Some(true) {
            warn!("Skipping removed log {:?}", log.transaction_hash);
            continue;
        }
        if let Some(event) = decode_log(log)? {
            events.push(event);
        }
    }

    // Pages come back in order, but nodes don't promise order inside a page
    events.sort_by_key(|e| (e.block_number, e.log_index));
    Ok(events)
}

fn decode_log(log: Log) -> AppResult<Option<PaymentEvent>> {
    let malformed = |message: String| RpcError::Malformed {
        method: "eth_getLogs".to_string(),
        message,
    };

    let (Some(block_number), Some(log_index)) = (log.block_number, log.log_index) else {
        // Pending log, will be picked up once mined
        warn!("Skipping pending log {:?}", log.transaction_hash);
        return Ok(None);
    };

    if log.topics.len() < 4 {
        return Err(malformed(format!(
            "PaymentReceived log has {} topics, expected 4",
            log.topics.len()
        ))
        .into());
    }

    let recipient = log.topics[3].as_bytes();
    if recipient[..12].iter().any(|b| *b != 0) {
        return Err(malformed(format!(
            "topic {:?} is not a left-padded address",
            log.topics[3]
        ))
        .into());
    }

    Ok(Some(PaymentEvent {
        payment_id: U256::from_big_endian(log.topics[1].as_bytes()),
        to_address: Address::from_slice(&recipient[12..]),
        block_number: block_number.as_u64(),
        log_index: log_index.low_u64(),
        transaction_hash: log.transaction_hash,
    }))
}
