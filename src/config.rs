use ethers::signers::LocalWallet;
use ethers::types::U256;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    execution::{CreditStationConfig, SchainLedgerConfig},
    ledger::models::Address,
    settlement::{DistributionScheduleConfig, DistributorConfig},
};

/// Process configuration, loaded once at startup from the environment
/// (and `.env`). Keys are case-insensitive.
#[derive(Deserialize, Clone)]
pub struct Config {
    pub mainnet_endpoint: String,
    pub schain_endpoint: String,

    /// CreditStation contract address on mainnet
    pub mainnet_credit_station: String,
    /// Ledger contract address on the schain
    pub schain_ledger: String,

    pub schain_name: String,

    /// Block to start scanning from when no state file exists
    pub from_block: u64,
    /// Key of the account holding the fulfill role on the schain
    pub eth_private_key: String,

    pub state_file: PathBuf,

    /// Seconds between successful cycles
    pub agent_loop_sleep: u64,
    /// Seconds before retrying a failed cycle
    pub agent_exception_sleep: u64,

    pub payment_value_eth: u64,
    /// Overrides `payment_value_eth` when set
    #[serde(default, deserialize_with = "deserialize_wei")]
    pub payment_value_wei: Option<U256>,

    pub payment_event_signature: String,
    /// Widest block range sent in a single eth_getLogs request
    pub max_block_range: u64,

    /// Seconds to wait for a fulfill receipt
    pub confirmation_timeout: u64,
    /// Per-request HTTP timeout in seconds
    pub rpc_timeout: u64,
    /// Milliseconds between receipt polls
    pub receipt_poll_interval_ms: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("mainnet_endpoint", &self.mainnet_endpoint)
            .field("schain_endpoint", &self.schain_endpoint)
            .field("mainnet_credit_station", &self.mainnet_credit_station)
            .field("schain_ledger", &self.schain_ledger)
            .field("schain_name", &self.schain_name)
            .field("from_block", &self.from_block)
            .field("eth_private_key", &"<redacted>")
            .field("state_file", &self.state_file)
            .field("agent_loop_sleep", &self.agent_loop_sleep)
            .field("agent_exception_sleep", &self.agent_exception_sleep)
            .field("payment_value_eth", &self.payment_value_eth)
            .field("payment_value_wei", &self.payment_value_wei)
            .field("max_block_range", &self.max_block_range)
            .finish_non_exhaustive()
    }
}

/// Wei amounts routinely exceed `i64`, so the raw text is parsed directly
/// instead of going through the config crate's numeric coercion.
fn deserialize_wei<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(digits) => U256::from_dec_str(digits).map(Some).map_err(|e| {
            serde::de::Error::custom(format!("invalid PAYMENT_VALUE_WEI {:?}: {}", digits, e))
        }),
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> AppResult<Self> {
        let config: Config = config::Config::builder()
            .set_default("state_file", "state.json")?
            .set_default("agent_loop_sleep", 120)?
            .set_default("agent_exception_sleep", 10)?
            .set_default("payment_value_eth", 1)?
            .set_default(
                "payment_event_signature",
                "PaymentReceived(uint256,bytes32,address)",
            )?
            .set_default("max_block_range", 10_000)?
            .set_default("confirmation_timeout", 120)?
            .set_default("rpc_timeout", 30)?
            .set_default("receipt_poll_interval_ms", 1_000)?
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        self.credit_station_address()?;
        self.ledger_address()?;
        self.wallet()?;

        if self.schain_name.trim().is_empty() {
            return Err(AppError::Config("SCHAIN_NAME must not be empty".to_string()));
        }
        if self.agent_loop_sleep == 0 || self.agent_exception_sleep == 0 {
            return Err(AppError::Config(
                "AGENT_LOOP_SLEEP and AGENT_EXCEPTION_SLEEP must be positive".to_string(),
            ));
        }
        if self.max_block_range == 0 {
            return Err(AppError::Config("MAX_BLOCK_RANGE must be positive".to_string()));
        }
        if self.payment_value_wei()?.is_zero() {
            return Err(AppError::Config("Payment value must be positive".to_string()));
        }

        Ok(())
    }

    pub fn payment_value_wei(&self) -> AppResult<U256> {
        match self.payment_value_wei {
            Some(wei) => Ok(wei),
            None => U256::from(self.payment_value_eth)
                .checked_mul(U256::exp10(18))
                .ok_or_else(|| AppError::Config("PAYMENT_VALUE_ETH overflows".to_string())),
        }
    }

    /// Signing key for fulfill transactions
    pub fn wallet(&self) -> AppResult<LocalWallet> {
        self.eth_private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| AppError::Config(format!("Invalid ETH_PRIVATE_KEY: {}", e)))
    }

    fn credit_station_address(&self) -> AppResult<Address> {
        parse_address("MAINNET_CREDIT_STATION", &self.mainnet_credit_station)
    }

    fn ledger_address(&self) -> AppResult<Address> {
        parse_address("SCHAIN_LEDGER", &self.schain_ledger)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn credit_station_config(&self) -> AppResult<CreditStationConfig> {
        Ok(CreditStationConfig {
            contract: self.credit_station_address()?,
            payment_event_signature: self.payment_event_signature.clone(),
            max_block_range: self.max_block_range,
        })
    }

    pub fn ledger_config(&self) -> AppResult<SchainLedgerConfig> {
        Ok(SchainLedgerConfig {
            contract: self.ledger_address()?,
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout),
            receipt_poll_interval: self.receipt_poll_interval(),
        })
    }

    pub fn distributor_config(&self) -> AppResult<DistributorConfig> {
        Ok(DistributorConfig {
            schain_name: self.schain_name.clone(),
            payment_value_wei: self.payment_value_wei()?,
        })
    }

    pub fn schedule_config(&self) -> DistributionScheduleConfig {
        DistributionScheduleConfig {
            loop_sleep: Duration::from_secs(self.agent_loop_sleep),
            exception_sleep: Duration::from_secs(self.agent_exception_sleep),
        }
    }
}

fn parse_address(key: &str, raw: &str) -> AppResult<Address> {
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))
}
