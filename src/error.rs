use ethers::types::{TxHash, U256};
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the distributor
#[derive(Error, Debug)]
pub enum AppError {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Checkpoint persistence errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read state file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to write state file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Node and contract interaction errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Invalid endpoint {endpoint}: {message}")]
    Endpoint { endpoint: String, message: String },

    #[error("{method} failed: {message}")]
    Provider { method: String, message: String },

    #[error("Contract call {method} failed: {message}")]
    Contract { method: String, message: String },

    #[error("Malformed {method} response: {message}")]
    Malformed { method: String, message: String },
}

impl RpcError {
    pub fn provider(method: &str, error: impl std::fmt::Display) -> Self {
        RpcError::Provider {
            method: method.to_string(),
            message: error.to_string(),
        }
    }

    pub fn contract(method: &str, error: impl std::fmt::Display) -> Self {
        RpcError::Contract {
            method: method.to_string(),
            message: error.to_string(),
        }
    }
}

/// Settlement-side errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Fulfill transaction {tx_hash:?} for payment {payment_id} reverted")]
    Reverted { payment_id: U256, tx_hash: TxHash },

    #[error("Fulfill transaction {tx_hash:?} not mined after {timeout_secs}s")]
    ConfirmationTimeout { tx_hash: TxHash, timeout_secs: u64 },

    #[error("Fulfill transaction {tx_hash:?} was dropped before it was mined")]
    Dropped { tx_hash: TxHash },
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::Rpc(RpcError::Endpoint {
            endpoint: error
                .url()
                .map(|url| url.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            message: error.to_string(),
        })
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
