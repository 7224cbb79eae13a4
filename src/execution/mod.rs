pub mod mainnet;
pub mod provider;
pub mod schain;

pub use mainnet::{CreditStationConfig, MainnetCreditStation};
pub use schain::{SchainLedger, SchainLedgerConfig};
