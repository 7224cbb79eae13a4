// Credit distribution: per-cycle engine and the loop that drives it
pub mod distributor;
pub mod scheduler;

pub use distributor::{CreditDistributor, DistributorConfig};
pub use scheduler::{DistributionScheduleConfig, DistributionScheduler};
