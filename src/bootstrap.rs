use std::sync::Arc;
use tracing::info;

use crate::{
    config::Config,
    error::AppResult,
    execution::{provider, MainnetCreditStation, SchainLedger},
    settlement::{CreditDistributor, DistributionScheduler},
    state::StateManager,
};

/// Wire the distributor from configuration
pub async fn initialize_scheduler(config: &Config) -> AppResult<DistributionScheduler> {
    info!("Initializing distributor components ...");

    let state_manager = StateManager::new(config.state_file.clone());
    let state = state_manager.load(config.from_block);

    let mainnet = provider::http_provider(
        &config.mainnet_endpoint,
        config.request_timeout(),
        config.receipt_poll_interval(),
    )?;
    let credit_station = Arc::new(MainnetCreditStation::new(
        config.credit_station_config()?,
        Arc::new(mainnet),
    ));
    info!("✅ Mainnet CreditStation client: {}", config.mainnet_endpoint);

    let schain = provider::http_provider(
        &config.schain_endpoint,
        config.request_timeout(),
        config.receipt_poll_interval(),
    )?;
    let signer = provider::signer_client(schain, config.wallet()?).await?;
    let ledger = Arc::new(SchainLedger::new(config.ledger_config()?, Arc::new(signer)));
    info!("✅ Schain Ledger client: {}", config.schain_endpoint);

    let distributor_config = config.distributor_config()?;
    info!(
        "🔗 Distributing to schain {:?}: {} wei per payment",
        distributor_config.schain_name, distributor_config.payment_value_wei
    );

    let distributor = Arc::new(CreditDistributor::new(
        distributor_config,
        credit_station,
        ledger,
    ));

    let schedule = config.schedule_config();
    info!(
        "⏰ Loop sleep {}s, exception sleep {}s, state file {:?}",
        schedule.loop_sleep.as_secs(),
        schedule.exception_sleep.as_secs(),
        state_manager.state_file()
    );

    Ok(DistributionScheduler::new(
        schedule,
        distributor,
        state_manager,
        state,
    ))
}
