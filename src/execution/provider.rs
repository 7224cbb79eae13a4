// Node connections shared by the mainnet and schain clients

use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use std::time::Duration;
use tracing::info;

use crate::error::{AppResult, RpcError};

/// Schain client that signs fulfill transactions locally
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// HTTP provider with a per-request timeout
pub fn http_provider(
    endpoint: &str,
    request_timeout: Duration,
    poll_interval: Duration,
) -> AppResult<Provider<Http>> {
    let url = reqwest::Url::parse(endpoint).map_err(|e| RpcError::Endpoint {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;
    let client = reqwest::Client::builder().timeout(request_timeout).build()?;

    Ok(Provider::new(Http::new_with_client(url, client)).interval(poll_interval))
}

/// Attach `wallet` to `provider`, binding it to the chain id the node reports
pub async fn signer_client(
    provider: Provider<Http>,
    wallet: LocalWallet,
) -> AppResult<SignerClient> {
    let chain_id = provider
        .get_chainid()
        .await
        .map_err(|e| RpcError::provider("eth_chainId", e))?;
    info!("🔑 Signing as {:?} on chain {}", wallet.address(), chain_id);

    Ok(SignerMiddleware::new(
        provider,
        wallet.with_chain_id(chain_id.low_u64()),
    ))
}
