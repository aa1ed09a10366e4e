//! vaultplan chain tip
//!
//! The only network read the planner makes: the current block height, used
//! as the lower bound for absolute block-height timelocks.
//!
//! A failed or slow read never blocks the user. [`fetch_block_height`] turns
//! any failure into height `0`, which accepts more input, and the timelock is
//! checked again against the latest known height before submission.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vaultplan_electrum::{default_server, fetch_block_height, ElectrumClient};
//! use bitcoin::Network;
//!
//! let client = ElectrumClient::new(default_server(Network::Bitcoin), Network::Bitcoin)?;
//! let height = fetch_block_height(Arc::new(client)).await;
//! ```

use bitcoin::Network;
use electrum_client::{ElectrumApi, Error as ElectrumError};
use std::sync::Arc;
use thiserror::Error;

/// Errors from chain tip reads
#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Electrum protocol error: {0}")]
    Protocol(#[from] ElectrumError),

    #[error("Reported height out of range: {0}")]
    InvalidHeight(usize),

    #[error("Chain tip unavailable: {0}")]
    Unavailable(String),
}

/// Anything that can report the current block height
///
/// Implementations may block; [`fetch_block_height`] runs them on the
/// blocking thread pool.
pub trait ChainTipProvider: Send + Sync + 'static {
    fn block_height(&self) -> Result<u32, Error>;
}

/// Electrum client for chain tip reads
pub struct ElectrumClient {
    client: electrum_client::Client,
    network: Network,
}

impl ElectrumClient {
    /// Connect to an Electrum server
    ///
    /// # Arguments
    /// * `url` - Electrum server URL (e.g., "ssl://electrum.blockstream.info:60002")
    /// * `network` - Bitcoin network the server follows
    pub fn new(url: &str, network: Network) -> Result<Self, Error> {
        if !url.starts_with("ssl://") && !url.contains("tls") {
            log::warn!("Connecting to Electrum without SSL - insecure for mainnet!");
        }

        let client = electrum_client::Client::new(url)
            .map_err(|e: ElectrumError| Error::Connection(e.to_string()))?;

        Ok(Self { client, network })
    }

    /// Get current blockchain height
    pub fn get_height(&self) -> Result<u32, Error> {
        let header = self.client.block_headers_subscribe()?;
        u32::try_from(header.height).map_err(|_| Error::InvalidHeight(header.height))
    }

    /// Get the network this client is configured for
    pub fn network(&self) -> Network {
        self.network
    }
}

impl ChainTipProvider for ElectrumClient {
    fn block_height(&self) -> Result<u32, Error> {
        self.get_height()
    }
}

/// Read the chain tip without blocking the executor
///
/// Returns `0` when the read fails, so callers can keep going with a
/// wider height range.
pub async fn fetch_block_height<P: ChainTipProvider>(provider: Arc<P>) -> u32 {
    let result = tokio::task::spawn_blocking(move || provider.block_height())
        .await
        .map_err(|e| Error::Unavailable(e.to_string()))
        .and_then(|read| read);

    match result {
        Ok(height) => {
            log::debug!("Chain tip at height {}", height);
            height
        }
        Err(e) => {
            log::warn!("Failed to get block height, using 0: {}", e);
            0
        }
    }
}

/// Default Electrum servers for each network
pub fn default_server(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => "ssl://electrum.blockstream.info:60002",
        Network::Testnet => "ssl://electrum.blockstream.info:60004",
        Network::Signet => "ssl://mempool.space:60602",
        Network::Regtest => "tcp://127.0.0.1:60401",
        _ => "ssl://electrum.blockstream.info:60002",
    }
}
