//! Alloy-backed implementations of the node and signing collaborators.
//!
//! Everything network-facing lives here; the core modules only see the
//! `RpcClient`/`WalletGateway` traits and the structured `RpcFailure` shape.

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Bytes, B256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{Filter, Log, TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::{
        http::{Client, Http},
        RpcError, TransportErrorKind,
    },
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::str::FromStr;
use tracing::debug;

use super::{
    dispatch::{RpcClient, WalletGateway},
    error::RpcFailure,
};

/// Read-side JSON-RPC collaborator over HTTP.
#[derive(Debug)]
pub struct HttpRpc {
    provider: RootProvider<Http<Client>>,
}

impl HttpRpc {
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|e| anyhow!("invalid RPC URL '{}': {}", rpc_url, e))?,
        );
        Ok(Self { provider })
    }

    /// Cheap connectivity probe; returns the current block number.
    pub async fn check_connection(&self) -> Result<u64> {
        let block = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| anyhow!("cannot reach RPC endpoint: {}", into_failure(e)))?;
        debug!("connected, head block {}", block);
        Ok(block)
    }
}

#[async_trait]
impl RpcClient for HttpRpc {
    async fn call(&self, request: &TransactionRequest) -> Result<Bytes, RpcFailure> {
        self.provider.call(request).await.map_err(into_failure)
    }

    async fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64, RpcFailure> {
        self.provider
            .estimate_gas(request)
            .await
            .map_err(into_failure)
    }

    async fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcFailure> {
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(into_failure)
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcFailure> {
        self.provider.get_logs(filter).await.map_err(into_failure)
    }
}

/// Signing collaborator backed by a local private key. Key material stays in
/// the signer; the dispatcher only ever sees addresses and hashes.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
    rpc_url: String,
}

impl LocalWallet {
    pub fn from_private_key(private_key: &str, rpc_url: &str) -> Result<Self> {
        let trimmed = private_key.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let signer = PrivateKeySigner::from_str(trimmed)
            .map_err(|e| anyhow!("invalid private key: {}", e))?;
        Ok(Self {
            signer,
            rpc_url: rpc_url.to_string(),
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl WalletGateway for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, RpcFailure> {
        Ok(vec![self.signer.address()])
    }

    async fn sign_and_send(&self, request: TransactionRequest) -> Result<B256, RpcFailure> {
        let url = self.rpc_url.parse().map_err(|e| {
            RpcFailure::Transport(format!("invalid RPC URL '{}': {}", self.rpc_url, e))
        })?;
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(url);

        let pending = provider
            .send_transaction(request)
            .await
            .map_err(into_failure)?;
        Ok(*pending.tx_hash())
    }
}

/// Map a transport error into the structured failure shape. A JSON-RPC error
/// payload mentioning a revert (or carrying revert data) becomes `Reverted`
/// with whatever reason and data the node included; everything else is a
/// plain transport failure.
fn into_failure(err: RpcError<TransportErrorKind>) -> RpcFailure {
    if let Some(payload) = err.as_error_resp() {
        let message = payload.message.to_string();
        let data = payload
            .data
            .as_ref()
            .and_then(|raw| serde_json::from_str::<String>(raw.get()).ok())
            .and_then(|s| hex::decode(s.trim_start_matches("0x")).ok())
            .map(Bytes::from);
        if message.contains("revert") || data.is_some() {
            let reason = message
                .find("execution reverted")
                .map(|at| {
                    message[at + "execution reverted".len()..]
                        .trim_start_matches(':')
                        .trim()
                        .to_string()
                })
                .filter(|reason| !reason.is_empty());
            return RpcFailure::Reverted { reason, data };
        }
        return RpcFailure::Transport(message);
    }
    RpcFailure::Transport(err.to_string())
}
