//! Routes a prepared invocation to the right collaborator.
//!
//! Classification is a property of the selected function descriptor, not a
//! caller choice: `pure`/`view` goes through `eth_call`, everything else is a
//! signed transaction. All failure modes fold into `CallOutcome` variants so
//! the call-site control flow stays uniform.

use alloy::{
    dyn_abi::{FunctionExt, JsonAbiExt},
    json_abi::{Function, StateMutability},
    primitives::{Address, Bytes, B256},
    rpc::types::{Filter, Log, TransactionReceipt, TransactionRequest},
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    decode,
    error::{explain_revert, RpcFailure},
    registry::AbiRegistry,
    CallOutcome, CallRequest, ReceiptSummary,
};

/// The read-side node collaborator. Implementations return a structured
/// failure so revert reasons never have to be scraped out of error text here.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn call(&self, request: &TransactionRequest) -> Result<Bytes, RpcFailure>;
    async fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64, RpcFailure>;
    async fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcFailure>;
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcFailure>;
}

/// The signing collaborator. The dispatcher never sees key material.
#[async_trait]
pub trait WalletGateway: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<Address>, RpcFailure>;
    async fn sign_and_send(&self, request: TransactionRequest) -> Result<B256, RpcFailure>;
}

#[async_trait]
impl<T: RpcClient + ?Sized> RpcClient for Arc<T> {
    async fn call(&self, request: &TransactionRequest) -> Result<Bytes, RpcFailure> {
        (**self).call(request).await
    }
    async fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64, RpcFailure> {
        (**self).estimate_gas(request).await
    }
    async fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, RpcFailure> {
        (**self).get_transaction_receipt(hash).await
    }
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcFailure> {
        (**self).get_logs(filter).await
    }
}

#[async_trait]
impl<T: WalletGateway + ?Sized> WalletGateway for Arc<T> {
    async fn request_accounts(&self) -> Result<Vec<Address>, RpcFailure> {
        (**self).request_accounts().await
    }
    async fn sign_and_send(&self, request: TransactionRequest) -> Result<B256, RpcFailure> {
        (**self).sign_and_send(request).await
    }
}

pub struct Dispatcher<R, W> {
    rpc: R,
    wallet: Option<W>,
    receipt_timeout: Duration,
    poll_interval: Duration,
    write_pending: AtomicBool,
}

impl<R: RpcClient, W: WalletGateway> Dispatcher<R, W> {
    pub fn new(rpc: R, wallet: Option<W>, receipt_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            rpc,
            wallet,
            receipt_timeout,
            poll_interval,
            write_pending: AtomicBool::new(false),
        }
    }

    /// A submitted write whose receipt has not arrived yet. Call-sites use
    /// this to disable re-submission.
    pub fn is_pending(&self) -> bool {
        self.write_pending.load(Ordering::SeqCst)
    }

    pub fn is_write(function: &Function) -> bool {
        !matches!(
            function.state_mutability,
            StateMutability::Pure | StateMutability::View
        )
    }

    /// Dispatch a prepared invocation. Never fails synchronously; every
    /// failure mode is an outcome variant.
    pub async fn dispatch(&self, request: &CallRequest) -> CallOutcome {
        let calldata = match request.function.abi_encode_input(&request.args) {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                return CallOutcome::Failed {
                    message: format!("failed to encode call data: {e}"),
                }
            }
        };

        if Self::is_write(&request.function) {
            self.dispatch_write(request, calldata).await
        } else {
            self.dispatch_read(request, calldata).await
        }
    }

    async fn dispatch_read(&self, request: &CallRequest, calldata: Bytes) -> CallOutcome {
        debug!("read call to {} ({})", request.to, request.function.signature());
        let tx = TransactionRequest::default()
            .to(request.to)
            .input(calldata.into());

        match self.rpc.call(&tx).await {
            Ok(return_data) => match request.function.abi_decode_output(&return_data, false) {
                Ok(values) => CallOutcome::ReadResult {
                    value: decode::render_values(&values),
                },
                Err(e) => CallOutcome::Failed {
                    message: format!("failed to decode return data: {e}"),
                },
            },
            Err(failure) => failure_outcome(failure),
        }
    }

    async fn dispatch_write(&self, request: &CallRequest, calldata: Bytes) -> CallOutcome {
        let Some(wallet) = &self.wallet else {
            return CallOutcome::Failed {
                message: "wallet not connected".to_string(),
            };
        };
        // Claim the single pending-write slot atomically; released again on
        // any path that does not end in a submission.
        if self
            .write_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return CallOutcome::Failed {
                message: "a transaction is already pending confirmation".to_string(),
            };
        }

        let outcome = self.submit_write(request, calldata, wallet).await;
        if !matches!(outcome, CallOutcome::TxSubmitted { .. }) {
            self.write_pending.store(false, Ordering::SeqCst);
        }
        outcome
    }

    async fn submit_write(
        &self,
        request: &CallRequest,
        calldata: Bytes,
        wallet: &W,
    ) -> CallOutcome {
        let from = match request.from {
            Some(from) => from,
            None => match wallet.request_accounts().await {
                Ok(accounts) => match accounts.first() {
                    Some(account) => *account,
                    None => {
                        return CallOutcome::Failed {
                            message: "wallet returned no accounts".to_string(),
                        }
                    }
                },
                Err(failure) => return failure_outcome(failure),
            },
        };

        let tx = TransactionRequest::default()
            .from(from)
            .to(request.to)
            .input(calldata.into());

        // Pre-flight revert check: a call known to fail never reaches the
        // wallet, so no gas is spent on it.
        match self.rpc.estimate_gas(&tx).await {
            Ok(gas) => debug!("gas estimate for {}: {}", request.function.signature(), gas),
            Err(RpcFailure::Reverted { reason, data }) => {
                return CallOutcome::Reverted {
                    reason: explain_revert(reason.as_deref(), data.as_ref()),
                }
            }
            Err(failure @ RpcFailure::Transport(_)) => return failure_outcome(failure),
        }

        match wallet.sign_and_send(tx).await {
            Ok(hash) => {
                info!("transaction submitted: 0x{:x}", hash);
                CallOutcome::TxSubmitted { hash }
            }
            Err(failure) => failure_outcome(failure),
        }
    }

    /// Await the receipt of a submitted write and decode its logs. Bounded by
    /// the configured timeout so a silent node cannot hang the session.
    pub async fn confirm(&self, registry: &AbiRegistry, hash: B256) -> CallOutcome {
        let awaited = tokio::time::timeout(self.receipt_timeout, self.await_receipt(hash)).await;
        self.write_pending.store(false, Ordering::SeqCst);

        match awaited {
            Err(_) => {
                warn!("no receipt for 0x{:x} within {:?}", hash, self.receipt_timeout);
                CallOutcome::Failed {
                    message: format!(
                        "timeout: no receipt for 0x{hash:x} after {}s; the transaction may still confirm later",
                        self.receipt_timeout.as_secs()
                    ),
                }
            }
            Ok(Err(failure)) => failure_outcome(failure),
            Ok(Ok(receipt)) => {
                if !receipt.status() {
                    return CallOutcome::Reverted {
                        reason: explain_revert(None, None),
                    };
                }
                let events = decode::decode_receipt(registry, &receipt);
                CallOutcome::TxConfirmed {
                    receipt: ReceiptSummary::from_receipt(&receipt),
                    events,
                }
            }
        }
    }

    async fn await_receipt(&self, hash: B256) -> Result<TransactionReceipt, RpcFailure> {
        loop {
            if let Some(receipt) = self.rpc.get_transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Query historical logs and decode each entry; one undecodable log never
    /// drops the batch.
    pub async fn query_events(
        &self,
        registry: &AbiRegistry,
        filter: &Filter,
    ) -> Result<Vec<super::DecodedEvent>, RpcFailure> {
        let logs = self.rpc.get_logs(filter).await?;
        debug!("fetched {} logs", logs.len());
        Ok(logs
            .iter()
            .map(|log| decode::decode_log(registry, log))
            .collect())
    }
}

fn failure_outcome(failure: RpcFailure) -> CallOutcome {
    match failure {
        RpcFailure::Reverted { reason, data } => CallOutcome::Reverted {
            reason: explain_revert(reason.as_deref(), data.as_ref()),
        },
        RpcFailure::Transport(message) => CallOutcome::Failed {
            message: format!("RPC transport error: {message}; the node may be unreachable, retry is safe"),
        },
    }
}
