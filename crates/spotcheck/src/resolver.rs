//! Miner id to peer id resolution.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use spotcheck_fetch::{Backoff, HttpClient, collect_body, error_chain};

use crate::error::ResolveError;

/// Upper bound on a single JSON-RPC round trip.
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

pub trait PeerIdResolver: Send + Sync {
    fn resolve_peer_id(&self, miner_id: &str) -> impl Future<Output = Result<String, ResolveError>> + Send;
}

/// Resolves every miner to the same, already known, peer id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPeerId(pub String);

impl PeerIdResolver for FixedPeerId {
    async fn resolve_peer_id(&self, _miner_id: &str) -> Result<String, ResolveError> { Ok(self.0.clone()) }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<MinerInfo>,
    error:  Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code:    i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MinerInfo {
    peer_id: Option<String>,
}

/// Outcome of one attempt.
enum CallError {
    /// Answered, but not with a peer id. Retrying will not help.
    Rpc(String),
    /// No usable answer. Worth retrying.
    Unavailable(String),
}

/// Reads the peer id from `Filecoin.StateMinerInfo`.
pub struct RpcPeerIdResolver<C> {
    client:  C,
    url:     String,
    auth:    Option<String>,
    backoff: Backoff,
}

impl<C: HttpClient> RpcPeerIdResolver<C> {
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            auth: None,
            backoff: Backoff::default(),
        }
    }

    /// Bearer token sent with every call.
    pub fn auth(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(token.into());
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    async fn call_state_miner_info(&self, miner_id: &str) -> Result<String, CallError> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "Filecoin.StateMinerInfo",
            "params": [miner_id, null],
        });

        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(token) = &self.auth {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        let exchange = async {
            let response = self
                .client
                .post(&self.url, &headers, Bytes::from(request.to_string()))
                .await
                .map_err(|e| CallError::Unavailable(error_chain(&e)))?;
            if !response.is_success() {
                return Err(CallError::Unavailable(format!("status {}", response.status)));
            }
            collect_body(response.body)
                .await
                .map_err(|e| CallError::Unavailable(error_chain(&e)))
        };
        let body = tokio::time::timeout(RPC_TIMEOUT, exchange)
            .await
            .map_err(|_| CallError::Unavailable(format!("no response within {RPC_TIMEOUT:?}")))??;

        let response: RpcResponse = serde_json::from_slice(&body)
            .map_err(|e| CallError::Unavailable(format!("invalid JSON-RPC response: {e}")))?;
        if let Some(error) = response.error {
            return Err(CallError::Rpc(format!("{} (code {})", error.message, error.code)));
        }

        response
            .result
            .and_then(|info| info.peer_id)
            .filter(|peer_id| !peer_id.is_empty())
            .ok_or_else(|| CallError::Rpc("miner info has no PeerId".to_string()))
    }
}

impl<C: HttpClient> PeerIdResolver for RpcPeerIdResolver<C> {
    async fn resolve_peer_id(&self, miner_id: &str) -> Result<String, ResolveError> {
        let mut attempt = 0;
        loop {
            match self.call_state_miner_info(miner_id).await {
                Ok(peer_id) => return Ok(peer_id),
                Err(CallError::Rpc(message)) => {
                    return Err(ResolveError::Rpc {
                        miner_id: miner_id.to_string(),
                        message,
                    });
                }
                Err(CallError::Unavailable(reason)) => match self.backoff.delay_after(attempt) {
                    Some(delay) => {
                        tracing::debug!(miner_id, attempt, ?delay, %reason, "retrying peer id lookup");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        return Err(ResolveError::Unavailable {
                            miner_id: miner_id.to_string(),
                            attempts: attempt + 1,
                            reason,
                        });
                    }
                },
            }
        }
    }
}
