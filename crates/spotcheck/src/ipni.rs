//! Retrieval candidates from an IPNI indexer.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use spotcheck_fetch::{HttpClient, Protocol, collect_body, error_chain};

/// Transport codes from the multicodec table, as they lead an advertisement's
/// metadata.
const TRANSPORT_BITSWAP: u64 = 0x0900;
const TRANSPORT_GRAPHSYNC: u64 = 0x0910;
const TRANSPORT_HTTP: u64 = 0x0920;

/// What the indexer said about a (CID, provider) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum IndexerResult {
    /// Advertised over HTTP.
    Ok,
    /// Advertised only over graphsync or bitswap.
    HttpNotAdvertised,
    /// The provider has no usable advertisement for the CID.
    NoValidAdvertisement,
    /// The indexer could not be reached or answered with garbage.
    ErrorFetch,
    /// The indexer answered with this non-success status.
    ErrorStatus(u16),
}

impl IndexerResult {
    /// Whether a retrieval should be attempted.
    pub fn has_candidate(&self) -> bool { matches!(self, IndexerResult::Ok | IndexerResult::HttpNotAdvertised) }
}

impl fmt::Display for IndexerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexerResult::Ok => f.write_str("OK"),
            IndexerResult::HttpNotAdvertised => f.write_str("HTTP_NOT_ADVERTISED"),
            IndexerResult::NoValidAdvertisement => f.write_str("NO_VALID_ADVERTISEMENT"),
            IndexerResult::ErrorFetch => f.write_str("ERROR_FETCH"),
            IndexerResult::ErrorStatus(status) => write!(f, "ERROR_{status}"),
        }
    }
}

impl FromStr for IndexerResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(IndexerResult::Ok),
            "HTTP_NOT_ADVERTISED" => Ok(IndexerResult::HttpNotAdvertised),
            "NO_VALID_ADVERTISEMENT" => Ok(IndexerResult::NoValidAdvertisement),
            "ERROR_FETCH" => Ok(IndexerResult::ErrorFetch),
            other => other
                .strip_prefix("ERROR_")
                .and_then(|status| status.parse().ok())
                .map(IndexerResult::ErrorStatus)
                .ok_or_else(|| format!("unknown indexer result \"{other}\"")),
        }
    }
}

impl From<IndexerResult> for String {
    fn from(result: IndexerResult) -> Self { result.to_string() }
}

impl TryFrom<String> for IndexerResult {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

/// A transport and address a provider advertised for a CID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub protocol: Protocol,
    pub address:  String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexResponse {
    pub indexer_result: IndexerResult,
    pub candidate:      Option<RetrievalCandidate>,
}

impl IndexResponse {
    fn without_candidate(indexer_result: IndexerResult) -> Self {
        Self {
            indexer_result,
            candidate: None,
        }
    }
}

/// Finds how a provider serves a CID.
///
/// Never fails: problems talking to the index are reported through
/// [`IndexerResult`].
pub trait IndexQuery: Send + Sync {
    fn query_index(&self, cid: &str, peer_id: &str) -> impl Future<Output = IndexResponse> + Send;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FindResponse {
    #[serde(default)]
    multihash_results: Vec<MultihashResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MultihashResult {
    #[serde(default)]
    provider_results: Vec<ProviderResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProviderResult {
    #[serde(default)]
    metadata: Option<String>,
    provider: Option<ProviderInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProviderInfo {
    #[serde(rename = "ID")]
    id:    String,
    #[serde(default)]
    addrs: Option<Vec<String>>,
}

/// IPNI `find` client.
pub struct IpniClient<C> {
    client:   C,
    base_url: String,
}

impl<C: HttpClient> IpniClient<C> {
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn find(&self, cid: &str) -> Result<FindResponse, IndexerResult> {
        let url = format!("{}/cid/{cid}", self.base_url.trim_end_matches('/'));
        let headers = [("Accept".to_string(), "application/json".to_string())];

        let response = self.client.get(&url, &headers).await.map_err(|e| {
            tracing::warn!(%url, error = %error_chain(&e), "IPNI query failed");
            IndexerResult::ErrorFetch
        })?;
        if !response.is_success() {
            tracing::debug!(%url, status = response.status, "IPNI query rejected");
            return Err(IndexerResult::ErrorStatus(response.status));
        }

        let body = collect_body(response.body).await.map_err(|e| {
            tracing::warn!(%url, error = %error_chain(&e), "IPNI response interrupted");
            IndexerResult::ErrorFetch
        })?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(%url, error = %e, "IPNI response is not valid JSON");
            IndexerResult::ErrorFetch
        })
    }
}

impl<C: HttpClient> IndexQuery for IpniClient<C> {
    async fn query_index(&self, cid: &str, peer_id: &str) -> IndexResponse {
        match self.find(cid).await {
            Ok(found) => {
                let response = select_candidate(&found, peer_id);
                tracing::debug!(cid, peer_id, result = %response.indexer_result, "IPNI query answered");
                response
            }
            Err(result) => IndexResponse::without_candidate(result),
        }
    }
}

/// Pick the provider's preferred retrieval candidate: any HTTP advertisement
/// wins, then graphsync, then bitswap.
fn select_candidate(found: &FindResponse, peer_id: &str) -> IndexResponse {
    let advertisements: Vec<(u64, &str)> = found
        .multihash_results
        .iter()
        .flat_map(|result| &result.provider_results)
        .filter_map(|result| {
            let provider = result.provider.as_ref().filter(|p| p.id == peer_id)?;
            let address = provider.addrs.as_deref()?.first()?;
            let transport = transport_code(result.metadata.as_deref()?)?;
            Some((transport, address.as_str()))
        })
        .collect();

    let find = |code: u64| advertisements.iter().find(|(transport, _)| *transport == code);

    if let Some((_, address)) = find(TRANSPORT_HTTP) {
        return IndexResponse {
            indexer_result: IndexerResult::Ok,
            candidate:      Some(RetrievalCandidate {
                protocol: Protocol::Http,
                address:  address.to_string(),
            }),
        };
    }

    let fallback = [(TRANSPORT_GRAPHSYNC, Protocol::Graphsync), (TRANSPORT_BITSWAP, Protocol::Bitswap)]
        .into_iter()
        .find_map(|(code, protocol)| find(code).map(|(_, address)| (protocol, *address)));

    match fallback {
        Some((protocol, address)) => IndexResponse {
            indexer_result: IndexerResult::HttpNotAdvertised,
            candidate:      Some(RetrievalCandidate {
                protocol,
                address: format!("{address}/p2p/{peer_id}"),
            }),
        },
        None => IndexResponse::without_candidate(IndexerResult::NoValidAdvertisement),
    }
}

/// Leading transport code of base64 advertisement metadata.
fn transport_code(metadata: &str) -> Option<u64> {
    let bytes = STANDARD.decode(metadata).ok()?;
    read_uvarint(&bytes)
}

/// Decode an unsigned LEB128 varint from the start of `bytes`.
fn read_uvarint(bytes: &[u8]) -> Option<u64> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().take(10).enumerate() {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}
