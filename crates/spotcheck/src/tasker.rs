//! Round documents and task selection.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spotcheck_fetch::{HttpClient, collect_body, error_chain};

use crate::error::TaskerError;

pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(10);

/// One CID that one miner is expected to serve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalTask {
    pub cid:      String,
    #[serde(alias = "miner_id")]
    pub miner_id: String,
}

impl RetrievalTask {
    pub fn new(cid: impl Into<String>, miner_id: impl Into<String>) -> Self {
        Self {
            cid:      cid.into(),
            miner_id: miner_id.into(),
        }
    }
}

impl fmt::Display for RetrievalTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}@{}", self.cid, self.miner_id) }
}

/// A round document. Everything besides the task list is kept as opaque
/// metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub retrieval_tasks: Vec<RetrievalTask>,
    #[serde(flatten)]
    pub metadata:        serde_json::Map<String, serde_json::Value>,
}

/// Where round documents come from.
pub trait RoundSource: Send + Sync {
    /// Fetch round `round_id`, or the current round when `None`.
    fn fetch_round(&self, round_id: Option<u64>) -> impl Future<Output = Result<Round, TaskerError>> + Send;
}

/// Which tasks of a round to execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub round_id:  Option<u64>,
    /// Keep only this miner's tasks.
    pub miner_id:  Option<String>,
    /// Non-positive means no cap.
    pub max_tasks: Option<i64>,
}

pub struct Tasker<S> {
    source: S,
}

impl<S: RoundSource> Tasker<S> {
    pub fn new(source: S) -> Self { Self { source } }

    pub async fn get_tasks(&self, query: &TaskQuery) -> Result<Vec<RetrievalTask>, TaskerError> {
        let round = self.source.fetch_round(query.round_id).await?;
        tracing::info!(
            round_id = ?query.round_id,
            tasks = round.retrieval_tasks.len(),
            metadata = %serde_json::Value::Object(round.metadata.clone()),
            "fetched round"
        );

        let tasks = select_tasks(round.retrieval_tasks, query.miner_id.as_deref(), query.max_tasks);
        tracing::info!(selected = tasks.len(), "selected retrieval tasks");
        Ok(tasks)
    }
}

/// Filter by exact miner id, then keep the first `max_tasks` tasks.
///
/// Selection is a deterministic prefix; the relative order of the round is
/// preserved.
pub fn select_tasks(tasks: Vec<RetrievalTask>, miner_id: Option<&str>, max_tasks: Option<i64>) -> Vec<RetrievalTask> {
    let filtered = tasks
        .into_iter()
        .filter(|task| miner_id.is_none_or(|miner_id| task.miner_id == miner_id));

    match max_tasks.and_then(|max| usize::try_from(max).ok()).filter(|max| *max > 0) {
        Some(max) => filtered.take(max).collect(),
        None => filtered.collect(),
    }
}

/// Round documents served by the rounds API.
pub struct HttpRoundSource<C> {
    client:            C,
    rounds_api:        String,
    meridian_contract: String,
    timeout:           Duration,
}

impl<C: HttpClient> HttpRoundSource<C> {
    pub fn new(client: C, rounds_api: impl Into<String>, meridian_contract: impl Into<String>) -> Self {
        Self {
            client,
            rounds_api: rounds_api.into(),
            meridian_contract: meridian_contract.into(),
            timeout: DEFAULT_ROUND_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn round_url(&self, round_id: Option<u64>) -> String {
        let base = self.rounds_api.trim_end_matches('/');
        match round_id {
            Some(round_id) => format!("{base}/rounds/meridian/{}/{round_id}", self.meridian_contract),
            None => format!("{base}/rounds/current"),
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, String> {
        let headers = [("Accept".to_string(), "application/json".to_string())];
        let response = self
            .client
            .get(url, &headers)
            .await
            .map_err(|e| error_chain(&e))?;
        if !response.is_success() {
            return Err(format!("status {}", response.status));
        }
        collect_body(response.body).await.map_err(|e| error_chain(&e))
    }
}

impl<C: HttpClient> RoundSource for HttpRoundSource<C> {
    async fn fetch_round(&self, round_id: Option<u64>) -> Result<Round, TaskerError> {
        let url = self.round_url(round_id);
        tracing::info!(%url, "fetching round");

        let unavailable = |reason: String| TaskerError::SourceUnavailable {
            url: url.clone(),
            reason,
        };

        let body = tokio::time::timeout(self.timeout, self.download(&url))
            .await
            .map_err(|_| unavailable(format!("no response within {:?}", self.timeout)))?
            .map_err(unavailable)?;

        serde_json::from_slice(&body).map_err(|e| unavailable(format!("invalid round document: {e}")))
    }
}
