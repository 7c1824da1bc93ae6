//! The spot check state machine and the run loop.
//!
//! One check walks through resolve provider, find candidate, block
//! retrieval and full retrieval. Only a resolution failure aborts a check;
//! everything after it degrades to a recorded status.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use spotcheck_fetch::{
    CarFetcher, DagScope, EntityBytesRange, FetchOptions, HttpClient, Protocol, RetrievalRequest,
    SubMeasurement,
};

use crate::error::ResolveError;
use crate::ipni::{IndexQuery, IndexerResult, RetrievalCandidate};
use crate::resolver::PeerIdResolver;
use crate::tasker::RetrievalTask;

/// Everything recorded about one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub provider_id:      Option<String>,
    pub indexer_result:   Option<IndexerResult>,
    pub protocol:         Option<Protocol>,
    pub provider_address: Option<String>,
    pub block_retrieval:  SubMeasurement,
    pub full_retrieval:   SubMeasurement,
}

/// A task paired with its measurement, as emitted by [`SpotChecker::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub task:   RetrievalTask,
    pub result: Measurement,
}

/// How the two retrievals of a check are shaped.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Scope of the full retrieval.
    pub dag_scope:          DagScope,
    /// Range of an `entity` scoped full retrieval.
    pub entity_bytes_range: Option<EntityBytesRange>,
    /// Soft cutoff for the full retrieval.
    pub max_byte_length:    Option<u64>,
    /// Shared settings of both retrievals.
    pub fetch:              FetchOptions,
}

impl CheckOptions {
    /// The root block probe.
    pub fn block_request(&self, task: &RetrievalTask, candidate: &RetrievalCandidate) -> RetrievalRequest {
        RetrievalRequest {
            protocol:           candidate.protocol,
            address:            candidate.address.clone(),
            cid:                task.cid.clone(),
            dag_scope:          DagScope::Block,
            entity_bytes_range: None,
        }
    }

    /// The bounded full retrieval.
    pub fn full_request(&self, task: &RetrievalTask, candidate: &RetrievalCandidate) -> RetrievalRequest {
        RetrievalRequest {
            protocol:           candidate.protocol,
            address:            candidate.address.clone(),
            cid:                task.cid.clone(),
            dag_scope:          self.dag_scope,
            entity_bytes_range: self.entity_bytes_range.filter(|_| self.dag_scope == DagScope::Entity),
        }
    }
}

pub type JobCompleted = Arc<dyn Fn() + Send + Sync>;

pub struct SpotChecker<R, I, C: HttpClient> {
    resolver:         R,
    index:            I,
    fetcher:          CarFetcher<C>,
    options:          CheckOptions,
    on_job_completed: Option<JobCompleted>,
}

impl<R, I, C> SpotChecker<R, I, C>
where
    R: PeerIdResolver,
    I: IndexQuery,
    C: HttpClient,
{
    pub fn new(resolver: R, index: I, fetcher: CarFetcher<C>, options: CheckOptions) -> Self {
        Self {
            resolver,
            index,
            fetcher,
            options,
            on_job_completed: None,
        }
    }

    /// Notified, fire-and-forget, after every check that produced a
    /// measurement.
    pub fn on_job_completed<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_job_completed = Some(Arc::new(callback));
        self
    }

    pub fn options(&self) -> &CheckOptions { &self.options }

    /// Check one task.
    ///
    /// Fails only when the miner's peer id cannot be resolved; no
    /// measurement exists in that case.
    pub async fn check(&self, task: &RetrievalTask) -> Result<Measurement, ResolveError> {
        tracing::info!(cid = %task.cid, miner_id = %task.miner_id, "starting spot check");

        let peer_id = match self.resolver.resolve_peer_id(&task.miner_id).await {
            Ok(peer_id) => peer_id,
            Err(err) => {
                match &err {
                    ResolveError::Rpc { .. } => tracing::error!(
                        miner_id = %task.miner_id,
                        error = %err,
                        "unexpected Filecoin RPC error, please report it"
                    ),
                    ResolveError::Unavailable { .. } => {
                        tracing::warn!(miner_id = %task.miner_id, error = %err, "cannot resolve provider")
                    }
                }
                return Err(err);
            }
        };
        tracing::debug!(miner_id = %task.miner_id, %peer_id, "resolved provider");

        let mut measurement = Measurement {
            provider_id: Some(peer_id.clone()),
            ..Default::default()
        };
        self.retrieve(task, &peer_id, &mut measurement).await;

        if let Some(callback) = &self.on_job_completed {
            callback();
        }
        Ok(measurement)
    }

    async fn retrieve(&self, task: &RetrievalTask, peer_id: &str, measurement: &mut Measurement) {
        let response = self.index.query_index(&task.cid, peer_id).await;
        measurement.indexer_result = Some(response.indexer_result);

        let Some(candidate) = response.candidate.filter(|_| response.indexer_result.has_candidate()) else {
            tracing::info!(cid = %task.cid, result = %response.indexer_result, "no retrieval candidate");
            return;
        };
        tracing::info!(
            cid = %task.cid,
            protocol = %candidate.protocol,
            address = %candidate.address,
            "found retrieval candidate"
        );
        measurement.protocol = Some(candidate.protocol);
        measurement.provider_address = Some(candidate.address.clone());

        let block = self.options.block_request(task, &candidate);
        measurement.block_retrieval = self.fetcher.retrieve(&block, &self.options.fetch).await;
        log_retrieval("block", task, &measurement.block_retrieval);

        let full = self.options.full_request(task, &candidate);
        let full_options = self.options.fetch.clone().max_byte_length(self.options.max_byte_length);
        measurement.full_retrieval = self.fetcher.retrieve(&full, &full_options).await;
        log_retrieval("full", task, &measurement.full_retrieval);
    }

    /// Check `tasks` one after another.
    ///
    /// Tasks whose provider cannot be resolved are skipped, and a panic inside
    /// one check is logged without ending the run.
    pub async fn run(&self, tasks: Vec<RetrievalTask>) -> Vec<CheckOutcome> {
        let total = tasks.len();
        let mut outcomes = Vec::with_capacity(total);

        for task in tasks {
            match AssertUnwindSafe(self.check(&task)).catch_unwind().await {
                Ok(Ok(result)) => outcomes.push(CheckOutcome { task, result }),
                Ok(Err(_)) => {}
                Err(panic) => {
                    tracing::error!(%task, panic = panic_message(panic.as_ref()), "spot check panicked")
                }
            }
        }

        tracing::info!(total, measured = outcomes.len(), "run finished");
        outcomes
    }
}

fn log_retrieval(kind: &str, task: &RetrievalTask, stats: &SubMeasurement) {
    tracing::info!(
        kind,
        cid = %task.cid,
        status = ?stats.status_code,
        byte_length = stats.byte_length,
        timeout = stats.timeout,
        checksum = stats.car_checksum.as_deref().unwrap_or("-"),
        "retrieval finished"
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use futures_util::stream;
    use spotcheck_fetch::{BoxStream, HttpResponse};
    use spotcheck_verify::fixtures;

    use super::*;
    use crate::ipni::IndexResponse;

    const PEER: &str = "12D3KooWC8gXxg9LoJ9h3hy3jzBkEAxamyHEQJKtRmAuBuvoMzpr";

    struct Resolver(HashMap<&'static str, Result<&'static str, ResolveError>>);

    impl PeerIdResolver for Resolver {
        async fn resolve_peer_id(&self, miner_id: &str) -> Result<String, ResolveError> {
            match self.0.get(miner_id) {
                Some(Ok(peer_id)) => Ok(peer_id.to_string()),
                Some(Err(err)) => Err(err.clone()),
                None => panic!("no peer id for {miner_id}"),
            }
        }
    }

    fn resolver() -> Resolver {
        Resolver(HashMap::from([
            ("f0frisbii", Ok(PEER)),
            (
                "f0broken",
                Err(ResolveError::Unavailable {
                    miner_id: "f0broken".into(),
                    attempts: 5,
                    reason:   "dns error".into(),
                }),
            ),
        ]))
    }

    struct Index(IndexResponse);

    impl IndexQuery for Index {
        async fn query_index(&self, _cid: &str, peer_id: &str) -> IndexResponse {
            assert_eq!(peer_id, PEER);
            self.0.clone()
        }
    }

    fn http_candidate() -> Index {
        Index(IndexResponse {
            indexer_result: IndexerResult::Ok,
            candidate:      Some(RetrievalCandidate {
                protocol: Protocol::Http,
                address:  "/dns/frisbii.fly.dev/tcp/443/https".into(),
            }),
        })
    }

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct MockError(String);

    #[derive(Default)]
    struct Provider {
        car:        Vec<u8>,
        /// Serve the archive in chunks of this size instead of all at once.
        chunk_size: Option<usize>,
        urls:       Mutex<Vec<String>>,
    }

    impl HttpClient for Provider {
        type Error = MockError;

        async fn get(&self, url: &str, _headers: &[(String, String)]) -> Result<HttpResponse<MockError>, MockError> {
            self.urls.lock().unwrap().push(url.to_string());
            let chunk_size = self.chunk_size.unwrap_or(self.car.len());
            let chunks: Vec<Result<Bytes, MockError>> = self
                .car
                .chunks(chunk_size)
                .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                .collect();
            let body: BoxStream<'static, Result<Bytes, MockError>> = Box::pin(stream::iter(chunks));
            Ok(HttpResponse { status: 200, body })
        }

        async fn post(&self, _url: &str, _headers: &[(String, String)], _body: Bytes) -> Result<HttpResponse<MockError>, MockError> {
            Err(MockError("unused".into()))
        }
    }

    fn provider() -> Provider {
        Provider {
            car: fixtures::hello_car(),
            ..Default::default()
        }
    }

    fn options() -> CheckOptions {
        CheckOptions {
            entity_bytes_range: Some(EntityBytesRange::default()),
            ..Default::default()
        }
    }

    fn task(miner_id: &str) -> RetrievalTask { RetrievalTask::new(fixtures::HELLO_CID, miner_id) }

    #[tokio::test]
    async fn full_check_records_both_retrievals() {
        let completed = Arc::new(AtomicUsize::new(0));
        let counter = completed.clone();
        let checker = SpotChecker::new(resolver(), http_candidate(), CarFetcher::new(provider()), options())
            .on_job_completed(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let measurement = checker.check(&task("f0frisbii")).await.unwrap();

        assert_eq!(measurement.provider_id.as_deref(), Some(PEER));
        assert_eq!(measurement.indexer_result, Some(IndexerResult::Ok));
        assert_eq!(measurement.protocol, Some(Protocol::Http));
        assert_eq!(measurement.provider_address.as_deref(), Some("/dns/frisbii.fly.dev/tcp/443/https"));
        for stats in [&measurement.block_retrieval, &measurement.full_retrieval] {
            assert_eq!(stats.status_code, Some(200));
            assert_eq!(stats.car_checksum.as_deref(), Some(fixtures::HELLO_CAR_CHECKSUM));
        }
        assert_eq!(completed.load(Ordering::SeqCst), 1);

        let urls = checker.fetcher.client().urls.lock().unwrap().clone();
        assert_eq!(
            urls,
            vec![
                format!("https://frisbii.fly.dev/ipfs/{}?dag-scope=block", fixtures::HELLO_CID),
                format!("https://frisbii.fly.dev/ipfs/{}?dag-scope=entity&entity-bytes=0:200", fixtures::HELLO_CID),
            ]
        );
    }

    #[tokio::test]
    async fn all_scope_omits_entity_bytes() {
        let options = CheckOptions {
            dag_scope: DagScope::All,
            ..options()
        };
        let checker = SpotChecker::new(resolver(), http_candidate(), CarFetcher::new(provider()), options);
        checker.check(&task("f0frisbii")).await.unwrap();

        let urls = checker.fetcher.client().urls.lock().unwrap().clone();
        assert_eq!(urls[1], format!("https://frisbii.fly.dev/ipfs/{}?dag-scope=all", fixtures::HELLO_CID));
    }

    #[tokio::test]
    async fn max_byte_length_bounds_only_the_full_retrieval() {
        let options = CheckOptions {
            dag_scope: DagScope::All,
            max_byte_length: Some(120),
            ..options()
        };
        let provider = Provider {
            car: fixtures::two_block_car(),
            chunk_size: Some(10),
            ..Default::default()
        };
        let checker = SpotChecker::new(resolver(), http_candidate(), CarFetcher::new(provider), options);
        let measurement = checker.check(&task("f0frisbii")).await.unwrap();

        assert_eq!(measurement.block_retrieval.byte_length, fixtures::TWO_BLOCK_CAR_LEN as u64);
        assert_eq!(measurement.full_retrieval.byte_length, 130);
        assert_eq!(
            measurement.full_retrieval.car_checksum.as_deref(),
            Some(fixtures::TWO_BLOCK_CAR_PREFIX_130_CHECKSUM)
        );
    }

    #[tokio::test]
    async fn no_candidate_stops_after_index() {
        let index = Index(IndexResponse {
            indexer_result: IndexerResult::NoValidAdvertisement,
            candidate:      None,
        });
        let checker = SpotChecker::new(resolver(), index, CarFetcher::new(provider()), options());
        let measurement = checker.check(&task("f0frisbii")).await.unwrap();

        assert_eq!(measurement.provider_id.as_deref(), Some(PEER));
        assert_eq!(measurement.indexer_result, Some(IndexerResult::NoValidAdvertisement));
        assert_eq!(measurement.protocol, None);
        assert_eq!(measurement.block_retrieval, SubMeasurement::default());
        assert!(checker.fetcher.client().urls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_provider_address_is_measured() {
        let index = Index(IndexResponse {
            indexer_result: IndexerResult::Ok,
            candidate:      Some(RetrievalCandidate {
                protocol: Protocol::Http,
                address:  "/ip4/1.2.3.4/udp/443/https".into(),
            }),
        });
        let checker = SpotChecker::new(resolver(), index, CarFetcher::new(provider()), options());
        let measurement = checker.check(&task("f0frisbii")).await.unwrap();

        assert_eq!(measurement.block_retrieval.status_code, Some(702));
        assert_eq!(measurement.full_retrieval.status_code, Some(702));
    }

    #[tokio::test]
    async fn resolution_failure_aborts_without_measurement() {
        let completed = Arc::new(AtomicUsize::new(0));
        let counter = completed.clone();
        let checker = SpotChecker::new(resolver(), http_candidate(), CarFetcher::new(provider()), options())
            .on_job_completed(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let err = checker.check(&task("f0broken")).await.unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable { .. }));
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_skips_failed_and_panicking_tasks() {
        let checker = SpotChecker::new(resolver(), http_candidate(), CarFetcher::new(provider()), options());
        let tasks = vec![task("f0frisbii"), task("f0broken"), task("f0unknown"), task("f0frisbii")];

        let outcomes = checker.run(tasks).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|outcome| outcome.task.miner_id == "f0frisbii"));
    }

    #[test]
    fn measurement_json_shape() {
        let measurement = Measurement {
            provider_id: Some(PEER.into()),
            indexer_result: Some(IndexerResult::HttpNotAdvertised),
            protocol: Some(Protocol::Graphsync),
            ..Default::default()
        };
        let outcome = CheckOutcome {
            task:   task("f0frisbii"),
            result: measurement,
        };
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["task"]["minerId"], "f0frisbii");
        assert_eq!(json["result"]["providerId"], PEER);
        assert_eq!(json["result"]["indexerResult"], "HTTP_NOT_ADVERTISED");
        assert_eq!(json["result"]["protocol"], "graphsync");
        assert_eq!(json["result"]["blockRetrieval"]["statusCode"], serde_json::Value::Null);
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        let other: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(literal.as_ref()), "boom");
        assert_eq!(panic_message(owned.as_ref()), "owned boom");
        assert_eq!(panic_message(other.as_ref()), "<non-string panic>");
    }
}
