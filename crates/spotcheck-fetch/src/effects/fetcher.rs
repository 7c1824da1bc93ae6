use chrono::Utc;
use futures_util::StreamExt;
use spotcheck_verify::{Completeness, Hasher, Sha256Hasher, multihash_hex, verify_car};
use tokio::time::{Instant, Sleep};

use crate::core::{build_url, classify};
use crate::data::{Append, CarBuffer, ChunkProgress, FetchOptions, RetrievalRequest, SubMeasurement};
use crate::effects::http::{BoxStream, HttpClient, error_chain};
use crate::error::{FetchError, Result};

/// Longest error body excerpt written to the log.
const ERROR_BODY_LIMIT: usize = 1000;

/// Retrieves CARs and turns every outcome into a [`SubMeasurement`].
///
/// Nothing here returns an error to the caller: transport failures, stalls,
/// non-2xx responses and integrity violations all end up as a status code on
/// the measurement.
pub struct CarFetcher<C: HttpClient> {
    client: C,
}

impl<C: HttpClient> CarFetcher<C> {
    pub fn new(client: C) -> Self { Self { client } }

    pub fn client(&self) -> &C { &self.client }

    /// Build the URL for `request` and fetch it.
    ///
    /// An address that cannot be turned into a URL is recorded as a 7xx
    /// failure without any network activity.
    pub async fn retrieve(&self, request: &RetrievalRequest, options: &FetchOptions) -> SubMeasurement {
        let mut stats = SubMeasurement::default();
        match build_url(request) {
            Ok(url) => self.fetch_car(&url, &request.cid, options, &mut stats).await,
            Err(err) => {
                let err = FetchError::from(err);
                tracing::warn!(address = %request.address, error = %err, "cannot build retrieval url");
                stats.record_failure(classify(&err));
            }
        }
        stats
    }

    /// Fetch `url` and verify the returned archive against `cid`.
    ///
    /// Fills in timings, byte counts, the response status and, when every
    /// received block verifies, the archive checksum.
    pub async fn fetch_car(&self, url: &str, cid: &str, options: &FetchOptions, stats: &mut SubMeasurement) {
        tracing::debug!(url, cid, "fetching CAR");
        stats.start_at = Some(Utc::now());

        if let Err(err) = self.try_fetch_car(url, cid, options, stats).await {
            if matches!(err, FetchError::Timeout(_)) {
                stats.timeout = true;
            }
            let code = classify(&err);
            tracing::error!(url, cid, code, error = %err, "failed to fetch CAR");
            stats.record_failure(code);
        }

        stats.end_at = Some(Utc::now());
    }

    async fn try_fetch_car(
        &self,
        url: &str,
        cid: &str,
        options: &FetchOptions,
        stats: &mut SubMeasurement,
    ) -> Result<()> {
        let idle = options.idle_timeout;
        let watchdog = tokio::time::sleep(idle);
        tokio::pin!(watchdog);

        let response = tokio::select! {
            response = self.client.get(url, &options.headers) => response.map_err(transport)?,
            () = &mut watchdog => return Err(FetchError::Timeout(idle)),
        };

        stats.record_status(response.status);
        if !response.is_success() {
            let status = response.status;
            watchdog.as_mut().reset(Instant::now() + idle);
            let excerpt = read_error_body(response.body, watchdog).await;
            tracing::warn!(url, status, body = %excerpt, "retrieval rejected by provider");
            return Ok(());
        }

        let mut body = response.body;
        let mut buffer = CarBuffer::new(options.max_car_size);
        let mut hasher = Sha256Hasher::new();
        let mut completeness = Completeness::Complete;

        watchdog.as_mut().reset(Instant::now() + idle);
        loop {
            let next = tokio::select! {
                next = body.next() => next,
                () = &mut watchdog => return Err(FetchError::Timeout(idle)),
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(transport)?;
            watchdog.as_mut().reset(Instant::now() + idle);

            if stats.first_byte_at.is_none() {
                stats.first_byte_at = Some(Utc::now());
            }
            stats.byte_length += chunk.len() as u64;
            if let Some(on_chunk) = &options.on_chunk {
                on_chunk(&ChunkProgress {
                    chunk_len:   chunk.len(),
                    byte_length: stats.byte_length,
                });
            }

            match buffer.append(&chunk) {
                Append::Fit => hasher.update(&chunk),
                Append::Overflow { kept } => {
                    hasher.update(&chunk[..kept]);
                    stats.car_too_large = true;
                    completeness = Completeness::Truncated;
                    tracing::warn!(url, limit = buffer.limit(), "CAR exceeds size cap, reading stopped");
                    break;
                }
            }

            if options.max_byte_length.is_some_and(|max| stats.byte_length > max) {
                tracing::debug!(url, byte_length = stats.byte_length, "byte cutoff reached");
                completeness = Completeness::Truncated;
                break;
            }
        }
        drop(body);

        let summary = verify_car(buffer.as_slice(), cid, completeness).await?;
        stats.car_checksum = Some(multihash_hex(&hasher.finalize()));
        tracing::debug!(
            url,
            blocks = summary.blocks,
            truncated = summary.truncated_tail,
            byte_length = stats.byte_length,
            "CAR verified"
        );
        Ok(())
    }
}

fn transport<E: std::error::Error + 'static>(err: E) -> FetchError {
    FetchError::Transport(error_chain(&err))
}

/// Read the start of an error response for logging, giving up on stalls and
/// on transport errors.
async fn read_error_body<E>(
    mut body: BoxStream<'static, std::result::Result<bytes::Bytes, E>>,
    mut watchdog: std::pin::Pin<&mut Sleep>,
) -> String {
    let mut excerpt = Vec::new();
    while excerpt.len() < ERROR_BODY_LIMIT {
        let next = tokio::select! {
            next = body.next() => next,
            () = &mut watchdog => break,
        };
        match next {
            Some(Ok(chunk)) => excerpt.extend_from_slice(&chunk),
            Some(Err(_)) | None => break,
        }
    }
    excerpt.truncate(ERROR_BODY_LIMIT);
    String::from_utf8_lossy(&excerpt).into_owned()
}
