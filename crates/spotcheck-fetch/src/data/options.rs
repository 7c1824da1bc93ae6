use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Media type of a CARv1 response from a trustless gateway.
pub const CAR_MEDIA_TYPE: &str = "application/vnd.ipld.car";

/// Absolute cap on the in-memory archive buffer (200 MiB).
pub const DEFAULT_MAX_CAR_SIZE: u64 = 200 * 1024 * 1024;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Reported after every received chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub chunk_len:   usize,
    pub byte_length: u64,
}

/// Configuration for one CAR retrieval.
///
/// # Examples
///
/// ```
/// use spotcheck_fetch::FetchOptions;
/// use std::time::Duration;
///
/// let options = FetchOptions::default()
///     .idle_timeout(Duration::from_secs(10))
///     .max_byte_length(Some(1024 * 1024));
/// ```
#[derive(Clone)]
pub struct FetchOptions {
    /// The transfer is cancelled when no response headers or body chunk
    /// arrive within this window. The timer restarts on every chunk.
    ///
    /// Default: 60s
    pub idle_timeout: Duration,

    /// Hard cap on buffered archive bytes. Bytes past the cap are dropped and
    /// reading stops.
    ///
    /// Default: 200 MiB
    pub max_car_size: u64,

    /// Soft cutoff: once more than this many bytes were received, no further
    /// chunks are read. The archive received so far is still verified.
    ///
    /// Default: None
    pub max_byte_length: Option<u64>,

    /// Headers sent with the request.
    ///
    /// Default: `Accept: application/vnd.ipld.car`
    pub headers: Arc<[(String, String)]>,

    /// Invoked after each received chunk.
    ///
    /// Default: None
    pub on_chunk: Option<Arc<dyn Fn(&ChunkProgress) + Send + Sync>>,
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("idle_timeout", &self.idle_timeout)
            .field("max_car_size", &self.max_car_size)
            .field("max_byte_length", &self.max_byte_length)
            .field("headers", &self.headers)
            .field("on_chunk", &self.on_chunk.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            idle_timeout:    DEFAULT_IDLE_TIMEOUT,
            max_car_size:    DEFAULT_MAX_CAR_SIZE,
            max_byte_length: None,
            headers:         Arc::from(vec![("Accept".to_string(), CAR_MEDIA_TYPE.to_string())]),
            on_chunk:        None,
        }
    }
}

impl FetchOptions {
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn max_car_size(mut self, max_car_size: u64) -> Self {
        self.max_car_size = max_car_size;
        self
    }

    pub fn max_byte_length(mut self, max_byte_length: Option<u64>) -> Self {
        self.max_byte_length = max_byte_length;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = self.headers.to_vec();
        headers.push((key.into(), value.into()));
        self.headers = Arc::from(headers);
        self
    }

    pub fn on_chunk<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ChunkProgress) + Send + Sync + 'static,
    {
        self.on_chunk = Some(Arc::new(callback));
        self
    }
}
