//! Data layer: immutable request, option and measurement types.

mod buffer;
mod measurement;
mod options;
mod request;

pub use self::buffer::{Append, CarBuffer};
pub use self::measurement::SubMeasurement;
pub use self::options::{CAR_MEDIA_TYPE, ChunkProgress, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CAR_SIZE, FetchOptions};
pub use self::request::{DagScope, EntityBytesRange, Protocol, RetrievalRequest};
