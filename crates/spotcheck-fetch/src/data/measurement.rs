use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one retrieval attempt (the `block` probe or the full fetch).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubMeasurement {
    /// The idle watchdog fired before the transfer finished.
    pub timeout:       bool,
    pub start_at:      Option<DateTime<Utc>>,
    pub first_byte_at: Option<DateTime<Utc>>,
    pub end_at:        Option<DateTime<Utc>>,
    /// Bytes received from the response body, including any chunk that was
    /// only partially buffered.
    pub byte_length:   u64,
    /// The absolute buffer cap was reached and reading stopped early.
    pub car_too_large: bool,
    /// `1220<hex sha2-256>` of the buffered archive, set only when every
    /// block verified.
    pub car_checksum:  Option<String>,
    pub status_code:   Option<u16>,
}

impl SubMeasurement {
    /// Record the status line of a response.
    pub fn record_status(&mut self, status: u16) { self.status_code = Some(status); }

    /// Record a classified failure.
    ///
    /// Only an unset status or a 200 placeholder is replaced; an earlier
    /// terminal status is kept.
    pub fn record_failure(&mut self, code: u16) {
        if matches!(self.status_code, None | Some(200)) {
            self.status_code = Some(code);
        }
    }

    pub fn is_success(&self) -> bool { self.status_code == Some(200) && self.car_checksum.is_some() }
}
