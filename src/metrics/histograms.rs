//! Histogram metrics

use super::labels;
use std::time::Duration;

/// Record time from attempt start to an open channel
pub fn handshake_duration(elapsed: Duration) {
    ::metrics::histogram!(labels::HANDSHAKE_DURATION).record(elapsed.as_secs_f64() * 1000.0);
}
