//! Counter metrics

use super::labels;
use crate::Stage;

/// Record a connection attempt
pub fn connection_attempted() {
    ::metrics::counter!(labels::CONNECTIONS_ATTEMPTED).increment(1);
}

/// Record a connection that reached Open
pub fn connection_established() {
    ::metrics::counter!(labels::CONNECTIONS_ESTABLISHED).increment(1);
}

/// Record a terminal failure at `stage`
pub fn connection_failed(stage: Stage) {
    ::metrics::counter!(labels::CONNECTIONS_FAILED, labels::STAGE => stage.as_str()).increment(1);
}

/// Record one inbound message delivery
pub fn message_received() {
    ::metrics::counter!(labels::MESSAGES_RECEIVED).increment(1);
}

/// Record one completed outbound write
pub fn message_sent() {
    ::metrics::counter!(labels::MESSAGES_SENT).increment(1);
}

/// Record payloads dropped from the outbound queue
pub fn payloads_discarded(count: usize) {
    if count > 0 {
        ::metrics::counter!(labels::PAYLOADS_DISCARDED).increment(count as u64);
    }
}

/// Record an inbound payload (or part of one) that failed to parse
pub fn parse_error(kind: &'static str) {
    ::metrics::counter!(labels::PARSE_ERRORS, labels::KIND => kind).increment(1);
}
