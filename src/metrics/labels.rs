//! Metric names and label keys

/// Connection attempts started
pub const CONNECTIONS_ATTEMPTED: &str = "globalchat_wire_connections_attempted_total";
/// Connections that reached Open
pub const CONNECTIONS_ESTABLISHED: &str = "globalchat_wire_connections_established_total";
/// Connections that failed, labelled by stage
pub const CONNECTIONS_FAILED: &str = "globalchat_wire_connections_failed_total";
/// Inbound messages delivered to the message handler
pub const MESSAGES_RECEIVED: &str = "globalchat_wire_messages_received_total";
/// Outbound payloads written to the wire
pub const MESSAGES_SENT: &str = "globalchat_wire_messages_sent_total";
/// Outbound payloads dropped after a write failure
pub const PAYLOADS_DISCARDED: &str = "globalchat_wire_payloads_discarded_total";
/// Inbound chat payloads that could not be parsed
pub const PARSE_ERRORS: &str = "globalchat_wire_parse_errors_total";
/// Time from attempt start to an open channel
pub const HANDSHAKE_DURATION: &str = "globalchat_wire_handshake_duration_ms";

/// Label key for the failing stage
pub const STAGE: &str = "stage";
/// Label key for the kind of unparsable payload
pub const KIND: &str = "kind";

/// Whole payload was not valid JSON
pub const KIND_PAYLOAD: &str = "payload";
/// One entry of a history snapshot was unusable
pub const KIND_SNAPSHOT_ENTRY: &str = "snapshot_entry";
