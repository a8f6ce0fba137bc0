#![no_main]

use globalchat_wire::chat::{ChatHistory, InboundPayload, MAX_HISTORY_PER_CHANNEL};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Classification must never panic, and applying the result must keep
    // every channel within the history cap.
    if let Ok(payload) = InboundPayload::parse(text) {
        let mut history = ChatHistory::new();
        history.apply(payload);
        for channel in history.channels() {
            assert!(history.len(channel) <= MAX_HISTORY_PER_CHANNEL);
        }
    }
});
