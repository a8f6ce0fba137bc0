#![no_main]

use globalchat_wire::client::Endpoint;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(endpoint) = Endpoint::parse(text) {
        assert!(!endpoint.host.is_empty());
        assert!(endpoint.port != 0);
        assert!(endpoint.target.starts_with('/'));
    }
});
