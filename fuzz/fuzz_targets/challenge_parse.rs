#![no_main]

use libfuzzer_sys::fuzz_target;
use mapi_protocol::protocol::challenge::Challenge;
use mapi_protocol::protocol::handshake::{build_login_response, Login};
use mapi_protocol::protocol::registry::HandlerRegistry;
use mapi_protocol::protocol::response::classify;
use mapi_protocol::session::Credentials;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    let _ = classify(line);

    let Ok(challenge) = Challenge::parse(line) else {
        return;
    };
    let Ok(version) = challenge.version() else {
        return;
    };

    let registry = HandlerRegistry::with_defaults();
    if let Some(handler) = registry.get(version) {
        let creds = Credentials::new("monetdb", "monetdb");
        let login = Login {
            credentials: &creds,
            database: "demo",
            hash_override: None,
        };
        // Errors are fine, panics are not
        let _ = build_login_response(handler, &challenge, &login);
    }
});
