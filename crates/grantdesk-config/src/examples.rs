// grantdesk-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for Grantdesk configuration. Output is deterministic
//! and kept in sync with the config model's defaults and limits.

/// Returns a canonical example `grantdesk.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 5308416

[database]
path = "grantdesk.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[documents]
root = "documents"
public_base_url = "/documents"

[auth]
session_ttl_ms = 86400000
reset_ttl_ms = 3600000

[notify]
queue_capacity = 1024
"#,
    )
}
