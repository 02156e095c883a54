// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token persistence: load/save to JSON file with atomic writes.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Persisted token state.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PersistedTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<PersistedEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<PersistedEntry>,
}

/// A single stored token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub value: String,
    /// Expiry as epoch seconds.
    #[serde(default)]
    pub expires_at: u64,
}

/// Load persisted tokens from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<PersistedTokens> {
    let contents = std::fs::read_to_string(path)?;
    let tokens: PersistedTokens = serde_json::from_str(&contents)?;
    Ok(tokens)
}

/// Save persisted tokens to a JSON file atomically (write tmp + rename).
///
/// The temp name carries the PID and a counter so concurrent saves never
/// share a `.tmp` file; a shorter write landing on a longer one would leave
/// trailing bytes behind.
pub fn save(path: &Path, tokens: &PersistedTokens) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(tokens)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
