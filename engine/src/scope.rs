//! Workspace and app key handling.
//!
//! A `(workspace key, app key)` pair fully scopes a shared record
//! collection. Both sides normalize raw input before validating, so
//! close-enough user input ("My Team") maps onto its canonical form
//! ("my-team") instead of being rejected.

use crate::error::{Error, Result};

/// Minimum key length after normalization.
pub const MIN_KEY_LEN: usize = 2;

/// Maximum key length after normalization.
pub const MAX_KEY_LEN: usize = 64;

/// Normalize a raw key: trim, lowercase, collapse whitespace runs to a
/// single `-`, strip everything outside `a-z0-9_-`, truncate to 64.
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_KEY_LEN));
    let mut pending_dash = false;

    for ch in raw.trim().to_lowercase().chars() {
        if ch.is_whitespace() {
            pending_dash = true;
            continue;
        }
        if pending_dash {
            out.push('-');
            pending_dash = false;
        }
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_' {
            out.push(ch);
        }
    }

    // Normalized output is pure ASCII, so byte truncation is safe.
    out.truncate(MAX_KEY_LEN);
    out
}

fn is_valid_key(key: &str) -> bool {
    (MIN_KEY_LEN..=MAX_KEY_LEN).contains(&key.len())
        && key
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
}

/// Normalize and validate a workspace key.
pub fn workspace_key(raw: &str) -> Result<String> {
    let key = normalize_key(raw);
    if is_valid_key(&key) {
        Ok(key)
    } else {
        Err(Error::InvalidWorkspaceKey(raw.trim().to_string()))
    }
}

/// Normalize and validate an app key.
pub fn app_key(raw: &str) -> Result<String> {
    let key = normalize_key(raw);
    if is_valid_key(&key) {
        Ok(key)
    } else {
        Err(Error::InvalidAppKey(raw.trim().to_string()))
    }
}
