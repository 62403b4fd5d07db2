//! Utility functions for the session service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique connection ID
pub fn generate_conn_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Format remaining clock time as `minutes:seconds`.
///
/// Minutes are unpadded; seconds are zero-padded to two digits.
pub fn format_clock(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    format!("{}:{:02}", minutes, seconds)
}

/// Normalize a piece-name list for cross-sending to the opposing client:
/// internal whitespace stripped, lowercased.
pub fn normalize_piece_names(pieces: &[String]) -> Vec<String> {
    pieces
        .iter()
        .map(|piece| {
            piece
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase()
        })
        .collect()
}
