use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod board;
pub mod chat;
pub mod claim;
pub mod health;
pub mod push;
pub mod roster;
pub mod validation;
pub mod ws;

fn format_epoch_ms(ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|instant| instant.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
