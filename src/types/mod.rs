//! All data types for the search-deploy library.

pub mod error;
pub mod plan;
pub mod record;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

pub use error::{SyncError, SyncResult};
pub use plan::{BulkAck, WriteOp, WritePlan};
pub use record::{Account, EntityType, Record, Status, Tag, Visibility};

/// Default number of records fetched per source page.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Default worker pool size.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Low bits of a snowflake id reserved for the per-millisecond sequence.
pub const SNOWFLAKE_SEQUENCE_BITS: u32 = 16;

/// Returns the current time as Unix epoch milliseconds.
pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Convert a snowflake id into the time it was minted.
pub fn snowflake_to_time(id: u64) -> DateTime<Utc> {
    let millis = (id >> SNOWFLAKE_SEQUENCE_BITS) as i64;
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Smallest snowflake id minted at `time`.
pub fn time_to_snowflake(time: DateTime<Utc>) -> u64 {
    (time.timestamp_millis().max(0) as u64) << SNOWFLAKE_SEQUENCE_BITS
}

/// RFC 3339 with second precision, the form used by `after:`/`before:`.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
