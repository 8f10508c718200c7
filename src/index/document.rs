//! Search documents built from source records.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde_json::{json, Value};

use crate::types::{format_timestamp, Account, Record, Status, Tag};

/// Build the document indexed for `record`.
pub fn build_document(record: &Record) -> Value {
    match record {
        Record::Account(account) => account_document(account),
        Record::Tag(tag) => tag_document(tag),
        Record::Status(status) => status_document(status),
    }
}

fn account_document(account: &Account) -> Value {
    json!({
        "id": account.id,
        "acct": account.acct(),
        "display_name": account.display_name,
        "text": account.note,
        "discoverable": account.discoverable,
    })
}

fn tag_document(tag: &Tag) -> Value {
    json!({
        "id": tag.id,
        "name": tag.name,
        "usable": tag.usable,
    })
}

fn status_document(status: &Status) -> Value {
    json!({
        "id": status.id,
        "account_id": status.account_id,
        "account_domain": status.account_domain,
        "text": status.searchable_text(),
        "tags": status.tags,
        "searchable_by": status.eligible_audience(),
        "language": status.language,
        "properties": status.searchable_properties(),
        "visibility": status.visibility.name(),
        "created_at": format_timestamp(clamp_date(status.created_at())),
    })
}

/// Keep dates inside the range the engine's `date` type accepts.
pub fn clamp_date(time: DateTime<Utc>) -> DateTime<Utc> {
    let min = Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).single();
    let max = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).single();
    match (min, max) {
        (Some(min), _) if time.year() < 0 => min,
        (_, Some(max)) if time.year() > 9999 => max,
        _ => time,
    }
}
