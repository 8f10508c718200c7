//! Home feed regeneration flags.
//!
//! Feed fan-out lives elsewhere; this module only reads and clears the flags
//! that mark a feed as still being rebuilt.

use std::collections::BTreeSet;

use parking_lot::RwLock;

use crate::types::SyncResult;

/// Key-value flags keyed by string, e.g. a Redis keyspace.
pub trait RegenerationFlags: Send + Sync {
    fn exists(&self, key: &str) -> bool;
    fn set(&self, key: &str);
    fn delete(&self, key: &str);
}

/// Flags held in memory.
#[derive(Default)]
pub struct MemoryFlags {
    keys: RwLock<BTreeSet<String>>,
}

impl MemoryFlags {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegenerationFlags for MemoryFlags {
    fn exists(&self, key: &str) -> bool {
        self.keys.read().contains(key)
    }

    fn set(&self, key: &str) {
        self.keys.write().insert(key.to_string());
    }

    fn delete(&self, key: &str) {
        self.keys.write().remove(key);
    }
}

/// An account's home feed, or one of its filtered variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeFeed {
    pub account_id: u64,
    /// `Some("media")` for the media-only feed.
    pub subtype: Option<&'static str>,
}

impl HomeFeed {
    pub fn new(account_id: u64) -> Self {
        Self {
            account_id,
            subtype: None,
        }
    }

    pub fn media(account_id: u64) -> Self {
        Self {
            account_id,
            subtype: Some("media"),
        }
    }

    /// Flag key, `account:{id}:regeneration` or `account:{id}:{subtype}:regeneration`.
    pub fn regeneration_key(&self) -> String {
        match self.subtype {
            Some(subtype) => format!("account:{}:{}:regeneration", self.account_id, subtype),
            None => format!("account:{}:regeneration", self.account_id),
        }
    }

    pub fn regenerating(&self, flags: &dyn RegenerationFlags) -> bool {
        flags.exists(&self.regeneration_key())
    }
}

/// Populate an account's feeds, then clear both regeneration flags.
///
/// The flags are cleared even when `populate` fails so readers never wait on
/// a rebuild that is no longer running.
pub fn precompute_feed<F>(flags: &dyn RegenerationFlags, account_id: u64, populate: F) -> SyncResult<()>
where
    F: FnOnce() -> SyncResult<()>,
{
    let result = populate();
    flags.delete(&HomeFeed::new(account_id).regeneration_key());
    flags.delete(&HomeFeed::media(account_id).regeneration_key());
    if let Err(e) = &result {
        log::warn!("Precomputing feed for account {} failed: {}", account_id, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SyncError;

    #[test]
    fn flags_clear_even_when_population_fails() {
        let flags = MemoryFlags::new();
        let home = HomeFeed::new(42);
        let media = HomeFeed::media(42);
        flags.set(&home.regeneration_key());
        flags.set(&media.regeneration_key());
        assert!(home.regenerating(&flags));
        assert_eq!(media.regeneration_key(), "account:42:media:regeneration");

        let result = precompute_feed(&flags, 42, || Err(SyncError::Source("down".into())));
        assert!(result.is_err());
        assert!(!home.regenerating(&flags));
        assert!(!media.regenerating(&flags));
    }
}
