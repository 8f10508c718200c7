//! Canonical records read from the source of truth.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::snowflake_to_time;

/// The closed set of entity types that have a search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Local and remote accounts.
    Accounts,
    /// Hashtags.
    Tags,
    /// Posts.
    Statuses,
}

impl EntityType {
    /// All entity types, smallest expected index first.
    pub const ALL: [EntityType; 3] = [Self::Accounts, Self::Tags, Self::Statuses];

    /// Return the logical index name for this entity type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accounts => "accounts",
            Self::Tags => "tags",
            Self::Statuses => "statuses",
        }
    }

    /// Parse an entity type from its index name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "accounts" => Some(Self::Accounts),
            "tags" => Some(Self::Tags),
            "statuses" => Some(Self::Statuses),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Who a status was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Visibility {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
            Self::Direct => "direct",
        }
    }
}

/// An account row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub username: String,
    /// `None` for local accounts.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub discoverable: bool,
    #[serde(default)]
    pub suspended: bool,
}

impl Account {
    /// The account's handle as it appears in `from:@` operators.
    pub fn acct(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}@{}", self.username, domain),
            None => self.username.clone(),
        }
    }
}

/// A hashtag row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub name: String,
    #[serde(default = "default_true")]
    pub usable: bool,
}

fn default_true() -> bool {
    true
}

/// A status row with its preloaded local interactions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Status {
    /// Snowflake id; the upper bits encode creation time.
    pub id: u64,
    pub account_id: u64,
    /// Author's domain, `None` when the author is local.
    #[serde(default)]
    pub account_domain: Option<String>,
    pub text: String,
    #[serde(default)]
    pub spoiler_text: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub reblog_of_id: Option<u64>,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default)]
    pub has_poll: bool,
    #[serde(default)]
    pub has_link: bool,
    /// Soft-deleted.
    #[serde(default)]
    pub deleted: bool,
    /// Removed from discovery by moderation.
    #[serde(default)]
    pub moderated: bool,
    #[serde(default)]
    pub mentioned: Vec<u64>,
    #[serde(default)]
    pub favourited_by: Vec<u64>,
    #[serde(default)]
    pub reblogged_by: Vec<u64>,
    #[serde(default)]
    pub bookmarked_by: Vec<u64>,
    #[serde(default)]
    pub poll_voters: Vec<u64>,
}

impl Status {
    /// Whether the author lives on this instance.
    pub fn is_local(&self) -> bool {
        self.account_domain.is_none()
    }

    /// Approximate creation time derived from the id.
    pub fn created_at(&self) -> DateTime<Utc> {
        snowflake_to_time(self.id)
    }

    /// Local accounts allowed to find this status through search.
    ///
    /// The author (when local) plus every local account that was mentioned
    /// in, favourited, reblogged, bookmarked, or voted on it. Moderated
    /// statuses have no audience.
    pub fn eligible_audience(&self) -> BTreeSet<u64> {
        if self.moderated {
            return BTreeSet::new();
        }
        let mut ids = BTreeSet::new();
        if self.is_local() {
            ids.insert(self.account_id);
        }
        ids.extend(self.mentioned.iter().copied());
        ids.extend(self.favourited_by.iter().copied());
        ids.extend(self.reblogged_by.iter().copied());
        ids.extend(self.bookmarked_by.iter().copied());
        ids.extend(self.poll_voters.iter().copied());
        ids
    }

    /// Keyword properties usable with `has:` and `is:` operators.
    pub fn searchable_properties(&self) -> Vec<&'static str> {
        let mut props = Vec::new();
        if self.has_media {
            props.push("media");
        }
        if self.has_poll {
            props.push("poll");
        }
        if self.has_link {
            props.push("link");
        }
        if self.sensitive {
            props.push("sensitive");
        }
        if self.in_reply_to_id.is_some() {
            props.push("reply");
        }
        props
    }

    /// Text fed to the analyzer: spoiler followed by body.
    pub fn searchable_text(&self) -> String {
        if self.spoiler_text.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n\n{}", self.spoiler_text, self.text)
        }
    }
}

/// One record of any indexed entity type.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Account(Account),
    Tag(Tag),
    Status(Status),
}

impl Record {
    pub fn id(&self) -> u64 {
        match self {
            Self::Account(a) => a.id,
            Self::Tag(t) => t.id,
            Self::Status(s) => s.id,
        }
    }

    pub fn entity(&self) -> EntityType {
        match self {
            Self::Account(_) => EntityType::Accounts,
            Self::Tag(_) => EntityType::Tags,
            Self::Status(_) => EntityType::Statuses,
        }
    }

    /// Change-relevance filter applied by record sources.
    ///
    /// Soft-deleted statuses and reblogs, suspended accounts, and unusable
    /// tags never reach the index.
    pub fn in_default_scope(&self) -> bool {
        match self {
            Self::Account(a) => !a.suspended,
            Self::Tag(t) => t.usable,
            Self::Status(s) => !s.deleted && s.reblog_of_id.is_none(),
        }
    }
}
