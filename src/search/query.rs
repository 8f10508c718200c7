//! Query grammar: parsing, legacy filter normalization, and matching.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use super::AccountDirectory;
use crate::types::{format_timestamp, snowflake_to_time, SyncError, SyncResult};

/// Properties accepted by `has:`.
const HAS_VALUES: [&str; 3] = ["media", "poll", "link"];

/// Properties accepted by `is:`.
const IS_VALUES: [&str; 2] = ["reply", "sensitive"];

/// A search as issued by a client.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub raw_query: String,
    pub viewer: Option<u64>,
    pub limit: usize,
    pub offset: usize,
    /// Legacy filter, rewritten to `from:@acct`.
    pub account_id: Option<u64>,
    /// Legacy cursor, rewritten to `after:"<time>"`.
    pub min_id: Option<u64>,
    /// Legacy cursor, rewritten to `before:"<time>"`.
    pub max_id: Option<u64>,
}

impl SearchRequest {
    pub fn new(raw_query: impl Into<String>) -> Self {
        Self {
            raw_query: raw_query.into(),
            limit: 20,
            ..Default::default()
        }
    }

    pub fn viewer(mut self, viewer: u64) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn account_id(mut self, account_id: u64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn min_id(mut self, min_id: u64) -> Self {
        self.min_id = Some(min_id);
        self
    }

    pub fn max_id(mut self, max_id: u64) -> Self {
        self.max_id = Some(max_id);
        self
    }
}

/// The effective query after parsing, independent of calling convention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Lowercased words and phrases; all must match.
    pub terms: Vec<String>,
    /// Author handle without the leading `@`.
    pub from: Option<String>,
    /// Only statuses created strictly after this time.
    pub after: Option<DateTime<Utc>>,
    /// Only statuses created strictly before this time.
    pub before: Option<DateTime<Utc>>,
    /// Required document properties, sorted.
    pub properties: Vec<String>,
    pub language: Option<String>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
            && self.from.is_none()
            && self.after.is_none()
            && self.before.is_none()
            && self.properties.is_empty()
            && self.language.is_none()
    }
}

/// Rewrite legacy structured filters into inline operators.
///
/// `search("foo", account_id: 7, min_id: 100)` becomes
/// `foo from:@alice after:"<time of id 100>"`.
pub fn normalize(request: &SearchRequest, directory: &dyn AccountDirectory) -> SyncResult<String> {
    let mut operators = Vec::new();

    if let Some(account_id) = request.account_id {
        let account = directory
            .account(account_id)
            .ok_or(SyncError::UnknownAccount(account_id))?;
        operators.push(format!("from:@{}", account.acct()));
    }
    if let Some(min_id) = request.min_id {
        operators.push(format!(
            "after:\"{}\"",
            format_timestamp(snowflake_to_time(min_id))
        ));
    }
    if let Some(max_id) = request.max_id {
        operators.push(format!(
            "before:\"{}\"",
            format_timestamp(snowflake_to_time(max_id))
        ));
    }

    let query = request.raw_query.trim();
    if operators.is_empty() {
        return Ok(query.to_string());
    }
    Ok(format!("{} {}", query, operators.join(" ")).trim().to_string())
}

/// Parse a query string into its effective form.
pub fn parse(query: &str) -> SyncResult<ParsedQuery> {
    let mut parsed = ParsedQuery::default();

    for token in tokenize(query) {
        if token.phrase {
            push_term(&mut parsed, &token.text);
            continue;
        }
        let Some((key, value)) = token.text.split_once(':') else {
            push_term(&mut parsed, &token.text);
            continue;
        };
        match key.to_lowercase().as_str() {
            "from" => {
                let handle = value.trim_start_matches('@').to_lowercase();
                if handle.is_empty() {
                    return Err(SyncError::MalformedFilter("from: needs a handle".into()));
                }
                parsed.from = Some(handle);
            }
            "after" => parsed.after = Some(parse_time(value)?),
            "before" => parsed.before = Some(parse_time(value)?),
            "has" => push_property(&mut parsed, "has", value, &HAS_VALUES)?,
            "is" => push_property(&mut parsed, "is", value, &IS_VALUES)?,
            "language" => {
                if value.is_empty() {
                    return Err(SyncError::MalformedFilter("language: needs a code".into()));
                }
                parsed.language = Some(value.to_lowercase());
            }
            _ => push_term(&mut parsed, &token.text),
        }
    }

    parsed.properties.sort();
    parsed.properties.dedup();
    Ok(parsed)
}

fn push_term(parsed: &mut ParsedQuery, text: &str) {
    let term = text.trim().to_lowercase();
    if !term.is_empty() {
        parsed.terms.push(term);
    }
}

fn push_property(
    parsed: &mut ParsedQuery,
    operator: &str,
    value: &str,
    allowed: &[&str],
) -> SyncResult<()> {
    let value = value.to_lowercase();
    if !allowed.contains(&value.as_str()) {
        return Err(SyncError::MalformedFilter(format!(
            "{}:{} is not one of {}",
            operator,
            value,
            allowed.join(", ")
        )));
    }
    parsed.properties.push(value);
    Ok(())
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_time(value: &str) -> SyncResult<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| SyncError::MalformedFilter(format!("invalid date: {:?}", value)))
}

struct Token {
    text: String,
    /// Started with a quote, so `:` inside it is literal.
    phrase: bool,
}

/// Split on whitespace outside double quotes; quotes are dropped.
fn tokenize(query: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut phrase = false;

    for ch in query.chars() {
        match ch {
            '"' => {
                if !in_quotes && current.is_empty() {
                    phrase = true;
                }
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(Token {
                        text: std::mem::take(&mut current),
                        phrase,
                    });
                }
                phrase = false;
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(Token {
            text: current,
            phrase,
        });
    }
    tokens
}

/// Who a query restricts results to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorFilter {
    Any,
    Account(u64),
    /// `from:` named a handle that does not exist.
    Nobody,
}

/// A parsed query lowered to something an engine can evaluate per document.
#[derive(Debug, Clone)]
pub struct EngineQuery {
    pub query: ParsedQuery,
    pub author: AuthorFilter,
    pub viewer: Option<u64>,
    pub limit: usize,
    pub offset: usize,
}

impl EngineQuery {
    /// Resolve `from:` through the directory and attach paging.
    pub fn lower(
        query: ParsedQuery,
        directory: &dyn AccountDirectory,
        viewer: Option<u64>,
        limit: usize,
        offset: usize,
    ) -> Self {
        let author = match &query.from {
            None => AuthorFilter::Any,
            Some(handle) => directory
                .find_by_acct(handle)
                .map_or(AuthorFilter::Nobody, |a| AuthorFilter::Account(a.id)),
        };
        Self {
            query,
            author,
            viewer,
            limit,
            offset,
        }
    }

    /// Whether a status document satisfies this query.
    ///
    /// A document is retrievable when it is public or the viewer is in its
    /// `searchable_by` audience.
    pub fn matches(&self, doc: &Value) -> bool {
        let public = doc["visibility"].as_str() == Some("public");
        let audience = doc["searchable_by"].as_array();
        let visible = public
            || self.viewer.is_some_and(|viewer| {
                audience.is_some_and(|ids| ids.iter().any(|id| id.as_u64() == Some(viewer)))
            });
        if !visible {
            return false;
        }

        match self.author {
            AuthorFilter::Any => {}
            AuthorFilter::Account(id) => {
                if doc["account_id"].as_u64() != Some(id) {
                    return false;
                }
            }
            AuthorFilter::Nobody => return false,
        }

        if self.query.after.is_some() || self.query.before.is_some() {
            let Some(created) = doc["created_at"]
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
            else {
                return false;
            };
            if self.query.after.is_some_and(|after| created <= after) {
                return false;
            }
            if self.query.before.is_some_and(|before| created >= before) {
                return false;
            }
        }

        if let Some(language) = &self.query.language {
            if doc["language"].as_str() != Some(language.as_str()) {
                return false;
            }
        }

        let properties: Vec<&str> = doc["properties"]
            .as_array()
            .map(|p| p.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if !self.query.properties.iter().all(|p| properties.contains(&p.as_str())) {
            return false;
        }

        let text = doc["text"].as_str().unwrap_or_default().to_lowercase();
        let tags: Vec<String> = doc["tags"]
            .as_array()
            .map(|t| {
                t.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default();
        self.query.terms.iter().all(|term| {
            let bare = term.trim_start_matches('#');
            text.contains(term.as_str()) || tags.iter().any(|tag| tag == bare)
        })
    }
}
