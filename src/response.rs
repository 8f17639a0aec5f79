use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, NaiveDateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// MediaWiki always reports ISO 8601 timestamps in UTC with a trailing `Z`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing field `{field}` in {context}")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },
    #[error("invalid timestamp {value:?}")]
    InvalidTimestamp { value: String },
    #[error("unexpected response shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("query returned no pages")]
    NoPages,
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SchemaError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
        .map_err(|_| SchemaError::InvalidTimestamp {
            value: value.to_string(),
        })
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub timestamp: DateTime<Utc>,
    pub user: CompactString,
    pub comment: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub title: CompactString,
    pub timestamp: DateTime<Utc>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: CompactString,
    pub missing: bool,
    pub revisions: Vec<Revision>,
    /// Revisions left out of `revisions` because their author is suppressed.
    pub hidden_revisions: usize,
    pub extract: Option<String>,
}

/// The top-level `continue` object of a truncated response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Continuation {
    #[serde(flatten)]
    tokens: BTreeMap<String, Value>,
}

impl Continuation {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tokens.get(key).and_then(Value::as_str)
    }
}

impl fmt::Display for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.tokens {
            if key == "continue" {
                continue;
            }
            if !first {
                write!(f, "&")?;
            }
            first = false;
            match value {
                Value::String(s) => write!(f, "{key}={s}")?,
                other => write!(f, "{key}={other}")?,
            }
        }
        Ok(())
    }
}

/// Items of one response together with its continuation, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub items: Vec<T>,
    pub continuation: Option<Continuation>,
}

#[derive(Debug, Deserialize)]
struct RawResponse<Q> {
    query: Option<Q>,
    #[serde(rename = "continue")]
    continuation: Option<Continuation>,
}

#[derive(Debug, Deserialize)]
struct RawContribsQuery {
    usercontribs: Option<Vec<RawContribution>>,
}

#[derive(Debug, Deserialize)]
struct RawContribution {
    title: Option<CompactString>,
    timestamp: Option<String>,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPagesQuery {
    pages: Option<RawPageList>,
    #[serde(default)]
    normalized: Vec<RawTitleMapping>,
    #[serde(default)]
    redirects: Vec<RawTitleMapping>,
}

#[derive(Debug, Deserialize)]
struct RawTitleMapping {
    from: CompactString,
    to: CompactString,
}

// `formatversion=2` returns a list, the legacy format a map keyed by page id
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPageList {
    Sequence(Vec<RawPage>),
    Keyed(BTreeMap<String, RawPage>),
}

impl RawPageList {
    fn into_vec(self) -> Vec<RawPage> {
        match self {
            RawPageList::Sequence(pages) => pages,
            RawPageList::Keyed(pages) => pages.into_values().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPage {
    title: Option<CompactString>,
    #[serde(default, deserialize_with = "flag")]
    missing: bool,
    #[serde(default, deserialize_with = "flag")]
    invalid: bool,
    revisions: Option<Vec<RawRevision>>,
    extract: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRevision {
    user: Option<CompactString>,
    #[serde(default, deserialize_with = "flag")]
    userhidden: bool,
    timestamp: Option<String>,
    comment: Option<String>,
    size: Option<u64>,
}

/// Flags are `true` in `formatversion=2` and an empty string in the legacy format.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Null => false,
        _ => true,
    })
}

impl RawContribution {
    fn try_build(self) -> Result<Contribution, SchemaError> {
        let Some(title) = self.title else {
            return Err(SchemaError::MissingField {
                field: "title",
                context: "usercontribs entry",
            });
        };
        let Some(timestamp) = self.timestamp else {
            return Err(SchemaError::MissingField {
                field: "timestamp",
                context: "usercontribs entry",
            });
        };

        Ok(Contribution {
            title,
            timestamp: parse_timestamp(&timestamp)?,
            comment: self.comment,
        })
    }
}

impl RawRevision {
    /// Returns `Ok(None)` for revisions whose author has been suppressed.
    fn try_build(self) -> Result<Option<Revision>, SchemaError> {
        let user = match (self.user, self.userhidden) {
            (Some(user), _) => user,
            (None, true) => return Ok(None),
            (None, false) => {
                return Err(SchemaError::MissingField {
                    field: "user",
                    context: "revision",
                })
            }
        };
        let Some(timestamp) = self.timestamp else {
            return Err(SchemaError::MissingField {
                field: "timestamp",
                context: "revision",
            });
        };

        Ok(Some(Revision {
            timestamp: parse_timestamp(&timestamp)?,
            user,
            comment: self.comment,
            size: self.size,
        }))
    }
}

impl RawPage {
    fn try_build(self) -> Result<Page, SchemaError> {
        let Some(title) = self.title else {
            return Err(SchemaError::MissingField {
                field: "title",
                context: "page",
            });
        };
        if self.invalid {
            tracing::warn!(message = "Page title is invalid", title = title.as_str());
        }

        let mut revisions = Vec::new();
        let mut hidden_revisions = 0;
        for raw in self.revisions.unwrap_or_default() {
            match raw.try_build()? {
                Some(revision) => revisions.push(revision),
                None => hidden_revisions += 1,
            }
        }
        if hidden_revisions > 0 {
            tracing::warn!(
                message = "Skipping revisions with hidden user; they are not counted",
                title = title.as_str(),
                skipped = hidden_revisions
            );
        }

        Ok(Page {
            title,
            missing: self.missing || self.invalid,
            revisions,
            hidden_revisions,
            extract: self.extract,
        })
    }
}

fn parse_response<Q: serde::de::DeserializeOwned>(
    payload: Value,
) -> Result<(Q, Option<Continuation>), SchemaError> {
    let response: RawResponse<Q> = serde_json::from_value(payload)?;
    let Some(query) = response.query else {
        return Err(SchemaError::MissingField {
            field: "query",
            context: "response",
        });
    };
    Ok((query, response.continuation))
}

/// Decodes a `list=usercontribs` response.
pub fn decode_contributions(payload: Value) -> Result<Batch<Contribution>, SchemaError> {
    let (query, continuation) = parse_response::<RawContribsQuery>(payload)?;
    let Some(raw_contributions) = query.usercontribs else {
        return Err(SchemaError::MissingField {
            field: "usercontribs",
            context: "query",
        });
    };

    let items = raw_contributions
        .into_iter()
        .map(RawContribution::try_build)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Batch {
        items,
        continuation,
    })
}

/// Decodes a `prop=...` response into its pages, in response order.
pub fn decode_pages(payload: Value) -> Result<Batch<Page>, SchemaError> {
    let (query, continuation) = parse_response::<RawPagesQuery>(payload)?;
    for mapping in &query.normalized {
        tracing::debug!(
            message = "Title normalized",
            from = mapping.from.as_str(),
            to = mapping.to.as_str()
        );
    }
    for mapping in &query.redirects {
        tracing::debug!(
            message = "Title redirected",
            from = mapping.from.as_str(),
            to = mapping.to.as_str()
        );
    }
    let Some(pages) = query.pages else {
        return Err(SchemaError::MissingField {
            field: "pages",
            context: "query",
        });
    };

    let items = pages
        .into_vec()
        .into_iter()
        .map(RawPage::try_build)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Batch {
        items,
        continuation,
    })
}
