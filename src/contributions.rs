use std::fmt;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use tracing::instrument;

use crate::{
    api::{Limit, MediaWikiApi, QueryParams},
    response::{self, format_timestamp, Continuation, Contribution},
    stats::{self, YearlyStats},
    Error,
};

/// Whose contributions to list. The API accepts exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContribsTarget {
    /// `ucuser`
    User(CompactString),
    /// `ucuserids`
    UserIds(Vec<u64>),
    /// `ucuserprefix`
    UserPrefix(CompactString),
}

impl fmt::Display for ContribsTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContribsTarget::User(name) => write!(f, "{name}"),
            ContribsTarget::UserIds(ids) => {
                write!(f, "user ids ")?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{id}")?;
                }
                Ok(())
            }
            ContribsTarget::UserPrefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

/// Options of `list=usercontribs` that do not depend on the user asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContribsFilters {
    /// `uclimit`
    pub limit: Option<Limit>,
    /// `ucstart`: contributions are listed newest first, so this is the newer bound.
    pub start: Option<DateTime<Utc>>,
    /// `ucend`: the older bound.
    pub end: Option<DateTime<Utc>>,
    /// `ucnamespace`
    pub namespaces: Vec<i32>,
    /// `ucshow`, e.g. `!minor` or `new`.
    pub show: Vec<CompactString>,
    /// `uctag`
    pub tag: Option<CompactString>,
    /// `uctoponly`: only edits that are the latest revision of their page.
    pub top_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContribsQuery {
    pub target: ContribsTarget,
    /// `uccontinue`: resume a previously truncated listing.
    pub continue_from: Option<String>,
    pub filters: ContribsFilters,
}

impl UserContribsQuery {
    pub fn for_user(user: impl Into<CompactString>) -> Self {
        Self {
            target: ContribsTarget::User(user.into()),
            continue_from: None,
            filters: ContribsFilters::default(),
        }
    }

    pub fn with_filters(mut self, filters: ContribsFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn params(&self) -> QueryParams {
        let filters = &self.filters;
        let mut params = QueryParams::query().with("list", "usercontribs");
        params.set("formatversion", "2");

        match &self.target {
            ContribsTarget::User(user) => params.set("ucuser", user.as_str()),
            ContribsTarget::UserIds(ids) => params.set("ucuserids", join_numbers(ids)),
            ContribsTarget::UserPrefix(prefix) => params.set("ucuserprefix", prefix.as_str()),
        };

        params
            .set_opt("uclimit", filters.limit)
            .set_opt("ucstart", filters.start.as_ref().map(format_timestamp))
            .set_opt("ucend", filters.end.as_ref().map(format_timestamp))
            .set_opt("uccontinue", self.continue_from.as_ref());
        if !filters.namespaces.is_empty() {
            params.set("ucnamespace", join_numbers(&filters.namespaces));
        }
        if !filters.show.is_empty() {
            params.set("ucshow", filters.show.join("|"));
        }
        params.set_opt("uctag", filters.tag.as_ref());
        if filters.top_only {
            params.set("uctoponly", "1");
        }
        params
    }
}

fn join_numbers<N: ToString>(numbers: &[N]) -> String {
    numbers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

/// One batch of contributions for a [`ContribsTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributions {
    pub target: ContribsTarget,
    pub contributions: Vec<Contribution>,
    pub continuation: Option<Continuation>,
}

impl Contributions {
    /// Titles per calendar year; a page edited several times appears several times.
    pub fn by_year(&self) -> YearlyStats<CompactString> {
        stats::group_by_year(
            self.contributions
                .iter()
                .map(|contribution| (contribution.timestamp, contribution.title.clone())),
        )
    }

    pub fn is_truncated(&self) -> bool {
        self.continuation.is_some()
    }

    /// Token to pass as [`UserContribsQuery::continue_from`] for the next batch.
    pub fn continue_token(&self) -> Option<&str> {
        self.continuation
            .as_ref()
            .and_then(|continuation| continuation.get("uccontinue"))
    }
}

/// Fetches one batch of contributions.
///
/// Continuation is not followed: when the server reports more results a
/// warning is logged and only the first batch is returned.
#[instrument(skip(api), fields(target = %query.target))]
pub fn fetch_contributions<A: MediaWikiApi + ?Sized>(
    api: &A,
    query: &UserContribsQuery,
) -> Result<Contributions, Error> {
    tracing::debug!("Fetching user contributions");
    let payload = api.get_json(query.params())?;
    let batch = response::decode_contributions(payload)?;
    tracing::debug!(contributions = batch.items.len(), "usercontribs query returned");

    let contributions = Contributions {
        target: query.target.clone(),
        contributions: batch.items,
        continuation: batch.continuation,
    };
    if let Some(token) = contributions.continue_token() {
        tracing::warn!(
            message = "More contributions are available but will not be fetched; \
                       the report covers only the first batch",
            target = %contributions.target,
            uccontinue = token
        );
    }

    Ok(contributions)
}
