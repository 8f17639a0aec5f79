use compact_str::CompactString;
use tracing::instrument;

use crate::{
    api::{Limit, MediaWikiApi, QueryParams},
    response::{self, Continuation, Page, Revision},
    stats::{self, UserStats, YearlyStats},
    Error,
};

pub const DEFAULT_REVISION_PROPS: &str = "timestamp|user|comment|size";
pub const DEFAULT_REVISION_LIMIT: Limit = Limit::Count(500);

/// Options of `prop=revisions` that do not depend on the page asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionFilters {
    /// `rvprop`
    pub prop: CompactString,
    /// `rvslots`
    pub slots: CompactString,
    /// `rvlimit`
    pub limit: Option<Limit>,
    /// `rvuser`: only revisions made by this user.
    pub user: Option<CompactString>,
    /// `rvexcludeuser`
    pub exclude_user: Option<CompactString>,
    /// `rvtag`
    pub tag: Option<CompactString>,
}

impl Default for RevisionFilters {
    fn default() -> Self {
        Self {
            prop: DEFAULT_REVISION_PROPS.into(),
            slots: "main".into(),
            limit: Some(DEFAULT_REVISION_LIMIT),
            user: None,
            exclude_user: None,
            tag: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionsQuery {
    pub titles: Vec<CompactString>,
    pub filters: RevisionFilters,
}

impl RevisionsQuery {
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        Self {
            titles: titles.into_iter().map(Into::into).collect(),
            filters: RevisionFilters::default(),
        }
    }

    pub fn with_filters(mut self, filters: RevisionFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn params(&self) -> QueryParams {
        let filters = &self.filters;
        let mut params = QueryParams::query().with("prop", "revisions");
        params
            .set("rvprop", filters.prop.as_str())
            .set("rvslots", filters.slots.as_str())
            .set("formatversion", "2")
            .set("titles", self.titles.join("|"))
            .set_opt("rvlimit", filters.limit)
            .set_opt("rvuser", filters.user.as_ref())
            .set_opt("rvexcludeuser", filters.exclude_user.as_ref())
            .set_opt("rvtag", filters.tag.as_ref());
        params
    }
}

/// Revisions of the pages returned for one [`RevisionsQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRevisions {
    pub pages: Vec<Page>,
    pub continuation: Option<Continuation>,
}

impl PageRevisions {
    /// All revisions, page by page in response order.
    pub fn revisions(&self) -> impl Iterator<Item = &Revision> {
        self.pages.iter().flat_map(|page| page.revisions.iter())
    }

    pub fn revision_count(&self) -> usize {
        self.pages.iter().map(|page| page.revisions.len()).sum()
    }

    /// Revisions fetched but left out of every statistic because their user is hidden.
    pub fn hidden_revision_count(&self) -> usize {
        self.pages.iter().map(|page| page.hidden_revisions).sum()
    }

    /// Distinct editors per calendar year.
    pub fn editors_by_year(&self) -> YearlyStats<CompactString> {
        stats::group_distinct_by_year(
            self.revisions()
                .map(|revision| (revision.timestamp, revision.user.clone())),
        )
    }

    pub fn user_counts(&self) -> UserStats {
        self.revisions()
            .map(|revision| revision.user.as_str())
            .collect()
    }

    pub fn is_truncated(&self) -> bool {
        self.continuation.is_some()
    }
}

/// Fetches one batch of revisions for the query's pages.
///
/// Continuation is not followed: when the server reports more revisions a
/// warning is logged and only the first batch is returned.
#[instrument(skip(api))]
pub fn fetch_revisions<A: MediaWikiApi + ?Sized>(
    api: &A,
    query: &RevisionsQuery,
) -> Result<PageRevisions, Error> {
    let payload = api.get_json(query.params())?;
    let batch = response::decode_pages(payload)?;
    tracing::debug!(pages = batch.items.len(), "revisions query returned");

    for page in batch.items.iter().filter(|page| page.missing) {
        tracing::warn!(message = "Page does not exist", title = page.title.as_str());
    }
    if let Some(continuation) = &batch.continuation {
        tracing::warn!(
            message = "More revisions are available but will not be fetched; \
                       statistics cover only the first batch",
            titles = query.titles.join("|"),
            continuation = %continuation
        );
    }

    Ok(PageRevisions {
        pages: batch.items,
        continuation: batch.continuation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::prelude::*;

    #[test]
    fn test_params() {
        let params = RevisionsQuery::new(["Pizza", "Pasta"]).params();

        assert_eq!(params.get("action"), Some("query"));
        assert_eq!(params.get("prop"), Some("revisions"));
        assert_eq!(params.get("rvprop"), Some("timestamp|user|comment|size"));
        assert_eq!(params.get("rvslots"), Some("main"));
        assert_eq!(params.get("rvlimit"), Some("500"));
        assert_eq!(params.get("titles"), Some("Pizza|Pasta"));
        assert_eq!(params.get("formatversion"), Some("2"));
        assert!(!params.contains("rvuser"));
    }

    #[test]
    fn test_params_with_filters() {
        let params = RevisionsQuery::new(["Pizza"])
            .with_filters(RevisionFilters {
                limit: Some(Limit::Max),
                exclude_user: Some("ClueBot NG".into()),
                tag: Some("mw-reverted".into()),
                ..RevisionFilters::default()
            })
            .params();

        assert_eq!(params.get("rvlimit"), Some("max"));
        assert_eq!(params.get("rvexcludeuser"), Some("ClueBot NG"));
        assert_eq!(params.get("rvtag"), Some("mw-reverted"));
    }

    #[test]
    fn test_fetch_and_aggregate() {
        let api = FakeApi::new().respond(
            &[("prop", "revisions"), ("titles", "Pizza")],
            revisions_payload(
                "Pizza",
                &[
                    ("x", "2020-03-01T00:00:00Z"),
                    ("x", "2020-02-01T00:00:00Z"),
                    ("y", "2021-01-01T00:00:00Z"),
                ],
            ),
        );

        let result = fetch_revisions(&api, &RevisionsQuery::new(["Pizza"])).unwrap();
        assert_eq!(result.revision_count(), 3);
        assert!(!result.is_truncated());

        let counts = result.user_counts();
        assert_eq!(counts.sorted_by_count(), vec![("x", 2), ("y", 1)]);
        assert_eq!(counts.total(), result.revision_count());

        let editors = result.editors_by_year();
        assert_eq!(editors.get(2020), Some(&[CompactString::from("x")][..]));
        assert_eq!(editors.get(2021), Some(&[CompactString::from("y")][..]));

        let sent = api.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].get("format"), Some("json"));
    }

    #[test]
    fn test_counts_span_all_pages() {
        let api = FakeApi::new().respond(
            &[("prop", "revisions")],
            serde_json::json!({
                "query": { "pages": [
                    { "title": "A", "revisions": [
                        { "user": "x", "timestamp": "2020-01-01T00:00:00Z" }
                    ] },
                    { "title": "B", "revisions": [
                        { "user": "x", "timestamp": "2021-01-01T00:00:00Z" },
                        { "user": "z", "timestamp": "2021-01-02T00:00:00Z" }
                    ] }
                ] }
            }),
        );

        let result = fetch_revisions(&api, &RevisionsQuery::new(["A", "B"])).unwrap();
        let counts = result.user_counts();
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.count("x"), Some(2));
    }

    #[test]
    fn test_missing_page_has_no_revisions() {
        let api = FakeApi::new().respond(
            &[("prop", "revisions")],
            serde_json::json!({
                "query": { "pages": [ { "ns": 0, "title": "Nope", "missing": true } ] }
            }),
        );

        let result = fetch_revisions(&api, &RevisionsQuery::new(["Nope"])).unwrap();
        assert!(result.pages[0].missing);
        assert_eq!(result.revision_count(), 0);
        assert!(result.user_counts().is_empty());
        assert!(result.editors_by_year().is_empty());
    }

    #[test]
    fn test_continuation_is_reported() {
        let mut payload = revisions_payload("Pizza", &[("x", "2020-03-01T00:00:00Z")]);
        payload["continue"] =
            serde_json::json!({ "rvcontinue": "20200101|42", "continue": "||" });
        let api = FakeApi::new().respond(&[("prop", "revisions")], payload);

        let result = fetch_revisions(&api, &RevisionsQuery::new(["Pizza"])).unwrap();
        assert!(result.is_truncated());
        assert_eq!(
            result.continuation.unwrap().get("rvcontinue"),
            Some("20200101|42")
        );
    }
}
