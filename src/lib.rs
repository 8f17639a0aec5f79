// SPDX-License-Identifier: MPL-2.0
//! # wikiedits
//!
//! Reports on who edits a Wikipedia page, and what else those people edit.
//!
//! ## Overview
//!
//! `wikiedits` talks to the [MediaWiki Action API](https://www.mediawiki.org/wiki/API:Main_page)
//! of a wiki (English Wikipedia by default). For one page it fetches the lead summary, the
//! revision history and, for every user found in that history, the user's own contributions.
//! The result is a Markdown report with one table of editors per year, one table of revision
//! counts per user and one table of contributed articles per year for each user.
//!
//! ## Getting Started
//!
//! The `wikiedits` binary covers the common case:
//!
//! ```text
//! wikiedits --analyze "Hawaiian pizza"      # writes HawaiianPizza_report.md
//! wikiedits --summary Pizza                 # prints the lead section
//! wikiedits --analyze --stdout -v Pizza     # report on stdout, debug logging on stderr
//! ```
//!
//! ### Library Usage
//!
//! ```rust,no_run
//! use wikiedits::api::{ApiClient, ApiConfig};
//! use wikiedits::report::{analyze_page, ReportOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new(ApiConfig::default())?;
//!     let summary = analyze_page(&client, "Pizza", &ReportOptions::default())?;
//!     println!("{} revisions by {} users", summary.revisions, summary.users);
//!     Ok(())
//! }
//! ```
//!
//! The individual queries can be used on their own:
//!
//! ```rust,no_run
//! use wikiedits::api::{ApiClient, ApiConfig};
//! use wikiedits::revisions::{fetch_revisions, RevisionsQuery};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new(ApiConfig::default())?;
//!     let revisions = fetch_revisions(&client, &RevisionsQuery::new(["Pizza"]))?;
//!     for (user, count) in revisions.user_counts().sorted_by_count().into_iter().take(10) {
//!         println!("{user}: {count}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules and API
//!
//! - [`api`]: the HTTP client and the [`api::MediaWikiApi`] trait every query is generic over.
//! - [`response`]: typed decoding of query responses.
//! - [`revisions`], [`contributions`], [`summary`]: the three queries.
//! - [`stats`]: grouping by year and counting per user.
//! - [`report`]: Markdown output and [`report::analyze_page`].
//!
//! ## Limitations
//!
//! - **No continuation**: only the first batch of each query is used (up to 500 revisions per
//!   page by default, and the server default number of contributions per user). Truncated
//!   queries are logged as warnings and counted in [`report::AnalysisSummary`].
//! - **Sequential**: one request at a time, no retries and no rate limiting. A report for a page
//!   with many editors issues one request per editor.
//!
//! ### Logging and Error Handling
//!
//! - Uses the `tracing` crate; the binary prints `info` and above to stderr, `-v` adds `debug`.
//! - Errors are never recovered from. A failing request aborts the report, leaving the part that
//!   was already written.

pub mod api;
pub mod contributions;
pub mod report;
pub mod response;
pub mod revisions;
pub mod stats;
pub mod summary;
#[cfg(test)]
mod test_support;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] api::ApiError),
    #[error(transparent)]
    Schema(#[from] response::SchemaError),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}
