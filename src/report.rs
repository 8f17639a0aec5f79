//! Markdown reports and the page analysis that produces them.
//!
//! A report is written in this order: header, lead summary, yearly editors,
//! revision counts per user, then one contributions section per user in the
//! order the users were first seen in the page history.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use compact_str::CompactString;
use tracing::instrument;

use crate::{
    api::MediaWikiApi,
    contributions::{fetch_contributions, ContribsFilters, ContribsTarget, UserContribsQuery},
    revisions::{fetch_revisions, RevisionFilters, RevisionsQuery},
    stats::{UserStats, YearlyStats},
    summary::fetch_lead_summary,
    Error,
};

pub const USER_URL_PREFIX: &str = "https://en.wikipedia.org/wiki/User:";
pub const ARTICLE_URL_PREFIX: &str = "https://en.wikipedia.org/wiki/";
pub const REPORT_SUFFIX: &str = "_report.md";

const NO_SUMMARY: &str = "_No summary available._";

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Directory report files are created in.
    pub output_dir: PathBuf,
    pub revisions: RevisionFilters,
    /// Applied to every per-user contributions query.
    pub contributions: ContribsFilters,
}

/// What a finished analysis covered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisSummary {
    /// `None` when the report was written to a caller-supplied sink.
    pub report_path: Option<PathBuf>,
    pub revisions: usize,
    pub users: usize,
    /// Queries whose results were cut short by the server.
    pub truncated_queries: usize,
    /// Revisions by hidden users, missing from every table.
    pub hidden_revisions: usize,
}

/// File name of the report for `title`: spaces removed, path separators
/// replaced, `_report.md` appended.
pub fn report_file_name(title: &str) -> String {
    let mut name: String = title
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    name.push_str(REPORT_SUFFIX);
    name
}

fn link_target(prefix: &str, name: &str) -> String {
    format!("{prefix}{}", name.replace(' ', "_"))
}

fn write_link(out: &mut impl Write, prefix: &str, name: &str) -> io::Result<()> {
    write!(out, "[{name}](<{}>)", link_target(prefix, name))
}

fn write_yearly_table(
    out: &mut impl Write,
    heading: &str,
    column: &str,
    prefix: &str,
    stats: &YearlyStats<CompactString>,
) -> io::Result<()> {
    writeln!(out, "# {heading}")?;
    writeln!(out, "| Year | {column} |\n| -- | -- |")?;
    for (year, names) in stats.iter() {
        write!(out, "| {year} | ")?;
        for name in names {
            write_link(out, prefix, name)?;
            write!(out, "<br>")?;
        }
        writeln!(out, " |")?;
    }
    write!(out, "\n\n")
}

pub fn write_header(out: &mut impl Write, title: &str, extract: Option<&str>) -> io::Result<()> {
    write!(
        out,
        "# Wikipedia Analysis : {title}\n\n{}\n\n",
        extract.unwrap_or(NO_SUMMARY)
    )
}

pub fn write_yearly_editors(
    out: &mut impl Write,
    title: &str,
    editors: &YearlyStats<CompactString>,
) -> io::Result<()> {
    write_yearly_table(
        out,
        &format!("Yearly stats for {title}"),
        "Users",
        USER_URL_PREFIX,
        editors,
    )
}

pub fn write_user_counts(out: &mut impl Write, title: &str, counts: &UserStats) -> io::Result<()> {
    writeln!(out, "# Stats by username for {title}")?;
    writeln!(out, "| Username | Revisions |\n| -- | -- |")?;
    for (name, count) in counts.sorted_by_count() {
        write!(out, "| ")?;
        write_link(out, USER_URL_PREFIX, name)?;
        writeln!(out, " | {count} |")?;
    }
    write!(out, "\n\n")
}

pub fn write_contributions(
    out: &mut impl Write,
    target: &ContribsTarget,
    titles_by_year: &YearlyStats<CompactString>,
) -> io::Result<()> {
    write_yearly_table(
        out,
        &format!("Stats for {target}"),
        "Articles",
        ARTICLE_URL_PREFIX,
        titles_by_year,
    )
}

/// Writes the full report for `title` into `out`.
///
/// Nothing is retried: the first failing request aborts the report, leaving
/// whatever was already written in `out`.
#[instrument(skip(api, options, out))]
pub fn write_report<A, W>(
    api: &A,
    title: &str,
    options: &ReportOptions,
    out: &mut W,
) -> Result<AnalysisSummary, Error>
where
    A: MediaWikiApi + ?Sized,
    W: Write,
{
    let mut summary = AnalysisSummary::default();

    let lead = fetch_lead_summary(api, title)?;
    write_header(out, title, lead.extract.as_deref())?;

    let query = RevisionsQuery::new([title]).with_filters(options.revisions.clone());
    let revisions = fetch_revisions(api, &query)?;
    summary.revisions = revisions.revision_count();
    summary.truncated_queries += usize::from(revisions.is_truncated());
    summary.hidden_revisions = revisions.hidden_revision_count();

    let user_counts = revisions.user_counts();
    summary.users = user_counts.len();
    write_yearly_editors(out, title, &revisions.editors_by_year())?;
    write_user_counts(out, title, &user_counts)?;
    tracing::info!(
        revisions = summary.revisions,
        users = summary.users,
        "Collected revision history"
    );

    for user in user_counts.users() {
        let query =
            UserContribsQuery::for_user(user).with_filters(options.contributions.clone());
        let contributions = fetch_contributions(api, &query)?;
        summary.truncated_queries += usize::from(contributions.is_truncated());
        write_contributions(out, &contributions.target, &contributions.by_year())?;
    }

    Ok(summary)
}

/// Analyzes `title` and writes the report to a file in the output directory.
pub fn analyze_page<A: MediaWikiApi + ?Sized>(
    api: &A,
    title: &str,
    options: &ReportOptions,
) -> Result<AnalysisSummary, Error> {
    let path = report_path(&options.output_dir, title);
    tracing::debug!(path = %path.display(), "Creating report file");
    let mut out = BufWriter::new(File::create(&path)?);

    let mut summary = write_report(api, title, options, &mut out)?;
    out.flush()?;

    summary.report_path = Some(path);
    Ok(summary)
}

pub fn report_path(output_dir: &Path, title: &str) -> PathBuf {
    output_dir.join(report_file_name(title))
}
