use std::{io::Write, path::PathBuf, process::ExitCode, time::Duration};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{CommandFactory, Parser};
use wikiedits::{
    api::{ApiClient, ApiConfig, Limit, DEFAULT_ENDPOINT, DEFAULT_USER_AGENT},
    contributions::ContribsFilters,
    report::{self, ReportOptions},
    response,
    revisions::{RevisionFilters, DEFAULT_REVISION_LIMIT},
    summary,
};

/// Reports on the edit history of Wikipedia pages and the people behind it.
#[derive(Debug, clap::Parser)]
#[command(version, about)]
struct CommandLine {
    /// Titles of the pages to look at
    titles: Vec<String>,

    /// Write a Markdown report on the edits to each page
    #[arg(short, long)]
    analyze: bool,

    /// Print the lead section of each page
    #[arg(short, long, conflicts_with = "analyze")]
    summary: bool,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write reports to stdout instead of files
    #[arg(long, requires = "analyze")]
    stdout: bool,

    /// Directory to write report files to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// MediaWiki API endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// User agent sent with every request
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Maximum number of revisions fetched per page (a number or "max")
    #[arg(long, default_value_t = DEFAULT_REVISION_LIMIT)]
    revision_limit: Limit,

    /// Ignore revisions made by this user
    #[arg(long)]
    exclude_user: Option<String>,

    /// Maximum number of contributions fetched per user (a number or "max")
    #[arg(long)]
    contrib_limit: Option<Limit>,

    /// Only count contributions made at or after this date (YYYY-MM-DD or full timestamp)
    #[arg(long, value_parser = parse_since)]
    since: Option<DateTime<Utc>>,

    /// Only count contributions made on or before this date (YYYY-MM-DD or full timestamp)
    #[arg(long, value_parser = parse_until)]
    until: Option<DateTime<Utc>>,

    /// Only count contributions in this namespace (repeatable)
    #[arg(long = "namespace")]
    namespaces: Vec<i32>,

    /// Only count contributions with this change tag
    #[arg(long)]
    tag: Option<String>,

    /// Only count contributions that are still the latest revision of their page
    #[arg(long)]
    top_only: bool,
}

/// A full timestamp is taken as is; a bare date becomes `time` on that day.
fn parse_date(value: &str, time: NaiveTime) -> Result<DateTime<Utc>, String> {
    if let Ok(timestamp) = response::parse_timestamp(value) {
        return Ok(timestamp);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| DateTime::from_naive_utc_and_offset(date.and_time(time), Utc))
        .map_err(|_| format!("expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SSZ, got {value:?}"))
}

fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    parse_date(value, NaiveTime::MIN)
}

/// Timestamps have second precision, so the last second of the day includes
/// every edit made on it.
fn parse_until(value: &str) -> Result<DateTime<Utc>, String> {
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).ok_or("invalid end of day")?;
    parse_date(value, end_of_day)
}

impl CommandLine {
    fn api_config(&self) -> ApiConfig {
        ApiConfig {
            endpoint: self.endpoint.clone(),
            user_agent: self.user_agent.clone(),
            timeout: self.timeout.map(Duration::from_secs),
        }
    }

    fn report_options(&self) -> ReportOptions {
        ReportOptions {
            output_dir: self.output_dir.clone(),
            revisions: RevisionFilters {
                limit: Some(self.revision_limit),
                exclude_user: self.exclude_user.as_deref().map(Into::into),
                ..RevisionFilters::default()
            },
            // contributions are listed newest first: `ucstart` is the newer bound
            contributions: ContribsFilters {
                limit: self.contrib_limit,
                start: self.until,
                end: self.since,
                namespaces: self.namespaces.clone(),
                tag: self.tag.as_deref().map(Into::into),
                top_only: self.top_only,
                ..ContribsFilters::default()
            },
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &CommandLine) -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::new(args.api_config())?;

    if args.summary {
        let mut stdout = std::io::stdout().lock();
        for title in &args.titles {
            let lead = summary::fetch_lead_summary(&client, title)?;
            match lead.extract {
                Some(extract) => writeln!(stdout, "{extract}\n")?,
                None => tracing::warn!(message = "No summary available", title = title.as_str()),
            }
        }
        return Ok(());
    }

    let options = args.report_options();
    for title in &args.titles {
        tracing::info!(title = title.as_str(), "Analyzing page");
        let outcome = if args.stdout {
            let mut stdout = std::io::stdout().lock();
            let outcome = report::write_report(&client, title, &options, &mut stdout)?;
            stdout.flush()?;
            outcome
        } else {
            report::analyze_page(&client, title, &options)?
        };

        if let Some(path) = &outcome.report_path {
            tracing::info!(path = %path.display(), "Wrote report");
        }
        if outcome.truncated_queries > 0 {
            tracing::warn!(
                truncated_queries = outcome.truncated_queries,
                "Some queries returned only part of their results"
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = CommandLine::parse();
    init_logging(args.verbose);
    tracing::debug!(args = ?args);

    if !args.analyze && !args.summary {
        let _ = CommandLine::command().print_help();
        return ExitCode::SUCCESS;
    }
    if args.titles.is_empty() {
        tracing::error!("No page titles given");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
