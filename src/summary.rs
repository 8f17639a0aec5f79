use compact_str::CompactString;
use tracing::instrument;

use crate::{
    api::{MediaWikiApi, QueryParams},
    response::{self, SchemaError},
    Error,
};

/// Plain-text introduction of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadSummary {
    /// Title as resolved by the server, after normalization.
    pub title: CompactString,
    /// `None` if the page does not exist or has no extract.
    pub extract: Option<String>,
}

pub fn lead_params(titles: &str) -> QueryParams {
    QueryParams::query()
        .with("prop", "extracts")
        .with("exintro", "1")
        .with("explaintext", "1")
        .with("formatversion", "2")
        .with("titles", titles)
}

/// Fetches the lead section of `titles` as plain text.
///
/// If the server returns more than one page (several titles were given, or
/// the title was split up during normalization) the first page in response
/// order is used.
#[instrument(skip(api))]
pub fn fetch_lead_summary<A: MediaWikiApi + ?Sized>(
    api: &A,
    titles: &str,
) -> Result<LeadSummary, Error> {
    let payload = api.get_json(lead_params(titles))?;
    let batch = response::decode_pages(payload)?;
    tracing::debug!(pages = batch.items.len(), "extracts query returned");

    if batch.items.len() > 1 {
        tracing::warn!(
            message = "Query returned several pages, using the first one",
            pages = ?batch.items.iter().map(|page| page.title.as_str()).collect::<Vec<_>>()
        );
    }
    let page = batch.items.into_iter().next().ok_or(SchemaError::NoPages)?;
    if page.missing {
        tracing::warn!(message = "Page does not exist", title = page.title.as_str());
    }
    tracing::trace!(extract = ?page.extract);

    Ok(LeadSummary {
        title: page.title,
        extract: page.extract.filter(|extract| !extract.is_empty()),
    })
}
