use std::{fmt, str::FromStr, time::Duration};

use reqwest::blocking::Client;
use serde_json::Value;

pub const DEFAULT_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_USER_AGENT: &str = concat!(
    "wikiedits/",
    env!("CARGO_PKG_VERSION"),
    " (edit history reports; https://www.mediawiki.org/wiki/API:Etiquette)"
);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to the MediaWiki API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("MediaWiki API responded with HTTP {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("failed to decode MediaWiki API response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("MediaWiki API error [{code}]: {info}")]
    Remote { code: String, info: String },
}

/// Ordered list of query-string parameters for one API request.
///
/// Setting a key that is already present replaces its value in place, so the
/// order in which keys were first set is the order they are sent in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters for an `action=query` request.
    pub fn query() -> Self {
        Self::new().with("action", "query")
    }

    pub fn set(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.pairs.push((key, value)),
        }
        self
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set_opt<V: ToString>(&mut self, key: &'static str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.set(key, value.to_string());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Adds `format=json` unless a response format was already chosen.
    pub fn with_default_format(mut self) -> Self {
        if !self.contains("format") {
            self.pairs.push(("format", "json".to_string()));
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Value of a `*limit` parameter: either a count or the server-side maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(u32),
    Max,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Count(count) => write!(f, "{count}"),
            Limit::Max => write!(f, "max"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid limit {0:?}: expected a positive number or \"max\"")]
pub struct InvalidLimit(String);

impl FromStr for Limit {
    type Err = InvalidLimit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("max") {
            return Ok(Limit::Max);
        }
        match s.parse::<u32>() {
            Ok(count) if count > 0 => Ok(Limit::Count(count)),
            _ => Err(InvalidLimit(s.to_string())),
        }
    }
}

/// Anything that can answer MediaWiki API queries with a JSON document.
pub trait MediaWikiApi {
    /// Performs one request with exactly the given parameters.
    fn send(&self, params: &QueryParams) -> Result<Value, ApiError>;

    /// Performs one request, defaulting the response format to JSON.
    fn get_json(&self, params: QueryParams) -> Result<Value, ApiError> {
        let params = params.with_default_format();
        tracing::debug!(params = ?params, "querying MediaWiki API");
        self.send(&params)
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub endpoint: String,
    pub user_agent: String,
    /// `None` keeps the HTTP client's default.
    pub timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
        }
    }
}

/// Blocking client holding one connection pool for its whole lifetime.
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ApiError::Client)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

impl MediaWikiApi for ApiClient {
    fn send(&self, params: &QueryParams) -> Result<Value, ApiError> {
        let pairs: Vec<(&str, &str)> = params.iter().collect();
        let response = self
            .client
            .get(self.config.endpoint.as_str())
            .query(&pairs)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                url: response.url().to_string(),
            });
        }

        let body = response.text()?;
        let payload: Value = serde_json::from_str(&body)?;
        check_payload(&payload)?;
        Ok(payload)
    }
}

/// Turns a top-level `error` object into an error and logs any `warnings`.
pub(crate) fn check_payload(payload: &Value) -> Result<(), ApiError> {
    if let Some(error) = payload.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        let info = error
            .get("info")
            .and_then(Value::as_str)
            .unwrap_or("unknown info");
        return Err(ApiError::Remote {
            code: code.to_string(),
            info: info.to_string(),
        });
    }
    if let Some(warnings) = payload.get("warnings") {
        tracing::warn!(message = "MediaWiki API returned warnings", warnings = %warnings);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_format_is_injected() {
        let params = QueryParams::query().with("list", "usercontribs");
        let params = params.with_default_format();

        assert_eq!(params.get("format"), Some("json"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_explicit_format_is_kept() {
        let params = QueryParams::query()
            .with("format", "xml")
            .with_default_format();

        assert_eq!(params.get("format"), Some("xml"));
        assert_eq!(params.iter().filter(|(k, _)| *k == "format").count(), 1);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut params = QueryParams::query().with("rvlimit", "500").with("titles", "Pizza");
        params.set("rvlimit", "10");

        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(
            pairs,
            vec![("action", "query"), ("rvlimit", "10"), ("titles", "Pizza")]
        );
    }

    #[test]
    fn test_set_opt_skips_none() {
        let mut params = QueryParams::new();
        params.set_opt("uctag", None::<&str>);
        params.set_opt("uclimit", Some(Limit::Max));

        assert!(!params.contains("uctag"));
        assert_eq!(params.get("uclimit"), Some("max"));
    }

    #[test]
    fn test_limit_parsing() {
        assert_eq!("max".parse::<Limit>().unwrap(), Limit::Max);
        assert_eq!("MAX".parse::<Limit>().unwrap(), Limit::Max);
        assert_eq!("250".parse::<Limit>().unwrap(), Limit::Count(250));
        assert!("0".parse::<Limit>().is_err());
        assert!("lots".parse::<Limit>().is_err());
        assert_eq!(Limit::Count(500).to_string(), "500");
    }

    #[test]
    fn test_remote_error_is_surfaced() {
        let payload = json!({
            "error": { "code": "baduser_ucuser", "info": "Invalid value for user parameter" }
        });

        match check_payload(&payload) {
            Err(ApiError::Remote { code, info }) => {
                assert_eq!(code, "baduser_ucuser");
                assert_eq!(info, "Invalid value for user parameter");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_warnings_are_not_errors() {
        let payload = json!({
            "warnings": { "main": { "warnings": "Unrecognized parameter: foo." } },
            "query": {}
        });

        assert!(check_payload(&payload).is_ok());
    }

    #[test]
    fn test_get_json_injects_format_before_sending() {
        struct Echo;

        impl MediaWikiApi for Echo {
            fn send(&self, params: &QueryParams) -> Result<Value, ApiError> {
                Ok(json!({ "format": params.get("format") }))
            }
        }

        let echoed = Echo.get_json(QueryParams::query()).unwrap();
        assert_eq!(echoed, json!({ "format": "json" }));

        let echoed = Echo
            .get_json(QueryParams::query().with("format", "php"))
            .unwrap();
        assert_eq!(echoed, json!({ "format": "php" }));
    }
}
