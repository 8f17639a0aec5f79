//! Canned MediaWiki responses for driving the query functions without a network.

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::api::{ApiError, MediaWikiApi, QueryParams};

pub mod prelude {
    pub(crate) use super::{contribs_payload, extract_payload, revisions_payload, ts, FakeApi};
    pub(crate) use proptest::prelude::*;
}

pub fn ts(value: &str) -> DateTime<Utc> {
    crate::response::parse_timestamp(value).unwrap()
}

/// Answers requests whose parameters contain all pairs of a route with that
/// route's payload; the first matching route wins. Unmatched requests fail
/// with [`ApiError::Remote`].
#[derive(Default)]
pub struct FakeApi {
    routes: Vec<(Vec<(&'static str, &'static str)>, Value)>,
    requests: RefCell<Vec<QueryParams>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, matching: &[(&'static str, &'static str)], payload: Value) -> Self {
        self.routes.push((matching.to_vec(), payload));
        self
    }

    /// Every request sent so far, after default parameters were applied.
    pub fn requests(&self) -> Vec<QueryParams> {
        self.requests.borrow().clone()
    }
}

impl MediaWikiApi for FakeApi {
    fn send(&self, params: &QueryParams) -> Result<Value, ApiError> {
        self.requests.borrow_mut().push(params.clone());

        self.routes
            .iter()
            .find(|(matching, _)| {
                matching
                    .iter()
                    .all(|(key, value)| params.get(key) == Some(*value))
            })
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| ApiError::Remote {
                code: "fake_no_route".to_string(),
                info: format!("no canned response for {params:?}"),
            })
    }
}

pub fn revisions_payload(title: &str, revisions: &[(&str, &str)]) -> Value {
    let revisions: Vec<Value> = revisions
        .iter()
        .enumerate()
        .map(|(i, (user, timestamp))| {
            json!({
                "user": user,
                "timestamp": timestamp,
                "comment": format!("edit {i}"),
                "size": 1000 + i,
            })
        })
        .collect();

    json!({
        "batchcomplete": true,
        "query": {
            "pages": [{ "pageid": 1, "ns": 0, "title": title, "revisions": revisions }]
        }
    })
}

pub fn contribs_payload(contributions: &[(&str, &str)]) -> Value {
    let contributions: Vec<Value> = contributions
        .iter()
        .map(|(title, timestamp)| {
            json!({ "ns": 0, "title": title, "timestamp": timestamp, "comment": "" })
        })
        .collect();

    json!({
        "batchcomplete": true,
        "query": { "usercontribs": contributions }
    })
}

pub fn extract_payload(title: &str, extract: &str) -> Value {
    json!({
        "batchcomplete": true,
        "query": {
            "pages": [{ "pageid": 1, "ns": 0, "title": title, "extract": extract }]
        }
    })
}
