use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::domain::{AccessionCode, TargetIdentifier};
use crate::error::KiraError;
use crate::http::{self, RetryPolicy};

pub trait UniprotClient: Send + Sync {
    /// Resolves a UniProt entry name to its primary accession, if UniProt knows it.
    fn accession_for(&self, target: &TargetIdentifier) -> Result<Option<AccessionCode>, KiraError>;
}

#[derive(Clone)]
pub struct UniprotHttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl UniprotHttpClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, KiraError> {
        let client =
            http::build_client(timeout).map_err(|err| KiraError::UniprotHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/uniprotkb/search", self.base_url)
    }
}

impl UniprotClient for UniprotHttpClient {
    fn accession_for(&self, target: &TargetIdentifier) -> Result<Option<AccessionCode>, KiraError> {
        let url = self.search_url();
        let query = format!("(id:{})", target.as_str());
        let raw_json: Value = http::fetch_with_retries(
            self.retry,
            || {
                self.client.get(&url).query(&[
                    ("query", query.as_str()),
                    ("fields", "accession,id"),
                    ("format", "json"),
                    ("size", "5"),
                ])
            },
            |resp| resp.json(),
        )
        .map_err(|err| {
            err.into_kira(KiraError::UniprotHttp, |status, message| {
                KiraError::UniprotStatus { status, message }
            })
        })?;
        parse_search_response(&raw_json, target)
    }
}

/// Picks the accession for `target` out of a `uniprotkb/search` payload.
///
/// An entry whose `uniProtkbId` matches the entry name wins; otherwise the
/// first result carrying a `primaryAccession` is used.
pub fn parse_search_response(
    raw: &Value,
    target: &TargetIdentifier,
) -> Result<Option<AccessionCode>, KiraError> {
    let Some(results) = raw.get("results").and_then(|v| v.as_array()) else {
        return Ok(None);
    };

    let accession_of = |item: &Value| {
        item.get("primaryAccession")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
    };

    let exact = results.iter().find(|item| {
        item.get("uniProtkbId")
            .and_then(|v| v.as_str())
            .map(|id| id.eq_ignore_ascii_case(target.as_str()))
            .unwrap_or(false)
    });
    let chosen = exact
        .and_then(accession_of)
        .or_else(|| results.iter().find_map(accession_of));

    chosen.map(|value| value.parse()).transpose()
}

/// Per-run memo of entry name lookups. Only answered lookups are stored, so a
/// failed request is retried the next time the same name comes up.
#[derive(Debug, Default)]
pub struct AccessionCache {
    entries: HashMap<TargetIdentifier, Option<AccessionCode>>,
}

impl AccessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup<U: UniprotClient + ?Sized>(
        &mut self,
        client: &U,
        target: &TargetIdentifier,
    ) -> Result<Option<AccessionCode>, KiraError> {
        if let Some(cached) = self.entries.get(target) {
            return Ok(cached.clone());
        }
        let resolved = client.accession_for(target)?;
        self.entries.insert(target.clone(), resolved.clone());
        Ok(resolved)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
