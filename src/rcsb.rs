use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{Value, json};
use tempfile::Builder;

use crate::domain::{StructureCandidate, StructureId};
use crate::error::KiraError;
use crate::http::{self, FetchError, RetryPolicy};

const ENTRIES_QUERY: &str = r#"
query($ids: [String!]!) {
  entries(entry_ids: $ids) {
    rcsb_id
    exptl { method }
    rcsb_entry_info { resolution_combined }
  }
}
"#;

pub trait RcsbClient: Send + Sync {
    /// Metadata for the requested entries. Entries RCSB does not return are
    /// simply absent from the result.
    fn fetch_entries(&self, ids: &[StructureId]) -> Result<Vec<StructureCandidate>, KiraError>;
    fn download_structure(&self, id: &StructureId, destination: &Path) -> Result<(), KiraError>;
}

#[derive(Clone)]
pub struct RcsbHttpClient {
    client: Client,
    graphql_url: String,
    download_url: String,
    retry: RetryPolicy,
}

impl RcsbHttpClient {
    pub fn new(
        graphql_url: impl Into<String>,
        download_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, KiraError> {
        let client =
            http::build_client(timeout).map_err(|err| KiraError::RcsbHttp(err.to_string()))?;
        Ok(Self {
            client,
            graphql_url: graphql_url.into(),
            download_url: download_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn structure_url(&self, id: &StructureId) -> String {
        format!("{}/{}.cif", self.download_url, id.as_str())
    }
}

impl RcsbClient for RcsbHttpClient {
    fn fetch_entries(&self, ids: &[StructureId]) -> Result<Vec<StructureCandidate>, KiraError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "query": ENTRIES_QUERY,
            "variables": { "ids": ids.iter().map(|id| id.as_str()).collect::<Vec<_>>() },
        });
        let raw_json: Value = http::fetch_with_retries(
            self.retry,
            || self.client.post(&self.graphql_url).json(&body),
            |resp| resp.json(),
        )
        .map_err(rcsb_error)?;
        parse_entries_response(&raw_json)
    }

    fn download_structure(&self, id: &StructureId, destination: &Path) -> Result<(), KiraError> {
        let url = self.structure_url(id);
        let content =
            http::fetch_with_retries(self.retry, || self.client.get(&url), |resp| resp.bytes())
                .map_err(rcsb_error)?;

        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = Builder::new()
            .prefix(".kira-ts-download")
            .tempfile_in(parent)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        if destination.exists() {
            std::fs::remove_file(destination)
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        temp.persist(destination)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn rcsb_error(err: FetchError) -> KiraError {
    err.into_kira(KiraError::RcsbHttp, |status, message| {
        KiraError::RcsbStatus { status, message }
    })
}

/// Turns a GraphQL `entries` payload into candidates, skipping `null` entries.
pub fn parse_entries_response(raw: &Value) -> Result<Vec<StructureCandidate>, KiraError> {
    if let Some(errors) = raw.get("errors").and_then(|v| v.as_array()) {
        if let Some(first) = errors.first() {
            let message = first
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown GraphQL error");
            return Err(KiraError::RcsbGraphql(message.to_string()));
        }
    }

    let Some(entries) = raw
        .get("data")
        .and_then(|v| v.get("entries"))
        .and_then(|v| v.as_array())
    else {
        return Ok(Vec::new());
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let Some(structure_id) = entry
            .get("rcsb_id")
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse::<StructureId>().ok())
        else {
            continue;
        };
        let method = entry
            .get("exptl")
            .and_then(|v| v.as_array())
            .and_then(|array| array.first())
            .and_then(|v| v.get("method"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        let resolution = entry
            .get("rcsb_entry_info")
            .and_then(|v| v.get("resolution_combined"))
            .and_then(|v| v.as_array())
            .and_then(|array| array.first())
            .and_then(|v| v.as_f64());
        candidates.push(StructureCandidate {
            structure_id,
            method,
            resolution,
        });
    }
    Ok(candidates)
}
