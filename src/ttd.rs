use std::collections::HashSet;
use std::fs;
use std::sync::OnceLock;
use std::time::Duration;

use camino::Utf8PathBuf;
use regex::Regex;
use reqwest::blocking::Client;

use crate::domain::TargetIdentifier;
use crate::error::KiraError;
use crate::http::{self, RetryPolicy};

/// Source of the raw TTD target list text.
pub trait TargetListClient: Send + Sync {
    fn fetch_list(&self) -> Result<String, KiraError>;
}

#[derive(Clone)]
pub struct TtdHttpClient {
    client: Client,
    url: String,
    retry: RetryPolicy,
}

impl TtdHttpClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, KiraError> {
        let client =
            http::build_client(timeout).map_err(|err| KiraError::TtdHttp(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            retry,
        })
    }
}

impl TargetListClient for TtdHttpClient {
    fn fetch_list(&self) -> Result<String, KiraError> {
        http::fetch_with_retries(self.retry, || self.client.get(&self.url), |resp| resp.text())
            .map_err(|err| {
                err.into_kira(KiraError::TtdHttp, |status, message| {
                    KiraError::TtdStatus { status, message }
                })
            })
    }
}

/// Reads a previously downloaded TTD list from disk.
#[derive(Debug, Clone)]
pub struct TtdFileSource {
    path: Utf8PathBuf,
}

impl TtdFileSource {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

impl TargetListClient for TtdFileSource {
    fn fetch_list(&self) -> Result<String, KiraError> {
        fs::read_to_string(self.path.as_std_path()).map_err(|err| KiraError::TtdFile {
            path: self.path.clone().into_std_path_buf(),
            message: err.to_string(),
        })
    }
}

/// The configured source: a local file when one is given, TTD otherwise.
pub enum TargetListSource {
    Http(TtdHttpClient),
    File(TtdFileSource),
}

impl TargetListClient for TargetListSource {
    fn fetch_list(&self) -> Result<String, KiraError> {
        match self {
            TargetListSource::Http(client) => client.fetch_list(),
            TargetListSource::File(source) => source.fetch_list(),
        }
    }
}

fn uniprot_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(?:[^\t\n]+\t)?UNIPROID[ \t]+(.*)$").unwrap())
}

/// Extracts UniProt entry names from `UNIPROID` lines, with or without the
/// leading TTD target id column.
///
/// A line may carry several `;`-separated names. Tokens that do not clean up
/// into a valid identifier (the column header, blanks) are dropped, and the
/// result keeps first-seen order without duplicates.
pub fn parse_target_list(content: &str) -> Vec<TargetIdentifier> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for caps in uniprot_line_regex().captures_iter(content) {
        let Some(value) = caps.get(1) else {
            continue;
        };
        for token in value.as_str().split(';') {
            let Ok(id) = token.parse::<TargetIdentifier>() else {
                continue;
            };
            if seen.insert(id.clone()) {
                targets.push(id);
            }
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multi_id_lines() {
        let content = "T47101\tUNIPROID\tFGFR1_HUMAN; FGFR2_HUMAN\r\nT47101\tTARGNAME\tFGFR\r\n";
        let ids = parse_target_list(content);
        let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(names, vec!["FGFR1_HUMAN", "FGFR2_HUMAN"]);
    }
}
