use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Read};
use std::sync::OnceLock;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use tracing::info;

use crate::domain::{AccessionCode, StructureId};
use crate::error::KiraError;
use crate::http::{self, RetryPolicy};

/// UniProt accession to PDB cross-reference lookup.
pub trait SiftsClient: Send + Sync {
    fn structure_ids(&self, accession: &AccessionCode) -> Result<Vec<StructureId>, KiraError>;
}

/// `accession -> PDB ids` built from the SIFTS `pdb_chain_uniprot` table.
#[derive(Debug, Default, Clone)]
pub struct SiftsIndex {
    entries: HashMap<AccessionCode, Vec<StructureId>>,
}

impl SiftsIndex {
    /// Parses the uncompressed CSV. Leading `#` comment lines are skipped, then
    /// the header row must name the `PDB` and `SP_PRIMARY` columns.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, KiraError> {
        let mut buffered = BufReader::new(reader);
        skip_comment_lines(&mut buffered)?;

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(buffered);
        let headers = csv_reader
            .headers()
            .map_err(|err| KiraError::SiftsParse(err.to_string()))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| KiraError::SiftsParse(format!("missing column {name}")))
        };
        let pdb_col = column("PDB")?;
        let acc_col = column("SP_PRIMARY")?;

        let mut entries: HashMap<AccessionCode, Vec<StructureId>> = HashMap::new();
        let mut seen: HashSet<(AccessionCode, StructureId)> = HashSet::new();
        for record in csv_reader.records() {
            let record = record.map_err(|err| KiraError::SiftsParse(err.to_string()))?;
            let (Some(pdb), Some(acc)) = (record.get(pdb_col), record.get(acc_col)) else {
                continue;
            };
            let (Ok(pdb), Ok(acc)) = (pdb.parse::<StructureId>(), acc.parse::<AccessionCode>())
            else {
                continue;
            };
            if seen.insert((acc.clone(), pdb.clone())) {
                entries.entry(acc).or_default().push(pdb);
            }
        }
        Ok(Self { entries })
    }

    pub fn from_gzip<R: Read>(reader: R) -> Result<Self, KiraError> {
        Self::from_reader(GzDecoder::new(reader))
    }

    pub fn get(&self, accession: &AccessionCode) -> &[StructureId] {
        self.entries
            .get(accession)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn accession_count(&self) -> usize {
        self.entries.len()
    }
}

fn skip_comment_lines<R: BufRead>(reader: &mut R) -> Result<(), KiraError> {
    loop {
        let buf = reader
            .fill_buf()
            .map_err(|err| KiraError::SiftsParse(err.to_string()))?;
        if buf.first() != Some(&b'#') {
            return Ok(());
        }
        let mut line = Vec::new();
        reader
            .read_until(b'\n', &mut line)
            .map_err(|err| KiraError::SiftsParse(err.to_string()))?;
    }
}

impl SiftsClient for SiftsIndex {
    fn structure_ids(&self, accession: &AccessionCode) -> Result<Vec<StructureId>, KiraError> {
        Ok(self.get(accession).to_vec())
    }
}

/// Downloads the SIFTS flat file on first use and answers every later lookup
/// from memory. A failed download is remembered for the rest of the run.
pub struct SiftsFlatFileClient {
    client: Client,
    url: String,
    retry: RetryPolicy,
    index: OnceLock<Result<SiftsIndex, String>>,
}

impl SiftsFlatFileClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, KiraError> {
        let client =
            http::build_client(timeout).map_err(|err| KiraError::SiftsHttp(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            retry,
            index: OnceLock::new(),
        })
    }

    fn download_index(&self) -> Result<SiftsIndex, KiraError> {
        info!(url = %self.url, "downloading SIFTS mapping");
        let body = http::fetch_with_retries(
            self.retry,
            || self.client.get(&self.url),
            |resp| resp.bytes(),
        )
        .map_err(|err| {
            err.into_kira(KiraError::SiftsHttp, |status, message| {
                KiraError::SiftsStatus { status, message }
            })
        })?;
        let raw: &[u8] = &body;
        let index = if self.url.ends_with(".gz") {
            SiftsIndex::from_gzip(raw)?
        } else {
            SiftsIndex::from_reader(raw)?
        };
        info!(accessions = index.accession_count(), "SIFTS mapping loaded");
        Ok(index)
    }

    fn index(&self) -> Result<&SiftsIndex, KiraError> {
        self.index
            .get_or_init(|| self.download_index().map_err(|err| err.to_string()))
            .as_ref()
            .map_err(|message| KiraError::SiftsHttp(message.clone()))
    }
}

impl SiftsClient for SiftsFlatFileClient {
    fn structure_ids(&self, accession: &AccessionCode) -> Result<Vec<StructureId>, KiraError> {
        Ok(self.index()?.get(accession).to_vec())
    }
}
