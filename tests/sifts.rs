mod support;

use std::fs::File;
use std::io::Write;
use std::sync::atomic::Ordering;
use std::time::Duration;

use assert_matches::assert_matches;
use flate2::Compression;
use flate2::write::GzEncoder;

use kira_target_structures::domain::AccessionCode;
use kira_target_structures::error::KiraError;
use kira_target_structures::http::RetryPolicy;
use kira_target_structures::sifts::{SiftsClient, SiftsFlatFileClient, SiftsIndex};

use support::{quick_retries, response, serve, truncated};

const FIXTURE: &str = "tests/fixtures/sifts_sample.csv";

fn accession(value: &str) -> AccessionCode {
    value.parse().unwrap()
}

fn ids(index: &SiftsIndex, value: &str) -> Vec<String> {
    index
        .get(&accession(value))
        .iter()
        .map(|id| id.to_string())
        .collect()
}

#[test]
fn parse_fixture_index() {
    let index = SiftsIndex::from_reader(File::open(FIXTURE).unwrap()).unwrap();
    assert_eq!(index.accession_count(), 3);
    assert_eq!(ids(&index, "P22303"), vec!["1B41", "4EY4"]);
    assert_eq!(ids(&index, "P02185"), vec!["101M"]);
    assert!(ids(&index, "Q00000").is_empty());
}

#[test]
fn parse_gzip_index() {
    let raw = std::fs::read(FIXTURE).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    let compressed = encoder.finish().unwrap();

    let index = SiftsIndex::from_gzip(compressed.as_slice()).unwrap();
    assert_eq!(ids(&index, "P69905"), vec!["2HHB"]);
}

#[test]
fn index_answers_as_client() {
    let index = SiftsIndex::from_reader(File::open(FIXTURE).unwrap()).unwrap();
    let found = index.structure_ids(&accession("P22303")).unwrap();
    assert_eq!(found.len(), 2);
    assert!(index.structure_ids(&accession("Q00000")).unwrap().is_empty());
}

#[test]
fn missing_columns_fail() {
    let raw = "PDB,CHAIN,SP_BEG\n1b41,A,35\n";
    let err = SiftsIndex::from_reader(raw.as_bytes()).unwrap_err();
    assert_matches!(err, KiraError::SiftsParse(_));
}

#[test]
fn unreachable_mapping_fails_every_lookup() {
    let retry = RetryPolicy {
        max_retries: 0,
        delay: Duration::from_millis(1),
    };
    let client = SiftsFlatFileClient::new(
        "http://127.0.0.1:9/pdb_chain_uniprot.csv.gz",
        Duration::from_secs(2),
        retry,
    )
    .unwrap();

    let first = client.structure_ids(&accession("P22303")).unwrap_err();
    let second = client.structure_ids(&accession("P69905")).unwrap_err();
    assert_matches!(first, KiraError::SiftsHttp(_));
    assert_matches!(second, KiraError::SiftsHttp(_));
}

#[test]
fn interrupted_mapping_download_is_restarted() {
    let raw = std::fs::read(FIXTURE).unwrap();
    let (url, connections) = serve(vec![
        truncated(&raw[..raw.len() / 2], raw.len()),
        response("200 OK", &raw),
    ]);
    let client = SiftsFlatFileClient::new(
        format!("{url}/pdb_chain_uniprot.csv"),
        Duration::from_secs(5),
        quick_retries(3),
    )
    .unwrap();

    let found = client.structure_ids(&accession("P69905")).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].as_str(), "2HHB");
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}
