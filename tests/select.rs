use std::path::Path;
use std::sync::Mutex;

use kira_target_structures::domain::{StructureCandidate, StructureId};
use kira_target_structures::error::KiraError;
use kira_target_structures::rcsb::RcsbClient;
use kira_target_structures::select::{CandidateCache, SelectionCriteria, select_best};

fn candidate(id: &str, method: &str, resolution: Option<f64>) -> StructureCandidate {
    StructureCandidate {
        structure_id: id.parse().unwrap(),
        method: Some(method.to_string()),
        resolution,
    }
}

fn criteria(max_resolution: f64, methods: &[&str]) -> SelectionCriteria {
    SelectionCriteria {
        max_resolution,
        methods: methods.iter().map(|m| m.to_string()).collect(),
    }
}

#[test]
fn lowest_resolution_wins() {
    let list = vec![
        candidate("1AAA", "X-RAY DIFFRACTION", Some(2.9)),
        candidate("2BBB", "X-RAY DIFFRACTION", Some(2.1)),
        candidate("3CCC", "X-RAY DIFFRACTION", Some(3.5)),
    ];
    let best = select_best(&list, &criteria(3.0, &["X-RAY DIFFRACTION"])).unwrap();
    assert_eq!(best.structure_id.as_str(), "2BBB");
    assert_eq!(best.resolution, Some(2.1));
}

#[test]
fn method_filter_excludes_everything() {
    let list = vec![
        candidate("1AAA", "ELECTRON MICROSCOPY", Some(2.9)),
        candidate("2BBB", "SOLUTION NMR", None),
    ];
    assert!(select_best(&list, &criteria(3.0, &["X-RAY DIFFRACTION"])).is_none());
}

#[test]
fn method_match_ignores_case() {
    let list = vec![candidate("1AAA", "x-ray diffraction", Some(1.2))];
    assert!(select_best(&list, &criteria(3.0, &["X-RAY DIFFRACTION"])).is_some());
}

#[test]
fn several_methods_allowed() {
    let list = vec![
        candidate("1AAA", "X-RAY DIFFRACTION", Some(2.9)),
        candidate("7ZZZ", "ELECTRON MICROSCOPY", Some(2.4)),
    ];
    let best = select_best(
        &list,
        &criteria(3.0, &["X-RAY DIFFRACTION", "ELECTRON MICROSCOPY"]),
    )
    .unwrap();
    assert_eq!(best.structure_id.as_str(), "7ZZZ");
}

#[test]
fn empty_candidates_select_nothing() {
    let list: Vec<StructureCandidate> = Vec::new();
    assert!(select_best(&list, &criteria(3.0, &["X-RAY DIFFRACTION"])).is_none());
}

#[derive(Default)]
struct RecordingRcsb {
    batches: Mutex<Vec<Vec<String>>>,
}

impl RcsbClient for RecordingRcsb {
    fn fetch_entries(&self, ids: &[StructureId]) -> Result<Vec<StructureCandidate>, KiraError> {
        self.batches
            .lock()
            .unwrap()
            .push(ids.iter().map(|id| id.to_string()).collect());
        // 9ZZZ is unknown to RCSB
        Ok(ids
            .iter()
            .filter(|id| id.as_str() != "9ZZZ")
            .map(|id| candidate(id.as_str(), "X-RAY DIFFRACTION", Some(2.0)))
            .collect())
    }

    fn download_structure(&self, _id: &StructureId, _destination: &Path) -> Result<(), KiraError> {
        Err(KiraError::RcsbHttp("not implemented".to_string()))
    }
}

fn structure_ids(values: &[&str]) -> Vec<StructureId> {
    values.iter().map(|v| v.parse().unwrap()).collect()
}

#[test]
fn cache_batches_and_skips_known_ids() {
    let rcsb = RecordingRcsb::default();
    let mut cache = CandidateCache::new();

    let first = cache
        .candidates_for(&rcsb, &structure_ids(&["1AAA", "2BBB", "9ZZZ"]), 2)
        .unwrap();
    let first_ids: Vec<&str> = first.iter().map(|c| c.structure_id.as_str()).collect();
    assert_eq!(first_ids, vec!["1AAA", "2BBB"]);

    let second = cache
        .candidates_for(&rcsb, &structure_ids(&["2BBB", "9ZZZ", "3CCC"]), 2)
        .unwrap();
    let second_ids: Vec<&str> = second.iter().map(|c| c.structure_id.as_str()).collect();
    assert_eq!(second_ids, vec!["2BBB", "3CCC"]);

    let batches = rcsb.batches.lock().unwrap();
    assert_eq!(
        *batches,
        vec![
            vec!["1AAA".to_string(), "2BBB".to_string()],
            vec!["9ZZZ".to_string()],
            vec!["3CCC".to_string()],
        ]
    );
    assert_eq!(cache.len(), 4);
}
