use std::collections::HashMap;

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::domain::{StructureCandidate, StructureId};
use crate::error::KiraError;
use crate::rcsb::RcsbClient;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionCriteria {
    pub max_resolution: f64,
    pub methods: Vec<String>,
}

impl SelectionCriteria {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_resolution: config.max_resolution,
            methods: config.experimental_methods.clone(),
        }
    }

    pub fn passes(&self, candidate: &StructureCandidate) -> bool {
        let method_ok = candidate
            .method
            .as_deref()
            .map(|method| {
                self.methods
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(method.trim()))
            })
            .unwrap_or(false);
        let resolution_ok = candidate
            .resolution
            .map(|value| value.is_finite() && value <= self.max_resolution)
            .unwrap_or(false);
        method_ok && resolution_ok
    }
}

/// Lowest resolution among the candidates that pass `criteria`.
///
/// Equal resolutions keep the earlier candidate, so the result is stable for a
/// stable input order.
pub fn select_best<'a, I>(candidates: I, criteria: &SelectionCriteria) -> Option<StructureCandidate>
where
    I: IntoIterator<Item = &'a StructureCandidate>,
{
    let mut best: Option<(&StructureCandidate, f64)> = None;
    for candidate in candidates {
        if !criteria.passes(candidate) {
            continue;
        }
        let Some(resolution) = candidate.resolution else {
            continue;
        };
        match best {
            Some((_, current)) if resolution >= current => {}
            _ => best = Some((candidate, resolution)),
        }
    }
    best.map(|(candidate, _)| candidate.clone())
}

/// Structure metadata already fetched this run. `None` marks ids RCSB returned
/// nothing for, so they are not asked for again.
#[derive(Debug, Default)]
pub struct CandidateCache {
    entries: HashMap<StructureId, Option<StructureCandidate>>,
}

impl CandidateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches whatever `ids` are not cached yet, `batch_size` ids per request,
    /// and returns the known candidates in the order of `ids`.
    pub fn candidates_for<R: RcsbClient + ?Sized>(
        &mut self,
        rcsb: &R,
        ids: &[StructureId],
        batch_size: usize,
    ) -> Result<Vec<StructureCandidate>, KiraError> {
        let mut missing: Vec<StructureId> = Vec::new();
        for id in ids {
            if !self.entries.contains_key(id) && !missing.contains(id) {
                missing.push(id.clone());
            }
        }

        for batch in missing.chunks(batch_size.max(1)) {
            let fetched = rcsb.fetch_entries(batch)?;
            for candidate in fetched {
                self.entries
                    .insert(candidate.structure_id.clone(), Some(candidate));
            }
            for id in batch {
                self.entries.entry(id.clone()).or_insert(None);
            }
        }

        Ok(ids
            .iter()
            .filter_map(|id| self.entries.get(id).cloned().flatten())
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
