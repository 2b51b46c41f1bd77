use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::convert::StructureConverter;
use crate::domain::{
    AccessionCode, ConvertFormat, DownloadedStructure, MappedTarget, SelectedStructure,
    TargetIdentifier,
};
use crate::error::KiraError;
use crate::fs_util;
use crate::rcsb::RcsbClient;
use crate::runlog::{
    ConversionLog, ConversionRow, ConversionStatus, DownloadLog, DownloadRow, DownloadStatus,
};
use crate::select::{CandidateCache, SelectionCriteria, select_best};
use crate::sifts::SiftsClient;
use crate::ttd::{TargetListClient, parse_target_list};
use crate::uniprot::{AccessionCache, UniprotClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Targets,
    Mapping,
    Selection,
    Download,
    Conversion,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Targets => "targets",
            Stage::Mapping => "mapping",
            Stage::Selection => "selection",
            Stage::Download => "download",
            Stage::Conversion => "conversion",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    StageStarted { stage: Stage, total: usize },
    Item { stage: Stage, label: String },
    StageFinished { stage: Stage, message: String },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after selection; nothing is downloaded, converted or logged.
    pub dry_run: bool,
}

/// A target dropped before download, with the stage that dropped it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTarget {
    pub identifier: String,
    pub accession: Option<String>,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub dry_run: bool,
    pub targets: usize,
    pub mapped: usize,
    pub selected: usize,
    pub downloaded: usize,
    pub download_failures: usize,
    pub converted: usize,
    pub conversion_failures: usize,
    pub selections: Vec<SelectedStructure>,
    pub skipped: Vec<SkippedTarget>,
}

pub struct App<T, U, S, R, C>
where
    T: TargetListClient,
    U: UniprotClient,
    S: SiftsClient,
    R: RcsbClient,
    C: StructureConverter,
{
    config: PipelineConfig,
    targets: T,
    uniprot: U,
    sifts: S,
    rcsb: R,
    converter: C,
}

impl<T, U, S, R, C> App<T, U, S, R, C>
where
    T: TargetListClient,
    U: UniprotClient,
    S: SiftsClient,
    R: RcsbClient,
    C: StructureConverter,
{
    pub fn new(
        config: PipelineConfig,
        targets: T,
        uniprot: U,
        sifts: S,
        rcsb: R,
        converter: C,
    ) -> Self {
        Self {
            config,
            targets,
            uniprot,
            sifts,
            rcsb,
            converter,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs every stage in order. Only an unreachable target list or an
    /// unwritable output location ends the run early; everything else is
    /// recorded per item.
    pub fn run(
        &self,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, KiraError> {
        let started_at = Utc::now().to_rfc3339();

        let targets = self.load_targets(sink)?;

        let mut skipped = Vec::new();
        let mut accessions = AccessionCache::new();
        let mapped = self.map_targets(&targets, &mut accessions, &mut skipped, sink);

        let mut candidates = CandidateCache::new();
        let selections = self.select_structures(&mapped, &mut candidates, &mut skipped, sink);

        let mut summary = RunSummary {
            started_at,
            finished_at: String::new(),
            dry_run: options.dry_run,
            targets: targets.len(),
            mapped: mapped.len(),
            selected: selections.len(),
            downloaded: 0,
            download_failures: 0,
            converted: 0,
            conversion_failures: 0,
            selections: Vec::new(),
            skipped,
        };

        if !options.dry_run {
            let mut download_log =
                DownloadLog::open(self.config.download_log.as_std_path(), self.config.log_policy)?;
            let mut conversion_log = ConversionLog::open(
                self.config.conversion_log.as_std_path(),
                self.config.log_policy,
            )?;

            let downloaded = self.download_structures(&selections, &mut download_log, sink)?;
            summary.downloaded = downloaded.len();
            summary.download_failures = selections.len() - downloaded.len();

            let rows = self.convert_structures(&downloaded, &mut conversion_log, sink)?;
            summary.converted = rows
                .iter()
                .filter(|row| row.status == ConversionStatus::Converted)
                .count();
            summary.conversion_failures = rows.len() - summary.converted;
        }

        summary.selections = selections;
        summary.finished_at = Utc::now().to_rfc3339();
        Ok(summary)
    }

    pub fn load_targets(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<TargetIdentifier>, KiraError> {
        sink.event(ProgressEvent::StageStarted {
            stage: Stage::Targets,
            total: 1,
        });
        let content = self.targets.fetch_list()?;
        let targets = parse_target_list(&content);
        if targets.is_empty() {
            warn!("target list contained no UniProt entry names");
        } else {
            info!(count = targets.len(), "loaded unique target identifiers");
        }
        sink.event(ProgressEvent::StageFinished {
            stage: Stage::Targets,
            message: format!("{} unique targets", targets.len()),
        });
        Ok(targets)
    }

    /// Maps entry names to accessions and accessions to PDB ids. An accession
    /// reached from two entry names is kept for the first one only.
    pub fn map_targets(
        &self,
        targets: &[TargetIdentifier],
        accessions: &mut AccessionCache,
        skipped: &mut Vec<SkippedTarget>,
        sink: &dyn ProgressSink,
    ) -> Vec<MappedTarget> {
        sink.event(ProgressEvent::StageStarted {
            stage: Stage::Mapping,
            total: targets.len(),
        });

        let mut claimed: HashMap<AccessionCode, TargetIdentifier> = HashMap::new();
        let mut mapped = Vec::new();
        for target in targets {
            sink.event(ProgressEvent::Item {
                stage: Stage::Mapping,
                label: target.to_string(),
            });

            let accession = match accessions.lookup(&self.uniprot, target) {
                Ok(Some(accession)) => accession,
                Ok(None) => {
                    let reason = "no UniProt accession found".to_string();
                    skip(skipped, target, None, Stage::Mapping, reason);
                    continue;
                }
                Err(err) => {
                    skip(skipped, target, None, Stage::Mapping, err.to_string());
                    continue;
                }
            };

            if let Some(owner) = claimed.get(&accession) {
                let reason = format!("accession already mapped from {owner}");
                skip(skipped, target, Some(&accession), Stage::Mapping, reason);
                continue;
            }
            claimed.insert(accession.clone(), target.clone());

            let structure_ids = match self.sifts.structure_ids(&accession) {
                Ok(ids) => ids,
                Err(err) => {
                    skip(skipped, target, Some(&accession), Stage::Mapping, err.to_string());
                    continue;
                }
            };
            if structure_ids.is_empty() {
                let reason = "no PDB structures in SIFTS".to_string();
                skip(skipped, target, Some(&accession), Stage::Mapping, reason);
                continue;
            }

            mapped.push(MappedTarget {
                target: target.clone(),
                accession,
                structure_ids,
            });
        }

        let total_ids: usize = mapped.iter().map(|item| item.structure_ids.len()).sum();
        info!(mapped = mapped.len(), structures = total_ids, "mapped targets to PDB entries");
        sink.event(ProgressEvent::StageFinished {
            stage: Stage::Mapping,
            message: format!("{} accessions, {total_ids} PDB entries", mapped.len()),
        });
        mapped
    }

    pub fn select_structures(
        &self,
        mapped: &[MappedTarget],
        candidates: &mut CandidateCache,
        skipped: &mut Vec<SkippedTarget>,
        sink: &dyn ProgressSink,
    ) -> Vec<SelectedStructure> {
        sink.event(ProgressEvent::StageStarted {
            stage: Stage::Selection,
            total: mapped.len(),
        });

        let criteria = SelectionCriteria::from_config(&self.config);
        let mut selections = Vec::new();
        for item in mapped {
            sink.event(ProgressEvent::Item {
                stage: Stage::Selection,
                label: item.accession.to_string(),
            });

            let found = match candidates.candidates_for(
                &self.rcsb,
                &item.structure_ids,
                self.config.metadata_batch_size,
            ) {
                Ok(found) => found,
                Err(err) => {
                    skip(
                        skipped,
                        &item.target,
                        Some(&item.accession),
                        Stage::Selection,
                        err.to_string(),
                    );
                    continue;
                }
            };

            match select_best(&found, &criteria) {
                Some(best) => {
                    info!(
                        entry = %item.target,
                        accession = %item.accession,
                        structure = %best.structure_id,
                        resolution = ?best.resolution,
                        "selected structure"
                    );
                    selections.push(SelectedStructure {
                        target: item.target.clone(),
                        accession: item.accession.clone(),
                        candidate: best,
                    });
                }
                None => {
                    let reason = format!(
                        "none of {} structures passes method and resolution filters",
                        item.structure_ids.len()
                    );
                    skip(skipped, &item.target, Some(&item.accession), Stage::Selection, reason);
                }
            }
        }

        sink.event(ProgressEvent::StageFinished {
            stage: Stage::Selection,
            message: format!("{} structures selected", selections.len()),
        });
        selections
    }

    pub fn download_structures(
        &self,
        selections: &[SelectedStructure],
        log: &mut DownloadLog,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<DownloadedStructure>, KiraError> {
        sink.event(ProgressEvent::StageStarted {
            stage: Stage::Download,
            total: selections.len(),
        });
        let raw_dir = self.config.raw_download_dir.as_std_path();
        fs_util::ensure_dir(raw_dir)?;

        let mut downloaded = Vec::new();
        for selection in selections {
            sink.event(ProgressEvent::Item {
                stage: Stage::Download,
                label: selection.structure_id().to_string(),
            });

            let path = raw_dir.join(selection.raw_file_name());
            let result = self.rcsb.download_structure(selection.structure_id(), &path);
            let (status, message, logged_path) = match &result {
                Ok(()) => (DownloadStatus::Downloaded, String::new(), path.display().to_string()),
                Err(err) => {
                    warn!(
                        entry = %selection.target,
                        structure = %selection.structure_id(),
                        error = %err,
                        "download failed"
                    );
                    (DownloadStatus::Failed, err.to_string(), String::new())
                }
            };
            log.record(&DownloadRow {
                identifier: selection.target.to_string(),
                accession: selection.accession.to_string(),
                structure_id: selection.structure_id().to_string(),
                method: selection.candidate.method.clone().unwrap_or_default(),
                resolution: selection.candidate.resolution,
                status,
                message,
                path: logged_path,
            })?;

            if result.is_ok() {
                downloaded.push(DownloadedStructure {
                    selection: selection.clone(),
                    raw_path: path,
                });
            }
        }

        sink.event(ProgressEvent::StageFinished {
            stage: Stage::Download,
            message: format!("{}/{} downloaded", downloaded.len(), selections.len()),
        });
        Ok(downloaded)
    }

    /// Converts every downloaded file to each format independently; one
    /// failing format does not stop the other or the next item.
    pub fn convert_structures(
        &self,
        downloaded: &[DownloadedStructure],
        log: &mut ConversionLog,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<ConversionRow>, KiraError> {
        sink.event(ProgressEvent::StageStarted {
            stage: Stage::Conversion,
            total: downloaded.len(),
        });

        let mut rows = Vec::new();
        for item in downloaded {
            let selection = &item.selection;
            sink.event(ProgressEvent::Item {
                stage: Stage::Conversion,
                label: selection.file_stem(),
            });

            for format in ConvertFormat::ALL {
                let root = match format {
                    ConvertFormat::Pdb => &self.config.converted_pdb_dir,
                    ConvertFormat::Mae => &self.config.converted_mae_dir,
                };
                let out_dir = root.as_std_path().join(selection.target.as_str());
                let output = out_dir.join(selection.converted_file_name(format));

                let row = match self.convert_one(&item.raw_path, format, &out_dir, &output) {
                    Ok(()) => ConversionRow {
                        identifier: selection.target.to_string(),
                        structure_id: selection.structure_id().to_string(),
                        format: format.to_string(),
                        status: ConversionStatus::Converted,
                        message: String::new(),
                        output_path: output.display().to_string(),
                    },
                    Err(err) => {
                        warn!(
                            entry = %selection.target,
                            %format,
                            error = %err,
                            "conversion failed"
                        );
                        ConversionRow {
                            identifier: selection.target.to_string(),
                            structure_id: selection.structure_id().to_string(),
                            format: format.to_string(),
                            status: ConversionStatus::Failed,
                            message: err.to_string(),
                            output_path: String::new(),
                        }
                    }
                };
                log.record(&row)?;
                rows.push(row);
            }
        }

        let converted = rows
            .iter()
            .filter(|row| row.status == ConversionStatus::Converted)
            .count();
        sink.event(ProgressEvent::StageFinished {
            stage: Stage::Conversion,
            message: format!("{converted}/{} conversions succeeded", rows.len()),
        });
        Ok(rows)
    }

    fn convert_one(
        &self,
        raw: &Path,
        format: ConvertFormat,
        out_dir: &Path,
        output: &Path,
    ) -> Result<(), KiraError> {
        if !raw.is_file() {
            return Err(KiraError::Filesystem(format!(
                "raw structure file missing: {}",
                raw.display()
            )));
        }
        fs_util::ensure_dir(out_dir)?;
        // a stale file from an earlier run must not count as this run's output
        if output.exists() {
            fs::remove_file(output).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        self.converter.convert(raw, format, output)?;
        if !output.is_file() {
            return Err(KiraError::Conversion(format!(
                "converter reported success but wrote no {}",
                output.display()
            )));
        }
        Ok(())
    }
}

fn skip(
    skipped: &mut Vec<SkippedTarget>,
    target: &TargetIdentifier,
    accession: Option<&AccessionCode>,
    stage: Stage,
    reason: String,
) {
    info!(entry = %target, %stage, reason = %reason, "skipping target");
    skipped.push(SkippedTarget {
        identifier: target.to_string(),
        accession: accession.map(|acc| acc.to_string()),
        stage,
        reason,
    });
}
