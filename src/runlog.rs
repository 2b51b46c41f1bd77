use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::LogPolicy;
use crate::error::KiraError;
use crate::fs_util;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Downloaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    Converted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRow {
    pub identifier: String,
    pub accession: String,
    pub structure_id: String,
    pub method: String,
    pub resolution: Option<f64>,
    pub status: DownloadStatus,
    pub message: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRow {
    pub identifier: String,
    pub structure_id: String,
    pub format: String,
    pub status: ConversionStatus,
    pub message: String,
    pub output_path: String,
}

/// Row type of a run log, with its header in field order.
pub trait LogRow: Serialize {
    const HEADERS: &'static [&'static str];
}

impl LogRow for DownloadRow {
    const HEADERS: &'static [&'static str] = &[
        "identifier",
        "accession",
        "structure_id",
        "method",
        "resolution",
        "status",
        "message",
        "path",
    ];
}

impl LogRow for ConversionRow {
    const HEADERS: &'static [&'static str] = &[
        "identifier",
        "structure_id",
        "format",
        "status",
        "message",
        "output_path",
    ];
}

/// Append-only CSV log of one row type.
///
/// Every row is flushed as soon as it is written, so the file reflects the
/// run so far even when the process is interrupted.
pub struct CsvLog<T> {
    writer: csv::Writer<File>,
    rows: usize,
    _row: PhantomData<T>,
}

pub type DownloadLog = CsvLog<DownloadRow>;
pub type ConversionLog = CsvLog<ConversionRow>;

impl<T: LogRow> CsvLog<T> {
    /// Opens `path` under `policy`. `Truncate` starts a fresh file; `Append`
    /// keeps existing rows and only writes a header into a new or empty file.
    pub fn open(path: &Path, policy: LogPolicy) -> Result<Self, KiraError> {
        fs_util::ensure_parent(path)?;
        let (file, write_header) = match policy {
            LogPolicy::Truncate => {
                let file = File::create(path)
                    .map_err(|err| KiraError::RunLog(format!("{}: {err}", path.display())))?;
                (file, true)
            }
            LogPolicy::Append => {
                let has_content = fs_util::is_non_empty_file(path);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|err| KiraError::RunLog(format!("{}: {err}", path.display())))?;
                (file, !has_content)
            }
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if write_header {
            writer
                .write_record(T::HEADERS)
                .map_err(|err| KiraError::RunLog(err.to_string()))?;
            writer
                .flush()
                .map_err(|err| KiraError::RunLog(err.to_string()))?;
        }
        Ok(Self {
            writer,
            rows: 0,
            _row: PhantomData,
        })
    }

    pub fn record(&mut self, row: &T) -> Result<(), KiraError> {
        self.writer
            .serialize(row)
            .map_err(|err| KiraError::RunLog(err.to_string()))?;
        self.writer
            .flush()
            .map_err(|err| KiraError::RunLog(err.to_string()))?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written through this handle (not counting earlier runs).
    pub fn rows(&self) -> usize {
        self.rows
    }
}
