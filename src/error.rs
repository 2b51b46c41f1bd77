use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid target identifier: {0}")]
    InvalidTargetId(String),

    #[error("invalid UniProt accession: {0}")]
    InvalidAccession(String),

    #[error("invalid PDB structure id: {0}")]
    InvalidStructureId(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("TTD request failed: {0}")]
    TtdHttp(String),

    #[error("TTD returned status {status}: {message}")]
    TtdStatus { status: u16, message: String },

    #[error("failed to read target list {path}: {message}")]
    TtdFile { path: PathBuf, message: String },

    #[error("uniprot request failed: {0}")]
    UniprotHttp(String),

    #[error("uniprot returned status {status}: {message}")]
    UniprotStatus { status: u16, message: String },

    #[error("SIFTS request failed: {0}")]
    SiftsHttp(String),

    #[error("SIFTS returned status {status}: {message}")]
    SiftsStatus { status: u16, message: String },

    #[error("failed to parse SIFTS mapping: {0}")]
    SiftsParse(String),

    #[error("RCSB request failed: {0}")]
    RcsbHttp(String),

    #[error("RCSB returned status {status}: {message}")]
    RcsbStatus { status: u16, message: String },

    #[error("RCSB GraphQL error: {0}")]
    RcsbGraphql(String),

    #[error("SCHRODINGER is not set; cannot locate structconvert")]
    MissingConverterRoot,

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("structure conversion failed: {0}")]
    Conversion(String),

    #[error("structure conversion timed out after {0}s")]
    ConversionTimeout(u64),

    #[error("failed to write run log: {0}")]
    RunLog(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
