use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-ts.json";
pub const DEFAULT_TTD_URL: &str =
    "https://ttd.idrblab.cn/files/download/P2-02-TTD_uniprot_successful.txt";
pub const DEFAULT_UNIPROT_URL: &str = "https://rest.uniprot.org";
pub const DEFAULT_SIFTS_URL: &str =
    "https://ftp.ebi.ac.uk/pub/databases/msd/sifts/flatfiles/csv/pdb_chain_uniprot.csv.gz";
pub const DEFAULT_RCSB_GRAPHQL_URL: &str = "https://data.rcsb.org/graphql";
pub const DEFAULT_RCSB_DOWNLOAD_URL: &str = "https://files.rcsb.org/download";

/// On-disk configuration; every field is optional and falls back to the defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub max_resolution: Option<f64>,
    #[serde(default)]
    pub experimental_methods: Option<Vec<String>>,
    #[serde(default)]
    pub raw_download_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub converted_pdb_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub converted_mae_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub download_log: Option<Utf8PathBuf>,
    #[serde(default)]
    pub conversion_log: Option<Utf8PathBuf>,
    #[serde(default)]
    pub log_policy: Option<LogPolicy>,
    #[serde(default)]
    pub schrodinger_root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub target_list_file: Option<Utf8PathBuf>,
    #[serde(default)]
    pub ttd_url: Option<String>,
    #[serde(default)]
    pub uniprot_url: Option<String>,
    #[serde(default)]
    pub sifts_url: Option<String>,
    #[serde(default)]
    pub rcsb_graphql_url: Option<String>,
    #[serde(default)]
    pub rcsb_download_url: Option<String>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    #[serde(default)]
    pub http_retries: Option<usize>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub converter_timeout_secs: Option<u64>,
    #[serde(default)]
    pub metadata_batch_size: Option<usize>,
}

/// What happens to existing CSV logs at the start of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogPolicy {
    #[default]
    Truncate,
    Append,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub max_resolution: f64,
    pub experimental_methods: Vec<String>,
    pub raw_download_dir: Utf8PathBuf,
    pub converted_pdb_dir: Utf8PathBuf,
    pub converted_mae_dir: Utf8PathBuf,
    pub download_log: Utf8PathBuf,
    pub conversion_log: Utf8PathBuf,
    pub log_policy: LogPolicy,
    pub schrodinger_root: Option<Utf8PathBuf>,
    pub target_list_file: Option<Utf8PathBuf>,
    pub ttd_url: String,
    pub uniprot_url: String,
    pub sifts_url: String,
    pub rcsb_graphql_url: String,
    pub rcsb_download_url: String,
    pub http_timeout_secs: u64,
    pub http_retries: usize,
    pub retry_delay_ms: u64,
    pub converter_timeout_secs: u64,
    pub metadata_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_resolution: 3.0,
            experimental_methods: vec!["X-RAY DIFFRACTION".to_string()],
            raw_download_dir: Utf8PathBuf::from("PDB_repository_TTD"),
            converted_pdb_dir: Utf8PathBuf::from("PDB_converted_PDB"),
            converted_mae_dir: Utf8PathBuf::from("PDB_converted_MAE"),
            download_log: Utf8PathBuf::from("download_log.csv"),
            conversion_log: Utf8PathBuf::from("conversion_log.csv"),
            log_policy: LogPolicy::Truncate,
            schrodinger_root: None,
            target_list_file: None,
            ttd_url: DEFAULT_TTD_URL.to_string(),
            uniprot_url: DEFAULT_UNIPROT_URL.to_string(),
            sifts_url: DEFAULT_SIFTS_URL.to_string(),
            rcsb_graphql_url: DEFAULT_RCSB_GRAPHQL_URL.to_string(),
            rcsb_download_url: DEFAULT_RCSB_DOWNLOAD_URL.to_string(),
            http_timeout_secs: 60,
            http_retries: 3,
            retry_delay_ms: 500,
            converter_timeout_secs: 600,
            metadata_batch_size: 500,
        }
    }
}

/// Command-line values; they win over the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_resolution: Option<f64>,
    pub experimental_methods: Option<Vec<String>>,
    pub raw_download_dir: Option<Utf8PathBuf>,
    pub converted_pdb_dir: Option<Utf8PathBuf>,
    pub converted_mae_dir: Option<Utf8PathBuf>,
    pub target_list_file: Option<Utf8PathBuf>,
    pub log_policy: Option<LogPolicy>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<PipelineConfig, KiraError> {
        let file = Self::load_file(path)?;
        Self::resolve_config(file, |key| std::env::var(key).ok(), overrides)
    }

    /// Reads the explicit config path, or the first default location that exists.
    pub fn load_file(path: Option<&str>) -> Result<Option<Config>, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => match Self::default_locations().into_iter().find(|p| p.exists()) {
                Some(found) => found,
                None => return Ok(None),
            },
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;
        Ok(Some(config))
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
        if let Some(dirs) = BaseDirs::new() {
            locations.push(
                dirs.config_dir()
                    .join("kira-target-structures")
                    .join(DEFAULT_CONFIG_FILE),
            );
        }
        locations
    }

    pub fn resolve_config<E>(
        file: Option<Config>,
        env: E,
        overrides: ConfigOverrides,
    ) -> Result<PipelineConfig, KiraError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut config = PipelineConfig::default();

        if let Some(file) = file {
            apply_file(&mut config, file);
        }
        apply_env(&mut config, env)?;

        if let Some(value) = overrides.max_resolution {
            config.max_resolution = value;
        }
        if let Some(value) = overrides.experimental_methods {
            config.experimental_methods = normalize_methods(value);
        }
        if let Some(value) = overrides.raw_download_dir {
            config.raw_download_dir = value;
        }
        if let Some(value) = overrides.converted_pdb_dir {
            config.converted_pdb_dir = value;
        }
        if let Some(value) = overrides.converted_mae_dir {
            config.converted_mae_dir = value;
        }
        if let Some(value) = overrides.target_list_file {
            config.target_list_file = Some(value);
        }
        if let Some(value) = overrides.log_policy {
            config.log_policy = value;
        }

        validate(&config)?;
        Ok(config)
    }
}

fn apply_file(config: &mut PipelineConfig, file: Config) {
    let Config {
        max_resolution,
        experimental_methods,
        raw_download_dir,
        converted_pdb_dir,
        converted_mae_dir,
        download_log,
        conversion_log,
        log_policy,
        schrodinger_root,
        target_list_file,
        ttd_url,
        uniprot_url,
        sifts_url,
        rcsb_graphql_url,
        rcsb_download_url,
        http_timeout_secs,
        http_retries,
        retry_delay_ms,
        converter_timeout_secs,
        metadata_batch_size,
    } = file;

    config.max_resolution = max_resolution.unwrap_or(config.max_resolution);
    if let Some(methods) = experimental_methods {
        config.experimental_methods = normalize_methods(methods);
    }
    if let Some(path) = raw_download_dir {
        config.raw_download_dir = path;
    }
    if let Some(path) = converted_pdb_dir {
        config.converted_pdb_dir = path;
    }
    if let Some(path) = converted_mae_dir {
        config.converted_mae_dir = path;
    }
    if let Some(path) = download_log {
        config.download_log = path;
    }
    if let Some(path) = conversion_log {
        config.conversion_log = path;
    }
    config.log_policy = log_policy.unwrap_or(config.log_policy);
    config.schrodinger_root = schrodinger_root.or(config.schrodinger_root.take());
    config.target_list_file = target_list_file.or(config.target_list_file.take());
    if let Some(url) = ttd_url {
        config.ttd_url = url;
    }
    if let Some(url) = uniprot_url {
        config.uniprot_url = url;
    }
    if let Some(url) = sifts_url {
        config.sifts_url = url;
    }
    if let Some(url) = rcsb_graphql_url {
        config.rcsb_graphql_url = url;
    }
    if let Some(url) = rcsb_download_url {
        config.rcsb_download_url = url;
    }
    config.http_timeout_secs = http_timeout_secs.unwrap_or(config.http_timeout_secs);
    config.http_retries = http_retries.unwrap_or(config.http_retries);
    config.retry_delay_ms = retry_delay_ms.unwrap_or(config.retry_delay_ms);
    config.converter_timeout_secs =
        converter_timeout_secs.unwrap_or(config.converter_timeout_secs);
    config.metadata_batch_size = metadata_batch_size.unwrap_or(config.metadata_batch_size);
}

fn apply_env<E>(config: &mut PipelineConfig, env: E) -> Result<(), KiraError>
where
    E: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|value| !value.trim().is_empty());

    if let Some(value) = non_empty("MAX_RESOLUTION") {
        config.max_resolution = value.trim().parse().map_err(|_| {
            KiraError::InvalidConfig(format!("MAX_RESOLUTION is not a number: {value}"))
        })?;
    }
    if let Some(value) = non_empty("EXPERIMENTAL_METHODS") {
        config.experimental_methods =
            normalize_methods(value.split(',').map(str::to_string).collect());
    }
    if let Some(value) = non_empty("RAW_DOWNLOAD_DIR") {
        config.raw_download_dir = Utf8PathBuf::from(value);
    }
    if let Some(value) = non_empty("CONVERTED_PDB_DIR") {
        config.converted_pdb_dir = Utf8PathBuf::from(value);
    }
    if let Some(value) = non_empty("MAE_OUTPUT_DIR") {
        config.converted_mae_dir = Utf8PathBuf::from(value);
    }
    if let Some(value) = non_empty("SCHRODINGER") {
        config.schrodinger_root = Some(Utf8PathBuf::from(value));
    }
    Ok(())
}

pub fn normalize_methods(methods: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for method in methods {
        let method = method.trim().to_uppercase();
        if !method.is_empty() && !out.contains(&method) {
            out.push(method);
        }
    }
    out
}

fn validate(config: &PipelineConfig) -> Result<(), KiraError> {
    if !config.max_resolution.is_finite() || config.max_resolution <= 0.0 {
        return Err(KiraError::InvalidConfig(format!(
            "max_resolution must be a positive number, got {}",
            config.max_resolution
        )));
    }
    if config.experimental_methods.is_empty() {
        return Err(KiraError::InvalidConfig(
            "experimental_methods must not be empty".to_string(),
        ));
    }
    if config.metadata_batch_size == 0 {
        return Err(KiraError::InvalidConfig(
            "metadata_batch_size must be at least 1".to_string(),
        ));
    }
    Ok(())
}
