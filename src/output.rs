use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunSummary};
use crate::config::PipelineConfig;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(result: &RunSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_config(config: &PipelineConfig) -> io::Result<()> {
        Self::print_json(config)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub fn print_summary(summary: &RunSummary, config: &PipelineConfig) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}KIRA-TS summary{reset}");
    println!(
        "  targets {}  mapped {}  selected {}",
        summary.targets, summary.mapped, summary.selected
    );
    if summary.dry_run {
        println!("{yellow}  dry run: nothing downloaded{reset}");
        for selection in &summary.selections {
            let resolution = selection
                .candidate
                .resolution
                .map(|value| format!("{value:.2} Å"))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {} {} -> {} ({resolution})",
                selection.target,
                selection.accession,
                selection.structure_id()
            );
        }
    } else {
        println!(
            "{green}  downloaded {}{reset}  {red}failed {}{reset}",
            summary.downloaded, summary.download_failures
        );
        println!(
            "{green}  converted {}{reset}  {red}failed {}{reset}",
            summary.converted, summary.conversion_failures
        );
        println!("  download log:   {}", config.download_log);
        println!("  conversion log: {}", config.conversion_log);
    }
    if !summary.skipped.is_empty() {
        println!("{yellow}  skipped targets: {}{reset}", summary.skipped.len());
    }
}
