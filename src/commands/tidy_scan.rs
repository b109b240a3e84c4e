use anyhow::Result;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::logging::RunLog;
use crate::tidy::config::load_config;
use crate::tidy::paths::resolve_paths;
use crate::tidy::record::{MetadataRow, write_metadata};
use crate::tidy::scan::{ScanManifest, collect, write_manifest};
use crate::tidy::util::write_json_pretty;

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub source: Option<PathBuf>,
    pub sample_size: Option<usize>,
}

pub fn run(opts: &ScanOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("scan");

    let Some(source) = opts.source.clone().or_else(|| cfg.source_folder()) else {
        report.issue("no source folder; pass --source or set [source] folder / TIDY_SOURCE_FOLDER");
        return Ok(report);
    };
    if !source.is_dir() {
        report.issue(format!("source folder does not exist: {}", source.display()));
        return Ok(report);
    }

    let mut log = RunLog::open(&paths.log_file("scan"))?;
    log.info(format!("Scanning {}", source.display()));
    let outcome = collect(&source, &mut log)?;

    write_metadata(&paths.metadata_file, &outcome.records)?;
    let sample_size = opts.sample_size.unwrap_or(cfg.scan.sample_size);
    let sample: Vec<MetadataRow> = outcome
        .records
        .iter()
        .take(sample_size)
        .map(|r| r.to_row())
        .collect();
    write_json_pretty(&paths.metadata_sample_file, &sample)?;
    match ScanManifest::from_outcome(&outcome) {
        Some(manifest) => write_manifest(&paths.scan_manifest_file, &manifest)?,
        None => log.warn(format!(
            "Source folder {} has no name; summarize will need --root-name",
            outcome.root.display()
        )),
    }
    log.info(format!(
        "Collected {} files ({} unreadable)",
        outcome.records.len(),
        outcome.unreadable
    ));

    report.detail(format!("source={}", source.display()));
    report.detail(format!("records={}", outcome.records.len()));
    report.detail(format!("unreadable={}", outcome.unreadable));
    report.detail(format!("metadata={}", paths.metadata_file.display()));
    report.detail(format!("manifest={}", paths.scan_manifest_file.display()));
    report.detail(format!(
        "sample={} ({} rows)",
        paths.metadata_sample_file.display(),
        sample.len()
    ));
    Ok(report)
}
