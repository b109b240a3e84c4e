use anyhow::Result;

use crate::commands::CommandReport;
use crate::logging::RunLog;
use crate::tidy::config::load_config;
use crate::tidy::folders::{aggregate, overview};
use crate::tidy::paths::resolve_paths;
use crate::tidy::record::load_metadata;
use crate::tidy::scan::load_manifest;
use crate::tidy::tags::extract_tags;
use crate::tidy::util::write_json_pretty;

const DEFAULT_ROOT_NAME: &str = "root";

#[derive(Debug, Clone, Default)]
pub struct SummarizeOptions {
    pub root_name: Option<String>,
}

pub fn run(opts: &SummarizeOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("summarize");
    let mut log = RunLog::open(&paths.log_file("summarize"))?;

    let records = load_metadata(&paths.metadata_file)?;
    let scanned_root = load_manifest(&paths.scan_manifest_file)?.map(|m| m.root_name);
    let root_name = opts
        .root_name
        .clone()
        .or(scanned_root)
        .or_else(|| {
            cfg.source_folder()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        })
        .unwrap_or_else(|| DEFAULT_ROOT_NAME.to_string());

    let summary = aggregate(&records, &root_name);
    let tag_input = extract_tags(&summary);
    let vocabulary = tag_input.vocabulary();
    let folder_overview = overview(&summary);

    write_json_pretty(&paths.folder_summary_file, &summary)?;
    write_json_pretty(&paths.tags_file, &vocabulary)?;
    write_json_pretty(&paths.tag_input_file, &tag_input)?;
    write_json_pretty(&paths.overview_file, &folder_overview)?;
    log.info(format!(
        "Summarized {} files into {} folders and {} tags",
        records.len(),
        summary.node_count,
        vocabulary.tags.len()
    ));

    report.detail(format!("root_name={root_name}"));
    report.detail(format!("files={}", folder_overview.total_files));
    report.detail(format!("folders={}", folder_overview.total_folders));
    report.detail(format!("tags={}", vocabulary.tags.len()));
    if let (Some(first), Some(last)) = (folder_overview.earliest_date, folder_overview.latest_date) {
        report.detail(format!("dates={first}..{last}"));
    }
    report.detail(format!("folder_summary={}", paths.folder_summary_file.display()));
    report.detail(format!("tags_file={}", paths.tags_file.display()));
    report.detail(format!("overview={}", paths.overview_file.display()));
    Ok(report)
}
