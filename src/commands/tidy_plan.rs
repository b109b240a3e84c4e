use anyhow::Result;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::commands::tidy_classify::classify_and_save;
use crate::error::TidyError;
use crate::logging::RunLog;
use crate::tidy::classifier::resolve_classifier;
use crate::tidy::config::load_config;
use crate::tidy::paths::resolve_paths;
use crate::tidy::plan_config::load_raw_plan_config;
use crate::tidy::planner::{PlanOptions, PlanSummary, build_plan_from_raw, summarize, write_plan};
use crate::tidy::record::load_metadata;
use crate::tidy::util::write_json_pretty;

const MAX_REPORTED_WARNINGS: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct PlanCommandOptions {
    pub manual_config: Option<PathBuf>,
    pub no_ai: bool,
    pub target_root: Option<PathBuf>,
}

pub fn run(opts: &PlanCommandOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("plan");

    let Some(target_root) = opts.target_root.clone().or_else(|| cfg.target_root()) else {
        report.issue(
            "no target root; pass --target-root or set [planning] target_root / [source] folder",
        );
        return Ok(report);
    };

    let mut log = RunLog::open(&paths.log_file("plan"))?;
    let records = load_metadata(&paths.metadata_file)?;
    log.info(format!(
        "Loaded {} records from {}",
        records.len(),
        paths.metadata_file.display()
    ));

    let raw = if let Some(manual) = opts.manual_config.as_deref() {
        log.info(format!("Using manual configuration {}", manual.display()));
        load_raw_plan_config(manual)?
    } else if paths.plan_config_file.exists() {
        log.info(format!(
            "Using saved configuration {}",
            paths.plan_config_file.display()
        ));
        load_raw_plan_config(&paths.plan_config_file)?
    } else if opts.no_ai {
        return Err(TidyError::MissingInput(paths.plan_config_file.clone()).into());
    } else {
        let classifier = resolve_classifier(&cfg.classifier)?;
        classify_and_save(&cfg, &paths, classifier.as_ref(), &mut log)?.raw
    };

    let options = PlanOptions {
        range_warnings: cfg.planning.range_warnings,
    };
    let output = build_plan_from_raw(
        &records,
        &raw,
        &target_root,
        cfg.planning.range_source,
        cfg.planning.range_gap_days,
        &options,
    )?;
    let plan_sha256 = write_plan(&paths.plan_file, &output.entries)?;

    for warning in &output.warnings {
        log.warn(warning);
    }
    let summary = PlanSummary {
        distribution: summarize(&output.entries),
        range_misses: output
            .range_misses
            .iter()
            .map(|(kind, count)| (kind.label().to_string(), *count))
            .collect(),
        range_source: cfg.planning.range_source.label().to_string(),
        target_root: target_root.display().to_string(),
        generated_at: chrono::Local::now().to_rfc3339(),
        metadata_count: records.len(),
        plan_sha256: plan_sha256.clone(),
        warnings: output.warnings.clone(),
    };
    write_json_pretty(&paths.plan_summary_file, &summary)?;
    log.info(format!(
        "Plan written to {} ({} entries, {} warnings, {} collisions)",
        paths.plan_file.display(),
        summary.distribution.entry_count,
        summary.warnings.len(),
        summary.distribution.collisions
    ));

    report.detail(format!("entries={}", summary.distribution.entry_count));
    report.detail(format!("projects={}", summary.distribution.unique_projects));
    report.detail(format!("categories={}", summary.distribution.unique_categories));
    report.detail(format!("collisions={}", summary.distribution.collisions));
    for (reason, count) in &summary.range_misses {
        report.detail(format!("range_miss.{reason}={count}"));
    }
    report.detail(format!("warnings={}", summary.warnings.len()));
    for warning in summary.warnings.iter().take(MAX_REPORTED_WARNINGS) {
        report.detail(format!("warning: {warning}"));
    }
    report.detail(format!("target_root={}", summary.target_root));
    report.detail(format!("plan={}", paths.plan_file.display()));
    report.detail(format!("plan_sha256={plan_sha256}"));
    Ok(report)
}
