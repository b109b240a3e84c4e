use anyhow::Result;
use std::path::PathBuf;

use crate::commands::CommandReport;
use crate::logging::RunLog;
use crate::tidy::config::load_config;
use crate::tidy::executor::{ExecutionMode, ExecutionRequest, run_execution};
use crate::tidy::paths::resolve_paths;

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub revert: bool,
    pub dry_run: bool,
    pub plan_file: Option<PathBuf>,
    pub target_root: Option<PathBuf>,
}

pub fn run(opts: &ExecuteOptions) -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let mode = if opts.revert {
        ExecutionMode::Revert
    } else {
        ExecutionMode::Apply
    };
    let mut report = CommandReport::new(format!("execute-{}", mode.label()));

    let Some(target_root) = opts.target_root.clone().or_else(|| cfg.target_root()) else {
        report.issue("no target root; pass --target-root or set [planning] target_root");
        return Ok(report);
    };

    let request = ExecutionRequest {
        mode,
        dry_run: opts.dry_run,
        plan_file: opts.plan_file.clone().unwrap_or_else(|| paths.plan_file.clone()),
        target_root,
    };
    let mut log = RunLog::open(&paths.log_file("execute"))?;
    let outcome = run_execution(&request, &mut log)?;

    report.detail(format!("mode={}", mode.label()));
    report.detail(format!("dry_run={}", opts.dry_run));
    report.detail(format!("plan={}", outcome.plan_source.display()));
    if let Some(copy) = outcome.plan_copy.as_ref() {
        report.detail(format!("plan_copy={}", copy.display()));
    }
    report.detail(format!("moved={}", outcome.stats.moved));
    report.detail(format!("skipped={}", outcome.stats.skipped));
    report.detail(format!("missing={}", outcome.stats.missing));
    report.detail(format!("collisions={}", outcome.stats.collisions));
    report.detail(format!("log_warnings={}", log.warning_count()));
    if let Some(log_path) = log.path() {
        report.detail(format!("log={}", log_path.display()));
    }
    Ok(report)
}
