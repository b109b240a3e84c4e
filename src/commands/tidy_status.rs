use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::tidy::config::load_config;
use crate::tidy::paths::resolve_paths;

include!(concat!(env!("OUT_DIR"), "/tidy_env_allowlist.rs"));

/// Allowlisted `TIDY_*` variables that are set to a non-empty value.
pub fn configured_env_keys() -> Vec<&'static str> {
    GENERATED_TIDY_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| matches!(env::var(key), Ok(v) if !v.trim().is_empty()))
        .collect()
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");
    report.detail(format!("build={}", env!("BUILD_UUID")));

    report.detail(format!("output_dir={}", paths.output_dir.display()));
    report.detail(format!("metadata_file={}", paths.metadata_file.display()));
    report.detail(format!("plan_config_file={}", paths.plan_config_file.display()));
    report.detail(format!("plan_file={}", paths.plan_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            report.issue(format!("invalid tidy config: {err:#}"));
            return Ok(report);
        }
    };
    report.detail(format!(
        "source_folder={}",
        cfg.source_folder()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unset>".to_string())
    ));
    report.detail(format!(
        "target_root={}",
        cfg.target_root()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unset>".to_string())
    ));
    report.detail(format!(
        "classifier={}:{}",
        cfg.classifier.provider, cfg.classifier.model
    ));
    report.detail(format!("range_source={}", cfg.planning.range_source.label()));
    report.detail(format!("range_gap_days={}", cfg.planning.range_gap_days));
    report.detail(format!(
        "range_warnings={}",
        cfg.planning.range_warnings.label()
    ));

    let keys = configured_env_keys();
    if keys.is_empty() {
        report.detail("env_overrides=<none>");
    } else {
        report.detail(format!("env_overrides={}", keys.join(",")));
    }

    report.detail(format!(
        "metadata_present={}",
        paths.metadata_file.exists()
    ));
    report.detail(format!(
        "plan_config_present={}",
        paths.plan_config_file.exists()
    ));
    report.detail(format!("plan_present={}", paths.plan_file.exists()));
    Ok(report)
}
