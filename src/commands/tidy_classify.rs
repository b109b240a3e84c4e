use anyhow::Result;

use crate::commands::CommandReport;
use crate::error::TidyError;
use crate::logging::RunLog;
use crate::tidy::classifier::{Classifier, classify_tags, resolve_classifier, select_tags};
use crate::tidy::config::{TidyConfig, load_config};
use crate::tidy::folders::FolderOverview;
use crate::tidy::paths::{TidyPaths, resolve_paths};
use crate::tidy::plan_config::RawPlanConfig;
use crate::tidy::tags::TagInput;
use crate::tidy::util::{read_json, write_json_pretty};

pub struct Classification {
    pub raw: RawPlanConfig,
    pub tags_sent: usize,
    pub projects: usize,
    pub categories: usize,
}

/// Classify the summarized tags and save the resulting plan configuration.
pub fn classify_and_save(
    cfg: &TidyConfig,
    paths: &TidyPaths,
    classifier: &dyn Classifier,
    log: &mut RunLog,
) -> Result<Classification> {
    for input in [&paths.tag_input_file, &paths.overview_file] {
        if !input.exists() {
            return Err(TidyError::MissingInput(input.clone()).into());
        }
    }
    let tag_input: TagInput = read_json(&paths.tag_input_file)?;
    let overview: FolderOverview = read_json(&paths.overview_file)?;
    let tags = select_tags(&tag_input, cfg.classifier.sample_size);

    log.info(format!(
        "Sending {} of {} tags to {}",
        tags.tags.len(),
        tag_input.tags.len(),
        classifier.label()
    ));
    let raw = match classify_tags(classifier, &tags, &overview) {
        Ok(raw) => raw,
        Err(err) => {
            log.error(format!("Classification failed: {err:#}"));
            return Err(err);
        }
    };
    let validated = raw.validate()?;
    write_json_pretty(&paths.plan_config_file, &raw)?;
    log.info(format!(
        "Wrote {} projects to {}",
        validated.projects.len(),
        paths.plan_config_file.display()
    ));

    Ok(Classification {
        raw,
        tags_sent: tags.tags.len(),
        projects: validated.projects.len(),
        categories: validated.categories.len(),
    })
}

pub fn run() -> Result<CommandReport> {
    let cfg = load_config()?;
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("classify");

    let classifier = match resolve_classifier(&cfg.classifier) {
        Ok(classifier) => classifier,
        Err(err) => {
            report.issue(format!("classifier unavailable: {err:#}"));
            return Ok(report);
        }
    };

    let mut log = RunLog::open(&paths.log_file("classify"))?;
    let out = classify_and_save(&cfg, &paths, classifier.as_ref(), &mut log)?;

    report.detail(format!("classifier={}", classifier.label()));
    report.detail(format!("tags_sent={}", out.tags_sent));
    report.detail(format!("projects={}", out.projects));
    report.detail(format!("categories={}", out.categories));
    report.detail(format!("plan_config={}", paths.plan_config_file.display()));
    Ok(report)
}
