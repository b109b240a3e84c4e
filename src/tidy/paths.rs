use anyhow::Result;
use std::env;
use std::path::PathBuf;

/// File name of the plan table, both in the output dir and inside an applied
/// target root.
pub const PLAN_FILE_NAME: &str = "move_plan.csv";

#[derive(Debug, Clone)]
pub struct TidyPaths {
    pub output_dir: PathBuf,
    pub metadata_file: PathBuf,
    pub metadata_sample_file: PathBuf,
    pub scan_manifest_file: PathBuf,
    pub folder_summary_file: PathBuf,
    pub tags_file: PathBuf,
    pub tag_input_file: PathBuf,
    pub overview_file: PathBuf,
    pub plan_config_file: PathBuf,
    pub plan_file: PathBuf,
    pub plan_summary_file: PathBuf,
    pub logs_dir: PathBuf,
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<TidyPaths> {
    let output_dir = env_or_default_path("TIDY_OUTPUT_DIR", PathBuf::from("output"));

    let metadata_file = env_or_default_path("TIDY_METADATA_FILE", output_dir.join("metadata.json"));
    let metadata_sample_file = output_dir.join("metadata_sample.json");
    let scan_manifest_file = output_dir.join("scan_manifest.json");
    let folder_summary_file = output_dir.join("folder_summary.json");
    let tags_file = output_dir.join("tags.json");
    let tag_input_file = output_dir.join("tag_input.json");
    let overview_file = output_dir.join("folder_overview.json");
    let plan_config_file =
        env_or_default_path("TIDY_PLAN_CONFIG_FILE", output_dir.join("plan_config.json"));
    let plan_file = env_or_default_path("TIDY_PLAN_FILE", output_dir.join(PLAN_FILE_NAME));
    let plan_summary_file = output_dir.join("plan_summary.json");
    let logs_dir = env_or_default_path("TIDY_LOGS_DIR", output_dir.clone());

    Ok(TidyPaths {
        output_dir,
        metadata_file,
        metadata_sample_file,
        scan_manifest_file,
        folder_summary_file,
        tags_file,
        tag_input_file,
        overview_file,
        plan_config_file,
        plan_file,
        plan_summary_file,
        logs_dir,
    })
}

impl TidyPaths {
    pub fn log_file(&self, command: &str) -> PathBuf {
        self.logs_dir.join(format!("{command}.log"))
    }
}

/// Location of the plan copy that apply leaves behind in a target root.
pub fn plan_copy_path(target_root: &std::path::Path) -> PathBuf {
    target_root.join(PLAN_FILE_NAME)
}
