use crate::tidy::ranges::DEFAULT_RANGE_GAP_DAYS;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TidySourceConfig {
    pub folder: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TidyScanConfig {
    pub sample_size: usize,
}

impl Default for TidyScanConfig {
    fn default() -> Self {
        Self { sample_size: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TidyClassifierConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub sample_size: usize,
}

impl Default for TidyClassifierConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: "google/gemini-2.5-flash".to_string(),
            base_url: None,
            temperature: 0.0,
            max_tokens: 1500,
            timeout_secs: 120,
            sample_size: 200,
        }
    }
}

/// Where per-project time ranges come from when a plan is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeSource {
    /// Derive ranges only for projects that declare none.
    Auto,
    /// Use declared ranges only.
    Declared,
    /// Replace declared ranges with derived ones for every project.
    Derived,
}

impl RangeSource {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "declared" => Some(Self::Declared),
            "derived" => Some(Self::Derived),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Declared => "declared",
            Self::Derived => "derived",
        }
    }
}

/// Which time-range misses of a known project surface as plan warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeWarnings {
    Silent,
    Gaps,
    All,
}

impl RangeWarnings {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "silent" | "off" | "none" => Some(Self::Silent),
            "gaps" | "gap" => Some(Self::Gaps),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Gaps => "gaps",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TidyPlanningConfig {
    pub target_root: Option<String>,
    pub range_gap_days: u32,
    pub range_source: RangeSource,
    pub range_warnings: RangeWarnings,
}

impl Default for TidyPlanningConfig {
    fn default() -> Self {
        Self {
            target_root: None,
            range_gap_days: DEFAULT_RANGE_GAP_DAYS,
            range_source: RangeSource::Auto,
            range_warnings: RangeWarnings::Silent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TidyConfig {
    pub source: TidySourceConfig,
    pub scan: TidyScanConfig,
    pub classifier: TidyClassifierConfig,
    pub planning: TidyPlanningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialTidyConfig {
    source: Option<TidySourceConfig>,
    scan: Option<TidyScanConfig>,
    classifier: Option<TidyClassifierConfig>,
    planning: Option<TidyPlanningConfig>,
}

fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_or_f64(var: &str, fallback: f64) -> f64 {
    env_non_empty(var)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(fallback)
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    env_non_empty(var)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn env_or_string(var: &str, fallback: &str) -> String {
    env_non_empty(var).unwrap_or_else(|| fallback.to_string())
}

fn validate(cfg: &TidyConfig) -> Result<()> {
    if cfg.scan.sample_size == 0 {
        return Err(anyhow!("invalid scan sample size: must be >= 1"));
    }
    if cfg.classifier.sample_size == 0 {
        return Err(anyhow!("invalid classifier sample size: must be >= 1"));
    }
    if !(0.0..=2.0).contains(&cfg.classifier.temperature) {
        return Err(anyhow!("invalid classifier temperature: require 0.0 <= t <= 2.0"));
    }
    if cfg.classifier.max_tokens == 0 {
        return Err(anyhow!("invalid classifier max tokens: must be >= 1"));
    }
    if cfg.classifier.timeout_secs == 0 {
        return Err(anyhow!("invalid classifier timeout: must be >= 1 second"));
    }
    if cfg.classifier.model.trim().is_empty() {
        return Err(anyhow!("invalid classifier model: cannot be empty"));
    }
    if cfg.planning.range_gap_days == 0 {
        return Err(anyhow!("invalid range gap: must be >= 1 day"));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Some(custom) = env_non_empty("TIDY_CONFIG_PATH") {
        return Some(PathBuf::from(custom));
    }

    let home = dirs::home_dir()?;
    Some(home.join(".folder_tidy").join("tidy.toml"))
}

fn merge_file_config(base: &mut TidyConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialTidyConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse tidy config {}: {err}", path.display()))?;
    if let Some(source) = parsed.source {
        base.source = source;
    }
    if let Some(scan) = parsed.scan {
        base.scan = scan;
    }
    if let Some(classifier) = parsed.classifier {
        base.classifier = classifier;
    }
    if let Some(planning) = parsed.planning {
        base.planning = planning;
    }
    Ok(())
}

fn merge_env_overrides(cfg: &mut TidyConfig) -> Result<()> {
    if let Some(folder) = env_non_empty("TIDY_SOURCE_FOLDER") {
        cfg.source.folder = Some(folder);
    }
    cfg.scan.sample_size =
        env_or_u64("TIDY_SCAN_SAMPLE_SIZE", cfg.scan.sample_size as u64) as usize;

    cfg.classifier.provider = env_or_string("TIDY_CLASSIFIER_PROVIDER", &cfg.classifier.provider);
    cfg.classifier.model = env_or_string("TIDY_CLASSIFIER_MODEL", &cfg.classifier.model);
    if let Some(base_url) = env_non_empty("TIDY_CLASSIFIER_BASE_URL") {
        cfg.classifier.base_url = Some(base_url);
    }
    cfg.classifier.temperature =
        env_or_f64("TIDY_CLASSIFIER_TEMPERATURE", cfg.classifier.temperature);
    cfg.classifier.max_tokens =
        env_or_u64("TIDY_CLASSIFIER_MAX_TOKENS", cfg.classifier.max_tokens as u64) as u32;
    cfg.classifier.timeout_secs =
        env_or_u64("TIDY_CLASSIFIER_TIMEOUT_SECS", cfg.classifier.timeout_secs);
    cfg.classifier.sample_size = env_or_u64(
        "TIDY_CLASSIFIER_SAMPLE_SIZE",
        cfg.classifier.sample_size as u64,
    ) as usize;

    if let Some(target_root) = env_non_empty("TIDY_TARGET_ROOT") {
        cfg.planning.target_root = Some(target_root);
    }
    cfg.planning.range_gap_days =
        env_or_u64("TIDY_RANGE_GAP_DAYS", cfg.planning.range_gap_days as u64) as u32;
    if let Some(raw) = env_non_empty("TIDY_RANGE_SOURCE") {
        cfg.planning.range_source = RangeSource::parse(&raw)
            .ok_or_else(|| anyhow!("invalid TIDY_RANGE_SOURCE `{raw}`; use auto, declared or derived"))?;
    }
    if let Some(raw) = env_non_empty("TIDY_RANGE_WARNINGS") {
        cfg.planning.range_warnings = RangeWarnings::parse(&raw)
            .ok_or_else(|| anyhow!("invalid TIDY_RANGE_WARNINGS `{raw}`; use silent, gaps or all"))?;
    }
    Ok(())
}

pub fn load_config() -> Result<TidyConfig> {
    let mut cfg = TidyConfig::default();
    merge_file_config(&mut cfg)?;
    merge_env_overrides(&mut cfg)?;
    validate(&cfg)?;
    Ok(cfg)
}

impl TidyConfig {
    pub fn source_folder(&self) -> Option<PathBuf> {
        self.source.folder.as_deref().map(PathBuf::from)
    }

    /// Target root from config, else `<source parent>/<source name>-organized`.
    pub fn target_root(&self) -> Option<PathBuf> {
        if let Some(root) = self.planning.target_root.as_deref() {
            return Some(PathBuf::from(root));
        }
        let source = self.source_folder()?;
        let name = source.file_name()?.to_string_lossy().to_string();
        let parent = source.parent().map(PathBuf::from).unwrap_or_default();
        Some(parent.join(format!("{name}-organized")))
    }
}
