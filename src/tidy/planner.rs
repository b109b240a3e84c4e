use crate::tidy::config::{RangeSource, RangeWarnings};
use crate::tidy::plan_config::{
    PLACEHOLDER_CATEGORY, PLACEHOLDER_PROJECT, PLACEHOLDER_TIME_RANGE, PlanConfig, RawPlanConfig,
};
use crate::tidy::project::{
    FALLBACK_PROJECT_NAME, FALLBACK_TIME_RANGE_LABEL, RangeMissKind, TimeRange,
    lookup_time_range, match_project,
};
use crate::tidy::ranges::derive_time_ranges;
use crate::tidy::record::{DATE_FORMAT, FileRecord};
use crate::tidy::util::{sha256_hex, write_atomic};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const NOTE_PROJECT_FALLBACK: &str = "project fallback";
pub const NOTE_TIME_RANGE_FALLBACK: &str = "time range fallback";
pub const NOTE_TARGET_COLLISION: &str = "target collision";
pub const NOTE_OK: &str = "ok";
const FILENAME_SEPARATOR: &str = "-";

/// One row of the move plan. Field order is the plan table's column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub old_path: String,
    pub new_path: String,
    pub project: String,
    pub time_range: String,
    pub category: String,
    pub modified_time: String,
    pub notes: String,
}

impl PlanEntry {
    pub fn has_note(&self, note: &str) -> bool {
        self.notes.split(';').any(|n| n.trim() == note)
    }
}

/// Project-specific ranges that replace a project's declared ones, keyed by
/// canonical name.
pub type RangeOverrides = BTreeMap<String, Vec<TimeRange>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub range_warnings: RangeWarnings,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            range_warnings: RangeWarnings::Silent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOutput {
    pub entries: Vec<PlanEntry>,
    pub warnings: Vec<String>,
    pub range_misses: BTreeMap<RangeMissKind, usize>,
}

fn reports(level: RangeWarnings, kind: RangeMissKind) -> bool {
    match level {
        RangeWarnings::Silent => false,
        RangeWarnings::Gaps => kind == RangeMissKind::Gap,
        RangeWarnings::All => true,
    }
}

/// `a-b-c-name.ext` from the chain segments and the original file name.
pub fn derive_target_filename(folder_chain: &[String], original_name: &str) -> String {
    let mut parts: Vec<&str> = folder_chain
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        return original_name.to_string();
    }
    parts.push(original_name);
    parts.join(FILENAME_SEPARATOR)
}

pub fn render_target_dir(pattern: &str, time_range: &str, project: &str, category: &str) -> String {
    pattern
        .replace(PLACEHOLDER_TIME_RANGE, time_range)
        .replace(PLACEHOLDER_PROJECT, project)
        .replace(PLACEHOLDER_CATEGORY, category)
}

/// Derive per-project ranges from the dates of the records each project
/// matches, following `source`.
pub fn collect_range_overrides(
    records: &[FileRecord],
    config: &PlanConfig,
    source: RangeSource,
    gap_days: u32,
) -> RangeOverrides {
    if source == RangeSource::Declared {
        return RangeOverrides::new();
    }

    let mut dates: BTreeMap<&str, BTreeSet<NaiveDate>> = BTreeMap::new();
    for record in records {
        if let Some(project) = match_project(&record.chain_display(), &config.projects) {
            dates
                .entry(project.canonical_name.as_str())
                .or_default()
                .insert(record.modified);
        }
    }

    config
        .projects
        .iter()
        .filter(|p| source == RangeSource::Derived || p.time_ranges.is_empty())
        .filter_map(|p| {
            let observed = dates.get(p.canonical_name.as_str())?;
            Some((
                p.canonical_name.clone(),
                derive_time_ranges(observed.iter().copied(), gap_days),
            ))
        })
        .collect()
}

pub fn build_plan(
    records: &[FileRecord],
    config: &PlanConfig,
    target_root: &Path,
    overrides: &RangeOverrides,
    options: &PlanOptions,
) -> PlanOutput {
    let mut out = PlanOutput::default();
    let mut seen_targets: BTreeSet<String> = BTreeSet::new();

    for record in records {
        let chain = record.chain_display();
        let candidate = match_project(&chain, &config.projects);
        let canonical = candidate
            .map(|p| p.canonical_name.as_str())
            .unwrap_or(FALLBACK_PROJECT_NAME);
        if candidate.is_none() {
            out.warnings.push(format!(
                "Could not match project for {}",
                record.full_path.display()
            ));
        }

        let mut assigned_range: Option<&str> = None;
        if let Some(project) = candidate {
            let ranges = overrides
                .get(&project.canonical_name)
                .map(Vec::as_slice)
                .unwrap_or(project.time_ranges.as_slice());
            match lookup_time_range(record.modified, ranges) {
                Ok(range) => assigned_range = Some(range.label.as_str()),
                Err(miss) => {
                    *out.range_misses.entry(miss.kind()).or_insert(0) += 1;
                    if reports(options.range_warnings, miss.kind()) {
                        out.warnings.push(format!(
                            "{} falls outside defined time ranges for {canonical}: {miss}",
                            record.full_path.display()
                        ));
                    }
                }
            }
        }
        let time_range = assigned_range.unwrap_or(FALLBACK_TIME_RANGE_LABEL);
        let category = config.categories.categorize(&record.file_ext);

        let target_dir =
            target_root.join(render_target_dir(&config.target_pattern, time_range, canonical, category));
        let new_path = target_dir
            .join(derive_target_filename(&record.folder_chain, &record.file_name()))
            .display()
            .to_string();

        let mut notes: Vec<&str> = Vec::new();
        if candidate.is_none() {
            notes.push(NOTE_PROJECT_FALLBACK);
        }
        if assigned_range.is_none() {
            notes.push(NOTE_TIME_RANGE_FALLBACK);
        }
        if !seen_targets.insert(new_path.clone()) {
            notes.push(NOTE_TARGET_COLLISION);
        }

        out.entries.push(PlanEntry {
            old_path: record.full_path.display().to_string(),
            new_path,
            project: canonical.to_string(),
            time_range: time_range.to_string(),
            category: category.to_string(),
            modified_time: record.modified.format(DATE_FORMAT).to_string(),
            notes: if notes.is_empty() {
                NOTE_OK.to_string()
            } else {
                notes.join("; ")
            },
        });
    }

    out
}

/// Validate a raw configuration, then plan. Configuration errors are fatal.
pub fn build_plan_from_raw(
    records: &[FileRecord],
    raw: &RawPlanConfig,
    target_root: &Path,
    source: RangeSource,
    gap_days: u32,
    options: &PlanOptions,
) -> Result<PlanOutput> {
    let config = raw.validate()?;
    let overrides = collect_range_overrides(records, &config, source, gap_days);
    Ok(build_plan(records, &config, target_root, &overrides, options))
}

pub fn plan_to_csv(entries: &[PlanEntry]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for entry in entries {
        writer.serialize(entry)?;
    }
    if entries.is_empty() {
        writer.write_record([
            "old_path",
            "new_path",
            "project",
            "time_range",
            "category",
            "modified_time",
            "notes",
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush plan table: {err}"))
}

/// Write the plan table atomically and return its SHA-256.
pub fn write_plan(path: &Path, entries: &[PlanEntry]) -> Result<String> {
    let bytes = plan_to_csv(entries)?;
    write_atomic(path, &bytes)?;
    Ok(sha256_hex(&bytes))
}

pub fn read_plan(path: &Path) -> Result<Vec<PlanEntry>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open plan {}", path.display()))?;
    let mut entries = Vec::new();
    for (idx, row) in reader.deserialize::<PlanEntry>().enumerate() {
        let entry = row.with_context(|| format!("bad plan row {} in {}", idx + 2, path.display()))?;
        entries.push(entry);
    }
    Ok(entries)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanDistribution {
    pub entry_count: usize,
    pub unique_projects: usize,
    pub unique_categories: usize,
    pub time_ranges: BTreeMap<String, usize>,
    pub category_distribution: BTreeMap<String, usize>,
    pub project_distribution: BTreeMap<String, usize>,
    pub collisions: usize,
}

pub fn summarize(entries: &[PlanEntry]) -> PlanDistribution {
    let mut out = PlanDistribution {
        entry_count: entries.len(),
        ..PlanDistribution::default()
    };
    for entry in entries {
        *out.project_distribution.entry(entry.project.clone()).or_insert(0) += 1;
        *out.category_distribution.entry(entry.category.clone()).or_insert(0) += 1;
        *out.time_ranges.entry(entry.time_range.clone()).or_insert(0) += 1;
        if entry.has_note(NOTE_TARGET_COLLISION) {
            out.collisions += 1;
        }
    }
    out.unique_projects = out.project_distribution.len();
    out.unique_categories = out.category_distribution.len();
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    #[serde(flatten)]
    pub distribution: PlanDistribution,
    pub range_misses: BTreeMap<String, usize>,
    pub range_source: String,
    pub target_root: String,
    pub generated_at: String,
    pub metadata_count: usize,
    pub plan_sha256: String,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tidy::project::{CategoryMap, ProjectDefinition};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn range(label: &str, start: NaiveDate, end: NaiveDate) -> TimeRange {
        TimeRange {
            label: label.to_string(),
            start,
            end,
        }
    }

    fn config() -> PlanConfig {
        PlanConfig {
            projects: vec![
                ProjectDefinition::new(
                    "龙湖",
                    ["龙湖图片"],
                    vec![
                        range("2010-2012", date(2010, 1, 1), date(2012, 12, 31)),
                        range("2015", date(2015, 1, 1), date(2015, 12, 31)),
                    ],
                ),
                ProjectDefinition::new("万科", ["vanke"], vec![]),
            ],
            categories: CategoryMap::new([
                ("cad", vec![".dwg"]),
                ("photos", vec![".jpg"]),
            ]),
            target_pattern: "<time-range>-<project-name>/<category>".to_string(),
        }
    }

    fn records() -> Vec<FileRecord> {
        vec![
            FileRecord::new("/src/CAD/龙湖/a.dwg", &["CAD", "龙湖"], ".dwg", date(2011, 4, 1)),
            FileRecord::new("/src/misc/b.zip", &["misc"], ".zip", date(2011, 4, 1)),
            FileRecord::new("/src/龙湖/c.jpg", &["龙湖"], ".jpg", date(2009, 1, 1)),
            FileRecord::new("/src/龙湖/d.jpg", &["龙湖"], ".jpg", date(2013, 6, 1)),
            FileRecord::new("/src/vanke/e.jpg", &["vanke"], ".jpg", date(2018, 2, 2)),
        ]
    }

    #[test]
    fn entries_resolve_project_range_category_and_destination() {
        let out = build_plan(
            &records(),
            &config(),
            Path::new("/dst"),
            &RangeOverrides::new(),
            &PlanOptions::default(),
        );
        assert_eq!(out.entries.len(), 5);

        let first = &out.entries[0];
        assert_eq!(first.project, "龙湖");
        assert_eq!(first.time_range, "2010-2012");
        assert_eq!(first.category, "cad");
        assert_eq!(first.notes, NOTE_OK);
        assert_eq!(
            PathBuf::from(&first.new_path),
            PathBuf::from("/dst/2010-2012-龙湖/cad/CAD-龙湖-a.dwg")
        );

        let unmatched = &out.entries[1];
        assert_eq!(unmatched.project, FALLBACK_PROJECT_NAME);
        assert_eq!(unmatched.time_range, FALLBACK_TIME_RANGE_LABEL);
        assert_eq!(unmatched.category, "other");
        assert_eq!(unmatched.notes, "project fallback; time range fallback");

        assert_eq!(out.warnings, vec!["Could not match project for /src/misc/b.zip".to_string()]);
    }

    #[test]
    fn range_misses_are_counted_by_reason_and_silent_by_default() {
        let out = build_plan(
            &records(),
            &config(),
            Path::new("/dst"),
            &RangeOverrides::new(),
            &PlanOptions::default(),
        );
        assert_eq!(out.entries[2].time_range, FALLBACK_TIME_RANGE_LABEL);
        assert_eq!(out.entries[2].category, "photos");
        assert_eq!(out.entries[2].notes, NOTE_TIME_RANGE_FALLBACK);
        assert_eq!(out.range_misses.get(&RangeMissKind::BeforeEarliest), Some(&1));
        assert_eq!(out.range_misses.get(&RangeMissKind::Gap), Some(&1));
        assert_eq!(out.range_misses.get(&RangeMissKind::NoRanges), Some(&1));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn range_warning_verbosity_is_configurable() {
        let gaps = build_plan(
            &records(),
            &config(),
            Path::new("/dst"),
            &RangeOverrides::new(),
            &PlanOptions {
                range_warnings: RangeWarnings::Gaps,
            },
        );
        assert_eq!(gaps.warnings.len(), 2);
        assert!(gaps.warnings[1].contains("not in any defined ranges"));

        let all = build_plan(
            &records(),
            &config(),
            Path::new("/dst"),
            &RangeOverrides::new(),
            &PlanOptions {
                range_warnings: RangeWarnings::All,
            },
        );
        assert_eq!(all.warnings.len(), 4);
    }

    #[test]
    fn duplicate_destinations_are_annotated_not_renamed() {
        let recs = vec![
            FileRecord::new("/src/a/龙湖/photo.jpg", &["龙湖"], ".jpg", date(2011, 1, 1)),
            FileRecord::new("/src/b/龙湖/photo.jpg", &["新建文件夹", "龙湖"], ".jpg", date(2011, 2, 1)),
        ];
        let out = build_plan(
            &recs,
            &config(),
            Path::new("/dst"),
            &RangeOverrides::new(),
            &PlanOptions::default(),
        );
        assert_eq!(out.entries[0].new_path, out.entries[1].new_path);
        assert_eq!(out.entries[0].notes, NOTE_OK);
        assert_eq!(out.entries[1].notes, NOTE_TARGET_COLLISION);
        assert_eq!(summarize(&out.entries).collisions, 1);
    }

    #[test]
    fn overrides_replace_declared_ranges() {
        let cfg = config();
        let overrides = collect_range_overrides(&records(), &cfg, RangeSource::Auto, 180);
        assert!(!overrides.contains_key("龙湖"));
        assert_eq!(overrides["万科"][0].label, "2018");

        let out = build_plan(&records(), &cfg, Path::new("/dst"), &overrides, &PlanOptions::default());
        assert_eq!(out.entries[4].time_range, "2018");
        assert_eq!(out.entries[4].notes, NOTE_OK);

        let derived = collect_range_overrides(&records(), &cfg, RangeSource::Derived, 180);
        let labels: Vec<&str> = derived["龙湖"].iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["2009", "2011", "2013"]);

        assert!(collect_range_overrides(&records(), &cfg, RangeSource::Declared, 180).is_empty());
    }

    #[test]
    fn planning_is_deterministic_byte_for_byte() {
        let cfg = config();
        let overrides = collect_range_overrides(&records(), &cfg, RangeSource::Auto, 180);
        let a = build_plan(&records(), &cfg, Path::new("/dst"), &overrides, &PlanOptions::default());
        let b = build_plan(&records(), &cfg, Path::new("/dst"), &overrides, &PlanOptions::default());
        assert_eq!(
            plan_to_csv(&a.entries).expect("csv a"),
            plan_to_csv(&b.entries).expect("csv b")
        );
    }

    #[test]
    fn raw_config_missing_sections_fails_before_planning() {
        let raw = RawPlanConfig {
            projects: Some(vec![]),
            categories: None,
            target_pattern: None,
        };
        let err = build_plan_from_raw(
            &records(),
            &raw,
            Path::new("/dst"),
            RangeSource::Auto,
            180,
            &PlanOptions::default(),
        )
        .expect_err("config error");
        assert!(err.to_string().contains("categories, target_pattern"));
    }

    #[test]
    fn plan_table_round_trips_through_disk_with_fixed_header() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("move_plan.csv");
        let out = build_plan(
            &records(),
            &config(),
            Path::new("/dst"),
            &RangeOverrides::new(),
            &PlanOptions::default(),
        );
        let digest = write_plan(&path, &out.entries).expect("write plan");
        assert_eq!(digest.len(), 64);

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.starts_with("old_path,new_path,project,time_range,category,modified_time,notes\n"));
        assert_eq!(read_plan(&path).expect("read plan"), out.entries);
    }

    #[test]
    fn target_filename_keeps_provenance() {
        let chain = vec!["CAD".to_string(), "龙湖".to_string()];
        assert_eq!(derive_target_filename(&chain, "x.dwg"), "CAD-龙湖-x.dwg");
        assert_eq!(derive_target_filename(&[], "x.dwg"), "x.dwg");
    }
}
