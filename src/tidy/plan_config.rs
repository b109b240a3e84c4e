use crate::error::TidyError;
use crate::tidy::project::{CategoryMap, ProjectDefinition, TimeRange};
use crate::tidy::record::parse_date;
use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;

pub const PLACEHOLDER_TIME_RANGE: &str = "<time-range>";
pub const PLACEHOLDER_PROJECT: &str = "<project-name>";
pub const PLACEHOLDER_CATEGORY: &str = "<category>";
pub const DEFAULT_TARGET_PATTERN: &str = "<time-range>/<project-name>/<category>";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTimeRange {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProject {
    #[serde(default)]
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub time_ranges: Vec<RawTimeRange>,
}

/// `categories` object of a plan config. Keys stay in the order the file
/// declares them; a repeated key keeps its first position and its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTable(pub Vec<(String, Vec<String>)>);

impl CategoryTable {
    fn insert(&mut self, name: String, extensions: Vec<String>) {
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = extensions,
            None => self.0.push((name, extensions)),
        }
    }
}

impl Serialize for CategoryTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, extensions) in &self.0 {
            map.serialize_entry(name, extensions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = CategoryTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping category names to extension lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut table = CategoryTable::default();
                while let Some((name, extensions)) = access.next_entry::<String, Vec<String>>()? {
                    table.insert(name, extensions);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Plan configuration exactly as stored on disk or returned by the classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPlanConfig {
    #[serde(default)]
    pub projects: Option<Vec<RawProject>>,
    #[serde(default)]
    pub categories: Option<CategoryTable>,
    #[serde(default)]
    pub target_pattern: Option<String>,
}

/// Validated configuration handed to the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanConfig {
    pub projects: Vec<ProjectDefinition>,
    pub categories: CategoryMap,
    pub target_pattern: String,
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    TidyError::InvalidConfig(message.into()).into()
}

fn build_time_range(project: &str, raw: &RawTimeRange) -> Result<TimeRange> {
    let (Some(label), Some(from), Some(to)) = (
        raw.label.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        raw.from.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        raw.to.as_deref().map(str::trim).filter(|s| !s.is_empty()),
    ) else {
        return Err(invalid(format!(
            "time range of project `{project}` must include 'label', 'from' and 'to'"
        )));
    };
    let start = parse_date(from)?;
    let end = parse_date(to)?;
    if end < start {
        return Err(invalid(format!(
            "time range `{label}` of project `{project}` ends before it starts"
        )));
    }
    Ok(TimeRange {
        label: label.to_string(),
        start,
        end,
    })
}

impl RawPlanConfig {
    pub fn validate(&self) -> Result<PlanConfig> {
        let missing: Vec<&str> = [
            ("projects", self.projects.is_none()),
            ("categories", self.categories.is_none()),
            ("target_pattern", self.target_pattern.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        if !missing.is_empty() {
            return Err(invalid(format!(
                "missing required keys: {}",
                missing.join(", ")
            )));
        }

        let mut projects = Vec::new();
        for raw in self.projects.as_deref().unwrap_or_default() {
            let canonical = raw.canonical_name.trim();
            if canonical.is_empty() {
                return Err(invalid("each project entry must have a canonical_name"));
            }
            let ranges = raw
                .time_ranges
                .iter()
                .map(|tr| build_time_range(canonical, tr))
                .collect::<Result<Vec<_>>>()?;
            projects.push(ProjectDefinition::new(canonical, &raw.aliases, ranges));
        }

        let target_pattern = self
            .target_pattern
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        if target_pattern.is_empty() {
            return Err(invalid("target_pattern cannot be empty"));
        }

        let categories = CategoryMap::new(
            self.categories
                .iter()
                .flat_map(|table| table.0.iter())
                .map(|(name, exts)| (name.clone(), exts.iter())),
        );

        Ok(PlanConfig {
            projects,
            categories,
            target_pattern: target_pattern.to_string(),
        })
    }

    /// Fill sections the classifier does not produce.
    pub fn with_defaults(mut self) -> Self {
        if self.categories.is_none() {
            self.categories = Some(default_categories());
        }
        if self.target_pattern.is_none() {
            self.target_pattern = Some(DEFAULT_TARGET_PATTERN.to_string());
        }
        self
    }
}

pub fn default_categories() -> CategoryTable {
    let table: [(&str, &[&str]); 3] = [
        (
            "cad",
            &[".dwg", ".dxf", ".dwf", ".dgn", ".rvt", ".skp", ".3ds", ".max"],
        ),
        (
            "documents",
            &[".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt", ".rtf"],
        ),
        (
            "photos",
            &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tif", ".tiff", ".heic", ".webp"],
        ),
    ];
    CategoryTable(
        table
            .into_iter()
            .map(|(name, exts)| {
                (
                    name.to_string(),
                    exts.iter().map(|e| (*e).to_string()).collect(),
                )
            })
            .collect(),
    )
}

/// The part of model output that parses as JSON: the whole reply, or the
/// span between the first `{` and the last `}` when it is wrapped in prose.
pub fn extract_json(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TidyError::MalformedClassifierResponse("empty response".to_string()).into());
    }
    let direct_err = match serde_json::from_str::<Value>(trimmed) {
        Ok(_) => return Ok(trimmed),
        Err(err) => err,
    };

    let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return Err(TidyError::MalformedClassifierResponse(direct_err.to_string()).into());
    };
    if end < start {
        return Err(TidyError::MalformedClassifierResponse(direct_err.to_string()).into());
    }
    let span = &trimmed[start..=end];
    serde_json::from_str::<Value>(span)
        .map_err(|err| TidyError::MalformedClassifierResponse(err.to_string()))?;
    Ok(span)
}

/// Turn a classifier reply into a plan configuration with at least one project.
/// Category order follows the reply text.
pub fn parse_classifier_response(text: &str) -> Result<RawPlanConfig> {
    let raw: RawPlanConfig = serde_json::from_str(extract_json(text)?)
        .map_err(|err| TidyError::MalformedClassifierResponse(err.to_string()))?;
    match raw.projects.as_deref() {
        Some(projects) if !projects.is_empty() => Ok(raw),
        _ => Err(TidyError::MalformedClassifierResponse(
            "response contains no projects".to_string(),
        )
        .into()),
    }
}

/// Read a plan configuration file. JSON first, JSON5 for hand-edited files.
pub fn load_raw_plan_config(path: &Path) -> Result<RawPlanConfig> {
    if !path.exists() {
        return Err(TidyError::MissingInput(path.to_path_buf()).into());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    match serde_json::from_str::<RawPlanConfig>(&raw) {
        Ok(cfg) => Ok(cfg),
        Err(json_err) => json5::from_str::<RawPlanConfig>(&raw).map_err(|json5_err| {
            invalid(format!(
                "failed to parse {}: {json_err}; as json5: {json5_err}",
                path.display()
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_error(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<TidyError>(), Some(TidyError::InvalidConfig(_)))
    }

    #[test]
    fn missing_sections_are_a_config_error() {
        let raw: RawPlanConfig =
            serde_json::from_str(r#"{"projects": [], "categories": {}}"#).expect("parse");
        let err = raw.validate().expect_err("missing pattern");
        assert!(config_error(&err));
        assert!(err.to_string().contains("target_pattern"));
    }

    #[test]
    fn project_without_name_is_rejected() {
        let raw: RawPlanConfig = serde_json::from_str(
            r#"{"projects": [{"aliases": ["x"]}], "categories": {}, "target_pattern": "<category>"}"#,
        )
        .expect("parse");
        assert!(config_error(&raw.validate().expect_err("no name")));
    }

    #[test]
    fn time_range_requires_all_fields() {
        let raw: RawPlanConfig = serde_json::from_str(
            r#"{"projects": [{"canonical_name": "A", "time_ranges": [{"label": "x", "from": "2010-01-01"}]}],
                "categories": {}, "target_pattern": "<category>"}"#,
        )
        .expect("parse");
        assert!(config_error(&raw.validate().expect_err("no end")));
    }

    #[test]
    fn valid_config_builds_typed_projects() {
        let raw: RawPlanConfig = serde_json::from_str(
            r#"{
                "projects": [
                    {"canonical_name": "龙湖", "aliases": ["龙湖图片", " LH "],
                     "time_ranges": [{"label": "2010-2012", "from": "2010-01-01", "to": "2012-12-31"}]}
                ],
                "categories": {"cad": ["dwg"]},
                "target_pattern": "<time-range>-<project-name>/<category>"
            }"#,
        )
        .expect("parse");
        let cfg = raw.validate().expect("valid");
        assert_eq!(cfg.projects.len(), 1);
        assert!(cfg.projects[0].alias_tokens.contains("lh"));
        assert!(cfg.projects[0].alias_tokens.contains("龙湖"));
        assert_eq!(cfg.projects[0].time_ranges[0].label, "2010-2012");
        assert_eq!(cfg.categories.categorize(".dwg"), "cad");
    }

    #[test]
    fn bad_date_in_range_is_a_date_error() {
        let raw: RawPlanConfig = serde_json::from_str(
            r#"{"projects": [{"canonical_name": "A", "time_ranges": [{"label": "x", "from": "2010", "to": "2012-01-01"}]}],
                "categories": {}, "target_pattern": "<category>"}"#,
        )
        .expect("parse");
        let err = raw.validate().expect_err("bad date");
        assert!(matches!(
            err.downcast_ref::<TidyError>(),
            Some(TidyError::InvalidDate { .. })
        ));
    }

    #[test]
    fn extract_json_recovers_object_wrapped_in_prose() {
        let text = "Sure! Here is the mapping:\n```json\n{\"projects\": [{\"canonical_name\": \"龙湖\", \"aliases\": []}]}\n```\nHope it helps.";
        let cfg = parse_classifier_response(text).expect("recovered");
        assert_eq!(cfg.projects.expect("projects")[0].canonical_name, "龙湖");
    }

    #[test]
    fn unrecoverable_or_empty_responses_are_malformed() {
        for text in ["", "no json here", "{ not: valid", "} backwards {", "{\"projects\": []}"] {
            let err = parse_classifier_response(text).expect_err(text);
            assert!(matches!(
                err.downcast_ref::<TidyError>(),
                Some(TidyError::MalformedClassifierResponse(_))
            ));
        }
    }

    #[test]
    fn with_defaults_fills_only_missing_sections() {
        let raw = RawPlanConfig {
            projects: Some(vec![]),
            categories: None,
            target_pattern: Some("<category>".to_string()),
        }
        .with_defaults();
        let names: Vec<String> = raw
            .categories
            .expect("categories")
            .0
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["cad", "documents", "photos"]);
        assert_eq!(raw.target_pattern.as_deref(), Some("<category>"));
    }

    #[test]
    fn categories_keep_declared_order_across_formats() {
        let body = r#"{"projects": [{"canonical_name": "A", "aliases": ["a"]}],
            "categories": {"photos": [".jpg"], "assets": [".jpg", ".psd"], "cad": [".dwg"]},
            "target_pattern": "<category>"}"#;
        let tmp = tempdir().expect("tempdir");
        let json5_path = tmp.path().join("plan_config.json5");
        fs::write(
            &json5_path,
            "{projects: [], categories: {photos: ['.jpg'], assets: ['.jpg'], /* late */ cad: ['.dwg']}, target_pattern: '<category>'}",
        )
        .expect("write");

        let parsed = [
            serde_json::from_str::<RawPlanConfig>(body).expect("json"),
            parse_classifier_response(&format!("Here you go:\n{body}\nDone.")).expect("reply"),
            load_raw_plan_config(&json5_path).expect("json5"),
        ];
        for raw in parsed {
            let names: Vec<&str> = raw
                .categories
                .as_ref()
                .expect("categories")
                .0
                .iter()
                .map(|(name, _)| name.as_str())
                .collect();
            assert_eq!(names, vec!["photos", "assets", "cad"]);
            assert_eq!(raw.validate().expect("valid").categories.categorize(".jpg"), "photos");
        }
    }

    #[test]
    fn category_table_writes_back_in_declared_order() {
        let table = CategoryTable(vec![
            ("photos".to_string(), vec![".jpg".to_string()]),
            ("assets".to_string(), vec![".psd".to_string()]),
        ]);
        let json = serde_json::to_string(&table).expect("serialize");
        assert_eq!(json, r#"{"photos":[".jpg"],"assets":[".psd"]}"#);
        let repeated: CategoryTable =
            serde_json::from_str(r#"{"a": [".x"], "b": [".y"], "a": [".z"]}"#).expect("parse");
        assert_eq!(
            repeated.0,
            vec![
                ("a".to_string(), vec![".z".to_string()]),
                ("b".to_string(), vec![".y".to_string()]),
            ]
        );
    }

    #[test]
    fn json5_config_with_comments_is_accepted() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("plan_config.json5");
        fs::write(
            &path,
            "{\n  // reviewed by hand\n  projects: [{canonical_name: 'A', aliases: ['a']}],\n  categories: {cad: ['.dwg']},\n  target_pattern: '<category>',\n}\n",
        )
        .expect("write");
        let cfg = load_raw_plan_config(&path)
            .expect("json5 config")
            .validate()
            .expect("valid");
        assert_eq!(cfg.projects[0].canonical_name, "A");
    }
}
