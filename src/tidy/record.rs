use crate::error::TidyError;
use crate::tidy::util::{read_json, write_json_pretty};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Separator used when a folder chain is rendered as a single string.
pub const CHAIN_SEPARATOR: &str = " / ";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

static PLACEHOLDER_FOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_folder_regex() -> &'static Regex {
    PLACEHOLDER_FOLDER.get_or_init(|| {
        Regex::new(r"(?i)^(新建文件夹|new folder)(\s*(\(\d+\)|\d+))?$")
            .expect("placeholder folder pattern is valid")
    })
}

/// Auto-generated directory names such as `新建文件夹 (2)` or `New Folder`.
pub fn is_placeholder_folder(segment: &str) -> bool {
    placeholder_folder_regex().is_match(segment.trim())
}

/// Trim segments and drop empty and placeholder ones.
pub fn sanitize_chain<I, S>(segments: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty() && !is_placeholder_folder(s))
        .collect()
}

pub fn split_chain(raw: &str) -> Vec<String> {
    raw.split(CHAIN_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

pub fn join_chain(segments: &[String]) -> String {
    segments.join(CHAIN_SEPARATOR)
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        TidyError::InvalidDate {
            value: value.to_string(),
        }
        .into()
    })
}

pub fn normalize_extension(ext: &str) -> String {
    let normalized = ext.trim().to_lowercase();
    if normalized.is_empty() || normalized.starts_with('.') {
        normalized
    } else {
        format!(".{normalized}")
    }
}

/// One row of the persisted metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub full_path: String,
    pub folder_chain: String,
    pub file_ext: String,
    pub modified_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub full_path: PathBuf,
    /// Root-relative, sanitized. Empty for files directly under the root.
    pub folder_chain: Vec<String>,
    pub file_ext: String,
    pub modified: NaiveDate,
}

impl FileRecord {
    pub fn new<I, S>(
        full_path: impl Into<PathBuf>,
        raw_chain: I,
        file_ext: &str,
        modified: NaiveDate,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            full_path: full_path.into(),
            folder_chain: sanitize_chain(raw_chain),
            file_ext: normalize_extension(file_ext),
            modified,
        }
    }

    pub fn from_row(row: &MetadataRow) -> Result<Self> {
        let modified = parse_date(&row.modified_time)
            .with_context(|| format!("corrupted metadata row for {}", row.full_path))?;
        Ok(Self {
            full_path: PathBuf::from(&row.full_path),
            folder_chain: sanitize_chain(split_chain(&row.folder_chain)),
            file_ext: normalize_extension(&row.file_ext),
            modified,
        })
    }

    pub fn to_row(&self) -> MetadataRow {
        MetadataRow {
            full_path: self.full_path.display().to_string(),
            folder_chain: self.chain_display(),
            file_ext: self.file_ext.clone(),
            modified_time: self.modified.format(DATE_FORMAT).to_string(),
        }
    }

    pub fn chain_display(&self) -> String {
        join_chain(&self.folder_chain)
    }

    pub fn file_name(&self) -> String {
        self.full_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Orders records by the full path string, not path components, so
/// `/s/a-b/x` sorts before `/s/a/x`.
pub fn sort_records(records: &mut [FileRecord]) {
    records.sort_by(|a, b| a.full_path.as_os_str().cmp(b.full_path.as_os_str()));
}

pub fn load_metadata(path: &Path) -> Result<Vec<FileRecord>> {
    if !path.exists() {
        return Err(TidyError::MissingInput(path.to_path_buf()).into());
    }
    let rows: Vec<MetadataRow> = read_json(path)?;
    let mut records = rows
        .iter()
        .map(FileRecord::from_row)
        .collect::<Result<Vec<_>>>()?;
    sort_records(&mut records);
    Ok(records)
}

pub fn write_metadata(path: &Path, records: &[FileRecord]) -> Result<()> {
    let rows: Vec<MetadataRow> = records.iter().map(FileRecord::to_row).collect();
    write_json_pretty(path, &rows)
}
