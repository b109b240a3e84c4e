use crate::logging::RunLog;
use crate::tidy::record::{FileRecord, sort_records};
use crate::tidy::util::{read_json, write_json_pretty};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Canonical source folder that was walked.
    pub root: PathBuf,
    pub records: Vec<FileRecord>,
    pub unreadable: usize,
}

impl ScanOutcome {
    /// The source folder's own name, used as the root node of the summary.
    pub fn root_name(&self) -> Option<String> {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
    }
}

/// Written next to the metadata table so later stages know which folder
/// was scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanManifest {
    pub source_root: String,
    pub root_name: String,
    pub record_count: usize,
    pub scanned_at: String,
}

impl ScanManifest {
    pub fn from_outcome(outcome: &ScanOutcome) -> Option<Self> {
        Some(Self {
            source_root: outcome.root.display().to_string(),
            root_name: outcome.root_name()?,
            record_count: outcome.records.len(),
            scanned_at: Local::now().to_rfc3339(),
        })
    }
}

pub fn write_manifest(path: &Path, manifest: &ScanManifest) -> Result<()> {
    write_json_pretty(path, manifest)
}

/// `Ok(None)` when no scan has recorded a manifest yet.
pub fn load_manifest(path: &Path) -> Result<Option<ScanManifest>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Walk `source` and build one record per regular file, sorted by absolute path.
pub fn collect(source: &Path, log: &mut RunLog) -> Result<ScanOutcome> {
    let root = source
        .canonicalize()
        .with_context(|| format!("failed to resolve source folder {}", source.display()))?;
    let mut outcome = ScanOutcome {
        root: root.clone(),
        ..ScanOutcome::default()
    };

    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log.warn(format!("Skipping unreadable entry: {err}"));
                outcome.unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel = path.strip_prefix(&root).unwrap_or(path);
        let parents: Vec<String> = rel
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let mtime = entry
            .metadata()
            .map_err(std::io::Error::from)
            .and_then(|m| m.modified());
        let modified = match mtime {
            Ok(time) => DateTime::<Local>::from(time).date_naive(),
            Err(err) => {
                log.warn(format!("Cannot read mtime of {}: {err}", path.display()));
                outcome.unreadable += 1;
                continue;
            }
        };
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();

        outcome
            .records
            .push(FileRecord::new(path, &parents, &ext, modified));
    }

    sort_records(&mut outcome.records);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn collect_builds_sanitized_sorted_records() {
        let tmp = tempdir().expect("tempdir");
        let src = tmp.path().join("待整理");
        fs::create_dir_all(src.join("新建文件夹 (2)/CAD/龙湖")).expect("mkdir");
        fs::write(src.join("新建文件夹 (2)/CAD/龙湖/plan.DWG"), "x").expect("write");
        fs::write(src.join("readme.txt"), "x").expect("write");
        fs::write(src.join("Makefile"), "x").expect("write");

        let mut log = RunLog::discard();
        let outcome = collect(&src, &mut log).expect("collect");
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.unreadable, 0);

        let paths: Vec<_> = outcome.records.iter().map(|r| r.full_path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        assert_eq!(paths, sorted);
        assert_eq!(outcome.root_name().as_deref(), Some("待整理"));

        let dwg = outcome
            .records
            .iter()
            .find(|r| r.file_ext == ".dwg")
            .expect("dwg record");
        assert_eq!(dwg.chain_display(), "CAD / 龙湖");

        let make = outcome
            .records
            .iter()
            .find(|r| r.file_name() == "Makefile")
            .expect("makefile record");
        assert_eq!(make.file_ext, "");
        assert!(make.folder_chain.is_empty());
    }

    #[test]
    fn manifest_records_scanned_root_name() {
        let tmp = tempdir().expect("tempdir");
        let src = tmp.path().join("dump");
        fs::create_dir_all(src.join("misc")).expect("mkdir");
        fs::write(src.join("misc/notes.txt"), "x").expect("write");
        fs::write(src.join("top.txt"), "x").expect("write");

        let mut log = RunLog::discard();
        let outcome = collect(&src.join("misc/.."), &mut log).expect("collect");
        let manifest = ScanManifest::from_outcome(&outcome).expect("manifest");
        assert_eq!(manifest.root_name, "dump");
        assert_eq!(manifest.record_count, 2);

        let path = tmp.path().join("output/scan_manifest.json");
        assert_eq!(load_manifest(&path).expect("absent"), None);
        write_manifest(&path, &manifest).expect("write manifest");
        assert_eq!(load_manifest(&path).expect("load"), Some(manifest));
    }

    #[test]
    fn collect_fails_for_missing_source() {
        let mut log = RunLog::discard();
        assert!(collect(Path::new("/no/such/source/dir"), &mut log).is_err());
    }
}
