use crate::error::TidyError;
use crate::logging::RunLog;
use crate::tidy::paths::plan_copy_path;
use crate::tidy::planner::{PlanEntry, read_plan};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DUPLICATE_SUFFIX: &str = "_dup";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Apply,
    Revert,
}

impl ExecutionMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Revert => "revert",
        }
    }

    /// (source, destination) for a plan row. Revert reads the same row with
    /// the columns swapped.
    pub fn endpoints(self, entry: &PlanEntry) -> (PathBuf, PathBuf) {
        let old = PathBuf::from(&entry.old_path);
        let new = PathBuf::from(&entry.new_path);
        match self {
            Self::Apply => (old, new),
            Self::Revert => (new, old),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub moved: usize,
    pub skipped: usize,
    pub missing: usize,
    pub collisions: usize,
}

impl ExecutionStats {
    pub fn summary_line(&self, mode: ExecutionMode) -> String {
        format!(
            "Execution summary ({}): moved={} skipped={} missing={} collisions={}",
            mode.label(),
            self.moved,
            self.skipped,
            self.missing,
            self.collisions
        )
    }
}

fn with_duplicate_suffix(destination: &Path, counter: usize) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match destination.extension() {
        Some(ext) => format!("{stem}{DUPLICATE_SUFFIX}{counter}.{}", ext.to_string_lossy()),
        None => format!("{stem}{DUPLICATE_SUFFIX}{counter}"),
    };
    destination.with_file_name(name)
}

/// `destination` if free, else the first `<stem>_dup<N><.ext>` that is.
fn next_free_path<F>(destination: &Path, taken: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    if !taken(destination) {
        return destination.to_path_buf();
    }
    let mut counter = 1usize;
    loop {
        let candidate = with_duplicate_suffix(destination, counter);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(_) => Ok(()),
        Err(rename_err) => {
            if matches!(
                rename_err.kind(),
                ErrorKind::CrossesDevices | ErrorKind::PermissionDenied
            ) {
                fs::copy(from, to).with_context(|| {
                    format!("failed to copy {} to {}", from.display(), to.display())
                })?;
                fs::remove_file(from)
                    .with_context(|| format!("failed to remove {}", from.display()))?;
                Ok(())
            } else {
                Err(rename_err).with_context(|| {
                    format!("failed to move {} to {}", from.display(), to.display())
                })
            }
        }
    }
}

/// Move every row of `entries` in order. Missing sources are skipped and
/// counted; occupied destinations get a `_dupN` name. In dry-run nothing is
/// moved, but parent directories are still created.
pub fn execute_plan(
    entries: &[PlanEntry],
    mode: ExecutionMode,
    dry_run: bool,
    log: &mut RunLog,
) -> Result<ExecutionStats> {
    let mut stats = ExecutionStats::default();
    // Targets handed out in this run; lets dry-run predict suffixes the same
    // way a real run assigns them.
    let mut claimed: BTreeSet<PathBuf> = BTreeSet::new();

    for entry in entries {
        let (source, destination) = mode.endpoints(entry);
        if !source.exists() {
            log.warn(format!("Source deleted or missing: {}", source.display()));
            stats.missing += 1;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let final_target = next_free_path(&destination, |p| p.exists() || claimed.contains(p));
        if final_target != destination {
            stats.collisions += 1;
            log.warn(format!("Target exists, using {}", final_target.display()));
        }
        claimed.insert(final_target.clone());

        if dry_run {
            log.info(format!(
                "Dry run: {} -> {}",
                source.display(),
                final_target.display()
            ));
            stats.skipped += 1;
            continue;
        }

        if let Err(err) = move_file(&source, &final_target) {
            log.error(format!("{err:#}"));
            return Err(err);
        }
        log.info(format!(
            "Moved {} -> {}",
            source.display(),
            final_target.display()
        ));
        stats.moved += 1;
    }

    log.info(stats.summary_line(mode));
    Ok(stats)
}

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub mode: ExecutionMode,
    pub dry_run: bool,
    pub plan_file: PathBuf,
    pub target_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub stats: ExecutionStats,
    pub plan_source: PathBuf,
    pub plan_copy: Option<PathBuf>,
}

/// Resolve which plan table a run reads. Revert only trusts the copy that
/// apply left in the target root.
pub fn resolve_plan_source(request: &ExecutionRequest) -> Result<PathBuf> {
    match request.mode {
        ExecutionMode::Apply => {
            if !request.plan_file.exists() {
                return Err(TidyError::MissingInput(request.plan_file.clone()).into());
            }
            Ok(request.plan_file.clone())
        }
        ExecutionMode::Revert => {
            let copy = plan_copy_path(&request.target_root);
            if !copy.is_file() {
                return Err(TidyError::RevertPlanMissing(copy).into());
            }
            Ok(copy)
        }
    }
}

fn install_plan_copy(plan_file: &Path, target_root: &Path) -> Result<PathBuf> {
    let copy = plan_copy_path(target_root);
    fs::create_dir_all(target_root)
        .with_context(|| format!("failed to create {}", target_root.display()))?;
    let same = match (plan_file.canonicalize(), copy.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if !same {
        fs::copy(plan_file, &copy).with_context(|| {
            format!("failed to copy plan {} to {}", plan_file.display(), copy.display())
        })?;
    }
    Ok(copy)
}

pub fn run_execution(request: &ExecutionRequest, log: &mut RunLog) -> Result<ExecutionOutcome> {
    let plan_source = resolve_plan_source(request)?;
    let entries = read_plan(&plan_source)?;
    log.info(format!(
        "Loaded {} plan rows from {} (mode={}, dry_run={})",
        entries.len(),
        plan_source.display(),
        request.mode.label(),
        request.dry_run
    ));

    let plan_copy = if request.mode == ExecutionMode::Apply && !request.dry_run {
        let copy = install_plan_copy(&plan_source, &request.target_root)?;
        log.info(format!("Plan copy written to {}", copy.display()));
        Some(copy)
    } else {
        None
    };

    let stats = execute_plan(&entries, request.mode, request.dry_run, log)?;
    Ok(ExecutionOutcome {
        stats,
        plan_source,
        plan_copy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tidy::planner::{NOTE_OK, write_plan};
    use tempfile::tempdir;

    fn entry(old: &Path, new: &Path) -> PlanEntry {
        PlanEntry {
            old_path: old.display().to_string(),
            new_path: new.display().to_string(),
            project: "龙湖".to_string(),
            time_range: "2010-2012".to_string(),
            category: "photos".to_string(),
            modified_time: "2011-01-01".to_string(),
            notes: NOTE_OK.to_string(),
        }
    }

    #[test]
    fn duplicate_suffix_keeps_extension() {
        assert_eq!(
            with_duplicate_suffix(Path::new("/t/photo.jpg"), 1),
            PathBuf::from("/t/photo_dup1.jpg")
        );
        assert_eq!(
            with_duplicate_suffix(Path::new("/t/Makefile"), 3),
            PathBuf::from("/t/Makefile_dup3")
        );
    }

    #[test]
    fn free_path_picks_first_unused_integer() {
        let tmp = tempdir().expect("tempdir");
        let dest = tmp.path().join("photo.jpg");
        assert_eq!(next_free_path(&dest, Path::exists), dest);
        fs::write(&dest, "a").expect("write");
        fs::write(tmp.path().join("photo_dup1.jpg"), "b").expect("write");
        assert_eq!(
            next_free_path(&dest, Path::exists),
            tmp.path().join("photo_dup2.jpg")
        );
    }

    #[test]
    fn same_destination_gets_increasing_suffixes_in_row_order() {
        let tmp = tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).expect("mkdir");
        let dest = tmp.path().join("dst/2010-2012-龙湖/photos/photo.jpg");
        let mut entries = Vec::new();
        for name in ["a", "b", "c"] {
            let old = src.join(format!("{name}.jpg"));
            fs::write(&old, name).expect("write");
            entries.push(entry(&old, &dest));
        }

        let mut log = RunLog::discard();
        let stats = execute_plan(&entries, ExecutionMode::Apply, false, &mut log).expect("apply");
        assert_eq!(stats.moved, 3);
        assert_eq!(stats.collisions, 2);

        let dir = dest.parent().expect("parent");
        assert_eq!(fs::read_to_string(dir.join("photo.jpg")).expect("first"), "a");
        assert_eq!(fs::read_to_string(dir.join("photo_dup1.jpg")).expect("second"), "b");
        assert_eq!(fs::read_to_string(dir.join("photo_dup2.jpg")).expect("third"), "c");
        assert!(log.lines().last().expect("summary").ends_with(
            "Execution summary (apply): moved=3 skipped=0 missing=0 collisions=2"
        ));
    }

    #[test]
    fn missing_sources_are_counted_not_fatal() {
        let tmp = tempdir().expect("tempdir");
        let present = tmp.path().join("present.txt");
        fs::write(&present, "x").expect("write");
        let entries = vec![
            entry(&tmp.path().join("gone.txt"), &tmp.path().join("out/gone.txt")),
            entry(&present, &tmp.path().join("out/present.txt")),
        ];
        let mut log = RunLog::discard();
        let stats = execute_plan(&entries, ExecutionMode::Apply, false, &mut log).expect("apply");
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.moved, 1);
        assert!(tmp.path().join("out/present.txt").exists());
    }

    #[test]
    fn dry_run_moves_nothing_but_predicts_collisions() {
        let tmp = tempdir().expect("tempdir");
        let a = tmp.path().join("a.jpg");
        let b = tmp.path().join("b.jpg");
        fs::write(&a, "a").expect("write");
        fs::write(&b, "b").expect("write");
        let dest = tmp.path().join("dst/photo.jpg");
        let entries = vec![entry(&a, &dest), entry(&b, &dest)];

        let mut log = RunLog::discard();
        let stats = execute_plan(&entries, ExecutionMode::Apply, true, &mut log).expect("dry run");
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.moved, 0);
        assert_eq!(stats.collisions, 1);
        assert!(a.exists() && b.exists());
        assert!(!dest.exists());
        assert!(dest.parent().expect("parent").is_dir());
        assert!(log.lines().iter().any(|l| l.contains("photo_dup1.jpg")));
    }

    #[test]
    fn revert_without_plan_copy_aborts_before_moving() {
        let tmp = tempdir().expect("tempdir");
        let request = ExecutionRequest {
            mode: ExecutionMode::Revert,
            dry_run: false,
            plan_file: tmp.path().join("move_plan.csv"),
            target_root: tmp.path().join("organized"),
        };
        let mut log = RunLog::discard();
        let err = run_execution(&request, &mut log).expect_err("no plan copy");
        assert!(matches!(
            err.downcast_ref::<TidyError>(),
            Some(TidyError::RevertPlanMissing(_))
        ));
        assert!(log.lines().is_empty());
    }

    #[test]
    fn apply_then_revert_restores_original_locations() {
        let tmp = tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let target_root = tmp.path().join("organized");
        fs::create_dir_all(src.join("CAD")).expect("mkdir");
        let one = src.join("CAD/plan.dwg");
        let two = src.join("notes.txt");
        fs::write(&one, "drawing").expect("write");
        fs::write(&two, "notes").expect("write");

        let entries = vec![
            entry(&one, &target_root.join("2010/龙湖/cad/CAD-plan.dwg")),
            entry(&two, &target_root.join("unknown/Unsorted/documents/notes.txt")),
        ];
        let plan_file = tmp.path().join("output/move_plan.csv");
        write_plan(&plan_file, &entries).expect("write plan");

        let mut log = RunLog::discard();
        let applied = run_execution(
            &ExecutionRequest {
                mode: ExecutionMode::Apply,
                dry_run: false,
                plan_file: plan_file.clone(),
                target_root: target_root.clone(),
            },
            &mut log,
        )
        .expect("apply");
        assert_eq!(applied.stats.moved, 2);
        assert_eq!(applied.plan_copy, Some(plan_copy_path(&target_root)));
        assert!(!one.exists() && !two.exists());

        let reverted = run_execution(
            &ExecutionRequest {
                mode: ExecutionMode::Revert,
                dry_run: false,
                plan_file: PathBuf::from("/unused"),
                target_root: target_root.clone(),
            },
            &mut log,
        )
        .expect("revert");
        assert_eq!(reverted.stats.moved, 2);
        assert_eq!(reverted.stats.collisions, 0);
        assert_eq!(fs::read_to_string(&one).expect("one"), "drawing");
        assert_eq!(fs::read_to_string(&two).expect("two"), "notes");
    }
}
