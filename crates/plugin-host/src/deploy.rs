//! Shadow-copy deployment engine.
//!
//! Package artifacts are copied into an isolated deployment directory so
//! the host never holds the originals open. Copies are idempotent: a
//! deployed file at least as new as its source is left alone. When a copy
//! fails because a still-running host holds the old deployment open, the
//! stale target is renamed aside to a uniquely-named sidecar file (freeing
//! the name) and the copy is retried exactly once.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// File kept in place when the deployment directory is cleared.
pub const DEPLOY_PLACEHOLDER: &str = "placeholder.txt";

/// Candidate artifacts of one package, split into the declared main
/// artifact and its auxiliary dependencies.
#[derive(Debug, Default)]
pub struct ArtifactSet {
    pub main: Option<PathBuf>,
    pub auxiliary: Vec<PathBuf>,
}

/// Shadow-copy one artifact into the deployment directory.
///
/// Returns the deployed file's location. Skips the copy when the deployed
/// file's creation timestamp is at least as new as the source's.
pub fn deploy_artifact(source: &Path, deploy_dir: &Path) -> Result<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| Error::Deployment {
        path: source.to_path_buf(),
        reason: "source has no file name".to_string(),
    })?;
    let target = deploy_dir.join(file_name);

    if target.exists() {
        if deployed_is_current(source, &target) {
            debug!(target = %target.display(), "deployed copy is up to date, skipping");
            return Ok(target);
        }
        // A held-open target fails here too; recovery below handles it.
        if let Err(e) = fs::remove_file(&target) {
            warn!(target = %target.display(), error = %e, "failed to delete stale deployed file");
        }
    }

    if let Err(copy_err) = fs::copy(source, &target) {
        warn!(
            target = %target.display(),
            error = %copy_err,
            "copy failed, renaming stale target aside and retrying"
        );
        stash_aside(&target).map_err(|rename_err| Error::Deployment {
            path: target.clone(),
            reason: format!(
                "copy failed ({copy_err}) and stale target could not be renamed aside: {rename_err}"
            ),
        })?;
        fs::copy(source, &target).map_err(|retry_err| Error::Deployment {
            path: target.clone(),
            reason: format!("copy failed after freeing target name: {retry_err}"),
        })?;
    }

    debug!(source = %source.display(), target = %target.display(), "deployed artifact");
    Ok(target)
}

/// Collect a package's candidate artifacts.
///
/// Candidates are dynamic-library files under `package_dir`, excluding
/// anything physically inside the deployment directory (already-deployed
/// output) and anything not directly under a first-level child of the
/// packages root (nested or incidental binaries). The candidate whose file
/// name matches `main_file_name` (case-insensitive) is the main artifact;
/// the rest are auxiliary.
pub fn collect_artifacts(
    package_dir: &Path,
    packages_root: &Path,
    deploy_dir: &Path,
    main_file_name: &str,
) -> Result<ArtifactSet> {
    let mut candidates = Vec::new();
    walk_libraries(package_dir, &mut candidates)?;
    candidates.sort();

    let package_canon = canon(package_dir);
    let root_canon = canon(packages_root);
    let deploy_canon = canon(deploy_dir);
    let package_is_first_level = package_canon.parent() == Some(root_canon.as_path());

    let mut set = ArtifactSet::default();
    for candidate in candidates {
        let candidate_canon = canon(&candidate);
        if candidate_canon.starts_with(&deploy_canon) {
            debug!(path = %candidate.display(), "skipping already-deployed output");
            continue;
        }
        if !package_is_first_level || candidate_canon.parent() != Some(package_canon.as_path()) {
            debug!(path = %candidate.display(), "skipping nested binary");
            continue;
        }

        let is_main = candidate
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| !main_file_name.is_empty() && n.eq_ignore_ascii_case(main_file_name));
        if is_main {
            set.main = Some(candidate);
        } else {
            set.auxiliary.push(candidate);
        }
    }

    Ok(set)
}

/// Remove everything in the deployment directory except the recognized
/// placeholder file. Best-effort: individual failures are logged and the
/// loop continues.
pub fn clear_deploy_dir(deploy_dir: &Path) {
    let entries = match fs::read_dir(deploy_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %deploy_dir.display(), error = %e, "failed to read deployment directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.file_name().and_then(|n| n.to_str()) == Some(DEPLOY_PLACEHOLDER) {
            continue;
        }
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to remove stale deployed artifact");
        }
    }
}

/// Name used for best-effort dependency dedup: lowercased file stem.
pub fn logical_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn walk_libraries(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            walk_libraries(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str())
            == Some(std::env::consts::DLL_EXTENSION)
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Creation timestamp, falling back to mtime on filesystems without birth
/// time support.
fn creation_time(path: &Path) -> std::io::Result<SystemTime> {
    let meta = fs::metadata(path)?;
    meta.created().or_else(|_| meta.modified())
}

fn deployed_is_current(source: &Path, target: &Path) -> bool {
    match (creation_time(target), creation_time(source)) {
        (Ok(target_time), Ok(source_time)) => target_time >= source_time,
        _ => false,
    }
}

/// Rename a target file aside to a uniquely-named sidecar, freeing its
/// name for a fresh copy.
fn stash_aside(target: &Path) -> std::io::Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let sidecar_name = format!(
        "{}.{}.{}.old",
        target
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        nanos
    );
    let sidecar = target.with_file_name(sidecar_name);
    fs::rename(target, &sidecar)?;
    Ok(sidecar)
}

fn canon(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
