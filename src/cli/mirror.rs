//! Build function used by the `kiln` binary.
//!
//! Mirrors the source directory into the target directory: one job per
//! file, skipped when the copy is already up to date. Rounds triggered by a
//! change only look at the changed paths.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context as _, Result, anyhow};
use jwalk::WalkDir;
use kiln::{Context, Job};

pub fn mirror(ctx: &Context) -> Vec<anyhow::Error> {
    let (source, target) = match roots(ctx) {
        Ok(roots) => roots,
        Err(e) => return vec![e],
    };

    let mut errors = Vec::new();
    let paths = match ctx.quick_paths() {
        Some(changed) => changed.iter().cloned().collect(),
        None => walk(&source, &target, &mut errors),
    };

    for path in paths {
        if path.starts_with(&target) {
            continue;
        }
        let Ok(relative) = path.strip_prefix(&source) else {
            errors.push(anyhow!("{} is outside {}", path.display(), source.display()));
            continue;
        };
        if is_hidden(relative) {
            continue;
        }

        let dest = target.join(relative);
        if path.is_file() {
            ctx.enqueue(copy_job(path, dest));
        } else if !path.exists() {
            ctx.enqueue(remove_job(dest));
        }
    }

    errors
}

/// Absolute source and target directories.
fn roots(ctx: &Context) -> Result<(PathBuf, PathBuf)> {
    let source = std::path::absolute(ctx.source_dir())
        .with_context(|| format!("cannot resolve {}", ctx.source_dir().display()))?;
    let target = std::path::absolute(ctx.target_dir())
        .with_context(|| format!("cannot resolve {}", ctx.target_dir().display()))?;
    Ok((source, target))
}

/// Every visible file under `source`, skipping the target directory.
fn walk(source: &Path, target: &Path, errors: &mut Vec<anyhow::Error>) -> Vec<PathBuf> {
    let target = target.to_path_buf();
    let mut files = Vec::new();

    let walker = WalkDir::new(source).process_read_dir(move |_, _, _, children| {
        children.retain(|entry| {
            entry
                .as_ref()
                .map_or(true, |entry| !entry.path().starts_with(&target))
        });
    });

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.path()),
            Ok(_) => {}
            Err(e) => errors.push(anyhow!(e).context("error walking source directory")),
        }
    }
    files
}

fn is_hidden(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

fn copy_job(src: PathBuf, dest: PathBuf) -> Job {
    let name = format!("copy: {}", src.display());
    Job::new(name, move || {
        if is_fresh(&src, &dest) {
            return Ok(false);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        fs::copy(&src, &dest)
            .with_context(|| format!("cannot copy to {}", dest.display()))?;
        Ok(true)
    })
}

fn remove_job(dest: PathBuf) -> Job {
    let name = format!("remove: {}", dest.display());
    Job::new(name, move || {
        if dest.is_file() {
            fs::remove_file(&dest).with_context(|| format!("cannot remove {}", dest.display()))?;
            Ok(true)
        } else {
            Ok(false)
        }
    })
}

/// Whether `dest` is at least as new as `src`.
fn is_fresh(src: &Path, dest: &Path) -> bool {
    match (modified(src), modified(dest)) {
        (Some(src), Some(dest)) => dest >= src,
        _ => false,
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
