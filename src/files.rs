use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

pub const AUDIO_EXTENSION: &str = "mp3";

pub fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(AUDIO_EXTENSION))
        .unwrap_or(false)
}

/// Expands the user's path arguments into a flat file list. Directories are
/// walked recursively; plain files are kept as given.
pub fn resolve_inputs(
    paths: &[PathBuf],
    include_hidden: bool,
    exclude_patterns: &[String],
) -> Result<Vec<PathBuf>> {
    let exclude = build_globs(exclude_patterns, "exclude")?;
    let mut files = Vec::new();

    for path in paths {
        append_path(path, include_hidden, exclude.as_ref(), &mut files)
            .with_context(|| format!("processing input {}", path.display()))?;
    }

    dedup_preserving_order(&mut files);
    Ok(files)
}

fn append_path(
    path: &Path,
    include_hidden: bool,
    exclude: Option<&GlobSet>,
    acc: &mut Vec<PathBuf>,
) -> Result<()> {
    let metadata = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            bail!("{} does not exist", path.display());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("unable to read metadata for {}", path.display()));
        }
    };

    if metadata.is_dir() {
        return walk_directory(path, include_hidden, exclude, acc);
    }

    if metadata.is_file() && !is_excluded(path, exclude) {
        acc.push(path.to_path_buf());
    }

    Ok(())
}

fn walk_directory(
    dir: &Path,
    include_hidden: bool,
    exclude: Option<&GlobSet>,
    acc: &mut Vec<PathBuf>,
) -> Result<()> {
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || include_hidden || !is_hidden(entry));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        if is_excluded(&path, exclude) {
            continue;
        }
        acc.push(path);
    }

    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_excluded(path: &Path, exclude: Option<&GlobSet>) -> bool {
    exclude
        .map(|set| set.is_match(normalize_slashes(path).as_str()))
        .unwrap_or(false)
}

fn normalize_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn dedup_preserving_order(files: &mut Vec<PathBuf>) {
    let mut seen = std::collections::HashSet::new();
    files.retain(|path| seen.insert(path.clone()));
}

pub fn build_globs(patterns: &[String], label: &str) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|err| anyhow!("invalid {label} glob '{pattern}': {err}"))?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|err| anyhow!("unable to build {label} globs: {err}"))
}

/// Resolves `.` and `..` without touching the filesystem. Returns `None`
/// when `..` would climb above the start of a relative path.
pub fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                out.push(component.as_os_str());
                depth = 0;
            }
        }
    }
    Some(out)
}

/// True when `candidate` names an entry strictly inside `root`, after both
/// are normalized lexically.
pub fn is_within(root: &Path, candidate: &Path) -> bool {
    match (normalize_lexically(root), normalize_lexically(candidate)) {
        (Some(root), Some(candidate)) => candidate != root && candidate.starts_with(&root),
        _ => false,
    }
}

/// True when both paths resolve to the same existing file, through symlinks
/// and `..` components alike.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
