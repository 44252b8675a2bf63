use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use globset::GlobSet;

use crate::config::Settings;
use crate::console::Console;
use crate::files::{build_globs, is_audio, is_within, normalize_lexically, same_file};
use crate::logging::{Change, record_change};
use crate::sheet::{Row, TagSheet};
use crate::tags::{TagBackend, TagStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// Copied and tagged.
    Written,
    /// Copied without touching tags (not an audio file).
    Copied,
    /// Destination would leave the output directory.
    Escaped,
    /// Destination exists and overwriting is off.
    Collision,
    /// Dry run: the row would have been written.
    Planned,
    Failed,
}

impl fmt::Display for RowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RowOutcome::Written => "written",
            RowOutcome::Copied => "copied",
            RowOutcome::Escaped => "escaped",
            RowOutcome::Collision => "collision",
            RowOutcome::Planned => "planned",
            RowOutcome::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub written: usize,
    pub copied: usize,
    pub escaped: usize,
    pub collisions: usize,
    pub planned: usize,
    pub failed: usize,
}

impl ApplyStats {
    fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Written => self.written += 1,
            RowOutcome::Copied => self.copied += 1,
            RowOutcome::Escaped => self.escaped += 1,
            RowOutcome::Collision => self.collisions += 1,
            RowOutcome::Planned => self.planned += 1,
            RowOutcome::Failed => self.failed += 1,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "written={}, copied={}, collisions={}, escaped={}, failed={}, planned={}",
            self.written, self.copied, self.collisions, self.escaped, self.failed, self.planned
        )
    }
}

/// Replays a tag sheet onto copies of the original files.
pub struct Applier<'a> {
    settings: &'a Settings,
    backend: &'a dyn TagBackend,
    console: Console,
    delete: Option<GlobSet>,
}

impl<'a> Applier<'a> {
    pub fn new(
        settings: &'a Settings,
        backend: &'a dyn TagBackend,
        console: Console,
    ) -> Result<Self> {
        let delete = build_globs(&settings.delete, "delete")?;
        Ok(Self {
            settings,
            backend,
            console,
            delete,
        })
    }

    /// Processes rows in sheet order. Per-row problems are logged and counted;
    /// only setup failures abort the run.
    pub fn run(&self, sheet: &TagSheet) -> Result<ApplyStats> {
        let outdir = &self.settings.outdir;
        if !self.settings.dry_run {
            fs::create_dir_all(outdir)
                .with_context(|| format!("creating output directory {}", outdir.display()))?;
        }

        let mut stats = ApplyStats::default();
        for (index, row) in sheet.rows.iter().enumerate() {
            let (destination, outcome) = match self.apply_row(sheet, row) {
                Ok(result) => result,
                Err(err) => {
                    self.console.error(format!(
                        "{}: {err:#}. skipping...",
                        self.console.green(&row.original)
                    ));
                    (outdir.join(&row.new_path), RowOutcome::Failed)
                }
            };
            stats.record(outcome);
            if let Some(log) = &self.settings.change_log {
                if !self.settings.dry_run {
                    let outcome = outcome.to_string();
                    let change = Change {
                        command: "set",
                        row: Some(index + 1),
                        source: Some(row.original.as_str()),
                        destination: &destination,
                        outcome: &outcome,
                    };
                    record_change(log, &change)?;
                }
            }
        }
        Ok(stats)
    }

    fn destination(&self, row: &Row) -> Option<PathBuf> {
        let requested = Path::new(&row.new_path);
        if requested.is_absolute() {
            return None;
        }
        let outdir = std::path::absolute(&self.settings.outdir)
            .unwrap_or_else(|_| self.settings.outdir.clone());
        let joined = outdir.join(requested);
        if !is_within(&outdir, &joined) {
            return None;
        }
        normalize_lexically(&joined)
    }

    fn apply_row(&self, sheet: &TagSheet, row: &Row) -> Result<(PathBuf, RowOutcome)> {
        let outdir = &self.settings.outdir;
        let Some(copypath) = self.destination(row) else {
            let attempted = outdir.join(&row.new_path);
            self.console.warning(format!(
                "output file {} must be in output directory {}. skipping...",
                self.console.green(attempted.display()),
                self.console.green(outdir.display())
            ));
            return Ok((attempted, RowOutcome::Escaped));
        };

        if copypath.exists() && !self.settings.overwrite {
            self.console.warning(format!(
                "{} already exists. remove file or set {} flag. skipping...",
                self.console.green(copypath.display()),
                self.console.yellow("-r")
            ));
            return Ok((copypath, RowOutcome::Collision));
        }

        if same_file(Path::new(&row.original), &copypath) {
            bail!(
                "{} is the original file itself; give it a different new path",
                copypath.display()
            );
        }

        if self.settings.dry_run {
            self.console.info(format!(
                "would copy {} -> {}",
                self.console.green(&row.original),
                self.console.green(copypath.display())
            ));
            return Ok((copypath, RowOutcome::Planned));
        }

        if let Some(parent) = copypath.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        fs::copy(&row.original, &copypath).with_context(|| {
            format!("copying {} to {}", row.original, copypath.display())
        })?;

        if !is_audio(&copypath) {
            self.console.info(format!(
                "copied {}",
                self.console.green(copypath.display())
            ));
            return Ok((copypath, RowOutcome::Copied));
        }

        let mut store = self.backend.load_or_empty(&copypath);
        for (field, value) in sheet.fields.iter().zip(&row.values) {
            if let Err(err) = store.set(field, value) {
                self.console.warning(format!(
                    "{}: could not set {field} ({err:#}); leaving it unchanged",
                    self.console.green(copypath.display())
                ));
            }
        }
        self.delete_unlisted(sheet, store.as_mut());
        store.save(&copypath)?;

        self.console.info(format!(
            "wrote {}",
            self.console.green(copypath.display())
        ));
        Ok((copypath, RowOutcome::Written))
    }

    /// Removes fields on the delete list, except those the sheet sets.
    fn delete_unlisted(&self, sheet: &TagSheet, store: &mut dyn TagStore) {
        let Some(delete) = &self.delete else {
            return;
        };
        for field in store.fields() {
            let edited = sheet
                .fields
                .iter()
                .any(|column| column.eq_ignore_ascii_case(&field));
            if !edited && delete.is_match(&field) {
                store.delete(&field);
            }
        }
    }
}
