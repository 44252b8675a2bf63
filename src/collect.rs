use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::Settings;
use crate::console::Console;
use crate::files::{is_audio, resolve_inputs};
use crate::logging::{Change, record_change};
use crate::order::sort_rows;
use crate::sheet::{Row, TagSheet, write_sheet};
use crate::tags::{TagBackend, TagStore};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    pub rows: usize,
    pub unreadable: usize,
    pub ignored: usize,
}

/// Reads the configured fields of every input file into a tag sheet.
pub struct Collector<'a> {
    settings: &'a Settings,
    backend: &'a dyn TagBackend,
    console: Console,
}

impl<'a> Collector<'a> {
    pub fn new(settings: &'a Settings, backend: &'a dyn TagBackend, console: Console) -> Self {
        Self {
            settings,
            backend,
            console,
        }
    }

    pub fn collect(&self, inputs: &[PathBuf]) -> Result<(TagSheet, CollectStats)> {
        let files = resolve_inputs(inputs, self.settings.include_hidden, &self.settings.exclude)?;
        let mut sheet = TagSheet::new(self.settings.tags.clone());
        let mut stats = CollectStats::default();

        for file in &files {
            let Some(row) = self.collect_row(file, &sheet, &mut stats) else {
                stats.ignored += 1;
                continue;
            };
            sheet.rows.push(row);
        }

        sort_rows(&mut sheet.rows, &sheet.fields);
        stats.rows = sheet.rows.len();
        Ok((sheet, stats))
    }

    fn collect_row(&self, file: &Path, sheet: &TagSheet, stats: &mut CollectStats) -> Option<Row> {
        // A sheet cell has to name the file exactly.
        let Some(display) = file.to_str() else {
            self.console.warning(format!(
                "{} is not valid UTF-8 and cannot be written to the tags file. skipping...",
                self.console.green(file.display())
            ));
            return None;
        };
        let mut row = Row::bare(display, sheet.fields.len());

        if !is_audio(file) {
            return (!self.settings.ignore_non_audio).then_some(row);
        }

        match self.backend.load(file) {
            Ok(store) => {
                row.values = sheet.fields.iter().map(|field| store.get(field)).collect();
            }
            Err(err) => {
                stats.unreadable += 1;
                self.console.warning(format!(
                    "could not read tags for {} ({err:#}); leaving its fields empty",
                    self.console.green(display)
                ));
            }
        }
        Some(row)
    }

    /// Collects `inputs` and writes the sheet. Refuses to replace an existing
    /// sheet unless overwriting was requested.
    pub fn write(&self, inputs: &[PathBuf]) -> Result<CollectStats> {
        let target = &self.settings.tags_file;
        if target.exists() {
            if !self.settings.overwrite {
                bail!(
                    "tags file {} already exists; remove it or pass -r",
                    target.display()
                );
            }
            self.console.info(format!(
                "found tags file {}. removing...",
                self.console.green(target.display())
            ));
            fs::remove_file(target).with_context(|| format!("removing {}", target.display()))?;
        }

        let (sheet, stats) = self.collect(inputs)?;
        write_sheet(target, &sheet)?;
        self.console.info(format!(
            "generated tags file: {} ({} rows, {} unreadable, {} ignored)",
            self.console.green(target.display()),
            stats.rows,
            stats.unreadable,
            stats.ignored
        ));
        if let Some(log) = &self.settings.change_log {
            let outcome = format!("{} rows", stats.rows);
            let change = Change {
                command: "get",
                row: None,
                source: None,
                destination: target,
                outcome: &outcome,
            };
            record_change(log, &change)?;
        }
        Ok(stats)
    }
}
