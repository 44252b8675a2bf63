use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::console::INFO;

pub const DEFAULT_TAGS: &[&str] = &["title", "artist", "album", "tracknumber", "genre"];

/// Fields stripped from copies unless the sheet sets them. Entries may be
/// glob patterns.
pub const DEFAULT_DELETE: &[&str] = &[
    "acoustid_fingerprint",
    "acoustid_id",
    "albumartist",
    "albumartistsort",
    "albumsort",
    "arranger",
    "artistsort",
    "asin",
    "author",
    "barcode",
    "bpm",
    "catalognumber",
    "compilation",
    "composersort",
    "conductor",
    "copyright",
    "date",
    "discnumber",
    "discsubtitle",
    "encodedby",
    "isrc",
    "language",
    "length",
    "lyricist",
    "media",
    "mood",
    "musicbrainz_albumartistid",
    "musicbrainz_albumid",
    "musicbrainz_albumstatus",
    "musicbrainz_albumtype",
    "musicbrainz_artistid",
    "musicbrainz_discid",
    "musicbrainz_releasegroupid",
    "musicbrainz_releasetrackid",
    "musicbrainz_trackid",
    "musicbrainz_trmid",
    "musicbrainz_workid",
    "musicip_fingerprint",
    "musicip_puid",
    "organization",
    "originaldate",
    "performer",
    "performer:*",
    "releasecountry",
    "replaygain_*_gain",
    "replaygain_*_peak",
    "titlesort",
    "version",
    "website",
];

const DEFAULT_TAGS_FILE: &str = "id3_tags.txt";

/// Everything the collector and applier need, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tags: Vec<String>,
    pub delete: Vec<String>,
    pub tags_file: PathBuf,
    pub overwrite: bool,
    pub ignore_non_audio: bool,
    pub include_hidden: bool,
    pub exclude: Vec<String>,
    pub outdir: PathBuf,
    pub verbosity: u8,
    pub dry_run: bool,
    pub change_log: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tags: DEFAULT_TAGS.iter().map(|s| s.to_string()).collect(),
            delete: DEFAULT_DELETE.iter().map(|s| s.to_string()).collect(),
            tags_file: std::env::temp_dir().join(DEFAULT_TAGS_FILE),
            overwrite: false,
            ignore_non_audio: false,
            include_hidden: false,
            exclude: Vec::new(),
            outdir: default_outdir(),
            verbosity: INFO,
            dry_run: false,
            change_log: None,
        }
    }
}

/// `output-YYMMDD-HHMMSS`, in local time when the offset is known.
pub fn default_outdir() -> PathBuf {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let format = format_description!(
        "output-[year repr:last_two][month][day]-[hour][minute][second]"
    );
    PathBuf::from(now.format(&format).unwrap_or_else(|_| "output".into()))
}

/// Optional overrides read from a YAML or JSON file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub tags: Option<Vec<String>>,
    pub delete: Option<Vec<String>>,
    pub tags_file: Option<PathBuf>,
    pub outdir: Option<PathBuf>,
    pub verbosity: Option<u8>,
    pub ignore: Option<bool>,
    pub include_hidden: Option<bool>,
    pub exclude: Option<Vec<String>>,
    pub change_log: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<FileConfig> {
    let data = fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    let config = if path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
    {
        serde_json::from_slice(&data)
            .with_context(|| format!("parsing config {}", path.display()))?
    } else {
        serde_yaml::from_slice(&data)
            .with_context(|| format!("parsing config {}", path.display()))?
    };
    Ok(config)
}

impl Settings {
    pub fn merge_file(&mut self, file: FileConfig) {
        if let Some(tags) = file.tags {
            self.tags = tags;
        }
        if let Some(delete) = file.delete {
            self.delete = delete;
        }
        if let Some(tags_file) = file.tags_file {
            self.tags_file = tags_file;
        }
        if let Some(outdir) = file.outdir {
            self.outdir = outdir;
        }
        if let Some(verbosity) = file.verbosity {
            self.verbosity = verbosity.min(INFO);
        }
        if let Some(ignore) = file.ignore {
            self.ignore_non_audio = ignore;
        }
        if let Some(include_hidden) = file.include_hidden {
            self.include_hidden = include_hidden;
        }
        if let Some(exclude) = file.exclude {
            self.exclude = exclude;
        }
        if let Some(change_log) = file.change_log {
            self.change_log = Some(change_log);
        }
    }
}
