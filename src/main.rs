use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint, value_parser};
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};

mod apply;
mod collect;
mod config;
mod console;
mod files;
mod literal;
mod logging;
mod order;
mod sheet;
mod tags;
use apply::Applier;
use collect::Collector;
use config::{Settings, load_config};
use console::Console;
use sheet::read_sheet;
use tags::Id3Backend;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn should_color(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let colorize = cli.common().color.should_color();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            Console::new(console::QUIET, colorize).error(format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = resolve_settings(&cli)?;
    let console = Console::new(settings.verbosity, cli.common().color.should_color());

    match &cli.command {
        Command::Get(cmd) => handle_get(cmd, &settings, console),
        Command::Set(_) => handle_set(&settings, console),
    }
}

fn handle_get(cmd: &GetCommand, settings: &Settings, console: Console) -> Result<()> {
    let collector = Collector::new(settings, &Id3Backend, console);
    collector.write(&cmd.paths)?;
    Ok(())
}

fn handle_set(settings: &Settings, console: Console) -> Result<()> {
    let sheet = read_sheet(&settings.tags_file)?;
    console.info(format!(
        "applying {} rows from {} to {}",
        sheet.rows.len(),
        console.green(settings.tags_file.display()),
        console.green(settings.outdir.display())
    ));
    let applier = Applier::new(settings, &Id3Backend, console.clone())?;
    let stats = applier.run(&sheet)?;
    console.info(format!("set summary: {}", stats.summary()));
    Ok(())
}

/// Built-in defaults, then the config file, then command-line flags.
fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let common = cli.common();
    let mut settings = Settings::default();
    if let Some(path) = &common.config {
        settings.merge_file(load_config(path)?);
    }
    if let Some(tags_file) = &common.tags_file {
        settings.tags_file = tags_file.clone();
    }
    if let Some(verbosity) = common.verbosity {
        settings.verbosity = verbosity;
    }
    if let Some(change_log) = &common.change_log {
        settings.change_log = Some(change_log.clone());
    }
    if !common.tags.is_empty() {
        settings.tags = common.tags.clone();
    }
    if let Some(delete) = &common.delete {
        settings.delete = delete.clone();
    }
    if let Some(outdir) = &common.outdir {
        settings.outdir = outdir.clone();
    }
    if common.ignore {
        settings.ignore_non_audio = true;
    }
    settings.overwrite = common.remove;

    match &cli.command {
        Command::Get(cmd) => {
            if cmd.include_hidden {
                settings.include_hidden = true;
            }
            if !cmd.exclude.is_empty() {
                settings.exclude = cmd.exclude.clone();
            }
        }
        Command::Set(cmd) => settings.dry_run = cmd.dry_run,
    }
    Ok(settings)
}

#[derive(Debug, Parser)]
#[command(
    name = "tagsheet",
    version,
    about = "Edit id3 tags in bulk through an editable text table"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn common(&self) -> &CommonArgs {
        match &self.command {
            Command::Get(cmd) => &cmd.common,
            Command::Set(cmd) => &cmd.common,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read tags from PATHS into the tags file.
    Get(GetCommand),
    /// Copy files into the output directory and apply the tags file.
    Set(SetCommand),
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    #[arg(
        short = 't',
        long = "tags",
        value_name = "FIELD",
        value_delimiter = ',',
        action = ArgAction::Append
    )]
    tags: Vec<String>,
    /// Fields to strip from copies; pass `-d` alone to strip nothing.
    #[arg(
        short = 'd',
        long = "delete",
        value_name = "FIELD",
        value_delimiter = ',',
        num_args = 0..
    )]
    delete: Option<Vec<String>>,
    #[arg(short = 'o', long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    outdir: Option<PathBuf>,
    #[arg(short = 'i', long, action = ArgAction::SetTrue)]
    ignore: bool,
    #[arg(short = 'f', long = "tagsfile", value_name = "FILE", value_hint = ValueHint::FilePath)]
    tags_file: Option<PathBuf>,
    #[arg(short = 'r', long, action = ArgAction::SetTrue)]
    remove: bool,
    #[arg(short = 'v', long, value_name = "LEVEL", value_parser = value_parser!(u8).range(0..=2))]
    verbosity: Option<u8>,
    #[arg(long = "color", value_enum, default_value = "auto")]
    color: ColorChoice,
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    #[arg(long = "change-log", value_name = "FILE", value_hint = ValueHint::FilePath)]
    change_log: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct GetCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(value_name = "PATHS", required = true, value_hint = ValueHint::AnyPath)]
    paths: Vec<PathBuf>,
    #[arg(long = "include-hidden", action = ArgAction::SetTrue)]
    include_hidden: bool,
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,
}

#[derive(Debug, Args)]
struct SetCommand {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::CellValue;
    use crate::sheet::{decode, encode};
    use crate::tags::fixtures::tagged_mp3;
    use crate::tags::{TagBackend, TagStore};
    use clap::CommandFactory;
    use std::ffi::OsString;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn get_requires_paths() {
        assert!(Cli::try_parse_from(["tagsheet", "get"]).is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "tagsheet", "get", "music", "-t", "album,tracknumber", "-t", "title", "-i", "-r",
            "-v", "1", "-f", "sheet.txt",
        ])
        .unwrap();
        let settings = resolve_settings(&cli).unwrap();
        assert_eq!(settings.tags, vec!["album", "tracknumber", "title"]);
        assert!(settings.ignore_non_audio);
        assert!(settings.overwrite);
        assert_eq!(settings.verbosity, 1);
        assert_eq!(settings.tags_file, PathBuf::from("sheet.txt"));
    }

    #[test]
    fn shared_flags_work_on_both_commands() {
        let cli = Cli::try_parse_from(["tagsheet", "set", "-t", "title", "-i"]).unwrap();
        let settings = resolve_settings(&cli).unwrap();
        assert_eq!(settings.tags, vec!["title"]);
        assert!(settings.ignore_non_audio);

        let cli =
            Cli::try_parse_from(["tagsheet", "get", "music", "-o", "out", "-d", "mood"]).unwrap();
        let settings = resolve_settings(&cli).unwrap();
        assert_eq!(settings.outdir, PathBuf::from("out"));
        assert_eq!(settings.delete, vec!["mood"]);
    }

    #[test]
    fn verbosity_is_bounded() {
        assert!(Cli::try_parse_from(["tagsheet", "set", "-v", "3"]).is_err());
    }

    #[test]
    fn empty_delete_flag_clears_list() {
        let cli = Cli::try_parse_from(["tagsheet", "set", "-o", "out", "-d"]).unwrap();
        let settings = resolve_settings(&cli).unwrap();
        assert!(settings.delete.is_empty());
        assert_eq!(settings.outdir, PathBuf::from("out"));

        let cli = Cli::try_parse_from(["tagsheet", "set"]).unwrap();
        let settings = resolve_settings(&cli).unwrap();
        assert!(!settings.delete.is_empty());
    }

    #[test]
    fn get_edit_set_round_trip() {
        let temp = tempdir().expect("temp dir");
        let input = temp.path().join("in");
        tagged_mp3(
            &input.join("track.mp3"),
            &[("TIT2", "Untitled"), ("TALB", "Demo"), ("TRCK", "1")],
        );
        let sheet_path = temp.path().join("tags.txt");
        let out = temp.path().join("out");

        let get_args: Vec<OsString> = vec![
            "tagsheet".into(),
            "get".into(),
            input.clone().into_os_string(),
            "-t".into(),
            "title,album,tracknumber".into(),
            "-f".into(),
            sheet_path.clone().into_os_string(),
            "-v".into(),
            "0".into(),
            "--color".into(),
            "never".into(),
        ];
        run(Cli::try_parse_from(get_args).unwrap()).unwrap();

        let mut sheet = decode(&fs::read_to_string(&sheet_path).unwrap()).unwrap();
        sheet.rows[0].new_path = "Demo/01 Opening.mp3".into();
        sheet.rows[0].values[0] = CellValue::Text("Opening".into());
        fs::write(&sheet_path, encode(&sheet)).unwrap();

        let set_args: Vec<OsString> = vec![
            "tagsheet".into(),
            "set".into(),
            "-f".into(),
            sheet_path.into_os_string(),
            "-o".into(),
            out.clone().into_os_string(),
            "-v".into(),
            "0".into(),
        ];
        run(Cli::try_parse_from(set_args).unwrap()).unwrap();

        let store = Id3Backend
            .load(&out.join("Demo").join("01 Opening.mp3"))
            .unwrap();
        assert_eq!(store.get("title"), CellValue::Text("Opening".into()));
        assert_eq!(store.get("album"), CellValue::Text("Demo".into()));
        assert_eq!(store.get("tracknumber"), CellValue::Int(1));
    }
}
