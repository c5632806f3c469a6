use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::datetime::parse_due_arg;
use crate::filter::Category;
use crate::task::Status;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tareas",
    version,
    about = "Task list client for the gestion_de_tareas API"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "tareasrc")]
    pub tareasrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(long = "api-url")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List tasks in a category, optionally narrowed by a search term
    List {
        #[arg(short = 'c', long, default_value = "all")]
        category: Category,
        #[arg(short = 's', long)]
        search: Option<String>,
    },
    /// Show every field of one task
    Show { id: u64 },
    /// Create a task
    Add(AddArgs),
    /// Update fields of an existing task
    Edit(EditArgs),
    /// Toggle the favorite flag
    Favorite { id: u64 },
    /// Move a task to the trash
    Trash { id: u64 },
    /// Take a task back out of the trash
    Restore { id: u64 },
    /// Permanently delete everything in the trash
    EmptyTrash,
    /// Permanently delete one trashed task
    Delete { id: u64 },
    /// Show or toggle the color theme
    Theme {
        #[arg(long)]
        toggle: bool,
    },
    /// Interactive list page reading actions from stdin
    Session,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub description: String,
    #[arg(long, value_parser = parse_due_arg)]
    pub due: Option<NaiveDate>,
    #[arg(long, default_value = "pendiente")]
    pub status: Status,
}

/// Only the flags given are changed.
#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: u64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, value_parser = parse_due_arg, conflicts_with = "no_due")]
    pub due: Option<NaiveDate>,
    #[arg(long)]
    pub no_due: bool,
    #[arg(long)]
    pub status: Option<Status>,
}

/// One line typed at the session prompt.
#[derive(Parser, Debug, Clone)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct SessionLine {
    #[command(subcommand)]
    pub action: SessionAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SessionAction {
    /// Print the current view
    List,
    /// Filter the view by a free-text term
    Search { term: Vec<String> },
    /// Drop the search term
    Clear,
    /// Switch category: all, favorites or trash
    Filter { category: Category },
    /// Show one task by id
    Show { id: u64 },
    /// Create a task and add it to the list
    Add(AddArgs),
    /// Update a task in place
    Edit(EditArgs),
    #[command(alias = "fav")]
    Favorite { id: u64 },
    Trash { id: u64 },
    Restore { id: u64 },
    EmptyTrash,
    Delete { id: u64 },
    /// Pick up the item at a view position
    Drag { index: usize },
    /// Hover a view position
    Enter { index: usize },
    /// Release the dragged item
    Drop,
    /// Abandon the drag
    Cancel,
    /// Drag from one view position to another in one step
    Move { from: usize, to: usize },
    Theme,
    #[command(alias = "exit")]
    Quit,
}

impl SessionLine {
    pub fn parse_line(line: &str) -> Result<Self, clap::Error> {
        Self::try_parse_from(split_words(line))
    }
}

/// Whitespace-separated words; single or double quotes group words.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current: Option<String> = None;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), c) => current.get_or_insert_with(String::new).push(c),
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.get_or_insert_with(String::new);
            }
            (None, c) if c.is_whitespace() => words.extend(current.take()),
            (None, c) => current.get_or_insert_with(String::new).push(c),
        }
    }
    words.extend(current);
    words
}

/// Log level from `-v`/`-q` counts; `RUST_LOG` wins when set.
fn level_for(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, _) => "trace",
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level_for(verbose, quiet))
            .map_err(|e| anyhow!("bad log filter: {e}"))?,
    };

    let stderr_is_tty = std::io::stderr().is_terminal();
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(stderr_is_tty)
        .try_init()
    {
        debug!(error = %err, "global subscriber was already installed");
    }
    Ok(())
}

/// Splits bare `rc.<key>=<value>` and `rc.<key>:<value>` words out of the
/// argument list; clap only sees what remains.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut pre = PreprocessedArgs {
        cleaned_args: Vec::with_capacity(raw.len()),
        rc_overrides: Vec::new(),
    };

    for (idx, arg) in raw.iter().enumerate() {
        let setting = arg
            .to_str()
            .filter(|_| idx > 0)
            .and_then(|text| text.strip_prefix("rc."))
            .and_then(|rest| rest.split_once('=').or_else(|| rest.split_once(':')));

        match setting {
            Some((key, value)) => {
                debug!(key, value, "rc override from argument list");
                pre.rc_overrides.push((format!("rc.{key}"), value.to_string()));
            }
            None => pre.cleaned_args.push(arg.clone()),
        }
    }

    Ok(pre)
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{
        AddArgs, Command, GlobalCli, SessionAction, SessionLine, level_for, preprocess_args,
        split_words,
    };
    use crate::filter::Category;
    use crate::task::Status;

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let raw: Vec<OsString> = ["tareas", "rc.api.url:http://x/api", "list"]
            .iter()
            .map(OsString::from)
            .collect();
        let pre = preprocess_args(&raw).expect("preprocess");
        assert_eq!(
            pre.rc_overrides,
            vec![("rc.api.url".to_string(), "http://x/api".to_string())]
        );
        assert_eq!(pre.cleaned_args.len(), 2);
    }

    #[test]
    fn quiet_beats_verbose() {
        assert_eq!(level_for(0, 0), "warn");
        assert_eq!(level_for(2, 0), "debug");
        assert_eq!(level_for(5, 0), "trace");
        assert_eq!(level_for(3, 1), "warn");
        assert_eq!(level_for(0, 2), "error");
    }

    #[test]
    fn add_parses_status_and_due() {
        let cli = GlobalCli::parse_from([
            "tareas",
            "add",
            "--title",
            "Informe",
            "--description",
            "mensual",
            "--due",
            "01-12-2026",
            "--status",
            "en progreso",
        ]);
        match cli.command {
            Some(Command::Add(AddArgs { status, due, .. })) => {
                assert_eq!(status, Status::InProgress);
                assert_eq!(due.map(|d| d.to_string()).as_deref(), Some("2026-12-01"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn session_lines_parse() {
        let line = SessionLine::parse_line("filter papelera").expect("parse");
        assert!(matches!(
            line.action,
            SessionAction::Filter {
                category: Category::Trash
            }
        ));

        let line = SessionLine::parse_line("search weekly report").expect("parse");
        match line.action {
            SessionAction::Search { term } => assert_eq!(term.join(" "), "weekly report"),
            other => panic!("unexpected action: {other:?}"),
        }

        assert!(SessionLine::parse_line("move 1").is_err());
    }

    #[test]
    fn quoted_words_stay_together() {
        assert_eq!(
            split_words(r#"add --title "Pay rent" --description 'before the 5th'"#),
            vec!["add", "--title", "Pay rent", "--description", "before the 5th"]
        );
        assert_eq!(split_words(r#"edit 3 --description """#), vec!["edit", "3", "--description", ""]);
        assert_eq!(split_words("  list   "), vec!["list"]);

        let line = SessionLine::parse_line(r#"edit 4 --title "Call the bank" --no-due"#)
            .expect("parse");
        match line.action {
            SessionAction::Edit(args) => {
                assert_eq!(args.id, 4);
                assert_eq!(args.title.as_deref(), Some("Call the bank"));
                assert!(args.no_due);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }
}
