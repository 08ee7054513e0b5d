mod app;

use std::num::NonZeroU32;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use inklink_core::{GroupId, LinkFileId, ShapeColor, ShapeId};
use inklink_session::{InkKind, Settings, TargetRule};
use tracing_subscriber::EnvFilter;

use app::App;

/// Handwritten ink files with linkable groups
#[derive(Parser, Debug)]
#[command(name = "inklink")]
#[command(version, about, long_about = None)]
struct Args {
    /// Vault root that link paths and new files are relative to
    #[arg(long, value_name = "DIR", default_value = ".")]
    vault: PathBuf,

    /// Settings file (defaults to the user config directory)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty ink file in the vault
    New {
        name: String,
        #[arg(long, value_enum, default_value_t = Kind::Writing)]
        kind: Kind,
    },
    /// Summarize an ink file
    Inspect {
        file: PathBuf,
        /// Print group overlay rectangles as JSON instead
        #[arg(long)]
        overlays: bool,
    },
    /// Manage link groups
    #[command(subcommand)]
    Group(GroupCommand),
    /// Manage the files linked from a group
    #[command(subcommand)]
    Link(LinkCommand),
    /// Vault paths matching a query
    Suggest { query: String },
    /// Render the SVG preview
    Preview {
        file: PathBuf,
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },
    /// What new ink would link to from a markdown note
    Target {
        note: PathBuf,
        /// 1-based cursor line
        #[arg(long, default_value = "1")]
        line: NonZeroU32,
        /// Rules to try in order (defaults from settings)
        #[arg(long = "rule", value_parser = parse_rule)]
        rules: Vec<TargetRule>,
    },
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    /// Create a group from shapes
    Create {
        file: PathBuf,
        name: String,
        #[arg(long, value_parser = parse_color, default_value = "red")]
        color: ShapeColor,
        #[arg(value_name = "SHAPE")]
        shapes: Vec<ShapeId>,
    },
    /// Rename or recolor a group
    Rename {
        file: PathBuf,
        group: String,
        name: Option<String>,
        #[arg(long, value_parser = parse_color)]
        color: Option<ShapeColor>,
    },
    /// Delete a group
    Remove { file: PathBuf, group: String },
    /// Add shapes to a group
    Attach {
        file: PathBuf,
        group: String,
        #[arg(value_name = "SHAPE", required = true)]
        shapes: Vec<ShapeId>,
    },
    /// Take shapes out of a group
    Detach {
        file: PathBuf,
        group: String,
        #[arg(value_name = "SHAPE", required = true)]
        shapes: Vec<ShapeId>,
    },
}

#[derive(Subcommand, Debug)]
enum LinkCommand {
    /// Link a vault file from a group
    Add {
        file: PathBuf,
        group: String,
        path: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        line: Option<NonZeroU32>,
    },
    /// Change a linked file
    Edit {
        file: PathBuf,
        group: String,
        link: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        path: Option<String>,
        #[arg(long, conflicts_with = "clear_line")]
        line: Option<NonZeroU32>,
        #[arg(long)]
        clear_line: bool,
    },
    /// Unlink a file
    Remove {
        file: PathBuf,
        group: String,
        link: String,
    },
    /// Open a linked file at its line
    Open {
        file: PathBuf,
        group: String,
        link: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Writing,
    Drawing,
}

impl From<Kind> for InkKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Writing => InkKind::Writing,
            Kind::Drawing => InkKind::Drawing,
        }
    }
}

fn parse_color(s: &str) -> Result<ShapeColor, String> {
    ShapeColor::from_name(s).ok_or_else(|| {
        let names: Vec<_> = ShapeColor::ALL.iter().map(|c| c.name()).collect();
        format!("unknown color '{s}' (expected one of {})", names.join(", "))
    })
}

fn parse_rule(s: &str) -> Result<TargetRule, String> {
    match s {
        "selected-text" => Ok(TargetRule::SelectedText),
        "current-heading" => Ok(TargetRule::CurrentHeading),
        "active-file" => Ok(TargetRule::ActiveFile),
        _ => Err(format!("unknown rule '{s}'")),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("INKLINK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = match &args.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let app = App::new(settings, args.vault);

    let output = match args.command {
        Command::New { name, kind } => {
            let path = app.new_file(&name, kind.into())?;
            format!("Created {}", path.display())
        }
        Command::Inspect { file, overlays } => {
            if overlays {
                app.overlays_json(&file)?
            } else {
                app.inspect(&file)?
            }
        }
        Command::Group(cmd) => run_group(&app, cmd)?,
        Command::Link(cmd) => run_link(&app, cmd)?,
        Command::Suggest { query } => app.suggest(&query).join("\n"),
        Command::Preview { file, output } => app.preview(&file, output.as_deref())?,
        Command::Target { note, line, rules } => app.target(&note, line, &rules)?,
    };
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn run_group(app: &App, cmd: GroupCommand) -> Result<String> {
    match cmd {
        GroupCommand::Create {
            file,
            name,
            color,
            shapes,
        } => {
            let id = app.create_group(&file, &name, color, &shapes)?;
            Ok(id.to_string())
        }
        GroupCommand::Rename {
            file,
            group,
            name,
            color,
        } => app.update_group(&file, &GroupId::from(group), name, color),
        GroupCommand::Remove { file, group } => app.remove_group(&file, &GroupId::from(group)),
        GroupCommand::Attach {
            file,
            group,
            shapes,
        } => app.attach(&file, &GroupId::from(group), &shapes),
        GroupCommand::Detach {
            file,
            group,
            shapes,
        } => app.detach(&file, &GroupId::from(group), &shapes),
    }
}

fn run_link(app: &App, cmd: LinkCommand) -> Result<String> {
    match cmd {
        LinkCommand::Add {
            file,
            group,
            path,
            name,
            line,
        } => app.add_link(&file, &GroupId::from(group), &path, name, line),
        LinkCommand::Edit {
            file,
            group,
            link,
            name,
            path,
            line,
            clear_line,
        } => {
            let line = if clear_line { Some(None) } else { line.map(Some) };
            app.edit_link(
                &file,
                &GroupId::from(group),
                &LinkFileId::from(link.as_str()),
                name,
                path,
                line,
            )
        }
        LinkCommand::Remove { file, group, link } => app.remove_link(
            &file,
            &GroupId::from(group),
            &LinkFileId::from(link.as_str()),
        ),
        LinkCommand::Open { file, group, link } => app.open_link(
            &file,
            &GroupId::from(group),
            &LinkFileId::from(link.as_str()),
        ),
    }
}
