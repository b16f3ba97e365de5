use std::path::PathBuf;

use clap::{Parser, Subcommand};
use taskmirror::commands::add::AddArgs;
use taskmirror::model::Status;
use taskmirror::output::Format;

#[derive(Parser)]
#[command(
    name = "taskmirror",
    version,
    about = "Task list with a JSON source of truth and a markdown mirror"
)]
struct Cli {
    /// Data directory (defaults to the nearest directory with taskmirror.json, else the current one)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    /// Log debug output to stderr
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config, an empty task list and its markdown mirror
    Init,
    /// Add a task, or refresh an open one with the same selector and comment
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        comment: String,
        /// CSS selector of the annotated element
        #[arg(long)]
        selector: String,
        /// Bounding rectangle as x,y,w,h
        #[arg(long)]
        rect: Option<String>,
        /// Path to a screenshot
        #[arg(long)]
        screenshot: Option<String>,
        /// Update the task with this ID instead of creating one
        #[arg(long)]
        id: Option<String>,
    },
    /// Change a task's status
    Status {
        id: String,
        /// to-do, doing or done (aliases such as pending or completed work too)
        status: String,
    },
    /// Delete a task by ID
    Remove { id: String },
    /// List tasks, newest first
    List {
        #[arg(long, value_enum)]
        status: Option<Status>,
    },
    /// Display a single task
    Show { id: String },
    /// Rewrite the markdown mirror from tasks.json
    Render {
        /// Print the document instead of writing it
        #[arg(long)]
        stdout: bool,
    },
    /// Re-read tasks.json after an external edit and re-render
    Sync,
    /// Write a timestamped copy of tasks.json
    Backup,
    /// Convert legacy annotation files into tasks.json
    Migrate {
        /// Report what would be converted without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Restore the files replaced by the latest migration
    Rollback,
    /// Print version and build commit
    Version,
}

fn init_tracing(quiet: bool, verbose: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("TASKMIRROR_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, format: Format) -> taskmirror::error::Result<()> {
    use taskmirror::commands;

    let Cli { dir, command, .. } = cli;
    let project_root = || taskmirror::store::repo::resolve_root(dir.clone());

    match command {
        Commands::Version => {
            println!("taskmirror {}", taskmirror::build_info::version_string());
            Ok(())
        }
        Commands::Init => {
            let root = match dir.clone() {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            commands::init::run(&root)
        }
        Commands::Add {
            title,
            comment,
            selector,
            rect,
            screenshot,
            id,
        } => commands::add::run(
            &project_root()?,
            AddArgs {
                title,
                comment,
                selector,
                rect,
                screenshot,
                id,
            },
            format,
        ),
        Commands::Status { id, status } => {
            commands::status::run(&project_root()?, &id, &status, format)
        }
        Commands::Remove { id } => commands::remove::run(&project_root()?, &id, format),
        Commands::List { status } => commands::list::run(&project_root()?, status, format),
        Commands::Show { id } => commands::show::run(&project_root()?, &id, format),
        Commands::Render { stdout } => commands::render::run(&project_root()?, stdout, format),
        Commands::Sync => commands::sync::run(&project_root()?, format),
        Commands::Backup => commands::backup::run(&project_root()?, format),
        Commands::Migrate { dry_run } => {
            commands::migrate::run(&project_root()?, dry_run, format)
        }
        Commands::Rollback => commands::rollback::run(&project_root()?, format),
    }
}
