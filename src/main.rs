//! Entry point for the `lbk` CLI.

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use logbook::cli::{
    Cli, Commands, HandoffCommands, IndexCommands, NoteCommands, PhaseCommands, ResearchCommands,
    SessionCommands, TrackerCommands,
};
use logbook::commands::{self, CommandResult};
use logbook::config::{self, Settings};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = config::resolve(cli.vault.clone());

    if let Err(e) = run_command(cli, &settings) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Print a command result as JSON (default) or human-readable text.
fn output(result: &dyn CommandResult, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

fn run_command(cli: Cli, settings: &Settings) -> logbook::Result<()> {
    let human = cli.human_readable;
    match cli.command {
        Commands::Handoff { command } => match command {
            HandoffCommands::Create {
                title,
                body,
                phase,
                session,
                tags,
            } => {
                let result =
                    commands::handoff_create(settings, title, body, phase, session, tags)?;
                output(&result, human);
            }
            HandoffCommands::Latest => {
                let result = commands::handoff_latest(settings)?;
                output(&result, human);
            }
        },

        Commands::Session { command } => match command {
            SessionCommands::Start { title, tags } => {
                let result = commands::session_start(settings, title, tags)?;
                output(&result, human);
            }
        },

        Commands::Phase { command } => match command {
            PhaseCommands::Create { id, title, goal } => {
                let result = commands::phase_create(settings, id, title, goal)?;
                output(&result, human);
            }
            PhaseCommands::Activate { id } => {
                let result = commands::phase_activate(settings, id)?;
                output(&result, human);
            }
        },

        Commands::Research { command } => match command {
            ResearchCommands::Add { title, body, phase } => {
                let result = commands::research_add(settings, title, body, phase)?;
                output(&result, human);
            }
        },

        Commands::Note { command } => match command {
            NoteCommands::Show { path } => {
                let result = commands::note_show(settings, path)?;
                output(&result, human);
            }
            NoteCommands::List {
                dir,
                recursive,
                type_filter,
            } => {
                let result = commands::note_list(settings, dir, recursive, type_filter)?;
                output(&result, human);
            }
        },

        Commands::Search {
            query,
            dir,
            case_sensitive,
            no_recursive,
        } => {
            let result =
                commands::search_notes(settings, query, dir, case_sensitive, no_recursive)?;
            output(&result, human);
        }

        Commands::Index { command } => match command {
            IndexCommands::Regenerate => {
                let result = commands::index_regenerate(settings)?;
                output(&result, human);
            }
        },

        Commands::Prune {
            days,
            dry_run,
            folders,
        } => {
            let result = commands::prune_run(settings, days, dry_run, folders)?;
            output(&result, human);
        }

        Commands::PruneResearch {
            days,
            dry_run,
            phase,
        } => {
            let result = commands::prune_research_run(settings, days, dry_run, phase)?;
            output(&result, human);
        }

        Commands::Tracker { command } => match command {
            TrackerCommands::Show => {
                let result = commands::tracker_show(settings)?;
                output(&result, human);
            }
            TrackerCommands::SetPhase { id } => {
                let result = commands::tracker_set_phase(settings, id)?;
                output(&result, human);
            }
            TrackerCommands::SetSession { id } => {
                let result = commands::tracker_set_session(settings, id)?;
                output(&result, human);
            }
        },

        Commands::Version => {
            let result = commands::version();
            output(&result, human);
        }
    }
    Ok(())
}
