//! # gvend CLI Entry Point
//!
//! This is the main executable for the `gvend` command-line tool.
//! It parses CLI arguments using clap and routes commands to the handlers in
//! [`gvend::deps`]. One download cache lives for the whole invocation and is
//! flushed before exit, whatever the command's outcome.
//!
//! ## Command Structure
//!
//! - **Vendoring**: `fetch`, `update`, `delete`, `purge`
//! - **Manifest**: `list`, `freeze`, `restore` (alias `rebuild`)
//! - **Shell**: `completion`

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use env_logger::Env;
use std::sync::Arc;

use gvend::config::Workspace;
use gvend::deps::{self, DeleteOptions, FetchOptions, Fetcher, RestoreOptions};
use gvend::downloader::Downloader;
use gvend::vcs::VcsResolver;

#[derive(Parser)]
#[command(name = "gvend")]
#[command(about = "Vendor remote Go packages with pinned provenance", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log cache and resolver decisions (GVEND_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a remote package and its dependencies into vendor/
    Fetch {
        /// Import path, optionally with a scheme (https://, ssh://, ...)
        importpath: String,
        /// Branch of the repository to use
        #[arg(long, default_value = "")]
        branch: String,
        /// Tag of the repository to use
        #[arg(long, default_value = "", conflicts_with = "revision")]
        tag: String,
        /// Revision of the repository to use
        #[arg(long, default_value = "")]
        revision: String,
        /// Do not fetch dependencies recursively
        #[arg(long)]
        no_recurse: bool,
        /// Allow the use of insecure protocols
        #[arg(long)]
        precaire: bool,
        /// Include test files
        #[arg(short = 't')]
        tests: bool,
        /// Include all files, not only those needed to build
        #[arg(short = 'a')]
        all: bool,
    },
    /// Update dependencies to the tip of their branch
    Update {
        importpath: Option<String>,
        /// Update every dependency in the manifest
        #[arg(long)]
        all: bool,
        /// Do not fetch newly required dependencies
        #[arg(long)]
        no_recurse: bool,
        /// Allow the use of insecure protocols
        #[arg(long)]
        precaire: bool,
    },
    /// Remove dependencies from the manifest and vendor/
    Delete {
        importpath: Option<String>,
        /// Remove every dependency
        #[arg(long)]
        all: bool,
        /// Also remove dependencies below the import path
        #[arg(long)]
        recurse: bool,
    },
    /// List vendored dependencies
    List {
        /// Output template, e.g. '{{.Importpath}} {{.Revision}}'
        #[arg(short = 'f', long = "format", default_value = deps::DEFAULT_FORMAT)]
        format: String,
        /// Only dependencies no project file imports
        #[arg(long)]
        orphan: bool,
    },
    /// Download every dependency listed in the manifest
    #[command(alias = "rebuild")]
    Restore {
        /// Allow the use of insecure protocols
        #[arg(long)]
        precaire: bool,
        /// Parallel downloads [default: 8, or restore.connections in gvend.toml]
        #[arg(long)]
        connections: Option<usize>,
    },
    /// Remove dependencies nothing in the project imports
    Purge,
    /// Pin dependencies so update leaves them alone
    Freeze {
        importpath: Option<String>,
        /// Freeze every dependency
        #[arg(long)]
        all: bool,
    },
    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn run(command: &Commands, ws: &Workspace, dl: &Downloader) -> Result<()> {
    match command {
        Commands::Fetch {
            importpath,
            branch,
            tag,
            revision,
            no_recurse,
            precaire,
            tests,
            all,
        } => {
            let opts = FetchOptions {
                branch: branch.clone(),
                tag: tag.clone(),
                revision: revision.clone(),
                no_recurse: *no_recurse,
                insecure: *precaire,
                tests: *tests,
                all: *all,
            };
            Fetcher::new(ws, dl)
                .fetch(importpath, &opts)
                .with_context(|| format!("fetch {importpath}"))?;
            println!("{} Vendored {}", "✓".green(), importpath.bold());
            Ok(())
        }
        Commands::Update {
            importpath,
            all,
            no_recurse,
            precaire,
        } => {
            let opts = FetchOptions {
                no_recurse: *no_recurse,
                insecure: *precaire,
                ..Default::default()
            };
            println!("{} Checking for updates...", "📦".blue());
            deps::update_dependencies(ws, dl, importpath.as_deref(), *all, &opts)?;
            println!("{} Dependencies updated.", "✓".green());
            Ok(())
        }
        Commands::Delete {
            importpath,
            all,
            recurse,
        } => {
            let opts = DeleteOptions {
                all: *all,
                recurse: *recurse,
            };
            deps::delete_dependencies(ws, importpath.as_deref(), opts)?;
            Ok(())
        }
        Commands::List { format, orphan } => {
            for line in deps::list_dependencies(ws, format, *orphan)? {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Restore {
            precaire,
            connections,
        } => {
            let opts = RestoreOptions {
                insecure: *precaire,
                connections: connections.unwrap_or(ws.config.restore.connections),
            };
            deps::restore(ws, dl, &opts)?;
            Ok(())
        }
        Commands::Purge => {
            deps::purge_dependencies(ws)?;
            Ok(())
        }
        Commands::Freeze { importpath, all } => {
            deps::freeze_dependencies(ws, importpath.as_deref(), *all)?;
            Ok(())
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::new().filter_or("GVEND_LOG", default_level)).init();

    let dl = Downloader::new(Arc::new(VcsResolver));
    let result = std::env::current_dir()
        .context("Failed to read the current directory")
        .and_then(|root| Workspace::discover(&root))
        .and_then(|ws| run(&cli.command, &ws, &dl));

    // checkouts are removed even when the command failed
    let flushed = dl.flush();
    let result = match (result, flushed) {
        (Ok(()), Err(e)) => Err(anyhow::Error::new(e).context("Failed to remove temporary checkouts")),
        (result, _) => result,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "x".red(), e);
        std::process::exit(1);
    }
}
