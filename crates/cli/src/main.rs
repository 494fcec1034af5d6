mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ensconce_lib::config::Settings;
use ensconce_lib::deploy::{DeployError, EXIT_STAGE_FAILED};

use cmd::{DeployOptions, cmd_deploy, cmd_finalise, cmd_render, cmd_scan};
use output::{OutputFormat, print_error};

#[derive(Parser)]
#[command(name = "ensconce")]
#[command(author, version, about = "Deployment directory lifecycle manager", long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Only report warnings and errors
  #[arg(short, long, global = true, conflicts_with = "verbose")]
  quiet: bool,

  /// JSON file of extra tags, merged over the environment
  #[arg(long, global = true, value_name = "PATH")]
  tags_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Scan for drift, replace or copy target directories, then finalise them
  Deploy(DeployArgs),

  /// Report changes made since directories below ROOT were last finalised
  Scan {
    /// Directory tree to search for finalised directories
    root: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Record the current contents of directories as their new baseline
  Finalise {
    /// Target directories; may contain tags and `;`-separated lists
    #[arg(short = 't', long = "target", value_name = "DIRS", required = true)]
    targets: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Render `{{ Tag }}` placeholders from standard input to standard output
  Render,
}

#[derive(Args)]
struct DeployArgs {
  /// Check directories below ROOT for drift before deploying
  #[arg(long, value_name = "ROOT")]
  scan: Option<PathBuf>,

  /// Target directories; may contain tags and `;`-separated lists
  #[arg(short = 't', long = "target", value_name = "DIRS")]
  targets: Vec<String>,

  /// Deployment source directory
  #[arg(short = 'f', long = "from", value_name = "DIR")]
  from: Option<PathBuf>,

  /// Back up, stop services and processes, delete, then copy the source
  #[arg(long)]
  replace: bool,

  /// Copy the source over the existing target contents
  #[arg(long)]
  copy: bool,

  /// Record a new baseline for each target afterwards
  #[arg(long)]
  finalise: bool,

  /// Skip the backup archive
  #[arg(long)]
  no_backup: bool,

  /// Output format
  #[arg(short, long, value_enum, default_value_t)]
  output: OutputFormat,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(&cli);
  output::set_quiet(cli.quiet);

  match run(cli) {
    Ok(code) => ExitCode::from(code),
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::from(
        e.downcast_ref::<DeployError>()
          .map_or(EXIT_STAGE_FAILED, DeployError::exit_code),
      )
    }
  }
}

fn run(cli: Cli) -> Result<u8> {
  let settings = Settings::from_env();
  let tags_file = cli.tags_file.or(settings.tags_file.clone());

  match cli.command {
    Commands::Deploy(args) => cmd_deploy(
      DeployOptions {
        scan_root: args.scan,
        targets: args.targets,
        source: args.from,
        replace: args.replace,
        copy: args.copy,
        finalise: args.finalise,
        backups: settings.backups && !args.no_backup,
        output: args.output,
      },
      tags_file.as_deref(),
    ),
    Commands::Scan { root, output } => cmd_scan(&root, output),
    Commands::Finalise { targets, output } => cmd_finalise(&targets, tags_file.as_deref(), output),
    Commands::Render => cmd_render(tags_file.as_deref()),
  }
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(cli: &Cli) {
  let level = match (&cli.command, cli.verbose, cli.quiet) {
    (Commands::Render, _, _) | (_, _, true) => "warn",
    (_, true, _) => "debug",
    _ => "info",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}
