//! BashPanel CLI - Command-line interface for the BashPanel daemon

use anyhow::{Context, Result};
use bashpanel_sdk::{BashPanelClient, RunEvent, RunSummary};
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;
use tabled::{Table, Tabled};

const DEFAULT_URL: &str = "ws://127.0.0.1:3001";

/// Exit code used when the remote process died from a signal or never started
const ABNORMAL_EXIT: i32 = 1;

#[derive(Parser)]
#[command(name = "bashpanel-ctl")]
#[command(about = "Run and follow scripts on a BashPanel host", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Daemon WebSocket URL
    #[arg(long, env = "BASHPANEL_URL", default_value = DEFAULT_URL)]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a stored script or a raw command and stream its output
    Run(RunArgs),

    /// Stream the output of a run started elsewhere
    Follow {
        /// Run ID
        run_id: String,
    },

    /// Interrupt a run (SIGINT to its whole process group)
    Kill {
        /// Run ID
        run_id: String,
    },

    /// List live runs
    Ps,

    /// Manage stored scripts
    #[command(subcommand)]
    Scripts(ScriptCommands),
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Print the run id and return without streaming output
    #[arg(short, long)]
    detach: bool,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct TargetArgs {
    /// Stored script name (e.g. deploy or deploy.sh)
    #[arg(short, long)]
    script: Option<String>,

    /// Raw shell command
    #[arg(short, long)]
    command: Option<String>,
}

#[derive(Subcommand)]
enum ScriptCommands {
    /// List stored scripts
    List,

    /// Print a stored script
    Show { name: String },

    /// Upload a local file as a script
    Upload {
        file: PathBuf,

        /// Store under this name instead of the file name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Delete a stored script
    Delete { name: String },
}

#[derive(Tabled)]
struct RunRow {
    run_id: String,
    target: String,
    pgid: i32,
    started: String,
}

impl From<RunSummary> for RunRow {
    fn from(run: RunSummary) -> Self {
        let started = DateTime::from_timestamp_millis(run.created_at)
            .map(|t| {
                t.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| run.created_at.to_string());

        Self {
            run_id: run.run_id,
            target: run.target,
            pgid: run.pgid,
            started,
        }
    }
}

/// Print events until exit, returning the process exit code to mirror
async fn stream_output(client: &BashPanelClient, run_id: &str) -> Result<i32> {
    let mut events = client
        .follow(run_id)
        .await
        .with_context(|| format!("Failed to follow run {}", run_id))?;

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();

    while let Some(event) = events.next().await {
        match event? {
            RunEvent::Stdout { data } => {
                write!(stdout, "{}", data)?;
                stdout.flush()?;
            }
            RunEvent::Stderr { data } => {
                write!(stderr, "{}", data.red())?;
                stderr.flush()?;
            }
            RunEvent::Exit { code, error } => {
                if let Some(error) = error {
                    eprintln!("{} {}", "✗".red().bold(), error.red());
                }
                return Ok(exit_code(code));
            }
        }
    }

    anyhow::bail!("Connection closed before run {} exited", run_id)
}

fn exit_code(code: Option<i32>) -> i32 {
    code.unwrap_or(ABNORMAL_EXIT)
}

fn script_name_for(file: &std::path::Path, name: Option<String>) -> Result<String> {
    match name {
        Some(name) => Ok(name),
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("Cannot derive a script name from {}", file.display())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = BashPanelClient::connect(&cli.url)
        .await
        .context("Failed to connect to daemon")?;

    match cli.command {
        Commands::Run(RunArgs { target, detach }) => {
            let run_id = match (target.script, target.command) {
                (Some(script), _) => client.submit_script(script).await?,
                (None, Some(command)) => client.submit_command(command).await?,
                (None, None) => anyhow::bail!("--script or --command required"),
            };

            eprintln!("{} {}", "run".cyan().bold(), run_id);
            if detach {
                println!("{}", run_id);
                return Ok(());
            }

            let code = stream_output(&client, &run_id).await?;
            std::process::exit(code);
        }

        Commands::Follow { run_id } => {
            let code = stream_output(&client, &run_id).await?;
            std::process::exit(code);
        }

        Commands::Kill { run_id } => {
            client.cancel(&run_id).await?;
            println!("{}", format!("✓ Interrupt sent to run {}", run_id).green().bold());
        }

        Commands::Ps => {
            let runs = client.list_runs().await?;
            if runs.is_empty() {
                println!("{}", "No live runs".yellow());
            } else {
                let rows: Vec<RunRow> = runs.into_iter().map(RunRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Scripts(ScriptCommands::List) => {
            let scripts = client.list_scripts().await?;
            if scripts.is_empty() {
                println!("{}", "No scripts stored".yellow());
            }
            for script in scripts {
                println!("{}", script);
            }
        }

        Commands::Scripts(ScriptCommands::Show { name }) => {
            let script = client.get_script(name).await?;
            print!("{}", script.content);
        }

        Commands::Scripts(ScriptCommands::Upload { file, name }) => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let name = script_name_for(&file, name)?;

            let stored = client.upload_script(name, content).await?;
            println!("{}", format!("✓ Stored as {}", stored).green().bold());
        }

        Commands::Scripts(ScriptCommands::Delete { name }) => {
            let deleted = client.delete_script(name).await?;
            println!("{}", format!("✓ Deleted {}", deleted).green().bold());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_run_requires_exactly_one_target() {
        assert!(Cli::try_parse_from(["bashpanel-ctl", "run"]).is_err());
        assert!(Cli::try_parse_from(["bashpanel-ctl", "run", "-s", "a", "-c", "ls"]).is_err());

        let cli = Cli::try_parse_from(["bashpanel-ctl", "run", "--command", "ls", "-d"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.target.command.as_deref(), Some("ls"));
                assert!(args.detach);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_scripts_subcommands_parse() {
        let cli = Cli::try_parse_from([
            "bashpanel-ctl",
            "--url",
            "ws://box:3001",
            "scripts",
            "upload",
            "./deploy.sh",
            "--name",
            "prod-deploy",
        ])
        .unwrap();
        assert_eq!(cli.url, "ws://box:3001");
        assert!(matches!(
            cli.command,
            Commands::Scripts(ScriptCommands::Upload { name: Some(ref n), .. }) if n == "prod-deploy"
        ));
    }

    #[test]
    fn test_script_name_defaults_to_file_name() {
        assert_eq!(
            script_name_for(Path::new("/tmp/backup.sh"), None).unwrap(),
            "backup.sh"
        );
        assert_eq!(
            script_name_for(Path::new("/tmp/backup.sh"), Some("nightly".to_string())).unwrap(),
            "nightly"
        );
    }

    #[test]
    fn test_exit_code_mirrors_remote() {
        assert_eq!(exit_code(Some(0)), 0);
        assert_eq!(exit_code(Some(3)), 3);
        assert_eq!(exit_code(None), ABNORMAL_EXIT);
    }
}
