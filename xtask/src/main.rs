use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(author, version, about = "docmark automation commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the docmark test suite through cargo nextest
    Nextest {
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        release: bool,
    },
    /// Run tests with insta and review changed render snapshots
    Snapshots {
        /// Accept every pending snapshot instead of reviewing
        #[arg(long)]
        accept: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Nextest { profile, release } => run_nextest(profile, release),
        Commands::Snapshots { accept } => run_snapshots(accept),
    }
}

fn run_nextest(profile: Option<String>, release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.args(["nextest", "run", "-p", "docmark"]);
    if let Some(profile) = profile {
        cmd.arg("--profile").arg(profile);
    }
    if release {
        cmd.arg("--release");
    }
    run(cmd, "cargo nextest run")
}

fn run_snapshots(accept: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.args(["insta", "test", "-p", "docmark"]);
    cmd.arg(if accept { "--accept" } else { "--review" });
    run(cmd, "cargo insta test")
}

fn run(mut cmd: Command, label: &str) -> Result<()> {
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{label} failed");
    }
    Ok(())
}
