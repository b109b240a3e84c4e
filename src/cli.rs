use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{
    CommandReport, tidy_classify, tidy_execute, tidy_plan, tidy_scan, tidy_status, tidy_summarize,
};

#[derive(Debug, Parser)]
#[command(name = "tidy")]
#[command(about = "Plan and apply a <time-range>/<project>/<category> layout for a legacy file dump", long_about = None)]
pub struct Cli {
    /// Print the command report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Walk the source folder and write the metadata table
    Scan {
        /// Source folder (defaults to [source] folder)
        #[arg(long)]
        source: Option<PathBuf>,
        /// Rows kept in the metadata sample
        #[arg(long)]
        sample_size: Option<usize>,
    },
    /// Build the folder summary, tag vocabulary and overview tree
    Summarize {
        /// Display name of the root folder node
        #[arg(long)]
        root_name: Option<String>,
    },
    /// Ask the classifier for projects and aliases
    Classify,
    /// Build the move plan
    Plan {
        /// Plan configuration to use instead of the saved one
        #[arg(long)]
        manual_config: Option<PathBuf>,
        /// Never call the classifier; fail if no configuration exists
        #[arg(long)]
        no_ai: bool,
        #[arg(long)]
        target_root: Option<PathBuf>,
    },
    /// Apply or revert the move plan
    Execute {
        /// Move files back using the plan copy in the target root
        #[arg(long)]
        revert: bool,
        /// Log what would happen without moving files
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        plan_file: Option<PathBuf>,
        #[arg(long)]
        target_root: Option<PathBuf>,
    },
    /// Show resolved paths and settings
    Status,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report.render());
    }
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Commands::Scan {
            source,
            sample_size,
        } => tidy_scan::run(&tidy_scan::ScanOptions {
            source,
            sample_size,
        })?,
        Commands::Summarize { root_name } => {
            tidy_summarize::run(&tidy_summarize::SummarizeOptions { root_name })?
        }
        Commands::Classify => tidy_classify::run()?,
        Commands::Plan {
            manual_config,
            no_ai,
            target_root,
        } => tidy_plan::run(&tidy_plan::PlanCommandOptions {
            manual_config,
            no_ai,
            target_root,
        })?,
        Commands::Execute {
            revert,
            dry_run,
            plan_file,
            target_root,
        } => tidy_execute::run(&tidy_execute::ExecuteOptions {
            revert,
            dry_run,
            plan_file,
            target_root,
        })?,
        Commands::Status => tidy_status::run()?,
    };

    print_report(&report, cli.json)
}
