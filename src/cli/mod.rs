// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::assistant::Assistant;
use crate::tools::InvocationStatus;
use crate::vision::report::analysis_report;
use crate::vision::DetectOptions;

/// Desk assistant core CLI
#[derive(Parser, Debug)]
#[command(name = "desk-assistant")]
#[command(version)]
#[command(about = "Local tools, vision models and camera for a desk assistant", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered tools
    Tools,

    /// Call one tool as a single turn and print its output and history
    Call(CallArgs),

    /// Detect objects in an image
    Detect(DetectArgs),

    /// Inspect or reload local vision models
    #[command(subcommand)]
    Models(ModelsCommand),
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Tool name
    pub name: String,

    /// Tool input as a JSON object
    #[arg(long, default_value = "{}")]
    pub input: String,

    /// Session id used for confirmations
    #[arg(long, default_value = "cli", env = "ASSISTANT_SESSION")]
    pub session: String,
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Image file
    pub image: PathBuf,

    /// Model id; defaults to the best loaded tier
    #[arg(long)]
    pub model: Option<String>,

    /// Confidence threshold in 0.0-1.0
    #[arg(long, default_value_t = 0.5)]
    pub confidence: f32,

    /// Draw boxes and labels and save the annotated image
    #[arg(long)]
    pub annotate: bool,

    /// Print the result as JSON instead of a report
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Catalog entries and their availability
    List,
    /// Loaded models and catalog totals
    Info,
    /// Rescan the models directory and reload
    Reload,
}

/// Execute CLI command
pub async fn execute(cli: Cli, assistant: &Assistant) -> Result<()> {
    match cli.command {
        Commands::Tools => {
            for tool in assistant.list_tools() {
                println!("{:<20} {}", tool.name, tool.description);
            }
            Ok(())
        }
        Commands::Call(args) => call(args, assistant).await,
        Commands::Detect(args) => detect(args, assistant).await,
        Commands::Models(command) => models(command, assistant).await,
    }
}

async fn call(args: CallArgs, assistant: &Assistant) -> Result<()> {
    let input: serde_json::Value =
        serde_json::from_str(&args.input).context("--input must be valid JSON")?;

    let turn = assistant.begin_turn(&args.session);
    let outcome = assistant.call_tool(&turn, &args.name, &input).await;

    println!("{}", outcome.output);
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&assistant.tool_call_history(&turn))?
    );

    if outcome.status == InvocationStatus::Failed {
        anyhow::bail!("tool {} failed", args.name);
    }
    Ok(())
}

async fn detect(args: DetectArgs, assistant: &Assistant) -> Result<()> {
    let options = if args.annotate {
        DetectOptions::annotated()
    } else {
        DetectOptions::default()
    };

    let result = assistant
        .detect_objects(&args.image, args.confidence, args.model.as_deref(), options)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", analysis_report(&args.image, &result));
    }
    Ok(())
}

async fn models(command: ModelsCommand, assistant: &Assistant) -> Result<()> {
    let json = match command {
        ModelsCommand::List => serde_json::to_string_pretty(&assistant.list_models())?,
        ModelsCommand::Info => serde_json::to_string_pretty(&assistant.model_info())?,
        ModelsCommand::Reload => {
            let report = assistant.reload_models().await;
            let json = serde_json::to_string_pretty(&report)?;
            if !report.success {
                println!("{}", json);
                anyhow::bail!(
                    "reload failed: {}",
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
            json
        }
    };
    println!("{}", json);
    Ok(())
}
