use crate::buffer::{Position, Selection};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stream LLM completions into a file at the cursor
#[derive(Debug, Parser)]
#[command(name = "cursorllm")]
#[command(version)]
#[command(about = "Stream LLM completions into a file at the cursor", long_about = None)]
pub struct Args {
    /// Config file (default: <config dir>/config.toml)
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Continue the text at the cursor
    Suggest(EditArgs),

    /// Replace the selection with a rewrite from the model
    Change(EditArgs),

    /// Print the resolved configuration as TOML
    Config,
}

#[derive(Debug, clap::Args)]
pub struct EditArgs {
    /// File to edit
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: PathBuf,

    /// Cursor position, LINE:COL (1-based). Defaults to the end of the file.
    #[arg(long = "cursor", value_name = "LINE:COL")]
    pub cursor: Option<Position>,

    /// Visual selection, LINE:COL..LINE:COL
    #[arg(long = "select", value_name = "RANGE")]
    pub select: Option<Selection>,

    /// Also send the text after the cursor
    #[arg(long = "after-cursor")]
    pub after_cursor: bool,

    /// Write the edited buffer back instead of printing the completion
    #[arg(long = "in-place")]
    pub in_place: bool,

    /// Model name
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Provider wire style: "anthropic" or "openai"
    #[arg(long = "style")]
    pub style: Option<String>,

    /// Endpoint URL
    #[arg(long = "url")]
    pub url: Option<String>,
}
