//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::models::EmotionTone;

#[derive(Parser)]
#[command(name = "emoji-retrieval")]
#[command(about = "Semantic emoji retrieval with priority re-ranking", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a YAML config file (defaults to emoji-retrieval.yaml in the
    /// working directory)
    #[arg(short, long, global = true, env = "EMOJI_RETRIEVAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank the best-matching emojis for a piece of text
    Rank(RankArgs),

    /// Compute embeddings for stored candidates
    Vectorize(VectorizeArgs),

    /// Import candidates from a JSON array file
    Import(ImportArgs),

    /// Export stored candidates to a JSON array file
    Export(ExportArgs),

    /// Show store, cache and circuit breaker status
    Status,
}

#[derive(Args, Debug)]
pub struct RankArgs {
    /// Text to match against candidate descriptions
    pub text: String,

    /// Maximum number of matches (defaults to retrieval.default_limit)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Only consider candidates with this emotion tone
    #[arg(short, long)]
    pub emotion_tone: Option<EmotionTone>,

    /// Only consider candidates in this category
    #[arg(long)]
    pub category: Option<String>,

    /// Only consider candidates for this usage scene
    #[arg(long)]
    pub usage_scene: Option<String>,

    /// Overall time budget for the request in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VectorizeArgs {
    /// Recompute embeddings for candidates that already have one
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file containing an array of candidates
    pub file: PathBuf,

    /// Vectorize the imported candidates that have no embedding yet
    #[arg(long)]
    pub vectorize: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Destination JSON file (overwritten if it exists)
    pub file: PathBuf,

    /// Include stored embeddings in the output
    #[arg(long)]
    pub with_embeddings: bool,
}
