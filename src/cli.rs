use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::formats::SourceLanguage;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Split an EPUB into chapters and store them.
    Ingest(IngestArgs),
    /// List stored novels, newest first.
    Novels(DataDirArgs),
    /// List the chapters of a novel.
    Chapters(NovelArgs),
    /// Print one chapter.
    Chapter(ChapterArgs),
    /// Translate one chapter (at most once; later calls return the stored text).
    Translate(TranslateArgs),
    /// Per-chapter translation status of a novel.
    Status(NovelArgs),
    /// Delete a novel and all of its chapters.
    Delete(NovelArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Google Gemini `generateContent` API (`GEMINI_API_KEY`).
    Gemini,
    /// External command: prompt on stdin, translation on stdout.
    Command,
}

#[derive(Debug, Clone, Args)]
pub struct DataDirArgs {
    /// Directory holding stored novels.
    #[arg(long, default_value = "novelify-data")]
    pub data_dir: String,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub data: DataDirArgs,

    /// Input EPUB file.
    #[arg(long)]
    pub epub: String,

    /// Language the novel is written in.
    #[arg(long, value_enum, default_value_t = SourceLanguage::Chinese)]
    pub language: SourceLanguage,

    /// Overrides the author from the package metadata.
    #[arg(long)]
    pub author: Option<String>,

    /// Overrides the description from the package metadata.
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Args)]
pub struct NovelArgs {
    #[command(flatten)]
    pub data: DataDirArgs,

    #[arg(long)]
    pub novel_id: String,
}

#[derive(Debug, Args)]
pub struct ChapterArgs {
    #[command(flatten)]
    pub data: DataDirArgs,

    #[arg(long)]
    pub novel_id: String,

    /// 1-based chapter number.
    #[arg(long)]
    pub number: u32,

    /// Print the translated text instead of the original.
    #[arg(long, default_value_t = false)]
    pub translated: bool,
}

#[derive(Debug, Args)]
pub struct TranslateArgs {
    #[command(flatten)]
    pub data: DataDirArgs,

    #[arg(long)]
    pub novel_id: String,

    /// 1-based chapter number.
    #[arg(long)]
    pub number: u32,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Debug, Clone, Args)]
pub struct EngineArgs {
    #[arg(long, value_enum, default_value_t = Engine::Gemini)]
    pub engine: Engine,

    /// Model identifiers in priority order (repeat the flag).
    #[arg(long = "model", default_values_t = crate::translate::default_models())]
    pub models: Vec<String>,

    #[arg(long, default_value = crate::gemini::DEFAULT_BASE_URL)]
    pub gemini_base_url: String,

    /// Time budget for a single model attempt.
    #[arg(long, default_value_t = 120)]
    pub attempt_timeout_secs: u64,

    #[arg(long, default_value_t = 0.3)]
    pub temperature: f32,

    #[arg(long, default_value_t = 0.8)]
    pub top_p: f32,

    #[arg(long, default_value_t = 40)]
    pub top_k: u32,

    #[arg(long, default_value_t = 8192)]
    pub max_output_tokens: u32,

    /// Translator program (required when --engine=command).
    #[arg(long)]
    pub command: Option<String>,

    /// Arguments passed to the translator program.
    #[arg(last = true)]
    pub command_args: Vec<String>,
}
