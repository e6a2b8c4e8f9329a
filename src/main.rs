use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;
use serde::Serialize;

use novelify::app::library::Library;
use novelify::app::store::LocalFsNovelStore;
use novelify::cli::{ChapterArgs, Cli, Command, DataDirArgs, IngestArgs};
use novelify::epub::IngestRequest;
use novelify::translate::Translator;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    novelify::logging::init(novelify::logging::DEFAULT_DIRECTIVE).context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Ingest(args) => ingest(args).await.context("ingest")?,
        Command::Novels(args) => {
            let novels = library(&args).list_novels().await?;
            print_json(&novels)?;
        }
        Command::Chapters(args) => {
            let chapters = library(&args.data).list_chapters(&args.novel_id).await?;
            print_json(&chapters)?;
        }
        Command::Chapter(args) => chapter(args).await?,
        Command::Translate(args) => {
            let translator =
                Translator::from_engine_args(&args.engine).context("configure translator")?;
            let translation = library(&args.data)
                .with_translator(Arc::new(translator))
                .translate_chapter(&args.novel_id, args.number)
                .await
                .context("translate")?;
            print_json(&translation)?;
        }
        Command::Status(args) => {
            let status = library(&args.data)
                .translation_status(&args.novel_id)
                .await?;
            print_json(&status)?;
        }
        Command::Delete(args) => {
            library(&args.data).delete_novel(&args.novel_id).await?;
        }
    }

    Ok(())
}

fn library(args: &DataDirArgs) -> Library {
    Library::new(Arc::new(LocalFsNovelStore::new(&args.data_dir)))
}

async fn ingest(args: IngestArgs) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.epub)
        .await
        .with_context(|| format!("read epub: {}", args.epub))?;
    let file_name = std::path::Path::new(&args.epub)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let mut request = IngestRequest::new(args.language);
    request.author = args.author;
    request.description = args.description;
    request.file_name = file_name;

    let summary = library(&args.data).ingest_archive(bytes, request).await?;
    print_json(&summary)
}

async fn chapter(args: ChapterArgs) -> anyhow::Result<()> {
    let chapter = library(&args.data)
        .get_chapter(&args.novel_id, args.number)
        .await?;
    if !args.translated {
        println!("{}", chapter.original_content);
        return Ok(());
    }
    let Some(text) = chapter.translated_content else {
        anyhow::bail!(
            "chapter {} of novel {} is not translated yet",
            args.number,
            args.novel_id
        );
    };
    println!("{text}");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{json}");
    Ok(())
}
