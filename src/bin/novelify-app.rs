use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use novelify::app::http::{AppState, router};
use novelify::app::library::Library;
use novelify::app::store::{LocalFsNovelStore, NovelStore};
use novelify::cli::EngineArgs;
use novelify::translate::Translator;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    #[arg(long, default_value = "novelify-data")]
    data_dir: PathBuf,

    #[command(flatten)]
    engine: EngineArgs,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    novelify::logging::init("info,tower_http=info")?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting novelify-app");

    let store: Arc<dyn NovelStore> = Arc::new(LocalFsNovelStore::new(&args.data_dir));
    let translator = Translator::from_engine_args(&args.engine).context("configure translator")?;
    let library = Library::new(store).with_translator(Arc::new(translator));

    let app = router(AppState {
        library: Arc::new(library),
    });

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
