mod fixtures;
mod gemini_stub;

use std::sync::Arc;
use std::time::Duration;

use gemini_stub::{API_KEY, GeminiStub};
use novelify::Error;
use novelify::app::library::Library;
use novelify::app::store::LocalFsNovelStore;
use novelify::epub::IngestRequest;
use novelify::formats::SourceLanguage;
use novelify::gemini::GeminiGenerator;
use novelify::translate::{Translator, default_models};

async fn library_for(stub: &GeminiStub, dir: &tempfile::TempDir) -> (Library, String) {
    let generator = GeminiGenerator::new(&stub.base_url, API_KEY.to_owned(), Duration::from_secs(10))
        .expect("gemini generator");
    let translator = Translator::new(Arc::new(generator), default_models()).expect("translator");
    let library = Library::new(Arc::new(LocalFsNovelStore::new(dir.path())))
        .with_translator(Arc::new(translator));
    let summary = library
        .ingest_archive(
            fixtures::sample_novel(),
            IngestRequest::new(SourceLanguage::Chinese),
        )
        .await
        .expect("ingest");
    (library, summary.novel.id)
}

#[tokio::test]
async fn first_model_failure_falls_back_to_second() {
    let stub = GeminiStub::spawn(&["gemini-2.0-flash-exp"]);
    let dir = tempfile::tempdir().expect("tempdir");
    let (library, novel_id) = library_for(&stub, &dir).await;

    let translation = library
        .translate_chapter(&novel_id, 3)
        .await
        .expect("translate");
    assert_eq!(translation.model_used, "gemini-1.5-pro");
    assert_eq!(
        translation.translated_text,
        "[gemini-1.5-pro] translated: 第一章 陨落"
    );
    assert_eq!(
        stub.requested_models(),
        vec!["gemini-2.0-flash-exp", "gemini-1.5-pro"]
    );

    let again = library
        .translate_chapter(&novel_id, 3)
        .await
        .expect("translate again");
    assert!(again.cached);
    assert_eq!(again.model_used, "gemini-1.5-pro");
    assert_eq!(stub.requested_models().len(), 2);
}

#[tokio::test]
async fn every_model_failing_reports_each_attempt() {
    let stub = GeminiStub::spawn(&[
        "gemini-2.0-flash-exp",
        "gemini-1.5-pro",
        "gemini-1.5-flash",
        "gemini-1.0-pro",
    ]);
    let dir = tempfile::tempdir().expect("tempdir");
    let (library, novel_id) = library_for(&stub, &dir).await;

    let err = library.translate_chapter(&novel_id, 1).await.unwrap_err();
    let Error::AllModelsExhausted { attempts } = err else {
        panic!("expected AllModelsExhausted");
    };
    assert_eq!(attempts.len(), 4);
    let first_error = &attempts[0].error;
    assert!(first_error.contains("gemini-2.0-flash-exp is overloaded"), "{first_error}");
    assert_eq!(stub.requested_models(), default_models());

    let chapter = library.get_chapter(&novel_id, 1).await.expect("chapter");
    assert!(!chapter.is_translated);
}
