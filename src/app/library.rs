use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app::locks::ChapterLocks;
use crate::app::store::NovelStore;
use crate::epub::{self, IngestRequest};
use crate::error::Error;
use crate::formats::{ChapterRecord, ChapterSummary, NovelRecord, TranslationCommit, TranslationStatus};
use crate::translate::Translator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub novel: NovelRecord,
    pub chapter_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterTranslation {
    pub novel_id: String,
    pub chapter_number: u32,
    pub translated_text: String,
    pub model_used: String,
    pub cached: bool,
}

/// Novel and chapter operations over a store, plus on-demand translation.
pub struct Library {
    store: Arc<dyn NovelStore>,
    translator: Option<Arc<Translator>>,
    locks: ChapterLocks,
}

impl Library {
    pub fn new(store: Arc<dyn NovelStore>) -> Self {
        Self {
            store,
            translator: None,
            locks: ChapterLocks::new(),
        }
    }

    pub fn with_translator(mut self, translator: Arc<Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub async fn ingest_archive(
        &self,
        bytes: Vec<u8>,
        request: IngestRequest,
    ) -> Result<IngestSummary, Error> {
        let ingested = tokio::task::spawn_blocking(move || epub::ingest(&bytes, &request))
            .await
            .context("join ingest task")?
            .inspect_err(|err| {
                if err.is_rejected_archive() {
                    tracing::warn!(error = %err, "rejected epub upload");
                }
            })?;

        self.store
            .create_novel(&ingested.novel, &ingested.chapters)
            .await
            .context("store ingested novel")?;

        Ok(IngestSummary {
            chapter_count: ingested.chapters.len(),
            novel: ingested.novel,
        })
    }

    pub async fn list_novels(&self) -> Result<Vec<NovelRecord>, Error> {
        Ok(self.store.list_novels().await.context("list novels")?)
    }

    pub async fn get_novel(&self, novel_id: &str) -> Result<NovelRecord, Error> {
        self.store
            .get_novel(novel_id)
            .await
            .context("load novel")?
            .ok_or_else(|| Error::NovelNotFound(novel_id.to_owned()))
    }

    pub async fn delete_novel(&self, novel_id: &str) -> Result<(), Error> {
        let deleted = self
            .store
            .delete_novel(novel_id)
            .await
            .context("delete novel")?;
        if !deleted {
            return Err(Error::NovelNotFound(novel_id.to_owned()));
        }
        tracing::info!(novel_id, "novel deleted");
        Ok(())
    }

    pub async fn list_chapters(&self, novel_id: &str) -> Result<Vec<ChapterSummary>, Error> {
        let chapters = self.load_chapters(novel_id).await?;
        Ok(chapters.iter().map(ChapterRecord::summary).collect())
    }

    pub async fn translation_status(&self, novel_id: &str) -> Result<Vec<TranslationStatus>, Error> {
        let chapters = self.load_chapters(novel_id).await?;
        Ok(chapters
            .iter()
            .map(ChapterRecord::translation_status)
            .collect())
    }

    pub async fn get_chapter(
        &self,
        novel_id: &str,
        chapter_number: u32,
    ) -> Result<ChapterRecord, Error> {
        self.store
            .get_chapter(novel_id, chapter_number)
            .await
            .context("load chapter")?
            .ok_or_else(|| Error::ChapterNotFound {
                novel_id: novel_id.to_owned(),
                chapter_number,
            })
    }

    /// Translates a chapter at most once and commits the result.
    ///
    /// Calls for the same chapter are serialized, within this process by
    /// `ChapterLocks` and across processes by the store's chapter lease; a
    /// later call sees the committed text and returns it without contacting
    /// any model.
    pub async fn translate_chapter(
        &self,
        novel_id: &str,
        chapter_number: u32,
    ) -> Result<ChapterTranslation, Error> {
        let translator = self
            .translator
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no translation engine configured"))?;

        let novel = self.get_novel(novel_id).await?;
        let _guard = self.locks.acquire(&novel.id, chapter_number).await;
        let _lease = self
            .store
            .lease_chapter(&novel.id, chapter_number, translator.time_budget())
            .await
            .context("lease chapter")?;
        let chapter = self.get_chapter(&novel.id, chapter_number).await?;

        let translation = translator
            .translate(&chapter, &novel.source_language)
            .await?;
        if translation.cached {
            return Ok(ChapterTranslation {
                novel_id: novel.id,
                chapter_number,
                translated_text: translation.text,
                model_used: translation.model,
                cached: true,
            });
        }

        let commit = TranslationCommit {
            text: translation.text,
            model: translation.model,
            translated_at: Utc::now(),
        };
        let stored = self
            .store
            .commit_translation(&novel.id, chapter_number, &commit)
            .await
            .context("commit translation")?
            .ok_or_else(|| Error::ChapterNotFound {
                novel_id: novel.id.clone(),
                chapter_number,
            })?;

        // The store keeps the first committed translation.
        let (Some(text), Some(model)) = (stored.translated_content, stored.translation_model)
        else {
            return Err(anyhow::anyhow!("translation commit did not persist").into());
        };
        Ok(ChapterTranslation {
            novel_id: novel.id,
            chapter_number,
            translated_text: text,
            model_used: model,
            cached: false,
        })
    }

    async fn load_chapters(&self, novel_id: &str) -> Result<Vec<ChapterRecord>, Error> {
        let novel = self.get_novel(novel_id).await?;
        Ok(self
            .store
            .list_chapters(&novel.id)
            .await
            .context("list chapters")?)
    }
}
