use thiserror::Error;

use crate::translate::TranslationAttempt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("invalid container descriptor: {0}")]
    InvalidContainer(String),

    #[error("invalid package document: {0}")]
    InvalidPackageDocument(String),

    #[error("archive is too large: {size} bytes (limit {limit})")]
    ArchiveTooLarge { size: usize, limit: usize },

    /// Per-chapter failure. Logged and skipped during ingestion, never returned from it.
    #[error("chapter at spine position {spine_index} skipped ({path}): {reason}")]
    ChapterExtractionSkipped {
        spine_index: usize,
        path: String,
        reason: String,
    },

    #[error("all {} translation models failed", attempts.len())]
    AllModelsExhausted { attempts: Vec<TranslationAttempt> },

    #[error("novel not found: {0}")]
    NovelNotFound(String),

    #[error("chapter not found: novel={novel_id}, chapter={chapter_number}")]
    ChapterNotFound {
        novel_id: String,
        chapter_number: u32,
    },

    #[error("unsupported source language: {0:?} (expected chinese, japanese or korean)")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// True for failures caused by the uploaded archive itself.
    pub fn is_rejected_archive(&self) -> bool {
        matches!(
            self,
            Error::CorruptArchive(_)
                | Error::InvalidContainer(_)
                | Error::InvalidPackageDocument(_)
                | Error::ArchiveTooLarge { .. }
        )
    }
}
