use chrono::Utc;

use crate::epub::archive::Archive;
use crate::epub::sanitize::{derive_title, sanitize};
use crate::epub::{chapter, container, package};
use crate::error::Error;
use crate::formats::{ChapterRecord, NovelRecord, SourceLanguage};

/// Uploads above this size are rejected before any parsing.
pub const MAX_ARCHIVE_BYTES: usize = 50 * 1024 * 1024;

/// Chapters whose sanitized text is not longer than this are dropped.
pub const MIN_CHAPTER_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub source_language: SourceLanguage,
    pub author: Option<String>,
    pub description: Option<String>,
    pub file_name: Option<String>,
}

impl IngestRequest {
    pub fn new(source_language: SourceLanguage) -> Self {
        Self {
            source_language,
            author: None,
            description: None,
            file_name: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestedNovel {
    pub novel: NovelRecord,
    pub chapters: Vec<ChapterRecord>,
}

pub fn ingest(buffer: &[u8], request: &IngestRequest) -> Result<IngestedNovel, Error> {
    if buffer.len() > MAX_ARCHIVE_BYTES {
        return Err(Error::ArchiveTooLarge {
            size: buffer.len(),
            limit: MAX_ARCHIVE_BYTES,
        });
    }

    let mut archive = Archive::open(buffer)?;
    tracing::debug!(entries = archive.len(), bytes = buffer.len(), "opened epub archive");
    let package_path = container::resolve(&mut archive)?;
    let package = package::parse(&mut archive, &package_path)?;
    let raw_chapters = chapter::extract_all(&mut archive, &package);

    let novel_id = uuid::Uuid::new_v4().to_string();
    let spine_len = package.spine.len();

    let mut chapters: Vec<ChapterRecord> = Vec::with_capacity(raw_chapters.len());
    for raw in raw_chapters {
        let content = sanitize(&raw.raw_markup);
        if content.chars().count() <= MIN_CHAPTER_CHARS {
            tracing::debug!(
                spine_index = raw.spine_index,
                path = %raw.resource_path,
                "chapter below minimum content length; skipping"
            );
            continue;
        }

        let position = chapters.len() + 1;
        let title = derive_title(&raw.raw_markup, position);
        let chapter_number = u32::try_from(position).map_err(|_| {
            Error::InvalidPackageDocument(format!("too many chapters: {position}"))
        })?;
        chapters.push(ChapterRecord::new(&novel_id, chapter_number, title, content));
    }

    let metadata = package.metadata;
    let novel = NovelRecord {
        id: novel_id,
        title: metadata.title,
        source_language: request.source_language.as_str().to_owned(),
        author: non_blank(request.author.as_deref()).unwrap_or(metadata.creator),
        description: non_blank(request.description.as_deref()).unwrap_or(metadata.description),
        file_name: non_blank(request.file_name.as_deref()),
        uploaded_at: Utc::now(),
        total_chapters: chapters.len(),
    };

    tracing::info!(
        novel_id = %novel.id,
        title = %novel.title,
        spine_items = spine_len,
        chapters = novel.total_chapters,
        "ingested epub"
    );

    Ok(IngestedNovel { novel, chapters })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    (!value.is_empty()).then(|| value.to_owned())
}
