//! EPUB ingestion: zip container, package document, spine walk, and text cleanup.

pub mod archive;
pub mod chapter;
pub mod container;
pub mod ingest;
pub mod package;
pub mod sanitize;

pub use ingest::{IngestRequest, IngestedNovel, MAX_ARCHIVE_BYTES, MIN_CHAPTER_CHARS, ingest};
