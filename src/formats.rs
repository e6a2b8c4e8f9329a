use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceLanguage {
    Chinese,
    Japanese,
    Korean,
}

impl SourceLanguage {
    /// Fallback for stored values that are not one of the recognized languages.
    pub const DEFAULT: SourceLanguage = SourceLanguage::Chinese;

    pub fn as_str(self) -> &'static str {
        match self {
            SourceLanguage::Chinese => "chinese",
            SourceLanguage::Japanese => "japanese",
            SourceLanguage::Korean => "korean",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SourceLanguage::Chinese => "Chinese",
            SourceLanguage::Japanese => "Japanese",
            SourceLanguage::Korean => "Korean",
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceLanguage {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chinese" => Ok(SourceLanguage::Chinese),
            "japanese" => Ok(SourceLanguage::Japanese),
            "korean" => Ok(SourceLanguage::Korean),
            _ => Err(Error::UnsupportedLanguage(raw.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NovelRecord {
    pub id: String,
    pub title: String,
    /// Stored as text; see [`crate::translate::prompt_language`] for how
    /// unrecognized values are treated at translation time.
    pub source_language: String,
    pub author: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub total_chapters: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub novel_id: String,
    pub chapter_number: u32,
    pub title: String,
    pub original_content: String,
    pub translated_content: Option<String>,
    pub is_translated: bool,
    pub translated_at: Option<DateTime<Utc>>,
    pub translation_model: Option<String>,
    pub content_length: usize,
}

impl ChapterRecord {
    pub fn new(novel_id: &str, chapter_number: u32, title: String, original_content: String) -> Self {
        let content_length = original_content.chars().count();
        Self {
            novel_id: novel_id.to_owned(),
            chapter_number,
            title,
            original_content,
            translated_content: None,
            is_translated: false,
            translated_at: None,
            translation_model: None,
            content_length,
        }
    }

    /// Sets every translation field together. An already translated chapter
    /// is left untouched and `false` is returned.
    pub fn commit_translation(&mut self, commit: &TranslationCommit) -> bool {
        if self.translated_content.is_some() {
            return false;
        }
        self.translated_content = Some(commit.text.clone());
        self.is_translated = true;
        self.translated_at = Some(commit.translated_at);
        self.translation_model = Some(commit.model.clone());
        true
    }

    pub fn summary(&self) -> ChapterSummary {
        ChapterSummary {
            chapter_number: self.chapter_number,
            title: self.title.clone(),
            is_translated: self.is_translated,
            translated_at: self.translated_at,
            content_length: self.content_length,
        }
    }

    pub fn translation_status(&self) -> TranslationStatus {
        TranslationStatus {
            chapter_number: self.chapter_number,
            is_translated: self.is_translated,
            translated_at: self.translated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationCommit {
    pub text: String,
    pub model: String,
    pub translated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub chapter_number: u32,
    pub title: String,
    pub is_translated: bool,
    pub translated_at: Option<DateTime<Utc>>,
    pub content_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationStatus {
    pub chapter_number: u32,
    pub is_translated: bool,
    pub translated_at: Option<DateTime<Utc>>,
}
