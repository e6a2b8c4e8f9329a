use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::fs;

use crate::formats::{ChapterRecord, NovelRecord, TranslationCommit};

#[async_trait]
pub trait NovelStore: Send + Sync {
    /// Persists a novel together with its chapters; on error nothing is visible.
    async fn create_novel(
        &self,
        novel: &NovelRecord,
        chapters: &[ChapterRecord],
    ) -> anyhow::Result<()>;
    async fn list_novels(&self) -> anyhow::Result<Vec<NovelRecord>>;
    async fn get_novel(&self, novel_id: &str) -> anyhow::Result<Option<NovelRecord>>;
    async fn delete_novel(&self, novel_id: &str) -> anyhow::Result<bool>;
    /// Chapters ordered by chapter number.
    async fn list_chapters(&self, novel_id: &str) -> anyhow::Result<Vec<ChapterRecord>>;
    async fn get_chapter(
        &self,
        novel_id: &str,
        chapter_number: u32,
    ) -> anyhow::Result<Option<ChapterRecord>>;
    /// Stores a translation unless the chapter already has one; returns the
    /// chapter as stored afterwards. The first commit wins, also across
    /// processes sharing the store.
    async fn commit_translation(
        &self,
        novel_id: &str,
        chapter_number: u32,
        commit: &TranslationCommit,
    ) -> anyhow::Result<Option<ChapterRecord>>;
    /// Waits for exclusive hold of a chapter, shared with every process using
    /// the same store. A hold older than `stale_after` is taken over.
    async fn lease_chapter(
        &self,
        novel_id: &str,
        chapter_number: u32,
        stale_after: Duration,
    ) -> anyhow::Result<ChapterLease>;
}

const LEASE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive hold on a chapter; released when dropped.
#[derive(Debug)]
pub struct ChapterLease {
    path: Option<PathBuf>,
}

impl Drop for ChapterLease {
    fn drop(&mut self) {
        if let Some(path) = self.path.take()
            && let Err(err) = std::fs::remove_file(&path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), error = %err, "failed to release chapter lease");
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalFsNovelStore {
    base_dir: PathBuf,
}

impl LocalFsNovelStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn novels_dir(&self) -> PathBuf {
        self.base_dir.join("novels")
    }

    /// `None` for ids that are not UUIDs, so they never reach the filesystem.
    fn novel_dir(&self, novel_id: &str) -> Option<PathBuf> {
        let id = uuid::Uuid::parse_str(novel_id.trim()).ok()?;
        Some(self.novels_dir().join(id.to_string()))
    }

    fn staging_dir(&self) -> PathBuf {
        self.novels_dir()
            .join(format!(".staging-{}", uuid::Uuid::new_v4().simple()))
    }
}

fn novel_json_path(novel_dir: &Path) -> PathBuf {
    novel_dir.join("novel.json")
}

fn chapters_dir(novel_dir: &Path) -> PathBuf {
    novel_dir.join("chapters")
}

fn chapter_json_path(novel_dir: &Path, chapter_number: u32) -> PathBuf {
    chapters_dir(novel_dir).join(format!("{chapter_number:05}.json"))
}

fn translation_json_path(novel_dir: &Path, chapter_number: u32) -> PathBuf {
    chapters_dir(novel_dir).join(format!("{chapter_number:05}.translation.json"))
}

fn chapter_lease_path(novel_dir: &Path, chapter_number: u32) -> PathBuf {
    chapters_dir(novel_dir).join(format!("{chapter_number:05}.lease"))
}

/// Chapter number of a `{number:05}.json` chapter file; `None` for
/// translations, leases and temp files.
fn chapter_number_of(path: &Path) -> Option<u32> {
    if path.extension()?.to_str()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

/// Chapter file merged with its committed translation, if any.
async fn load_chapter(
    novel_dir: &Path,
    chapter_number: u32,
) -> anyhow::Result<Option<ChapterRecord>> {
    let path = chapter_json_path(novel_dir, chapter_number);
    let Some(mut chapter) = read_json::<ChapterRecord>(&path)
        .await
        .with_context(|| format!("read: {}", path.display()))?
    else {
        return Ok(None);
    };

    let path = translation_json_path(novel_dir, chapter_number);
    if let Some(commit) = read_json::<TranslationCommit>(&path)
        .await
        .with_context(|| format!("read: {}", path.display()))?
    {
        chapter.commit_translation(&commit);
    }
    Ok(Some(chapter))
}

async fn lease_is_stale(path: &Path, stale_after: Duration) -> bool {
    let Ok(metadata) = fs::metadata(path).await else {
        return false;
    };
    metadata
        .modified()
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > stale_after)
}

#[async_trait]
impl NovelStore for LocalFsNovelStore {
    async fn create_novel(
        &self,
        novel: &NovelRecord,
        chapters: &[ChapterRecord],
    ) -> anyhow::Result<()> {
        let final_dir = self
            .novel_dir(&novel.id)
            .ok_or_else(|| anyhow::anyhow!("invalid novel id: {}", novel.id))?;
        if fs::try_exists(&final_dir).await.unwrap_or(false) {
            anyhow::bail!("novel already exists: {}", novel.id);
        }

        let staging = self.staging_dir();
        let result = write_novel_tree(&staging, novel, chapters).await;
        let result = match result {
            Ok(()) => fs::rename(&staging, &final_dir)
                .await
                .with_context(|| format!("move novel into place: {}", final_dir.display())),
            Err(err) => Err(err),
        };
        if result.is_err() {
            let _ = fs::remove_dir_all(&staging).await;
        }
        result
    }

    async fn list_novels(&self) -> anyhow::Result<Vec<NovelRecord>> {
        let dir = self.novels_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read novels dir: {}", dir.display()));
            }
        };

        let mut novels = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("read novels dir entry")? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let path = novel_json_path(&entry.path());
            if let Some(novel) = read_json::<NovelRecord>(&path)
                .await
                .with_context(|| format!("read: {}", path.display()))?
            {
                novels.push(novel);
            }
        }
        novels.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(novels)
    }

    async fn get_novel(&self, novel_id: &str) -> anyhow::Result<Option<NovelRecord>> {
        let Some(dir) = self.novel_dir(novel_id) else {
            return Ok(None);
        };
        let path = novel_json_path(&dir);
        read_json(&path)
            .await
            .with_context(|| format!("read: {}", path.display()))
    }

    async fn delete_novel(&self, novel_id: &str) -> anyhow::Result<bool> {
        let Some(dir) = self.novel_dir(novel_id) else {
            return Ok(false);
        };
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("remove novel dir: {}", dir.display())),
        }
    }

    async fn list_chapters(&self, novel_id: &str) -> anyhow::Result<Vec<ChapterRecord>> {
        let Some(dir) = self.novel_dir(novel_id) else {
            return Ok(Vec::new());
        };
        let chapters_dir = chapters_dir(&dir);
        let mut entries = match fs::read_dir(&chapters_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("read chapters dir: {}", chapters_dir.display())
                });
            }
        };

        let mut numbers = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("read chapters dir entry")? {
            if let Some(number) = chapter_number_of(&entry.path()) {
                numbers.push(number);
            }
        }
        numbers.sort_unstable();

        let mut chapters = Vec::with_capacity(numbers.len());
        for number in numbers {
            if let Some(chapter) = load_chapter(&dir, number).await? {
                chapters.push(chapter);
            }
        }
        Ok(chapters)
    }

    async fn get_chapter(
        &self,
        novel_id: &str,
        chapter_number: u32,
    ) -> anyhow::Result<Option<ChapterRecord>> {
        let Some(dir) = self.novel_dir(novel_id) else {
            return Ok(None);
        };
        load_chapter(&dir, chapter_number).await
    }

    async fn commit_translation(
        &self,
        novel_id: &str,
        chapter_number: u32,
        commit: &TranslationCommit,
    ) -> anyhow::Result<Option<ChapterRecord>> {
        let Some(dir) = self.novel_dir(novel_id) else {
            return Ok(None);
        };
        if load_chapter(&dir, chapter_number).await?.is_none() {
            return Ok(None);
        }

        let path = translation_json_path(&dir, chapter_number);
        let published = write_json_once(&path, commit)
            .await
            .context("write translation json")?;
        if !published {
            tracing::debug!(
                novel_id,
                chapter_number,
                "chapter already has a translation; keeping it"
            );
        }
        load_chapter(&dir, chapter_number).await
    }

    async fn lease_chapter(
        &self,
        novel_id: &str,
        chapter_number: u32,
        stale_after: Duration,
    ) -> anyhow::Result<ChapterLease> {
        let dir = self
            .novel_dir(novel_id)
            .ok_or_else(|| anyhow::anyhow!("invalid novel id: {novel_id}"))?;
        let path = chapter_lease_path(&dir, chapter_number);

        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(ChapterLease { path: Some(path) }),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if lease_is_stale(&path, stale_after).await {
                        tracing::warn!(path = %path.display(), "taking over stale chapter lease");
                        let _ = fs::remove_file(&path).await;
                        continue;
                    }
                    tokio::time::sleep(LEASE_POLL_INTERVAL).await;
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("create lease: {}", path.display()));
                }
            }
        }
    }
}

async fn write_novel_tree(
    dir: &Path,
    novel: &NovelRecord,
    chapters: &[ChapterRecord],
) -> anyhow::Result<()> {
    let chapters_dir = chapters_dir(dir);
    fs::create_dir_all(&chapters_dir)
        .await
        .with_context(|| format!("create chapters dir: {}", chapters_dir.display()))?;

    for chapter in chapters {
        let path = chapter_json_path(dir, chapter.chapter_number);
        write_json_new(&path, chapter).await.with_context(|| {
            format!(
                "write chapter {} of novel {}",
                chapter.chapter_number, novel.id
            )
        })?;
    }
    write_json_new(&novel_json_path(dir), novel)
        .await
        .context("write novel.json")?;
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

/// Fails if the file exists, which keeps (novel, chapter number) unique.
async fn write_json_new<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    use tokio::io::AsyncWriteExt as _;

    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .with_context(|| format!("create: {}", path.display()))?;
    file.write_all(&data)
        .await
        .with_context(|| format!("write: {}", path.display()))?;
    file.flush()
        .await
        .with_context(|| format!("flush: {}", path.display()))?;
    Ok(())
}

/// Publishes `value` at `path` unless a file is already there.
///
/// The content goes to a temp file first and is hard-linked into place, so
/// readers never see a partial file and an existing one is never replaced.
/// Returns `false` when `path` already existed.
async fn write_json_once<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<bool> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;

    let linked = fs::hard_link(&tmp_path, path).await;
    let _ = fs::remove_file(&tmp_path).await;
    match linked {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err).with_context(|| format!("link tmp to final: {}", path.display())),
    }
}
