use crate::epub::archive::Archive;
use crate::epub::package::Package;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChapter {
    pub spine_index: usize,
    pub resource_path: String,
    pub raw_markup: String,
}

/// Reads every spine document in reading order.
///
/// Spine ids without a manifest entry, and manifest paths without an archive
/// entry, are skipped. Entries that cannot be read as text are logged and
/// skipped; none of these abort the book.
pub fn extract_all(archive: &mut Archive<'_>, package: &Package) -> Vec<RawChapter> {
    let mut chapters = Vec::with_capacity(package.spine.len());

    for (spine_index, idref) in package.spine.iter().enumerate() {
        let Some(resource_path) = package.resource_path(idref) else {
            tracing::debug!(spine_index, idref = %idref, "spine id not in manifest; skipping");
            continue;
        };
        let Some(entry) = archive.find_entry(&resource_path) else {
            tracing::debug!(spine_index, path = %resource_path, "spine resource not in archive; skipping");
            continue;
        };

        match archive.read_text(&entry) {
            Ok(raw_markup) => chapters.push(RawChapter {
                spine_index,
                resource_path,
                raw_markup,
            }),
            Err(err) => {
                let skipped = Error::ChapterExtractionSkipped {
                    spine_index,
                    path: resource_path,
                    reason: format!("{err:#}"),
                };
                tracing::warn!(error = %skipped, "chapter extraction failed");
            }
        }
    }

    chapters
}
