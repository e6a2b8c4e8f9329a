use std::io::{Cursor, Read as _};

use anyhow::Context as _;
use zip::ZipArchive;

use crate::error::Error;

/// Read-only view over an in-memory zip buffer.
pub struct Archive<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
}

/// Handle to an entry located by [`Archive::find_entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    index: usize,
    path: String,
}

impl<'a> Archive<'a> {
    pub fn open(buffer: &'a [u8]) -> Result<Self, Error> {
        let zip = ZipArchive::new(Cursor::new(buffer))
            .map_err(|err| Error::CorruptArchive(err.to_string()))?;
        Ok(Self { zip })
    }

    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.is_empty()
    }

    /// Exact, case-sensitive lookup against the central directory.
    pub fn find_entry(&self, path: &str) -> Option<Entry> {
        let index = self.zip.index_for_name(path)?;
        Some(Entry {
            index,
            path: path.to_owned(),
        })
    }

    pub fn read_bytes(&mut self, entry: &Entry) -> anyhow::Result<Vec<u8>> {
        let mut file = self
            .zip
            .by_index(entry.index)
            .with_context(|| format!("open zip entry: {}", entry.path))?;
        let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut bytes)
            .with_context(|| format!("read zip entry: {}", entry.path))?;
        Ok(bytes)
    }

    pub fn read_text(&mut self, entry: &Entry) -> anyhow::Result<String> {
        let bytes = self.read_bytes(entry)?;
        let mut text = String::from_utf8(bytes)
            .with_context(|| format!("zip entry is not valid UTF-8: {}", entry.path))?;
        if text.starts_with('\u{feff}') {
            text.drain(..'\u{feff}'.len_utf8());
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::testing::{zip_bytes, zip_raw_bytes};

    #[test]
    fn open_rejects_non_zip_input() {
        let result = Archive::open(b"definitely not a zip archive");
        assert!(matches!(result, Err(Error::CorruptArchive(_))));
    }

    #[test]
    fn find_entry_requires_exact_path() {
        let bytes = zip_bytes(&[("OEBPS/Text/ch1.xhtml", "<p>one</p>")]);
        let archive = Archive::open(&bytes).unwrap();

        assert!(archive.find_entry("OEBPS/Text/ch1.xhtml").is_some());
        assert!(archive.find_entry("oebps/text/ch1.xhtml").is_none());
        assert!(archive.find_entry("Text/ch1.xhtml").is_none());
        assert!(archive.find_entry("OEBPS/Text/ch1").is_none());
    }

    #[test]
    fn read_text_strips_byte_order_mark() {
        let bytes = zip_bytes(&[("a.txt", "\u{feff}hello")]);
        let mut archive = Archive::open(&bytes).unwrap();
        let entry = archive.find_entry("a.txt").unwrap();
        assert_eq!(archive.read_text(&entry).unwrap(), "hello");
    }

    #[test]
    fn read_text_fails_on_invalid_utf8() {
        let bytes = zip_raw_bytes(&[("bad.xhtml", &[0xffu8, 0xfe, 0x00][..])]);
        let mut archive = Archive::open(&bytes).unwrap();
        let entry = archive.find_entry("bad.xhtml").unwrap();
        assert!(archive.read_text(&entry).is_err());
        assert_eq!(archive.read_bytes(&entry).unwrap(), vec![0xff, 0xfe, 0x00]);
    }
}
