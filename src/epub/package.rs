use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, BytesText, Event};

use crate::epub::archive::Archive;
use crate::error::Error;

pub const DEFAULT_TITLE: &str = "Unknown Title";
pub const DEFAULT_AUTHOR: &str = "Unknown Author";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub creator: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct Package {
    pub metadata: Metadata,
    /// Manifest id to href, as declared (relative to [`Package::dir`]).
    pub manifest: HashMap<String, String>,
    /// Manifest ids in reading order.
    pub spine: Vec<String>,
    /// Directory of the package document including its trailing `/`, or empty.
    pub dir: String,
}

impl Package {
    /// Archive path for a spine id, if the manifest declares it.
    pub fn resource_path(&self, idref: &str) -> Option<String> {
        let href = self.manifest.get(idref)?;
        Some(format!("{}{href}", self.dir))
    }
}

pub fn package_dir(package_path: &str) -> &str {
    match package_path.rfind('/') {
        Some(idx) => &package_path[..=idx],
        None => "",
    }
}

pub fn parse(archive: &mut Archive<'_>, package_path: &str) -> Result<Package, Error> {
    let entry = archive.find_entry(package_path).ok_or_else(|| {
        Error::InvalidPackageDocument(format!("package document not found: {package_path}"))
    })?;
    let xml = archive
        .read_text(&entry)
        .map_err(|err| Error::InvalidPackageDocument(format!("{err:#}")))?;

    parse_document(&xml, package_dir(package_path))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Creator,
    Description,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"creator" => Some(Field::Creator),
            b"description" => Some(Field::Description),
            _ => None,
        }
    }
}

#[derive(Default)]
struct RawMetadata {
    title: Option<String>,
    creator: Option<String>,
    description: Option<String>,
}

impl RawMetadata {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Creator => &mut self.creator,
            Field::Description => &mut self.description,
        }
    }

    fn finish(self) -> Metadata {
        Metadata {
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
            creator: self.creator.unwrap_or_else(|| DEFAULT_AUTHOR.to_owned()),
            description: self.description.unwrap_or_default(),
        }
    }
}

fn parse_document(xml: &str, dir: &str) -> Result<Package, Error> {
    let mut reader = Reader::from_str(xml);

    let mut metadata = RawMetadata::default();
    let mut manifest = HashMap::new();
    let mut spine = Vec::new();
    let mut saw_manifest = false;
    let mut saw_spine = false;

    let mut in_metadata = false;
    // Field currently being captured, with its accumulated text.
    let mut capture: Option<(Field, String)> = None;

    loop {
        let event = reader.read_event().map_err(|err| {
            Error::InvalidPackageDocument(format!(
                "malformed XML at byte {}: {err}",
                reader.error_position()
            ))
        })?;

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"manifest" => saw_manifest = true,
                b"spine" => saw_spine = true,
                b"item" => insert_manifest_item(&mut manifest, &e)?,
                b"itemref" => push_spine_item(&mut spine, &e)?,
                name if in_metadata && capture.is_none() => {
                    if let Some(field) = Field::from_local_name(name)
                        && metadata.slot(field).is_none()
                    {
                        capture = Some((field, String::new()));
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"manifest" => saw_manifest = true,
                b"spine" => saw_spine = true,
                b"item" => insert_manifest_item(&mut manifest, &e)?,
                b"itemref" => push_spine_item(&mut spine, &e)?,
                _ => {}
            },
            Event::Text(t) => {
                if let Some((_, text)) = capture.as_mut() {
                    text.push_str(&text_content(&t));
                }
            }
            Event::CData(c) => {
                if let Some((_, text)) = capture.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                if name.as_ref() == b"metadata" {
                    in_metadata = false;
                } else if let Some((field, text)) = capture.take_if(|(field, _)| {
                    Field::from_local_name(name.as_ref()) == Some(*field)
                }) {
                    let text = text.trim();
                    if !text.is_empty() {
                        *metadata.slot(field) = Some(text.to_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_manifest {
        return Err(Error::InvalidPackageDocument(
            "package has no manifest".to_owned(),
        ));
    }
    if !saw_spine {
        return Err(Error::InvalidPackageDocument(
            "package has no spine".to_owned(),
        ));
    }

    Ok(Package {
        metadata: metadata.finish(),
        manifest,
        spine,
        dir: dir.to_owned(),
    })
}

fn insert_manifest_item(
    manifest: &mut HashMap<String, String>,
    e: &BytesStart<'_>,
) -> Result<(), Error> {
    let (Some(id), Some(href)) = (attribute(e, "id")?, attribute(e, "href")?) else {
        return Ok(());
    };
    if let Some(previous) = manifest.insert(id.clone(), href) {
        tracing::debug!(id = %id, previous = %previous, "duplicate manifest id; last declaration wins");
    }
    Ok(())
}

fn push_spine_item(spine: &mut Vec<String>, e: &BytesStart<'_>) -> Result<(), Error> {
    if let Some(idref) = attribute(e, "idref")? {
        spine.push(idref);
    }
    Ok(())
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, Error> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| Error::InvalidPackageDocument(format!("attribute {name}: {err}")))?;
    let Some(attr) = attr else {
        return Ok(None);
    };
    let value = attr
        .unescape_value()
        .map_err(|err| Error::InvalidPackageDocument(format!("attribute {name}: {err}")))?;
    Ok(Some(value.into_owned()))
}

/// Metadata text often carries HTML entities XML does not define; keep those verbatim.
fn text_content(t: &BytesText<'_>) -> String {
    match t.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(t).into_owned(),
    }
}
