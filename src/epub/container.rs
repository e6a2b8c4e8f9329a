use quick_xml::Reader;
use quick_xml::events::Event;

use crate::epub::archive::Archive;
use crate::error::Error;

pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Returns the package document path declared by the first `rootfile`.
pub fn resolve(archive: &mut Archive<'_>) -> Result<String, Error> {
    let entry = archive
        .find_entry(CONTAINER_PATH)
        .ok_or_else(|| Error::InvalidContainer(format!("{CONTAINER_PATH} not found")))?;
    let xml = archive
        .read_text(&entry)
        .map_err(|err| Error::InvalidContainer(format!("{err:#}")))?;

    parse_rootfile_path(&xml)
}

fn parse_rootfile_path(xml: &str) -> Result<String, Error> {
    let mut reader = Reader::from_str(xml);

    loop {
        let event = reader.read_event().map_err(|err| {
            Error::InvalidContainer(format!(
                "malformed XML at byte {}: {err}",
                reader.error_position()
            ))
        })?;
        match event {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"rootfile" => {
                let attr = e
                    .try_get_attribute("full-path")
                    .map_err(|err| Error::InvalidContainer(format!("rootfile attribute: {err}")))?
                    .ok_or_else(|| {
                        Error::InvalidContainer("rootfile has no full-path attribute".to_owned())
                    })?;
                let path = attr
                    .unescape_value()
                    .map_err(|err| Error::InvalidContainer(format!("rootfile full-path: {err}")))?
                    .trim()
                    .to_owned();
                if path.is_empty() {
                    return Err(Error::InvalidContainer(
                        "rootfile full-path is empty".to_owned(),
                    ));
                }
                return Ok(path);
            }
            Event::Eof => {
                return Err(Error::InvalidContainer(
                    "no rootfile element declared".to_owned(),
                ));
            }
            _ => {}
        }
    }
}
