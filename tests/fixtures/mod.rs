#![allow(dead_code)]

use std::io::{Cursor, Write as _};

use zip::write::SimpleFileOptions;

pub const PACKAGE_PATH: &str = "OEBPS/content.opf";

/// Prose long enough to survive the minimum-length filter.
pub fn long_text(label: &str) -> String {
    format!(
        "{label}. The river ran cold beneath the mountain pass, and the travellers \
         waited for dawn before they dared the crossing. Nobody spoke of the storm."
    )
}

pub fn xhtml(head_title: Option<&str>, body: &str) -> String {
    let head = head_title
        .map(|t| format!("<title>{t}</title>"))
        .unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\">\n\
         <head>{head}</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

pub struct Item {
    pub id: String,
    pub href: String,
    pub body: Option<Vec<u8>>,
}

/// Builds EPUB archives in memory: `mimetype` stored first, then
/// `META-INF/container.xml`, the package document and the content files.
pub struct EpubBuilder {
    title: Option<String>,
    creator: Option<String>,
    description: Option<String>,
    items: Vec<Item>,
    spine: Vec<String>,
    container: bool,
}

impl Default for EpubBuilder {
    fn default() -> Self {
        Self {
            title: Some("Test Novel".to_owned()),
            creator: Some("Test Author".to_owned()),
            description: None,
            items: Vec::new(),
            spine: Vec::new(),
            container: true,
        }
    }
}

impl EpubBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: Option<&str>) -> Self {
        self.title = title.map(str::to_owned);
        self
    }

    pub fn creator(mut self, creator: Option<&str>) -> Self {
        self.creator = creator.map(str::to_owned);
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    /// Adds a manifest item backed by a file under `OEBPS/`.
    pub fn item(mut self, id: &str, href: &str, body: &str) -> Self {
        self.items.push(Item {
            id: id.to_owned(),
            href: href.to_owned(),
            body: Some(body.as_bytes().to_vec()),
        });
        self
    }

    pub fn raw_item(mut self, id: &str, href: &str, body: &[u8]) -> Self {
        self.items.push(Item {
            id: id.to_owned(),
            href: href.to_owned(),
            body: Some(body.to_vec()),
        });
        self
    }

    /// Adds a manifest item whose file is absent from the archive.
    pub fn missing_item(mut self, id: &str, href: &str) -> Self {
        self.items.push(Item {
            id: id.to_owned(),
            href: href.to_owned(),
            body: None,
        });
        self
    }

    pub fn spine(mut self, idrefs: &[&str]) -> Self {
        self.spine = idrefs.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    pub fn without_container(mut self) -> Self {
        self.container = false;
        self
    }

    pub fn package_document(&self) -> String {
        let mut metadata = String::new();
        if let Some(title) = &self.title {
            metadata.push_str(&format!("    <dc:title>{title}</dc:title>\n"));
        }
        if let Some(creator) = &self.creator {
            metadata.push_str(&format!("    <dc:creator>{creator}</dc:creator>\n"));
        }
        if let Some(description) = &self.description {
            metadata.push_str(&format!(
                "    <dc:description>{description}</dc:description>\n"
            ));
        }

        let manifest: String = self
            .items
            .iter()
            .map(|item| {
                format!(
                    "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
                    item.id, item.href
                )
            })
            .collect();
        let spine: String = self
            .spine
            .iter()
            .map(|idref| format!("    <itemref idref=\"{idref}\"/>\n"))
            .collect();

        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"uid\">\n\
             <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n{metadata}</metadata>\n\
             <manifest>\n{manifest}</manifest>\n\
             <spine>\n{spine}</spine>\n\
             </package>\n"
        )
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let stored =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).expect("start mimetype");
        zip.write_all(b"application/epub+zip").expect("write mimetype");

        if self.container {
            zip.start_file("META-INF/container.xml", deflated)
                .expect("start container");
            let container = format!(
                "<?xml version=\"1.0\"?>\n\
                 <container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n\
                 <rootfiles>\n\
                 <rootfile full-path=\"{PACKAGE_PATH}\" media-type=\"application/oebps-package+xml\"/>\n\
                 </rootfiles>\n\
                 </container>\n"
            );
            zip.write_all(container.as_bytes()).expect("write container");
        }

        zip.start_file(PACKAGE_PATH, deflated).expect("start package");
        zip.write_all(self.package_document().as_bytes())
            .expect("write package");

        for item in &self.items {
            let Some(body) = &item.body else {
                continue;
            };
            zip.start_file(format!("OEBPS/{}", item.href), deflated)
                .expect("start item");
            zip.write_all(body).expect("write item");
        }

        zip.finish().expect("finish epub").into_inner()
    }
}

/// Three readable chapters listed in the spine in reverse manifest order,
/// with a short copyright page between them.
pub fn sample_novel() -> Vec<u8> {
    EpubBuilder::new()
        .title(Some("斗破苍穹"))
        .creator(Some("天蚕土豆"))
        .description("A test novel")
        .item(
            "c1",
            "text/one.xhtml",
            &xhtml(None, &format!("<h1>第一章 陨落</h1>\n<p>{}</p>", long_text("one"))),
        )
        .item(
            "c2",
            "text/two.xhtml",
            &xhtml(Some("Second"), &format!("<p>{}</p>", long_text("two"))),
        )
        .item("copy", "text/copyright.xhtml", &xhtml(None, "<p>© 2024</p>"))
        .item(
            "c3",
            "text/three.xhtml",
            &xhtml(None, &format!("<p>{}</p>", long_text("three"))),
        )
        .spine(&["c3", "copy", "c2", "c1"])
        .build()
}
