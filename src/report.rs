//! Report assembly.
//!
//! A report is a fixed list of named text documents. Each document is built
//! independently, so a corrupt import table still leaves the header, the
//! section dump and the listing intact.

use std::fmt;

use tracing::{info, info_span, warn};

use crate::config::ListingConfig;
use crate::disasm::{IcedDecoder, InstructionDecoder};
use crate::formats::pe::{ImageReader, PeError};
use crate::listing::disassemble;

pub const HEADER: &str = "Header";
pub const ENTRY_POINT: &str = "EntryPoint";
pub const SECTIONS: &str = "Sections";
pub const IMPORTS: &str = "Imports";
pub const DISASSEMBLY: &str = "Disassembly";

/// Document names in output order
pub const DOCUMENT_NAMES: [&str; 5] = [HEADER, ENTRY_POINT, SECTIONS, IMPORTS, DISASSEMBLY];

/// One named report document, or the reason it could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub body: Result<String, String>,
}

impl Document {
    pub fn new(name: impl Into<String>, body: Result<String, String>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    pub fn is_error(&self) -> bool {
        self.body.is_err()
    }

    /// Text as written to disk; failures read `error: <reason>`.
    pub fn text(&self) -> String {
        match &self.body {
            Ok(text) => text.clone(),
            Err(reason) => format!("error: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    documents: Vec<Document>,
}

impl Report {
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Build every document with the x86 decoder.
    pub fn build(data: &[u8], config: &ListingConfig) -> Self {
        Self::build_with_decoder(data, &IcedDecoder::new(), config)
    }

    pub fn build_with_decoder<D: InstructionDecoder + ?Sized>(
        data: &[u8],
        decoder: &D,
        config: &ListingConfig,
    ) -> Self {
        let span = info_span!("report", size = data.len());
        let _guard = span.enter();

        let reader = match ImageReader::with_limits(data, config.limits.clone()) {
            Ok(reader) => reader,
            Err(e) => {
                // Nothing can be built without a header
                warn!(error = %e, "image header unreadable");
                let reason = e.to_string();
                return Self::from_documents(
                    DOCUMENT_NAMES
                        .iter()
                        .map(|name| Document::new(*name, Err(reason.clone())))
                        .collect(),
                );
            }
        };

        let documents = vec![
            Document::new(HEADER, Ok(reader.header().to_string())),
            Document::new(ENTRY_POINT, entry_point_text(&reader).map_err(failed(ENTRY_POINT))),
            Document::new(SECTIONS, Ok(sections_text(&reader))),
            Document::new(
                IMPORTS,
                reader
                    .imports()
                    .map(|table| table.to_string())
                    .map_err(failed(IMPORTS)),
            ),
            Document::new(
                DISASSEMBLY,
                Ok(disassemble(&reader, decoder, config).render(&config.render)),
            ),
        ];

        let report = Self::from_documents(documents);
        info!(
            documents = report.documents.len(),
            failed = report.documents.iter().filter(|d| d.is_error()).count(),
            "report built"
        );
        report
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name == name)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, document) in self.documents.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "===== {} =====", document.name)?;
            writeln!(f, "{}", document.text())?;
        }
        Ok(())
    }
}

/// Log a failed document and keep its message
fn failed(name: &'static str) -> impl Fn(PeError) -> String {
    move |e| {
        warn!(document = name, error = %e, "document failed");
        e.to_string()
    }
}

fn entry_point_text(reader: &ImageReader<'_>) -> Result<String, PeError> {
    let entry = reader.entry_point();
    let section = reader
        .section_for_pointer(entry)
        .ok_or(PeError::NoOwningSection { pointer: entry })?;
    let raw = reader.virtual_to_raw(entry)?;
    Ok(format!(
        "Entrypoint at section {}\nvirtual address 0x{:X}\nraw address 0x{:X}",
        section.name(),
        entry.address,
        raw.address
    ))
}

fn sections_text(reader: &ImageReader<'_>) -> String {
    reader
        .sections()
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}
