//! Playlist document adapter - `playlist.xml` on the local filesystem
//!
//! Implements [`IPlaylistStore`] for the XML files Jellyfin keeps next to
//! each playlist.
//!
//! ## Features
//!
//! - **Namespace-blind parsing**: element and attribute names are reduced to
//!   their local part and `xmlns` declarations are dropped while parsing
//! - **Atomic writes**: write-to-temp + rename, so the catalog never reads a
//!   half-written file
//! - **Canonical fingerprints**: SHA-256 over a compact re-serialization with
//!   the volatile `Added` marker removed

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use plsync_core::domain::errors::DocumentError;
use plsync_core::domain::newtypes::Fingerprint;
use plsync_core::domain::playlist::{PlaylistDocument, XmlElement, XmlNode};
use plsync_core::ports::playlist_store::IPlaylistStore;

/// Suffix of the temporary file used for atomic replacement
const TMP_SUFFIX: &str = ".plsync.tmp";

// ============================================================================
// Parsing
// ============================================================================

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn is_namespace_declaration(key: &[u8]) -> bool {
    key == b"xmlns" || key.starts_with(b"xmlns:")
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, String> {
    let mut element = XmlElement::new(local_name(start.local_name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute: {e}"))?;
        if is_namespace_declaration(attr.key.as_ref()) {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad attribute value: {e}"))?;
        element
            .attributes
            .push((local_name(attr.key.local_name().as_ref()), value.into_owned()));
    }
    Ok(element)
}

/// Attaches a completed element to its parent, or makes it the root
fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err("more than one root element".to_string()),
    }
}

/// Keeps text verbatim; whitespace-only runs are layout and dropped
fn push_text(stack: &mut [XmlElement], text: &str) {
    if text.trim().is_empty() {
        return;
    }
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Text(text.to_string()));
    }
}

/// Parses XML text into an element tree
pub(crate) fn parse_tree(xml: &str) -> Result<XmlElement, String> {
    let mut reader = Reader::from_str(xml.trim_start_matches('\u{feff}'));

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(element_from_start(&start)?),
            Ok(Event::Empty(start)) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "unexpected closing tag".to_string())?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|e| format!("bad text: {e}"))?;
                push_text(&mut stack, &text);
            }
            Ok(Event::CData(data)) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                push_text(&mut stack, &text);
            }
            Ok(Event::Eof) => break,
            // declaration, comments, processing instructions, doctype
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "{e} at byte {}",
                    reader.buffer_position()
                ))
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }
    root.ok_or_else(|| "no root element".to_string())
}

// ============================================================================
// Serialization
// ============================================================================

fn emit<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<(), String> {
    writer.write_event(event).map_err(|e| e.to_string())
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &XmlElement,
) -> Result<(), String> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }

    emit(writer, Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlNode::Element(el) => write_element(writer, el)?,
            XmlNode::Text(text) => emit(writer, Event::Text(BytesText::new(text)))?,
        }
    }
    emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

/// Renders a document the way it is stored on disk
pub(crate) fn render_file(root: &XmlElement) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), Some("yes"))),
    )?;
    write_element(&mut writer, root)?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// Compact rendering with volatile content removed, input to the digest
pub(crate) fn canonical_bytes(document: &PlaylistDocument) -> Result<Vec<u8>, String> {
    let mut normalized = document.clone();
    normalized.strip_volatile();
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, normalized.root())?;
    Ok(writer.into_inner())
}

/// SHA-256 of the canonical form, lowercase hex
pub fn fingerprint_of(document: &PlaylistDocument) -> Result<Fingerprint, String> {
    let bytes = canonical_bytes(document)?;
    let hex = format!("{:x}", Sha256::digest(&bytes));
    Fingerprint::new(hex).map_err(|e| e.to_string())
}

// ============================================================================
// XmlPlaylistStore
// ============================================================================

/// [`IPlaylistStore`] over `playlist.xml` files
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlPlaylistStore;

impl XmlPlaylistStore {
    pub fn new() -> Self {
        Self
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    PathBuf::from(tmp)
}

#[async_trait]
impl IPlaylistStore for XmlPlaylistStore {
    async fn read(&self, path: &Path) -> Result<PlaylistDocument, DocumentError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|e| DocumentError::Malformed {
            path: path.to_path_buf(),
            reason: format!("not UTF-8: {e}"),
        })?;
        let root = parse_tree(&text).map_err(|reason| DocumentError::Malformed {
            path: path.to_path_buf(),
            reason,
        })?;
        trace!(path = %path.display(), "Parsed playlist document");
        Ok(PlaylistDocument::from_root(root))
    }

    async fn write(&self, path: &Path, document: &PlaylistDocument) -> Result<(), DocumentError> {
        let io_err = |source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        };

        let bytes = render_file(document.root())
            .map_err(|e| io_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        let tmp = tmp_path(path);
        debug!(path = %path.display(), bytes = bytes.len(), "Writing playlist document");
        tokio::fs::write(&tmp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }

    async fn fingerprint(&self, path: &Path) -> Option<Fingerprint> {
        let document = match self.read(path).await {
            Ok(doc) => doc,
            Err(e) => {
                debug!(error = %e, "Playlist fingerprint unavailable");
                return None;
            }
        };
        match fingerprint_of(&document) {
            Ok(fp) => Some(fp),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Failed to fingerprint playlist");
                None
            }
        }
    }
}
