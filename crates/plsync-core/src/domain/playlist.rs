//! Playlist document model
//!
//! A Jellyfin `playlist.xml` is kept as a small element tree so that an
//! overwrite can carry every content field of the source verbatim while
//! only the identity fields (owner, title) are taken from the destination.
//! Parsing and serialization live in the document store adapter; this
//! module only knows the tree and the accessors the sync logic needs.
//!
//! ```text
//! <Item>
//!   <Added>..</Added>                 volatile, ignored by fingerprints
//!   <LocalTitle>Road Trip</LocalTitle>
//!   <OwnerUserId>..</OwnerUserId>
//!   <PlaylistItems>
//!     <PlaylistItem><Path>/music/a.flac</Path></PlaylistItem>
//!   </PlaylistItems>
//! </Item>
//! ```

use serde::{Deserialize, Serialize};

use super::newtypes::{TrackPath, UserId};

/// Root element name of a playlist document
pub const ROOT_ELEMENT: &str = "Item";
/// Element holding the owning user's id
pub const OWNER_ELEMENT: &str = "OwnerUserId";
/// Element holding the display title
pub const TITLE_ELEMENT: &str = "LocalTitle";
/// Volatile "last touched" timestamp element
pub const ADDED_ELEMENT: &str = "Added";
/// Container of the ordered playlist entries
pub const ITEMS_ELEMENT: &str = "PlaylistItems";
/// A single playlist entry
pub const ITEM_ELEMENT: &str = "PlaylistItem";
/// The track path inside an entry
pub const PATH_ELEMENT: &str = "Path";

// ============================================================================
// Element tree
// ============================================================================

/// A node in the document tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum XmlNode {
    /// A child element
    Element(XmlElement),
    /// Character data (already unescaped)
    Text(String),
}

/// An element with its attributes and children, in document order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XmlElement {
    /// Local element name (namespace prefix already stripped)
    pub name: String,
    /// Attributes as (local name, unescaped value)
    pub attributes: Vec<(String, String)>,
    /// Child nodes
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Creates an empty element
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an element containing only text
    #[must_use]
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut el = Self::new(name);
        el.children.push(XmlNode::Text(text.into()));
        el
    }

    /// Appends a child element, builder style
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Iterates over direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// First direct child element with the given name
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.name == name)
    }

    /// Mutable access to the first direct child element with the given name
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// Concatenated direct text content, `None` when the element has none
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let mut out = String::new();
        let mut found = false;
        for node in &self.children {
            if let XmlNode::Text(t) = node {
                out.push_str(t);
                found = true;
            }
        }
        found.then_some(out)
    }

    /// Text of the named child, trimmed, `None` if missing or blank
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .and_then(XmlElement::text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Replaces the text of the named child, creating the child if needed
    pub fn set_child_text(&mut self, name: &str, text: &str) {
        match self.child_mut(name) {
            Some(el) => {
                el.children.retain(|node| matches!(node, XmlNode::Element(_)));
                el.children.insert(0, XmlNode::Text(text.to_string()));
            }
            None => self
                .children
                .push(XmlNode::Element(XmlElement::with_text(name, text))),
        }
    }

    /// Removes every direct child element with the given name
    ///
    /// Returns the number of removed elements.
    pub fn remove_children(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, XmlNode::Element(el) if el.name == name));
        before - self.children.len()
    }
}

// ============================================================================
// PlaylistDocument
// ============================================================================

/// A parsed playlist definition
///
/// Wraps the element tree and exposes the three fields the sync logic
/// reasons about: owner, title and the ordered track sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistDocument {
    root: XmlElement,
}

impl PlaylistDocument {
    /// Wraps an already parsed tree
    #[must_use]
    pub fn from_root(root: XmlElement) -> Self {
        Self { root }
    }

    /// Builds a minimal document from its semantic fields
    #[must_use]
    pub fn build(owner: Option<&str>, title: Option<&str>, tracks: &[TrackPath]) -> Self {
        let mut root = XmlElement::new(ROOT_ELEMENT);
        if let Some(title) = title {
            root = root.with_child(XmlElement::with_text(TITLE_ELEMENT, title));
        }
        if let Some(owner) = owner {
            root = root.with_child(XmlElement::with_text(OWNER_ELEMENT, owner));
        }
        let mut items = XmlElement::new(ITEMS_ELEMENT);
        for track in tracks {
            items = items.with_child(
                XmlElement::new(ITEM_ELEMENT)
                    .with_child(XmlElement::with_text(PATH_ELEMENT, track.as_str())),
            );
        }
        Self {
            root: root.with_child(items),
        }
    }

    /// The underlying tree
    #[must_use]
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// Consumes the document, returning the tree
    #[must_use]
    pub fn into_root(self) -> XmlElement {
        self.root
    }

    /// Owning catalog user, if present and well-formed
    #[must_use]
    pub fn owner(&self) -> Option<UserId> {
        self.root
            .child_text(OWNER_ELEMENT)
            .and_then(|s| UserId::new(s).ok())
    }

    /// Display title, if present
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.root.child_text(TITLE_ELEMENT)
    }

    /// Ordered track paths; entries without a `Path` are skipped
    #[must_use]
    pub fn tracks(&self) -> Vec<TrackPath> {
        self.root
            .child(ITEMS_ELEMENT)
            .map(|items| {
                items
                    .elements()
                    .filter(|el| el.name == ITEM_ELEMENT)
                    .filter_map(|el| el.child_text(PATH_ELEMENT))
                    .map(TrackPath::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sets the owner, creating the element if needed
    pub fn set_owner(&mut self, owner: &UserId) {
        self.root.set_child_text(OWNER_ELEMENT, owner.as_str());
    }

    /// Sets the title, creating the element if needed
    pub fn set_title(&mut self, title: &str) {
        self.root.set_child_text(TITLE_ELEMENT, title);
    }

    /// Drops the volatile `Added` marker
    pub fn strip_volatile(&mut self) {
        self.root.remove_children(ADDED_ELEMENT);
    }

    /// Copy of this document carrying `other`'s identity fields
    ///
    /// Owner and title come from `other` when it has them; fields `other`
    /// lacks keep this document's value.
    #[must_use]
    pub fn with_identity_of(&self, other: &PlaylistDocument) -> Self {
        let mut doc = self.clone();
        if let Some(owner) = other.owner() {
            doc.set_owner(&owner);
        }
        if let Some(title) = other.title() {
            doc.set_title(&title);
        }
        doc
    }
}
