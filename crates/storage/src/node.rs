//! Remote node model.
//!
//! The remote drive is flat and ID-addressed: every file, folder and virtual
//! document is a [`Node`] with an opaque [`NodeId`] and a (possibly empty)
//! list of parent ids. Nothing in here knows about paths.

use derive_more::Display;
use std::borrow::Borrow;
use time::OffsetDateTime;

/// Mime type the provider uses to mark a node as a folder.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
/// Prefix shared by every provider-native (virtual) document type.
pub const VIRTUAL_MIME_PREFIX: &str = "application/vnd.google-apps.";
pub const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";
pub const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
pub const PRESENTATION_MIME: &str = "application/vnd.google-apps.presentation";

/// Mime type used when a plain file is created without one.
pub const DEFAULT_FILE_MIME: &str = "application/octet-stream";

const ROOT_ID: &str = "root";

/// Opaque identifier assigned by the remote system.
///
/// Never generated client-side, with the single exception of the well-known
/// [`root`](Self::root) alias that the provider accepts in place of the real
/// id of the drive's top-level folder.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);
impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Provider-native document formats with no direct byte representation.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub enum VirtualKind {
    #[display("document")]
    Document,
    #[display("spreadsheet")]
    Spreadsheet,
    #[display("presentation")]
    Presentation,
    /// Forms, drawings, sites, shortcuts... anything else the provider invents.
    #[display("{_0}")]
    Other(String),
}

/// What a node *is*, derived from its mime type.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    #[display("folder")]
    Folder,
    #[display("file")]
    File,
    #[display("{_0}")]
    Virtual(VirtualKind),
}
impl NodeKind {
    /// Classify a provider mime type.
    ///
    /// ```
    /// use drivepath_storage::node::{NodeKind, VirtualKind};
    ///
    /// assert_eq!(NodeKind::from_mime("application/vnd.google-apps.folder"), NodeKind::Folder);
    /// assert_eq!(NodeKind::from_mime("text/plain"), NodeKind::File);
    /// assert_eq!(
    ///     NodeKind::from_mime("application/vnd.google-apps.spreadsheet"),
    ///     NodeKind::Virtual(VirtualKind::Spreadsheet),
    /// );
    /// ```
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            FOLDER_MIME => Self::Folder,
            DOCUMENT_MIME => Self::Virtual(VirtualKind::Document),
            SPREADSHEET_MIME => Self::Virtual(VirtualKind::Spreadsheet),
            PRESENTATION_MIME => Self::Virtual(VirtualKind::Presentation),
            other if other.starts_with(VIRTUAL_MIME_PREFIX) => Self::Virtual(VirtualKind::Other(other.to_string())),
            _ => Self::File,
        }
    }

    /// Mime type to send when creating a node of this kind.
    pub fn default_mime(&self) -> &str {
        match self {
            Self::Folder => FOLDER_MIME,
            Self::File => DEFAULT_FILE_MIME,
            Self::Virtual(VirtualKind::Document) => DOCUMENT_MIME,
            Self::Virtual(VirtualKind::Spreadsheet) => SPREADSHEET_MIME,
            Self::Virtual(VirtualKind::Presentation) => PRESENTATION_MIME,
            Self::Virtual(VirtualKind::Other(mime)) => mime,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }
}

/// Metadata of a single remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    /// Display name. Not unique within a parent!
    pub name: String,
    pub kind: NodeKind,
    /// Raw provider mime type; `kind` is derived from it.
    pub mime_type: String,
    /// The provider permits multiple parents, so this is a list.
    pub parents: Vec<NodeId>,
    pub created: Option<OffsetDateTime>,
    pub modified: Option<OffsetDateTime>,
    /// Byte size. Absent for folders and virtual documents.
    pub size: Option<u64>,
    /// Soft-deleted.
    pub trashed: bool,
}
impl Node {
    /// Create node metadata, deriving the kind from the mime type.
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::from_mime(&mime_type),
            mime_type,
            parents: Vec::new(),
            created: None,
            modified: None,
            size: None,
            trashed: false,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parents.push(parent.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_modified(mut self, modified: OffsetDateTime) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }
}
