//! Virtual paths.
//!
//! A [`VirtualPath`] is a client-side addressing convenience: the remote
//! drive has no idea what a path is. Parsing is infallible. Leading, trailing
//! and repeated slashes are collapsed, and a path with no segments left
//! denotes the root.
//!
//! > **Note:** names containing `/` exist on the remote side but cannot be
//! >           addressed by path.

use derive_more::Display;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display("{raw}")]
pub struct VirtualPath {
    /// As given, for diagnostics.
    raw: String,
    segments: Vec<String>,
}

impl VirtualPath {
    /// # Examples
    ///
    /// ```
    /// use drivepath_tree::VirtualPath;
    ///
    /// let path = VirtualPath::parse("//My Folder///report.txt/");
    /// assert_eq!(path.segments(), ["My Folder", "report.txt"]);
    /// assert_eq!(path.to_string(), "//My Folder///report.txt/");
    /// assert!(VirtualPath::parse("///").is_root());
    /// ```
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = raw.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect();
        Self { raw, segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Final segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Canonical form: a leading slash and single separators.
    pub fn normalized(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

impl From<&str> for VirtualPath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
