//! Slash-delimited store paths.
//!
//! A path with an odd number of non-empty segments names a collection
//! (`users`), an even number names a document (`users/1`). Every entry point
//! classifies its path exactly once before touching the cache or the remote
//! store.

use std::fmt;

use super::error::DomainError;

/// Which shape of store object a path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Document,
    Collection,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKind::Document => write!(f, "document"),
            PathKind::Collection => write!(f, "collection"),
        }
    }
}

/// Classify a raw path by segment parity.
///
/// Returns `None` for a path with no non-empty segments.
pub fn classify(raw: &str) -> Option<PathKind> {
    let count = segments(raw).count();
    if count == 0 {
        return None;
    }
    if count % 2 == 1 {
        Some(PathKind::Collection)
    } else {
        Some(PathKind::Document)
    }
}

fn segments(raw: &str) -> impl Iterator<Item = &str> {
    raw.trim().split('/').filter(|s| !s.is_empty())
}

fn normalize(raw: &str) -> String {
    segments(raw).collect::<Vec<_>>().join("/")
}

/// A classified path, produced once at each public entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorePath {
    Document(DocumentPath),
    Collection(CollectionPath),
}

impl StorePath {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match classify(raw) {
            Some(PathKind::Document) => Ok(Self::Document(DocumentPath(normalize(raw)))),
            Some(PathKind::Collection) => Ok(Self::Collection(CollectionPath(normalize(raw)))),
            None => Err(DomainError::EmptyPath {
                path: raw.to_string(),
            }),
        }
    }
}

/// A normalized path naming a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match StorePath::parse(raw)? {
            StorePath::Document(path) => Ok(path),
            StorePath::Collection(_) => Err(DomainError::path_shape(raw, PathKind::Document)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final segment, the document id.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The parent collection. Always valid: stripping one segment from an
    /// even-length path leaves an odd-length one.
    pub fn parent(&self) -> CollectionPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => CollectionPath(parent.to_string()),
            None => CollectionPath(self.0.clone()),
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized path naming a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match StorePath::parse(raw)? {
            StorePath::Collection(path) => Ok(path),
            StorePath::Document(_) => Err(DomainError::path_shape(raw, PathKind::Collection)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path of the document `id` inside this collection.
    pub fn child(&self, id: &str) -> DocumentPath {
        DocumentPath(format!("{}/{}", self.0, id))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_segment_count_is_a_collection() {
        assert_eq!(classify("users"), Some(PathKind::Collection));
        assert_eq!(classify("users/1/posts"), Some(PathKind::Collection));
    }

    #[test]
    fn even_segment_count_is_a_document() {
        assert_eq!(classify("users/1"), Some(PathKind::Document));
        assert_eq!(classify("users/1/posts/2"), Some(PathKind::Document));
    }

    #[test]
    fn empty_segments_are_ignored() {
        assert_eq!(classify(" /users//1/ "), Some(PathKind::Document));
        assert_eq!(classify(""), None);
        assert_eq!(classify("///"), None);
    }

    #[test]
    fn document_path_rejects_collections() {
        let err = DocumentPath::parse("users").unwrap_err();
        assert!(matches!(err, DomainError::PathShape { .. }));
    }

    #[test]
    fn collection_path_rejects_documents() {
        let err = CollectionPath::parse("users/1").unwrap_err();
        assert!(matches!(err, DomainError::PathShape { .. }));
    }

    #[test]
    fn parent_and_id() {
        let path = DocumentPath::parse("users/1/posts/2").expect("document path");
        assert_eq!(path.id(), "2");
        assert_eq!(path.parent().as_str(), "users/1/posts");
    }

    #[test]
    fn normalization_strips_empty_segments() {
        let path = DocumentPath::parse("/users//1/").expect("document path");
        assert_eq!(path.as_str(), "users/1");
        assert_eq!(path.parent().as_str(), "users");
    }

    #[test]
    fn child_round_trips() {
        let users = CollectionPath::parse("users").expect("collection path");
        let doc = users.child("1");
        assert_eq!(doc.as_str(), "users/1");
        assert_eq!(doc.parent(), users);
    }
}
