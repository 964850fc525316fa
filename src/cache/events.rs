//! Cache change events.
//!
//! Optimistic writes, real-time push notifications, and committed
//! transactions all describe their effect as a `ChangeEvent` and hand it to
//! the same propagation function, so the two write origins stay structurally
//! identical.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::document::SharedDocument;
use crate::domain::field_value::UpdateMap;
use crate::domain::path::CollectionPath;

use super::merge::MergePolicy;

/// Monotonic epoch for ordering events within one process.
pub type Epoch = u64;

/// Where a change event came from. Purely observability; every origin takes
/// the same propagation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    OptimisticWrite,
    RemoteListener,
    Fetch,
    Transaction,
}

/// The effect of one single-document change.
#[derive(Debug, Clone)]
pub enum ChangeKind {
    /// The document's next state is known in full; matching list entries are
    /// replaced wholesale.
    DocumentReplaced {
        parent: CollectionPath,
        document: SharedDocument,
    },
    /// Only a patch is known; matching list entries are merged per policy,
    /// each against its own cached state.
    DocumentPatched {
        parent: CollectionPath,
        doc_id: String,
        patch: UpdateMap,
        policy: MergePolicy,
    },
    /// The document is gone; matching list entries are removed.
    DocumentDeleted {
        parent: CollectionPath,
        doc_id: String,
    },
}

impl ChangeKind {
    pub fn parent(&self) -> &CollectionPath {
        match self {
            ChangeKind::DocumentReplaced { parent, .. }
            | ChangeKind::DocumentPatched { parent, .. }
            | ChangeKind::DocumentDeleted { parent, .. } => parent,
        }
    }

    pub fn doc_id(&self) -> &str {
        match self {
            ChangeKind::DocumentReplaced { document, .. } => &document.id,
            ChangeKind::DocumentPatched { doc_id, .. }
            | ChangeKind::DocumentDeleted { doc_id, .. } => doc_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::DocumentReplaced { .. } => "replaced",
            ChangeKind::DocumentPatched { .. } => "patched",
            ChangeKind::DocumentDeleted { .. } => "deleted",
        }
    }
}

/// A change event with identity and ordering support.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Unique identifier for log correlation (UUIDv4).
    pub id: Uuid,
    /// Monotonic epoch for ordering within this process.
    pub epoch: Epoch,
    pub origin: ChangeOrigin,
    pub kind: ChangeKind,
    /// When the event was created.
    pub timestamp: OffsetDateTime,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, origin: ChangeOrigin, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            origin,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::document::Document;

    use super::*;

    #[test]
    fn event_carries_identity_and_epoch() {
        let parent = CollectionPath::parse("users").expect("collection path");
        let kind = ChangeKind::DocumentDeleted {
            parent,
            doc_id: "1".to_string(),
        };
        let event = ChangeEvent::new(kind, ChangeOrigin::OptimisticWrite, 42);

        assert_eq!(event.epoch, 42);
        assert!(!event.id.is_nil());
        assert_eq!(event.kind.doc_id(), "1");
        assert_eq!(event.kind.label(), "deleted");
    }

    #[test]
    fn replaced_events_expose_the_document_id() {
        let parent = CollectionPath::parse("users").expect("collection path");
        let document = std::sync::Arc::new(Document::local("7", Default::default()));
        let kind = ChangeKind::DocumentReplaced { parent, document };
        assert_eq!(kind.doc_id(), "7");
        assert_eq!(kind.parent().as_str(), "users");
    }
}
