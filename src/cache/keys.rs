//! Cache key definitions.

use std::fmt;

use crate::application::query::Query;

/// Key of one cached list subscription: the collection path plus the stable
/// serialization of its query descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub path: String,
    pub query_key: String,
}

impl ListKey {
    pub fn new(path: impl Into<String>, query: &Query) -> Self {
        Self {
            path: path.into(),
            query_key: stable_query_key(query),
        }
    }
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.path, self.query_key)
    }
}

/// Deterministic serialization of a query descriptor.
///
/// `Query` holds no map types, so serde output is order-stable.
pub fn stable_query_key(query: &Query) -> String {
    serde_json::to_string(query).unwrap_or_else(|_| format!("{query:?}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::application::query::{FilterOp, Query, where_field};

    use super::*;

    #[test]
    fn equal_queries_collapse_to_the_same_key() {
        let query = Query::with([where_field("name", FilterOp::Eq, json!("Ann"))]);
        let rebuilt = Query::with([where_field("name", FilterOp::Eq, json!("Ann"))]);

        assert_eq!(ListKey::new("users", &query), ListKey::new("users", &rebuilt));
    }

    #[test]
    fn constraint_order_is_part_of_the_key() {
        let a = Query::with([
            where_field("a", FilterOp::Eq, json!(1)),
            where_field("b", FilterOp::Eq, json!(2)),
        ]);
        let b = Query::with([
            where_field("b", FilterOp::Eq, json!(2)),
            where_field("a", FilterOp::Eq, json!(1)),
        ]);

        assert_ne!(ListKey::new("users", &a), ListKey::new("users", &b));
    }
}
