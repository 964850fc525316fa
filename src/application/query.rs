//! List query descriptors.
//!
//! A `Query` describes the constraints of one list subscription. Descriptors
//! derive `Serialize` with a stable field order, so two logically identical
//! queries built independently serialize to the same cache key without any
//! identity comparison.

use serde::Serialize;
use serde_json::Value;

/// Filter operators supported by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    ArrayContains,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

/// One query constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Where {
        field: String,
        op: FilterOp,
        value: Value,
    },
    OrderBy {
        field: String,
        direction: Direction,
    },
    Limit(usize),
}

/// Creates a constraint requiring `field` to satisfy `op` against `value`.
pub fn where_field(field: impl Into<String>, op: FilterOp, value: Value) -> Constraint {
    Constraint::Where {
        field: field.into(),
        op,
        value,
    }
}

/// Creates a constraint sorting results by `field`.
pub fn order_by(field: impl Into<String>, direction: Direction) -> Constraint {
    Constraint::OrderBy {
        field: field.into(),
        direction,
    }
}

/// Creates a constraint capping the number of results.
pub fn limit(count: usize) -> Constraint {
    Constraint::Limit(count)
}

/// A list query: ordered constraints plus the collection-group flag.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Query {
    pub constraints: Vec<Constraint>,
    pub collection_group: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(constraints: impl IntoIterator<Item = Constraint>) -> Self {
        Self {
            constraints: constraints.into_iter().collect(),
            collection_group: false,
        }
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn identical_queries_serialize_identically() {
        let a = Query::with([
            where_field("name", FilterOp::Eq, json!("Ann")),
            order_by("age", Direction::Descending),
        ]);
        let b = Query::new()
            .constraint(where_field("name", FilterOp::Eq, json!("Ann")))
            .constraint(order_by("age", Direction::Descending));

        let a_key = serde_json::to_string(&a).expect("serializable query");
        let b_key = serde_json::to_string(&b).expect("serializable query");
        assert_eq!(a_key, b_key);
    }

    #[test]
    fn different_constraints_serialize_differently() {
        let a = Query::with([where_field("name", FilterOp::Eq, json!("Ann"))]);
        let b = Query::with([where_field("name", FilterOp::Eq, json!("Bea"))]);

        assert_ne!(
            serde_json::to_string(&a).expect("serializable query"),
            serde_json::to_string(&b).expect("serializable query"),
        );
    }
}
