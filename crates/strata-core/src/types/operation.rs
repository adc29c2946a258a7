//! Hookable operations and the scope kinds they are bound to.
//!
//! An [`Operation`] is a name from the catalogue below paired with the
//! [`ScopeKind`] of the object a hook receives. The same name can exist
//! under several scope kinds (`remove` is both a document method and a
//! query), and the two are distinct operations with distinct hook chains.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

const DOCUMENT_OPERATIONS: &[&str] = &[
    "init",
    "validate",
    "save",
    "remove",
    "updateOne",
    "deleteOne",
];

const QUERY_OPERATIONS: &[&str] = &[
    "count",
    "countDocuments",
    "estimatedDocumentCount",
    "deleteMany",
    "deleteOne",
    "distinct",
    "find",
    "findOne",
    "findOneAndDelete",
    "findOneAndRemove",
    "findOneAndReplace",
    "findOneAndUpdate",
    "remove",
    "replaceOne",
    "update",
    "updateOne",
    "updateMany",
];

const MODEL_OPERATIONS: &[&str] = &["insertMany", "bulkWrite", "createCollection"];

const AGGREGATE_OPERATIONS: &[&str] = &["aggregate"];

/// Classification of the object a hook's context refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// A single document instance.
    Document,
    /// A query against a collection.
    Query,
    /// The model (collection) itself.
    Model,
    /// An aggregation pipeline.
    Aggregate,
}

impl ScopeKind {
    /// All scope kinds, in catalogue order.
    pub const ALL: [ScopeKind; 4] = [
        ScopeKind::Document,
        ScopeKind::Query,
        ScopeKind::Model,
        ScopeKind::Aggregate,
    ];

    /// Returns the string name of this scope kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Query => "query",
            Self::Model => "model",
            Self::Aggregate => "aggregate",
        }
    }

    /// Returns the operation names hookable under this scope kind.
    pub fn operations(&self) -> &'static [&'static str] {
        match self {
            Self::Document => DOCUMENT_OPERATIONS,
            Self::Query => QUERY_OPERATIONS,
            Self::Model => MODEL_OPERATIONS,
            Self::Aggregate => AGGREGATE_OPERATIONS,
        }
    }

    /// Returns whether `name` is hookable under this scope kind.
    pub fn supports(&self, name: &str) -> bool {
        self.operations().contains(&name)
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hookable operation: a catalogue name bound to a scope kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Operation {
    name: &'static str,
    scope: ScopeKind,
}

impl Operation {
    /// Document `save`.
    pub const SAVE: Operation = Operation {
        name: "save",
        scope: ScopeKind::Document,
    };

    /// Document `validate`.
    pub const VALIDATE: Operation = Operation {
        name: "validate",
        scope: ScopeKind::Document,
    };

    /// Looks up `name` in the catalogue for `scope`.
    pub fn new(name: &str, scope: ScopeKind) -> AppResult<Self> {
        scope
            .operations()
            .iter()
            .find(|candidate| **candidate == name)
            .map(|found| Self {
                name: *found,
                scope,
            })
            .ok_or_else(|| {
                AppError::unknown_operation(format!(
                    "'{name}' is not a {scope} operation"
                ))
            })
    }

    /// Document-scoped operation.
    pub fn document(name: &str) -> AppResult<Self> {
        Self::new(name, ScopeKind::Document)
    }

    /// Query-scoped operation.
    pub fn query(name: &str) -> AppResult<Self> {
        Self::new(name, ScopeKind::Query)
    }

    /// Model-scoped operation.
    pub fn model(name: &str) -> AppResult<Self> {
        Self::new(name, ScopeKind::Model)
    }

    /// The aggregate operation.
    pub fn aggregate() -> Self {
        Self {
            name: "aggregate",
            scope: ScopeKind::Aggregate,
        }
    }

    /// Returns the operation name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the scope kind.
    pub fn scope(&self) -> ScopeKind {
        self.scope
    }

    /// Scope kinds a bare `name` registers against when the caller gives
    /// no explicit scope.
    ///
    /// Names shared between document and query middleware resolve to one
    /// side: `remove` to document, `updateOne` and `deleteOne` to query.
    pub fn default_scopes(name: &str) -> AppResult<Vec<ScopeKind>> {
        let scopes: Vec<ScopeKind> = match name {
            "remove" => vec![ScopeKind::Document],
            "updateOne" | "deleteOne" => vec![ScopeKind::Query],
            _ => ScopeKind::ALL
                .into_iter()
                .filter(|scope| scope.supports(name))
                .collect(),
        };

        if scopes.is_empty() {
            return Err(AppError::unknown_operation(format!(
                "'{name}' is not a hookable operation"
            )));
        }
        Ok(scopes)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_same_name_different_scopes_are_distinct() {
        let doc = Operation::document("remove").expect("document remove");
        let query = Operation::query("remove").expect("query remove");
        assert_ne!(doc, query);
        assert_eq!(doc.name(), query.name());
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let err = Operation::document("find").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownOperation);

        let err = Operation::default_scopes("explode").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownOperation);
    }

    #[test]
    fn test_default_scopes() {
        assert_eq!(
            Operation::default_scopes("remove").unwrap(),
            vec![ScopeKind::Document]
        );
        assert_eq!(
            Operation::default_scopes("updateOne").unwrap(),
            vec![ScopeKind::Query]
        );
        assert_eq!(
            Operation::default_scopes("save").unwrap(),
            vec![ScopeKind::Document]
        );
        assert_eq!(
            Operation::default_scopes("insertMany").unwrap(),
            vec![ScopeKind::Model]
        );
    }

    #[test]
    fn test_constants_match_catalogue() {
        assert_eq!(Operation::SAVE, Operation::document("save").unwrap());
        assert_eq!(Operation::VALIDATE, Operation::document("validate").unwrap());
    }

    #[test]
    fn test_display() {
        let op = Operation::query("find").unwrap();
        assert_eq!(op.to_string(), "query:find");
        assert_eq!(Operation::aggregate().to_string(), "aggregate:aggregate");
    }
}
