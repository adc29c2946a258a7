//! Scope objects — what a hook's context refers to.
//!
//! The engine treats these as opaque carriers; the persistence layer that
//! supplies the wrapped call decides what the fields mean.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use strata_core::types::ScopeKind;

/// Tagged union over the four scope kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// A document instance.
    Document(Document),
    /// A query.
    Query(Query),
    /// A model-level bulk operation.
    Model(ModelScope),
    /// An aggregation pipeline.
    Aggregate(Aggregate),
}

impl Scope {
    /// Returns the scope kind of this object.
    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Document(_) => ScopeKind::Document,
            Self::Query(_) => ScopeKind::Query,
            Self::Model(_) => ScopeKind::Model,
            Self::Aggregate(_) => ScopeKind::Aggregate,
        }
    }

    /// Returns the collection this scope targets.
    pub fn collection(&self) -> &str {
        match self {
            Self::Document(doc) => &doc.collection,
            Self::Query(query) => &query.collection,
            Self::Model(model) => &model.collection,
            Self::Aggregate(agg) => &agg.collection,
        }
    }
}

/// A single document and its field values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    /// Owning collection.
    pub collection: String,
    /// Primary key, once assigned.
    pub id: Option<String>,
    /// Field values.
    pub fields: Map<String, Value>,
    /// Whether the document has never been persisted.
    pub is_new: bool,
}

impl Document {
    /// Creates a new, unsaved document.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: None,
            fields: Map::new(),
            is_new: true,
        }
    }

    /// Sets a field, builder style.
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Gets a field value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Gets a string field value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Sets a field value.
    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// Serializes the document into a JSON object including its id.
    pub fn to_value(&self) -> Value {
        let mut body = self.fields.clone();
        if let Some(id) = &self.id {
            body.insert("_id".to_string(), Value::String(id.clone()));
        }
        Value::Object(body)
    }
}

/// A query: a filter plus an optional update document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Target collection.
    pub collection: String,
    /// Match filter.
    pub filter: Map<String, Value>,
    /// Update to apply, for update-style operations.
    pub update: Option<Map<String, Value>>,
    /// Free-form query options (limit, sort, ...).
    pub options: Map<String, Value>,
}

impl Query {
    /// Creates a query matching every document in `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Map::new(),
            update: None,
            options: Map::new(),
        }
    }

    /// Adds an equality condition to the filter.
    pub fn where_eq(mut self, key: &str, value: Value) -> Self {
        self.filter.insert(key.to_string(), value);
        self
    }

    /// Sets the update document.
    pub fn with_update(mut self, update: Map<String, Value>) -> Self {
        self.update = Some(update);
        self
    }

    /// Returns whether `doc` satisfies every equality condition.
    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        self.filter
            .iter()
            .all(|(key, expected)| doc.get(key) == Some(expected))
    }
}

/// A model-level operation, e.g. `insertMany`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelScope {
    /// Target collection.
    pub collection: String,
    /// Documents supplied to bulk operations.
    pub docs: Vec<Value>,
}

impl ModelScope {
    /// Creates a model scope for `collection` with the given documents.
    pub fn new(collection: impl Into<String>, docs: Vec<Value>) -> Self {
        Self {
            collection: collection.into(),
            docs,
        }
    }
}

/// An aggregation pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregate {
    /// Source collection.
    pub collection: String,
    /// Pipeline stages, in order.
    pub pipeline: Vec<Value>,
}

impl Aggregate {
    /// Creates an aggregate over `collection`.
    pub fn new(collection: impl Into<String>, pipeline: Vec<Value>) -> Self {
        Self {
            collection: collection.into(),
            pipeline,
        }
    }

    /// Prepends a stage; pre-aggregate hooks use this to inject filters.
    pub fn unshift(&mut self, stage: Value) {
        self.pipeline.insert(0, stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_kind() {
        assert_eq!(
            Scope::Document(Document::new("users")).kind(),
            ScopeKind::Document
        );
        assert_eq!(Scope::Query(Query::new("users")).kind(), ScopeKind::Query);
        assert_eq!(
            Scope::Aggregate(Aggregate::new("users", vec![])).collection(),
            "users"
        );
    }

    #[test]
    fn test_query_matches() {
        let query = Query::new("users").where_eq("name", json!("ada"));
        let hit = json!({"name": "ada", "age": 36});
        let miss = json!({"name": "grace"});
        assert!(query.matches(hit.as_object().unwrap()));
        assert!(!query.matches(miss.as_object().unwrap()));
    }

    #[test]
    fn test_document_to_value_includes_id() {
        let mut doc = Document::new("users").with_field("name", json!("ada"));
        doc.id = Some("u1".into());
        assert_eq!(doc.to_value(), json!({"name": "ada", "_id": "u1"}));
    }

    #[test]
    fn test_aggregate_unshift() {
        let mut agg = Aggregate::new("users", vec![json!({"$sort": {"age": 1}})]);
        agg.unshift(json!({"$match": {"deleted": false}}));
        assert_eq!(agg.pipeline[0], json!({"$match": {"deleted": false}}));
        assert_eq!(agg.pipeline.len(), 2);
    }
}
