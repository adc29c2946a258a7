//! In-memory collection used as the wrapped operation in the walkthrough.
//!
//! Stands in for the persistence layer: the hook engine hands it the
//! invocation context and it executes whichever operation the context names.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::{Map, Value, json};
use tracing::debug;

use strata_core::types::ScopeKind;
use strata_core::{AppError, AppResult};
use strata_hooks::{ExecutionContext, Scope, WrappedCall};

/// Documents keyed by `_id`, with a unique index on one field.
#[derive(Debug)]
pub struct Collection {
    /// Collection name.
    name: String,
    /// Field that must be unique across documents.
    unique_field: String,
    /// `_id` → stored fields.
    docs: DashMap<String, Map<String, Value>>,
    /// Unique field value → owning `_id`.
    index: DashMap<String, String>,
}

impl Collection {
    /// Creates an empty collection with a unique index on `unique_field`.
    pub fn new(name: impl Into<String>, unique_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_field: unique_field.into(),
            docs: DashMap::new(),
            index: DashMap::new(),
        }
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Claims the unique value in `fields` for `id`.
    fn claim(&self, id: &str, fields: &Map<String, Value>) -> AppResult<()> {
        let Some(key) = fields.get(&self.unique_field) else {
            return Ok(());
        };
        match self.index.entry(key.to_string()) {
            Entry::Occupied(owner) if owner.get().as_str() != id => {
                Err(AppError::wrapped_operation(format!(
                    "E11000 duplicate key error collection: {} index: {}_1 dup key: {key}",
                    self.name, self.unique_field
                )))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(id.to_string());
                Ok(())
            }
        }
    }

    fn release(&self, id: &str, fields: &Map<String, Value>) {
        if let Some(key) = fields.get(&self.unique_field) {
            self.index.remove_if(&key.to_string(), |_, owner| owner == id);
        }
    }

    /// Stores `fields` under `id` once its unique value is claimed.
    fn store(&self, id: &str, fields: Map<String, Value>) -> AppResult<()> {
        self.claim(id, &fields)?;
        let key = fields.get(&self.unique_field).cloned();
        if let Some(previous) = self.docs.insert(id.to_string(), fields) {
            if previous.get(&self.unique_field) != key.as_ref() {
                self.release(id, &previous);
            }
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> bool {
        match self.docs.remove(id) {
            Some((id, fields)) => {
                self.release(&id, &fields);
                true
            }
            None => false,
        }
    }

    fn insert(&self, mut fields: Map<String, Value>) -> AppResult<Value> {
        let id = match fields.remove("_id") {
            Some(Value::String(id)) => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };
        self.store(&id, fields.clone())?;
        fields.insert("_id".to_string(), Value::String(id));
        Ok(Value::Object(fields))
    }

    fn save(&self, ctx: &ExecutionContext) -> AppResult<Value> {
        let Scope::Document(doc) = ctx.scope() else {
            return Err(AppError::internal("save requires a document"));
        };
        let id = doc.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        self.store(&id, doc.fields)?;
        debug!(collection = %self.name, id = %id, "Document stored");

        ctx.with_document_mut(|doc| {
            doc.id = Some(id);
            doc.is_new = false;
            doc.to_value()
        })
        .ok_or_else(|| AppError::internal("save requires a document"))
    }

    fn remove_document(&self, ctx: &ExecutionContext) -> AppResult<Value> {
        let id = ctx
            .with_scope(|scope| match scope {
                Scope::Document(doc) => doc.id.clone(),
                _ => None,
            })
            .ok_or_else(|| AppError::not_found("document has no id"))?;
        if self.delete(&id) {
            Ok(json!({ "deletedCount": 1 }))
        } else {
            Err(AppError::not_found(format!("document {id} not found")))
        }
    }

    fn run_query(&self, ctx: &ExecutionContext) -> AppResult<Value> {
        let Scope::Query(query) = ctx.scope() else {
            return Err(AppError::internal("query operation requires a query"));
        };
        let matching: Vec<String> = self
            .docs
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();
        let operation = ctx.operation();

        match operation.name() {
            "find" | "findOne" | "countDocuments" => {
                let mut found: Vec<Value> = matching
                    .iter()
                    .filter_map(|id| self.docs.get(id).map(|doc| with_id(id, doc.value())))
                    .collect();
                found.sort_by_key(|doc| doc.get("_id").map(Value::to_string));
                match operation.name() {
                    "findOne" => Ok(found.into_iter().next().unwrap_or(Value::Null)),
                    "countDocuments" => Ok(json!(found.len())),
                    _ => Ok(Value::Array(found)),
                }
            }
            "deleteOne" | "deleteMany" | "remove" => {
                let limit = if operation.name() == "deleteOne" { 1 } else { usize::MAX };
                let deleted = matching
                    .iter()
                    .take(limit)
                    .filter(|id| self.delete(id))
                    .count();
                Ok(json!({ "deletedCount": deleted }))
            }
            "updateOne" | "updateMany" => {
                let update = query.update.clone().unwrap_or_default();
                let limit = if operation.name() == "updateOne" { 1 } else { usize::MAX };
                let mut modified = 0;
                for id in matching.iter().take(limit) {
                    let mut candidate = match self.docs.get(id) {
                        Some(doc) => doc.value().clone(),
                        None => continue,
                    };
                    candidate.extend(update.clone());
                    self.store(id, candidate)?;
                    modified += 1;
                }
                Ok(json!({ "modifiedCount": modified }))
            }
            other => Err(AppError::internal(format!(
                "query operation {other} is not supported by the in-memory collection"
            ))),
        }
    }

    fn insert_many(&self, ctx: &ExecutionContext) -> AppResult<Value> {
        let Scope::Model(model) = ctx.scope() else {
            return Err(AppError::internal("insertMany requires a model scope"));
        };
        let inserted = model
            .docs
            .into_iter()
            .map(|doc| match doc {
                Value::Object(fields) => self.insert(fields),
                other => Err(AppError::validation(format!("cannot insert {other}"))),
            })
            .collect::<AppResult<Vec<Value>>>()?;
        Ok(Value::Array(inserted))
    }

    fn aggregate(&self, ctx: &ExecutionContext) -> AppResult<Value> {
        let Scope::Aggregate(agg) = ctx.scope() else {
            return Err(AppError::internal("aggregate requires a pipeline"));
        };
        let mut rows: Vec<Value> = self
            .docs
            .iter()
            .map(|entry| with_id(entry.key(), entry.value()))
            .collect();
        rows.sort_by_key(|doc| doc.get("_id").map(Value::to_string));

        for stage in &agg.pipeline {
            if let Some(Value::Object(filter)) = stage.get("$match") {
                rows.retain(|row| {
                    filter
                        .iter()
                        .all(|(key, expected)| row.get(key) == Some(expected))
                });
            } else if let Some(limit) = stage.get("$limit").and_then(Value::as_u64) {
                rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            } else {
                return Err(AppError::validation(format!(
                    "unsupported pipeline stage {stage}"
                )));
            }
        }
        Ok(Value::Array(rows))
    }
}

fn document_value(ctx: &ExecutionContext) -> Value {
    ctx.with_scope(|scope| match scope {
        Scope::Document(doc) => doc.to_value(),
        _ => Value::Null,
    })
}

fn with_id(id: &str, fields: &Map<String, Value>) -> Value {
    let mut body = fields.clone();
    body.insert("_id".to_string(), Value::String(id.to_string()));
    Value::Object(body)
}

#[async_trait]
impl WrappedCall for Collection {
    async fn call(&self, ctx: ExecutionContext) -> AppResult<Value> {
        let operation = ctx.operation();
        match (ctx.scope_kind(), operation.name()) {
            (ScopeKind::Document, "save") => self.save(&ctx),
            (ScopeKind::Document, "remove" | "deleteOne") => self.remove_document(&ctx),
            (ScopeKind::Document, _) => Ok(document_value(&ctx)),
            (ScopeKind::Query, _) => self.run_query(&ctx),
            (ScopeKind::Model, "insertMany") => self.insert_many(&ctx),
            (ScopeKind::Aggregate, "aggregate") => self.aggregate(&ctx),
            _ => Err(AppError::internal(format!(
                "{operation} is not supported by the in-memory collection"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::types::Operation;
    use strata_hooks::{Document, Query};

    fn ctx(name: &str, scope: Scope) -> ExecutionContext {
        ExecutionContext::new(Operation::new(name, scope.kind()).unwrap(), scope)
    }

    #[tokio::test]
    async fn test_save_assigns_id_and_enforces_unique_index() {
        let users = Collection::new("users", "email");
        let first = ctx(
            "save",
            Scope::Document(Document::new("users").with_field("email", json!("a@x.io"))),
        );
        let saved = users.call(first.clone()).await.unwrap();
        assert!(saved.get("_id").is_some());
        assert!(first.with_scope(|s| matches!(s, Scope::Document(d) if !d.is_new)));

        let dup = ctx(
            "save",
            Scope::Document(Document::new("users").with_field("email", json!("a@x.io"))),
        );
        let err = users.call(dup).await.unwrap_err();
        assert!(err.message.starts_with("E11000"));
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_query_delete_many() {
        let users = Collection::new("users", "email");
        for (email, role) in [("a@x.io", "admin"), ("b@x.io", "guest"), ("c@x.io", "guest")] {
            users
                .insert(
                    json!({"email": email, "role": role})
                        .as_object()
                        .cloned()
                        .unwrap(),
                )
                .unwrap();
        }

        let query = Scope::Query(Query::new("users").where_eq("role", json!("guest")));
        let result = users.call(ctx("deleteMany", query)).await.unwrap();
        assert_eq!(result, json!({"deletedCount": 2}));
        assert_eq!(users.len(), 1);

        let reused = ctx(
            "save",
            Scope::Document(Document::new("users").with_field("email", json!("b@x.io"))),
        );
        users.call(reused).await.unwrap();
        assert_eq!(users.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_claim_unique_value_once() {
        let users = std::sync::Arc::new(Collection::new("users", "email"));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let users = users.clone();
            handles.push(tokio::spawn(async move {
                let scope =
                    Scope::Document(Document::new("users").with_field("email", json!("same@x.io")));
                users.call(ctx("save", scope)).await
            }));
        }

        let mut saved = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => saved += 1,
                Err(e) => assert!(e.message.starts_with("E11000")),
            }
        }
        assert_eq!(saved, 1);
        assert_eq!(users.len(), 1);
    }
}
