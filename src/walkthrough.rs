//! Walkthrough scenarios for the `users` model.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use strata_core::config::AppConfig;
use strata_core::{AppError, AppResult};
use strata_hooks::{
    Aggregate, Document, ExecutionContext, HookBody, HookEngine, HookOptions, ModelScope, Query,
    Schema, Scope, WrappedCall,
};

use crate::store::Collection;

/// Validator run as the `validate` operation ahead of every save.
#[derive(Debug, Clone)]
struct RequiredFields {
    fields: Vec<&'static str>,
}

#[async_trait]
impl WrappedCall for RequiredFields {
    async fn call(&self, ctx: ExecutionContext) -> AppResult<Value> {
        let missing: Vec<&str> = ctx.with_scope(|scope| match scope {
            Scope::Document(doc) => self
                .fields
                .iter()
                .copied()
                .filter(|field| doc.get(*field).is_none_or(Value::is_null))
                .collect(),
            _ => Vec::new(),
        });

        if missing.is_empty() {
            Ok(Value::Null)
        } else {
            Err(AppError::validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Builds the `users` schema.
pub fn build_schema(config: &AppConfig) -> AppResult<Schema> {
    let mut schema = Schema::from_config("users", &config.engine);
    if config.engine.derive_validate_on_save {
        schema.derive_validate_on_save(RequiredFields {
            fields: vec!["name", "email"],
        });
    }

    schema
        .pre(
            "validate",
            HookBody::pre(|ctx| {
                ctx.with_document_mut(|doc| {
                    if let Some(email) = doc.get_str("email").map(str::to_lowercase) {
                        doc.set("email", Value::String(email));
                    }
                });
                Ok(())
            }),
        )?
        .pre(
            "save",
            HookBody::pre(|ctx| {
                let now = chrono::Utc::now().to_rfc3339();
                ctx.with_document_mut(|doc| {
                    if doc.is_new {
                        doc.set("createdAt", Value::String(now.clone()));
                    }
                    doc.set("updatedAt", Value::String(now));
                    if doc.get("active").is_none() {
                        doc.set("active", Value::Bool(true));
                    }
                });
                Ok(())
            }),
        )?
        .pre_parallel(
            "save",
            HookBody::pre_parallel(|ctx, next, done| async move {
                next.ok();
                tokio::time::sleep(Duration::from_millis(10)).await;
                ctx.set_local("audited", Value::Bool(true));
                done.ok();
            }),
        )?
        .post(
            "save",
            HookBody::post(|ctx, saved| {
                info!(
                    invocation_id = %ctx.invocation_id(),
                    id = %saved.get("_id").unwrap_or(&serde_json::Value::Null),
                    audited = ctx.local("audited").is_some(),
                    "User saved"
                );
            }),
        )?
        .post(
            "save",
            HookBody::error_handler(|_, error, _, next| async move {
                if error.message.starts_with("E11000") {
                    next.err(AppError::validation("There was a duplicate key error"));
                } else {
                    next.ok();
                }
            }),
        )?
        .pre(
            "find",
            HookBody::pre(|ctx| {
                ctx.set_local("start", json!(ctx.started_at().timestamp_millis()));
                Ok(())
            }),
        )?
        .post(
            "find",
            HookBody::post_deferred(|ctx, result, next| async move {
                let start = ctx.local("start").and_then(|v| v.as_i64()).unwrap_or_default();
                info!(
                    elapsed_ms = chrono::Utc::now().timestamp_millis() - start,
                    rows = result.as_array().map_or(0, Vec::len),
                    "find finished"
                );
                next.ok();
            }),
        )?
        .pre(
            "aggregate",
            HookBody::pre(|ctx| {
                ctx.with_aggregate_mut(|agg| agg.unshift(json!({ "$match": { "active": true } })));
                Ok(())
            }),
        )?
        .post_with(
            "remove",
            HookOptions::document_only(),
            HookBody::post(|ctx, _| {
                let id = ctx.with_scope(|scope| match scope {
                    Scope::Document(doc) => doc.id.clone(),
                    _ => None,
                });
                info!(id = ?id, "User removed");
            }),
        )?
        .pre(
            "deleteMany",
            HookBody::pre(|ctx| {
                let unfiltered = ctx.with_scope(|scope| match scope {
                    Scope::Query(query) => query.filter.is_empty(),
                    _ => false,
                });
                if unfiltered {
                    Err(AppError::hook_signaled("deleteMany requires a filter"))
                } else {
                    Ok(())
                }
            }),
        )?;

    Ok(schema)
}

fn user(name: &str, email: &str) -> Scope {
    Scope::Document(
        Document::new("users")
            .with_field("name", json!(name))
            .with_field("email", json!(email)),
    )
}

/// Logs a failure the walkthrough provokes on purpose.
fn expect_failure(step: &str, result: AppResult<Value>) -> AppResult<()> {
    match result {
        Err(e) => {
            warn!(step, error = %e, "Rejected as expected");
            Ok(())
        }
        Ok(value) => Err(AppError::internal(format!(
            "{step} should have failed but returned {value}"
        ))),
    }
}

/// Runs every scenario against a fresh collection.
pub async fn run(config: &AppConfig) -> AppResult<()> {
    let engine = HookEngine::with_config(build_schema(config)?, &config.engine);
    let users = Collection::new("users", "email");

    let ada = engine.run("save", user("Ada", "ADA@example.com"), &users).await?;
    info!(user = %ada, "Saved ada");
    engine.run("save", user("Grace", "grace@example.com"), &users).await?;

    let incomplete = Scope::Document(Document::new("users").with_field("name", json!("Anon")));
    expect_failure("save without email", engine.run("save", incomplete, &users).await)?;
    expect_failure(
        "save duplicate email",
        engine.run("save", user("Ada II", "ada@example.com"), &users).await,
    )?;

    let batch = ModelScope::new(
        "users",
        vec![
            json!({ "name": "Linus", "email": "linus@example.com", "active": false }),
            json!({ "name": "Barbara", "email": "barbara@example.com", "active": true }),
        ],
    );
    engine.run("insertMany", Scope::Model(batch), &users).await?;

    let everyone = engine
        .run("find", Scope::Query(Query::new("users")), &users)
        .await?;
    info!(count = everyone.as_array().map_or(0, Vec::len), "Found users");

    let active = engine
        .run(
            "aggregate",
            Scope::Aggregate(Aggregate::new("users", vec![json!({ "$limit": 10 })])),
            &users,
        )
        .await?;
    info!(count = active.as_array().map_or(0, Vec::len), "Aggregated active users");

    let mut saved_ada = Document::new("users");
    saved_ada.id = ada.get("_id").and_then(Value::as_str).map(str::to_string);
    saved_ada.is_new = false;
    engine.run("remove", Scope::Document(saved_ada), &users).await?;

    expect_failure(
        "deleteMany without filter",
        engine
            .run("deleteMany", Scope::Query(Query::new("users")), &users)
            .await,
    )?;
    let deleted = engine
        .run(
            "deleteMany",
            Scope::Query(Query::new("users").where_eq("active", json!(false))),
            &users,
        )
        .await?;
    info!(result = %deleted, remaining = users.len(), "Walkthrough complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_walkthrough_runs_with_defaults() {
        run(&AppConfig::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_key_is_rewritten() {
        let config = AppConfig::default();
        let engine = HookEngine::new(build_schema(&config).unwrap());
        let users = Collection::new("users", "email");

        engine.run("save", user("Ada", "ada@example.com"), &users).await.unwrap();
        let err = engine
            .run("save", user("Ada", "ADA@example.com"), &users)
            .await
            .unwrap_err();
        assert_eq!(err.message, "There was a duplicate key error");
    }

    #[tokio::test]
    async fn test_save_without_email_fails_validation() {
        let config = AppConfig::default();
        let engine = HookEngine::new(build_schema(&config).unwrap());
        let users = Collection::new("users", "email");

        let err = engine
            .run(
                "save",
                Scope::Document(Document::new("users").with_field("name", json!("x"))),
                &users,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, strata_core::error::ErrorKind::Validation);
        assert_eq!(users.len(), 0);
    }
}
