//! Schema — the owner of hook registrations and derived operations.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use strata_core::config::engine::EngineConfig;
use strata_core::types::{HookId, Operation};
use strata_core::{AppError, AppResult};

use crate::hooks::definitions::{HookBody, HookMode, HookOptions, Phase};
use crate::hooks::registry::HookRegistry;
use crate::traits::{NoopCall, WrappedCall};

/// An operation whose invocation first runs another operation's chain.
#[derive(Clone)]
pub struct DerivedOperation {
    /// The operation run first.
    pub inner: Operation,
    /// What the inner operation wraps.
    pub call: Arc<dyn WrappedCall>,
}

impl std::fmt::Debug for DerivedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedOperation")
            .field("inner", &self.inner)
            .finish()
    }
}

/// Hook definitions for one model.
///
/// Hooks are registered while the schema is being defined; the schema is
/// then handed to a [`HookEngine`](crate::engine::HookEngine), which only
/// reads it.
#[derive(Debug)]
pub struct Schema {
    /// Schema name, used in logs.
    name: String,
    /// Hook registrations.
    registry: HookRegistry,
    /// Outer operation → operation run before it.
    derived: HashMap<Operation, DerivedOperation>,
}

impl Schema {
    /// Creates a schema where `save` first runs the `validate` chain.
    pub fn new(name: impl Into<String>) -> Self {
        let mut schema = Self::bare(name);
        schema.derive_validate_on_save(NoopCall);
        schema
    }

    /// Creates a schema honoring the engine configuration.
    pub fn from_config(name: impl Into<String>, config: &EngineConfig) -> Self {
        if config.derive_validate_on_save {
            Self::new(name)
        } else {
            Self::bare(name)
        }
    }

    /// Creates a schema without any derived operations.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: HookRegistry::new(),
            derived: HashMap::new(),
        }
    }

    /// Returns the schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the hook registry.
    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Registers `body` for every operation `name` resolves to under
    /// `options`.
    ///
    /// Either every resolved operation receives the hook or none does.
    pub fn register_hook(
        &mut self,
        name: &str,
        phase: Phase,
        mode: HookMode,
        body: HookBody,
        options: HookOptions,
    ) -> AppResult<Vec<HookId>> {
        body.check(phase, mode)?;
        let operations = options.resolve(name)?;

        operations
            .into_iter()
            .map(|operation| {
                self.registry
                    .register(operation, phase, mode, body.clone())
            })
            .collect()
    }

    /// Registers a serial pre hook.
    pub fn pre(&mut self, name: &str, body: HookBody) -> AppResult<&mut Self> {
        self.pre_with(name, HookOptions::default(), body)
    }

    /// Registers a serial pre hook with explicit scope options.
    pub fn pre_with(
        &mut self,
        name: &str,
        options: HookOptions,
        body: HookBody,
    ) -> AppResult<&mut Self> {
        self.register_hook(name, Phase::Pre, HookMode::Serial, body, options)?;
        Ok(self)
    }

    /// Registers a parallel pre hook.
    pub fn pre_parallel(&mut self, name: &str, body: HookBody) -> AppResult<&mut Self> {
        self.register_hook(
            name,
            Phase::Pre,
            HookMode::Parallel,
            body,
            HookOptions::default(),
        )?;
        Ok(self)
    }

    /// Registers a post hook.
    pub fn post(&mut self, name: &str, body: HookBody) -> AppResult<&mut Self> {
        self.post_with(name, HookOptions::default(), body)
    }

    /// Registers a post hook with explicit scope options.
    pub fn post_with(
        &mut self,
        name: &str,
        options: HookOptions,
        body: HookBody,
    ) -> AppResult<&mut Self> {
        self.register_hook(name, Phase::Post, HookMode::Serial, body, options)?;
        Ok(self)
    }

    /// Declares that invoking `outer` first runs the full chain of `inner`.
    ///
    /// Both operations must share a scope kind, since the inner chain runs on
    /// the outer invocation's context. Replaces any earlier derivation for
    /// `outer`.
    pub fn derive(
        &mut self,
        outer: Operation,
        inner: Operation,
        call: impl WrappedCall + 'static,
    ) -> AppResult<()> {
        if outer.scope() != inner.scope() {
            return Err(AppError::configuration(format!(
                "cannot derive {outer} from {inner}: scope kinds differ"
            )));
        }

        let mut cursor = Some(inner);
        while let Some(op) = cursor {
            if op == outer {
                return Err(AppError::configuration(format!(
                    "deriving {outer} from {inner} would create a cycle"
                )));
            }
            cursor = self.derived.get(&op).map(|d| d.inner);
        }

        self.insert_derived(outer, inner, Arc::new(call));
        Ok(())
    }

    /// Runs `call` as the `validate` operation ahead of every `save`.
    pub fn derive_validate_on_save(&mut self, call: impl WrappedCall + 'static) {
        self.insert_derived(Operation::SAVE, Operation::VALIDATE, Arc::new(call));
    }

    fn insert_derived(&mut self, outer: Operation, inner: Operation, call: Arc<dyn WrappedCall>) {
        self.derived
            .insert(outer, DerivedOperation { inner, call });
        info!(schema = %self.name, outer = %outer, inner = %inner, "Derived operation declared");
    }

    /// Returns the derivation declared for `operation`, if any.
    pub fn derived_from(&self, operation: Operation) -> Option<&DerivedOperation> {
        self.derived.get(&operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::error::ErrorKind;

    #[test]
    fn test_default_schema_derives_validate() {
        let schema = Schema::new("users");
        let save = Operation::document("save").unwrap();
        let derived = schema.derived_from(save).expect("derived");
        assert_eq!(derived.inner.name(), "validate");

        let bare = Schema::bare("users");
        assert!(bare.derived_from(save).is_none());
    }

    #[test]
    fn test_from_config_respects_flag() {
        let config = EngineConfig {
            derive_validate_on_save: false,
            ..EngineConfig::default()
        };
        let schema = Schema::from_config("users", &config);
        assert!(
            schema
                .derived_from(Operation::document("save").unwrap())
                .is_none()
        );
    }

    #[test]
    fn test_registration_chains() {
        let mut schema = Schema::new("users");
        schema
            .pre("save", HookBody::pre(|_| Ok(())))
            .unwrap()
            .post("save", HookBody::post(|_, _| {}))
            .unwrap();

        let save = Operation::document("save").unwrap();
        assert_eq!(schema.registry().handler_count(save, Phase::Pre), 1);
        assert_eq!(schema.registry().handler_count(save, Phase::Post), 1);
    }

    #[test]
    fn test_invalid_registrations() {
        let mut schema = Schema::new("users");

        let err = schema
            .register_hook(
                "save",
                Phase::Post,
                HookMode::Parallel,
                HookBody::post(|_, _| {}),
                HookOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidMode);

        let err = schema
            .post("save", HookBody::pre(|_| Ok(())))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArity);

        let err = schema.pre("frobnicate", HookBody::pre(|_| Ok(()))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownOperation);
    }

    #[test]
    fn test_remove_registers_document_scope_only() {
        let mut schema = Schema::new("users");
        schema.post("remove", HookBody::post(|_, _| {})).unwrap();

        let doc_remove = Operation::document("remove").unwrap();
        let query_remove = Operation::query("remove").unwrap();
        assert_eq!(schema.registry().handler_count(doc_remove, Phase::Post), 1);
        assert_eq!(schema.registry().handler_count(query_remove, Phase::Post), 0);
    }

    #[test]
    fn test_derive_rejects_cycles_and_scope_mismatch() {
        let mut schema = Schema::new("users");
        let save = Operation::document("save").unwrap();
        let validate = Operation::document("validate").unwrap();
        let find = Operation::query("find").unwrap();

        let err = schema.derive(validate, save, NoopCall).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);

        let err = schema.derive(find, save, NoopCall).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
