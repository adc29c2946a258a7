//! Hook registry — registrations keyed by operation and phase, in
//! insertion order.

use std::collections::HashMap;

use tracing::info;

use strata_core::AppResult;
use strata_core::types::{HookId, Operation};

use super::definitions::{HookBody, HookKind, HookMode, Phase};

/// A single registered hook.
#[derive(Debug, Clone)]
pub struct HookRegistration {
    /// Registration identifier.
    pub id: HookId,
    /// Operation the hook wraps.
    pub operation: Operation,
    /// Phase it runs in.
    pub phase: Phase,
    /// Serial or parallel.
    pub mode: HookMode,
    /// The body to run.
    pub body: HookBody,
}

impl HookRegistration {
    /// Returns the calling convention of the body.
    pub fn kind(&self) -> HookKind {
        self.body.kind()
    }

    /// `"pre hook <id> on document:save"`, for logs and error messages.
    pub(crate) fn label(&self) -> String {
        format!("{} hook {} on {}", self.phase, self.id, self.operation)
    }
}

/// Registry of hook registrations organized by `(operation, phase)`.
///
/// Registrations are append-only. Order within one key is the order of
/// registration and is the order serial hooks execute in.
#[derive(Debug, Default)]
pub struct HookRegistry {
    /// `(operation, phase)` → registrations in insertion order.
    hooks: HashMap<(Operation, Phase), Vec<HookRegistration>>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a registration after checking the body against its phase
    /// and mode.
    pub fn register(
        &mut self,
        operation: Operation,
        phase: Phase,
        mode: HookMode,
        body: HookBody,
    ) -> AppResult<HookId> {
        body.check(phase, mode)?;

        let id = HookId::new();
        let kind = body.kind();
        self.hooks
            .entry((operation, phase))
            .or_default()
            .push(HookRegistration {
                id,
                operation,
                phase,
                mode,
                body,
            });

        info!(
            operation = %operation,
            phase = %phase,
            mode = ?mode,
            kind = ?kind,
            hook_id = %id,
            "Hook registered"
        );

        Ok(id)
    }

    /// Returns the registrations for `operation` in `phase`, in order.
    pub fn hooks(&self, operation: Operation, phase: Phase) -> &[HookRegistration] {
        self.hooks
            .get(&(operation, phase))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns whether any hooks are registered for `operation`.
    pub fn has_hooks(&self, operation: Operation) -> bool {
        !self.hooks(operation, Phase::Pre).is_empty()
            || !self.hooks(operation, Phase::Post).is_empty()
    }

    /// Returns the number of hooks registered for `operation` in `phase`.
    pub fn handler_count(&self, operation: Operation, phase: Phase) -> usize {
        self.hooks(operation, phase).len()
    }

    /// Returns every operation with at least one hook.
    pub fn registered_operations(&self) -> Vec<Operation> {
        let mut operations: Vec<Operation> = self.hooks.keys().map(|(op, _)| *op).collect();
        operations.sort_by_key(|op| (op.scope(), op.name()));
        operations.dedup();
        operations
    }
}
