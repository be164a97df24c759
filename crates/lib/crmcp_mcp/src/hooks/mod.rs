// @zen-component: MCP-HookPipeline
//
//! Hook/middleware pipeline for MCP tool calls.
//!
//! Hooks run before and after every tool call and can inspect, transform or
//! reject it. Built-in hooks provide access control and the audit trail.

pub mod access_control;
pub mod audit;

use std::sync::Arc;

use async_trait::async_trait;
use crmcp_core::credentials::Role;
use crmcp_core::crm::{CrmError, CrmService};
use tracing::debug;

/// Context passed to hooks for each tool call.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub user_id: String,
    pub tenant_id: String,
    pub role: Role,
    pub tool_name: String,
}

/// Outcome of a tool call, passed to after_call hooks.
#[derive(Debug, Clone)]
pub enum ToolCallOutcome {
    Success(serde_json::Value),
    Error(CrmError),
}

/// Errors that can occur in hooks.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Access denied: {0}")]
    AccessDenied(String),
}

impl From<HookError> for CrmError {
    fn from(e: HookError) -> Self {
        match e {
            HookError::AccessDenied(reason) => CrmError::forbidden(reason),
        }
    }
}

/// Hook trait; implement for custom hook logic.
///
/// Hooks form an ordered pipeline. `before_call` runs in order; `after_call`
/// runs in reverse order (onion model).
#[async_trait]
pub trait ToolHook: Send + Sync {
    /// Called before tool execution. Return Err to reject the call.
    async fn before_call(
        &self,
        ctx: &HookContext,
        params: &mut serde_json::Value,
    ) -> Result<(), HookError>;

    /// Called after tool execution. Can inspect or transform the outcome.
    async fn after_call(
        &self,
        ctx: &HookContext,
        outcome: &mut ToolCallOutcome,
    ) -> Result<(), HookError>;

    /// Hook identifier for logging.
    fn name(&self) -> &str;
}

/// Ordered pipeline of hooks.
pub struct HookPipeline {
    hooks: Vec<Arc<dyn ToolHook>>,
}

impl HookPipeline {
    pub fn new(hooks: Vec<Arc<dyn ToolHook>>) -> Self {
        Self { hooks }
    }

    /// Run all before_call hooks in order. Short-circuits on error.
    pub async fn run_before(
        &self,
        ctx: &HookContext,
        params: &mut serde_json::Value,
    ) -> Result<(), HookError> {
        for hook in &self.hooks {
            if let Err(e) = hook.before_call(ctx, params).await {
                debug!(hook = hook.name(), tool = %ctx.tool_name, "call rejected: {e}");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run all after_call hooks in reverse order.
    pub async fn run_after(
        &self,
        ctx: &HookContext,
        outcome: &mut ToolCallOutcome,
    ) -> Result<(), HookError> {
        for hook in self.hooks.iter().rev() {
            hook.after_call(ctx, outcome).await?;
        }
        Ok(())
    }
}

/// Build the default hook pipeline with built-in hooks.
///
/// Pipeline order: AuditHook → AccessControlHook
pub fn default_pipeline(service: CrmService) -> HookPipeline {
    HookPipeline::new(vec![
        Arc::new(audit::AuditHook::new(service)),
        Arc::new(access_control::AccessControlHook::new()),
    ])
}
