// @zen-component: MCP-AccessControlHook
//
//! Access control hook: administration tools are reserved for tenant admins.

use async_trait::async_trait;
use crmcp_core::credentials::Role;
use tracing::debug;

use super::{HookContext, HookError, ToolCallOutcome, ToolHook};
use crate::tools::catalog;

/// Rejects admin-only tools for non-admin callers.
#[derive(Debug, Default)]
pub struct AccessControlHook;

impl AccessControlHook {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolHook for AccessControlHook {
    async fn before_call(
        &self,
        ctx: &HookContext,
        _params: &mut serde_json::Value,
    ) -> Result<(), HookError> {
        let admin_only = catalog::find(&ctx.tool_name).is_some_and(|t| t.admin_only);
        if admin_only && ctx.role != Role::Admin {
            debug!(user_id = %ctx.user_id, tool = %ctx.tool_name, "admin tool refused");
            return Err(HookError::AccessDenied(format!(
                "{} requires the admin role",
                ctx.tool_name
            )));
        }
        Ok(())
    }

    async fn after_call(
        &self,
        _ctx: &HookContext,
        _outcome: &mut ToolCallOutcome,
    ) -> Result<(), HookError> {
        // Access control only runs before the call.
        Ok(())
    }

    fn name(&self) -> &str {
        "AccessControlHook"
    }
}
