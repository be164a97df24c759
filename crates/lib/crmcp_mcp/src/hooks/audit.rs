// @zen-component: MCP-AuditHook
//
//! Audit hook: records successful mutating tool calls in the tenant's audit
//! log, which `get_activity_feed` reads back.
//!
//! Always first in the pipeline, so it sees the final outcome. Failures are
//! logged and never block the response.

use async_trait::async_trait;
use crmcp_core::crm::CrmService;
use tracing::warn;

use super::{HookContext, HookError, ToolCallOutcome, ToolHook};
use crate::tools::catalog;

pub struct AuditHook {
    service: CrmService,
}

impl AuditHook {
    pub fn new(service: CrmService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolHook for AuditHook {
    async fn before_call(
        &self,
        _ctx: &HookContext,
        _params: &mut serde_json::Value,
    ) -> Result<(), HookError> {
        // Audit runs after the call, not before.
        Ok(())
    }

    async fn after_call(
        &self,
        ctx: &HookContext,
        outcome: &mut ToolCallOutcome,
    ) -> Result<(), HookError> {
        let ToolCallOutcome::Success(result) = outcome else {
            return Ok(());
        };
        let Some(audit) = catalog::find(&ctx.tool_name).and_then(|t| t.audit) else {
            return Ok(());
        };
        let entity_id = result.get("id").and_then(|id| id.as_str());

        if let Err(e) = self
            .service
            .record_activity(
                &ctx.tenant_id,
                &ctx.user_id,
                audit.action,
                audit.entity_type,
                entity_id,
            )
            .await
        {
            warn!("AuditHook: failed to record {}: {e}", ctx.tool_name);
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "AuditHook"
    }
}
