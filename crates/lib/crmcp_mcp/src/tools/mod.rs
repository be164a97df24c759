// @zen-component: MCP-ToolInvoker
//
//! Tool invocation: catalog lookup, hook pipeline, CRM routing.

pub mod catalog;

use std::sync::Arc;

use crmcp_core::auth::AuthContext;
use crmcp_core::crm::inputs::{
    ActivityArgs, DeleteArgs, IdArgs, InviteUserArgs, OverdueArgs, SearchArgs, UpdateTenantArgs,
    UpdateUserRoleArgs, UserIdArgs, parse_args,
};
use crmcp_core::crm::{CrmError, CrmService};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::hooks::{HookContext, HookPipeline, ToolCallOutcome};
use catalog::Route;

fn to_json<T: Serialize>(value: &T) -> Result<Value, CrmError> {
    serde_json::to_value(value).map_err(|e| CrmError::internal(format!("serialize result: {e}")))
}

/// Runs tools for an authenticated caller.
#[derive(Clone)]
pub struct ToolInvoker {
    service: CrmService,
    pipeline: Arc<HookPipeline>,
}

impl ToolInvoker {
    pub fn new(service: CrmService, pipeline: Arc<HookPipeline>) -> Self {
        Self { service, pipeline }
    }

    /// Invoker with the built-in hooks.
    pub fn with_default_hooks(service: CrmService) -> Self {
        let pipeline = Arc::new(crate::hooks::default_pipeline(service.clone()));
        Self::new(service, pipeline)
    }

    /// Call tool `name` with `arguments` as `ctx`.
    ///
    /// Unknown tools are a `VALIDATION_ERROR`.
    pub async fn call(
        &self,
        ctx: &AuthContext,
        name: &str,
        arguments: Value,
    ) -> Result<Value, CrmError> {
        let Some(tool) = catalog::find(name) else {
            return Err(CrmError::validation(format!("Unknown tool: {name}")));
        };
        let hook_ctx = HookContext {
            user_id: ctx.user_id.clone(),
            tenant_id: ctx.tenant_id.clone(),
            role: ctx.role,
            tool_name: tool.name.to_string(),
        };

        let mut params = arguments;
        self.pipeline.run_before(&hook_ctx, &mut params).await?;

        let mut outcome = match self.execute(tool.route, ctx, params).await {
            Ok(value) => ToolCallOutcome::Success(value),
            Err(e) => ToolCallOutcome::Error(e),
        };
        self.pipeline.run_after(&hook_ctx, &mut outcome).await?;

        match outcome {
            ToolCallOutcome::Success(value) => {
                info!(tool = name, user_id = %ctx.user_id, "tool call succeeded");
                Ok(value)
            }
            ToolCallOutcome::Error(e) => {
                let code = e.code.as_str();
                debug!(tool = name, code, "tool call failed: {}", e.message);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        route: Route,
        ctx: &AuthContext,
        args: Value,
    ) -> Result<Value, CrmError> {
        let service = &self.service;
        match route {
            Route::List(kind) => to_json(&service.list(ctx, kind, args).await?),
            Route::Get(kind) => {
                let IdArgs { id } = parse_args(args)?;
                to_json(&service.get(ctx, kind, &id).await?)
            }
            Route::Create(kind) => to_json(&service.create(ctx, kind, args).await?),
            Route::Update(kind) => to_json(&service.update(ctx, kind, args).await?),
            Route::Delete(kind) => {
                let DeleteArgs { id, force } = parse_args(args)?;
                let force = force.unwrap_or(false);
                to_json(&service.delete(ctx, kind, &id, force).await?)
            }
            Route::Restore(kind) => {
                let IdArgs { id } = parse_args(args)?;
                to_json(&service.restore(ctx, kind, &id).await?)
            }
            Route::CompleteTask => {
                let IdArgs { id } = parse_args(args)?;
                to_json(&service.complete_task(ctx, &id).await?)
            }
            Route::DismissReminder => {
                let IdArgs { id } = parse_args(args)?;
                to_json(&service.dismiss_reminder(ctx, &id).await?)
            }
            Route::Search => {
                let args: SearchArgs = parse_args(args)?;
                let hits = service.search(ctx, args).await?;
                to_json(&serde_json::json!({ "results": hits }))
            }
            Route::PipelineSummary => to_json(&service.pipeline_summary(ctx).await?),
            Route::ActivityFeed => {
                let args: ActivityArgs = parse_args(args)?;
                to_json(&service.activity_feed(ctx, args).await?)
            }
            Route::OverdueItems => {
                let args: OverdueArgs = parse_args(args)?;
                to_json(&service.overdue_items(ctx, args).await?)
            }
            Route::CurrentUser => service.current_user(ctx).await,
            Route::GetTenant => to_json(&service.get_tenant(ctx).await?),
            Route::UpdateTenant => {
                let args: UpdateTenantArgs = parse_args(args)?;
                to_json(&service.update_tenant(ctx, args).await?)
            }
            Route::ListUsers => {
                let users = service.list_users(ctx).await?;
                to_json(&serde_json::json!({ "users": users }))
            }
            Route::InviteUser => {
                let args: InviteUserArgs = parse_args(args)?;
                to_json(&service.invite_user(ctx, args).await?)
            }
            Route::UpdateUserRole => {
                let args: UpdateUserRoleArgs = parse_args(args)?;
                to_json(&service.update_user_role(ctx, args).await?)
            }
            Route::DeactivateUser => {
                let args: UserIdArgs = parse_args(args)?;
                to_json(&service.deactivate_user(ctx, args).await?)
            }
        }
    }
}
