// @zen-component: MCP-ToolCatalog
//
//! Static tool catalog.
//!
//! One table drives both `tools/list` and `tools/call` routing. Input
//! schemas are derived from the argument types with `schemars` and rendered
//! once.

use std::sync::LazyLock;

use crmcp_core::crm::EntityKind;
use crmcp_core::crm::inputs::{
    AccountUpdate, ActivityArgs, ContactUpdate, DeleteArgs, EmptyArgs, IdArgs, InviteUserArgs,
    ListAccountsArgs, ListContactsArgs, ListOpportunitiesArgs, ListRemindersArgs, ListTasksArgs,
    NewAccount, NewContact, NewOpportunity, NewReminder, NewTask, OpportunityUpdate, OverdueArgs,
    ReminderUpdate, SearchArgs, TaskUpdate, UpdateTenantArgs, UpdateUserRoleArgs, UserIdArgs,
};
use schemars::JsonSchema;
use serde_json::{Value, json};

use EntityKind::{Account, Contact, Opportunity, Reminder, Task};

/// What a tool call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    List(EntityKind),
    Get(EntityKind),
    Create(EntityKind),
    Update(EntityKind),
    Delete(EntityKind),
    Restore(EntityKind),
    CompleteTask,
    DismissReminder,
    Search,
    PipelineSummary,
    ActivityFeed,
    OverdueItems,
    CurrentUser,
    GetTenant,
    UpdateTenant,
    ListUsers,
    InviteUser,
    UpdateUserRole,
    DeactivateUser,
}

/// Audit entry written after a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditSpec {
    pub action: &'static str,
    pub entity_type: &'static str,
}

/// One invocable tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub route: Route,
    pub admin_only: bool,
    pub audit: Option<AuditSpec>,
    pub schema: fn() -> Value,
}

impl ToolDef {
    const fn new(
        name: &'static str,
        description: &'static str,
        route: Route,
        schema: fn() -> Value,
    ) -> Self {
        Self {
            name,
            description,
            route,
            admin_only: false,
            audit: None,
            schema,
        }
    }

    const fn admin(mut self) -> Self {
        self.admin_only = true;
        self
    }

    const fn audited(mut self, action: &'static str, entity_type: &'static str) -> Self {
        self.audit = Some(AuditSpec {
            action,
            entity_type,
        });
        self
    }

    /// `tools/list` entry.
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": (self.schema)(),
        })
    }
}

/// JSON Schema for `T`, without the meta-schema and title keys.
fn schema<T: JsonSchema>() -> Value {
    let mut value = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({}));
    if let Some(map) = value.as_object_mut() {
        map.remove("$schema");
        map.remove("title");
        map.entry("type").or_insert_with(|| json!("object"));
    }
    value
}

#[rustfmt::skip]
pub static CATALOG: &[ToolDef] = &[
    // Accounts
    ToolDef::new("list_accounts", "List accounts, optionally filtered by industry", Route::List(Account), schema::<ListAccountsArgs>),
    ToolDef::new("get_account", "Get one account by id", Route::Get(Account), schema::<IdArgs>),
    ToolDef::new("create_account", "Create an account", Route::Create(Account), schema::<NewAccount>)
        .audited("create", "account"),
    ToolDef::new("update_account", "Update fields of an account", Route::Update(Account), schema::<AccountUpdate>)
        .audited("update", "account"),
    ToolDef::new("delete_account", "Soft-delete an account; pass force to also delete its contacts, opportunities, tasks and reminders", Route::Delete(Account), schema::<DeleteArgs>)
        .audited("delete", "account"),
    ToolDef::new("restore_account", "Restore a soft-deleted account", Route::Restore(Account), schema::<IdArgs>)
        .audited("restore", "account"),
    // Contacts
    ToolDef::new("list_contacts", "List contacts, optionally for one account", Route::List(Contact), schema::<ListContactsArgs>),
    ToolDef::new("get_contact", "Get one contact by id", Route::Get(Contact), schema::<IdArgs>),
    ToolDef::new("create_contact", "Create a contact", Route::Create(Contact), schema::<NewContact>)
        .audited("create", "contact"),
    ToolDef::new("update_contact", "Update fields of a contact", Route::Update(Contact), schema::<ContactUpdate>)
        .audited("update", "contact"),
    ToolDef::new("delete_contact", "Soft-delete a contact", Route::Delete(Contact), schema::<IdArgs>)
        .audited("delete", "contact"),
    ToolDef::new("restore_contact", "Restore a soft-deleted contact", Route::Restore(Contact), schema::<IdArgs>)
        .audited("restore", "contact"),
    // Opportunities
    ToolDef::new("list_opportunities", "List opportunities, optionally by account or stage", Route::List(Opportunity), schema::<ListOpportunitiesArgs>),
    ToolDef::new("get_opportunity", "Get one opportunity by id", Route::Get(Opportunity), schema::<IdArgs>),
    ToolDef::new("create_opportunity", "Create an opportunity for an account", Route::Create(Opportunity), schema::<NewOpportunity>)
        .audited("create", "opportunity"),
    ToolDef::new("update_opportunity", "Update an opportunity, including moving it between stages", Route::Update(Opportunity), schema::<OpportunityUpdate>)
        .audited("update", "opportunity"),
    ToolDef::new("delete_opportunity", "Soft-delete an opportunity", Route::Delete(Opportunity), schema::<IdArgs>)
        .audited("delete", "opportunity"),
    ToolDef::new("restore_opportunity", "Restore a soft-deleted opportunity", Route::Restore(Opportunity), schema::<IdArgs>)
        .audited("restore", "opportunity"),
    // Tasks
    ToolDef::new("list_tasks", "List tasks, optionally by status, assignee or linked record", Route::List(Task), schema::<ListTasksArgs>),
    ToolDef::new("get_task", "Get one task by id", Route::Get(Task), schema::<IdArgs>),
    ToolDef::new("create_task", "Create a task, optionally linked to an account, contact or opportunity", Route::Create(Task), schema::<NewTask>)
        .audited("create", "task"),
    ToolDef::new("update_task", "Update fields of a task", Route::Update(Task), schema::<TaskUpdate>)
        .audited("update", "task"),
    ToolDef::new("complete_task", "Mark a task as completed", Route::CompleteTask, schema::<IdArgs>)
        .audited("complete", "task"),
    ToolDef::new("delete_task", "Soft-delete a task", Route::Delete(Task), schema::<IdArgs>)
        .audited("delete", "task"),
    ToolDef::new("restore_task", "Restore a soft-deleted task", Route::Restore(Task), schema::<IdArgs>)
        .audited("restore", "task"),
    // Reminders
    ToolDef::new("list_reminders", "List reminders, optionally by status or linked record", Route::List(Reminder), schema::<ListRemindersArgs>),
    ToolDef::new("get_reminder", "Get one reminder by id", Route::Get(Reminder), schema::<IdArgs>),
    ToolDef::new("create_reminder", "Create a reminder", Route::Create(Reminder), schema::<NewReminder>)
        .audited("create", "reminder"),
    ToolDef::new("update_reminder", "Update fields of a reminder", Route::Update(Reminder), schema::<ReminderUpdate>)
        .audited("update", "reminder"),
    ToolDef::new("dismiss_reminder", "Dismiss a reminder", Route::DismissReminder, schema::<IdArgs>)
        .audited("dismiss", "reminder"),
    ToolDef::new("delete_reminder", "Soft-delete a reminder", Route::Delete(Reminder), schema::<IdArgs>)
        .audited("delete", "reminder"),
    ToolDef::new("restore_reminder", "Restore a soft-deleted reminder", Route::Restore(Reminder), schema::<IdArgs>)
        .audited("restore", "reminder"),
    // Cross-cutting
    ToolDef::new("search", "Search accounts, contacts, opportunities, tasks and reminders by text", Route::Search, schema::<SearchArgs>),
    ToolDef::new("get_pipeline_summary", "Opportunity counts and amounts per stage", Route::PipelineSummary, schema::<EmptyArgs>),
    ToolDef::new("get_activity_feed", "Recent changes in this workspace, newest first", Route::ActivityFeed, schema::<ActivityArgs>),
    ToolDef::new("get_overdue_items", "Open tasks past their due date and reminders that are due", Route::OverdueItems, schema::<OverdueArgs>),
    ToolDef::new("get_current_user", "The signed-in user and their workspace", Route::CurrentUser, schema::<EmptyArgs>),
    // Administration
    ToolDef::new("get_tenant", "Workspace details", Route::GetTenant, schema::<EmptyArgs>),
    ToolDef::new("update_tenant", "Rename the workspace", Route::UpdateTenant, schema::<UpdateTenantArgs>)
        .admin()
        .audited("update", "tenant"),
    ToolDef::new("list_users", "List users of the workspace", Route::ListUsers, schema::<EmptyArgs>)
        .admin(),
    ToolDef::new("invite_user", "Add a user to the workspace", Route::InviteUser, schema::<InviteUserArgs>)
        .admin()
        .audited("invite", "user"),
    ToolDef::new("update_user_role", "Change a user's role", Route::UpdateUserRole, schema::<UpdateUserRoleArgs>)
        .admin()
        .audited("update_role", "user"),
    ToolDef::new("deactivate_user", "Deactivate a user", Route::DeactivateUser, schema::<UserIdArgs>)
        .admin()
        .audited("deactivate", "user"),
];

/// Rendered `tools/list` payload.
pub static TOOL_LIST: LazyLock<Value> =
    LazyLock::new(|| Value::Array(CATALOG.iter().map(ToolDef::to_value).collect()));

pub fn find(name: &str) -> Option<&'static ToolDef> {
    CATALOG.iter().find(|t| t.name == name)
}
