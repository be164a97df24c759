//! Tool argument shapes.
//!
//! Every type here is both the deserialization target for a tool's arguments
//! and the source of that tool's published JSON Schema.

use chrono::{DateTime, NaiveDate};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::CrmError;
use super::entities::{EntityKind, LinkedEntity};
use crate::credentials::Role;

/// Deserialize tool arguments, reporting shape errors as `VALIDATION_ERROR`.
/// Absent arguments are read as an empty object.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, CrmError> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| CrmError::validation(format!("Invalid arguments: {e}")))
}

/// Serialize an input into document fields, dropping unset values.
pub fn into_fields<T: Serialize>(input: &T) -> Result<Map<String, Value>, CrmError> {
    match serde_json::to_value(input) {
        Ok(Value::Object(mut map)) => {
            map.retain(|_, v| !v.is_null());
            Ok(map)
        }
        Ok(_) => Err(CrmError::internal("input did not serialize to an object")),
        Err(e) => Err(CrmError::internal(format!("input serialization failed: {e}"))),
    }
}

/// Input checks that need no store access.
pub trait Validate {
    fn validate(&self) -> Result<(), CrmError>;
}

fn require(field: &str, value: &str) -> Result<(), CrmError> {
    if value.trim().is_empty() {
        return Err(CrmError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_opt(field: &str, value: Option<&String>) -> Result<(), CrmError> {
    match value {
        Some(v) => require(field, v),
        None => Ok(()),
    }
}

fn check_date(field: &str, value: Option<&String>) -> Result<(), CrmError> {
    if let Some(v) = value
        && NaiveDate::parse_from_str(v, "%Y-%m-%d").is_err()
    {
        return Err(CrmError::validation(format!("{field} must be a date (YYYY-MM-DD), got {v}")));
    }
    Ok(())
}

fn check_datetime(field: &str, value: Option<&String>) -> Result<(), CrmError> {
    if let Some(v) = value
        && DateTime::parse_from_rfc3339(v).is_err()
    {
        return Err(CrmError::validation(format!("{field} must be an RFC 3339 timestamp, got {v}")));
    }
    Ok(())
}

fn check_email(field: &str, value: Option<&String>) -> Result<(), CrmError> {
    if let Some(v) = value {
        let valid = v
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(CrmError::validation(format!("{field} is not a valid email: {v}")));
        }
    }
    Ok(())
}

fn check_amount(value: Option<f64>) -> Result<(), CrmError> {
    if let Some(amount) = value
        && !(amount.is_finite() && amount >= 0.0)
    {
        return Err(CrmError::validation("amount must be a non-negative number"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Pagination controls shared by every list tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageArgs {
    /// Cursor returned as `nextCursor` by the previous page.
    pub cursor: Option<String>,
    /// Page size, 1–200 (default 50).
    pub limit: Option<usize>,
    /// Include soft-deleted records.
    pub include_deleted: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct IdArgs {
    /// Record id.
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteArgs {
    /// Record id.
    pub id: String,
    /// Accounts only: also delete dependent contacts, opportunities, tasks and reminders.
    pub force: Option<bool>,
}

/// No arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct EmptyArgs {}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListAccountsArgs {
    #[serde(flatten)]
    pub page: PageArgs,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl Validate for NewAccount {
    fn validate(&self) -> Result<(), CrmError> {
        require("name", &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    #[serde(skip_serializing)]
    pub id: String,
    pub name: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl Validate for AccountUpdate {
    fn validate(&self) -> Result<(), CrmError> {
        require_opt("name", self.name.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListContactsArgs {
    #[serde(flatten)]
    pub page: PageArgs,
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    /// Account the contact works for.
    pub account_id: Option<String>,
}

impl Validate for NewContact {
    fn validate(&self) -> Result<(), CrmError> {
        require("firstName", &self.first_name)?;
        check_email("email", self.email.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    #[serde(skip_serializing)]
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub account_id: Option<String>,
}

impl Validate for ContactUpdate {
    fn validate(&self) -> Result<(), CrmError> {
        require_opt("firstName", self.first_name.as_ref())?;
        check_email("email", self.email.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListOpportunitiesArgs {
    #[serde(flatten)]
    pub page: PageArgs,
    pub account_id: Option<String>,
    /// One of lead, qualified, proposal, negotiation, closed_won, closed_lost.
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewOpportunity {
    pub name: String,
    pub account_id: String,
    pub contact_id: Option<String>,
    /// One of lead, qualified, proposal, negotiation, closed_won, closed_lost (default lead).
    pub stage: Option<String>,
    pub amount: Option<f64>,
    /// Expected close date (YYYY-MM-DD).
    pub close_date: Option<String>,
    pub notes: Option<String>,
}

impl Validate for NewOpportunity {
    fn validate(&self) -> Result<(), CrmError> {
        require("name", &self.name)?;
        require("accountId", &self.account_id)?;
        check_amount(self.amount)?;
        check_date("closeDate", self.close_date.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityUpdate {
    #[serde(skip_serializing)]
    pub id: String,
    pub name: Option<String>,
    pub account_id: Option<String>,
    pub contact_id: Option<String>,
    /// One of lead, qualified, proposal, negotiation, closed_won, closed_lost.
    pub stage: Option<String>,
    pub amount: Option<f64>,
    pub close_date: Option<String>,
    pub notes: Option<String>,
}

impl Validate for OpportunityUpdate {
    fn validate(&self) -> Result<(), CrmError> {
        require_opt("name", self.name.as_ref())?;
        check_amount(self.amount)?;
        check_date("closeDate", self.close_date.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksArgs {
    #[serde(flatten)]
    pub page: PageArgs,
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<String>,
    pub linked_entity: Option<LinkedEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    /// Due date (YYYY-MM-DD).
    pub due_date: Option<String>,
    pub priority: Option<Priority>,
    /// User the task is assigned to (defaults to the caller).
    pub assignee_id: Option<String>,
    pub linked_entity: Option<LinkedEntity>,
}

impl Validate for NewTask {
    fn validate(&self) -> Result<(), CrmError> {
        require("title", &self.title)?;
        check_date("dueDate", self.due_date.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(skip_serializing)]
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<String>,
    pub linked_entity: Option<LinkedEntity>,
}

impl Validate for TaskUpdate {
    fn validate(&self) -> Result<(), CrmError> {
        require_opt("title", self.title.as_ref())?;
        check_date("dueDate", self.due_date.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Reminders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Dismissed,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListRemindersArgs {
    #[serde(flatten)]
    pub page: PageArgs,
    pub status: Option<ReminderStatus>,
    pub linked_entity: Option<LinkedEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewReminder {
    pub message: String,
    /// When to remind (RFC 3339 timestamp).
    pub remind_at: String,
    pub linked_entity: Option<LinkedEntity>,
}

impl Validate for NewReminder {
    fn validate(&self) -> Result<(), CrmError> {
        require("message", &self.message)?;
        check_datetime("remindAt", Some(&self.remind_at))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderUpdate {
    #[serde(skip_serializing)]
    pub id: String,
    pub message: Option<String>,
    pub remind_at: Option<String>,
    pub linked_entity: Option<LinkedEntity>,
}

impl Validate for ReminderUpdate {
    fn validate(&self) -> Result<(), CrmError> {
        require_opt("message", self.message.as_ref())?;
        check_datetime("remindAt", self.remind_at.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Cross-cutting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Text to look for in any field.
    pub query: String,
    /// Restrict to these entity types (default: all).
    pub types: Option<Vec<EntityKind>>,
    /// Maximum results per type, 1–200 (default 20).
    pub limit: Option<usize>,
}

impl Validate for SearchArgs {
    fn validate(&self) -> Result<(), CrmError> {
        require("query", &self.query)
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityArgs {
    #[serde(flatten)]
    pub page: PageArgs,
    /// Only entries for this entity type (e.g. "account", "user").
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverdueArgs {
    /// Reference time (RFC 3339, default now).
    pub as_of: Option<String>,
}

impl Validate for OverdueArgs {
    fn validate(&self) -> Result<(), CrmError> {
        check_datetime("asOf", self.as_of.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateTenantArgs {
    pub name: String,
}

impl Validate for UpdateTenantArgs {
    fn validate(&self) -> Result<(), CrmError> {
        require("name", &self.name)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InviteUserArgs {
    pub email: String,
    pub name: Option<String>,
    /// admin or member (default member).
    pub role: Option<Role>,
}

impl Validate for InviteUserArgs {
    fn validate(&self) -> Result<(), CrmError> {
        require("email", &self.email)?;
        check_email("email", Some(&self.email))
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRoleArgs {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserIdArgs {
    pub user_id: String,
}
