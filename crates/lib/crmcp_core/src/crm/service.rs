// @zen-component: CRM-Service
//
//! Tenant-scoped CRM operations with validation.
//!
//! Every operation takes the caller's [`AuthContext`]; the tenant id it
//! carries scopes every store access, so records of other tenants are
//! indistinguishable from absent ones.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::entities::{AUDIT_LOG_COLLECTION, EntityKind, LinkedEntity, Stage};
use super::inputs::{
    AccountUpdate, ActivityArgs, ContactUpdate, InviteUserArgs, ListAccountsArgs,
    ListContactsArgs, ListOpportunitiesArgs, ListRemindersArgs, ListTasksArgs, NewAccount,
    NewContact, NewOpportunity, NewReminder, NewTask, OpportunityUpdate, OverdueArgs, PageArgs,
    Priority, ReminderStatus, ReminderUpdate, SearchArgs, TaskStatus, TaskUpdate,
    UpdateTenantArgs, UpdateUserRoleArgs, UserIdArgs, Validate, into_fields, parse_args,
};
use super::store::{Document, DocumentPatch, DocumentStore, ListQuery, MAX_PAGE_SIZE, Page};
use super::{CrmError, ErrorCode};
use crate::auth::AuthContext;
use crate::credentials::{CredentialStore, NewUser, Role, Tenant, User, UserUpdate};

/// Default number of search hits per entity type.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// One search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: String,
    pub title: String,
    pub record: Document,
}

/// Opportunity count and value for one stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTotals {
    pub stage: Stage,
    pub count: usize,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub stages: Vec<StageTotals>,
    pub open_count: usize,
    pub open_amount: f64,
    pub won_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueItems {
    pub as_of: DateTime<Utc>,
    pub tasks: Vec<Document>,
    pub reminders: Vec<Document>,
}

/// Live records referencing an account.
#[derive(Debug, Clone, Default)]
struct Dependents {
    contacts: Vec<Document>,
    opportunities: Vec<Document>,
    tasks: Vec<Document>,
    reminders: Vec<Document>,
}

impl Dependents {
    fn is_empty(&self) -> bool {
        self.contacts.is_empty()
            && self.opportunities.is_empty()
            && self.tasks.is_empty()
            && self.reminders.is_empty()
    }

    fn counts(&self) -> Value {
        json!({
            "contacts": self.contacts.len(),
            "opportunities": self.opportunities.len(),
            "tasks": self.tasks.len(),
            "reminders": self.reminders.len(),
        })
    }
}

/// The CRM collaborator behind every tool.
#[derive(Clone)]
pub struct CrmService {
    store: Arc<dyn DocumentStore>,
    credentials: Arc<dyn CredentialStore>,
}

impl CrmService {
    pub fn new(store: Arc<dyn DocumentStore>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { store, credentials }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Fetch a record that exists and is not soft-deleted.
    async fn live(
        &self,
        ctx: &AuthContext,
        kind: EntityKind,
        id: &str,
    ) -> Result<Document, CrmError> {
        self.store
            .get(&ctx.tenant_id, kind.collection(), id)
            .await?
            .filter(|d| !d.is_deleted())
            .ok_or_else(|| CrmError::not_found(kind.label(), id))
    }

    /// Check a reference field points at a live record of `kind`.
    async fn ensure_reference(
        &self,
        ctx: &AuthContext,
        field: &str,
        kind: EntityKind,
        id: &str,
    ) -> Result<(), CrmError> {
        match self.live(ctx, kind, id).await {
            Ok(_) => Ok(()),
            Err(e) if e.code == ErrorCode::NotFound => {
                let message = format!("{field} refers to an unknown {}: {id}", kind.as_str());
                let details = json!({ "field": field, "id": id });
                Err(CrmError::validation(message).with_details(details))
            }
            Err(e) => Err(e),
        }
    }

    async fn ensure_link(
        &self,
        ctx: &AuthContext,
        link: Option<&LinkedEntity>,
    ) -> Result<(), CrmError> {
        match link {
            Some(link) => {
                self.ensure_reference(ctx, "linkedEntity", link.kind.target(), &link.id)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Check an assignee is an active user of the caller's tenant.
    async fn ensure_assignee(&self, ctx: &AuthContext, user_id: &str) -> Result<(), CrmError> {
        let user = self
            .credentials
            .get_user(user_id)
            .await?
            .filter(|u| u.tenant_id == ctx.tenant_id && u.active);
        if user.is_none() {
            return Err(CrmError::validation(format!(
                "assigneeId refers to an unknown or inactive user: {user_id}"
            )));
        }
        Ok(())
    }

    /// Every matching record, across pages.
    async fn collect_all(
        &self,
        tenant_id: &str,
        collection: &str,
        mut query: ListQuery,
    ) -> Result<Vec<Document>, CrmError> {
        query.offset = 0;
        query.limit = MAX_PAGE_SIZE;
        let mut all = Vec::new();
        loop {
            let page = self.store.list(tenant_id, collection, &query).await?;
            all.extend(page.items);
            if page.next_cursor.is_none() {
                return Ok(all);
            }
            query.offset += query.limit;
        }
    }

    fn page_query(page: &PageArgs) -> Result<ListQuery, CrmError> {
        let mut query = ListQuery::page(page.cursor.as_deref(), page.limit)?;
        query.include_deleted = page.include_deleted.unwrap_or(false);
        Ok(query)
    }

    async fn insert(
        &self,
        ctx: &AuthContext,
        kind: EntityKind,
        mut fields: Map<String, Value>,
    ) -> Result<Document, CrmError> {
        fields.insert("createdBy".into(), json!(ctx.user_id));
        let doc = self
            .store
            .insert(&ctx.tenant_id, kind.collection(), fields)
            .await?;
        info!(tenant_id = %ctx.tenant_id, id = %doc.id, "created {}", kind.as_str());
        Ok(doc)
    }

    async fn apply(
        &self,
        ctx: &AuthContext,
        kind: EntityKind,
        id: &str,
        patch: DocumentPatch,
    ) -> Result<Document, CrmError> {
        self.store
            .patch(&ctx.tenant_id, kind.collection(), id, patch)
            .await?
            .ok_or_else(|| CrmError::not_found(kind.label(), id))
    }

    // -----------------------------------------------------------------------
    // Entity CRUD
    // -----------------------------------------------------------------------

    pub async fn get(
        &self,
        ctx: &AuthContext,
        kind: EntityKind,
        id: &str,
    ) -> Result<Document, CrmError> {
        self.live(ctx, kind, id).await
    }

    /// List records of `kind`; `args` is the kind's list argument shape.
    pub async fn list(
        &self,
        ctx: &AuthContext,
        kind: EntityKind,
        args: Value,
    ) -> Result<Page, CrmError> {
        let query = match kind {
            EntityKind::Account => {
                let args: ListAccountsArgs = parse_args(args)?;
                let mut query = Self::page_query(&args.page)?;
                if let Some(industry) = args.industry {
                    query = query.filter("industry", industry);
                }
                query
            }
            EntityKind::Contact => {
                let args: ListContactsArgs = parse_args(args)?;
                let mut query = Self::page_query(&args.page)?;
                if let Some(account_id) = args.account_id {
                    query = query.filter("accountId", account_id);
                }
                query
            }
            EntityKind::Opportunity => {
                let args: ListOpportunitiesArgs = parse_args(args)?;
                let mut query = Self::page_query(&args.page)?;
                if let Some(account_id) = args.account_id {
                    query = query.filter("accountId", account_id);
                }
                if let Some(stage) = args.stage {
                    query = query.filter("stage", Stage::parse(&stage)?.as_str());
                }
                query
            }
            EntityKind::Task => {
                let args: ListTasksArgs = parse_args(args)?;
                let mut query = Self::page_query(&args.page)?;
                if let Some(status) = args.status {
                    query = query.filter("status", json!(status));
                }
                if let Some(assignee) = args.assignee_id {
                    query = query.filter("assigneeId", assignee);
                }
                if let Some(link) = args.linked_entity {
                    query = query.filter("linkedEntity", json!(link));
                }
                query
            }
            EntityKind::Reminder => {
                let args: ListRemindersArgs = parse_args(args)?;
                let mut query = Self::page_query(&args.page)?;
                if let Some(status) = args.status {
                    query = query.filter("status", json!(status));
                }
                if let Some(link) = args.linked_entity {
                    query = query.filter("linkedEntity", json!(link));
                }
                query
            }
        };
        self.store
            .list(&ctx.tenant_id, kind.collection(), &query)
            .await
    }

    /// Create a record of `kind`; `args` is the kind's creation shape.
    pub async fn create(
        &self,
        ctx: &AuthContext,
        kind: EntityKind,
        args: Value,
    ) -> Result<Document, CrmError> {
        let fields = match kind {
            EntityKind::Account => {
                let input: NewAccount = parse_args(args)?;
                input.validate()?;
                into_fields(&input)?
            }
            EntityKind::Contact => {
                let input: NewContact = parse_args(args)?;
                input.validate()?;
                if let Some(account_id) = &input.account_id {
                    self.ensure_reference(ctx, "accountId", EntityKind::Account, account_id)
                        .await?;
                }
                into_fields(&input)?
            }
            EntityKind::Opportunity => {
                let input: NewOpportunity = parse_args(args)?;
                input.validate()?;
                let stage = match &input.stage {
                    Some(stage) => Stage::parse(stage)?,
                    None => Stage::Lead,
                };
                self.ensure_reference(ctx, "accountId", EntityKind::Account, &input.account_id)
                    .await?;
                if let Some(contact_id) = &input.contact_id {
                    self.ensure_reference(ctx, "contactId", EntityKind::Contact, contact_id)
                        .await?;
                }
                let mut fields = into_fields(&input)?;
                fields.insert("stage".into(), json!(stage.as_str()));
                fields
            }
            EntityKind::Task => {
                let mut input: NewTask = parse_args(args)?;
                input.validate()?;
                let assignee = input
                    .assignee_id
                    .get_or_insert_with(|| ctx.user_id.clone())
                    .clone();
                self.ensure_assignee(ctx, &assignee).await?;
                self.ensure_link(ctx, input.linked_entity.as_ref()).await?;
                input.priority.get_or_insert(Priority::Medium);
                let mut fields = into_fields(&input)?;
                fields.insert("status".into(), json!(TaskStatus::Open));
                fields
            }
            EntityKind::Reminder => {
                let input: NewReminder = parse_args(args)?;
                input.validate()?;
                self.ensure_link(ctx, input.linked_entity.as_ref()).await?;
                let mut fields = into_fields(&input)?;
                fields.insert("status".into(), json!(ReminderStatus::Pending));
                fields.insert("userId".into(), json!(ctx.user_id));
                fields
            }
        };
        self.insert(ctx, kind, fields).await
    }

    /// Update a live record of `kind`; `args` carries `id` plus changed fields.
    pub async fn update(
        &self,
        ctx: &AuthContext,
        kind: EntityKind,
        args: Value,
    ) -> Result<Document, CrmError> {
        let (id, fields) = match kind {
            EntityKind::Account => {
                let input: AccountUpdate = parse_args(args)?;
                input.validate()?;
                self.live(ctx, kind, &input.id).await?;
                (input.id.clone(), into_fields(&input)?)
            }
            EntityKind::Contact => {
                let input: ContactUpdate = parse_args(args)?;
                input.validate()?;
                self.live(ctx, kind, &input.id).await?;
                if let Some(account_id) = &input.account_id {
                    self.ensure_reference(ctx, "accountId", EntityKind::Account, account_id)
                        .await?;
                }
                (input.id.clone(), into_fields(&input)?)
            }
            EntityKind::Opportunity => {
                let input: OpportunityUpdate = parse_args(args)?;
                input.validate()?;
                let existing = self.live(ctx, kind, &input.id).await?;
                let mut fields = into_fields(&input)?;
                if let Some(stage) = &input.stage {
                    let to = Stage::parse(stage)?;
                    let from = existing
                        .str_field("stage")
                        .and_then(|s| Stage::parse(s).ok())
                        .unwrap_or(Stage::Lead);
                    Stage::check_transition(from, to)?;
                    fields.insert("stage".into(), json!(to.as_str()));
                }
                if let Some(account_id) = &input.account_id {
                    self.ensure_reference(ctx, "accountId", EntityKind::Account, account_id)
                        .await?;
                }
                if let Some(contact_id) = &input.contact_id {
                    self.ensure_reference(ctx, "contactId", EntityKind::Contact, contact_id)
                        .await?;
                }
                (input.id.clone(), fields)
            }
            EntityKind::Task => {
                let input: TaskUpdate = parse_args(args)?;
                input.validate()?;
                self.live(ctx, kind, &input.id).await?;
                if let Some(assignee) = &input.assignee_id {
                    self.ensure_assignee(ctx, assignee).await?;
                }
                self.ensure_link(ctx, input.linked_entity.as_ref()).await?;
                (input.id.clone(), into_fields(&input)?)
            }
            EntityKind::Reminder => {
                let input: ReminderUpdate = parse_args(args)?;
                input.validate()?;
                self.live(ctx, kind, &input.id).await?;
                self.ensure_link(ctx, input.linked_entity.as_ref()).await?;
                (input.id.clone(), into_fields(&input)?)
            }
        };
        if fields.is_empty() {
            return Err(CrmError::validation("No fields to update"));
        }
        self.apply(ctx, kind, &id, DocumentPatch::set(fields)).await
    }

    async fn account_dependents(
        &self,
        ctx: &AuthContext,
        account_id: &str,
    ) -> Result<Dependents, CrmError> {
        let tenant = ctx.tenant_id.as_str();
        let by_account = ListQuery::default().filter("accountId", account_id);
        let link = json!({ "type": "account", "id": account_id });
        let by_link = ListQuery::default().filter("linkedEntity", link);
        Ok(Dependents {
            contacts: self
                .collect_all(tenant, EntityKind::Contact.collection(), by_account.clone())
                .await?,
            opportunities: self
                .collect_all(tenant, EntityKind::Opportunity.collection(), by_account)
                .await?,
            tasks: self
                .collect_all(tenant, EntityKind::Task.collection(), by_link.clone())
                .await?,
            reminders: self
                .collect_all(tenant, EntityKind::Reminder.collection(), by_link)
                .await?,
        })
    }

    /// Soft-delete a live record. Accounts with live dependents need `force`,
    /// which soft-deletes the dependents too.
    pub async fn delete(
        &self,
        ctx: &AuthContext,
        kind: EntityKind,
        id: &str,
        force: bool,
    ) -> Result<Document, CrmError> {
        self.live(ctx, kind, id).await?;
        let now = Utc::now();

        if kind == EntityKind::Account {
            let dependents = self.account_dependents(ctx, id).await?;
            if !dependents.is_empty() {
                if !force {
                    return Err(CrmError::new(
                        ErrorCode::DeletionHasDependencies,
                        "Account has dependent records; pass force to delete them too",
                    )
                    .with_details(dependents.counts()));
                }
                let cascade = [
                    (EntityKind::Contact, &dependents.contacts),
                    (EntityKind::Opportunity, &dependents.opportunities),
                    (EntityKind::Task, &dependents.tasks),
                    (EntityKind::Reminder, &dependents.reminders),
                ];
                for (dep_kind, docs) in cascade {
                    for doc in docs {
                        self.apply(ctx, dep_kind, &doc.id, DocumentPatch::soft_delete(now))
                            .await?;
                    }
                }
                let counts = dependents.counts();
                info!(account_id = id, dependents = %counts, "cascaded account deletion");
            }
        }

        self.apply(ctx, kind, id, DocumentPatch::soft_delete(now))
            .await
    }

    /// Undo a soft delete. Restoring a live record returns it unchanged.
    pub async fn restore(
        &self,
        ctx: &AuthContext,
        kind: EntityKind,
        id: &str,
    ) -> Result<Document, CrmError> {
        let doc = self
            .store
            .get(&ctx.tenant_id, kind.collection(), id)
            .await?
            .ok_or_else(|| CrmError::not_found(kind.label(), id))?;
        if !doc.is_deleted() {
            return Ok(doc);
        }
        self.apply(ctx, kind, id, DocumentPatch::restore()).await
    }

    pub async fn complete_task(&self, ctx: &AuthContext, id: &str) -> Result<Document, CrmError> {
        let task = self.live(ctx, EntityKind::Task, id).await?;
        if task.fields.get("status") == Some(&json!(TaskStatus::Completed)) {
            return Ok(task);
        }
        let mut set = Map::new();
        set.insert("status".into(), json!(TaskStatus::Completed));
        set.insert("completedAt".into(), json!(Utc::now()));
        self.apply(ctx, EntityKind::Task, id, DocumentPatch::set(set))
            .await
    }

    pub async fn dismiss_reminder(
        &self,
        ctx: &AuthContext,
        id: &str,
    ) -> Result<Document, CrmError> {
        let reminder = self.live(ctx, EntityKind::Reminder, id).await?;
        if reminder.fields.get("status") == Some(&json!(ReminderStatus::Dismissed)) {
            return Ok(reminder);
        }
        let mut set = Map::new();
        set.insert("status".into(), json!(ReminderStatus::Dismissed));
        set.insert("dismissedAt".into(), json!(Utc::now()));
        self.apply(ctx, EntityKind::Reminder, id, DocumentPatch::set(set))
            .await
    }

    // -----------------------------------------------------------------------
    // Cross-cutting
    // -----------------------------------------------------------------------

    pub async fn search(
        &self,
        ctx: &AuthContext,
        args: SearchArgs,
    ) -> Result<Vec<SearchHit>, CrmError> {
        args.validate()?;
        let limit = args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let mut query = ListQuery::page(None, Some(limit))?;
        query.text = Some(args.query.trim().to_string());
        let kinds = args.types.unwrap_or_else(|| EntityKind::ALL.to_vec());

        let mut hits = Vec::new();
        for kind in kinds {
            let page = self
                .store
                .list(&ctx.tenant_id, kind.collection(), &query)
                .await?;
            hits.extend(page.items.into_iter().map(|doc| SearchHit {
                kind,
                id: doc.id.clone(),
                title: search_title(kind, &doc),
                record: doc,
            }));
        }
        debug!(query = %args.query, hits = hits.len(), "search");
        Ok(hits)
    }

    pub async fn pipeline_summary(&self, ctx: &AuthContext) -> Result<PipelineSummary, CrmError> {
        let opportunities = self
            .collect_all(
                &ctx.tenant_id,
                EntityKind::Opportunity.collection(),
                ListQuery::default(),
            )
            .await?;

        let mut stages: Vec<StageTotals> = Stage::ALL
            .into_iter()
            .map(|stage| StageTotals {
                stage,
                count: 0,
                total_amount: 0.0,
            })
            .collect();
        for opp in &opportunities {
            let Some(stage) = opp.str_field("stage").and_then(|s| Stage::parse(s).ok()) else {
                continue;
            };
            let amount = opp
                .fields
                .get("amount")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            if let Some(totals) = stages.iter_mut().find(|t| t.stage == stage) {
                totals.count += 1;
                totals.total_amount += amount;
            }
        }

        let open = stages.iter().filter(|t| !t.stage.is_closed());
        let open_count = open.clone().map(|t| t.count).sum();
        let open_amount = open.map(|t| t.total_amount).sum();
        let won_amount = stages
            .iter()
            .filter(|t| t.stage == Stage::ClosedWon)
            .map(|t| t.total_amount)
            .sum();
        Ok(PipelineSummary {
            stages,
            open_count,
            open_amount,
            won_amount,
        })
    }

    /// Audit entries, newest first.
    pub async fn activity_feed(
        &self,
        ctx: &AuthContext,
        args: ActivityArgs,
    ) -> Result<Page, CrmError> {
        let mut query = ListQuery::page(args.page.cursor.as_deref(), args.page.limit)?;
        query.newest_first = true;
        if let Some(entity_type) = args.entity_type {
            query = query.filter("entityType", entity_type);
        }
        if let Some(entity_id) = args.entity_id {
            query = query.filter("entityId", entity_id);
        }
        self.store
            .list(&ctx.tenant_id, AUDIT_LOG_COLLECTION, &query)
            .await
    }

    /// Open tasks due before today and pending reminders whose time has come.
    pub async fn overdue_items(
        &self,
        ctx: &AuthContext,
        args: OverdueArgs,
    ) -> Result<OverdueItems, CrmError> {
        args.validate()?;
        let as_of = match &args.as_of {
            Some(value) => DateTime::parse_from_rfc3339(value)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| CrmError::validation(format!("asOf is not a timestamp: {value}")))?,
            None => Utc::now(),
        };
        let today = as_of.date_naive();

        let tasks = self
            .collect_all(
                &ctx.tenant_id,
                EntityKind::Task.collection(),
                ListQuery::default().filter("status", json!(TaskStatus::Open)),
            )
            .await?
            .into_iter()
            .filter(|t| {
                t.str_field("dueDate")
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                    .is_some_and(|due| due < today)
            })
            .collect();

        let reminders = self
            .collect_all(
                &ctx.tenant_id,
                EntityKind::Reminder.collection(),
                ListQuery::default().filter("status", json!(ReminderStatus::Pending)),
            )
            .await?
            .into_iter()
            .filter(|r| {
                r.str_field("remindAt")
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .is_some_and(|at| at <= as_of)
            })
            .collect();

        Ok(OverdueItems {
            as_of,
            tasks,
            reminders,
        })
    }

    pub async fn current_user(&self, ctx: &AuthContext) -> Result<Value, CrmError> {
        let tenant = self.credentials.get_tenant(&ctx.tenant_id).await?;
        Ok(json!({ "user": ctx.user, "tenant": tenant }))
    }

    /// Append an audit entry.
    pub async fn record_activity(
        &self,
        tenant_id: &str,
        actor_id: &str,
        action: &str,
        entity_type: &str,
        entity_id: Option<&str>,
    ) -> Result<Document, CrmError> {
        let mut fields = Map::new();
        fields.insert("action".into(), json!(action));
        fields.insert("entityType".into(), json!(entity_type));
        fields.insert("entityId".into(), json!(entity_id));
        fields.insert("actorId".into(), json!(actor_id));
        self.store
            .insert(tenant_id, AUDIT_LOG_COLLECTION, fields)
            .await
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    pub async fn get_tenant(&self, ctx: &AuthContext) -> Result<Tenant, CrmError> {
        self.credentials
            .get_tenant(&ctx.tenant_id)
            .await?
            .ok_or_else(|| CrmError::not_found("Tenant", &ctx.tenant_id))
    }

    pub async fn update_tenant(
        &self,
        ctx: &AuthContext,
        args: UpdateTenantArgs,
    ) -> Result<Tenant, CrmError> {
        args.validate()?;
        self.credentials
            .update_tenant(&ctx.tenant_id, args.name.trim())
            .await?
            .ok_or_else(|| CrmError::not_found("Tenant", &ctx.tenant_id))
    }

    pub async fn list_users(&self, ctx: &AuthContext) -> Result<Vec<User>, CrmError> {
        Ok(self.credentials.list_users(&ctx.tenant_id).await?)
    }

    pub async fn invite_user(
        &self,
        ctx: &AuthContext,
        args: InviteUserArgs,
    ) -> Result<User, CrmError> {
        args.validate()?;
        let user = self
            .credentials
            .insert_user(NewUser {
                tenant_id: ctx.tenant_id.clone(),
                email: args.email,
                name: args.name,
                role: args.role.unwrap_or(Role::Member),
            })
            .await?;
        info!(tenant_id = %ctx.tenant_id, user_id = %user.id, "invited user");
        Ok(user)
    }

    pub async fn update_user_role(
        &self,
        ctx: &AuthContext,
        args: UpdateUserRoleArgs,
    ) -> Result<User, CrmError> {
        if args.user_id == ctx.user_id {
            return Err(CrmError::validation("You cannot change your own role"));
        }
        self.update_user(
            ctx,
            &args.user_id,
            UserUpdate {
                role: Some(args.role),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn deactivate_user(
        &self,
        ctx: &AuthContext,
        args: UserIdArgs,
    ) -> Result<User, CrmError> {
        if args.user_id == ctx.user_id {
            return Err(CrmError::validation("You cannot deactivate yourself"));
        }
        self.update_user(
            ctx,
            &args.user_id,
            UserUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
    }

    async fn update_user(
        &self,
        ctx: &AuthContext,
        user_id: &str,
        update: UserUpdate,
    ) -> Result<User, CrmError> {
        self.credentials
            .update_user(&ctx.tenant_id, user_id, update)
            .await?
            .ok_or_else(|| CrmError::not_found("User", user_id))
    }
}

fn search_title(kind: EntityKind, doc: &Document) -> String {
    let primary = doc.str_field(kind.title_field()).unwrap_or_default();
    match (kind, doc.str_field("lastName")) {
        (EntityKind::Contact, Some(last)) => format!("{primary} {last}"),
        _ => primary.to_string(),
    }
}
