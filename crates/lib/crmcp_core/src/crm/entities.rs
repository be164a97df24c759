//! Entity kinds, linked-entity references and opportunity stages.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{CrmError, ErrorCode};

/// Collection holding audit entries written after mutating tool calls.
pub const AUDIT_LOG_COLLECTION: &str = "audit_log";

/// CRM entity collections reachable through tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Account,
    Contact,
    Opportunity,
    Task,
    Reminder,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Account,
        EntityKind::Contact,
        EntityKind::Opportunity,
        EntityKind::Task,
        EntityKind::Reminder,
    ];

    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Account => "accounts",
            EntityKind::Contact => "contacts",
            EntityKind::Opportunity => "opportunities",
            EntityKind::Task => "tasks",
            EntityKind::Reminder => "reminders",
        }
    }

    /// Singular name used in tool names and audit entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::Contact => "contact",
            EntityKind::Opportunity => "opportunity",
            EntityKind::Task => "task",
            EntityKind::Reminder => "reminder",
        }
    }

    /// Human label for messages.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Account => "Account",
            EntityKind::Contact => "Contact",
            EntityKind::Opportunity => "Opportunity",
            EntityKind::Task => "Task",
            EntityKind::Reminder => "Reminder",
        }
    }

    /// Field shown as the record's title in search results.
    pub fn title_field(&self) -> &'static str {
        match self {
            EntityKind::Account | EntityKind::Opportunity => "name",
            EntityKind::Contact => "firstName",
            EntityKind::Task => "title",
            EntityKind::Reminder => "message",
        }
    }
}

/// Kinds of record a task or reminder may be linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Account,
    Contact,
    Opportunity,
}

/// Link kind → entity it resolves against.
static LINK_TARGETS: [(LinkKind, EntityKind); 3] = [
    (LinkKind::Account, EntityKind::Account),
    (LinkKind::Contact, EntityKind::Contact),
    (LinkKind::Opportunity, EntityKind::Opportunity),
];

impl LinkKind {
    pub fn target(&self) -> EntityKind {
        LINK_TARGETS
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, entity)| *entity)
            .unwrap_or(EntityKind::Account)
    }

    pub fn as_str(&self) -> &'static str {
        self.target().as_str()
    }
}

/// Reference from a task or reminder to another record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LinkedEntity {
    #[serde(rename = "type")]
    pub kind: LinkKind,
    pub id: String,
}

/// Opportunity pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Lead,
        Stage::Qualified,
        Stage::Proposal,
        Stage::Negotiation,
        Stage::ClosedWon,
        Stage::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Lead => "lead",
            Stage::Qualified => "qualified",
            Stage::Proposal => "proposal",
            Stage::Negotiation => "negotiation",
            Stage::ClosedWon => "closed_won",
            Stage::ClosedLost => "closed_lost",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CrmError> {
        Stage::ALL
            .into_iter()
            .find(|s| s.as_str() == value)
            .ok_or_else(|| {
                CrmError::new(ErrorCode::InvalidStage, format!("Unknown stage: {value}"))
                    .with_details(serde_json::json!({
                        "allowed": Stage::ALL.iter().map(Stage::as_str).collect::<Vec<_>>(),
                    }))
            })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Stage::ClosedWon | Stage::ClosedLost)
    }

    /// Closed opportunities stay where they are.
    pub fn check_transition(from: Stage, to: Stage) -> Result<(), CrmError> {
        if from.is_closed() && from != to {
            return Err(CrmError::new(
                ErrorCode::InvalidStage,
                format!(
                    "Cannot move a {} opportunity to {}",
                    from.as_str(),
                    to.as_str()
                ),
            ));
        }
        Ok(())
    }
}
