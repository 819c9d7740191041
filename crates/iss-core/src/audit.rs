//! Audit trail entries.
//!
//! Every mutation made through [`crate::store::CaseloadStore`] appends one or
//! more entries in the same transaction as the change itself. Entries are
//! append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
  Child,
  Staff,
  Assignment,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
  Created,
  Updated,
  Deleted,
  BulkUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
  pub audit_id:    Uuid,
  pub entity_type: EntityType,
  pub entity_id:   Uuid,
  pub action:      AuditAction,
  /// Set for field-level `updated` entries.
  pub field_name:  Option<String>,
  pub old_value:   Option<String>,
  pub new_value:   Option<String>,
  pub metadata:    serde_json::Value,
  /// Who performed the change, if known.
  pub actor:       Option<Uuid>,
  pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
  /// An entry with no field change and empty metadata; `recorded_at` is now.
  pub fn new(
    entity_type: EntityType,
    entity_id: Uuid,
    action: AuditAction,
  ) -> Self {
    Self {
      audit_id: Uuid::new_v4(),
      entity_type,
      entity_id,
      action,
      field_name: None,
      old_value: None,
      new_value: None,
      metadata: serde_json::Value::Object(Default::default()),
      actor: None,
      recorded_at: Utc::now(),
    }
  }

  /// A field-level `updated` entry.
  pub fn field_change(
    entity_type: EntityType,
    entity_id: Uuid,
    field: &str,
    old: impl ToString,
    new: impl ToString,
  ) -> Self {
    Self {
      field_name: Some(field.to_owned()),
      old_value: Some(old.to_string()),
      new_value: Some(new.to_string()),
      ..Self::new(entity_type, entity_id, AuditAction::Updated)
    }
  }

  pub fn with_actor(mut self, actor: Option<Uuid>) -> Self {
    self.actor = actor;
    self
  }

  pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
    self.metadata = metadata;
    self
  }
}
