//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision,
//! calendar dates as `YYYY-MM-DD`, status enums as their snake_case names and
//! UUIDs as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound as _, Utc};
use iss_core::{
  assignment::Assignment,
  audit::{AuditAction, AuditEntry, EntityType},
  child::{CaseloadStatus, Child, ChildStatus, OverallStatus},
  staff::{Staff, StaffRole},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at the precision the store keeps, so values handed back
/// to callers compare equal to what a later read returns.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawChild::from_row`].
pub const CHILD_COLUMNS: &str = "child_id, first_name, last_name, date_of_birth,
   overall_status, caseload_status, on_hold, start_date, end_date,
   discharge_reason, created_at, updated_at";

/// Raw values read directly from a `children` row.
pub struct RawChild {
  pub child_id:         String,
  pub first_name:       String,
  pub last_name:        String,
  pub date_of_birth:    String,
  pub overall_status:   String,
  pub caseload_status:  String,
  pub on_hold:          bool,
  pub start_date:       String,
  pub end_date:         Option<String>,
  pub discharge_reason: Option<String>,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawChild {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      child_id:         row.get(0)?,
      first_name:       row.get(1)?,
      last_name:        row.get(2)?,
      date_of_birth:    row.get(3)?,
      overall_status:   row.get(4)?,
      caseload_status:  row.get(5)?,
      on_hold:          row.get(6)?,
      start_date:       row.get(7)?,
      end_date:         row.get(8)?,
      discharge_reason: row.get(9)?,
      created_at:       row.get(10)?,
      updated_at:       row.get(11)?,
    })
  }

  pub fn into_child(self) -> Result<Child> {
    Ok(Child {
      child_id:         decode_uuid(&self.child_id)?,
      first_name:       self.first_name,
      last_name:        self.last_name,
      date_of_birth:    decode_date(&self.date_of_birth)?,
      status:           ChildStatus {
        overall:  OverallStatus::parse(&self.overall_status)?,
        caseload: CaseloadStatus::parse(&self.caseload_status)?,
        on_hold:  self.on_hold,
      },
      start_date:       decode_date(&self.start_date)?,
      end_date:         self.end_date.as_deref().map(decode_date).transpose()?,
      discharge_reason: self.discharge_reason,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

/// The three status columns of a `children` row.
pub struct RawStatus {
  pub overall_status:  String,
  pub caseload_status: String,
  pub on_hold:         bool,
}

impl RawStatus {
  pub fn into_status(self) -> Result<ChildStatus> {
    Ok(ChildStatus {
      overall:  OverallStatus::parse(&self.overall_status)?,
      caseload: CaseloadStatus::parse(&self.caseload_status)?,
      on_hold:  self.on_hold,
    })
  }
}

/// Raw values read directly from a `staff` row.
pub struct RawStaff {
  pub staff_id:     String,
  pub display_name: String,
  pub role:         String,
  pub created_at:   String,
}

impl RawStaff {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      staff_id:     row.get(0)?,
      display_name: row.get(1)?,
      role:         row.get(2)?,
      created_at:   row.get(3)?,
    })
  }

  pub fn into_staff(self) -> Result<Staff> {
    Ok(Staff {
      staff_id:     decode_uuid(&self.staff_id)?,
      display_name: self.display_name,
      role:         StaffRole::parse(&self.role)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawAssignment::from_row`].
pub const ASSIGNMENT_COLUMNS: &str = "assignment_id, child_id, staff_id,
   is_primary, assigned_at, unassigned_at, assigned_by";

/// Raw values read directly from an `assignments` row.
pub struct RawAssignment {
  pub assignment_id: String,
  pub child_id:      String,
  pub staff_id:      String,
  pub is_primary:    bool,
  pub assigned_at:   String,
  pub unassigned_at: Option<String>,
  pub assigned_by:   Option<String>,
}

impl RawAssignment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assignment_id: row.get(0)?,
      child_id:      row.get(1)?,
      staff_id:      row.get(2)?,
      is_primary:    row.get(3)?,
      assigned_at:   row.get(4)?,
      unassigned_at: row.get(5)?,
      assigned_by:   row.get(6)?,
    })
  }

  pub fn into_assignment(self) -> Result<Assignment> {
    Ok(Assignment {
      assignment_id: decode_uuid(&self.assignment_id)?,
      child_id:      decode_uuid(&self.child_id)?,
      staff_id:      decode_uuid(&self.staff_id)?,
      is_primary:    self.is_primary,
      assigned_at:   decode_dt(&self.assigned_at)?,
      unassigned_at: self.unassigned_at.as_deref().map(decode_dt).transpose()?,
      assigned_by:   decode_opt_uuid(self.assigned_by)?,
    })
  }
}

/// Raw values read directly from an `audit_log` row.
pub struct RawAuditEntry {
  pub audit_id:    String,
  pub entity_type: String,
  pub entity_id:   String,
  pub action:      String,
  pub field_name:  Option<String>,
  pub old_value:   Option<String>,
  pub new_value:   Option<String>,
  pub metadata:    String,
  pub actor:       Option<String>,
  pub recorded_at: String,
}

impl RawAuditEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      audit_id:    row.get(0)?,
      entity_type: row.get(1)?,
      entity_id:   row.get(2)?,
      action:      row.get(3)?,
      field_name:  row.get(4)?,
      old_value:   row.get(5)?,
      new_value:   row.get(6)?,
      metadata:    row.get(7)?,
      actor:       row.get(8)?,
      recorded_at: row.get(9)?,
    })
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    let entity_type: EntityType = self
      .entity_type
      .parse()
      .map_err(|_| iss_core::Error::UnknownStatus(self.entity_type.clone()))?;
    let action: AuditAction = self
      .action
      .parse()
      .map_err(|_| iss_core::Error::UnknownStatus(self.action.clone()))?;

    Ok(AuditEntry {
      audit_id: decode_uuid(&self.audit_id)?,
      entity_type,
      entity_id: decode_uuid(&self.entity_id)?,
      action,
      field_name: self.field_name,
      old_value: self.old_value,
      new_value: self.new_value,
      metadata: serde_json::from_str(&self.metadata)?,
      actor: decode_opt_uuid(self.actor)?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
