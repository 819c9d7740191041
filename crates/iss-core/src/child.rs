//! Child records and the status vocabulary they carry.
//!
//! A child's service state is spread over three independent axes: the
//! overall lifecycle ([`OverallStatus`]), whether the child is staffed
//! ([`CaseloadStatus`]), and a temporary pause flag (`on_hold`). Only the
//! store's assignment and discharge operations write the first two.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status axes ─────────────────────────────────────────────────────────────

/// Whether the child can still receive visits and assignments.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverallStatus {
  #[default]
  Active,
  /// Terminal. Discharge is never undone by this crate.
  Discharged,
}

/// Whether the child is considered staffed.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaseloadStatus {
  /// At least one open assignment exists.
  Caseload,
  /// Supervisor-set; the consistency rules never enter or leave it.
  NonCaseload,
  #[default]
  AwaitingAssignment,
}

impl OverallStatus {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownStatus(s.to_owned()))
  }
}

impl CaseloadStatus {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownStatus(s.to_owned()))
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// The three status fields of a child at one point in time.
///
/// The default value is the state every child is created in:
/// `(active, awaiting_assignment, on_hold = false)`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct ChildStatus {
  pub overall:  OverallStatus,
  pub caseload: CaseloadStatus,
  pub on_hold:  bool,
}

impl ChildStatus {
  pub fn is_active(&self) -> bool { self.overall == OverallStatus::Active }

  pub fn is_discharged(&self) -> bool {
    self.overall == OverallStatus::Discharged
  }

  pub fn is_in_caseload(&self) -> bool {
    self.caseload == CaseloadStatus::Caseload
  }

  pub fn is_non_caseload(&self) -> bool {
    self.caseload == CaseloadStatus::NonCaseload
  }

  pub fn is_awaiting_assignment(&self) -> bool {
    self.caseload == CaseloadStatus::AwaitingAssignment
  }

  pub fn is_on_hold(&self) -> bool { self.on_hold }

  /// The terminal state written by a discharge.
  pub fn discharged() -> Self {
    Self {
      overall:  OverallStatus::Discharged,
      caseload: CaseloadStatus::NonCaseload,
      on_hold:  false,
    }
  }
}

// ─── Child ───────────────────────────────────────────────────────────────────

/// One service recipient. Children are never deleted; discharge is a status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Child {
  pub child_id:         Uuid,
  pub first_name:       String,
  pub last_name:        String,
  pub date_of_birth:    NaiveDate,
  pub status:           ChildStatus,
  pub start_date:       NaiveDate,
  /// Set by discharge.
  pub end_date:         Option<NaiveDate>,
  pub discharge_reason: Option<String>,
  pub created_at:       DateTime<Utc>,
  pub updated_at:       DateTime<Utc>,
}

impl Child {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

/// Input to [`crate::store::CaseloadStore::add_child`].
#[derive(Debug, Clone)]
pub struct NewChild {
  pub first_name:    String,
  pub last_name:     String,
  pub date_of_birth: NaiveDate,
  /// Defaults to today when `None`.
  pub start_date:    Option<NaiveDate>,
}

impl NewChild {
  pub fn new(
    first_name: impl Into<String>,
    last_name: impl Into<String>,
    date_of_birth: NaiveDate,
  ) -> Self {
    Self {
      first_name: first_name.into(),
      last_name: last_name.into(),
      date_of_birth,
      start_date: None,
    }
  }

  /// Reject blank names before anything is written.
  pub fn validate(&self) -> Result<()> {
    if self.first_name.trim().is_empty() {
      return Err(Error::Validation("first name is required".into()));
    }
    if self.last_name.trim().is_empty() {
      return Err(Error::Validation("last name is required".into()));
    }
    Ok(())
  }
}

/// Parameters for [`crate::store::CaseloadStore::list_children`]. Unset
/// fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct ChildFilter {
  pub overall:  Option<OverallStatus>,
  pub caseload: Option<CaseloadStatus>,
  pub on_hold:  Option<bool>,
}
