//! The assignment ledger: staff-to-child responsibility over a time interval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::child::ChildStatus;

/// One staff member's responsibility for one child.
///
/// An assignment is open while `unassigned_at` is `None`. `assigned_at` is set
/// by the store and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub assignment_id: Uuid,
  pub child_id:      Uuid,
  pub staff_id:      Uuid,
  pub is_primary:    bool,
  pub assigned_at:   DateTime<Utc>,
  pub unassigned_at: Option<DateTime<Utc>>,
  /// The supervisor or admin who made the assignment, if known.
  pub assigned_by:   Option<Uuid>,
}

impl Assignment {
  pub fn is_active(&self) -> bool { self.unassigned_at.is_none() }
}

/// Input to [`crate::store::CaseloadStore::assign`].
#[derive(Debug, Clone)]
pub struct NewAssignment {
  pub child_id:    Uuid,
  pub staff_id:    Uuid,
  pub is_primary:  bool,
  pub assigned_by: Option<Uuid>,
}

impl NewAssignment {
  pub fn new(child_id: Uuid, staff_id: Uuid, is_primary: bool) -> Self {
    Self { child_id, staff_id, is_primary, assigned_by: None }
  }
}

/// Result of an assign call: the open assignment and the child's status
/// after the consistency rules ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentOutcome {
  pub assignment: Assignment,
  pub status:     ChildStatus,
  /// `false` when an open assignment for the same staff member already
  /// existed and was returned as-is.
  pub created:    bool,
}

/// Parameters for [`crate::store::CaseloadStore::bulk_reassign`].
#[derive(Debug, Clone)]
pub struct Reassignment {
  pub from_staff:  Uuid,
  pub to_staff:    Uuid,
  /// Restrict to these children; empty means every open assignment of
  /// `from_staff`.
  pub child_ids:   Vec<Uuid>,
  pub assigned_by: Option<Uuid>,
}
