//! The `CaseloadStore` trait.
//!
//! Implemented by storage backends (e.g. `iss-store-sqlite`). Callers such as
//! the admin CLI or a bulk importer go through this trait and never write
//! `caseload_status` themselves: assignment, unassignment and discharge each
//! recompute the status inline, inside the same transaction as the ledger
//! change.

use std::future::Future;

use uuid::Uuid;

use crate::{
  assignment::{Assignment, AssignmentOutcome, NewAssignment, Reassignment},
  audit::AuditEntry,
  child::{CaseloadStatus, Child, ChildFilter, ChildStatus, NewChild},
  discharge::{DischargeOutcome, DischargeRequest},
  staff::{NewStaff, Staff},
};

/// Abstraction over a caseload store backend.
///
/// Every mutating method is atomic: either the ledger change, the status
/// change and the audit entries all persist, or none do. Errors from
/// [`crate::Error`] surface through `Self::Error` unchanged in meaning.
pub trait CaseloadStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Children ──────────────────────────────────────────────────────────

  /// Create a child in the `(active, awaiting_assignment, not on hold)`
  /// state.
  fn add_child(
    &self,
    input: NewChild,
  ) -> impl Future<Output = Result<Child, Self::Error>> + Send + '_;

  /// Retrieve a child by UUID. Returns `None` if not found.
  fn get_child(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Child>, Self::Error>> + Send + '_;

  /// List children ordered by last then first name.
  fn list_children(
    &self,
    filter: ChildFilter,
  ) -> impl Future<Output = Result<Vec<Child>, Self::Error>> + Send + '_;

  // ── Staff ─────────────────────────────────────────────────────────────

  fn add_staff(
    &self,
    input: NewStaff,
  ) -> impl Future<Output = Result<Staff, Self::Error>> + Send + '_;

  fn get_staff(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Staff>, Self::Error>> + Send + '_;

  // ── Assignment ledger ─────────────────────────────────────────────────

  /// Open an assignment and move the child into `caseload` if it is not
  /// already there.
  ///
  /// If the staff member already holds an open assignment on the child, that
  /// assignment is returned with `created: false` and nothing is written. A
  /// request for a primary assignment does not promote an existing secondary
  /// one; close it and assign again.
  fn assign(
    &self,
    input: NewAssignment,
  ) -> impl Future<Output = Result<AssignmentOutcome, Self::Error>> + Send + '_;

  /// Close an open assignment. When it was the child's last open assignment
  /// and the child is in `caseload`, the child moves to
  /// `awaiting_assignment`.
  fn unassign(
    &self,
    assignment_id: Uuid,
    actor: Option<Uuid>,
  ) -> impl Future<Output = Result<ChildStatus, Self::Error>> + Send + '_;

  /// Remove an assignment row outright. Applies the same status rule as
  /// [`CaseloadStore::unassign`].
  fn delete_assignment(
    &self,
    assignment_id: Uuid,
    actor: Option<Uuid>,
  ) -> impl Future<Output = Result<ChildStatus, Self::Error>> + Send + '_;

  /// Move open assignments from one staff member to another, preserving
  /// `is_primary`. When the target already holds a secondary assignment on a
  /// child whose primary is being moved, that assignment is promoted instead
  /// of opening a second one. Returns the newly opened assignments.
  fn bulk_reassign(
    &self,
    input: Reassignment,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  fn get_assignment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Assignment>, Self::Error>> + Send + '_;

  /// Assignments for a child, newest first. Closed ones are included only
  /// when `include_closed` is set.
  fn list_assignments(
    &self,
    child_id: Uuid,
    include_closed: bool,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  /// Open assignments held by a staff member.
  fn staff_caseload(
    &self,
    staff_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Assignment>, Self::Error>> + Send + '_;

  /// The staff member holding the child's open primary assignment.
  fn primary_staff(
    &self,
    child_id: Uuid,
  ) -> impl Future<Output = Result<Option<Staff>, Self::Error>> + Send + '_;

  // ── Supervisor overrides ──────────────────────────────────────────────

  /// Manually set `non_caseload` or `awaiting_assignment`.
  fn set_caseload_status(
    &self,
    child_id: Uuid,
    status: CaseloadStatus,
    actor: Option<Uuid>,
  ) -> impl Future<Output = Result<ChildStatus, Self::Error>> + Send + '_;

  /// Toggle the on-hold flag. Touches no other status field.
  fn set_on_hold(
    &self,
    child_id: Uuid,
    on_hold: bool,
    actor: Option<Uuid>,
  ) -> impl Future<Output = Result<ChildStatus, Self::Error>> + Send + '_;

  // ── Discharge ─────────────────────────────────────────────────────────

  /// Close every open assignment and write the terminal status fields in
  /// one transaction. The request is validated before anything is read for
  /// update.
  fn discharge(
    &self,
    child_id: Uuid,
    request: DischargeRequest,
  ) -> impl Future<Output = Result<DischargeOutcome, Self::Error>> + Send + '_;

  // ── Audit ─────────────────────────────────────────────────────────────

  /// Audit entries about one entity, oldest first.
  fn audit_log(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send + '_;
}
