//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use iss_core::{
  assignment::{NewAssignment, Reassignment},
  audit::{AuditAction, AuditEntry, EntityType},
  child::{CaseloadStatus, Child, ChildFilter, NewChild, OverallStatus},
  discharge::DischargeRequest,
  staff::{NewStaff, Staff, StaffRole},
  store::CaseloadStore,
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn child(s: &SqliteStore) -> Child {
  s.add_child(NewChild::new("Ada", "Byron", date(2021, 3, 14)))
    .await
    .unwrap()
}

async fn staff(s: &SqliteStore, name: &str) -> Staff {
  s.add_staff(NewStaff::new(name, StaffRole::Staff))
    .await
    .unwrap()
}

async fn caseload_of(s: &SqliteStore, child_id: Uuid) -> CaseloadStatus {
  s.get_child(child_id)
    .await
    .unwrap()
    .unwrap()
    .status
    .caseload
}

/// The most recent field-level entry for `field`.
fn last_change<'a>(log: &'a [AuditEntry], field: &str) -> &'a AuditEntry {
  log
    .iter()
    .rfind(|e| e.field_name.as_deref() == Some(field))
    .expect("field change recorded")
}

fn core_err(err: &Error) -> &iss_core::Error {
  err.as_core().expect("domain error")
}

// ─── Children & staff ────────────────────────────────────────────────────────

#[tokio::test]
async fn new_child_starts_active_and_awaiting() {
  let s = store().await;
  let c = child(&s).await;

  let fetched = s.get_child(c.child_id).await.unwrap().unwrap();
  assert_eq!(fetched.full_name(), "Ada Byron");
  assert!(fetched.status.is_active());
  assert!(fetched.status.is_awaiting_assignment());
  assert!(!fetched.status.on_hold);
  assert_eq!(fetched.created_at, c.created_at);
  assert_eq!(fetched.date_of_birth, date(2021, 3, 14));
}

#[tokio::test]
async fn get_child_missing_returns_none() {
  let s = store().await;
  assert!(s.get_child(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn add_child_rejects_blank_name() {
  let s = store().await;
  let err = s
    .add_child(NewChild::new("", "Byron", date(2021, 3, 14)))
    .await
    .unwrap_err();
  assert!(core_err(&err).is_validation());
  assert!(s.list_children(ChildFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_children_filters_by_status() {
  let s = store().await;
  let alice = staff(&s, "Alice").await;
  let staffed = child(&s).await;
  let waiting = s
    .add_child(NewChild::new("Grace", "Hopper", date(2022, 12, 9)))
    .await
    .unwrap();
  s.assign(NewAssignment::new(staffed.child_id, alice.staff_id, true))
    .await
    .unwrap();

  let all = s.list_children(ChildFilter::default()).await.unwrap();
  assert_eq!(all.len(), 2);
  // Ordered by last name.
  assert_eq!(all[0].last_name, "Byron");

  let awaiting = s
    .list_children(ChildFilter {
      caseload: Some(CaseloadStatus::AwaitingAssignment),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(awaiting.len(), 1);
  assert_eq!(awaiting[0].child_id, waiting.child_id);

  s.set_on_hold(waiting.child_id, true, None).await.unwrap();
  let held_in_caseload = s
    .list_children(ChildFilter {
      caseload: Some(CaseloadStatus::Caseload),
      on_hold: Some(true),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(held_in_caseload.is_empty());

  let held = s
    .list_children(ChildFilter { on_hold: Some(true), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(held.len(), 1);
  assert_eq!(held[0].child_id, waiting.child_id);
}

#[tokio::test]
async fn add_and_get_staff() {
  let s = store().await;
  let sup = s
    .add_staff(NewStaff::new("Sam", StaffRole::Supervisor))
    .await
    .unwrap();
  let fetched = s.get_staff(sup.staff_id).await.unwrap().unwrap();
  assert_eq!(fetched.display_name, "Sam");
  assert_eq!(fetched.role, StaffRole::Supervisor);
}

// ─── Assign ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn assign_moves_child_into_caseload() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;

  let out = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();

  assert!(out.created);
  assert!(out.assignment.is_active());
  assert!(out.status.is_in_caseload());
  assert_eq!(caseload_of(&s, c.child_id).await, CaseloadStatus::Caseload);

  let stored = s
    .get_assignment(out.assignment.assignment_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(stored, out.assignment);
}

#[tokio::test]
async fn assign_from_non_caseload_sets_caseload() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  s.set_caseload_status(c.child_id, CaseloadStatus::NonCaseload, None)
    .await
    .unwrap();

  let out = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, false))
    .await
    .unwrap();
  assert!(out.status.is_in_caseload());
}

#[tokio::test]
async fn assign_same_staff_twice_is_idempotent() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;

  let first = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  let audit_before = s.audit_log(c.child_id).await.unwrap().len();

  let second = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();

  assert!(!second.created);
  assert_eq!(second.assignment.assignment_id, first.assignment.assignment_id);
  assert!(second.status.is_in_caseload());
  assert_eq!(s.list_assignments(c.child_id, true).await.unwrap().len(), 1);
  // No status write happened.
  assert_eq!(s.audit_log(c.child_id).await.unwrap().len(), audit_before);
}

#[tokio::test]
async fn second_assignment_does_not_rewrite_status() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;

  s.assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  let after_first = s.get_child(c.child_id).await.unwrap().unwrap();

  let out = s
    .assign(NewAssignment::new(c.child_id, bob.staff_id, false))
    .await
    .unwrap();
  assert!(out.created);
  assert!(out.status.is_in_caseload());

  let after_second = s.get_child(c.child_id).await.unwrap().unwrap();
  assert_eq!(after_second.updated_at, after_first.updated_at);

  let status_changes = s
    .audit_log(c.child_id)
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.field_name.as_deref() == Some("caseload_status"))
    .count();
  assert_eq!(status_changes, 1);
}

#[tokio::test]
async fn assign_unknown_child_or_staff_is_a_reference_error() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;

  let err = s
    .assign(NewAssignment::new(Uuid::new_v4(), alice.staff_id, false))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), iss_core::Error::ChildNotFound(_)));
  assert!(core_err(&err).is_reference());

  let err = s
    .assign(NewAssignment::new(c.child_id, Uuid::new_v4(), false))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), iss_core::Error::StaffNotFound(_)));
  assert!(caseload_of(&s, c.child_id).await == CaseloadStatus::AwaitingAssignment);
}

#[tokio::test]
async fn auditor_cannot_hold_assignments() {
  let s = store().await;
  let c = child(&s).await;
  let auditor = s
    .add_staff(NewStaff::new("Audrey", StaffRole::Auditor))
    .await
    .unwrap();

  let err = s
    .assign(NewAssignment::new(c.child_id, auditor.staff_id, false))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), iss_core::Error::StaffNotAssignable(_)));
  assert!(s.list_assignments(c.child_id, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn second_open_primary_is_rejected() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;

  s.assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  let err = s
    .assign(NewAssignment::new(c.child_id, bob.staff_id, true))
    .await
    .unwrap_err();
  assert!(matches!(
    core_err(&err),
    iss_core::Error::PrimaryAlreadyAssigned { staff_id, .. } if *staff_id == alice.staff_id
  ));

  let primary = s.primary_staff(c.child_id).await.unwrap().unwrap();
  assert_eq!(primary.staff_id, alice.staff_id);
}

#[tokio::test]
async fn new_primary_allowed_after_old_one_closes() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;

  let first = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  s.unassign(first.assignment.assignment_id, None).await.unwrap();

  s.assign(NewAssignment::new(c.child_id, bob.staff_id, true))
    .await
    .unwrap();
  let primary = s.primary_staff(c.child_id).await.unwrap().unwrap();
  assert_eq!(primary.staff_id, bob.staff_id);
}

// ─── Unassign & delete ───────────────────────────────────────────────────────

#[tokio::test]
async fn unassign_last_assignment_demotes_to_awaiting() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;

  let out = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  let status = s.unassign(out.assignment.assignment_id, None).await.unwrap();

  assert!(status.is_awaiting_assignment());
  assert_eq!(
    caseload_of(&s, c.child_id).await,
    CaseloadStatus::AwaitingAssignment
  );

  let closed = s
    .get_assignment(out.assignment.assignment_id)
    .await
    .unwrap()
    .unwrap();
  assert!(closed.unassigned_at.is_some());
  assert_eq!(closed.assigned_at, out.assignment.assigned_at);
}

#[tokio::test]
async fn unassign_with_remaining_assignments_keeps_caseload() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;
  let cam = staff(&s, "Cam").await;

  let a = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  s.assign(NewAssignment::new(c.child_id, bob.staff_id, false))
    .await
    .unwrap();
  s.assign(NewAssignment::new(c.child_id, cam.staff_id, false))
    .await
    .unwrap();

  let status = s.unassign(a.assignment.assignment_id, None).await.unwrap();
  assert!(status.is_in_caseload());
  assert_eq!(s.list_assignments(c.child_id, false).await.unwrap().len(), 2);
  assert_eq!(s.list_assignments(c.child_id, true).await.unwrap().len(), 3);
}

#[tokio::test]
async fn unassign_twice_errors() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;

  let out = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, false))
    .await
    .unwrap();
  s.unassign(out.assignment.assignment_id, None).await.unwrap();

  let err = s.unassign(out.assignment.assignment_id, None).await.unwrap_err();
  assert!(matches!(core_err(&err), iss_core::Error::AlreadyUnassigned(_)));
}

#[tokio::test]
async fn unassign_unknown_assignment_errors() {
  let s = store().await;
  let err = s.unassign(Uuid::new_v4(), None).await.unwrap_err();
  assert!(matches!(core_err(&err), iss_core::Error::AssignmentNotFound(_)));

  let err = s.delete_assignment(Uuid::new_v4(), None).await.unwrap_err();
  assert!(core_err(&err).is_reference());
}

#[tokio::test]
async fn delete_last_assignment_demotes_like_unassign() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;

  let a = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  let b = s
    .assign(NewAssignment::new(c.child_id, bob.staff_id, false))
    .await
    .unwrap();

  let status = s.delete_assignment(a.assignment.assignment_id, None).await.unwrap();
  assert!(status.is_in_caseload());
  assert!(
    s.get_assignment(a.assignment.assignment_id)
      .await
      .unwrap()
      .is_none()
  );

  let status = s.delete_assignment(b.assignment.assignment_id, None).await.unwrap();
  assert!(status.is_awaiting_assignment());
  assert!(s.list_assignments(c.child_id, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn releasing_assignments_never_moves_non_caseload() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;

  let a = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  let b = s
    .assign(NewAssignment::new(c.child_id, bob.staff_id, false))
    .await
    .unwrap();
  s.set_caseload_status(c.child_id, CaseloadStatus::NonCaseload, None)
    .await
    .unwrap();

  let status = s.unassign(a.assignment.assignment_id, None).await.unwrap();
  assert!(status.is_non_caseload());
  let status = s.delete_assignment(b.assignment.assignment_id, None).await.unwrap();
  assert!(status.is_non_caseload());
  assert_eq!(caseload_of(&s, c.child_id).await, CaseloadStatus::NonCaseload);
}

// ─── Example trace ───────────────────────────────────────────────────────────

#[tokio::test]
async fn full_lifecycle_trace() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;

  let a = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  assert!(a.status.is_in_caseload());

  let b = s
    .assign(NewAssignment::new(c.child_id, bob.staff_id, false))
    .await
    .unwrap();
  assert!(b.status.is_in_caseload());

  let st = s.unassign(a.assignment.assignment_id, None).await.unwrap();
  assert!(st.is_in_caseload());

  let st = s.unassign(b.assignment.assignment_id, None).await.unwrap();
  assert!(st.is_awaiting_assignment());

  let out = s
    .discharge(c.child_id, DischargeRequest::new(date(2026, 6, 1), "Aged out"))
    .await
    .unwrap();
  assert_eq!(out.assignments_closed, 0);
  assert!(out.status.is_discharged());

  let fetched = s.get_child(c.child_id).await.unwrap().unwrap();
  assert_eq!(fetched.status.overall, OverallStatus::Discharged);
  assert_eq!(fetched.status.caseload, CaseloadStatus::NonCaseload);
  assert!(!fetched.status.on_hold);
  assert_eq!(fetched.end_date, Some(date(2026, 6, 1)));
  assert_eq!(fetched.discharge_reason.as_deref(), Some("Aged out"));
}

// ─── Discharge ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn discharge_closes_every_open_assignment() {
  for open in [0usize, 1, 3] {
    let s = store().await;
    let c = child(&s).await;
    for i in 0..open {
      let st = staff(&s, &format!("Staff {i}")).await;
      s.assign(NewAssignment::new(c.child_id, st.staff_id, i == 0))
        .await
        .unwrap();
    }
    s.set_on_hold(c.child_id, true, None).await.unwrap();

    let out = s
      .discharge(c.child_id, DischargeRequest::new(date(2026, 6, 1), "Moved"))
      .await
      .unwrap();

    assert_eq!(out.assignments_closed, open);
    assert!(s.list_assignments(c.child_id, false).await.unwrap().is_empty());
    assert_eq!(s.list_assignments(c.child_id, true).await.unwrap().len(), open);

    let fetched = s.get_child(c.child_id).await.unwrap().unwrap();
    assert!(fetched.status.is_discharged());
    assert!(fetched.status.is_non_caseload());
    assert!(!fetched.status.on_hold);
  }
}

#[tokio::test]
async fn invalid_discharge_changes_nothing() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  s.assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();

  let err = s
    .discharge(c.child_id, DischargeRequest::new(date(2026, 6, 1), "  "))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), iss_core::Error::Validation(_)));

  let err = s
    .discharge(c.child_id, DischargeRequest {
      end_date: None,
      reason: "Aged out".into(),
      discharged_by: None,
    })
    .await
    .unwrap_err();
  assert!(core_err(&err).is_validation());

  let fetched = s.get_child(c.child_id).await.unwrap().unwrap();
  assert!(fetched.status.is_active());
  assert!(fetched.status.is_in_caseload());
  assert!(fetched.end_date.is_none());
  assert_eq!(s.list_assignments(c.child_id, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn discharge_twice_is_rejected() {
  let s = store().await;
  let c = child(&s).await;
  s.discharge(c.child_id, DischargeRequest::new(date(2026, 6, 1), "Aged out"))
    .await
    .unwrap();

  let err = s
    .discharge(c.child_id, DischargeRequest::new(date(2026, 7, 1), "Again"))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), iss_core::Error::AlreadyDischarged(_)));

  let fetched = s.get_child(c.child_id).await.unwrap().unwrap();
  assert_eq!(fetched.end_date, Some(date(2026, 6, 1)));
}

#[tokio::test]
async fn discharge_unknown_child_errors() {
  let s = store().await;
  let err = s
    .discharge(Uuid::new_v4(), DischargeRequest::new(date(2026, 6, 1), "x"))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), iss_core::Error::ChildNotFound(_)));
}

#[tokio::test]
async fn discharged_child_cannot_be_assigned() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  s.discharge(c.child_id, DischargeRequest::new(date(2026, 6, 1), "Aged out"))
    .await
    .unwrap();

  let err = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), iss_core::Error::ChildDischarged(_)));
  assert!(caseload_of(&s, c.child_id).await == CaseloadStatus::NonCaseload);
}

// ─── Overrides ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn on_hold_never_touches_other_axes() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;

  let before = s.get_child(c.child_id).await.unwrap().unwrap().status;
  let held = s.set_on_hold(c.child_id, true, None).await.unwrap();
  assert!(held.on_hold);
  assert_eq!(held.overall, before.overall);
  assert_eq!(held.caseload, before.caseload);

  s.assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  let released = s.set_on_hold(c.child_id, false, None).await.unwrap();
  assert!(!released.on_hold);
  assert!(released.is_in_caseload());
  assert!(released.is_active());

  s.discharge(c.child_id, DischargeRequest::new(date(2026, 6, 1), "Done"))
    .await
    .unwrap();
  let held = s.set_on_hold(c.child_id, true, None).await.unwrap();
  assert!(held.is_discharged());
  assert!(held.is_non_caseload());
}

#[tokio::test]
async fn caseload_cannot_be_set_by_hand() {
  let s = store().await;
  let c = child(&s).await;

  let err = s
    .set_caseload_status(c.child_id, CaseloadStatus::Caseload, None)
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), iss_core::Error::Validation(_)));
}

#[tokio::test]
async fn awaiting_override_requires_no_open_assignments() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  s.assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();

  let err = s
    .set_caseload_status(c.child_id, CaseloadStatus::AwaitingAssignment, None)
    .await
    .unwrap_err();
  assert!(core_err(&err).is_validation());
  assert_eq!(caseload_of(&s, c.child_id).await, CaseloadStatus::Caseload);
}

#[tokio::test]
async fn supervisor_override_is_audited() {
  let s = store().await;
  let c = child(&s).await;
  let sup = s
    .add_staff(NewStaff::new("Sam", StaffRole::Supervisor))
    .await
    .unwrap();

  s.set_caseload_status(c.child_id, CaseloadStatus::NonCaseload, Some(sup.staff_id))
    .await
    .unwrap();

  let log = s.audit_log(c.child_id).await.unwrap();
  let change = log
    .iter()
    .find(|e| e.field_name.as_deref() == Some("caseload_status"))
    .unwrap();
  assert_eq!(change.action, AuditAction::Updated);
  assert_eq!(change.entity_type, EntityType::Child);
  assert_eq!(change.old_value.as_deref(), Some("awaiting_assignment"));
  assert_eq!(change.new_value.as_deref(), Some("non_caseload"));
  assert_eq!(change.actor, Some(sup.staff_id));
}

// ─── Bulk reassign ───────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_reassign_moves_open_assignments() {
  let s = store().await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;
  let c1 = child(&s).await;
  let c2 = s
    .add_child(NewChild::new("Grace", "Hopper", date(2022, 12, 9)))
    .await
    .unwrap();

  s.assign(NewAssignment::new(c1.child_id, alice.staff_id, true))
    .await
    .unwrap();
  s.assign(NewAssignment::new(c2.child_id, alice.staff_id, false))
    .await
    .unwrap();

  let opened = s
    .bulk_reassign(Reassignment {
      from_staff:  alice.staff_id,
      to_staff:    bob.staff_id,
      child_ids:   vec![],
      assigned_by: None,
    })
    .await
    .unwrap();

  assert_eq!(opened.len(), 2);
  assert!(s.staff_caseload(alice.staff_id).await.unwrap().is_empty());
  assert_eq!(s.staff_caseload(bob.staff_id).await.unwrap().len(), 2);

  let primary = s.primary_staff(c1.child_id).await.unwrap().unwrap();
  assert_eq!(primary.staff_id, bob.staff_id);
  assert!(s.primary_staff(c2.child_id).await.unwrap().is_none());
  assert_eq!(caseload_of(&s, c1.child_id).await, CaseloadStatus::Caseload);
  assert_eq!(caseload_of(&s, c2.child_id).await, CaseloadStatus::Caseload);

  let bulk = s.audit_log(alice.staff_id).await.unwrap();
  assert!(bulk.iter().any(|e| e.action == AuditAction::BulkUpdate));
}

#[tokio::test]
async fn bulk_reassign_respects_child_filter_and_existing_assignments() {
  let s = store().await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;
  let c1 = child(&s).await;
  let c2 = s
    .add_child(NewChild::new("Grace", "Hopper", date(2022, 12, 9)))
    .await
    .unwrap();

  s.assign(NewAssignment::new(c1.child_id, alice.staff_id, true))
    .await
    .unwrap();
  s.assign(NewAssignment::new(c1.child_id, bob.staff_id, false))
    .await
    .unwrap();
  s.assign(NewAssignment::new(c2.child_id, alice.staff_id, true))
    .await
    .unwrap();

  let opened = s
    .bulk_reassign(Reassignment {
      from_staff:  alice.staff_id,
      to_staff:    bob.staff_id,
      child_ids:   vec![c1.child_id],
      assigned_by: None,
    })
    .await
    .unwrap();

  // Bob already held c1, so nothing new was opened; Alice's c1 row closed
  // and Bob's existing row took over as primary.
  assert!(opened.is_empty());
  let c1_open = s.list_assignments(c1.child_id, false).await.unwrap();
  assert_eq!(c1_open.len(), 1);
  assert_eq!(c1_open[0].staff_id, bob.staff_id);
  assert!(c1_open[0].is_primary);
  assert_eq!(caseload_of(&s, c1.child_id).await, CaseloadStatus::Caseload);

  let primary = s.primary_staff(c1.child_id).await.unwrap().unwrap();
  assert_eq!(primary.staff_id, bob.staff_id);

  let promotion = s.audit_log(c1_open[0].assignment_id).await.unwrap();
  let change = promotion
    .iter()
    .find(|e| e.field_name.as_deref() == Some("is_primary"))
    .unwrap();
  assert_eq!(change.old_value.as_deref(), Some("false"));
  assert_eq!(change.new_value.as_deref(), Some("true"));

  // c2 was not in the filter.
  let alice_open = s.staff_caseload(alice.staff_id).await.unwrap();
  assert_eq!(alice_open.len(), 1);
  assert_eq!(alice_open[0].child_id, c2.child_id);
}

#[tokio::test]
async fn bulk_reassign_to_self_is_rejected() {
  let s = store().await;
  let alice = staff(&s, "Alice").await;
  let err = s
    .bulk_reassign(Reassignment {
      from_staff:  alice.staff_id,
      to_staff:    alice.staff_id,
      child_ids:   vec![],
      assigned_by: None,
    })
    .await
    .unwrap_err();
  assert!(core_err(&err).is_validation());
}

// ─── Audit ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn assignment_history_is_audited() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;

  let out = s
    .assign(NewAssignment {
      assigned_by: Some(alice.staff_id),
      ..NewAssignment::new(c.child_id, alice.staff_id, true)
    })
    .await
    .unwrap();
  s.unassign(out.assignment.assignment_id, None).await.unwrap();

  let log = s.audit_log(out.assignment.assignment_id).await.unwrap();
  assert_eq!(log.len(), 2);
  assert_eq!(log[0].action, AuditAction::Created);
  assert_eq!(log[0].actor, Some(alice.staff_id));
  assert_eq!(log[0].metadata["is_primary"], true);
  assert_eq!(log[1].field_name.as_deref(), Some("unassigned_at"));

  let child_log = s.audit_log(c.child_id).await.unwrap();
  let transitions: Vec<_> = child_log
    .iter()
    .filter_map(|e| e.new_value.as_deref())
    .collect();
  assert_eq!(transitions, ["caseload", "awaiting_assignment"]);
}

#[tokio::test]
async fn bulk_reassign_keeps_existing_primary_of_target() {
  let s = store().await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;
  let c = child(&s).await;

  s.assign(NewAssignment::new(c.child_id, alice.staff_id, false))
    .await
    .unwrap();
  let bobs = s
    .assign(NewAssignment::new(c.child_id, bob.staff_id, true))
    .await
    .unwrap();

  s.bulk_reassign(Reassignment {
    from_staff:  alice.staff_id,
    to_staff:    bob.staff_id,
    child_ids:   vec![],
    assigned_by: None,
  })
  .await
  .unwrap();

  let open = s.list_assignments(c.child_id, false).await.unwrap();
  assert_eq!(open.len(), 1);
  assert_eq!(open[0].assignment_id, bobs.assignment.assignment_id);
  assert!(open[0].is_primary);
}

#[tokio::test]
async fn primary_request_does_not_promote_existing_secondary() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;

  let first = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, false))
    .await
    .unwrap();
  let again = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();

  assert!(!again.created);
  assert_eq!(again.assignment.assignment_id, first.assignment.assignment_id);
  assert!(!again.assignment.is_primary);
  assert!(s.primary_staff(c.child_id).await.unwrap().is_none());
}

#[tokio::test]
async fn unassign_and_delete_record_the_actor() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;
  let sup = s
    .add_staff(NewStaff::new("Sam", StaffRole::Supervisor))
    .await
    .unwrap();

  let a = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  let b = s
    .assign(NewAssignment::new(c.child_id, bob.staff_id, false))
    .await
    .unwrap();

  s.unassign(a.assignment.assignment_id, Some(sup.staff_id))
    .await
    .unwrap();
  let closed = s.audit_log(a.assignment.assignment_id).await.unwrap();
  let close = closed.last().unwrap();
  assert_eq!(close.field_name.as_deref(), Some("unassigned_at"));
  assert_eq!(close.actor, Some(sup.staff_id));

  s.delete_assignment(b.assignment.assignment_id, Some(sup.staff_id))
    .await
    .unwrap();
  let deleted = s.audit_log(b.assignment.assignment_id).await.unwrap();
  let delete = deleted.last().unwrap();
  assert_eq!(delete.action, AuditAction::Deleted);
  assert_eq!(delete.actor, Some(sup.staff_id));

  // The demotion that followed the delete carries the same actor.
  let demotion = s
    .audit_log(c.child_id)
    .await
    .unwrap()
    .into_iter()
    .rfind(|e| e.field_name.as_deref() == Some("caseload_status"))
    .unwrap();
  assert_eq!(demotion.new_value.as_deref(), Some("awaiting_assignment"));
  assert_eq!(demotion.actor, Some(sup.staff_id));
}

#[tokio::test]
async fn discharge_audits_each_closed_assignment_and_status_field() {
  let s = store().await;
  let c = child(&s).await;
  let alice = staff(&s, "Alice").await;
  let bob = staff(&s, "Bob").await;
  let sup = s
    .add_staff(NewStaff::new("Sam", StaffRole::Supervisor))
    .await
    .unwrap();

  let a = s
    .assign(NewAssignment::new(c.child_id, alice.staff_id, true))
    .await
    .unwrap();
  let b = s
    .assign(NewAssignment::new(c.child_id, bob.staff_id, false))
    .await
    .unwrap();
  s.set_on_hold(c.child_id, true, None).await.unwrap();

  s.discharge(c.child_id, DischargeRequest {
    discharged_by: Some(sup.staff_id),
    ..DischargeRequest::new(date(2026, 6, 1), "Aged out")
  })
  .await
  .unwrap();

  for id in [a.assignment.assignment_id, b.assignment.assignment_id] {
    let log = s.audit_log(id).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].field_name.as_deref(), Some("unassigned_at"));
    assert_eq!(log[1].actor, Some(sup.staff_id));
    assert_eq!(log[1].metadata["operation"], "discharge");
  }

  let child_log = s.audit_log(c.child_id).await.unwrap();
  assert_eq!(last_change(&child_log, "overall_status").new_value.as_deref(), Some("discharged"));
  assert_eq!(last_change(&child_log, "caseload_status").old_value.as_deref(), Some("caseload"));
  assert_eq!(last_change(&child_log, "caseload_status").new_value.as_deref(), Some("non_caseload"));
  assert_eq!(last_change(&child_log, "caseload_status").actor, Some(sup.staff_id));
  assert_eq!(last_change(&child_log, "on_hold").old_value.as_deref(), Some("true"));
  assert_eq!(last_change(&child_log, "on_hold").new_value.as_deref(), Some("false"));
}
