//! Transactional operations on the assignment ledger and child status.
//!
//! Each public function here runs one `BEGIN IMMEDIATE` transaction on the
//! blocking SQLite connection and is called from inside
//! [`tokio_rusqlite::Connection::call`]. The consistency rules from
//! [`iss_core::rules`] are applied inline, after the ledger change and before
//! commit. Status writes only touch the columns they change.

use chrono::{DateTime, Utc};
use iss_core::{
  Error as CoreError,
  assignment::{Assignment, AssignmentOutcome, NewAssignment, Reassignment},
  audit::{AuditAction, AuditEntry, EntityType},
  child::{CaseloadStatus, ChildStatus, OverallStatus},
  discharge::{Discharge, DischargeOutcome},
  rules,
  staff::StaffRole,
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ASSIGNMENT_COLUMNS, RawAssignment, RawStatus, encode_date, encode_dt,
    encode_uuid, now,
  },
};

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// Read the status columns of a child, failing with `ChildNotFound`.
fn child_status(conn: &Connection, child_id: Uuid) -> Result<ChildStatus> {
  let raw = conn
    .query_row(
      "SELECT overall_status, caseload_status, on_hold
       FROM children WHERE child_id = ?1",
      rusqlite::params![encode_uuid(child_id)],
      |row| {
        Ok(RawStatus {
          overall_status:  row.get(0)?,
          caseload_status: row.get(1)?,
          on_hold:         row.get(2)?,
        })
      },
    )
    .optional()?
    .ok_or(CoreError::ChildNotFound(child_id))?;
  raw.into_status()
}

/// Read a staff member's role, failing with `StaffNotFound`.
fn staff_role(conn: &Connection, staff_id: Uuid) -> Result<StaffRole> {
  let role: String = conn
    .query_row(
      "SELECT role FROM staff WHERE staff_id = ?1",
      rusqlite::params![encode_uuid(staff_id)],
      |row| row.get(0),
    )
    .optional()?
    .ok_or(CoreError::StaffNotFound(staff_id))?;
  Ok(StaffRole::parse(&role)?)
}

fn assignment_by_id(conn: &Connection, id: Uuid) -> Result<Assignment> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE assignment_id = ?1"
      ),
      rusqlite::params![encode_uuid(id)],
      RawAssignment::from_row,
    )
    .optional()?
    .ok_or(CoreError::AssignmentNotFound(id))?;
  raw.into_assignment()
}

fn open_assignment_for_staff(
  conn: &Connection,
  child_id: Uuid,
  staff_id: Uuid,
) -> Result<Option<Assignment>> {
  conn
    .query_row(
      &format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
         WHERE child_id = ?1 AND staff_id = ?2 AND unassigned_at IS NULL"
      ),
      rusqlite::params![encode_uuid(child_id), encode_uuid(staff_id)],
      RawAssignment::from_row,
    )
    .optional()?
    .map(RawAssignment::into_assignment)
    .transpose()
}

fn open_assignments(conn: &Connection, child_id: Uuid) -> Result<Vec<Assignment>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
     WHERE child_id = ?1 AND unassigned_at IS NULL
     ORDER BY assigned_at, rowid"
  ))?;
  let raws = stmt
    .query_map(rusqlite::params![encode_uuid(child_id)], RawAssignment::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawAssignment::into_assignment).collect()
}

fn open_primary(conn: &Connection, child_id: Uuid) -> Result<Option<Uuid>> {
  let staff: Option<String> = conn
    .query_row(
      "SELECT staff_id FROM assignments
       WHERE child_id = ?1 AND is_primary = 1 AND unassigned_at IS NULL",
      rusqlite::params![encode_uuid(child_id)],
      |row| row.get(0),
    )
    .optional()?;
  Ok(staff.map(|s| Uuid::parse_str(&s)).transpose()?)
}

fn count_open(conn: &Connection, child_id: Uuid) -> Result<usize> {
  let n: i64 = conn.query_row(
    "SELECT COUNT(*) FROM assignments
     WHERE child_id = ?1 AND unassigned_at IS NULL",
    rusqlite::params![encode_uuid(child_id)],
    |row| row.get(0),
  )?;
  Ok(n as usize)
}

fn insert_assignment(conn: &Connection, a: &Assignment) -> Result<()> {
  conn.execute(
    "INSERT INTO assignments (
       assignment_id, child_id, staff_id, is_primary,
       assigned_at, unassigned_at, assigned_by
     ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
    rusqlite::params![
      encode_uuid(a.assignment_id),
      encode_uuid(a.child_id),
      encode_uuid(a.staff_id),
      a.is_primary,
      encode_dt(a.assigned_at),
      a.assigned_by.map(encode_uuid),
    ],
  )?;
  Ok(())
}

fn close_assignment(
  conn: &Connection,
  a: &Assignment,
  at: DateTime<Utc>,
  actor: Option<Uuid>,
) -> Result<()> {
  conn.execute(
    "UPDATE assignments SET unassigned_at = ?1 WHERE assignment_id = ?2",
    rusqlite::params![encode_dt(at), encode_uuid(a.assignment_id)],
  )?;
  record_audit(
    conn,
    &AuditEntry::field_change(
      EntityType::Assignment,
      a.assignment_id,
      "unassigned_at",
      "",
      encode_dt(at),
    )
    .with_actor(actor)
    .with_metadata(json!({ "child_id": a.child_id, "staff_id": a.staff_id })),
  )
}

/// Mark an open secondary assignment as the child's primary.
fn promote_to_primary(
  conn: &Connection,
  a: &Assignment,
  replaces: Uuid,
  actor: Option<Uuid>,
) -> Result<()> {
  conn.execute(
    "UPDATE assignments SET is_primary = 1 WHERE assignment_id = ?1",
    rusqlite::params![encode_uuid(a.assignment_id)],
  )?;
  record_audit(
    conn,
    &AuditEntry::field_change(EntityType::Assignment, a.assignment_id, "is_primary", false, true)
      .with_actor(actor)
      .with_metadata(json!({
        "child_id": a.child_id,
        "staff_id": a.staff_id,
        "replaces": replaces,
      })),
  )
}

pub(crate) fn record_audit(conn: &Connection, e: &AuditEntry) -> Result<()> {
  conn.execute(
    "INSERT INTO audit_log (
       audit_id, entity_type, entity_id, action, field_name,
       old_value, new_value, metadata, actor, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    rusqlite::params![
      encode_uuid(e.audit_id),
      e.entity_type.as_ref(),
      encode_uuid(e.entity_id),
      e.action.as_ref(),
      e.field_name,
      e.old_value,
      e.new_value,
      e.metadata.to_string(),
      e.actor.map(encode_uuid),
      encode_dt(e.recorded_at),
    ],
  )?;
  Ok(())
}

/// Write only `caseload_status` (and `updated_at`) for one child.
fn write_caseload_status(
  conn: &Connection,
  child_id: Uuid,
  from: CaseloadStatus,
  to: CaseloadStatus,
  actor: Option<Uuid>,
  at: DateTime<Utc>,
) -> Result<()> {
  conn.execute(
    "UPDATE children SET caseload_status = ?1, updated_at = ?2
     WHERE child_id = ?3",
    rusqlite::params![to.as_ref(), encode_dt(at), encode_uuid(child_id)],
  )?;
  record_audit(
    conn,
    &AuditEntry::field_change(EntityType::Child, child_id, "caseload_status", from, to)
      .with_actor(actor),
  )?;
  info!(%child_id, %from, %to, "caseload status changed");
  Ok(())
}

/// Run the release rule after an assignment of `child_id` was closed or
/// removed, writing the demotion if one is due.
fn apply_release_rule(
  conn: &Connection,
  child_id: Uuid,
  actor: Option<Uuid>,
  at: DateTime<Utc>,
) -> Result<ChildStatus> {
  let mut status = child_status(conn, child_id)?;
  let remaining = count_open(conn, child_id)?;
  match rules::after_assignment_released(status.caseload, remaining) {
    Some(next) => {
      write_caseload_status(conn, child_id, status.caseload, next, actor, at)?;
      status.caseload = next;
    }
    None => {
      debug!(%child_id, remaining, caseload = %status.caseload, "caseload status unchanged");
    }
  }
  Ok(status)
}

/// Run the open rule after an assignment of `child_id` was created.
fn apply_open_rule(
  conn: &Connection,
  child_id: Uuid,
  mut status: ChildStatus,
  actor: Option<Uuid>,
  at: DateTime<Utc>,
) -> Result<ChildStatus> {
  match rules::after_assignment_opened(status.caseload) {
    Some(next) => {
      write_caseload_status(conn, child_id, status.caseload, next, actor, at)?;
      status.caseload = next;
    }
    None => debug!(%child_id, "child already in caseload"),
  }
  Ok(status)
}

// ─── Ledger operations ───────────────────────────────────────────────────────

pub(crate) fn assign(
  conn: &mut Connection,
  input: NewAssignment,
) -> Result<AssignmentOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let child_id = input.child_id;

  let status = child_status(&tx, child_id)?;
  if status.is_discharged() {
    return Err(CoreError::ChildDischarged(child_id).into());
  }
  if !staff_role(&tx, input.staff_id)?.can_hold_caseload() {
    return Err(CoreError::StaffNotAssignable(input.staff_id).into());
  }

  if let Some(existing) = open_assignment_for_staff(&tx, child_id, input.staff_id)? {
    if input.is_primary && !existing.is_primary {
      warn!(
        %child_id,
        assignment_id = %existing.assignment_id,
        "primary requested for an existing secondary assignment; left as secondary"
      );
    }
    debug!(
      %child_id,
      assignment_id = %existing.assignment_id,
      "staff member already assigned; nothing written"
    );
    return Ok(AssignmentOutcome { assignment: existing, status, created: false });
  }

  if input.is_primary
    && let Some(staff_id) = open_primary(&tx, child_id)?
  {
    return Err(CoreError::PrimaryAlreadyAssigned { child_id, staff_id }.into());
  }

  let at = now();
  let assignment = Assignment {
    assignment_id: Uuid::new_v4(),
    child_id,
    staff_id:      input.staff_id,
    is_primary:    input.is_primary,
    assigned_at:   at,
    unassigned_at: None,
    assigned_by:   input.assigned_by,
  };
  insert_assignment(&tx, &assignment)?;
  record_audit(
    &tx,
    &AuditEntry::new(EntityType::Assignment, assignment.assignment_id, AuditAction::Created)
      .with_actor(input.assigned_by)
      .with_metadata(json!({
        "child_id":   child_id,
        "staff_id":   assignment.staff_id,
        "is_primary": assignment.is_primary,
      })),
  )?;

  let status = apply_open_rule(&tx, child_id, status, input.assigned_by, at)?;
  tx.commit()?;

  Ok(AssignmentOutcome { assignment, status, created: true })
}

pub(crate) fn unassign(
  conn: &mut Connection,
  assignment_id: Uuid,
  actor: Option<Uuid>,
) -> Result<ChildStatus> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let assignment = assignment_by_id(&tx, assignment_id)?;
  if !assignment.is_active() {
    return Err(CoreError::AlreadyUnassigned(assignment_id).into());
  }

  let at = now();
  close_assignment(&tx, &assignment, at, actor)?;
  let status = apply_release_rule(&tx, assignment.child_id, actor, at)?;
  tx.commit()?;

  Ok(status)
}

pub(crate) fn delete_assignment(
  conn: &mut Connection,
  assignment_id: Uuid,
  actor: Option<Uuid>,
) -> Result<ChildStatus> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let assignment = assignment_by_id(&tx, assignment_id)?;
  tx.execute(
    "DELETE FROM assignments WHERE assignment_id = ?1",
    rusqlite::params![encode_uuid(assignment_id)],
  )?;
  record_audit(
    &tx,
    &AuditEntry::new(EntityType::Assignment, assignment_id, AuditAction::Deleted)
      .with_actor(actor)
      .with_metadata(json!({
        "child_id":   assignment.child_id,
        "staff_id":   assignment.staff_id,
        "is_primary": assignment.is_primary,
        "was_open":   assignment.is_active(),
      })),
  )?;

  let status = apply_release_rule(&tx, assignment.child_id, actor, now())?;
  tx.commit()?;

  Ok(status)
}

pub(crate) fn bulk_reassign(
  conn: &mut Connection,
  input: Reassignment,
) -> Result<Vec<Assignment>> {
  if input.from_staff == input.to_staff {
    return Err(
      CoreError::Validation("cannot reassign a caseload to the same staff member".into())
        .into(),
    );
  }

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  staff_role(&tx, input.from_staff)?;
  if !staff_role(&tx, input.to_staff)?.can_hold_caseload() {
    return Err(CoreError::StaffNotAssignable(input.to_staff).into());
  }

  let moving: Vec<Assignment> = {
    let mut stmt = tx.prepare(&format!(
      "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
       WHERE staff_id = ?1 AND unassigned_at IS NULL
       ORDER BY assigned_at, rowid"
    ))?;
    let raws = stmt
      .query_map(
        rusqlite::params![encode_uuid(input.from_staff)],
        RawAssignment::from_row,
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws
      .into_iter()
      .map(RawAssignment::into_assignment)
      .collect::<Result<Vec<_>>>()?
      .into_iter()
      .filter(|a| input.child_ids.is_empty() || input.child_ids.contains(&a.child_id))
      .collect()
  };

  let at = now();
  let mut opened = Vec::with_capacity(moving.len());
  let mut promoted = 0usize;

  for old in &moving {
    close_assignment(&tx, old, at, input.assigned_by)?;

    if let Some(existing) = open_assignment_for_staff(&tx, old.child_id, input.to_staff)? {
      if old.is_primary && !existing.is_primary {
        promote_to_primary(&tx, &existing, old.assignment_id, input.assigned_by)?;
        promoted += 1;
      } else {
        debug!(
          child_id = %old.child_id,
          "target staff member already assigned; no new assignment opened"
        );
      }
      continue;
    }

    let new = Assignment {
      assignment_id: Uuid::new_v4(),
      child_id:      old.child_id,
      staff_id:      input.to_staff,
      is_primary:    old.is_primary,
      assigned_at:   at,
      unassigned_at: None,
      assigned_by:   input.assigned_by,
    };
    insert_assignment(&tx, &new)?;
    record_audit(
      &tx,
      &AuditEntry::new(EntityType::Assignment, new.assignment_id, AuditAction::Created)
        .with_actor(input.assigned_by)
        .with_metadata(json!({
          "child_id":    new.child_id,
          "staff_id":    new.staff_id,
          "is_primary":  new.is_primary,
          "replaces":    old.assignment_id,
        })),
    )?;

    let status = child_status(&tx, new.child_id)?;
    apply_open_rule(&tx, new.child_id, status, input.assigned_by, at)?;
    opened.push(new);
  }

  record_audit(
    &tx,
    &AuditEntry::new(EntityType::Staff, input.from_staff, AuditAction::BulkUpdate)
      .with_actor(input.assigned_by)
      .with_metadata(json!({
        "operation": "bulk_reassign",
        "to_staff":  input.to_staff,
        "closed":    moving.len(),
        "opened":    opened.len(),
        "promoted":  promoted,
        "children":  moving.iter().map(|a| a.child_id).collect::<Vec<_>>(),
      })),
  )?;
  tx.commit()?;

  info!(
    from = %input.from_staff,
    to = %input.to_staff,
    count = opened.len(),
    "caseload reassigned"
  );
  Ok(opened)
}

// ─── Supervisor overrides ────────────────────────────────────────────────────

pub(crate) fn set_caseload_status(
  conn: &mut Connection,
  child_id: Uuid,
  requested: CaseloadStatus,
  actor: Option<Uuid>,
) -> Result<ChildStatus> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let mut status = child_status(&tx, child_id)?;
  if status.is_discharged() {
    return Err(CoreError::ChildDischarged(child_id).into());
  }
  rules::check_override(requested, count_open(&tx, child_id)?)?;

  if status.caseload == requested {
    debug!(%child_id, caseload = %requested, "caseload status already set");
    return Ok(status);
  }

  write_caseload_status(&tx, child_id, status.caseload, requested, actor, now())?;
  tx.commit()?;

  status.caseload = requested;
  Ok(status)
}

pub(crate) fn set_on_hold(
  conn: &mut Connection,
  child_id: Uuid,
  on_hold: bool,
  actor: Option<Uuid>,
) -> Result<ChildStatus> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let mut status = child_status(&tx, child_id)?;
  if status.on_hold == on_hold {
    return Ok(status);
  }

  tx.execute(
    "UPDATE children SET on_hold = ?1, updated_at = ?2 WHERE child_id = ?3",
    rusqlite::params![on_hold, encode_dt(now()), encode_uuid(child_id)],
  )?;
  record_audit(
    &tx,
    &AuditEntry::field_change(EntityType::Child, child_id, "on_hold", status.on_hold, on_hold)
      .with_actor(actor),
  )?;
  tx.commit()?;

  status.on_hold = on_hold;
  Ok(status)
}

// ─── Discharge ───────────────────────────────────────────────────────────────

pub(crate) fn discharge(
  conn: &mut Connection,
  child_id: Uuid,
  d: Discharge,
) -> Result<DischargeOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let before = child_status(&tx, child_id)?;
  if before.is_discharged() {
    return Err(CoreError::AlreadyDischarged(child_id).into());
  }

  let at = now();
  let at_str = encode_dt(at);
  let id_str = encode_uuid(child_id);

  // One bulk close; the per-assignment release rule is not run here.
  let open = open_assignments(&tx, child_id)?;
  let closed = tx.execute(
    "UPDATE assignments SET unassigned_at = ?1
     WHERE child_id = ?2 AND unassigned_at IS NULL",
    rusqlite::params![at_str, id_str],
  )?;
  for a in &open {
    record_audit(
      &tx,
      &AuditEntry::field_change(
        EntityType::Assignment,
        a.assignment_id,
        "unassigned_at",
        "",
        &at_str,
      )
      .with_actor(d.discharged_by)
      .with_metadata(json!({
        "child_id":  child_id,
        "staff_id":  a.staff_id,
        "operation": "discharge",
      })),
    )?;
  }

  let after = ChildStatus::discharged();
  tx.execute(
    "UPDATE children SET
       overall_status = ?1, caseload_status = ?2, on_hold = ?3,
       end_date = ?4, discharge_reason = ?5, updated_at = ?6
     WHERE child_id = ?7",
    rusqlite::params![
      OverallStatus::Discharged.as_ref(),
      after.caseload.as_ref(),
      after.on_hold,
      encode_date(d.end_date),
      d.reason,
      at_str,
      id_str,
    ],
  )?;
  record_audit(
    &tx,
    &AuditEntry::field_change(
      EntityType::Child,
      child_id,
      "overall_status",
      before.overall,
      after.overall,
    )
    .with_actor(d.discharged_by)
    .with_metadata(json!({
      "operation":          "discharge",
      "end_date":           encode_date(d.end_date),
      "reason":             d.reason,
      "assignments_closed": closed,
    })),
  )?;
  if before.caseload != after.caseload {
    record_audit(
      &tx,
      &AuditEntry::field_change(
        EntityType::Child,
        child_id,
        "caseload_status",
        before.caseload,
        after.caseload,
      )
      .with_actor(d.discharged_by),
    )?;
  }
  if before.on_hold != after.on_hold {
    record_audit(
      &tx,
      &AuditEntry::field_change(EntityType::Child, child_id, "on_hold", before.on_hold, after.on_hold)
        .with_actor(d.discharged_by),
    )?;
  }
  tx.commit()?;

  info!(%child_id, assignments_closed = closed, "child discharged");
  Ok(DischargeOutcome { status: after, assignments_closed: closed })
}
