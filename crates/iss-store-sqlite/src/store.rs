//! [`SqliteStore`], the SQLite implementation of [`CaseloadStore`].

use std::path::Path;

use iss_core::{
  assignment::{Assignment, AssignmentOutcome, NewAssignment, Reassignment},
  audit::{AuditAction, AuditEntry, EntityType},
  child::{CaseloadStatus, Child, ChildFilter, ChildStatus, NewChild},
  discharge::{DischargeOutcome, DischargeRequest},
  staff::{NewStaff, Staff},
  store::CaseloadStore,
};
use rusqlite::OptionalExtension as _;
use serde_json::json;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ASSIGNMENT_COLUMNS, CHILD_COLUMNS, RawAssignment, RawAuditEntry, RawChild,
    RawStaff, encode_date, encode_dt, encode_uuid, now,
  },
  engine,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A caseload store backed by a single SQLite file.
///
/// Clones share the same underlying connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a blocking list query over `assignments` with one bound id.
  async fn query_assignments(
    &self,
    sql: String,
    id: Uuid,
  ) -> Result<Vec<Assignment>> {
    let id_str = encode_uuid(id);

    let raws: Vec<RawAssignment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawAssignment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAssignment::into_assignment).collect()
  }
}

// ─── CaseloadStore impl ──────────────────────────────────────────────────────

impl CaseloadStore for SqliteStore {
  type Error = crate::Error;

  // ── Children ──────────────────────────────────────────────────────────────

  async fn add_child(&self, input: NewChild) -> Result<Child> {
    input.validate()?;

    let at = now();
    let child = Child {
      child_id:         Uuid::new_v4(),
      first_name:       input.first_name.trim().to_owned(),
      last_name:        input.last_name.trim().to_owned(),
      date_of_birth:    input.date_of_birth,
      status:           ChildStatus::default(),
      start_date:       input.start_date.unwrap_or_else(|| at.date_naive()),
      end_date:         None,
      discharge_reason: None,
      created_at:       at,
      updated_at:       at,
    };

    let id_str     = encode_uuid(child.child_id);
    let first      = child.first_name.clone();
    let last       = child.last_name.clone();
    let dob_str    = encode_date(child.date_of_birth);
    let overall    = child.status.overall.as_ref().to_owned();
    let caseload   = child.status.caseload.as_ref().to_owned();
    let start_str  = encode_date(child.start_date);
    let at_str     = encode_dt(at);
    let audit      = AuditEntry::new(EntityType::Child, child.child_id, AuditAction::Created)
      .with_metadata(json!({ "name": child.full_name() }));

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO children (
             child_id, first_name, last_name, date_of_birth,
             overall_status, caseload_status, on_hold, start_date,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)",
          rusqlite::params![
            id_str, first, last, dob_str, overall, caseload, start_str, at_str,
          ],
        )?;
        let audited = engine::record_audit(&tx, &audit);
        if audited.is_ok() {
          tx.commit()?;
        }
        Ok(audited)
      })
      .await??;

    Ok(child)
  }

  async fn get_child(&self, id: Uuid) -> Result<Option<Child>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawChild> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CHILD_COLUMNS} FROM children WHERE child_id = ?1"),
            rusqlite::params![id_str],
            RawChild::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawChild::into_child).transpose()
  }

  async fn list_children(&self, filter: ChildFilter) -> Result<Vec<Child>> {
    let overall  = filter.overall.map(|s| s.as_ref().to_owned());
    let caseload = filter.caseload.map(|s| s.as_ref().to_owned());
    let on_hold  = filter.on_hold;

    let raws: Vec<RawChild> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CHILD_COLUMNS} FROM children
           WHERE (?1 IS NULL OR overall_status  = ?1)
             AND (?2 IS NULL OR caseload_status = ?2)
             AND (?3 IS NULL OR on_hold         = ?3)
           ORDER BY last_name, first_name"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![overall, caseload, on_hold],
            RawChild::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChild::into_child).collect()
  }

  // ── Staff ─────────────────────────────────────────────────────────────────

  async fn add_staff(&self, input: NewStaff) -> Result<Staff> {
    let name = input.display_name.trim().to_owned();
    if name.is_empty() {
      return Err(iss_core::Error::Validation("staff name is required".into()).into());
    }

    let staff = Staff {
      staff_id:     Uuid::new_v4(),
      display_name: name,
      role:         input.role,
      created_at:   now(),
    };

    let id_str   = encode_uuid(staff.staff_id);
    let name     = staff.display_name.clone();
    let role_str = staff.role.as_ref().to_owned();
    let at_str   = encode_dt(staff.created_at);
    let audit    = AuditEntry::new(EntityType::Staff, staff.staff_id, AuditAction::Created)
      .with_metadata(json!({ "role": staff.role }));

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO staff (staff_id, display_name, role, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, role_str, at_str],
        )?;
        let audited = engine::record_audit(&tx, &audit);
        if audited.is_ok() {
          tx.commit()?;
        }
        Ok(audited)
      })
      .await??;

    Ok(staff)
  }

  async fn get_staff(&self, id: Uuid) -> Result<Option<Staff>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawStaff> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT staff_id, display_name, role, created_at
             FROM staff WHERE staff_id = ?1",
            rusqlite::params![id_str],
            RawStaff::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawStaff::into_staff).transpose()
  }

  // ── Assignment ledger ─────────────────────────────────────────────────────

  async fn assign(&self, input: NewAssignment) -> Result<AssignmentOutcome> {
    self
      .conn
      .call(move |conn| Ok(engine::assign(conn, input)))
      .await?
  }

  async fn unassign(
    &self,
    assignment_id: Uuid,
    actor:         Option<Uuid>,
  ) -> Result<ChildStatus> {
    self
      .conn
      .call(move |conn| Ok(engine::unassign(conn, assignment_id, actor)))
      .await?
  }

  async fn delete_assignment(
    &self,
    assignment_id: Uuid,
    actor:         Option<Uuid>,
  ) -> Result<ChildStatus> {
    self
      .conn
      .call(move |conn| Ok(engine::delete_assignment(conn, assignment_id, actor)))
      .await?
  }

  async fn bulk_reassign(&self, input: Reassignment) -> Result<Vec<Assignment>> {
    self
      .conn
      .call(move |conn| Ok(engine::bulk_reassign(conn, input)))
      .await?
  }

  async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawAssignment> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE assignment_id = ?1"
            ),
            rusqlite::params![id_str],
            RawAssignment::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAssignment::into_assignment).transpose()
  }

  async fn list_assignments(
    &self,
    child_id:       Uuid,
    include_closed: bool,
  ) -> Result<Vec<Assignment>> {
    let open_only = if include_closed { "" } else { "AND unassigned_at IS NULL" };
    self
      .query_assignments(
        format!(
          "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
           WHERE child_id = ?1 {open_only}
           ORDER BY assigned_at DESC, rowid DESC"
        ),
        child_id,
      )
      .await
  }

  async fn staff_caseload(&self, staff_id: Uuid) -> Result<Vec<Assignment>> {
    self
      .query_assignments(
        format!(
          "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
           WHERE staff_id = ?1 AND unassigned_at IS NULL
           ORDER BY assigned_at DESC, rowid DESC"
        ),
        staff_id,
      )
      .await
  }

  async fn primary_staff(&self, child_id: Uuid) -> Result<Option<Staff>> {
    let id_str = encode_uuid(child_id);

    let raw: Option<RawStaff> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT s.staff_id, s.display_name, s.role, s.created_at
             FROM assignments a
             JOIN staff s ON s.staff_id = a.staff_id
             WHERE a.child_id = ?1 AND a.is_primary = 1
               AND a.unassigned_at IS NULL",
            rusqlite::params![id_str],
            RawStaff::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawStaff::into_staff).transpose()
  }

  // ── Supervisor overrides ──────────────────────────────────────────────────

  async fn set_caseload_status(
    &self,
    child_id: Uuid,
    status:   CaseloadStatus,
    actor:    Option<Uuid>,
  ) -> Result<ChildStatus> {
    self
      .conn
      .call(move |conn| Ok(engine::set_caseload_status(conn, child_id, status, actor)))
      .await?
  }

  async fn set_on_hold(
    &self,
    child_id: Uuid,
    on_hold:  bool,
    actor:    Option<Uuid>,
  ) -> Result<ChildStatus> {
    self
      .conn
      .call(move |conn| Ok(engine::set_on_hold(conn, child_id, on_hold, actor)))
      .await?
  }

  // ── Discharge ─────────────────────────────────────────────────────────────

  async fn discharge(
    &self,
    child_id: Uuid,
    request:  DischargeRequest,
  ) -> Result<DischargeOutcome> {
    // Rejected requests never reach the database.
    let discharge = request.validate()?;

    self
      .conn
      .call(move |conn| Ok(engine::discharge(conn, child_id, discharge)))
      .await?
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  async fn audit_log(&self, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
    let id_str = encode_uuid(entity_id);

    let raws: Vec<RawAuditEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT audit_id, entity_type, entity_id, action, field_name,
                  old_value, new_value, metadata, actor, recorded_at
           FROM audit_log
           WHERE entity_id = ?1
           ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawAuditEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditEntry::into_entry).collect()
  }
}
