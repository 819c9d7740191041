//! Subcommands and their dispatch onto a [`CaseloadStore`].

use anyhow::{Context as _, anyhow};
use chrono::NaiveDate;
use clap::Subcommand;
use iss_core::{
  assignment::{NewAssignment, Reassignment},
  child::{CaseloadStatus, ChildFilter, NewChild, OverallStatus},
  discharge::DischargeRequest,
  staff::{NewStaff, StaffRole},
  store::CaseloadStore,
};
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Register, inspect and list children.
  Child {
    #[command(subcommand)]
    action: ChildCommand,
  },

  /// Register and inspect staff members.
  Staff {
    #[command(subcommand)]
    action: StaffCommand,
  },

  /// Open an assignment of a staff member to a child.
  Assign {
    child_id: Uuid,
    staff_id: Uuid,
    #[arg(long)]
    primary:  bool,
    /// Who is making the assignment.
    #[arg(long = "by")]
    assigned_by: Option<Uuid>,
  },

  /// Close an open assignment.
  Unassign {
    assignment_id: Uuid,
    #[arg(long = "by")]
    actor:         Option<Uuid>,
  },

  /// Remove an assignment record entirely.
  DeleteAssignment {
    assignment_id: Uuid,
    #[arg(long = "by")]
    actor:         Option<Uuid>,
  },

  /// Move open assignments from one staff member to another.
  Reassign {
    #[arg(long)]
    from: Uuid,
    #[arg(long)]
    to:   Uuid,
    /// Only move these children (repeatable); all when omitted.
    #[arg(long = "child")]
    children: Vec<Uuid>,
    #[arg(long = "by")]
    assigned_by: Option<Uuid>,
  },

  /// Discharge a child, closing every open assignment.
  Discharge {
    child_id: Uuid,
    /// End date, YYYY-MM-DD.
    #[arg(long)]
    date:   NaiveDate,
    #[arg(long)]
    reason: String,
    #[arg(long = "by")]
    discharged_by: Option<Uuid>,
  },

  /// Override a child's caseload status (non_caseload or awaiting_assignment).
  SetCaseload {
    child_id: Uuid,
    status:   CaseloadStatus,
    #[arg(long = "by")]
    actor:    Option<Uuid>,
  },

  /// Put a child on hold.
  Hold {
    child_id: Uuid,
    #[arg(long = "by")]
    actor:    Option<Uuid>,
  },

  /// Take a child off hold.
  Unhold {
    child_id: Uuid,
    #[arg(long = "by")]
    actor:    Option<Uuid>,
  },

  /// List a child's assignments, newest first.
  Assignments {
    child_id: Uuid,
    /// Include closed assignments.
    #[arg(long)]
    all:      bool,
  },

  /// List a staff member's open assignments.
  Caseload { staff_id: Uuid },

  /// Show the audit trail for a child, staff member or assignment.
  Audit { entity_id: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum ChildCommand {
  Add {
    first_name: String,
    last_name:  String,
    /// Date of birth, YYYY-MM-DD.
    #[arg(long)]
    dob:        NaiveDate,
    /// Start date; defaults to today.
    #[arg(long)]
    start:      Option<NaiveDate>,
  },
  Show {
    child_id: Uuid,
  },
  List {
    #[arg(long)]
    overall:  Option<OverallStatus>,
    #[arg(long)]
    caseload: Option<CaseloadStatus>,
    #[arg(long)]
    on_hold:  Option<bool>,
  },
}

#[derive(Subcommand, Debug)]
pub enum StaffCommand {
  Add {
    display_name: String,
    #[arg(long, default_value = "staff")]
    role:         StaffRole,
  },
  Show {
    staff_id: Uuid,
  },
}

/// Run one command and return what should be printed.
pub async fn run<S>(store: &S, command: Command) -> anyhow::Result<Value>
where
  S: CaseloadStore,
{
  let out = match command {
    Command::Child { action } => run_child(store, action).await?,
    Command::Staff { action } => run_staff(store, action).await?,

    Command::Assign { child_id, staff_id, primary, assigned_by } => {
      let outcome = store
        .assign(NewAssignment { child_id, staff_id, is_primary: primary, assigned_by })
        .await?;
      if !outcome.created {
        tracing::info!(
          assignment_id = %outcome.assignment.assignment_id,
          "staff member already assigned"
        );
      }
      json!(outcome)
    }
    Command::Unassign { assignment_id, actor } => {
      json!(store.unassign(assignment_id, actor).await?)
    }
    Command::DeleteAssignment { assignment_id, actor } => {
      json!(store.delete_assignment(assignment_id, actor).await?)
    }
    Command::Reassign { from, to, children, assigned_by } => {
      let opened = store
        .bulk_reassign(Reassignment {
          from_staff: from,
          to_staff: to,
          child_ids: children,
          assigned_by,
        })
        .await?;
      json!(opened)
    }

    Command::Discharge { child_id, date, reason, discharged_by } => {
      let request = DischargeRequest {
        discharged_by,
        ..DischargeRequest::new(date, reason)
      };
      json!(store.discharge(child_id, request).await?)
    }
    Command::SetCaseload { child_id, status, actor } => {
      json!(store.set_caseload_status(child_id, status, actor).await?)
    }
    Command::Hold { child_id, actor } => json!(store.set_on_hold(child_id, true, actor).await?),
    Command::Unhold { child_id, actor } => {
      json!(store.set_on_hold(child_id, false, actor).await?)
    }

    Command::Assignments { child_id, all } => {
      json!(store.list_assignments(child_id, all).await?)
    }
    Command::Caseload { staff_id } => json!(store.staff_caseload(staff_id).await?),
    Command::Audit { entity_id } => json!(store.audit_log(entity_id).await?),
  };
  Ok(out)
}

async fn run_child<S>(store: &S, action: ChildCommand) -> anyhow::Result<Value>
where
  S: CaseloadStore,
{
  Ok(match action {
    ChildCommand::Add { first_name, last_name, dob, start } => {
      let input = NewChild { start_date: start, ..NewChild::new(first_name, last_name, dob) };
      json!(store.add_child(input).await?)
    }
    ChildCommand::Show { child_id } => {
      let child = store
        .get_child(child_id)
        .await?
        .ok_or_else(|| anyhow!("child {child_id} not found"))?;
      let assignments = store.list_assignments(child_id, false).await?;
      let primary = store.primary_staff(child_id).await?;
      json!({
        "child":       child,
        "assignments": assignments,
        "primary":     primary,
      })
    }
    ChildCommand::List { overall, caseload, on_hold } => {
      json!(store.list_children(ChildFilter { overall, caseload, on_hold }).await?)
    }
  })
}

async fn run_staff<S>(store: &S, action: StaffCommand) -> anyhow::Result<Value>
where
  S: CaseloadStore,
{
  Ok(match action {
    StaffCommand::Add { display_name, role } => {
      json!(store.add_staff(NewStaff::new(display_name, role)).await?)
    }
    StaffCommand::Show { staff_id } => {
      let staff = store
        .get_staff(staff_id)
        .await?
        .with_context(|| format!("staff member {staff_id} not found"))?;
      let caseload = store.staff_caseload(staff_id).await?;
      json!({ "staff": staff, "caseload": caseload })
    }
  })
}

#[cfg(test)]
mod tests {
  use iss_store_sqlite::SqliteStore;

  use super::*;

  #[tokio::test]
  async fn assign_then_discharge_through_commands() {
    let store = SqliteStore::open_in_memory().await.unwrap();

    let child = run(&store, Command::Child {
      action: ChildCommand::Add {
        first_name: "Ada".into(),
        last_name:  "Byron".into(),
        dob:        NaiveDate::from_ymd_opt(2021, 3, 14).unwrap(),
        start:      None,
      },
    })
    .await
    .unwrap();
    let child_id: Uuid = serde_json::from_value(child["child_id"].clone()).unwrap();

    let staff = run(&store, Command::Staff {
      action: StaffCommand::Add { display_name: "Alice".into(), role: StaffRole::Staff },
    })
    .await
    .unwrap();
    let staff_id: Uuid = serde_json::from_value(staff["staff_id"].clone()).unwrap();

    let assigned = run(&store, Command::Assign {
      child_id,
      staff_id,
      primary: true,
      assigned_by: None,
    })
    .await
    .unwrap();
    assert_eq!(assigned["status"]["caseload"], "caseload");

    let discharged = run(&store, Command::Discharge {
      child_id,
      date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
      reason: "Aged out".into(),
      discharged_by: None,
    })
    .await
    .unwrap();
    assert_eq!(discharged["assignments_closed"], 1);
    assert_eq!(discharged["status"]["overall"], "discharged");
  }

  #[tokio::test]
  async fn show_unknown_child_errors() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let res = run(&store, Command::Child {
      action: ChildCommand::Show { child_id: Uuid::new_v4() },
    })
    .await;
    assert!(res.is_err());
  }
}
