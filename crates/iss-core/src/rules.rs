//! Consistency rules between a child's `caseload_status` and its open
//! assignments.
//!
//! The rules only ever drive the `caseload ⇄ awaiting_assignment` edge, plus
//! the explicit entry into `caseload` on a fresh assignment. `non_caseload` is
//! left alone when assignments close. Each function returns `Some(new)` only
//! when a write is needed; `None` means the stored value is already correct
//! and the caller must not write.

use crate::{Error, Result, child::CaseloadStatus};

/// A new assignment was opened for the child.
pub fn after_assignment_opened(
  current: CaseloadStatus,
) -> Option<CaseloadStatus> {
  (current != CaseloadStatus::Caseload).then_some(CaseloadStatus::Caseload)
}

/// An assignment was closed or deleted; `remaining_active` counts the open
/// assignments left afterwards.
pub fn after_assignment_released(
  current: CaseloadStatus,
  remaining_active: usize,
) -> Option<CaseloadStatus> {
  (remaining_active == 0 && current == CaseloadStatus::Caseload)
    .then_some(CaseloadStatus::AwaitingAssignment)
}

/// Check a supervisor override of `caseload_status`.
///
/// `caseload` is reachable only through an assignment, and a child with open
/// assignments cannot be marked as awaiting one.
pub fn check_override(
  requested: CaseloadStatus,
  active_assignments: usize,
) -> Result<()> {
  match requested {
    CaseloadStatus::Caseload => Err(Error::Validation(
      "caseload status is set by assigning staff, not directly".into(),
    )),
    CaseloadStatus::AwaitingAssignment if active_assignments > 0 => {
      Err(Error::Validation(format!(
        "child has {active_assignments} open assignment(s); close them before \
         marking it awaiting assignment"
      )))
    }
    _ => Ok(()),
  }
}
