//! Error types for `iss-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("child not found: {0}")]
  ChildNotFound(Uuid),

  #[error("staff member not found: {0}")]
  StaffNotFound(Uuid),

  #[error("assignment not found: {0}")]
  AssignmentNotFound(Uuid),

  #[error("staff member {0} has a role that cannot hold caseload assignments")]
  StaffNotAssignable(Uuid),

  #[error("child {0} is discharged")]
  ChildDischarged(Uuid),

  #[error("child {0} is already discharged")]
  AlreadyDischarged(Uuid),

  #[error("assignment {0} is already unassigned")]
  AlreadyUnassigned(Uuid),

  #[error("child {child_id} already has a primary staff member ({staff_id})")]
  PrimaryAlreadyAssigned { child_id: Uuid, staff_id: Uuid },

  #[error("validation failed: {0}")]
  Validation(String),

  #[error("unknown status value: {0:?}")]
  UnknownStatus(String),

  #[error("unknown staff role: {0:?}")]
  UnknownRole(String),
}

impl Error {
  /// The error refers to a child, staff member or assignment that does not
  /// resolve.
  pub fn is_reference(&self) -> bool {
    matches!(
      self,
      Self::ChildNotFound(_) | Self::StaffNotFound(_) | Self::AssignmentNotFound(_)
    )
  }

  /// The request was rejected before any mutation took place.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::Validation(_)
        | Self::StaffNotAssignable(_)
        | Self::ChildDischarged(_)
        | Self::AlreadyDischarged(_)
        | Self::AlreadyUnassigned(_)
        | Self::PrimaryAlreadyAssigned { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
