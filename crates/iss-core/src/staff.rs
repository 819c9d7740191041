//! Staff identities. The caseload engine only uses them as reference keys and
//! to decide who may hold an assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StaffRole {
  #[default]
  Staff,
  Supervisor,
  Admin,
  /// Read-only access; never carries a caseload.
  Auditor,
}

impl StaffRole {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownRole(s.to_owned()))
  }

  pub fn can_hold_caseload(self) -> bool {
    matches!(self, Self::Staff | Self::Supervisor | Self::Admin)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
  pub staff_id:     Uuid,
  pub display_name: String,
  pub role:         StaffRole,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::CaseloadStore::add_staff`].
#[derive(Debug, Clone)]
pub struct NewStaff {
  pub display_name: String,
  pub role:         StaffRole,
}

impl NewStaff {
  pub fn new(display_name: impl Into<String>, role: StaffRole) -> Self {
    Self { display_name: display_name.into(), role }
  }
}
