//! Discharge requests and their validation.
//!
//! A [`DischargeRequest`] is what a caller hands in; a [`Discharge`] is the
//! validated form the store consumes. Validation happens before any row is
//! touched, so a rejected request leaves no partial state behind.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, child::ChildStatus};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DischargeRequest {
  pub end_date:      Option<NaiveDate>,
  pub reason:        String,
  pub discharged_by: Option<Uuid>,
}

/// A discharge that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discharge {
  pub end_date:      NaiveDate,
  /// Trimmed and non-empty.
  pub reason:        String,
  pub discharged_by: Option<Uuid>,
}

impl DischargeRequest {
  pub fn new(end_date: NaiveDate, reason: impl Into<String>) -> Self {
    Self {
      end_date:      Some(end_date),
      reason:        reason.into(),
      discharged_by: None,
    }
  }

  pub fn validate(self) -> Result<Discharge> {
    let end_date = self
      .end_date
      .ok_or_else(|| Error::Validation("discharge date is required".into()))?;
    let reason = self.reason.trim();
    if reason.is_empty() {
      return Err(Error::Validation("discharge reason is required".into()));
    }
    Ok(Discharge {
      end_date,
      reason: reason.to_owned(),
      discharged_by: self.discharged_by,
    })
  }
}

/// What a completed discharge reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeOutcome {
  pub status:             ChildStatus,
  /// Number of open assignments that were force-closed.
  pub assignments_closed: usize,
}
