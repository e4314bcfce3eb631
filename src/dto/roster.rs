//! Roster upload payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dto::validation::{validate_identifier, validate_not_blank};
use crate::state::pad::PadId;

/// Payload replacing the whole board with a fresh seeded one.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RosterLoadRequest {
    /// Competitors in roster order; order within a pad is queue order.
    #[validate(length(min = 1, max = 2000), nested)]
    pub entries: Vec<RosterEntryInput>,
}

/// One competitor of the uploaded roster.
///
/// Derives `Serialize` because the length check on
/// [`RosterLoadRequest::entries`] reports rejected values through
/// `ValidationError::add_param`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RosterEntryInput {
    /// Pad the competitor queues on; pads are created as needed.
    pub pad_id: PadId,
    /// Stable competitor identifier, unique within its pad.
    pub team_id: String,
    /// Display name.
    pub team_name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    /// Name given to the pad if this entry creates it.
    #[serde(default)]
    pub pad_name: Option<String>,
    /// Grouping label given to the pad if this entry creates it.
    #[serde(default)]
    pub pad_label: Option<String>,
}

impl Validate for RosterEntryInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.pad_id == 0 {
            let mut err = validator::ValidationError::new("pad_id");
            err.message = Some("pad numbers start at 1".into());
            errors.add("pad_id", err);
        }
        if let Err(e) = validate_identifier(&self.team_id) {
            errors.add("team_id", e);
        }
        if let Err(e) = validate_not_blank(&self.team_name) {
            errors.add("team_name", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Summary returned once a roster has been loaded.
#[derive(Debug, Serialize, ToSchema)]
pub struct RosterLoadResponse {
    /// Pads present after seeding.
    pub pads: usize,
    /// Competitors placed into queues.
    pub teams: usize,
    /// Entries skipped as duplicates of an id already on their pad.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pad_id: PadId, team_id: &str) -> RosterEntryInput {
        RosterEntryInput {
            pad_id,
            team_id: team_id.to_owned(),
            team_name: format!("Team {team_id}"),
            unit: None,
            category: None,
            division: None,
            pad_name: None,
            pad_label: None,
        }
    }

    #[test]
    fn valid_entries_pass() {
        let request = RosterLoadRequest {
            entries: vec![entry(1, "a-1"), entry(2, "b-1")],
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn pad_zero_blank_ids_and_empty_rosters_fail() {
        assert!(
            RosterLoadRequest {
                entries: Vec::new()
            }
            .validate()
            .is_err()
        );
        assert!(
            RosterLoadRequest {
                entries: vec![entry(0, "a-1")]
            }
            .validate()
            .is_err()
        );
        assert!(
            RosterLoadRequest {
                entries: vec![entry(1, "   ")]
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn oversized_rosters_fail_validation() {
        let entries = (0..2001).map(|n| entry(1, &format!("t-{n}"))).collect();
        let request = RosterLoadRequest { entries };
        assert!(request.validate().is_err());
    }
}
