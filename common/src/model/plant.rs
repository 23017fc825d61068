use serde::{Deserialize, Serialize};
use std::fmt;

/// The composite key of one `PlantList` row, as extracted from a scan submission.
///
/// Both parts travel as text. Keys parsed from a raw QR string are ASCII digits; keys taken from
/// structured fields are only guaranteed to be non-empty and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedIdentifiers {
    pub group_id: String,
    pub plant_id: String,
}

impl ParsedIdentifiers {
    pub fn new(group_id: impl Into<String>, plant_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            plant_id: plant_id.into(),
        }
    }
}

impl fmt::Display for ParsedIdentifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupID={}, Plant={}", self.group_id, self.plant_id)
    }
}
