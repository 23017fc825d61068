//! Parsing of QR scan submissions into a plant key.
//!
//! A submission arrives as a JSON object in one of two shapes:
//!
//! - **Structured**: two fields carrying the group and plant ids directly, under one of several
//!   configured name pairs (`groupID`/`plant`, `groupId`/`plantId`, ...). Scanning UIs that
//!   decode the tag client-side send this. Values only need to be non-empty after trimming.
//! - **Raw string**: the undecoded tag text in a single field (`qrCodeData`), which must contain
//!   a `*A<digits>*` token (group) and a `*V<digits>*` token (plant) in any order.
//!
//! Structured pairs are checked first, in configured order, and the first pair with both fields
//! present is used. When no pair is complete but some id field is present, the submission is
//! reported as a broken structured one instead of falling through to the raw field.

use crate::model::plant::ParsedIdentifiers;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_RAW_FIELD: &str = "qrCodeData";

/// Field names accepted for the group and plant ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPair {
    pub group: String,
    pub plant: String,
}

impl FieldPair {
    pub fn new(group: impl Into<String>, plant: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            plant: plant.into(),
        }
    }
}

/// Which JSON fields a scan submission may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFields {
    pub raw: String,
    pub pairs: Vec<FieldPair>,
}

impl Default for ScanFields {
    fn default() -> Self {
        Self {
            raw: DEFAULT_RAW_FIELD.to_string(),
            pairs: vec![
                FieldPair::new("groupID", "plant"),
                FieldPair::new("groupID", "plantID"),
                FieldPair::new("groupId", "plantId"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPayload {
    #[error("missing scan data: expected '{0}' or a group/plant id pair")]
    MissingField(String),
    #[error("scan data is empty")]
    Empty,
    #[error("invalid QR code format: no *{0}<digits>* token")]
    MissingToken(char),
    #[error("field '{0}' is required")]
    MissingIdentifier(String),
    #[error("field '{0}' must be a non-empty string or number")]
    BadIdentifier(String),
}

/// Result of parsing one submission, tagged with the form that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Structured(ParsedIdentifiers),
    RawString(ParsedIdentifiers),
    Invalid(InvalidPayload),
}

impl ScanOutcome {
    pub fn into_result(self) -> Result<ParsedIdentifiers, InvalidPayload> {
        match self {
            ScanOutcome::Structured(ids) | ScanOutcome::RawString(ids) => Ok(ids),
            ScanOutcome::Invalid(e) => Err(e),
        }
    }
}

pub struct ScanParser {
    fields: ScanFields,
    group_token: Regex,
    plant_token: Regex,
}

impl ScanParser {
    pub fn new(fields: ScanFields) -> Result<Self, regex::Error> {
        Ok(Self {
            fields,
            group_token: Regex::new(r"\*A(\d+)\*")?,
            plant_token: Regex::new(r"\*V(\d+)\*")?,
        })
    }

    pub fn fields(&self) -> &ScanFields {
        &self.fields
    }

    pub fn parse(&self, body: &Map<String, Value>) -> ScanOutcome {
        let present = |name: &str| !matches!(body.get(name), None | Some(Value::Null));

        // The first pair with both fields present is the one the caller used.
        if let Some(pair) = self
            .fields
            .pairs
            .iter()
            .find(|p| present(&p.group) && present(&p.plant))
        {
            return match (
                identifier(&pair.group, body.get(&pair.group)),
                identifier(&pair.plant, body.get(&pair.plant)),
            ) {
                (Ok(group_id), Ok(plant_id)) => {
                    ScanOutcome::Structured(ParsedIdentifiers::new(group_id, plant_id))
                }
                (Err(e), _) | (_, Err(e)) => ScanOutcome::Invalid(e),
            };
        }

        // A lone id field means a broken structured submission, not a raw one.
        if let Some(pair) = self
            .fields
            .pairs
            .iter()
            .find(|p| present(&p.group) || present(&p.plant))
        {
            let missing = if present(&pair.group) { &pair.plant } else { &pair.group };
            return ScanOutcome::Invalid(InvalidPayload::MissingIdentifier(missing.clone()));
        }

        match body.get(&self.fields.raw) {
            None | Some(Value::Null) => {
                ScanOutcome::Invalid(InvalidPayload::MissingField(self.fields.raw.clone()))
            }
            Some(Value::String(raw)) => match self.parse_raw(raw) {
                Ok(ids) => ScanOutcome::RawString(ids),
                Err(e) => ScanOutcome::Invalid(e),
            },
            Some(_) => ScanOutcome::Invalid(InvalidPayload::Empty),
        }
    }

    /// Extracts the key from undecoded tag text such as `*A7*randomjunk*V99*`.
    pub fn parse_raw(&self, raw: &str) -> Result<ParsedIdentifiers, InvalidPayload> {
        if raw.is_empty() {
            return Err(InvalidPayload::Empty);
        }
        let group_id = capture(&self.group_token, raw).ok_or(InvalidPayload::MissingToken('A'))?;
        let plant_id = capture(&self.plant_token, raw).ok_or(InvalidPayload::MissingToken('V'))?;
        Ok(ParsedIdentifiers::new(group_id, plant_id))
    }
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn identifier(name: &str, value: Option<&Value>) -> Result<String, InvalidPayload> {
    let text = match value {
        None | Some(Value::Null) => return Err(InvalidPayload::MissingIdentifier(name.into())),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(InvalidPayload::BadIdentifier(name.into())),
    };
    if text.is_empty() {
        return Err(InvalidPayload::MissingIdentifier(name.into()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> ScanParser {
        ScanParser::new(ScanFields::default()).unwrap()
    }

    fn parse(body: Value) -> ScanOutcome {
        parser().parse(body.as_object().unwrap())
    }

    #[test]
    fn raw_tokens_are_found_in_either_order() {
        let expected = ParsedIdentifiers::new("123", "45");
        for raw in ["*A123**V45*", "*V45*xx*A123*", "tag:*A123*-junk-*V45*!"] {
            assert_eq!(
                parse(json!({ "qrCodeData": raw })),
                ScanOutcome::RawString(expected.clone()),
                "{raw}"
            );
        }
    }

    #[test]
    fn raw_string_missing_a_token_is_rejected() {
        assert_eq!(
            parse(json!({ "qrCodeData": "*V45*" })),
            ScanOutcome::Invalid(InvalidPayload::MissingToken('A'))
        );
        assert_eq!(
            parse(json!({ "qrCodeData": "*A123*" })),
            ScanOutcome::Invalid(InvalidPayload::MissingToken('V'))
        );
        assert_eq!(
            parse(json!({ "qrCodeData": "*A12x*V4*" })),
            ScanOutcome::Invalid(InvalidPayload::MissingToken('A'))
        );
    }

    #[test]
    fn empty_or_missing_raw_field_is_rejected() {
        assert_eq!(
            parse(json!({ "qrCodeData": "" })),
            ScanOutcome::Invalid(InvalidPayload::Empty)
        );
        assert_eq!(
            parse(json!({ "qrCodeData": 12 })),
            ScanOutcome::Invalid(InvalidPayload::Empty)
        );
        assert_eq!(
            parse(json!({})),
            ScanOutcome::Invalid(InvalidPayload::MissingField("qrCodeData".into()))
        );
    }

    #[test]
    fn first_occurrence_of_a_token_wins() {
        assert_eq!(
            parser().parse_raw("*A1**A2**V3*").unwrap(),
            ParsedIdentifiers::new("1", "3")
        );
    }

    #[test]
    fn structured_pairs_accept_strings_and_numbers() {
        assert_eq!(
            parse(json!({ "groupID": " 7 ", "plant": "99" })),
            ScanOutcome::Structured(ParsedIdentifiers::new("7", "99"))
        );
        assert_eq!(
            parse(json!({ "groupId": 7, "plantId": 99 })),
            ScanOutcome::Structured(ParsedIdentifiers::new("7", "99"))
        );
        assert_eq!(
            parse(json!({ "groupID": "7", "plantID": "99" })),
            ScanOutcome::Structured(ParsedIdentifiers::new("7", "99"))
        );
    }

    #[test]
    fn first_complete_pair_is_chosen_across_overlapping_names() {
        assert_eq!(
            parse(json!({ "groupID": "3", "plantID": "14" })),
            ScanOutcome::Structured(ParsedIdentifiers::new("3", "14"))
        );
        assert_eq!(
            parse(json!({ "groupID": "3", "plant": "14", "plantID": "15" })),
            ScanOutcome::Structured(ParsedIdentifiers::new("3", "14"))
        );
        assert_eq!(
            parse(json!({ "groupID": "3", "plant": null, "plantID": "15" })),
            ScanOutcome::Structured(ParsedIdentifiers::new("3", "15"))
        );
    }

    #[test]
    fn lone_id_field_names_its_missing_partner() {
        assert_eq!(
            parse(json!({ "groupID": "3" })),
            ScanOutcome::Invalid(InvalidPayload::MissingIdentifier("plant".into()))
        );
        assert_eq!(
            parse(json!({ "plantId": "3", "qrCodeData": "*A1**V2*" })),
            ScanOutcome::Invalid(InvalidPayload::MissingIdentifier("groupId".into()))
        );
    }

    #[test]
    fn structured_values_are_not_digit_checked() {
        assert_eq!(
            parse(json!({ "groupId": "G-7", "plantId": "rose" })),
            ScanOutcome::Structured(ParsedIdentifiers::new("G-7", "rose"))
        );
    }

    #[test]
    fn broken_structured_pair_does_not_fall_back_to_raw() {
        let outcome = parse(json!({ "groupId": "7", "plantId": "  ", "qrCodeData": "*A1**V2*" }));
        assert_eq!(
            outcome,
            ScanOutcome::Invalid(InvalidPayload::MissingIdentifier("plantId".into()))
        );

        let outcome = parse(json!({ "groupId": true, "plantId": "2" }));
        assert_eq!(
            outcome,
            ScanOutcome::Invalid(InvalidPayload::BadIdentifier("groupId".into()))
        );
    }

    #[test]
    fn structured_form_takes_precedence_over_raw() {
        let outcome = parse(json!({ "groupId": "7", "plantId": "99", "qrCodeData": "*A1**V2*" }));
        assert_eq!(outcome, ScanOutcome::Structured(ParsedIdentifiers::new("7", "99")));
    }

    #[test]
    fn configured_field_names_replace_the_defaults() {
        let parser = ScanParser::new(ScanFields {
            raw: "tag".into(),
            pairs: vec![FieldPair::new("g", "p")],
        })
        .unwrap();
        let body = json!({ "g": "1", "p": "2" });
        assert_eq!(
            parser.parse(body.as_object().unwrap()).into_result().unwrap(),
            ParsedIdentifiers::new("1", "2")
        );
        let body = json!({ "qrCodeData": "*A1**V2*" });
        assert_eq!(
            parser.parse(body.as_object().unwrap()).into_result(),
            Err(InvalidPayload::MissingField("tag".into()))
        );
    }
}
