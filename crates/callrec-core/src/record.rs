//! Canonical record shapes and result normalization
//!
//! Backend-native rows and documents all normalize into [`Record`]:
//! `{id, originationTime as "YYYY-MM-DD HH:MM:SS", clusterId, userId,
//! devices}`. A [`FilterResult`] collapses duplicate ids (first occurrence
//! wins) and derives its count from the deduplicated collection, never
//! caching it separately.

use std::collections::HashSet;

use chrono::{DateTime, Local};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::filter::DATETIME_FORMAT;

/// A device attached to a record. No independent identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub phone: String,
    pub voicemail: String,
}

/// Canonical record entity returned to callers regardless of backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique record key (`_id` at rest, `id` in responses)
    #[serde(rename(serialize = "id", deserialize = "_id"), alias = "id")]
    pub id: i64,

    /// Origination time in canonical form; epoch seconds at rest are
    /// converted on deserialization
    #[serde(deserialize_with = "deserialize_origination_time")]
    pub origination_time: String,

    pub cluster_id: String,

    pub user_id: String,

    pub devices: Device,
}

/// Render epoch seconds as the canonical local datetime string.
///
/// Epochs outside chrono's representable range keep their raw decimal form.
#[must_use]
pub fn epoch_to_canonical(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0).map_or_else(
        || secs.to_string(),
        |utc| utc.with_timezone(&Local).format(DATETIME_FORMAT).to_string(),
    )
}

fn deserialize_origination_time<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum EpochOrText {
        Epoch(i64),
        Text(String),
    }

    Ok(match EpochOrText::deserialize(deserializer)? {
        EpochOrText::Epoch(secs) => epoch_to_canonical(secs),
        EpochOrText::Text(text) => text,
    })
}

/// Ordered collection of unique records plus a derived count.
#[derive(Debug, Clone, Default)]
pub struct FilterResult {
    records: Vec<Record>,
}

impl FilterResult {
    /// Build a result from raw backend output, collapsing duplicate ids.
    ///
    /// First-seen order is retained; a record matching several filters only
    /// appears once.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        let mut seen = HashSet::with_capacity(records.len());
        let mut unique = Vec::with_capacity(records.len());
        for record in records {
            if seen.insert(record.id) {
                unique.push(record);
            }
        }
        Self { records: unique }
    }

    /// The deduplicated records, in first-seen order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of filtered records. Always the collection's length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Serialize for FilterResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // The count is recomputed from the collection on every
        // serialization, never stored.
        let mut state = serializer.serialize_struct("FilterResult", 2)?;
        state.serialize_field("result", &self.records)?;
        state.serialize_field("numberOfFilteredRecords", &self.records.len())?;
        state.end()
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::record;
    use super::*;

    #[test]
    fn deserializes_epoch_origination_time() {
        let raw = r#"{
            "_id": 12344,
            "originationTime": 1577880000,
            "clusterId": "domainserver1",
            "userId": "123456789",
            "devices": {"phone": "SEP0123456789", "voicemail": "123456789VM"}
        }"#;
        let parsed: Record = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.id, 12344);
        assert_eq!(parsed.origination_time, epoch_to_canonical(1_577_880_000));
        assert_eq!(parsed.devices.phone, "SEP0123456789");
    }

    #[test]
    fn deserializes_canonical_origination_time() {
        let raw = r#"{
            "_id": 1,
            "originationTime": "2020-06-01 10:00:00",
            "clusterId": "domainserver2",
            "userId": "987654321",
            "devices": {"phone": "SEP9", "voicemail": "9VM"}
        }"#;
        let parsed: Record = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.origination_time, "2020-06-01 10:00:00");
    }

    #[test]
    fn serializes_with_response_field_names() {
        let json = serde_json::to_value(record(7, "2020-01-01 00:00:01", "domainserver3")).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["originationTime"], "2020-01-01 00:00:01");
        assert_eq!(json["clusterId"], "domainserver3");
        assert!(json.get("_id").is_none());
    }

    #[test]
    fn canonical_form_is_fixed_width() {
        let text = epoch_to_canonical(1_577_880_000);
        assert_eq!(text.len(), 19);
        assert_eq!(&text[4..5], "-");
        assert_eq!(&text[10..11], " ");
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let result = FilterResult::new(vec![
            record(1, "2020-01-01 00:00:00", "A"),
            record(2, "2020-01-02 00:00:00", "B"),
            record(1, "2020-01-03 00:00:00", "C"),
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.records()[0].cluster_id, "A");
        assert_eq!(result.records()[1].id, 2);
    }

    #[test]
    fn count_tracks_deduplicated_length() {
        let result = FilterResult::new(vec![
            record(1, "2020-01-01 00:00:00", "A"),
            record(1, "2020-01-01 00:00:00", "A"),
        ]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["numberOfFilteredRecords"], 1);
        assert_eq!(json["result"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn empty_result_serializes_zero_count() {
        let json = serde_json::to_value(FilterResult::new(Vec::new())).unwrap();
        assert_eq!(json["numberOfFilteredRecords"], 0);
    }
}
