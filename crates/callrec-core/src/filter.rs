//! Filter request validation and the shared filter specification
//!
//! A [`FilterRequest`] is the raw caller-supplied shape. Validation turns it
//! into an immutable [`FilterSpec`]: the mandatory date range is parsed and
//! checked, the optional fields pass through untouched (empty string means
//! unset). Backend engines translate one spec into their native query form.

use chrono::{Local, LocalResult, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::record::Record;

/// Literal separator between the two dates of a range expression.
pub const DATE_RANGE_SEPARATOR: &str = " to ";

/// Calendar date format for range endpoints.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical datetime format used in responses and relational bounds.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Incoming filter request (wire shape shared by all three backends)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    /// Date range in the form "YYYY-MM-DD to YYYY-MM-DD" (required)
    pub date_range: String,

    /// Device phone number (optional, empty means unset)
    #[serde(default)]
    pub phone_number: String,

    /// Device voicemail (optional, empty means unset)
    #[serde(default)]
    pub voice_mail: String,

    /// Record user id (optional, empty means unset)
    #[serde(default)]
    pub user_id: String,

    /// Record cluster name (optional, empty means unset)
    #[serde(default)]
    pub cluster: String,
}

impl FilterRequest {
    /// Build a request from a date range only.
    #[must_use]
    pub fn for_range(date_range: impl Into<String>) -> Self {
        Self {
            date_range: date_range.into(),
            phone_number: String::new(),
            voice_mail: String::new(),
            user_id: String::new(),
            cluster: String::new(),
        }
    }
}

/// The closed set of optional filter fields.
///
/// Each field maps a request value to one typed record accessor; filter
/// names are never resolved to attribute paths at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Cluster,
    UserId,
    PhoneNumber,
    VoiceMail,
}

impl FilterField {
    /// All optional fields, in evaluation order.
    pub const ALL: [Self; 4] = [Self::Cluster, Self::UserId, Self::PhoneNumber, Self::VoiceMail];

    /// The request value this field filters on.
    #[must_use]
    pub fn request_value(self, request: &FilterRequest) -> &str {
        match self {
            Self::Cluster => &request.cluster,
            Self::UserId => &request.user_id,
            Self::PhoneNumber => &request.phone_number,
            Self::VoiceMail => &request.voice_mail,
        }
    }

    /// The record attribute this field matches against.
    #[must_use]
    pub fn record_value(self, record: &Record) -> &str {
        match self {
            Self::Cluster => &record.cluster_id,
            Self::UserId => &record.user_id,
            Self::PhoneNumber => &record.devices.phone,
            Self::VoiceMail => &record.devices.voicemail,
        }
    }

    /// Field path used in document-store equality clauses.
    #[must_use]
    pub fn document_path(self) -> &'static str {
        match self {
            Self::Cluster => "clusterId",
            Self::UserId => "userId",
            Self::PhoneNumber => "devices.phone",
            Self::VoiceMail => "devices.voicemail",
        }
    }
}

/// Validated, immutable representation of a filter request.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    request: FilterRequest,
    start: NaiveDate,
    end: NaiveDate,
    start_text: String,
    end_text: String,
}

impl FilterSpec {
    /// Validate a raw request into a spec.
    ///
    /// The date range must split on `" to "` into two parseable
    /// `YYYY-MM-DD` dates that are textually different, with start ≤ end.
    /// Optional fields pass through unvalidated.
    pub fn new(request: FilterRequest) -> Result<Self> {
        let parts: Vec<&str> = request.date_range.split(DATE_RANGE_SEPARATOR).collect();
        if parts.len() < 2 {
            return Err(FilterError::InvalidDateRange(format!(
                "missing '{}' separator",
                DATE_RANGE_SEPARATOR.trim()
            )));
        }

        let start_text = parts[0].trim().to_string();
        let end_text = parts[1].trim().to_string();

        let start = parse_date(&start_text)?;
        let end = parse_date(&end_text)?;

        if start_text == end_text {
            return Err(FilterError::InvalidDateRange(
                "start date and end date must not be the same".to_string(),
            ));
        }
        if start > end {
            return Err(FilterError::InvalidDateRange(
                "start date must be less than or equal to end date".to_string(),
            ));
        }

        Ok(Self {
            request,
            start,
            end,
            start_text,
            end_text,
        })
    }

    /// Start date of the validated range.
    #[must_use]
    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    /// End date of the validated range.
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.end
    }

    /// Start endpoint as the raw (trimmed) date text.
    #[must_use]
    pub fn start_text(&self) -> &str {
        &self.start_text
    }

    /// End endpoint as the raw (trimmed) date text.
    #[must_use]
    pub fn end_text(&self) -> &str {
        &self.end_text
    }

    /// Start endpoint as epoch seconds at local midnight.
    #[must_use]
    pub fn start_epoch(&self) -> i64 {
        local_midnight_epoch(self.start)
    }

    /// End endpoint as epoch seconds at local midnight.
    #[must_use]
    pub fn end_epoch(&self) -> i64 {
        local_midnight_epoch(self.end)
    }

    /// Start endpoint in canonical datetime form ("YYYY-MM-DD 00:00:00").
    #[must_use]
    pub fn start_datetime_text(&self) -> String {
        midnight_text(self.start)
    }

    /// End endpoint in canonical datetime form ("YYYY-MM-DD 00:00:00").
    #[must_use]
    pub fn end_datetime_text(&self) -> String {
        midnight_text(self.end)
    }

    /// Value of one optional field, or `None` when unset.
    #[must_use]
    pub fn value(&self, field: FilterField) -> Option<&str> {
        let value = field.request_value(&self.request);
        (!value.is_empty()).then_some(value)
    }

    /// The optional fields that are present, in evaluation order.
    #[must_use]
    pub fn active_fields(&self) -> Vec<(FilterField, &str)> {
        FilterField::ALL
            .iter()
            .filter_map(|&field| self.value(field).map(|value| (field, value)))
            .collect()
    }

    /// Whether any optional field is present.
    #[must_use]
    pub fn has_extra_filters(&self) -> bool {
        FilterField::ALL.iter().any(|&field| self.value(field).is_some())
    }
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|err| FilterError::InvalidDateRange(format!("'{text}': {err}")))
}

/// Epoch seconds of local midnight for the given date.
///
/// Dates are naive/local throughout; a DST-skipped midnight falls back to
/// the UTC interpretation.
fn local_midnight_epoch(date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.timestamp(),
        LocalResult::None => midnight.and_utc().timestamp(),
    }
}

fn midnight_text(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN).format(DATETIME_FORMAT).to_string()
}
