//! Synthetic record generator
//!
//! Produces batches of dummy call records for seeding the stores. Generated
//! records carry the at-rest shape: `_id` key and epoch-seconds origination
//! time.

use chrono::{Local, LocalResult, NaiveDate, TimeZone};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::record::Device;

/// First record id in a generated batch; ids are sequential from here.
pub const INITIAL_ID: i64 = 12344;

/// Cluster names are `domainserver<n>` with n in this range.
const SERVER_RANGE_START: u32 = 0;
const SERVER_RANGE_END: u32 = 9;

/// User ids are random digit strings of this length.
const USER_ID_LENGTH: usize = 9;

/// Pool size of distinct user ids is `count / USER_ID_DIVIDER`.
const USER_ID_DIVIDER: usize = 3;

/// Origination timestamps fall inside this calendar-year window.
const TIMESTAMP_START_YEAR: i32 = 2020;
const TIMESTAMP_END_YEAR: i32 = 2020;

/// A generated record in its at-rest shape (epoch origination time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecord {
    #[serde(rename = "_id")]
    pub id: i64,

    /// Epoch seconds
    pub origination_time: i64,

    pub cluster_id: String,

    pub user_id: String,

    pub devices: Device,
}

/// Random digit string (digits 1-9) of the given length.
fn random_digits(rng: &mut impl Rng, length: usize) -> String {
    (0..length).map(|_| char::from(b'0' + rng.random_range(1..=9))).collect()
}

/// Epoch bounds of the generator's timestamp window, in local time.
fn timestamp_window() -> (i64, i64) {
    (
        local_epoch(TIMESTAMP_START_YEAR, 1, 1, 0, 0, 0),
        local_epoch(TIMESTAMP_END_YEAR, 12, 31, 23, 59, 59),
    )
}

fn local_epoch(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> i64 {
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, min, sec))
        .unwrap_or_default();
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.timestamp(),
        LocalResult::None => naive.and_utc().timestamp(),
    }
}

/// Generate the given number of dummy records.
///
/// Ids are sequential from [`INITIAL_ID`]; user ids are drawn from a small
/// shared pool so filtering by user matches several records.
#[must_use]
pub fn generate_records(count: usize) -> Vec<GeneratedRecord> {
    let mut rng = rand::rng();
    let (window_start, window_end) = timestamp_window();

    let pool_size = (count / USER_ID_DIVIDER).max(1);
    let user_ids: Vec<String> = (0..pool_size)
        .map(|_| random_digits(&mut rng, USER_ID_LENGTH))
        .collect();

    let records: Vec<GeneratedRecord> = (0..count)
        .map(|offset| GeneratedRecord {
            id: INITIAL_ID + offset as i64,
            origination_time: rng.random_range(window_start..=window_end),
            cluster_id: format!(
                "domainserver{}",
                rng.random_range(SERVER_RANGE_START..=SERVER_RANGE_END)
            ),
            user_id: user_ids
                .choose(&mut rng)
                .cloned()
                .unwrap_or_default(),
            devices: Device {
                phone: format!("SEP{}", random_digits(&mut rng, 10)),
                voicemail: format!("{}VM", random_digits(&mut rng, 9)),
            },
        })
        .collect();

    info!(count = records.len(), "generated dummy records");
    records
}
