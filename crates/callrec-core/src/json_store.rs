//! JSON snapshot backend engine
//!
//! Loads a flat snapshot of records from disk, applies the date filter, then
//! union-filters on the optional fields: each active field independently
//! selects a subset of the date-filtered records and the subsets are
//! combined by OR, not intersected. Duplicates collapse in the final
//! [`FilterResult`].
//!
//! The date filter compares origination times as canonical strings against
//! the bare date endpoints. This is lexical comparison, kept deliberately:
//! it orders correctly only because the canonical format is fixed-width and
//! zero-padded.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use tracing::{debug, info};

use crate::backup;
use crate::config::JsonStoreConfig;
use crate::error::{FilterError, Result};
use crate::filter::FilterSpec;
use crate::generator::GeneratedRecord;
use crate::record::{FilterResult, Record};

/// Filter engine over the JSON snapshot file.
#[derive(Debug, Clone)]
pub struct JsonStore {
    config: JsonStoreConfig,
}

impl JsonStore {
    #[must_use]
    pub fn new(config: JsonStoreConfig) -> Self {
        Self { config }
    }

    /// Path of the primary snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.config.storage_dir.join(&self.config.file_name)
    }

    /// Load the full record list from the snapshot.
    ///
    /// Fails with [`FilterError::SourceNotFound`] when the snapshot path
    /// does not exist.
    pub fn load(&self) -> Result<Vec<Record>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Err(FilterError::SourceNotFound(path));
        }

        let file = File::open(&path).map_err(FilterError::operation)?;
        let records: Vec<Record> =
            serde_json::from_reader(BufReader::new(file)).map_err(FilterError::operation)?;
        info!(count = records.len(), "loaded record snapshot");
        Ok(records)
    }

    /// Keep records whose origination time falls inside the range,
    /// inclusive on both ends (string-lexical on the fixed-width format).
    #[must_use]
    pub fn filter_by_date(&self, records: Vec<Record>, spec: &FilterSpec) -> Vec<Record> {
        let filtered: Vec<Record> = records
            .into_iter()
            .filter(|record| {
                spec.start_text() <= record.origination_time.as_str()
                    && record.origination_time.as_str() <= spec.end_text()
            })
            .collect();
        debug!(count = filtered.len(), "records matched the date range");
        filtered
    }

    /// Union-combine the optional field filters.
    ///
    /// Each active field selects its matching subset of `date_filtered`
    /// independently; the subsets are appended in evaluation order. When no
    /// optional field is set the date-filtered records pass through
    /// unchanged.
    #[must_use]
    pub fn apply_extra_filters(&self, date_filtered: Vec<Record>, spec: &FilterSpec) -> Vec<Record> {
        if !spec.has_extra_filters() {
            debug!("no optional filters set; keeping the date-filtered set");
            return date_filtered;
        }

        let mut selected = Vec::new();
        for (field, value) in spec.active_fields() {
            let matches: Vec<Record> = date_filtered
                .iter()
                .filter(|record| field.record_value(record) == value)
                .cloned()
                .collect();
            debug!(field = ?field, count = matches.len(), "optional filter matched");
            selected.extend(matches);
        }
        selected
    }

    /// Full pipeline: load → date filter → union filters → normalize/dedup.
    pub fn run(&self, spec: &FilterSpec) -> Result<FilterResult> {
        let records = self.load()?;
        let dated = self.filter_by_date(records, spec);
        let selected = self.apply_extra_filters(dated, spec);
        let result = FilterResult::new(selected);
        info!(count = result.len(), "JSON filter pipeline finished");
        Ok(result)
    }

    /// Write a freshly generated dataset, rotating any existing snapshot
    /// into the backup directory first. Returns the primary path written.
    pub fn store_records(&self, records: &[GeneratedRecord]) -> Result<PathBuf> {
        backup::rotate_snapshot(
            &self.config.storage_dir,
            &self.config.backup_dir,
            &self.config.file_name,
        )?;

        let path = self.snapshot_path();
        let file = File::create(&path).map_err(FilterError::operation)?;
        serde_json::to_writer(BufWriter::new(file), records).map_err(FilterError::operation)?;
        info!(count = records.len(), path = %path.display(), "snapshot written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterRequest;
    use crate::generator;
    use crate::record::testutil::record;

    fn store_in(dir: &std::path::Path) -> JsonStore {
        JsonStore::new(JsonStoreConfig {
            storage_dir: dir.to_path_buf(),
            ..JsonStoreConfig::default()
        })
    }

    fn write_snapshot(store: &JsonStore, records: &[Record]) {
        std::fs::create_dir_all(store.snapshot_path().parent().unwrap()).unwrap();
        // at rest the records carry the `_id` key, same as the response
        // records after a rename
        let raw: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "_id": r.id,
                    "originationTime": r.origination_time,
                    "clusterId": r.cluster_id,
                    "userId": r.user_id,
                    "devices": {"phone": r.devices.phone, "voicemail": r.devices.voicemail},
                })
            })
            .collect();
        std::fs::write(store.snapshot_path(), serde_json::to_vec(&raw).unwrap()).unwrap();
    }

    fn spec(range: &str) -> FilterSpec {
        FilterSpec::new(FilterRequest::for_range(range)).unwrap()
    }

    #[test]
    fn missing_snapshot_is_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = store_in(dir.path()).run(&spec("2021-01-01 to 2021-01-02")).unwrap_err();
        assert!(matches!(err, FilterError::SourceNotFound(_)));
    }

    #[test]
    fn date_filter_is_inclusive_lexical() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let records = vec![
            record(1, "2020-12-31 23:59:59", "A"), // before start
            record(2, "2021-01-01 00:00:00", "A"), // inside, at start midnight
            record(3, "2021-01-01 18:30:00", "A"), // inside
            record(4, "2021-01-02 00:00:00", "A"), // after the bare end-date string
        ];

        let kept = store.filter_by_date(records, &spec("2021-01-01 to 2021-01-02"));
        let ids: Vec<i64> = kept.iter().map(|r| r.id).collect();
        // the end-of-range record compares greater than the bare "2021-01-02"
        // endpoint; lexical comparison excludes it
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn cluster_filter_selects_matching_subset() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        write_snapshot(
            &store,
            &[
                record(1, "2021-01-01 10:00:00", "A"),
                record(2, "2021-01-01 11:00:00", "B"),
            ],
        );

        let mut request = FilterRequest::for_range("2021-01-01 to 2021-01-02");
        request.cluster = "A".to_string();
        let result = store.run(&FilterSpec::new(request).unwrap()).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.records()[0].id, 1);
    }

    #[test]
    fn no_optional_filters_returns_full_date_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        write_snapshot(
            &store,
            &[
                record(1, "2021-01-01 10:00:00", "A"),
                record(2, "2021-01-01 11:00:00", "B"),
            ],
        );

        let result = store.run(&spec("2021-01-01 to 2021-01-02")).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn union_filters_do_not_duplicate_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let mut matching_both = record(1, "2021-01-01 10:00:00", "A");
        matching_both.user_id = "42".to_string();
        write_snapshot(&store, &[matching_both, record(2, "2021-01-01 11:00:00", "B")]);

        let mut request = FilterRequest::for_range("2021-01-01 to 2021-01-02");
        request.cluster = "A".to_string();
        request.user_id = "42".to_string();
        let result = store.run(&FilterSpec::new(request).unwrap()).unwrap();

        // record 1 matches both active filters but appears once
        assert_eq!(result.len(), 1);
        assert_eq!(result.records()[0].id, 1);
    }

    #[test]
    fn union_filters_combine_across_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let mut by_user = record(2, "2021-01-01 11:00:00", "B");
        by_user.user_id = "42".to_string();
        write_snapshot(
            &store,
            &[
                record(1, "2021-01-01 10:00:00", "A"),
                by_user,
                record(3, "2021-01-01 12:00:00", "C"),
            ],
        );

        let mut request = FilterRequest::for_range("2021-01-01 to 2021-01-02");
        request.cluster = "A".to_string();
        request.user_id = "42".to_string();
        let result = store.run(&FilterSpec::new(request).unwrap()).unwrap();

        // OR across fields: the cluster match and the user match both appear
        let ids: Vec<i64> = result.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn rewriting_rotates_exactly_one_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let first = generator::generate_records(3);
        let second = generator::generate_records(2);

        store.store_records(&first).unwrap();
        let first_write = backup::backup_timestamp();
        // backup names have second resolution; make the second write later
        std::thread::sleep(std::time::Duration::from_millis(1100));
        store.store_records(&second).unwrap();

        assert!(store.snapshot_path().exists());
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);

        let backup_dir = dir.path().join("backup_records");
        let backups: Vec<String> = std::fs::read_dir(&backup_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].starts_with("BKP_"));

        let archived_ts = backups[0]
            .trim_start_matches("BKP_")
            .trim_end_matches("_current_records.json")
            .to_string();
        assert!(archived_ts >= first_write);
    }
}
