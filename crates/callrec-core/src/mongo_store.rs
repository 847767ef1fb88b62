//! Document-store backend engine
//!
//! Builds a single filter document — an epoch range on `originationTime`,
//! optionally conjoined with an `$or` alternation over the active optional
//! fields — and executes it against the records collection. Unlike the JSON
//! engine's pure union, the date bound here is always conjunctive:
//! date range AND (any one of the active equalities).
//!
//! Connectivity is probed with a single read before the query; a probe
//! failure classifies as a connection error, everything after as an
//! operation error.

use mongodb::bson::{Document, doc};
use mongodb::sync::{Client, Collection};
use tracing::{debug, info};

use crate::backup;
use crate::config::MongoConfig;
use crate::error::{FilterError, Result};
use crate::filter::FilterSpec;
use crate::generator::GeneratedRecord;
use crate::record::{FilterResult, Record};

/// Filter engine over the document store.
pub struct MongoStore {
    collection: Collection<Document>,
    collection_name: String,
}

impl MongoStore {
    /// Create an engine for the configured database/collection.
    ///
    /// The client connects lazily; reachability is only observed at the
    /// probe preceding each operation.
    pub fn connect(config: &MongoConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri).map_err(FilterError::connection)?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);
        Ok(Self {
            collection,
            collection_name: config.collection.clone(),
        })
    }

    /// Build the filter document for a validated spec.
    ///
    /// Shape: `{originationTime: {$gte: startEpoch, $lte: endEpoch}}`, plus
    /// `$or: [{field: value}, ...]` when any optional field is active. The
    /// `$or` list is only merged in when non-empty.
    #[must_use]
    pub fn build_query(spec: &FilterSpec) -> Document {
        let mut query = doc! {
            "originationTime": { "$gte": spec.start_epoch(), "$lte": spec.end_epoch() },
        };

        let alternatives: Vec<Document> = spec
            .active_fields()
            .into_iter()
            .map(|(field, value)| doc! { field.document_path(): value })
            .collect();
        if !alternatives.is_empty() {
            query.insert("$or", alternatives);
        }

        query
    }

    /// One read before query execution; failure means the store is
    /// unreachable.
    fn probe(&self) -> Result<()> {
        self.collection
            .find_one(doc! {})
            .run()
            .map_err(FilterError::connection)?;
        Ok(())
    }

    /// Execute a filter document and collect the raw matches.
    pub fn execute(&self, query: Document) -> Result<Vec<Record>> {
        debug!(query = %query, "executing document-store filter query");
        let cursor = self
            .collection
            .clone_with_type::<Record>()
            .find(query)
            .run()
            .map_err(FilterError::operation)?;

        let mut records = Vec::new();
        for item in cursor {
            records.push(item.map_err(FilterError::operation)?);
        }
        debug!(count = records.len(), "document-store query matched");
        Ok(records)
    }

    /// Full pipeline: probe → build query → execute → normalize/dedup.
    pub fn run(&self, spec: &FilterSpec) -> Result<FilterResult> {
        self.probe()?;
        let query = Self::build_query(spec);
        let records = self.execute(query)?;
        let result = FilterResult::new(records);
        info!(count = result.len(), "document-store filter pipeline finished");
        Ok(result)
    }

    /// Write a freshly generated dataset, archiving any existing documents
    /// into a timestamped backup collection first.
    ///
    /// The probe/copy/clear phase classifies as a connection failure, the
    /// insert as an operation failure. There is no rollback between the
    /// clear and the insert; a failure there leaves the collection empty
    /// (accepted risk).
    pub fn store_records(&self, records: &[GeneratedRecord]) -> Result<()> {
        self.backup_existing().map_err(FilterError::connection)?;

        self.collection
            .clone_with_type::<GeneratedRecord>()
            .insert_many(records)
            .run()
            .map_err(FilterError::operation)?;
        info!(count = records.len(), "records stored in the document store");
        Ok(())
    }

    fn backup_existing(&self) -> mongodb::error::Result<()> {
        let existing = self.collection.find_one(doc! {}).run()?;
        if existing.is_none() {
            return Ok(());
        }

        let backup = backup::backup_name(&self.collection_name);
        info!(backup = %backup, "existing records found; copying collection to backup");
        self.collection
            .aggregate([doc! { "$match": {} }, doc! { "$out": &backup }])
            .run()?;
        self.collection.delete_many(doc! {}).run()?;
        Ok(())
    }
}

impl std::fmt::Debug for MongoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoStore")
            .field("collection", &self.collection_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterRequest;
    use mongodb::bson::Bson;

    fn spec(range: &str) -> FilterSpec {
        FilterSpec::new(FilterRequest::for_range(range)).unwrap()
    }

    #[test]
    fn range_only_query_has_exactly_one_clause() {
        let spec = spec("2021-01-01 to 2021-01-02");
        let query = MongoStore::build_query(&spec);

        assert_eq!(query.len(), 1);
        let range = query.get_document("originationTime").unwrap();
        assert_eq!(range.get_i64("$gte").unwrap(), spec.start_epoch());
        assert_eq!(range.get_i64("$lte").unwrap(), spec.end_epoch());
        assert!(query.get("$or").is_none());
    }

    #[test]
    fn active_fields_become_an_or_alternation() {
        let mut request = FilterRequest::for_range("2021-01-01 to 2021-01-02");
        request.cluster = "c1".to_string();
        request.user_id = "u1".to_string();
        let query = MongoStore::build_query(&FilterSpec::new(request).unwrap());

        let alternation = query.get_array("$or").unwrap();
        assert_eq!(
            alternation,
            &vec![
                Bson::Document(doc! { "clusterId": "c1" }),
                Bson::Document(doc! { "userId": "u1" }),
            ]
        );
        // the range stays conjunctive alongside the alternation
        assert!(query.get_document("originationTime").is_ok());
    }

    #[test]
    fn device_fields_use_nested_paths() {
        let mut request = FilterRequest::for_range("2021-01-01 to 2021-01-02");
        request.phone_number = "SEP123".to_string();
        request.voice_mail = "123VM".to_string();
        let query = MongoStore::build_query(&FilterSpec::new(request).unwrap());

        let alternation = query.get_array("$or").unwrap();
        assert_eq!(
            alternation,
            &vec![
                Bson::Document(doc! { "devices.phone": "SEP123" }),
                Bson::Document(doc! { "devices.voicemail": "123VM" }),
            ]
        );
    }

    #[test]
    fn epoch_bounds_span_the_requested_days() {
        let spec = spec("2021-01-01 to 2021-01-03");
        let query = MongoStore::build_query(&spec);
        let range = query.get_document("originationTime").unwrap();
        let gte = range.get_i64("$gte").unwrap();
        let lte = range.get_i64("$lte").unwrap();
        assert_eq!(lte - gte, 2 * 86_400);
    }
}
