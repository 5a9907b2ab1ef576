//! Metabase handle shared by all engine operations

use std::path::Path;
use std::sync::Arc;
use strata_common::config::MetabaseConfig;
use strata_common::{Config, Error, Result};
use strata_meta_store::{MetaStore, MetaStoreResult, ReadTxn, WriteTxn};
use tracing::{error, info};

/// Handle to the metabase engine
///
/// Holds no state besides the store handle and its configuration, so it can
/// be cloned freely and shared between threads.
#[derive(Clone)]
pub struct Metabase {
    store: Arc<MetaStore>,
    config: MetabaseConfig,
}

impl Metabase {
    /// Open the metabase file described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_path(config.db_path(), config.metabase.clone())
    }

    /// Open the metabase file at an explicit path
    pub fn open_path(path: impl AsRef<Path>, config: MetabaseConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;
        let store = MetaStore::open(path, config.durability).map_err(|e| {
            error!("Failed to open metabase at {}: {}", path.display(), e);
            Error::from(e)
        })?;
        info!(
            "Metabase opened at {} (policy={:?}, max_list_limit={})",
            path.display(),
            config.pending_object_policy,
            config.max_list_limit
        );
        Ok(Self { store: Arc::new(store), config })
    }

    /// Wrap an already opened store
    pub fn new(store: Arc<MetaStore>, config: MetabaseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Engine configuration
    #[must_use]
    pub const fn config(&self) -> &MetabaseConfig {
        &self.config
    }

    /// Underlying store, for inspection tooling
    #[must_use]
    pub fn store(&self) -> &MetaStore {
        &self.store
    }

    pub(crate) fn read(&self, op: &'static str) -> Result<ReadTxn> {
        self.store.begin_read().with_op(op)
    }

    pub(crate) fn write(&self, op: &'static str) -> Result<WriteTxn> {
        self.store.begin_write().with_op(op)
    }

    /// Effective page size for a validated, non-negative caller limit
    ///
    /// `None` means unbounded.
    pub(crate) fn page_limit(&self, limit: i32) -> Option<usize> {
        match usize::try_from(limit) {
            Ok(0) | Err(_) => None,
            Ok(n) => Some(n.min(self.config.max_list_limit)),
        }
    }
}

/// Log a store failure with the operation that hit it and convert it
pub(crate) trait WithOp<T> {
    fn with_op(self, op: &'static str) -> Result<T>;
}

impl<T> WithOp<T> for MetaStoreResult<T> {
    fn with_op(self, op: &'static str) -> Result<T> {
        self.map_err(|e| {
            error!(op, "Metabase store failure: {}", e);
            Error::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, test_metabase};
    use strata_common::config::{Durability, PendingObjectPolicy};
    use strata_common::{SegmentPosition, StreamId};
    use tempfile::tempdir;

    #[test]
    fn test_page_limit_clamped() {
        let dir = tempdir().unwrap();
        let config = MetabaseConfig {
            max_list_limit: 5,
            durability: Durability::None,
            ..MetabaseConfig::default()
        };
        let db = Metabase::open_path(dir.path().join("meta.redb"), config).unwrap();
        assert_eq!(db.page_limit(0), None);
        assert_eq!(db.page_limit(3), Some(3));
        assert_eq!(db.page_limit(5), Some(5));
        assert_eq!(db.page_limit(500), Some(5));
    }

    #[test]
    fn test_zero_list_limit_rejected() {
        let dir = tempdir().unwrap();
        let config = MetabaseConfig {
            max_list_limit: 0,
            durability: Durability::None,
            ..MetabaseConfig::default()
        };
        let path = dir.path().join("meta.redb");
        let err = Metabase::open_path(&path, config.clone()).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
        assert!(!path.exists());

        let store = Arc::new(MetaStore::open(&path, Durability::None).unwrap());
        assert!(Metabase::new(Arc::clone(&store), config).is_err());

        // A valid limit still pages to the end
        let config = MetabaseConfig {
            max_list_limit: 1,
            durability: Durability::None,
            ..MetabaseConfig::default()
        };
        let db = Metabase::new(store, config).unwrap();
        let stream = testing::random_object_stream();
        testing::create_object(&db, &stream, 3);
        let mut cursor = None;
        let mut seen = Vec::new();
        loop {
            let page = db
                .list_segments(crate::ListSegments {
                    stream_id: stream.stream_id,
                    cursor,
                    limit: 10,
                })
                .unwrap();
            assert_eq!(page.segments.len(), 1);
            cursor = page.segments.last().map(|s| s.position);
            seen.extend(page.segments.iter().map(|s| s.position));
            if !page.more {
                break;
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_open_from_config() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.node.data_dir = dir.path().join("data");
        config.metabase.durability = Durability::None;
        config.metabase.pending_object_policy = PendingObjectPolicy::MultiplePending;

        let db = Metabase::open(&config).unwrap();
        assert!(config.db_path().exists());
        assert_eq!(
            db.config().pending_object_policy,
            PendingObjectPolicy::MultiplePending
        );
    }

    #[test]
    fn test_handle_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Metabase>();
    }

    #[test]
    fn test_concurrent_segment_commits() {
        let (_dir, db) = test_metabase();
        let stream = testing::random_object_stream();
        testing::begin_object(&db, &stream);

        // Parts land from independent threads in arbitrary order
        let handles: Vec<_> = (0..8u32)
            .rev()
            .map(|part| {
                let db = db.clone();
                let stream = stream.clone();
                std::thread::spawn(move || {
                    testing::upload_segment(&db, &stream, SegmentPosition::new(part, 0), 512);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let object = db
            .commit_object(testing::commit_opts(&stream, Some(8)))
            .unwrap();
        assert_eq!(object.segment_count, 8);
        assert_eq!(object.total_plain_size, 8 * 512);

        let listed = testing::list_all(&db, stream.stream_id);
        let offsets: Vec<i64> = listed.iter().map(|s| s.plain_offset).collect();
        assert_eq!(offsets, (0..8).map(|i| i * 512).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_object_commits_single_winner() {
        let (_dir, db) = test_metabase();
        let stream = testing::random_object_stream();
        testing::begin_object(&db, &stream);
        testing::upload_segment(&db, &stream, SegmentPosition::new(0, 0), 512);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                let stream = stream.clone();
                std::thread::spawn(move || db.commit_object(testing::commit_opts(&stream, None)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        for err in results.into_iter().filter_map(std::result::Result::err) {
            assert!(err.is_not_found(), "unexpected error: {err}");
        }
    }

    #[test]
    fn test_readers_never_see_partial_commit() {
        let (_dir, db) = test_metabase();
        let stream = testing::random_object_stream();
        testing::begin_object(&db, &stream);
        for index in 0..6 {
            testing::upload_segment(&db, &stream, SegmentPosition::new(0, index), 100);
        }

        let reader = {
            let db = db.clone();
            let location = stream.location();
            let stream_id = stream.stream_id;
            std::thread::spawn(move || {
                for _ in 0..200 {
                    if let Ok(object) = db.get_object_latest_version(&location) {
                        let listed = testing::list_all(&db, stream_id);
                        let total: i64 = listed.iter().map(|s| i64::from(s.plain_size)).sum();
                        assert_eq!(object.segment_count as usize, listed.len());
                        assert_eq!(object.total_plain_size, total);
                    }
                }
            })
        };

        db.commit_object(testing::commit_opts(&stream, Some(6)))
            .unwrap();
        reader.join().unwrap();
    }

    #[test]
    fn test_unknown_stream_is_empty() {
        let (_dir, db) = test_metabase();
        assert!(testing::list_all(&db, StreamId::new()).is_empty());
    }
}
