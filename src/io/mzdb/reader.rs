use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use rusqlite::{Connection, OpenFlags};

use crate::spectrum::Spectrum;

use super::cache::EntityCache;
use super::error::MzDbError;
use super::run_slices::RunSliceIterator;
use super::spectra::{FragmentOrdering, SpectrumIterator, SpectrumRangeIterator};
use super::sql::{
    load_entity_cache, load_isolation_windows, BoundingBoxQuery, IsolationWindow,
    SqliteBoundingBoxCursor,
};

pub const DEFAULT_PAGE_SIZE: usize = 64;

/// The tunable parameters of an [`MzDbReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReaderConfig {
    /// The number of bounding box rows fetched per cursor round-trip
    pub page_size: usize,
    pub fragment_ordering: FragmentOrdering,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            fragment_ordering: FragmentOrdering::default(),
        }
    }
}

pub type SqliteSpectrumIterator<'a> = SpectrumIterator<SqliteBoundingBoxCursor<'a>>;
pub type SqliteSpectrumRangeIterator<'a> = SpectrumRangeIterator<SqliteBoundingBoxCursor<'a>>;
pub type SqliteRunSliceIterator<'a> = RunSliceIterator<SqliteBoundingBoxCursor<'a>>;

/// Configure and open an [`MzDbReader`]
#[derive(Debug, Default, Clone)]
pub struct MzDbReaderBuilder {
    config: ReaderConfig,
    entity_cache: Option<Arc<EntityCache>>,
}

impl MzDbReaderBuilder {
    /// Set the number of bounding box rows each cursor fetches at a time.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Set how a spectrum's fragments from different run slices are combined.
    pub fn fragment_ordering(mut self, fragment_ordering: FragmentOrdering) -> Self {
        self.config.fragment_ordering = fragment_ordering;
        self
    }

    pub fn config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Re-use lookup tables already loaded by another reader of the same file instead
    /// of reading them again.
    pub fn entity_cache(mut self, entity_cache: Arc<EntityCache>) -> Self {
        self.entity_cache = Some(entity_cache);
        self
    }

    /// Open the mzDB file at `path` read-only
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<MzDbReader, MzDbError> {
        let path = path.as_ref();
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let mut reader = self.from_connection(connection)?;
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }

    /// Wrap an already open connection
    pub fn from_connection(self, connection: Connection) -> Result<MzDbReader, MzDbError> {
        if self.config.page_size == 0 {
            return Err(MzDbError::configuration("The page size must be positive"));
        }
        let entity_cache = match self.entity_cache {
            Some(cache) => cache,
            None => Arc::new(load_entity_cache(&connection)?),
        };
        Ok(MzDbReader {
            path: None,
            connection,
            entity_cache,
            config: self.config,
        })
    }
}

/// A reader over one mzDB file.
///
/// The reader owns a single SQLite connection. Every iterator it opens borrows that
/// connection through its own prepared statement, so several iterators may be live at
/// once. Independent threads should each open their own reader, sharing the loaded
/// [`EntityCache`] through [`MzDbReaderBuilder::entity_cache`].
pub struct MzDbReader {
    path: Option<PathBuf>,
    connection: Connection,
    entity_cache: Arc<EntityCache>,
    config: ReaderConfig,
}

impl Debug for MzDbReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MzDbReader")
            .field("path", &self.path)
            .field("spectrum_count", &self.entity_cache.spectrum_count())
            .field("config", &self.config)
            .finish()
    }
}

impl MzDbReader {
    pub fn builder() -> MzDbReaderBuilder {
        MzDbReaderBuilder::default()
    }

    /// Open the mzDB file at `path` with the default configuration
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, MzDbError> {
        Self::builder().from_path(path)
    }

    pub fn from_connection(connection: Connection) -> Result<Self, MzDbError> {
        Self::builder().from_connection(connection)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn entity_cache(&self) -> &Arc<EntityCache> {
        &self.entity_cache
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entity_cache.spectrum_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a raw cursor over the boxes a query selects
    pub fn bounding_boxes(
        &self,
        query: BoundingBoxQuery,
    ) -> Result<SqliteBoundingBoxCursor<'_>, MzDbError> {
        SqliteBoundingBoxCursor::new(
            &self.connection,
            &self.entity_cache,
            query,
            self.config.page_size,
        )
    }

    /// Iterate over every spectrum, or every spectrum of `ms_level`, in id order
    pub fn spectra(&self, ms_level: Option<u8>) -> Result<SqliteSpectrumIterator<'_>, MzDbError> {
        if let Some(level) = ms_level {
            self.entity_cache.validate_ms_level(level)?;
        }
        let cursor = self.bounding_boxes(BoundingBoxQuery::spectra(ms_level))?;
        Ok(
            SpectrumIterator::new(self.entity_cache.clone(), cursor, ms_level)?
                .with_fragment_ordering(self.config.fragment_ordering),
        )
    }

    /// Iterate over the spectra with ids in `[start, end]`, optionally of one MS level
    pub fn spectrum_range(
        &self,
        start: i64,
        end: i64,
        ms_level: Option<u8>,
    ) -> Result<SqliteSpectrumRangeIterator<'_>, MzDbError> {
        if start > end {
            return Err(MzDbError::Configuration(format!(
                "The spectrum range start {start} is greater than its end {end}"
            )));
        }
        debug!(
            "Reading spectra {start}-{end} from bounding box groups {:?}",
            self.entity_cache
                .leading_spectrum_id_bounds(start..=end, ms_level)
        );
        let cursor = self.bounding_boxes(BoundingBoxQuery::spectrum_range(start..=end, ms_level))?;
        Ok(
            SpectrumRangeIterator::new(self.entity_cache.clone(), cursor, start, end, ms_level)?
                .with_fragment_ordering(self.config.fragment_ordering),
        )
    }

    /// Read a single spectrum by id
    pub fn get_spectrum(&self, spectrum_id: i64) -> Result<Option<Spectrum>, MzDbError> {
        self.spectrum_range(spectrum_id, spectrum_id, None)?
            .next()
            .transpose()
    }

    /// Iterate over the MS1 run slices, optionally only those overlapping `mz_range`
    pub fn lc_ms_run_slices(
        &self,
        mz_range: Option<(f64, f64)>,
    ) -> Result<SqliteRunSliceIterator<'_>, MzDbError> {
        self.entity_cache.validate_ms_level(1)?;
        let cursor = self.bounding_boxes(BoundingBoxQuery::lc_ms(mz_range))?;
        RunSliceIterator::lc_ms(self.entity_cache.clone(), cursor, mz_range)
    }

    /// Iterate over the MS2 run slices of the precursor windows within `parent_mz_range`
    pub fn lc_msn_run_slices(
        &self,
        parent_mz_range: (f64, f64),
        mz_range: Option<(f64, f64)>,
    ) -> Result<SqliteRunSliceIterator<'_>, MzDbError> {
        self.entity_cache.validate_ms_level(2)?;
        let cursor = self.bounding_boxes(BoundingBoxQuery::lc_msn(parent_mz_range, mz_range))?;
        RunSliceIterator::lc_msn(
            self.entity_cache.clone(),
            cursor,
            parent_mz_range,
            mz_range,
        )
    }

    /// The distinct MS2 precursor isolation windows, empty for files without MSn data
    pub fn isolation_windows(&self) -> Result<Vec<IsolationWindow>, MzDbError> {
        load_isolation_windows(&self.connection)
    }
}
