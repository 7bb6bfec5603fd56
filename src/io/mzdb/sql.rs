use std::collections::VecDeque;
use std::ops::RangeInclusive;

use log::{debug, trace, warn};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Error, Params, Row, Statement};

use crate::encoding::{ByteOrder, Compression, DataEncoding, DataMode, PeakEncoding};
use crate::spectrum::{RunSliceHeader, SpectrumHeader};

use super::bbox::BoundingBoxRecord;
use super::cache::EntityCache;
use super::cursor::BoundingBoxCursor;
use super::error::MzDbError;

pub trait FromSQL: Sized {
    fn from_row(row: &Row<'_>) -> Result<Self, Error>;

    fn get_sql() -> String;

    fn read_from<I: Params>(connection: &Connection, params: I) -> Result<Vec<Self>, Error> {
        let sql = Self::get_sql();
        let mut stmt = connection.prepare(&sql)?;
        let out: Result<Vec<Self>, Error> = stmt
            .query_map(params, |row: &Row<'_>| Self::from_row(row))?
            .collect();
        out
    }

    fn read_from_where<I: Params>(
        connection: &Connection,
        params: I,
        condition_sql_fragment: &str,
    ) -> Result<Vec<Self>, Error> {
        let sql = Self::get_sql();
        let sql = format!("{sql} WHERE {condition_sql_fragment}");
        let mut stmt = connection.prepare(&sql)?;
        let out: Result<Vec<Self>, Error> = stmt
            .query_map(params, |row: &Row<'_>| Self::from_row(row))?
            .collect();
        out
    }
}

impl FromSql for DataMode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl FromSql for ByteOrder {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl FromSQL for SpectrumHeader {
    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        let this = Self {
            id: row.get(0)?,
            initial_id: row.get(1)?,
            title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            cycle: row.get(3)?,
            time: row.get(4)?,
            ms_level: row.get(5)?,
            activation_type: row.get(6)?,
            tic: row.get(7).unwrap_or_default(),
            base_peak_mz: row.get(8).unwrap_or_default(),
            base_peak_intensity: row.get(9).unwrap_or_default(),
            precursor_mz: row.get(10)?,
            precursor_charge: row.get(11)?,
            peaks_count: row.get(12)?,
            data_encoding_id: row.get(13)?,
            bb_first_spectrum_id: row.get(14)?,
        };
        Ok(this)
    }

    fn get_sql() -> String {
        "SELECT id, initial_id, title, cycle, time, ms_level, activation_type, tic, base_peak_mz,
                base_peak_intensity, main_precursor_mz, main_precursor_charge, data_points_count,
                data_encoding_id, bb_first_spectrum_id FROM spectrum"
            .into()
    }
}

impl FromSQL for DataEncoding {
    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        let compression = row
            .get::<_, Option<String>>(2)?
            .map(|s| s.parse().unwrap_or_else(|e| match e {}))
            .unwrap_or(Compression::None);
        let mz_precision: u32 = row.get(4)?;
        let intensity_precision: u32 = row.get(5)?;
        let this = Self {
            id: row.get(0)?,
            mode: row.get(1)?,
            peak_encoding: PeakEncoding::from_precisions(mz_precision, intensity_precision),
            compression,
            byte_order: row.get(3)?,
        };
        if let Compression::Other(name) = &this.compression {
            warn!(
                "Data encoding {} uses an unsupported compression {name}, its bounding boxes cannot be decoded",
                this.id
            );
        }
        Ok(this)
    }

    fn get_sql() -> String {
        "SELECT id, mode, compression, byte_order, mz_precision, intensity_precision FROM data_encoding".into()
    }
}

impl FromSQL for RunSliceHeader {
    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        Ok(Self {
            id: row.get(0)?,
            ms_level: row.get(1)?,
            number: row.get(2)?,
            begin_mz: row.get(3)?,
            end_mz: row.get(4)?,
            run_id: row.get(5)?,
        })
    }

    fn get_sql() -> String {
        "SELECT id, ms_level, number, begin_mz, end_mz, run_id FROM run_slice".into()
    }
}

/// A precursor isolation window recorded in the MSn R-tree side index
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsolationWindow {
    pub min_mz: f64,
    pub max_mz: f64,
}

impl IsolationWindow {
    pub fn new(min_mz: f64, max_mz: f64) -> Self {
        Self { min_mz, max_mz }
    }

    pub fn contains(&self, mz: f64) -> bool {
        self.min_mz <= mz && mz <= self.max_mz
    }
}

impl FromSQL for IsolationWindow {
    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        Ok(Self::new(row.get(0)?, row.get(1)?))
    }

    fn get_sql() -> String {
        "SELECT DISTINCT min_parent_mz, max_parent_mz FROM bounding_box_msn_rtree".into()
    }
}

pub(crate) fn has_table(connection: &Connection, table: &str) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n > 0)
}

/// Load every spectrum header, data encoding and run slice header from `connection`
pub fn load_entity_cache(connection: &Connection) -> Result<EntityCache, MzDbError> {
    let spectrum_headers = SpectrumHeader::read_from(connection, [])?;
    let data_encodings = DataEncoding::read_from(connection, [])?;
    let run_slices = RunSliceHeader::read_from(connection, [])?;
    debug!(
        "Loaded {} spectrum headers, {} data encodings and {} run slices",
        spectrum_headers.len(),
        data_encodings.len(),
        run_slices.len()
    );
    Ok(EntityCache::from_headers(
        spectrum_headers,
        data_encodings,
        run_slices,
    ))
}

/// Load the distinct MS2 precursor isolation windows, in ascending m/z order
pub fn load_isolation_windows(connection: &Connection) -> Result<Vec<IsolationWindow>, MzDbError> {
    if !has_table(connection, "bounding_box_msn_rtree")? {
        return Ok(Vec::new());
    }
    let mut windows = IsolationWindow::read_from_where(connection, [2], "min_ms_level = ?")?;
    windows.sort_by(|a, b| a.min_mz.total_cmp(&b.min_mz));
    Ok(windows)
}

/// The fixed shapes of `bounding_box` queries the iterators are driven by.
///
/// Each shape is read one partition at a time, a leading spectrum id for spectrum order
/// or a run slice id for run slice order. Partitions are taken from the [`EntityCache`]
/// in scan order, and the rows of one partition are read in box id order. Both steps
/// follow an index, so no query ever needs a temporary sort.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundingBoxQuery {
    /// Boxes in spectrum order, optionally of one MS level and limited to the groups
    /// holding the spectra with ids in `spectrum_ids`
    Spectra {
        ms_level: Option<u8>,
        spectrum_ids: Option<RangeInclusive<i64>>,
    },
    /// Boxes of one MS level in run slice order, optionally restricted to the run slices
    /// overlapping an m/z window
    RunSlices {
        ms_level: u8,
        mz_range: Option<(f64, f64)>,
    },
    /// MS2 boxes whose precursor window lies inside `parent_mz_range`, in run slice order
    MsnRunSlices {
        parent_mz_range: (f64, f64),
        mz_range: Option<(f64, f64)>,
    },
}

const BOUNDING_BOX_COLUMNS: &str = "bounding_box.id, bounding_box.data, bounding_box.run_slice_id, \
     bounding_box.first_spectrum_id, bounding_box.last_spectrum_id";

impl BoundingBoxQuery {
    pub fn spectra(ms_level: Option<u8>) -> Self {
        Self::Spectra {
            ms_level,
            spectrum_ids: None,
        }
    }

    pub fn spectrum_range(spectrum_ids: RangeInclusive<i64>, ms_level: Option<u8>) -> Self {
        Self::Spectra {
            ms_level,
            spectrum_ids: Some(spectrum_ids),
        }
    }

    pub fn lc_ms(mz_range: Option<(f64, f64)>) -> Self {
        Self::RunSlices {
            ms_level: 1,
            mz_range,
        }
    }

    pub fn lc_msn(parent_mz_range: (f64, f64), mz_range: Option<(f64, f64)>) -> Self {
        Self::MsnRunSlices {
            parent_mz_range,
            mz_range,
        }
    }

    /// The column every page is restricted to a single value of
    fn partition_column(&self) -> &'static str {
        match self {
            Self::Spectra { .. } => "bounding_box.first_spectrum_id",
            Self::RunSlices { .. } | Self::MsnRunSlices { .. } => "bounding_box.run_slice_id",
        }
    }

    /// The partition keys to visit, in scan order
    pub fn partitions(&self, cache: &EntityCache) -> Vec<i64> {
        match self {
            Self::Spectra {
                ms_level,
                spectrum_ids,
            } => cache
                .leading_spectrum_ids(
                    spectrum_ids.clone().unwrap_or(i64::MIN..=i64::MAX),
                    *ms_level,
                )
                .into_iter()
                .collect(),
            Self::RunSlices { ms_level, mz_range } => cache.run_slice_ids_in(*ms_level, *mz_range),
            Self::MsnRunSlices { mz_range, .. } => cache.run_slice_ids_in(2, *mz_range),
        }
    }

    /// Render the paged SQL statement. The parameters are the partition key, then
    /// [`BoundingBoxQuery::params`], then the last box id read and the page size.
    pub fn to_sql(&self) -> String {
        let partition = self.partition_column();
        match self {
            Self::Spectra { .. } | Self::RunSlices { .. } => format!(
                "SELECT {BOUNDING_BOX_COLUMNS} FROM bounding_box \
                 WHERE {partition} = ? AND bounding_box.id > ? \
                 ORDER BY bounding_box.id LIMIT ?"
            ),
            // CROSS JOIN keeps bounding_box as the outer loop so the box id order comes
            // from its index rather than a sort
            Self::MsnRunSlices { .. } => format!(
                "SELECT {BOUNDING_BOX_COLUMNS} FROM bounding_box \
                 CROSS JOIN bounding_box_msn_rtree ON bounding_box_msn_rtree.id = bounding_box.id \
                 WHERE {partition} = ? \
                 AND bounding_box_msn_rtree.min_parent_mz >= ? AND bounding_box_msn_rtree.max_parent_mz <= ? \
                 AND bounding_box.id > ? \
                 ORDER BY bounding_box.id LIMIT ?"
            ),
        }
    }

    /// The filter parameters, excluding the partition key, the last box id and the
    /// page size
    pub fn params(&self) -> Vec<Value> {
        match self {
            Self::MsnRunSlices {
                parent_mz_range, ..
            } => vec![
                Value::Real(parent_mz_range.0),
                Value::Real(parent_mz_range.1),
            ],
            _ => Vec::new(),
        }
    }
}

/// A [`BoundingBoxCursor`] reading from SQLite.
///
/// Rows are fetched in pages of at most `page_size` through a single prepared statement.
/// A page covers one partition of the query, resuming after the last box id read from
/// it, so no more than one page of rows is ever held in memory and each row is read
/// once.
pub struct SqliteBoundingBoxCursor<'conn> {
    statement: Option<Statement<'conn>>,
    query: BoundingBoxQuery,
    page_size: usize,
    partitions: VecDeque<i64>,
    /// The partition being read and the last box id read from it
    position: Option<(i64, i64)>,
    page: VecDeque<BoundingBoxRecord>,
    exhausted: bool,
}

impl<'conn> SqliteBoundingBoxCursor<'conn> {
    pub fn new(
        connection: &'conn Connection,
        cache: &EntityCache,
        query: BoundingBoxQuery,
        page_size: usize,
    ) -> Result<Self, MzDbError> {
        if page_size == 0 {
            return Err(MzDbError::configuration("The cursor page size must be positive"));
        }
        let partitions: VecDeque<i64> = query.partitions(cache).into();
        let sql = query.to_sql();
        debug!(
            "Opening bounding box cursor over {} partitions: {sql}",
            partitions.len()
        );
        let statement = connection.prepare(&sql)?;
        Ok(Self {
            statement: Some(statement),
            query,
            page_size,
            exhausted: partitions.is_empty(),
            partitions,
            position: None,
            page: VecDeque::with_capacity(page_size),
        })
    }

    pub fn query(&self) -> &BoundingBoxQuery {
        &self.query
    }

    /// Fill the page from the current partition, moving on to the next partition until
    /// a row is found or every partition has been read
    fn fetch_page(&mut self) -> Result<(), Error> {
        let Some(statement) = self.statement.as_mut() else {
            self.exhausted = true;
            return Ok(());
        };
        while self.page.is_empty() {
            let (key, last_id) = match self.position {
                Some(position) => position,
                None => match self.partitions.pop_front() {
                    Some(key) => (key, i64::MIN),
                    None => {
                        self.exhausted = true;
                        return Ok(());
                    }
                },
            };
            let mut params = vec![Value::Integer(key)];
            params.extend(self.query.params());
            params.push(Value::Integer(last_id));
            params.push(Value::Integer(self.page_size as i64));

            let mut rows = statement.query(params_from_iter(params))?;
            let mut last_id = last_id;
            while let Some(row) = rows.next()? {
                let record = BoundingBoxRecord {
                    id: row.get(0)?,
                    data: row.get(1)?,
                    run_slice_id: row.get(2)?,
                    first_spectrum_id: row.get(3)?,
                    last_spectrum_id: row.get(4)?,
                };
                last_id = record.id;
                self.page.push_back(record);
            }
            let fetched = self.page.len();
            trace!("Fetched a page of {fetched} bounding boxes from partition {key}");
            self.position = if fetched < self.page_size {
                None
            } else {
                Some((key, last_id))
            };
        }
        Ok(())
    }
}

impl BoundingBoxCursor for SqliteBoundingBoxCursor<'_> {
    fn next_record(&mut self) -> Result<Option<BoundingBoxRecord>, MzDbError> {
        if self.page.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.close();
                return Err(e.into());
            }
        }
        Ok(self.page.pop_front())
    }

    fn close(&mut self) {
        self.page.clear();
        self.partitions.clear();
        self.exhausted = true;
        if let Some(statement) = self.statement.take() {
            if let Err(e) = statement.finalize() {
                warn!("Failed to finalize bounding box statement: {e}");
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.statement.is_none()
    }
}

impl Drop for SqliteBoundingBoxCursor<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
