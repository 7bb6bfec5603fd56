//! Reader implementation for the mzDB format, an SQLite container storing peaks in
//! binary "bounding boxes", each covering a few consecutive spectra within one m/z
//! "run slice".
//!
//! [`MzDbReader`] reconstructs either whole spectra ([`SpectrumIterator`],
//! [`SpectrumRangeIterator`]) or whole run slices ([`RunSliceIterator`]) lazily, holding
//! only one group of decoded bounding boxes in memory at a time. The iterators are driven
//! by any [`BoundingBoxCursor`], [`SqliteBoundingBoxCursor`] for a real file or
//! [`MemoryBoundingBoxCursor`] for rows already in memory.
//!
//! Depends upon [`rusqlite`] for reading the SQLite database and [`flate2`] for
//! compressed bounding boxes.
mod bbox;
mod cache;
mod cursor;
mod error;
mod reader;
mod run_slices;
mod spectra;
mod sql;

pub use bbox::{
    decode_spectrum_data, encode_spectrum_data, encode_spectrum_slices, BoundingBox,
    BoundingBoxIndex, BoundingBoxRecord, BoundingBoxWriter,
};
pub use cache::{EntityCache, RunSliceHeaderMap};
pub use cursor::{BoundingBoxCursor, BoundingBoxIterator, MemoryBoundingBoxCursor};
pub use error::{DataCorruptionError, MzDbError};
pub use reader::{
    MzDbReader, MzDbReaderBuilder, ReaderConfig, SqliteRunSliceIterator,
    SqliteSpectrumIterator, SqliteSpectrumRangeIterator, DEFAULT_PAGE_SIZE,
};
pub use run_slices::RunSliceIterator;
pub use spectra::{FragmentOrdering, MergeState, SpectrumIterator, SpectrumRangeIterator};
pub use sql::{
    load_entity_cache, load_isolation_windows, BoundingBoxQuery, FromSQL, IsolationWindow,
    SqliteBoundingBoxCursor,
};
