//! Reading mass spectrometry data stored in the mzDB format.
pub mod mzdb;

pub use crate::io::mzdb::{
    BoundingBoxCursor, MzDbError, MzDbReader, MzDbReaderBuilder, RunSliceIterator,
    SpectrumIterator, SpectrumRangeIterator,
};
