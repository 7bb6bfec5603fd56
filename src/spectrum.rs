//! The in-memory representation of decoded peaks, spectra and run slices.
pub mod data;
pub mod header;
pub mod run_slice;

pub use crate::spectrum::data::{Peak, SpectrumData};
pub use crate::spectrum::header::{Spectrum, SpectrumHeader, SpectrumSlice};
pub use crate::spectrum::run_slice::{RunSlice, RunSliceData, RunSliceHeader};
