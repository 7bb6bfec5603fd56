//! A reader for the mzDB mass spectrometry data format.
//!
//! mzDB stores the peaks of an LC-MS run in an SQLite database, packed into binary
//! bounding boxes that each cover a few consecutive spectra within one m/z run slice.
//! This crate decodes those boxes and stitches them back into whole spectra or whole
//! run slices, streaming them in order without loading the whole run into memory.
//!
//! ```no_run
//! use mzdb::io::mzdb::MzDbReader;
//!
//! let reader = MzDbReader::open_path("./test/data/small.mzDB")?;
//! for spectrum in reader.spectra(Some(1))? {
//!     let spectrum = spectrum?;
//!     println!("{} {}", spectrum.id(), spectrum.peaks_count());
//! }
//! # Ok::<(), mzdb::io::mzdb::MzDbError>(())
//! ```
pub mod encoding;
pub mod io;
pub mod prelude;
pub mod spectrum;

pub use crate::encoding::{ByteOrder, Compression, DataEncoding, DataMode, PeakEncoding};
pub use crate::io::mzdb::{MzDbError, MzDbReader};
pub use crate::spectrum::{Peak, RunSlice, Spectrum, SpectrumData, SpectrumHeader, SpectrumSlice};
