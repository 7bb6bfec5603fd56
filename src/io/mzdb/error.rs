use std::io;

use thiserror::Error;

/// A violated invariant inside the stored binary data. These are never recovered
/// from, they indicate the file itself is malformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataCorruptionError {
    #[error("Spectrum {spectrum_id} occurs more than once in bounding box {bb_id}")]
    DuplicateSpectrumId { bb_id: i64, spectrum_id: i64 },
    #[error(
        "Spectrum {spectrum_id} in bounding box {bb_id} lies outside of its range {first_spectrum_id}-{last_spectrum_id}"
    )]
    SpectrumOutOfRange {
        bb_id: i64,
        spectrum_id: i64,
        first_spectrum_id: i64,
        last_spectrum_id: i64,
    },
    #[error("Bounding box {bb_id} ends after {available} bytes, {required} bytes are needed at offset {offset}")]
    Truncated {
        bb_id: i64,
        offset: usize,
        required: usize,
        available: usize,
    },
    #[error("Bounding box {bb_id} declares a negative peak count {peaks_count} for spectrum {spectrum_id}")]
    NegativePeakCount {
        bb_id: i64,
        spectrum_id: i64,
        peaks_count: i32,
    },
    #[error("No spectrum header found for spectrum {spectrum_id} in bounding box {bb_id}")]
    MissingSpectrumHeader { bb_id: i64, spectrum_id: i64 },
    #[error("No data encoding found for spectrum {spectrum_id} in bounding box {bb_id}")]
    MissingDataEncoding { bb_id: i64, spectrum_id: i64 },
    #[error("No run slice header found for run slice {run_slice_id} of bounding box {bb_id}")]
    MissingRunSliceHeader { bb_id: i64, run_slice_id: i64 },
    #[error("Bounding box {bb_id} holds MS level {found} spectra, expected MS level {expected}")]
    UnexpectedMsLevel { bb_id: i64, expected: u8, found: u8 },
    #[error("Bounding boxes starting at spectrum {spectrum_id} are not contiguous (seen again in bounding box {bb_id})")]
    NonContiguousSpectrumGroup { bb_id: i64, spectrum_id: i64 },
    #[error("Bounding boxes of run slice {run_slice_id} are not contiguous (seen again in bounding box {bb_id})")]
    NonContiguousRunSlice { bb_id: i64, run_slice_id: i64 },
    #[error("Failed to decompress bounding box {bb_id}: {message}")]
    Decompression { bb_id: i64, message: String },
}

/// The errors that may occur while reading bounding boxes and merging them into
/// spectra or run slices
#[derive(Debug, Error)]
pub enum MzDbError {
    /// An iterator or query was requested with parameters the file cannot satisfy
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Corrupted data: {0}")]
    DataCorruption(#[from] DataCorruptionError),
    /// The underlying SQLite store failed. The cursor that observed the error has
    /// already been closed.
    #[error("A storage error occurred: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl MzDbError {
    pub fn configuration<S: ToString>(message: S) -> Self {
        Self::Configuration(message.to_string())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_data_corruption(&self) -> bool {
        matches!(self, Self::DataCorruption(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn as_data_corruption(&self) -> Option<&DataCorruptionError> {
        if let Self::DataCorruption(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<MzDbError> for io::Error {
    fn from(value: MzDbError) -> Self {
        match value {
            MzDbError::Configuration(_) => Self::new(io::ErrorKind::InvalidInput, value),
            MzDbError::DataCorruption(_) => Self::new(io::ErrorKind::InvalidData, value),
            MzDbError::Storage(_) => Self::new(io::ErrorKind::Other, value),
        }
    }
}
