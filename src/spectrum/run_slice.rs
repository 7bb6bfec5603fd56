use std::sync::Arc;

use super::header::SpectrumSlice;

/// A contiguous m/z interval `[begin_mz, end_mz)` followed across the whole acquisition
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSliceHeader {
    pub id: i64,
    pub ms_level: u8,
    pub number: i64,
    pub begin_mz: f64,
    pub end_mz: f64,
    pub run_id: i64,
}

impl RunSliceHeader {
    pub fn new(id: i64, ms_level: u8, number: i64, begin_mz: f64, end_mz: f64, run_id: i64) -> Self {
        Self {
            id,
            ms_level,
            number,
            begin_mz,
            end_mz,
            run_id,
        }
    }

    pub fn contains(&self, mz: f64) -> bool {
        mz >= self.begin_mz && mz < self.end_mz
    }

    /// Whether the closed window `[min_mz, max_mz]` overlaps this run slice
    pub fn overlaps(&self, min_mz: f64, max_mz: f64) -> bool {
        self.end_mz >= min_mz && self.begin_mz <= max_mz
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSliceData {
    pub id: i64,
    pub spectrum_slices: Vec<SpectrumSlice>,
}

impl RunSliceData {
    pub fn new(id: i64, spectrum_slices: Vec<SpectrumSlice>) -> Self {
        Self {
            id,
            spectrum_slices,
        }
    }

    pub fn peaks_count(&self) -> usize {
        self.spectrum_slices
            .iter()
            .map(|s| s.data().peaks_count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSlice {
    pub header: Arc<RunSliceHeader>,
    pub data: RunSliceData,
}

impl RunSlice {
    pub fn new(header: Arc<RunSliceHeader>, data: RunSliceData) -> Self {
        Self { header, data }
    }

    pub fn id(&self) -> i64 {
        self.header.id
    }

    pub fn spectrum_slices(&self) -> &[SpectrumSlice] {
        &self.data.spectrum_slices
    }
}
