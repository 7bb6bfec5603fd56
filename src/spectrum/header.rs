use std::sync::Arc;

use super::data::SpectrumData;

/// The identity and descriptive metadata of a single spectrum.
///
/// Headers are loaded once, shared through [`Arc`], and never mutated.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectrumHeader {
    pub id: i64,
    pub initial_id: i64,
    pub title: String,
    pub cycle: i64,
    pub time: f32,
    pub ms_level: u8,
    pub activation_type: Option<String>,
    pub tic: f32,
    pub base_peak_mz: f64,
    pub base_peak_intensity: f32,
    pub precursor_mz: Option<f64>,
    pub precursor_charge: Option<i32>,
    pub peaks_count: usize,
    pub data_encoding_id: i64,
    /// The id of the first spectrum of the bounding boxes this spectrum is stored in
    pub bb_first_spectrum_id: i64,
}

impl SpectrumHeader {
    pub fn new(id: i64, cycle: i64, time: f32, ms_level: u8, bb_first_spectrum_id: i64) -> Self {
        Self {
            id,
            initial_id: id,
            cycle,
            time,
            ms_level,
            bb_first_spectrum_id,
            ..Default::default()
        }
    }

    pub fn with_precursor(mut self, mz: f64, charge: Option<i32>) -> Self {
        self.precursor_mz = Some(mz);
        self.precursor_charge = charge;
        self
    }

    pub fn with_data_encoding_id(mut self, data_encoding_id: i64) -> Self {
        self.data_encoding_id = data_encoding_id;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub header: Arc<SpectrumHeader>,
    pub data: SpectrumData,
}

impl Spectrum {
    pub fn new(header: Arc<SpectrumHeader>, data: SpectrumData) -> Self {
        Self { header, data }
    }

    pub fn id(&self) -> i64 {
        self.header.id
    }

    pub fn ms_level(&self) -> u8 {
        self.header.ms_level
    }

    pub fn peaks_count(&self) -> usize {
        self.data.peaks_count()
    }
}

/// The part of a [`Spectrum`]'s peaks stored in a single run slice
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSlice {
    pub spectrum: Spectrum,
    pub run_slice_id: i64,
}

impl SpectrumSlice {
    pub fn new(header: Arc<SpectrumHeader>, data: SpectrumData, run_slice_id: i64) -> Self {
        Self {
            spectrum: Spectrum::new(header, data),
            run_slice_id,
        }
    }

    pub fn spectrum_id(&self) -> i64 {
        self.spectrum.id()
    }

    pub fn header(&self) -> &Arc<SpectrumHeader> {
        &self.spectrum.header
    }

    pub fn data(&self) -> &SpectrumData {
        &self.spectrum.data
    }

    pub fn into_spectrum(self) -> Spectrum {
        self.spectrum
    }
}
