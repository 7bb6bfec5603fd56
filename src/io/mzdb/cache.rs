use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::RangeInclusive;
use std::sync::Arc;

use identity_hash::BuildIdentityHasher;

use crate::encoding::{DataEncoding, DataEncodingsCache};
use crate::spectrum::{RunSliceHeader, SpectrumHeader};

use super::error::MzDbError;

pub type RunSliceHeaderMap = HashMap<i64, Arc<RunSliceHeader>, BuildIdentityHasher<i64>>;

/// The read-only lookup tables every iterator consults: spectrum headers, data encodings
/// and run slice headers, all keyed by id.
///
/// The cache must be fully populated before iteration begins. It is never mutated
/// afterwards, so it may be shared between any number of concurrently running
/// iterators.
#[derive(Debug, Clone, Default)]
pub struct EntityCache {
    spectrum_headers: BTreeMap<i64, Arc<SpectrumHeader>>,
    data_encodings: DataEncodingsCache,
    run_slice_headers: RunSliceHeaderMap,
}

impl EntityCache {
    pub fn new(
        spectrum_headers: impl IntoIterator<Item = SpectrumHeader>,
        data_encodings: DataEncodingsCache,
        run_slice_headers: impl IntoIterator<Item = RunSliceHeader>,
    ) -> Self {
        let spectrum_headers = spectrum_headers
            .into_iter()
            .map(|h| (h.id, Arc::new(h)))
            .collect();
        let run_slice_headers = run_slice_headers
            .into_iter()
            .map(|h| (h.id, Arc::new(h)))
            .collect();
        Self {
            spectrum_headers,
            data_encodings,
            run_slice_headers,
        }
    }

    /// Build a cache where every spectrum's encoding is resolved through its
    /// header's `data_encoding_id`
    pub fn from_headers(
        spectrum_headers: Vec<SpectrumHeader>,
        data_encodings: impl IntoIterator<Item = DataEncoding>,
        run_slice_headers: impl IntoIterator<Item = RunSliceHeader>,
    ) -> Self {
        let encoding_ids: Vec<(i64, i64)> = spectrum_headers
            .iter()
            .map(|h| (h.id, h.data_encoding_id))
            .collect();
        let data_encodings = DataEncodingsCache::new(data_encodings, encoding_ids);
        Self::new(spectrum_headers, data_encodings, run_slice_headers)
    }

    pub fn spectrum_header(&self, spectrum_id: i64) -> Option<&Arc<SpectrumHeader>> {
        self.spectrum_headers.get(&spectrum_id)
    }

    /// Iterate over spectrum headers in ascending id order, optionally restricted to one
    /// MS level
    pub fn spectrum_headers(
        &self,
        ms_level: Option<u8>,
    ) -> impl Iterator<Item = &Arc<SpectrumHeader>> + '_ {
        self.spectrum_headers
            .values()
            .filter(move |h| ms_level.map_or(true, |level| h.ms_level == level))
    }

    pub fn spectrum_headers_in(
        &self,
        ids: RangeInclusive<i64>,
        ms_level: Option<u8>,
    ) -> impl Iterator<Item = &Arc<SpectrumHeader>> + '_ {
        self.spectrum_headers
            .range(ids)
            .map(|(_, h)| h)
            .filter(move |h| ms_level.map_or(true, |level| h.ms_level == level))
    }

    pub fn spectrum_count(&self) -> usize {
        self.spectrum_headers.len()
    }

    pub fn data_encodings(&self) -> &DataEncodingsCache {
        &self.data_encodings
    }

    pub fn data_encoding_by_spectrum_id(&self, spectrum_id: i64) -> Option<&Arc<DataEncoding>> {
        self.data_encodings.get_by_spectrum_id(spectrum_id)
    }

    pub fn run_slice_header(&self, run_slice_id: i64) -> Option<&Arc<RunSliceHeader>> {
        self.run_slice_headers.get(&run_slice_id)
    }

    /// Collect the run slice headers of one MS level
    pub fn run_slice_headers(&self, ms_level: u8) -> RunSliceHeaderMap {
        self.run_slice_headers
            .iter()
            .filter(|(_, h)| h.ms_level == ms_level)
            .map(|(k, h)| (*k, h.clone()))
            .collect()
    }

    /// The run slice headers of one MS level sorted by `begin_mz`
    pub fn sorted_run_slice_headers(&self, ms_level: u8) -> Vec<Arc<RunSliceHeader>> {
        let mut headers: Vec<_> = self.run_slice_headers(ms_level).into_values().collect();
        headers.sort_by(|a, b| a.begin_mz.total_cmp(&b.begin_mz).then(a.id.cmp(&b.id)));
        headers
    }

    /// The ids of the run slices of one MS level overlapping `mz_range`, or all of them,
    /// in ascending `begin_mz` order
    pub fn run_slice_ids_in(&self, ms_level: u8, mz_range: Option<(f64, f64)>) -> Vec<i64> {
        self.sorted_run_slice_headers(ms_level)
            .into_iter()
            .filter(|h| match mz_range {
                Some((min_mz, max_mz)) => h.end_mz >= min_mz && h.begin_mz <= max_mz,
                None => true,
            })
            .map(|h| h.id)
            .collect()
    }

    pub fn max_ms_level(&self) -> Option<u8> {
        self.spectrum_headers.values().map(|h| h.ms_level).max()
    }

    pub fn has_ms_level(&self, ms_level: u8) -> bool {
        self.spectrum_headers.values().any(|h| h.ms_level == ms_level)
    }

    /// Check that `ms_level` is one this file actually contains
    pub fn validate_ms_level(&self, ms_level: u8) -> Result<(), MzDbError> {
        let max_level = self.max_ms_level().unwrap_or_default();
        if ms_level == 0 || ms_level > max_level {
            return Err(MzDbError::Configuration(format!(
                "MS level {ms_level} is not supported, this file contains MS levels 1 to {max_level}"
            )));
        }
        if !self.has_ms_level(ms_level) {
            return Err(MzDbError::Configuration(format!(
                "This file contains no spectra of MS level {ms_level}"
            )));
        }
        Ok(())
    }

    /// The distinct leading spectrum ids of the bounding boxes holding the spectra
    /// with ids in `ids`, optionally restricted to one MS level
    pub fn leading_spectrum_ids(
        &self,
        ids: RangeInclusive<i64>,
        ms_level: Option<u8>,
    ) -> BTreeSet<i64> {
        self.spectrum_headers_in(ids, ms_level)
            .map(|h| h.bb_first_spectrum_id)
            .collect()
    }

    /// The smallest and largest leading spectrum id of the bounding box groups holding
    /// the spectra with ids in `ids`, or `None` if there are no such spectra
    pub fn leading_spectrum_id_bounds(
        &self,
        ids: RangeInclusive<i64>,
        ms_level: Option<u8>,
    ) -> Option<RangeInclusive<i64>> {
        let leading = self.leading_spectrum_ids(ids, ms_level);
        match (leading.first(), leading.last()) {
            (Some(lo), Some(hi)) => Some(*lo..=*hi),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_cache() -> EntityCache {
        let headers = vec![
            SpectrumHeader::new(1, 1, 0.5, 1, 1),
            SpectrumHeader::new(2, 1, 0.6, 2, 2),
            SpectrumHeader::new(3, 1, 0.7, 2, 2),
            SpectrumHeader::new(4, 2, 1.5, 1, 1),
            SpectrumHeader::new(5, 2, 1.6, 2, 5),
        ];
        let run_slices = vec![
            RunSliceHeader::new(2, 1, 2, 500.0, 505.0, 1),
            RunSliceHeader::new(1, 1, 1, 400.0, 405.0, 1),
            RunSliceHeader::new(3, 2, 1, 400.0, 405.0, 1),
        ];
        EntityCache::from_headers(headers, [], run_slices)
    }

    #[test]
    fn test_headers_by_level() {
        let cache = make_cache();
        let ms1: Vec<i64> = cache.spectrum_headers(Some(1)).map(|h| h.id).collect();
        assert_eq!(ms1, vec![1, 4]);
        let all: Vec<i64> = cache.spectrum_headers(None).map(|h| h.id).collect();
        assert_eq!(all, vec![1, 2, 3, 4, 5]);
        assert_eq!(cache.max_ms_level(), Some(2));
    }

    #[test]
    fn test_validate_ms_level() {
        let cache = make_cache();
        assert!(cache.validate_ms_level(1).is_ok());
        assert!(cache.validate_ms_level(2).is_ok());
        assert!(cache.validate_ms_level(0).unwrap_err().is_configuration());
        assert!(cache.validate_ms_level(3).unwrap_err().is_configuration());
    }

    #[test]
    fn test_leading_ids_and_run_slices() {
        let cache = make_cache();
        let lead: Vec<i64> = cache.leading_spectrum_ids(2..=4, None).into_iter().collect();
        assert_eq!(lead, vec![1, 2]);
        let lead: Vec<i64> = cache.leading_spectrum_ids(1..=5, Some(2)).into_iter().collect();
        assert_eq!(lead, vec![2, 5]);
        assert_eq!(cache.leading_spectrum_id_bounds(2..=5, None), Some(1..=5));
        assert_eq!(cache.leading_spectrum_id_bounds(6..=9, None), None);

        let sorted: Vec<i64> = cache.sorted_run_slice_headers(1).iter().map(|h| h.id).collect();
        assert_eq!(sorted, vec![1, 2]);
        assert_eq!(cache.run_slice_headers(2).len(), 1);
        assert_eq!(cache.run_slice_ids_in(1, None), vec![1, 2]);
        assert_eq!(cache.run_slice_ids_in(1, Some((504.0, 600.0))), vec![2]);
        assert!(cache.run_slice_ids_in(1, Some((406.0, 499.0))).is_empty());
    }
}
