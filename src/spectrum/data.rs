use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::Range;

use log::debug;
use mzpeaks::{CentroidPeak, PeakSet, Tolerance};

use crate::io::mzdb::MzDbError;

/// A single decoded peak. The half-widths are zero unless the peak came from
/// fitted data.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Peak {
    pub mz: f64,
    pub intensity: f32,
    pub left_hwhm: f32,
    pub right_hwhm: f32,
}

impl Peak {
    pub fn new(mz: f64, intensity: f32, left_hwhm: f32, right_hwhm: f32) -> Self {
        Self {
            mz,
            intensity,
            left_hwhm,
            right_hwhm,
        }
    }

    pub fn centroid(mz: f64, intensity: f32) -> Self {
        Self::new(mz, intensity, 0.0, 0.0)
    }
}

impl From<Peak> for CentroidPeak {
    fn from(value: Peak) -> Self {
        CentroidPeak::new(value.mz, value.intensity, 0)
    }
}

/// The decoded peaks of a spectrum, or of a slice of a spectrum, as parallel arrays.
///
/// The m/z array is always in ascending order. All searches rely on this, so it is
/// the caller's responsibility never to build a [`SpectrumData`] from unsorted values.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectrumData {
    pub mz_list: Vec<f64>,
    pub intensity_list: Vec<f32>,
    pub left_hwhm_list: Option<Vec<f32>>,
    pub right_hwhm_list: Option<Vec<f32>>,
}

impl SpectrumData {
    /// # Panics
    /// If the arrays are not all the same length, see [`SpectrumData::try_new`]
    pub fn new(
        mz_list: Vec<f64>,
        intensity_list: Vec<f32>,
        left_hwhm_list: Option<Vec<f32>>,
        right_hwhm_list: Option<Vec<f32>>,
    ) -> Self {
        match Self::try_new(mz_list, intensity_list, left_hwhm_list, right_hwhm_list) {
            Ok(this) => this,
            Err(e) => panic!("{e}"),
        }
    }

    /// Build from parallel arrays, failing with [`MzDbError::Configuration`] if they are
    /// not all the same length
    pub fn try_new(
        mz_list: Vec<f64>,
        intensity_list: Vec<f32>,
        left_hwhm_list: Option<Vec<f32>>,
        right_hwhm_list: Option<Vec<f32>>,
    ) -> Result<Self, MzDbError> {
        let n = mz_list.len();
        let lengths = [
            ("intensity", Some(intensity_list.len())),
            ("left HWHM", left_hwhm_list.as_ref().map(Vec::len)),
            ("right HWHM", right_hwhm_list.as_ref().map(Vec::len)),
        ];
        for (name, len) in lengths {
            if let Some(len) = len.filter(|len| *len != n) {
                return Err(MzDbError::Configuration(format!(
                    "The {name} array holds {len} values but there are {n} m/z values"
                )));
            }
        }
        Ok(Self {
            mz_list,
            intensity_list,
            left_hwhm_list,
            right_hwhm_list,
        })
    }

    pub fn with_capacity(capacity: usize, fitted: bool) -> Self {
        let hwhm = || fitted.then(|| Vec::with_capacity(capacity));
        Self {
            mz_list: Vec::with_capacity(capacity),
            intensity_list: Vec::with_capacity(capacity),
            left_hwhm_list: hwhm(),
            right_hwhm_list: hwhm(),
        }
    }

    pub fn peaks_count(&self) -> usize {
        self.mz_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz_list.is_empty()
    }

    pub fn is_fitted(&self) -> bool {
        self.left_hwhm_list.is_some() && self.right_hwhm_list.is_some()
    }

    pub fn push(&mut self, peak: Peak) {
        self.mz_list.push(peak.mz);
        self.intensity_list.push(peak.intensity);
        if let Some(lhwhm) = self.left_hwhm_list.as_mut() {
            lhwhm.push(peak.left_hwhm);
        }
        if let Some(rhwhm) = self.right_hwhm_list.as_mut() {
            rhwhm.push(peak.right_hwhm);
        }
    }

    /// The peak at `index`, or `None` if any of the arrays is too short to hold it
    pub fn peak(&self, index: usize) -> Option<Peak> {
        let mz = *self.mz_list.get(index)?;
        let intensity = *self.intensity_list.get(index)?;
        let hwhm = |list: &Option<Vec<f32>>| match list {
            Some(v) => v.get(index).copied(),
            None => Some(0.0),
        };
        let left_hwhm = hwhm(&self.left_hwhm_list)?;
        let right_hwhm = hwhm(&self.right_hwhm_list)?;
        Some(Peak::new(mz, intensity, left_hwhm, right_hwhm))
    }

    pub fn iter(&self) -> impl Iterator<Item = Peak> + '_ {
        (0..self.peaks_count()).filter_map(|i| self.peak(i))
    }

    pub fn min_mz(&self) -> Option<f64> {
        self.mz_list.first().copied()
    }

    pub fn max_mz(&self) -> Option<f64> {
        self.mz_list.last().copied()
    }

    pub fn is_sorted(&self) -> bool {
        self.mz_list.windows(2).all(|w| w[0] <= w[1])
    }

    /// Copy the peaks in `range` into a new [`SpectrumData`]
    pub fn slice(&self, range: Range<usize>) -> SpectrumData {
        Self {
            mz_list: self.mz_list[range.clone()].to_vec(),
            intensity_list: self.intensity_list[range.clone()].to_vec(),
            left_hwhm_list: self
                .left_hwhm_list
                .as_ref()
                .map(|v| v[range.clone()].to_vec()),
            right_hwhm_list: self.right_hwhm_list.as_ref().map(|v| v[range].to_vec()),
        }
    }

    /// The index of the peak closest to `mz`, the lower one on a tie
    fn nearest_index(&self, mz: f64) -> Option<usize> {
        let n = self.peaks_count();
        if n == 0 {
            return None;
        }
        let i = self.mz_list.partition_point(|v| *v < mz);
        let best = if i == 0 {
            0
        } else if i == n {
            n - 1
        } else {
            let left = i - 1;
            if (mz - self.mz_list[left]).abs() <= (self.mz_list[i] - mz).abs() {
                left
            } else {
                i
            }
        };
        Some(best)
    }

    /// Copy the peaks between the one nearest to `min_mz` and the one nearest to
    /// `max_mz`, both included.
    ///
    /// The endpoints are nearest matches, so a window falling between two peaks still
    /// selects its closest neighbors. Returns `None` only when the peaks lie entirely
    /// outside `[min_mz, max_mz]`.
    pub fn mz_range_filter(&self, min_mz: f64, max_mz: f64) -> Option<SpectrumData> {
        let (first, last) = (self.min_mz()?, self.max_mz()?);
        if min_mz > max_mz || first > max_mz || last < min_mz {
            return None;
        }
        let start = self.nearest_index(min_mz)?;
        let end = self.nearest_index(max_mz)?;
        Some(self.slice(start..end + 1))
    }

    /// Find the index of the peak closest to `mz`, provided it lies within `ppm_tolerance`
    /// parts-per-million of `mz`.
    pub fn get_nearest_peak_index(&self, mz: f64, ppm_tolerance: f64) -> Option<usize> {
        let best = self.nearest_index(mz)?;
        let (lower, upper) = Tolerance::PPM(ppm_tolerance).bounds(mz);
        let best_mz = self.mz_list[best];
        (best_mz >= lower && best_mz <= upper).then_some(best)
    }

    pub fn get_nearest_peak(&self, mz: f64, ppm_tolerance: f64) -> Option<Peak> {
        self.get_nearest_peak_index(mz, ppm_tolerance)
            .and_then(|i| self.peak(i))
    }

    /// Append all of `other`'s peaks after this one's. This does not re-sort, so it
    /// only preserves the ascending m/z invariant when every peak of `other` is at least
    /// as large as the last peak of `self`.
    ///
    /// The half-width arrays survive only when both sides carry them.
    pub fn add_spectrum_data(&mut self, other: &SpectrumData) {
        if self.is_empty() && self.left_hwhm_list.is_none() {
            self.left_hwhm_list = other.left_hwhm_list.as_ref().map(|_| Vec::new());
            self.right_hwhm_list = other.right_hwhm_list.as_ref().map(|_| Vec::new());
        }
        self.mz_list.extend_from_slice(&other.mz_list);
        self.intensity_list.extend_from_slice(&other.intensity_list);
        match (self.left_hwhm_list.as_mut(), other.left_hwhm_list.as_ref()) {
            (Some(dest), Some(src)) => dest.extend_from_slice(src),
            _ => self.left_hwhm_list = None,
        }
        match (self.right_hwhm_list.as_mut(), other.right_hwhm_list.as_ref()) {
            (Some(dest), Some(src)) => dest.extend_from_slice(src),
            _ => self.right_hwhm_list = None,
        }
    }

    /// Combine fragments of the same spectrum, each internally sorted by m/z, into one
    /// sorted [`SpectrumData`].
    ///
    /// When the fragments already follow one another in m/z order they are simply
    /// concatenated, otherwise they are k-way merged.
    pub fn merge_sorted_fragments(fragments: Vec<SpectrumData>) -> SpectrumData {
        let mut fragments: Vec<SpectrumData> =
            fragments.into_iter().filter(|f| !f.is_empty()).collect();
        match fragments.len() {
            0 => return SpectrumData::default(),
            1 => return fragments.pop().unwrap_or_default(),
            _ => {}
        }

        let chained = fragments
            .windows(2)
            .all(|w| w[0].max_mz() <= w[1].min_mz());
        if chained {
            return Self::concatenate(fragments);
        }

        debug!(
            "Merging {} interleaved spectrum fragments by m/z",
            fragments.len()
        );
        let total: usize = fragments.iter().map(|f| f.peaks_count()).sum();
        let fitted = fragments.iter().all(|f| f.is_fitted());
        let mut merged = SpectrumData::with_capacity(total, fitted);

        let mut heap: BinaryHeap<FragmentCursor> = fragments
            .iter()
            .enumerate()
            .map(|(fragment, data)| FragmentCursor {
                mz: data.mz_list[0],
                fragment,
                position: 0,
            })
            .collect();

        while let Some(cursor) = heap.pop() {
            let data = &fragments[cursor.fragment];
            if let Some(peak) = data.peak(cursor.position) {
                merged.push(peak);
            }
            let position = cursor.position + 1;
            if let Some(mz) = data.mz_list.get(position) {
                heap.push(FragmentCursor {
                    mz: *mz,
                    fragment: cursor.fragment,
                    position,
                });
            }
        }
        merged
    }

    /// Concatenate fragments without checking their relative order
    pub fn concatenate(fragments: Vec<SpectrumData>) -> SpectrumData {
        let mut iter = fragments.into_iter();
        let mut acc = match iter.next() {
            Some(first) => first,
            None => return SpectrumData::default(),
        };
        for fragment in iter {
            acc.add_spectrum_data(&fragment);
        }
        acc
    }

    pub fn to_peak_set(&self) -> PeakSet {
        PeakSet::new(self.iter().map(CentroidPeak::from).collect())
    }
}

/// Min-heap entry over the next unconsumed peak of a fragment
#[derive(Debug, Clone, Copy)]
struct FragmentCursor {
    mz: f64,
    fragment: usize,
    position: usize,
}

impl PartialEq for FragmentCursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FragmentCursor {}

impl PartialOrd for FragmentCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FragmentCursor {
    // Reversed so that `BinaryHeap` pops the smallest m/z, ties go to the earlier fragment
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .mz
            .total_cmp(&self.mz)
            .then_with(|| other.fragment.cmp(&self.fragment))
    }
}
