use std::collections::HashSet;
use std::iter::FusedIterator;
use std::sync::Arc;

use identity_hash::BuildIdentityHasher;
use log::trace;

use crate::spectrum::{RunSlice, RunSliceData, SpectrumSlice};

use super::cache::{EntityCache, RunSliceHeaderMap};
use super::cursor::{BoundingBoxCursor, BoundingBoxIterator};
use super::error::{DataCorruptionError, MzDbError};
use super::spectra::MergeState;

fn validate_mz_range(label: &str, range: (f64, f64)) -> Result<(), MzDbError> {
    let (min_mz, max_mz) = range;
    if min_mz.is_nan() || max_mz.is_nan() || min_mz > max_mz {
        return Err(MzDbError::Configuration(format!(
            "Invalid {label} m/z range {min_mz}-{max_mz}"
        )));
    }
    Ok(())
}

/// Yields whole run slices, concatenating the spectrum slices of every consecutive
/// bounding box of the same run slice.
///
/// Use [`RunSliceIterator::lc_ms`] for MS1 run slices and [`RunSliceIterator::lc_msn`]
/// for the MS2 run slices of one precursor isolation window.
pub struct RunSliceIterator<C: BoundingBoxCursor> {
    boxes: BoundingBoxIterator<C>,
    headers: RunSliceHeaderMap,
    /// (box id, run slice id, slices) of the box in the look-ahead slot
    lookahead: Option<(i64, i64, Vec<SpectrumSlice>)>,
    finished: HashSet<i64, BuildIdentityHasher<i64>>,
    ms_level: u8,
    mz_range: Option<(f64, f64)>,
    parent_mz_range: Option<(f64, f64)>,
    state: MergeState,
}

impl<C: BoundingBoxCursor> RunSliceIterator<C> {
    fn new(
        cache: Arc<EntityCache>,
        cursor: C,
        ms_level: u8,
        mz_range: Option<(f64, f64)>,
        parent_mz_range: Option<(f64, f64)>,
    ) -> Result<Self, MzDbError> {
        cache.validate_ms_level(ms_level)?;
        if let Some(range) = mz_range {
            validate_mz_range("run slice", range)?;
        }
        if let Some(range) = parent_mz_range {
            validate_mz_range("precursor", range)?;
        }
        let headers = cache.run_slice_headers(ms_level);
        if headers.is_empty() {
            return Err(MzDbError::Configuration(format!(
                "This file contains no run slices of MS level {ms_level}"
            )));
        }
        Ok(Self {
            boxes: BoundingBoxIterator::new(cache, cursor, Some(ms_level)),
            headers,
            lookahead: None,
            finished: HashSet::default(),
            ms_level,
            mz_range,
            parent_mz_range,
            state: MergeState::Buffering,
        })
    }

    /// Iterate over the MS1 run slices, optionally only those overlapping `mz_range`.
    ///
    /// The cursor must yield MS1 boxes ordered by run slice.
    pub fn lc_ms(
        cache: Arc<EntityCache>,
        cursor: C,
        mz_range: Option<(f64, f64)>,
    ) -> Result<Self, MzDbError> {
        Self::new(cache, cursor, 1, mz_range, None)
    }

    /// Iterate over the MS2 run slices of the precursor windows within `parent_mz_range`,
    /// optionally only those overlapping `mz_range`.
    ///
    /// The cursor must yield MS2 boxes ordered by run slice.
    pub fn lc_msn(
        cache: Arc<EntityCache>,
        cursor: C,
        parent_mz_range: (f64, f64),
        mz_range: Option<(f64, f64)>,
    ) -> Result<Self, MzDbError> {
        Self::new(cache, cursor, 2, mz_range, Some(parent_mz_range))
    }

    pub fn ms_level(&self) -> u8 {
        self.ms_level
    }

    pub fn mz_range(&self) -> Option<(f64, f64)> {
        self.mz_range
    }

    pub fn parent_mz_range(&self) -> Option<(f64, f64)> {
        self.parent_mz_range
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    fn next_decoded(&mut self) -> Result<Option<(i64, i64, Vec<SpectrumSlice>)>, MzDbError> {
        let Some(bb) = self.boxes.next_box()? else {
            return Ok(None);
        };
        let slices = bb.to_spectrum_slices(self.boxes.cache())?;
        Ok(Some((bb.id, bb.run_slice_id, slices)))
    }

    fn next_run_slice(&mut self) -> Result<Option<RunSlice>, MzDbError> {
        let (bb_id, run_slice_id, mut slices) = match self.lookahead.take() {
            Some(first) => first,
            None => match self.next_decoded()? {
                Some(first) => first,
                None => return Ok(None),
            },
        };
        if !self.finished.insert(run_slice_id) {
            return Err(DataCorruptionError::NonContiguousRunSlice {
                bb_id,
                run_slice_id,
            }
            .into());
        }
        let header = self
            .headers
            .get(&run_slice_id)
            .ok_or(DataCorruptionError::MissingRunSliceHeader {
                bb_id,
                run_slice_id,
            })?
            .clone();

        while let Some(next) = self.next_decoded()? {
            if next.1 != run_slice_id {
                self.lookahead = Some(next);
                break;
            }
            slices.extend(next.2);
        }
        trace!(
            "Assembled run slice {run_slice_id} from {} spectrum slices",
            slices.len()
        );
        Ok(Some(RunSlice::new(
            header,
            RunSliceData::new(run_slice_id, slices),
        )))
    }

    pub fn close(&mut self) {
        self.state = MergeState::Exhausted;
        self.lookahead = None;
        self.boxes.close();
    }

    pub fn is_closed(&self) -> bool {
        self.boxes.is_closed()
    }
}

impl<C: BoundingBoxCursor> Iterator for RunSliceIterator<C> {
    type Item = Result<RunSlice, MzDbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == MergeState::Exhausted {
            return None;
        }
        match self.next_run_slice() {
            Ok(Some(run_slice)) => {
                self.state = if self.lookahead.is_some() {
                    MergeState::Ready
                } else {
                    MergeState::Buffering
                };
                Some(Ok(run_slice))
            }
            Ok(None) => {
                self.close();
                None
            }
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

impl<C: BoundingBoxCursor> FusedIterator for RunSliceIterator<C> {}
