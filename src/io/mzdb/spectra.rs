//! Reassembling whole spectra out of the bounding boxes that split them across run slices.
//!
//! Bounding boxes sharing a leading spectrum id form a group holding slices of the
//! same spectra. Groups are visited in ascending leading id order, but when more
//! than one MS level is scanned the groups of each level interleave and their spectra
//! overlap in id. Completed spectra are therefore queued in a min-heap and only
//! released once no group that has not been read yet can produce a smaller id.
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap};
use std::iter::FusedIterator;
use std::sync::Arc;

use log::{debug, warn};

use crate::spectrum::{Spectrum, SpectrumData, SpectrumHeader, SpectrumSlice};

use super::cache::EntityCache;
use super::cursor::{BoundingBoxCursor, BoundingBoxIterator};
use super::error::{DataCorruptionError, MzDbError};

/// How the fragments a spectrum accumulates across bounding boxes are combined
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FragmentOrdering {
    /// Produce peaks in ascending m/z order whatever order the run slices were read in
    #[default]
    Merge,
    /// Append fragments in the order their boxes were read
    Concatenate,
}

impl FragmentOrdering {
    fn combine(&self, fragments: Vec<SpectrumData>) -> SpectrumData {
        match self {
            Self::Merge => SpectrumData::merge_sorted_fragments(fragments),
            Self::Concatenate => SpectrumData::concatenate(fragments),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// Reading the next group of bounding boxes
    #[default]
    Buffering,
    /// Releasing completed spectra
    Ready,
    Exhausted,
}

#[derive(Debug)]
struct PendingSpectrum {
    header: Arc<SpectrumHeader>,
    fragments: Vec<SpectrumData>,
}

impl From<SpectrumSlice> for PendingSpectrum {
    fn from(value: SpectrumSlice) -> Self {
        Self {
            header: value.spectrum.header,
            fragments: vec![value.spectrum.data],
        }
    }
}

#[derive(Debug)]
struct QueuedSpectrum(Spectrum);

impl PartialEq for QueuedSpectrum {
    fn eq(&self, other: &Self) -> bool {
        self.0.id() == other.0.id()
    }
}

impl Eq for QueuedSpectrum {}

impl PartialOrd for QueuedSpectrum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedSpectrum {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id().cmp(&other.0.id())
    }
}

#[derive(Debug)]
struct DecodedBox {
    bb_id: i64,
    leading_id: i64,
    slices: Vec<SpectrumSlice>,
}

/// The state shared by [`SpectrumIterator`] and [`SpectrumRangeIterator`]
struct SpectrumMerger<C: BoundingBoxCursor> {
    boxes: BoundingBoxIterator<C>,
    fragment_ordering: FragmentOrdering,
    state: MergeState,
    lookahead: Option<DecodedBox>,
    last_leading_id: Option<i64>,
    /// Leading ids of groups holding wanted spectra that have not been read yet
    pending: BTreeSet<i64>,
    queue: BinaryHeap<Reverse<QueuedSpectrum>>,
    input_exhausted: bool,
    max_queue_size: usize,
}

impl<C: BoundingBoxCursor> SpectrumMerger<C> {
    fn new(
        cache: Arc<EntityCache>,
        cursor: C,
        ms_level: Option<u8>,
        pending: BTreeSet<i64>,
    ) -> Self {
        Self {
            boxes: BoundingBoxIterator::new(cache, cursor, ms_level),
            fragment_ordering: FragmentOrdering::default(),
            state: MergeState::Buffering,
            lookahead: None,
            last_leading_id: None,
            pending,
            queue: BinaryHeap::new(),
            input_exhausted: false,
            max_queue_size: 0,
        }
    }

    fn next_decoded(&mut self) -> Result<Option<DecodedBox>, MzDbError> {
        let Some(bb) = self.boxes.next_box()? else {
            return Ok(None);
        };
        let slices = bb.to_spectrum_slices(self.boxes.cache())?;
        Ok(Some(DecodedBox {
            bb_id: bb.id,
            leading_id: bb.first_spectrum_id,
            slices,
        }))
    }

    /// Read every box of the next group and queue its completed spectra. Returns
    /// `Ok(false)` when there are no more boxes.
    fn buffer_next_group(&mut self) -> Result<bool, MzDbError> {
        let first = match self.lookahead.take() {
            Some(first) => first,
            None => match self.next_decoded()? {
                Some(first) => first,
                None => return Ok(false),
            },
        };
        let leading_id = first.leading_id;
        if self.last_leading_id.is_some_and(|prev| leading_id <= prev) {
            return Err(DataCorruptionError::NonContiguousSpectrumGroup {
                bb_id: first.bb_id,
                spectrum_id: leading_id,
            }
            .into());
        }
        self.last_leading_id = Some(leading_id);
        // Groups arrive in ascending leading id order, so a pending group at or before
        // this one can no longer be read
        let skipped = self.pending.range(..leading_id).count();
        if skipped > 0 {
            warn!("{skipped} bounding box groups before group {leading_id} were never read");
        }
        self.pending = self.pending.split_off(&leading_id.saturating_add(1));

        let mut group: Vec<PendingSpectrum> =
            first.slices.into_iter().map(PendingSpectrum::from).collect();
        let mut n_boxes = 1usize;
        while let Some(next) = self.next_decoded()? {
            if next.leading_id != leading_id {
                self.lookahead = Some(next);
                break;
            }
            n_boxes += 1;
            for slice in next.slices {
                match group.binary_search_by_key(&slice.spectrum_id(), |p| p.header.id) {
                    Ok(i) => group[i].fragments.push(slice.spectrum.data),
                    Err(i) => group.insert(i, PendingSpectrum::from(slice)),
                }
            }
        }

        let ordering = self.fragment_ordering;
        for pending in group {
            let data = ordering.combine(pending.fragments);
            self.queue
                .push(Reverse(QueuedSpectrum(Spectrum::new(pending.header, data))));
        }
        if self.queue.len() > self.max_queue_size {
            self.max_queue_size = self.queue.len();
            debug!(
                "Spectrum queue grew to {} after the {n_boxes} boxes of group {leading_id}",
                self.max_queue_size
            );
        }
        Ok(true)
    }

    fn pop_releasable(&mut self) -> Option<Spectrum> {
        let releasable = match self.queue.peek() {
            Some(Reverse(top)) => {
                self.input_exhausted
                    || self
                        .pending
                        .first()
                        .map_or(true, |watermark| top.0.id() < *watermark)
            }
            None => false,
        };
        if releasable {
            self.queue.pop().map(|Reverse(q)| q.0)
        } else {
            None
        }
    }

    fn next_spectrum(&mut self) -> Option<Result<Spectrum, MzDbError>> {
        loop {
            match self.state {
                MergeState::Exhausted => return None,
                MergeState::Ready => {
                    if let Some(spectrum) = self.pop_releasable() {
                        return Some(Ok(spectrum));
                    }
                    if self.input_exhausted {
                        self.close();
                        return None;
                    }
                    self.state = MergeState::Buffering;
                }
                MergeState::Buffering => match self.buffer_next_group() {
                    Ok(more) => {
                        if !more {
                            self.input_exhausted = true;
                            if !self.pending.is_empty() {
                                warn!(
                                    "{} bounding box groups listed by spectrum headers were never read",
                                    self.pending.len()
                                );
                            }
                        }
                        self.state = MergeState::Ready;
                    }
                    Err(e) => {
                        self.close();
                        return Some(Err(e));
                    }
                },
            }
        }
    }

    fn close(&mut self) {
        self.state = MergeState::Exhausted;
        self.lookahead = None;
        self.queue.clear();
        self.boxes.close();
    }
}

/// Yields whole spectra in ascending id order, optionally restricted to one MS level.
///
/// A spectrum whose peaks are split over several run slices is stitched back together
/// before it is yielded, see [`FragmentOrdering`] for how.
pub struct SpectrumIterator<C: BoundingBoxCursor> {
    merger: SpectrumMerger<C>,
}

impl<C: BoundingBoxCursor> SpectrumIterator<C> {
    /// Create an iterator over the boxes `cursor` yields, which must be ordered by first
    /// spectrum id.
    ///
    /// # Errors
    /// If `ms_level` is given but is not a level this file holds spectra for
    pub fn new(cache: Arc<EntityCache>, cursor: C, ms_level: Option<u8>) -> Result<Self, MzDbError> {
        if let Some(level) = ms_level {
            cache.validate_ms_level(level)?;
        }
        let pending = cache.leading_spectrum_ids(i64::MIN..=i64::MAX, ms_level);
        Ok(Self {
            merger: SpectrumMerger::new(cache, cursor, ms_level, pending),
        })
    }

    pub fn with_fragment_ordering(mut self, fragment_ordering: FragmentOrdering) -> Self {
        self.merger.fragment_ordering = fragment_ordering;
        self
    }

    pub fn state(&self) -> MergeState {
        self.merger.state
    }

    /// The largest number of completed spectra held back at once so far
    pub fn max_queue_size(&self) -> usize {
        self.merger.max_queue_size
    }

    pub fn close(&mut self) {
        self.merger.close()
    }

    pub fn is_closed(&self) -> bool {
        self.merger.boxes.is_closed()
    }
}

impl<C: BoundingBoxCursor> Iterator for SpectrumIterator<C> {
    type Item = Result<Spectrum, MzDbError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.merger.next_spectrum()
    }
}

impl<C: BoundingBoxCursor> FusedIterator for SpectrumIterator<C> {}

/// Yields the spectra with ids in `[start, end]`, in ascending id order.
///
/// The cursor should be restricted to the groups within
/// [`EntityCache::leading_spectrum_id_bounds`]. Spectra before `start` are skipped and
/// iteration stops as soon as `end` is reached or passed.
pub struct SpectrumRangeIterator<C: BoundingBoxCursor> {
    merger: SpectrumMerger<C>,
    start: i64,
    end: i64,
}

impl<C: BoundingBoxCursor> SpectrumRangeIterator<C> {
    pub fn new(
        cache: Arc<EntityCache>,
        cursor: C,
        start: i64,
        end: i64,
        ms_level: Option<u8>,
    ) -> Result<Self, MzDbError> {
        if start > end {
            return Err(MzDbError::Configuration(format!(
                "The spectrum range start {start} is greater than its end {end}"
            )));
        }
        if let Some(level) = ms_level {
            cache.validate_ms_level(level)?;
        }
        let pending = cache.leading_spectrum_ids(start..=end, ms_level);
        let empty = pending.is_empty();
        let mut merger = SpectrumMerger::new(cache, cursor, ms_level, pending);
        if empty {
            debug!("No spectra between {start} and {end}");
            merger.close();
        }
        Ok(Self { merger, start, end })
    }

    pub fn with_fragment_ordering(mut self, fragment_ordering: FragmentOrdering) -> Self {
        self.merger.fragment_ordering = fragment_ordering;
        self
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn state(&self) -> MergeState {
        self.merger.state
    }

    pub fn close(&mut self) {
        self.merger.close()
    }

    pub fn is_closed(&self) -> bool {
        self.merger.boxes.is_closed()
    }
}

impl<C: BoundingBoxCursor> Iterator for SpectrumRangeIterator<C> {
    type Item = Result<Spectrum, MzDbError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let spectrum = match self.merger.next_spectrum()? {
                Ok(spectrum) => spectrum,
                Err(e) => return Some(Err(e)),
            };
            let id = spectrum.id();
            if id < self.start {
                continue;
            }
            if id > self.end {
                self.merger.close();
                return None;
            }
            if id == self.end {
                self.merger.close();
            }
            return Some(Ok(spectrum));
        }
    }
}

impl<C: BoundingBoxCursor> FusedIterator for SpectrumRangeIterator<C> {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encoding::DataEncoding;
    use crate::io::mzdb::bbox::{encode_spectrum_slices, BoundingBoxRecord};
    use crate::io::mzdb::cursor::MemoryBoundingBoxCursor;
    use crate::spectrum::RunSliceHeader;

    fn encoding() -> DataEncoding {
        DataEncoding {
            id: 1,
            ..Default::default()
        }
    }

    fn peaks(mzs: &[f64]) -> SpectrumData {
        SpectrumData::new(mzs.to_vec(), vec![10.0; mzs.len()], None, None)
    }

    fn record(bb_id: i64, run_slice_id: i64, slices: &[(i64, &[f64])]) -> BoundingBoxRecord {
        let de = encoding();
        let data: Vec<SpectrumData> = slices.iter().map(|(_, mzs)| peaks(mzs)).collect();
        let blob = encode_spectrum_slices(
            slices.iter().zip(data.iter()).map(|((id, _), d)| (*id, d, &de)),
            &de,
        )
        .unwrap();
        let first = slices.iter().map(|(id, _)| *id).min().unwrap();
        let last = slices.iter().map(|(id, _)| *id).max().unwrap();
        BoundingBoxRecord::new(bb_id, blob, run_slice_id, first, last)
    }

    fn cache(headers: Vec<SpectrumHeader>) -> Arc<EntityCache> {
        let headers = headers
            .into_iter()
            .map(|h| h.with_data_encoding_id(1))
            .collect();
        Arc::new(EntityCache::from_headers(
            headers,
            [encoding()],
            [
                RunSliceHeader::new(1, 1, 1, 100.0, 200.0, 1),
                RunSliceHeader::new(2, 1, 2, 200.0, 300.0, 1),
                RunSliceHeader::new(3, 2, 1, 100.0, 300.0, 1),
            ],
        ))
    }

    #[test_log::test]
    fn test_stitch_across_boxes() {
        let cache = cache(vec![
            SpectrumHeader::new(1, 1, 0.1, 1, 1),
            SpectrumHeader::new(2, 2, 0.2, 1, 1),
        ]);
        let cursor = MemoryBoundingBoxCursor::new([
            record(1, 1, &[(1, &[150.0, 160.0]), (2, &[170.0])]),
            record(2, 2, &[(1, &[250.0]), (2, &[260.0, 270.0])]),
        ]);
        let spectra: Vec<Spectrum> = SpectrumIterator::new(cache, cursor, Some(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(spectra.len(), 2);
        assert_eq!(spectra[0].id(), 1);
        assert_eq!(spectra[0].peaks_count(), 3);
        assert_eq!(spectra[0].data.mz_list, vec![150.0, 160.0, 250.0]);
        assert_eq!(spectra[1].peaks_count(), 3);
    }

    #[test]
    fn test_out_of_order_fragments() {
        let cache = cache(vec![SpectrumHeader::new(1, 1, 0.1, 1, 1)]);
        let boxes = || {
            MemoryBoundingBoxCursor::new([
                record(1, 2, &[(1, &[250.0, 260.0])]),
                record(2, 1, &[(1, &[150.0, 255.0])]),
            ])
        };
        let spectrum = SpectrumIterator::new(cache.clone(), boxes(), None)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(spectrum.data.mz_list, vec![150.0, 250.0, 255.0, 260.0]);

        let spectrum = SpectrumIterator::new(cache, boxes(), None)
            .unwrap()
            .with_fragment_ordering(FragmentOrdering::Concatenate)
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(spectrum.data.mz_list, vec![250.0, 260.0, 150.0, 255.0]);
    }

    #[test_log::test]
    fn test_interleaved_ms_levels() {
        let cache = cache(vec![
            SpectrumHeader::new(1, 1, 0.1, 1, 1),
            SpectrumHeader::new(2, 1, 0.2, 2, 2),
            SpectrumHeader::new(3, 1, 0.3, 2, 2),
            SpectrumHeader::new(4, 2, 0.4, 1, 1),
            SpectrumHeader::new(5, 2, 0.5, 2, 2),
        ]);
        let cursor = MemoryBoundingBoxCursor::new([
            record(1, 1, &[(1, &[150.0]), (4, &[151.0])]),
            record(2, 2, &[(1, &[250.0]), (4, &[251.0])]),
            record(3, 3, &[(2, &[120.0]), (3, &[121.0]), (5, &[122.0])]),
        ]);
        let mut it = SpectrumIterator::new(cache, cursor, None).unwrap();
        let ids: Vec<i64> = it.by_ref().map(|s| s.unwrap().id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(it.state(), MergeState::Exhausted);
        assert!(it.is_closed());
        assert!(it.max_queue_size() <= 4);
        assert!(it.next().is_none());
    }

    #[test]
    fn test_single_level_from_mixed_file() {
        let cache = cache(vec![
            SpectrumHeader::new(1, 1, 0.1, 1, 1),
            SpectrumHeader::new(2, 1, 0.2, 2, 2),
            SpectrumHeader::new(3, 2, 0.4, 1, 3),
        ]);
        let cursor = MemoryBoundingBoxCursor::new([
            record(1, 1, &[(1, &[150.0])]),
            record(2, 1, &[(3, &[150.0])]),
        ]);
        let ids: Vec<i64> = SpectrumIterator::new(cache.clone(), cursor, Some(1))
            .unwrap()
            .map(|s| s.unwrap().id())
            .collect();
        assert_eq!(ids, vec![1, 3]);

        assert!(SpectrumIterator::new(cache.clone(), MemoryBoundingBoxCursor::default(), Some(3))
            .err()
            .unwrap()
            .is_configuration());
        assert!(SpectrumIterator::new(cache, MemoryBoundingBoxCursor::default(), Some(0))
            .err()
            .unwrap()
            .is_configuration());
    }

    #[test]
    fn test_non_contiguous_group() {
        let cache = cache(vec![
            SpectrumHeader::new(1, 1, 0.1, 1, 1),
            SpectrumHeader::new(2, 2, 0.2, 1, 2),
        ]);
        let cursor = MemoryBoundingBoxCursor::new([
            record(1, 1, &[(1, &[150.0])]),
            record(2, 1, &[(2, &[150.0])]),
            record(3, 2, &[(1, &[250.0])]),
        ]);
        let mut it = SpectrumIterator::new(cache, cursor, None).unwrap();
        let mut saw_error = false;
        for item in it.by_ref() {
            if let Err(e) = item {
                assert!(matches!(
                    e.as_data_corruption(),
                    Some(DataCorruptionError::NonContiguousSpectrumGroup { bb_id: 3, spectrum_id: 1 })
                ));
                saw_error = true;
            }
        }
        assert!(saw_error);
        assert!(it.next().is_none());
        assert!(it.is_closed());
    }

    #[test]
    fn test_duplicate_aborts_scan() {
        let cache = cache(vec![SpectrumHeader::new(1, 1, 0.1, 1, 1)]);
        let cursor = MemoryBoundingBoxCursor::new([record(1, 1, &[(1, &[150.0]), (1, &[151.0])])]);
        let mut it = SpectrumIterator::new(cache, cursor, None).unwrap();
        assert!(it.next().unwrap().unwrap_err().is_data_corruption());
        assert!(it.next().is_none());
    }

    #[test_log::test]
    fn test_missing_group_releases_queue() {
        let headers = (1..=200).map(|i| SpectrumHeader::new(i, i, i as f32, 1, i)).collect();
        let cursor: MemoryBoundingBoxCursor = (1..=200)
            .filter(|i| *i != 2)
            .map(|i| record(i, 1, &[(i, &[150.0])]))
            .collect();
        let mut it = SpectrumIterator::new(cache(headers), cursor, None).unwrap();
        assert_eq!(it.next().unwrap().unwrap().id(), 1);
        assert_eq!(it.next().unwrap().unwrap().id(), 3);
        assert!(it.max_queue_size() <= 1);
        let rest: Vec<i64> = it.by_ref().map(|s| s.unwrap().id()).collect();
        assert_eq!(rest, (4..=200).collect::<Vec<_>>());
        assert!(it.max_queue_size() <= 1);
    }

    fn fifty_spectra() -> (Arc<EntityCache>, Vec<BoundingBoxRecord>) {
        let headers = (1..=50)
            .map(|i| SpectrumHeader::new(i, i, i as f32, 1, (i - 1) / 5 * 5 + 1))
            .collect();
        let mut records = Vec::new();
        let mut bb_id = 0;
        for lead in (1..=50).step_by(5) {
            for rs in [1, 2] {
                bb_id += 1;
                let slices: Vec<(i64, &[f64])> = (lead..lead + 5)
                    .map(|i| (i, if rs == 1 { &[150.0][..] } else { &[250.0, 251.0][..] }))
                    .collect();
                records.push(record(bb_id, rs, &slices));
            }
        }
        (cache(headers), records)
    }

    #[test_log::test]
    fn test_range_iterator() {
        let (cache, records) = fifty_spectra();
        let bounds = cache.leading_spectrum_id_bounds(10..=20, None);
        assert_eq!(bounds, Some(6..=16));

        let cursor = MemoryBoundingBoxCursor::new(records.clone());
        let mut it = SpectrumRangeIterator::new(cache.clone(), cursor, 10, 20, None).unwrap();
        let spectra: Vec<Spectrum> = it.by_ref().collect::<Result<_, _>>().unwrap();
        let ids: Vec<i64> = spectra.iter().map(|s| s.id()).collect();
        assert_eq!(ids, (10..=20).collect::<Vec<_>>());
        assert!(spectra.iter().all(|s| s.peaks_count() == 3));
        assert!(it.is_closed());

        let bounds = bounds.unwrap();
        let cursor = MemoryBoundingBoxCursor::new(
            records
                .into_iter()
                .filter(|r| bounds.contains(&r.first_spectrum_id)),
        );
        let ids: Vec<i64> = SpectrumRangeIterator::new(cache, cursor, 10, 20, Some(1))
            .unwrap()
            .map(|s| s.unwrap().id())
            .collect();
        assert_eq!(ids, (10..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_range_iterator_configuration() {
        let (cache, _) = fifty_spectra();
        assert!(SpectrumRangeIterator::new(cache.clone(), MemoryBoundingBoxCursor::default(), 20, 10, None)
            .err()
            .unwrap()
            .is_configuration());

        let mut it =
            SpectrumRangeIterator::new(cache.clone(), MemoryBoundingBoxCursor::default(), 60, 70, None).unwrap();
        assert!(it.next().is_none());
        assert!(it.is_closed());
        assert_eq!(
            cache.leading_spectrum_id_bounds(60..=70, None),
            None
        );
    }
}
