use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;

use log::debug;

use super::bbox::{BoundingBox, BoundingBoxRecord};
use super::cache::EntityCache;
use super::error::{DataCorruptionError, MzDbError};

/// A forward-only source of `bounding_box` rows.
///
/// A cursor owns whatever store resources back it. [`BoundingBoxCursor::close`] releases
/// them and may be called any number of times. A closed cursor yields no more rows.
pub trait BoundingBoxCursor {
    fn next_record(&mut self) -> Result<Option<BoundingBoxRecord>, MzDbError>;

    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

impl<T: BoundingBoxCursor + ?Sized> BoundingBoxCursor for Box<T> {
    fn next_record(&mut self) -> Result<Option<BoundingBoxRecord>, MzDbError> {
        (**self).next_record()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// A cursor over rows already held in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryBoundingBoxCursor {
    records: VecDeque<BoundingBoxRecord>,
    closed: bool,
}

impl MemoryBoundingBoxCursor {
    pub fn new(records: impl IntoIterator<Item = BoundingBoxRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
            closed: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl FromIterator<BoundingBoxRecord> for MemoryBoundingBoxCursor {
    fn from_iter<T: IntoIterator<Item = BoundingBoxRecord>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl BoundingBoxCursor for MemoryBoundingBoxCursor {
    fn next_record(&mut self) -> Result<Option<BoundingBoxRecord>, MzDbError> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.records.pop_front())
    }

    fn close(&mut self) {
        self.closed = true;
        self.records.clear();
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Streams [`BoundingBox`] values out of a [`BoundingBoxCursor`], one at a time.
///
/// The iterator keeps a single row of look-ahead. Once the cursor is exhausted, an error
/// is encountered, or [`BoundingBoxIterator::close`] is called, the cursor is closed and
/// the iterator yields nothing more.
pub struct BoundingBoxIterator<C: BoundingBoxCursor> {
    cache: Arc<EntityCache>,
    cursor: C,
    ms_level: Option<u8>,
    lookahead: Option<BoundingBoxRecord>,
    done: bool,
}

impl<C: BoundingBoxCursor> BoundingBoxIterator<C> {
    /// Wrap `cursor`. When `ms_level` is given, every box must start with a spectrum of
    /// that level.
    pub fn new(cache: Arc<EntityCache>, cursor: C, ms_level: Option<u8>) -> Self {
        let done = cursor.is_closed();
        Self {
            cache,
            cursor,
            ms_level,
            lookahead: None,
            done,
        }
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn ms_level(&self) -> Option<u8> {
        self.ms_level
    }

    /// Check whether another box is available, pulling it into the look-ahead slot.
    ///
    /// Returns `Ok(false)` forever once the cursor is exhausted or closed.
    pub fn has_next(&mut self) -> Result<bool, MzDbError> {
        if self.lookahead.is_some() {
            return Ok(true);
        }
        if self.done {
            return Ok(false);
        }
        match self.cursor.next_record() {
            Ok(Some(record)) => {
                self.lookahead = Some(record);
                Ok(true)
            }
            Ok(None) => {
                self.close();
                Ok(false)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn build_box(&self, record: BoundingBoxRecord) -> Result<BoundingBox, MzDbError> {
        let header = self
            .cache
            .spectrum_header(record.first_spectrum_id)
            .ok_or(DataCorruptionError::MissingSpectrumHeader {
                bb_id: record.id,
                spectrum_id: record.first_spectrum_id,
            })?;
        if let Some(expected) = self.ms_level {
            if header.ms_level != expected {
                return Err(DataCorruptionError::UnexpectedMsLevel {
                    bb_id: record.id,
                    expected,
                    found: header.ms_level,
                }
                .into());
            }
        }
        BoundingBox::from_record(record, &self.cache)
    }

    /// Produce the next box, or `None` once the cursor is exhausted
    pub fn next_box(&mut self) -> Result<Option<BoundingBox>, MzDbError> {
        if !self.has_next()? {
            return Ok(None);
        }
        let Some(record) = self.lookahead.take() else {
            return Ok(None);
        };
        match self.build_box(record) {
            Ok(bb) => Ok(Some(bb)),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Release the underlying cursor. Safe to call repeatedly.
    pub fn close(&mut self) {
        if !self.done {
            debug!("Closing bounding box cursor");
        }
        self.done = true;
        self.lookahead = None;
        self.cursor.close();
    }

    pub fn is_closed(&self) -> bool {
        self.done && self.cursor.is_closed()
    }
}

impl<C: BoundingBoxCursor> Iterator for BoundingBoxIterator<C> {
    type Item = Result<BoundingBox, MzDbError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_box().transpose()
    }
}

impl<C: BoundingBoxCursor> FusedIterator for BoundingBoxIterator<C> {}

impl<C: BoundingBoxCursor> Drop for BoundingBoxIterator<C> {
    fn drop(&mut self) {
        self.close();
    }
}
