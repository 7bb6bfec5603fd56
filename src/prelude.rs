//! Traits needed to drive the readers and cursors, collected for glob import.
pub use crate::io::mzdb::{BoundingBoxCursor, FromSQL};
pub use mzpeaks::prelude::*;
