//! Bounding boxes: the blobs packing the peaks of consecutive spectra within one run slice.
//!
//! A blob is a sequence of spectrum slices, each laid out as
//!
//! ```text
//! [spectrum id: i32][peak count: i32][peak struct] * peak count
//! ```
//!
//! where the peak struct is described by the spectrum's [`DataEncoding`]. The framing
//! integers use the byte order of the encoding of the box's first spectrum, which also
//! decides whether the whole blob is compressed.
use std::borrow::Cow;
use std::io::{self, prelude::*};
use std::sync::Arc;

use flate2::{read::ZlibDecoder, write::ZlibEncoder};
use log::trace;

use crate::encoding::{ByteOrder, Compression, DataEncoding, DataMode, PeakEncoding};
use crate::spectrum::{SpectrumData, SpectrumSlice};

use super::cache::EntityCache;
use super::error::{DataCorruptionError, MzDbError};

const SLICE_HEADER_SIZE: usize = 8;

/// A raw `bounding_box` row, as returned by the blob store
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundingBoxRecord {
    pub id: i64,
    pub data: Vec<u8>,
    pub run_slice_id: i64,
    pub first_spectrum_id: i64,
    pub last_spectrum_id: i64,
}

impl BoundingBoxRecord {
    pub fn new(
        id: i64,
        data: Vec<u8>,
        run_slice_id: i64,
        first_spectrum_id: i64,
        last_spectrum_id: i64,
    ) -> Self {
        Self {
            id,
            data,
            run_slice_id,
            first_spectrum_id,
            last_spectrum_id,
        }
    }
}

/// The location of every spectrum slice inside a bounding box blob, computed without
/// decoding any peaks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundingBoxIndex {
    pub bb_id: i64,
    pub spectrum_ids: Vec<i64>,
    /// The byte offset of each slice's first peak
    pub peaks_offsets: Vec<usize>,
    pub peaks_counts: Vec<usize>,
}

impl BoundingBoxIndex {
    pub fn len(&self) -> usize {
        self.spectrum_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum_ids.is_empty()
    }

    pub fn find(&self, spectrum_id: i64) -> Option<usize> {
        self.spectrum_ids.iter().position(|i| *i == spectrum_id)
    }
}

/// A read-only view over a decompressed blob with explicit byte order
#[derive(Debug, Clone, Copy)]
struct BlobView<'a> {
    bb_id: i64,
    bytes: &'a [u8],
    byte_order: ByteOrder,
}

impl<'a> BlobView<'a> {
    fn take(&self, offset: usize, length: usize) -> Result<&'a [u8], DataCorruptionError> {
        offset
            .checked_add(length)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(DataCorruptionError::Truncated {
                bb_id: self.bb_id,
                offset,
                required: length,
                available: self.bytes.len(),
            })
    }

    fn read_i32(&self, offset: usize) -> Result<i32, DataCorruptionError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(offset, 4)?);
        Ok(self.byte_order.read_i32(buf))
    }
}

fn read_f32(bytes: &[u8], offset: usize, byte_order: ByteOrder) -> f32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    byte_order.read_f32(buf)
}

fn read_f64(bytes: &[u8], offset: usize, byte_order: ByteOrder) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    byte_order.read_f64(buf)
}

/// Decode `peak_bytes` as a packed array of peaks laid out according to `encoding`.
///
/// Trailing bytes that do not fill a whole peak struct are ignored.
pub fn decode_spectrum_data(peak_bytes: &[u8], encoding: &DataEncoding) -> SpectrumData {
    let peak_size = encoding.peak_struct_size();
    let peaks_count = peak_bytes.len() / peak_size;
    let byte_order = encoding.byte_order;
    let pe = encoding.peak_encoding;
    let fitted = encoding.is_fitted();

    let mut data = SpectrumData::with_capacity(peaks_count, fitted);
    for peak in peak_bytes.chunks_exact(peak_size) {
        let mz = match pe {
            PeakEncoding::LowRes => read_f32(peak, 0, byte_order) as f64,
            PeakEncoding::HighRes | PeakEncoding::NoLoss => read_f64(peak, 0, byte_order),
        };
        let intensity_offset = pe.mz_size();
        let intensity = match pe {
            PeakEncoding::NoLoss => read_f64(peak, intensity_offset, byte_order) as f32,
            PeakEncoding::LowRes | PeakEncoding::HighRes => {
                read_f32(peak, intensity_offset, byte_order)
            }
        };
        data.mz_list.push(mz);
        data.intensity_list.push(intensity);
        if fitted {
            let hwhm_offset = pe.size_of();
            if let Some(lhwhm) = data.left_hwhm_list.as_mut() {
                lhwhm.push(read_f32(peak, hwhm_offset, byte_order));
            }
            if let Some(rhwhm) = data.right_hwhm_list.as_mut() {
                rhwhm.push(read_f32(peak, hwhm_offset + 4, byte_order));
            }
        }
    }
    data
}

/// Encode `data` as a packed array of peaks laid out according to `encoding`, the
/// inverse of [`decode_spectrum_data`]. Missing half-widths are written as zero.
pub fn encode_spectrum_data(data: &SpectrumData, encoding: &DataEncoding, buffer: &mut Vec<u8>) {
    let byte_order = encoding.byte_order;
    let pe = encoding.peak_encoding;
    buffer.reserve(data.peaks_count() * encoding.peak_struct_size());
    for peak in data.iter() {
        match pe {
            PeakEncoding::LowRes => byte_order.write_f32(peak.mz as f32, buffer),
            PeakEncoding::HighRes | PeakEncoding::NoLoss => byte_order.write_f64(peak.mz, buffer),
        }
        match pe {
            PeakEncoding::NoLoss => byte_order.write_f64(peak.intensity as f64, buffer),
            PeakEncoding::LowRes | PeakEncoding::HighRes => {
                byte_order.write_f32(peak.intensity, buffer)
            }
        }
        if matches!(encoding.mode, DataMode::Fitted) {
            byte_order.write_f32(peak.left_hwhm, buffer);
            byte_order.write_f32(peak.right_hwhm, buffer);
        }
    }
}

/// A bounding box row together with the data encoding of its first spectrum.
///
/// Decoding is done on demand and is not cached, each call to
/// [`BoundingBox::to_spectrum_slices`] decodes the blob again.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub id: i64,
    pub run_slice_id: i64,
    pub first_spectrum_id: i64,
    pub last_spectrum_id: i64,
    encoding: Arc<DataEncoding>,
    data: Vec<u8>,
}

impl BoundingBox {
    pub fn new(record: BoundingBoxRecord, encoding: Arc<DataEncoding>) -> Self {
        Self {
            id: record.id,
            run_slice_id: record.run_slice_id,
            first_spectrum_id: record.first_spectrum_id,
            last_spectrum_id: record.last_spectrum_id,
            encoding,
            data: record.data,
        }
    }

    /// Build a bounding box from a row, resolving the encoding of its first spectrum
    pub fn from_record(record: BoundingBoxRecord, cache: &EntityCache) -> Result<Self, MzDbError> {
        let encoding = cache
            .data_encoding_by_spectrum_id(record.first_spectrum_id)
            .ok_or(DataCorruptionError::MissingDataEncoding {
                bb_id: record.id,
                spectrum_id: record.first_spectrum_id,
            })?
            .clone();
        Ok(Self::new(record, encoding))
    }

    pub fn encoding(&self) -> &DataEncoding {
        &self.encoding
    }

    /// The stored bytes, possibly compressed
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// The blob with any compression undone
    pub fn bytes(&self) -> Result<Cow<'_, [u8]>, MzDbError> {
        match &self.encoding.compression {
            Compression::None => Ok(Cow::Borrowed(&self.data)),
            Compression::Zlib => {
                let mut decoder = ZlibDecoder::new(self.data.as_slice());
                let mut buffer = Vec::with_capacity(self.data.len() * 2);
                decoder.read_to_end(&mut buffer).map_err(|e| {
                    DataCorruptionError::Decompression {
                        bb_id: self.id,
                        message: e.to_string(),
                    }
                })?;
                Ok(Cow::Owned(buffer))
            }
            Compression::Other(name) => Err(MzDbError::Configuration(format!(
                "Bounding box {} uses unsupported compression {name}",
                self.id
            ))),
        }
    }

    fn index_bytes(&self, bytes: &[u8], cache: &EntityCache) -> Result<BoundingBoxIndex, MzDbError> {
        let view = BlobView {
            bb_id: self.id,
            bytes,
            byte_order: self.encoding.byte_order,
        };
        // The row's spectrum range is unchecked metadata, the blob bounds the slice count
        let estimated = self
            .last_spectrum_id
            .checked_sub(self.first_spectrum_id)
            .and_then(|span| usize::try_from(span).ok())
            .map_or(1, |span| span.saturating_add(1))
            .min(bytes.len() / SLICE_HEADER_SIZE);
        let mut index = BoundingBoxIndex {
            bb_id: self.id,
            spectrum_ids: Vec::with_capacity(estimated),
            peaks_offsets: Vec::with_capacity(estimated),
            peaks_counts: Vec::with_capacity(estimated),
        };

        let mut offset = 0;
        while offset < bytes.len() {
            let spectrum_id = view.read_i32(offset)? as i64;
            let peaks_count = view.read_i32(offset + 4)?;
            if peaks_count < 0 {
                return Err(DataCorruptionError::NegativePeakCount {
                    bb_id: self.id,
                    spectrum_id,
                    peaks_count,
                }
                .into());
            }
            let peaks_count = peaks_count as usize;
            let encoding = cache.data_encoding_by_spectrum_id(spectrum_id).ok_or(
                DataCorruptionError::MissingDataEncoding {
                    bb_id: self.id,
                    spectrum_id,
                },
            )?;

            let peaks_offset = offset + SLICE_HEADER_SIZE;
            let peaks_length = peaks_count * encoding.peak_struct_size();
            view.take(peaks_offset, peaks_length)?;

            index.spectrum_ids.push(spectrum_id);
            index.peaks_offsets.push(peaks_offset);
            index.peaks_counts.push(peaks_count);
            offset = peaks_offset + peaks_length;
        }
        Ok(index)
    }

    /// Locate every spectrum slice in the blob without decoding its peaks
    pub fn index(&self, cache: &EntityCache) -> Result<BoundingBoxIndex, MzDbError> {
        let bytes = self.bytes()?;
        self.index_bytes(&bytes, cache)
    }

    /// Decode the blob into one [`SpectrumSlice`] per spectrum, in ascending spectrum id
    /// order.
    ///
    /// # Errors
    /// A spectrum id occurring twice, a spectrum id outside of this box's spectrum range,
    /// truncated data, or a spectrum without a header or data encoding are all reported as
    /// [`MzDbError::DataCorruption`].
    pub fn to_spectrum_slices(&self, cache: &EntityCache) -> Result<Vec<SpectrumSlice>, MzDbError> {
        let bytes = self.bytes()?;
        let index = self.index_bytes(&bytes, cache)?;

        let mut order: Vec<usize> = (0..index.len()).collect();
        if !index.spectrum_ids.windows(2).all(|w| w[0] < w[1]) {
            order.sort_by_key(|i| index.spectrum_ids[*i]);
            if let Some(w) = order
                .windows(2)
                .find(|w| index.spectrum_ids[w[0]] == index.spectrum_ids[w[1]])
            {
                return Err(DataCorruptionError::DuplicateSpectrumId {
                    bb_id: self.id,
                    spectrum_id: index.spectrum_ids[w[0]],
                }
                .into());
            }
        }

        let mut slices = Vec::with_capacity(order.len());
        for i in order {
            let spectrum_id = index.spectrum_ids[i];
            if spectrum_id < self.first_spectrum_id || spectrum_id > self.last_spectrum_id {
                return Err(DataCorruptionError::SpectrumOutOfRange {
                    bb_id: self.id,
                    spectrum_id,
                    first_spectrum_id: self.first_spectrum_id,
                    last_spectrum_id: self.last_spectrum_id,
                }
                .into());
            }
            let header = cache.spectrum_header(spectrum_id).ok_or(
                DataCorruptionError::MissingSpectrumHeader {
                    bb_id: self.id,
                    spectrum_id,
                },
            )?;
            let encoding = cache.data_encoding_by_spectrum_id(spectrum_id).ok_or(
                DataCorruptionError::MissingDataEncoding {
                    bb_id: self.id,
                    spectrum_id,
                },
            )?;
            let start = index.peaks_offsets[i];
            let end = start + index.peaks_counts[i] * encoding.peak_struct_size();
            let data = decode_spectrum_data(&bytes[start..end], encoding);
            slices.push(SpectrumSlice::new(header.clone(), data, self.run_slice_id));
        }
        trace!(
            "Decoded {} spectrum slices from bounding box {}",
            slices.len(),
            self.id
        );
        Ok(slices)
    }
}

/// Builds bounding box blobs, the inverse of [`BoundingBox::to_spectrum_slices`].
///
/// The framing byte order and the compression are taken from the encoding of the
/// box's first spectrum.
#[derive(Debug, Clone)]
pub struct BoundingBoxWriter {
    encoding: DataEncoding,
    buffer: Vec<u8>,
}

impl BoundingBoxWriter {
    pub fn new(first_spectrum_encoding: &DataEncoding) -> Self {
        Self {
            encoding: first_spectrum_encoding.clone(),
            buffer: Vec::new(),
        }
    }

    /// Append one spectrum slice to the blob
    pub fn add_spectrum_slice(
        &mut self,
        spectrum_id: i64,
        data: &SpectrumData,
        encoding: &DataEncoding,
    ) -> &mut Self {
        let byte_order = self.encoding.byte_order;
        byte_order.write_i32(spectrum_id as i32, &mut self.buffer);
        byte_order.write_i32(data.peaks_count() as i32, &mut self.buffer);
        encode_spectrum_data(data, encoding, &mut self.buffer);
        self
    }

    /// Produce the stored bytes, compressing them if the encoding asks for it
    pub fn finish(self) -> io::Result<Vec<u8>> {
        match self.encoding.compression {
            Compression::None => Ok(self.buffer),
            Compression::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&self.buffer)?;
                encoder.finish()
            }
            Compression::Other(name) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("Cannot write bounding boxes compressed with {name}"),
            )),
        }
    }
}

/// Encode a whole bounding box blob from `(spectrum id, peaks, encoding)` triples
pub fn encode_spectrum_slices<'a>(
    slices: impl IntoIterator<Item = (i64, &'a SpectrumData, &'a DataEncoding)>,
    first_encoding: &DataEncoding,
) -> io::Result<Vec<u8>> {
    let mut writer = BoundingBoxWriter::new(first_encoding);
    for (spectrum_id, data, encoding) in slices {
        writer.add_spectrum_slice(spectrum_id, data, encoding);
    }
    writer.finish()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::{RunSliceHeader, SpectrumHeader};

    fn encoding(id: i64, mode: DataMode, pe: PeakEncoding, compression: Compression, byte_order: ByteOrder) -> DataEncoding {
        DataEncoding::new(id, mode, pe, compression, byte_order)
    }

    fn cache_for(encodings: Vec<DataEncoding>, assignment: &[(i64, i64)]) -> EntityCache {
        let headers: Vec<SpectrumHeader> = assignment
            .iter()
            .map(|(spec_id, de_id)| SpectrumHeader::new(*spec_id, 1, 0.0, 1, 1).with_data_encoding_id(*de_id))
            .collect();
        EntityCache::from_headers(headers, encodings, [RunSliceHeader::new(1, 1, 1, 0.0, 2000.0, 1)])
    }

    fn data(mzs: &[f64], fitted: bool) -> SpectrumData {
        let intensities = mzs.iter().enumerate().map(|(i, _)| 100.0 + i as f32).collect();
        let hwhm = fitted.then(|| mzs.iter().map(|_| 0.25f32).collect::<Vec<_>>());
        SpectrumData::new(mzs.to_vec(), intensities, hwhm.clone(), hwhm)
    }

    fn write_box(entries: &[(i64, &SpectrumData)], cache: &EntityCache) -> Vec<u8> {
        let first = cache.data_encoding_by_spectrum_id(entries[0].0).unwrap();
        let mut writer = BoundingBoxWriter::new(first);
        for (spec_id, d) in entries {
            let de = cache.data_encoding_by_spectrum_id(*spec_id).unwrap();
            writer.add_spectrum_slice(*spec_id, d, de);
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_round_trip_all_encodings() {
        let modes = [DataMode::Profile, DataMode::Centroid, DataMode::Fitted];
        let widths = [PeakEncoding::LowRes, PeakEncoding::HighRes, PeakEncoding::NoLoss];
        let orders = [ByteOrder::LittleEndian, ByteOrder::BigEndian];
        let mzs = [400.5, 401.25, 402.0, 410.125];
        for mode in modes {
            for pe in widths {
                for bo in orders {
                    let de = encoding(1, mode, pe, Compression::None, bo);
                    let cache = cache_for(vec![de.clone()], &[(1, 1), (2, 1)]);
                    let a = data(&mzs, mode == DataMode::Fitted);
                    let b = data(&mzs[..2], mode == DataMode::Fitted);
                    let blob = write_box(&[(1, &a), (2, &b)], &cache);
                    assert_eq!(blob.len(), 2 * 8 + 6 * de.peak_struct_size());

                    let bb = BoundingBox::from_record(BoundingBoxRecord::new(7, blob, 1, 1, 2), &cache).unwrap();
                    let slices = bb.to_spectrum_slices(&cache).unwrap();
                    assert_eq!(slices.len(), 2);
                    assert_eq!(slices[0].spectrum_id(), 1);
                    assert_eq!(slices[0].run_slice_id, 1);
                    assert_eq!(slices[0].data(), &a);
                    assert_eq!(slices[1].data(), &b);
                }
            }
        }
    }

    #[test]
    fn test_zlib_round_trip() {
        let de = encoding(1, DataMode::Centroid, PeakEncoding::HighRes, Compression::Zlib, ByteOrder::LittleEndian);
        let cache = cache_for(vec![de.clone()], &[(1, 1)]);
        let a = data(&[100.0, 200.0, 300.0], false);
        let blob = encode_spectrum_slices([(1, &a, &de)], &de).unwrap();
        let bb = BoundingBox::from_record(BoundingBoxRecord::new(1, blob, 1, 1, 1), &cache).unwrap();
        let slices = bb.to_spectrum_slices(&cache).unwrap();
        assert_eq!(slices[0].data(), &a);
    }

    #[test]
    fn test_mixed_encodings_in_one_box() {
        let de1 = encoding(1, DataMode::Profile, PeakEncoding::HighRes, Compression::None, ByteOrder::LittleEndian);
        let de2 = encoding(2, DataMode::Fitted, PeakEncoding::LowRes, Compression::None, ByteOrder::LittleEndian);
        let cache = cache_for(vec![de1, de2], &[(1, 1), (2, 2)]);
        let a = data(&[100.0, 101.0], false);
        let b = data(&[100.5], true);
        let blob = write_box(&[(1, &a), (2, &b)], &cache);
        let bb = BoundingBox::from_record(BoundingBoxRecord::new(1, blob, 1, 1, 2), &cache).unwrap();

        let index = bb.index(&cache).unwrap();
        assert_eq!(index.spectrum_ids, vec![1, 2]);
        assert_eq!(index.peaks_counts, vec![2, 1]);
        assert_eq!(index.peaks_offsets, vec![8, 8 + 24 + 8]);
        assert_eq!(index.find(2), Some(1));

        let slices = bb.to_spectrum_slices(&cache).unwrap();
        assert!(slices[1].data().is_fitted());
        assert_eq!(slices[1].data().left_hwhm_list, Some(vec![0.25]));
    }

    #[test]
    fn test_duplicate_spectrum_id() {
        let de = encoding(1, DataMode::Centroid, PeakEncoding::HighRes, Compression::None, ByteOrder::LittleEndian);
        let cache = cache_for(vec![de], &[(1, 1), (2, 1)]);
        let a = data(&[100.0], false);
        let blob = write_box(&[(1, &a), (2, &a), (1, &a)], &cache);
        let bb = BoundingBox::from_record(BoundingBoxRecord::new(3, blob, 1, 1, 2), &cache).unwrap();
        let err = bb.to_spectrum_slices(&cache).unwrap_err();
        assert_eq!(
            err.as_data_corruption(),
            Some(&DataCorruptionError::DuplicateSpectrumId { bb_id: 3, spectrum_id: 1 })
        );

        let blob = write_box(&[(2, &a), (2, &a)], &cache);
        let bb = BoundingBox::from_record(BoundingBoxRecord::new(4, blob, 1, 2, 2), &cache).unwrap();
        assert!(bb.to_spectrum_slices(&cache).unwrap_err().is_data_corruption());
    }

    #[test]
    fn test_unordered_slices_are_sorted() {
        let de = encoding(1, DataMode::Centroid, PeakEncoding::HighRes, Compression::None, ByteOrder::LittleEndian);
        let cache = cache_for(vec![de], &[(1, 1), (2, 1), (3, 1)]);
        let a = data(&[100.0], false);
        let blob = write_box(&[(3, &a), (1, &a), (2, &a)], &cache);
        let bb = BoundingBox::from_record(BoundingBoxRecord::new(1, blob, 1, 1, 3), &cache).unwrap();
        let ids: Vec<i64> = bb.to_spectrum_slices(&cache).unwrap().iter().map(|s| s.spectrum_id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_truncated_and_out_of_range() {
        let de = encoding(1, DataMode::Centroid, PeakEncoding::HighRes, Compression::None, ByteOrder::LittleEndian);
        let cache = cache_for(vec![de], &[(1, 1), (2, 1)]);
        let a = data(&[100.0, 200.0], false);
        let mut blob = write_box(&[(1, &a)], &cache);
        blob.truncate(blob.len() - 3);
        let bb = BoundingBox::from_record(BoundingBoxRecord::new(1, blob, 1, 1, 1), &cache).unwrap();
        assert!(matches!(
            bb.to_spectrum_slices(&cache).unwrap_err().as_data_corruption(),
            Some(DataCorruptionError::Truncated { .. })
        ));

        let blob = write_box(&[(2, &a)], &cache);
        let bb = BoundingBox::from_record(BoundingBoxRecord::new(1, blob, 1, 1, 1), &cache).unwrap();
        assert!(matches!(
            bb.to_spectrum_slices(&cache).unwrap_err().as_data_corruption(),
            Some(DataCorruptionError::SpectrumOutOfRange { .. })
        ));
    }

    #[test]
    fn test_implausible_spectrum_range() {
        let de = encoding(1, DataMode::Centroid, PeakEncoding::HighRes, Compression::None, ByteOrder::LittleEndian);
        let cache = cache_for(vec![de], &[(1, 1)]);
        let a = data(&[100.0, 200.0], false);
        let blob = write_box(&[(1, &a)], &cache);

        let bb = BoundingBox::from_record(BoundingBoxRecord::new(1, blob.clone(), 1, 1, 1 << 42), &cache).unwrap();
        let slices = bb.to_spectrum_slices(&cache).unwrap();
        assert_eq!(slices.len(), 1);
        assert_eq!(bb.index(&cache).unwrap().spectrum_ids, vec![1]);

        let bb = BoundingBox::from_record(BoundingBoxRecord::new(2, blob.clone(), 1, 1, i64::MAX), &cache).unwrap();
        assert_eq!(bb.to_spectrum_slices(&cache).unwrap().len(), 1);

        let bb = BoundingBox::from_record(BoundingBoxRecord::new(3, blob, 1, 1, i64::MIN), &cache).unwrap();
        assert!(matches!(
            bb.to_spectrum_slices(&cache).unwrap_err().as_data_corruption(),
            Some(DataCorruptionError::SpectrumOutOfRange { bb_id: 3, .. })
        ));
    }

    #[test]
    fn test_unknown_compression() {
        let de = encoding(1, DataMode::Centroid, PeakEncoding::HighRes, Compression::Other("lz4".into()), ByteOrder::LittleEndian);
        let cache = cache_for(vec![de], &[(1, 1)]);
        let bb = BoundingBox::from_record(BoundingBoxRecord::new(1, vec![0; 8], 1, 1, 1), &cache).unwrap();
        assert!(bb.to_spectrum_slices(&cache).unwrap_err().is_configuration());
    }

    #[test]
    fn test_empty_blob() {
        let de = encoding(1, DataMode::Centroid, PeakEncoding::HighRes, Compression::None, ByteOrder::LittleEndian);
        let cache = cache_for(vec![de], &[(1, 1)]);
        let bb = BoundingBox::from_record(BoundingBoxRecord::new(1, Vec::new(), 1, 1, 1), &cache).unwrap();
        assert!(bb.to_spectrum_slices(&cache).unwrap().is_empty());
        // Decoding twice gives the same answer
        assert!(bb.to_spectrum_slices(&cache).unwrap().is_empty());
    }
}
