use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mzdb::io::mzdb::{
    encode_spectrum_slices, BoundingBox, BoundingBoxRecord, EntityCache, MemoryBoundingBoxCursor,
    SpectrumIterator,
};
use mzdb::spectrum::{RunSliceHeader, SpectrumHeader};
use mzdb::{ByteOrder, Compression, DataEncoding, DataMode, PeakEncoding, SpectrumData};

const SPECTRA_PER_BOX: i64 = 8;
const PEAKS_PER_SLICE: usize = 500;

fn make_peaks(offset: f64) -> SpectrumData {
    let mzs: Vec<f64> = (0..PEAKS_PER_SLICE)
        .map(|i| offset + i as f64 * 0.1)
        .collect();
    let intensities = (0..PEAKS_PER_SLICE).map(|i| (i % 97) as f32).collect();
    SpectrumData::new(mzs, intensities, None, None)
}

fn make_cache(encoding: &DataEncoding, n_groups: i64) -> Arc<EntityCache> {
    let headers = (0..n_groups * SPECTRA_PER_BOX)
        .map(|i| {
            let id = i + 1;
            let lead = (i / SPECTRA_PER_BOX) * SPECTRA_PER_BOX + 1;
            SpectrumHeader::new(id, id, id as f32, 1, lead).with_data_encoding_id(encoding.id)
        })
        .collect();
    Arc::new(EntityCache::from_headers(
        headers,
        [encoding.clone()],
        [
            RunSliceHeader::new(1, 1, 1, 100.0, 200.0, 1),
            RunSliceHeader::new(2, 1, 2, 200.0, 300.0, 1),
        ],
    ))
}

fn make_records(encoding: &DataEncoding, n_groups: i64) -> Vec<BoundingBoxRecord> {
    let low = make_peaks(100.0);
    let high = make_peaks(200.0);
    let mut records = Vec::new();
    for group in 0..n_groups {
        let first = group * SPECTRA_PER_BOX + 1;
        let last = first + SPECTRA_PER_BOX - 1;
        for (rs, data) in [(1, &low), (2, &high)] {
            let blob =
                encode_spectrum_slices((first..=last).map(|id| (id, data, encoding)), encoding)
                    .unwrap();
            records.push(BoundingBoxRecord::new(
                records.len() as i64 + 1,
                blob,
                rs,
                first,
                last,
            ));
        }
    }
    records
}

fn decode_box(c: &mut Criterion) {
    for (label, compression) in [("raw", Compression::None), ("zlib", Compression::Zlib)] {
        let encoding = DataEncoding::new(
            1,
            DataMode::Centroid,
            PeakEncoding::HighRes,
            compression,
            ByteOrder::LittleEndian,
        );
        let cache = make_cache(&encoding, 1);
        let record = make_records(&encoding, 1).remove(0);
        let bb = BoundingBox::from_record(record, &cache).unwrap();
        c.bench_function(&format!("decode_box_{label}"), |b| {
            b.iter(|| black_box(bb.to_spectrum_slices(&cache).unwrap()))
        });
    }
}

fn merge_spectra(c: &mut Criterion) {
    let encoding = DataEncoding::new(
        1,
        DataMode::Centroid,
        PeakEncoding::HighRes,
        Compression::None,
        ByteOrder::LittleEndian,
    );
    let cache = make_cache(&encoding, 16);
    let records = make_records(&encoding, 16);
    c.bench_function("merge_spectra", |b| {
        b.iter(|| {
            let cursor = MemoryBoundingBoxCursor::new(records.iter().cloned());
            let n = SpectrumIterator::new(cache.clone(), cursor, Some(1))
                .unwrap()
                .map(|s| s.unwrap().peaks_count())
                .sum::<usize>();
            black_box(n)
        })
    });
}

criterion_group!(benches, decode_box, merge_spectra);
criterion_main!(benches);
