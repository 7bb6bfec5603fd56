//! Descriptions of how a spectrum's peaks are laid out inside a bounding box blob.
//!
//! A [`DataEncoding`] is shared by many spectra, usually all the spectra of one MS level,
//! and is resolved per spectrum through [`DataEncodingsCache`].
use std::{collections::HashMap, fmt::Display, str::FromStr, sync::Arc};

use identity_hash::BuildIdentityHasher;

/// The signal continuity of the peaks stored for a spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataMode {
    #[default]
    Profile,
    Centroid,
    /// Centroids carrying a left and right half-width at half-maximum
    Fitted,
}

impl DataMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Centroid => "centroid",
            Self::Fitted => "fitted",
        }
    }
}

impl FromStr for DataMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "profile" => Ok(Self::Profile),
            "centroid" => Ok(Self::Centroid),
            "fitted" => Ok(Self::Fitted),
            _ => Err(format!("Unknown data mode {s}")),
        }
    }
}

impl Display for DataMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The width class of the (m/z, intensity) pair of a single peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeakEncoding {
    /// 32-bit m/z, 32-bit intensity
    LowRes,
    /// 64-bit m/z, 32-bit intensity
    #[default]
    HighRes,
    /// 64-bit m/z, 64-bit intensity
    NoLoss,
}

impl PeakEncoding {
    /// The number of bytes used by the m/z and intensity fields
    pub const fn size_of(&self) -> usize {
        match self {
            Self::LowRes => 8,
            Self::HighRes => 12,
            Self::NoLoss => 16,
        }
    }

    pub const fn mz_size(&self) -> usize {
        match self {
            Self::LowRes => 4,
            Self::HighRes | Self::NoLoss => 8,
        }
    }

    pub const fn intensity_size(&self) -> usize {
        match self {
            Self::LowRes | Self::HighRes => 4,
            Self::NoLoss => 8,
        }
    }

    /// Map the bit precisions stored in the `data_encoding` table onto a width class.
    ///
    /// A 32-bit m/z always implies [`PeakEncoding::LowRes`].
    pub const fn from_precisions(mz_precision: u32, intensity_precision: u32) -> Self {
        if mz_precision == 32 {
            Self::LowRes
        } else if intensity_precision == 32 {
            Self::HighRes
        } else {
            Self::NoLoss
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Compression {
    #[default]
    None,
    Zlib,
    /// A compression scheme this reader does not know how to undo
    Other(String),
}

impl FromStr for Compression {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let comp = match s.to_ascii_lowercase().as_str() {
            "" | "none" => Self::None,
            "zlib" => Self::Zlib,
            _ => Self::Other(s.to_string()),
        };
        Ok(comp)
    }
}

impl Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Zlib => f.write_str("zlib"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub fn read_i32(&self, bytes: [u8; 4]) -> i32 {
        match self {
            Self::LittleEndian => i32::from_le_bytes(bytes),
            Self::BigEndian => i32::from_be_bytes(bytes),
        }
    }

    pub fn read_f32(&self, bytes: [u8; 4]) -> f32 {
        match self {
            Self::LittleEndian => f32::from_le_bytes(bytes),
            Self::BigEndian => f32::from_be_bytes(bytes),
        }
    }

    pub fn read_f64(&self, bytes: [u8; 8]) -> f64 {
        match self {
            Self::LittleEndian => f64::from_le_bytes(bytes),
            Self::BigEndian => f64::from_be_bytes(bytes),
        }
    }

    pub fn write_i32(&self, value: i32, buffer: &mut Vec<u8>) {
        match self {
            Self::LittleEndian => buffer.extend_from_slice(&value.to_le_bytes()),
            Self::BigEndian => buffer.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn write_f32(&self, value: f32, buffer: &mut Vec<u8>) {
        match self {
            Self::LittleEndian => buffer.extend_from_slice(&value.to_le_bytes()),
            Self::BigEndian => buffer.extend_from_slice(&value.to_be_bytes()),
        }
    }

    pub fn write_f64(&self, value: f64, buffer: &mut Vec<u8>) {
        match self {
            Self::LittleEndian => buffer.extend_from_slice(&value.to_le_bytes()),
            Self::BigEndian => buffer.extend_from_slice(&value.to_be_bytes()),
        }
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "little_endian" => Ok(Self::LittleEndian),
            "big_endian" => Ok(Self::BigEndian),
            _ => Err(format!("Unknown byte order {s}")),
        }
    }
}

/// The binary layout of the peaks of a spectrum
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataEncoding {
    pub id: i64,
    pub mode: DataMode,
    pub peak_encoding: PeakEncoding,
    pub compression: Compression,
    pub byte_order: ByteOrder,
}

impl DataEncoding {
    pub fn new(
        id: i64,
        mode: DataMode,
        peak_encoding: PeakEncoding,
        compression: Compression,
        byte_order: ByteOrder,
    ) -> Self {
        Self {
            id,
            mode,
            peak_encoding,
            compression,
            byte_order,
        }
    }

    /// The number of bytes one peak occupies in a blob. Fitted peaks carry
    /// two extra 32-bit half-widths.
    pub const fn peak_struct_size(&self) -> usize {
        let size = self.peak_encoding.size_of();
        match self.mode {
            DataMode::Fitted => size + 8,
            DataMode::Profile | DataMode::Centroid => size,
        }
    }

    pub const fn is_fitted(&self) -> bool {
        matches!(self.mode, DataMode::Fitted)
    }
}

pub(crate) type IdMap<V> = HashMap<i64, V, BuildIdentityHasher<i64>>;

/// Resolves the [`DataEncoding`] of a spectrum from its id.
#[derive(Debug, Clone, Default)]
pub struct DataEncodingsCache {
    data_encoding_by_id: IdMap<Arc<DataEncoding>>,
    data_encoding_id_by_spectrum_id: IdMap<i64>,
}

impl DataEncodingsCache {
    pub fn new(
        data_encodings: impl IntoIterator<Item = DataEncoding>,
        spectrum_encoding_ids: impl IntoIterator<Item = (i64, i64)>,
    ) -> Self {
        let data_encoding_by_id = data_encodings
            .into_iter()
            .map(|de| (de.id, Arc::new(de)))
            .collect();
        let data_encoding_id_by_spectrum_id = spectrum_encoding_ids.into_iter().collect();
        Self {
            data_encoding_by_id,
            data_encoding_id_by_spectrum_id,
        }
    }

    pub fn get_by_id(&self, data_encoding_id: i64) -> Option<&Arc<DataEncoding>> {
        self.data_encoding_by_id.get(&data_encoding_id)
    }

    pub fn get_by_spectrum_id(&self, spectrum_id: i64) -> Option<&Arc<DataEncoding>> {
        self.data_encoding_id_by_spectrum_id
            .get(&spectrum_id)
            .and_then(|de_id| self.data_encoding_by_id.get(de_id))
    }

    pub fn len(&self) -> usize {
        self.data_encoding_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_encoding_by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DataEncoding>> {
        self.data_encoding_by_id.values()
    }
}
