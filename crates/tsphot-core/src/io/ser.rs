//! SER video cubes as a photometry source.
//!
//! Frames are decoded to raw ADU as `f64`. Epoch times come from the optional
//! timestamp trailer (100 ns ticks since 0001-01-01 UTC) as Julian dates;
//! the cadence number is the frame index.

use std::fs::File;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::{Array2, Array3, ArrayViewMut2, Axis};
use tracing::{info, warn};

use crate::consts::SER_TICKS_PER_DAY;
use crate::error::{PhotometryError, Result};
use crate::stack::{ImageStack, TimeRange};

pub const SER_HEADER_SIZE: usize = 178;
const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

/// Julian date of 0001-01-01 00:00 UTC, the SER timestamp origin.
const SER_EPOCH_JD: f64 = 1_721_425.5;

/// SER file header (178 bytes).
#[derive(Clone, Debug)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
    pub observer: String,
    pub instrument: String,
    pub telescope: String,
    pub date_time: u64,
    pub date_time_utc: u64,
}

impl SerHeader {
    /// Bytes per pixel plane (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_pixel_plane(&self) -> usize {
        if self.pixel_depth <= 8 { 1 } else { 2 }
    }

    /// Number of planes per pixel (1 for mono/bayer, 3 for RGB/BGR).
    pub fn planes_per_pixel(&self) -> usize {
        match self.color_id {
            100 | 101 => 3,
            _ => 1,
        }
    }

    /// Total bytes per frame.
    pub fn frame_byte_size(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(self.bytes_per_pixel_plane() * self.planes_per_pixel())
    }

    /// Header plus pixel data size in bytes, `None` if it overflows `usize`.
    pub fn data_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_pixel_plane() * self.planes_per_pixel())?
            .checked_mul(self.frame_count as usize)?
            .checked_add(SER_HEADER_SIZE)
    }

    /// Capture start as a Julian date, preferring the UTC header field.
    /// `None` when the recorder left both fields zero.
    pub fn start_julian_date(&self) -> Option<f64> {
        [self.date_time_utc, self.date_time]
            .into_iter()
            .find(|&ticks| ticks > 0)
            .map(ticks_to_julian_date)
    }

    pub fn color_name(&self) -> &'static str {
        match self.color_id {
            0 => "Mono",
            8 => "Bayer RGGB",
            9 => "Bayer GRBG",
            10 => "Bayer GBRG",
            11 => "Bayer BGGR",
            100 => "RGB",
            101 => "BGR",
            _ => "Unknown",
        }
    }
}

/// Summary of a SER source for display.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub filename: PathBuf,
    pub total_frames: usize,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
    pub color: &'static str,
    pub has_timestamps: bool,
    /// Capture start from the header, as a Julian date.
    pub start_time: Option<f64>,
    pub observer: Option<String>,
    pub telescope: Option<String>,
    pub instrument: Option<String>,
}

/// Memory-mapped SER file reader.
pub struct SerReader {
    mmap: Mmap,
    pub header: SerHeader,
}

impl SerReader {
    /// Open a SER file and parse its header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and lives as long as the reader.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SER_HEADER_SIZE {
            return Err(PhotometryError::InvalidSer(
                "File too small for SER header".into(),
            ));
        }

        if &mmap[0..14] != SER_MAGIC {
            return Err(PhotometryError::InvalidSer(
                "Missing LUCAM-RECORDER magic".into(),
            ));
        }

        let header = parse_header(&mmap[..SER_HEADER_SIZE])?;

        let expected_data_size = header.data_size().ok_or_else(|| {
            PhotometryError::InvalidSer(format!(
                "Frame data size overflows: {}x{} x {} frames",
                header.width, header.height, header.frame_count
            ))
        })?;
        if mmap.len() < expected_data_size {
            return Err(PhotometryError::InvalidSer(format!(
                "File truncated: expected at least {} bytes, got {}",
                expected_data_size,
                mmap.len()
            )));
        }

        Ok(Self { mmap, header })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Get the raw bytes for a single frame (zero-copy from mmap).
    pub fn frame_raw(&self, index: usize) -> Result<&[u8]> {
        let total = self.frame_count();
        if index >= total {
            return Err(PhotometryError::IndexOutOfBounds {
                index: index as isize,
                total,
            });
        }
        let offset = SER_HEADER_SIZE + index * self.header.frame_byte_size();
        let end = offset + self.header.frame_byte_size();
        Ok(&self.mmap[offset..end])
    }

    /// Read a single frame as raw ADU.
    pub fn read_frame(&self, index: usize) -> Result<Array2<f64>> {
        let h = self.header.height as usize;
        let w = self.header.width as usize;
        let mut data = Array2::<f64>::zeros((h, w));
        self.decode_into(index, data.view_mut())?;
        Ok(data)
    }

    /// Decode one frame into `out`. Interleaved color keeps only the green plane.
    fn decode_into(&self, index: usize, mut out: ArrayViewMut2<'_, f64>) -> Result<()> {
        let raw = self.frame_raw(index)?;
        let bpp = self.header.bytes_per_pixel_plane();
        let planes = self.header.planes_per_pixel();
        let plane_index = if planes == 1 { 0 } else { 1 };
        let little_endian = self.header.little_endian;
        let w = self.header.width as usize;

        for ((row, col), dst) in out.indexed_iter_mut() {
            let idx = ((row * w + col) * planes + plane_index) * bpp;
            *dst = if bpp == 1 {
                raw[idx] as f64
            } else {
                let pair = [raw[idx], raw[idx + 1]];
                if little_endian {
                    u16::from_le_bytes(pair) as f64
                } else {
                    u16::from_be_bytes(pair) as f64
                }
            };
        }
        Ok(())
    }

    /// Per-frame timestamp from the optional trailer, in 100 ns ticks.
    pub fn timestamp(&self, index: usize) -> Option<u64> {
        if index >= self.frame_count() {
            return None;
        }
        let ts_offset = self.header.data_size()? + index * 8;
        if ts_offset + 8 <= self.mmap.len() {
            let bytes = &self.mmap[ts_offset..ts_offset + 8];
            Some(u64::from_le_bytes(bytes.try_into().ok()?))
        } else {
            None
        }
    }

    /// Epoch times as Julian dates, or `None` if any timestamp is missing.
    pub fn julian_dates(&self) -> Option<Vec<f64>> {
        (0..self.frame_count())
            .map(|i| self.timestamp(i).map(ticks_to_julian_date))
            .collect()
    }

    pub fn source_info(&self, path: &Path) -> SourceInfo {
        SourceInfo {
            filename: path.to_path_buf(),
            total_frames: self.frame_count(),
            width: self.header.width,
            height: self.header.height,
            bit_depth: self.header.pixel_depth,
            color: self.header.color_name(),
            has_timestamps: self.frame_count() > 0 && self.timestamp(self.frame_count() - 1).is_some(),
            start_time: self.header.start_julian_date(),
            observer: non_empty(&self.header.observer),
            telescope: non_empty(&self.header.telescope),
            instrument: non_empty(&self.header.instrument),
        }
    }

    /// Decode every frame into an [`ImageStack`].
    ///
    /// Without a timestamp trailer the frame index doubles as the epoch time.
    pub fn to_stack(&self) -> Result<ImageStack> {
        let n = self.frame_count();
        let h = self.header.height as usize;
        let w = self.header.width as usize;

        let mut flux = Array3::<f64>::zeros((n, h, w));
        for (i, slice) in flux.axis_iter_mut(Axis(0)).enumerate() {
            self.decode_into(i, slice)?;
        }

        let times = self.julian_dates().unwrap_or_else(|| {
            warn!("SER file has no timestamp trailer, using frame index as time");
            (0..n).map(|i| i as f64).collect()
        });
        let cadences = (0..n as i64).collect();
        ImageStack::new(flux, times, cadences)
    }
}

/// Load a SER file as an [`ImageStack`], optionally keeping only a time window.
pub fn load_stack(path: &Path, time_range: Option<TimeRange>) -> Result<ImageStack> {
    let reader = SerReader::open(path)?;
    info!(
        path = %path.display(),
        frames = reader.frame_count(),
        width = reader.header.width,
        height = reader.header.height,
        "Loading SER cube"
    );
    let stack = reader.to_stack()?;
    match time_range {
        Some(range) => stack.restrict_time_range(range),
        None => Ok(stack),
    }
}

pub fn ticks_to_julian_date(ticks: u64) -> f64 {
    SER_EPOCH_JD + ticks as f64 / SER_TICKS_PER_DAY
}

fn parse_header(buf: &[u8]) -> Result<SerHeader> {
    let mut cursor = std::io::Cursor::new(&buf[14..]); // skip magic

    let _lu_id = cursor.read_i32::<LittleEndian>()?;
    let color_id = cursor.read_i32::<LittleEndian>()?;
    let le_flag = cursor.read_i32::<LittleEndian>()?;
    let width = non_negative("width", cursor.read_i32::<LittleEndian>()?)?;
    let height = non_negative("height", cursor.read_i32::<LittleEndian>()?)?;
    let pixel_depth = non_negative("pixel depth", cursor.read_i32::<LittleEndian>()?)?;
    let frame_count = non_negative("frame count", cursor.read_i32::<LittleEndian>()?)?;

    let observer = read_fixed_string(&buf[42..82]);
    let instrument = read_fixed_string(&buf[82..122]);
    let telescope = read_fixed_string(&buf[122..162]);

    let mut cursor = std::io::Cursor::new(&buf[162..]);
    let date_time = cursor.read_u64::<LittleEndian>()?;
    let date_time_utc = cursor.read_u64::<LittleEndian>()?;

    if width == 0 || height == 0 {
        return Err(PhotometryError::InvalidDimensions { width, height });
    }

    // Siril convention: only an explicit 1 means big-endian pixel data.
    let little_endian = le_flag != 1;

    Ok(SerHeader {
        color_id,
        little_endian,
        width,
        height,
        pixel_depth,
        frame_count,
        observer,
        instrument,
        telescope,
        date_time,
        date_time_utc,
    })
}

fn non_negative(field: &str, value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| PhotometryError::InvalidSer(format!("Negative {field} in header: {value}")))
}

fn read_fixed_string(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}
