#![allow(dead_code)]

use ndarray::{Array2, Array3};

use tsphot_core::io::ser::SER_HEADER_SIZE;
use tsphot_core::stack::ImageStack;

/// Build a SER file header for mono frames.
///
/// Returns a `Vec<u8>` containing just the 178-byte header.
/// Append frame pixel data after calling this function.
pub fn build_ser_header(width: u32, height: u32, bit_depth: u32, num_frames: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);

    // Magic (14 bytes)
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID (4 bytes)
    buf.extend_from_slice(&0i32.to_le_bytes());
    // ColorID = MONO (4 bytes)
    buf.extend_from_slice(&0i32.to_le_bytes());
    // LittleEndian = 0 (little-endian per Siril convention)
    buf.extend_from_slice(&0i32.to_le_bytes());
    // Width
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    // Height
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    // PixelDepth
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    // FrameCount
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    // Observer (40 bytes)
    let mut observer = [0u8; 40];
    observer[..4].copy_from_slice(b"Test");
    buf.extend_from_slice(&observer);
    // Instrument (40 bytes)
    buf.extend_from_slice(&[0u8; 40]);
    // Telescope (40 bytes)
    let mut telescope = [0u8; 40];
    telescope[..7].copy_from_slice(b"MyScope");
    buf.extend_from_slice(&telescope);
    // DateTime (8 bytes)
    buf.extend_from_slice(&0u64.to_le_bytes());
    // DateTimeUTC (8 bytes)
    buf.extend_from_slice(&0u64.to_le_bytes());

    assert_eq!(buf.len(), SER_HEADER_SIZE);
    buf
}

/// Build a 16-bit mono SER file from frames of ADU values, optionally with a
/// timestamp trailer (100 ns ticks).
pub fn build_ser_u16(frames: &[Array2<u16>], timestamps: Option<&[u64]>) -> Vec<u8> {
    let (h, w) = frames[0].dim();
    let mut buf = build_ser_header(w as u32, h as u32, 16, frames.len());
    for frame in frames {
        for &v in frame.iter() {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
    if let Some(ts) = timestamps {
        for &t in ts {
            buf.extend_from_slice(&t.to_le_bytes());
        }
    }
    buf
}

/// Write a SER buffer to a temporary file and return the temp file handle.
///
/// The file stays alive as long as the returned `NamedTempFile` is not dropped.
pub fn write_test_ser(data: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut f = tempfile::NamedTempFile::new().expect("create temp file");
    f.write_all(data).expect("write SER data");
    f.flush().expect("flush");
    f
}

/// Gaussian point source on a flat sky.
pub fn gaussian_star(
    shape: (usize, usize),
    center: (f64, f64),
    sigma: f64,
    amplitude: f64,
    sky: f64,
) -> Array2<f64> {
    Array2::from_shape_fn(shape, |(r, c)| {
        let dr = r as f64 - center.0;
        let dc = c as f64 - center.1;
        sky + amplitude * (-(dr * dr + dc * dc) / (2.0 * sigma * sigma)).exp()
    })
}

/// Stack of `n` epochs of the same image, times 0, 1, 2, ... and cadences 100, 101, ...
pub fn constant_stack(image: &Array2<f64>, n: usize) -> ImageStack {
    let (h, w) = image.dim();
    let mut flux = Array3::<f64>::zeros((n, h, w));
    for mut slice in flux.outer_iter_mut() {
        slice.assign(image);
    }
    let times = (0..n).map(|i| i as f64).collect();
    let cadences = (0..n as i64).map(|i| 100 + i).collect();
    ImageStack::new(flux, times, cadences).expect("valid stack")
}

/// Stack whose star drifts by `step` pixels per epoch along both axes.
pub fn drifting_star_stack(
    shape: (usize, usize),
    start: (f64, f64),
    step: f64,
    n: usize,
) -> ImageStack {
    let (h, w) = shape;
    let mut flux = Array3::<f64>::zeros((n, h, w));
    for (i, mut slice) in flux.outer_iter_mut().enumerate() {
        let center = (start.0 + step * i as f64, start.1 + step * i as f64);
        slice.assign(&gaussian_star(shape, center, 1.2, 1000.0, 0.0));
    }
    let times = (0..n).map(|i| i as f64 * 0.02).collect();
    let cadences = (0..n as i64).collect();
    ImageStack::new(flux, times, cadences).expect("valid stack")
}
