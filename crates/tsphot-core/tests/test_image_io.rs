mod common;

use ndarray::{array, Array2};

use tsphot_core::aperture::{ApertureSpec, PixelCoord};
use tsphot_core::frame::{Frame, Scale};
use tsphot_core::io::image_io::{save_frame_png, stretch_to_u8};

use common::gaussian_star;

#[test]
fn test_stretch_to_u8_spans_full_range() {
    let data = array![[0.0, 5.0], [10.0, f64::NAN]];
    let out = stretch_to_u8(&data);
    assert_eq!(out, array![[0u8, 128], [255, 0]]);
}

#[test]
fn test_stretch_to_u8_flat_image() {
    let data = Array2::<f64>::from_elem((3, 3), 7.0);
    assert!(stretch_to_u8(&data).iter().all(|&v| v == 0));
}

#[test]
fn test_save_frame_png_marks_aperture_and_references() {
    let image = gaussian_star((20, 30), (10.0, 12.0), 1.5, 1000.0, 10.0);
    let spec = ApertureSpec::new(PixelCoord::new(10.0, 12.0), 4.0).unwrap();
    let frame = Frame::with_aperture(image, &spec)
        .unwrap()
        .with_reference_points(vec![PixelCoord::new(2.2, 25.8), PixelCoord::new(-3.0, 4.0)]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    save_frame_png(&frame, Scale::Log, &path).unwrap();

    let png = image::open(&path).unwrap().to_rgb8();
    assert_eq!(png.dimensions(), (30, 20));
    // Boundary pixel of the aperture.
    assert_eq!(png.get_pixel(16, 10).0, [0, 255, 0]);
    // Reference point, rounded to the nearest pixel.
    assert_eq!(png.get_pixel(26, 2).0, [255, 165, 0]);
    // Interior pixels stay gray.
    let center = png.get_pixel(12, 10).0;
    assert_eq!(center[0], center[1]);
    assert_eq!(center[1], center[2]);
}

#[test]
fn test_save_frame_png_bad_path() {
    let frame = Frame::with_aperture(
        Array2::ones((4, 4)),
        &ApertureSpec::new(PixelCoord::new(2.0, 2.0), 1.0).unwrap(),
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("frame.png");
    assert!(save_frame_png(&frame, Scale::Linear, &path).is_err());
}
