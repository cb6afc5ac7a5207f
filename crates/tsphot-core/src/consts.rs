/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum epoch count to use epoch-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Default aperture radius in pixels.
pub const DEFAULT_APERTURE_RADIUS: f64 = 3.0;

/// Default number of centroid recentering passes.
pub const DEFAULT_RECENTER_ITERATIONS: usize = 2;

/// Pixels whose aperture coverage is below this are treated as outside the
/// aperture when estimating the sky background.
pub const BACKGROUND_WEIGHT_CUTOFF: f64 = 1e-6;

/// Number of 100 ns ticks per day, the unit of SER trailer timestamps.
pub const SER_TICKS_PER_DAY: f64 = 864_000_000_000.0;
