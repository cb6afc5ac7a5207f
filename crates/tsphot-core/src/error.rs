use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotometryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Degenerate aperture: no valid weighted flux")]
    DegenerateAperture,

    #[error("Epoch index {index} out of range (total: {total})")]
    IndexOutOfBounds { index: isize, total: usize },

    #[error("Empty epoch sequence")]
    EmptySequence,

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PhotometryError>;
