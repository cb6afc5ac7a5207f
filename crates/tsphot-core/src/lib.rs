pub mod aperture;
pub mod consts;
pub mod error;
pub mod frame;
pub mod io;
pub mod photometry;
pub mod stack;
