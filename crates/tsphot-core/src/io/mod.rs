pub mod csv_writer;
pub mod image_io;
pub mod ser;
