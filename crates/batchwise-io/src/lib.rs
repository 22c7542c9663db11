pub mod csv_io;
pub mod npy;
pub mod table;

pub use csv_io::{read_csv, write_csv};
pub use npy::{write_npy, DType, NpyFile, NpyHeader, NpyReader};
pub use table::Table;
