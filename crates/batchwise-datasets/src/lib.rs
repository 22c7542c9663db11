pub mod builtin;

pub use builtin::{make_blobs, make_sequences};
