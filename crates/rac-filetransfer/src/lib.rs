pub mod filetransfer;

pub use filetransfer::*;
