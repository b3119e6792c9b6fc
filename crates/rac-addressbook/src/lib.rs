pub mod addressbook;

pub use addressbook::*;
