pub mod document;

pub use document::{extract, DocumentHandle};
