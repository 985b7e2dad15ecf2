//! XML helpers shared by the manifest writers.

mod escape;

pub use escape::escape_xml;
