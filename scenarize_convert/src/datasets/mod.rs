// scenarize_convert/src/datasets/mod.rs

//! One adapter per supported dataset family. Each adapter turns the raw
//! on-disk layout into the core's `(Window, RecordingMeta)` stream; the
//! windowing and synthesis machinery never sees dataset specifics.

pub mod levelx;
pub mod tabular;

pub use levelx::LevelxSource;
pub use tabular::TabularSource;
