pub mod calibration;
pub mod diagnostics;
pub mod ingest;
pub mod resolution;
pub mod selection;
pub mod serialization;
pub mod spectrum;
pub mod store;
pub mod weights;
