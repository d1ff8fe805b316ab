// Adapters layer: concrete implementations of the domain ports
// (filesystem storage, dataset sources).

pub mod dataset;
pub mod storage;

pub use dataset::{resolve_dataset, LocalCsvDataset, ReferenceDataset, REFERENCE_DATASET_URL};
pub use storage::LocalStorage;
