// Infrastructure implementations for Codescape.

pub mod concurrency;
pub mod dataset_loader;

pub use dataset_loader::FileDataset;
