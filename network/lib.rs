#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
pub mod bits;
pub mod classify;
pub mod config;
pub mod error;
pub mod gene_list;
pub mod phenotype;
pub mod scan;
#[path = "../shared/files.rs"]
pub mod shared_files;
pub mod sink;
pub mod stats;
pub mod types;
pub mod shared {
    pub use super::shared_files as files;
}
