pub mod app;
pub mod config;
pub mod convert;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod http;
pub mod output;
pub mod progress;
pub mod rcsb;
pub mod runlog;
pub mod select;
pub mod sifts;
pub mod ttd;
pub mod uniprot;
