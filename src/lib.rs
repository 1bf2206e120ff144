pub mod blob;
pub mod cli;
pub mod config;
pub mod db;
pub mod encoder;
pub mod envelope;
pub mod facedb;
mod metrics;
pub mod server;
pub mod service;
pub mod utils;

pub use config::Opts;
pub use facedb::{FaceDB, StoreError};
