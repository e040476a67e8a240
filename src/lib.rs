pub mod cache;
pub mod config;
pub mod domain;
pub mod downloader;
pub mod error;
pub mod ftp;
pub mod output;
pub mod parser;
pub mod pride;
pub mod progress;
pub mod retry;
pub mod stream;
pub mod transport;
