pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod file_list;
pub mod output;
pub mod search;
pub mod unpack;
