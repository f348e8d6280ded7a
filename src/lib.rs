// Library interface for pi1541_browser
// The binary and the integration tests both build on these modules

pub mod app_state;
pub mod cache;
pub mod config;
pub mod csdb;
pub mod error;
pub mod favourites;
pub mod http_client;
pub mod models;
pub mod notify;
pub mod pages;
pub mod petscii;
pub mod remote;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod tree;
