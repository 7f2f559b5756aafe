// src/lib.rs

//! Drives an external vulnerability-scanning engine through crawl, active
//! scan, and alert retrieval, and serves the triaged findings over HTTP.

pub mod api;
pub mod app;
pub mod core;
pub mod logging;
pub mod settings;
