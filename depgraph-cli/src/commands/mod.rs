//! Command handlers

pub mod crawl;
