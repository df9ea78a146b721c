//! Integration tests for the crawl and media passes

mod crawl_tests;
mod media_tests;
