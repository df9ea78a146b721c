//! Crawler module for walking forum sections
//!
//! This module contains the core crawling logic, including:
//! - Listing discovery through "next page" links
//! - Thread pagination discovery
//! - Overall crawl coordination and resumption

mod coordinator;
mod parser;

pub use coordinator::{run_crawl, Coordinator};
pub use parser::{discover_thread_pages, parse_listing, ListingPage, ThreadPage};
