//! Asset resolution pipeline
//!
//! Images referenced by a rendered page are made self-contained in two
//! tiers: responses captured by the renderer while the page loaded, then an
//! authenticated fetch for whatever the renderer missed.

mod cache;
mod embed;
mod fetch;
pub mod mime;

pub use cache::{AssetCache, CachedAsset, CaptureTier};
pub use embed::{css_urls, pick_image_source, AssetPipeline, EmbedError, EmbedStats};
pub use fetch::{AssetFetcher, FetchError, HttpAssetFetcher, Resolution};
