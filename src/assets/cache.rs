//! Per-render image cache fed by transport capture

use crate::assets::mime::{self, MIN_ASSET_BYTES};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// How an asset's bytes were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureTier {
    /// Captured from the renderer's own network traffic
    Transport,
    /// Fetched afterwards with the session's cookies
    Fallback,
}

/// An image payload ready to be embedded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAsset {
    pub mime: String,
    pub bytes: Vec<u8>,
    pub tier: CaptureTier,
}

impl CachedAsset {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>, tier: CaptureTier) -> Self {
        Self {
            mime: mime.into(),
            bytes,
            tier,
        }
    }

    /// Encodes the payload as a `data:` URI
    pub fn data_uri(&self) -> String {
        mime::data_uri(&self.mime, &self.bytes)
    }
}

/// Thread-safe cache of assets keyed by absolute URL
///
/// The renderer's response listener writes into it while a page loads and
/// the embedding pass reads from it afterwards; it is cleared before each
/// page render.
#[derive(Debug, Default)]
pub struct AssetCache {
    entries: Mutex<HashMap<String, Arc<CachedAsset>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<CachedAsset>>> {
        // A panicking writer cannot leave a half-inserted entry behind
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, url: &str) -> Option<Arc<CachedAsset>> {
        self.lock().get(url).cloned()
    }

    pub fn put(&self, url: impl Into<String>, asset: CachedAsset) -> Arc<CachedAsset> {
        let asset = Arc::new(asset);
        self.lock().insert(url.into(), Arc::clone(&asset));
        asset
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Offers a transport response to the cache
    ///
    /// The response is kept when it is an image, by declared type or by URL
    /// extension, and its body is larger than [`MIN_ASSET_BYTES`]. Returns
    /// true when the response was cached.
    pub fn observe(&self, url: &str, content_type: Option<&str>, body: &[u8]) -> bool {
        let declared_image = content_type.map(mime::is_image_mime).unwrap_or(false);
        if !declared_image && !mime::has_image_extension(url) {
            return false;
        }

        if body.len() <= MIN_ASSET_BYTES {
            return false;
        }

        let mime = mime::resolve_mime(url, content_type);
        self.put(
            url,
            CachedAsset::new(mime, body.to_vec(), CaptureTier::Transport),
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_body() -> Vec<u8> {
        vec![0x89; 256]
    }

    #[test]
    fn test_observe_caches_declared_image() {
        let cache = AssetCache::new();
        assert!(cache.observe(
            "https://img.example.com/avatar?id=1",
            Some("image/jpeg"),
            &png_body()
        ));

        let asset = cache.get("https://img.example.com/avatar?id=1").unwrap();
        assert_eq!(asset.mime, "image/jpeg");
        assert_eq!(asset.tier, CaptureTier::Transport);
    }

    #[test]
    fn test_observe_uses_extension_when_type_is_generic() {
        let cache = AssetCache::new();
        assert!(cache.observe(
            "https://img.example.com/pic.gif",
            Some("application/octet-stream"),
            &png_body()
        ));
        assert_eq!(
            cache.get("https://img.example.com/pic.gif").unwrap().mime,
            "image/gif"
        );
    }

    #[test]
    fn test_observe_skips_non_images_and_tiny_bodies() {
        let cache = AssetCache::new();
        assert!(!cache.observe(
            "https://forum.example.com/?t=1",
            Some("text/html"),
            &png_body()
        ));
        assert!(!cache.observe(
            "https://img.example.com/pixel.png",
            Some("image/png"),
            &[0u8; 100]
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = AssetCache::new();
        cache.put(
            "https://a.com/x.png",
            CachedAsset::new("image/png", png_body(), CaptureTier::Fallback),
        );
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.get("https://a.com/x.png").is_none());
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(AssetCache::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.observe(
                        &format!("https://a.com/{}.png", i),
                        Some("image/png"),
                        &[1u8; 200],
                    )
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.len(), 4);
    }
}
