//! Stored image keys to fetchable URLs.
//!
//! Posts and offers persist only the opaque object key. Readers resolve the
//! key against the public media route at display time; values that are
//! already URLs pass through untouched so resolution is idempotent.

use crate::types::Bucket;

#[derive(Debug, Clone)]
pub struct ImageResolver {
    /// Public origin of the media route, without trailing slash
    /// (e.g. `https://cart.example.edu`).
    public_base: String,
}

impl ImageResolver {
    pub fn new(public_base: impl Into<String>) -> Self {
        let public_base = public_base.into().trim_end_matches('/').to_string();
        Self { public_base }
    }

    /// Public URL of `key` inside `bucket`.
    pub fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!("{}/media/{}/{}", self.public_base, bucket.as_str(), key)
    }

    /// Resolve an optional stored key. Empty keys resolve to `None`.
    pub fn resolve(&self, key: Option<&str>, bucket: Bucket) -> Option<String> {
        let key = key.map(str::trim).filter(|k| !k.is_empty())?;
        if self.is_resolved(key) {
            return Some(key.to_string());
        }
        Some(self.public_url(bucket, key))
    }

    fn is_resolved(&self, value: &str) -> bool {
        value.starts_with("http://")
            || value.starts_with("https://")
            || value.starts_with(&format!("{}/media/", self.public_base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ImageResolver {
        ImageResolver::new("https://cart.example.edu/")
    }

    #[test]
    fn empty_key_resolves_to_none() {
        assert_eq!(resolver().resolve(None, Bucket::PostImages), None);
        assert_eq!(resolver().resolve(Some(""), Bucket::PostImages), None);
        assert_eq!(resolver().resolve(Some("  "), Bucket::OfferImages), None);
    }

    #[test]
    fn key_is_bound_to_bucket() {
        let url = resolver().resolve(Some("abc.jpg"), Bucket::OfferImages);
        assert_eq!(
            url.as_deref(),
            Some("https://cart.example.edu/media/offer-images/abc.jpg")
        );
    }

    #[test]
    fn absolute_urls_pass_through() {
        let external = "http://cdn.example.com/pic.png";
        assert_eq!(
            resolver().resolve(Some(external), Bucket::PostImages).as_deref(),
            Some(external)
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let r = resolver();
        let once = r.resolve(Some("k.webp"), Bucket::PostImages);
        let twice = r.resolve(once.as_deref(), Bucket::PostImages);
        assert_eq!(once, twice);
    }

    #[test]
    fn idempotent_with_relative_base() {
        let r = ImageResolver::new("");
        let once = r.resolve(Some("k.webp"), Bucket::PostImages);
        assert_eq!(once.as_deref(), Some("/media/post-images/k.webp"));
        assert_eq!(r.resolve(once.as_deref(), Bucket::PostImages), once);
    }
}
