/// Application name
pub const APP_NAME: &str = "CampusCart";

/// Mean Earth radius in miles, used by the haversine formula
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Default radius for the "nearby" listing filter, in miles
pub const DEFAULT_NEARBY_RADIUS_MILES: f64 = 5.0;

/// Storage bucket holding listing photos
pub const POST_IMAGES_BUCKET: &str = "post-images";

/// Storage bucket holding photos attached to offers
pub const OFFER_IMAGES_BUCKET: &str = "offer-images";

/// Maximum image upload size in bytes (10 MiB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Display name used when a profile lookup misses
pub const UNKNOWN_USERNAME: &str = "Unknown User";

/// Offer name used for purchase requests sent without one
pub const DEFAULT_BUY_OFFER_NAME: &str = "Buy";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default currency for checkout sessions (ISO 4217, lowercase)
pub const DEFAULT_CURRENCY: &str = "usd";
