//! # campuscart-shared
//!
//! Types shared by the store and the server: status enums, the error
//! taxonomy, constants, great-circle distance and image URL resolution.

pub mod constants;
pub mod error;
pub mod geo;
pub mod images;
pub mod types;

pub use error::MarketError;
pub use geo::GeoPoint;
pub use images::ImageResolver;
pub use types::*;
