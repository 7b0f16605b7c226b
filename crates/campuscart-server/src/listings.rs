//! Listing query/filter engine.
//!
//! Browsing runs in two stages: the store returns active posts (minus the
//! viewer's own, optionally one category) newest first, then proximity
//! mode keeps located posts inside the radius and re-sorts by distance.

use std::cmp::Ordering;

use campuscart_shared::constants::UNKNOWN_USERNAME;
use campuscart_shared::error::Result;
use campuscart_shared::{Bucket, Category, GeoPoint, ImageResolver, MarketError};
use campuscart_store::{NewPost, Post, PostFilter};
use serde::Serialize;
use uuid::Uuid;

use crate::SharedDb;

/// A post as shown to a viewer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListingView {
    #[serde(flatten)]
    pub post: Post,
    pub owner_username: String,
    /// Public URL of `post.image_url`, if any.
    pub image_public_url: Option<String>,
    /// Miles from the viewer. Only set in proximity mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ListingQuery {
    pub viewer: Uuid,
    pub category: Option<Category>,
    /// Viewer location. Setting it turns on proximity mode.
    pub near: Option<GeoPoint>,
    /// Overrides the configured radius in proximity mode.
    pub radius_miles: Option<f64>,
}

#[derive(Clone)]
pub struct ListingService {
    db: SharedDb,
    images: ImageResolver,
    radius_miles: f64,
}

impl ListingService {
    pub fn new(db: SharedDb, images: ImageResolver, radius_miles: f64) -> Self {
        Self {
            db,
            images,
            radius_miles,
        }
    }

    pub async fn query(&self, query: &ListingQuery) -> Result<Vec<ListingView>> {
        let rows = {
            let db = self.db.lock().await;
            db.list_posts(&PostFilter {
                exclude_owner: Some(query.viewer),
                category: query.category,
            })?
        };

        let listings: Vec<ListingView> = rows
            .into_iter()
            .map(|row| {
                self.view(
                    row.post,
                    row.owner_username
                        .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
                )
            })
            .collect();

        let Some(origin) = query.near else {
            return Ok(listings);
        };
        origin.validate()?;

        let radius = query.radius_miles.unwrap_or(self.radius_miles);
        if !radius.is_finite() || radius <= 0.0 {
            return Err(MarketError::validation("radius must be a positive number"));
        }

        let nearby = within_radius(listings, &origin, radius);
        tracing::debug!(
            viewer = %query.viewer,
            radius_miles = radius,
            results = nearby.len(),
            "proximity listing query"
        );
        Ok(nearby)
    }

    pub async fn create_post(&self, owner: Uuid, new_post: &NewPost) -> Result<ListingView> {
        let db = self.db.lock().await;
        let post = db.create_post(owner, new_post)?;
        let username = db.username_or_unknown(owner)?;
        tracing::info!(post_id = %post.post_id, owner = %owner, category = %post.category, "post created");
        Ok(self.view(post, username))
    }

    pub async fn delete_post(&self, post_id: Uuid, acting_user: Uuid) -> Result<()> {
        self.db.lock().await.delete_post(post_id, acting_user)?;
        tracing::info!(post_id = %post_id, owner = %acting_user, "post deleted");
        Ok(())
    }

    pub async fn post_detail(&self, post_id: Uuid) -> Result<ListingView> {
        let db = self.db.lock().await;
        let post = db.get_post(post_id)?;
        let username = db.username_or_unknown(post.user_id)?;
        Ok(self.view(post, username))
    }

    /// The owner's own posts, every status, newest first.
    pub async fn my_posts(&self, owner: Uuid) -> Result<Vec<ListingView>> {
        let db = self.db.lock().await;
        let username = db.username_or_unknown(owner)?;
        let posts = db.list_posts_by_owner(owner)?;
        Ok(posts
            .into_iter()
            .map(|post| self.view(post, username.clone()))
            .collect())
    }

    fn view(&self, post: Post, owner_username: String) -> ListingView {
        let image_public_url = self
            .images
            .resolve(post.image_url.as_deref(), Bucket::PostImages);
        ListingView {
            post,
            owner_username,
            image_public_url,
            distance_miles: None,
        }
    }
}

/// Keep located listings within `radius` miles of `origin`, nearest first.
pub fn within_radius(listings: Vec<ListingView>, origin: &GeoPoint, radius: f64) -> Vec<ListingView> {
    let mut nearby: Vec<ListingView> = listings
        .into_iter()
        .filter_map(|mut listing| {
            let distance = listing.post.location?.distance_miles(origin);
            (distance <= radius).then(|| {
                listing.distance_miles = Some(distance);
                listing
            })
        })
        .collect();

    nearby.sort_by(|a, b| {
        a.distance_miles
            .partial_cmp(&b.distance_miles)
            .unwrap_or(Ordering::Equal)
    });
    nearby
}
