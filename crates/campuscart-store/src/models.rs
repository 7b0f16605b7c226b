//! Domain records persisted in the marketplace database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer; the `New*` inputs derive `Deserialize` for request bodies.

use campuscart_shared::{
    Category, GeoPoint, Party, PostStatus, RequestStatus, TradeType,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Public display data for an authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A listing offered for barter or sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub post_id: Uuid,
    /// Owner of the listing.
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: Category,
    /// Asking price in minor currency units. `None` means barter only.
    pub price_cents: Option<i64>,
    /// Poster's device location at creation time. Never updated.
    pub location: Option<GeoPoint>,
    /// Object key inside the `post-images` bucket.
    pub image_url: Option<String>,
    pub status: PostStatus,
    pub deadline: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the poster when creating a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPost {
    pub name: String,
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub deadline: NaiveDate,
}

impl NewPost {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Validation("post name is required".into()));
        }
        if self.description.trim().is_empty() {
            return Err(StoreError::Validation("post description is required".into()));
        }
        if matches!(self.price_cents, Some(p) if p < 0) {
            return Err(StoreError::Validation("price cannot be negative".into()));
        }
        if let Some(location) = &self.location {
            location
                .validate()
                .map_err(|e| StoreError::Validation(e.to_string()))?;
        }
        Ok(())
    }
}

/// A post joined with its owner's username.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostWithOwner {
    #[serde(flatten)]
    pub post: Post,
    pub owner_username: Option<String>,
}

/// Criteria for [`Database::list_posts`](crate::Database::list_posts).
/// Only active posts are ever listed.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Hide posts owned by this user (the viewer).
    pub exclude_owner: Option<Uuid>,
    pub category: Option<Category>,
}

// ---------------------------------------------------------------------------
// TradeRequest
// ---------------------------------------------------------------------------

/// A barter offer or purchase request against one post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeRequest {
    pub id: Uuid,
    pub post_id: Uuid,
    /// Requester.
    pub from_user_id: Uuid,
    /// Recipient, always the post owner.
    pub to_user_id: Uuid,
    pub offer_name: String,
    pub offer_description: String,
    /// Object key inside the `offer-images` bucket.
    pub offer_image: Option<String>,
    pub status: RequestStatus,
    pub trade_type: TradeType,
    /// Requester attests the trade happened.
    pub requester_status: bool,
    /// Poster attests the trade happened.
    pub poster_status: bool,
    pub created_at: DateTime<Utc>,
}

impl TradeRequest {
    /// Which side `user` is on, if any.
    pub fn party_of(&self, user: Uuid) -> Option<Party> {
        if user == self.from_user_id {
            Some(Party::Requester)
        } else if user == self.to_user_id {
            Some(Party::Poster)
        } else {
            None
        }
    }

    /// The other party from `user`'s point of view.
    pub fn counterpart_of(&self, user: Uuid) -> Option<Uuid> {
        match self.party_of(user)? {
            Party::Requester => Some(self.to_user_id),
            Party::Poster => Some(self.from_user_id),
        }
    }

    pub fn is_confirmed_by(&self, party: Party) -> bool {
        match party {
            Party::Requester => self.requester_status,
            Party::Poster => self.poster_status,
        }
    }
}

/// Insert payload for [`Database::create_request`](crate::Database::create_request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub post_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub offer_name: String,
    pub offer_description: String,
    pub offer_image: Option<String>,
    pub trade_type: TradeType,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A chat line inside one trade's conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    /// The request this conversation belongs to.
    pub barter_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
