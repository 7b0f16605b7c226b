//! Request lifecycle: the barter/buy state machine.
//!
//! ```text
//! pending ──accept──▶ accepted ──(both parties confirm)──▶ completed
//!    │
//!    ├──reject──▶ rejected
//!    └──cancel──▶ (row deleted)
//! ```
//!
//! Each operation takes the acting user explicitly, checks that user's role
//! on the request and then delegates to one store call, so every transition
//! is a single conditional write or a single transaction.

use campuscart_shared::constants::DEFAULT_BUY_OFFER_NAME;
use campuscart_shared::error::Result;
use campuscart_shared::{
    Bucket, Direction, ImageResolver, MarketError, Party, RequestStatus, TradeType,
};
use campuscart_store::{Database, NewRequest, Post, TradeRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SharedDb;

/// Body of a new barter offer or purchase request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest {
    pub post_id: Uuid,
    #[serde(default)]
    pub offer_name: String,
    #[serde(default)]
    pub offer_description: String,
    /// Object key inside the `offer-images` bucket.
    #[serde(default)]
    pub offer_image: Option<String>,
    #[serde(default)]
    pub trade_type: TradeType,
}

/// A request enriched for display to one of its parties.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: TradeRequest,
    /// Username of the other party.
    pub counterpart_username: String,
    pub post: Post,
    pub post_image_url: Option<String>,
    pub offer_image_url: Option<String>,
}

#[derive(Clone)]
pub struct RequestLifecycle {
    db: SharedDb,
    images: ImageResolver,
}

impl RequestLifecycle {
    pub fn new(db: SharedDb, images: ImageResolver) -> Self {
        Self { db, images }
    }

    /// Send an offer on a post. The recipient is always the post owner.
    pub async fn create_request(&self, acting_user: Uuid, input: CreateRequest) -> Result<RequestView> {
        let db = self.db.lock().await;
        let post = db.get_post(input.post_id)?;

        let mut offer_name = input.offer_name.trim().to_string();
        if input.trade_type == TradeType::Buy {
            if post.price_cents.is_none() {
                return Err(MarketError::validation("this post is not for sale"));
            }
            if offer_name.is_empty() {
                offer_name = DEFAULT_BUY_OFFER_NAME.to_string();
            }
        }

        let request = db.create_request(&NewRequest {
            post_id: post.post_id,
            from_user_id: acting_user,
            to_user_id: post.user_id,
            offer_name,
            offer_description: input.offer_description,
            offer_image: input.offer_image,
            trade_type: input.trade_type,
        })?;

        tracing::info!(
            request_id = %request.id,
            post_id = %post.post_id,
            from = %acting_user,
            trade_type = %request.trade_type,
            "request sent"
        );
        self.enrich(&db, acting_user, request)
    }

    /// Recipient accepts a pending request; the post is closed with it.
    pub async fn accept(&self, acting_user: Uuid, request_id: Uuid) -> Result<RequestView> {
        let db = self.db.lock().await;
        let current = db.get_request(request_id)?;
        ensure_recipient(&current, acting_user, "accept")?;

        let accepted = db.accept_request(request_id)?;
        tracing::info!(request_id = %request_id, post_id = %accepted.post_id, "request accepted");
        self.enrich(&db, acting_user, accepted)
    }

    /// Recipient declines a pending request. The post stays active.
    pub async fn reject(&self, acting_user: Uuid, request_id: Uuid) -> Result<RequestView> {
        let db = self.db.lock().await;
        let current = db.get_request(request_id)?;
        ensure_recipient(&current, acting_user, "reject")?;

        let rejected = db.update_request_status(request_id, RequestStatus::Rejected)?;
        tracing::info!(request_id = %request_id, "request rejected");
        self.enrich(&db, acting_user, rejected)
    }

    /// Requester withdraws a pending request. The row is removed.
    pub async fn cancel(&self, acting_user: Uuid, request_id: Uuid) -> Result<()> {
        self.db.lock().await.delete_request(request_id, acting_user)?;
        tracing::info!(request_id = %request_id, "request cancelled");
        Ok(())
    }

    /// Record the caller's side of the completion handshake.
    pub async fn confirm_completion(&self, acting_user: Uuid, request_id: Uuid) -> Result<RequestView> {
        let db = self.db.lock().await;
        let current = db.get_request(request_id)?;
        let party = current.party_of(acting_user).ok_or(MarketError::Role {
            user: acting_user,
            request: request_id,
        })?;

        let updated = db.confirm_completion(request_id, party)?;
        if updated.status == RequestStatus::Completed && current.status != RequestStatus::Completed {
            tracing::info!(request_id = %request_id, "trade completed");
        }
        self.enrich(&db, acting_user, updated)
    }

    /// Pending requests addressed to or sent by `acting_user`.
    pub async fn fetch_requests(&self, acting_user: Uuid, direction: Direction) -> Result<Vec<RequestView>> {
        let db = self.db.lock().await;
        db.list_requests(acting_user, direction)?
            .into_iter()
            .map(|request| self.enrich(&db, acting_user, request))
            .collect()
    }

    /// Requests in `status` where `acting_user` is either party.
    pub async fn list_trades(&self, acting_user: Uuid, status: RequestStatus) -> Result<Vec<RequestView>> {
        let db = self.db.lock().await;
        db.list_trades(acting_user, status)?
            .into_iter()
            .map(|request| self.enrich(&db, acting_user, request))
            .collect()
    }

    fn enrich(&self, db: &Database, viewer: Uuid, request: TradeRequest) -> Result<RequestView> {
        let counterpart = request.counterpart_of(viewer).ok_or(MarketError::Role {
            user: viewer,
            request: request.id,
        })?;
        let counterpart_username = db.username_or_unknown(counterpart)?;
        let post = db.get_post(request.post_id)?;

        Ok(RequestView {
            post_image_url: self
                .images
                .resolve(post.image_url.as_deref(), Bucket::PostImages),
            offer_image_url: self
                .images
                .resolve(request.offer_image.as_deref(), Bucket::OfferImages),
            counterpart_username,
            post,
            request,
        })
    }
}

fn ensure_recipient(request: &TradeRequest, acting_user: Uuid, action: &str) -> Result<()> {
    if request.party_of(acting_user) != Some(Party::Poster) {
        return Err(MarketError::permission(format!(
            "only the recipient can {action} a request"
        )));
    }
    Ok(())
}
