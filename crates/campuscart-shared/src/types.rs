use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{OFFER_IMAGES_BUCKET, POST_IMAGES_BUCKET};
use crate::error::MarketError;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Listing category tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Clothes,
    Furniture,
    Supplies,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clothes => "clothes",
            Self::Furniture => "furniture",
            Self::Supplies => "supplies",
            Self::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clothes" => Ok(Self::Clothes),
            "furniture" => Ok(Self::Furniture),
            "supplies" => Ok(Self::Supplies),
            "other" => Ok(Self::Other),
            _ => Err(MarketError::validation(format!("unknown category: {s}"))),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PostStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Active,
    Inactive,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for PostStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(MarketError::validation(format!("unknown post status: {s}"))),
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RequestStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a trade request.
///
/// ```text
/// pending ──► accepted ──► completed
///    │
///    ├──────► rejected
///    └──────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::Cancelled)
                | (Self::Accepted, Self::Completed)
        )
    }
}

impl FromStr for RequestStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(MarketError::validation(format!(
                "unknown request status: {s}"
            ))),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TradeType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    #[default]
    Barter,
    Buy,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Barter => "barter",
            Self::Buy => "buy",
        }
    }
}

impl FromStr for TradeType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "barter" => Ok(Self::Barter),
            "buy" => Ok(Self::Buy),
            _ => Err(MarketError::validation(format!("unknown trade type: {s}"))),
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Party / Direction
// ---------------------------------------------------------------------------

/// Which side of a request a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    /// `from_user_id`, owns `requester_status`.
    Requester,
    /// `to_user_id`, owns `poster_status`.
    Poster,
}

/// Whether a listing of requests is seen from the recipient or the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

/// Logical object-storage bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    #[serde(rename = "post-images")]
    PostImages,
    #[serde(rename = "offer-images")]
    OfferImages,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostImages => POST_IMAGES_BUCKET,
            Self::OfferImages => OFFER_IMAGES_BUCKET,
        }
    }
}

impl FromStr for Bucket {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            POST_IMAGES_BUCKET => Ok(Self::PostImages),
            OFFER_IMAGES_BUCKET => Ok(Self::OfferImages),
            _ => Err(MarketError::validation(format!("unknown bucket: {s}"))),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Accepted,
        RequestStatus::Rejected,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    #[test]
    fn terminal_states_allow_no_transition() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn completed_only_reachable_from_accepted() {
        for from in ALL {
            let allowed = from.can_transition_to(RequestStatus::Completed);
            assert_eq!(allowed, from == RequestStatus::Accepted);
        }
    }

    #[test]
    fn status_strings_parse_back() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("archived".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn bucket_serializes_with_dash_names() {
        let json = serde_json::to_string(&Bucket::OfferImages).unwrap();
        assert_eq!(json, "\"offer-images\"");
        assert_eq!("post-images".parse::<Bucket>().unwrap(), Bucket::PostImages);
    }

    #[test]
    fn unknown_category_is_validation_error() {
        let err = "food".parse::<Category>().unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }
}
