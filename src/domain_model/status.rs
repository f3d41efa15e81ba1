use crate::domain_model::RequestId;
use serde::{Deserialize, Serialize};

/// Relationship of the session user to one other user.
///
/// Derived from a snapshot or from a backend point lookup; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "request_id", rename_all = "snake_case")]
pub enum FriendshipStatus {
    None,
    OutgoingRequest(RequestId),
    IncomingRequest(RequestId),
    Friends,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusDecodeError {
    #[error("unknown friendship status kind: {0:?}")]
    UnknownKind(String),
    #[error("status {0:?} requires a request id")]
    MissingRequestId(&'static str),
}

impl FriendshipStatus {
    pub fn kind(&self) -> &'static str {
        match self {
            FriendshipStatus::None => "none",
            FriendshipStatus::OutgoingRequest(_) => "outgoing_request",
            FriendshipStatus::IncomingRequest(_) => "incoming_request",
            FriendshipStatus::Friends => "friends",
        }
    }

    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            FriendshipStatus::OutgoingRequest(id) | FriendshipStatus::IncomingRequest(id) => {
                Some(*id)
            }
            FriendshipStatus::None | FriendshipStatus::Friends => None,
        }
    }

    pub fn is_friends(&self) -> bool {
        matches!(self, FriendshipStatus::Friends)
    }

    /// Decodes a `(kind, request_id)` pair as returned by a backend row.
    ///
    /// Legacy rows used `sent`/`received` for the request variants and
    /// `friend`/`accepted` for an established friendship. A request kind without
    /// an id is rejected instead of being downgraded to `none`. A stray id on
    /// `none`/`friends` is ignored.
    pub fn decode(kind: &str, request_id: Option<RequestId>) -> Result<Self, StatusDecodeError> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(FriendshipStatus::None),
            "friends" | "friend" | "accepted" => Ok(FriendshipStatus::Friends),
            "outgoing_request" | "sent" => request_id
                .map(FriendshipStatus::OutgoingRequest)
                .ok_or(StatusDecodeError::MissingRequestId("outgoing_request")),
            "incoming_request" | "received" => request_id
                .map(FriendshipStatus::IncomingRequest)
                .ok_or(StatusDecodeError::MissingRequestId("incoming_request")),
            other => Err(StatusDecodeError::UnknownKind(other.to_owned())),
        }
    }
}
