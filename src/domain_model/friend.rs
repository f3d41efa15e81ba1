use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct RequestId(pub uuid::Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        RequestId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(RequestId)
    }
}

/// One directed edge: `owner_id` considers `friend_id` a friend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FriendEdge {
    pub owner_id: UserId,
    pub friend_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decodes a stored status column.
///
/// Rows written by older clients used `requested`, `approved` and `declined`;
/// those aliases map onto the current variants. Anything else is an error
/// rather than a silent default.
impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "requested" => Ok(RequestStatus::Pending),
            "accepted" | "approved" => Ok(RequestStatus::Accepted),
            "rejected" | "declined" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FriendRequest {
    pub id: RequestId,
    pub from_id: UserId,
    pub to_id: UserId,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FriendRequest {
    /// Returns the other party of the request as seen from `me`, if `me` is a party at all.
    pub fn counterpart(&self, me: UserId) -> Option<UserId> {
        if self.from_id == me {
            Some(self.to_id)
        } else if self.to_id == me {
            Some(self.from_id)
        } else {
            None
        }
    }
}

/// Pending requests touching one user, keyed by the other party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingRequests {
    pub incoming: BTreeMap<UserId, RequestId>,
    pub outgoing: BTreeMap<UserId, RequestId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_status_parse() {
        assert_eq!("pending".parse::<RequestStatus>(), Ok(RequestStatus::Pending));
        assert_eq!(" Accepted ".parse::<RequestStatus>(), Ok(RequestStatus::Accepted));
        assert_eq!("rejected".parse::<RequestStatus>(), Ok(RequestStatus::Rejected));
        assert!("blocked".parse::<RequestStatus>().is_err());
        assert!("".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_request_status_legacy_aliases() {
        assert_eq!("requested".parse::<RequestStatus>(), Ok(RequestStatus::Pending));
        assert_eq!("approved".parse::<RequestStatus>(), Ok(RequestStatus::Accepted));
        assert_eq!("declined".parse::<RequestStatus>(), Ok(RequestStatus::Rejected));
    }

    #[test]
    fn test_request_status_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Accepted.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
        assert_eq!(RequestStatus::Rejected.to_string(), "rejected");
    }

    #[test]
    fn test_counterpart() {
        let a = UserId::new_v4();
        let b = UserId::new_v4();
        let now = Utc::now();
        let request = FriendRequest {
            id: RequestId::new_v4(),
            from_id: a,
            to_id: b,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(request.counterpart(a), Some(b));
        assert_eq!(request.counterpart(b), Some(a));
        assert_eq!(request.counterpart(UserId::new_v4()), None);
    }
}
