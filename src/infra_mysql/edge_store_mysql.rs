use super::util::{is_dup_key, transport};
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use std::collections::BTreeSet;

pub struct MySqlEdgeStore {
    pool: MySqlPool,
}

impl MySqlEdgeStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Legacy rows may still carry `requested`, `approved` or `declined`.
fn decode_status(raw: &str) -> Result<RequestStatus, EdgeStoreError> {
    raw.parse::<RequestStatus>()
        .map_err(|e| EdgeStoreError::Decode(format!("friend_request.status: {e}")))
}

fn decode_request(row: &MySqlRow) -> Result<FriendRequest, EdgeStoreError> {
    let decode = |e: sqlx::Error| EdgeStoreError::Decode(format!("friend_request row: {e}"));

    let status = decode_status(row.try_get::<&str, _>("status").map_err(decode)?)?;

    Ok(FriendRequest {
        id: row.try_get::<RequestId, _>("request_id").map_err(decode)?,
        from_id: row.try_get::<UserId, _>("from_id").map_err(decode)?,
        to_id: row.try_get::<UserId, _>("to_id").map_err(decode)?,
        status,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(decode)?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(decode)?,
    })
}

#[async_trait::async_trait]
impl EdgeStore for MySqlEdgeStore {
    async fn send_request(&self, from: UserId, to: UserId) -> Result<RequestId, EdgeStoreError> {
        if from == to {
            return Err(EdgeStoreError::SelfRequest);
        }

        let edges: i64 = sqlx::query_scalar(
            r#"
SELECT COUNT(*) FROM friend_edge
WHERE (owner_id = ? AND friend_id = ?) OR (owner_id = ? AND friend_id = ?)
"#,
        )
        .bind(from)
        .bind(to)
        .bind(to)
        .bind(from)
        .fetch_one(&self.pool)
        .await
        .map_err(transport("count edges"))?;
        if edges == 2 {
            return Err(EdgeStoreError::AlreadyFriends);
        }

        // uq_pending_pair rejects a second pending row for the same ordered pair
        let request_id = RequestId::new_v4();
        let now = Utc::now();
        let res = sqlx::query(
            r#"
INSERT INTO friend_request (request_id, from_id, to_id, status, created_at, updated_at)
VALUES (?, ?, ?, 'pending', ?, ?)
"#,
        )
        .bind(request_id)
        .bind(from)
        .bind(to)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(request_id),
            Err(e) if is_dup_key(&e) => Err(EdgeStoreError::DuplicatePending),
            Err(e) => Err(EdgeStoreError::Transport(format!("insert friend_request: {e}"))),
        }
    }

    async fn get_request(&self, request_id: RequestId) -> Result<FriendRequest, EdgeStoreError> {
        let row = sqlx::query(
            r#"
SELECT request_id, from_id, to_id, status, created_at, updated_at
FROM friend_request WHERE request_id = ?
"#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(transport("select friend_request"))?
        .ok_or(EdgeStoreError::NotFound)?;

        decode_request(&row)
    }

    async fn set_request_status(
        &self,
        request_id: RequestId,
        status: RequestStatus,
    ) -> Result<FriendRequest, EdgeStoreError> {
        let mut tx = self.pool.begin().await.map_err(transport("begin"))?;

        let row = sqlx::query(
            r#"
SELECT request_id, from_id, to_id, status, created_at, updated_at
FROM friend_request WHERE request_id = ? FOR UPDATE
"#,
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(transport("select friend_request"))?
        .ok_or(EdgeStoreError::NotFound)?;

        let mut request = decode_request(&row)?;
        if request.status.is_terminal() {
            return Err(EdgeStoreError::AlreadyTerminal);
        }

        let now = Utc::now();
        sqlx::query("UPDATE friend_request SET status = ?, updated_at = ? WHERE request_id = ?")
            .bind(status.as_str())
            .bind(now)
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(transport("update friend_request"))?;

        tx.commit().await.map_err(transport("commit"))?;

        request.status = status;
        request.updated_at = now;
        Ok(request)
    }

    async fn delete_request(&self, request_id: RequestId) -> Result<(), EdgeStoreError> {
        let mut tx = self.pool.begin().await.map_err(transport("begin"))?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM friend_request WHERE request_id = ? FOR UPDATE",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(transport("select friend_request"))?
        .ok_or(EdgeStoreError::NotFound)?;
        if decode_status(&status)?.is_terminal() {
            return Err(EdgeStoreError::AlreadyTerminal);
        }

        sqlx::query("DELETE FROM friend_request WHERE request_id = ?")
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(transport("delete friend_request"))?;

        tx.commit().await.map_err(transport("commit"))?;
        Ok(())
    }

    async fn insert_edges_both_directions(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<(), EdgeStoreError> {
        if a == b {
            return Err(EdgeStoreError::SelfRequest);
        }

        let now = Utc::now();
        sqlx::query(
            r#"
INSERT IGNORE INTO friend_edge (owner_id, friend_id, created_at)
VALUES (?, ?, ?), (?, ?, ?)
"#,
        )
        .bind(a)
        .bind(b)
        .bind(now)
        .bind(b)
        .bind(a)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(transport("insert friend_edge"))?;

        Ok(())
    }

    async fn delete_edges_both_directions(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<(), EdgeStoreError> {
        sqlx::query(
            r#"
DELETE FROM friend_edge
WHERE (owner_id = ? AND friend_id = ?) OR (owner_id = ? AND friend_id = ?)
"#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .execute(&self.pool)
        .await
        .map_err(transport("delete friend_edge"))?;

        Ok(())
    }

    async fn list_friend_ids(&self, user_id: UserId) -> Result<BTreeSet<UserId>, EdgeStoreError> {
        // one-way rows are not friendships
        let rows = sqlx::query(
            r#"
SELECT e.friend_id
FROM friend_edge e
JOIN friend_edge r
  ON r.owner_id = e.friend_id AND r.friend_id = e.owner_id
WHERE e.owner_id = ?
"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(transport("list friend_edge"))?;

        rows.iter()
            .map(|row| {
                row.try_get::<UserId, _>("friend_id")
                    .map_err(|e| EdgeStoreError::Decode(format!("friend_id: {e}")))
            })
            .collect()
    }

    async fn list_pending_requests(
        &self,
        user_id: UserId,
    ) -> Result<PendingRequests, EdgeStoreError> {
        let rows = sqlx::query(
            r#"
SELECT request_id, from_id, to_id, status, created_at, updated_at
FROM friend_request
WHERE status IN ('pending', 'requested') AND (from_id = ? OR to_id = ?)
"#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(transport("list friend_request"))?;

        let mut pending = PendingRequests::default();
        for row in &rows {
            let request = decode_request(row)?;
            if request.status != RequestStatus::Pending {
                continue;
            }
            if request.to_id == user_id {
                pending.incoming.insert(request.from_id, request.id);
            } else if request.from_id == user_id {
                pending.outgoing.insert(request.to_id, request.id);
            }
        }
        Ok(pending)
    }

    async fn remote_status(
        &self,
        a: UserId,
        b: UserId,
    ) -> Result<FriendshipStatus, EdgeStoreError> {
        if a == b {
            return Ok(FriendshipStatus::None);
        }

        let row = sqlx::query(
            r#"
SELECT
    CASE
        WHEN (SELECT COUNT(*) FROM friend_edge
              WHERE (owner_id = ? AND friend_id = ?) OR (owner_id = ? AND friend_id = ?)) = 2
            THEN 'friends'
        WHEN fr.from_id = ? THEN 'outgoing_request'
        WHEN fr.from_id = ? THEN 'incoming_request'
        ELSE 'none'
    END AS kind,
    fr.request_id AS request_id
FROM (SELECT 1) AS one
LEFT JOIN friend_request fr
  ON fr.status IN ('pending', 'requested')
 AND ((fr.from_id = ? AND fr.to_id = ?) OR (fr.from_id = ? AND fr.to_id = ?))
ORDER BY fr.from_id = ? DESC
LIMIT 1
"#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .bind(a)
        .bind(b)
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .bind(a)
        .fetch_one(&self.pool)
        .await
        .map_err(transport("select remote status"))?;

        let kind = row
            .try_get::<String, _>("kind")
            .map_err(|e| EdgeStoreError::Decode(format!("kind: {e}")))?;
        let request_id = row
            .try_get::<Option<RequestId>, _>("request_id")
            .map_err(|e| EdgeStoreError::Decode(format!("request_id: {e}")))?;

        FriendshipStatus::decode(&kind, request_id).map_err(|e| EdgeStoreError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_status_accepts_legacy_aliases() {
        // every value matched by the pending filters in the listing queries
        for raw in ["pending", "requested"] {
            assert_eq!(decode_status(raw).unwrap(), RequestStatus::Pending);
        }
        assert_eq!(decode_status("approved").unwrap(), RequestStatus::Accepted);
        assert_eq!(decode_status("declined").unwrap(), RequestStatus::Rejected);
        assert!(decode_status("declined").unwrap().is_terminal());
    }

    #[test]
    fn test_decode_status_rejects_unknown() {
        match decode_status("blocked") {
            Err(EdgeStoreError::Decode(msg)) => assert!(msg.contains("friend_request.status")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
