use crate::domain_port::EdgeStoreError;
use sqlx::mysql::MySqlDatabaseError;

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == 1062; // ER_DUP_ENTRY
        }
    }

    false
}

pub fn transport(context: &str) -> impl FnOnce(sqlx::Error) -> EdgeStoreError + '_ {
    move |e| EdgeStoreError::Transport(format!("{context}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_dup_keys() {
        assert!(!is_dup_key(&sqlx::Error::RowNotFound));
        assert!(!is_dup_key(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn test_transport_keeps_context() {
        let err = transport("insert friend_edge")(sqlx::Error::PoolTimedOut);
        match err {
            EdgeStoreError::Transport(msg) => assert!(msg.starts_with("insert friend_edge: ")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
