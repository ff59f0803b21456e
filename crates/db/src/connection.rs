use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, DEFAULT_MAX_CONNECTIONS, DEFAULT_TIMEOUT_SECS).await
}

/// Opens a pool, creating the database file on first use.
///
/// In-memory databases live only as long as their connection, so those
/// pools hold a single connection that never idles out.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let url = if database_url == ":memory:" { "sqlite::memory:" } else { database_url };
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let in_memory = is_in_memory(url);

    SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { max_connections.max(1) })
        .idle_timeout(if in_memory { None } else { Some(Duration::from_secs(600)) })
        .max_lifetime(if in_memory { None } else { Some(Duration::from_secs(1800)) })
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, is_in_memory, ping};

    #[tokio::test]
    async fn in_memory_aliases_connect_and_answer_ping() {
        for url in ["sqlite::memory:", ":memory:"] {
            let pool = connect_with_settings(url, 1, 5).await.expect("connect");
            ping(&pool).await.expect("ping");
        }
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_one_shared_database() {
        let pool = connect_with_settings("sqlite::memory:", 5, 5).await.expect("connect");
        sqlx::query("CREATE TABLE marker (id INTEGER)").execute(&pool).await.expect("create");

        let mut handles = Vec::new();
        for _ in 0..3 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                sqlx::query("SELECT COUNT(*) FROM marker").execute(&pool).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("table visible from every acquire");
        }
        assert_eq!(pool.options().get_max_connections(), 1);
    }

    #[test]
    fn memory_urls_are_detected() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:shared?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://tenderdesk.db"));
    }
}
