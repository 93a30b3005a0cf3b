use anyhow::Result;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::time::Duration;

/// Unread-notification counts keyed by user id. The TTL matches the 30-second
/// client poll cadence, so at most one count query per user per poll window.
static UNREAD_COUNT_CACHE: Lazy<Cache<u64, i64>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(30))
        .build()
});

/// Cached unread count, falling back to the database on a miss.
pub async fn unread_count(pool: &MySqlPool, user_id: u64) -> Result<i64> {
    if let Some(count) = UNREAD_COUNT_CACHE.get(&user_id).await {
        return Ok(count);
    }

    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM notifications
        WHERE user_id = ?
          AND is_read = FALSE
          AND (expires_at IS NULL OR expires_at > NOW())
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    UNREAD_COUNT_CACHE.insert(user_id, count).await;
    Ok(count)
}

/// Drop the cached count after any write to the user's notifications.
pub async fn invalidate(user_id: u64) {
    UNREAD_COUNT_CACHE.invalidate(&user_id).await;
}
