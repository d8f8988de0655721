//! Integration tests for the infrastructure components
//!
//! These tests verify that the PostgreSQL database and the Redis queue are
//! properly configured and accessible. They need both services running and
//! are ignored by default: `cargo test -- --ignored`.

use common::{
    database::{DatabaseConfig, health_check, init_pool},
    queue::{RedisConfig, RedisQueue},
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires running PostgreSQL and Redis"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    let redis_config = RedisConfig::from_env()?;
    let queue = RedisQueue::new(&redis_config).await?;

    assert!(queue.health_check().await?, "Redis health check failed");

    let queue_name = "integration_test_queue";
    queue.clear(queue_name).await?;

    // Payloads come back in the order they were pushed
    queue.push(queue_name, "first").await?;
    queue.push(queue_name, "second").await?;
    assert_eq!(queue.len(queue_name).await?, 2);

    assert_eq!(queue.pop(queue_name).await?, Some("first".to_string()));
    assert_eq!(queue.pop(queue_name).await?, Some("second".to_string()));
    assert_eq!(queue.pop(queue_name).await?, None, "Queue should be drained");

    Ok(())
}
