use async_trait::async_trait;
use parking_lot::Mutex;
use redis::{Client, aio::MultiplexedConnection};
use std::time::Duration;
use tracing::debug;

use crate::{CacheError, WeatherError, WeatherObservation};

use super::{CacheBackend, KEY_PREFIX};

/// Upper bound for one backend call, connecting included.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Redis-backed cache. Expiration is delegated to Redis (`SET .. EX`).
///
/// The connection is opened on first use and discarded after any transport
/// error or timeout, so an unreachable or stalled server only costs the failed
/// call; callers treat errors as misses.
pub struct RedisCache {
    client: Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    timeout: Duration,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("addr", &self.client.get_connection_info().addr)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisCache {
    /// Parses `url` without connecting.
    pub fn new(url: &str) -> Result<Self, WeatherError> {
        let client = Client::open(url)
            .map_err(|e| WeatherError::Configuration(format!("invalid redis url: {e}")))?;
        Ok(Self { client, conn: Mutex::new(None), timeout: OPERATION_TIMEOUT })
    }

    /// Overrides [`OPERATION_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Concurrent callers may race to connect; the last connection stored wins.
    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let cached = self.conn.lock().clone();
        if let Some(conn) = cached {
            return Ok(conn);
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *self.conn.lock() = Some(conn.clone());
        Ok(conn)
    }

    /// Runs `op` under the call timeout and drops the cached connection when it
    /// failed at the transport level.
    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        let result = match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        };

        if let Err(err) = &result {
            let broken = match err {
                CacheError::Backend(e) => {
                    e.is_io_error() || e.is_connection_dropped() || e.is_timeout()
                }
                CacheError::Timeout(_) => true,
                CacheError::Serialization(_) => false,
            };
            if broken {
                debug!(error = %err, "dropping redis connection");
                self.conn.lock().take();
            }
        }
        result
    }

    async fn try_get(&self, key: &str) -> Result<Option<WeatherObservation>, CacheError> {
        let mut conn = self.connection().await?;
        let bytes: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        bytes.map(|b| decode(&b)).transpose()
    }

    async fn try_set(
        &self,
        key: &str,
        value: &WeatherObservation,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = encode(value)?;
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn try_delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    /// Removes only keys in this cache's namespace.
    async fn try_clear(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let pattern = format!("{KEY_PREFIX}*");
        let mut cursor: u64 = 0;
        let mut removed: i64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: i64 = redis::cmd("DEL").arg(&keys).query_async(&mut conn).await?;
                removed += deleted;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(removed, "cleared redis cache namespace");
        Ok(())
    }
}

fn encode(value: &WeatherObservation) -> Result<Vec<u8>, CacheError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode(bytes: &[u8]) -> Result<WeatherObservation, CacheError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Redis rejects `EX 0`, so sub-second TTLs round up.
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<WeatherObservation>, CacheError> {
        self.bounded(self.try_get(key)).await
    }

    async fn set(
        &self,
        key: &str,
        value: &WeatherObservation,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.bounded(self.try_set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.bounded(self.try_delete(key)).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.bounded(self.try_clear()).await
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn rejects_malformed_url() {
        let err = RedisCache::new("not a url").unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));
    }

    #[test]
    fn payload_roundtrips_through_json() {
        let obs = WeatherObservation::new(-4.0, 77.5, "fog").expect("valid");
        let bytes = encode(&obs).expect("encode");
        assert_eq!(decode(&bytes).expect("decode"), obs);
        assert!(matches!(decode(b"{\"temperature\":1}"), Err(CacheError::Serialization(_))));
    }

    #[test]
    fn ttl_never_rounds_to_zero() {
        assert_eq!(ttl_seconds(Duration::from_millis(10)), 1);
        assert_eq!(ttl_seconds(Duration::from_secs(600)), 600);
    }

    #[tokio::test]
    async fn unreachable_server_reports_backend_error() {
        // Nothing listens on port 1.
        let cache = RedisCache::new("redis://127.0.0.1:1/").expect("valid url");
        let err = cache.get("weather:london").await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));

        let obs = WeatherObservation::new(1.0, 1.0, "x").expect("valid");
        assert!(cache.set("weather:london", &obs, Duration::from_secs(5)).await.is_err());
    }

    /// Accepts connections and holds them open without ever answering.
    async fn silent_server() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        addr
    }

    #[tokio::test]
    async fn stalled_server_times_out_every_operation() {
        let addr = silent_server().await;
        let timeout = Duration::from_millis(200);
        let cache = RedisCache::new(&format!("redis://{addr}/"))
            .expect("valid url")
            .with_timeout(timeout);
        let obs = WeatherObservation::new(1.0, 1.0, "x").expect("valid");

        let started = std::time::Instant::now();
        let err = cache.get("weather:london").await.unwrap_err();
        assert!(matches!(err, CacheError::Timeout(t) if t == timeout));
        assert!(cache.set("weather:london", &obs, Duration::from_secs(5)).await.is_err());
        assert!(cache.delete("weather:london").await.is_err());
        assert!(cache.clear().await.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(cache.conn.lock().is_none());
    }

    #[tokio::test]
    async fn concurrent_callers_do_not_queue_behind_a_stalled_connect() {
        let addr = silent_server().await;
        let cache = Arc::new(
            RedisCache::new(&format!("redis://{addr}/"))
                .expect("valid url")
                .with_timeout(Duration::from_millis(300)),
        );

        let started = std::time::Instant::now();
        let lookups: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get("weather:kyiv").await })
            })
            .collect();
        for lookup in lookups {
            assert!(lookup.await.expect("task").is_err());
        }
        // Serialized callers would need 8 x 300ms.
        assert!(started.elapsed() < Duration::from_millis(1500));
    }
}
