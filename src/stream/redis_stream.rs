//! Redis Streams backend

use super::{OrderStream, ReadCursor, ResponsePublisher, StreamError, StreamMessage};
use crate::config::StreamConfig;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamMaxlen, StreamReadOptions,
    StreamReadReply,
};
use redis::{AsyncCommands, ErrorKind, RedisError};
use std::time::Duration;

/// Order stream backed by a Redis stream and consumer group
///
/// Blocking group reads run on their own connection: Redis answers the
/// commands of one connection in order, so an idle `XREADGROUP ... BLOCK`
/// would otherwise hold up every enqueue and ping behind it. Both connection
/// managers reconnect transparently; commands issued while the server is
/// down surface as [`StreamError::Unavailable`].
#[derive(Clone)]
pub struct RedisStream {
    conn: ConnectionManager,
    reader: ConnectionManager,
    stream: String,
    group: String,
    payload_field: String,
    max_len: Option<usize>,
}

impl RedisStream {
    /// Connect to the endpoint named in `config`
    pub async fn connect(config: &StreamConfig) -> Result<Self, StreamError> {
        let client = redis::Client::open(config.redis_url()).map_err(map_err)?;
        let conn = client.get_connection_manager().await.map_err(map_err)?;
        let reader = client.get_connection_manager().await.map_err(map_err)?;
        tracing::info!(
            host = %config.host,
            port = config.port,
            stream = %config.stream,
            group = %config.group,
            "Connected to Redis"
        );

        Ok(Self {
            conn,
            reader,
            stream: config.stream.clone(),
            group: config.group.clone(),
            payload_field: config.payload_field.clone(),
            max_len: config.max_len,
        })
    }

    fn to_message(&self, entry: StreamId) -> StreamMessage {
        StreamMessage {
            payload: entry
                .map
                .get(&self.payload_field)
                .and_then(|v| redis::from_redis_value::<String>(v).ok()),
            id: entry.id,
        }
    }
}

fn map_err(e: RedisError) -> StreamError {
    if e.code() == Some("NOGROUP") {
        StreamError::MissingGroup(e.to_string())
    } else if e.is_io_error()
        || e.is_connection_dropped()
        || e.is_connection_refusal()
        || e.is_timeout()
        || e.kind() == ErrorKind::IoError
    {
        StreamError::Unavailable(e.to_string())
    } else {
        StreamError::Backend(e.to_string())
    }
}

#[async_trait]
impl OrderStream for RedisStream {
    async fn ensure_group(&self) -> Result<(), StreamError> {
        let mut conn = self.conn.clone();
        // Start from the beginning so orders accepted before the first
        // consumer came up are still processed.
        let created: Result<(), RedisError> = conn
            .xgroup_create_mkstream(&self.stream, &self.group, "0")
            .await;

        match created {
            Ok(()) => {
                tracing::info!(stream = %self.stream, group = %self.group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => {
                tracing::debug!(group = %self.group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(map_err(e)),
        }
    }

    async fn read_batch(
        &self,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let mut conn = self.reader.clone();
        let mut options = StreamReadOptions::default()
            .group(&self.group, consumer)
            .count(count);
        let start_id = match cursor {
            ReadCursor::New => {
                options = options.block(block.as_millis() as usize);
                ">"
            }
            ReadCursor::Pending => "0",
        };

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.stream], &[start_id], &options)
            .await
            .map_err(map_err)?;

        Ok(reply
            .into_iter()
            .flat_map(|reply| reply.keys)
            .flat_map(|key| key.ids)
            .map(|entry| self.to_message(entry))
            .collect())
    }

    async fn claim_stale(
        &self,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let mut conn = self.conn.clone();
        let reply: StreamAutoClaimReply = conn
            .xautoclaim_options(
                &self.stream,
                &self.group,
                consumer,
                min_idle.as_millis() as u64,
                "0-0",
                StreamAutoClaimOptions::default().count(count),
            )
            .await
            .map_err(map_err)?;

        Ok(reply
            .claimed
            .into_iter()
            .map(|entry| self.to_message(entry))
            .collect())
    }

    async fn ack(&self, id: &str) -> Result<(), StreamError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .xack(&self.stream, &self.group, &[id])
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn enqueue(&self, payload: &str) -> Result<String, StreamError> {
        let mut conn = self.conn.clone();
        let fields = [(self.payload_field.as_str(), payload)];
        match self.max_len {
            Some(max_len) => conn
                .xadd_maxlen(&self.stream, StreamMaxlen::Approx(max_len), "*", &fields)
                .await
                .map_err(map_err),
            None => conn
                .xadd(&self.stream, "*", &fields)
                .await
                .map_err(map_err),
        }
    }

    async fn ping(&self) -> Result<(), StreamError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}

#[async_trait]
impl ResponsePublisher for RedisStream {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StreamError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.publish(channel, payload).await.map_err(map_err)?;
        Ok(())
    }
}
