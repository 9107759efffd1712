//! Incremental log tailing.
//!
//! Polls the log store once a second for events newer than a moving cursor,
//! paginating until the continuation token is exhausted. Events are emitted
//! in store-returned order within a poll and in poll order across polls;
//! identifiers seen in an earlier poll are suppressed, since adjacent
//! polling windows overlap at the cursor timestamp. The dedupe set grows for
//! the lifetime of the process.

use std::collections::HashSet;
use std::time::Duration;

use chrono::SecondsFormat;

use crate::errors::FarError;
use crate::providers::{LogEvent, LogStore, ProviderError};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The latest event time observed plus the identifiers already emitted.
#[derive(Debug)]
pub struct LogCursor {
    start: i64,
    seen: HashSet<String>,
}

impl LogCursor {
    pub fn new(start: i64) -> Self {
        Self {
            start,
            seen: HashSet::new(),
        }
    }

    /// Current window start, advanced monotonically.
    pub fn position(&self) -> i64 {
        self.start
    }
}

/// One polling round: page through `[cursor, end)` and emit unseen events.
pub async fn poll_once<F>(
    store: &dyn LogStore,
    group: &str,
    cursor: &mut LogCursor,
    end: Option<i64>,
    emit: &mut F,
) -> Result<(), ProviderError>
where
    F: FnMut(&LogEvent),
{
    let mut token: Option<String> = None;
    let mut latest = cursor.start;
    loop {
        let page = store
            .filter_log_events(group, cursor.start, end, token.as_deref())
            .await?;
        for event in &page.events {
            if event.timestamp > latest {
                latest = event.timestamp;
            }
            if cursor.seen.insert(event.event_id.clone()) {
                emit(event);
            }
        }
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    cursor.start = latest;
    Ok(())
}

/// Tail the log group forever; only process termination stops the loop.
pub async fn tail<F>(
    store: &dyn LogStore,
    group: &str,
    start: i64,
    end: Option<i64>,
    mut emit: F,
) -> Result<(), FarError>
where
    F: FnMut(&LogEvent),
{
    let mut cursor = LogCursor::new(start);
    loop {
        poll_once(store, group, &mut cursor, end, &mut emit).await?;
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// `stream-basename: [timestamp] message`, the shape operators scan for.
pub fn format_event(event: &LogEvent) -> String {
    let stream = event
        .stream
        .rsplit('/')
        .next()
        .unwrap_or(event.stream.as_str());
    let when = chrono::DateTime::from_timestamp_millis(event.timestamp)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default();
    format!("{stream}: [{when}] {}", event.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{LogPage, SubscriptionFilter};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves queued pages in order, ignoring the query window.
    struct FakeLogs {
        pages: Mutex<VecDeque<LogPage>>,
    }

    impl FakeLogs {
        fn new(pages: Vec<LogPage>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
            }
        }
    }

    #[async_trait]
    impl LogStore for FakeLogs {
        async fn create_log_group(&self, _: &str) -> Result<(), ProviderError> {
            unimplemented!()
        }
        async fn put_retention_policy(&self, _: &str, _: i32) -> Result<(), ProviderError> {
            unimplemented!()
        }
        async fn describe_subscription_filters(
            &self,
            _: &str,
        ) -> Result<Vec<SubscriptionFilter>, ProviderError> {
            unimplemented!()
        }
        async fn put_subscription_filter(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<(), ProviderError> {
            unimplemented!()
        }
        async fn delete_subscription_filter(&self, _: &str, _: &str) -> Result<(), ProviderError> {
            unimplemented!()
        }
        async fn filter_log_events(
            &self,
            _: &str,
            _: i64,
            _: Option<i64>,
            _: Option<&str>,
        ) -> Result<LogPage, ProviderError> {
            Ok(self
                .pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(LogPage {
                    events: Vec::new(),
                    next_token: None,
                }))
        }
    }

    fn event(id: &str, timestamp: i64, message: &str) -> LogEvent {
        LogEvent {
            event_id: id.to_string(),
            timestamp,
            stream: format!("awslogs-api-prod/api-prod/{id}"),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_ids_emit_once_across_polls() {
        let store = FakeLogs::new(vec![
            LogPage {
                events: vec![event("e1", 10, "first")],
                next_token: None,
            },
            // the next window overlaps and returns e1 again
            LogPage {
                events: vec![event("e1", 10, "first"), event("e2", 20, "second")],
                next_token: None,
            },
        ]);

        let mut emitted = Vec::new();
        let mut cursor = LogCursor::new(0);
        poll_once(&store, "g", &mut cursor, None, &mut |e: &LogEvent| {
            emitted.push(e.event_id.clone())
        })
        .await
        .unwrap();
        poll_once(&store, "g", &mut cursor, None, &mut |e: &LogEvent| {
            emitted.push(e.event_id.clone())
        })
        .await
        .unwrap();

        assert_eq!(emitted, vec!["e1".to_string(), "e2".to_string()]);
    }

    #[tokio::test]
    async fn test_poll_pages_until_token_exhausted() {
        let store = FakeLogs::new(vec![
            LogPage {
                events: vec![event("e1", 10, "a")],
                next_token: Some("more".to_string()),
            },
            LogPage {
                events: vec![event("e2", 30, "b")],
                next_token: None,
            },
        ]);

        let mut emitted = Vec::new();
        let mut cursor = LogCursor::new(0);
        poll_once(&store, "g", &mut cursor, None, &mut |e: &LogEvent| {
            emitted.push(e.event_id.clone())
        })
        .await
        .unwrap();

        assert_eq!(emitted.len(), 2);
        assert_eq!(cursor.position(), 30);
    }

    #[tokio::test]
    async fn test_cursor_never_moves_backwards() {
        let store = FakeLogs::new(vec![LogPage {
            events: vec![event("e1", 5, "late straggler")],
            next_token: None,
        }]);

        let mut cursor = LogCursor::new(50);
        poll_once(&store, "g", &mut cursor, None, &mut |_: &LogEvent| {})
            .await
            .unwrap();
        assert_eq!(cursor.position(), 50);
    }

    #[test]
    fn test_format_event_uses_stream_basename() {
        let line = format_event(&event("e1", 1_700_000_000_000, "ready"));
        assert!(line.starts_with("e1: ["));
        assert!(line.ends_with("] ready"));
        assert!(!line.contains("awslogs-api-prod/"));
    }
}
