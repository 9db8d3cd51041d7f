use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reattempt::strategy::Backoff;
use reattempt::{RateLimited, RetryAfter, retry_async};
use tokio::time::Instant;

#[derive(Clone, Debug, PartialEq)]
struct ApiError {
    error_code: u16,
    description: String,
    retry_after: Option<u64>,
}

impl ApiError {
    fn new(error_code: u16, description: &str) -> Self {
        ApiError {
            error_code,
            description: description.to_string(),
            retry_after: None,
        }
    }

    fn too_many_requests(retry_after: Option<u64>) -> Self {
        ApiError {
            retry_after,
            ..ApiError::new(429, "Too Many Requests")
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code, self.description)
    }
}

impl RetryAfter for ApiError {
    fn is_rate_limited(&self) -> bool {
        self.error_code == 429
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after.map(Duration::from_secs)
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Reply {
    ok: bool,
    result: String,
}

/// Scripted stand-in for a bot API: answers calls from a queue of canned replies.
struct FakeApi {
    replies: Mutex<VecDeque<Result<Reply, ApiError>>>,
    calls: AtomicU32,
}

impl FakeApi {
    fn scripted(replies: impl IntoIterator<Item = Result<Reply, ApiError>>) -> Arc<Self> {
        Arc::new(FakeApi {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: AtomicU32::new(0),
        })
    }

    async fn call(&self, _method: &str) -> Result<Reply, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::new(500, "script exhausted")))
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn ok(result: &str) -> Result<Reply, ApiError> {
    Ok(Reply {
        ok: true,
        result: result.to_string(),
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("reattempt=debug")
        .with_test_writer()
        .try_init();
}

#[tokio::test(start_paused = true)]
async fn waits_for_server_hint_then_succeeds() {
    init_tracing();
    let api = FakeApi::scripted([Err(ApiError::too_many_requests(Some(3))), ok("bot")]);

    let start = Instant::now();
    let reply = retry_async(
        |_, _| {
            let api = api.clone();
            async move { api.call("getMe").await }
        },
        RateLimited::new("getMe").into_options(),
    )
    .await;

    assert_eq!(reply.map(|r| r.result), Ok("bot".to_string()));
    assert_eq!(api.calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn missing_hint_falls_back_to_default_wait() {
    let api = FakeApi::scripted([Err(ApiError::too_many_requests(None)), ok("bot")]);

    let start = Instant::now();
    let reply = retry_async(
        |_, _| {
            let api = api.clone();
            async move { api.call("getMe").await }
        },
        RateLimited::new("getMe").into_options(),
    )
    .await;

    assert!(reply.is_ok());
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn server_errors_back_off_exponentially() {
    let api = FakeApi::scripted([
        Err(ApiError::new(502, "Bad Gateway")),
        Err(ApiError::new(502, "Bad Gateway")),
        ok("sent"),
    ]);

    let start = Instant::now();
    let reply = retry_async(
        |_, _| {
            let api = api.clone();
            async move { api.call("sendMessage").await }
        },
        RateLimited::new("sendMessage").into_options(),
    )
    .await;

    assert!(reply.is_ok());
    assert_eq!(api.calls(), 3);
    // Retries 1 and 2 wait 1s × 2¹ and 1s × 2².
    assert_eq!(start.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_surfaces_last_error() {
    init_tracing();
    let api = FakeApi::scripted([
        Err(ApiError::new(500, "first")),
        Err(ApiError::too_many_requests(Some(1))),
        Err(ApiError::new(500, "last")),
    ]);

    let reply = retry_async(
        |_, _| {
            let api = api.clone();
            async move { api.call("sendMessage").await }
        },
        RateLimited::new("sendMessage")
            .with_retries(2)
            .with_backoff(
                Backoff::new(Duration::from_millis(10), Duration::from_millis(50), 2.0).unwrap(),
            )
            .into_options(),
    )
    .await;

    assert_eq!(reply, Err(ApiError::new(500, "last")));
    assert_eq!(api.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn error_payload_rejects_without_retrying() {
    // HTTP 200 with `ok: false`: the call went through and the refusal is final.
    let api = FakeApi::scripted([
        Ok(Reply {
            ok: false,
            result: "chat not found".to_string(),
        }),
        ok("unreachable"),
    ]);

    let reply = retry_async(
        |settle, _| {
            let api = api.clone();
            async move {
                let reply = api.call("sendMessage").await?;
                if !reply.ok {
                    settle.reject(ApiError::new(400, &reply.result));
                }
                Ok::<_, ApiError>(reply)
            }
        },
        RateLimited::new("sendMessage").into_options(),
    )
    .await;

    assert_eq!(reply, Err(ApiError::new(400, "chat not found")));
    assert_eq!(api.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn status_tracks_whole_session() {
    let api = FakeApi::scripted([
        Err(ApiError::new(503, "Service Unavailable")),
        Err(ApiError::too_many_requests(Some(2))),
        ok("done"),
    ]);
    let history = Arc::new(Mutex::new(None));
    let history_seen = history.clone();

    let reply = retry_async(
        |_, _| {
            let api = api.clone();
            async move { api.call("getUpdates").await }
        },
        RateLimited::new("getUpdates")
            .into_options::<Reply, ApiError>()
            .on_resolved(move |_, status| {
                let codes: Vec<u16> = status.errors().iter().map(|e| e.error.error_code).collect();
                let ordered = status
                    .errors()
                    .windows(2)
                    .all(|pair| pair[0].occurred_at <= pair[1].occurred_at);
                *history_seen.lock().unwrap() =
                    Some((codes, status.count(), status.end_at().is_some(), ordered));
            }),
    )
    .await;

    assert!(reply.is_ok());
    assert_eq!(
        history.lock().unwrap().take(),
        Some((vec![503, 429], 2, true, true))
    );
}
