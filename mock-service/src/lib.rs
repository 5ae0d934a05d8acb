//! Small axum service used as the system under test by the end-to-end suite.
use axum::{
    body::Bytes, debug_handler, extract::Path, http::StatusCode, routing::get, routing::post,
    Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
use metrics::counter;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, info};

pub fn router() -> Router {
    Router::new()
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code", get(status))
        .route("/echo", post(echo))
        .route("/limited/:max_tps/delay/ms/:delay_ms", get(limited))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Mock service listening on {}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}

/// Serves on `addr` in the background and returns the bound address. Port `0` picks a free one.
pub async fn spawn(addr: SocketAddr) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, router()).await });
    Ok(local)
}

#[debug_handler]
pub async fn delay(Path(delay_ms): Path<u64>) {
    counter!("mock-service.requests").increment(1);
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[debug_handler]
pub async fn status(Path(code): Path<u16>) -> StatusCode {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Accepts non-empty bodies only.
#[debug_handler]
pub async fn echo(body: Bytes) -> Result<Bytes, StatusCode> {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    if body.is_empty() {
        Err(StatusCode::BAD_REQUEST)
    } else {
        Ok(body)
    }
}

lazy_static! {
    static ref LIMITERS: RwLock<HashMap<u32, Arc<DefaultDirectRateLimiter>>> =
        RwLock::new(HashMap::new());
}

/// Rejects requests above `max_tps` with a 503.
#[debug_handler]
pub async fn limited(
    Path((max_tps, delay_ms)): Path<(u32, u64)>,
) -> Result<(), StatusCode> {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    let limiter = limiter(max_tps).ok_or(StatusCode::BAD_REQUEST)?;

    match limiter.check() {
        Ok(_) => {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(())
        }
        Err(_) => {
            debug!("Rate limit of {max_tps} TPS exceeded");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

fn limiter(max_tps: u32) -> Option<Arc<DefaultDirectRateLimiter>> {
    let existing = LIMITERS
        .read()
        .ok()
        .and_then(|map| map.get(&max_tps).cloned());
    if existing.is_some() {
        return existing;
    }

    let limiter = Arc::new(rate_limiter(NonZeroU32::new(max_tps)?));
    let mut map = LIMITERS.write().ok()?;
    Some(map.entry(max_tps).or_insert(limiter).clone())
}

/** Utils **/

pub fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}

/** TPS Printer **/

static REQUESTS: AtomicU64 = AtomicU64::new(0);

pub async fn tps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let requests = REQUESTS.swap(0, Ordering::Relaxed);
        println!("{requests} TPS");
    }
}
