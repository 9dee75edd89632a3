use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::{FetchSettings, SourceConfig};

/// Fetch stats returned after completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub unavailable: usize,
}

enum Attempt {
    Done(Option<String>),
    Retry(String),
}

/// Fetch every source concurrently. The result is in the same order as
/// `sources`; `None` marks a source that could not be read.
pub async fn fetch_all(
    settings: &FetchSettings,
    sources: &[&SourceConfig],
) -> Result<(Vec<Option<String>>, FetchStats)> {
    let client = Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()?;
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let total = sources.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    // Workers send (index, body); the receiver slots bodies back into source order.
    let (tx, mut rx) = tokio::sync::mpsc::channel::<(usize, Option<String>)>(settings.concurrency.max(1) * 2);

    for (index, source) in sources.iter().enumerate() {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let source = (*source).clone();
        let settings = settings.clone();

        tokio::spawn(async move {
            let body = match sem.acquire().await {
                Ok(_permit) => fetch_source(&client, &settings, &source).await,
                Err(_) => None,
            };
            let _ = tx.send((index, body)).await;
        });
    }

    drop(tx);

    let mut bodies: Vec<Option<String>> = vec![None; total];
    let mut ok = 0usize;
    while let Some((index, body)) = rx.recv().await {
        if body.is_some() {
            ok += 1;
        }
        bodies[index] = body;
        pb.inc(1);
    }

    pb.finish_and_clear();
    let stats = FetchStats {
        total,
        ok,
        unavailable: total - ok,
    };
    info!(total, ok, unavailable = stats.unavailable, "sources fetched");
    Ok((bodies, stats))
}

/// Raw text of one source: a local file when `path` is set, otherwise its URL.
pub async fn fetch_source(client: &Client, settings: &FetchSettings, source: &SourceConfig) -> Option<String> {
    if let Some(path) = &source.path {
        return match tokio::fs::read_to_string(path).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(source = %source.name, path = %path.display(), error = %e, "source file unreadable");
                None
            }
        };
    }
    let url = source.url.as_deref()?;
    fetch_with_retry(client, settings, &source.name, url).await
}

async fn fetch_with_retry(client: &Client, settings: &FetchSettings, name: &str, url: &str) -> Option<String> {
    for attempt in 0..=settings.max_retries {
        let reason = match fetch_once(client, name, url).await {
            Attempt::Done(body) => return body,
            Attempt::Retry(reason) => reason,
        };

        if attempt == settings.max_retries {
            warn!(source = name, url, reason = %reason, "giving up after retries");
            break;
        }

        let backoff = backoff_delay(settings.base_backoff_ms, attempt);
        warn!(
            "{} on {} (attempt {}/{}), backing off {:.1}s",
            reason,
            name,
            attempt + 1,
            settings.max_retries,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }
    None
}

async fn fetch_once(client: &Client, name: &str, url: &str) -> Attempt {
    let start = Instant::now();
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => return Attempt::Retry(format!("request error: {}", e)),
    };

    let status = response.status();
    if is_retryable(status) {
        return Attempt::Retry(format!("HTTP {}", status.as_u16()));
    }
    if !status.is_success() {
        warn!(source = name, url, status = status.as_u16(), "source unavailable");
        return Attempt::Done(None);
    }

    match response.text().await {
        Ok(body) => {
            debug!(
                source = name,
                bytes = body.len(),
                latency_ms = start.elapsed().as_millis() as u64,
                "fetched"
            );
            Attempt::Done(Some(body))
        }
        Err(e) => Attempt::Retry(format!("body error: {}", e)),
    }
}

/// `base_ms * 2^attempt`, saturating instead of overflowing for large retry counts.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(attempt)))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
