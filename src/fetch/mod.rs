mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::error::{FeedError, FeedResult};

/// Issues a GET and returns the body as text.
///
/// Non-success statuses are errors carrying the status and response body.
pub async fn fetch_text<C: HttpClient + ?Sized>(client: &C, url: &str) -> FeedResult<String> {
    let url = reqwest::Url::parse(url).map_err(|e| FeedError::Url(format!("{url}: {e}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FeedError::Status(status.as_u16(), body));
    }

    Ok(resp.text().await?)
}
