//! Fetch orchestration: redirects, cookie hand-off, decompression, timing.
//!
//! ```text
//! Requesting ──3xx + Location──▶ Redirecting ──▶ Requesting
//!     │
//!     └──final──▶ Decompressing ──▶ Resolved     (Failed from any state)
//! ```

use chrono::{DateTime, SubsecRound, Utc};
use url::Url;

use crate::error::{Error, Result};
use crate::inflate;
use crate::options::{Body, Options};
use crate::request::build_request;
use crate::response::{fold_headers, Response};
use crate::target::Target;
use crate::transport::h1::{execute, Payload, RawResponse};

/// Fetch `target`, following the options' redirect, proxy and cookie rules.
pub async fn request(target: impl Into<Target>, mut options: Options) -> Result<Response> {
    let target = target.into();
    let mut url = target.to_url()?;

    let fetch_start = now_millis();
    let mut redirects: u32 = 0;

    let raw = loop {
        let descriptor = build_request(&url, &options)?;
        tracing::debug!(
            "{} {} (hop {}, via {}:{})",
            descriptor.method,
            url,
            redirects + 1,
            descriptor.host,
            descriptor.effective_port()
        );

        let payload = Payload::next_hop(&mut options.data)?;
        let raw = execute(&descriptor, payload).await?;
        tracing::debug!("{} {} -> {}", descriptor.method, url, raw.status);

        hand_off_cookies(&options, &raw, &url);

        let Some(next) = redirect_target(&options, &raw, &url)? else {
            break raw;
        };

        redirects += 1;
        if redirects >= options.max_redirect {
            tracing::debug!("Redirect limit {} reached at {}", options.max_redirect, url);
            return Err(Error::TooManyRedirects { count: redirects });
        }
        tracing::debug!("Redirect {} -> {}", url, next);
        url = next;
    };

    let RawResponse {
        status,
        http_version,
        headers,
        body,
    } = raw;
    let headers = fold_headers(headers.iter().map(|(n, v)| (n.as_str(), v.as_str())));

    let mut response = Response::new(target, status, headers, http_version, body);
    if options.inflate {
        if let Some(encoding) = response.content_encoding() {
            let decoded = inflate::decode(&response.body, encoding)?;
            response.body = decoded;
        }
    }

    response.fetch_start = Some(fetch_start);
    response.fetch_end = Some(now_millis());
    if redirects > 0 {
        response.effective_url = Some(url.to_string());
    }
    Ok(response)
}

/// `GET` shorthand.
pub async fn get(url: impl Into<Target>, options: Options) -> Result<Response> {
    request(url, options.method(http::Method::GET)).await
}

/// `POST` shorthand.
pub async fn post(url: impl Into<Target>, data: impl Into<Body>, options: Options) -> Result<Response> {
    request(url, options.data(data).method(http::Method::POST)).await
}

/// Pass every `Set-Cookie` of a hop to the store, one value at a time.
fn hand_off_cookies(options: &Options, raw: &RawResponse, url: &Url) {
    let Some(set_cookie) = &options.set_cookie else {
        return;
    };
    for cookie in raw.header_all("set-cookie") {
        tracing::trace!("Set-Cookie from {}", url);
        set_cookie(cookie, url.as_str());
    }
}

/// Where to go next, if this hop redirects and redirects are followed.
fn redirect_target(options: &Options, raw: &RawResponse, current: &Url) -> Result<Option<Url>> {
    if !options.follow_location || !(300..400).contains(&raw.status) {
        return Ok(None);
    }
    let Some(location) = raw.header("location") else {
        return Ok(None);
    };
    let next = current
        .join(location.trim())
        .map_err(|e| Error::invalid_url(format!("redirect to {:?}: {}", location, e)))?;
    Ok(Some(next))
}

fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
