//! Request building helpers shared by every outgoing updater request.

use chrono::{DateTime, FixedOffset, Utc};
use reqwest::header::{HeaderMap, HeaderValue, HOST};
use reqwest::Url;

const TOKYO_OFFSET_SECS: i32 = 9 * 3600;

/// Current time in Asia/Tokyo. Japan has no DST so a fixed offset is exact.
pub fn tokyo_now() -> DateTime<FixedOffset> {
    let now = Utc::now();
    match FixedOffset::east_opt(TOKYO_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset),
        None => now.fixed_offset(),
    }
}

/// Cache-busting argument value, `YYYYmmddHHMMSS`.
pub fn time_arg(now: DateTime<FixedOffset>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Append `t=<time>` to `url`, using `&` when it already has a query.
pub fn with_time_arg(url: &str, now: DateTime<FixedOffset>) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", url, separator, time_arg(now))
}

/// Clone the header template and set `Host` to the target URL's host.
pub fn headers_for(template: &HeaderMap, url: &str) -> HeaderMap {
    let mut headers = template.clone();
    if let Some(host) = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
    {
        if let Ok(value) = HeaderValue::from_str(&host) {
            headers.insert(HOST, value);
        }
    }
    headers
}

/// Replace every `{name}` placeholder with its value.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}
