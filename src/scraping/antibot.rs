//! Browser-like request identity for plain HTTP fetches.

use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use tracing::debug;

/// Desktop Chromium-family profiles: user agent plus the client hints a real
/// browser of that build sends alongside it.
#[derive(Debug, Clone, Copy)]
pub struct DesktopProfile {
    pub user_agent: &'static str,
    pub sec_ch_ua: &'static str,
    pub platform: &'static str,
}

pub const DESKTOP_PROFILES: &[DesktopProfile] = &[
    DesktopProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        sec_ch_ua: r#""Chromium";v="131", "Not_A Brand";v="24", "Google Chrome";v="131""#,
        platform: "\"Windows\"",
    },
    DesktopProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        sec_ch_ua: r#""Chromium";v="131", "Not_A Brand";v="24", "Google Chrome";v="131""#,
        platform: "\"macOS\"",
    },
    DesktopProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        sec_ch_ua: r#""Chromium";v="130", "Not_A Brand";v="24", "Google Chrome";v="130""#,
        platform: "\"Linux\"",
    },
    DesktopProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        sec_ch_ua: r#""Chromium";v="131", "Not_A Brand";v="24", "Microsoft Edge";v="131""#,
        platform: "\"Windows\"",
    },
];

pub fn random_desktop_profile() -> DesktopProfile {
    let mut rng = rand::rng();
    DESKTOP_PROFILES
        .choose(&mut rng)
        .copied()
        .unwrap_or(DESKTOP_PROFILES[0])
}

const NAVIGATION_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("sec-ch-ua-mobile", "?0"),
    ("cache-control", "max-age=0"),
];

/// Headers for a top-level document request that looks like `profile`.
pub fn navigation_headers(profile: &DesktopProfile) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in NAVIGATION_HEADERS {
        headers.insert(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        );
    }
    headers.insert(USER_AGENT, HeaderValue::from_static(profile.user_agent));
    match HeaderValue::from_str(profile.sec_ch_ua) {
        Ok(v) => {
            headers.insert(HeaderName::from_static("sec-ch-ua"), v);
        }
        Err(e) => debug!("antibot: skipping sec-ch-ua: {}", e),
    }
    headers.insert(
        HeaderName::from_static("sec-ch-ua-platform"),
        HeaderValue::from_static(profile.platform),
    );
    headers
}
