//! Browser identity randomization
//!
//! Each request carries a User-Agent chosen uniformly at random from a fixed
//! pool of realistic signatures, with client-hint tokens and platform token
//! kept consistent with the chosen UA. Firefox and Safari identities carry no
//! `sec-ch-ua` headers because those browsers do not send client hints.
//!
//! The header set is ordered and fixed apart from the identity fields;
//! Referer/Origin simulate arriving from the public dashboard site.
//! Content-Encoding is intentionally not pinned here: decompression is
//! delegated to the transport layer.

use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy)]
pub struct BrowserIdentity {
    pub user_agent: &'static str,
    /// `sec-ch-ua` token list; None for browsers without client hints
    pub sec_ch_ua: Option<&'static str>,
    /// `sec-ch-ua-platform` token, already quoted
    pub platform: Option<&'static str>,
}

const IDENTITIES: &[BrowserIdentity] = &[
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        sec_ch_ua: Some("\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\""),
        platform: Some("\"Windows\""),
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        sec_ch_ua: Some("\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\""),
        platform: Some("\"macOS\""),
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
        sec_ch_ua: Some("\"Chromium\";v=\"124\", \"Microsoft Edge\";v=\"124\", \"Not-A.Brand\";v=\"99\""),
        platform: Some("\"Windows\""),
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        sec_ch_ua: None,
        platform: None,
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        sec_ch_ua: None,
        platform: None,
    },
];

impl BrowserIdentity {
    /// Uniform random pick from the identity pool.
    pub fn random() -> Self {
        *IDENTITIES
            .choose(&mut rand::thread_rng())
            .expect("identity pool is non-empty")
    }

    /// The ordered header set for one request. `dashboard_url` becomes the
    /// Referer (trailing slash) and Origin.
    pub fn request_headers(&self, dashboard_url: &str) -> Vec<(String, String)> {
        let origin = dashboard_url.trim_end_matches('/').to_string();
        let mut headers = vec![
            ("Accept".to_string(), "application/json, text/plain, */*".to_string()),
            ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
            ("Cache-Control".to_string(), "no-cache".to_string()),
            ("Pragma".to_string(), "no-cache".to_string()),
            ("DNT".to_string(), "1".to_string()),
            ("Sec-Fetch-Dest".to_string(), "empty".to_string()),
            ("Sec-Fetch-Mode".to_string(), "cors".to_string()),
            ("Sec-Fetch-Site".to_string(), "same-site".to_string()),
        ];
        if let Some(sec_ch_ua) = self.sec_ch_ua {
            headers.push(("sec-ch-ua".to_string(), sec_ch_ua.to_string()));
            headers.push(("sec-ch-ua-mobile".to_string(), "?0".to_string()));
            if let Some(platform) = self.platform {
                headers.push(("sec-ch-ua-platform".to_string(), platform.to_string()));
            }
        }
        headers.push(("User-Agent".to_string(), self.user_agent.to_string()));
        headers.push(("Referer".to_string(), format!("{}/", origin)));
        headers.push(("Origin".to_string(), origin));
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_identities_are_internally_consistent() {
        for identity in IDENTITIES {
            if identity.user_agent.contains("Chrome/") {
                let hints = identity.sec_ch_ua.expect("chromium UA needs client hints");
                if identity.user_agent.contains("Edg/") {
                    assert!(hints.contains("Microsoft Edge"));
                } else {
                    assert!(hints.contains("Google Chrome"));
                }
                let platform = identity.platform.expect("chromium UA needs a platform");
                if identity.user_agent.contains("Windows NT") {
                    assert_eq!(platform, "\"Windows\"");
                } else {
                    assert_eq!(platform, "\"macOS\"");
                }
            } else {
                assert!(identity.sec_ch_ua.is_none());
            }
        }
    }

    #[test]
    fn random_identity_comes_from_pool() {
        for _ in 0..20 {
            let identity = BrowserIdentity::random();
            assert!(IDENTITIES
                .iter()
                .any(|i| i.user_agent == identity.user_agent));
        }
    }

    #[test]
    fn header_order_and_identity_fields() {
        let identity = IDENTITIES[0];
        let headers = identity.request_headers("https://defillama.com/");
        let names: Vec<&str> = headers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names[0], "Accept");
        assert_eq!(names[names.len() - 2], "Referer");
        assert_eq!(names[names.len() - 1], "Origin");
        assert!(names.contains(&"sec-ch-ua"));
        // decompression is the transport's job
        assert!(!names.contains(&"Accept-Encoding"));

        let referer = &headers.iter().find(|(n, _)| n == "Referer").unwrap().1;
        assert_eq!(referer, "https://defillama.com/");
        let origin = &headers.iter().find(|(n, _)| n == "Origin").unwrap().1;
        assert_eq!(origin, "https://defillama.com");
    }

    #[test]
    fn firefox_identity_sends_no_client_hints() {
        let firefox = IDENTITIES[3];
        let headers = firefox.request_headers("https://defillama.com");
        assert!(headers.iter().all(|(name, _)| !name.starts_with("sec-ch-ua")));
    }
}
