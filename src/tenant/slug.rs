use axum::http::HeaderMap;
use thiserror::Error;

/// Development-only header naming the trust directly.
pub const TRUST_SLUG_HEADER: &str = "x-trust-slug";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("Unable to determine trust from domain '{0}'")]
    NoSubdomain(String),

    #[error("Missing Host header")]
    MissingHost,
}

/// First label of a host with at least three labels, e.g. `dev-trust` from
/// `dev-trust.example.com:8080`. `www` is never a tenant.
pub fn subdomain_of(host: &str) -> Option<String> {
    let host = host.trim();
    let host = host.split(':').next().unwrap_or(host);
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 3 {
        return None;
    }
    // Dotted IPv4 addresses have no tenant label
    if labels.iter().all(|l| l.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let first = labels[0].to_ascii_lowercase();
    if first == "www" {
        return None;
    }
    Some(first)
}

/// Tenant slug for a request.
///
/// Production: subdomain only. Development: `X-Trust-Slug`, then the
/// subdomain, then `dev_default`.
pub fn resolve_slug(headers: &HeaderMap, development: bool, dev_default: &str) -> Result<String, SlugError> {
    if development {
        if let Some(slug) = headers
            .get(TRUST_SLUG_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
        {
            return Ok(slug);
        }
    }

    let host = headers.get(axum::http::header::HOST).and_then(|v| v.to_str().ok());

    match host.and_then(subdomain_of) {
        Some(slug) => Ok(slug),
        None if development => Ok(dev_default.to_string()),
        None => match host {
            Some(h) => Err(SlugError::NoSubdomain(h.to_string())),
            None => Err(SlugError::MissingHost),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn subdomain_extraction() {
        assert_eq!(subdomain_of("dev-trust.erp.example.com"), Some("dev-trust".into()));
        assert_eq!(subdomain_of("Green.example.com:8443"), Some("green".into()));
        assert_eq!(subdomain_of("example.com"), None);
        assert_eq!(subdomain_of("www.example.com"), None);
        assert_eq!(subdomain_of("localhost:3000"), None);
        assert_eq!(subdomain_of("10.0.0.12"), None);
    }

    #[test]
    fn production_uses_subdomain_only() {
        let h = headers(&[("host", "greenvalley.erp.example.com"), ("x-trust-slug", "other")]);
        assert_eq!(resolve_slug(&h, false, "dev-trust").unwrap(), "greenvalley");
    }

    #[test]
    fn production_without_subdomain_is_domain_error() {
        let h = headers(&[("host", "example.com")]);
        assert_eq!(
            resolve_slug(&h, false, "dev-trust"),
            Err(SlugError::NoSubdomain("example.com".into()))
        );
        assert_eq!(resolve_slug(&HeaderMap::new(), false, "dev-trust"), Err(SlugError::MissingHost));
    }

    #[test]
    fn development_prefers_header_then_default() {
        let h = headers(&[("host", "localhost:3000"), ("x-trust-slug", "Sunrise")]);
        assert_eq!(resolve_slug(&h, true, "dev-trust").unwrap(), "sunrise");

        let h = headers(&[("host", "localhost:3000")]);
        assert_eq!(resolve_slug(&h, true, "dev-trust").unwrap(), "dev-trust");

        let h = headers(&[("host", "alpha.lvh.me:3000")]);
        assert_eq!(resolve_slug(&h, true, "dev-trust").unwrap(), "alpha");
    }
}
