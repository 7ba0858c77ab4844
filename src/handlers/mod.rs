mod contact;
mod health;
mod metrics;
mod throttle;

pub use contact::contact_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use throttle::api_rate_limit;

use axum::http::HeaderMap;

use crate::rate_limit::client_identifier;

/// First hop of `x-forwarded-for`, then `x-real-ip`, then "unknown".
pub fn forwarded_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .unwrap_or("unknown")
        .to_string()
}

pub fn client_id_from_headers(headers: &HeaderMap) -> String {
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    client_identifier(&forwarded_ip(headers), user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn forwarded_for_wins_over_real_ip() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "10.0.0.2"),
        ]);
        assert_eq!(forwarded_ip(&h), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_real_ip_then_unknown() {
        assert_eq!(forwarded_ip(&headers(&[("x-real-ip", "10.0.0.2")])), "10.0.0.2");
        assert_eq!(forwarded_ip(&headers(&[("x-forwarded-for", " ")])), "unknown");
        assert_eq!(forwarded_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn user_agent_changes_identity() {
        let firefox = headers(&[("x-forwarded-for", "203.0.113.7"), ("user-agent", "Firefox")]);
        let curl = headers(&[("x-forwarded-for", "203.0.113.7"), ("user-agent", "curl")]);
        assert_ne!(client_id_from_headers(&firefox), client_id_from_headers(&curl));
        assert_eq!(
            client_id_from_headers(&firefox),
            client_identifier("203.0.113.7", "Firefox")
        );
    }
}
