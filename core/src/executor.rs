//! Turns a `Request` into a `PreparedRequest` and runs it.
//!
//! # Design
//! Preparation replays a fixed sequence of writes onto one transfer, and on
//! any conflict the later write wins:
//!
//! 1. target URL and verb from the descriptor;
//! 2. the authorization slot (raw value, then bearer token);
//! 3. the raw option map, in key order;
//! 4. the header mapping.
//!
//! So option-map entries override the descriptor's URL, verb and
//! authorization, and header-mapping entries override header-like option
//! entries. Each silent override is reported with `tracing::warn!`.

use std::time::Instant;

use tracing::{debug, warn};

use crate::http::{Outcome, PreparedRequest};
use crate::request::{Request, TransportOption};
use crate::transport::{Sinks, Transport};

/// Resolve the transfer for `url` under `request`'s shared configuration.
pub fn prepare(request: &Request, url: &str) -> PreparedRequest {
    let id = request.id();
    let mut prepared = PreparedRequest::new(url, request.http_method().clone());

    if let Some(raw) = request.raw_authorization() {
        prepared.set_header("Authorization", raw);
    }
    if let Some(token) = request.bearer() {
        if prepared.set_header("Authorization", &format!("Bearer {token}")).is_some() {
            warn!(%id, "bearer token overrides raw authorization");
        }
    }

    for option in request.option_map().values() {
        match option {
            TransportOption::Url(target) => {
                if target != url {
                    warn!(%id, from = url, to = %target, "option map overrides target URL");
                }
                prepared.url = target.clone();
            }
            TransportOption::CustomRequest(verb) => {
                if verb != prepared.method.as_str() {
                    warn!(%id, from = %prepared.method, to = %verb, "option map overrides method");
                }
                prepared.method = verb.as_str().into();
            }
            TransportOption::HttpHeader(lines) => {
                for line in lines {
                    match line.split_once(':') {
                        Some((name, value)) => {
                            let name = name.trim();
                            if prepared.set_header(name, value.trim()).is_some() {
                                warn!(%id, header = name, "option map overrides header");
                            }
                        }
                        None => warn!(%id, line = %line, "ignoring malformed header line"),
                    }
                }
            }
            TransportOption::Body(body) => prepared.body = Some(body.clone()),
            TransportOption::Timeout(timeout) => prepared.timeout = Some(*timeout),
            TransportOption::ConnectTimeout(timeout) => prepared.connect_timeout = Some(*timeout),
            TransportOption::MaxRedirects(limit) => prepared.max_redirects = Some(*limit),
            TransportOption::UserAgent(agent) => prepared.user_agent = Some(agent.clone()),
        }
    }

    for (name, value) in request.header_map() {
        if let Some(previous) = prepared.set_header(name, value) {
            if previous != *value {
                warn!(%id, header = %name, "header mapping overrides earlier value");
            }
        }
    }

    prepared
}

/// Run one transfer. Never fails: see `Transport::perform`.
pub fn execute(transport: &dyn Transport, request: &PreparedRequest, sinks: Sinks<'_>) -> Outcome {
    let started = Instant::now();
    let outcome = transport.perform(request, sinks);
    debug!(
        method = %request.method,
        url = %request.url,
        status = outcome.status,
        failed = outcome.error.is_some(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "transfer finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::http::HttpMethod;
    use crate::request::TransportOption;

    #[test]
    fn method_defaults_to_get() {
        let prepared = prepare(&Request::get("http://a"), "http://a");
        assert_eq!(prepared.url, "http://a");
        assert_eq!(prepared.method, HttpMethod::Get);
        assert!(prepared.headers.is_empty());
    }

    #[test]
    fn bearer_wins_over_raw_authorization() {
        let request = Request::get("http://a")
            .authorization("Basic dXNlcjpwYXNz")
            .bearer_token("abc");
        let prepared = prepare(&request, "http://a");

        let auth: Vec<_> = prepared
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .collect();
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].1, "Bearer abc");
    }

    #[test]
    fn raw_authorization_alone_is_sent_verbatim() {
        let request = Request::get("http://a").authorization("Token xyz");
        assert_eq!(prepare(&request, "http://a").header("Authorization"), Some("Token xyz"));
    }

    #[test]
    fn header_mapping_wins_over_option_headers() {
        let request = Request::get("http://a")
            .option(TransportOption::HttpHeader(vec![
                "Accept: text/plain".to_string(),
                "X-From-Options: yes".to_string(),
            ]))
            .header("accept", "application/json");
        let prepared = prepare(&request, "http://a");

        assert_eq!(prepared.header("Accept"), Some("application/json"));
        assert_eq!(prepared.header("X-From-Options"), Some("yes"));
        assert_eq!(prepared.headers.len(), 2);
    }

    #[test]
    fn option_headers_override_authorization_slot() {
        let request = Request::get("http://a")
            .bearer_token("abc")
            .option(TransportOption::HttpHeader(vec!["Authorization: Basic Zm9v".to_string()]));
        assert_eq!(prepare(&request, "http://a").header("authorization"), Some("Basic Zm9v"));
    }

    #[test]
    fn option_map_overrides_method_and_url() {
        let request = Request::get("http://a")
            .method("POST")
            .option(TransportOption::CustomRequest("PUT".to_string()))
            .option(TransportOption::Url("http://b".to_string()));
        let prepared = prepare(&request, "http://a");
        assert_eq!(prepared.method, HttpMethod::Put);
        assert_eq!(prepared.url, "http://b");
    }

    #[test]
    fn transfer_options_pass_through() {
        let request = Request::get("http://a").options([
            TransportOption::Body("payload".to_string()),
            TransportOption::Timeout(Duration::from_secs(3)),
            TransportOption::ConnectTimeout(Duration::from_millis(500)),
            TransportOption::MaxRedirects(0),
            TransportOption::UserAgent("relay-test".to_string()),
        ]);
        let prepared = prepare(&request, "http://a");
        assert_eq!(prepared.body.as_deref(), Some("payload"));
        assert_eq!(prepared.timeout, Some(Duration::from_secs(3)));
        assert_eq!(prepared.connect_timeout, Some(Duration::from_millis(500)));
        assert_eq!(prepared.max_redirects, Some(0));
        assert_eq!(prepared.user_agent.as_deref(), Some("relay-test"));
    }

    #[test]
    fn malformed_option_header_is_skipped() {
        let request = Request::get("http://a")
            .option(TransportOption::HttpHeader(vec!["no colon here".to_string()]));
        assert!(prepare(&request, "http://a").headers.is_empty());
    }
}
