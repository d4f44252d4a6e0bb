//! HTTP exchange types shared by the executor and the transport.
//!
//! # Design
//! A `PreparedRequest` is the fully resolved description of one transfer:
//! URL, verb, final header list and the transport overrides taken from the
//! option map. The executor builds it, a `Transport` performs it, and the
//! result comes back as an `Outcome`. All fields are owned so a prepared
//! request can move into a worker thread without lifetime concerns.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP method for a request, sent as a verbatim verb.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Any other verb, sent as-is.
    Custom(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Custom(verb) => verb,
        }
    }
}

impl From<&str> for HttpMethod {
    fn from(verb: &str) -> Self {
        match verb.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            _ => HttpMethod::Custom(verb.to_string()),
        }
    }
}

impl From<String> for HttpMethod {
    fn from(verb: String) -> Self {
        HttpMethod::from(verb.as_str())
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transfer, resolved and ready for a `Transport`.
///
/// Built by `executor::prepare`. Header names are unique under
/// case-insensitive comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub max_redirects: Option<u32>,
    pub user_agent: Option<String>,
}

impl PreparedRequest {
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            body: None,
            timeout: None,
            connect_timeout: None,
            max_redirects: None,
            user_agent: None,
        }
    }

    /// Value of the header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set `name` to `value`, replacing any existing entry with the same name.
    /// Returns the replaced value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Option<String> {
        match self.headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some(slot) => {
                let previous = std::mem::replace(&mut slot.1, value.to_string());
                slot.0 = name.to_string();
                Some(previous)
            }
            None => {
                self.headers.push((name.to_string(), value.to_string()));
                None
            }
        }
    }
}

/// Result of one transfer.
///
/// `status` is 0 when the transport failed before a response arrived; in that
/// case `error` carries the diagnostic. Any received status, including 4xx and
/// 5xx, is data rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: u16,
    pub body: String,
    pub error: Option<String>,
}

impl Outcome {
    pub fn response(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            error: None,
        }
    }

    /// A transport failure: no status, no body.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            body: String::new(),
            error: Some(message.into()),
        }
    }

    /// True for statuses in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body text for the log and for callers that want text back: the body
    /// when a response arrived, the transport diagnostic otherwise.
    pub fn text(&self) -> &str {
        self.error.as_deref().unwrap_or(&self.body)
    }
}

/// What a single-request caller gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Body (or transport diagnostic), returned when a response is required.
    Body(String),
    /// Status-range check, returned when no response is required.
    Flag(bool),
}

impl Reply {
    pub fn from_outcome(outcome: Outcome, response_required: bool) -> Self {
        if !response_required {
            return Reply::Flag(outcome.is_success());
        }
        match outcome.error {
            Some(message) => Reply::Body(message),
            None => Reply::Body(outcome.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_known_and_custom_verbs() {
        assert_eq!(HttpMethod::from("post"), HttpMethod::Post);
        assert_eq!(HttpMethod::from("PURGE"), HttpMethod::Custom("PURGE".to_string()));
        assert_eq!(HttpMethod::Custom("PURGE".to_string()).as_str(), "PURGE");
        assert_eq!(HttpMethod::default(), HttpMethod::Get);
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut req = PreparedRequest::new("http://localhost", HttpMethod::Get);
        assert_eq!(req.set_header("X-Trace", "1"), None);
        assert_eq!(req.set_header("x-trace", "2"), Some("1".to_string()));
        assert_eq!(req.headers, vec![("x-trace".to_string(), "2".to_string())]);
        assert_eq!(req.header("X-TRACE"), Some("2"));
    }

    #[test]
    fn success_range_is_half_open() {
        assert!(!Outcome::response(199, "").is_success());
        assert!(Outcome::response(200, "").is_success());
        assert!(Outcome::response(299, "").is_success());
        assert!(!Outcome::response(300, "").is_success());
        assert!(!Outcome::failed("refused").is_success());
    }

    #[test]
    fn reply_reduces_to_flag_when_no_response_required() {
        assert_eq!(Reply::from_outcome(Outcome::response(204, ""), false), Reply::Flag(true));
        assert_eq!(Reply::from_outcome(Outcome::response(500, "boom"), false), Reply::Flag(false));
    }

    #[test]
    fn reply_carries_diagnostic_on_transport_failure() {
        let reply = Reply::from_outcome(Outcome::failed("connection refused"), true);
        assert_eq!(reply, Reply::Body("connection refused".to_string()));
        let reply = Reply::from_outcome(Outcome::response(404, "not found"), true);
        assert_eq!(reply, Reply::Body("not found".to_string()));
    }

    #[test]
    fn outcome_serializes_to_json() {
        let json = serde_json::to_value(Outcome::response(404, "not found")).unwrap();
        assert_eq!(json["status"], 404);
        assert_eq!(json["body"], "not found");
        assert!(json["error"].is_null());
    }
}
