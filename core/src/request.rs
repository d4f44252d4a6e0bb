//! The request descriptor.
//!
//! # Design
//! `Request` is a plain value built with consuming setters. It is never
//! mutated by a dispatch: every operation borrows it, so one descriptor can
//! be dispatched repeatedly or cloned into a detached batch. Nothing is
//! validated at build time; a missing URL or a missing log path only shows up
//! when the request is executed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::LogSettings;
use crate::http::HttpMethod;
use crate::id::CorrelationId;

/// Key of a raw transport option. At most one value per key is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionKey {
    Url,
    CustomRequest,
    HttpHeader,
    Body,
    Timeout,
    ConnectTimeout,
    MaxRedirects,
    UserAgent,
}

/// A raw transport option, applied after method and authorization so it wins
/// over both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOption {
    /// Replace the target URL.
    Url(String),
    /// Replace the verb.
    CustomRequest(String),
    /// Raw `Name: value` header lines. Entries of the header mapping with the
    /// same name take precedence.
    HttpHeader(Vec<String>),
    /// Request body.
    Body(String),
    Timeout(Duration),
    ConnectTimeout(Duration),
    /// 0 disables redirect following.
    MaxRedirects(u32),
    UserAgent(String),
}

impl TransportOption {
    pub fn key(&self) -> OptionKey {
        match self {
            TransportOption::Url(_) => OptionKey::Url,
            TransportOption::CustomRequest(_) => OptionKey::CustomRequest,
            TransportOption::HttpHeader(_) => OptionKey::HttpHeader,
            TransportOption::Body(_) => OptionKey::Body,
            TransportOption::Timeout(_) => OptionKey::Timeout,
            TransportOption::ConnectTimeout(_) => OptionKey::ConnectTimeout,
            TransportOption::MaxRedirects(_) => OptionKey::MaxRedirects,
            TransportOption::UserAgent(_) => OptionKey::UserAgent,
        }
    }
}

/// Configuration for one dispatch: a single URL or a batch of URLs plus
/// everything every transfer shares.
#[derive(Debug, Clone)]
pub struct Request {
    url: Option<String>,
    urls: Vec<String>,
    method: HttpMethod,
    headers: BTreeMap<String, String>,
    bearer_token: Option<String>,
    authorization: Option<String>,
    options: BTreeMap<OptionKey, TransportOption>,
    response_required: bool,
    logs_enabled: bool,
    logs: LogSettings,
    response_file: bool,
    error_file: bool,
    correlation_id: CorrelationId,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            url: None,
            urls: Vec::new(),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            bearer_token: None,
            authorization: None,
            options: BTreeMap::new(),
            response_required: true,
            logs_enabled: false,
            logs: LogSettings::default(),
            response_file: false,
            error_file: false,
            correlation_id: CorrelationId::coarse(),
        }
    }
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-request descriptor for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new().url(url)
    }

    /// Multi-request descriptor for `urls`, in submission order.
    pub fn batch<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().urls(urls)
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn method(mut self, method: impl Into<HttpMethod>) -> Self {
        self.method = method.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Merge `headers` into the mapping; incoming values win.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Replace the whole header mapping.
    pub fn replace_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Sends `Authorization: Bearer <token>`; wins over `authorization`.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Sends `Authorization: <value>` verbatim.
    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    pub fn option(mut self, option: TransportOption) -> Self {
        self.options.insert(option.key(), option);
        self
    }

    /// Replace the whole option map. Later entries win on duplicate keys.
    pub fn options(mut self, options: impl IntoIterator<Item = TransportOption>) -> Self {
        self.options = options.into_iter().map(|o| (o.key(), o)).collect();
        self
    }

    /// When false, single-request dispatches return a success flag instead of
    /// the body.
    pub fn response_required(mut self, required: bool) -> Self {
        self.response_required = required;
        self
    }

    pub fn enable_logs(mut self) -> Self {
        self.logs_enabled = true;
        self
    }

    /// Enable logging to the given paths.
    pub fn logs(mut self, logs: LogSettings) -> Self {
        self.logs_enabled = true;
        self.logs = logs;
        self
    }

    pub fn success_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.logs.success_path = Some(path.into());
        self
    }

    pub fn error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.logs.error_path = Some(path.into());
        self
    }

    /// Async dispatches stream each body into `<spool>/<id>.response`.
    pub fn response_file(mut self, enabled: bool) -> Self {
        self.response_file = enabled;
        self
    }

    /// Async dispatches write transport diagnostics into `<spool>/<id>.error`.
    pub fn error_file(mut self, enabled: bool) -> Self {
        self.error_file = enabled;
        self
    }

    pub fn correlation_id(mut self, id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = id.into();
        self
    }

    pub fn target_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn target_urls(&self) -> &[String] {
        &self.urls
    }

    pub fn http_method(&self) -> &HttpMethod {
        &self.method
    }

    pub fn header_map(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    pub fn raw_authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn option_map(&self) -> &BTreeMap<OptionKey, TransportOption> {
        &self.options
    }

    pub fn is_response_required(&self) -> bool {
        self.response_required
    }

    pub fn logs_enabled(&self) -> bool {
        self.logs_enabled
    }

    pub fn log_settings(&self) -> &LogSettings {
        &self.logs
    }

    pub fn wants_response_file(&self) -> bool {
        self.response_file
    }

    pub fn wants_error_file(&self) -> bool {
        self.error_file
    }

    pub fn id(&self) -> &CorrelationId {
        &self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let req = Request::new();
        assert_eq!(req.http_method(), &HttpMethod::Get);
        assert!(req.is_response_required());
        assert!(!req.logs_enabled());
        assert!(req.target_url().is_none());
        assert!(req.target_urls().is_empty());
        assert!(!req.wants_response_file());
    }

    #[test]
    fn headers_merge_and_replace() {
        let req = Request::get("http://localhost")
            .header("Accept", "text/plain")
            .headers([("Accept", "application/json"), ("X-Id", "7")]);
        assert_eq!(req.header_map()["Accept"], "application/json");
        assert_eq!(req.header_map().len(), 2);

        let req = req.replace_headers([("X-Only", "1")]);
        assert_eq!(req.header_map().len(), 1);
        assert_eq!(req.header_map()["X-Only"], "1");
    }

    #[test]
    fn option_replaces_same_key() {
        let req = Request::new()
            .option(TransportOption::Timeout(Duration::from_secs(1)))
            .option(TransportOption::Timeout(Duration::from_secs(5)));
        assert_eq!(req.option_map().len(), 1);
        assert_eq!(
            req.option_map()[&OptionKey::Timeout],
            TransportOption::Timeout(Duration::from_secs(5))
        );

        let req = req.options([TransportOption::MaxRedirects(0)]);
        assert_eq!(req.option_map().len(), 1);
        assert!(req.option_map().contains_key(&OptionKey::MaxRedirects));
    }

    #[test]
    fn logs_setter_enables_logging() {
        let req = Request::new().logs(LogSettings::new("/tmp/ok.log", "/tmp/err.log"));
        assert!(req.logs_enabled());
        assert_eq!(req.log_settings().error_path.as_deref(), Some(std::path::Path::new("/tmp/err.log")));
    }

    #[test]
    fn clone_keeps_correlation_id() {
        let req = Request::get("http://localhost").correlation_id("abc123");
        assert_eq!(req.clone().id().as_str(), "abc123");
    }
}
