//! The transport capability and its `ureq` implementation.
//!
//! # Design
//! `Transport::perform` runs one blocking transfer and never fails: every
//! problem, from an invalid URL to a refused connection, comes back as an
//! `Outcome` with status 0 and a message. Non-2xx statuses are ordinary data.
//!
//! `UreqTransport` builds a fresh agent per transfer so concurrent transfers
//! share no connection state and per-request overrides (timeouts, redirect
//! limit) never leak into siblings.

use std::fmt;
use std::io::{self, Write};

use ureq::http;
use ureq::{Agent, AsSendBody, Body};

use crate::config::TransportConfig;
use crate::error::ConfigError;
use crate::http::{Outcome, PreparedRequest};

/// Optional writers a transfer streams into.
///
/// With a `body` sink the response body is written there and the returned
/// `Outcome::body` is empty. The `diagnostic` sink receives a curl-style
/// trace of the exchange.
#[derive(Default)]
pub struct Sinks<'a> {
    pub body: Option<&'a mut dyn Write>,
    pub diagnostic: Option<&'a mut dyn Write>,
}

impl<'a> Sinks<'a> {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Performs one HTTP transfer.
pub trait Transport: Send + Sync {
    fn perform(&self, request: &PreparedRequest, sinks: Sinks<'_>) -> Outcome;
}

/// Blocking transport backed by `ureq`.
#[derive(Debug, Clone, Default)]
pub struct UreqTransport {
    config: TransportConfig,
}

impl UreqTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        TransportConfig::from_env().map(Self::new)
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn agent(&self, request: &PreparedRequest) -> Agent {
        Agent::config_builder()
            .http_status_as_error(false)
            .allow_non_standard_methods(true)
            .max_redirects(request.max_redirects.unwrap_or(self.config.max_redirects))
            .max_redirects_will_error(false)
            .timeout_global(request.timeout.or(self.config.timeout))
            .timeout_connect(request.connect_timeout.or(self.config.connect_timeout))
            .build()
            .new_agent()
    }
}

impl Transport for UreqTransport {
    fn perform(&self, request: &PreparedRequest, sinks: Sinks<'_>) -> Outcome {
        let Sinks { body: body_sink, diagnostic } = sinks;
        let mut trace = Trace { sink: diagnostic };
        trace.line(format_args!("* {} {}", request.method, request.url));

        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            trace.line(format_args!("> {name}: {value}"));
            builder = builder.header(name.as_str(), value.as_str());
        }
        let user_agent = request.user_agent.as_ref().or(self.config.user_agent.as_ref());
        if let Some(agent) = user_agent {
            if request.header("user-agent").is_none() {
                trace.line(format_args!("> User-Agent: {agent}"));
                builder = builder.header("user-agent", agent.as_str());
            }
        }

        let agent = self.agent(request);
        let sent = match &request.body {
            Some(body) => send(&agent, builder, body.as_str()),
            None => send(&agent, builder, ()),
        };
        let mut response = match sent {
            Ok(response) => response,
            Err(message) => {
                trace.line(format_args!("* {message}"));
                return Outcome::failed(message);
            }
        };

        let status = response.status().as_u16();
        trace.line(format_args!("< {status}"));
        for (name, value) in response.headers() {
            trace.line(format_args!("< {}: {}", name, String::from_utf8_lossy(value.as_bytes())));
        }

        let read = match body_sink {
            Some(sink) => stream_body(response.body_mut(), sink).map(|_| String::new()),
            // `Body::read_to_vec` caps at 10 MiB; bodies are unbounded here.
            None => response
                .body_mut()
                .with_config()
                .limit(u64::MAX)
                .read_to_vec()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .map_err(|e| e.to_string()),
        };
        match read {
            Ok(body) => Outcome::response(status, body),
            Err(message) => {
                trace.line(format_args!("* body read failed: {message}"));
                Outcome {
                    status,
                    body: String::new(),
                    error: Some(message),
                }
            }
        }
    }
}

fn send(
    agent: &Agent,
    builder: http::request::Builder,
    body: impl AsSendBody,
) -> Result<http::Response<Body>, String> {
    let request = builder.body(body).map_err(|e| format!("invalid request: {e}"))?;
    agent.run(request).map_err(|e| e.to_string())
}

fn stream_body(body: &mut Body, sink: &mut dyn Write) -> Result<u64, String> {
    let mut reader = body.as_reader();
    let copied = io::copy(&mut reader, sink).map_err(|e| e.to_string())?;
    sink.flush().map_err(|e| e.to_string())?;
    Ok(copied)
}

/// Diagnostic trace writer. A failing sink is reported once and dropped.
struct Trace<'a> {
    sink: Option<&'a mut dyn Write>,
}

impl Trace<'_> {
    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = writeln!(sink, "{args}") {
                tracing::warn!(error = %e, "diagnostic sink failed, dropping it");
                self.sink = None;
            }
        }
    }
}
