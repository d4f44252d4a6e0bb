//! Single and batch dispatch.
//!
//! # Design
//! A batch runs one scoped thread per URL: every thread is spawned before any
//! is joined, and results are collected by joining in submission order, so
//! the returned sequence lines up with the URL list whatever order the
//! transfers finish in. Fan-out is unbounded and nothing is cancellable.
//!
//! Each transfer is logged by its own thread as soon as it completes. The
//! only state the threads share is the `OutcomeLogger`, which serializes
//! appends.
//!
//! The async variants differ in what they hand back, not in how they wait:
//! `async_multi` blocks until the batch is done but returns only correlation
//! IDs, leaving the results to `LogSettings::lookup` or the per-ID files.
//! `spawn_multi` is the non-blocking form: it returns the IDs immediately
//! and runs the batch on a background thread.

use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, instrument, warn};

use crate::error::{ConfigError, DispatchError, LogError};
use crate::executor::{execute, prepare};
use crate::http::{Outcome, Reply};
use crate::id::CorrelationId;
use crate::log::{OutcomeLogger, OutcomeTag, Projected, Projection};
use crate::request::Request;
use crate::spool::{Spool, SpoolKind};
use crate::transport::{Sinks, Transport, UreqTransport};

/// Runs requests against a `Transport` and records their outcomes.
///
/// Cheap to clone; clones share the transport and the log writer.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    logger: Arc<OutcomeLogger>,
    spool: Spool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(UreqTransport::default())
    }
}

impl Dispatcher {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            logger: Arc::new(OutcomeLogger::new()),
            spool: Spool::default(),
        }
    }

    /// `UreqTransport` and spool directory configured from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(UreqTransport::from_env()?).with_spool(Spool::from_env()))
    }

    pub fn with_spool(mut self, spool: Spool) -> Self {
        self.spool = spool;
        self
    }

    pub fn spool(&self) -> &Spool {
        &self.spool
    }

    /// One blocking transfer to the descriptor's URL, logged under its ID.
    #[instrument(skip_all, fields(id = %request.id()))]
    pub fn single(&self, request: &Request) -> Reply {
        let outcome = self.run_one(request, request.id(), request.target_url(), false);
        Reply::from_outcome(outcome, request.is_response_required())
    }

    /// Every URL of the descriptor concurrently; results in submission order.
    /// All records share the descriptor's ID.
    #[instrument(skip_all, fields(id = %request.id(), count = request.target_urls().len()))]
    pub fn multi(&self, request: &Request) -> Vec<Outcome> {
        let jobs: Vec<_> = request
            .target_urls()
            .iter()
            .map(|url| (request.id().clone(), url.as_str()))
            .collect();
        let outcomes = self.scatter(request, &jobs, false);
        report_batch(&outcomes);
        outcomes
    }

    /// Like `single`, with the per-ID response and error files.
    #[instrument(skip_all, fields(id = %request.id()))]
    pub fn async_single(&self, request: &Request) -> Reply {
        let outcome = self.run_one(request, request.id(), request.target_url(), true);
        Reply::from_outcome(outcome, request.is_response_required())
    }

    /// Every URL of the descriptor concurrently, each under a fresh unique ID,
    /// with the per-ID files. Returns the IDs in submission order once all
    /// transfers are complete.
    #[instrument(skip_all, fields(count = request.target_urls().len()))]
    pub fn async_multi(&self, request: &Request) -> Vec<CorrelationId> {
        let ids = fresh_ids(request);
        self.run_async_batch(request, &ids);
        ids
    }

    /// `async_multi` without waiting: the IDs are returned at once and the
    /// batch runs on a background thread.
    pub fn spawn_multi(&self, request: &Request) -> PendingBatch {
        let ids = fresh_ids(request);
        let dispatcher = self.clone();
        let request = request.clone();
        let batch_ids = ids.clone();

        let spawned = thread::Builder::new()
            .name("relay-batch".to_string())
            .spawn(move || dispatcher.run_async_batch(&request, &batch_ids));
        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "could not start batch thread");
                None
            }
        };
        PendingBatch { ids, handle }
    }

    /// The recorded outcome of `id` in the descriptor's `tag` log, projected.
    /// `None` when the ID was never recorded there.
    pub fn lookup(
        &self,
        request: &Request,
        id: &CorrelationId,
        tag: OutcomeTag,
        projection: Projection,
    ) -> Result<Option<Projected>, LogError> {
        let record = request.log_settings().lookup(id, tag)?;
        Ok(record.map(|record| record.project(projection)))
    }

    fn run_async_batch(&self, request: &Request, ids: &[CorrelationId]) {
        let jobs: Vec<_> = ids
            .iter()
            .cloned()
            .zip(request.target_urls().iter().map(String::as_str))
            .collect();
        let outcomes = self.scatter(request, &jobs, true);
        report_batch(&outcomes);
    }

    fn scatter(&self, request: &Request, jobs: &[(CorrelationId, &str)], spooled: bool) -> Vec<Outcome> {
        thread::scope(|s| {
            let handles: Vec<_> = jobs
                .iter()
                .map(|(id, url)| s.spawn(move || self.run_one(request, id, Some(*url), spooled)))
                .collect();

            handles
                .into_iter()
                .zip(jobs)
                .map(|(handle, (id, url))| {
                    handle.join().unwrap_or_else(|_| {
                        warn!(%id, url, "transfer worker panicked");
                        let outcome = Outcome::failed("transfer worker panicked");
                        self.record(request, id, &outcome);
                        outcome
                    })
                })
                .collect()
        })
    }

    fn run_one(&self, request: &Request, id: &CorrelationId, url: Option<&str>, spooled: bool) -> Outcome {
        let outcome = match url {
            None => Outcome::failed("no target URL configured"),
            Some(url) => {
                let prepared = prepare(request, url);
                if spooled {
                    let mut body_file = self.open_spool(id, SpoolKind::Response, request.wants_response_file());
                    let mut error_file = self.open_spool(id, SpoolKind::Error, request.wants_error_file());
                    let sinks = Sinks {
                        body: body_file.as_mut().map(|f| f as &mut dyn Write),
                        diagnostic: error_file.as_mut().map(|f| f as &mut dyn Write),
                    };
                    execute(self.transport.as_ref(), &prepared, sinks)
                } else {
                    execute(self.transport.as_ref(), &prepared, Sinks::none())
                }
            }
        };
        self.record(request, id, &outcome);
        outcome
    }

    fn open_spool(&self, id: &CorrelationId, kind: SpoolKind, wanted: bool) -> Option<File> {
        if !wanted {
            return None;
        }
        match self.spool.create(id, kind) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(%id, error = %e, "per-ID file unavailable, continuing without it");
                None
            }
        }
    }

    fn record(&self, request: &Request, id: &CorrelationId, outcome: &Outcome) {
        if !request.logs_enabled() {
            return;
        }
        let logs = request.log_settings();
        if let Err(e) = self.logger.record_outcome(logs, id, outcome.status, outcome.text()) {
            warn!(%id, error = %e, "outcome not recorded");
        }
    }
}

fn fresh_ids(request: &Request) -> Vec<CorrelationId> {
    request
        .target_urls()
        .iter()
        .map(|_| CorrelationId::unique())
        .collect()
}

fn report_batch(outcomes: &[Outcome]) {
    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    info!(count = outcomes.len(), failed, "batch complete");
}

/// A batch started by `Dispatcher::spawn_multi`.
#[derive(Debug)]
pub struct PendingBatch {
    ids: Vec<CorrelationId>,
    handle: Option<JoinHandle<()>>,
}

impl PendingBatch {
    /// One ID per URL, in submission order.
    pub fn ids(&self) -> &[CorrelationId] {
        &self.ids
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until every transfer of the batch has been recorded.
    pub fn wait(self) -> Result<Vec<CorrelationId>, DispatchError> {
        let handle = self.handle.ok_or(DispatchError::NotStarted)?;
        handle.join().map_err(|_| DispatchError::WorkerPanicked)?;
        Ok(self.ids)
    }
}
