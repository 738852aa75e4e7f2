//! Stream graph executor
//!
//! Walks the catalog from its roots. Each stream instance (a stream bound
//! to one context) paginates to the end, emitting records as pages arrive,
//! and only then fans out into its children, one branch per record and
//! child stream.

use super::sink::Sink;
use super::types::{ExecutorConfig, InstanceStats, Record, RunReport};
use crate::catalog::{Catalog, Selection, StreamDefinition};
use crate::decode::create_decoder;
use crate::error::{Error, Result};
use crate::http::{ApiRequest, HttpClient};
use crate::pagination::{create_paginator, NextPage, PageToken};
use crate::state::{compare_replication, is_before_start, StateManager};
use crate::template::{self, Context};
use crate::types::scalar_to_string;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runs selected streams of a catalog against one API
pub struct Executor {
    client: Arc<HttpClient>,
    catalog: Arc<Catalog>,
    sink: Arc<dyn Sink>,
    selection: Selection,
    state: StateManager,
    config: ExecutorConfig,
    cancel: CancellationToken,
    report: Mutex<RunReport>,
}

impl Executor {
    /// Create an executor that runs every stream of `catalog`
    pub fn new(client: Arc<HttpClient>, catalog: Arc<Catalog>, sink: Arc<dyn Sink>) -> Self {
        let all: std::collections::HashSet<String> =
            catalog.names().into_iter().map(String::from).collect();

        Self {
            client,
            catalog,
            sink,
            selection: Selection {
                emit: all.clone(),
                traverse: all,
            },
            state: StateManager::in_memory(),
            config: ExecutorConfig::default(),
            cancel: CancellationToken::new(),
            report: Mutex::new(RunReport::new()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: StateManager) -> Self {
        self.state = state;
        self
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run every selected stream to completion
    ///
    /// Branch failures are collected in the report. A run-aborting failure
    /// cancels every in-flight branch.
    pub async fn run(&self) -> RunReport {
        let start = Instant::now();

        let roots: Vec<_> = self
            .catalog
            .roots()
            .filter(|def| self.selection.traverses(&def.name))
            .map(|def| (def, Context::new()))
            .collect();

        info!(
            "Starting extraction: {} root streams, {} streams selected",
            roots.len(),
            self.selection.emit.len()
        );

        let slots = Semaphore::new(self.config.max_concurrency.max(1));
        self.run_all(&slots, roots).await;

        if let Err(e) = self.sink.flush().await {
            warn!("Failed to flush sink: {e}");
        }

        let mut report = std::mem::take(&mut *self.report.lock().await);
        if self.cancel.is_cancelled() {
            report.abort(Error::Cancelled);
        }
        report.duration = start.elapsed();

        info!(
            "Extraction finished in {:?}: {} records, success={}",
            report.duration,
            report.total_records(),
            report.is_success()
        );
        report
    }

    async fn run_all<'a>(
        &'a self,
        slots: &'a Semaphore,
        branches: Vec<(&'a StreamDefinition, Context)>,
    ) {
        let pending: Vec<BoxFuture<'a, ()>> = branches
            .into_iter()
            .map(|(def, ctx)| self.run_branch(slots, def, ctx))
            .collect();

        futures::stream::iter(pending)
            .buffer_unordered(self.config.max_concurrency.max(1))
            .for_each(|()| futures::future::ready(()))
            .await;
    }

    /// One stream instance followed by its subtree
    ///
    /// The instance holds one of `slots` while it paginates and releases it
    /// before fanning out, so `max_concurrency` bounds the instances fetching
    /// at any moment across every level of the graph.
    fn run_branch<'a>(
        &'a self,
        slots: &'a Semaphore,
        def: &'a StreamDefinition,
        ctx: Context,
    ) -> BoxFuture<'a, ()> {
        async move {
            if self.cancel.is_cancelled() {
                return;
            }

            let children: Vec<&StreamDefinition> = self
                .catalog
                .children(&def.name)
                .filter(|child| self.selection.traverses(&child.name))
                .collect();

            let mut stats = InstanceStats::default();
            let result = {
                let Ok(_slot) = slots.acquire().await else {
                    return;
                };
                if self.cancel.is_cancelled() {
                    return;
                }
                self.extract(def, &ctx, !children.is_empty(), &mut stats)
                    .await
            };

            let contexts = match result {
                Ok(contexts) => {
                    self.report
                        .lock()
                        .await
                        .record_instance(&def.name, stats, None);
                    contexts
                }
                Err(e) => {
                    self.fail(def, &ctx, stats, e).await;
                    return;
                }
            };

            let mut branches = Vec::with_capacity(contexts.len() * children.len());
            for child_ctx in contexts {
                for child in &children {
                    branches.push((*child, child_ctx.clone()));
                }
            }
            self.run_all(slots, branches).await;
        }
        .boxed()
    }

    async fn fail(&self, def: &StreamDefinition, ctx: &Context, stats: InstanceStats, e: Error) {
        let mut report = self.report.lock().await;
        report.record_instance(&def.name, stats, Some(&e));

        match e {
            Error::Cancelled => {
                warn!("Stream '{}' {ctx} cancelled", def.name);
            }
            e if e.aborts_run() => {
                error!("Stream '{}' {ctx} aborted the run: {e}", def.name);
                report.abort(e);
                drop(report);
                self.cancel.cancel();
            }
            e => {
                error!("Stream '{}' {ctx} failed: {e}", def.name);
            }
        }
    }

    /// Paginate one stream instance, emitting its records
    ///
    /// Returns the contexts for its children, one per kept record, when
    /// `derive_children` is set.
    async fn extract(
        &self,
        def: &StreamDefinition,
        ctx: &Context,
        derive_children: bool,
        stats: &mut InstanceStats,
    ) -> Result<Vec<Context>> {
        let emit = self.selection.emits(&def.name);
        let partition = ctx.partition_key();
        let bookmark = match def.replication_key {
            Some(_) => self.state.get_bookmark(&def.name, &partition).await,
            None => None,
        };

        // order_by takes the API field name, not the reshaped path
        let sort_key = def
            .replication_key
            .as_deref()
            .and_then(|key| key.rsplit('.').next());
        let paginator = create_paginator(&def.pagination, self.config.page_size, sort_key);
        let decoder = create_decoder(&def.reshape);
        let base = build_request(def, ctx)?;

        info!("Starting stream '{}' {ctx}", def.name);

        let mut token: Option<PageToken> = None;
        let mut newest: Option<String> = None;
        let mut contexts = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut request = base.clone();
            request.query.extend(paginator.request_params(token.as_ref()));

            let response = self.client.fetch(&request, &self.cancel).await?;
            stats.pages += 1;

            let mut kept = 0usize;
            for row in decoder.decode(&response.body)? {
                let row = row?;

                if let Some(value) = def.replication_value(&row).and_then(scalar_to_string) {
                    if is_before_start(&value, bookmark.as_deref(), self.config.start_date) {
                        stats.skipped += 1;
                        continue;
                    }
                    let is_newer = newest
                        .as_deref()
                        .map_or(true, |n| compare_replication(&value, n) == Ordering::Greater);
                    if is_newer {
                        newest = Some(value);
                    }
                }

                if derive_children {
                    contexts.push(def.child_context(ctx, &row)?);
                }
                if emit {
                    self.sink
                        .record(Record::new(def.name.clone(), row, ctx.clone()))
                        .await?;
                    stats.records += 1;
                }
                kept += 1;
            }

            debug!(
                "Stream '{}' {ctx}: page {} kept {kept} rows",
                def.name, stats.pages
            );

            match paginator.next_page(&response.body, &response.headers, token.as_ref()) {
                NextPage::Done => break,
                NextPage::Continue(next) => {
                    if stats.pages >= self.config.max_pages as usize {
                        warn!(
                            "Stream '{}' {ctx} reached the {} page bound, stopping pagination",
                            def.name, self.config.max_pages
                        );
                        break;
                    }
                    token = Some(next);
                }
            }
        }

        if emit && def.replication_key.is_some() {
            if let Some(newest) = newest {
                self.state
                    .advance_bookmark(&def.name, &partition, &newest)
                    .await?;
            }
            self.sink.state(&self.state.snapshot().await).await?;
        }

        info!(
            "Finished stream '{}' {ctx}: {} records, {} pages, {} skipped",
            def.name, stats.records, stats.pages, stats.skipped
        );
        Ok(contexts)
    }
}

/// Resolve a stream's path, params and payload against a context
fn build_request(def: &StreamDefinition, ctx: &Context) -> Result<ApiRequest> {
    let mut request = ApiRequest::get(template::render(&def.path, ctx)?);
    request.method = def.method();

    for (key, value) in &def.params {
        let rendered = template::render(value, ctx)?;
        if !rendered.is_empty() {
            request = request.query(key, rendered);
        }
    }

    if let Some(payload) = &def.payload {
        request = request.json(payload.clone());
    }

    Ok(request)
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("catalog", &self.catalog.name)
            .field("selection", &self.selection)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
