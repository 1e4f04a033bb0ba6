use crate::components::phase::ClockStyle;
use crate::draw::{self, CONNECTION_ERROR, Provenance};
use crate::page::Page;
use crate::state::fallback::FallbackStore;
use livescore_api::client::{ApiError, ApiResult, DEFAULT_TIMEOUT, ScoresApi};
use livescore_api::MatchBatch;
use log::{debug, info, warn};
use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEGRADED_NOTICE: &str = "Showing saved scores, reconnecting…";

/// Anything that can answer "what is the state of these matches".
#[allow(async_fn_in_trait)]
pub trait MatchSource {
    async fn fetch(&self, ids: &[String]) -> ApiResult<MatchBatch>;
}

impl MatchSource for ScoresApi {
    async fn fetch(&self, ids: &[String]) -> ApiResult<MatchBatch> {
        self.fetch_matches(ids).await
    }
}

impl<T: MatchSource> MatchSource for &T {
    async fn fetch(&self, ids: &[String]) -> ApiResult<MatchBatch> {
        (**self).fetch(ids).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Upper bound on one fetch; a slower answer counts as a failure.
    pub fetch_timeout: Duration,
    /// Consecutive failures before matches with nothing cached show an error.
    pub max_retries: u32,
    pub clock: ClockStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            clock: ClockStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another refresh was already running.
    Skipped,
    /// The page has no match slots.
    NothingToUpdate,
    Updated {
        rendered: usize,
        /// Requested ids the response did not cover, or whose card was malformed.
        unrendered: Vec<String>,
        live: usize,
    },
    Degraded {
        served: usize,
        unrendered: Vec<String>,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub in_flight: bool,
    pub failures: u32,
    pub live_count: usize,
    pub fallback_entries: usize,
    pub last_outcome: Option<RefreshOutcome>,
}

/// Clears the in-flight flag however the refresh ends.
struct InFlight<'a>(&'a Cell<bool>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Fetch/reconcile engine for one page.
///
/// Single-threaded: the page tree is not `Send`, so the engine lives on the
/// task that drives it and all state sits in cells.
pub struct Engine<S> {
    source: S,
    config: EngineConfig,
    page: RefCell<Page>,
    store: RefCell<FallbackStore>,
    in_flight: Cell<bool>,
    failures: Cell<u32>,
    live_count: Cell<usize>,
    last_outcome: RefCell<Option<RefreshOutcome>>,
    /// Time-node markup displaced by a connection error, per match id.
    errored: RefCell<HashMap<String, String>>,
}

impl<S: MatchSource> Engine<S> {
    pub fn new(source: S, page: Page, store: FallbackStore, config: EngineConfig) -> Self {
        Self {
            source,
            config,
            page: RefCell::new(page),
            store: RefCell::new(store),
            in_flight: Cell::new(false),
            failures: Cell::new(0),
            live_count: Cell::new(0),
            last_outcome: RefCell::new(None),
            errored: RefCell::new(HashMap::new()),
        }
    }

    /// One poll: discover, fetch, reconcile. Overlapping calls return
    /// [`RefreshOutcome::Skipped`] without touching the network.
    pub async fn refresh(&self) -> RefreshOutcome {
        if self.in_flight.replace(true) {
            debug!("refresh already in flight, skipping");
            return RefreshOutcome::Skipped;
        }
        let _guard = InFlight(&self.in_flight);

        let ids = self.page.borrow().discover_match_ids();
        let outcome = if ids.is_empty() {
            debug!("no match slots on page");
            RefreshOutcome::NothingToUpdate
        } else {
            debug!("refreshing {} matches", ids.len());
            match self.fetch(&ids).await {
                Ok(batch) => self.apply_batch(&ids, batch),
                Err(err) => self.apply_fallback(&ids, &err),
            }
        };

        *self.last_outcome.borrow_mut() = Some(outcome.clone());
        outcome
    }

    async fn fetch(&self, ids: &[String]) -> ApiResult<MatchBatch> {
        let wait = self.config.fetch_timeout;
        tokio::time::timeout(wait, self.source.fetch(ids))
            .await
            .unwrap_or_else(|_| Err(ApiError::Timeout(format!("score API ({}s budget)", wait.as_secs()))))
    }

    fn apply_batch(&self, ids: &[String], batch: MatchBatch) -> RefreshOutcome {
        self.failures.set(0);

        {
            let mut store = self.store.borrow_mut();
            for record in batch.matches.values() {
                store.put(record.clone());
            }
            if let Err(e) = store.persist_all() {
                warn!("failed to persist fallback store: {e}");
            }
        }

        if let Some(meta) = batch.meta
            && meta.delivered < meta.requested
        {
            debug!("API delivered {:?} of {:?} requested matches", meta.delivered, meta.requested);
        }

        let mut page = self.page.borrow_mut();
        let mut errored = self.errored.borrow_mut();
        let mut rendered = 0;
        let mut unrendered = Vec::new();
        for id in ids {
            let Some(record) = batch.matches.get(id) else {
                unrendered.push(id.clone());
                continue;
            };
            match draw::render(&mut page, record, Provenance::Live, &self.config.clock) {
                Ok(()) => {
                    rendered += 1;
                    errored.remove(id);
                }
                Err(e) => {
                    warn!("skipping match {id}: {e}");
                    unrendered.push(id.clone());
                }
            }
        }
        // The API is reachable again; matches it left out lose their error text.
        for (id, previous) in errored.drain() {
            if let Err(e) = draw::clear_connection_error(&mut page, &id, &previous) {
                debug!("could not restore match {id}: {e}");
            }
        }

        let live = batch.live_count();
        if live != self.live_count.replace(live) {
            info!("{live} live matches");
        }
        if !batch.matches.is_empty() {
            draw::render_title(&mut page, live);
        }
        draw::render_status_slot(&mut page, None);

        info!("rendered {rendered}/{} matches", ids.len());
        RefreshOutcome::Updated { rendered, unrendered, live }
    }

    fn apply_fallback(&self, ids: &[String], err: &ApiError) -> RefreshOutcome {
        let failures = self.failures.get().saturating_add(1);
        self.failures.set(failures);
        warn!("fetch failed ({failures} in a row): {err}");

        let store = self.store.borrow();
        let mut page = self.page.borrow_mut();
        let mut errored = self.errored.borrow_mut();
        let mut served = 0;
        let mut unrendered = Vec::new();
        for id in ids {
            let Some(entry) = store.get(id) else {
                unrendered.push(id.clone());
                continue;
            };
            let provenance = Provenance::Fallback { captured_at: entry.captured_at };
            match draw::render(&mut page, &entry.record, provenance, &self.config.clock) {
                Ok(()) => {
                    served += 1;
                    errored.remove(id);
                }
                Err(e) => {
                    warn!("skipping match {id}: {e}");
                    unrendered.push(id.clone());
                }
            }
        }

        let exhausted = failures >= self.config.max_retries;
        if exhausted {
            for id in &unrendered {
                if store.get(id).is_some() || errored.contains_key(id) {
                    continue;
                }
                match draw::render_connection_error(&mut page, id) {
                    Ok(previous) => {
                        errored.insert(id.clone(), previous);
                    }
                    Err(e) => debug!("no error slot for match {id}: {e}"),
                }
            }
        }

        if served > 0 {
            info!("serving {served} matches from the fallback store");
            draw::render_status_slot(&mut page, Some(DEGRADED_NOTICE));
        } else if exhausted {
            draw::render_status_slot(&mut page, Some(CONNECTION_ERROR));
        }

        RefreshOutcome::Degraded { served, unrendered, error: err.to_string() }
    }

    /// Whether the last successful batch had a live match.
    pub fn has_live(&self) -> bool {
        self.live_count.get() > 0
    }

    pub fn failures(&self) -> u32 {
        self.failures.get()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            in_flight: self.in_flight.get(),
            failures: self.failures.get(),
            live_count: self.live_count.get(),
            fallback_entries: self.store.borrow().len(),
            last_outcome: self.last_outcome.borrow().clone(),
        }
    }

    pub fn page(&self) -> Ref<'_, Page> {
        self.page.borrow()
    }

    /// Release page indicators on unload.
    pub fn teardown(&self) {
        draw::render_status_slot(&mut self.page.borrow_mut(), None);
        debug!("engine torn down");
    }
}
