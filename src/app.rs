use crate::input;
use crate::page::Page;
use crate::state::app_settings::AppSettings;
use crate::state::engine::{Engine, RefreshOutcome};
use crate::state::fallback::FallbackStore;
use crate::state::messages::PageEvent;
use crate::state::refresher::PollLoop;
use anyhow::Context;
use livescore_api::client::{Endpoint, ScoresApi};
use log::{debug, error, info};
use std::fs;
use std::path::Path;
use tokio::sync::mpsc;

pub struct App {
    pub settings: AppSettings,
}

impl App {
    pub fn new(settings: AppSettings) -> Self {
        Self { settings }
    }

    pub fn client(&self) -> ScoresApi {
        let api = ScoresApi::new()
            .with_endpoint(self.settings.endpoint.clone())
            .with_timeout(self.settings.fetch_timeout);
        if !matches!(self.settings.endpoint, Endpoint::Split { .. }) {
            return api;
        }
        api.with_query("competition", &self.settings.competition)
            .with_query("timezone", &self.settings.timezone)
    }

    /// Wire stdin and Ctrl-C to the poll loop, then serve until unload.
    pub async fn run(self) -> anyhow::Result<()> {
        let (events_tx, events_rx) = mpsc::channel::<PageEvent>(16);
        input::spawn_stdin_events(events_tx.clone()).context("failed to start stdin reader")?;
        let signal_task = tokio::spawn(input::unload_on_ctrl_c(events_tx));

        let served = self.serve(events_rx).await;
        signal_task.abort();
        served
    }

    /// Load the page and the fallback store, then poll until unload.
    pub async fn serve(self, events: mpsc::Receiver<PageEvent>) -> anyhow::Result<()> {
        let settings = &self.settings;
        let markup = fs::read_to_string(&settings.page)
            .with_context(|| format!("failed to read page {}", settings.page.display()))?;
        let page = Page::parse(&markup);
        info!("tracking {} matches from {}", page.discover_match_ids().len(), settings.page.display());

        let mut store = FallbackStore::open(&settings.store).with_staleness(settings.staleness);
        store.load_all();

        let engine = Engine::new(self.client(), page, store, settings.engine_config());

        let output = settings.output.as_path();
        let status = PollLoop::new(&engine, settings.intervals, events)
            .run(|engine, outcome| {
                if !matches!(outcome, RefreshOutcome::NothingToUpdate) {
                    write_page(output, &engine.page());
                }
            })
            .await;
        write_page(output, &engine.page());

        info!(
            "stopped after {} consecutive failures, {} matches cached",
            status.engine.failures, status.engine.fallback_entries
        );
        Ok(())
    }
}

fn write_page(path: &Path, page: &Page) {
    match fs::write(path, page.to_html()) {
        Ok(()) => debug!("wrote {}", path.display()),
        Err(e) => error!("failed to write {}: {e}", path.display()),
    }
}
