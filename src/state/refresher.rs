use crate::state::engine::{Engine, EngineStatus, MatchSource, RefreshOutcome};
use crate::state::messages::PageEvent;
use log::{debug, info};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

pub const DEFAULT_LIVE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Poll cadence: short while something is live, long otherwise, doubled per
/// consecutive failure up to a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPolicy {
    pub live: Duration,
    pub idle: Duration,
    pub max_backoff: Duration,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self {
            live: DEFAULT_LIVE_INTERVAL,
            idle: DEFAULT_IDLE_INTERVAL,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl IntervalPolicy {
    pub fn next_delay(&self, has_live: bool, failures: u32) -> Duration {
        let base = if has_live { self.live } else { self.idle };
        if failures == 0 {
            return base;
        }
        let factor = 2u32.saturating_pow(failures.min(16));
        base.saturating_mul(factor).min(self.max_backoff.max(base))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Refreshing,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopStatus {
    pub lifecycle: Lifecycle,
    pub interval: Duration,
    pub visible: bool,
    pub online: bool,
    pub engine: EngineStatus,
}

/// Drives an [`Engine`] on a timer and reacts to page events.
///
/// While hidden or offline the timer keeps ticking but ticks do not fetch.
/// Becoming visible, coming back online, or an explicit refresh fetches
/// immediately. Unload (or the event channel closing) ends the loop.
pub struct PollLoop<'a, S> {
    engine: &'a Engine<S>,
    policy: IntervalPolicy,
    events: mpsc::Receiver<PageEvent>,
    lifecycle: Lifecycle,
    interval: Duration,
    visible: bool,
    online: bool,
}

impl<'a, S: MatchSource> PollLoop<'a, S> {
    pub fn new(engine: &'a Engine<S>, policy: IntervalPolicy, events: mpsc::Receiver<PageEvent>) -> Self {
        Self {
            engine,
            policy,
            events,
            lifecycle: Lifecycle::Idle,
            interval: policy.idle,
            visible: true,
            online: true,
        }
    }

    /// Run until unload. `on_refresh` sees the engine after every refresh
    /// that was not skipped.
    pub async fn run<F>(mut self, mut on_refresh: F) -> LoopStatus
    where
        F: FnMut(&Engine<S>, &RefreshOutcome),
    {
        self.refresh(&mut on_refresh).await;

        let timer = sleep(self.interval);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = &mut timer => {
                    if self.visible && self.online {
                        self.refresh(&mut on_refresh).await;
                    } else {
                        debug!("tick skipped (visible: {}, online: {})", self.visible, self.online);
                    }
                    timer.as_mut().reset(Instant::now() + self.interval);
                }
                event = self.events.recv() => {
                    let Some(event) = event.filter(|e| *e != PageEvent::Unload) else {
                        break;
                    };
                    if self.handle(event, &mut on_refresh).await {
                        timer.as_mut().reset(Instant::now() + self.interval);
                    }
                }
            }
        }

        self.engine.teardown();
        self.lifecycle = Lifecycle::Stopped;
        info!("poll loop stopped");
        self.status()
    }

    /// Returns whether a refresh ran.
    async fn handle<F>(&mut self, event: PageEvent, on_refresh: &mut F) -> bool
    where
        F: FnMut(&Engine<S>, &RefreshOutcome),
    {
        debug!("page event: {event:?}");
        match event {
            PageEvent::Visible => {
                let was_hidden = !std::mem::replace(&mut self.visible, true);
                if was_hidden && self.online {
                    self.refresh(on_refresh).await;
                    return true;
                }
            }
            PageEvent::Hidden => self.visible = false,
            PageEvent::Online => {
                let was_offline = !std::mem::replace(&mut self.online, true);
                if was_offline {
                    info!("back online");
                    self.refresh(on_refresh).await;
                    return true;
                }
            }
            PageEvent::Offline => {
                info!("offline, polling suspended");
                self.online = false;
            }
            PageEvent::RefreshNow => {
                self.refresh(on_refresh).await;
                return true;
            }
            PageEvent::Unload => {}
        }
        false
    }

    async fn refresh<F>(&mut self, on_refresh: &mut F)
    where
        F: FnMut(&Engine<S>, &RefreshOutcome),
    {
        self.lifecycle = Lifecycle::Refreshing;
        let outcome = self.engine.refresh().await;
        self.lifecycle = Lifecycle::Idle;

        if outcome != RefreshOutcome::Skipped {
            on_refresh(self.engine, &outcome);
        }

        let next = self.policy.next_delay(self.engine.has_live(), self.engine.failures());
        if next != self.interval {
            info!("poll interval now {}s", next.as_secs());
            self.interval = next;
        }
        debug!("{:?}", self.status());
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            lifecycle: self.lifecycle,
            interval: self.interval,
            visible: self.visible,
            online: self.online,
            engine: self.engine.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use crate::state::engine::EngineConfig;
    use crate::state::fallback::FallbackStore;
    use livescore_api::client::{ApiError, ApiResult};
    use livescore_api::{MatchBatch, MatchRecord};
    use std::cell::Cell;

    const PAGE: &str = r#"<div class="match-card"><div id="42" data-start="x">
        <span class="matchname left">A</span>
        <span class="matchTime"><b class="stsrt"></b></span>
        <span class="matchname right">B</span></div></div>
        <p id="score-status">stale</p>"#;

    struct Counting {
        live: bool,
        fail: bool,
        calls: Cell<usize>,
    }

    impl Counting {
        fn new(live: bool, fail: bool) -> Self {
            Self { live, fail, calls: Cell::new(0) }
        }
    }

    impl MatchSource for Counting {
        async fn fetch(&self, ids: &[String]) -> ApiResult<MatchBatch> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(ApiError::Other("down".into()));
            }
            let record = MatchRecord {
                id: ids[0].clone(),
                home: "A".into(),
                away: "B".into(),
                is_live: self.live,
                status: Some(if self.live { "1st half" } else { "scheduled" }.into()),
                ..Default::default()
            };
            let mut batch = MatchBatch::default();
            batch.matches.insert(record.id.clone(), record);
            Ok(batch)
        }
    }

    fn engine(source: &Counting) -> Engine<&Counting> {
        Engine::new(source, Page::parse(PAGE), FallbackStore::in_memory(), EngineConfig::default())
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn delay_follows_live_state_and_backs_off() {
        let policy = IntervalPolicy::default();
        assert_eq!(policy.next_delay(true, 0), secs(10));
        assert_eq!(policy.next_delay(false, 0), secs(30));
        assert_eq!(policy.next_delay(false, 1), secs(60));
        assert_eq!(policy.next_delay(true, 2), secs(40));
        assert_eq!(policy.next_delay(false, 4), secs(300));
        assert_eq!(policy.next_delay(false, 400), secs(300));
    }

    #[test]
    fn ceiling_never_shortens_the_base_interval() {
        let policy = IntervalPolicy { live: secs(10), idle: secs(600), max_backoff: secs(300) };
        assert_eq!(policy.next_delay(false, 3), secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn live_matches_poll_on_the_short_interval() {
        let source = Counting::new(true, false);
        let engine = engine(&source);
        let (tx, rx) = mpsc::channel(4);

        let driver = async {
            settle().await;
            assert_eq!(source.calls.get(), 1);
            sleep(Duration::from_millis(10_500)).await;
            assert_eq!(source.calls.get(), 2);
            tx.send(PageEvent::Unload).await.unwrap();
        };
        let (status, ()) = tokio::join!(PollLoop::new(&engine, IntervalPolicy::default(), rx).run(|_, _| {}), driver);

        assert_eq!(status.lifecycle, Lifecycle::Stopped);
        assert_eq!(status.interval, secs(10));
        assert_eq!(status.engine.live_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_pauses_ticks_and_visible_refreshes_at_once() {
        let source = Counting::new(false, false);
        let engine = engine(&source);
        let (tx, rx) = mpsc::channel(4);
        let mut refreshes = 0;

        let driver = async {
            settle().await;
            tx.send(PageEvent::Hidden).await.unwrap();
            sleep(secs(65)).await;
            assert_eq!(source.calls.get(), 1);

            tx.send(PageEvent::Visible).await.unwrap();
            settle().await;
            assert_eq!(source.calls.get(), 2);
            tx.send(PageEvent::Unload).await.unwrap();
        };
        tokio::join!(
            PollLoop::new(&engine, IntervalPolicy::default(), rx).run(|_, _| refreshes += 1),
            driver
        );
        assert_eq!(refreshes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_suspends_and_reconnect_refreshes() {
        let source = Counting::new(false, false);
        let engine = engine(&source);
        let (tx, rx) = mpsc::channel(4);

        let driver = async {
            settle().await;
            tx.send(PageEvent::Offline).await.unwrap();
            sleep(secs(95)).await;
            assert_eq!(source.calls.get(), 1);

            tx.send(PageEvent::Online).await.unwrap();
            settle().await;
            assert_eq!(source.calls.get(), 2);

            // already online: no extra fetch
            tx.send(PageEvent::Online).await.unwrap();
            settle().await;
            assert_eq!(source.calls.get(), 2);

            tx.send(PageEvent::RefreshNow).await.unwrap();
            settle().await;
            assert_eq!(source.calls.get(), 3);
            tx.send(PageEvent::Unload).await.unwrap();
        };
        tokio::join!(PollLoop::new(&engine, IntervalPolicy::default(), rx).run(|_, _| {}), driver);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_stretch_the_interval() {
        let source = Counting::new(false, true);
        let engine = engine(&source);
        let (tx, rx) = mpsc::channel(4);

        let driver = async {
            settle().await;
            sleep(secs(31)).await;
            assert_eq!(source.calls.get(), 1);
            sleep(secs(30)).await;
            assert_eq!(source.calls.get(), 2);
            tx.send(PageEvent::Unload).await.unwrap();
        };
        let (status, ()) = tokio::join!(PollLoop::new(&engine, IntervalPolicy::default(), rx).run(|_, _| {}), driver);
        assert_eq!(status.engine.failures, 2);
        assert_eq!(status.interval, secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_channel_tears_down() {
        let source = Counting::new(false, false);
        let engine = engine(&source);
        let (tx, rx) = mpsc::channel::<PageEvent>(1);
        drop(tx);

        let status = PollLoop::new(&engine, IntervalPolicy::default(), rx).run(|_, _| {}).await;
        assert_eq!(status.lifecycle, Lifecycle::Stopped);
        let page = engine.page();
        assert_eq!(page.display_text(page.status_slot().unwrap()), "");
    }
}
