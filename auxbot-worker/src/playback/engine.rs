//! auxbot-worker/src/playback/engine.rs
//!
//! Owns the queue and the playback state for one worker. Every mutation of
//! either happens under one lock, so concurrent RPC handlers, sink events,
//! fetch completions and the inactivity watchdog see a single timeline.
//!
//! Each `advance()` bumps a [`TrackToken`]. Sink events and fetch results
//! tagged with an older token are stale: a skipped track's "finished" event
//! is ignored, and a download that completes after the engine moved on is
//! deleted instead of played.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use auxbot_common::models::{PlayerStatus, QueueItem};
use auxbot_common::traits::{ErrorReporter, ErrorTags};
use auxbot_common::{Error, ShutdownSignal};

use crate::lifecycle::LifecycleNotifier;
use crate::media::{remove_media_file, MediaFetcher};
use crate::playback::sink::{AudioSink, SinkEvent, SinkEventKind, TrackToken, VoiceTransport};
use crate::playback::state::{PlaybackState, Transition};
use crate::queue::Queue;

pub const SHUTDOWN_REASON_INACTIVITY: &str = "inactivity_timeout";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tenant_id: String,
    /// Silence/pause time after which the worker shuts itself down.
    pub inactivity_timeout: Duration,
    pub check_interval: Duration,
    /// Pause between voice teardown and the shutdown notification.
    pub shutdown_grace: Duration,
    /// Upper bound on one download. A fetch that runs past it fails the item.
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub position: usize,
    /// True when the engine was idle and this add started playback.
    pub started: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipOutcome {
    pub success: bool,
    pub has_next: bool,
    pub message: String,
}

/// Read-only view handed to status RPCs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub status: PlayerStatus,
    pub current: Option<QueueItem>,
    pub queue: Vec<QueueItem>,
}

impl PlayerSnapshot {
    pub fn is_playing(&self) -> bool {
        self.status != PlayerStatus::Idle
    }
}

struct Inner {
    queue: Queue,
    state: PlaybackState,
    token: TrackToken,
    current_file: Option<PathBuf>,
    fetch_task: Option<JoinHandle<()>>,
    shutting_down: bool,
}

#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<Mutex<Inner>>,
    config: Arc<EngineConfig>,
    sink: Arc<dyn AudioSink>,
    voice: Arc<dyn VoiceTransport>,
    fetcher: Arc<dyn MediaFetcher>,
    lifecycle: Arc<dyn LifecycleNotifier>,
    reporter: Arc<dyn ErrorReporter>,
    shutdown: ShutdownSignal,
}

impl PlaybackEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        sink: Arc<dyn AudioSink>,
        voice: Arc<dyn VoiceTransport>,
        fetcher: Arc<dyn MediaFetcher>,
        lifecycle: Arc<dyn LifecycleNotifier>,
        reporter: Arc<dyn ErrorReporter>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                queue: Queue::new(),
                state: PlaybackState::new(),
                token: 0,
                current_file: None,
                fetch_task: None,
                shutting_down: false,
            })),
            config: Arc::new(config),
            sink,
            voice,
            fetcher,
            lifecycle,
            reporter,
            shutdown,
        }
    }

    fn tags(&self, operation: &'static str) -> ErrorTags {
        ErrorTags::new("player", operation).tenant(self.config.tenant_id.clone())
    }

    fn transition(&self, inner: &mut Inner, transition: Transition) -> bool {
        match inner.state.apply(transition) {
            Ok(status) => {
                debug!("Player state is now {}", status);
                true
            }
            Err(e) => {
                debug!("Ignoring transition: {}", e);
                false
            }
        }
    }

    /// Pops the next item and starts fetching it, or goes idle. The caller
    /// holds the lock.
    fn advance_locked(&self, inner: &mut Inner) {
        inner.token += 1;
        if let Some(path) = inner.current_file.take() {
            remove_media_file(&path);
        }

        let Some(item) = inner.queue.pop() else {
            self.transition(inner, Transition::Exhausted);
            info!("No song to play");
            return;
        };

        info!("Now playing: {}", item.media_ref);
        self.transition(inner, Transition::Start(item.clone()));

        let token = inner.token;
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let limit = engine.config.fetch_timeout;
            let result = match tokio::time::timeout(limit, engine.fetcher.fetch(&item.media_ref)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Fetch(format!("Fetch timed out after {}s", limit.as_secs()))),
            };
            engine.on_fetch_complete(token, &item, result);
        });
        // Replacing an unfinished handle detaches that download; its result
        // is discarded as stale when it lands.
        inner.fetch_task = Some(handle);
    }

    fn on_fetch_complete(&self, token: TrackToken, item: &QueueItem, result: Result<PathBuf, Error>) {
        let mut inner = self.inner.lock();
        let stale = token != inner.token || inner.shutting_down;

        match result {
            Ok(path) if stale => {
                debug!("Discarding download of {} for a stale track", item.media_ref);
                remove_media_file(&path);
            }
            Ok(path) => match self.sink.play(&path, token) {
                Ok(()) => {
                    inner.current_file = Some(path);
                    inner.state.touch();
                    // Paused while loading.
                    if inner.state.status() == PlayerStatus::Paused {
                        if let Err(e) = self.sink.pause() {
                            self.reporter.report(&e, &self.tags("pause"));
                        }
                    }
                }
                Err(e) => {
                    self.reporter.report(&e, &self.tags("play").with("url", item.media_ref.clone()));
                    remove_media_file(&path);
                    self.transition(&mut inner, Transition::Failed);
                    self.advance_locked(&mut inner);
                }
            },
            Err(e) => {
                self.reporter.report(&e, &self.tags("fetch").with("url", item.media_ref.clone()));
                if !stale {
                    self.transition(&mut inner, Transition::Failed);
                    self.advance_locked(&mut inner);
                }
            }
        }
    }

    /// Entry point for sink state changes.
    pub fn on_sink_event(&self, event: SinkEvent) {
        let mut inner = self.inner.lock();
        if event.token != inner.token || inner.shutting_down {
            debug!("Ignoring stale sink event {:?}", event);
            return;
        }
        inner.state.touch();

        match event.kind {
            SinkEventKind::Playing => {
                self.transition(&mut inner, Transition::SinkPlaying);
            }
            SinkEventKind::Buffering => {
                self.transition(&mut inner, Transition::SinkBuffering);
            }
            SinkEventKind::Paused => {
                self.transition(&mut inner, Transition::SinkPaused);
            }
            SinkEventKind::Finished => {
                info!("Player is idle");
                self.advance_locked(&mut inner);
            }
            SinkEventKind::Errored(message) => {
                let url = inner
                    .state
                    .current_item()
                    .map(|i| i.media_ref.clone())
                    .unwrap_or_default();
                self.reporter
                    .report(&Error::Sink(message), &self.tags("sink").with("url", url));
                self.transition(&mut inner, Transition::Failed);
                self.advance_locked(&mut inner);
            }
        }
    }

    /// Starts playback if the engine is idle and something is queued.
    pub fn kick(&self) {
        let mut inner = self.inner.lock();
        if inner.state.is_idle() && !inner.shutting_down && !inner.queue.is_empty() {
            self.advance_locked(&mut inner);
        }
    }

    pub fn add_song(&self, media_ref: &str, requester_id: &str) -> AddOutcome {
        let mut inner = self.inner.lock();
        let position = inner.queue.add(media_ref, requester_id);
        let started = inner.state.is_idle() && !inner.shutting_down;
        if started {
            self.advance_locked(&mut inner);
        }
        AddOutcome { position, started }
    }

    /// The outcome is computed before the stop takes effect.
    pub fn skip(&self) -> SkipOutcome {
        let mut inner = self.inner.lock();
        if inner.state.is_idle() {
            return SkipOutcome {
                success: false,
                has_next: false,
                message: "Nothing is currently playing".to_string(),
            };
        }

        let has_next = !inner.queue.is_empty();
        self.sink.stop();
        self.advance_locked(&mut inner);

        SkipOutcome {
            success: true,
            has_next,
            message: if has_next {
                "Skipped to next song".to_string()
            } else {
                "Skipped current song, queue is now empty".to_string()
            },
        }
    }

    /// Empties the queue; the current track keeps playing.
    pub fn clear_queue(&self) {
        self.inner.lock().queue.clear();
    }

    /// `false` means there was nothing to pause. A track still being
    /// fetched starts paused once it lands.
    pub fn pause(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.status() != PlayerStatus::Playing {
            info!("Cannot pause: Player is not playing");
            return false;
        }
        if inner.current_file.is_none() {
            debug!("Pausing before the track has loaded");
        } else if let Err(e) = self.sink.pause() {
            self.reporter.report(&e, &self.tags("pause"));
            return false;
        }
        info!("Playback paused");
        self.transition(&mut inner, Transition::Pause)
    }

    /// `false` means there was nothing to resume.
    pub fn resume(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.status() != PlayerStatus::Paused {
            info!("Cannot resume: Player is not paused");
            return false;
        }
        if inner.current_file.is_none() {
            debug!("Resuming before the track has loaded");
        } else if let Err(e) = self.sink.resume() {
            self.reporter.report(&e, &self.tags("resume"));
            return false;
        }
        info!("Playback resumed");
        self.transition(&mut inner, Transition::Resume)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let inner = self.inner.lock();
        PlayerSnapshot {
            status: inner.state.status(),
            current: inner.state.current_item().cloned(),
            queue: inner.queue.snapshot(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.lock().shutting_down
    }

    /// Waits for in-flight downloads (and any advance they trigger) to land.
    pub async fn flush_pending_fetch(&self) {
        loop {
            let handle = self.inner.lock().fetch_task.take();
            match handle {
                Some(h) => {
                    let _ = h.await;
                }
                None => break,
            }
        }
    }

    /// Runs one watchdog check. Returns true if it started shutdown.
    pub async fn check_inactivity(&self) -> bool {
        let expired = {
            let inner = self.inner.lock();
            !inner.shutting_down
                && inner.state.status() != PlayerStatus::Playing
                && inner.state.last_activity_at().elapsed() >= self.config.inactivity_timeout
        };
        if expired {
            info!("Shutting down due to inactivity");
            self.graceful_shutdown(SHUTDOWN_REASON_INACTIVITY).await;
        }
        expired
    }

    /// Stop output, leave voice, tell the controller, then signal exit 0.
    /// Runs at most once.
    pub async fn graceful_shutdown(&self, reason: &str) {
        {
            let mut inner = self.inner.lock();
            if inner.shutting_down {
                return;
            }
            inner.shutting_down = true;
            inner.token += 1;
            self.sink.stop();
            if let Some(path) = inner.current_file.take() {
                remove_media_file(&path);
            }
        }
        info!("Performing graceful shutdown...");

        info!("Disconnecting from voice channel...");
        if let Err(e) = self.voice.disconnect().await {
            self.reporter.report(&e, &self.tags("gracefulShutdown"));
        }

        tokio::time::sleep(self.config.shutdown_grace).await;

        match self.lifecycle.notify_shutdown(reason).await {
            Ok(ack) => info!("Shutdown notification sent (acknowledged={})", ack),
            Err(e) => {
                // The controller's health sweep reclaims us if this never lands.
                warn!("Failed to notify controller of shutdown: {}", e);
                self.reporter.report(&e, &self.tags("notifyShutdown"));
            }
        }

        self.shutdown.trigger(0);
    }

    /// Drives sink events and the inactivity watchdog until shutdown.
    pub async fn run(self, mut sink_events: UnboundedReceiver<SinkEvent>) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        // The first tick of an interval completes immediately.
        ticker.tick().await;
        self.kick();

        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                Some(event) = sink_events.recv() => self.on_sink_event(event),
                _ = ticker.tick() => {
                    self.check_inactivity().await;
                }
                _ = shutdown.wait() => {
                    debug!("Playback engine loop exiting");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::MockLifecycleNotifier;
    use crate::media::fetcher::MockMediaFetcher;
    use crate::playback::sink::{MockAudioSink, MockVoiceTransport};
    use auxbot_common::traits::TracingReporter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> EngineConfig {
        EngineConfig {
            tenant_id: "guild-1".into(),
            inactivity_timeout: Duration::from_secs(20 * 60),
            check_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(300),
        }
    }

    fn permissive_sink() -> MockAudioSink {
        let mut sink = MockAudioSink::new();
        sink.expect_play().returning(|_, _| Ok(()));
        sink.expect_pause().returning(|| Ok(()));
        sink.expect_resume().returning(|| Ok(()));
        sink.expect_stop().return_const(());
        sink
    }

    fn fetcher_ok() -> MockMediaFetcher {
        let mut fetcher = MockMediaFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|r| Ok(PathBuf::from(format!("/nonexistent/{}.opus", r))));
        fetcher
    }

    fn engine_with(
        sink: MockAudioSink,
        fetcher: MockMediaFetcher,
        lifecycle: MockLifecycleNotifier,
        voice: MockVoiceTransport,
    ) -> (PlaybackEngine, ShutdownSignal) {
        let shutdown = ShutdownSignal::new();
        let engine = PlaybackEngine::new(
            config(),
            Arc::new(sink),
            Arc::new(voice),
            Arc::new(fetcher),
            Arc::new(lifecycle),
            Arc::new(TracingReporter),
            shutdown.clone(),
        );
        (engine, shutdown)
    }

    #[derive(Default)]
    struct CountingReporter {
        reports: AtomicUsize,
    }

    impl ErrorReporter for CountingReporter {
        fn report(&self, _error: &Error, _tags: &ErrorTags) {
            self.reports.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Never finishes, like a yt-dlp stuck on a dead connection.
    struct StuckFetcher;

    #[async_trait::async_trait]
    impl MediaFetcher for StuckFetcher {
        async fn fetch(&self, _media_ref: &str) -> Result<PathBuf, Error> {
            std::future::pending().await
        }
    }

    fn engine() -> PlaybackEngine {
        engine_with(
            permissive_sink(),
            fetcher_ok(),
            MockLifecycleNotifier::new(),
            MockVoiceTransport::new(),
        )
        .0
    }

    fn current_token(engine: &PlaybackEngine) -> TrackToken {
        engine.inner.lock().token
    }

    #[tokio::test]
    async fn add_to_empty_queue_starts_playback() {
        let engine = engine();
        let outcome = engine.add_song("trackA", "user1");
        assert_eq!(outcome, AddOutcome { position: 0, started: true });

        let snap = engine.snapshot();
        assert_eq!(snap.status, PlayerStatus::Playing);
        assert_eq!(snap.current.unwrap().media_ref, "trackA");
        assert!(snap.queue.is_empty());
    }

    #[tokio::test]
    async fn add_while_playing_only_queues() {
        let engine = engine();
        engine.add_song("trackA", "user1");
        let outcome = engine.add_song("trackB", "user2");
        assert_eq!(outcome, AddOutcome { position: 0, started: false });

        let snap = engine.snapshot();
        assert_eq!(snap.current.unwrap().media_ref, "trackA");
        assert_eq!(snap.queue, vec![QueueItem::new("trackB", "user2")]);
    }

    #[tokio::test]
    async fn skip_reports_intended_outcome() {
        let engine = engine();
        assert!(!engine.skip().success);

        engine.add_song("a", "u");
        engine.add_song("b", "u");
        let first = engine.skip();
        assert!(first.success && first.has_next);
        assert_eq!(engine.snapshot().current.unwrap().media_ref, "b");

        let second = engine.skip();
        assert!(second.success && !second.has_next);
        let snap = engine.snapshot();
        assert_eq!(snap.status, PlayerStatus::Idle);
        assert!(snap.current.is_none());

        assert!(!engine.skip().success);
    }

    #[tokio::test]
    async fn stale_finished_event_after_skip_is_ignored() {
        let engine = engine();
        engine.add_song("a", "u");
        engine.flush_pending_fetch().await;
        let old = current_token(&engine);

        engine.add_song("b", "u");
        engine.add_song("c", "u");
        engine.skip();
        // The stopped track reports Finished with its old token.
        engine.on_sink_event(SinkEvent::new(old, SinkEventKind::Finished));

        let snap = engine.snapshot();
        assert_eq!(snap.current.unwrap().media_ref, "b");
        assert_eq!(snap.queue.len(), 1);
    }

    #[tokio::test]
    async fn finished_event_advances_queue() {
        let engine = engine();
        engine.add_song("a", "u");
        engine.add_song("b", "u");
        engine.flush_pending_fetch().await;

        engine.on_sink_event(SinkEvent::new(current_token(&engine), SinkEventKind::Finished));
        assert_eq!(engine.snapshot().current.unwrap().media_ref, "b");

        engine.on_sink_event(SinkEvent::new(current_token(&engine), SinkEventKind::Finished));
        assert_eq!(engine.snapshot().status, PlayerStatus::Idle);
    }

    #[tokio::test]
    async fn sink_error_skips_failed_item_without_requeue() {
        let engine = engine();
        engine.add_song("bad", "u");
        engine.add_song("good", "u");
        engine.flush_pending_fetch().await;

        engine.on_sink_event(SinkEvent::new(
            current_token(&engine),
            SinkEventKind::Errored("decoder blew up".into()),
        ));
        let snap = engine.snapshot();
        assert_eq!(snap.current.unwrap().media_ref, "good");
        assert!(snap.queue.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_advances_to_next() {
        let mut fetcher = MockMediaFetcher::new();
        fetcher.expect_fetch().returning(|r| {
            if r == "broken" {
                Err(Error::Fetch("yt-dlp exited with code 1".into()))
            } else {
                Ok(PathBuf::from("/nonexistent/ok.opus"))
            }
        });
        let mut sink = MockAudioSink::new();
        sink.expect_play().times(1).returning(|_, _| Ok(()));
        sink.expect_stop().return_const(());

        let (engine, _) = engine_with(sink, fetcher, MockLifecycleNotifier::new(), MockVoiceTransport::new());
        engine.add_song("broken", "u");
        engine.add_song("fine", "u");
        engine.flush_pending_fetch().await;

        let snap = engine.snapshot();
        assert_eq!(snap.status, PlayerStatus::Playing);
        assert_eq!(snap.current.unwrap().media_ref, "fine");
    }

    #[tokio::test]
    async fn fetch_that_lands_after_skip_is_discarded() {
        let dir = tempfile::TempDir::new().unwrap();
        let leaked = dir.path().join("slow.opus");
        std::fs::write(&leaked, b"audio").unwrap();

        let mut fetcher = MockMediaFetcher::new();
        {
            let leaked = leaked.clone();
            fetcher.expect_fetch().returning(move |_| Ok(leaked.clone()));
        }
        let plays = Arc::new(AtomicUsize::new(0));
        let mut sink = MockAudioSink::new();
        {
            let plays = plays.clone();
            sink.expect_play().returning(move |_, _| {
                plays.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        sink.expect_stop().return_const(());

        let (engine, _) = engine_with(sink, fetcher, MockLifecycleNotifier::new(), MockVoiceTransport::new());
        engine.add_song("slow", "u");
        let stale_token = current_token(&engine);
        // Skip before the download task has had a chance to run.
        engine.skip();
        engine.on_fetch_complete(stale_token, &QueueItem::new("slow", "u"), Ok(leaked.clone()));

        assert!(!leaked.exists());
        assert_eq!(engine.snapshot().status, PlayerStatus::Idle);

        // The detached download task lands late and is discarded too.
        engine.flush_pending_fetch().await;
        tokio::task::yield_now().await;
        assert_eq!(plays.load(Ordering::SeqCst), 0);
        assert_eq!(engine.snapshot().status, PlayerStatus::Idle);
    }

    #[tokio::test]
    async fn random_interleavings_keep_idle_iff_no_current_item() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        for seed in 0..20u64 {
            let engine = engine();
            let mut rng = StdRng::seed_from_u64(seed);
            for step in 0..200 {
                match rng.random_range(0..9) {
                    0 | 1 => {
                        engine.add_song(&format!("track{}", step), "u");
                    }
                    2 => {
                        let before = engine.snapshot();
                        let outcome = engine.skip();
                        assert_eq!(outcome.success, before.status != PlayerStatus::Idle);
                        assert_eq!(outcome.has_next, outcome.success && !before.queue.is_empty());
                    }
                    3 => {
                        engine.pause();
                    }
                    4 => {
                        engine.resume();
                    }
                    5 => engine.clear_queue(),
                    6 => {
                        let token = current_token(&engine);
                        engine.on_sink_event(SinkEvent::new(token, SinkEventKind::Finished));
                    }
                    7 => {
                        let token = current_token(&engine).saturating_sub(1);
                        engine.on_sink_event(SinkEvent::new(token, SinkEventKind::Errored("stale".into())));
                    }
                    _ => engine.flush_pending_fetch().await,
                }
                let snap = engine.snapshot();
                assert_eq!(
                    snap.status == PlayerStatus::Idle,
                    snap.current.is_none(),
                    "seed {} step {}: {:?}",
                    seed,
                    step,
                    snap
                );
            }
        }
    }

    #[tokio::test]
    async fn pause_and_resume_are_noops_in_wrong_state() {
        let engine = engine();
        assert!(!engine.pause());
        assert!(!engine.resume());
        assert_eq!(engine.snapshot().status, PlayerStatus::Idle);

        engine.add_song("a", "u");
        assert!(!engine.resume());
        assert!(engine.pause());
        assert!(!engine.pause());
        assert_eq!(engine.snapshot().status, PlayerStatus::Paused);
        assert!(engine.resume());
        assert!(!engine.resume());
        assert_eq!(engine.snapshot().status, PlayerStatus::Playing);
    }

    #[tokio::test]
    async fn clear_queue_keeps_current_track() {
        let engine = engine();
        engine.add_song("a", "u");
        engine.add_song("b", "u");
        engine.add_song("c", "u");
        engine.clear_queue();
        let snap = engine.snapshot();
        assert!(snap.queue.is_empty());
        assert_eq!(snap.current.unwrap().media_ref, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn inactivity_shutdown_notifies_once_and_exits_zero() {
        let mut lifecycle = MockLifecycleNotifier::new();
        lifecycle
            .expect_notify_shutdown()
            .withf(|reason| reason.to_string() == SHUTDOWN_REASON_INACTIVITY)
            .times(1)
            .returning(|_| Ok(true));
        let mut voice = MockVoiceTransport::new();
        voice.expect_disconnect().times(1).returning(|| Ok(()));

        let (engine, shutdown) = engine_with(permissive_sink(), fetcher_ok(), lifecycle, voice);

        tokio::time::advance(Duration::from_secs(19 * 60)).await;
        assert!(!engine.check_inactivity().await);
        assert!(!shutdown.is_triggered());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(engine.check_inactivity().await);
        assert_eq!(shutdown.exit_code(), Some(0));

        // A second tick must not notify again.
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!engine.check_inactivity().await);
    }

    #[tokio::test(start_paused = true)]
    async fn playing_time_does_not_count_as_inactivity() {
        let (engine, shutdown) = engine_with(
            permissive_sink(),
            fetcher_ok(),
            MockLifecycleNotifier::new(),
            MockVoiceTransport::new(),
        );
        engine.add_song("long-mix", "u");
        engine.flush_pending_fetch().await;

        tokio::time::advance(Duration::from_secs(3 * 60 * 60)).await;
        assert!(!engine.check_inactivity().await);
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_notify_failure_still_exits() {
        let mut lifecycle = MockLifecycleNotifier::new();
        lifecycle
            .expect_notify_shutdown()
            .times(1)
            .returning(|_| Err(Error::Fetch("controller unreachable".into())));
        let mut voice = MockVoiceTransport::new();
        voice
            .expect_disconnect()
            .returning(|| Err(Error::Voice("already gone".into())));

        let (engine, shutdown) = engine_with(permissive_sink(), fetcher_ok(), lifecycle, voice);
        engine.graceful_shutdown("inactivity_timeout").await;
        assert_eq!(shutdown.exit_code(), Some(0));
        // Adds after shutdown began never restart playback.
        assert!(!engine.add_song("late", "u").started);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_exits_after_watchdog_fires() {
        let mut lifecycle = MockLifecycleNotifier::new();
        lifecycle.expect_notify_shutdown().times(1).returning(|_| Ok(true));
        let mut voice = MockVoiceTransport::new();
        voice.expect_disconnect().returning(|| Ok(()));

        let (engine, shutdown) = engine_with(permissive_sink(), fetcher_ok(), lifecycle, voice);
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = tokio::spawn(engine.clone().run(rx));

        assert_eq!(shutdown.wait().await, 0);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_fetch_times_out_and_lets_watchdog_fire() {
        let mut lifecycle = MockLifecycleNotifier::new();
        lifecycle
            .expect_notify_shutdown()
            .withf(|reason| reason.to_string() == SHUTDOWN_REASON_INACTIVITY)
            .times(1)
            .returning(|_| Ok(true));
        let mut voice = MockVoiceTransport::new();
        voice.expect_disconnect().times(1).returning(|| Ok(()));
        let mut sink = MockAudioSink::new();
        sink.expect_play().never();
        sink.expect_stop().return_const(());
        let reporter = Arc::new(CountingReporter::default());

        let shutdown = ShutdownSignal::new();
        let engine = PlaybackEngine::new(
            config(),
            Arc::new(sink),
            Arc::new(voice),
            Arc::new(StuckFetcher),
            Arc::new(lifecycle),
            reporter.clone(),
            shutdown.clone(),
        );

        let started = tokio::time::Instant::now();
        engine.add_song("stuck", "u");
        assert_eq!(engine.snapshot().status, PlayerStatus::Playing);

        engine.flush_pending_fetch().await;
        assert!(started.elapsed() >= config().fetch_timeout);
        assert_eq!(engine.snapshot().status, PlayerStatus::Idle);
        assert_eq!(reporter.reports.load(Ordering::SeqCst), 1);

        tokio::time::advance(config().inactivity_timeout).await;
        assert!(engine.check_inactivity().await);
        assert_eq!(shutdown.exit_code(), Some(0));
    }

    #[tokio::test]
    async fn pause_while_loading_is_not_an_error() {
        let pauses = Arc::new(AtomicUsize::new(0));
        let mut sink = MockAudioSink::new();
        sink.expect_play().times(1).returning(|_, _| Ok(()));
        {
            let pauses = pauses.clone();
            sink.expect_pause().returning(move || {
                pauses.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        sink.expect_resume().times(1).returning(|| Ok(()));
        sink.expect_stop().return_const(());
        let reporter = Arc::new(CountingReporter::default());

        let engine = PlaybackEngine::new(
            config(),
            Arc::new(sink),
            Arc::new(MockVoiceTransport::new()),
            Arc::new(fetcher_ok()),
            Arc::new(MockLifecycleNotifier::new()),
            reporter.clone(),
            ShutdownSignal::new(),
        );

        engine.add_song("a", "u");
        assert!(engine.pause());
        assert_eq!(pauses.load(Ordering::SeqCst), 0);
        assert_eq!(engine.snapshot().status, PlayerStatus::Paused);

        // The track lands and starts out paused.
        engine.flush_pending_fetch().await;
        assert_eq!(pauses.load(Ordering::SeqCst), 1);
        assert_eq!(engine.snapshot().status, PlayerStatus::Paused);

        assert!(engine.resume());
        assert_eq!(engine.snapshot().status, PlayerStatus::Playing);
        assert_eq!(reporter.reports.load(Ordering::SeqCst), 0);
    }
}
