//! Folder watch pipeline for incoming photos.
//!
//! A thin wrapper around `notify` that filters raw create notifications down
//! to image files, waits for each file's size to settle, and debounces the
//! settled files into [`ImageBatch`]es. Batches, errors and lifecycle
//! transitions are published on a broadcast channel so any number of
//! subscribers can follow the watcher. A broadcast receiver that falls
//! behind loses events, so consumers that must see every batch take a
//! dedicated unbounded receiver from [`FolderWatcher::batches`].

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use notify::event::{CreateKind, EventKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use relic_model::ImageBatch;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::{JoinHandle, spawn_blocking};
use tokio::time::{Duration, Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{RelicError, Result};

/// Extensions recognised as photos when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "webp"];

/// Configuration knobs for folder watching.
#[derive(Clone, Debug)]
pub struct FolderWatchConfig {
    /// Lowercase extensions without the leading dot.
    pub extensions: Vec<String>,
    /// Quiet period after the last new file before a batch is emitted.
    pub debounce_window: Duration,
    /// How long a file's size must stay unchanged before it counts as added.
    pub stability_window: Duration,
    /// Poll interval while waiting for a file to settle.
    pub stability_poll: Duration,
    /// Capacity of the broadcast channel handed to subscribers. Batch
    /// receivers from [`FolderWatcher::batches`] are not bounded by it.
    pub event_capacity: usize,
}

impl Default for FolderWatchConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            debounce_window: Duration::from_millis(2000),
            stability_window: Duration::from_millis(2000),
            stability_poll: Duration::from_millis(100),
            event_capacity: 64,
        }
    }
}

impl FolderWatchConfig {
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    /// Case-insensitive extension check.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }
}

/// Notifications published by a [`FolderWatcher`].
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Started { folder: PathBuf },
    Images(ImageBatch),
    Error(String),
    Stopped,
}

/// Lossless per-consumer batch queues. Closed receivers are pruned on the
/// next publish.
#[derive(Debug, Clone, Default)]
pub(crate) struct BatchSinks(Arc<StdMutex<Vec<mpsc::UnboundedSender<ImageBatch>>>>);

impl BatchSinks {
    fn attach(&self) -> mpsc::UnboundedReceiver<ImageBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut sinks) = self.0.lock() {
            sinks.push(tx);
        }
        rx
    }

    fn publish(&self, batch: &ImageBatch) {
        if let Ok(mut sinks) = self.0.lock() {
            sinks.retain(|tx| tx.send(batch.clone()).is_ok());
        }
    }
}

/// Returns `true` when `path` exists and is a directory.
pub async fn validate_folder(path: impl AsRef<Path>) -> bool {
    tokio::fs::metadata(path.as_ref())
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

/// Watches one directory and publishes debounced batches of new photos.
pub struct FolderWatcher {
    folder: PathBuf,
    config: FolderWatchConfig,
    events: broadcast::Sender<WatchEvent>,
    batches: BatchSinks,
    active: Mutex<Option<ActiveWatch>>,
}

impl fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("FolderWatcher");
        debug
            .field("folder", &self.folder)
            .field("config", &self.config)
            .field("subscribers", &self.events.receiver_count());
        match self.active.try_lock() {
            Ok(guard) => {
                debug.field("running", &guard.is_some());
            }
            Err(_) => {
                debug.field("running", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl FolderWatcher {
    pub fn new(folder: impl Into<PathBuf>, config: FolderWatchConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            folder: folder.into(),
            config,
            events,
            batches: BatchSinks::default(),
            active: Mutex::new(None),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    /// Receiver for every batch emitted from now on. Unlike [`subscribe`],
    /// batches queue up here until read, however slow the consumer.
    ///
    /// [`subscribe`]: FolderWatcher::subscribe
    pub fn batches(&self) -> mpsc::UnboundedReceiver<ImageBatch> {
        self.batches.attach()
    }

    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Begin watching. Subscription failures are published as
    /// [`WatchEvent::Error`] rather than returned; calling `start` on a
    /// running watcher is a no-op.
    pub async fn start(&self) {
        let mut guard = self.active.lock().await;
        if guard.is_some() {
            return;
        }

        let capacity = self.config.event_capacity.max(64) * 4;
        let (tx, rx) = mpsc::channel::<WatchMessage>(capacity);
        let cancel = CancellationToken::new();

        let batch_task = spawn_batch_loop(
            self.config.clone(),
            rx,
            tx.clone(),
            self.events.clone(),
            self.batches.clone(),
            cancel.clone(),
        );

        let slot: Arc<StdMutex<Option<RecommendedWatcher>>> = Arc::new(StdMutex::new(None));
        let folder = self.folder.clone();
        let events = self.events.clone();
        let init_slot = Arc::clone(&slot);
        let init_cancel = cancel.clone();

        let init_task = tokio::spawn(async move {
            let watch_folder = folder.clone();
            let build_result = spawn_blocking(move || init_watcher(&watch_folder, tx)).await;

            match build_result {
                Ok(Ok(watcher)) => {
                    let Ok(mut slot) = init_slot.lock() else {
                        return;
                    };
                    if init_cancel.is_cancelled() {
                        return;
                    }
                    *slot = Some(watcher);
                    info!(target: "relic::watch", folder = %folder.display(), "watching folder");
                    let _ = events.send(WatchEvent::Started { folder });
                }
                Ok(Err(err)) => {
                    let msg = err.to_string();
                    warn!(target: "relic::watch", folder = %folder.display(), error = %msg, "watcher setup failed");
                    let _ = events.send(WatchEvent::Error(msg));
                }
                Err(join_err) => {
                    let msg = format!("watcher initialization panicked: {join_err}");
                    warn!(target: "relic::watch", folder = %folder.display(), error = %msg, "watcher setup failed");
                    let _ = events.send(WatchEvent::Error(msg));
                }
            }
        });

        *guard = Some(ActiveWatch {
            watcher: slot,
            batch_task,
            init_task,
            cancel,
        });
    }

    /// Stop watching and discard any pending, not yet emitted, files.
    /// Idempotent; [`WatchEvent::Stopped`] is published once per `start`.
    pub async fn stop(&self) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        active.shutdown();
        info!(target: "relic::watch", folder = %self.folder.display(), "folder watcher stopped");
        let _ = self.events.send(WatchEvent::Stopped);
    }
}

struct ActiveWatch {
    watcher: Arc<StdMutex<Option<RecommendedWatcher>>>,
    batch_task: JoinHandle<()>,
    init_task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl ActiveWatch {
    fn shutdown(self) {
        self.cancel.cancel();
        self.init_task.abort();
        self.batch_task.abort();
        // Dropping the watcher stops the notify stream.
        if let Ok(mut slot) = self.watcher.lock() {
            slot.take();
        }
    }
}

pub(crate) enum WatchMessage {
    Event(Event),
    Error(String),
    Settled(PathBuf),
    Vanished(PathBuf),
}

impl fmt::Debug for WatchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMessage::Event(event) => f
                .debug_struct("WatchMessage::Event")
                .field("kind", &event.kind)
                .field("path_count", &event.paths.len())
                .finish(),
            WatchMessage::Error(message) => f
                .debug_struct("WatchMessage::Error")
                .field("message", message)
                .finish(),
            WatchMessage::Settled(path) => f.debug_tuple("WatchMessage::Settled").field(path).finish(),
            WatchMessage::Vanished(path) => {
                f.debug_tuple("WatchMessage::Vanished").field(path).finish()
            }
        }
    }
}

/// Pending files for the current debounce window, in first-seen order.
#[derive(Debug, Default)]
struct PendingBatch {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl PendingBatch {
    fn insert(&mut self, path: PathBuf) -> bool {
        if self.seen.insert(path.clone()) {
            self.paths.push(path);
            true
        } else {
            false
        }
    }

    fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.seen.clear();
        std::mem::take(&mut self.paths)
    }
}

pub(crate) fn spawn_batch_loop(
    config: FolderWatchConfig,
    mut rx: mpsc::Receiver<WatchMessage>,
    settle_tx: mpsc::Sender<WatchMessage>,
    events: broadcast::Sender<WatchEvent>,
    batches: BatchSinks,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending = PendingBatch::default();
        let mut settling: HashSet<PathBuf> = HashSet::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = wait_until(deadline) => {
                    deadline = None;
                    let paths = pending.take();
                    if !paths.is_empty() {
                        debug!(target: "relic::watch", count = paths.len(), "emitting image batch");
                        let batch = ImageBatch::new(paths);
                        batches.publish(&batch);
                        let _ = events.send(WatchEvent::Images(batch));
                    }
                    continue;
                }
                msg = rx.recv() => msg,
            };

            let Some(msg) = msg else {
                break;
            };

            match msg {
                WatchMessage::Event(event) => {
                    for path in candidate_paths(&event) {
                        if !config.accepts(&path) {
                            debug!(target: "relic::watch", path = %path.display(), "ignoring non-image file");
                            continue;
                        }
                        if pending.contains(&path) || settling.contains(&path) {
                            continue;
                        }
                        if config.stability_window.is_zero() {
                            if pending.insert(path) {
                                deadline = Some(Instant::now() + config.debounce_window);
                            }
                        } else {
                            settling.insert(path.clone());
                            spawn_settle(
                                path,
                                config.stability_window,
                                config.stability_poll,
                                settle_tx.clone(),
                                cancel.child_token(),
                            );
                        }
                    }
                }
                WatchMessage::Settled(path) => {
                    settling.remove(&path);
                    if pending.insert(path) {
                        deadline = Some(Instant::now() + config.debounce_window);
                    }
                }
                WatchMessage::Vanished(path) => {
                    settling.remove(&path);
                    debug!(target: "relic::watch", path = %path.display(), "file vanished before settling");
                }
                WatchMessage::Error(error) => {
                    warn!(target: "relic::watch", error = %error, "filesystem watch error");
                    let _ = events.send(WatchEvent::Error(error));
                }
            }
        }
    })
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn spawn_settle(
    path: PathBuf,
    window: Duration,
    poll: Duration,
    tx: mpsc::Sender<WatchMessage>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let settled = tokio::select! {
            _ = cancel.cancelled() => return,
            settled = wait_for_stable_size(&path, window, poll) => settled,
        };
        let msg = if settled {
            WatchMessage::Settled(path)
        } else {
            WatchMessage::Vanished(path)
        };
        let _ = tx.send(msg).await;
    });
}

/// Resolves `true` once the file size has been unchanged for `window`, or
/// `false` if the file disappears first.
async fn wait_for_stable_size(path: &Path, window: Duration, poll: Duration) -> bool {
    let mut last_len: Option<u64> = None;
    let mut stable_since = Instant::now();

    loop {
        match tokio::fs::metadata(path).await {
            Ok(meta) => {
                let len = meta.len();
                if last_len != Some(len) {
                    last_len = Some(len);
                    stable_since = Instant::now();
                } else if stable_since.elapsed() >= window {
                    return true;
                }
            }
            Err(_) => return false,
        }
        sleep(poll).await;
    }
}

/// Paths a notify event contributes as newly added files.
fn candidate_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.get(1).cloned().into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn init_watcher(folder: &Path, tx: mpsc::Sender<WatchMessage>) -> Result<RecommendedWatcher> {
    let path_clone = folder.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) => {
                if let Err(err) = tx.blocking_send(WatchMessage::Event(event)) {
                    warn!(
                        target: "relic::watch",
                        "watch channel send failed for {}: {}",
                        path_clone.display(),
                        err
                    );
                }
            }
            Err(err) => {
                let _ = tx.blocking_send(WatchMessage::Error(err.to_string()));
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|err| {
        RelicError::Watch(format!(
            "failed to create watcher for {}: {}",
            folder.display(),
            err
        ))
    })?;

    // Archived photos may live below the watched folder; only direct
    // children count as intake.
    watcher
        .watch(folder, RecursiveMode::NonRecursive)
        .map_err(|err| RelicError::Watch(format!("failed to watch {}: {}", folder.display(), err)))?;

    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::{Result, anyhow};
    use notify::event::{CreateKind, DataChange};
    use tempfile::tempdir;
    use tokio::time::timeout;

    fn created(path: &str) -> WatchMessage {
        WatchMessage::Event(Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from(path)))
    }

    fn instant_config() -> FolderWatchConfig {
        FolderWatchConfig {
            stability_window: Duration::ZERO,
            ..FolderWatchConfig::default()
        }
    }

    struct Harness {
        tx: mpsc::Sender<WatchMessage>,
        events: broadcast::Receiver<WatchEvent>,
        batches: BatchSinks,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    }

    fn harness(config: FolderWatchConfig) -> Harness {
        let (tx, rx) = mpsc::channel(64);
        let (events_tx, events) = broadcast::channel(config.event_capacity.max(1));
        let batches = BatchSinks::default();
        let cancel = CancellationToken::new();
        let task = spawn_batch_loop(config, rx, tx.clone(), events_tx, batches.clone(), cancel.clone());
        Harness {
            tx,
            events,
            batches,
            cancel,
            task,
        }
    }

    async fn next_batch(events: &mut broadcast::Receiver<WatchEvent>) -> Result<Vec<PathBuf>> {
        loop {
            match events.recv().await? {
                WatchEvent::Images(batch) => return Ok(batch.paths),
                WatchEvent::Error(err) => return Err(anyhow!(err)),
                _ => continue,
            }
        }
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        let config = FolderWatchConfig::default();
        assert!(config.accepts(Path::new("/in/a.JPG")));
        assert!(config.accepts(Path::new("/in/b.heic")));
        assert!(!config.accepts(Path::new("/in/notes.txt")));
        assert!(!config.accepts(Path::new("/in/README")));

        let custom = FolderWatchConfig::default().with_extensions([".TIFF", "png"]);
        assert!(custom.accepts(Path::new("scan.tiff")));
        assert!(!custom.accepts(Path::new("photo.jpg")));
    }

    #[test]
    fn rename_into_folder_counts_as_new_file() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/tmp/elsewhere.jpg"))
            .add_path(PathBuf::from("/in/moved.jpg"));
        assert_eq!(candidate_paths(&event), vec![PathBuf::from("/in/moved.jpg")]);

        let modified = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/in/a.jpg"));
        assert!(candidate_paths(&modified).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_within_window_collapses_into_one_batch() -> Result<()> {
        let mut h = harness(instant_config());
        let started = Instant::now();

        h.tx.send(created("/in/a.jpg")).await?;
        sleep(Duration::from_millis(500)).await;
        h.tx.send(created("/in/b.JPG")).await?;
        h.tx.send(created("/in/notes.txt")).await?;
        h.tx.send(created("/in/a.jpg")).await?;

        let batch = next_batch(&mut h.events).await?;
        assert_eq!(batch, vec![PathBuf::from("/in/a.jpg"), PathBuf::from("/in/b.JPG")]);
        assert!(started.elapsed() >= Duration::from_millis(2500));

        h.cancel.cancel();
        h.task.await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn files_further_apart_than_window_become_separate_batches() -> Result<()> {
        let mut h = harness(instant_config());

        h.tx.send(created("/in/a.jpg")).await?;
        sleep(Duration::from_millis(2500)).await;
        h.tx.send(created("/in/b.png")).await?;

        assert_eq!(next_batch(&mut h.events).await?, vec![PathBuf::from("/in/a.jpg")]);
        assert_eq!(next_batch(&mut h.events).await?, vec![PathBuf::from("/in/b.png")]);

        h.cancel.cancel();
        h.task.await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn notify_errors_are_published_and_loop_keeps_running() -> Result<()> {
        let mut h = harness(instant_config());

        h.tx.send(WatchMessage::Error("permission denied".into())).await?;
        match h.events.recv().await? {
            WatchEvent::Error(message) => assert_eq!(message, "permission denied"),
            other => return Err(anyhow!("unexpected event {other:?}")),
        }

        h.tx.send(created("/in/c.webp")).await?;
        assert_eq!(next_batch(&mut h.events).await?, vec![PathBuf::from("/in/c.webp")]);

        h.cancel.cancel();
        h.task.await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn batch_receivers_keep_every_batch_when_broadcast_lags() -> Result<()> {
        let mut h = harness(FolderWatchConfig {
            event_capacity: 1,
            ..instant_config()
        });
        let mut batches = h.batches.attach();

        for name in ["/in/a.jpg", "/in/b.jpg", "/in/c.jpg"] {
            h.tx.send(created(name)).await?;
            sleep(Duration::from_millis(2500)).await;
        }

        assert!(matches!(
            h.events.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        for name in ["/in/a.jpg", "/in/b.jpg", "/in/c.jpg"] {
            let batch = batches.recv().await.ok_or_else(|| anyhow!("batch channel closed"))?;
            assert_eq!(batch.paths, vec![PathBuf::from(name)]);
        }

        drop(batches);
        h.tx.send(created("/in/d.jpg")).await?;
        sleep(Duration::from_millis(2500)).await;
        assert!(h.batches.0.lock().map(|sinks| sinks.is_empty()).unwrap_or(false));

        h.cancel.cancel();
        h.task.await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_drops_pending_files() -> Result<()> {
        let mut h = harness(instant_config());

        h.tx.send(created("/in/a.jpg")).await?;
        sleep(Duration::from_millis(100)).await;
        h.cancel.cancel();
        h.task.await?;

        assert!(matches!(
            h.events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn settling_waits_for_file_size_to_stop_changing() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("growing.jpg");
        tokio::fs::write(&path, b"part").await?;

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            for _ in 0..3 {
                sleep(Duration::from_millis(40)).await;
                let mut contents = tokio::fs::read(&writer_path).await.unwrap_or_default();
                contents.extend_from_slice(b"more");
                let _ = tokio::fs::write(&writer_path, contents).await;
            }
        });

        let settled = wait_for_stable_size(&path, Duration::from_millis(150), Duration::from_millis(10)).await;
        writer.await?;
        assert!(settled);
        assert_eq!(tokio::fs::metadata(&path).await?.len(), 16);

        let missing = tmp.path().join("gone.jpg");
        assert!(!wait_for_stable_size(&missing, Duration::from_millis(50), Duration::from_millis(10)).await);
        Ok(())
    }

    #[tokio::test]
    async fn validate_folder_requires_existing_directory() -> Result<()> {
        let tmp = tempdir()?;
        let file = tmp.path().join("photo.jpg");
        tokio::fs::write(&file, b"x").await?;

        assert!(validate_folder(tmp.path()).await);
        assert!(!validate_folder(&file).await);
        assert!(!validate_folder(tmp.path().join("missing")).await);
        Ok(())
    }

    #[tokio::test]
    async fn photos_present_before_start_are_ignored() -> Result<()> {
        let tmp = tempdir()?;
        tokio::fs::write(tmp.path().join("old.jpg"), b"already here").await?;
        let config = FolderWatchConfig {
            debounce_window: Duration::from_millis(300),
            stability_window: Duration::from_millis(100),
            stability_poll: Duration::from_millis(20),
            ..FolderWatchConfig::default()
        };
        let watcher = FolderWatcher::new(tmp.path(), config);
        let mut events = watcher.subscribe();
        let mut batches = watcher.batches();

        watcher.start().await;
        match timeout(Duration::from_secs(5), events.recv()).await?? {
            WatchEvent::Started { .. } => {}
            other => return Err(anyhow!("expected Started, got {other:?}")),
        }
        tokio::fs::write(tmp.path().join("new.jpg"), b"fresh").await?;

        let batch = timeout(Duration::from_secs(10), batches.recv())
            .await?
            .ok_or_else(|| anyhow!("batch channel closed"))?;
        assert_eq!(batch.paths, vec![tmp.path().join("new.jpg")]);

        watcher.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn watcher_emits_batches_for_new_images_and_stops_once() -> Result<()> {
        let tmp = tempdir()?;
        let config = FolderWatchConfig {
            debounce_window: Duration::from_millis(300),
            stability_window: Duration::from_millis(100),
            stability_poll: Duration::from_millis(20),
            ..FolderWatchConfig::default()
        };
        let watcher = FolderWatcher::new(tmp.path(), config);
        let mut events = watcher.subscribe();

        watcher.start().await;
        watcher.start().await;
        match timeout(Duration::from_secs(5), events.recv()).await?? {
            WatchEvent::Started { folder } => assert_eq!(folder, tmp.path()),
            other => return Err(anyhow!("expected Started, got {other:?}")),
        }

        tokio::fs::write(tmp.path().join("a.jpg"), b"front").await?;
        tokio::fs::write(tmp.path().join("b.jpg"), b"back").await?;
        tokio::fs::write(tmp.path().join("notes.txt"), b"ignore me").await?;

        let mut batch = timeout(Duration::from_secs(10), next_batch(&mut events)).await??;
        batch.sort();
        assert_eq!(batch, vec![tmp.path().join("a.jpg"), tmp.path().join("b.jpg")]);

        watcher.stop().await;
        watcher.stop().await;
        assert!(!watcher.is_running().await);

        let mut stopped = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, WatchEvent::Stopped) {
                stopped += 1;
            }
        }
        assert_eq!(stopped, 1);
        Ok(())
    }
}
