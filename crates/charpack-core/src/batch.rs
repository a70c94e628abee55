use crate::convert::{convert, ConvertOptions, ConvertOutcome};
use crate::ConvertError;
use charpack_store::PackageStore;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

/// Bounded concurrency: archiving and hashing are disk- and CPU-heavy, so
/// the pool stays small.
pub const DEFAULT_WORKERS: usize = 3;

/// Advisory lock on the store root, held for the duration of mutating
/// command runs.
pub struct StoreLock {
    lock_file: File,
}

impl StoreLock {
    pub fn acquire(lock_path: &Path) -> Result<Self, ConvertError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;

        file.lock_exclusive()
            .map_err(|e| ConvertError::Io(std::io::Error::new(std::io::ErrorKind::WouldBlock, e)))?;

        Ok(Self { lock_file: file })
    }

    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, ConvertError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

/// Cooperative cancellation signal shared between the caller and the batch
/// workers. Cancelling stops the scheduling of not-yet-started conversions;
/// in-flight conversions run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Wire Ctrl-C to the token. A second Ctrl-C exits immediately.
pub fn install_ctrlc(token: &CancelToken) {
    let token = token.clone();
    let _ = ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(1);
        }
        token.cancel();
        eprintln!("\ncancellation requested, letting running conversions finish...");
    });
}

/// One per-character progress update, delivered over an unbounded channel so
/// sends never block a worker.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub character: String,
    pub percent: u8,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub character: String,
    pub result: Result<ConvertOutcome, ConvertError>,
}

/// Convert many character bundles over a fixed worker pool.
///
/// Per-character failures are caught at this boundary, logged with the
/// character's identity, and collected as failed outcomes; sibling
/// conversions proceed independently. The returned list covers every
/// conversion that was started; entries skipped due to cancellation are
/// simply absent.
pub fn run_batch(
    char_dirs: &[PathBuf],
    shared_dir: &Path,
    store: &PackageStore,
    options: &ConvertOptions,
    workers: usize,
    cancel: &CancelToken,
    events: &Sender<ProgressEvent>,
) -> Vec<BatchOutcome> {
    let next = AtomicUsize::new(0);
    let outcomes = Mutex::new(Vec::with_capacity(char_dirs.len()));
    let workers = workers.clamp(1, char_dirs.len().max(1));

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let next = &next;
            let outcomes = &outcomes;
            let events = events.clone();
            scope.spawn(move || loop {
                if cancel.is_cancelled() {
                    info!("cancellation requested, not scheduling further conversions");
                    break;
                }
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(char_dir) = char_dirs.get(index) else {
                    break;
                };
                let character = char_dir
                    .file_name()
                    .map_or_else(|| char_dir.display().to_string(), |n| {
                        n.to_string_lossy().into_owned()
                    });

                let sink_events = events.clone();
                let sink_name = character.clone();
                let sink = move |percent: u8| {
                    let _ = sink_events.send(ProgressEvent {
                        character: sink_name.clone(),
                        percent,
                    });
                };

                let result = convert(char_dir, shared_dir, store, options, &sink);
                if let Err(e) = &result {
                    error!("-- conversion failed for {character}: {e}");
                }

                outcomes
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(BatchOutcome { character, result });
            });
        }
    });

    outcomes
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
}
