use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::{error, info, warn};

/// Events closer together than this are handled as one change
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Calls back once per burst of file changes under the watched paths
pub struct PathWatcher {
    _watcher: RecommendedWatcher,
}

impl PathWatcher {
    pub fn new<F>(paths: Vec<PathBuf>, on_change: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(tx, Config::default())?;

        for path in &paths {
            if Path::new(path).exists() {
                watcher.watch(path, RecursiveMode::Recursive)?;
                info!("Watching {}", path.display());
            } else {
                warn!("Watch path does not exist, skipping: {}", path.display());
            }
        }

        std::thread::spawn(move || loop {
            match rx.recv() {
                Ok(Ok(event)) if is_content_change(&event) => {
                    if !drain_burst(&rx) {
                        break;
                    }
                    info!("Change detected under {:?}", event.paths);
                    on_change();
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("Watch error: {:?}", e),
                Err(_) => break,
            }
        });

        Ok(Self { _watcher: watcher })
    }
}

fn is_content_change(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Swallow events until the stream is quiet; false once the sender is gone
fn drain_burst(rx: &Receiver<notify::Result<Event>>) -> bool {
    loop {
        match rx.recv_timeout(DEBOUNCE) {
            Ok(_) => continue,
            Err(RecvTimeoutError::Timeout) => return true,
            Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
}
