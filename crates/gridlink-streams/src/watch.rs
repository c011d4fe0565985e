//! Watch mode: rerun ingestion passes on inbox activity.

use std::path::Path;
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::StreamError;

/// Filesystem events funneled into an async channel. Keep the
/// returned watcher alive for as long as events are wanted.
pub fn watch_inbox(
    inbox_dir: &Path,
) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>), StreamError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        if event.is_ok() {
            let _ = tx.send(());
        }
    })
    .map_err(|e| StreamError::corrupted(format!("watcher setup failed: {e}")))?;
    watcher
        .watch(inbox_dir, RecursiveMode::Recursive)
        .map_err(|e| StreamError::corrupted(format!("cannot watch {}: {e}", inbox_dir.display())))?;
    info!(inbox = %inbox_dir.display(), "Watching inbox");
    Ok((watcher, rx))
}

/// Block until the inbox settles: at least one event, then a quiet
/// gap long enough for the drop to be fully written.
pub async fn await_activity(rx: &mut mpsc::UnboundedReceiver<()>, settle: Duration) -> bool {
    if rx.recv().await.is_none() {
        return false;
    }
    loop {
        match tokio::time::timeout(settle, rx.recv()).await {
            Ok(Some(())) => continue,
            Ok(None) => return false,
            Err(_) => return true,
        }
    }
}
