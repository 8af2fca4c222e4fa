use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use notify_debouncer_full::{
    new_debouncer, DebouncedEvent,
    notify::{RecursiveMode, Watcher, Error as NotifyError},
};
use tracing::{debug, error, info};

use crate::content_loader::reload_content;
use crate::state::{AppState, RefreshBroadcaster};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(tx): State<RefreshBroadcaster>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, tx))
}

async fn handle_socket(mut socket: WebSocket, tx: RefreshBroadcaster) {
    let mut rx = tx.subscribe();

    if rx.recv().await.is_ok() {
        if socket.send(Message::Text("reload".to_string().into())).await.is_err() {
            debug!("Client disconnected before reload message could be sent");
        }
    }
}

/// Editor lock files and backups (`.#post.md`, `post.md~`) do not trigger a reload.
fn is_temp_file(event: &DebouncedEvent) -> bool {
    event.event.paths.iter().any(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |s| s.starts_with(".#") || s.ends_with('~'))
    })
}

fn is_relevant(event: &DebouncedEvent) -> bool {
    let kind = event.kind;
    (kind.is_modify() || kind.is_create() || kind.is_remove()) && !is_temp_file(event)
}

/// Watches the content directory and reloads bundled content on change.
/// Only started in development.
pub fn start_content_watcher(tx: RefreshBroadcaster, app_state: Arc<AppState>) {
    info!("Starting content watcher for hot-reload...");
    tokio::spawn(async move {
        let (watcher_tx, mut watcher_rx) = tokio::sync::mpsc::channel(1);

        let debouncer = new_debouncer(Duration::from_millis(200), None, move |res: Result<Vec<DebouncedEvent>, Vec<NotifyError>>| {
            match res {
                Ok(events) => {
                    let relevant: Vec<&DebouncedEvent> = events.iter().filter(|e| is_relevant(e)).collect();
                    if !relevant.is_empty() {
                        debug!("Relevant file change detected: {:?}", relevant.iter().flat_map(|e| &e.event.paths).map(|p| p.display()).collect::<Vec<_>>());
                        if let Err(e) = watcher_tx.blocking_send(()) {
                            error!("Failed to send watcher event: {}", e);
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!("Watcher error: {}", e);
                    }
                }
            }
        });

        let mut debouncer = match debouncer {
            Ok(debouncer) => debouncer,
            Err(e) => {
                error!("Failed to create debouncer, hot reload disabled: {}", e);
                return;
            }
        };

        let content_dir = app_state.config.content_dir.clone();
        if let Err(e) = debouncer.watcher().watch(&content_dir, RecursiveMode::Recursive) {
            error!("Failed to watch {}: {}", content_dir.display(), e);
            return;
        }

        // Keep the debouncer alive and wait for events
        while watcher_rx.recv().await.is_some() {
            info!("Content change detected, reloading content and sending signal...");

            reload_content(&app_state).await;

            // Fails only when no browser is connected.
            if let Err(e) = tx.send(()) {
                debug!("No reload listeners: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{path::PathBuf, time::Instant};

    use notify_debouncer_full::notify::{
        event::{AccessKind, CreateKind, ModifyKind},
        Event, EventKind,
    };

    fn event(kind: EventKind, path: &str) -> DebouncedEvent {
        DebouncedEvent::new(Event::new(kind).add_path(PathBuf::from(path)), Instant::now())
    }

    #[test]
    fn edits_to_posts_trigger_reload() {
        assert!(is_relevant(&event(EventKind::Modify(ModifyKind::Any), "content/posts/01.md")));
        assert!(is_relevant(&event(EventKind::Create(CreateKind::File), "content/about.toml")));
    }

    #[test]
    fn editor_temp_files_and_reads_are_ignored() {
        let lock = event(EventKind::Modify(ModifyKind::Any), "content/posts/.#01.md");
        assert!(is_temp_file(&lock));
        assert!(!is_relevant(&lock));

        let backup = event(EventKind::Create(CreateKind::File), "content/layout.html~");
        assert!(!is_relevant(&backup));

        assert!(!is_relevant(&event(EventKind::Access(AccessKind::Any), "content/home.md")));
    }
}
