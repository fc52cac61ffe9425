//! Long-polling update dispatcher

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use vidmp3_telegram::{Message, Update, UpdateSource};

use crate::handlers::Handlers;

/// What to do with an incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `/start`
    Start,
    /// Plain text, treated as a link
    Link,
    /// Other commands and non-text messages
    Ignore,
}

/// Pick the handler for a message
pub fn route(message: &Message) -> Route {
    if message.text.is_none() {
        return Route::Ignore;
    }
    match message.command() {
        Some("start") => Route::Start,
        Some(_) => Route::Ignore,
        None if message.text.as_deref().is_some_and(|t| t.starts_with('/')) => Route::Ignore,
        None => Route::Link,
    }
}

/// Polls for updates and hands each one to its own task
pub struct Dispatcher {
    source: Arc<dyn UpdateSource>,
    handlers: Arc<Handlers>,
    retry_delay: Duration,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        handlers: Arc<Handlers>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            source,
            handlers,
            retry_delay,
        }
    }

    /// Poll until `shutdown` resolves, then wait for running jobs
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut offset = 0i64;
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer polling");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Update task panicked");
                    }
                }
                polled = self.source.get_updates(offset) => match polled {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            self.dispatch(update, &mut tasks);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Polling failed, retrying");
                        tokio::select! {
                            _ = &mut shutdown => {
                                info!("Shutdown requested, no longer polling");
                                break;
                            }
                            _ = tokio::time::sleep(self.retry_delay) => {}
                        }
                    }
                },
            }
        }

        if !tasks.is_empty() {
            info!(
                in_flight = tasks.len(),
                converting = self.handlers.active_jobs(),
                "Waiting for running jobs"
            );
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Update task panicked");
            }
        }
    }

    fn dispatch(&self, update: Update, tasks: &mut JoinSet<()>) {
        let Some(message) = update.message else {
            debug!(update_id = update.update_id, "Skipping update without message");
            return;
        };

        let handlers = self.handlers.clone();
        match route(&message) {
            Route::Start => {
                tasks.spawn(async move {
                    if let Err(e) = handlers.start(&message).await {
                        warn!(chat_id = message.chat.id, error = %e, "Failed to answer /start");
                    }
                });
            }
            Route::Link => {
                tasks.spawn(async move {
                    if let Err(e) = handlers.handle_link(&message).await {
                        warn!(chat_id = message.chat.id, error = %e, "Failed to handle link");
                    }
                });
            }
            Route::Ignore => {
                debug!(update_id = update.update_id, "Ignoring message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{handlers, message, Call, MockChat};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::oneshot;
    use vidmp3_core::{VidMp3Error, VidMp3Result, INVALID_LINK_TEXT, WELCOME_TEXT};

    /// Serves queued batches, then signals shutdown and blocks
    struct ScriptedSource {
        batches: Mutex<Vec<VidMp3Result<Vec<Update>>>>,
        offsets: Mutex<Vec<i64>>,
        drained: Mutex<Option<oneshot::Sender<()>>>,
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn get_updates(&self, offset: i64) -> VidMp3Result<Vec<Update>> {
            self.offsets.lock().unwrap().push(offset);
            let next = {
                let mut batches = self.batches.lock().unwrap();
                (!batches.is_empty()).then(|| batches.remove(0))
            };
            match next {
                Some(batch) => batch,
                None => {
                    if let Some(tx) = self.drained.lock().unwrap().take() {
                        let _ = tx.send(());
                    }
                    std::future::pending().await
                }
            }
        }
    }

    fn update(id: i64, text: Option<&str>) -> Update {
        Update {
            update_id: id,
            message: Some(message(id, text)),
        }
    }

    #[test]
    fn test_route() {
        assert_eq!(route(&message(1, Some("/start"))), Route::Start);
        assert_eq!(route(&message(1, Some("/help"))), Route::Ignore);
        assert_eq!(route(&message(1, Some("https://youtu.be/x"))), Route::Link);
        assert_eq!(route(&message(1, Some("not a link"))), Route::Link);
        assert_eq!(route(&message(1, None)), Route::Ignore);
    }

    #[tokio::test]
    async fn test_dispatcher_routes_and_advances_offset() {
        let chat = Arc::new(MockChat::default());
        let dir = tempfile::tempdir().unwrap();
        let handlers = Arc::new(handlers(chat.clone(), dir.path(), None));

        let (tx, rx) = oneshot::channel();
        let source = Arc::new(ScriptedSource {
            batches: Mutex::new(vec![
                Ok(vec![update(10, Some("/start")), update(11, Some("/help"))]),
                Err(VidMp3Error::Telegram("Bad Gateway".to_string())),
                Ok(vec![update(12, Some("hello")), update(13, None)]),
            ]),
            offsets: Mutex::new(Vec::new()),
            drained: Mutex::new(Some(tx)),
        });

        let dispatcher = Dispatcher::new(source.clone(), handlers, Duration::from_millis(1));
        dispatcher
            .run(async {
                let _ = rx.await;
            })
            .await;

        // an aborted long poll may be repeated with the same offset
        let offsets = source.offsets.lock().unwrap().clone();
        assert_eq!(offsets[..3], [0, 12, 12]);
        assert!(offsets[3..].iter().all(|&o| o == 14));
        assert!(offsets.len() > 3);

        let calls = chat.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.contains(&Call::Send(WELCOME_TEXT.to_string())));
        assert!(calls.contains(&Call::Send(INVALID_LINK_TEXT.to_string())));
    }

    /// Fails every poll, signalling after the first failure
    struct FailingSource {
        failed: Mutex<Option<oneshot::Sender<()>>>,
    }

    #[async_trait]
    impl UpdateSource for FailingSource {
        async fn get_updates(&self, _offset: i64) -> VidMp3Result<Vec<Update>> {
            if let Some(tx) = self.failed.lock().unwrap().take() {
                let _ = tx.send(());
            }
            Err(VidMp3Error::Telegram("Bad Gateway".to_string()))
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_retry_delay() {
        let chat = Arc::new(MockChat::default());
        let dir = tempfile::tempdir().unwrap();
        let handlers = Arc::new(handlers(chat, dir.path(), None));

        let (tx, rx) = oneshot::channel();
        let source = Arc::new(FailingSource {
            failed: Mutex::new(Some(tx)),
        });

        let dispatcher = Dispatcher::new(source, handlers, Duration::from_secs(3600));
        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.run(async {
                let _ = rx.await;
            }),
        )
        .await;
        assert!(finished.is_ok(), "dispatcher kept sleeping after shutdown");
    }
}
