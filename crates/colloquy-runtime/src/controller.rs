//! Message routing.
//!
//! The [`Controller`] is the bot: it owns the dialog engine and two ordered
//! trigger lists, and routes every inbound message through them inside a
//! single turn.
//!
//! | Order | Source | Wins when |
//! |-------|--------|-----------|
//! | 1 | interrupts | the first interrupt that does not skip |
//! | 2 | active dialog | the dialog consumed the reply |
//! | 3 | triggers | the first trigger that does not skip |
//!
//! Dialog requests made by the winning handler (`begin_dialog`,
//! `cancel_all_dialogs`) are applied before the turn is released.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = load_config()?;
//! let mut controller = Controller::from_config(&config, dialogs, adapter)?;
//! controller.trigger(hears(["hello"]).handler(|ctx: Arc<TriggerContext>| async move {
//!     ctx.begin_dialog("onboarding", Vars::new());
//!     Ok(())
//! }));
//!
//! let report = controller.handle(message).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use colloquy_core::{BoxedAdapter, IncomingMessage};
use colloquy_dialog::{
    BoxError, BoxedStorage, DialogEngine, DialogSet, MemoryStorage, TurnReport,
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::{ColloquyConfig, ConfigError, StorageBackend};
use crate::error::{RuntimeError, RuntimeResult, TriggerSkipped};
use crate::storage::FileStorage;
use crate::trigger::{BoxedTrigger, TriggerContext};

/// Routes inbound messages to interrupts, dialogs and triggers.
#[derive(Clone)]
pub struct Controller {
    engine: DialogEngine,
    interrupts: Vec<BoxedTrigger>,
    triggers: Vec<BoxedTrigger>,
}

impl Controller {
    /// Creates a controller around `engine` with no triggers.
    pub fn new(engine: DialogEngine) -> Self {
        Self {
            engine,
            interrupts: Vec::new(),
            triggers: Vec::new(),
        }
    }

    /// Creates a controller using the dialog and storage settings of `config`.
    pub fn from_config(
        config: &ColloquyConfig,
        dialogs: DialogSet,
        adapter: BoxedAdapter,
    ) -> RuntimeResult<Self> {
        let storage: BoxedStorage = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::File => {
                let dir = config
                    .storage
                    .base_dir
                    .clone()
                    .ok_or_else(|| ConfigError::missing_field("storage.base_dir"))?;
                Arc::new(FileStorage::new(dir))
            }
        };

        info!(
            adapter = adapter.name(),
            storage = ?config.storage.backend,
            dialogs = dialogs.len(),
            "Creating controller"
        );

        let engine =
            DialogEngine::new(dialogs, adapter, storage).with_options(config.dialog.clone());
        Ok(Self::new(engine))
    }

    /// The dialog engine.
    pub fn engine(&self) -> &DialogEngine {
        &self.engine
    }

    /// Registers a trigger consulted before any active dialog.
    pub fn interrupt<S>(&mut self, service: S) -> &mut Self
    where
        S: Service<Arc<TriggerContext>, Response = (), Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        self.interrupts.push(BoxCloneSyncService::new(service));
        self
    }

    /// Registers a trigger consulted when no dialog consumed the message.
    pub fn trigger<S>(&mut self, service: S) -> &mut Self
    where
        S: Service<Arc<TriggerContext>, Response = (), Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        self.triggers.push(BoxCloneSyncService::new(service));
        self
    }

    /// Routes one message and returns what the turn produced.
    pub async fn handle(&self, message: IncomingMessage) -> RuntimeResult<TurnReport> {
        let span = info_span!(
            "turn",
            conversation = %message.reference,
            event = %message.event_type,
        );
        self.route(message).instrument(span).await
    }

    async fn route(&self, message: IncomingMessage) -> RuntimeResult<TurnReport> {
        let mut turn = self.engine.turn(&message.reference).await?;
        let active = turn.is_active();
        let ctx = Arc::new(TriggerContext::new(
            message,
            self.engine.adapter().clone(),
            active,
        ));

        let mut handled = dispatch(&self.interrupts, &ctx).await?;
        if handled {
            debug!("Interrupt handled message");
        } else {
            if active {
                handled = turn.continue_dialog(ctx.message()).await?;
            }
            if !handled {
                handled = dispatch(&self.triggers, &ctx).await?;
            }
        }
        if !handled {
            debug!("No handler matched message");
        }

        let effects = ctx.take_effects();
        if effects.cancel {
            turn.cancel_all_dialogs().await?;
        }
        if let Some((dialog, vars)) = effects.begin {
            turn.begin_dialog(&dialog, vars).await?;
        }

        let mut report = turn.finish();
        let mut sent = effects.sent;
        sent.append(&mut report.sent);
        report.sent = sent;
        Ok(report)
    }

    /// Handles messages from `inbox` until Ctrl+C.
    pub async fn run(&self, inbox: mpsc::Receiver<IncomingMessage>) {
        self.run_until(inbox, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down");
            }
        })
        .await;
    }

    /// Handles messages from `inbox` until it closes or `shutdown` resolves,
    /// then waits for turns in flight.
    ///
    /// Each message is handled on its own task; turns for the same
    /// conversation are serialized by the engine.
    pub async fn run_until<F>(&self, mut inbox: mpsc::Receiver<IncomingMessage>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        info!("Controller is now running");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                message = inbox.recv() => {
                    let Some(message) = message else { break };
                    let controller = self.clone();
                    tasks.spawn(async move {
                        if let Err(e) = controller.handle(message).await {
                            error!(error = %e, "Failed to handle message");
                        }
                    });
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}
        info!("Controller stopped");
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("engine", &self.engine)
            .field("interrupts", &self.interrupts.len())
            .field("triggers", &self.triggers.len())
            .finish()
    }
}

/// Runs `services` in order until one handles the message.
async fn dispatch(services: &[BoxedTrigger], ctx: &Arc<TriggerContext>) -> RuntimeResult<bool> {
    for service in services {
        match service.clone().oneshot(ctx.clone()).await {
            Ok(()) => return Ok(true),
            Err(e) if e.is::<TriggerSkipped>() => continue,
            Err(e) => {
                error!(error = %e, "Trigger handler returned an error");
                return Err(RuntimeError::Trigger(e));
            }
        }
    }
    Ok(false)
}
