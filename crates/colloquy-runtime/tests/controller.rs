use std::sync::Arc;

use async_trait::async_trait;
use colloquy_core::{
    Activity, Adapter, AdapterResult, ConversationReference, DeliveryReceipt, IncomingMessage,
};
use colloquy_dialog::{
    Answer, BoxError, Conversation, DialogContext, DialogEngine, DialogOptions, DialogSet,
    MemoryStorage, NoMatchPolicy, SessionStatus, Vars,
};
use colloquy_runtime::config::{ColloquyConfig, StorageBackend};
use colloquy_runtime::{Controller, RuntimeError, ServiceBuilderExt, TriggerContext, hears, on};
use parking_lot::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
struct RecordingAdapter {
    sent: Mutex<Vec<Activity>>,
}

impl RecordingAdapter {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|a| a.text_or_empty().to_string())
            .collect()
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn name(&self) -> &str {
        "test"
    }

    async fn send(
        &self,
        activity: &Activity,
        _reference: &ConversationReference,
    ) -> AdapterResult<DeliveryReceipt> {
        self.sent.lock().push(activity.clone());
        Ok(DeliveryReceipt::new("test"))
    }
}

fn dialogs() -> DialogSet {
    let mut onboarding = Conversation::new("onboarding");
    onboarding
        .ask("What is your name?", Answer::capture("name"))
        .say("Nice to meet you, {{vars.name}}!");
    DialogSet::new().with(onboarding).unwrap()
}

fn reference() -> ConversationReference {
    ConversationReference::new("test", "room-1", "ann")
}

fn say(text: &str) -> IncomingMessage {
    IncomingMessage::text(reference(), text)
}

fn controller() -> (Controller, Arc<RecordingAdapter>) {
    let adapter = Arc::new(RecordingAdapter::default());
    let engine = DialogEngine::new(dialogs(), adapter.clone(), Arc::new(MemoryStorage::new()));
    let mut controller = Controller::new(engine);

    controller
        .interrupt(
            hears(["^cancel$"])
                .rule(|ctx| ctx.is_dialog_active())
                .handler(|ctx: Arc<TriggerContext>| async move {
                    ctx.cancel_all_dialogs();
                    ctx.say("Cancelled.").await?;
                    Ok::<_, BoxError>(())
                }),
        )
        .trigger(hears(["hello", "hi"]).handler(|ctx: Arc<TriggerContext>| async move {
            ctx.say("Hi {{vars.user}}!").await?;
            ctx.begin_dialog("onboarding", Vars::new());
            Ok::<_, BoxError>(())
        }))
        .trigger(on("typing").handler(|ctx: Arc<TriggerContext>| async move {
            ctx.say("(typing noticed)").await?;
            Ok::<_, BoxError>(())
        }))
        .trigger(on("explode").handler(|_ctx: Arc<TriggerContext>| async move {
            Err::<(), _>(BoxError::from("kaboom"))
        }));

    (controller, adapter)
}

#[tokio::test]
async fn test_trigger_begins_dialog_and_dialog_consumes_reply() {
    let (controller, adapter) = controller();

    let report = controller.handle(say("hello there")).await.unwrap();
    assert_eq!(report.texts(), ["Hi ann!", "What is your name?"]);
    assert_eq!(report.status, SessionStatus::WaitingForInput);

    // "hi" would fire the trigger, but the active dialog takes the reply
    let report = controller.handle(say("hi")).await.unwrap();
    assert_eq!(report.texts(), ["Nice to meet you, hi!"]);
    assert_eq!(report.status, SessionStatus::Ended);
    assert_eq!(report.results.len(), 1);

    assert_eq!(
        adapter.texts(),
        ["Hi ann!", "What is your name?", "Nice to meet you, hi!"]
    );
}

#[tokio::test]
async fn test_event_during_question_goes_to_triggers() {
    let (controller, _adapter) = controller();
    controller.handle(say("hello")).await.unwrap();

    let typing = IncomingMessage::event(reference(), "typing");
    let report = controller.handle(typing).await.unwrap();
    assert_eq!(report.texts(), ["(typing noticed)"]);
    assert_eq!(report.status, SessionStatus::WaitingForInput);

    let session = controller.engine().session(&reference()).await.unwrap().unwrap();
    assert_eq!(session.vars().unwrap().get("name"), None);

    let report = controller.handle(say("Ann")).await.unwrap();
    assert_eq!(report.texts(), ["Nice to meet you, Ann!"]);
    assert_eq!(report.status, SessionStatus::Ended);
}

#[tokio::test]
async fn test_unmatched_reply_falls_through_when_waiting() {
    let mut confirm = Conversation::new("confirm");
    confirm.ask(
        "yes?",
        Answer::rules().pattern("yes", |_, ctx: Arc<DialogContext>| async move {
            ctx.say("confirmed").await?;
            Ok::<_, BoxError>(())
        }),
    );
    let options = DialogOptions {
        no_match: NoMatchPolicy::Wait,
        ..DialogOptions::default()
    };
    let adapter = Arc::new(RecordingAdapter::default());
    let engine = DialogEngine::new(
        DialogSet::new().with(confirm).unwrap(),
        adapter.clone(),
        Arc::new(MemoryStorage::new()),
    )
    .with_options(options);
    let mut controller = Controller::new(engine);
    controller
        .trigger(hears(["^start$"]).handler(|ctx: Arc<TriggerContext>| async move {
            ctx.begin_dialog("confirm", Vars::new());
            Ok::<_, BoxError>(())
        }))
        .trigger(hears(["help"]).handler(|ctx: Arc<TriggerContext>| async move {
            ctx.say("HELP").await?;
            Ok::<_, BoxError>(())
        }));

    controller.handle(say("start")).await.unwrap();
    let report = controller.handle(say("help")).await.unwrap();
    assert_eq!(report.texts(), ["HELP"]);
    assert_eq!(report.status, SessionStatus::WaitingForInput);

    let report = controller.handle(say("yes")).await.unwrap();
    assert_eq!(report.texts(), ["confirmed"]);
    assert_eq!(report.status, SessionStatus::Ended);
    assert_eq!(adapter.texts(), ["yes?", "HELP", "confirmed"]);
}

#[tokio::test]
async fn test_interrupt_cancels_active_dialog() {
    let (controller, _adapter) = controller();
    controller.handle(say("hello")).await.unwrap();

    let report = controller.handle(say("cancel")).await.unwrap();
    assert_eq!(report.texts(), ["Cancelled."]);
    assert_eq!(report.status, SessionStatus::Ended);
    assert!(controller.engine().session(&reference()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_interrupt_rule_skips_without_dialog() {
    let (controller, adapter) = controller();

    let report = controller.handle(say("cancel")).await.unwrap();
    assert!(report.sent.is_empty());
    assert_eq!(report.status, SessionStatus::Ended);
    assert!(adapter.texts().is_empty());
}

#[tokio::test]
async fn test_trigger_error_is_surfaced() {
    let (controller, _adapter) = controller();
    let message = IncomingMessage::event(reference(), "explode");

    let err = controller.handle(message).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Trigger(ref e) if e.to_string() == "kaboom"));
}

#[tokio::test]
async fn test_file_backend_from_config_persists_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ColloquyConfig::default();
    config.storage.backend = StorageBackend::File;
    config.storage.base_dir = Some(dir.path().to_path_buf());

    let adapter = Arc::new(RecordingAdapter::default());
    let mut controller = Controller::from_config(&config, dialogs(), adapter.clone()).unwrap();
    controller.trigger(hears(["hello"]).handler(|ctx: Arc<TriggerContext>| async move {
        ctx.begin_dialog("onboarding", Vars::new());
        Ok::<_, BoxError>(())
    }));

    controller.handle(say("hello")).await.unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    // a fresh controller over the same directory resumes the dialog
    let restarted = Controller::from_config(&config, dialogs(), adapter.clone()).unwrap();
    let report = restarted.handle(say("Ann")).await.unwrap();
    assert_eq!(report.texts(), ["Nice to meet you, Ann!"]);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_file_backend_without_dir_is_rejected() {
    let mut config = ColloquyConfig::default();
    config.storage.backend = StorageBackend::File;

    let result = Controller::from_config(
        &config,
        dialogs(),
        Arc::new(RecordingAdapter::default()),
    );
    assert!(matches!(result, Err(RuntimeError::Config(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_until_drains_inbox() {
    let (controller, adapter) = controller();
    let (tx, rx) = mpsc::channel(8);

    tx.send(say("hello")).await.unwrap();
    drop(tx);
    controller.run_until(rx, std::future::pending()).await;

    assert_eq!(adapter.texts(), ["Hi ann!", "What is your name?"]);
}
