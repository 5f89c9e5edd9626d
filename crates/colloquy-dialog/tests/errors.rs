mod common;

use std::sync::Arc;

use colloquy_dialog::prelude::*;
use colloquy_dialog::{BoxError, DialogContext, SessionStatus, StructureError};
use serde_json::json;

use common::{harness, harness_with, reference, reply};

#[tokio::test]
async fn test_handler_error_keeps_last_checkpoint() {
    let mut convo = Conversation::new("order");
    convo
        .ask("item?", Answer::capture("item"))
        .say("got {{vars.item}}")
        .add_invoke(
            |ctx: Arc<DialogContext>| async move {
                if ctx.text() == "boom" {
                    return Err(BoxError::from("inventory offline"));
                }
                Ok(())
            },
            "default",
        )
        .say("ordered {{vars.item}}");
    let h = harness(DialogSet::new().with(convo).unwrap());

    h.engine
        .begin_dialog(&reference(), "order", Vars::new())
        .await
        .unwrap();
    let err = h.engine.continue_dialog(&reply("boom")).await.unwrap_err();
    let err = match err {
        DialogError::Handler(err) => err,
        other => panic!("expected handler error, got {other:?}"),
    };
    assert_eq!(err.dialog, "order");
    assert_eq!(err.thread, "default");
    assert_eq!(err.step, 2);
    assert_eq!(err.conversation, reference().storage_key());
    assert_eq!(err.source.to_string(), "inventory offline");

    // The line before the failing step was committed.
    let session = h.engine.session(&reference()).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.top().unwrap().step, 2);
    assert_eq!(session.vars().unwrap().get("item"), Some(&json!("boom")));

    // The next message picks up at the failed step without consuming the text
    // as a reply.
    let report = h.engine.continue_dialog(&reply("ok")).await.unwrap().unwrap();
    assert_eq!(report.texts(), ["ordered boom"]);
    assert_eq!(report.status, SessionStatus::Ended);
}

#[tokio::test]
async fn test_recovered_turn_answers_the_next_question() {
    let mut convo = Conversation::new("signup");
    convo
        .ask("email?", Answer::capture("email"))
        .add_invoke(
            |ctx: Arc<DialogContext>| async move {
                if ctx.text() == "boom" {
                    return Err(BoxError::from("directory offline"));
                }
                Ok(())
            },
            "default",
        )
        .ask("name?", Answer::capture("name"))
        .say("hi {{vars.name}} <{{vars.email}}>");
    let h = harness(DialogSet::new().with(convo).unwrap());

    h.engine
        .begin_dialog(&reference(), "signup", Vars::new())
        .await
        .unwrap();
    h.engine.continue_dialog(&reply("boom")).await.unwrap_err();

    // Drives from the checkpoint to the next question, then answers it.
    let report = h.engine.continue_dialog(&reply("Ann")).await.unwrap().unwrap();
    assert_eq!(report.texts(), ["name?", "hi Ann <boom>"]);
    assert_eq!(report.status, SessionStatus::Ended);
}

#[tokio::test]
async fn test_failing_answer_handler_leaves_question_pending() {
    let mut convo = Conversation::new("d");
    convo.ask(
        "q",
        Answer::capture_with("a", |_, _ctx: Arc<DialogContext>| async move {
            Err::<(), _>(BoxError::from("nope"))
        }),
    );
    let h = harness(DialogSet::new().with(convo).unwrap());
    h.engine
        .begin_dialog(&reference(), "d", Vars::new())
        .await
        .unwrap();
    let before = h.engine.session(&reference()).await.unwrap();

    assert!(matches!(
        h.engine.continue_dialog(&reply("x")).await,
        Err(DialogError::Handler(_))
    ));
    assert_eq!(h.engine.session(&reference()).await.unwrap(), before);
}

#[tokio::test]
async fn test_goto_undefined_thread_is_structure_error() {
    let mut convo = Conversation::new("d");
    convo.say("hi").add_action("nowhere", "default");
    let h = harness(DialogSet::new().with(convo).unwrap());

    let err = h
        .engine
        .begin_dialog(&reference(), "d", Vars::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DialogError::Structure(StructureError::UnknownThread { ref thread, .. }) if thread == "nowhere"
    ));
    assert_eq!(h.adapter.texts(), ["hi"]);
}

#[tokio::test]
async fn test_unknown_dialog_is_rejected_before_any_write() {
    let h = harness(DialogSet::new());
    let err = h
        .engine
        .begin_dialog(&reference(), "ghost", Vars::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DialogError::Structure(StructureError::UnknownDialog { .. })
    ));
    assert_eq!(h.storage.saves(), 0);
}

#[tokio::test]
async fn test_goto_cycle_hits_step_limit() {
    let mut convo = Conversation::new("spin");
    convo
        .add_action("other", "default")
        .add_action("default", "other");
    let options = DialogOptions {
        max_steps_per_turn: 50,
        ..DialogOptions::default()
    };
    let h = harness_with(DialogSet::new().with(convo).unwrap(), options);

    let err = h
        .engine
        .begin_dialog(&reference(), "spin", Vars::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DialogError::Structure(StructureError::StepLimitExceeded { limit: 50, .. })
    ));
}

#[tokio::test]
async fn test_delivery_failure_surfaces() {
    let mut convo = Conversation::new("d");
    convo.say("first").say("second");
    let h = harness(DialogSet::new().with(convo).unwrap());
    h.adapter.fail_on("second");

    let err = h
        .engine
        .begin_dialog(&reference(), "d", Vars::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DialogError::Delivery(_)));
    assert_eq!(h.adapter.texts(), ["first"]);
    let session = h.engine.session(&reference()).await.unwrap().unwrap();
    assert_eq!(session.top().unwrap().step, 1);
}
