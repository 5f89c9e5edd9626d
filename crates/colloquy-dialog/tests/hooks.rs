mod common;

use std::sync::Arc;

use colloquy_dialog::prelude::*;
use colloquy_dialog::{BoxError, DialogContext};
use parking_lot::Mutex;
use serde_json::{Value, json};

use common::{harness, reference, reply};

type Log = Arc<Mutex<Vec<String>>>;

fn record_entry(convo: &mut Conversation, log: &Log, thread: &'static str) {
    let log = log.clone();
    convo.before(thread, move |_ctx| {
        let log = log.clone();
        async move {
            log.lock().push(thread.to_string());
            Ok(())
        }
    });
}

#[tokio::test]
async fn test_before_hooks_fire_once_per_thread_entry() {
    let log: Log = Arc::default();
    let mut convo = Conversation::new("tour");
    convo
        .say("welcome")
        .add_action("a", "default")
        .add_message("in a", "a")
        .add_action("b", "a")
        .add_question(
            "again?",
            Answer::rules()
                .pattern("a", |_, ctx: Arc<DialogContext>| async move {
                    ctx.goto_thread("a");
                    Ok(())
                })
                .default_rule(|_, ctx: Arc<DialogContext>| async move {
                    ctx.complete();
                    Ok(())
                }),
            "b",
        );
    record_entry(&mut convo, &log, "default");
    record_entry(&mut convo, &log, "a");
    record_entry(&mut convo, &log, "b");
    // Redirecting to the thread being entered is not a new entry.
    convo.before("a", |ctx: Arc<DialogContext>| async move {
        ctx.goto_thread("a");
        Ok(())
    });

    let h = harness(DialogSet::new().with(convo).unwrap());
    h.engine
        .begin_dialog(&reference(), "tour", Vars::new())
        .await
        .unwrap();
    assert_eq!(*log.lock(), ["default", "a", "b"]);

    h.engine.continue_dialog(&reply("a")).await.unwrap().unwrap();
    assert_eq!(*log.lock(), ["default", "a", "b", "a", "b"]);

    let report = h.engine.continue_dialog(&reply("done")).await.unwrap().unwrap();
    assert_eq!(report.status, SessionStatus::Ended);
    assert_eq!(h.adapter.texts(), ["welcome", "in a", "again?", "in a", "again?"]);
}

#[tokio::test]
async fn test_before_hook_can_say_and_set_vars() {
    let mut convo = Conversation::new("d");
    convo.ask("name, {{vars.title}}?", Answer::capture("title"));
    convo.before("default", |ctx: Arc<DialogContext>| async move {
        ctx.set_var("title", "guest");
        ctx.say("hello {{vars.title}}").await?;
        Ok::<_, BoxError>(())
    });
    let h = harness(DialogSet::new().with(convo).unwrap());

    let report = h
        .engine
        .begin_dialog(&reference(), "d", Vars::new())
        .await
        .unwrap();
    assert_eq!(report.texts(), ["hello guest", "name, guest?"]);

    // The reply overwrites what the hook stored.
    let report = h.engine.continue_dialog(&reply("Dr")).await.unwrap().unwrap();
    assert_eq!(report.results[0].vars.get("title"), Some(&json!("Dr")));
}

#[tokio::test]
async fn test_on_change_fires_in_registration_order() {
    let seen: Log = Arc::default();
    let mut convo = Conversation::new("profile");
    convo
        .ask(
            "age?",
            Answer::capture_with("age", |reply, ctx: Arc<DialogContext>| async move {
                let adult = reply.parse::<u32>().map(|age| age >= 18).unwrap_or(false);
                ctx.set_var("adult", adult);
                Ok(())
            }),
        )
        .say("adult={{vars.adult}}, note={{vars.note}}");
    for variable in ["adult", "age", "unrelated"] {
        let seen = seen.clone();
        convo.on_change(variable, move |value: Value, ctx: Arc<DialogContext>| {
            let seen = seen.clone();
            async move {
                seen.lock().push(format!("{variable}={value}"));
                if variable == "age" {
                    ctx.set_var("note", "checked");
                }
                Ok(())
            }
        });
    }
    let h = harness(DialogSet::new().with(convo).unwrap());

    h.engine
        .begin_dialog(&reference(), "profile", Vars::new())
        .await
        .unwrap();
    assert!(seen.lock().is_empty());

    let report = h.engine.continue_dialog(&reply("42")).await.unwrap().unwrap();
    assert_eq!(*seen.lock(), ["adult=true", "age=\"42\""]);
    assert_eq!(report.texts(), ["adult=true, note=checked"]);
}

#[tokio::test]
async fn test_after_hook_receives_outcome_and_starts_follow_up() {
    let outcomes: Arc<Mutex<Vec<DialogOutcome>>> = Arc::default();
    let mut survey = Conversation::new("survey");
    survey.ask(
        "rate us",
        Answer::handler(|reply, ctx: Arc<DialogContext>| async move {
            if reply == "quit" {
                ctx.stop();
            }
            Ok(())
        }),
    );
    {
        let outcomes = outcomes.clone();
        survey.after(move |results: DialogResults, ctx: Arc<DialogContext>| {
            let outcomes = outcomes.clone();
            async move {
                outcomes.lock().push(results.outcome);
                if results.outcome == DialogOutcome::Stopped {
                    ctx.say("sorry to see you go").await?;
                    ctx.begin_dialog("feedback", Vars::new());
                }
                Ok::<_, BoxError>(())
            }
        });
    }
    let mut feedback = Conversation::new("feedback");
    feedback.ask("why?", Answer::capture("reason"));

    let h = harness(DialogSet::new().with(survey).unwrap().with(feedback).unwrap());
    h.engine
        .begin_dialog(&reference(), "survey", Vars::new())
        .await
        .unwrap();
    let report = h.engine.continue_dialog(&reply("quit")).await.unwrap().unwrap();

    assert_eq!(*outcomes.lock(), [DialogOutcome::Stopped]);
    assert_eq!(report.texts(), ["sorry to see you go", "why?"]);
    assert_eq!(report.status, SessionStatus::WaitingForInput);
    let session = h.engine.session(&reference()).await.unwrap().unwrap();
    assert_eq!(session.top().unwrap().dialog, "feedback");
}

#[tokio::test]
async fn test_invoke_and_repeat_steps() {
    let mut convo = Conversation::new("retry");
    convo
        .say("attempt {{vars.tries}}")
        .add_invoke(
            |ctx: Arc<DialogContext>| async move {
                let tries = ctx.var("tries").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
                ctx.set_var("tries", tries);
                if tries >= 3 {
                    ctx.timeout();
                }
                Ok(())
            },
            "default",
        )
        .add_action("repeat", "default");
    let h = harness(DialogSet::new().with(convo).unwrap());

    let report = h
        .engine
        .begin_dialog(&reference(), "retry", Vars::new())
        .await
        .unwrap();
    // `repeat` reruns the invoke step, not the line before it.
    assert_eq!(report.texts(), ["attempt "]);
    assert_eq!(report.results[0].outcome, DialogOutcome::TimedOut);
    assert_eq!(report.results[0].vars.get("tries"), Some(&json!(3)));
}

#[tokio::test]
async fn test_goto_dialog_replaces_current() {
    let mut first = Conversation::new("first");
    first.say("one").add_goto_dialog("second", "default").say("unreachable");
    let mut second = Conversation::new("second");
    second.say("two");
    let h = harness(DialogSet::new().with(first).unwrap().with(second).unwrap());

    let report = h
        .engine
        .begin_dialog(&reference(), "first", Vars::new())
        .await
        .unwrap();
    assert_eq!(report.texts(), ["one", "two"]);
    let ended: Vec<_> = report.results.iter().map(|r| r.dialog.as_str()).collect();
    assert_eq!(ended, ["second"]);
}
