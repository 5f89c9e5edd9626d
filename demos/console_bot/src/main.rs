//! Console Bot Example
//!
//! Talks to a Colloquy controller over stdin/stdout. Every line typed is one
//! inbound message from a single console user.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot
//! cargo run --package console-bot -- --config colloquy.toml --user ann
//! ```
//!
//! Say `hello` to start onboarding, `cancel` to abandon it, `help` for the
//! list of commands.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use colloquy::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

const PLATFORM: &str = "console";

#[derive(Debug, Parser)]
#[command(about = "Chat with a Colloquy bot in the terminal")]
struct Cli {
    /// Configuration file; defaults to colloquy.toml lookup.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// User id of the console user.
    #[arg(short, long, default_value = "console-user")]
    user: String,

    /// Store sessions under this directory instead of memory.
    #[arg(long)]
    sessions: Option<PathBuf>,
}

// ============================================================================
// Adapter
// ============================================================================

/// Prints activities to stdout.
struct ConsoleAdapter;

#[async_trait]
impl Adapter for ConsoleAdapter {
    fn name(&self) -> &str {
        PLATFORM
    }

    async fn send(
        &self,
        activity: &Activity,
        _reference: &ConversationReference,
    ) -> AdapterResult<DeliveryReceipt> {
        let mut out = format!("bot> {}\n", activity.text_or_empty());
        if !activity.quick_replies.is_empty() {
            let titles: Vec<_> = activity
                .quick_replies
                .iter()
                .map(|r| format!("[{}]", r.title))
                .collect();
            out.push_str(&format!("     {}\n", titles.join(" ")));
        }

        let mut stdout = tokio::io::stdout();
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
        Ok(DeliveryReceipt::new(PLATFORM))
    }
}

// ============================================================================
// Dialogs
// ============================================================================

fn onboarding() -> Conversation {
    let mut convo = Conversation::new("onboarding");
    convo
        .say("Welcome aboard! Type `cancel` at any time to stop.")
        .ask("What should I call you?", Answer::capture("name"))
        .ask(
            MessageTemplate::new("Nice to meet you, {{vars.name}}. Blue or red?")
                .with_quick_reply("Blue", "blue")
                .with_quick_reply("Red", "red"),
            Answer::rules()
                .key("color")
                .pattern("blue", |_, ctx| async move {
                    ctx.goto_thread("blue");
                    Ok(())
                })
                .pattern("red", |_, ctx| async move {
                    ctx.goto_thread("red");
                    Ok(())
                })
                .default_rule(|_, ctx| async move {
                    ctx.say("I only know blue and red.").await?;
                    ctx.repeat();
                    Ok::<_, BoxError>(())
                }),
        );

    convo
        .add_message("Calm and deep, good choice.", "blue")
        .add_action("address", "blue")
        .add_message("Bold! I like it.", "red")
        .add_action("address", "red")
        .add_child_dialog("address", Some("address"), "address")
        .add_message(
            "All set, {{vars.name}}. I'll send {{vars.color}} things to {{vars.address.city}}.",
            "address",
        );

    convo.before("address", |ctx| async move {
        tracing::debug!(color = ?ctx.var("color"), "Collecting address");
        Ok(())
    });

    convo.on_change("name", |value, ctx| async move {
        if value.as_str().is_some_and(|name| name.eq_ignore_ascii_case("bot")) {
            ctx.say("That's my name too!").await?;
        }
        Ok::<_, BoxError>(())
    });

    convo.after(|results, _ctx| async move {
        tracing::info!(outcome = ?results.outcome, vars = ?results.vars, "Onboarding finished");
        Ok(())
    });

    convo
}

fn address() -> Conversation {
    let mut convo = Conversation::new("address");
    convo
        .ask("Which city do you live in?", Answer::capture("city"))
        .ask(
            "And the street?",
            Answer::capture_with("street", |street, ctx| async move {
                if street.trim().is_empty() {
                    ctx.repeat();
                }
                Ok(())
            }),
        );
    convo
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let mut config = loader.load()?;
    if let Some(dir) = cli.sessions {
        config.storage.backend = colloquy::runtime::config::StorageBackend::File;
        config.storage.base_dir = Some(dir);
    }
    // stdout belongs to the conversation
    config.logging.output = colloquy::runtime::config::LogOutput::Stderr;
    logging::init_from_config(&config.logging);

    let dialogs = DialogSet::new().with(onboarding())?.with(address())?;
    let mut controller = Controller::from_config(&config, dialogs, Arc::new(ConsoleAdapter))?;

    controller
        .interrupt(
            hears(["^cancel$", "^quit$"])
                .rule(|ctx| ctx.is_dialog_active())
                .handler(|ctx: Arc<TriggerContext>| async move {
                    ctx.cancel_all_dialogs();
                    ctx.say("Okay, forget it.").await?;
                    Ok::<_, BoxError>(())
                }),
        )
        .trigger(hears(["^help$"]).handler(|ctx: Arc<TriggerContext>| async move {
            ctx.say("Commands: hello, cancel, help").await?;
            Ok::<_, BoxError>(())
        }))
        .trigger(hears(["hello", "^hi\\b"]).handler(|ctx: Arc<TriggerContext>| async move {
            ctx.say("Hi {{vars.user}}!").await?;
            ctx.begin_dialog("onboarding", Vars::new());
            Ok::<_, BoxError>(())
        }))
        .trigger(when(|ctx| ctx.message().is_message()).handler(
            |ctx: Arc<TriggerContext>| async move {
                ctx.say("Say `hello` to get started.").await?;
                Ok::<_, BoxError>(())
            },
        ));

    let (tx, rx) = mpsc::channel(16);
    let reference = ConversationReference::new(PLATFORM, "terminal", cli.user);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let message = IncomingMessage::text(reference.clone(), line.trim());
            if tx.send(message).await.is_err() {
                break;
            }
        }
    });

    controller.run(rx).await;
    Ok(())
}
