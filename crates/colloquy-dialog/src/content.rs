//! Message templates.
//!
//! A [`MessageTemplate`] describes one outbound line of a dialog. Each field
//! is either a literal, interpolated against the variable store when the line
//! is rendered, or a render-time function receiving a [`RenderContext`].
//! Function results are interpolated too, so a function may itself return
//! `{{vars.x}}` placeholders.
//!
//! ```rust,ignore
//! let line = MessageTemplate::new("Pick a size, {{vars.name}}")
//!     .with_quick_reply("Small", "small")
//!     .with_quick_reply("Large", "large");
//!
//! let dynamic = MessageTemplate::dynamic(|ctx: RenderContext| async move {
//!     let n = ctx.vars.get("count").and_then(|v| v.as_u64()).unwrap_or(0);
//!     Ok(format!("{n} items in your cart"))
//! });
//! ```

use std::fmt;
use std::future::Future;

use colloquy_core::{Activity, QuickReply};
use rand::seq::SliceRandom;
use serde_json::Value;

use crate::handler::{BoxError, RenderFn, render_fn};
use crate::template::{render_str, render_value};
use crate::vars::Vars;

/// Input of a render-time content function.
#[derive(Clone)]
pub struct RenderContext {
    /// The line being rendered.
    pub line: MessageTemplate,
    /// Snapshot of the variable store.
    pub vars: Vars,
}

/// A literal value or a render-time function producing one.
#[derive(Clone)]
pub enum Field<T> {
    /// Fixed value, interpolated at render time.
    Literal(T),
    /// Computed at render time.
    Dynamic(RenderFn<T>),
}

/// The text of a line.
#[derive(Clone)]
pub enum TextContent {
    /// One template string.
    Template(String),
    /// Several alternatives; one is picked at random per render.
    Variants(Vec<String>),
    /// Computed at render time.
    Dynamic(RenderFn<String>),
}

/// One outbound line of a dialog.
#[derive(Clone, Default)]
pub struct MessageTemplate {
    text: Option<TextContent>,
    quick_replies: Option<Field<Vec<QuickReply>>>,
    attachments: Option<Field<Vec<Value>>>,
    channel_data: Option<Value>,
}

impl MessageTemplate {
    /// Creates a line with a text template.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(TextContent::Template(text.into())),
            ..Default::default()
        }
    }

    /// Creates a line without text (attachments or quick replies only).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a line whose text is picked at random from `variants`.
    pub fn variants<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: Some(TextContent::Variants(
                variants.into_iter().map(Into::into).collect(),
            )),
            ..Default::default()
        }
    }

    /// Creates a line whose text is computed at render time.
    pub fn dynamic<F, Fut>(f: F) -> Self
    where
        F: Fn(RenderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, BoxError>> + Send + 'static,
    {
        Self {
            text: Some(TextContent::Dynamic(render_fn(f))),
            ..Default::default()
        }
    }

    /// Appends a literal quick reply.
    pub fn with_quick_reply(mut self, title: impl Into<String>, payload: impl Into<String>) -> Self {
        let reply = QuickReply::new(title, payload);
        match &mut self.quick_replies {
            Some(Field::Literal(replies)) => replies.push(reply),
            _ => self.quick_replies = Some(Field::Literal(vec![reply])),
        }
        self
    }

    /// Computes the quick replies at render time.
    pub fn with_dynamic_quick_replies<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RenderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<QuickReply>, BoxError>> + Send + 'static,
    {
        self.quick_replies = Some(Field::Dynamic(render_fn(f)));
        self
    }

    /// Appends a literal attachment.
    pub fn with_attachment(mut self, attachment: Value) -> Self {
        match &mut self.attachments {
            Some(Field::Literal(items)) => items.push(attachment),
            _ => self.attachments = Some(Field::Literal(vec![attachment])),
        }
        self
    }

    /// Computes the attachments at render time.
    pub fn with_dynamic_attachments<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RenderContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Value>, BoxError>> + Send + 'static,
    {
        self.attachments = Some(Field::Dynamic(render_fn(f)));
        self
    }

    /// Sets platform-specific pass-through data.
    pub fn with_channel_data(mut self, data: Value) -> Self {
        self.channel_data = Some(data);
        self
    }

    /// Resolves every field against `vars`.
    ///
    /// Render functions are awaited in field order. The variable store is only
    /// read, never written.
    pub async fn render(&self, vars: &Vars) -> Result<Activity, BoxError> {
        let text = match &self.text {
            None => None,
            Some(TextContent::Template(t)) => Some(render_str(t, vars)),
            Some(TextContent::Variants(options)) => pick(options).map(|t| render_str(t, vars)),
            Some(TextContent::Dynamic(f)) => Some(render_str(&f(self.context(vars)).await?, vars)),
        };

        let quick_replies = match &self.quick_replies {
            None => Vec::new(),
            Some(Field::Literal(replies)) => replies.clone(),
            Some(Field::Dynamic(f)) => f(self.context(vars)).await?,
        }
        .into_iter()
        .map(|r| QuickReply::new(render_str(&r.title, vars), render_str(&r.payload, vars)))
        .collect();

        let attachments = match &self.attachments {
            None => Vec::new(),
            Some(Field::Literal(items)) => items.clone(),
            Some(Field::Dynamic(f)) => f(self.context(vars)).await?,
        }
        .iter()
        .map(|a| render_value(a, vars))
        .collect();

        Ok(Activity {
            text,
            quick_replies,
            attachments,
            channel_data: self.channel_data.as_ref().map(|d| render_value(d, vars)),
        })
    }

    fn context(&self, vars: &Vars) -> RenderContext {
        RenderContext {
            line: self.clone(),
            vars: vars.clone(),
        }
    }
}

fn pick(options: &[String]) -> Option<&String> {
    options.choose(&mut rand::thread_rng())
}

impl From<&str> for MessageTemplate {
    fn from(text: &str) -> Self {
        MessageTemplate::new(text)
    }
}

impl From<String> for MessageTemplate {
    fn from(text: String) -> Self {
        MessageTemplate::new(text)
    }
}

impl fmt::Debug for MessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match &self.text {
            None => None,
            Some(TextContent::Template(t)) => Some(t.as_str()),
            Some(TextContent::Variants(_)) => Some("<variants>"),
            Some(TextContent::Dynamic(_)) => Some("<dynamic>"),
        };
        f.debug_struct("MessageTemplate")
            .field("text", &text)
            .field("channel_data", &self.channel_data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_render_interpolates_every_field() {
        let vars = crate::vars! { "name" => "Ann", "size" => "large" };
        let line = MessageTemplate::new("Hi {{vars.name}}")
            .with_quick_reply("Keep {{vars.size}}", "{{vars.size}}")
            .with_attachment(json!({"title": "{{vars.name}}'s order"}))
            .with_channel_data(json!({"thread": "{{vars.size}}"}));

        let activity = line.render(&vars).await.unwrap();
        assert_eq!(activity.text.as_deref(), Some("Hi Ann"));
        assert_eq!(activity.quick_replies, vec![QuickReply::new("Keep large", "large")]);
        assert_eq!(activity.attachments, vec![json!({"title": "Ann's order"})]);
        assert_eq!(activity.channel_data, Some(json!({"thread": "large"})));
    }

    #[tokio::test]
    async fn test_dynamic_text_sees_vars_snapshot() {
        let vars = crate::vars! { "count" => 2 };
        let line = MessageTemplate::dynamic(|ctx: RenderContext| async move {
            let n = ctx.vars.get("count").and_then(Value::as_u64).unwrap_or(0);
            Ok(format!("{} items, {{{{vars.count}}}} confirmed", n + 1))
        });
        let activity = line.render(&vars).await.unwrap();
        assert_eq!(activity.text.as_deref(), Some("3 items, 2 confirmed"));
    }

    #[tokio::test]
    async fn test_variants_pick_one_option() {
        let line = MessageTemplate::variants(["hello", "hi"]);
        let activity = line.render(&Vars::new()).await.unwrap();
        assert!(matches!(activity.text.as_deref(), Some("hello") | Some("hi")));
    }

    #[tokio::test]
    async fn test_dynamic_errors_propagate() {
        let line = MessageTemplate::dynamic(|_ctx: RenderContext| async move {
            Err::<String, BoxError>("lookup failed".into())
        });
        assert!(line.render(&Vars::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_render_does_not_touch_vars() {
        let vars = crate::vars! { "name" => "Ann" };
        let before = vars.clone();
        MessageTemplate::new("{{vars.name}} {{vars.other}}")
            .render(&vars)
            .await
            .unwrap();
        assert_eq!(vars, before);
    }
}
