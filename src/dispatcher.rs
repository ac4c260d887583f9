use std::sync::Arc;

use crate::{
    context::{StructuredContext, TextContext},
    control::{ControlCommand, ControlSurface},
    registry::Registry,
};

/// What became of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not addressed to the bot
    Ignored,
    /// Nothing is registered under this key
    Unresolved(String),
    Completed(String),
    /// The handler failed and the failure was reported back to the user
    Reported(String),
}

/// Routes invocations to control commands or registry handlers, keeping handler
/// failures contained to the invocation that caused them.
pub struct Dispatcher {
    prefix: String,
    registry: Arc<Registry>,
    control: Arc<ControlSurface>,
}
impl Dispatcher {
    pub fn new(prefix: &str, registry: Arc<Registry>, control: Arc<ControlSurface>) -> Self {
        Self {
            prefix: prefix.to_string(),
            registry,
            control,
        }
    }

    pub async fn dispatch_text(&self, ctx: Arc<dyn TextContext>) -> Outcome {
        let Some((key, args)) = parse_invocation(&self.prefix, ctx.content()) else {
            return Outcome::Ignored;
        };

        if let Some(cmd) = ControlCommand::resolve(&key) {
            return match self.control.execute(cmd, &*ctx, &args).await {
                Ok(()) => Outcome::Completed(key),
                Err(err) => {
                    tracing::warn!(%key, "control command failed: {err}");
                    self.report_text(&*ctx, &format!("[botctl/error]: {err}"))
                        .await;
                    Outcome::Reported(key)
                }
            };
        }

        let Some(descriptor) = self.registry.lookup(&key) else {
            tracing::debug!(%key, "no command registered");
            return Outcome::Unresolved(key);
        };
        let Some(handler) = descriptor.kind.text() else {
            return Outcome::Unresolved(key);
        };

        tracing::debug!(%key, unit = %descriptor.unit, "running text command");
        match handler.execute(ctx.clone(), args).await {
            Ok(()) => Outcome::Completed(key),
            Err(err) => {
                tracing::warn!(
                    %key,
                    unit = %descriptor.unit,
                    source = %descriptor.source,
                    "command failed: {err}"
                );
                self.report_text(&*ctx, &format!("[{key}]: {err}")).await;
                Outcome::Reported(key)
            }
        }
    }

    pub async fn dispatch_structured(&self, invocation: Arc<dyn StructuredContext>) -> Outcome {
        let name = invocation.command_name().to_string();
        let Some(descriptor) = self.registry.lookup_structured(&name) else {
            tracing::debug!(%name, "no slash command registered");
            return Outcome::Unresolved(name);
        };
        let Some(structured) = descriptor.kind.structured() else {
            return Outcome::Unresolved(name);
        };

        tracing::debug!(%name, unit = %descriptor.unit, "running slash command");
        let Err(err) = structured.handler.execute(invocation.clone()).await else {
            return Outcome::Completed(name);
        };
        tracing::warn!(
            %name,
            unit = %descriptor.unit,
            source = %descriptor.source,
            "slash command failed: {err}"
        );

        let report = format!("[/{name}]: There was an error while executing this command.");
        let sent = if invocation.has_responded() {
            invocation.follow_up(&report).await
        } else {
            invocation.reply(&report).await
        };
        if let Err(err) = sent {
            tracing::error!(%name, "failed to report slash command error: {err}");
        }
        Outcome::Reported(name)
    }

    async fn report_text(&self, ctx: &dyn TextContext, report: &str) {
        if let Err(err) = ctx.reply(report).await {
            tracing::error!("failed to report command error: {err}");
        }
    }
}

/// Splits `<prefix><key> <args...>` into a lower-cased key and its arguments.
pub fn parse_invocation(prefix: &str, content: &str) -> Option<(String, Vec<String>)> {
    let mut words = content.strip_prefix(prefix)?.split_whitespace();
    let key = words.next()?.to_lowercase();
    Some((key, words.map(str::to_string).collect()))
}
