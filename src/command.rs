use std::sync::Arc;

use crate::{
    context::{StructuredContext, TextContext},
    error::ExecutionError,
    schema::StructuredSchema,
};

/// Something that can run in response to a prefixed chat message.
#[serenity::async_trait]
pub trait TextCommand: Send + Sync {
    async fn execute(
        &self,
        ctx: Arc<dyn TextContext>,
        args: Vec<String>,
    ) -> Result<(), ExecutionError>;
}

/// Something that can run in response to a slash command.
#[serenity::async_trait]
pub trait StructuredCommand: Send + Sync {
    async fn execute(&self, invocation: Arc<dyn StructuredContext>) -> Result<(), ExecutionError>;
}

#[derive(Clone)]
pub struct StructuredEntry {
    pub schema: StructuredSchema,
    pub handler: Arc<dyn StructuredCommand>,
}

/// The invocation paths a command supports. A module offering neither is not a command.
#[derive(Clone)]
pub enum CommandKind {
    Text(Arc<dyn TextCommand>),
    Structured(StructuredEntry),
    Both {
        text: Arc<dyn TextCommand>,
        structured: StructuredEntry,
    },
}
impl CommandKind {
    pub fn new(
        text: Option<Arc<dyn TextCommand>>,
        structured: Option<StructuredEntry>,
    ) -> Option<Self> {
        match (text, structured) {
            (Some(text), Some(structured)) => Some(Self::Both { text, structured }),
            (Some(text), None) => Some(Self::Text(text)),
            (None, Some(structured)) => Some(Self::Structured(structured)),
            (None, None) => None,
        }
    }

    pub fn text(&self) -> Option<&Arc<dyn TextCommand>> {
        match self {
            Self::Text(text) | Self::Both { text, .. } => Some(text),
            Self::Structured(_) => None,
        }
    }

    pub fn structured(&self) -> Option<&StructuredEntry> {
        match self {
            Self::Structured(structured) | Self::Both { structured, .. } => Some(structured),
            Self::Text(_) => None,
        }
    }
}

/// A loaded command: its identity, where it came from, and how to run it.
#[derive(Clone)]
pub struct HandlerDescriptor {
    /// Lower-cased primary name
    pub name: String,
    /// Lower-cased additional names
    pub aliases: Vec<String>,
    pub description: String,
    /// The unit this command was loaded from
    pub unit: String,
    /// The file this command was loaded from
    pub source: String,
    pub kind: CommandKind,
}
impl HandlerDescriptor {
    /// Every key this command answers to on the text path.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn structured_name(&self) -> Option<&str> {
        self.kind.structured().map(|s| s.schema.name.as_str())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// A native command that replies with a fixed string, or fails when told to.
    pub struct Canned {
        pub reply: String,
        pub fail: bool,
        pub calls: AtomicUsize,
    }
    impl Canned {
        pub fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: message.to_string(),
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }
    #[serenity::async_trait]
    impl TextCommand for Canned {
        async fn execute(
            &self,
            ctx: Arc<dyn TextContext>,
            _args: Vec<String>,
        ) -> Result<(), ExecutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ExecutionError::Script(self.reply.clone()));
            }
            ctx.reply(&self.reply).await?;
            Ok(())
        }
    }

    pub fn text_descriptor(
        unit: &str,
        name: &str,
        aliases: &[&str],
        handler: Arc<dyn TextCommand>,
    ) -> HandlerDescriptor {
        HandlerDescriptor {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            description: format!("{name} command"),
            unit: unit.to_string(),
            source: format!("{name}.luau"),
            kind: CommandKind::Text(handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::*, *};

    #[test]
    fn neither_capability_is_not_a_command() {
        assert!(CommandKind::new(None, None).is_none());
    }

    #[test]
    fn keys_start_with_the_primary_name() {
        let descriptor = text_descriptor("misc", "quote", &["q", "cite"], Canned::replying("x"));
        assert_eq!(descriptor.keys().collect::<Vec<_>>(), ["quote", "q", "cite"]);
        assert!(descriptor.structured_name().is_none());
    }
}
