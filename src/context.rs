use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serenity::all::{
    ChannelId, CommandDataOptionValue, CommandInteraction, CreateAllowedMentions,
    CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateMessage, EditInteractionResponse, GuildId, Http,
    Message, UserId,
};

/// Discord refuses messages over 2000 characters; leave room for formatting.
const MESSAGE_CHUNK_SIZE: usize = 1900;

/// Where a text command came from, and how to answer it.
#[serenity::async_trait]
pub trait TextContext: Send + Sync {
    fn author_id(&self) -> UserId;
    fn author_name(&self) -> &str;
    fn channel_id(&self) -> ChannelId;
    fn guild_id(&self) -> Option<GuildId>;
    fn content(&self) -> &str;

    /// Reply to the invoking message.
    async fn reply(&self, content: &str) -> anyhow::Result<()>;
    /// Send a plain message to the invoking channel.
    async fn send(&self, content: &str) -> anyhow::Result<()>;
}

/// A structured (slash) invocation, with its options already parsed by the platform.
#[serenity::async_trait]
pub trait StructuredContext: Send + Sync {
    fn command_name(&self) -> &str;
    fn user_id(&self) -> UserId;
    fn channel_id(&self) -> ChannelId;
    fn guild_id(&self) -> Option<GuildId>;
    fn options(&self) -> &[(String, OptionValue)];
    /// Whether a first response (reply or deferral) has gone out.
    fn has_responded(&self) -> bool;

    async fn reply(&self, content: &str) -> anyhow::Result<()>;
    async fn defer(&self) -> anyhow::Result<()>;
    async fn edit_reply(&self, content: &str) -> anyhow::Result<()>;
    async fn follow_up(&self, content: &str) -> anyhow::Result<()>;
}

/// A command option value
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

/// A text command received as a chat message.
pub struct MessageContext {
    http: Arc<Http>,
    message: Message,
}
impl MessageContext {
    pub fn new(http: Arc<Http>, message: Message) -> Self {
        Self { http, message }
    }
}
#[serenity::async_trait]
impl TextContext for MessageContext {
    fn author_id(&self) -> UserId {
        self.message.author.id
    }
    fn author_name(&self) -> &str {
        &self.message.author.name
    }
    fn channel_id(&self) -> ChannelId {
        self.message.channel_id
    }
    fn guild_id(&self) -> Option<GuildId> {
        self.message.guild_id
    }
    fn content(&self) -> &str {
        &self.message.content
    }

    async fn reply(&self, content: &str) -> anyhow::Result<()> {
        let mut chunks = chunk_message(content, MESSAGE_CHUNK_SIZE).into_iter();
        if let Some(first) = chunks.next() {
            self.message
                .channel_id
                .send_message(
                    &*self.http,
                    CreateMessage::new()
                        .reference_message(&self.message)
                        .content(first)
                        .allowed_mentions(CreateAllowedMentions::new()),
                )
                .await?;
        }
        for chunk in chunks {
            self.send_chunk(&chunk).await?;
        }
        Ok(())
    }

    async fn send(&self, content: &str) -> anyhow::Result<()> {
        for chunk in chunk_message(content, MESSAGE_CHUNK_SIZE) {
            self.send_chunk(&chunk).await?;
        }
        Ok(())
    }
}
impl MessageContext {
    async fn send_chunk(&self, chunk: &str) -> anyhow::Result<()> {
        self.message
            .channel_id
            .send_message(
                &*self.http,
                CreateMessage::new()
                    .content(chunk)
                    .allowed_mentions(CreateAllowedMentions::new()),
            )
            .await?;
        Ok(())
    }
}

/// A slash command interaction.
pub struct InteractionContext {
    http: Arc<Http>,
    cmd: CommandInteraction,
    options: Vec<(String, OptionValue)>,
    responded: AtomicBool,
}
impl InteractionContext {
    pub fn new(http: Arc<Http>, cmd: CommandInteraction) -> Self {
        let options = cmd
            .data
            .options
            .iter()
            .filter_map(|opt| {
                let value = match &opt.value {
                    CommandDataOptionValue::String(s) => OptionValue::String(s.clone()),
                    CommandDataOptionValue::Integer(i) => OptionValue::Integer(*i),
                    CommandDataOptionValue::Number(n) => OptionValue::Number(*n),
                    CommandDataOptionValue::Boolean(b) => OptionValue::Boolean(*b),
                    CommandDataOptionValue::User(id) => OptionValue::String(id.get().to_string()),
                    CommandDataOptionValue::Channel(id) => {
                        OptionValue::String(id.get().to_string())
                    }
                    CommandDataOptionValue::Role(id) => OptionValue::String(id.get().to_string()),
                    // Attachments and subcommands are not exposed to scripts
                    _ => return None,
                };
                Some((opt.name.clone(), value))
            })
            .collect();

        Self {
            http,
            cmd,
            options,
            responded: AtomicBool::new(false),
        }
    }
}
#[serenity::async_trait]
impl StructuredContext for InteractionContext {
    fn command_name(&self) -> &str {
        &self.cmd.data.name
    }
    fn user_id(&self) -> UserId {
        self.cmd.user.id
    }
    fn channel_id(&self) -> ChannelId {
        self.cmd.channel_id
    }
    fn guild_id(&self) -> Option<GuildId> {
        self.cmd.guild_id
    }
    fn options(&self) -> &[(String, OptionValue)] {
        &self.options
    }
    fn has_responded(&self) -> bool {
        self.responded.load(Ordering::SeqCst)
    }

    async fn reply(&self, content: &str) -> anyhow::Result<()> {
        let (first, rest) = first_and_rest(content);
        self.cmd
            .create_response(
                &*self.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(first)
                        .allowed_mentions(CreateAllowedMentions::new()),
                ),
            )
            .await?;
        self.responded.store(true, Ordering::SeqCst);
        for chunk in rest {
            self.send_followup(&chunk).await?;
        }
        Ok(())
    }

    async fn defer(&self) -> anyhow::Result<()> {
        self.cmd
            .create_response(
                &*self.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await?;
        self.responded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn edit_reply(&self, content: &str) -> anyhow::Result<()> {
        let (first, rest) = first_and_rest(content);
        self.cmd
            .edit_response(&*self.http, EditInteractionResponse::new().content(first))
            .await?;
        for chunk in rest {
            self.send_followup(&chunk).await?;
        }
        Ok(())
    }

    async fn follow_up(&self, content: &str) -> anyhow::Result<()> {
        for chunk in chunk_message(content, MESSAGE_CHUNK_SIZE) {
            self.send_followup(&chunk).await?;
        }
        Ok(())
    }
}
impl InteractionContext {
    async fn send_followup(&self, chunk: &str) -> anyhow::Result<()> {
        self.cmd
            .create_followup(
                &*self.http,
                CreateInteractionResponseFollowup::new()
                    .content(chunk)
                    .allowed_mentions(CreateAllowedMentions::new()),
            )
            .await?;
        Ok(())
    }
}

/// The chunk that goes out as the response itself, and the chunks that follow it up.
fn first_and_rest(content: &str) -> (String, Vec<String>) {
    let mut chunks = chunk_message(content, MESSAGE_CHUNK_SIZE).into_iter();
    let first = chunks.next().unwrap_or_default();
    (first, chunks.collect())
}

const FENCE: &str = "```";

/// Splits a message into chunks of at most `chunk_size` bytes, preferring to break on
/// newlines and spaces. Words longer than a chunk are cut on character boundaries.
///
/// A code fence left open at the end of a chunk is closed there and reopened in the next,
/// which can add up to eight bytes to a chunk.
fn chunk_message(message: &str, chunk_size: usize) -> Vec<String> {
    let budget = chunk_size.max(1);

    let mut chunks: Vec<String> = vec![];
    let mut current = String::new();
    for word in message.split_inclusive([' ', '\n']) {
        for piece in split_oversized(word, budget) {
            let visible = piece.trim_end_matches([' ', '\n']);
            if !current.is_empty() && current.len() + visible.len() > budget {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(piece);
        }
    }
    chunks.push(current);

    let mut open_fence = false;
    chunks
        .into_iter()
        .filter_map(|chunk| {
            let chunk = chunk.trim_end_matches([' ', '\n']);
            if chunk.trim().is_empty() {
                return None;
            }
            let mut repaired = String::with_capacity(chunk.len() + FENCE.len() * 2 + 2);
            if open_fence {
                repaired.push_str(FENCE);
                repaired.push('\n');
            }
            repaired.push_str(chunk);
            if chunk.matches(FENCE).count() % 2 == 1 {
                open_fence = !open_fence;
            }
            if open_fence {
                repaired.push('\n');
                repaired.push_str(FENCE);
            }
            Some(repaired)
        })
        .collect()
}

/// Cuts `word` into pieces of at most `max` bytes without splitting a character.
fn split_oversized(word: &str, max: usize) -> Vec<&str> {
    let mut pieces = vec![];
    let mut rest = word;
    while rest.len() > max {
        let mut cut = max;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(cut);
        pieces.push(head);
        rest = tail;
    }
    pieces.push(rest);
    pieces
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Records everything a handler says instead of talking to Discord.
    pub struct FakeMessage {
        pub author: UserId,
        pub content: String,
        pub replies: Mutex<Vec<String>>,
        pub sent: Mutex<Vec<String>>,
    }
    impl FakeMessage {
        pub fn new(author: u64, content: &str) -> Arc<Self> {
            Arc::new(Self {
                author: UserId::new(author),
                content: content.to_string(),
                replies: Mutex::new(vec![]),
                sent: Mutex::new(vec![]),
            })
        }

        pub fn replies(&self) -> Vec<String> {
            self.replies.lock().clone()
        }
    }
    #[serenity::async_trait]
    impl TextContext for FakeMessage {
        fn author_id(&self) -> UserId {
            self.author
        }
        fn author_name(&self) -> &str {
            "tester"
        }
        fn channel_id(&self) -> ChannelId {
            ChannelId::new(10)
        }
        fn guild_id(&self) -> Option<GuildId> {
            Some(GuildId::new(20))
        }
        fn content(&self) -> &str {
            &self.content
        }
        async fn reply(&self, content: &str) -> anyhow::Result<()> {
            self.replies.lock().push(content.to_string());
            Ok(())
        }
        async fn send(&self, content: &str) -> anyhow::Result<()> {
            self.sent.lock().push(content.to_string());
            Ok(())
        }
    }

    /// A slash invocation that remembers which response forms were used.
    pub struct FakeInteraction {
        pub name: String,
        pub options: Vec<(String, OptionValue)>,
        pub responded: AtomicBool,
        pub replies: Mutex<Vec<String>>,
        pub follow_ups: Mutex<Vec<String>>,
    }
    impl FakeInteraction {
        pub fn new(name: &str, options: Vec<(String, OptionValue)>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                options,
                responded: AtomicBool::new(false),
                replies: Mutex::new(vec![]),
                follow_ups: Mutex::new(vec![]),
            })
        }
    }
    #[serenity::async_trait]
    impl StructuredContext for FakeInteraction {
        fn command_name(&self) -> &str {
            &self.name
        }
        fn user_id(&self) -> UserId {
            UserId::new(1)
        }
        fn channel_id(&self) -> ChannelId {
            ChannelId::new(10)
        }
        fn guild_id(&self) -> Option<GuildId> {
            None
        }
        fn options(&self) -> &[(String, OptionValue)] {
            &self.options
        }
        fn has_responded(&self) -> bool {
            self.responded.load(Ordering::SeqCst)
        }
        async fn reply(&self, content: &str) -> anyhow::Result<()> {
            anyhow::ensure!(!self.has_responded(), "interaction already acknowledged");
            self.replies.lock().push(content.to_string());
            self.responded.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn defer(&self) -> anyhow::Result<()> {
            anyhow::ensure!(!self.has_responded(), "interaction already acknowledged");
            self.responded.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn edit_reply(&self, content: &str) -> anyhow::Result<()> {
            self.replies.lock().push(content.to_string());
            Ok(())
        }
        async fn follow_up(&self, content: &str) -> anyhow::Result<()> {
            self.follow_ups.lock().push(content.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_stay_whole() {
        assert_eq!(chunk_message("hello world", 100), vec!["hello world"]);
    }

    #[test]
    fn long_messages_split_on_spaces() {
        let message = "aaaa bbbb cccc dddd";
        let chunks = chunk_message(message, 9);
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc dddd"]);
        assert!(chunks.iter().all(|c| c.len() <= 9));
    }

    #[test]
    fn long_messages_split_on_newlines() {
        let chunks = chunk_message("aaaa\nbbbb\ncccc", 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn oversized_words_are_cut() {
        let url = format!("https://example.com/{}", "x".repeat(30));
        let chunks = chunk_message(&format!("see {url}"), 16);
        assert!(chunks.iter().all(|c| c.len() <= 16), "{chunks:?}");
        assert_eq!(chunks.concat().replace(' ', ""), format!("see{url}"));
    }

    #[test]
    fn oversized_words_keep_characters_whole() {
        let chunks = chunk_message(&"é".repeat(10), 5);
        assert!(chunks.iter().all(|c| c.len() <= 5), "{chunks:?}");
        assert_eq!(chunks.concat(), "é".repeat(10));
    }

    #[test]
    fn open_fences_are_carried_across_chunks() {
        let message = "errors:\n```\none\ntwo\nthree\n```";
        let chunks = chunk_message(message, 12);
        assert!(chunks.len() > 1, "{chunks:?}");
        for chunk in &chunks {
            assert_eq!(chunk.matches("```").count() % 2, 0, "{chunk:?}");
        }
    }

    #[test]
    fn blank_messages_produce_no_chunks() {
        assert!(chunk_message("", 100).is_empty());
        assert!(chunk_message("  \n ", 100).is_empty());
    }

    #[test]
    fn slash_replies_over_the_limit_are_followed_up() {
        let listing = (0..400)
            .map(|i| format!("`command{i}`"))
            .collect::<Vec<_>>()
            .join(", ");
        assert!(listing.len() > 2000);

        let (first, rest) = first_and_rest(&listing);
        assert!(!rest.is_empty());
        for chunk in std::iter::once(&first).chain(&rest) {
            assert!(chunk.len() <= MESSAGE_CHUNK_SIZE);
        }
        assert_eq!(
            std::iter::once(first).chain(rest).collect::<Vec<_>>().join(" "),
            listing
        );

        let (first, rest) = first_and_rest("short");
        assert_eq!(first, "short");
        assert!(rest.is_empty());
    }
}
