//! Update dispatch.
//!
//! One update at a time: departure service messages deregister, human
//! senders register on sight, then the command runs with the chat lock
//! held end to end. Anything that is not a command for this bot is
//! dropped without a reply.

use std::sync::Arc;

use marquee_core::{
    normalize_username, Catalog, ChatId, ChatState, ChatStore, CoverPayload, CoverService, Entry,
    Member, WatchlistError,
};
use tracing::{info, warn};

use crate::commands::Command;
use crate::metrics;
use crate::render::{self, Reply};
use crate::telegram::{Message, Messenger, Update, User};

/// Context a command replies into.
struct Context {
    chat: ChatId,
    message_id: i64,
    /// Normalized sender username, empty when the sender has none.
    sender: String,
}

/// Routes updates to chat state mutations and renders the replies.
pub struct Dispatcher {
    store: Arc<ChatStore>,
    catalog: Arc<dyn Catalog>,
    covers: Arc<CoverService>,
    messenger: Arc<dyn Messenger>,
    bot_username: String,
}

impl Dispatcher {
    pub fn new(
        store: Arc<ChatStore>,
        catalog: Arc<dyn Catalog>,
        covers: Arc<CoverService>,
        messenger: Arc<dyn Messenger>,
        bot_username: impl Into<String>,
    ) -> Self {
        Self {
            store,
            catalog,
            covers,
            messenger,
            bot_username: bot_username.into(),
        }
    }

    /// Handle one long-poll update.
    pub async fn handle_update(&self, update: Update) {
        if let Some(message) = update.message {
            self.handle_message(message).await;
        }
    }

    async fn handle_message(&self, message: Message) {
        let chat_id = ChatId(message.chat.id);

        if let Some(left) = &message.left_chat_member {
            self.handle_departure(chat_id, left).await;
            return;
        }

        let Some(from) = &message.from else {
            return;
        };
        if from.is_bot {
            return;
        }

        let state = self.store.get_or_create(chat_id).await;
        let mut state = state.lock().await;

        // Every human message registers its sender; the roster size is
        // the denominator of the everyone-has-watched sweep.
        if let Some(username) = &from.username {
            if state.register(Member::new(from.id, username.clone(), from.first_name.clone())) {
                info!(chat = %chat_id, user = %username, "registered member");
            }
        }

        let Some(text) = message.text.as_deref() else {
            return;
        };
        let Some(command) = Command::parse(text, &self.bot_username) else {
            return;
        };

        let sender = from
            .username
            .as_deref()
            .map(normalize_username)
            .unwrap_or_default();
        let ctx = Context {
            chat: chat_id,
            message_id: message.message_id,
            sender,
        };

        metrics::COMMANDS_TOTAL
            .with_label_values(&[command.name()])
            .inc();
        info!(chat = %chat_id, user = %ctx.sender, command = command.name(), "command dispatched");

        self.run_command(&ctx, &mut state, command).await;
    }

    async fn handle_departure(&self, chat: ChatId, left: &User) {
        let Some(username) = &left.username else {
            return;
        };
        let state = self.store.get_or_create(chat).await;
        let mut state = state.lock().await;
        if let Some(member) = state.deregister(username) {
            info!(chat = %chat, user = %member.username, "member left, deregistered");
        }
    }

    async fn run_command(&self, ctx: &Context, state: &mut ChatState, command: Command) {
        match command {
            Command::All => {
                self.reply(ctx, &render::watchlist(state.watchlist().active()))
                    .await;
            }
            Command::Show { index } => {
                let Some(index) = index else { return };
                let Some(entry) = state.watchlist().get(index).cloned() else {
                    return;
                };
                self.send_preview(ctx, &entry).await;
            }
            Command::Remove { index } => {
                let Some(index) = index else { return };
                if let Ok(removed) = state.remove(index) {
                    self.reply(ctx, &render::removing(&removed)).await;
                }
            }
            Command::Add { query } => self.handle_add(ctx, state, query).await,
            Command::Query { query } => self.handle_query(ctx, state, query).await,
            Command::Watch { indices } => {
                let Some(indices) = indices else { return };
                if ctx.sender.is_empty() {
                    return;
                }
                let outcome = state.watch(&indices, &ctx.sender);
                if let Some(notice) = render::archival_notice(&outcome.archived) {
                    self.reply(ctx, &notice).await;
                }
            }
            Command::Unwatch { indices } => {
                let Some(indices) = indices else { return };
                if ctx.sender.is_empty() {
                    return;
                }
                state.unwatch(&indices, &ctx.sender);
            }
            Command::Restore => {
                // Replies with nothing whether or not anything moved.
                let _ = state.restore();
            }
            Command::Watched { username } => {
                let reply = match username {
                    Some(raw) => {
                        let name = normalize_username(&raw);
                        if state.roster().contains(&name) {
                            render::watched_by(&name, &state.watched_summary(&name))
                        } else {
                            render::unknown_member(&name)
                        }
                    }
                    None => render::watched_list(state.watchlist().archived()),
                };
                self.reply(ctx, &reply).await;
            }
            Command::Draw { count } => {
                let Some(count) = count else { return };
                if let Some(reply) = render::draw(&state.draw(count)) {
                    self.reply(ctx, &reply).await;
                }
            }
            Command::Save => state.save_all(),
            Command::Ranking => {
                self.reply(ctx, &render::ranking(&state.ranking())).await;
            }
            Command::Help => self.reply(ctx, &render::help()).await,
        }
    }

    async fn handle_add(&self, ctx: &Context, state: &mut ChatState, query: String) {
        let query = if query.is_empty() {
            state.last_query().to_string()
        } else {
            query
        };
        if query.is_empty() {
            // Nothing to look up, not even a previous query.
            self.reply(ctx, &render::lookup_miss()).await;
            return;
        }
        let hit = match self.catalog.lookup(&query).await {
            Ok(Some(hit)) => hit,
            Ok(None) => {
                self.reply(ctx, &render::lookup_miss()).await;
                return;
            }
            Err(e) => {
                warn!(chat = %ctx.chat, query = %query, error = %e, "catalog lookup failed");
                self.reply(ctx, &render::lookup_miss()).await;
                return;
            }
        };
        let entry = Entry::from(hit.clone());
        match state.add_hit(hit) {
            Ok(_) => self.send_preview(ctx, &entry).await,
            Err(WatchlistError::Duplicate { .. }) => {
                self.reply(ctx, &render::already_listed()).await;
            }
            Err(e) => warn!(chat = %ctx.chat, error = %e, "add rejected"),
        }
    }

    async fn handle_query(&self, ctx: &Context, state: &mut ChatState, query: String) {
        // The last query is recorded before the lookup, hit or miss.
        state.set_last_query(query.clone());
        if query.is_empty() {
            self.reply(ctx, &render::lookup_miss()).await;
            return;
        }
        match self.catalog.lookup(&query).await {
            Ok(Some(hit)) => self.send_preview(ctx, &Entry::from(hit)).await,
            Ok(None) => self.reply(ctx, &render::lookup_miss()).await,
            Err(e) => {
                warn!(chat = %ctx.chat, query = %query, error = %e, "catalog lookup failed");
                self.reply(ctx, &render::lookup_miss()).await;
            }
        }
    }

    /// Photo preview of an entry: cover plus caption, replying to the
    /// triggering message.
    async fn send_preview(&self, ctx: &Context, entry: &Entry) {
        let caption = render::caption(entry);
        let result = match self.covers.prepare(&entry.cover).await {
            CoverPayload::Url(url) => {
                self.messenger
                    .send_photo_url(ctx.chat, &url, &caption, Some(ctx.message_id))
                    .await
            }
            CoverPayload::Jpeg(bytes) => {
                self.messenger
                    .send_photo_bytes(ctx.chat, bytes, &caption, Some(ctx.message_id))
                    .await
            }
        };
        if let Err(e) = result {
            metrics::TELEGRAM_SEND_FAILURES.inc();
            warn!(chat = %ctx.chat, error = %e, "failed to send preview");
        }
    }

    async fn reply(&self, ctx: &Context, reply: &Reply) {
        let result = self
            .messenger
            .send_message(ctx.chat, &reply.text, Some(ctx.message_id), reply.markdown)
            .await;
        if let Err(e) = result {
            metrics::TELEGRAM_SEND_FAILURES.inc();
            warn!(chat = %ctx.chat, error = %e, "failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use marquee_core::testing::{fixtures, MockCatalog, MockStorage};
    use marquee_core::{CatalogError, CatalogHit, ChatLists, CoverConfig, Roster};

    use crate::telegram::{Chat, TelegramError};

    use super::*;

    const CHAT: i64 = -100200;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text {
            text: String,
            reply_to: Option<i64>,
            markdown: bool,
        },
        PhotoUrl {
            url: String,
            caption: String,
        },
    }

    /// Records outbound traffic instead of talking to Telegram.
    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(ChatId, Sent)>>,
    }

    impl RecordingMessenger {
        fn sent(&self) -> Vec<(ChatId, Sent)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_message(
            &self,
            chat: ChatId,
            text: &str,
            reply_to: Option<i64>,
            markdown: bool,
        ) -> Result<(), TelegramError> {
            self.sent.lock().unwrap().push((
                chat,
                Sent::Text {
                    text: text.to_string(),
                    reply_to,
                    markdown,
                },
            ));
            Ok(())
        }

        async fn send_photo_url(
            &self,
            chat: ChatId,
            photo_url: &str,
            caption: &str,
            _reply_to: Option<i64>,
        ) -> Result<(), TelegramError> {
            self.sent.lock().unwrap().push((
                chat,
                Sent::PhotoUrl {
                    url: photo_url.to_string(),
                    caption: caption.to_string(),
                },
            ));
            Ok(())
        }

        async fn send_photo_bytes(
            &self,
            chat: ChatId,
            _jpeg: Vec<u8>,
            caption: &str,
            _reply_to: Option<i64>,
        ) -> Result<(), TelegramError> {
            self.sent.lock().unwrap().push((
                chat,
                Sent::PhotoUrl {
                    url: String::new(),
                    caption: caption.to_string(),
                },
            ));
            Ok(())
        }
    }

    struct TestBot {
        dispatcher: Dispatcher,
        catalog: Arc<MockCatalog>,
        messenger: Arc<RecordingMessenger>,
        storage: Arc<MockStorage>,
    }

    fn test_bot() -> TestBot {
        let storage = Arc::new(MockStorage::new());
        let store = Arc::new(ChatStore::new(storage.clone()));
        let catalog = Arc::new(MockCatalog::new());
        let covers = Arc::new(CoverService::new(&CoverConfig::default()).unwrap());
        let messenger = Arc::new(RecordingMessenger::default());
        let dispatcher = Dispatcher::new(
            store,
            catalog.clone(),
            covers,
            messenger.clone(),
            "marquee_bot",
        );
        TestBot {
            dispatcher,
            catalog,
            messenger,
            storage,
        }
    }

    /// A cover URL with a scheme reqwest refuses: preparation fails
    /// without touching the network and falls back to the URL payload.
    const OFFLINE_COVER: &str = "bogus://cover.jpg";

    fn offline_hit(title: &str, year: i32) -> CatalogHit {
        let mut hit = fixtures::catalog_hit(title, year);
        hit.cover = OFFLINE_COVER.to_string();
        hit
    }

    fn offline_entry(title: &str, year: i32) -> Entry {
        let mut entry = fixtures::entry(title, year);
        entry.cover = OFFLINE_COVER.to_string();
        entry
    }

    fn seeded_lists(active: Vec<Entry>) -> ChatLists {
        ChatLists {
            active,
            ..ChatLists::default()
        }
    }

    fn message_from(id: i64, username: Option<&str>, text: &str) -> Message {
        Message {
            message_id: 7,
            from: Some(User {
                id,
                is_bot: false,
                first_name: "Test".to_string(),
                username: username.map(str::to_string),
            }),
            chat: Chat { id: CHAT },
            text: Some(text.to_string()),
            left_chat_member: None,
        }
    }

    fn message(text: &str) -> Message {
        message_from(1, Some("alice"), text)
    }

    async fn dispatch(bot: &TestBot, message: Message) {
        bot.dispatcher
            .handle_update(Update {
                update_id: 1,
                message: Some(message),
            })
            .await;
    }

    fn texts(bot: &TestBot) -> Vec<String> {
        bot.messenger
            .sent()
            .into_iter()
            .map(|(_, sent)| match sent {
                Sent::Text { text, .. } => text,
                Sent::PhotoUrl { caption, .. } => caption,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_all_lists_entries_with_positions() {
        let bot = test_bot();
        dispatch(&bot, message("/all")).await;

        let sent = bot.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChatId(CHAT));
        assert_eq!(
            sent[0].1,
            Sent::Text {
                text: "Movie list is empty! Start adding movies with /add!".to_string(),
                reply_to: Some(7),
                markdown: true,
            }
        );

        let bot = test_bot();
        bot.storage.seed_chat(
            ChatId(CHAT),
            seeded_lists(vec![
                fixtures::entry("Heat", 1995),
                fixtures::entry("Alien", 1979),
            ]),
            Roster::new(),
        );
        dispatch(&bot, message("/all")).await;
        let replies = texts(&bot);
        assert!(replies[0].starts_with("To-watch movie list:\n  0. Heat (1995)\n  1. Alien (1979)\n"));
    }

    #[tokio::test]
    async fn test_plain_text_registers_without_replying() {
        let bot = test_bot();
        dispatch(&bot, message_from(1, Some("Alice"), "hello there")).await;

        assert!(bot.messenger.sent().is_empty());
        let roster = bot.storage.saved_roster(ChatId(CHAT)).unwrap();
        assert!(roster.contains("alice"));
        assert_eq!(roster.get("alice").map(|m| m.username.as_str()), Some("Alice"));
    }

    #[tokio::test]
    async fn test_bot_senders_are_ignored() {
        let bot = test_bot();
        let mut msg = message("/all");
        if let Some(from) = msg.from.as_mut() {
            from.is_bot = true;
        }
        dispatch(&bot, msg).await;

        assert!(bot.messenger.sent().is_empty());
        assert_eq!(bot.storage.roster_save_count(), 0);
    }

    #[tokio::test]
    async fn test_other_bots_commands_only_register_the_sender() {
        let bot = test_bot();
        dispatch(&bot, message("/all@other_bot")).await;

        assert!(bot.messenger.sent().is_empty());
        assert!(bot.storage.saved_roster(ChatId(CHAT)).unwrap().contains("alice"));
    }

    #[tokio::test]
    async fn test_add_previews_hit_and_persists() {
        let bot = test_bot();
        bot.catalog.add_hit("heat", offline_hit("Heat", 1995)).await;

        dispatch(&bot, message("/add heat")).await;

        let sent = bot.messenger.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0].1 {
            Sent::PhotoUrl { url, caption } => {
                assert_eq!(url, OFFLINE_COVER);
                assert!(caption.starts_with("Heat (1995)\nIMDb: https://www.imdb.com/title/"));
            }
            other => panic!("expected photo preview, got {:?}", other),
        }
        let lists = bot.storage.saved_lists(ChatId(CHAT)).unwrap();
        assert_eq!(lists.active.len(), 1);
        assert_eq!(lists.active[0].title, "Heat");
    }

    #[tokio::test]
    async fn test_add_duplicate_replies_already_listed() {
        let bot = test_bot();
        bot.catalog.add_hit("heat", offline_hit("Heat", 1995)).await;

        dispatch(&bot, message("/add heat")).await;
        dispatch(&bot, message("/add heat")).await;

        let replies = texts(&bot);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1], "Movie is already in our to-watch list!");
    }

    #[tokio::test]
    async fn test_add_falls_back_to_last_query() {
        let bot = test_bot();
        bot.catalog.add_hit("heat", offline_hit("Heat", 1995)).await;

        dispatch(&bot, message("/query heat")).await;
        dispatch(&bot, message("/add")).await;

        assert_eq!(bot.catalog.recorded_queries().await, ["heat", "heat"]);
        let lists = bot.storage.saved_lists(ChatId(CHAT)).unwrap();
        assert_eq!(lists.active.len(), 1);
    }

    #[tokio::test]
    async fn test_add_without_any_query_misses_without_lookup() {
        let bot = test_bot();
        dispatch(&bot, message("/add")).await;

        assert_eq!(bot.catalog.query_count().await, 0);
        assert_eq!(texts(&bot), ["Could not find requested query!"]);
    }

    #[tokio::test]
    async fn test_lookup_miss_and_error_reply_the_same() {
        let bot = test_bot();
        dispatch(&bot, message("/query unknown")).await;

        bot.catalog
            .set_next_error(CatalogError::ParseError("catalog exploded".to_string()))
            .await;
        dispatch(&bot, message("/query unknown")).await;

        assert_eq!(
            texts(&bot),
            ["Could not find requested query!", "Could not find requested query!"]
        );
    }

    #[tokio::test]
    async fn test_watch_archives_when_everyone_watched() {
        let bot = test_bot();
        bot.storage.seed_chat(
            ChatId(CHAT),
            seeded_lists(vec![fixtures::entry("Heat", 1995)]),
            Roster::new(),
        );

        // The sender registers on sight, so the roster is exactly them.
        dispatch(&bot, message("/watch 0")).await;

        let replies = texts(&bot);
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with(
            "I've removed the following movies because everyone has watched them!\n  Heat (1995)\n"
        ));

        let lists = bot.storage.saved_lists(ChatId(CHAT)).unwrap();
        assert!(lists.active.is_empty());
        assert_eq!(lists.archived.len(), 1);
        assert_eq!(lists.undo_batch.len(), 1);
    }

    #[tokio::test]
    async fn test_watch_without_username_does_nothing() {
        let bot = test_bot();
        bot.storage.seed_chat(
            ChatId(CHAT),
            seeded_lists(vec![fixtures::entry("Heat", 1995)]),
            Roster::new(),
        );

        dispatch(&bot, message_from(9, None, "/watch 0")).await;

        assert!(bot.messenger.sent().is_empty());
        assert_eq!(bot.storage.list_save_count(), 0);
    }

    #[tokio::test]
    async fn test_unwatch_is_silent_and_never_saves() {
        let bot = test_bot();
        bot.storage.seed_chat(
            ChatId(CHAT),
            seeded_lists(vec![fixtures::entry("Heat", 1995)]),
            Roster::new(),
        );

        // Two members, so the watch below does not archive.
        dispatch(&bot, message_from(2, Some("bob"), "hi")).await;
        dispatch(&bot, message("/watch 0")).await;
        let saves_after_watch = bot.storage.list_save_count();
        assert_eq!(saves_after_watch, 1);

        dispatch(&bot, message("/unwatch 0")).await;

        assert!(bot.messenger.sent().is_empty());
        assert_eq!(bot.storage.list_save_count(), saves_after_watch);
    }

    #[tokio::test]
    async fn test_remove_confirms_and_ignores_bad_index() {
        let bot = test_bot();
        bot.storage.seed_chat(
            ChatId(CHAT),
            seeded_lists(vec![fixtures::entry("Heat", 1995)]),
            Roster::new(),
        );

        dispatch(&bot, message("/remove 0")).await;
        dispatch(&bot, message("/remove 9")).await;
        dispatch(&bot, message("/remove x")).await;

        let sent = bot.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1,
            Sent::Text {
                text: "Removing Heat (1995) from movie list...".to_string(),
                reply_to: Some(7),
                markdown: false,
            }
        );
    }

    #[tokio::test]
    async fn test_show_previews_entry_or_stays_silent() {
        let bot = test_bot();
        bot.storage.seed_chat(
            ChatId(CHAT),
            seeded_lists(vec![offline_entry("Heat", 1995)]),
            Roster::new(),
        );

        dispatch(&bot, message("/show 0")).await;
        dispatch(&bot, message("/show 5")).await;

        let sent = bot.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0].1, Sent::PhotoUrl { url, .. } if url == OFFLINE_COVER));
    }

    #[tokio::test]
    async fn test_watched_views() {
        let bot = test_bot();
        let mut roster = Roster::new();
        roster.register(Member::new(1, "alice", "Alice"));
        bot.storage.seed_chat(
            ChatId(CHAT),
            ChatLists {
                active: vec![],
                archived: vec![fixtures::watched_entry("Heat", 1995, &["alice"])],
                undo_batch: vec![],
            },
            roster,
        );

        dispatch(&bot, message("/watched")).await;
        dispatch(&bot, message("/watched @ALICE")).await;
        dispatch(&bot, message("/watched ghost")).await;

        let replies = texts(&bot);
        assert_eq!(replies[0], "Watched movie list:\n  0. Heat (1995)\n");
        assert!(replies[1].contains("Movies watched by alice in the watched list:\n  0. Heat (1995)\n"));
        assert!(replies[1].ends_with("Total movies watched: 1"));
        assert_eq!(replies[2], "I don't know who ghost is!");
    }

    #[tokio::test]
    async fn test_draw_stays_silent_when_nothing_drawn() {
        let bot = test_bot();
        dispatch(&bot, message("/draw")).await;
        assert!(bot.messenger.sent().is_empty());

        bot.storage.seed_chat(
            ChatId(CHAT + 1),
            seeded_lists(vec![fixtures::entry("Heat", 1995)]),
            Roster::new(),
        );
        let mut in_other_chat = message("/draw 0");
        in_other_chat.chat = Chat { id: CHAT + 1 };
        dispatch(&bot, in_other_chat).await;
        assert!(bot.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_draw_announces_picks_with_positions() {
        let bot = test_bot();
        bot.storage.seed_chat(
            ChatId(CHAT),
            seeded_lists(vec![fixtures::entry("Heat", 1995)]),
            Roster::new(),
        );

        dispatch(&bot, message("/draw")).await;

        let replies = texts(&bot);
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("  0. Heat (1995) {0}\n"));
    }

    #[tokio::test]
    async fn test_ranking_keeps_display_casing() {
        let bot = test_bot();
        dispatch(&bot, message_from(1, Some("Alice"), "/ranking")).await;

        let sent = bot.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1,
            Sent::Text {
                text: "Ranking of number of watched movies:\n  1. Alice (0)\n".to_string(),
                reply_to: Some(7),
                markdown: false,
            }
        );
    }

    #[tokio::test]
    async fn test_restore_and_save_reply_with_nothing() {
        let bot = test_bot();
        dispatch(&bot, message("/restore")).await;
        dispatch(&bot, message("/save")).await;

        assert!(bot.messenger.sent().is_empty());
        // The save command flushed both lists and roster.
        assert!(bot.storage.list_save_count() >= 1);
        assert!(bot.storage.roster_save_count() >= 1);
    }

    #[tokio::test]
    async fn test_departure_deregisters_member() {
        let bot = test_bot();
        dispatch(&bot, message("hello")).await;
        assert!(bot.storage.saved_roster(ChatId(CHAT)).unwrap().contains("alice"));

        let leave = Message {
            message_id: 8,
            from: None,
            chat: Chat { id: CHAT },
            text: None,
            left_chat_member: Some(User {
                id: 1,
                is_bot: false,
                first_name: "Test".to_string(),
                username: Some("alice".to_string()),
            }),
        };
        dispatch(&bot, leave).await;

        assert!(!bot.storage.saved_roster(ChatId(CHAT)).unwrap().contains("alice"));
    }
}
