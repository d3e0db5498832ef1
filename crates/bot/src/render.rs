//! Reply rendering.
//!
//! All user-visible message text is built here. List positions are
//! rendered zero-based, matching the indices the commands take back.

use marquee_core::watchlist::{DrawnEntry, Entry, RankedMember, WatchedSummary};

/// A rendered reply and how Telegram should parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Send with Markdown parsing.
    pub markdown: bool,
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
        }
    }

    fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
        }
    }
}

/// Reply to `/add` when the hit is already listed.
pub fn already_listed() -> Reply {
    Reply::plain("Movie is already in our to-watch list!")
}

/// Reply when a lookup produced no usable hit.
pub fn lookup_miss() -> Reply {
    Reply::plain("Could not find requested query!")
}

/// The `/all` listing.
pub fn watchlist(entries: &[Entry]) -> Reply {
    if entries.is_empty() {
        return Reply::markdown("Movie list is empty! Start adding movies with /add!");
    }
    let mut text = String::from("To-watch movie list:\n");
    for (index, entry) in entries.iter().enumerate() {
        text.push_str(&format!("  {}. {}\n", index, entry));
    }
    text.push_str("`/show i` - shows more information on the `i`-th movie.");
    Reply::markdown(text)
}

/// Confirmation for `/remove`.
pub fn removing(entry: &Entry) -> Reply {
    Reply::plain(format!("Removing {} from movie list...", entry))
}

/// Announcement of an automatic archival, or `None` when nothing moved.
pub fn archival_notice(archived: &[Entry]) -> Option<Reply> {
    if archived.is_empty() {
        return None;
    }
    let mut text =
        String::from("I've removed the following movies because everyone has watched them!\n");
    for entry in archived {
        text.push_str(&format!("  {}\n", entry));
    }
    text.push_str("To undo these changes, tell me to `/restore`.");
    Some(Reply::markdown(text))
}

/// The `/watched` listing over the archive.
pub fn watched_list(archived: &[Entry]) -> Reply {
    if archived.is_empty() {
        return Reply::markdown("You have not watched any movies yet! :(");
    }
    let mut text = String::from("Watched movie list:\n");
    for (index, entry) in archived.iter().enumerate() {
        text.push_str(&format!("  {}. {}\n", index, entry));
    }
    Reply::markdown(text)
}

/// The `/watched username` breakdown. `username` is already normalized;
/// active entries carry their watchlist position in curly braces so they
/// can be fed back to `/show` and friends.
pub fn watched_by(username: &str, summary: &WatchedSummary) -> Reply {
    let mut text = format!("Movies watched by {} still in the to-watch list:\n", username);
    for (count, (position, entry)) in summary.active.iter().enumerate() {
        text.push_str(&format!("  {}. {} {{{}}}\n", count, entry, position));
    }
    text.push_str(&format!(
        "Movies watched by {} in the watched list:\n",
        username
    ));
    for (count, entry) in summary.archived.iter().enumerate() {
        text.push_str(&format!("  {}. {}\n", count, entry));
    }
    text.push_str(&format!("Total movies watched: {}", summary.total()));
    Reply::markdown(text)
}

/// Reply to `/watched username` for an unregistered name.
pub fn unknown_member(username: &str) -> Reply {
    Reply::markdown(format!("I don't know who {} is!", username))
}

/// The `/draw` result, or `None` when nothing was drawn.
pub fn draw(drawn: &[DrawnEntry]) -> Option<Reply> {
    if drawn.is_empty() {
        return None;
    }
    let mut text = String::from("I've chosen these movies for you to watch. Have fun! :)\n");
    for (count, pick) in drawn.iter().enumerate() {
        text.push_str(&format!("  {}. {} {{{}}}\n", count, pick.entry, pick.position));
    }
    text.push_str(
        "You can find out more about each movie with `/show i` where `i` is the number in \
         {curly braces}. Don't forget to `/watch i` when you're finished watching movie `i`!",
    );
    Some(Reply::markdown(text))
}

/// The `/ranking` table. Plain text: usernames keep their display casing
/// and Markdown would mangle names with underscores.
pub fn ranking(ranked: &[RankedMember]) -> Reply {
    let mut text = String::from("Ranking of number of watched movies:\n");
    for (index, member) in ranked.iter().enumerate() {
        text.push_str(&format!(
            "  {}. {} ({})\n",
            index + 1,
            member.username,
            member.watched
        ));
    }
    Reply::plain(text)
}

/// The `/help` overview.
pub fn help() -> Reply {
    Reply::markdown(
        "List of commands:\n\
         \x20 `/all`: prints current movie list\n\
         \x20 `/show i`: prints more info on the `i`-th item of list\n\
         \x20 `/remove i`: removes `i`-th item from list\n\
         \x20 `/add title`: adds top search result of `title` to list\n\
         \x20 `/query title`: queries IMDb for `title`\n\
         \x20 `/watch i1 i2 ...`: mark all `ij` instances as `watched` by you\n\
         \x20 `/unwatch i1 i2 ...`: mark all `ij` instances as `unwatched` by you\n\
         \x20 `/restore`: restore last automatically removed items of movie list\n\
         \x20 `/watched`: prints list of watched movies\n\
         \x20 `/watched username`: prints list of movies watched by username\n\
         \x20 `/draw n=1`: draws n movies at random (default n=1)\n\
         \x20 `/save`: force save everything\n\
         \x20 `/ranking`: prints ranking of watched movies\n\
         **Important:** before `/add`-ing, `/query` first to make sure it's the right movie!",
    )
}

/// Photo caption for an entry preview.
pub fn caption(entry: &Entry) -> String {
    let mut text = format!("{}\nIMDb: {}", entry, entry.imdb_url());
    if !entry.watched_by.is_empty() {
        text.push_str(&format!("\nWatched by ({}):", entry.watched_by.len()));
        for watcher in &entry.watched_by {
            text.push_str(&format!(" @{}", watcher));
        }
    }
    text
}
