//! Bot command parsing.
//!
//! Commands arrive as `/name args` message text. In group chats the name
//! may carry a target bot username (`/add@marquee_bot heat`); commands
//! addressed to a different bot are dropped.

/// A parsed command with its arguments.
///
/// Index arguments keep the convention of the rendered lists: positions
/// are zero-based. A `None` index or index list means the argument text
/// did not parse; handlers treat that as "do nothing".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/all`: print the to-watch list.
    All,
    /// `/show i`: photo preview of the `i`-th entry.
    Show { index: Option<usize> },
    /// `/remove i`: drop the `i`-th entry.
    Remove { index: Option<usize> },
    /// `/add title`: look up `title` and append the hit. A blank title
    /// falls back to the chat's last query.
    Add { query: String },
    /// `/query title`: look up `title` and preview the hit.
    Query { query: String },
    /// `/watch i1 i2 ...`: mark entries watched by the sender.
    Watch { indices: Option<Vec<usize>> },
    /// `/unwatch i1 i2 ...`: clear the sender's watched marks.
    Unwatch { indices: Option<Vec<usize>> },
    /// `/restore`: put the last archived batch back.
    Restore,
    /// `/watched [username]`: watched list, overall or for one member.
    Watched { username: Option<String> },
    /// `/draw [n]`: pick `n` random entries (default 1).
    Draw { count: Option<usize> },
    /// `/save`: flush the chat to disk.
    Save,
    /// `/ranking`: members ordered by watched count.
    Ranking,
    /// `/help`: command overview.
    Help,
}

impl Command {
    /// Parse a message text. `None` for anything that is not one of our
    /// commands: plain chatter, unknown names and commands addressed to
    /// another bot.
    pub fn parse(text: &str, bot_username: &str) -> Option<Command> {
        let rest = text.trim().strip_prefix('/')?;

        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };

        let name = match head.split_once('@') {
            Some((name, target)) => {
                if !target.eq_ignore_ascii_case(bot_username) {
                    return None;
                }
                name
            }
            None => head,
        };

        let command = match name {
            "all" => Command::All,
            "show" => Command::Show {
                index: parse_index(args),
            },
            "remove" => Command::Remove {
                index: parse_index(args),
            },
            "add" => Command::Add {
                query: args.to_string(),
            },
            "query" => Command::Query {
                query: args.to_string(),
            },
            "watch" => Command::Watch {
                indices: parse_indices(args),
            },
            "unwatch" => Command::Unwatch {
                indices: parse_indices(args),
            },
            "restore" => Command::Restore,
            "watched" => Command::Watched {
                username: parse_username(args),
            },
            "draw" => Command::Draw {
                count: parse_count(args),
            },
            "save" => Command::Save,
            "ranking" => Command::Ranking,
            "help" => Command::Help,
            _ => return None,
        };
        Some(command)
    }

    /// Command name, for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Command::All => "all",
            Command::Show { .. } => "show",
            Command::Remove { .. } => "remove",
            Command::Add { .. } => "add",
            Command::Query { .. } => "query",
            Command::Watch { .. } => "watch",
            Command::Unwatch { .. } => "unwatch",
            Command::Restore => "restore",
            Command::Watched { .. } => "watched",
            Command::Draw { .. } => "draw",
            Command::Save => "save",
            Command::Ranking => "ranking",
            Command::Help => "help",
        }
    }
}

/// The whole argument string must be one non-negative number.
fn parse_index(args: &str) -> Option<usize> {
    let value: i64 = args.parse().ok()?;
    usize::try_from(value).ok()
}

/// Every token must be a number or the list is rejected outright.
/// Negative positions can never match an entry and are dropped.
fn parse_indices(args: &str) -> Option<Vec<usize>> {
    let mut indices = Vec::new();
    for token in args.split_whitespace() {
        let value: i64 = token.parse().ok()?;
        if let Ok(index) = usize::try_from(value) {
            indices.push(index);
        }
    }
    Some(indices)
}

/// First number of the argument list, defaulting to 1 with no arguments.
/// A non-positive count draws nothing.
fn parse_count(args: &str) -> Option<usize> {
    if args.is_empty() {
        return Some(1);
    }
    let values: Vec<i64> = args
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    let first = *values.first()?;
    Some(usize::try_from(first).unwrap_or(0))
}

fn parse_username(args: &str) -> Option<String> {
    if args.is_empty() {
        None
    } else {
        Some(args.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "marquee_bot";

    #[test]
    fn test_parse_bare_commands() {
        assert_eq!(Command::parse("/all", BOT), Some(Command::All));
        assert_eq!(Command::parse("/restore", BOT), Some(Command::Restore));
        assert_eq!(Command::parse("/save", BOT), Some(Command::Save));
        assert_eq!(Command::parse("/ranking", BOT), Some(Command::Ranking));
        assert_eq!(Command::parse("/help", BOT), Some(Command::Help));
    }

    #[test]
    fn test_non_commands_are_ignored() {
        assert_eq!(Command::parse("hello there", BOT), None);
        assert_eq!(Command::parse("", BOT), None);
        assert_eq!(Command::parse("/", BOT), None);
        assert_eq!(Command::parse("/frobnicate", BOT), None);
        // Command names are case-sensitive.
        assert_eq!(Command::parse("/All", BOT), None);
    }

    #[test]
    fn test_bot_username_suffix() {
        assert_eq!(
            Command::parse("/add@marquee_bot heat", BOT),
            Some(Command::Add {
                query: "heat".to_string()
            })
        );
        // Username matching ignores case.
        assert_eq!(
            Command::parse("/all@Marquee_Bot", BOT),
            Some(Command::All)
        );
        // Another bot's command is not ours to answer.
        assert_eq!(Command::parse("/add@other_bot heat", BOT), None);
    }

    #[test]
    fn test_single_index_arguments() {
        assert_eq!(
            Command::parse("/show 3", BOT),
            Some(Command::Show { index: Some(3) })
        );
        assert_eq!(
            Command::parse("/show", BOT),
            Some(Command::Show { index: None })
        );
        assert_eq!(
            Command::parse("/show three", BOT),
            Some(Command::Show { index: None })
        );
        assert_eq!(
            Command::parse("/remove -1", BOT),
            Some(Command::Remove { index: None })
        );
        // Multiple numbers do not make a single index.
        assert_eq!(
            Command::parse("/show 3 4", BOT),
            Some(Command::Show { index: None })
        );
    }

    #[test]
    fn test_index_list_arguments() {
        assert_eq!(
            Command::parse("/watch 1 2 3", BOT),
            Some(Command::Watch {
                indices: Some(vec![1, 2, 3])
            })
        );
        assert_eq!(
            Command::parse("/watch", BOT),
            Some(Command::Watch {
                indices: Some(vec![])
            })
        );
        // One bad token rejects the whole list.
        assert_eq!(
            Command::parse("/watch 1 x 3", BOT),
            Some(Command::Watch { indices: None })
        );
        // Negative positions are dropped, the rest survive.
        assert_eq!(
            Command::parse("/unwatch -1 2", BOT),
            Some(Command::Unwatch {
                indices: Some(vec![2])
            })
        );
    }

    #[test]
    fn test_draw_count() {
        assert_eq!(
            Command::parse("/draw", BOT),
            Some(Command::Draw { count: Some(1) })
        );
        assert_eq!(
            Command::parse("/draw 3", BOT),
            Some(Command::Draw { count: Some(3) })
        );
        // Only the first number counts, but all must parse.
        assert_eq!(
            Command::parse("/draw 3 9", BOT),
            Some(Command::Draw { count: Some(3) })
        );
        assert_eq!(
            Command::parse("/draw 3 x", BOT),
            Some(Command::Draw { count: None })
        );
        assert_eq!(
            Command::parse("/draw many", BOT),
            Some(Command::Draw { count: None })
        );
        assert_eq!(
            Command::parse("/draw -2", BOT),
            Some(Command::Draw { count: Some(0) })
        );
    }

    #[test]
    fn test_query_text_is_kept_whole() {
        assert_eq!(
            Command::parse("/query blade runner", BOT),
            Some(Command::Query {
                query: "blade runner".to_string()
            })
        );
        assert_eq!(
            Command::parse("/add", BOT),
            Some(Command::Add {
                query: String::new()
            })
        );
    }

    #[test]
    fn test_watched_username_argument() {
        assert_eq!(
            Command::parse("/watched", BOT),
            Some(Command::Watched { username: None })
        );
        // Kept raw; normalization happens at dispatch.
        assert_eq!(
            Command::parse("/watched @Alice", BOT),
            Some(Command::Watched {
                username: Some("@Alice".to_string())
            })
        );
    }

    #[test]
    fn test_names_match_commands() {
        assert_eq!(Command::All.name(), "all");
        assert_eq!(Command::Draw { count: Some(1) }.name(), "draw");
        assert_eq!(Command::Watch { indices: None }.name(), "watch");
    }
}
