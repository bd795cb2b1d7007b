//! Line-based admin REPL served to kernel clients

use std::sync::Arc;
use std::time::Instant;
use subtle::ConstantTimeEq;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::domain::entities::{ChannelId, GuildId, OutgoingMessage};
use crate::domain::traits::{Bot, Scope, Store};

const HELP: &str = "\
Commands:
  help                        show this text
  ping                        check the connection
  guilds                      list cached guilds
  guild <id>                  show one cached guild
  config <namespace> [scope]  dump stored settings (scope: global, guild:<id>, user:<id>)
  say <channel id> <text>     send a message as the bot
  quit                        close the connection";

/// Outcome of one evaluated line
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// What REPL commands are evaluated against
pub struct Env {
    pub bot: Arc<dyn Bot>,
    pub store: Arc<dyn Store>,
    pub started: Instant,
}

impl Env {
    pub fn new(bot: Arc<dyn Bot>, store: Arc<dyn Store>) -> Self {
        Self {
            bot,
            store,
            started: Instant::now(),
        }
    }

    pub async fn eval(&self, line: &str) -> Reply {
        let line = line.trim();
        let (command, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let args = args.trim();
        let text = match command {
            "" => String::new(),
            "help" => HELP.to_string(),
            "quit" | "exit" => return Reply::Quit,
            "ping" => format!("pong (up {}s)", self.started.elapsed().as_secs()),
            "guilds" => self.guilds(),
            "guild" => self.guild(args),
            "config" => self.config(args).await,
            "say" => self.say(args).await,
            other => format!("Unknown command `{}`. Type `help` for commands.", other),
        };
        Reply::Text(text)
    }

    fn guilds(&self) -> String {
        let mut guilds = self.bot.guilds();
        if guilds.is_empty() {
            return "No guilds cached.".to_string();
        }
        guilds.sort_by_key(|g| g.id);
        guilds
            .iter()
            .map(|g| format!("{} {}", g.id, g.name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn guild(&self, arg: &str) -> String {
        let Ok(id) = arg.parse::<GuildId>() else {
            return "Usage: guild <id>".to_string();
        };
        let Some(guild) = self.bot.guild(id) else {
            return format!("Guild {} is not cached.", id);
        };
        let mut out = format!(
            "{} ({})\nowner: {}\nboosts: {}\nbot top role position: {}\nchannels:",
            guild.name,
            guild.id,
            guild.owner_id,
            guild.premium_subscription_count,
            guild.bot_top_position()
        );
        for channel in &guild.channels {
            out.push_str(&format!("\n  {} #{}", channel.id, channel.name));
        }
        out.push_str("\nroles:");
        for role in &guild.roles {
            out.push_str(&format!("\n  {} {} (position {})", role.id, role.name, role.position));
        }
        out
    }

    async fn config(&self, args: &str) -> String {
        let mut parts = args.split_whitespace();
        let Some(namespace) = parts.next() else {
            return "Usage: config <namespace> [scope]".to_string();
        };
        let scope = match parts.next().map(Scope::parse) {
            None => None,
            Some(Some(scope)) => Some(scope),
            Some(None) => return "Invalid scope, use global, guild:<id> or user:<id>".to_string(),
        };

        let all = match self.store.all(namespace).await {
            Ok(all) => all,
            Err(e) => return format!("Error: {}", e),
        };
        let lines: Vec<String> = all
            .into_iter()
            .filter(|(s, _)| scope.map_or(true, |wanted| *s == wanted))
            .map(|(s, values)| {
                let json = serde_json::to_string_pretty(&values).unwrap_or_default();
                format!("[{}]\n{}", s, json)
            })
            .collect();
        if lines.is_empty() {
            return format!("Nothing stored for {}.", namespace);
        }
        lines.join("\n")
    }

    async fn say(&self, args: &str) -> String {
        let Some((channel, text)) = args.split_once(char::is_whitespace) else {
            return "Usage: say <channel id> <text>".to_string();
        };
        let Ok(channel) = channel.parse::<ChannelId>() else {
            return format!("Invalid channel id `{}`", channel);
        };
        match self.bot.send_message(channel, OutgoingMessage::text(text.trim())).await {
            Ok(id) => format!("Sent message {}", id),
            Err(e) => format!("Error: {}", e),
        }
    }
}

/// Longest first line read from an unauthenticated client
const MAX_KEY_LINE: u64 = 1024;

/// Reads the first line, at most [`MAX_KEY_LINE`] bytes, and compares it
/// with the key in constant time
async fn authorize<R>(reader: &mut R, key: &str) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let mut first = Vec::new();
    reader.take(MAX_KEY_LINE).read_until(b'\n', &mut first).await?;
    let line = first.trim_ascii();
    Ok(line.ct_eq(key.as_bytes()).into())
}

/// Serves one client: the key must come first, then one command per line
pub async fn session(stream: TcpStream, key: Arc<str>, env: Arc<Env>) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    if !authorize(&mut reader, &key).await? {
        write.write_all(b"Invalid key\n").await?;
        return Ok(());
    }
    let mut lines = reader.lines();
    let banner = format!(
        "Connected to {}. Type `help` for commands.\n",
        env.bot.bot_info().name
    );
    write.write_all(banner.as_bytes()).await?;

    while let Some(line) = lines.next_line().await? {
        debug!("kernel> {}", line);
        match env.eval(&line).await {
            Reply::Quit => {
                write.write_all(b"Bye\n").await?;
                break;
            }
            Reply::Text(text) => {
                write.write_all(text.as_bytes()).await?;
                write.write_all(b"\n").await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::console::{ConsoleAdapter, CONSOLE_CHANNEL, CONSOLE_GUILD};
    use crate::infrastructure::database::SqliteStore;
    use tokio::sync::mpsc;

    fn env() -> (Arc<ConsoleAdapter>, Env) {
        let (tx, _rx) = mpsc::channel(8);
        let console = Arc::new(ConsoleAdapter::new(tx).with_guild(ConsoleAdapter::default_guild()));
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let env = Env::new(console.clone(), store);
        (console, env)
    }

    #[tokio::test]
    async fn test_authorize() {
        let mut input: &[u8] = b"  secret \nping\n";
        assert!(authorize(&mut input, "secret").await.unwrap());
        assert_eq!(input, b"ping\n");

        let mut input: &[u8] = b"secreT\n";
        assert!(!authorize(&mut input, "secret").await.unwrap());
        let mut input: &[u8] = b"";
        assert!(!authorize(&mut input, "secret").await.unwrap());
    }

    #[tokio::test]
    async fn test_authorize_reads_a_bounded_line() {
        let mut long = b"secret".to_vec();
        long.extend(std::iter::repeat(b'x').take(4000));
        long.push(b'\n');
        let mut input: &[u8] = &long;
        assert!(!authorize(&mut input, "secret").await.unwrap());
        assert_eq!(input.len(), long.len() - MAX_KEY_LINE as usize);
    }

    fn text(reply: Reply) -> String {
        match reply {
            Reply::Text(text) => text,
            Reply::Quit => panic!("unexpected quit"),
        }
    }

    #[tokio::test]
    async fn test_basic_commands() {
        let (_console, env) = env();
        assert!(text(env.eval("ping").await).starts_with("pong"));
        assert!(text(env.eval("help").await).contains("config <namespace>"));
        assert_eq!(env.eval(" quit ").await, Reply::Quit);
        assert!(text(env.eval("frobnicate").await).starts_with("Unknown command `frobnicate`"));
        assert_eq!(text(env.eval("").await), "");
    }

    #[tokio::test]
    async fn test_guild_commands() {
        let (_console, env) = env();
        assert_eq!(text(env.eval("guilds").await), format!("{} Console", CONSOLE_GUILD));

        let details = text(env.eval(&format!("guild {}", CONSOLE_GUILD)).await);
        assert!(details.starts_with("Console (1)"));
        assert!(details.contains("#general"));
        assert!(details.contains("bot top role position: 10"));

        assert_eq!(text(env.eval("guild 99").await), "Guild 99 is not cached.");
        assert_eq!(text(env.eval("guild x").await), "Usage: guild <id>");
    }

    #[tokio::test]
    async fn test_config_dump() {
        let (_console, env) = env();
        assert_eq!(text(env.eval("config banmessage").await), "Nothing stored for banmessage.");

        env.store
            .set("banmessage", Scope::Guild(CONSOLE_GUILD), "channel", serde_json::json!(10))
            .await
            .unwrap();
        let dump = text(env.eval("config banmessage guild:1").await);
        assert!(dump.starts_with("[guild:1]"));
        assert!(dump.contains("\"channel\": 10"));

        assert_eq!(text(env.eval("config banmessage global").await), "Nothing stored for banmessage.");
        assert!(text(env.eval("config banmessage nowhere").await).starts_with("Invalid scope"));
    }

    #[tokio::test]
    async fn test_say() {
        let (console, env) = env();
        let reply = text(env.eval(&format!("say {} hello there", CONSOLE_CHANNEL)).await);
        assert!(reply.starts_with("Sent message"));
        let sent = console.sent_to(CONSOLE_CHANNEL);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message.content, "hello there");

        assert_eq!(text(env.eval("say").await), "Usage: say <channel id> <text>");
    }
}
