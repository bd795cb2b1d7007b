//! Message parser - Turns prefixed text into command invocations

/// A parsed command call: `<prefix><name> <args...>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<String>,
    /// Everything after the command name, untouched
    pub raw: String,
}

impl Invocation {
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|s| s.as_str())
    }

    /// Raw text that follows the first `skip` arguments, with inner
    /// whitespace and newlines preserved.
    pub fn rest_after(&self, skip: usize) -> &str {
        let mut rest = self.raw.trim_start();
        for _ in 0..skip {
            match rest.find(char::is_whitespace) {
                Some(end) => rest = rest[end..].trim_start(),
                None => return "",
            }
        }
        rest.trim_end()
    }
}

/// Parses incoming text into command invocations
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Returns `None` for anything that is not a command
    pub fn parse(&self, text: &str) -> Option<Invocation> {
        if self.command_prefix.is_empty() {
            return None;
        }
        let cmd_text = text.strip_prefix(&self.command_prefix)?;

        // "! help" is not a command
        if cmd_text.starts_with(char::is_whitespace) {
            return None;
        }

        let (name, raw) = match cmd_text.find(char::is_whitespace) {
            Some(end) => (&cmd_text[..end], &cmd_text[end..]),
            None => (cmd_text, ""),
        };
        if name.is_empty() {
            return None;
        }

        Some(Invocation {
            name: name.to_string(),
            args: raw.split_whitespace().map(|s| s.to_string()).collect(),
            raw: raw.to_string(),
        })
    }
}
