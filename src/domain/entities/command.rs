use std::collections::HashMap;

/// Who may invoke a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Permission {
    #[default]
    Everyone,
    /// Guild administrators, or members allowed to manage roles
    ManageRoles,
    /// Guild administrators
    Admin,
    /// Bot owners
    Owner,
}

/// Represents a bot command
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub usage: Option<String>,
    pub permission: Permission,
    pub guild_only: bool,
    pub subcommands: Vec<Command>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            aliases: Vec::new(),
            usage: None,
            permission: Permission::Everyone,
            guild_only: false,
            subcommands: Vec::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.guild_only = true;
        self
    }

    pub fn with_subcommand(mut self, command: Command) -> Self {
        self.subcommands.push(command);
        self
    }

    pub fn matches(&self, input: &str) -> bool {
        let input_lower = input.to_lowercase();
        self.name.to_lowercase() == input_lower ||
            self.aliases.iter().any(|a| a.to_lowercase() == input_lower)
    }

    pub fn subcommand(&self, input: &str) -> Option<&Command> {
        self.subcommands.iter().find(|c| c.matches(input))
    }
}

/// Registered command together with the plugin that owns it
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    pub plugin: String,
    pub command: Command,
}

/// Command registry for managing available commands
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the name is already taken.
    pub fn register(&mut self, plugin: impl Into<String>, command: Command) -> bool {
        if self.find(&command.name).is_some() {
            return false;
        }
        self.commands.insert(command.name.clone(), RegisteredCommand {
            plugin: plugin.into(),
            command,
        });
        true
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredCommand> {
        self.commands.get(name)
    }

    pub fn find(&self, input: &str) -> Option<&RegisteredCommand> {
        self.commands.values().find(|c| c.command.matches(input))
    }

    pub fn all(&self) -> impl Iterator<Item = &RegisteredCommand> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_alias_case_insensitive() {
        let mut registry = CommandRegistry::new();
        assert!(registry.register("rlstats", Command::new("rlstats").with_aliases(vec!["rl".to_string()])));
        assert_eq!(registry.find("RL").map(|c| c.plugin.as_str()), Some("rlstats"));
        assert!(registry.find("nope").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = CommandRegistry::new();
        assert!(registry.register("a", Command::new("x")));
        assert!(!registry.register("b", Command::new("X")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_subcommand_lookup() {
        let cmd = Command::new("banmessageset")
            .with_subcommand(Command::new("channel"))
            .with_subcommand(Command::new("addmessage"));
        assert!(cmd.subcommand("AddMessage").is_some());
        assert!(cmd.subcommand("missing").is_none());
    }
}
