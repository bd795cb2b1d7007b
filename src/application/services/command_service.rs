use crate::application::errors::CommandError;
use crate::application::messaging::middleware::{Context, MiddlewareChain, MiddlewareError};
use crate::application::messaging::{Invocation, MessageParser};
use crate::domain::entities::{
    permissions, Command, CommandRegistry, Guild, Message, Permission, RegisteredCommand, UserId,
};

/// Name under which the built-in commands are registered
pub const CORE: &str = "core";

/// Service for managing and executing commands
pub struct CommandService {
    registry: CommandRegistry,
    parser: MessageParser,
    middleware: MiddlewareChain,
    owners: Vec<UserId>,
    bot_name: String,
}

impl CommandService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            registry: CommandRegistry::new(),
            parser: MessageParser::new(prefix),
            middleware: MiddlewareChain::new(),
            owners: Vec::new(),
            bot_name: env!("CARGO_PKG_NAME").to_string(),
        }
    }

    pub fn with_middleware(mut self, middleware: MiddlewareChain) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn with_owners(mut self, owners: Vec<UserId>) -> Self {
        self.owners = owners;
        self
    }

    pub fn with_bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = name.into();
        self
    }

    /// Returns `false` (and logs) when the name is already taken
    pub fn register(&mut self, plugin: &str, command: Command) -> bool {
        let name = command.name.clone();
        let added = self.registry.register(plugin, command);
        if !added {
            tracing::warn!("Command '{}' from '{}' conflicts with an existing command", name, plugin);
        }
        added
    }

    pub fn register_defaults(&mut self) {
        self.register(CORE, Command::new("help")
            .with_description("Show help message")
            .with_usage("[command]"));

        self.register(CORE, Command::new("version")
            .with_description("Show bot version"));

        self.register(CORE, Command::new("mydata")
            .with_description("Show the data stored about you"));

        self.register(CORE, Command::new("forgetme")
            .with_description("Delete the data stored about you"));
    }

    pub fn prefix(&self) -> &str {
        self.parser.prefix()
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.owners.contains(&user)
    }

    pub fn parse(&self, message: &Message) -> Option<Invocation> {
        self.parser.parse(&message.content)
    }

    pub fn resolve(&self, invocation: &Invocation) -> Option<&RegisteredCommand> {
        self.registry.find(&invocation.name)
    }

    /// Runs the middleware chain for an invocation
    pub fn admit(&self, message: &Message, command: &Command) -> Result<(), MiddlewareError> {
        let ctx = Context::new(message.channel_id, message.author.id, command.name.clone());
        self.middleware.run(ctx).map(|_| ())
    }

    /// Checks guild-only and permission requirements
    pub fn check(
        &self,
        command: &Command,
        message: &Message,
        guild: Option<&Guild>,
    ) -> Result<(), CommandError> {
        if command.guild_only && guild.is_none() {
            return Err(CommandError::GuildOnly);
        }

        let author = message.author.id;
        if self.is_owner(author) {
            return Ok(());
        }

        let bits = guild
            .map(|g| g.permissions_for(author, &message.member_roles))
            .unwrap_or(0);
        let allowed = match command.permission {
            Permission::Everyone => true,
            Permission::Owner => false,
            Permission::Admin => bits & permissions::ADMINISTRATOR != 0,
            Permission::ManageRoles => {
                bits & (permissions::ADMINISTRATOR | permissions::MANAGE_ROLES) != 0
            }
        };

        if allowed {
            Ok(())
        } else {
            Err(CommandError::PermissionDenied)
        }
    }

    pub fn version(&self) -> String {
        format!("{} v{}", self.bot_name, env!("CARGO_PKG_VERSION"))
    }

    pub fn get_help(&self, command: Option<&str>) -> String {
        let prefix = self.prefix();
        if let Some(name) = command {
            if let Some(registered) = self.registry.find(name) {
                let cmd = &registered.command;
                let mut help = format!("{}{} - {}", prefix, cmd.name, cmd.description.as_deref().unwrap_or("No description"));
                if let Some(usage) = &cmd.usage {
                    help.push_str(&format!("\nUsage: {}{} {}", prefix, cmd.name, usage));
                }
                for sub in &cmd.subcommands {
                    help.push_str(&format!("\n  {} {} - {}", cmd.name, sub.name, sub.description.as_deref().unwrap_or("")));
                }
                return help;
            }
            return format!("Command {}{} not found", prefix, name);
        }

        // List all commands, grouped by plugin
        let mut commands: Vec<&RegisteredCommand> = self.registry.all().collect();
        commands.sort_by(|a, b| (&a.plugin, &a.command.name).cmp(&(&b.plugin, &b.command.name)));

        let mut help = "Available commands:\n".to_string();
        let mut current = "";
        for registered in commands {
            if registered.plugin != current {
                current = &registered.plugin;
                help.push_str(&format!("{}:\n", current));
            }
            let cmd = &registered.command;
            help.push_str(&format!("  {}{} - {}\n", prefix, cmd.name, cmd.description.as_deref().unwrap_or("")));
        }
        help
    }
}
