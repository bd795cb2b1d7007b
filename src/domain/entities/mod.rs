//! Domain entities - Core business objects with no external dependencies

pub mod ids;
pub mod user;
pub mod guild;
pub mod message;
pub mod command;
pub mod event;

pub use ids::{AttachmentId, ChannelId, GuildId, MessageId, RoleId, UserId};
pub use user::{Member, User};
pub use guild::{permissions, Channel, Guild, Role};
pub use message::{Attachment, Embed, FileUpload, Message, OutgoingMessage};
pub use command::{Command, CommandRegistry, Permission, RegisteredCommand};
pub use event::Event;
