//! Discord REST client

use reqwest::{multipart, Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::application::errors::BotError;
use crate::domain::entities::{ChannelId, GuildId, MessageId, OutgoingMessage, RoleId, UserId};
use super::models::{AttachmentRef, CreateMessage, CreatedMessage, DiscordUser, GatewayBot};

pub struct RestClient {
    client: Client,
    base: String,
    token: String,
}

impl RestClient {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BotError> {
        let mut url = Url::parse(&self.base).map_err(|e| BotError::Internal(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BotError::Internal(format!("{} cannot be a base", self.base)))?
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bot {}", self.token))
            .header(
                "User-Agent",
                concat!("DiscordBot (guild-cogs, ", env!("CARGO_PKG_VERSION"), ")"),
            )
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BotError> {
        let response = builder
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        check_status(response).await
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, BotError> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))
    }

    pub async fn current_user(&self) -> Result<DiscordUser, BotError> {
        let url = self.url(&["users", "@me"])?;
        self.json(self.request(Method::GET, url)).await
    }

    pub async fn gateway_url(&self) -> Result<String, BotError> {
        let url = self.url(&["gateway", "bot"])?;
        let gateway: GatewayBot = self.json(self.request(Method::GET, url)).await?;
        Ok(gateway.url)
    }

    pub async fn create_message(&self, channel: ChannelId, message: &OutgoingMessage) -> Result<MessageId, BotError> {
        let url = self.url(&["channels", &channel.to_string(), "messages"])?;
        let body = CreateMessage {
            content: &message.content,
            embeds: message.embed.iter().collect(),
            attachments: message
                .file
                .iter()
                .map(|f| AttachmentRef { id: 0, filename: &f.filename })
                .collect(),
        };

        let builder = self.request(Method::POST, url);
        let builder = match &message.file {
            None => builder.json(&body),
            Some(file) => {
                let payload = serde_json::to_string(&body)
                    .map_err(|e| BotError::Parse(e.to_string()))?;
                let part = multipart::Part::bytes(file.data.clone())
                    .file_name(file.filename.clone());
                let form = multipart::Form::new()
                    .text("payload_json", payload)
                    .part("files[0]", part);
                builder.multipart(form)
            }
        };

        let created: CreatedMessage = self.json(builder).await?;
        Ok(created.id)
    }

    pub async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<(), BotError> {
        let url = self.url(&["channels", &channel.to_string(), "messages", &message.to_string()])?;
        self.send(self.request(Method::DELETE, url)).await.map(|_| ())
    }

    pub async fn add_reaction(&self, channel: ChannelId, message: MessageId, emoji: &str) -> Result<(), BotError> {
        let url = self.url(&[
            "channels",
            &channel.to_string(),
            "messages",
            &message.to_string(),
            "reactions",
            emoji,
            "@me",
        ])?;
        self.send(self.request(Method::PUT, url)).await.map(|_| ())
    }

    pub async fn add_member_role(&self, guild: GuildId, user: UserId, role: RoleId, reason: &str) -> Result<(), BotError> {
        let url = self.url(&[
            "guilds",
            &guild.to_string(),
            "members",
            &user.to_string(),
            "roles",
            &role.to_string(),
        ])?;
        let builder = self
            .request(Method::PUT, url)
            .header("X-Audit-Log-Reason", urlencoding::encode(reason).into_owned());
        self.send(builder).await.map(|_| ())
    }

    /// Plain GET without the bot token, for CDN attachment urls
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, BotError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        let response = check_status(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

async fn check_status(response: Response) -> Result<Response, BotError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => BotError::Auth(body),
        StatusCode::FORBIDDEN => BotError::PermissionDenied(body),
        StatusCode::NOT_FOUND => BotError::NotFound(body),
        StatusCode::TOO_MANY_REQUESTS => BotError::RateLimited(body),
        _ => BotError::Network(format!("Discord API error {}: {}", status, body)),
    })
}
