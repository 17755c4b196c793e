//! Typed inbound chat events, decoded once at the transport boundary.

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatAttachment {
    pub id: String,
    pub name: String,
    pub filetype: String,
    pub download_url: Option<String>,
}

impl ChatAttachment {
    /// Extension used for the local copy: the transport file type, else the
    /// original name's extension, else `bin`.
    pub fn local_extension(&self) -> String {
        let filetype = self.filetype.trim();
        if !filetype.is_empty() && filetype.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return filetype.to_ascii_lowercase();
        }
        std::path::Path::new(self.name.trim())
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|ch| ch.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatMessageEvent {
    pub channel_id: String,
    pub author_id: String,
    pub text: String,
    pub sub_type: Option<String>,
    pub event_timestamp: String,
    pub attachments: Vec<ChatAttachment>,
}

impl ChatMessageEvent {
    pub fn is_file_share(&self) -> bool {
        self.sub_type.as_deref() == Some("file_share")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlashCommandRequest {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message(ChatMessageEvent),
    MemberJoined { channel_id: String, user_id: String },
    ChannelArchived { channel_id: String },
    SlashCommand(SlashCommandRequest),
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::MemberJoined { .. } => "member_joined_channel",
            Self::ChannelArchived { .. } => "channel_archive",
            Self::SlashCommand(_) => "slash_command",
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            Self::Message(message) => &message.channel_id,
            Self::MemberJoined { channel_id, .. } | Self::ChannelArchived { channel_id } => {
                channel_id
            }
            Self::SlashCommand(command) => &command.channel_id,
        }
    }
}
