//! Local recording state for the bridge: the channel directory, per-channel
//! JSON-lines logs, the recording filter, and HTML rendering of a log.

pub mod channel_directory;
pub mod channel_status;
pub mod chat_event;
pub mod event_filter;
pub mod html_view;
pub mod log_store;
pub mod render_pipeline;

pub use channel_directory::{ChannelDirectory, ChannelRecord, DirectoryError, CHANNEL_DIRECTORY_FILE};
pub use channel_status::{collect_channel_status, render_channel_status, ChannelLogStatus};
pub use chat_event::{ChatAttachment, ChatMessageEvent, InboundEvent, SlashCommandRequest};
pub use event_filter::{decide, FilterDecision, RecordingPolicy, SkipReason};
pub use html_view::{escape_html, format_slack_timestamp, linkify_escaped, message_to_html};
pub use log_store::{attachment_file_name, LogChannel, LogEntry, LogScan, LogStore, ATTACHMENTS_DIR};
pub use render_pipeline::{
    RenderError, RenderPipeline, RenderReport, RenderStage, DEFAULT_OUTPUT_CSS, HTML_DIR,
    TEMPLATE_DIR, TEMPLATE_FILE,
};
