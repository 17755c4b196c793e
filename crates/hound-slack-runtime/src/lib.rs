//! Slack Socket Mode transport and the recording handlers it dispatches to.

mod chat_transport;
mod slack_runtime;

pub use chat_transport::{ChatTransport, ConversationInfo};
pub use slack_runtime::{
    run_slack_bridge, AttachmentFailure, AttachmentFailures, AttachmentStage, DispatchOutcome,
    RecordingBridge, SlackApiClient, SlackBridgeRuntimeConfig,
};
