//! Slash command parsing and reply rendering.

use hound_archive::{RenderReport, SlashCommandRequest};

use super::AttachmentFailures;

pub(super) const MAKE_HTML_COMMAND: &str = "/make-html";
pub(super) const SHOW_FILES_COMMAND: &str = "/show-files";
pub(super) const CREATE_CHANNEL_COMMAND: &str = "/create-channel";
const MAX_CHANNEL_NAME_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum BridgeCommand {
    MakeHtml { channel_name: Option<String> },
    ShowFiles,
    CreateChannel { name: String, description: String },
    Invalid { message: String },
}

pub(super) fn bridge_command_usage() -> String {
    [
        "Supported commands:",
        "- `/make-html [channel-name]`",
        "- `/show-files`",
        "- `/create-channel <name> [description]`",
    ]
    .join("\n")
}

pub(super) fn parse_bridge_command(request: &SlashCommandRequest) -> BridgeCommand {
    let args = request.text.trim();
    match request.command.trim() {
        MAKE_HTML_COMMAND => {
            let mut pieces = args.split_whitespace();
            match (pieces.next(), pieces.next()) {
                (None, _) => BridgeCommand::MakeHtml { channel_name: None },
                (Some(raw), None) => match normalize_channel_argument(raw) {
                    Some(name) => BridgeCommand::MakeHtml {
                        channel_name: Some(name),
                    },
                    None => BridgeCommand::Invalid {
                        message: "Usage: /make-html [channel-name]".to_string(),
                    },
                },
                _ => BridgeCommand::Invalid {
                    message: "Usage: /make-html [channel-name]".to_string(),
                },
            }
        }
        SHOW_FILES_COMMAND => {
            if args.is_empty() {
                BridgeCommand::ShowFiles
            } else {
                BridgeCommand::Invalid {
                    message: "Usage: /show-files".to_string(),
                }
            }
        }
        CREATE_CHANNEL_COMMAND => {
            let mut parts = args.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or_default().trim();
            let description = parts.next().unwrap_or_default().trim();
            if !is_valid_channel_name(name) {
                return BridgeCommand::Invalid {
                    message: "Usage: /create-channel <name> [description] (name: lowercase letters, digits, '-' or '_')".to_string(),
                };
            }
            BridgeCommand::CreateChannel {
                name: name.to_string(),
                description: description.to_string(),
            }
        }
        other => BridgeCommand::Invalid {
            message: format!("Unknown command `{other}`.\n{}", bridge_command_usage()),
        },
    }
}

/// Accepts `name`, `#name`, or an escaped channel reference `<#C123|name>`.
fn normalize_channel_argument(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let name = match raw.strip_prefix("<#").and_then(|rest| rest.strip_suffix('>')) {
        Some(reference) => reference.split_once('|').map(|(_, name)| name)?,
        None => raw.trim_start_matches('#'),
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn is_valid_channel_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_CHANNEL_NAME_CHARS
        && name.chars().all(|ch| {
            ch == '-' || ch == '_' || ch.is_numeric() || (ch.is_alphabetic() && !ch.is_uppercase())
        })
}

pub(super) fn render_make_html_reply(report: &RenderReport) -> String {
    let mut lines = vec![format!(
        "rendered {} ({} entries) to {}",
        report.channel_name, report.entry_count, report.html_file_name
    )];
    if report.invalid_lines > 0 {
        lines.push(format!(
            "skipped {} undecodable log line(s)",
            report.invalid_lines
        ));
    }
    match (&report.mirror, &report.mirror_error) {
        (Some(outcome), _) => lines.push(format!("drive copy {}", outcome.as_str())),
        (None, Some(error)) => lines.push(format!("drive upload failed: {error}")),
        (None, None) => {}
    }
    lines.join("\n")
}

pub(super) fn render_attachment_failures(channel_name: &str, failures: &AttachmentFailures) -> String {
    let mut lines = vec![format!(
        "{} attachment(s) could not be stored for {channel_name}:",
        failures.len()
    )];
    for failure in failures.iter() {
        lines.push(format!(
            "- #{} {} ({}): {}",
            failure.index,
            if failure.name.is_empty() {
                failure.attachment_id.as_str()
            } else {
                failure.name.as_str()
            },
            failure.stage.as_str(),
            failure.reason
        ));
    }
    lines.join("\n")
}

pub(super) fn bot_joined_greeting(author_id: &str) -> String {
    format!(
        "Hello! Messages posted here by <@{author_id}> will be recorded and copied to Google Drive. Use `/make-html` to build a page from this channel's log."
    )
}
