use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "happeninghound",
    about = "Records Slack channel messages into JSON-lines logs mirrored to Google Drive",
    version
)]
pub struct Cli {
    #[arg(
        long = "config-dir",
        env = "HOUND_CONFIG_DIR",
        default_value = "config",
        help = "Directory holding config.json and credentials.json"
    )]
    pub config_dir: PathBuf,

    #[arg(
        long = "slack-api-base",
        env = "HOUND_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    pub slack_api_base: String,

    #[arg(
        long = "slack-bot-user-id",
        env = "HOUND_SLACK_BOT_USER_ID",
        help = "Bot user id; resolved through auth.test when omitted"
    )]
    pub slack_bot_user_id: Option<String>,

    #[arg(
        long = "drive-api-base",
        env = "HOUND_DRIVE_API_BASE",
        default_value = "https://www.googleapis.com/drive/v3",
        help = "Google Drive v3 metadata API base URL"
    )]
    pub drive_api_base: String,

    #[arg(
        long = "drive-upload-base",
        env = "HOUND_DRIVE_UPLOAD_BASE",
        default_value = "https://www.googleapis.com/upload/drive/v3",
        help = "Google Drive v3 upload API base URL"
    )]
    pub drive_upload_base: String,

    #[arg(
        long = "drive-root-folder",
        env = "HOUND_DRIVE_ROOT_FOLDER",
        default_value = "happeninghound",
        help = "Name of the Drive folder that receives logs, html/ and images/"
    )]
    pub drive_root_folder: String,

    #[arg(
        long = "mirror-offline",
        env = "HOUND_MIRROR_OFFLINE",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Keep mirrored copies in process memory instead of Google Drive (no credentials needed)"
    )]
    pub mirror_offline: bool,

    #[arg(
        long = "request-timeout-ms",
        env = "HOUND_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "HTTP timeout for Slack and Drive API requests"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "HOUND_RETRY_MAX_ATTEMPTS",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable API failures (429/5xx/transport)"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "HOUND_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base backoff delay in milliseconds for API retries"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long = "reconnect-delay-ms",
        env = "HOUND_RECONNECT_DELAY_MS",
        default_value_t = 1_000,
        help = "Delay before reconnecting after socket/session errors"
    )]
    pub reconnect_delay_ms: u64,
}
