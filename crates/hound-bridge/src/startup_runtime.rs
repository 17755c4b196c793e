use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hound_cli::Cli;
use hound_drive::{
    ContentMirror, DriveApiClient, DriveApiClientConfig, InMemoryMirror, MirrorGateway,
    ServiceAccountCredentials, ServiceAccountTokenSource,
};
use hound_slack_runtime::{run_slack_bridge, SlackBridgeRuntimeConfig};
use tracing::{info, warn};

use crate::html_bootstrap::prepare_html_dir;
use crate::startup_config::{credentials_path, BridgeConfig};

pub(crate) fn build_content_mirror(cli: &Cli, config_dir: &Path) -> Result<Arc<dyn ContentMirror>> {
    if cli.mirror_offline {
        warn!("drive mirroring disabled; mirrored copies are kept in memory only");
        return Ok(Arc::new(InMemoryMirror::new()));
    }

    let path = credentials_path(config_dir);
    let credentials = ServiceAccountCredentials::load(&path)
        .with_context(|| format!("invalid drive credentials in {}", path.display()))?;
    let token_source = ServiceAccountTokenSource::new(credentials, cli.request_timeout_ms)?;
    let client = DriveApiClient::new(
        DriveApiClientConfig {
            api_base: cli.drive_api_base.clone(),
            upload_base: cli.drive_upload_base.clone(),
            request_timeout_ms: cli.request_timeout_ms,
            retry_max_attempts: cli.retry_max_attempts.max(1),
            retry_base_delay_ms: cli.retry_base_delay_ms,
        },
        Arc::new(token_source),
    )?;
    Ok(Arc::new(client))
}

pub(crate) fn build_runtime_config(
    cli: &Cli,
    config: &BridgeConfig,
    mirror: MirrorGateway,
) -> SlackBridgeRuntimeConfig {
    SlackBridgeRuntimeConfig {
        api_base: cli.slack_api_base.clone(),
        app_token: config.app_token.clone(),
        bot_token: config.bot_token.clone(),
        bot_user_id: cli.slack_bot_user_id.clone(),
        author_id: config.author_id.clone(),
        base_dir: config.base_dir.clone(),
        mirror,
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts.max(1),
        retry_base_delay_ms: cli.retry_base_delay_ms,
        reconnect_delay: Duration::from_millis(cli.reconnect_delay_ms.max(1)),
    }
}

pub(crate) async fn run_bridge(cli: Cli, config: BridgeConfig) -> Result<()> {
    let stylesheet = prepare_html_dir(&config.base_dir)?;
    info!(
        base_dir = %config.base_dir.display(),
        stylesheet = ?stylesheet,
        "html directory ready"
    );

    let mirror = build_content_mirror(&cli, &cli.config_dir)?;
    let gateway = MirrorGateway::bootstrap(mirror, &cli.drive_root_folder)
        .await
        .with_context(|| format!("failed to prepare drive folder '{}'", cli.drive_root_folder))?;
    let layout = gateway.layout();
    info!(
        root = %layout.root_id,
        images = %layout.images_id,
        html = %layout.html_id,
        "drive mirror layout ready"
    );

    run_slack_bridge(build_runtime_config(&cli, &config, gateway)).await
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use clap::Parser;
    use hound_cli::Cli;
    use hound_drive::{InMemoryMirror, MirrorGateway};
    use tempfile::tempdir;

    use super::{build_content_mirror, build_runtime_config};
    use crate::startup_config::BridgeConfig;

    fn bridge_config(base_dir: PathBuf) -> BridgeConfig {
        BridgeConfig {
            app_token: "xapp-1".to_string(),
            bot_token: "xoxb-2".to_string(),
            debug: false,
            base_dir,
            author_id: "UAUTHOR".to_string(),
        }
    }

    #[tokio::test]
    async fn functional_runtime_config_combines_cli_and_file_settings() {
        let cli = Cli::try_parse_from([
            "happeninghound",
            "--slack-bot-user-id",
            "UBOT",
            "--reconnect-delay-ms",
            "0",
        ])
        .expect("parse cli");
        let gateway = MirrorGateway::bootstrap(std::sync::Arc::new(InMemoryMirror::new()), "root")
            .await
            .expect("bootstrap");
        let runtime = build_runtime_config(&cli, &bridge_config(PathBuf::from("data")), gateway);
        assert_eq!(runtime.app_token, "xapp-1");
        assert_eq!(runtime.bot_token, "xoxb-2");
        assert_eq!(runtime.author_id, "UAUTHOR");
        assert_eq!(runtime.bot_user_id.as_deref(), Some("UBOT"));
        assert_eq!(runtime.base_dir, PathBuf::from("data"));
        assert_eq!(runtime.reconnect_delay, Duration::from_millis(1));
    }

    #[test]
    fn regression_missing_credentials_fail_startup() {
        let temp = tempdir().expect("tempdir");
        let cli = Cli::try_parse_from(["happeninghound"]).expect("parse cli");
        let error = build_content_mirror(&cli, temp.path())
            .err()
            .expect("credentials required");
        assert!(error.to_string().contains("invalid drive credentials"));
    }

    #[test]
    fn functional_offline_mirror_needs_no_credentials() {
        let temp = tempdir().expect("tempdir");
        let cli = Cli::try_parse_from(["happeninghound", "--mirror-offline"]).expect("parse cli");
        assert!(build_content_mirror(&cli, temp.path()).is_ok());
    }
}
