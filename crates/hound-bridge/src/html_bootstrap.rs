use std::path::Path;

use anyhow::{Context, Result};
use hound_archive::{DEFAULT_OUTPUT_CSS, HTML_DIR, TEMPLATE_DIR};

const STYLESHEET_FILE: &str = "output.css";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StylesheetSource {
    Existing,
    Template,
    Bundled,
}

/// Creates `<base>/html` and makes sure it carries `output.css`.
pub(crate) fn prepare_html_dir(base_dir: &Path) -> Result<StylesheetSource> {
    let html_dir = base_dir.join(HTML_DIR);
    std::fs::create_dir_all(&html_dir)
        .with_context(|| format!("failed to create {}", html_dir.display()))?;

    let stylesheet = html_dir.join(STYLESHEET_FILE);
    if stylesheet.exists() {
        return Ok(StylesheetSource::Existing);
    }

    let template_stylesheet = base_dir.join(TEMPLATE_DIR).join(STYLESHEET_FILE);
    if template_stylesheet.is_file() {
        std::fs::copy(&template_stylesheet, &stylesheet).with_context(|| {
            format!(
                "failed to copy {} to {}",
                template_stylesheet.display(),
                stylesheet.display()
            )
        })?;
        return Ok(StylesheetSource::Template);
    }

    hound_core::write_text_atomic(&stylesheet, DEFAULT_OUTPUT_CSS)?;
    Ok(StylesheetSource::Bundled)
}
