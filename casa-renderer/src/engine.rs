//! Tera rendering engine: [`Renderer`].
//!
//! The embedded `casa.json` template is baked into the binary; a deployment
//! may point `CASA_TEMPLATE_PATH` at a replacement with the same
//! placeholders (`hostname`, `oxd_hostname`, `oxd_port`).

use std::path::{Path, PathBuf};

use serde_json::Value;
use tera::Tera;

use casa_core::Settings;

use crate::context::TemplateContext;
use crate::error::RenderError;

const TEMPLATE_NAME: &str = "casa.json";
const EMBEDDED_TEMPLATE: &str = include_str!("templates/casa.json");

/// Section of the blob holding the companion service settings.
pub const OXD_SECTION: &str = "oxd_config";

/// Leaves of [`OXD_SECTION`] kept in sync with the current deployment.
pub const WATCHED_FIELDS: [&str; 2] = ["host", "port"];

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}

fn build_tera(source: &str) -> Result<Tera, RenderError> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_template(TEMPLATE_NAME, source)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders the desired configuration blob. Create once and reuse.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Construct a [`Renderer`] with the embedded template.
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer {
            tera: build_tera(EMBEDDED_TEMPLATE)?,
        })
    }

    /// Construct a [`Renderer`] from a template file on disk.
    pub fn from_file(path: &Path) -> Result<Self, RenderError> {
        let source = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        tracing::debug!(template = %path.display(), "loaded template override");
        Ok(Renderer {
            tera: build_tera(&source)?,
        })
    }

    /// Embedded template unless settings name an override.
    pub fn for_settings(settings: &Settings) -> Result<Self, RenderError> {
        match &settings.template_path {
            Some(path) => Self::from_file(path),
            None => Self::new(),
        }
    }

    /// Substitute the placeholders and return the raw text.
    pub fn render_text(&self, ctx: &TemplateContext) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        Ok(self.tera.render(TEMPLATE_NAME, &tera_ctx)?)
    }

    /// Substitute the placeholders and parse the result as JSON.
    ///
    /// Fails with [`RenderError::MalformedTemplate`] if the text does not
    /// parse and [`RenderError::MissingField`] if a watched field is absent.
    pub fn render_blob(&self, ctx: &TemplateContext) -> Result<Value, RenderError> {
        let text = self.render_text(ctx)?;
        let blob: Value = serde_json::from_str(&text)?;
        validate_blob(&blob)?;
        Ok(blob)
    }
}

/// Checks that `oxd_config.host` and `oxd_config.port` are present.
fn validate_blob(blob: &Value) -> Result<(), RenderError> {
    let section = blob
        .get(OXD_SECTION)
        .filter(|v| v.is_object())
        .ok_or(RenderError::MissingField("oxd_config"))?;
    if section.get("host").map_or(true, Value::is_null) {
        return Err(RenderError::MissingField("oxd_config.host"));
    }
    if section.get("port").map_or(true, Value::is_null) {
        return Err(RenderError::MissingField("oxd_config.port"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> TemplateContext {
        TemplateContext {
            hostname: "demo.gluu.org".into(),
            oxd_hostname: "oxd.local".into(),
            oxd_port: 8443,
        }
    }

    #[test]
    fn renderer_new_succeeds() {
        Renderer::new().expect("Renderer::new should succeed with the embedded template");
    }

    #[test]
    fn embedded_template_renders_watched_fields() {
        let blob = Renderer::new().unwrap().render_blob(&ctx()).unwrap();
        assert_eq!(blob["oxd_config"]["host"], json!("oxd.local"));
        assert_eq!(blob["oxd_config"]["port"], json!(8443));
        assert_eq!(
            blob["oxd_config"]["authz_redirect_uri"],
            json!("https://demo.gluu.org/casa")
        );
    }

    #[test]
    fn port_renders_as_number() {
        let text = Renderer::new().unwrap().render_text(&ctx()).unwrap();
        assert!(text.contains("\"port\": 8443,"), "got:\n{text}");
    }

    #[test]
    fn missing_section_is_rejected() {
        let err = validate_blob(&json!({"other": 1})).unwrap_err();
        assert!(matches!(err, RenderError::MissingField("oxd_config")));
    }

    #[test]
    fn null_port_is_rejected() {
        let err = validate_blob(&json!({"oxd_config": {"host": "h", "port": null}})).unwrap_err();
        assert!(matches!(err, RenderError::MissingField("oxd_config.port")));
    }

    #[test]
    fn no_crlf_in_rendered_output() {
        let text = Renderer::new().unwrap().render_text(&ctx()).unwrap();
        assert!(!text.contains('\r'), "rendered template contains CR");
    }
}
