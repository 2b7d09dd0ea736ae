//! Template context: the three runtime values substituted into the casa
//! template.

use serde::{Deserialize, Serialize};

use casa_core::Settings;

use crate::error::RenderError;

/// Rendering payload for the casa configuration template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateContext {
    /// Public FQDN of the deployment.
    pub hostname: String,
    /// Resolved oxd host.
    pub oxd_hostname: String,
    /// Resolved oxd port.
    pub oxd_port: u16,
}

impl TemplateContext {
    /// Build a [`TemplateContext`] from resolved [`Settings`].
    pub fn from_settings(settings: &Settings) -> Self {
        TemplateContext {
            hostname: settings.hostname.clone(),
            oxd_hostname: settings.oxd.host.clone(),
            oxd_port: settings.oxd.port,
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}
