//! Template selection and rendering.

use super::record::DeviceRecord;
use crate::topology::Role;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

const PROVIDER_EDGE: &str = include_str!("../../templates/provider_edge.tera");
const PROVIDER_BACKBONE: &str = include_str!("../../templates/provider_bb.tera");
const CLIENT_EDGE: &str = include_str!("../../templates/client_edge.tera");

/// Errors for one device's configuration, or for loading templates
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Rendering '{template}' for {hostname} failed: {source}")]
    Template {
        template: String,
        hostname: String,
        #[source]
        source: tera::Error,
    },

    #[error("Failed to load templates from '{path}': {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turns a resolved device record into configuration text.
///
/// Implementations are shared across the render workers.
pub trait Renderer: Sync {
    fn render(&self, template: &str, record: &DeviceRecord) -> Result<String, RenderError>;
}

/// Fixed role to template name mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMap {
    pub client: String,
    pub edge: String,
    pub backbone: String,
}

impl Default for TemplateMap {
    fn default() -> Self {
        TemplateMap {
            client: "client_edge".to_string(),
            edge: "provider_edge".to_string(),
            backbone: "provider_bb".to_string(),
        }
    }
}

impl TemplateMap {
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Client => &self.client,
            Role::Edge => &self.edge,
            Role::Backbone => &self.backbone,
        }
    }
}

/// Tera-backed renderer
#[derive(Debug)]
pub struct TeraRenderer {
    tera: Tera,
}

impl TeraRenderer {
    /// Renderer loaded with the built-in IOS-style templates
    pub fn builtin() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("provider_edge", PROVIDER_EDGE),
            ("provider_bb", PROVIDER_BACKBONE),
            ("client_edge", CLIENT_EDGE),
        ])
        .map_err(|e| RenderError::Load {
            path: PathBuf::from("<builtin>"),
            reason: e.to_string(),
        })?;
        Ok(TeraRenderer { tera })
    }

    /// Built-in templates, replaced or extended by every `*.tera` file in `dir`.
    ///
    /// The template name is the file stem, so `provider_edge.tera` replaces
    /// the built-in edge template.
    pub fn with_overrides(dir: &Path) -> Result<Self, RenderError> {
        let mut renderer = Self::builtin()?;
        let load_err = |reason: String| RenderError::Load {
            path: dir.to_path_buf(),
            reason,
        };

        let entries = fs::read_dir(dir).map_err(|e| load_err(e.to_string()))?;
        let mut overrides = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| load_err(e.to_string()))?.path();
            if path.extension().map_or(true, |ext| ext != "tera") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = fs::read_to_string(&path).map_err(|e| load_err(e.to_string()))?;
            debug!("Template override '{}' from {:?}", name, path);
            overrides.push((name.to_string(), text));
        }

        renderer
            .tera
            .add_raw_templates(overrides.iter().map(|(n, t)| (n.as_str(), t.as_str())))
            .map_err(|e| load_err(e.to_string()))?;
        info!("Loaded {} template overrides from {:?}", overrides.len(), dir);
        Ok(renderer)
    }
}

impl Renderer for TeraRenderer {
    fn render(&self, template: &str, record: &DeviceRecord) -> Result<String, RenderError> {
        let as_render_error = |source: tera::Error| RenderError::Template {
            template: template.to_string(),
            hostname: record.hostname.clone(),
            source,
        };
        let context = Context::from_serialize(record).map_err(as_render_error)?;
        self.tera.render(template, &context).map_err(as_render_error)
    }
}
