//! Configuration assembly and rendering.
//!
//! Records are finalized once, then rendered and written one file per device
//! on a bounded rayon pool. A device that fails is recorded against its
//! hostname and never stops the others.

pub mod record;
pub mod renderer;

pub use record::{finalize, DeviceRecord, InterfaceRecord};
pub use renderer::{RenderError, Renderer, TemplateMap, TeraRenderer};

use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a render run
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Hostname to written configuration file
    pub written: BTreeMap<String, PathBuf>,
    /// Hostname to the error that stopped it
    pub failed: BTreeMap<String, RenderError>,
}

impl RenderReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Path of the configuration file for `hostname`
pub fn config_path(output_dir: &Path, hostname: &str) -> PathBuf {
    output_dir.join(format!("{}.cfg", hostname))
}

fn render_one<R: Renderer>(
    record: &DeviceRecord,
    renderer: &R,
    templates: &TemplateMap,
    output_dir: &Path,
) -> Result<PathBuf, RenderError> {
    let template = templates.for_role(record.role);
    let text = renderer.render(template, record)?;
    let path = config_path(output_dir, &record.hostname);
    fs::write(&path, text).map_err(|source| RenderError::Write {
        path: path.clone(),
        source,
    })?;
    debug!("{} rendered with '{}' to {:?}", record.hostname, template, path);
    Ok(path)
}

/// Render every record with the template of its role into `output_dir`.
///
/// Runs on a pool of `workers` threads and blocks until every device is done.
pub fn render_all<R: Renderer>(
    records: &[DeviceRecord],
    renderer: &R,
    templates: &TemplateMap,
    output_dir: &Path,
    workers: usize,
) -> RenderReport {
    if let Err(e) = fs::create_dir_all(output_dir) {
        warn!("Failed to create output directory {:?}: {}", output_dir, e);
    }

    let run = || -> Vec<(String, Result<PathBuf, RenderError>)> {
        records
            .par_iter()
            .map(|record| {
                let result = render_one(record, renderer, templates, output_dir);
                (record.hostname.clone(), result)
            })
            .collect()
    };

    let results = match rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            warn!("Failed to build a {}-thread render pool, using the global pool: {}", workers, e);
            run()
        }
    };

    let mut report = RenderReport::default();
    for (hostname, result) in results {
        match result {
            Ok(path) => {
                report.written.insert(hostname, path);
            }
            Err(e) => {
                error!("Error generating config for {}: {}", hostname, e);
                report.failed.insert(hostname, e);
            }
        }
    }

    info!(
        "Rendered {} configurations into {:?} ({} failed)",
        report.written.len(),
        output_dir,
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RoutingAnnotations;
    use crate::topology::Role;
    use tempfile::TempDir;

    struct EchoRenderer;

    impl Renderer for EchoRenderer {
        fn render(&self, template: &str, record: &DeviceRecord) -> Result<String, RenderError> {
            Ok(format!("{} {}", template, record.hostname))
        }
    }

    fn record(hostname: &str, role: Role) -> DeviceRecord {
        DeviceRecord {
            hostname: hostname.to_string(),
            role,
            client: None,
            bgp_asn: 100,
            is_route_reflector: false,
            router_id: None,
            interfaces: Vec::new(),
            routing: RoutingAnnotations::default(),
        }
    }

    #[test]
    fn test_one_file_per_device_with_role_template() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("configs");
        let records = vec![
            record("P1", Role::Backbone),
            record("PE1", Role::Edge),
            record("CE1", Role::Client),
        ];

        let report = render_all(&records, &EchoRenderer, &TemplateMap::default(), &out, 2);
        assert!(report.is_success());
        assert_eq!(report.written.len(), 3);
        assert_eq!(report.written["PE1"], out.join("PE1.cfg"));
        assert_eq!(fs::read_to_string(out.join("P1.cfg")).unwrap(), "provider_bb P1");
        assert_eq!(fs::read_to_string(out.join("CE1.cfg")).unwrap(), "client_edge CE1");
    }

    #[test]
    fn test_zero_workers_still_renders() {
        let dir = TempDir::new().unwrap();
        let records = vec![record("P1", Role::Backbone)];
        let report = render_all(&records, &EchoRenderer, &TemplateMap::default(), dir.path(), 0);
        assert_eq!(report.written.len(), 1);
    }
}
