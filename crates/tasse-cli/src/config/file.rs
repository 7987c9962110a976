use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialInputConfig {
    pub topology: Option<PathBuf>,
    pub trajectory: Option<PathBuf>,
    pub first_snapshot: Option<usize>,
    pub solvent: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialParamsConfig {
    pub hbond: Option<PathBuf>,
    pub charges: Option<PathBuf>,
    pub radii: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialOutputConfig {
    pub structure: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialEngineConfig {
    pub dielectric: Option<f64>,
    pub electrostatic_radius: Option<f64>,
    pub electrostatic_coeff: Option<f64>,
    pub hbond_max_length: Option<f64>,
    pub hbond_cutoff_energy: Option<f64>,
    pub hbond_126_coeff: Option<f64>,
    pub occurrence_cutoff: Option<f64>,
    pub vdw_tolerance: Option<f64>,
    pub group_bonds: Option<bool>,
}

/// Run configuration as read from a TOML file. Every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialExtractConfig {
    pub threads: Option<usize>,
    pub input: Option<PartialInputConfig>,
    pub params: Option<PartialParamsConfig>,
    pub output: Option<PartialOutputConfig>,
    pub engine: Option<PartialEngineConfig>,
}

impl PartialExtractConfig {
    /// Reads the file and resolves relative paths against its directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let rebase = |p: &mut Option<PathBuf>| {
            if let Some(path) = p.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        };
        if let Some(input) = self.input.as_mut() {
            rebase(&mut input.topology);
            rebase(&mut input.trajectory);
        }
        if let Some(params) = self.params.as_mut() {
            rebase(&mut params.hbond);
            rebase(&mut params.charges);
            rebase(&mut params.radii);
        }
        if let Some(output) = self.output.as_mut() {
            rebase(&mut output.structure);
            rebase(&mut output.report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn from_file_rebases_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            r#"
            threads = 2

            [input]
            topology = "top.pdb"
            trajectory = "/abs/traj.txt"

            [params]
            hbond = "data/hbond.toml"

            [engine]
            hbond-126-coeff = 0.5
            group-bonds = false
            "#,
        )
        .unwrap();

        let config = PartialExtractConfig::from_file(&path).unwrap();
        assert_eq!(config.threads, Some(2));
        let input = config.input.unwrap();
        assert_eq!(input.topology, Some(dir.path().join("top.pdb")));
        assert_eq!(input.trajectory, Some(PathBuf::from("/abs/traj.txt")));
        assert_eq!(
            config.params.unwrap().hbond,
            Some(dir.path().join("data/hbond.toml"))
        );
        let engine = config.engine.unwrap();
        assert_eq!(engine.hbond_126_coeff, Some(0.5));
        assert_eq!(engine.group_bonds, Some(false));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, "[engine]\ndielectrik = 4.0\n").unwrap();

        let err = PartialExtractConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
    }
}
