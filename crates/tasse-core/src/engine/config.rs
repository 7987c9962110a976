use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Parameter '{name}' is out of range: {value} (expected {expected})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },
}

/// Numeric tunables of the hydrogen bond engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Dielectric constant of the reaction field.
    pub dielectric: f64,
    /// Electrostatic cutoff radius in Angstroms.
    pub electrostatic_radius: f64,
    /// Weight of the electrostatic term. Charges are not assigned when zero.
    pub electrostatic_coeff: f64,
    /// Maximum donor-acceptor distance in Angstroms.
    pub hbond_max_length: f64,
    /// Absolute energy a contact must fall below to count as a bridge.
    pub hbond_cutoff_energy: f64,
    /// Weight of the directional 12-6 term.
    pub hbond_126_coeff: f64,
    /// Fraction of snapshots a pair or triplet must be seen in.
    pub occurrence_cutoff: f64,
    /// Allowed van der Waals overlap between final placements. `1` disables culling.
    pub vdw_tolerance: f64,
    /// Collapse grouped atoms (e.g. `OD1`/`OD2`) into one logical atom.
    pub group_bonds: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dielectric: 80.0,
            electrostatic_radius: 15.0,
            electrostatic_coeff: 0.25,
            hbond_max_length: 4.5,
            hbond_cutoff_energy: 1.0,
            hbond_126_coeff: 0.75,
            occurrence_cutoff: 0.9,
            vdw_tolerance: 0.25,
            group_bonds: true,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Whether the final selection resolves overlapping placements.
    pub fn culls_overlaps(&self) -> bool {
        self.vdw_tolerance < 1.0
    }

    pub fn assigns_charges(&self) -> bool {
        self.electrostatic_coeff > 0.0
    }
}

#[derive(Default)]
pub struct EngineConfigBuilder {
    dielectric: Option<f64>,
    electrostatic_radius: Option<f64>,
    electrostatic_coeff: Option<f64>,
    hbond_max_length: Option<f64>,
    hbond_cutoff_energy: Option<f64>,
    hbond_126_coeff: Option<f64>,
    occurrence_cutoff: Option<f64>,
    vdw_tolerance: Option<f64>,
    group_bonds: Option<bool>,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dielectric(mut self, value: f64) -> Self {
        self.dielectric = Some(value);
        self
    }
    pub fn electrostatic_radius(mut self, value: f64) -> Self {
        self.electrostatic_radius = Some(value);
        self
    }
    pub fn electrostatic_coeff(mut self, value: f64) -> Self {
        self.electrostatic_coeff = Some(value);
        self
    }
    pub fn hbond_max_length(mut self, value: f64) -> Self {
        self.hbond_max_length = Some(value);
        self
    }
    pub fn hbond_cutoff_energy(mut self, value: f64) -> Self {
        self.hbond_cutoff_energy = Some(value);
        self
    }
    pub fn hbond_126_coeff(mut self, value: f64) -> Self {
        self.hbond_126_coeff = Some(value);
        self
    }
    pub fn occurrence_cutoff(mut self, value: f64) -> Self {
        self.occurrence_cutoff = Some(value);
        self
    }
    pub fn vdw_tolerance(mut self, value: f64) -> Self {
        self.vdw_tolerance = Some(value);
        self
    }
    pub fn group_bonds(mut self, value: bool) -> Self {
        self.group_bonds = Some(value);
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            dielectric: self.dielectric.unwrap_or(defaults.dielectric),
            electrostatic_radius: self
                .electrostatic_radius
                .unwrap_or(defaults.electrostatic_radius),
            electrostatic_coeff: self
                .electrostatic_coeff
                .unwrap_or(defaults.electrostatic_coeff),
            hbond_max_length: self.hbond_max_length.unwrap_or(defaults.hbond_max_length),
            hbond_cutoff_energy: self
                .hbond_cutoff_energy
                .unwrap_or(defaults.hbond_cutoff_energy),
            hbond_126_coeff: self.hbond_126_coeff.unwrap_or(defaults.hbond_126_coeff),
            occurrence_cutoff: self
                .occurrence_cutoff
                .unwrap_or(defaults.occurrence_cutoff),
            vdw_tolerance: self.vdw_tolerance.unwrap_or(defaults.vdw_tolerance),
            group_bonds: self.group_bonds.unwrap_or(defaults.group_bonds),
        };

        at_least("dielectric", config.dielectric, 0.0, ">= 0")?;
        at_least("electrostatic_radius", config.electrostatic_radius, 2.0, ">= 2")?;
        at_least("electrostatic_coeff", config.electrostatic_coeff, 0.0, ">= 0")?;
        at_least("hbond_max_length", config.hbond_max_length, 2.0, ">= 2")?;
        at_least("hbond_cutoff_energy", config.hbond_cutoff_energy, 0.0, ">= 0")?;
        at_least("hbond_126_coeff", config.hbond_126_coeff, 0.0, ">= 0")?;
        unit_interval("occurrence_cutoff", config.occurrence_cutoff)?;
        unit_interval("vdw_tolerance", config.vdw_tolerance)?;

        Ok(config)
    }
}

fn at_least(
    name: &'static str,
    value: f64,
    min: f64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            expected,
        })
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            expected: "0..=1",
        })
    }
}

/// Inputs and run options of the extraction workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    pub engine: EngineConfig,
    /// Topology PDB file.
    pub topology_path: PathBuf,
    /// Text file listing one PDB snapshot per line.
    pub trajectory_path: PathBuf,
    /// Number of leading snapshots to skip.
    pub first_snapshot: usize,
    /// Worker threads; `None` uses the available parallelism.
    pub threads: Option<usize>,
    pub solvent_name: String,
    pub hbond_params_path: PathBuf,
    pub charges_path: Option<PathBuf>,
    pub radii_path: Option<PathBuf>,
    /// Post-processed structure with the selected solvent.
    pub output_path: PathBuf,
    /// Occurrence histogram and tuple tables.
    pub report_path: Option<PathBuf>,
}

#[derive(Default)]
pub struct ExtractConfigBuilder {
    engine: Option<EngineConfig>,
    topology_path: Option<PathBuf>,
    trajectory_path: Option<PathBuf>,
    first_snapshot: Option<usize>,
    threads: Option<usize>,
    solvent_name: Option<String>,
    hbond_params_path: Option<PathBuf>,
    charges_path: Option<PathBuf>,
    radii_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
}

impl ExtractConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = Some(engine);
        self
    }
    pub fn topology_path(mut self, path: PathBuf) -> Self {
        self.topology_path = Some(path);
        self
    }
    pub fn trajectory_path(mut self, path: PathBuf) -> Self {
        self.trajectory_path = Some(path);
        self
    }
    pub fn first_snapshot(mut self, n: usize) -> Self {
        self.first_snapshot = Some(n);
        self
    }
    pub fn threads(mut self, n: Option<usize>) -> Self {
        self.threads = n;
        self
    }
    pub fn solvent_name(mut self, name: impl Into<String>) -> Self {
        self.solvent_name = Some(name.into());
        self
    }
    pub fn hbond_params_path(mut self, path: PathBuf) -> Self {
        self.hbond_params_path = Some(path);
        self
    }
    pub fn charges_path(mut self, path: Option<PathBuf>) -> Self {
        self.charges_path = path;
        self
    }
    pub fn radii_path(mut self, path: Option<PathBuf>) -> Self {
        self.radii_path = path;
        self
    }
    pub fn output_path(mut self, path: PathBuf) -> Self {
        self.output_path = Some(path);
        self
    }
    pub fn report_path(mut self, path: Option<PathBuf>) -> Self {
        self.report_path = path;
        self
    }

    pub fn build(self) -> Result<ExtractConfig, ConfigError> {
        Ok(ExtractConfig {
            engine: self.engine.unwrap_or_default(),
            topology_path: self
                .topology_path
                .ok_or(ConfigError::MissingParameter("topology_path"))?,
            trajectory_path: self
                .trajectory_path
                .ok_or(ConfigError::MissingParameter("trajectory_path"))?,
            first_snapshot: self.first_snapshot.unwrap_or(0),
            threads: self.threads,
            solvent_name: self.solvent_name.unwrap_or_else(|| "HOH".to_string()),
            hbond_params_path: self
                .hbond_params_path
                .ok_or(ConfigError::MissingParameter("hbond_params_path"))?,
            charges_path: self.charges_path,
            radii_path: self.radii_path,
            output_path: self
                .output_path
                .ok_or(ConfigError::MissingParameter("output_path"))?,
            report_path: self.report_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_without_overrides_yields_defaults() {
        let config = EngineConfigBuilder::new().build().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.culls_overlaps());
        assert!(config.assigns_charges());
    }

    #[test]
    fn builder_applies_overrides() {
        let config = EngineConfig::builder()
            .occurrence_cutoff(0.5)
            .vdw_tolerance(1.0)
            .electrostatic_coeff(0.0)
            .group_bonds(false)
            .build()
            .unwrap();
        assert_eq!(config.occurrence_cutoff, 0.5);
        assert!(!config.culls_overlaps());
        assert!(!config.assigns_charges());
        assert!(!config.group_bonds);
    }

    #[test]
    fn builder_rejects_out_of_range_values() {
        let err = EngineConfig::builder()
            .occurrence_cutoff(1.5)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                name: "occurrence_cutoff",
                ..
            }
        ));

        let err = EngineConfig::builder()
            .hbond_max_length(1.0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                name: "hbond_max_length",
                ..
            }
        ));

        assert!(EngineConfig::builder().dielectric(f64::NAN).build().is_err());
    }

    #[test]
    fn extract_builder_requires_paths_and_fills_defaults() {
        let err = ExtractConfigBuilder::new().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("topology_path"));

        let config = ExtractConfigBuilder::new()
            .topology_path("top.pdb".into())
            .trajectory_path("traj.lst".into())
            .hbond_params_path("hbond.toml".into())
            .output_path("out.pdb".into())
            .build()
            .unwrap();
        assert_eq!(config.solvent_name, "HOH");
        assert_eq!(config.first_snapshot, 0);
        assert_eq!(config.threads, None);
        assert_eq!(config.engine, EngineConfig::default());
    }
}
