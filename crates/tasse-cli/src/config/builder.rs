use super::defaults::DefaultsConfig;
use super::file::{PartialEngineConfig, PartialExtractConfig};
use crate::cli::ExtractArgs;
use crate::error::{CliError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tasse::engine::config::{EngineConfig, ExtractConfig, ExtractConfigBuilder};

/// Merges command-line arguments, `-S` overrides, the optional config file
/// and the defaults, in that order of precedence.
pub fn build_config(args: &ExtractArgs, threads: Option<usize>) -> Result<ExtractConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        PartialExtractConfig::from_file(config_path)?
    } else {
        PartialExtractConfig::default()
    };
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let input = file_config.input.take().unwrap_or_default();
    let params = file_config.params.take().unwrap_or_default();
    let output = file_config.output.take().unwrap_or_default();
    let engine_file = file_config.engine.take().unwrap_or_default();

    let topology_path = existing_path(args.topology.clone().or(input.topology), "topology")?;
    let trajectory_path =
        existing_path(args.trajectory.clone().or(input.trajectory), "trajectory")?;
    let hbond_params_path = existing_path(args.params.clone().or(params.hbond), "params")?;
    let charges_path = optional_existing_path(args.charges.clone().or(params.charges))?;
    let radii_path = optional_existing_path(args.radii.clone().or(params.radii))?;
    let output_path = args
        .output
        .clone()
        .or(output.structure)
        .ok_or_else(|| missing("output"))?;
    let report_path = args.report.clone().or(output.report);

    let engine = merge_engine(args, engine_file, &defaults.engine)?;
    if engine.assigns_charges() && charges_path.is_none() {
        return Err(CliError::Config(
            "A charges file is required when the electrostatic coefficient is non-zero.".to_string(),
        ));
    }

    ExtractConfigBuilder::new()
        .engine(engine)
        .topology_path(topology_path)
        .trajectory_path(trajectory_path)
        .first_snapshot(
            args.first_snapshot
                .or(input.first_snapshot)
                .unwrap_or(defaults.first_snapshot),
        )
        .threads(threads.or(file_config.threads))
        .solvent_name(
            args.solvent
                .clone()
                .or(input.solvent)
                .unwrap_or(defaults.solvent_name),
        )
        .hbond_params_path(hbond_params_path)
        .charges_path(charges_path)
        .radii_path(radii_path)
        .output_path(output_path)
        .report_path(report_path)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

fn missing(kind: &str) -> CliError {
    CliError::Config(format!(
        "A value for '{}' is required either in the config file or via CLI argument.",
        kind
    ))
}

fn check_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Provided path does not exist: {}", path.display()),
        )));
    }
    Ok(())
}

fn existing_path(path: Option<PathBuf>, kind: &str) -> Result<PathBuf> {
    let path = path.ok_or_else(|| missing(kind))?;
    check_exists(&path)?;
    Ok(path)
}

fn optional_existing_path(path: Option<PathBuf>) -> Result<Option<PathBuf>> {
    if let Some(path) = &path {
        check_exists(path)?;
    }
    Ok(path)
}

fn merge_engine(
    args: &ExtractArgs,
    file: PartialEngineConfig,
    defaults: &EngineConfig,
) -> Result<EngineConfig> {
    let group_bonds = if args.no_group_bonds {
        false
    } else {
        file.group_bonds.unwrap_or(defaults.group_bonds)
    };

    EngineConfig::builder()
        .dielectric(args.dielectric.or(file.dielectric).unwrap_or(defaults.dielectric))
        .electrostatic_radius(
            args.radius
                .or(file.electrostatic_radius)
                .unwrap_or(defaults.electrostatic_radius),
        )
        .electrostatic_coeff(
            args.elec_coeff
                .or(file.electrostatic_coeff)
                .unwrap_or(defaults.electrostatic_coeff),
        )
        .hbond_max_length(
            args.hb_length
                .or(file.hbond_max_length)
                .unwrap_or(defaults.hbond_max_length),
        )
        .hbond_cutoff_energy(
            args.hb_energy
                .or(file.hbond_cutoff_energy)
                .unwrap_or(defaults.hbond_cutoff_energy),
        )
        .hbond_126_coeff(
            args.hb_coeff
                .or(file.hbond_126_coeff)
                .unwrap_or(defaults.hbond_126_coeff),
        )
        .occurrence_cutoff(
            args.occurrence
                .or(file.occurrence_cutoff)
                .unwrap_or(defaults.occurrence_cutoff),
        )
        .vdw_tolerance(
            args.vdw_tolerance
                .or(file.vdw_tolerance)
                .unwrap_or(defaults.vdw_tolerance),
        )
        .group_bonds(group_bonds)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn apply_set_values(
    mut config: PartialExtractConfig,
    set_values: &[String],
) -> Result<PartialExtractConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();
        let value_str = value_str.trim();

        if let Some(field) = key.strip_prefix("engine.") {
            let engine = config.engine.get_or_insert_with(Default::default);
            match field {
                "dielectric" => engine.dielectric = Some(parse_value(key, value_str)?),
                "electrostatic-radius" => {
                    engine.electrostatic_radius = Some(parse_value(key, value_str)?)
                }
                "electrostatic-coeff" => {
                    engine.electrostatic_coeff = Some(parse_value(key, value_str)?)
                }
                "hbond-max-length" => engine.hbond_max_length = Some(parse_value(key, value_str)?),
                "hbond-cutoff-energy" => {
                    engine.hbond_cutoff_energy = Some(parse_value(key, value_str)?)
                }
                "hbond-126-coeff" => engine.hbond_126_coeff = Some(parse_value(key, value_str)?),
                "occurrence-cutoff" => {
                    engine.occurrence_cutoff = Some(parse_value(key, value_str)?)
                }
                "vdw-tolerance" => engine.vdw_tolerance = Some(parse_value(key, value_str)?),
                "group-bonds" => engine.group_bonds = Some(parse_value(key, value_str)?),
                _ => return Err(unsupported(key)),
            }
            continue;
        }

        match key {
            "threads" => config.threads = Some(parse_value(key, value_str)?),
            "input.first-snapshot" => {
                config
                    .input
                    .get_or_insert_with(Default::default)
                    .first_snapshot = Some(parse_value(key, value_str)?);
            }
            "input.solvent" => {
                config.input.get_or_insert_with(Default::default).solvent =
                    Some(value_str.to_string());
            }
            _ => return Err(unsupported(key)),
        }
    }
    Ok(config)
}

fn unsupported(key: &str) -> CliError {
    CliError::Config(format!("Unsupported configuration key for --set: '{}'", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn setup_inputs() -> TempDir {
        let dir = tempdir().unwrap();
        for name in ["top.pdb", "traj.txt", "hbond.toml", "charges.csv", "radii.csv"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        dir
    }

    fn base_args(dir: &Path) -> ExtractArgs {
        ExtractArgs {
            topology: Some(dir.join("top.pdb")),
            trajectory: Some(dir.join("traj.txt")),
            output: Some(dir.join("out.pdb")),
            params: Some(dir.join("hbond.toml")),
            charges: Some(dir.join("charges.csv")),
            ..Default::default()
        }
    }

    #[test]
    fn build_config_with_cli_paths_and_defaults_for_rest() {
        let dir = setup_inputs();
        let cfg = build_config(&base_args(dir.path()), None).expect("build ok");

        assert_eq!(cfg.topology_path, dir.path().join("top.pdb"));
        assert_eq!(cfg.engine, EngineConfig::default());
        assert_eq!(cfg.solvent_name, "HOH");
        assert_eq!(cfg.first_snapshot, 0);
        assert!(cfg.report_path.is_none());
        assert!(cfg.threads.is_none());
    }

    #[test]
    fn build_config_reads_file_and_merges() {
        let dir = setup_inputs();
        let cfg_path = dir.path().join("run.toml");
        fs::write(
            &cfg_path,
            r#"
            threads = 3

            [input]
            topology = "top.pdb"
            trajectory = "traj.txt"
            first-snapshot = 5
            solvent = "WAT"

            [params]
            hbond = "hbond.toml"
            radii = "radii.csv"

            [output]
            structure = "final.pdb"
            report = "tuples.txt"

            [engine]
            electrostatic-coeff = 0.0
            occurrence-cutoff = 0.5
            vdw-tolerance = 1.0
            "#,
        )
        .unwrap();

        let args = ExtractArgs {
            config: Some(cfg_path),
            ..Default::default()
        };
        let cfg = build_config(&args, None).expect("build ok");

        assert_eq!(cfg.trajectory_path, dir.path().join("traj.txt"));
        assert_eq!(cfg.first_snapshot, 5);
        assert_eq!(cfg.solvent_name, "WAT");
        assert_eq!(cfg.threads, Some(3));
        assert_eq!(cfg.radii_path, Some(dir.path().join("radii.csv")));
        assert_eq!(cfg.output_path, dir.path().join("final.pdb"));
        assert_eq!(cfg.report_path, Some(dir.path().join("tuples.txt")));
        assert_eq!(cfg.engine.occurrence_cutoff, 0.5);
        assert!(!cfg.engine.culls_overlaps());
        assert!(!cfg.engine.assigns_charges());
    }

    #[test]
    fn cli_overrides_set_values_and_file() {
        let dir = setup_inputs();
        let cfg_path = dir.path().join("run.toml");
        fs::write(&cfg_path, "[engine]\ndielectric = 10.0\noccurrence-cutoff = 0.5\n").unwrap();

        let mut args = base_args(dir.path());
        args.config = Some(cfg_path);
        args.dielectric = Some(4.0);
        args.no_group_bonds = true;
        args.set_values = vec![
            "engine.dielectric=20".to_string(),
            "engine.occurrence-cutoff=0.75".to_string(),
            "input.first-snapshot=2".to_string(),
        ];

        let cfg = build_config(&args, Some(8)).expect("build ok");
        assert_eq!(cfg.engine.dielectric, 4.0);
        assert_eq!(cfg.engine.occurrence_cutoff, 0.75);
        assert!(!cfg.engine.group_bonds);
        assert_eq!(cfg.first_snapshot, 2);
        assert_eq!(cfg.threads, Some(8));
    }

    #[test]
    fn missing_required_path_is_reported() {
        let dir = setup_inputs();
        let mut args = base_args(dir.path());
        args.trajectory = None;
        let err = build_config(&args, None).unwrap_err();
        assert!(matches!(err, CliError::Config(msg) if msg.contains("trajectory")));
    }

    #[test]
    fn nonexistent_input_is_reported() {
        let dir = setup_inputs();
        let mut args = base_args(dir.path());
        args.topology = Some(dir.path().join("missing.pdb"));
        let err = build_config(&args, None).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }

    #[test]
    fn charges_are_required_for_electrostatics() {
        let dir = setup_inputs();
        let mut args = base_args(dir.path());
        args.charges = None;
        assert!(build_config(&args, None).is_err());

        args.elec_coeff = Some(0.0);
        assert!(build_config(&args, None).is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let dir = setup_inputs();
        let mut args = base_args(dir.path());
        args.occurrence = Some(1.5);
        let err = build_config(&args, None).unwrap_err();
        assert!(matches!(err, CliError::Config(msg) if msg.contains("occurrence_cutoff")));
    }

    #[test]
    fn invalid_set_values_are_rejected() {
        let dir = setup_inputs();
        let mut args = base_args(dir.path());
        args.set_values = vec!["engine.dielectric".to_string()];
        assert!(build_config(&args, None).is_err());

        args.set_values = vec!["engine.unknown=1".to_string()];
        assert!(build_config(&args, None).is_err());

        args.set_values = vec!["engine.vdw-tolerance=abc".to_string()];
        assert!(build_config(&args, None).is_err());
    }
}
