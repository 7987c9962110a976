use crate::cli::ConvertArgs;
use crate::error::{CliError, Result};
use std::collections::BTreeMap;
use tasse::core::forcefield::params::HBondForcefield;
use tasse::core::io::{pdb::PdbFile, traits::StructureFile};
use tasse::core::models::topology::{SolventNaming, Topology};
use tasse::engine::error::EngineError;
use tracing::info;

pub fn run(args: ConvertArgs) -> Result<()> {
    let aliases = match &args.params {
        Some(path) => HBondForcefield::load(path)
            .map_err(EngineError::from)?
            .solvent_aliases,
        None => BTreeMap::new(),
    };
    let naming = SolventNaming::new(&args.solvent).with_aliases(&aliases);

    info!("Loading input structure from {:?}", &args.input);
    let raw = PdbFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;
    let mut topology =
        Topology::from_atoms(raw.atoms, raw.coords, &naming).map_err(EngineError::from)?;
    topology.set_remarks(raw.remarks);

    info!(
        atoms = topology.len(),
        solvent_residues = topology.solvent_residue_count(),
        "Writing post-processed structure to {:?}",
        &args.output
    );
    PdbFile::write_to_path(&topology, &args.output).map_err(|e| CliError::FileParsing {
        path: args.output.clone(),
        source: e.into(),
    })?;

    println!(
        "✓ {} atoms ({} solvent residues) written to: {}",
        topology.len(),
        topology.solvent_residue_count(),
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const INPUT: &str = "\
ATOM      1  N   ALA A   1       0.000   0.000   0.000  1.00  0.00           N
ATOM      2  CA  ALA A   1       0.000   1.500   0.000  1.00  0.00           C
ATOM      3  C   ALA A   1       0.000   2.500   1.000  1.00  0.00           C
ATOM      4  O   ALA A   1       0.000   3.500   1.000  1.00  0.00           O
TER       5
HETATM    6  O   WAT W  50       3.000   0.000   0.000  1.00  0.00           O
HETATM    7  H1  WAT W  50       3.800   0.600   0.000  1.00  0.00           H
HETATM    8  H2  WAT W  50       2.200   0.600   0.000  1.00  0.00           H
END
";

    #[test]
    fn convert_renumbers_aliased_solvent() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.pdb");
        let output = dir.path().join("out.pdb");
        let params = dir.path().join("hbond.toml");
        fs::write(&input, INPUT).unwrap();
        fs::write(&params, "[solvent]\nWAT = \"HOH\"\n").unwrap();

        run(ConvertArgs {
            input,
            output: output.clone(),
            params: Some(params),
            solvent: "HOH".to_string(),
        })
        .unwrap();

        let text = fs::read_to_string(output).unwrap();
        let water: Vec<&str> = text.lines().filter(|l| l.get(17..20) == Some("HOH")).collect();
        assert_eq!(water.len(), 3);
        assert!(water.iter().all(|l| l.get(21..26) == Some("W   2")));
    }

    #[test]
    fn convert_without_solvent_fails() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.pdb");
        fs::write(&input, INPUT).unwrap();

        let result = run(ConvertArgs {
            input,
            output: dir.path().join("out.pdb"),
            params: None,
            solvent: "HOH".to_string(),
        });
        assert!(matches!(result, Err(CliError::TasseCore(_))));
    }
}
