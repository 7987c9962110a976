use super::traits::{RawStructure, StructureFile};
use crate::core::models::atom::{Atom, ResidueClass};
use crate::core::models::topology::Topology;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const REMARK_WIDTH: usize = 79;
const BANNER: &str = "--------------------------------------------------------------";

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("File doesn't contain any atoms")]
    NoAtoms,
    #[error("Topology and coordinate files have different atom counts (expected {expected}, found {found})")]
    AtomCountMismatch { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

fn is_atom_record(line: &str) -> bool {
    line.starts_with("ATOM  ") || line.starts_with("HETATM")
}

fn parse_coords(line: &str, line_num: usize) -> Result<Point3<f64>, PdbError> {
    if line.len() < 54 {
        return Err(PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::LineTooShort,
        });
    }
    let field = |start: usize, end: usize, columns: &str| -> Result<f64, PdbError> {
        let value = slice_and_trim(line, start, end);
        value.parse().map_err(|_| PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::InvalidFloat {
                columns: columns.into(),
                value: value.into(),
            },
        })
    };
    Ok(Point3::new(
        field(30, 38, "31-38")?,
        field(38, 46, "39-46")?,
        field(46, 54, "47-54")?,
    ))
}

fn parse_int(line: &str, start: usize, end: usize, columns: &str, line_num: usize) -> Result<i64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidInt {
            columns: columns.into(),
            value: value.into(),
        },
    })
}

/// Atom name columns. Some tools shift four-character names one column to
/// the right, leaving column 13 blank and a digit in column 17.
fn atom_name(line: &str) -> &str {
    let bytes = line.as_bytes();
    let shifted = bytes.get(12) == Some(&b' ') && bytes.get(16).is_some_and(u8::is_ascii_digit);
    if shifted {
        slice_and_trim(line, 13, 17)
    } else {
        slice_and_trim(line, 12, 16)
    }
}

fn format_atom_name(name: &str) -> String {
    if name.len() >= 4 || name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{name:<4}")
    } else {
        format!(" {name:<3}")
    }
}

fn write_atom_line(
    writer: &mut impl Write,
    serial: u32,
    atom: &Atom,
    residue_number: i32,
    position: &Point3<f64>,
) -> io::Result<()> {
    let name = format_atom_name(&atom.name);
    if residue_number > 9999 {
        writeln!(
            writer,
            "{:<6}{:>5} {} {:>3} {}{:>5}   {:>8.3}{:>8.3}{:>8.3}",
            "ATOM", serial, name, atom.residue_name, atom.chain_id, residue_number,
            position.x, position.y, position.z
        )
    } else {
        writeln!(
            writer,
            "{:<6}{:>5} {} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}",
            "ATOM", serial, name, atom.residue_name, atom.chain_id, residue_number,
            position.x, position.y, position.z
        )
    }
}

pub struct PdbFile;

impl StructureFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<RawStructure, Self::Error> {
        let mut structure = RawStructure::default();
        let mut chain_index = 0u32;
        let mut last_chain_id: Option<char> = None;
        let mut after_ter = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            if is_atom_record(&line) {
                let position = parse_coords(&line, line_num)?;
                let serial = parse_int(&line, 6, 11, "7-11", line_num)?;
                let residue_number = parse_int(&line, 22, 26, "23-26", line_num)?;
                let chain_id = line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' ');

                if !after_ter && last_chain_id.is_some_and(|previous| previous != chain_id) {
                    chain_index += 1;
                }
                last_chain_id = Some(chain_id);
                after_ter = false;

                let mut atom = Atom::new(
                    serial as u32,
                    atom_name(&line),
                    slice_and_trim(&line, 17, 20),
                    residue_number as i32,
                    chain_id,
                );
                atom.chain_index = chain_index;
                structure.atoms.push(atom);
                structure.coords.push(position);
            } else if line.starts_with("TER") {
                if !after_ter && !structure.atoms.is_empty() {
                    chain_index += 1;
                }
                after_ter = true;
            } else if line.starts_with("REMARK") {
                let mut remark: String = line.chars().take(REMARK_WIDTH).collect();
                remark.retain(|c| !c.is_control());
                structure.remarks.push(remark.trim_end().to_string());
            }
        }

        if structure.atoms.is_empty() {
            return Err(PdbError::NoAtoms);
        }
        Ok(structure)
    }

    fn read_coordinates_from(
        reader: &mut impl BufRead,
        expected: usize,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<(), Self::Error> {
        out.clear();
        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            if !is_atom_record(&line) {
                continue;
            }
            if out.len() == expected {
                return Err(PdbError::AtomCountMismatch {
                    expected,
                    found: expected + 1,
                });
            }
            out.push(parse_coords(&line, line_num + 1)?);
        }
        if out.len() != expected {
            return Err(PdbError::AtomCountMismatch {
                expected,
                found: out.len(),
            });
        }
        Ok(())
    }

    /// Writes non-solvent atoms first, then the surviving solvent residues
    /// renumbered after the highest biopolymer residue number.
    fn write_to(topology: &Topology, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "REMARK {BANNER:<72}")?;
        writeln!(writer, "REMARK {:<72}", " Topology converted by TASSE")?;
        writeln!(writer, "REMARK {BANNER:<72}")?;
        for remark in topology.remarks() {
            writeln!(writer, "{remark}")?;
        }

        let atoms = topology.atoms();
        let coords = topology.coords();
        let mut serial = 1u32;
        let mut previous: Option<(u32, ResidueClass)> = None;
        let mut max_residue_number = 0i32;

        for (atom, position) in atoms.iter().zip(coords) {
            if atom.skip || atom.class == ResidueClass::Solvent {
                continue;
            }
            let current = (atom.chain_index, atom.class);
            if previous.is_some_and(|p| p != current) {
                writeln!(writer, "{:<6}{:>5}", "TER", serial - 1)?;
            }
            previous = Some(current);
            max_residue_number = max_residue_number.max(atom.residue_number);
            write_atom_line(writer, serial, atom, atom.residue_number, position)?;
            serial += 1;
        }

        let mut last_residue: Option<u32> = None;
        let mut residue_number = max_residue_number;
        for (atom, position) in atoms.iter().zip(coords) {
            if atom.skip || atom.class != ResidueClass::Solvent {
                continue;
            }
            let current = (atom.chain_index, atom.class);
            if previous.is_some_and(|p| p != current) {
                writeln!(writer, "{:<6}{:>5}", "TER", serial - 1)?;
            }
            previous = Some(current);
            if last_residue != Some(atom.residue_index) {
                last_residue = Some(atom.residue_index);
                residue_number += 1;
            }
            write_atom_line(writer, serial, atom, residue_number, position)?;
            serial += 1;
        }

        writeln!(writer, "{:<6}{:>5}", "TER", serial - 1)?;
        writeln!(writer, "END")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::topology::SolventNaming;
    use std::io::Cursor;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
REMARK   1 sample structure
ATOM      1  N   ALA A   1       0.000   0.000   0.000  1.00  0.00           N
ATOM      2  H   ALA A   1       1.000   0.000   0.000  1.00  0.00           H
ATOM      3  CA  ALA A   1       0.000   1.500   0.000  1.00  0.00           C
ATOM      4  C   ALA A   1       0.000   2.500   1.000  1.00  0.00           C
ATOM      5  O   ALA A   1       0.000   3.500   1.000  1.00  0.00           O
TER       6
HETATM    7  O   WAT W 101       3.000   0.000   0.000  1.00  0.00           O
HETATM    8 1HW  WAT W 101       3.800   0.600   0.000  1.00  0.00           H
HETATM    9 2HW  WAT W 101       2.200   0.600   0.000  1.00  0.00           H
HETATM   10  O   WAT W 102       9.000   0.000   0.000  1.00  0.00           O
HETATM   11 1HW  WAT W 102       9.800   0.600   0.000  1.00  0.00           H
HETATM   12 2HW  WAT W 102       8.200   0.600   0.000  1.00  0.00           H
END
";

    fn read_sample() -> RawStructure {
        PdbFile::read_from(&mut Cursor::new(SAMPLE)).unwrap()
    }

    #[test]
    fn read_from_parses_atoms_chains_and_remarks() {
        let raw = read_sample();
        assert_eq!(raw.atoms.len(), 11);
        assert_eq!(raw.coords.len(), 11);
        assert_eq!(raw.remarks, vec!["REMARK   1 sample structure".to_string()]);

        let oxygen = &raw.atoms[5];
        assert_eq!(oxygen.serial, 7);
        assert_eq!(oxygen.name, "O");
        assert_eq!(oxygen.residue_name, "WAT");
        assert_eq!(oxygen.residue_number, 101);
        assert_eq!(oxygen.chain_index, 1);
        assert_eq!(raw.atoms[4].chain_index, 0);
        assert_eq!(raw.atoms[6].name, "1HW");
        assert_eq!(raw.coords[8], Point3::new(9.0, 0.0, 0.0));
    }

    #[test]
    fn read_from_handles_shifted_four_character_names() {
        let line = "ATOM      1  HD11LEU A   5       1.000   2.000   3.000\n";
        let raw = PdbFile::read_from(&mut Cursor::new(line)).unwrap();
        assert_eq!(raw.atoms[0].name, "HD11");
    }

    #[test]
    fn read_from_rejects_files_without_atoms() {
        let result = PdbFile::read_from(&mut Cursor::new("REMARK nothing\nEND\n"));
        assert!(matches!(result, Err(PdbError::NoAtoms)));
    }

    #[test]
    fn read_from_reports_bad_coordinates_with_columns() {
        let line = "ATOM      1  N   ALA A   1       x.xxx   0.000   0.000\n";
        let result = PdbFile::read_from(&mut Cursor::new(line));
        match result {
            Err(PdbError::Parse {
                line: 1,
                kind: PdbParseErrorKind::InvalidFloat { columns, .. },
            }) => assert_eq!(columns, "31-38"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn read_coordinates_enforces_atom_count() {
        let mut buffer = Vec::new();
        PdbFile::read_coordinates_from(&mut Cursor::new(SAMPLE), 11, &mut buffer).unwrap();
        assert_eq!(buffer.len(), 11);

        let result = PdbFile::read_coordinates_from(&mut Cursor::new(SAMPLE), 10, &mut buffer);
        assert!(matches!(result, Err(PdbError::AtomCountMismatch { expected: 10, .. })));
        let result = PdbFile::read_coordinates_from(&mut Cursor::new(SAMPLE), 12, &mut buffer);
        assert!(matches!(
            result,
            Err(PdbError::AtomCountMismatch { expected: 12, found: 11 })
        ));
    }

    #[test]
    fn write_to_renumbers_solvent_and_omits_skipped_atoms() {
        let raw = read_sample();
        let mut topology =
            Topology::from_atoms(raw.atoms, raw.coords, &SolventNaming::new("WAT")).unwrap();
        for atom in &mut topology.atoms_mut()[5..8] {
            atom.skip = true;
        }

        let mut out = Vec::new();
        PdbFile::write_to(&topology, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let atom_lines: Vec<&str> = text.lines().filter(|l| l.starts_with("ATOM")).collect();

        assert_eq!(atom_lines.len(), 8);
        assert_eq!(
            atom_lines[0],
            "ATOM      1  N   ALA A   1       0.000   0.000   0.000"
        );
        assert_eq!(
            atom_lines[5],
            "ATOM      6  O   WAT W   2       9.000   0.000   0.000"
        );
        assert_eq!(text.lines().filter(|l| l.starts_with("TER")).count(), 2);
        assert!(text.ends_with("END\n"));
    }

    #[test]
    fn write_to_path_round_trips_through_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.pdb");
        let raw = read_sample();
        let topology =
            Topology::from_atoms(raw.atoms, raw.coords, &SolventNaming::new("WAT")).unwrap();

        PdbFile::write_to_path(&topology, &path).unwrap();
        let reread = PdbFile::read_from_path(&path).unwrap();

        assert_eq!(reread.atoms.len(), 11);
        assert_eq!(reread.coords, topology.coords());
        assert_eq!(reread.atoms[10].residue_number, 3);
    }
}
