use crate::core::models::atom::Atom;
use crate::core::models::topology::Topology;
use nalgebra::Point3;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Atoms, coordinates and free-text remarks as read from a structure file,
/// before residue classification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawStructure {
    pub atoms: Vec<Atom>,
    pub coords: Vec<Point3<f64>>,
    pub remarks: Vec<String>,
}

/// Defines the interface for reading topologies, reading per-snapshot
/// coordinates, and writing post-processed structures.
pub trait StructureFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads atoms and their coordinates from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the file contains no atoms.
    fn read_from(reader: &mut impl BufRead) -> Result<RawStructure, Self::Error>;

    /// Reads one snapshot's coordinates into `out`, replacing its contents.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    /// * `expected` - Number of atoms in the topology the snapshot belongs to.
    /// * `out` - Reusable coordinate buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the atom count differs from `expected`.
    fn read_coordinates_from(
        reader: &mut impl BufRead,
        expected: usize,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<(), Self::Error>;

    /// Writes the topology, omitting skipped atoms.
    fn write_to(topology: &Topology, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<RawStructure, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn read_coordinates_from_path<P: AsRef<Path>>(
        path: P,
        expected: usize,
        out: &mut Vec<Point3<f64>>,
    ) -> Result<(), Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_coordinates_from(&mut reader, expected, out)
    }

    fn write_to_path<P: AsRef<Path>>(topology: &Topology, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(topology, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
