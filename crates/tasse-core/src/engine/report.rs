use super::catalog::AtomCatalog;
use super::config::EngineConfig;
use super::scores::{GlobalScore, ScoreBoard};
use super::selection::snapshot_cutoff;
use crate::core::models::topology::Topology;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::{self, Write};

const MAX_HISTOGRAM_BINS: u32 = 20;
const HISTOGRAM_BAR_WIDTH: f64 = 50.0;
const PAIR_RULE: &str = "----------------------------------------------------------------------------------------------------";
const TRIPLET_RULE: &str = "------------------------------------------------------------------------------------------------------------------------------------";

/// Accumulative histogram of how many snapshots each tuple was seen in.
/// A triplet counts as three pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceHistogram {
    bins: Vec<u32>,
    total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramRow {
    /// Upper occurrence bound of the bin in percent.
    pub percent: f64,
    /// Accumulated share of all counted pairs.
    pub fraction: f64,
    pub accumulated: u32,
    pub bar: usize,
}

impl OccurrenceHistogram {
    pub fn from_board(board: &ScoreBoard, total_snapshots: u32) -> Self {
        let bin_count = MAX_HISTOGRAM_BINS.min(total_snapshots).max(1);
        let scale = bin_count as f64 / total_snapshots.max(1) as f64;
        let mut histogram = Self {
            bins: vec![0; bin_count as usize],
            total: 0,
        };

        let weighted = board
            .pairs()
            .values()
            .map(|s| (s, 1))
            .chain(board.triplets().values().map(|s| (s, 3)));
        for (score, weight) in weighted {
            let bin = ((scale * score.snapshots_seen as f64).ceil() as usize)
                .saturating_sub(1)
                .min(histogram.bins.len() - 1);
            histogram.bins[bin] += weight;
            histogram.total += weight;
        }
        histogram
    }

    pub fn bins(&self) -> &[u32] {
        &self.bins
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn rows(&self) -> Vec<HistogramRow> {
        let step = 100.0 / self.bins.len() as f64;
        let mut accumulated = 0;
        self.bins
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                accumulated += count;
                let fraction = accumulated as f64 / self.total as f64;
                HistogramRow {
                    percent: ((i + 1) as f64 * step).ceil(),
                    fraction,
                    accumulated,
                    bar: (fraction * HISTOGRAM_BAR_WIDTH + 0.5).floor() as usize,
                }
            })
            .collect()
    }
}

/// One qualifying pair (`N = 2`) or triplet (`N = 3`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TupleRow<const N: usize> {
    pub atoms: [u32; N],
    pub score: u32,
    /// Percentage of snapshots the tuple was seen in.
    pub occurrence: f64,
    pub mean_energy: f64,
}

impl<const N: usize> TupleRow<N> {
    fn new(atoms: [u32; N], score: &GlobalScore, total_snapshots: u32) -> Self {
        Self {
            atoms,
            score: score.score,
            occurrence: score.snapshots_seen as f64 * 100.0 / total_snapshots as f64,
            mean_energy: score.mean_energy(),
        }
    }

    /// Score descending, then occurrence descending, then energy ascending.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| other.occurrence.total_cmp(&self.occurrence))
            .then_with(|| self.mean_energy.total_cmp(&other.mean_energy))
    }
}

fn qualifying<K, const N: usize>(
    map: &BTreeMap<K, GlobalScore>,
    cutoff: u32,
    total_snapshots: u32,
    atoms: impl Fn(&K) -> [u32; N],
) -> Vec<TupleRow<N>> {
    let mut rows: Vec<TupleRow<N>> = map
        .iter()
        .filter(|(_, s)| s.snapshots_seen >= cutoff)
        .map(|(k, s)| TupleRow::new(atoms(k), s, total_snapshots))
        .collect();
    rows.sort_by(TupleRow::rank);
    rows
}

/// Occurrence statistics and ranked tuple tables of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleReport {
    pub histogram: OccurrenceHistogram,
    pub pairs: Vec<TupleRow<2>>,
    pub triplets: Vec<TupleRow<3>>,
}

impl TupleReport {
    pub fn build(board: &ScoreBoard, total_snapshots: u32, occurrence_cutoff: f64) -> Self {
        let cutoff = snapshot_cutoff(total_snapshots, occurrence_cutoff);
        Self {
            histogram: OccurrenceHistogram::from_board(board, total_snapshots),
            pairs: qualifying(board.pairs(), cutoff, total_snapshots, |k| [k.0, k.1]),
            triplets: qualifying(board.triplets(), cutoff, total_snapshots, |k| {
                [k.0, k.1, k.2]
            }),
        }
    }

    pub fn write<W: Write>(
        &self,
        out: &mut W,
        config: &EngineConfig,
        topology: &Topology,
        catalog: &AtomCatalog,
    ) -> io::Result<()> {
        writeln!(out, "TASSE PARAMETERS:")?;
        for (name, value) in [
            ("X-Y distance cutoff", config.hbond_max_length),
            ("Abs energy cutoff", config.hbond_cutoff_energy),
            ("Occurence cutoff", config.occurrence_cutoff),
            ("Electrostatic coeff", config.electrostatic_coeff),
            ("HB-12-6 coeff", config.hbond_126_coeff),
        ] {
            writeln!(out, "{name:>20}:\t{value:.3}")?;
        }

        if self.histogram.total() > 0 {
            writeln!(out, "{PAIR_RULE}")?;
            writeln!(
                out,
                "{:^100}",
                "PAIR OCCURENCE ACCUMULATIVE HISTOGRAM"
            )?;
            writeln!(out, "{PAIR_RULE}")?;
            for row in self.histogram.rows() {
                writeln!(
                    out,
                    "{:3.0}%\t{:5.2}\t{:6}\t|{}",
                    row.percent,
                    row.fraction,
                    row.accumulated,
                    "=".repeat(row.bar)
                )?;
            }
            writeln!(out, "{PAIR_RULE}\n")?;
        }

        let title = |index: u32| atom_title(index, topology, catalog);
        write_table(out, &self.pairs, "PAIRS", PAIR_RULE, &title)?;
        write_table(out, &self.triplets, "TRIPLETS", TRIPLET_RULE, &title)?;

        if self.histogram.total() == 0 {
            writeln!(out, "No pairs or triplets found!")?;
        }
        Ok(())
    }
}

/// `RES-num NAME`, with the group title in place of the atom name for
/// grouped atoms.
fn atom_title(index: u32, topology: &Topology, catalog: &AtomCatalog) -> (u32, String) {
    let atom = &topology.atoms()[index as usize];
    let name = catalog.group_title(index).unwrap_or(atom.name.as_str());
    (atom.serial, format!("{} {}", atom.residue_label(), name))
}

fn write_table<W: Write, const N: usize>(
    out: &mut W,
    rows: &[TupleRow<N>],
    label: &str,
    rule: &str,
    title: &impl Fn(u32) -> (u32, String),
) -> io::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    writeln!(out, "{rule}")?;
    writeln!(
        out,
        "{:^width$}",
        format!("{:8} {label}", rows.len()),
        width = rule.len()
    )?;
    writeln!(out, "{rule}")?;

    for i in 1..=N {
        write!(out, "{:>5}\t{:<20}\t", format!("s/n {i}"), format!("atom {i}"))?;
    }
    writeln!(out, "{:>6}\t{:>6}\t{:>20}", "score", "occur", "energy, kcal/mol")?;
    writeln!(out, "{rule}")?;

    for row in rows {
        for &atom in &row.atoms {
            let (serial, name) = title(atom);
            write!(out, "{serial:5}\t{name:<20}\t")?;
        }
        writeln!(
            out,
            "{:6}\t{:5.1}%\t{:20.6}",
            row.score, row.occurrence, row.mean_energy
        )?;
    }
    writeln!(out, "{rule}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::microset::{PairKey, TripletKey};

    fn score(score: u32, snapshots_seen: u32, energy_sum: f64) -> GlobalScore {
        GlobalScore {
            score,
            snapshots_seen,
            energy_sum,
            placements: Vec::new(),
        }
    }

    fn board() -> ScoreBoard {
        let mut board = ScoreBoard::new();
        board.pairs_mut().insert(PairKey(0, 1), score(10, 10, -20.0));
        board.pairs_mut().insert(PairKey(0, 2), score(12, 9, -36.0));
        board.pairs_mut().insert(PairKey(1, 2), score(3, 3, -3.0));
        board
    }

    #[test]
    fn histogram_bins_follow_snapshot_share() {
        let histogram = OccurrenceHistogram::from_board(&board(), 10);
        assert_eq!(histogram.bins().len(), 10);
        assert_eq!(histogram.total(), 3);
        assert_eq!(histogram.bins()[2], 1);
        assert_eq!(histogram.bins()[8], 1);
        assert_eq!(histogram.bins()[9], 1);

        let rows = histogram.rows();
        let last = rows.last().unwrap();
        assert_eq!(last.accumulated, 3);
        assert_eq!(last.percent, 100.0);
        assert_eq!(last.bar, 50);
        assert_eq!(rows[2].bar, 17);
    }

    #[test]
    fn histogram_is_capped_at_twenty_bins() {
        let histogram = OccurrenceHistogram::from_board(&board(), 1000);
        assert_eq!(histogram.bins().len(), 20);
        assert_eq!(histogram.bins()[0], 3);
    }

    #[test]
    fn qualifying_pairs_rank_by_score_first() {
        let report = TupleReport::build(&board(), 10, 0.9);
        let atoms: Vec<[u32; 2]> = report.pairs.iter().map(|r| r.atoms).collect();
        assert_eq!(atoms, vec![[0, 2], [0, 1]]);
        assert_eq!(report.pairs[0].occurrence, 90.0);
        assert_eq!(report.pairs[0].mean_energy, -3.0);
        assert!(report.triplets.is_empty());
    }

    #[test]
    fn ties_rank_by_occurrence_then_energy() {
        let a = TupleRow {
            atoms: [0, 1],
            score: 5,
            occurrence: 50.0,
            mean_energy: -1.0,
        };
        let b = TupleRow {
            occurrence: 60.0,
            ..a
        };
        let c = TupleRow {
            mean_energy: -2.0,
            ..a
        };
        let mut rows = vec![a, b, c];
        rows.sort_by(TupleRow::rank);
        assert_eq!(rows, vec![b, c, a]);
    }

    #[test]
    fn triplets_count_three_in_histogram() {
        let mut board = ScoreBoard::new();
        board
            .triplets_mut()
            .insert(TripletKey(0, 1, 2), score(1, 1, -2.0));
        let histogram = OccurrenceHistogram::from_board(&board, 1);
        assert_eq!(histogram.bins(), &[3]);
    }
}
