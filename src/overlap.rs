// 🔀 Database overlap matrix
// How many gene names each pair of source databases share, as raw counts and
// as a percentage of the smaller database.

use crate::error::{ReconcileError, Result};
use crate::records::{COL_DATABASE, COL_GENE_NAME};
use crate::table::Table;
use csv::Writer;
use log::info;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct OverlapMatrix {
    databases: Vec<String>,
    counts: Vec<Vec<usize>>,
    percentages: Vec<Vec<f64>>,
}

impl OverlapMatrix {
    /// Requires `userGeneName` and `database`; rows missing either are ignored
    pub fn from_table(table: &Table) -> Result<Self> {
        let gene_col = table.required_column(COL_GENE_NAME)?;
        let db_col = table.required_column(COL_DATABASE)?;

        let mut genes_by_db: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for row in table.rows() {
            let gene = Table::cell(row, gene_col);
            let database = Table::cell(row, db_col);
            if gene.is_empty() || database.is_empty() {
                continue;
            }
            genes_by_db
                .entry(database.to_string())
                .or_default()
                .insert(gene.to_string());
        }

        for (database, genes) in &genes_by_db {
            info!("{}: {} genes", database, genes.len());
        }

        Ok(Self::from_sets(&genes_by_db))
    }

    pub fn from_sets(genes_by_db: &BTreeMap<String, BTreeSet<String>>) -> Self {
        let databases: Vec<String> = genes_by_db.keys().cloned().collect();
        let sets: Vec<&BTreeSet<String>> = genes_by_db.values().collect();
        let n = sets.len();

        let mut counts = vec![vec![0usize; n]; n];
        let mut percentages = vec![vec![0f64; n]; n];
        for i in 0..n {
            for j in 0..n {
                let shared = sets[i].intersection(sets[j]).count();
                let smaller = sets[i].len().min(sets[j].len());
                counts[i][j] = shared;
                percentages[i][j] = if smaller == 0 {
                    0.0
                } else {
                    round1(shared as f64 / smaller as f64 * 100.0)
                };
            }
        }

        OverlapMatrix {
            databases,
            counts,
            percentages,
        }
    }

    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    pub fn count(&self, a: &str, b: &str) -> Option<usize> {
        let (i, j) = self.indices(a, b)?;
        Some(self.counts[i][j])
    }

    pub fn percentage(&self, a: &str, b: &str) -> Option<f64> {
        let (i, j) = self.indices(a, b)?;
        Some(self.percentages[i][j])
    }

    fn indices(&self, a: &str, b: &str) -> Option<(usize, usize)> {
        let i = self.databases.iter().position(|d| d == a)?;
        let j = self.databases.iter().position(|d| d == b)?;
        Some((i, j))
    }

    /// Writes `<prefix>_counts.csv` and `<prefix>_percentages.csv` into `dir`,
    /// creating it if needed. Returns both paths.
    pub fn write(&self, dir: &Path, prefix: &str) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir).map_err(|e| ReconcileError::io(dir, e))?;

        let counts_path = dir.join(format!("{}_counts.csv", prefix));
        let percent_path = dir.join(format!("{}_percentages.csv", prefix));

        self.write_square(&counts_path, |i, j| self.counts[i][j].to_string())?;
        self.write_square(&percent_path, |i, j| format!("{:.1}", self.percentages[i][j]))?;

        info!(
            "Wrote overlap matrices for {} databases to {:?}",
            self.databases.len(),
            dir
        );
        Ok((counts_path, percent_path))
    }

    fn write_square<F>(&self, path: &Path, cell: F) -> Result<()>
    where
        F: Fn(usize, usize) -> String,
    {
        let csv_err = |e| ReconcileError::Csv {
            path: path.to_path_buf(),
            source: e,
        };
        let mut writer = Writer::from_path(path).map_err(csv_err)?;

        let mut header = vec![String::new()];
        header.extend(self.databases.iter().cloned());
        writer.write_record(&header).map_err(csv_err)?;

        for (i, database) in self.databases.iter().enumerate() {
            let mut record = vec![database.clone()];
            record.extend((0..self.databases.len()).map(|j| cell(i, j)));
            writer.write_record(&record).map_err(csv_err)?;
        }
        writer.flush().map_err(|e| ReconcileError::io(path, e))
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableFormat;

    fn table(text: &str) -> Table {
        Table::from_reader(text.as_bytes(), Path::new("genes.tsv"), &TableFormat::tsv()).unwrap()
    }

    fn sample() -> OverlapMatrix {
        OverlapMatrix::from_table(&table(
            "userGeneName\tdatabase\n\
             blaTEM\tcard_cds\n\
             tetA\tcard_cds\n\
             sul1\tcard_cds\n\
             blaTEM\tResFinder_cds\n\
             tetA\tResFinder_cds\n\
             tetA\tResFinder_cds\n\
             arsB\tMetalResistance_cds\n\
             \tcard_cds\n",
        ))
        .unwrap()
    }

    #[test]
    fn test_databases_sorted() {
        assert_eq!(
            sample().databases(),
            &["MetalResistance_cds", "ResFinder_cds", "card_cds"]
        );
    }

    #[test]
    fn test_counts_symmetric() {
        let m = sample();
        assert_eq!(m.count("card_cds", "ResFinder_cds"), Some(2));
        assert_eq!(m.count("ResFinder_cds", "card_cds"), Some(2));
        assert_eq!(m.count("card_cds", "card_cds"), Some(3));
        assert_eq!(m.count("card_cds", "MetalResistance_cds"), Some(0));
        assert_eq!(m.count("card_cds", "unknown"), None);
    }

    #[test]
    fn test_percentage_of_smaller_set() {
        let m = sample();
        // 2 shared, smaller set (ResFinder) has 2
        assert_eq!(m.percentage("card_cds", "ResFinder_cds"), Some(100.0));
        assert_eq!(m.percentage("card_cds", "MetalResistance_cds"), Some(0.0));

        let mut sets = BTreeMap::new();
        sets.insert("a".to_string(), ["x", "y", "z"].iter().map(|s| s.to_string()).collect());
        sets.insert("b".to_string(), ["x", "q", "r"].iter().map(|s| s.to_string()).collect());
        sets.insert("c".to_string(), BTreeSet::new());
        let m = OverlapMatrix::from_sets(&sets);
        assert_eq!(m.percentage("a", "b"), Some(33.3));
        assert_eq!(m.percentage("a", "c"), Some(0.0));
    }

    #[test]
    fn test_missing_database_column() {
        let t = table("userGeneName\tdb\nblaTEM\tcard_cds\n");
        assert!(matches!(
            OverlapMatrix::from_table(&t),
            Err(ReconcileError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("plots");
        let (counts, percentages) = sample().write(&out, "sharing_matrix").unwrap();

        assert!(counts.ends_with("sharing_matrix_counts.csv"));
        let text = fs::read_to_string(&counts).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            ",MetalResistance_cds,ResFinder_cds,card_cds"
        );
        assert_eq!(lines.next().unwrap(), "MetalResistance_cds,1,0,0");

        let text = fs::read_to_string(&percentages).unwrap();
        assert!(text.lines().any(|l| l == "card_cds,0.0,100.0,100.0"));
    }
}
