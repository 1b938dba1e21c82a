//! Trial tables and their statistical summary.
//!
//! A trial table is a CSV file with header `trial,T,T',T'',T''',seed`: one
//! row per valid trial, holding the baseline tour length and the optimal tour
//! lengths with node A, node B, and both nodes perturbed.

use crate::error::{Error, Result};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const HEADER: [&str; 6] = ["trial", "T", "T'", "T''", "T'''", "seed"];

/// Tour lengths recorded for one valid trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// 1-based trial index
    pub trial: usize,
    /// T: baseline
    pub baseline: f64,
    /// T': node A perturbed
    pub a_perturbed: f64,
    /// T'': node B perturbed
    pub b_perturbed: f64,
    /// T''': both nodes perturbed
    pub ab_perturbed: f64,
    /// Seed of the run the trial belongs to
    pub seed: u64,
}

impl TrialRecord {
    /// (T''' - T) - ((T' - T) + (T'' - T)); zero when the perturbations add up
    pub fn interaction(&self) -> f64 {
        let delta_a = self.a_perturbed - self.baseline;
        let delta_b = self.b_perturbed - self.baseline;
        let delta_ab = self.ab_perturbed - self.baseline;
        delta_ab - (delta_a + delta_b)
    }
}

/// Append-only CSV writer for trial records
pub struct TrialTable<W: Write> {
    writer: csv::Writer<W>,
    include_seed: bool,
    precision: usize,
    rows: usize,
}

impl TrialTable<File> {
    pub fn create<P: AsRef<Path>>(path: P, include_seed: bool, precision: usize) -> Result<Self> {
        TrialTable::new(File::create(path)?, include_seed, precision)
    }
}

impl<W: Write> TrialTable<W> {
    /// Wrap `inner` and write the header row
    pub fn new(inner: W, include_seed: bool, precision: usize) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(inner);
        if include_seed {
            writer.write_record(HEADER)?;
        } else {
            writer.write_record(&HEADER[..5])?;
        }
        writer.flush()?;

        Ok(TrialTable { writer, include_seed, precision, rows: 0 })
    }

    pub fn append(&mut self, record: &TrialRecord) -> Result<()> {
        let p = self.precision;
        let mut row = vec![
            record.trial.to_string(),
            format!("{:.*}", p, record.baseline),
            format!("{:.*}", p, record.a_perturbed),
            format!("{:.*}", p, record.b_perturbed),
            format!("{:.*}", p, record.ab_perturbed),
        ];
        if self.include_seed {
            row.push(record.seed.to_string());
        }
        self.writer.write_record(&row)?;
        // Rows must survive an abort later in the run
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| Error::Io(e.into_error()))
    }
}

fn column(row: &csv::StringRecord, i: usize) -> Result<&str> {
    row.get(i)
        .map(str::trim)
        .ok_or_else(|| Error::config(format!("trial table row has no column {}", i)))
}

fn number(row: &csv::StringRecord, i: usize) -> Result<f64> {
    column(row, i)?
        .parse()
        .map_err(|_| Error::config(format!("invalid number in column {}", i)))
}

/// Read the records of a trial table. Tables without a seed column yield seed 0.
pub fn read_table<R: Read>(reader: R) -> Result<Vec<TrialRecord>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;
        let trial = column(&row, 0)?
            .parse()
            .map_err(|_| Error::config("invalid trial index"))?;
        let seed = match row.get(5).map(str::trim) {
            Some(s) if !s.is_empty() => s.parse().map_err(|_| Error::config("invalid seed"))?,
            _ => 0,
        };

        records.push(TrialRecord {
            trial,
            baseline: number(&row, 1)?,
            a_perturbed: number(&row, 2)?,
            b_perturbed: number(&row, 3)?,
            ab_perturbed: number(&row, 4)?,
            seed,
        });
    }

    Ok(records)
}

pub fn read_table_file<P: AsRef<Path>>(path: P) -> Result<Vec<TrialRecord>> {
    read_table(File::open(path)?)
}

/// Descriptive statistics of one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesStatistics {
    fn of(values: &[f64]) -> Self {
        let min = Iterator::min(values.iter().map(|&v| OrderedFloat(v))).map_or(f64::NAN, |v| v.0);
        let max = Iterator::max(values.iter().map(|&v| OrderedFloat(v))).map_or(f64::NAN, |v| v.0);
        SeriesStatistics {
            mean: values.mean(),
            std_dev: values.std_dev(),
            min,
            max,
        }
    }
}

/// Summary of how single and joint perturbations compose
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionSummary {
    pub trials: usize,
    /// T' - T
    pub delta_a: SeriesStatistics,
    /// T'' - T
    pub delta_b: SeriesStatistics,
    /// T''' - T
    pub delta_ab: SeriesStatistics,
    /// (T''' - T) - (T' - T) - (T'' - T)
    pub interaction: SeriesStatistics,
    /// Share of trials whose interaction is within the tolerance
    pub additive_share: f64,
    pub tolerance: f64,
}

impl InteractionSummary {
    pub fn from_records(records: &[TrialRecord], tolerance: f64) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::config("no trials to summarize"));
        }

        let delta_a: Vec<f64> = records.iter().map(|r| r.a_perturbed - r.baseline).collect();
        let delta_b: Vec<f64> = records.iter().map(|r| r.b_perturbed - r.baseline).collect();
        let delta_ab: Vec<f64> = records.iter().map(|r| r.ab_perturbed - r.baseline).collect();
        let interaction: Vec<f64> = records.iter().map(TrialRecord::interaction).collect();

        let additive = interaction.iter().filter(|v| v.abs() <= tolerance).count();

        Ok(InteractionSummary {
            trials: records.len(),
            delta_a: SeriesStatistics::of(&delta_a),
            delta_b: SeriesStatistics::of(&delta_b),
            delta_ab: SeriesStatistics::of(&delta_ab),
            interaction: SeriesStatistics::of(&interaction),
            additive_share: additive as f64 / records.len() as f64,
            tolerance,
        })
    }

    /// Generate summary report
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("     Perturbation Interaction Report\n");
        report.push_str("========================================\n\n");
        report.push_str(&format!("Trials: {}\n\n", self.trials));

        report.push_str(&format!("{:<22} {:>12} {:>12} {:>12} {:>12}\n",
            "Series", "Mean", "Std Dev", "Min", "Max"));
        report.push_str("-".repeat(74).as_str());
        report.push('\n');

        for (name, s) in [
            ("T' - T", &self.delta_a),
            ("T'' - T", &self.delta_b),
            ("T''' - T", &self.delta_ab),
            ("interaction", &self.interaction),
        ] {
            report.push_str(&format!("{:<22} {:>12.4} {:>12.4} {:>12.4} {:>12.4}\n",
                name, s.mean, s.std_dev, s.min, s.max));
        }

        report.push_str("-".repeat(74).as_str());
        report.push('\n');
        report.push_str(&format!("Additive trials (|interaction| <= {}): {:.2}%\n",
            self.tolerance, self.additive_share * 100.0));

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(trial: usize, t: f64, a: f64, b: f64, ab: f64) -> TrialRecord {
        TrialRecord { trial, baseline: t, a_perturbed: a, b_perturbed: b, ab_perturbed: ab, seed: 17 }
    }

    fn table_text(include_seed: bool, precision: usize, records: &[TrialRecord]) -> String {
        let mut table = TrialTable::new(Vec::new(), include_seed, precision).unwrap();
        for r in records {
            table.append(r).unwrap();
        }
        String::from_utf8(table.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_header_and_row_format() {
        let text = table_text(true, 1, &[record(1, 100.0, 105.0, 98.0, 103.0)]);
        assert_eq!(text, "trial,T,T',T'',T''',seed\n1,100.0,105.0,98.0,103.0,17\n");
    }

    #[test]
    fn test_default_precision_is_fixed_point() {
        let text = table_text(false, 6, &[record(2, 100.0, 105.5, 98.25, 103.0)]);
        assert_eq!(text, "trial,T,T',T'',T'''\n2,100.000000,105.500000,98.250000,103.000000\n");
    }

    #[test]
    fn test_read_table_back() {
        let records = [record(1, 100.0, 105.0, 98.0, 103.0), record(3, 100.0, 101.0, 99.0, 100.0)];
        let text = table_text(true, 6, &records);
        let parsed = read_table(text.as_bytes()).unwrap();
        assert_eq!(parsed, records);

        let without_seed = table_text(false, 6, &records);
        let parsed = read_table(without_seed.as_bytes()).unwrap();
        assert_eq!(parsed[1].seed, 0);
        assert_eq!(parsed[1].trial, 3);
    }

    #[test]
    fn test_interaction() {
        let r = record(1, 100.0, 105.0, 98.0, 103.0);
        assert!((r.interaction() - 0.0).abs() < 1e-12);

        let r = record(1, 100.0, 105.0, 98.0, 110.0);
        assert!((r.interaction() - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary_statistics() {
        let records = [
            record(1, 100.0, 105.0, 98.0, 103.0),
            record(2, 100.0, 102.0, 101.0, 107.0),
        ];
        let summary = InteractionSummary::from_records(&records, 1e-6).unwrap();

        assert_eq!(summary.trials, 2);
        assert!((summary.delta_a.mean - 3.5).abs() < 1e-12);
        assert_eq!(summary.delta_b.min, -2.0);
        assert_eq!(summary.delta_b.max, 1.0);
        assert!((summary.interaction.mean - 2.0).abs() < 1e-12);
        assert!((summary.additive_share - 0.5).abs() < 1e-12);
        assert!(summary.report().contains("Additive trials"));
    }

    #[test]
    fn test_empty_summary_rejected() {
        assert!(InteractionSummary::from_records(&[], 1e-6).is_err());
    }
}
