use crate::data::{LabeledSample, RawSample, NUM_RAW_FEATURES, RAW_FEATURE_NAMES, TARGET_COLUMN};
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Tsv,
    GzippedCsv,
    GzippedTsv,
}

impl FileFormat {
    /// Detect file format from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str());
        let stem = path.file_stem().and_then(|s| s.to_str());

        match (ext, stem) {
            (Some("gz"), Some(stem)) => {
                if stem.ends_with(".csv") {
                    Ok(FileFormat::GzippedCsv)
                } else if stem.ends_with(".tsv") || stem.ends_with(".txt") {
                    Ok(FileFormat::GzippedTsv)
                } else {
                    Err(anyhow::anyhow!("Cannot determine format of gzipped file"))
                }
            }
            (Some("csv"), _) => Ok(FileFormat::Csv),
            (Some("tsv"), _) | (Some("txt"), _) => Ok(FileFormat::Tsv),
            _ => Err(anyhow::anyhow!("Unsupported file format: {:?}", path)),
        }
    }

    /// Get delimiter character
    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv | FileFormat::GzippedCsv => b',',
            FileFormat::Tsv | FileFormat::GzippedTsv => b'\t',
        }
    }

    /// Check if format is gzipped
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedCsv | FileFormat::GzippedTsv)
    }
}

/// Data loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Maximum number of records to load (0 = unlimited)
    pub max_records: usize,
    /// Log progress every this many records
    pub log_every: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_records: 0,
            log_every: 10000,
        }
    }
}

/// Loader for labeled diabetes records
///
/// Every row must carry all eight measurement columns and a 0/1 outcome.
/// Any malformed row aborts the load: a model fitted on silently dropped
/// rows would not match the dataset the user pointed at.
pub struct DataLoader {
    config: LoaderConfig,
}

impl DataLoader {
    /// Create new data loader with default config
    pub fn new() -> Self {
        Self {
            config: LoaderConfig::default(),
        }
    }

    /// Create new data loader with custom config
    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load labeled samples from file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Vec<LabeledSample>> {
        let path = path.as_ref();
        info!("Loading data from {:?}", path);

        let format = FileFormat::from_path(path)?;
        debug!("Detected file format: {:?}", format);

        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;

        let records = if format.is_gzipped() {
            self.parse_records(BufReader::new(GzDecoder::new(file)), format)?
        } else {
            self.parse_records(BufReader::new(file), format)?
        };

        if records.is_empty() {
            bail!("No records found in {:?}", path);
        }

        let positives = records.iter().filter(|r| r.outcome == 1).count();
        info!(
            "Loaded {} records (positive={}, negative={})",
            records.len(),
            positives,
            records.len() - positives
        );
        Ok(records)
    }

    /// Parse records from reader
    fn parse_records<R: Read>(&self, reader: R, format: FileFormat) -> Result<Vec<LabeledSample>> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .context("Failed to read header row")?
            .iter()
            .map(|s| s.to_string())
            .collect();
        debug!("Headers: {:?}", headers);

        let column = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .with_context(|| format!("Missing required column: {}", name))
        };

        let mut feature_columns = [0usize; NUM_RAW_FEATURES];
        for (slot, name) in feature_columns.iter_mut().zip(RAW_FEATURE_NAMES) {
            *slot = column(name)?;
        }
        let target_column = column(TARGET_COLUMN)?;

        let mut records = Vec::new();

        for (row, result) in csv_reader.records().enumerate() {
            // Header is line 1
            let line = row + 2;
            let record = result.with_context(|| format!("Failed to parse CSV record at line {}", line))?;

            let labeled = parse_labeled_sample(&record, &feature_columns, target_column)
                .with_context(|| format!("Malformed record at line {}", line))?;
            records.push(labeled);

            if self.config.max_records > 0 && records.len() >= self.config.max_records {
                warn!("Reached maximum record limit: {}", self.config.max_records);
                break;
            }

            if self.config.log_every > 0 && records.len() % self.config.log_every == 0 {
                debug!("Loaded {} records...", records.len());
            }
        }

        Ok(records)
    }
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one CSV row into a labeled sample
fn parse_labeled_sample(
    record: &csv::StringRecord,
    feature_columns: &[usize; NUM_RAW_FEATURES],
    target_column: usize,
) -> Result<LabeledSample> {
    let mut values = [0.0f64; NUM_RAW_FEATURES];

    for (i, (&col, name)) in feature_columns.iter().zip(RAW_FEATURE_NAMES).enumerate() {
        let raw = record.get(col).with_context(|| format!("Missing value for {}", name))?;
        let value: f64 = raw
            .parse()
            .with_context(|| format!("Invalid value for {}: '{}'", name, raw))?;
        if !value.is_finite() || value < 0.0 {
            bail!("{} must be a non-negative number, got {}", name, raw);
        }
        values[i] = value;
    }

    let raw_target = record
        .get(target_column)
        .with_context(|| format!("Missing value for {}", TARGET_COLUMN))?;
    let outcome = match raw_target.parse::<f64>() {
        Ok(v) if v == 0.0 => 0,
        Ok(v) if v == 1.0 => 1,
        _ => bail!("{} must be 0 or 1, got '{}'", TARGET_COLUMN, raw_target),
    };

    Ok(LabeledSample {
        sample: RawSample::from_slice(&values)?,
        outcome,
    })
}
