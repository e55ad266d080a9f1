pub mod form;

use crate::data::RawSample;
use crate::model::ModelVariant;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// diapred: diabetes risk prediction from eight clinical measurements
#[derive(Parser, Debug)]
#[command(name = "diapred")]
#[command(about = "Diabetes risk prediction from eight clinical measurements")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model and save it
    Train(TrainArgs),

    /// Predict risk for one set of measurements
    Predict(PredictArgs),

    /// Evaluate a saved model on labeled data
    ///
    /// Rows are scored as given. Enhanced models are not imputed here, so
    /// results on data with zero measurements can differ from the metrics
    /// reported by `train`.
    Evaluate(EvaluateArgs),

    /// Interactive prediction session with history
    Session(SessionArgs),
}

/// Options shared by every command that trains a model
#[derive(clap::Args, Debug, Clone)]
pub struct TrainingOptions {
    /// Model variant (basic or enhanced)
    #[arg(long)]
    pub variant: Option<ModelVariant>,

    /// Training configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Random seed for the train/test split
    #[arg(long)]
    pub seed: Option<u64>,

    /// Test ratio
    #[arg(long)]
    pub test_ratio: Option<f64>,

    /// Cross-validation folds (0 disables)
    #[arg(long)]
    pub cv_folds: Option<usize>,

    /// Quick test mode (smaller ensemble, fewer folds)
    #[arg(long)]
    pub quick: bool,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// Training arguments
#[derive(Parser, Debug)]
pub struct TrainArgs {
    /// Input data file (CSV or TSV, optionally gzipped)
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Output model file
    #[arg(short, long, default_value = "model.json")]
    pub output: PathBuf,

    #[command(flatten)]
    pub training: TrainingOptions,
}

/// The eight measurements as command-line flags
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct MeasurementArgs {
    /// Number of pregnancies
    #[arg(long)]
    pub pregnancies: f64,

    /// Plasma glucose (mg/dL)
    #[arg(long)]
    pub glucose: f64,

    /// Diastolic blood pressure (mm Hg)
    #[arg(long)]
    pub blood_pressure: f64,

    /// Triceps skin fold thickness (mm)
    #[arg(long)]
    pub skin_thickness: f64,

    /// 2-hour serum insulin (mu U/ml)
    #[arg(long)]
    pub insulin: f64,

    /// Body mass index
    #[arg(long)]
    pub bmi: f64,

    /// Diabetes pedigree function
    #[arg(long)]
    pub pedigree: f64,

    /// Age in years
    #[arg(long)]
    pub age: f64,
}

impl MeasurementArgs {
    pub fn to_sample(&self) -> RawSample {
        RawSample {
            pregnancies: self.pregnancies,
            glucose: self.glucose,
            blood_pressure: self.blood_pressure,
            skin_thickness: self.skin_thickness,
            insulin: self.insulin,
            bmi: self.bmi,
            diabetes_pedigree: self.pedigree,
            age: self.age,
        }
    }
}

/// Prediction arguments
#[derive(Parser, Debug)]
pub struct PredictArgs {
    /// Saved model file
    #[arg(short, long, required = true)]
    pub model: PathBuf,

    #[command(flatten)]
    pub measurements: MeasurementArgs,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

/// Evaluation arguments
#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// Input data file with ground truth labels
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Saved model file
    #[arg(short, long, required = true)]
    pub model: PathBuf,

    /// Output file for evaluation report (JSON)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Session arguments
#[derive(Parser, Debug)]
pub struct SessionArgs {
    /// Saved model file
    #[arg(short, long, conflicts_with = "data")]
    pub model: Option<PathBuf>,

    /// Train at startup from this dataset
    #[arg(short, long, required_unless_present = "model")]
    pub data: Option<PathBuf>,

    #[command(flatten)]
    pub training: TrainingOptions,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_evaluate_help_mentions_imputation() {
        let command = Cli::command();
        let evaluate = command.find_subcommand("evaluate").unwrap();
        let long_about = evaluate.get_long_about().unwrap().to_string();
        assert!(long_about.contains("not imputed"));
    }

    #[test]
    fn test_cli_parse() {
        let cli = Cli::parse_from(["diapred", "train", "-i", "diabetes.csv"]);

        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.input, PathBuf::from("diabetes.csv"));
                assert_eq!(args.output, PathBuf::from("model.json"));
                assert!(args.training.variant.is_none());
            }
            _ => panic!("Expected Train command"),
        }
    }

    #[test]
    fn test_train_variant() {
        let cli = Cli::parse_from(["diapred", "train", "-i", "d.csv", "--variant", "basic", "--cv-folds", "0"]);
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.training.variant, Some(ModelVariant::Basic));
                assert_eq!(args.training.cv_folds, Some(0));
            }
            _ => panic!("Expected Train command"),
        }

        assert!(Cli::try_parse_from(["diapred", "train", "-i", "d.csv", "--variant", "deep"]).is_err());
    }

    #[test]
    fn test_predict_args() {
        let cli = Cli::parse_from([
            "diapred", "predict",
            "-m", "model.json",
            "--pregnancies", "2",
            "--glucose", "130",
            "--blood-pressure", "80",
            "--skin-thickness", "25",
            "--insulin", "100",
            "--bmi", "28.5",
            "--pedigree", "0.5",
            "--age", "35",
        ]);

        match cli.command {
            Commands::Predict(args) => {
                assert_eq!(args.model, PathBuf::from("model.json"));
                assert_eq!(args.format, "text");
                let sample = args.measurements.to_sample();
                assert_eq!(sample.glucose, 130.0);
                assert_eq!(sample.diabetes_pedigree, 0.5);
            }
            _ => panic!("Expected Predict command"),
        }
    }

    #[test]
    fn test_session_requires_model_or_data() {
        assert!(Cli::try_parse_from(["diapred", "session"]).is_err());
        assert!(Cli::try_parse_from(["diapred", "session", "-m", "model.json"]).is_ok());
        assert!(Cli::try_parse_from(["diapred", "session", "-d", "diabetes.csv", "--quick"]).is_ok());
    }
}
