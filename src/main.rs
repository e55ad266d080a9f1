use anyhow::{bail, Context, Result};
use diapred::cli::form::FormReader;
use diapred::cli::{
    parse_args, setup_logging, Commands, EvaluateArgs, PredictArgs, SessionArgs, TrainArgs,
    TrainingOptions,
};
use diapred::data::loader::DataLoader;
use diapred::model::checkpoint::{load_model, save_model, ModelMetadata};
use diapred::model::Model;
use diapred::predict::predict;
use diapred::session::Session;
use diapred::training::{Trainer, TrainingConfig, TrainingResult};
use std::io;
use std::path::Path;
use tracing::{error, info};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", diapred::info());

    let result = match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Predict(args) => run_predict(args),
        Commands::Evaluate(args) => run_evaluate(args),
        Commands::Session(args) => run_session(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Config file first, then preset flags, then explicit overrides
fn build_config(options: &TrainingOptions) -> Result<TrainingConfig> {
    let mut config = match &options.config {
        Some(path) => TrainingConfig::from_file(path)?,
        None if options.quick => TrainingConfig::quick_test(),
        None => TrainingConfig::default(),
    };

    if let Some(variant) = options.variant {
        config.variant = variant;
    }
    if let Some(seed) = options.seed {
        config.split.seed = seed;
    }
    if let Some(ratio) = options.test_ratio {
        diapred::utils::validation::open_unit_interval(ratio, "test_ratio")?;
        config.split.test_ratio = ratio;
    }
    if let Some(folds) = options.cv_folds {
        config.cv_folds = folds;
    }
    if options.no_progress {
        config.show_progress = false;
    }

    Ok(config)
}

fn train_from_file(path: &Path, options: &TrainingOptions) -> Result<TrainingResult> {
    let config = build_config(options)?;

    info!("Loading data...");
    let samples = DataLoader::new()
        .load(path)
        .with_context(|| format!("Failed to load data from {:?}", path))?;
    info!("Loaded {} records", samples.len());

    let result = Trainer::new(config)
        .train(&samples)
        .context("Training failed")?;
    result.print_summary();
    Ok(result)
}

fn run_train(args: TrainArgs) -> Result<()> {
    info!("Starting training...");
    info!("Input file: {:?}", args.input);

    let result = train_from_file(&args.input, &args.training)?;

    let cv_accuracy = result.cv_summary().map(|(mean, _)| mean);
    let metadata = ModelMetadata::for_model(&result.model, Some(result.test_metrics), cv_accuracy);
    save_model(&args.output, &result.model, &metadata)?;

    info!("Model saved to: {:?}", args.output);
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let bundle = load_model(&args.model)
        .with_context(|| format!("Failed to load model from {:?}", args.model))?;

    let sample = args.measurements.to_sample();
    let prediction = predict(&bundle.model, &sample)?;

    match args.format.as_str() {
        "text" => {
            println!("Input: {}", sample);
            print!("{}", prediction);
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        _ => {
            bail!("Unsupported output format: {}", args.format);
        }
    }

    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    info!("Starting evaluation...");
    info!("Input file: {:?}", args.input);
    info!("Model: {:?}", args.model);

    let bundle = load_model(&args.model)
        .with_context(|| format!("Failed to load model from {:?}", args.model))?;
    let samples = DataLoader::new()
        .load(&args.input)
        .with_context(|| format!("Failed to load data from {:?}", args.input))?;

    let metrics = bundle.model.evaluate(&samples).context("Evaluation failed")?;

    info!("=== Evaluation Results ({} model) ===", bundle.model.variant());
    info!("{}", metrics);
    info!("Confusion matrix:\n{}", metrics.confusion);

    if let Some(output) = args.output {
        diapred::utils::ensure_parent_dir(&output)?;
        let report = serde_json::json!({
            "model": args.model,
            "data": args.input,
            "variant": bundle.model.variant(),
            "metrics": metrics,
        });
        std::fs::write(&output, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write report {:?}", output))?;
        info!("Evaluation report saved to: {:?}", output);
    }

    Ok(())
}

fn run_session(args: SessionArgs) -> Result<()> {
    let model: Model = match (&args.model, &args.data) {
        (Some(path), _) => {
            load_model(path)
                .with_context(|| format!("Failed to load model from {:?}", path))?
                .model
        }
        (None, Some(data)) => train_from_file(data, &args.training)?.model,
        (None, None) => bail!("Either --model or --data is required"),
    };

    info!("Session ready ({} model)", model.variant());

    let mut session = Session::new(&model);
    let stdin = io::stdin();
    let mut form = FormReader::new(stdin.lock(), io::stdout());
    form.run(&mut session)
}
