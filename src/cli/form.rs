//! Line-oriented input form and interactive session loop

use crate::data::{FieldSpec, RawSample, FIELD_SPECS};
use crate::session::Session;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use tracing::debug;

/// Prompts for the eight fields over any reader/writer pair
pub struct FormReader<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> FormReader<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Next non-empty trimmed line, or None at end of input
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.input.read_line(&mut line).context("Failed to read input")?;
            if n == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    /// Ask for one field until the value is in range
    fn read_field(&mut self, spec: &FieldSpec) -> Result<Option<f64>> {
        loop {
            write!(
                self.output,
                "{} [{}-{}] ({}): ",
                spec.label,
                spec.format(spec.min),
                spec.format(spec.max),
                spec.hint
            )?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            match spec.parse(&line) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => writeln!(self.output, "  {}", e)?,
            }
        }
    }

    /// Fill a sample field by field; None if input ends first
    pub fn read_sample(&mut self) -> Result<Option<RawSample>> {
        let mut sample = RawSample::default();
        for (idx, spec) in FIELD_SPECS.iter().enumerate() {
            match self.read_field(spec)? {
                Some(value) => sample.set(idx, value),
                None => return Ok(None),
            }
        }
        Ok(Some(sample))
    }

    /// Command loop: predict, history, clear, help, quit
    pub fn run(&mut self, session: &mut Session<'_>) -> Result<()> {
        writeln!(self.output, "Diabetes risk prediction ({} model)", session.model().variant())?;
        self.print_help()?;

        loop {
            write!(self.output, "> ")?;
            self.output.flush()?;

            let Some(command) = self.read_line()? else {
                break;
            };
            debug!("Session command: {}", command);

            match command.to_ascii_lowercase().as_str() {
                "predict" | "p" => {
                    let Some(sample) = self.read_sample()? else {
                        break;
                    };
                    match session.submit(sample) {
                        Ok(record) => write!(self.output, "{}", record.prediction)?,
                        Err(e) => writeln!(self.output, "Error: {}", e)?,
                    }
                }
                "history" | "h" => self.print_history(session)?,
                "clear" | "c" => {
                    session.clear_history();
                    writeln!(self.output, "History cleared.")?;
                }
                "help" | "?" => self.print_help()?,
                "quit" | "q" | "exit" => break,
                other => writeln!(self.output, "Unknown command '{}'; type 'help'", other)?,
            }
        }

        writeln!(self.output, "Goodbye.")?;
        Ok(())
    }

    fn print_help(&mut self) -> Result<()> {
        writeln!(self.output, "Commands: predict (p), history (h), clear (c), help (?), quit (q)")?;
        Ok(())
    }

    fn print_history(&mut self, session: &Session<'_>) -> Result<()> {
        let history = session.history();
        if history.is_empty() {
            writeln!(self.output, "No predictions yet.")?;
            return Ok(());
        }
        writeln!(self.output, "Prediction history ({} entries, newest first):", history.len())?;
        for (idx, record) in history.newest_first().enumerate() {
            writeln!(self.output, "  {}. {}", idx + 1, record)?;
        }
        Ok(())
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelConfig, ModelVariant};
    use crate::training::test_support::synthetic_samples;
    use crate::training::{Trainer, TrainingConfig};
    use std::io::Cursor;

    fn basic_model() -> crate::model::Model {
        let config = TrainingConfig {
            cv_folds: 0,
            show_progress: false,
            model: ModelConfig::small(),
            ..TrainingConfig::basic()
        };
        Trainer::new(config).train(&synthetic_samples(60, 9)).unwrap().model
    }

    #[test]
    fn test_read_sample() {
        let input = "2\n130\n80\n25\n100\n28.5\n0.5\n35\n";
        let mut form = FormReader::new(Cursor::new(input), Vec::new());

        let sample = form.read_sample().unwrap().unwrap();
        assert_eq!(sample.to_string(), "[2, 130, 80, 25, 100, 28.5, 0.50, 35]");
    }

    #[test]
    fn test_out_of_range_is_reprompted() {
        let input = "25\n2\n130\n80\n25\n100\n28.5\n0.5\n35\n";
        let mut form = FormReader::new(Cursor::new(input), Vec::new());

        let sample = form.read_sample().unwrap().unwrap();
        assert_eq!(sample.pregnancies, 2.0);

        let output = String::from_utf8(form.into_output()).unwrap();
        assert!(output.contains("Pregnancies"));
        assert_eq!(output.matches("Pregnancies [0-20]").count(), 2);
    }

    #[test]
    fn test_eof_mid_form() {
        let mut form = FormReader::new(Cursor::new("2\n130\n"), Vec::new());
        assert!(form.read_sample().unwrap().is_none());
    }

    #[test]
    fn test_session_loop() {
        let model = basic_model();
        let mut session = Session::new(&model);

        let input = "predict\n2\n130\n80\n25\n100\n28.5\n0.5\n35\nhistory\nclear\nhistory\nquit\n";
        let mut form = FormReader::new(Cursor::new(input), Vec::new());
        form.run(&mut session).unwrap();

        let output = String::from_utf8(form.into_output()).unwrap();
        assert!(output.contains("Prediction:"));
        assert!(output.contains("1 entries, newest first"));
        assert!(output.contains("History cleared."));
        assert!(output.contains("No predictions yet."));
        assert!(session.history().is_empty());
        assert_eq!(model.variant(), ModelVariant::Basic);
    }

    #[test]
    fn test_history_is_numbered_newest_first() {
        let model = basic_model();
        let mut session = Session::new(&model);

        let input = "p\n2\n130\n80\n25\n100\n28.5\n0.5\n35\n\
                     p\n6\n190\n90\n35\n200\n40\n1.2\n60\nh\nq\n";
        let mut form = FormReader::new(Cursor::new(input), Vec::new());
        form.run(&mut session).unwrap();

        let output = String::from_utf8(form.into_output()).unwrap();
        assert!(output.contains("(basic model)"));
        let first = output.find("  1. ").unwrap();
        let second = output.find("  2. ").unwrap();
        assert!(first < second);
        assert!(output[first..second].contains("190"));
        assert!(output[second..].contains("130"));
    }
}
