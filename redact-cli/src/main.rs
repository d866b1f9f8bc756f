mod cli;

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use redact_core::{
    DetectorRegistry, EntityRecognizer, GazetteerRecognizer, IndividualTable, MentionsByType, Mode,
    RedactError, RedactionConfig, Redactor,
};

use crate::cli::Cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("erro: {:#}", err);
            let configuration = err
                .downcast_ref::<RedactError>()
                .is_some_and(RedactError::is_configuration);
            if configuration {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let texts = read_corpus(&cli)?;
    let config = build_config(&cli)?;
    let recognizer = load_recognizer(cli.gazetteer.as_deref())?;

    let mut redactor = Redactor::new(config, DetectorRegistry::new(), recognizer)?;
    if let Some(seed) = cli.seed {
        redactor = redactor.with_noise_seed(seed);
    }
    let output = redactor.redact_corpus(&texts)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for text in &output.texts {
            println!("{}", text);
        }
    }
    Ok(())
}

/// Texto posicional, arquivo (um documento por linha) ou entrada padrão.
fn read_corpus(cli: &Cli) -> Result<Vec<String>> {
    if let Some(text) = &cli.input {
        return Ok(vec![text.clone()]);
    }
    let content = match &cli.file {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("não foi possível ler {}", path.display()))?
        }
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("não foi possível ler a entrada padrão")?;
            buffer
        }
    };
    Ok(content.lines().map(str::to_string).collect())
}

fn build_config(cli: &Cli) -> Result<RedactionConfig> {
    let mode = cli.masking.mode();
    let defaults = RedactionConfig::default();
    let prior_individuals = match &cli.individuals {
        Some(path) => load_individuals(path, mode)?,
        None => BTreeMap::new(),
    };
    Ok(RedactionConfig {
        mode,
        masking_order: cli.masking_order.clone().unwrap_or(defaults.masking_order),
        mask_misc: cli.mask_misc,
        mask_numbers: cli.mask_numbers,
        epsilon: cli.epsilon,
        suppression: cli.suppression,
        batch_size: cli.batch_size,
        n_process: cli.n_process,
        prior_individuals,
    })
}

/// Anonimização: `índice → tipo → lista`; pseudonimização: `índice → id → tipo → lista`.
fn load_individuals(path: &Path, mode: Mode) -> Result<BTreeMap<usize, IndividualTable>> {
    let json = std::fs::read_to_string(path).with_context(|| format!("não foi possível ler {}", path.display()))?;
    parse_individuals(&json, mode).with_context(|| format!("indivíduos inválidos em {}", path.display()))
}

fn parse_individuals(json: &str, mode: Mode) -> Result<BTreeMap<usize, IndividualTable>> {
    Ok(match mode {
        Mode::Anonymize => {
            let flat: BTreeMap<usize, MentionsByType> = serde_json::from_str(json)?;
            flat.into_iter()
                .map(|(index, mentions)| (index, IndividualTable::from_mentions(mentions)))
                .collect()
        }
        Mode::Pseudonymize => serde_json::from_str(json)?,
    })
}

fn load_recognizer(gazetteer: Option<&Path>) -> Result<Arc<dyn EntityRecognizer>> {
    let recognizer = match gazetteer {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("não foi possível ler {}", path.display()))?;
            GazetteerRecognizer::from_json_str(&json)?
        }
        None => GazetteerRecognizer::new(),
    };
    Ok(Arc::new(recognizer.with_numbers(true)))
}
