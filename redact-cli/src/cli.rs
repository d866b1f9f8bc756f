use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use redact_core::Mode;

#[derive(Parser, Debug)]
#[command(name = "redact")]
#[command(about = "Anonimiza ou pseudonimiza textos em dinamarquês", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Texto a ser redigido (sem ele, lê --file ou a entrada padrão)
    pub input: Option<String>,

    /// Arquivo com um documento por linha
    #[arg(long, short = 'f', conflicts_with = "input")]
    pub file: Option<PathBuf>,

    /// Tipo de mascaramento
    #[arg(long, short = 'm', value_enum, default_value_t = Masking::Anonymizer)]
    pub masking: Masking,

    /// Ordem dos passos, separada por vírgula (ex: CPR,TELEFON,EMAIL,NER)
    #[arg(long, value_delimiter = ',')]
    pub masking_order: Option<Vec<String>>,

    /// Mascara entidades MISC
    #[arg(long)]
    pub mask_misc: bool,

    /// Mascara números
    #[arg(long)]
    pub mask_numbers: bool,

    /// Perturba números com ruído de Laplace em vez de placeholder
    #[arg(long, requires = "mask_numbers")]
    pub epsilon: Option<f64>,

    /// Troca todos os placeholders por XXX
    #[arg(long)]
    pub suppression: bool,

    /// Documentos por chamada ao reconhecedor de entidades
    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    /// Threads de processamento (padrão: todas)
    #[arg(long)]
    pub n_process: Option<usize>,

    /// Arquivo JSON de gazetteers
    #[arg(long, env = "REDACT_GAZETTEER")]
    pub gazetteer: Option<PathBuf>,

    /// Arquivo JSON de indivíduos conhecidos por índice de documento
    #[arg(long)]
    pub individuals: Option<PathBuf>,

    /// Semente do ruído, para resultados reproduzíveis
    #[arg(long)]
    pub seed: Option<u64>,

    /// Imprime textos e indivíduos como JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Masking {
    Anonymizer,
    Pseudonymizer,
}

impl Masking {
    pub fn mode(self) -> Mode {
        match self {
            Masking::Anonymizer => Mode::Anonymize,
            Masking::Pseudonymizer => Mode::Pseudonymize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pseudonymizer_flags() {
        let cli = Cli::parse_from([
            "redact",
            "Hej Martin",
            "-m",
            "pseudonymizer",
            "--masking-order",
            "CPR,NER",
            "--mask-numbers",
            "--epsilon",
            "0.5",
        ]);
        assert_eq!(cli.input.as_deref(), Some("Hej Martin"));
        assert_eq!(cli.masking.mode(), Mode::Pseudonymize);
        assert_eq!(cli.masking_order, Some(vec!["CPR".to_string(), "NER".to_string()]));
        assert_eq!(cli.epsilon, Some(0.5));
    }

    #[test]
    fn test_epsilon_requires_mask_numbers() {
        let result = Cli::try_parse_from(["redact", "x", "--epsilon", "1"]);
        assert!(result.is_err());
    }
}
