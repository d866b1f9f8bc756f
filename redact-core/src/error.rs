//! # Erros do Motor de Redação
//!
//! Três famílias de erro com tratamentos distintos:
//!
//! - **Configuração** (`UnknownMaskingKey`, `DuplicateMaskingKey`, `InvalidEpsilon`, ...):
//!   abortam a execução antes de qualquer documento ser processado.
//! - **Número inválido** (`NumberParse`): recuperado localmente, o token cai
//!   no placeholder da categoria NUM.
//! - **Falha de documento** (`Detector`, `Panic`, qualquer erro dentro de um documento):
//!   isolada na fronteira do documento; o slot de saída recebe um diagnóstico.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedactError {
    #[error("chave desconhecida em masking_order: {0}")]
    UnknownMaskingKey(String),

    #[error("chave repetida em masking_order: {0}")]
    DuplicateMaskingKey(String),

    #[error("epsilon deve ser um número finito maior que zero (recebido {0})")]
    InvalidEpsilon(f64),

    #[error("configuração inválida: {0}")]
    Config(String),

    #[error("número inválido: {0:?}")]
    NumberParse(String),

    #[error("detector {key} falhou: {message}")]
    Detector { key: String, message: String },

    #[error("pânico durante o processamento: {0}")]
    Panic(String),

    #[error("reconhecedor de entidades falhou: {0}")]
    Recognizer(String),

    #[error("falha ao criar pool de threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("erro de serialização: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RedactError {
    /// Erros que devem abortar a execução inteira antes do primeiro documento.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RedactError::UnknownMaskingKey(_)
                | RedactError::DuplicateMaskingKey(_)
                | RedactError::InvalidEpsilon(_)
                | RedactError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RedactError>;
