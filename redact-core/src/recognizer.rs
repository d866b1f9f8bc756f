//! # Reconhecedor de Entidades (colaborador externo)
//!
//! O motor não treina nem carrega modelos: ele só consome pares
//! `(trecho, categoria)` por documento. Qualquer backend (modelo neural, regras,
//! anotações manuais) entra implementando [`EntityRecognizer`].
//!
//! O orquestrador chama `recognize` em lotes de `batch_size` documentos e
//! espera um resultado completo por documento, na mesma ordem do lote.

use std::collections::HashMap;

use crate::entity::{Document, EntityType, Mention};
use crate::error::{RedactError, Result};

/// Um reconhecedor de entidades nomeadas.
///
/// `recognize` deve devolver exatamente um vetor de menções por documento do
/// lote. Um erro aqui aborta a execução (o lote inteiro ficaria sem NER).
pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, batch: &[Document]) -> Result<Vec<Vec<Mention>>>;

    /// Nome exibido nos logs.
    fn name(&self) -> &str {
        "ner"
    }
}

/// Reconhecedor que nunca encontra nada. Útil quando só os detectores
/// estruturais interessam.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecognizer;

impl EntityRecognizer for NoopRecognizer {
    fn recognize(&self, batch: &[Document]) -> Result<Vec<Vec<Mention>>> {
        Ok(vec![Vec::new(); batch.len()])
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Menções fornecidas pelo chamador, indexadas pela posição do documento.
///
/// Permite plugar a saída de um NER que roda fora do processo.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedRecognizer {
    mentions: HashMap<usize, Vec<Mention>>,
}

impl PrecomputedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona uma menção ao documento `index`.
    pub fn with(mut self, index: usize, text: impl Into<String>, entity_type: EntityType) -> Self {
        self.add(index, Mention::new(text, entity_type));
        self
    }

    pub fn add(&mut self, index: usize, mention: Mention) {
        self.mentions.entry(index).or_default().push(mention);
    }

    /// Carrega de JSON no formato `{"0": [{"text": "Martin", "type": "PER"}]}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mentions: HashMap<usize, Vec<Mention>> = serde_json::from_str(json)?;
        Ok(Self { mentions })
    }
}

impl EntityRecognizer for PrecomputedRecognizer {
    fn recognize(&self, batch: &[Document]) -> Result<Vec<Vec<Mention>>> {
        Ok(batch
            .iter()
            .map(|doc| self.mentions.get(&doc.index).cloned().unwrap_or_default())
            .collect())
    }

    fn name(&self) -> &str {
        "precomputed"
    }
}

/// Garante o contrato de um resultado por documento.
pub(crate) fn check_batch_len(name: &str, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(RedactError::Recognizer(format!(
            "{} devolveu {} resultados para um lote de {} documentos",
            name, got, expected
        )))
    }
}
