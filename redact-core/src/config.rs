//! # Configuração da Redação
//!
//! `RedactionConfig` é imutável depois de validada e é compartilhada (somente
//! leitura) por todos os workers. Todo estado mutável de um documento nasce e
//! morre dentro do processamento daquele documento.
//!
//! A validação acontece uma vez, antes do primeiro documento: chaves
//! desconhecidas ou repetidas em `masking_order` e epsilon inválido abortam a
//! execução inteira.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::error::{RedactError, Result};
use crate::individual::IndividualTable;
use crate::patterns::DetectorRegistry;

/// Chave de `masking_order` que dispara o reconhecedor de entidades.
pub const NER_KEY: &str = "NER";

/// Placeholder único do modo de supressão.
pub const SUPPRESSION_PLACEHOLDER: &str = "XXX";

/// Anonimização descarta a identidade; pseudonimização a preserva com ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Anonymize,
    Pseudonymize,
}

fn default_masking_order() -> Vec<String> {
    ["CPR", "TELEFON", "EMAIL", NER_KEY]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_batch_size() -> usize {
    8
}

/// Opções reconhecidas pelo motor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    #[serde(default)]
    pub mode: Mode,
    /// Ordem dos passos: chaves de detectores e/ou "NER", sem repetição
    #[serde(default = "default_masking_order")]
    pub masking_order: Vec<String>,
    /// Inclui MISC nas categorias do NER
    #[serde(default)]
    pub mask_misc: bool,
    /// Inclui NUM nas categorias do NER
    #[serde(default)]
    pub mask_numbers: bool,
    /// Com valor, números recebem ruído de Laplace em vez de placeholder
    #[serde(default)]
    pub epsilon: Option<f64>,
    /// Todos os placeholders viram "XXX"
    #[serde(default)]
    pub suppression: bool,
    /// Documentos por chamada ao reconhecedor de entidades
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Threads do pool de processamento (padrão: todas)
    #[serde(default)]
    pub n_process: Option<usize>,
    /// Indivíduos conhecidos por índice de documento
    #[serde(default)]
    pub prior_individuals: BTreeMap<usize, IndividualTable>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Anonymize,
            masking_order: default_masking_order(),
            mask_misc: false,
            mask_numbers: false,
            epsilon: None,
            suppression: false,
            batch_size: default_batch_size(),
            n_process: None,
            prior_individuals: BTreeMap::new(),
        }
    }
}

impl RedactionConfig {
    pub fn anonymize() -> Self {
        Self::default()
    }

    pub fn pseudonymize() -> Self {
        Self {
            mode: Mode::Pseudonymize,
            ..Self::default()
        }
    }

    pub fn with_masking_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.masking_order = order.into_iter().map(Into::into).collect();
        self
    }

    /// Categorias que o passo NER mascara, na ordem em que são aplicadas.
    pub fn ner_types(&self) -> Vec<EntityType> {
        let mut types = vec![EntityType::Person, EntityType::Location, EntityType::Organization];
        if self.mask_misc {
            types.push(EntityType::Misc);
        }
        if self.mask_numbers {
            types.push(EntityType::Number);
        }
        types
    }

    /// Epsilon efetivo: só vale quando números são mascarados.
    pub fn noise_epsilon(&self) -> Option<f64> {
        if self.mask_numbers {
            self.epsilon
        } else {
            None
        }
    }

    /// Valida opções e resolve `masking_order` em passos tipados.
    pub fn validate(&self, registry: &DetectorRegistry) -> Result<Vec<MaskStep>> {
        if let Some(epsilon) = self.epsilon {
            if !epsilon.is_finite() || epsilon <= 0.0 {
                return Err(RedactError::InvalidEpsilon(epsilon));
            }
        }
        if self.batch_size == 0 {
            return Err(RedactError::Config("batch_size deve ser maior que zero".into()));
        }
        if self.n_process == Some(0) {
            return Err(RedactError::Config("n_process deve ser maior que zero".into()));
        }

        let mut seen = HashSet::new();
        self.masking_order
            .iter()
            .map(|key| {
                if !seen.insert(key.as_str()) {
                    return Err(RedactError::DuplicateMaskingKey(key.clone()));
                }
                MaskStep::parse(key, registry)
            })
            .collect()
    }
}

/// Um passo de `masking_order` já validado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskStep {
    /// Detector regex embutido (CPR, TELEFON, EMAIL)
    Builtin(EntityType),
    /// Detector registrado pelo chamador sob esta chave
    Custom { key: String, entity_type: EntityType },
    /// Entidades do reconhecedor externo
    Ner,
}

impl MaskStep {
    /// Resolve uma chave. Detectores customizados têm precedência sobre os
    /// embutidos de mesma chave.
    pub fn parse(key: &str, registry: &DetectorRegistry) -> Result<Self> {
        if key == NER_KEY {
            return Ok(MaskStep::Ner);
        }
        if let Some(custom) = registry.get(key) {
            return Ok(MaskStep::Custom {
                key: key.to_string(),
                entity_type: custom.entity_type,
            });
        }
        match EntityType::from_key(key) {
            Some(t) if t.is_structured() => Ok(MaskStep::Builtin(t)),
            _ => Err(RedactError::UnknownMaskingKey(key.to_string())),
        }
    }

    /// Categorias que este passo mascara.
    pub fn entity_types(&self, config: &RedactionConfig) -> Vec<EntityType> {
        match self {
            MaskStep::Builtin(t) => vec![*t],
            MaskStep::Custom { entity_type, .. } => vec![*entity_type],
            MaskStep::Ner => config.ner_types(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            MaskStep::Builtin(t) => t.key().to_string(),
            MaskStep::Custom { key, .. } => key.clone(),
            MaskStep::Ner => NER_KEY.to_string(),
        }
    }
}

/// Texto de substituição por categoria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderMapping {
    placeholders: BTreeMap<EntityType, String>,
}

impl PlaceholderMapping {
    pub fn for_mode(mode: Mode) -> Self {
        let entries: [(EntityType, &str); 8] = match mode {
            Mode::Anonymize => [
                (EntityType::Person, "[PERSON]"),
                (EntityType::Location, "[LOKATION]"),
                (EntityType::Organization, "[ORGANISATION]"),
                (EntityType::Misc, "[DIVERSE]"),
                (EntityType::IdNumber, "[CPR]"),
                (EntityType::Phone, "[TELEFON]"),
                (EntityType::Email, "[EMAIL]"),
                (EntityType::Number, "[NUMMER]"),
            ],
            Mode::Pseudonymize => [
                (EntityType::Person, "Person"),
                (EntityType::Location, "Lokation"),
                (EntityType::Organization, "Organisation"),
                (EntityType::Misc, "Diverse"),
                (EntityType::IdNumber, "CPR"),
                (EntityType::Phone, "Telefon"),
                (EntityType::Email, "Email"),
                (EntityType::Number, "Nummer"),
            ],
        };
        Self {
            placeholders: entries
                .into_iter()
                .map(|(t, p)| (t, p.to_string()))
                .collect(),
        }
    }

    pub fn from_config(config: &RedactionConfig) -> Self {
        let mapping = Self::for_mode(config.mode);
        if config.suppression {
            mapping.suppressed()
        } else {
            mapping
        }
    }

    /// Colapsa todos os placeholders no sentinela de supressão.
    pub fn suppressed(mut self) -> Self {
        for placeholder in self.placeholders.values_mut() {
            *placeholder = SUPPRESSION_PLACEHOLDER.to_string();
        }
        self
    }

    pub fn get(&self, entity_type: EntityType) -> &str {
        self.placeholders
            .get(&entity_type)
            .map(String::as_str)
            .unwrap_or(SUPPRESSION_PLACEHOLDER)
    }
}
