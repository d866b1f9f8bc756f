//! # Tipos de Entidade e Menções
//!
//! Define o vocabulário de categorias que o motor sabe mascarar.
//!
//! ## Categorias
//!
//! | Chave    | Significado              | Exemplos                          |
//! |----------|--------------------------|-----------------------------------|
//! | PER      | Pessoa                   | Martin Jespersen, Kristina        |
//! | LOC      | Local/Geográfico         | Danmark, Aarhus                   |
//! | ORG      | Organização              | Deloitte, Novo Nordisk            |
//! | MISC     | Miscelânea               | eventos, títulos, religião        |
//! | CPR      | Número CPR dinamarquês   | 010203-2010                       |
//! | TELEFON  | Telefone                 | +4545454545, 45 45 45 45          |
//! | EMAIL    | Endereço de email        | martin.martin@gmail.com           |
//! | NUM      | Número genérico          | 20, 1.000,50                      |
//!
//! As chaves curtas são as mesmas usadas em `masking_order` e no JSON de
//! indivíduos pré-definidos.

use serde::{Deserialize, Serialize};

/// Categoria de uma menção sensível.
///
/// O conjunto é fechado: chaves desconhecidas são rejeitadas na validação da
/// configuração, nunca no meio do processamento de um documento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// **Pessoa**: âncora de identidade na resolução de indivíduos.
    #[serde(rename = "PER")]
    Person,
    /// **Localização**: países, cidades, ruas.
    #[serde(rename = "LOC")]
    Location,
    /// **Organização**: empresas, instituições, órgãos públicos.
    #[serde(rename = "ORG")]
    Organization,
    /// **Miscelânea**: o que o NER marca como MISC (só com `mask_misc`).
    #[serde(rename = "MISC")]
    Misc,
    /// **CPR**: número de identificação pessoal (6+4 dígitos).
    #[serde(rename = "CPR")]
    IdNumber,
    /// **Telefone**: formatos dinamarqueses de 8 dígitos.
    #[serde(rename = "TELEFON")]
    Phone,
    /// **Email**: `local@dominio.tld`.
    #[serde(rename = "EMAIL")]
    Email,
    /// **Número**: tokens numéricos (só com `mask_numbers`).
    #[serde(rename = "NUM")]
    Number,
}

impl EntityType {
    /// Todas as categorias, na ordem de declaração.
    pub const ALL: [EntityType; 8] = [
        EntityType::Person,
        EntityType::Location,
        EntityType::Organization,
        EntityType::Misc,
        EntityType::IdNumber,
        EntityType::Phone,
        EntityType::Email,
        EntityType::Number,
    ];

    /// Chave curta usada em configuração e serialização (ex: "PER")
    pub fn key(&self) -> &'static str {
        match self {
            EntityType::Person => "PER",
            EntityType::Location => "LOC",
            EntityType::Organization => "ORG",
            EntityType::Misc => "MISC",
            EntityType::IdNumber => "CPR",
            EntityType::Phone => "TELEFON",
            EntityType::Email => "EMAIL",
            EntityType::Number => "NUM",
        }
    }

    /// Tenta parsear a partir da chave curta (ex: "CPR" → Some(IdNumber))
    pub fn from_key(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.key() == s)
    }

    /// Categorias com detector estrutural embutido (regex).
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            EntityType::IdNumber | EntityType::Phone | EntityType::Email
        )
    }

    /// Menções de até 2 caracteres destas categorias geram falsos positivos
    /// demais e são descartadas. Números curtos ("20") continuam válidos.
    pub fn rejects_short_mentions(&self) -> bool {
        !matches!(self, EntityType::Misc | EntityType::Number)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Um trecho do texto que referencia uma entidade sensível.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mention {
    /// Texto exato como aparece no documento
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

impl Mention {
    pub fn new(text: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            text: text.into(),
            entity_type,
        }
    }
}

/// Um documento do corpus com sua posição estável.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub index: usize,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip() {
        for t in EntityType::ALL {
            assert_eq!(EntityType::from_key(t.key()), Some(t));
        }
        assert_eq!(EntityType::from_key("NER"), None);
        assert_eq!(EntityType::from_key("per"), None);
    }

    #[test]
    fn test_serde_uses_short_keys() {
        let json = serde_json::to_string(&EntityType::Phone).unwrap();
        assert_eq!(json, "\"TELEFON\"");
        let parsed: EntityType = serde_json::from_str("\"CPR\"").unwrap();
        assert_eq!(parsed, EntityType::IdNumber);
    }

    #[test]
    fn test_short_mention_policy() {
        assert!(EntityType::Person.rejects_short_mentions());
        assert!(EntityType::Email.rejects_short_mentions());
        assert!(!EntityType::Number.rejects_short_mentions());
    }
}
