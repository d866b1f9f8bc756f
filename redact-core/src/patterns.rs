//! # Detectores Estruturais — CPR, Telefone e Email
//!
//! Funções puras `texto → conjunto de trechos` baseadas em expressões regulares.
//! Complementam o NER: padrões bem definidos não precisam de modelo estatístico.
//!
//! A validação é apenas sintática. O CPR exige 0–3 no primeiro dígito do dia e
//! 0–1 no primeiro dígito do mês, sem checar o calendário. O telefone aceita uma
//! lista fechada de agrupamentos dinamarqueses, e qualquer sequência de 8 dígitos
//! é aceita como telefone (falso positivo conhecido).
//!
//! Os detectores devolvem conjuntos: a ordem dos achados não tem significado.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::entity::EntityType;
use crate::error::{RedactError, Result};

static RE_CPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-3]\d[0-1]\d{3}-\d{4}|[0-3]\d[0-1]\d{3} \d{4}").expect("regex de CPR válida")
});

// A ordem das alternativas importa: o regex tenta da esquerda para a direita.
static RE_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    let layouts = [
        r"\+\d{10}",
        r"\+\d{4} \d{2} \d{2} \d{2}",
        r"\+\d{2} \d{8}",
        r"\+\d{2} \d{2} \d{2} \d{2} \d{2}",
        r"\+\d{2} \d{4} \d{4}",
        r"\d{2} \d{4} \d{4}",
        r"\d{2} \d{4}-\d{4}",
        r"\d{8}",
        r"\d{4} \d{4}",
        r"\d{4}-\d{4}",
        r"\d{2} \d{2} \d{2} \d{2}",
    ];
    Regex::new(&layouts.join("|")).expect("regex de telefone válida")
});

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w.-]+@[\w.-]+(?:\.\w+)+").expect("regex de email válida")
});

fn find_all(re: &Regex, text: &str) -> HashSet<String> {
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Encontra números CPR (`DDMMAA-NNNN` ou `DDMMAA NNNN`).
pub fn find_id_numbers(text: &str) -> HashSet<String> {
    find_all(&RE_CPR, text)
}

/// Encontra números de telefone nos formatos dinamarqueses suportados.
pub fn find_phone_numbers(text: &str) -> HashSet<String> {
    find_all(&RE_PHONE, text)
}

/// Encontra endereços de email, aceitando domínios de vários níveis.
pub fn find_emails(text: &str) -> HashSet<String> {
    find_all(&RE_EMAIL, text)
}

/// Detector embutido para uma categoria estrutural.
pub fn builtin_detector(entity_type: EntityType) -> Option<fn(&str) -> HashSet<String>> {
    match entity_type {
        EntityType::IdNumber => Some(find_id_numbers),
        EntityType::Phone => Some(find_phone_numbers),
        EntityType::Email => Some(find_emails),
        _ => None,
    }
}

/// Um detector de menções plugável.
///
/// Implementado automaticamente para closures, então um detector customizado é
/// só `|text: &str| Ok(conjunto)`. Um `Err` derruba apenas o documento atual.
pub trait Detector: Send + Sync {
    fn detect(&self, text: &str) -> Result<HashSet<String>>;
}

impl<F> Detector for F
where
    F: Fn(&str) -> Result<HashSet<String>> + Send + Sync,
{
    fn detect(&self, text: &str) -> Result<HashSet<String>> {
        self(text)
    }
}

/// Detector customizado registrado sob uma chave de `masking_order`.
#[derive(Clone)]
pub struct CustomDetector {
    /// Categoria cujo placeholder substitui os achados
    pub entity_type: EntityType,
    pub detector: Arc<dyn Detector>,
}

/// Registro de detectores customizados.
///
/// Um detector registrado com uma chave embutida ("CPR", "TELEFON", "EMAIL")
/// substitui o detector padrão daquela chave.
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    custom: HashMap<String, CustomDetector>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        entity_type: EntityType,
        detector: impl Detector + 'static,
    ) -> &mut Self {
        self.custom.insert(
            key.into(),
            CustomDetector {
                entity_type,
                detector: Arc::new(detector),
            },
        );
        self
    }

    pub fn get(&self, key: &str) -> Option<&CustomDetector> {
        self.custom.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.custom.contains_key(key)
    }

    /// Executa o detector customizado `key`, anotando a chave no erro.
    pub fn run(&self, key: &str, text: &str) -> Result<HashSet<String>> {
        let custom = self
            .custom
            .get(key)
            .ok_or_else(|| RedactError::UnknownMaskingKey(key.to_string()))?;
        custom.detector.detect(text).map_err(|e| match e {
            RedactError::Detector { .. } => e,
            other => RedactError::Detector {
                key: key.to_string(),
                message: other.to_string(),
            },
        })
    }
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.custom.keys().collect();
        keys.sort();
        f.debug_struct("DetectorRegistry").field("custom", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cpr_both_forms() {
        let found = find_id_numbers("mit CPR nr er 010203-2010 eller 311299 1234");
        assert_eq!(found, set(&["010203-2010", "311299 1234"]));
    }

    #[test]
    fn test_cpr_loose_date_filter() {
        // Dia começando com 4 e mês começando com 2 não passam no filtro
        assert!(find_id_numbers("412345-6789").is_empty());
        assert!(find_id_numbers("012345-6789").is_empty());
    }

    #[test]
    fn test_phone_layouts() {
        let text = "ring +4545454545 eller 12 34 56 78 eller +45 1234 5678";
        let found = find_phone_numbers(text);
        assert!(found.contains("+4545454545"));
        assert!(found.contains("12 34 56 78"));
        assert!(found.contains("+45 1234 5678"));
    }

    #[test]
    fn test_phone_accepts_bare_eight_digits() {
        assert_eq!(find_phone_numbers("kode 87654321"), set(&["87654321"]));
    }

    #[test]
    fn test_email_multi_level_domain() {
        let found = find_emails("skriv til martin.martin@mail.gmail.co.uk. tak");
        assert_eq!(found, set(&["martin.martin@mail.gmail.co.uk"]));
    }

    #[test]
    fn test_detectors_deduplicate() {
        let found = find_emails("a@b.dk og a@b.dk");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_builtin_lookup() {
        assert!(builtin_detector(EntityType::IdNumber).is_some());
        assert!(builtin_detector(EntityType::Person).is_none());
    }

    #[test]
    fn test_registry_wraps_errors_with_key() {
        let mut registry = DetectorRegistry::new();
        registry.register("KONTO", EntityType::Misc, |_: &str| -> Result<HashSet<String>> {
            Err(RedactError::Config("sem acesso".into()))
        });
        let err = registry.run("KONTO", "qualquer").unwrap_err();
        assert!(err.to_string().contains("KONTO"));
        assert!(err.to_string().contains("sem acesso"));
    }
}
