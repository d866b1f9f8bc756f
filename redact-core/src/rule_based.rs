//! # Reconhecedor por Regras — Gazetteers e Padrões
//!
//! Um [`EntityRecognizer`] sem modelo estatístico, para rodar o motor sem um
//! NER neural ou para reforçar entidades que o modelo erra. Combina:
//!
//! 1. **Gazetteers** de pessoas, locais, organizações e miscelânea (podem ter
//!    várias palavras; casam sem diferenciar maiúsculas, maiores primeiro).
//! 2. **Forma societária**: palavras capitalizadas seguidas de "A/S", "ApS",
//!    "I/S", "K/S", "P/S", "IVS" ou "amba" são ORG, sufixo incluído.
//! 3. **Títulos**: "hr.", "fru", "dr.", "direktør"... seguidos de palavras
//!    capitalizadas marcam essas palavras como PER.
//! 4. **Números** (opcional): tokens numéricos viram NUM.
//!
//! Cada token pertence a no máximo uma menção; as regras rodam na ordem acima.
//! O texto da menção é o trecho original entre o primeiro e o último token,
//! então "Novo  Nordisk" com dois espaços continua casando no masker.

use serde::{Deserialize, Serialize};

use crate::entity::{Document, EntityType, Mention};
use crate::error::Result;
use crate::recognizer::EntityRecognizer;
use crate::tokenizer::{tokenize, Token};

/// Listas de entidades conhecidas, no formato do arquivo JSON.
///
/// ```json
/// {"persons": ["Martin Jespersen"], "locations": ["Aarhus"], "organizations": ["Deloitte"]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GazetteerLists {
    #[serde(default)]
    pub persons: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub misc: Vec<String>,
}

/// Entrada de gazetteer: tokens em minúsculas e a categoria.
#[derive(Debug, Clone)]
struct Entry {
    parts: Vec<String>,
    entity_type: EntityType,
}

/// Limite de palavras capitalizadas capturadas após um título ou antes de um sufixo.
const MAX_NAME_WORDS: usize = 4;

const PERSON_TITLES: &[&str] = &[
    "hr.", "hr", "fru", "frk.", "frk", "dr.", "prof.", "professor", "direktør",
    "borgmester", "minister", "advokat", "læge", "sygeplejerske", "pastor",
];

const COMPANY_FORMS: &[&str] = &["A/S", "ApS", "I/S", "K/S", "P/S", "IVS", "amba"];

/// Reconhecedor baseado em gazetteers e padrões.
#[derive(Debug, Clone)]
pub struct GazetteerRecognizer {
    entries: Vec<Entry>,
    person_titles: Vec<String>,
    company_forms: Vec<Vec<String>>,
    detect_numbers: bool,
}

impl GazetteerRecognizer {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            person_titles: PERSON_TITLES.iter().map(|s| s.to_string()).collect(),
            company_forms: COMPANY_FORMS.iter().map(|s| lower_parts(s)).collect(),
            detect_numbers: false,
        }
    }

    pub fn from_lists(lists: &GazetteerLists) -> Self {
        let mut recognizer = Self::new();
        let groups = [
            (&lists.persons, EntityType::Person),
            (&lists.locations, EntityType::Location),
            (&lists.organizations, EntityType::Organization),
            (&lists.misc, EntityType::Misc),
        ];
        for (names, entity_type) in groups {
            for name in names {
                recognizer.add(name, entity_type);
            }
        }
        recognizer
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let lists: GazetteerLists = serde_json::from_str(json)?;
        Ok(Self::from_lists(&lists))
    }

    /// Marca tokens numéricos como NUM.
    pub fn with_numbers(mut self, detect_numbers: bool) -> Self {
        self.detect_numbers = detect_numbers;
        self
    }

    pub fn add(&mut self, name: &str, entity_type: EntityType) {
        let parts = lower_parts(name);
        if parts.is_empty() {
            return;
        }
        self.entries.push(Entry { parts, entity_type });
        // Mais tokens primeiro: "Martin Jespersen" antes de "Martin"
        self.entries.sort_by(|a, b| b.parts.len().cmp(&a.parts.len()));
    }

    pub fn add_person(&mut self, name: &str) {
        self.add(name, EntityType::Person);
    }

    pub fn add_location(&mut self, name: &str) {
        self.add(name, EntityType::Location);
    }

    pub fn add_org(&mut self, name: &str) {
        self.add(name, EntityType::Organization);
    }

    pub fn add_misc(&mut self, name: &str) {
        self.add(name, EntityType::Misc);
    }

    /// Aplica todas as regras a um texto.
    pub fn find(&self, text: &str) -> Vec<Mention> {
        let tokens = tokenize(text);
        let lower: Vec<String> = tokens.iter().map(|t| t.text.to_lowercase()).collect();
        let mut claimed = vec![false; tokens.len()];
        let mut mentions = Vec::new();

        let mut emit = |claimed: &mut Vec<bool>, from: usize, to: usize, entity_type: EntityType| {
            claimed[from..to].iter_mut().for_each(|c| *c = true);
            let span = &text[tokens[from].start..tokens[to - 1].end];
            mentions.push(Mention::new(span, entity_type));
        };

        // 1. Gazetteers (n-gramas)
        let mut i = 0;
        while i < tokens.len() {
            let hit = self.entries.iter().find(|entry| {
                let n = entry.parts.len();
                i + n <= tokens.len()
                    && !claimed[i..i + n].iter().any(|c| *c)
                    && lower[i..i + n] == entry.parts[..]
            });
            match hit {
                Some(entry) => {
                    let n = entry.parts.len();
                    emit(&mut claimed, i, i + n, entry.entity_type);
                    i += n;
                }
                None => i += 1,
            }
        }

        // 2. Forma societária: "Novo Nordisk A/S" → ORG
        for form in &self.company_forms {
            let n = form.len();
            let mut i = 1;
            while i + n <= tokens.len() {
                let is_form = lower[i..i + n] == form[..] && !claimed[i..i + n].iter().any(|c| *c);
                let run = if is_form { name_run_before(&tokens, &claimed, i) } else { 0 };
                if run > 0 {
                    emit(&mut claimed, i - run, i + n, EntityType::Organization);
                    i += n;
                } else {
                    i += 1;
                }
            }
        }

        // 3. Títulos: "hr. Jensen" → PER
        for i in 0..tokens.len() {
            if claimed[i] || !self.person_titles.contains(&lower[i]) {
                continue;
            }
            let run = name_run_after(&tokens, &claimed, i + 1);
            if run > 0 {
                emit(&mut claimed, i + 1, i + 1 + run, EntityType::Person);
            }
        }

        // 4. Números
        if self.detect_numbers {
            for i in 0..tokens.len() {
                if !claimed[i] && tokens[i].is_numeric() {
                    emit(&mut claimed, i, i + 1, EntityType::Number);
                }
            }
        }

        mentions
    }
}

impl Default for GazetteerRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRecognizer for GazetteerRecognizer {
    fn recognize(&self, batch: &[Document]) -> Result<Vec<Vec<Mention>>> {
        Ok(batch.iter().map(|doc| self.find(&doc.text)).collect())
    }

    fn name(&self) -> &str {
        "gazetteer"
    }
}

fn lower_parts(name: &str) -> Vec<String> {
    tokenize(name).into_iter().map(|t| t.text.to_lowercase()).collect()
}

fn is_name_word(token: &Token) -> bool {
    token.starts_uppercase() && token.text.chars().all(|c| c.is_alphabetic() || c == '-')
}

/// Quantas palavras capitalizadas livres terminam logo antes de `end`.
fn name_run_before(tokens: &[Token], claimed: &[bool], end: usize) -> usize {
    (0..end)
        .rev()
        .take(MAX_NAME_WORDS)
        .take_while(|&j| !claimed[j] && is_name_word(&tokens[j]))
        .count()
}

/// Quantas palavras capitalizadas livres começam em `start`.
fn name_run_after(tokens: &[Token], claimed: &[bool], start: usize) -> usize {
    (start..tokens.len())
        .take(MAX_NAME_WORDS)
        .take_while(|&j| !claimed[j] && is_name_word(&tokens[j]))
        .count()
}
