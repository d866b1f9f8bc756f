//! # Resolução de Indivíduos
//!
//! Agrupa as menções de um documento em "indivíduos" numerados: o mesmo número
//! significa o mesmo referente. É o que permite a pseudonimização trocar
//! "Martin Jespersen" e "Martin" pelo mesmo "Person 1".
//!
//! ## Heurística
//!
//! É lexical, não é correferência. Uma menção entra no primeiro indivíduo (por
//! id crescente) que já tenha, **na mesma categoria**, uma menção que a contenha
//! ou que esteja contida nela, ignorando maiúsculas. Sem match, nasce um novo
//! indivíduo com o próximo id.
//!
//! Pessoas são resolvidas primeiro (são a âncora de identidade); depois vêm as
//! demais categorias em ordem fixa. Dentro de cada categoria as menções maiores
//! vêm antes, para que "Martin Jespersen" exista antes de "Martin" procurar dono.
//!
//! Nomes curtos contidos em nomes diferentes ("Ann" em "Hanne") são unidos
//! indevidamente. É uma limitação conhecida da regra.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;

/// Ordem de resolução: pessoa primeiro, as demais por chave curta.
pub const RESOLUTION_ORDER: [EntityType; 8] = [
    EntityType::Person,
    EntityType::IdNumber,
    EntityType::Email,
    EntityType::Location,
    EntityType::Misc,
    EntityType::Number,
    EntityType::Organization,
    EntityType::Phone,
];

/// Menções de um documento agrupadas por categoria.
pub type MentionsByType = BTreeMap<EntityType, BTreeSet<String>>;

/// Um indivíduo: menções por categoria.
pub type Individual = BTreeMap<EntityType, BTreeSet<String>>;

/// Tabela de indivíduos de um documento, indexada por id (>= 1).
///
/// Serializa como `{"1": {"PER": ["Martin"], "CPR": ["010203-2010"]}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndividualTable {
    individuals: BTreeMap<usize, Individual>,
}

impl IndividualTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tabela semeada com um único indivíduo (id 1).
    ///
    /// É o formato dos indivíduos pré-definidos no modo anônimo, onde só
    /// importam as menções por categoria.
    pub fn from_mentions(mentions: MentionsByType) -> Self {
        let mut table = Self::new();
        if !mentions.is_empty() {
            table.individuals.insert(1, mentions);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Individual> {
        self.individuals.get(&id)
    }

    /// Indivíduos em ordem crescente de id.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Individual)> {
        self.individuals.iter().map(|(id, ind)| (*id, ind))
    }

    /// Próximo id livre: maior id + 1, ou 1 numa tabela vazia.
    pub fn next_id(&self) -> usize {
        self.individuals.keys().next_back().map_or(1, |max| max + 1)
    }

    /// Insere uma menção diretamente num indivíduo (criando-o se preciso).
    pub fn insert(&mut self, id: usize, entity_type: EntityType, mention: impl Into<String>) {
        self.individuals
            .entry(id)
            .or_default()
            .entry(entity_type)
            .or_default()
            .insert(mention.into());
    }

    /// Quantos indivíduos têm ao menos uma menção da categoria.
    pub fn count_with(&self, entity_type: EntityType) -> usize {
        self.individuals
            .values()
            .filter(|ind| ind.get(&entity_type).is_some_and(|m| !m.is_empty()))
            .count()
    }

    /// União das menções de todos os indivíduos, por categoria.
    pub fn flatten(&self) -> MentionsByType {
        let mut flat = MentionsByType::new();
        for individual in self.individuals.values() {
            for (entity_type, mentions) in individual {
                flat.entry(*entity_type)
                    .or_default()
                    .extend(mentions.iter().cloned());
            }
        }
        flat
    }

    /// Incorpora as menções de um documento aos indivíduos existentes.
    pub fn resolve(&mut self, all_mentions: &MentionsByType) {
        for entity_type in RESOLUTION_ORDER {
            let Some(mentions) = all_mentions.get(&entity_type) else {
                continue;
            };
            let mut ordered: Vec<&String> = mentions.iter().filter(|m| !m.trim().is_empty()).collect();
            // Estável sobre o BTreeSet: empates ficam em ordem lexicográfica
            ordered.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

            for mention in ordered {
                self.assign(entity_type, mention);
            }
        }
    }

    /// Coloca `mention` no primeiro indivíduo compatível ou num novo.
    fn assign(&mut self, entity_type: EntityType, mention: &str) -> usize {
        let key = comparison_key(entity_type, mention);

        let owner = self.individuals.iter().find_map(|(id, individual)| {
            let known = individual.get(&entity_type)?;
            known
                .iter()
                .any(|existing| {
                    let other = comparison_key(entity_type, existing);
                    other.contains(&key) || key.contains(&other)
                })
                .then_some(*id)
        });

        let id = owner.unwrap_or_else(|| self.next_id());
        self.insert(id, entity_type, mention);
        id
    }
}

impl From<BTreeMap<usize, Individual>> for IndividualTable {
    fn from(individuals: BTreeMap<usize, Individual>) -> Self {
        Self { individuals }
    }
}

/// Chave de comparação: minúsculas; para pessoas, "Sobrenome, Nome" vira
/// "Nome Sobrenome".
fn comparison_key(entity_type: EntityType, mention: &str) -> String {
    let lower = mention.trim().to_lowercase();
    if entity_type != EntityType::Person {
        return lower;
    }
    match lower.split_once(',') {
        Some((surname, given)) if !given.contains(',') && !given.trim().is_empty() => {
            format!("{} {}", given.trim(), surname.trim())
        }
        _ => lower,
    }
}
