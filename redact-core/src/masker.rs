//! # Mascaramento com Fronteira Segura
//!
//! Substitui menções no texto sem corromper palavras vizinhas:
//!
//! 1. **Fronteira**: uma ocorrência só é substituída se o caractere logo antes e
//!    logo depois não for alfanumérico (inclui æ, ø, å). "Jensen" nunca toca
//!    em "Jensenius".
//! 2. **Maior primeiro**: menções são ordenadas por tamanho decrescente e cada
//!    trecho do texto só pode ser reivindicado uma vez. "Martin Jespersen" é
//!    substituído inteiro antes de "Martin" ser considerado, então não sobra
//!    um " Jespersen" órfão.
//! 3. **Uma passada**: todas as ocorrências são localizadas no texto original e
//!    a saída é montada de uma vez, então uma substituição nunca é reprocessada.

use rand::Rng;

use crate::entity::EntityType;
use crate::number::noised_token;

/// O que entra no lugar de uma ocorrência.
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    /// Texto fixo (placeholder + sufixo)
    Fixed(String),
    /// Ruído de Laplace por ocorrência; tokens inválidos usam `fallback`
    Noised { epsilon: f64, fallback: String },
}

/// Uma menção já normalizada, pronta para ser aplicada.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskTarget {
    pub mention: String,
    pub entity_type: EntityType,
    pub replacement: Replacement,
}

impl MaskTarget {
    /// `None` quando a menção é descartada por [`prepare_mention`].
    pub fn new(raw: &str, entity_type: EntityType, replacement: Replacement) -> Option<Self> {
        prepare_mention(raw, entity_type).map(|mention| Self {
            mention,
            entity_type,
            replacement,
        })
    }
}

/// Normaliza uma menção bruta ou a descarta.
///
/// Remove espaços nas pontas; para PER remove pontos finais ("Jespersen." de
/// nomes abreviados). Menções vazias são descartadas, assim como menções de até
/// 2 caracteres das categorias sensíveis a falso positivo.
pub fn prepare_mention(raw: &str, entity_type: EntityType) -> Option<String> {
    let mut mention = raw.trim();
    if entity_type == EntityType::Person {
        mention = mention.trim_end_matches('.').trim_end();
    }
    if mention.is_empty() {
        return None;
    }
    if entity_type.rejects_short_mentions() && mention.chars().count() <= 2 {
        return None;
    }
    Some(mention.to_string())
}

fn is_boundary(c: Option<char>) -> bool {
    c.map_or(true, |c| !c.is_alphanumeric())
}

/// Uma ocorrência reivindicada: intervalo de bytes e índice do alvo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Claim {
    start: usize,
    end: usize,
    target: usize,
}

/// Localiza as ocorrências seguras de cada alvo, respeitando a ordem dada.
///
/// Todas as buscas são feitas no texto original, então um id recém-inserido
/// ("Person 1") nunca é visto como número.
fn find_claims(text: &str, targets: &[MaskTarget]) -> Vec<Claim> {
    let mut claimed = vec![false; text.len()];
    let mut claims: Vec<Claim> = Vec::new();

    for (idx, target) in targets.iter().enumerate() {
        for (start, found) in text.match_indices(target.mention.as_str()) {
            let end = start + found.len();
            if !is_boundary(text[..start].chars().next_back()) || !is_boundary(text[end..].chars().next()) {
                continue;
            }
            if claimed[start..end].iter().any(|c| *c) {
                continue;
            }
            claimed[start..end].iter_mut().for_each(|c| *c = true);
            claims.push(Claim {
                start,
                end,
                target: idx,
            });
        }
    }

    claims.sort_by_key(|c| c.start);
    claims
}

/// Monta a saída trocando cada ocorrência pelo que `render` devolver.
fn splice(
    text: &str,
    mut targets: Vec<MaskTarget>,
    mut render: impl FnMut(&MaskTarget, &str) -> String,
) -> String {
    if targets.is_empty() {
        return text.to_string();
    }
    targets.sort_by(|a, b| b.mention.chars().count().cmp(&a.mention.chars().count()));

    let claims = find_claims(text, &targets);
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;

    for claim in claims {
        output.push_str(&text[cursor..claim.start]);
        output.push_str(&render(&targets[claim.target], &text[claim.start..claim.end]));
        cursor = claim.end;
    }
    output.push_str(&text[cursor..]);
    output
}

/// Aplica uma lista de alvos ao texto.
///
/// Os alvos são reordenados por tamanho decrescente (ordenação estável: em
/// empates vale a ordem recebida).
pub fn apply_targets<R: Rng + ?Sized>(text: &str, targets: Vec<MaskTarget>, rng: &mut R) -> String {
    splice(text, targets, |target, found| match &target.replacement {
        Replacement::Fixed(replacement) => replacement.clone(),
        Replacement::Noised { epsilon, fallback } => {
            noised_token(found, *epsilon, rng).unwrap_or_else(|| fallback.clone())
        }
    })
}

/// Máscara de um conjunto de menções de uma mesma categoria.
///
/// Cada ocorrência segura vira `placeholder + suffix`. No modo anônimo o
/// sufixo é vazio; no pseudônimo é `" <id>"`.
pub fn mask<I, S>(text: &str, mentions: I, entity_type: EntityType, placeholder: &str, suffix: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let replacement = format!("{}{}", placeholder, suffix);
    let targets = sorted_targets(mentions, entity_type, || Replacement::Fixed(replacement.clone()));
    splice(text, targets, |_, _| replacement.clone())
}

/// Como [`mask`], mas cada número recebe ruído de Laplace independente.
pub fn mask_noisy<I, S, R>(
    text: &str,
    mentions: I,
    epsilon: f64,
    placeholder: &str,
    suffix: &str,
    rng: &mut R,
) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    R: Rng + ?Sized,
{
    let fallback = format!("{}{}", placeholder, suffix);
    let targets = sorted_targets(mentions, EntityType::Number, || Replacement::Noised {
        epsilon,
        fallback: fallback.clone(),
    });
    apply_targets(text, targets, rng)
}

/// Deduplica e ordena lexicograficamente, para empates consistentes.
fn sorted_targets<I, S>(mentions: I, entity_type: EntityType, replacement: impl Fn() -> Replacement) -> Vec<MaskTarget>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: std::collections::BTreeSet<String> = mentions
        .into_iter()
        .filter_map(|m| prepare_mention(m.as_ref(), entity_type))
        .collect();
    unique
        .into_iter()
        .map(|mention| MaskTarget {
            mention,
            entity_type,
            replacement: replacement(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_boundary_blocks_subwords() {
        let out = mask("Jensenius mødte Jensen.", ["Jensen"], EntityType::Person, "[PERSON]", "");
        assert_eq!(out, "Jensenius mødte [PERSON].");
    }

    #[test]
    fn test_boundary_with_danish_letters() {
        let out = mask("Sørensen og Søren", ["Søren"], EntityType::Person, "[PERSON]", "");
        assert_eq!(out, "Sørensen og [PERSON]");
        let out = mask("Århusgade i Århus", ["Århus"], EntityType::Location, "[LOKATION]", "");
        assert_eq!(out, "Århusgade i [LOKATION]");
    }

    #[test]
    fn test_longest_match_first() {
        let text = "Martin Jespersen kom. Martin gik.";
        let out = mask(text, ["Martin", "Martin Jespersen"], EntityType::Person, "Person", " 1");
        assert_eq!(out, "Person 1 kom. Person 1 gik.");
        assert!(!out.contains("Jespersen"));
    }

    #[test]
    fn test_short_mentions_rejected_except_numbers() {
        let out = mask("Bo bor i DK", ["Bo", "DK"], EntityType::Person, "[PERSON]", "");
        assert_eq!(out, "Bo bor i DK");
        let out = mask("er 20 år", ["20"], EntityType::Number, "[NUMMER]", "");
        assert_eq!(out, "er [NUMMER] år");
    }

    #[test]
    fn test_person_trailing_periods() {
        assert_eq!(prepare_mention(" Jespersen. ", EntityType::Person), Some("Jespersen".into()));
        assert_eq!(prepare_mention("Jespersen.", EntityType::Organization), Some("Jespersen.".into()));
        assert_eq!(prepare_mention("   ", EntityType::Number), None);
    }

    #[test]
    fn test_all_occurrences_replaced() {
        let out = mask("a@b.dk, a@b.dk", ["a@b.dk"], EntityType::Email, "[EMAIL]", "");
        assert_eq!(out, "[EMAIL], [EMAIL]");
    }

    #[test]
    fn test_mask_is_idempotent() {
        let once = mask("Hej Martin Jespersen", ["Martin Jespersen"], EntityType::Person, "[PERSON]", "");
        let twice = mask(&once, ["Martin Jespersen"], EntityType::Person, "[PERSON]", "");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_noisy_numbers_are_integers() {
        let mut rng = StdRng::seed_from_u64(5);
        let out = mask_noisy("er 100 år", ["100"], 1.0, "[NUMMER]", "", &mut rng);
        let number = out.trim_start_matches("er ").trim_end_matches(" år");
        number.parse::<i64>().unwrap();
    }

    #[test]
    fn test_noisy_invalid_falls_back() {
        let mut rng = StdRng::seed_from_u64(5);
        let out = mask_noisy("beløb 1,2,3.4.5 kr", ["1,2,3.4.5"], 1.0, "[NUMMER]", "", &mut rng);
        assert_eq!(out, "beløb [NUMMER] kr");
    }

    #[test]
    fn test_numbers_after_category_words_are_masked() {
        let targets = vec![
            MaskTarget::new("Martin", EntityType::Person, Replacement::Fixed("Person 1".into())).unwrap(),
            MaskTarget::new("0102032010", EntityType::Number, Replacement::Fixed("Nummer 2".into())).unwrap(),
        ];
        let mut rng = StdRng::seed_from_u64(0);
        let out = apply_targets("Martin har CPR 0102032010", targets, &mut rng);
        assert_eq!(out, "Person 1 har CPR Nummer 2");
    }

    #[test]
    fn test_inserted_ids_are_not_renoised() {
        let mut rng = StdRng::seed_from_u64(5);
        let targets = vec![
            MaskTarget::new("Martin", EntityType::Person, Replacement::Fixed("Person 1".into())).unwrap(),
            MaskTarget::new(
                "1",
                EntityType::Number,
                Replacement::Noised {
                    epsilon: 1.0,
                    fallback: "Nummer 2".into(),
                },
            )
            .unwrap(),
        ];
        let out = apply_targets("Martin har 1 bil", targets, &mut rng);
        assert!(out.starts_with("Person 1 har "));
        assert!(out.ends_with(" bil"));
    }

    #[test]
    fn test_overlapping_occurrences_claimed_once() {
        let out = mask("aa aa", ["aa aa", "aa"], EntityType::Misc, "[DIVERSE]", "");
        assert_eq!(out, "[DIVERSE]");
    }

    #[test]
    fn test_apply_targets_mixed_replacements() {
        let targets = vec![
            MaskTarget::new("Martin", EntityType::Person, Replacement::Fixed("Person 1".into())).unwrap(),
            MaskTarget::new("Deloitte", EntityType::Organization, Replacement::Fixed("Organisation 2".into())).unwrap(),
        ];
        let mut rng = StdRng::seed_from_u64(0);
        let out = apply_targets("Martin arbejder i Deloitte", targets, &mut rng);
        assert_eq!(out, "Person 1 arbejder i Organisation 2");
    }
}
