//! # Tokenizador para Dinamarquês
//!
//! Divide o texto em palavras e pontuações preservando o offset de cada token
//! no texto original. O reconhecedor por regras usa os offsets para devolver
//! o trecho exato (com espaços e pontuação internos) de entidades de várias
//! palavras.
//!
//! ## Esquema
//!
//! A segmentação base segue as fronteiras de palavra do Unicode (UAX #29), que
//! já mantém juntos números com separadores ("1.000,50"), domínios ("gmail.com")
//! e letras nacionais ("Århus"). Por cima disso:
//!
//! - **Abreviações**: "hr.", "dr.", "tlf." ficam com o ponto.
//! - **Números com sinal**: "-3,25" vira um token quando o hífen não está
//!   colado a uma palavra anterior ("kl 10-12" continua "10", "-", "12").
//!
//! ```rust
//! use redact_core::tokenizer::tokenize;
//!
//! let tokens = tokenize("Hr. Jensen betalte -3,25 kr.");
//! let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
//! assert_eq!(texts, ["Hr.", "Jensen", "betalte", "-3,25", "kr", "."]);
//! ```

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Um token extraído do texto original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// O texto do token (ex: "Jensen", ",", "hr.").
    pub text: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista (0, 1, 2...).
    pub index: usize,
}

impl Token {
    pub fn starts_uppercase(&self) -> bool {
        self.text.chars().next().is_some_and(char::is_uppercase)
    }

    /// Inteiro ou decimal, com ou sem sinal ("20", "-3,25", "1.000").
    pub fn is_numeric(&self) -> bool {
        let body = self.text.strip_prefix('-').unwrap_or(&self.text);
        body.chars().next().is_some_and(|c| c.is_ascii_digit())
            && body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    }
}

/// Abreviações dinamarquesas cujo ponto não encerra a frase.
const ABBREVIATIONS: &[&str] = &[
    "hr", "fr", "frk", "dr", "prof", "ca", "nr", "tlf", "st", "gl", "jf", "pga",
    "vedr", "evt", "kl", "mht", "osv", "mv", "adm", "dir", "cand", "stud",
];

fn is_abbreviation(word: &str) -> bool {
    let lower = word.to_lowercase();
    ABBREVIATIONS.contains(&lower.as_str())
}

/// Tokeniza um texto.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    for (start, piece) in text.split_word_bound_indices() {
        if piece.chars().all(char::is_whitespace) {
            continue;
        }
        let end = start + piece.len();

        if let Some(last) = tokens.last_mut() {
            let adjacent = last.end == start;

            // "hr" + "." → "hr."
            if adjacent && piece == "." && is_abbreviation(&last.text) {
                last.text.push('.');
                last.end = end;
                continue;
            }

            // "-" + "3,25" → "-3,25", se o hífen não continua uma palavra
            let starts_digit = piece.chars().next().is_some_and(|c| c.is_ascii_digit());
            if adjacent && starts_digit && last.text == "-" && !glued_to_previous(text, last.start) {
                last.text.push_str(piece);
                last.end = end;
                continue;
            }
        }

        tokens.push(Token {
            text: piece.to_string(),
            start,
            end,
            index: 0,
        });
    }

    // Re-indexa os tokens
    for (i, token) in tokens.iter_mut().enumerate() {
        token.index = i;
    }
    tokens
}

/// Há um caractere não-branco imediatamente antes de `pos`?
fn glued_to_previous(text: &str, pos: usize) -> bool {
    text[..pos]
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_whitespace())
}
