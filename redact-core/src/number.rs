//! # Classificação Numérica e Ruído de Laplace
//!
//! Em vez de apagar números, o motor pode perturbá-los com ruído calibrado
//! (mecanismo de Laplace, como em privacidade diferencial): a magnitude
//! aproximada sobrevive, o valor exato não.
//!
//! ## Separadores ambíguos
//!
//! Em dinamarquês a vírgula é o separador decimal e o ponto agrupa milhares
//! ("1.000,50"), mas textos misturam convenções. A regra olha para a posição
//! do **último** `.` e da **última** `,` contadas a partir do fim do token:
//!
//! | Token        | Classe   | Valor   |
//! |--------------|----------|---------|
//! | `20`         | Integer  | 20      |
//! | `3,5`        | Float    | 3.5     |
//! | `1.000,50`   | Float    | 1000.50 |
//! | `1,000.5`    | Float    | 1000.5  |
//! | `1.000.000`  | Integer  | 1000000 |
//! | `1,2,3.4.5`  | Invalid  | —       |

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{RedactError, Result};

/// Distância usada quando o delimitador não aparece no token.
const ABSENT: isize = 1000;

/// Caracteres que impedem um token com vírgula de milhar de ser marcado inválido.
const SPECIAL_CHARACTERS: &str = ":;!@#$%^&*()+?_=<>/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberKind {
    Integer,
    Float,
    /// Nunca é parseado: cai no placeholder.
    Invalid,
}

/// Um número decomposto para reconstrução após o ruído.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedNumber {
    /// Valor absoluto
    pub magnitude: f64,
    /// Dígitos após o separador decimal
    pub precision: usize,
    pub negative: bool,
    pub kind: NumberKind,
}

impl ParsedNumber {
    pub fn sign(&self) -> &'static str {
        if self.negative {
            "-"
        } else {
            ""
        }
    }

    pub fn signed_value(&self) -> f64 {
        if self.negative {
            -self.magnitude
        } else {
            self.magnitude
        }
    }
}

/// Quantos caracteres seguem a última ocorrência de `delimiter`.
fn distance_from_end(token: &str, delimiter: char) -> isize {
    token
        .chars()
        .rev()
        .position(|c| c == delimiter)
        .map(|p| p as isize)
        .unwrap_or(ABSENT)
}

/// Classifica um token numérico como inteiro, decimal ou inválido.
pub fn classify(token: &str) -> NumberKind {
    let dots = token.matches('.').count();
    let commas = token.matches(',').count();
    let last_delimiter = distance_from_end(token, '.') - distance_from_end(token, ',');

    if (dots == 1 && last_delimiter < 0) || (commas == 1 && last_delimiter > 0) {
        return NumberKind::Float;
    }

    let has_special = token.chars().any(|c| SPECIAL_CHARACTERS.contains(c));
    if (dots > 1 && commas > 1)
        || (dots == 1 && last_delimiter > 0)
        || (commas == 1 && last_delimiter < 0 && !has_special)
    {
        return NumberKind::Invalid;
    }

    NumberKind::Integer
}

/// Decompõe um token em magnitude, precisão e sinal.
///
/// O delimitador identificado como decimal vira `.`; o outro é descartado
/// como separador de milhar. Tokens `Invalid` ou sem dígitos retornam
/// `RedactError::NumberParse`.
pub fn to_float(token: &str) -> Result<ParsedNumber> {
    let kind = classify(token);
    let negative = token.trim_start().starts_with('-');

    match kind {
        NumberKind::Invalid => Err(RedactError::NumberParse(token.to_string())),
        NumberKind::Integer => {
            let digits: String = token.chars().filter(char::is_ascii_digit).collect();
            let magnitude = digits
                .parse::<f64>()
                .map_err(|_| RedactError::NumberParse(token.to_string()))?;
            Ok(ParsedNumber {
                magnitude,
                precision: 0,
                negative,
                kind,
            })
        }
        NumberKind::Float => {
            let decimal = decimal_delimiter(token);
            let normalized: String = token
                .chars()
                .filter_map(|c| match c {
                    c if c.is_ascii_digit() => Some(c),
                    c if c == decimal => Some('.'),
                    _ => None,
                })
                .collect();
            let precision = normalized
                .find('.')
                .map(|p| normalized.len() - p - 1)
                .unwrap_or(0);
            let magnitude = normalized
                .parse::<f64>()
                .map_err(|_| RedactError::NumberParse(token.to_string()))?;
            Ok(ParsedNumber {
                magnitude,
                precision,
                negative,
                kind,
            })
        }
    }
}

fn decimal_delimiter(token: &str) -> char {
    let has_dot = token.contains('.');
    let has_comma = token.contains(',');
    if has_dot && has_comma {
        if distance_from_end(token, '.') < distance_from_end(token, ',') {
            '.'
        } else {
            ','
        }
    } else if has_comma {
        ','
    } else {
        '.'
    }
}

/// Amostra de Laplace(0, scale) por inversão da CDF.
pub fn sample_laplace<R: Rng + ?Sized>(scale: f64, rng: &mut R) -> f64 {
    let u: f64 = rng.gen::<f64>() - 0.5;
    let tail = (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE);
    -scale * u.signum() * tail.ln()
}

/// Soma ruído Laplace(0, 1/epsilon) e formata de volta no formato do token.
///
/// Um número sem sinal nunca ganha um `-`. Inteiros são truncados; decimais
/// mantêm a precisão original.
pub fn laplace_redact<R: Rng + ?Sized>(number: &ParsedNumber, epsilon: f64, rng: &mut R) -> String {
    let noise = sample_laplace(1.0 / epsilon, rng);
    let mut noisy = number.signed_value() + noise;
    if !number.negative {
        noisy = noisy.abs();
    }

    match number.kind {
        NumberKind::Float => format!("{:.*}", number.precision, noisy),
        _ => format!("{}", noisy.trunc() as i64),
    }
}

/// Atalho: classifica, parseia e perturba. `None` se o token for inválido.
pub fn noised_token<R: Rng + ?Sized>(token: &str, epsilon: f64, rng: &mut R) -> Option<String> {
    to_float(token)
        .ok()
        .map(|number| laplace_redact(&number, epsilon, rng))
}
