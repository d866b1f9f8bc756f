//! # redact-core — Anonimização e Pseudonimização Consistente de Textos
//!
//! Este crate substitui informação sensível em textos livres em dinamarquês:
//! identificadores estruturados (CPR, telefone, email) e entidades nomeadas
//! (pessoas, locais, organizações e, opcionalmente, miscelânea e números).
//!
//! Dois modos:
//!
//! - **Anonimização**: cada menção vira o placeholder fixo da categoria
//!   (`[PERSON]`, `[CPR]`, ...). A identidade se perde.
//! - **Pseudonimização**: menções do mesmo referente viram o mesmo alias
//!   numerado (`Person 1`, `CPR 2`, ...), preservando quem é quem dentro do
//!   documento.
//!
//! ## Arquitetura
//!
//! 1.  **Detectores estruturais** ([`patterns`]): regex para CPR, telefone e email.
//! 2.  **Reconhecedor de entidades** ([`recognizer`]): colaborador externo que
//!     fornece `(trecho, categoria)`; [`rule_based`] traz uma implementação
//!     por gazetteers sobre o [`tokenizer`].
//! 3.  **Resolução de indivíduos** ([`individual`]): agrupa menções por
//!     contenção de substring, pessoas primeiro.
//! 4.  **Masker** ([`masker`]): substituição com fronteira de palavra, maior
//!     primeiro, numa única passada.
//! 5.  **Números** ([`number`]): classificação de separadores e ruído de Laplace.
//! 6.  **Orquestrador** ([`pipeline`]): aplica tudo por documento, em paralelo,
//!     isolando falhas.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use std::sync::Arc;
//! use redact_core::{DetectorRegistry, EntityType, PrecomputedRecognizer, RedactionConfig, Redactor};
//!
//! let ner = PrecomputedRecognizer::new()
//!     .with(0, "Martin Jespersen", EntityType::Person)
//!     .with(0, "Martin", EntityType::Person);
//! let redactor = Redactor::new(
//!     RedactionConfig::pseudonymize(),
//!     DetectorRegistry::new(),
//!     Arc::new(ner),
//! )
//! .unwrap();
//!
//! let corpus = vec!["Martin Jespersen har cpr 010203-2010. Martin er glad.".to_string()];
//! let output = redactor.redact_corpus(&corpus).unwrap();
//! assert_eq!(output.texts[0], "Person 1 har cpr CPR 2. Person 1 er glad.");
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod individual;
pub mod masker;
pub mod number;
pub mod patterns;
pub mod pipeline;
pub mod recognizer;
pub mod rule_based;
pub mod tokenizer;

pub use config::{MaskStep, Mode, PlaceholderMapping, RedactionConfig};
pub use entity::{Document, EntityType, Mention};
pub use error::{RedactError, Result};
pub use individual::{IndividualTable, MentionsByType};
pub use patterns::{Detector, DetectorRegistry};
pub use pipeline::{DocumentStage, RedactionEvent, RedactionOutput, Redactor};
pub use recognizer::{EntityRecognizer, NoopRecognizer, PrecomputedRecognizer};
pub use rule_based::{GazetteerLists, GazetteerRecognizer};
