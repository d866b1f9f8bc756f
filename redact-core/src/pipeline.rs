//! # Pipeline de Redação — Orquestrador com Eventos Observáveis
//!
//! O [`Redactor`] coordena detectores, reconhecedor de entidades, resolução de
//! indivíduos e masker para um corpus inteiro, e pode emitir eventos de
//! progresso por um canal (`mpsc`) para quem quiser acompanhar em tempo real.
//!
//! ## Ciclo de vida de um documento
//!
//! ```text
//! Detecting → Resolving (só pseudonimização) → Masking → Done
//!      └──────────────┴────────────────────────────┴──→ Failed
//! ```
//!
//! Uma falha dentro de um documento nunca derruba o lote: o slot de saída
//! recebe um diagnóstico com o índice e a mensagem, e os outros seguem.
//! Erros de configuração, ao contrário, abortam antes do primeiro documento.
//!
//! ## Modos
//!
//! - **Anonimização**: os passos de `masking_order` rodam em sequência sobre o
//!   texto já parcialmente mascarado; cada categoria vira seu placeholder fixo.
//! - **Pseudonimização**: todos os detectores rodam sobre o texto original, as
//!   menções são agrupadas em indivíduos e cada uma vira `"<Placeholder> <id>"`
//!   numa única passada, maiores primeiro.
//!
//! Documentos são independentes e processados em paralelo num pool `rayon`;
//! cada um tem sua própria tabela de indivíduos e seu próprio gerador de ruído.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{MaskStep, Mode, PlaceholderMapping, RedactionConfig};
use crate::entity::{Document, EntityType, Mention};
use crate::error::{RedactError, Result};
use crate::individual::{IndividualTable, MentionsByType};
use crate::masker::{apply_targets, mask, mask_noisy, prepare_mention, MaskTarget, Replacement};
use crate::patterns::{builtin_detector, DetectorRegistry};
use crate::recognizer::{check_batch_len, EntityRecognizer};

/// Estágio de um documento no processamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStage {
    Detecting,
    Resolving,
    Masking,
    Done,
    Failed,
}

/// Eventos emitidos durante a redação de um corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RedactionEvent {
    /// Configuração validada, processamento começando.
    RunStarted {
        documents: usize,
        mode: Mode,
        masked_entities: Vec<String>,
    },
    /// Um lote do reconhecedor de entidades terminou.
    NerBatchDone { first_index: usize, documents: usize },
    /// Um documento mudou de estágio.
    StageChanged { index: usize, stage: DocumentStage },
    /// PER era mascarado, mas o documento não tinha nenhuma pessoa.
    NoPersonFound { index: usize },
    /// O documento falhou; o slot de saída tem o diagnóstico.
    DocumentFailed {
        index: usize,
        stage: DocumentStage,
        message: String,
    },
    /// Fim do corpus.
    Done {
        documents: usize,
        failed: usize,
        processing_ms: u64,
    },
}

/// Resultado da redação de um corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedactionOutput {
    /// Um texto por documento de entrada, na mesma ordem
    pub texts: Vec<String>,
    /// Indivíduos resolvidos por índice (só pseudonimização, só documentos ok)
    pub individuals: BTreeMap<usize, IndividualTable>,
}

/// Diagnóstico que substitui um documento que falhou.
pub fn failure_message(index: usize, err: &RedactError) -> String {
    format!("Text at index {} in corpus failed to be transformed with error: {}", index, err)
}

type EventSender<'a> = Option<&'a mpsc::Sender<RedactionEvent>>;

fn emit(events: EventSender<'_>, event: RedactionEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Acompanha o estágio de um documento, registrando cada transição.
struct DocumentJob<'a> {
    index: usize,
    stage: DocumentStage,
    events: EventSender<'a>,
}

impl<'a> DocumentJob<'a> {
    fn start(index: usize, events: EventSender<'a>) -> Self {
        let job = Self {
            index,
            stage: DocumentStage::Detecting,
            events,
        };
        emit(
            events,
            RedactionEvent::StageChanged {
                index,
                stage: DocumentStage::Detecting,
            },
        );
        job
    }

    fn advance(&mut self, stage: DocumentStage) {
        debug!(indice = self.index, de = ?self.stage, para = ?stage, "transição de estágio");
        self.stage = stage;
        emit(
            self.events,
            RedactionEvent::StageChanged {
                index: self.index,
                stage,
            },
        );
    }

    fn fail(&mut self, err: &RedactError) {
        error!(indice = self.index, estagio = ?self.stage, erro = %err, "falha ao transformar documento");
        emit(
            self.events,
            RedactionEvent::DocumentFailed {
                index: self.index,
                stage: self.stage,
                message: err.to_string(),
            },
        );
        self.stage = DocumentStage::Failed;
    }

    fn no_person_found(&self) {
        warn!(indice = self.index, "nenhuma pessoa encontrada no documento");
        emit(self.events, RedactionEvent::NoPersonFound { index: self.index });
    }
}

struct DocumentResult {
    text: String,
    individuals: Option<IndividualTable>,
    failed: bool,
}

/// O orquestrador de redação.
///
/// Imutável depois de construído: pode ser compartilhado entre threads e
/// reutilizado para vários corpora com a mesma configuração.
pub struct Redactor {
    config: RedactionConfig,
    steps: Vec<MaskStep>,
    placeholders: PlaceholderMapping,
    registry: DetectorRegistry,
    recognizer: Arc<dyn EntityRecognizer>,
    noise_seed: Option<u64>,
}

impl Redactor {
    /// Valida a configuração e monta o orquestrador.
    pub fn new(
        config: RedactionConfig,
        registry: DetectorRegistry,
        recognizer: Arc<dyn EntityRecognizer>,
    ) -> Result<Self> {
        let steps = config.validate(&registry)?;
        if config.epsilon.is_some() && !config.mask_numbers {
            warn!("epsilon informado sem mask_numbers: nenhum número será perturbado");
        }
        let placeholders = PlaceholderMapping::from_config(&config);
        Ok(Self {
            config,
            steps,
            placeholders,
            registry,
            recognizer,
            noise_seed: None,
        })
    }

    /// Ruído reproduzível: cada documento usa `seed ^ índice`.
    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        self.noise_seed = Some(seed);
        self
    }

    pub fn config(&self) -> &RedactionConfig {
        &self.config
    }

    pub fn steps(&self) -> &[MaskStep] {
        &self.steps
    }

    pub fn placeholders(&self) -> &PlaceholderMapping {
        &self.placeholders
    }

    /// Chaves das categorias mascaradas, na ordem dos passos.
    pub fn masked_entities(&self) -> Vec<String> {
        self.steps
            .iter()
            .flat_map(|step| match step {
                MaskStep::Ner => self
                    .config
                    .ner_types()
                    .iter()
                    .map(|t| t.key().to_string())
                    .collect::<Vec<_>>(),
                other => vec![other.label()],
            })
            .collect()
    }

    /// Redige o corpus inteiro.
    pub fn redact_corpus(&self, texts: &[String]) -> Result<RedactionOutput> {
        self.run(texts, None)
    }

    /// Como [`redact_corpus`](Self::redact_corpus), enviando eventos por `tx`.
    ///
    /// Eventos de documentos diferentes chegam intercalados, pois os documentos
    /// rodam em paralelo.
    pub fn redact_corpus_streaming(
        &self,
        texts: &[String],
        tx: mpsc::Sender<RedactionEvent>,
    ) -> Result<RedactionOutput> {
        self.run(texts, Some(&tx))
    }

    fn run(&self, texts: &[String], events: EventSender<'_>) -> Result<RedactionOutput> {
        let start = Instant::now();
        let masked_entities = self.masked_entities();

        info!(
            documentos = texts.len(),
            batch_size = self.config.batch_size,
            processos = ?self.config.n_process,
            epsilon = ?self.config.noise_epsilon(),
            supressao = self.config.suppression,
            modo = ?self.config.mode,
            entidades = %masked_entities.join(", "),
            "iniciando redação do corpus"
        );
        emit(
            events,
            RedactionEvent::RunStarted {
                documents: texts.len(),
                mode: self.config.mode,
                masked_entities,
            },
        );

        let documents: Vec<Document> = texts
            .iter()
            .enumerate()
            .map(|(index, text)| Document {
                index,
                text: text.clone(),
            })
            .collect();

        let pool = build_pool(self.config.n_process)?;
        let results: Vec<DocumentResult> = pool.install(|| -> Result<Vec<DocumentResult>> {
            let recognized = self.recognize_all(&documents, events)?;
            Ok(documents
                .par_iter()
                .zip(recognized.par_iter())
                .map(|(doc, mentions)| self.process(doc, mentions, events))
                .collect())
        })?;

        let failed = results.iter().filter(|r| r.failed).count();
        let mut output = RedactionOutput::default();
        for (index, result) in results.into_iter().enumerate() {
            output.texts.push(result.text);
            if let Some(table) = result.individuals {
                output.individuals.insert(index, table);
            }
        }

        let processing_ms = start.elapsed().as_millis() as u64;
        info!(documentos = texts.len(), falhas = failed, ms = processing_ms, "redação concluída");
        emit(
            events,
            RedactionEvent::Done {
                documents: texts.len(),
                failed,
                processing_ms,
            },
        );
        Ok(output)
    }

    /// Chama o reconhecedor em lotes de `batch_size`, só se houver passo NER.
    fn recognize_all(&self, documents: &[Document], events: EventSender<'_>) -> Result<Vec<Vec<Mention>>> {
        if !self.steps.contains(&MaskStep::Ner) {
            return Ok(vec![Vec::new(); documents.len()]);
        }

        let batches: Vec<Vec<Vec<Mention>>> = documents
            .par_chunks(self.config.batch_size)
            .map(|batch| {
                let found = self.recognizer.recognize(batch)?;
                check_batch_len(self.recognizer.name(), batch.len(), found.len())?;

                let first_index = batch.first().map_or(0, |d| d.index);
                debug!(
                    reconhecedor = self.recognizer.name(),
                    primeiro = first_index,
                    documentos = batch.len(),
                    "lote do NER concluído"
                );
                emit(
                    events,
                    RedactionEvent::NerBatchDone {
                        first_index,
                        documents: batch.len(),
                    },
                );
                Ok(found)
            })
            .collect::<Result<_>>()?;

        Ok(batches.into_iter().flatten().collect())
    }

    fn process(&self, doc: &Document, recognized: &[Mention], events: EventSender<'_>) -> DocumentResult {
        let mut job = DocumentJob::start(doc.index, events);
        let mut rng = self.rng_for(doc.index);

        // Pânico num detector do chamador também fica restrito ao documento
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match self.config.mode {
            Mode::Anonymize => self
                .anonymize(&mut job, doc, recognized, &mut rng)
                .map(|text| (text, None)),
            Mode::Pseudonymize => self
                .pseudonymize(&mut job, doc, recognized, &mut rng)
                .map(|(text, table)| (text, Some(table))),
        }))
        .unwrap_or_else(|payload| Err(RedactError::Panic(panic_message(payload.as_ref()))));

        match outcome {
            Ok((text, individuals)) => {
                job.advance(DocumentStage::Done);
                DocumentResult {
                    text,
                    individuals,
                    failed: false,
                }
            }
            Err(err) => {
                job.fail(&err);
                DocumentResult {
                    text: failure_message(doc.index, &err),
                    individuals: None,
                    failed: true,
                }
            }
        }
    }

    fn rng_for(&self, index: usize) -> StdRng {
        match self.noise_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ index as u64),
            None => StdRng::from_entropy(),
        }
    }

    fn anonymize(
        &self,
        job: &mut DocumentJob<'_>,
        doc: &Document,
        recognized: &[Mention],
        rng: &mut StdRng,
    ) -> Result<String> {
        let priors = self
            .config
            .prior_individuals
            .get(&doc.index)
            .map(IndividualTable::flatten)
            .unwrap_or_default();
        let recognized = self.group_recognized(recognized);

        job.advance(DocumentStage::Masking);
        let mut text = doc.text.clone();
        let mut persons = 0;

        for step in &self.steps {
            match step {
                MaskStep::Ner => {
                    for entity_type in self.config.ner_types() {
                        let mentions: BTreeSet<String> = recognized
                            .get(&entity_type)
                            .into_iter()
                            .chain(priors.get(&entity_type))
                            .flatten()
                            .cloned()
                            .collect();
                        if entity_type == EntityType::Person {
                            persons = mentions
                                .iter()
                                .filter(|m| prepare_mention(m, entity_type).is_some())
                                .count();
                        }
                        text = self.mask_category(&text, entity_type, &mentions, rng);
                    }
                }
                MaskStep::Builtin(entity_type) | MaskStep::Custom { entity_type, .. } => {
                    // Detecta sobre o texto atual: passos anteriores já mascararam
                    let mut found = self.detect(step, &text)?;
                    found.extend(priors.get(entity_type).into_iter().flatten().cloned());
                    text = self.mask_category(&text, *entity_type, &found, rng);
                }
            }
        }

        if self.steps.contains(&MaskStep::Ner) && persons == 0 {
            job.no_person_found();
        }
        Ok(text)
    }

    fn pseudonymize(
        &self,
        job: &mut DocumentJob<'_>,
        doc: &Document,
        recognized: &[Mention],
        rng: &mut StdRng,
    ) -> Result<(String, IndividualTable)> {
        let mut raw = MentionsByType::new();
        for step in &self.steps {
            match step {
                MaskStep::Ner => {
                    for (entity_type, mentions) in self.group_recognized(recognized) {
                        raw.entry(entity_type).or_default().extend(mentions);
                    }
                }
                MaskStep::Builtin(entity_type) | MaskStep::Custom { entity_type, .. } => {
                    let found = self.detect(step, &doc.text)?;
                    raw.entry(*entity_type).or_default().extend(found);
                }
            }
        }

        // Menções descartadas pelo masker não devem gastar ids
        let all_mentions: MentionsByType = raw
            .into_iter()
            .map(|(entity_type, mentions)| {
                let kept: BTreeSet<String> = mentions
                    .iter()
                    .filter_map(|m| prepare_mention(m, entity_type))
                    .collect();
                (entity_type, kept)
            })
            .filter(|(_, mentions)| !mentions.is_empty())
            .collect();

        job.advance(DocumentStage::Resolving);
        let mut table = self
            .config
            .prior_individuals
            .get(&doc.index)
            .cloned()
            .unwrap_or_default();
        table.resolve(&all_mentions);
        debug!(indice = doc.index, individuos = table.len(), "indivíduos resolvidos");

        job.advance(DocumentStage::Masking);
        if self.steps.contains(&MaskStep::Ner) && table.count_with(EntityType::Person) == 0 {
            job.no_person_found();
        }

        let targets = self.pseudonym_targets(&table);
        let text = apply_targets(&doc.text, targets, rng);
        Ok((text, table))
    }

    /// Um alvo por menção: `"<Placeholder> <id>"` do indivíduo dono.
    ///
    /// Só categorias cobertas por algum passo entram. Uma mesma string em duas
    /// categorias fica com o primeiro indivíduo que a reivindicar.
    fn pseudonym_targets(&self, table: &IndividualTable) -> Vec<MaskTarget> {
        let step_types: Vec<EntityType> = self
            .steps
            .iter()
            .flat_map(|step| step.entity_types(&self.config))
            .collect();
        let epsilon = self.config.noise_epsilon();

        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for (id, individual) in table.iter() {
            for &entity_type in &step_types {
                let Some(mentions) = individual.get(&entity_type) else {
                    continue;
                };
                let alias = format!("{} {}", self.placeholders.get(entity_type), id);
                for mention in mentions {
                    let replacement = match (entity_type, epsilon) {
                        (EntityType::Number, Some(epsilon)) => Replacement::Noised {
                            epsilon,
                            fallback: alias.clone(),
                        },
                        _ => Replacement::Fixed(alias.clone()),
                    };
                    if let Some(target) = MaskTarget::new(mention, entity_type, replacement) {
                        if seen.insert(target.mention.clone()) {
                            targets.push(target);
                        }
                    }
                }
            }
        }
        targets
    }

    /// Menções do NER das categorias acompanhadas, por categoria.
    fn group_recognized(&self, recognized: &[Mention]) -> MentionsByType {
        let tracked = self.config.ner_types();
        let mut grouped = MentionsByType::new();
        for mention in recognized.iter().filter(|m| tracked.contains(&m.entity_type)) {
            grouped
                .entry(mention.entity_type)
                .or_default()
                .insert(mention.text.clone());
        }
        grouped
    }

    fn detect(&self, step: &MaskStep, text: &str) -> Result<HashSet<String>> {
        match step {
            MaskStep::Builtin(entity_type) => {
                Ok(builtin_detector(*entity_type).map_or_else(HashSet::new, |find| find(text)))
            }
            MaskStep::Custom { key, .. } => self.registry.run(key, text),
            MaskStep::Ner => Ok(HashSet::new()),
        }
    }

    fn mask_category<I, S>(&self, text: &str, entity_type: EntityType, mentions: I, rng: &mut StdRng) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let placeholder = self.placeholders.get(entity_type);
        match (entity_type, self.config.noise_epsilon()) {
            (EntityType::Number, Some(epsilon)) => mask_noisy(text, mentions, epsilon, placeholder, "", rng),
            _ => mask(text, mentions, entity_type, placeholder, ""),
        }
    }
}

impl std::fmt::Debug for Redactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redactor")
            .field("config", &self.config)
            .field("steps", &self.steps)
            .field("registry", &self.registry)
            .field("recognizer", &self.recognizer.name())
            .field("noise_seed", &self.noise_seed)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "pânico sem mensagem".to_string()
    }
}

fn build_pool(n_process: Option<usize>) -> Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = n_process {
        builder = builder.num_threads(threads);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::{NoopRecognizer, PrecomputedRecognizer};
    use crate::rule_based::GazetteerRecognizer;

    const SCENARIO: &str = "Hej, jeg hedder Martin Jespersen, er 20 år, mit cpr er 010203-2010, \
                            telefon: +4545454545 og email: martin.martin@gmail.com";

    fn corpus(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    fn redactor(config: RedactionConfig, recognizer: impl EntityRecognizer + 'static) -> Redactor {
        Redactor::new(config, DetectorRegistry::new(), Arc::new(recognizer)).unwrap()
    }

    #[test]
    fn test_output_keeps_length_and_order() {
        let r = redactor(RedactionConfig::anonymize(), NoopRecognizer);
        let texts = corpus(&["en", "to", "tre", ""]);
        let out = r.redact_corpus(&texts).unwrap();
        assert_eq!(out.texts, texts);
        assert!(out.individuals.is_empty());
    }

    #[test]
    fn test_id_number_only() {
        let config = RedactionConfig::anonymize().with_masking_order(["CPR"]);
        let r = redactor(config, NoopRecognizer);
        let out = r.redact_corpus(&corpus(&["mit CPR nr er 010203-2010"])).unwrap();
        assert_eq!(out.texts, vec!["mit CPR nr er [CPR]"]);
    }

    #[test]
    fn test_anonymize_scenario() {
        let ner = PrecomputedRecognizer::new().with(0, "Martin Jespersen", EntityType::Person);
        let r = redactor(RedactionConfig::anonymize(), ner);
        let out = r.redact_corpus(&corpus(&[SCENARIO])).unwrap();
        assert_eq!(
            out.texts[0],
            "Hej, jeg hedder [PERSON], er 20 år, mit cpr er [CPR], telefon: [TELEFON] og email: [EMAIL]"
        );
    }

    #[test]
    fn test_anonymize_is_idempotent() {
        let ner = PrecomputedRecognizer::new().with(0, "Martin Jespersen", EntityType::Person);
        let r = redactor(RedactionConfig::anonymize(), ner);
        let once = r.redact_corpus(&corpus(&[SCENARIO])).unwrap().texts;
        let twice = r.redact_corpus(&once).unwrap().texts;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_suppression_in_anonymize() {
        let config = RedactionConfig {
            suppression: true,
            ..RedactionConfig::anonymize()
        };
        let r = redactor(config, NoopRecognizer);
        let out = r.redact_corpus(&corpus(&["skriv til a@b.dk"])).unwrap();
        assert_eq!(out.texts[0], "skriv til XXX");
    }

    #[test]
    fn test_anonymize_uses_flat_priors() {
        let mut priors = MentionsByType::new();
        priors.entry(EntityType::Person).or_default().insert("Kristina".to_string());
        let mut config = RedactionConfig::anonymize();
        config.prior_individuals.insert(0, IndividualTable::from_mentions(priors));
        let r = redactor(config, NoopRecognizer);
        let out = r.redact_corpus(&corpus(&["Kristina kom", "Kristina gik"])).unwrap();
        assert_eq!(out.texts, vec!["[PERSON] kom", "Kristina gik"]);
    }

    #[test]
    fn test_pseudonymize_scenario() {
        let ner = PrecomputedRecognizer::new().with(0, "Martin Jespersen", EntityType::Person);
        let r = redactor(RedactionConfig::pseudonymize(), ner);
        let out = r.redact_corpus(&corpus(&[SCENARIO])).unwrap();
        assert_eq!(
            out.texts[0],
            "Hej, jeg hedder Person 1, er 20 år, mit cpr er CPR 2, telefon: Telefon 4 og email: Email 3"
        );
        let table = &out.individuals[&0];
        assert!(table.get(1).unwrap()[&EntityType::Person].contains("Martin Jespersen"));
    }

    #[test]
    fn test_pseudonymize_keeps_coreference() {
        let text = "Hej, jeg hedder Martin Jespersen og er fra Danmark og arbejder i Deloitte, \
                    mit cpr er 010203-2010, telefon: +4545454545 og email: martin.martin@gmail.com. \
                    Martin er en 20 årig mand.";
        let ner = PrecomputedRecognizer::new()
            .with(0, "Martin Jespersen", EntityType::Person)
            .with(0, "Martin", EntityType::Person)
            .with(0, "Danmark", EntityType::Location)
            .with(0, "Deloitte", EntityType::Organization);
        let r = redactor(RedactionConfig::pseudonymize(), ner);
        let out = r.redact_corpus(&corpus(&[text])).unwrap();
        assert_eq!(
            out.texts[0],
            "Hej, jeg hedder Person 1 og er fra Lokation 4 og arbejder i Organisation 5, \
             mit cpr er CPR 2, telefon: Telefon 6 og email: Email 3. \
             Person 1 er en 20 årig mand."
        );
    }

    #[test]
    fn test_pseudonymize_with_prior_individuals() {
        let mut prior = IndividualTable::new();
        for name in ["Martin Jespersen", "Martin", "Jespersen, Martin"] {
            prior.insert(1, EntityType::Person, name);
        }
        prior.insert(1, EntityType::IdNumber, "010203-2010");
        prior.insert(1, EntityType::Email, "martin.martin@gmail.com");
        prior.insert(1, EntityType::Location, "Danmark");
        prior.insert(1, EntityType::Organization, "Deloitte");
        prior.insert(2, EntityType::Person, "Kristina");
        prior.insert(2, EntityType::Organization, "Novo Nordisk");

        let mut config = RedactionConfig::pseudonymize();
        config.prior_individuals.insert(1, prior);

        let first = "Hej, jeg hedder Martin Jespersen, er 20 år, mit cpr er 010203-2010, \
                     telefon: +4545454545 og email: martin.martin@gmail.com.";
        let second = "Hej, jeg hedder Martin Jespersen og er fra Danmark og arbejder i Deloitte, \
                      mit cpr er 010203-2010, telefon: +4545454545 og email: martin.martin@gmail.com. \
                      Martin er en 20 årig mand. Kristina er en person som arbejder i Novo Nordisk. \
                      Frank er en mand som bor i Danmark og arbejder i Netto";
        let ner = PrecomputedRecognizer::new()
            .with(0, "Martin Jespersen", EntityType::Person)
            .with(1, "Martin Jespersen", EntityType::Person)
            .with(1, "Martin", EntityType::Person)
            .with(1, "Kristina", EntityType::Person)
            .with(1, "Frank", EntityType::Person)
            .with(1, "Danmark", EntityType::Location)
            .with(1, "Deloitte", EntityType::Organization)
            .with(1, "Novo Nordisk", EntityType::Organization)
            .with(1, "Netto", EntityType::Organization);

        let r = redactor(config, ner);
        let out = r.redact_corpus(&corpus(&[first, second])).unwrap();
        assert_eq!(
            out.texts[0],
            "Hej, jeg hedder Person 1, er 20 år, mit cpr er CPR 2, telefon: Telefon 4 og email: Email 3."
        );
        assert_eq!(
            out.texts[1],
            "Hej, jeg hedder Person 1 og er fra Lokation 1 og arbejder i Organisation 1, \
             mit cpr er CPR 1, telefon: Telefon 5 og email: Email 1. \
             Person 1 er en 20 årig mand. Person 2 er en person som arbejder i Organisation 2. \
             Person 3 er en mand som bor i Lokation 1 og arbejder i Organisation 4"
        );
        assert_eq!(out.individuals[&1].next_id(), 7);
    }

    #[test]
    fn test_partial_failure_is_isolated() {
        let mut registry = DetectorRegistry::new();
        registry.register("BOOM", EntityType::Misc, |text: &str| -> Result<HashSet<String>> {
            if text.contains("boom") {
                Err(RedactError::Config("eksplosion".into()))
            } else {
                Ok(HashSet::new())
            }
        });
        let config = RedactionConfig::anonymize().with_masking_order(["CPR", "BOOM"]);
        let r = Redactor::new(config, registry, Arc::new(NoopRecognizer)).unwrap();

        let out = r
            .redact_corpus(&corpus(&["cpr 010203-2010", "boom 010203-2010", "intet"]))
            .unwrap();
        assert_eq!(out.texts.len(), 3);
        assert_eq!(out.texts[0], "cpr [CPR]");
        assert!(out.texts[1].starts_with("Text at index 1 in corpus failed to be transformed with error:"));
        assert!(out.texts[1].contains("BOOM"));
        assert_eq!(out.texts[2], "intet");
    }

    #[test]
    fn test_panicking_detector_only_fails_its_document() {
        let mut registry = DetectorRegistry::new();
        registry.register("BOOM", EntityType::Misc, |text: &str| -> Result<HashSet<String>> {
            if text.contains("boom") {
                panic!("detektoren gik i stykker");
            }
            Ok(HashSet::new())
        });
        let config = RedactionConfig::anonymize().with_masking_order(["CPR", "BOOM"]);
        let r = Redactor::new(config, registry, Arc::new(NoopRecognizer)).unwrap();

        let (tx, rx) = mpsc::channel();
        let out = r
            .redact_corpus_streaming(&corpus(&["cpr 010203-2010", "boom", "intet"]), tx)
            .unwrap();
        assert_eq!(out.texts[0], "cpr [CPR]");
        assert!(out.texts[1].starts_with("Text at index 1 in corpus failed to be transformed with error:"));
        assert!(out.texts[1].contains("detektoren gik i stykker"));
        assert_eq!(out.texts[2], "intet");

        let events: Vec<RedactionEvent> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, RedactionEvent::DocumentFailed { index: 1, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, RedactionEvent::Done { failed: 1, .. })));
    }

    #[test]
    fn test_pseudonymize_masks_numbers_after_category_words() {
        let config = RedactionConfig {
            mask_numbers: true,
            ..RedactionConfig::pseudonymize()
        };
        let ner = PrecomputedRecognizer::new()
            .with(0, "Martin", EntityType::Person)
            .with(0, "0102032010", EntityType::Number);
        let r = redactor(config, ner);
        let out = r.redact_corpus(&corpus(&["Martin har CPR 0102032010"])).unwrap();
        assert_eq!(out.texts[0], "Person 1 har CPR Nummer 2");
        assert!(out.individuals[&0].get(2).unwrap()[&EntityType::Number].contains("0102032010"));
    }

    #[test]
    fn test_pseudonymize_noises_numbers_with_epsilon() {
        let config = RedactionConfig {
            mask_numbers: true,
            epsilon: Some(1.0),
            ..RedactionConfig::pseudonymize()
        };
        let ner = PrecomputedRecognizer::new()
            .with(0, "Martin", EntityType::Person)
            .with(0, "100", EntityType::Number)
            .with(0, "1,2,3.4.5", EntityType::Number);
        let r = redactor(config, ner).with_noise_seed(11);
        let texts = corpus(&["Person Martin har 100 kr og 1,2,3.4.5 point"]);

        let out = r.redact_corpus(&texts).unwrap();
        let text = &out.texts[0];
        assert!(text.starts_with("Person Person 1 har "));
        let noised = text
            .trim_start_matches("Person Person 1 har ")
            .split(" kr")
            .next()
            .unwrap();
        noised.parse::<i64>().unwrap();
        // Maior primeiro na resolução: "1,2,3.4.5" é o indivíduo 2 e, inválido, cai no alias
        assert!(text.ends_with(" kr og Nummer 2 point"));
        assert!(out.individuals[&0].get(3).unwrap()[&EntityType::Number].contains("100"));

        let again = r.redact_corpus(&texts).unwrap();
        assert_eq!(out.texts, again.texts);
    }

    #[test]
    fn test_configuration_errors_abort_before_processing() {
        let config = RedactionConfig::anonymize().with_masking_order(["CPR", "IBAN"]);
        let err = Redactor::new(config, DetectorRegistry::new(), Arc::new(NoopRecognizer)).unwrap_err();
        assert!(err.is_configuration());

        let config = RedactionConfig {
            mask_numbers: true,
            epsilon: Some(-1.0),
            ..RedactionConfig::anonymize()
        };
        assert!(Redactor::new(config, DetectorRegistry::new(), Arc::new(NoopRecognizer)).is_err());
    }

    #[test]
    fn test_number_noise_is_reproducible_with_seed() {
        let config = RedactionConfig {
            mask_numbers: true,
            epsilon: Some(1.0),
            ..RedactionConfig::anonymize().with_masking_order(["NER"])
        };
        let ner = GazetteerRecognizer::new().with_numbers(true);
        let r = Redactor::new(config, DetectorRegistry::new(), Arc::new(ner))
            .unwrap()
            .with_noise_seed(99);

        let texts = corpus(&["Han er 100 år"]);
        let a = r.redact_corpus(&texts).unwrap();
        let b = r.redact_corpus(&texts).unwrap();
        assert_eq!(a, b);

        let noised = a.texts[0].trim_start_matches("Han er ").trim_end_matches(" år");
        noised.parse::<i64>().unwrap();
    }

    #[test]
    fn test_numbers_use_placeholder_without_epsilon() {
        let config = RedactionConfig {
            mask_numbers: true,
            ..RedactionConfig::anonymize().with_masking_order(["NER"])
        };
        let ner = GazetteerRecognizer::new().with_numbers(true);
        let r = redactor(config, ner);
        let out = r.redact_corpus(&corpus(&["Han er 100 år"])).unwrap();
        assert_eq!(out.texts[0], "Han er [NUMMER] år");
    }

    #[test]
    fn test_ner_runs_in_batches() {
        let config = RedactionConfig {
            batch_size: 2,
            ..RedactionConfig::anonymize().with_masking_order(["NER"])
        };
        let ner = PrecomputedRecognizer::new()
            .with(0, "Anne", EntityType::Person)
            .with(4, "Aarhus", EntityType::Location);
        let r = redactor(config, ner);
        let out = r
            .redact_corpus(&corpus(&["Anne", "b", "c", "d", "i Aarhus"]))
            .unwrap();
        assert_eq!(out.texts[0], "[PERSON]");
        assert_eq!(out.texts[4], "i [LOKATION]");
    }

    #[test]
    fn test_streaming_events() {
        let ner = PrecomputedRecognizer::new().with(1, "Martin Jespersen", EntityType::Person);
        let r = redactor(RedactionConfig::pseudonymize(), ner);
        let (tx, rx) = mpsc::channel();
        r.redact_corpus_streaming(&corpus(&["ingen her", "Martin Jespersen"]), tx)
            .unwrap();
        let events: Vec<RedactionEvent> = rx.try_iter().collect();

        assert!(matches!(events.first(), Some(RedactionEvent::RunStarted { documents: 2, .. })));
        assert!(matches!(events.last(), Some(RedactionEvent::Done { failed: 0, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, RedactionEvent::NoPersonFound { index: 0 })));
        let done = events
            .iter()
            .filter(|e| matches!(e, RedactionEvent::StageChanged { stage: DocumentStage::Done, .. }))
            .count();
        assert_eq!(done, 2);
    }

    #[test]
    fn test_masked_entities_follow_steps() {
        let config = RedactionConfig {
            mask_misc: true,
            ..RedactionConfig::anonymize()
        };
        let r = redactor(config, NoopRecognizer);
        assert_eq!(
            r.masked_entities(),
            vec!["CPR", "TELEFON", "EMAIL", "PER", "LOC", "ORG", "MISC"]
        );
    }
}
