use candle_core::{DType, Tensor};
use candle_transformers::generation::LogitsProcessor;
use tracing::debug;

pub mod config;

pub use config::GenerationConfig;

use crate::decoder::TagConstraint;
use crate::error::Result;
use crate::grammar::{Grammar, Tag};
use crate::record::CardFields;
use crate::tokenizer::TagTokenizer;

/// Anything that scores the next token given the tokens so far.
///
/// For an image-to-text model the image encoding is captured by the
/// implementor; only the decoder history is passed in.
pub trait LogitsSource {
    /// Next-token logits of shape `(vocab,)`.
    fn next_logits(&mut self, tokens: &[u32]) -> Result<Tensor>;
}

/// Output of one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSequence {
    /// Generated ids, starting with the `<s>` seed.
    pub tokens: Vec<u32>,
    /// Sum of the log-probabilities of the chosen tokens under the
    /// constrained distribution.
    pub log_prob: f64,
    /// Whether `</s>` was produced before `max_length`.
    pub finished: bool,
}

/// Drives generation one token at a time, applying the tag constraint to
/// every step's logits before sampling.
pub struct ConstrainedGeneration {
    constraint: TagConstraint,
    logits_processor: LogitsProcessor,
    max_length: usize,
}

impl ConstrainedGeneration {
    pub fn new(constraint: TagConstraint, config: &GenerationConfig) -> Self {
        let logits_processor = LogitsProcessor::new(config.seed, Some(config.temperature), config.top_p);

        Self {
            constraint: constraint.with_policy(config.unseeded_policy),
            logits_processor,
            max_length: config.max_length,
        }
    }

    pub fn constraint(&self) -> &TagConstraint {
        &self.constraint
    }

    /// Generate from a `<s>` seed until `</s>` or `max_length` tokens.
    pub fn generate<M: LogitsSource + ?Sized>(&mut self, model: &mut M) -> Result<GeneratedSequence> {
        let end = self.constraint.tags().id(Tag::End);
        let mut tokens = vec![self.constraint.tags().id(Tag::Start)];
        let mut log_prob = 0.0;
        let mut finished = false;

        while tokens.len() < self.max_length {
            let logits = model.next_logits(&tokens)?.unsqueeze(0)?;
            let logits = self
                .constraint
                .constrain(std::slice::from_ref(&tokens), &logits)?
                .squeeze(0)?
                .to_dtype(DType::F32)?;

            let next = self.logits_processor.sample(&logits)?;
            let step_log_prob = candle_nn::ops::log_softmax(&logits, 0)?
                .get(next as usize)?
                .to_scalar::<f32>()?;
            log_prob += f64::from(step_log_prob);
            tokens.push(next);

            if next == end {
                finished = true;
                break;
            }
        }

        debug!(len = tokens.len(), finished, log_prob, "generation stopped");
        Ok(GeneratedSequence {
            tokens,
            log_prob,
            finished,
        })
    }
}

/// A card read back from generated tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCard {
    pub fields: CardFields,
    pub text: String,
    pub sequence: GeneratedSequence,
}

/// Generation plus decoding and parsing of the tagged output.
pub struct CardExtractor {
    tokenizer: TagTokenizer,
    generation: ConstrainedGeneration,
}

impl CardExtractor {
    pub fn new(tokenizer: TagTokenizer, config: &GenerationConfig) -> Self {
        let constraint = TagConstraint::new(Grammar::business_card(), *tokenizer.tags());
        Self {
            generation: ConstrainedGeneration::new(constraint, config),
            tokenizer,
        }
    }

    pub fn tokenizer(&self) -> &TagTokenizer {
        &self.tokenizer
    }

    pub fn extract<M: LogitsSource + ?Sized>(&mut self, model: &mut M) -> Result<ExtractedCard> {
        let sequence = self.generation.generate(model)?;
        let text = self.tokenizer.decode(&sequence.tokens)?;
        let fields = CardFields::parse_generated(&text)?;
        Ok(ExtractedCard {
            fields,
            text,
            sequence,
        })
    }
}
