//! Tag-grammar tooling for Donut-style business-card extraction.
//!
//! A card is serialized into a fixed tagged string for training
//! ([`encoder`]), and at inference time [`decoder::TagConstraint`] keeps the
//! model from emitting tags out of order.

pub mod dataset;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod generation;
pub mod grammar;
pub mod record;
pub mod tokenizer;

pub use dataset::{load_labels, save_labels, CardDataset, TrainingExample};
pub use decoder::{ActiveTag, TagConstraint, UnseededPolicy};
pub use encoder::{encode_target, mask_labels, mask_padding, EncodedTarget, TargetEncoder, IGNORE_INDEX};
pub use error::{CardError, Result};
pub use generation::{CardExtractor, ConstrainedGeneration, GeneratedSequence, GenerationConfig, LogitsSource};
pub use grammar::{Field, Grammar, Tag, TagSet};
pub use record::{BusinessCard, CardFields};
pub use tokenizer::{loader::TokenizerLoader, TagTokenizer, TagVocabulary};
