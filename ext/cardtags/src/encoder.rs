//! Training targets: tagged string -> fixed-length token ids -> masked labels.

use candle_core::{Device, Tensor};
use tracing::warn;

use crate::error::{CardError, Result};
use crate::grammar::Field;
use crate::record::{BusinessCard, CardFields};
use crate::tokenizer::TagTokenizer;

/// Label value skipped by the loss.
pub const IGNORE_INDEX: i64 = -100;

/// Fixed-length token ids and labels for one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTarget {
    pub input_ids: Vec<u32>,
    pub labels: Vec<i64>,
    /// Length of the tokenized tagged string before padding or truncation.
    pub token_count: usize,
    /// Set when trailing tokens were cut to fit the length.
    pub truncated: bool,
}

/// Replace every padding id with [`IGNORE_INDEX`].
pub fn mask_padding(input_ids: &[u32], pad_id: u32) -> Vec<i64> {
    let labels: Vec<i64> = input_ids.iter().map(|id| i64::from(*id)).collect();
    mask_labels(&labels, pad_id)
}

/// Same substitution on an existing label sequence. Applying it to its own
/// output changes nothing.
pub fn mask_labels(labels: &[i64], pad_id: u32) -> Vec<i64> {
    let pad = i64::from(pad_id);
    labels
        .iter()
        .map(|label| if *label == pad { IGNORE_INDEX } else { *label })
        .collect()
}

/// Tokenize `fields` into exactly `max_length` ids, right-padded or cut.
///
/// Field text containing one of the tokenizer's special tokens is rejected;
/// it would otherwise tokenize to that token and, for padding, vanish from
/// the labels.
pub fn encode_target(
    fields: &CardFields,
    tokenizer: &TagTokenizer,
    max_length: usize,
) -> Result<EncodedTarget> {
    for field in Field::ALL {
        if let Some(token) = tokenizer.reserved_token_in(fields.get(field)) {
            return Err(CardError::ReservedToken {
                field,
                token: token.to_string(),
            });
        }
    }

    let target = fields.to_tagged_string();
    let mut input_ids = tokenizer.encode(&target)?;
    let token_count = input_ids.len();

    let truncated = token_count > max_length;
    if truncated {
        warn!(
            token_count,
            max_length,
            dropped = token_count - max_length,
            "tagged string truncated; trailing fields are lost"
        );
    }
    input_ids.resize(max_length, tokenizer.pad_id());

    let labels = mask_padding(&input_ids, tokenizer.pad_id());
    Ok(EncodedTarget {
        input_ids,
        labels,
        token_count,
        truncated,
    })
}

/// Encodes cards into training targets of a fixed length.
#[derive(Clone, Debug)]
pub struct TargetEncoder {
    tokenizer: TagTokenizer,
    max_length: usize,
}

impl TargetEncoder {
    pub fn new(tokenizer: TagTokenizer, max_length: usize) -> Self {
        Self {
            tokenizer,
            max_length,
        }
    }

    pub fn tokenizer(&self) -> &TagTokenizer {
        &self.tokenizer
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn encode(&self, card: &BusinessCard) -> Result<EncodedTarget> {
        encode_target(card.fields(), &self.tokenizer, self.max_length)
    }

    pub fn encode_batch(&self, cards: &[BusinessCard]) -> Result<Vec<EncodedTarget>> {
        cards.iter().map(|card| self.encode(card)).collect()
    }

    /// Stack the labels of `targets` into an `i64` tensor of shape
    /// `(targets.len(), max_length)`.
    pub fn labels_tensor(&self, targets: &[EncodedTarget], device: &Device) -> Result<Tensor> {
        let flat: Vec<i64> = targets
            .iter()
            .flat_map(|t| t.labels.iter().copied())
            .collect();
        Ok(Tensor::from_vec(flat, (targets.len(), self.max_length), device)?)
    }
}
