//! Grammar-constrained decoding.
//!
//! At every generation step the most recent tag in each history decides which
//! tags may come next. Every other tag token gets a score of `-inf`; ordinary
//! text tokens are left alone. The constraint keeps no state between calls.

use candle_core::Tensor;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CardError, Result};
use crate::grammar::{Grammar, Tag, TagSet};
use crate::tokenizer::TagVocabulary;

/// What to do when a history contains no tag at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnseededPolicy {
    /// Fail with [`CardError::NoActiveTag`]. The caller must seed `<s>`.
    #[default]
    Reject,
    /// Treat the history as sitting before `<s>`: only `<s>` is allowed.
    ForceStart,
}

/// The most recent tag of a history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTag {
    Found(Tag),
    NotYet,
}

/// Suppresses tag tokens that the grammar does not allow next.
#[derive(Debug, Clone)]
pub struct TagConstraint {
    grammar: Grammar,
    tags: TagVocabulary,
    policy: UnseededPolicy,
}

impl TagConstraint {
    pub fn new(grammar: Grammar, tags: TagVocabulary) -> Self {
        Self {
            grammar,
            tags,
            policy: UnseededPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnseededPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn tags(&self) -> &TagVocabulary {
        &self.tags
    }

    pub fn active_tag(&self, history: &[u32]) -> ActiveTag {
        history
            .iter()
            .rev()
            .find_map(|id| self.tags.tag(*id))
            .map_or(ActiveTag::NotYet, ActiveTag::Found)
    }

    /// Tags that may be generated next after `history`.
    pub fn allowed_tags(&self, history: &[u32]) -> Result<TagSet> {
        match (self.active_tag(history), self.policy) {
            (ActiveTag::Found(tag), _) => self.grammar.next_allowed(tag),
            (ActiveTag::NotYet, UnseededPolicy::ForceStart) => Ok(TagSet::single(Tag::Start)),
            (ActiveTag::NotYet, UnseededPolicy::Reject) => Err(CardError::NoActiveTag),
        }
    }

    /// Ids of every tag token not allowed after `history`.
    pub fn forbidden_ids(&self, history: &[u32]) -> Result<Vec<u32>> {
        let allowed = self.allowed_tags(history)?;
        Ok(self
            .tags
            .iter()
            .filter(|(tag, _)| !allowed.contains(*tag))
            .map(|(_, id)| id)
            .collect())
    }

    /// Constrain one score vector in place.
    pub fn constrain_row(&self, history: &[u32], scores: &mut [f32]) -> Result<()> {
        let forbidden = self.forbidden_ids(history)?;
        if let Some(id) = forbidden.iter().copied().find(|id| *id as usize >= scores.len()) {
            return Err(CardError::ScoreWidth {
                token_id: id,
                width: scores.len(),
            });
        }
        for id in forbidden {
            scores[id as usize] = f32::NEG_INFINITY;
        }
        Ok(())
    }

    /// Constrain a batch of score vectors in place, one per history.
    pub fn constrain_rows<H: AsRef<[u32]>>(
        &self,
        histories: &[H],
        scores: &mut [Vec<f32>],
    ) -> Result<()> {
        if histories.len() != scores.len() {
            return Err(CardError::BatchMismatch {
                histories: histories.len(),
                rows: scores.len(),
            });
        }
        for (row, (history, row_scores)) in histories.iter().zip(scores.iter_mut()).enumerate() {
            self.constrain_row(history.as_ref(), row_scores)
                .map_err(|e| e.in_row(row))?;
        }
        Ok(())
    }

    /// Constrain a `(batch, vocab)` score tensor of any float dtype.
    ///
    /// Returns a new tensor on the same device; forbidden positions hold
    /// `-inf`, every other position is copied unchanged.
    pub fn constrain<H: AsRef<[u32]>>(&self, histories: &[H], scores: &Tensor) -> Result<Tensor> {
        let (rows, width) = scores.dims2()?;
        if histories.len() != rows {
            return Err(CardError::BatchMismatch {
                histories: histories.len(),
                rows,
            });
        }

        let mut mask = vec![0u8; rows * width];
        for (row, history) in histories.iter().enumerate() {
            let history = history.as_ref();
            let forbidden = self.forbidden_ids(history).map_err(|e| e.in_row(row))?;
            debug!(
                row,
                active = ?self.active_tag(history),
                forbidden = forbidden.len(),
                "constraining scores"
            );

            let offset = row * width;
            for id in forbidden {
                if id as usize >= width {
                    return Err(CardError::ScoreWidth { token_id: id, width }.in_row(row));
                }
                mask[offset + id as usize] = 1;
            }
        }

        let device = scores.device();
        let mask = Tensor::from_vec(mask, (rows, width), device)?;
        let neg_inf = Tensor::new(f32::NEG_INFINITY, device)?
            .to_dtype(scores.dtype())?
            .broadcast_as((rows, width))?;
        Ok(mask.where_cond(&neg_inf, scores)?)
    }
}
