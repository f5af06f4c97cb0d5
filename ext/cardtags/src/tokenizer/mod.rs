pub mod loader;

use tokenizers::{AddedToken, Tokenizer};
use tracing::debug;

use crate::error::{CardError, Result};
use crate::grammar::Tag;

/// Token ids of the twelve grammar tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagVocabulary {
    ids: [u32; Tag::COUNT],
}

impl TagVocabulary {
    /// Use an externally known tag-to-id mapping, ordered like `Tag::ALL`.
    pub fn from_ids(ids: [u32; Tag::COUNT]) -> Self {
        Self { ids }
    }

    /// Resolve every tag in `tokenizer`. Each tag must be a single, unsplit
    /// token.
    pub fn from_tokenizer(tokenizer: &Tokenizer) -> Result<Self> {
        let mut ids = [0u32; Tag::COUNT];
        for tag in Tag::ALL {
            let id = tokenizer
                .token_to_id(tag.as_str())
                .ok_or(CardError::TagNotInVocabulary(tag))?;

            let encoding = tokenizer
                .encode(tag.as_str(), false)
                .map_err(|e| CardError::Tokenizer(e.to_string()))?;
            if encoding.get_ids() != [id] {
                return Err(CardError::TagNotInVocabulary(tag));
            }

            ids[tag.index()] = id;
        }
        Ok(Self { ids })
    }

    pub fn id(&self, tag: Tag) -> u32 {
        self.ids[tag.index()]
    }

    /// The tag represented by `token_id`, if it is one of the tag tokens.
    pub fn tag(&self, token_id: u32) -> Option<Tag> {
        self.ids
            .iter()
            .position(|id| *id == token_id)
            .map(|i| Tag::ALL[i])
    }

    pub fn is_tag(&self, token_id: u32) -> bool {
        self.ids.contains(&token_id)
    }

    /// `(tag, id)` pairs in `Tag::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, u32)> + '_ {
        Tag::ALL.into_iter().zip(self.ids.iter().copied())
    }
}

/// A tokenizer with the grammar tags registered as atomic special tokens.
///
/// Tokenizer-level padding and truncation are switched off; fixed-length
/// handling belongs to [`crate::encoder::TargetEncoder`].
#[derive(Clone, Debug)]
pub struct TagTokenizer {
    tokenizer: Tokenizer,
    tags: TagVocabulary,
    pad_id: u32,
    /// Literals of the tokenizer's own special tokens plus the padding
    /// token. Text containing one would not survive the label mask.
    reserved: Vec<String>,
}

impl TagTokenizer {
    const PAD_TOKENS: [&'static str; 3] = ["<pad>", "[PAD]", "<|pad|>"];

    pub fn new(mut tokenizer: Tokenizer) -> Result<Self> {
        let added = tokenizer.add_special_tokens(&Tag::ALL.map(|tag| AddedToken::from(tag.as_str(), true)));
        debug!(added, "registered grammar tags as special tokens");

        let pad_id = match tokenizer.get_padding() {
            Some(params) => Some(params.pad_id),
            None => Self::PAD_TOKENS
                .iter()
                .find_map(|token| tokenizer.token_to_id(token)),
        }
        .ok_or(CardError::MissingPadToken)?;

        tokenizer.with_padding(None);
        let _ = tokenizer.with_truncation(None);

        let tags = TagVocabulary::from_tokenizer(&tokenizer)?;
        let mut reserved: Vec<String> = tokenizer
            .get_added_tokens_decoder()
            .into_iter()
            .filter(|(_, token)| token.special && token.content.parse::<Tag>().is_err())
            .map(|(_, token)| token.content)
            .collect();
        reserved.sort_unstable();
        debug!(?reserved, "special tokens barred from field text");

        let mut tokenizer = Self {
            tokenizer,
            tags,
            pad_id: 0,
            reserved,
        };
        tokenizer.set_pad_id(pad_id)?;
        Ok(tokenizer)
    }

    /// Use `token` as the padding token instead of the detected one.
    pub fn with_pad_token(mut self, token: &str) -> Result<Self> {
        let pad_id = self
            .tokenizer
            .token_to_id(token)
            .ok_or(CardError::MissingPadToken)?;
        self.set_pad_id(pad_id)?;
        Ok(self)
    }

    // Padding is masked out of the labels, so it can never share an id with a tag.
    fn set_pad_id(&mut self, pad_id: u32) -> Result<()> {
        if let Some(tag) = self.tags.tag(pad_id) {
            return Err(CardError::PadIsTag(tag));
        }
        self.pad_id = pad_id;
        if let Some(pad) = self.tokenizer.id_to_token(pad_id) {
            if !self.reserved.contains(&pad) {
                self.reserved.push(pad);
            }
        }
        Ok(())
    }

    /// The first reserved token literal found in `text`.
    pub fn reserved_token_in(&self, text: &str) -> Option<&str> {
        self.reserved
            .iter()
            .find(|token| text.contains(token.as_str()))
            .map(String::as_str)
    }

    /// Encode text without adding any special tokens of the tokenizer's own.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| CardError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decode ids to text, keeping tag tokens so the result can be parsed.
    pub fn decode(&self, token_ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(token_ids, false)
            .map_err(|e| CardError::Tokenizer(e.to_string()))
    }

    pub fn tags(&self) -> &TagVocabulary {
        &self.tags
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn inner(&self) -> &Tokenizer {
        &self.tokenizer
    }
}
