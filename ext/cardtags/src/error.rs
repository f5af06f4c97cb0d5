use thiserror::Error;

use crate::grammar::{Field, Tag};

/// Errors raised while encoding training targets or constraining generation.
///
/// None of these are transient: the same inputs always produce the same
/// failure, so callers should stop the operation in progress rather than retry.
#[derive(Debug, Error)]
pub enum CardError {
    #[error("tag `{0}` has no successor in the grammar")]
    UnknownTag(String),
    #[error("no grammar tag has been generated yet; seed the history with `{}`", Tag::Start)]
    NoActiveTag,
    #[error("batch row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: Box<CardError>,
    },
    #[error("tag `{0}` is not an atomic token of the tokenizer vocabulary")]
    TagNotInVocabulary(Tag),
    #[error("tokenizer has no padding token")]
    MissingPadToken,
    #[error("padding token is the grammar tag `{0}`")]
    PadIsTag(Tag),
    #[error("field `{field}` contains the special token `{token}`")]
    ReservedToken { field: Field, token: String },
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("got {histories} token histories for {rows} score rows")]
    BatchMismatch { histories: usize, rows: usize },
    #[error("token id {token_id} is outside the score vector of width {width}")]
    ScoreWidth { token_id: u32, width: usize },
    #[error("field `{field}` contains the tag literal `{tag}`")]
    InvalidField { field: Field, tag: Tag },
    #[error("malformed tagged string: {0}")]
    MalformedTarget(String),
    #[error(transparent)]
    Candle(#[from] candle_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CardError {
    pub(crate) fn in_row(self, row: usize) -> Self {
        CardError::Row {
            row,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, CardError>;
