use cardtags::{TagTokenizer, TokenizerLoader};

/// Character-level tokenizer over printable ASCII with the tags registered.
pub fn tag_tokenizer() -> TagTokenizer {
    TokenizerLoader::from_json_str(include_str!("../fixtures/char_tokenizer.json")).unwrap()
}
