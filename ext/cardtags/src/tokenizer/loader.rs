use hf_hub::api::tokio::{Api, ApiRepo};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tracing::info;

use super::TagTokenizer;
use crate::error::{CardError, Result};

/// Loads tokenizers and registers the grammar tags on them.
pub struct TokenizerLoader;

impl TokenizerLoader {
    /// Load a tokenizer.json from a local path
    pub fn from_file(path: impl AsRef<Path>) -> Result<TagTokenizer> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            CardError::Tokenizer(format!(
                "failed to load tokenizer from {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(path = %path.display(), "loaded tokenizer");
        TagTokenizer::new(tokenizer)
    }

    /// Load a tokenizer from an in-memory tokenizer.json document
    pub fn from_json_str(json: &str) -> Result<TagTokenizer> {
        let tokenizer: Tokenizer = json
            .parse()
            .map_err(|e| CardError::Tokenizer(format!("invalid tokenizer document: {}", e)))?;
        TagTokenizer::new(tokenizer)
    }

    /// Download and load a tokenizer from the HuggingFace hub
    pub async fn from_hf_hub(repo_id: &str, filename: Option<&str>) -> Result<TagTokenizer> {
        let api = Api::new()
            .map_err(|e| CardError::Tokenizer(format!("failed to create HF API: {}", e)))?;

        let repo = api.model(repo_id.to_string());
        let tokenizer_path = Self::download_tokenizer_file(&repo, filename).await?;

        Self::from_file(tokenizer_path)
    }

    /// Blocking form of [`TokenizerLoader::from_hf_hub`] for callers without
    /// a runtime of their own.
    pub fn from_hf_hub_blocking(repo_id: &str, filename: Option<&str>) -> Result<TagTokenizer> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(Self::from_hf_hub(repo_id, filename))
    }

    async fn download_tokenizer_file(repo: &ApiRepo, filename: Option<&str>) -> Result<PathBuf> {
        if let Some(file) = filename {
            return repo.get(file).await.map_err(|e| {
                CardError::Tokenizer(format!("failed to download tokenizer file '{}': {}", file, e))
            });
        }

        // Only tokenizer.json carries the added-token table the tags need.
        repo.get("tokenizer.json").await.map_err(|e| {
            CardError::Tokenizer(format!("no tokenizer.json in repository: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Tag;
    use crate::tokenizer::test_support::char_tokenizer;

    #[test]
    fn test_from_file_registers_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        char_tokenizer().save(&path, false).unwrap();

        let tokenizer = TokenizerLoader::from_file(&path).unwrap();
        assert!(tokenizer.inner().token_to_id(Tag::AddressOpen.as_str()).is_some());
    }

    #[test]
    fn test_from_json_str_rejects_garbage() {
        assert!(matches!(
            TokenizerLoader::from_json_str("{not json"),
            Err(CardError::Tokenizer(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_from_hf_hub_missing_repo() {
        // Offline runs and unknown repositories both surface as tokenizer errors.
        let result = TokenizerLoader::from_hf_hub("cardtags/does-not-exist", None).await;
        assert!(matches!(result, Err(CardError::Tokenizer(_))));
    }
}
