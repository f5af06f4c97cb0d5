use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::encoder::TargetEncoder;
use crate::error::Result;
use crate::record::BusinessCard;

/// Name of the label file inside a dataset directory.
pub const LABEL_FILE: &str = "label.json";

/// Read `dir/label.json`.
pub fn load_labels(dir: impl AsRef<Path>) -> Result<Vec<BusinessCard>> {
    let path = dir.as_ref().join(LABEL_FILE);
    let reader = BufReader::new(File::open(&path)?);
    let cards: Vec<BusinessCard> = serde_json::from_reader(reader)?;
    info!(path = %path.display(), cards = cards.len(), "loaded labels");
    Ok(cards)
}

/// Write `dir/label.json`, creating `dir` if needed.
pub fn save_labels(dir: impl AsRef<Path>, cards: &[BusinessCard]) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let mut writer = BufWriter::new(File::create(dir.join(LABEL_FILE))?);
    serde_json::to_writer_pretty(&mut writer, cards)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// One training item: the image to load and the target it should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingExample {
    pub image_path: PathBuf,
    pub input_ids: Vec<u32>,
    pub labels: Vec<i64>,
    pub target: String,
}

/// Labelled cards paired with the encoder that turns them into targets.
pub struct CardDataset {
    cards: Vec<BusinessCard>,
    encoder: TargetEncoder,
}

impl CardDataset {
    pub fn new(cards: Vec<BusinessCard>, encoder: TargetEncoder) -> Self {
        Self { cards, encoder }
    }

    pub fn load(dir: impl AsRef<Path>, encoder: TargetEncoder) -> Result<Self> {
        Ok(Self::new(load_labels(dir)?, encoder))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[BusinessCard] {
        &self.cards
    }

    pub fn encoder(&self) -> &TargetEncoder {
        &self.encoder
    }

    /// Encode the card at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<Result<TrainingExample>> {
        let card = self.cards.get(index)?;
        Some(self.encoder.encode(card).map(|encoded| TrainingExample {
            image_path: card.image_reference().to_path_buf(),
            input_ids: encoded.input_ids,
            labels: encoded.labels,
            target: card.to_tagged_string(),
        }))
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<TrainingExample>> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::IGNORE_INDEX;
    use crate::error::CardError;
    use crate::record::CardFields;
    use crate::tokenizer::test_support::char_tokenizer;
    use crate::tokenizer::TagTokenizer;

    fn cards() -> Vec<BusinessCard> {
        vec![
            BusinessCard::new(
                "images/0.png",
                CardFields::new("Acme", "Taro", "t@a.co", "000", "Tokyo").unwrap(),
            ),
            BusinessCard::new(
                "images/1.png",
                CardFields::new("株式会社テスト", "山田 太郎", "y@t.jp", "03-0000-0000", "東京都").unwrap(),
            ),
        ]
    }

    fn encoder() -> TargetEncoder {
        TargetEncoder::new(TagTokenizer::new(char_tokenizer()).unwrap(), 64)
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train");
        save_labels(&train, &cards()).unwrap();

        let text = std::fs::read_to_string(train.join(LABEL_FILE)).unwrap();
        assert!(text.contains("株式会社テスト"), "non-ASCII text is written verbatim");
        assert!(text.contains("\"phone_number\": \"03-0000-0000\""));

        assert_eq!(load_labels(&train).unwrap(), cards());
    }

    #[test]
    fn test_missing_label_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_labels(dir.path()), Err(CardError::Io(_))));
    }

    #[test]
    fn test_invalid_record_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(LABEL_FILE),
            r#"[{"image_path": "0.png", "company": "</s>", "name": "", "email": "", "phone_number": "", "address": ""}]"#,
        )
        .unwrap();
        assert!(matches!(load_labels(dir.path()), Err(CardError::Json(_))));
    }

    #[test]
    fn test_examples() {
        let dataset = CardDataset::new(cards(), encoder());
        assert_eq!(dataset.len(), 2);

        let example = dataset.get(0).unwrap().unwrap();
        assert_eq!(example.image_path, PathBuf::from("images/0.png"));
        assert_eq!(example.target, dataset.cards()[0].to_tagged_string());
        assert_eq!(example.labels.len(), 64);
        assert_eq!(example.labels[63], IGNORE_INDEX);

        assert!(dataset.get(2).is_none());
        assert_eq!(dataset.iter().count(), 2);
    }
}
