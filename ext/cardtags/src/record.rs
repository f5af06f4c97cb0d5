use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CardError, Result};
use crate::grammar::{Field, Tag};

/// The five text fields extracted from a card.
///
/// Field text may not contain any tag literal; everything else, including a
/// bare `<` or `>`, is accepted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFields")]
pub struct CardFields {
    company: String,
    name: String,
    email: String,
    phone_number: String,
    address: String,
}

#[derive(Deserialize)]
struct RawFields {
    company: String,
    name: String,
    email: String,
    phone_number: String,
    address: String,
}

impl TryFrom<RawFields> for CardFields {
    type Error = CardError;

    fn try_from(raw: RawFields) -> Result<Self> {
        CardFields::new(raw.company, raw.name, raw.email, raw.phone_number, raw.address)
    }
}

impl CardFields {
    pub fn new(
        company: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        phone_number: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Self> {
        let fields = Self {
            company: company.into(),
            name: name.into(),
            email: email.into(),
            phone_number: phone_number.into(),
            address: address.into(),
        };
        fields.validate()?;
        Ok(fields)
    }

    fn validate(&self) -> Result<()> {
        for field in Field::ALL {
            let text = self.get(field);
            if let Some(tag) = Tag::ALL.into_iter().find(|tag| text.contains(tag.as_str())) {
                return Err(CardError::InvalidField { field, tag });
            }
        }
        Ok(())
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Company => &self.company,
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::PhoneNumber => &self.phone_number,
            Field::Address => &self.address,
        }
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Serialize into the canonical tagged string.
    pub fn to_tagged_string(&self) -> String {
        let body: usize = Field::ALL.iter().map(|f| self.get(*f).len()).sum();
        let tags: usize = Tag::ALL.iter().map(|t| t.as_str().len()).sum();

        let mut out = String::with_capacity(body + tags);
        out.push_str(Tag::Start.as_str());
        for field in Field::ALL {
            out.push_str(field.open().as_str());
            out.push_str(self.get(field));
            out.push_str(field.close().as_str());
        }
        out.push_str(Tag::End.as_str());
        out
    }

    /// Extract the fields from an exact tagged string.
    ///
    /// The text must be exactly what [`CardFields::to_tagged_string`]
    /// produces, so field values come back byte for byte.
    pub fn parse_tagged(text: &str) -> Result<Self> {
        let body = text.strip_prefix(Tag::Start.as_str()).ok_or_else(|| {
            CardError::MalformedTarget(format!("expected `{}` at `{}`", Tag::Start, preview(text)))
        })?;
        let (values, rest) = split_fields(body, false)?;
        if rest != Tag::End.as_str() {
            return Err(CardError::MalformedTarget(format!(
                "expected a final `{}`, found `{}`",
                Tag::End,
                preview(rest)
            )));
        }
        Self::from_values(values)
    }

    /// Extract the fields from decoded model output.
    ///
    /// Text before `<s>` and after `</s>` is ignored, and field values are
    /// trimmed of surrounding whitespace that sub-word decoders tend to insert.
    pub fn parse_generated(text: &str) -> Result<Self> {
        let body = after_tag(text, Tag::Start)?;
        let (values, rest) = split_fields(body, true)?;
        if !rest.trim_start().starts_with(Tag::End.as_str()) {
            return Err(CardError::MalformedTarget(format!(
                "expected `{}` before `{}`",
                Tag::End,
                preview(rest)
            )));
        }
        Self::from_values(values)
    }

    fn from_values(values: Vec<String>) -> Result<Self> {
        let [company, name, email, phone_number, address]: [String; 5] = values
            .try_into()
            .map_err(|_| CardError::MalformedTarget("wrong number of fields".to_string()))?;
        CardFields::new(company, name, email, phone_number, address)
    }
}

/// Read the five `open value close` groups off the front of `text`.
/// Returns the values and whatever follows the last close tag.
fn split_fields(mut rest: &str, lenient: bool) -> Result<(Vec<String>, &str)> {
    let mut values = Vec::with_capacity(Field::ALL.len());

    for field in Field::ALL {
        let open = field.open().as_str();
        let close = field.close().as_str();

        let between = if lenient { rest.trim_start() } else { rest };
        let body = between.strip_prefix(open).ok_or_else(|| {
            CardError::MalformedTarget(format!("expected `{open}` before `{}`", preview(between)))
        })?;
        let end = body
            .find(close)
            .ok_or_else(|| CardError::MalformedTarget(format!("missing `{close}`")))?;

        let value = &body[..end];
        values.push(if lenient { value.trim() } else { value }.to_string());
        rest = &body[end + close.len()..];
    }

    Ok((values, rest))
}

fn after_tag(text: &str, tag: Tag) -> Result<&str> {
    text.find(tag.as_str())
        .map(|at| &text[at + tag.as_str().len()..])
        .ok_or_else(|| CardError::MalformedTarget(format!("missing `{tag}`")))
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(24) {
        Some((at, _)) => &text[..at],
        None => text,
    }
}

/// One labelled card: the image it was read from and its field values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessCard {
    #[serde(rename = "image_path")]
    image_reference: PathBuf,
    #[serde(flatten)]
    fields: CardFields,
}

impl BusinessCard {
    pub fn new(image_reference: impl Into<PathBuf>, fields: CardFields) -> Self {
        Self {
            image_reference: image_reference.into(),
            fields,
        }
    }

    pub fn image_reference(&self) -> &Path {
        &self.image_reference
    }

    pub fn fields(&self) -> &CardFields {
        &self.fields
    }

    pub fn to_tagged_string(&self) -> String {
        self.fields.to_tagged_string()
    }
}
