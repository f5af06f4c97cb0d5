use std::fmt;
use std::str::FromStr;

use crate::error::CardError;

/// Structural markers of the tagged card format.
///
/// Declaration order is serialization order; `Tag::ALL` and `Tag::index`
/// depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Start,
    CompanyOpen,
    CompanyClose,
    NameOpen,
    NameClose,
    EmailOpen,
    EmailClose,
    PhoneNumberOpen,
    PhoneNumberClose,
    AddressOpen,
    AddressClose,
    End,
}

impl Tag {
    pub const COUNT: usize = 12;

    pub const ALL: [Tag; Tag::COUNT] = [
        Tag::Start,
        Tag::CompanyOpen,
        Tag::CompanyClose,
        Tag::NameOpen,
        Tag::NameClose,
        Tag::EmailOpen,
        Tag::EmailClose,
        Tag::PhoneNumberOpen,
        Tag::PhoneNumberClose,
        Tag::AddressOpen,
        Tag::AddressClose,
        Tag::End,
    ];

    /// Literal text of the tag as it appears in tagged strings and in the
    /// tokenizer vocabulary.
    pub const fn as_str(self) -> &'static str {
        match self {
            Tag::Start => "<s>",
            Tag::CompanyOpen => "<s_company>",
            Tag::CompanyClose => "</s_company>",
            Tag::NameOpen => "<s_name>",
            Tag::NameClose => "</s_name>",
            Tag::EmailOpen => "<s_email>",
            Tag::EmailClose => "</s_email>",
            Tag::PhoneNumberOpen => "<s_phone_number>",
            Tag::PhoneNumberClose => "</s_phone_number>",
            Tag::AddressOpen => "<s_address>",
            Tag::AddressClose => "</s_address>",
            Tag::End => "</s>",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// The field this tag opens or closes, if any.
    pub const fn field(self) -> Option<Field> {
        match self {
            Tag::CompanyOpen | Tag::CompanyClose => Some(Field::Company),
            Tag::NameOpen | Tag::NameClose => Some(Field::Name),
            Tag::EmailOpen | Tag::EmailClose => Some(Field::Email),
            Tag::PhoneNumberOpen | Tag::PhoneNumberClose => Some(Field::PhoneNumber),
            Tag::AddressOpen | Tag::AddressClose => Some(Field::Address),
            Tag::Start | Tag::End => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| CardError::UnknownTag(s.to_string()))
    }
}

/// Record fields in serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Company,
    Name,
    Email,
    PhoneNumber,
    Address,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Company,
        Field::Name,
        Field::Email,
        Field::PhoneNumber,
        Field::Address,
    ];

    pub const fn open(self) -> Tag {
        match self {
            Field::Company => Tag::CompanyOpen,
            Field::Name => Tag::NameOpen,
            Field::Email => Tag::EmailOpen,
            Field::PhoneNumber => Tag::PhoneNumberOpen,
            Field::Address => Tag::AddressOpen,
        }
    }

    pub const fn close(self) -> Tag {
        match self {
            Field::Company => Tag::CompanyClose,
            Field::Name => Tag::NameClose,
            Field::Email => Tag::EmailClose,
            Field::PhoneNumber => Tag::PhoneNumberClose,
            Field::Address => Tag::AddressClose,
        }
    }

    /// Key used for this field in `label.json`.
    pub const fn key(self) -> &'static str {
        match self {
            Field::Company => "company",
            Field::Name => "name",
            Field::Email => "email",
            Field::PhoneNumber => "phone_number",
            Field::Address => "address",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
