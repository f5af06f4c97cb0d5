//! Tag grammar for the tagged card format.
//!
//! The grammar is a transition table from a tag to the set of tags that may
//! follow it. The business-card instance is a strict chain, but a table may
//! branch: any non-terminal tag can have one or more successors.

pub mod tag;

pub use tag::{Field, Tag};

use crate::error::{CardError, Result};

/// A set of tags, stored as a bitmask over `Tag::index`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TagSet(u16);

impl TagSet {
    pub const EMPTY: TagSet = TagSet(0);

    pub const fn single(tag: Tag) -> Self {
        TagSet(1 << tag.index())
    }

    pub const fn with(self, tag: Tag) -> Self {
        TagSet(self.0 | 1 << tag.index())
    }

    pub fn insert(&mut self, tag: Tag) {
        self.0 |= 1 << tag.index();
    }

    pub const fn contains(self, tag: Tag) -> bool {
        self.0 & (1 << tag.index()) != 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Tags in the set, in `Tag::ALL` order.
    pub fn iter(self) -> impl Iterator<Item = Tag> {
        Tag::ALL.into_iter().filter(move |tag| self.contains(*tag))
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut set = TagSet::EMPTY;
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

/// Next-allowed-tag relation, indexed by `Tag::index`.
///
/// An empty entry means the tag has no successor; `Tag::End` always has an
/// empty entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    successors: [TagSet; Tag::COUNT],
}

impl Grammar {
    /// The business-card grammar: every tag is followed by the next one in
    /// `Tag::ALL`, ending at `</s>`.
    pub const fn business_card() -> Self {
        let mut successors = [TagSet::EMPTY; Tag::COUNT];
        let mut i = 0;
        while i + 1 < Tag::COUNT {
            successors[i] = TagSet::single(Tag::ALL[i + 1]);
            i += 1;
        }
        Self { successors }
    }

    /// Build a grammar from explicit transitions.
    ///
    /// Every tag except `</s>` must receive at least one successor, and `</s>`
    /// must receive none.
    pub fn from_transitions<I>(transitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Tag, TagSet)>,
    {
        let mut successors = [TagSet::EMPTY; Tag::COUNT];
        for (tag, next) in transitions {
            if tag == Tag::End {
                return Err(CardError::UnknownTag(tag.to_string()));
            }
            let entry = &mut successors[tag.index()];
            *entry = TagSet(entry.0 | next.0);
        }

        if let Some(missing) = Tag::ALL
            .into_iter()
            .filter(|tag| *tag != Tag::End)
            .find(|tag| successors[tag.index()].is_empty())
        {
            return Err(CardError::UnknownTag(missing.to_string()));
        }

        Ok(Self { successors })
    }

    /// All tags in serialization order.
    pub fn tags(&self) -> &'static [Tag; Tag::COUNT] {
        &Tag::ALL
    }

    /// Tags allowed directly after `tag`. Fails for `</s>`.
    pub fn next_allowed(&self, tag: Tag) -> Result<TagSet> {
        let next = self.successors[tag.index()];
        if next.is_empty() {
            return Err(CardError::UnknownTag(tag.to_string()));
        }
        Ok(next)
    }

    /// Same as [`Grammar::next_allowed`] for a tag given by its literal text.
    pub fn next_allowed_str(&self, tag: &str) -> Result<TagSet> {
        self.next_allowed(tag.parse()?)
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::business_card()
    }
}
