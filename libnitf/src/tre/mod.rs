//! Tagged record extensions (TREs)
//!
//! A TRE run is a sequence of `CETAG` (6) / `CEL` (5) / `CEDATA` records. Tags with a registered
//! [`TreDescriptor`] are decoded into a tree of [`TreEntry`] values; any other tag is kept as
//! an opaque blob so it can be written back unchanged.

mod descriptor;
mod parse;
mod registry;
mod write;

pub use descriptor::{DescriptorNode, FieldType, TreDescriptor, WidthExpr, WidthOp, WidthTerm};
pub use parse::parse_tre_bytes;
pub use registry::TreRegistry;
pub use write::encode_tres;

pub(crate) use parse::{parse_tres, read_extension_section};
pub(crate) use write::write_extension_section;

use itertools::Itertools;

use crate::{
    error::{Error, Result},
    reader::latin1,
};

/// Width of the `CETAG` field
pub const TAG_WIDTH: usize = 6;
/// Width of the `CEL` field
pub const LENGTH_WIDTH: usize = 5;

/// Which subheader section a TRE was read from, so it can be written back to the same place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreSource {
    /// File header `UDHD`
    UserDefinedHeaderData,
    /// File header `XHD`
    ExtendedHeaderData,
    /// Image subheader `UDID`
    UserDefinedImageData,
    /// Image subheader `IXSHD`
    ImageExtendedSubheaderData,
    /// Graphic subheader `SXSHD`
    GraphicExtendedSubheaderData,
    /// Symbol subheader `SXSHD`
    SymbolExtendedSubheaderData,
    /// Label subheader `LXSHD`
    LabelExtendedSubheaderData,
    /// Text subheader `TXSHD`
    TextExtendedSubheaderData,
    /// Data of a TRE overflow DES
    TreOverflowDes,
}

/// A leaf value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreSimpleEntry {
    name: String,
    field_type: FieldType,
    value: Vec<u8>,
}

impl TreSimpleEntry {
    /// Creates a new [`TreSimpleEntry`] holding the field bytes exactly as they are encoded
    pub fn new(name: impl Into<String>, field_type: FieldType, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            field_type,
            value: value.into(),
        }
    }

    /// Field name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared data type
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Encoded bytes
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.value
    }

    /// Encoded bytes as text with trailing spaces removed
    #[must_use]
    pub fn text(&self) -> String {
        let text = latin1(&self.value);
        text.trim_end_matches(' ').to_owned()
    }

    /// Unsigned interpretation: big-endian bytes for `uint` fields, decimal text otherwise
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTreValue`] if the value is not a number or is wider than 128 bits
    pub fn as_u128(&self) -> Result<u128> {
        match self.field_type {
            FieldType::Uint | FieldType::Binary => {
                let significant = self
                    .value
                    .iter()
                    .skip_while(|&&b| b == 0)
                    .copied()
                    .collect_vec();
                if significant.len() > 16 {
                    return Err(self.invalid());
                }
                Ok(significant
                    .into_iter()
                    .fold(0, |acc, b| (acc << 8) | u128::from(b)))
            }
            _ => self.text().trim().parse().map_err(|_| self.invalid()),
        }
    }

    /// Signed interpretation, using [`Self::as_u128`] for `uint` fields
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTreValue`] if the value is not a number or does not fit in `i64`
    pub fn as_i64(&self) -> Result<i64> {
        match self.field_type {
            FieldType::Uint | FieldType::Binary => {
                i64::try_from(self.as_u128()?).map_err(|_| self.invalid())
            }
            _ => self.text().trim().parse().map_err(|_| self.invalid()),
        }
    }

    /// Floating point interpretation of the text
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTreValue`] if the text is not a decimal number
    pub fn as_f64(&self) -> Result<f64> {
        self.text().trim().parse().map_err(|_| self.invalid())
    }

    fn invalid(&self) -> Error {
        Error::InvalidTreValue {
            name: self.name.clone(),
            value: latin1(&self.value),
        }
    }
}

/// A repeated block: one [`TreGroup`] per iteration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreGroupListEntry {
    name: String,
    groups: Vec<TreGroup>,
}

impl TreGroupListEntry {
    /// Creates a new [`TreGroupListEntry`]
    pub fn new(name: impl Into<String>, groups: Vec<TreGroup>) -> Self {
        Self {
            name: name.into(),
            groups,
        }
    }

    /// Entry name (the loop count expression)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The iterations
    #[must_use]
    pub fn groups(&self) -> &[TreGroup] {
        &self.groups
    }
}

/// A node of a decoded TRE
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreEntry {
    /// A leaf field
    Simple(TreSimpleEntry),
    /// A repeated block
    GroupList(TreGroupListEntry),
}

impl TreEntry {
    /// Entry name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(e) => e.name(),
            Self::GroupList(e) => e.name(),
        }
    }
}

/// An ordered list of entries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreGroup {
    entries: Vec<TreEntry>,
}

impl TreGroup {
    /// Creates an empty [`TreGroup`]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an entry
    pub fn push(&mut self, entry: TreEntry) {
        self.entries.push(entry);
    }

    /// The entries in encoded order
    #[must_use]
    pub fn entries(&self) -> &[TreEntry] {
        &self.entries
    }

    pub(crate) fn find_simple(&self, name: &str) -> Option<&TreSimpleEntry> {
        self.entries.iter().rev().find_map(|e| match e {
            TreEntry::Simple(s) if s.name == name => Some(s),
            _ => None,
        })
    }

    /// Looks up an entry by name
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] if no entry has that name
    pub fn entry(&self, name: &str) -> Result<&TreEntry> {
        self.entries
            .iter()
            .find(|e| e.name() == name)
            .ok_or_else(|| Error::MissingEntry(name.to_owned()))
    }

    /// Looks up a leaf entry by name
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] if no leaf entry has that name
    pub fn simple_entry(&self, name: &str) -> Result<&TreSimpleEntry> {
        self.find_simple(name)
            .ok_or_else(|| Error::MissingEntry(name.to_owned()))
    }

    /// Looks up a repeated block by name
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] if no repeated block has that name
    pub fn group_list(&self, name: &str) -> Result<&TreGroupListEntry> {
        self.entries
            .iter()
            .find_map(|e| match e {
                TreEntry::GroupList(g) if g.name == name => Some(g),
                _ => None,
            })
            .ok_or_else(|| Error::MissingEntry(name.to_owned()))
    }

    /// Text value of a leaf entry
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] if no leaf entry has that name
    pub fn simple_value(&self, name: &str) -> Result<String> {
        self.simple_entry(name).map(TreSimpleEntry::text)
    }

    /// Signed integer value of a leaf entry
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] or [`Error::InvalidTreValue`]
    pub fn int_value(&self, name: &str) -> Result<i64> {
        self.simple_entry(name)?.as_i64()
    }

    /// Unsigned big integer value of a leaf entry
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] or [`Error::InvalidTreValue`]
    pub fn uint_value(&self, name: &str) -> Result<u128> {
        self.simple_entry(name)?.as_u128()
    }

    /// Floating point value of a leaf entry
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] or [`Error::InvalidTreValue`]
    pub fn double_value(&self, name: &str) -> Result<f64> {
        self.simple_entry(name)?.as_f64()
    }
}

/// Decoded or opaque TRE payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreContent {
    /// Decoded with a registered descriptor
    Structured(TreGroup),
    /// Unknown tag, kept byte for byte
    Opaque(Vec<u8>),
}

/// One tagged record extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tre {
    name: String,
    source: TreSource,
    content: TreContent,
}

impl Tre {
    /// Creates a decoded TRE
    pub fn structured(name: impl Into<String>, source: TreSource, group: TreGroup) -> Self {
        Self {
            name: name.into(),
            source,
            content: TreContent::Structured(group),
        }
    }

    /// Creates an opaque TRE
    pub fn opaque(name: impl Into<String>, source: TreSource, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            source,
            content: TreContent::Opaque(data.into()),
        }
    }

    /// `CETAG`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where this TRE is placed on write
    #[must_use]
    pub const fn source(&self) -> TreSource {
        self.source
    }

    /// The payload
    #[must_use]
    pub const fn content(&self) -> &TreContent {
        &self.content
    }

    /// The decoded root group, if a descriptor was registered for this tag
    #[must_use]
    pub const fn group(&self) -> Option<&TreGroup> {
        match &self.content {
            TreContent::Structured(g) => Some(g),
            TreContent::Opaque(_) => None,
        }
    }
}

/// Ordered TREs belonging to one segment or the file header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreCollection {
    tres: Vec<Tre>,
}

impl TreCollection {
    /// Creates an empty [`TreCollection`]
    #[must_use]
    pub const fn new() -> Self {
        Self { tres: Vec::new() }
    }

    /// Appends a TRE
    pub fn add(&mut self, tre: Tre) {
        self.tres.push(tre);
    }

    /// Appends every TRE of `other`, keeping order
    pub fn merge(&mut self, other: Self) {
        self.tres.extend(other.tres);
    }

    /// Removes every TRE with the given tag, returning them
    pub fn remove(&mut self, name: &str) -> Vec<Tre> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tres)
            .into_iter()
            .partition(|t| t.name == name);
        self.tres = kept;
        removed
    }

    /// Distinct tags in first-seen order
    #[must_use]
    pub fn unique_names(&self) -> Vec<&str> {
        self.tres.iter().map(Tre::name).unique().collect()
    }

    /// TREs with the given tag
    pub fn with_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tre> + 'a {
        self.tres.iter().filter(move |t| t.name == name)
    }

    /// TREs read from (and written to) the given section
    pub fn from_source(&self, source: TreSource) -> impl Iterator<Item = &Tre> + '_ {
        self.tres.iter().filter(move |t| t.source == source)
    }

    /// All TREs
    pub fn iter(&self) -> impl Iterator<Item = &Tre> + '_ {
        self.tres.iter()
    }

    /// Number of TREs
    #[must_use]
    pub fn len(&self) -> usize {
        self.tres.len()
    }

    /// Whether the collection is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tres.is_empty()
    }
}

impl FromIterator<Tre> for TreCollection {
    fn from_iter<T: IntoIterator<Item = Tre>>(iter: T) -> Self {
        Self {
            tres: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{FieldType, Tre, TreCollection, TreEntry, TreGroup, TreSimpleEntry, TreSource};
    use crate::error::{Error, Result};

    fn group() -> TreGroup {
        let mut group = TreGroup::new();
        group.push(TreEntry::Simple(TreSimpleEntry::new(
            "COUNT",
            FieldType::Integer,
            "0042",
        )));
        group.push(TreEntry::Simple(TreSimpleEntry::new(
            "WIDE",
            FieldType::Uint,
            vec![0x01, 0, 0, 0, 0, 0, 0, 0, 0x02],
        )));
        group.push(TreEntry::Simple(TreSimpleEntry::new(
            "RATIO",
            FieldType::Real,
            "-1.25 ",
        )));
        group
    }

    #[test]
    fn numeric_accessors_follow_field_type() -> Result<()> {
        let group = group();
        assert_eq!(group.int_value("COUNT")?, 42);
        assert_eq!(group.uint_value("WIDE")?, (1u128 << 64) | 2);
        assert!(matches!(
            group.int_value("WIDE"),
            Err(Error::InvalidTreValue { .. })
        ));
        assert!((group.double_value("RATIO")? + 1.25).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn missing_entry_message() {
        let err = group().simple_value("NOPE").unwrap_err();
        assert_eq!(err.to_string(), "Failed to look up NOPE");
    }

    #[test]
    fn collection_operations() {
        let mut tres = TreCollection::new();
        tres.add(Tre::opaque("AAAAAA", TreSource::ExtendedHeaderData, *b"1"));
        tres.add(Tre::opaque("BBBBBB", TreSource::UserDefinedHeaderData, *b"2"));
        tres.merge(
            [Tre::opaque("AAAAAA", TreSource::ExtendedHeaderData, *b"3")]
                .into_iter()
                .collect(),
        );
        assert_eq!(tres.unique_names(), vec!["AAAAAA", "BBBBBB"]);
        assert_eq!(tres.with_name("AAAAAA").count(), 2);
        assert_eq!(tres.from_source(TreSource::UserDefinedHeaderData).count(), 1);
        let removed = tres.remove("AAAAAA");
        assert_eq!(removed.len(), 2);
        assert_eq!(tres.len(), 1);
    }
}
