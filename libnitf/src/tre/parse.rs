use std::io::Read;

use tracing::{debug, instrument, trace, warn};

use super::{
    DescriptorNode, FieldType, Tre, TreCollection, TreDescriptor, TreEntry, TreGroup,
    TreGroupListEntry, TreRegistry, TreSimpleEntry, TreSource, WidthExpr, WidthTerm, LENGTH_WIDTH,
    TAG_WIDTH,
};
use crate::{
    error::{Error, Result},
    reader::{latin1, ByteCursor},
};

/// Reads a `declared`-byte TRE run from the cursor
pub(crate) fn parse_tres<R: Read>(
    cursor: &mut ByteCursor<R>,
    declared: usize,
    source: TreSource,
    registry: &TreRegistry,
) -> Result<TreCollection> {
    let offset = cursor.offset();
    let data = cursor.read_raw(declared, "TRE data")?;
    parse_tre_bytes(&data, offset, source, registry)
}

/// Reads one extended (sub)header section: a length, an overflow index and a TRE run
///
/// Returns the overflow index, `0` when the section is empty.
pub(crate) fn read_extension_section<R: Read>(
    cursor: &mut ByteCursor<R>,
    length_field: &'static str,
    overflow_field: &'static str,
    source: TreSource,
    registry: &TreRegistry,
    tres: &mut TreCollection,
) -> Result<u16> {
    let offset = cursor.offset();
    let length: usize = cursor.read_number(5, length_field)?;
    if length == 0 {
        return Ok(0);
    }
    if length < 3 {
        return Err(Error::length_mismatch(offset, length_field, length as u64, 3));
    }
    let overflow = cursor.read_number(3, overflow_field)?;
    tres.merge(parse_tres(cursor, length - 3, source, registry)?);
    Ok(overflow)
}

/// Decodes a complete TRE run held in memory
///
/// `offset` is the position of `data` in the file and is only used for diagnostics.
///
/// # Errors
///
/// Returns [`Error::LengthMismatch`] if a record overruns the run or a decoded TRE does not
/// consume exactly its declared length
#[instrument(skip(data, registry), level = "trace")]
pub fn parse_tre_bytes(
    data: &[u8],
    offset: u64,
    source: TreSource,
    registry: &TreRegistry,
) -> Result<TreCollection> {
    let mut tres = TreCollection::new();
    let mut pos = 0;
    while pos < data.len() {
        let record_offset = offset + pos as u64;
        let header_end = pos + TAG_WIDTH + LENGTH_WIDTH;
        if header_end > data.len() {
            return Err(Error::length_mismatch(
                record_offset,
                "TRE run",
                data.len() as u64,
                header_end as u64,
            ));
        }
        let name = latin1(&data[pos..pos + TAG_WIDTH]).trim_end().to_owned();
        let length_text = latin1(&data[pos + TAG_WIDTH..header_end]);
        let length: usize =
            length_text
                .trim()
                .parse()
                .map_err(|_| Error::MalformedNumericField {
                    offset: record_offset + TAG_WIDTH as u64,
                    field: format!("CEL of {name}"),
                    value: length_text.clone(),
                })?;
        let end = header_end + length;
        if end > data.len() {
            return Err(Error::length_mismatch(
                record_offset,
                format!("TRE {name}"),
                length as u64,
                (data.len() - header_end) as u64,
            ));
        }
        let body = &data[header_end..end];
        let tre = match registry.get(&name) {
            Some(descriptor) => {
                trace!("decoding {name} ({length} bytes)");
                let group = decode(descriptor, body, offset + header_end as u64)?;
                Tre::structured(name, source, group)
            }
            None => {
                debug!("no descriptor for {name}, keeping {length} bytes opaque");
                Tre::opaque(name, source, body)
            }
        };
        tres.add(tre);
        pos = end;
    }
    Ok(tres)
}

fn decode(descriptor: &TreDescriptor, body: &[u8], offset: u64) -> Result<TreGroup> {
    if let Some(expected) = descriptor.length() {
        if expected != body.len() as u64 {
            warn!(
                "{} declares {} bytes, layout expects {expected}",
                descriptor.name(),
                body.len()
            );
        }
    }
    let mut decoder = Decoder {
        tre: descriptor.name(),
        body,
        pos: 0,
        offset,
        scopes: vec![TreGroup::new()],
    };
    decoder.nodes(descriptor.nodes())?;
    if decoder.pos != body.len() {
        return Err(Error::length_mismatch(
            offset,
            format!("TRE {}", descriptor.name()),
            body.len() as u64,
            decoder.pos as u64,
        ));
    }
    Ok(decoder.scopes.pop().unwrap_or_default())
}

// Recursive descent over the descriptor tree. `scopes` holds the group being filled at each
// loop depth; field references resolve innermost first.
struct Decoder<'a> {
    tre: &'a str,
    body: &'a [u8],
    pos: usize,
    offset: u64,
    scopes: Vec<TreGroup>,
}

impl Decoder<'_> {
    fn nodes(&mut self, nodes: &[DescriptorNode]) -> Result<()> {
        for node in nodes {
            match node {
                DescriptorNode::Field {
                    name,
                    width,
                    field_type,
                } => self.field(name, width, *field_type)?,
                DescriptorNode::Loop { count, body } => self.repeat(count, body)?,
                DescriptorNode::Condition {
                    field,
                    negated,
                    value,
                    body,
                } => {
                    let actual = self.lookup(field)?.text();
                    if (actual.trim() == value.as_str()) != *negated {
                        self.nodes(body)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn field(&mut self, name: &str, width: &WidthExpr, field_type: FieldType) -> Result<()> {
        let width = usize::try_from(self.evaluate(width)?)
            .map_err(|_| Error::Descriptor(format!("{}: width of {name} is too large", self.tre)))?;
        let end = self.pos.checked_add(width).unwrap_or(usize::MAX);
        if end > self.body.len() {
            return Err(Error::length_mismatch(
                self.offset + self.pos as u64,
                format!("TRE {} field {name}", self.tre),
                self.body.len() as u64,
                end as u64,
            ));
        }
        let value = self.body[self.pos..end].to_vec();
        self.pos = end;
        self.current()
            .push(TreEntry::Simple(TreSimpleEntry::new(name, field_type, value)));
        Ok(())
    }

    fn repeat(&mut self, count: &WidthExpr, body: &[DescriptorNode]) -> Result<()> {
        let iterations = self.evaluate(count)?;
        let mismatch = |decoder: &Self| {
            Error::length_mismatch(
                decoder.offset + decoder.pos as u64,
                format!("TRE {} loop {}", decoder.tre, count.source()),
                decoder.body.len() as u64,
                decoder.pos as u64,
            )
        };
        let mut groups = Vec::new();
        for remaining in (0..iterations).rev() {
            // stops oversized counts once the body is exhausted
            if self.pos >= self.body.len() && !body.is_empty() {
                return Err(mismatch(self));
            }
            let start = self.pos;
            self.scopes.push(TreGroup::new());
            self.nodes(body)?;
            groups.extend(self.scopes.pop());
            // an iteration that reads nothing would repeat identically
            if self.pos == start && remaining > 0 {
                return Err(mismatch(self));
            }
        }
        self.current()
            .push(TreEntry::GroupList(TreGroupListEntry::new(count.source(), groups)));
        Ok(())
    }

    fn current(&mut self) -> &mut TreGroup {
        if self.scopes.is_empty() {
            self.scopes.push(TreGroup::new());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn lookup(&self, name: &str) -> Result<&TreSimpleEntry> {
        self.scopes
            .iter()
            .rev()
            .find_map(|group| group.find_simple(name))
            .ok_or_else(|| {
                Error::Descriptor(format!("{}: reference to unread field {name}", self.tre))
            })
    }

    fn evaluate(&self, expr: &WidthExpr) -> Result<u64> {
        expr.evaluate(|term| match term {
            WidthTerm::Literal(n) => Ok(*n),
            WidthTerm::Rest => Ok((self.body.len() - self.pos) as u64),
            WidthTerm::Field(name) => {
                let entry = self.lookup(name)?;
                u64::try_from(entry.as_u128()?).map_err(|_| Error::InvalidTreValue {
                    name: name.clone(),
                    value: entry.text(),
                })
            }
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::parse_tre_bytes;
    use crate::{
        error::{Error, Result},
        reader::ByteCursor,
        tre::{parse_tres, TreContent, TreRegistry, TreSource},
    };

    const TESTAA: &str = "
        tre TESTAA
            field COUNT 1 integer
            loop COUNT
                field LEN 1 integer
                field LABEL LEN string
            end
            field FLAG 1 string
            if FLAG = Y
                field EXTRA 2 string
            end
        end
    ";

    const TESTZW: &str = "
        tre TESTZW
            field COUNT 9 integer
            field WIDTH 1 integer
            loop COUNT
                field EMPTY WIDTH string
            end
            field TAIL 1 string
        end
    ";

    fn registry() -> TreRegistry {
        let mut registry = TreRegistry::empty();
        registry.register_source(TESTAA).unwrap();
        registry.register_source(TESTZW).unwrap();
        registry
    }

    #[test]
    fn decodes_loops_and_conditions() -> Result<()> {
        let data = b"TESTAA0001122AB3XYZYok";
        let tres = parse_tre_bytes(data, 0, TreSource::ExtendedHeaderData, &registry())?;
        let tre = tres.iter().next().unwrap();
        let group = tre.group().unwrap();
        assert_eq!(group.int_value("COUNT")?, 2);
        let labels = group.group_list("COUNT")?;
        assert_eq!(labels.groups().len(), 2);
        assert_eq!(labels.groups()[1].simple_value("LABEL")?, "XYZ");
        assert_eq!(group.simple_value("EXTRA")?, "ok");
        Ok(())
    }

    #[test]
    fn false_condition_skips_fields() -> Result<()> {
        let data = b"TESTAA000020N";
        let tres = parse_tre_bytes(data, 0, TreSource::ExtendedHeaderData, &registry())?;
        let group = tres.iter().next().unwrap().group().unwrap();
        assert!(group.simple_value("EXTRA").is_err());
        Ok(())
    }

    #[test]
    fn unknown_tag_is_opaque() -> Result<()> {
        let data = b"ZZZZZZ00003abc";
        let tres = parse_tre_bytes(data, 0, TreSource::ExtendedHeaderData, &registry())?;
        let tre = tres.iter().next().unwrap();
        assert_eq!(tre.name(), "ZZZZZZ");
        assert_eq!(tre.content(), &TreContent::Opaque(b"abc".to_vec()));
        Ok(())
    }

    #[test]
    fn run_consumes_exactly_declared_length() -> Result<()> {
        let data = b"ZZZZZZ00003abcYYYYYY00000";
        let mut cursor = ByteCursor::new(&data[..]);
        let tres = parse_tres(&mut cursor, data.len(), TreSource::ExtendedHeaderData, &registry())?;
        assert_eq!(tres.len(), 2);
        assert_eq!(cursor.offset(), data.len() as u64);
        Ok(())
    }

    #[test]
    fn truncated_run_is_length_mismatch() {
        let data = b"ZZZZZZ00010abc";
        assert!(matches!(
            parse_tre_bytes(data, 0, TreSource::ExtendedHeaderData, &registry()),
            Err(Error::LengthMismatch { declared: 10, consumed: 3, .. })
        ));
        let data = b"ZZZZZZ000";
        assert!(matches!(
            parse_tre_bytes(data, 0, TreSource::ExtendedHeaderData, &registry()),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn short_decode_is_length_mismatch() {
        // one byte left over after FLAG = N
        let data = b"TESTAA000030NX";
        assert!(matches!(
            parse_tre_bytes(data, 0, TreSource::ExtendedHeaderData, &registry()),
            Err(Error::LengthMismatch { declared: 3, consumed: 2, .. })
        ));
    }

    #[test]
    fn loop_body_must_consume_bytes() -> Result<()> {
        let data = b"TESTZW000119999999990X";
        assert!(matches!(
            parse_tre_bytes(data, 0, TreSource::ExtendedHeaderData, &registry()),
            Err(Error::LengthMismatch { declared: 11, consumed: 10, .. })
        ));

        // a single empty iteration is still allowed
        let data = b"TESTZW000110000000010X";
        let tres = parse_tre_bytes(data, 0, TreSource::ExtendedHeaderData, &registry())?;
        let group = tres.iter().next().unwrap().group().unwrap();
        assert_eq!(group.group_list("COUNT")?.groups().len(), 1);
        assert_eq!(group.simple_value("TAIL")?, "X");
        Ok(())
    }
}
