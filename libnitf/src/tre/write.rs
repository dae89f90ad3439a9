use std::io::Write;

use super::{
    Tre, TreCollection, TreContent, TreEntry, TreGroup, TreSource, LENGTH_WIDTH, TAG_WIDTH,
};
use crate::{
    error::{Error, Result},
    writer::FieldWriter,
};

const MAX_SECTION_LENGTH: usize = 99_999;

fn group_bytes(group: &TreGroup, out: &mut Vec<u8>) {
    for entry in group.entries() {
        match entry {
            TreEntry::Simple(simple) => out.extend_from_slice(simple.raw()),
            TreEntry::GroupList(list) => {
                for group in list.groups() {
                    group_bytes(group, out);
                }
            }
        }
    }
}

/// Encodes TREs as consecutive `CETAG`/`CEL`/`CEDATA` records
///
/// # Errors
///
/// Returns [`Error::FieldOverflow`] if a tag is longer than six characters or a payload is
/// longer than `CEL` can express
pub fn encode_tres<'a>(tres: impl IntoIterator<Item = &'a Tre>) -> Result<Vec<u8>> {
    let mut w = FieldWriter::new(Vec::new());
    for tre in tres {
        let body = match tre.content() {
            TreContent::Opaque(data) => data.clone(),
            TreContent::Structured(group) => {
                let mut body = Vec::new();
                group_bytes(group, &mut body);
                body
            }
        };
        w.text(tre.name(), TAG_WIDTH, "CETAG")?;
        w.number(body.len() as u64, LENGTH_WIDTH, "CEL")?;
        w.raw(&body)?;
    }
    Ok(w.into_inner())
}

/// Writes one extended (sub)header section for the TREs of `source`
///
/// An empty section with no overflow is written as a zero length alone.
pub(crate) fn write_extension_section<W: Write>(
    w: &mut FieldWriter<W>,
    tres: &TreCollection,
    source: TreSource,
    overflow: u16,
    length_field: &'static str,
    overflow_field: &'static str,
) -> Result<()> {
    let bytes = encode_tres(tres.from_source(source))?;
    if bytes.is_empty() && overflow == 0 {
        return w.number(0u32, 5, length_field);
    }
    let length = bytes.len() + 3;
    if length > MAX_SECTION_LENGTH {
        return Err(Error::FieldOverflow {
            field: length_field,
            value: length.to_string(),
            width: 5,
        });
    }
    w.number(length as u64, 5, length_field)?;
    w.number(overflow, 3, overflow_field)?;
    w.raw(&bytes)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{encode_tres, write_extension_section};
    use crate::{
        error::Result,
        reader::ByteCursor,
        tre::{read_extension_section, Tre, TreCollection, TreRegistry, TreSource},
        writer::FieldWriter,
    };

    #[test]
    fn decoded_tre_reencodes_identically() -> Result<()> {
        let mut registry = TreRegistry::empty();
        registry.register_source(
            "tre TESTBB field N 1 integer loop N field V 2 string end field T * string end",
        )?;
        let data = b"TESTBB000092aabbtail";
        let tres =
            crate::tre::parse_tre_bytes(data, 0, TreSource::ExtendedHeaderData, &registry)?;
        assert!(tres.iter().next().unwrap().group().is_some());
        assert_eq!(encode_tres(tres.iter())?, data.to_vec());
        Ok(())
    }

    #[test]
    fn section_round_trip() -> Result<()> {
        let mut tres = TreCollection::new();
        tres.add(Tre::opaque("ABCDEF", TreSource::UserDefinedImageData, *b"xyz"));
        tres.add(Tre::opaque("OTHERS", TreSource::ImageExtendedSubheaderData, *b"q"));

        let mut w = FieldWriter::new(Vec::new());
        write_extension_section(
            &mut w,
            &tres,
            TreSource::UserDefinedImageData,
            0,
            "UDIDL",
            "UDOFL",
        )?;
        write_extension_section(
            &mut w,
            &TreCollection::new(),
            TreSource::ImageExtendedSubheaderData,
            0,
            "IXSHDL",
            "IXSOFL",
        )?;
        let bytes = w.into_inner();
        assert_eq!(bytes, b"00017000ABCDEF00003xyz00000".to_vec());

        let mut cursor = ByteCursor::new(bytes.as_slice());
        let mut read = TreCollection::new();
        let registry = TreRegistry::empty();
        let overflow = read_extension_section(
            &mut cursor,
            "UDIDL",
            "UDOFL",
            TreSource::UserDefinedImageData,
            &registry,
            &mut read,
        )?;
        assert_eq!(overflow, 0);
        assert_eq!(read.len(), 1);
        read_extension_section(
            &mut cursor,
            "IXSHDL",
            "IXSOFL",
            TreSource::ImageExtendedSubheaderData,
            &registry,
            &mut read,
        )?;
        assert_eq!(read.len(), 1);
        Ok(())
    }

    #[test]
    fn overflow_only_section() -> Result<()> {
        let mut w = FieldWriter::new(Vec::new());
        write_extension_section(
            &mut w,
            &TreCollection::new(),
            TreSource::ExtendedHeaderData,
            2,
            "XHDL",
            "XHDLOFL",
        )?;
        assert_eq!(w.into_inner(), b"00003002".to_vec());
        Ok(())
    }
}
