use std::io::{Read, Write};

use bon::Builder;
use tracing::debug;

use super::{SegmentKind, Subheader};
use crate::{
    error::Result,
    file_type::FileType,
    reader::ByteCursor,
    security::SecurityMetadata,
    tre::TreRegistry,
    writer::FieldWriter,
};

/// Reserved extension subheader fields
#[derive(Debug, Default, Clone, PartialEq, Builder)]
#[non_exhaustive]
pub struct ReservedExtensionSubheader {
    /// `RESID`
    #[builder(into)]
    pub identifier: String,
    /// `RESVER`
    #[builder(default = 1)]
    pub version: u8,
    /// Classification block
    #[builder(default)]
    pub security: SecurityMetadata,
    /// `RESSHF`, kept as raw bytes
    #[builder(default)]
    pub user_defined: Vec<u8>,
}

impl Subheader for ReservedExtensionSubheader {
    const KIND: SegmentKind = SegmentKind::ReservedExtension;

    fn parse<R: Read>(
        cursor: &mut ByteCursor<R>,
        file_type: FileType,
        _registry: &TreRegistry,
    ) -> Result<Self> {
        cursor.verify_marker("RE")?;
        let identifier = cursor.read_text(25, "RESID")?;
        let version = cursor.read_number(2, "RESVER")?;
        let security = SecurityMetadata::parse(cursor, file_type)?;
        let user_defined_length = cursor.read_number(4, "RESSHL")?;
        let user_defined = cursor.read_raw(user_defined_length, "RESSHF")?;
        debug!("reserved extension {identifier:?}");
        Ok(Self {
            identifier,
            version,
            security,
            user_defined,
        })
    }

    fn write<W: Write>(&self, w: &mut FieldWriter<W>, file_type: FileType) -> Result<()> {
        w.raw(b"RE")?;
        w.text(&self.identifier, 25, "RESID")?;
        w.number(self.version, 2, "RESVER")?;
        self.security.write(w, file_type)?;
        w.number(self.user_defined.len() as u64, 4, "RESSHL")?;
        w.raw(&self.user_defined)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::ReservedExtensionSubheader;
    use crate::{
        error::Result,
        file_type::FileType,
        segment::{image::test::SECURITY_21, test::round_trip},
    };

    #[test]
    fn reserved_extension_round_trips() -> Result<()> {
        let bytes = format!("RE{:25}02{SECURITY_21}0000", "RESERVED1");
        let header: ReservedExtensionSubheader = round_trip(bytes.as_bytes(), FileType::Nsif10)?;
        assert_eq!(header.identifier, "RESERVED1");
        assert_eq!(header.version, 2);
        assert!(header.user_defined.is_empty());
        Ok(())
    }
}
