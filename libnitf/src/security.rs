//! Classification blocks shared by the file header and every subheader

use std::io::{Read, Write};

use bon::Builder;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    error::{Error, Result},
    file_type::FileType,
    reader::ByteCursor,
    writer::FieldWriter,
};

/// The value of the `CLAS` field
#[derive(Debug, Default, Eq, PartialEq, Copy, Clone, EnumString, IntoStaticStr, Display)]
pub enum Classification {
    /// `T`
    #[strum(serialize = "T")]
    TopSecret,
    /// `S`
    #[strum(serialize = "S")]
    Secret,
    /// `C`
    #[strum(serialize = "C")]
    Confidential,
    /// `R`
    #[strum(serialize = "R")]
    Restricted,
    /// `U`
    #[default]
    #[strum(serialize = "U")]
    Unclassified,
}

/// NITF 2.0 downgrade value that signals a trailing downgrade event field
const DOWNGRADE_EVENT_MARKER: &str = "999998";

/// Security fields in the NITF 2.0 layout
#[derive(Debug, Default, Clone, PartialEq, Eq, Builder)]
#[non_exhaustive]
pub struct Nitf20Security {
    /// `CLAS`
    #[builder(default)]
    pub classification: Classification,
    /// `CODE` (40)
    #[builder(default)]
    pub codewords: String,
    /// `CTLH` (40)
    #[builder(default)]
    pub control_and_handling: String,
    /// `REL` (40)
    #[builder(default)]
    pub releasing_instructions: String,
    /// `CAUT` (20)
    #[builder(default)]
    pub classification_authority: String,
    /// `CTLN` (20)
    #[builder(default)]
    pub control_number: String,
    /// `DWNG` (6)
    #[builder(default)]
    pub downgrade: String,
    /// `DEVT` (40), present only when `DWNG` is `999998`
    pub downgrade_event: Option<String>,
}

/// Security fields in the NITF 2.1 / NSIF 1.0 layout
#[derive(Debug, Default, Clone, PartialEq, Eq, Builder)]
#[non_exhaustive]
pub struct Nitf21Security {
    /// `CLAS`
    #[builder(default)]
    pub classification: Classification,
    /// `CLSY` (2)
    #[builder(default)]
    pub classification_system: String,
    /// `CODE` (11)
    #[builder(default)]
    pub codewords: String,
    /// `CTLH` (2)
    #[builder(default)]
    pub control_and_handling: String,
    /// `REL` (20)
    #[builder(default)]
    pub releasing_instructions: String,
    /// `DCTP` (2)
    #[builder(default)]
    pub declassification_type: String,
    /// `DCDT` (8)
    #[builder(default)]
    pub declassification_date: String,
    /// `DCXM` (4)
    #[builder(default)]
    pub declassification_exemption: String,
    /// `DG` (1)
    #[builder(default)]
    pub downgrade: String,
    /// `DGDT` (8)
    #[builder(default)]
    pub downgrade_date: String,
    /// `CLTX` (43)
    #[builder(default)]
    pub classification_text: String,
    /// `CATP` (1)
    #[builder(default)]
    pub classification_authority_type: String,
    /// `CAUT` (40)
    #[builder(default)]
    pub classification_authority: String,
    /// `CRSN` (1)
    #[builder(default)]
    pub classification_reason: String,
    /// `SRDT` (8)
    #[builder(default)]
    pub source_date: String,
    /// `CTLN` (15)
    #[builder(default)]
    pub control_number: String,
}

/// A security block, in the shape dictated by the file's format version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityMetadata {
    /// NITF 2.0
    Nitf20(Nitf20Security),
    /// NITF 2.1 and NSIF 1.0
    Nitf21(Nitf21Security),
}

impl Default for SecurityMetadata {
    fn default() -> Self {
        Self::Nitf21(Nitf21Security::default())
    }
}

impl SecurityMetadata {
    /// Returns the classification level
    #[must_use]
    pub const fn classification(&self) -> Classification {
        match self {
            Self::Nitf20(s) => s.classification,
            Self::Nitf21(s) => s.classification,
        }
    }

    pub(crate) fn parse<R: Read>(cursor: &mut ByteCursor<R>, file_type: FileType) -> Result<Self> {
        if file_type.is_nitf20() {
            parse_nitf20(cursor).map(Self::Nitf20)
        } else {
            parse_nitf21(cursor).map(Self::Nitf21)
        }
    }

    /// Writes the block laid out for `file_type`
    ///
    /// A 2.0 block can only go into a NITF 2.0 file and a 2.1 block into the others.
    pub(crate) fn write<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        file_type: FileType,
    ) -> Result<()> {
        match self {
            Self::Nitf20(_) if !file_type.is_nitf20() => {
                return Err(Error::UnsupportedCombination(format!(
                    "NITF 2.0 security block in a {file_type} file"
                )));
            }
            Self::Nitf21(_) if file_type.is_nitf20() => {
                return Err(Error::UnsupportedCombination(format!(
                    "NITF 2.1 security block in a {file_type} file"
                )));
            }
            Self::Nitf20(s) => {
                w.text(s.classification.into(), 1, "CLAS")?;
                w.text(&s.codewords, 40, "CODE")?;
                w.text(&s.control_and_handling, 40, "CTLH")?;
                w.text(&s.releasing_instructions, 40, "REL")?;
                w.text(&s.classification_authority, 20, "CAUT")?;
                w.text(&s.control_number, 20, "CTLN")?;
                w.text(&s.downgrade, 6, "DWNG")?;
                if s.downgrade == DOWNGRADE_EVENT_MARKER {
                    w.text(s.downgrade_event.as_deref().unwrap_or_default(), 40, "DEVT")?;
                }
            }
            Self::Nitf21(s) => {
                w.text(s.classification.into(), 1, "CLAS")?;
                w.text(&s.classification_system, 2, "CLSY")?;
                w.text(&s.codewords, 11, "CODE")?;
                w.text(&s.control_and_handling, 2, "CTLH")?;
                w.text(&s.releasing_instructions, 20, "REL")?;
                w.text(&s.declassification_type, 2, "DCTP")?;
                w.text(&s.declassification_date, 8, "DCDT")?;
                w.text(&s.declassification_exemption, 4, "DCXM")?;
                w.text(&s.downgrade, 1, "DG")?;
                w.text(&s.downgrade_date, 8, "DGDT")?;
                w.text(&s.classification_text, 43, "CLTX")?;
                w.text(&s.classification_authority_type, 1, "CATP")?;
                w.text(&s.classification_authority, 40, "CAUT")?;
                w.text(&s.classification_reason, 1, "CRSN")?;
                w.text(&s.source_date, 8, "SRDT")?;
                w.text(&s.control_number, 15, "CTLN")?;
            }
        }
        Ok(())
    }
}

fn parse_nitf20<R: Read>(cursor: &mut ByteCursor<R>) -> Result<Nitf20Security> {
    let classification = cursor.read_enum(1, "CLAS")?;
    let codewords = cursor.read_text(40, "CODE")?;
    let control_and_handling = cursor.read_text(40, "CTLH")?;
    let releasing_instructions = cursor.read_text(40, "REL")?;
    let classification_authority = cursor.read_text(20, "CAUT")?;
    let control_number = cursor.read_text(20, "CTLN")?;
    let downgrade = cursor.read_text(6, "DWNG")?;
    let downgrade_event = if downgrade == DOWNGRADE_EVENT_MARKER {
        Some(cursor.read_text(40, "DEVT")?)
    } else {
        None
    };
    Ok(Nitf20Security {
        classification,
        codewords,
        control_and_handling,
        releasing_instructions,
        classification_authority,
        control_number,
        downgrade,
        downgrade_event,
    })
}

fn parse_nitf21<R: Read>(cursor: &mut ByteCursor<R>) -> Result<Nitf21Security> {
    Ok(Nitf21Security {
        classification: cursor.read_enum(1, "CLAS")?,
        classification_system: cursor.read_text(2, "CLSY")?,
        codewords: cursor.read_text(11, "CODE")?,
        control_and_handling: cursor.read_text(2, "CTLH")?,
        releasing_instructions: cursor.read_text(20, "REL")?,
        declassification_type: cursor.read_text(2, "DCTP")?,
        declassification_date: cursor.read_text(8, "DCDT")?,
        declassification_exemption: cursor.read_text(4, "DCXM")?,
        downgrade: cursor.read_text(1, "DG")?,
        downgrade_date: cursor.read_text(8, "DGDT")?,
        classification_text: cursor.read_text(43, "CLTX")?,
        classification_authority_type: cursor.read_text(1, "CATP")?,
        classification_authority: cursor.read_text(40, "CAUT")?,
        classification_reason: cursor.read_text(1, "CRSN")?,
        source_date: cursor.read_text(8, "SRDT")?,
        control_number: cursor.read_text(15, "CTLN")?,
    })
}

/// File-level security: the common block plus copy accounting
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileSecurityMetadata {
    /// The classification block
    pub security: SecurityMetadata,
    /// `FSCOP`
    pub copy_number: u32,
    /// `FSCPYS`
    pub number_of_copies: u32,
}

impl FileSecurityMetadata {
    pub(crate) fn parse<R: Read>(cursor: &mut ByteCursor<R>, file_type: FileType) -> Result<Self> {
        let security = SecurityMetadata::parse(cursor, file_type)?;
        Ok(Self {
            security,
            copy_number: cursor.read_number(5, "FSCOP")?,
            number_of_copies: cursor.read_number(5, "FSCPYS")?,
        })
    }

    pub(crate) fn write<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        file_type: FileType,
    ) -> Result<()> {
        self.security.write(w, file_type)?;
        w.number(self.copy_number, 5, "FSCOP")?;
        w.number(self.number_of_copies, 5, "FSCPYS")
    }
}
