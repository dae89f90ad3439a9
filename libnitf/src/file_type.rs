use strum::{Display, EnumString, IntoStaticStr};

/// Format version, as declared by the first nine bytes of the file header
///
/// The version is read once from the file header and then passed down to every segment parser.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash, EnumString, IntoStaticStr, Display)]
pub enum FileType {
    /// `NITF02.00` (MIL-STD-2500A)
    #[strum(serialize = "NITF02.00")]
    Nitf20,
    /// `NITF02.10` (MIL-STD-2500C)
    #[strum(serialize = "NITF02.10")]
    Nitf21,
    /// `NSIF01.00` (STANAG 4545), laid out as NITF 2.1
    #[strum(serialize = "NSIF01.00")]
    Nsif10,
}

impl FileType {
    /// Returns the nine byte header tag
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Whether the file uses the older NITF 2.0 field layout
    #[must_use]
    pub const fn is_nitf20(self) -> bool {
        matches!(self, Self::Nitf20)
    }
}
