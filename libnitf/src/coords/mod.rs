//! Geodetic coordinate parsers used by the image subheader `IGEOLO` field

mod decimal;
mod dms;
mod mgrs;
mod utm;

pub use decimal::parse_decimal_degrees;
pub use dms::parse_dms;
pub use mgrs::parse_mgrs;
pub use utm::parse_utm;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while_m_n},
    combinator::{map, map_res},
    IResult,
};

use crate::{
    error::{Error, Result},
    file_type::FileType,
};

/// Width of one encoded corner coordinate
pub const COORDINATE_WIDTH: usize = 15;
/// Width of the four-corner `IGEOLO` block
pub const COORDINATE_SET_WIDTH: usize = 4 * COORDINATE_WIDTH;

/// Geographic point in signed decimal degrees
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicPoint {
    latitude: f64,
    longitude: f64,
    source: String,
}

impl GeographicPoint {
    pub(crate) fn new(latitude: f64, longitude: f64, source: &str) -> Self {
        Self {
            latitude,
            longitude,
            source: source.to_owned(),
        }
    }

    /// Latitude, negative south of the equator
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude, negative west of Greenwich
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// The text this point was parsed from
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Which half of the UTM/UPS grid a point is referenced to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridHemisphere {
    /// Northern hemisphere (`ICORDS` = `N`)
    North,
    /// Southern hemisphere (`ICORDS` = `S`)
    South,
}

/// UTM/UPS point: zone, easting and northing in metres
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtmPoint {
    zone: u8,
    easting: u32,
    northing: u32,
    hemisphere: GridHemisphere,
    source: String,
}

impl UtmPoint {
    /// UTM zone, `0` for UPS
    #[must_use]
    pub const fn zone(&self) -> u8 {
        self.zone
    }

    /// Easting in metres
    #[must_use]
    pub const fn easting(&self) -> u32 {
        self.easting
    }

    /// Northing in metres
    #[must_use]
    pub const fn northing(&self) -> u32 {
        self.northing
    }

    /// Grid hemisphere
    #[must_use]
    pub const fn hemisphere(&self) -> GridHemisphere {
        self.hemisphere
    }

    /// The text this point was parsed from
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// MGRS point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MgrsPoint {
    zone: u8,
    band: char,
    square: [char; 2],
    easting: u32,
    northing: u32,
    source: String,
}

impl MgrsPoint {
    /// Grid zone number, `0` for the polar (UPS) areas
    #[must_use]
    pub const fn zone(&self) -> u8 {
        self.zone
    }

    /// Latitude band letter of the grid zone designator
    #[must_use]
    pub const fn band(&self) -> char {
        self.band
    }

    /// 100km square identifier
    #[must_use]
    pub const fn square(&self) -> [char; 2] {
        self.square
    }

    /// Easting within the 100km square, in metres
    #[must_use]
    pub const fn easting(&self) -> u32 {
        self.easting
    }

    /// Northing within the 100km square, in metres
    #[must_use]
    pub const fn northing(&self) -> u32 {
        self.northing
    }

    /// The text this point was parsed from
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// One corner of the image footprint
#[derive(Debug, Clone, PartialEq)]
pub enum ImageCoordinate {
    /// `G` (DMS) or `D` (decimal degrees)
    Geographic(GeographicPoint),
    /// `N` or `S`
    Utm(UtmPoint),
    /// `U`
    Mgrs(MgrsPoint),
    /// NITF 2.0 geocentric corners, kept as text
    Unparsed(String),
}

impl ImageCoordinate {
    /// The text this corner was parsed from
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Geographic(p) => p.source(),
            Self::Utm(p) => p.source(),
            Self::Mgrs(p) => p.source(),
            Self::Unparsed(s) => s,
        }
    }
}

/// How `IGEOLO` is encoded, from the `ICORDS` code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateRepresentation {
    /// No coordinates
    None,
    /// MGRS (`U`)
    Mgrs,
    /// UTM/UPS northern hemisphere (`N`, NITF 2.1 only)
    UtmUpsNorth,
    /// UTM/UPS southern hemisphere (`S`, NITF 2.1 only)
    UtmUpsSouth,
    /// Geographic DMS (`G`)
    Geographic,
    /// Decimal degrees (`D`, NITF 2.1 only)
    DecimalDegrees,
    /// Geocentric (`C`, NITF 2.0 only)
    Geocentric,
}

impl CoordinateRepresentation {
    /// Decodes an `ICORDS` value for the given format version
    #[must_use]
    pub fn from_code(code: &str, file_type: FileType) -> Option<Self> {
        let code = code.trim_end();
        if file_type.is_nitf20() {
            match code {
                "U" => Some(Self::Mgrs),
                "G" => Some(Self::Geographic),
                "C" => Some(Self::Geocentric),
                "N" => Some(Self::None),
                _ => None,
            }
        } else {
            match code {
                "U" => Some(Self::Mgrs),
                "N" => Some(Self::UtmUpsNorth),
                "S" => Some(Self::UtmUpsSouth),
                "G" => Some(Self::Geographic),
                "D" => Some(Self::DecimalDegrees),
                "" => Some(Self::None),
                _ => None,
            }
        }
    }

    /// Encodes as an `ICORDS` value for the given format version
    ///
    /// Returns `None` for representations the version cannot express.
    #[must_use]
    pub const fn code(self, file_type: FileType) -> Option<&'static str> {
        match (self, file_type.is_nitf20()) {
            (Self::None, true) => Some("N"),
            (Self::None, false) => Some(" "),
            (Self::Mgrs, _) => Some("U"),
            (Self::Geographic, _) => Some("G"),
            (Self::Geocentric, true) => Some("C"),
            (Self::UtmUpsNorth, false) => Some("N"),
            (Self::UtmUpsSouth, false) => Some("S"),
            (Self::DecimalDegrees, false) => Some("D"),
            _ => None,
        }
    }
}

/// The four image corners, in `IGEOLO` order
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSet {
    corners: [ImageCoordinate; 4],
}

impl CoordinateSet {
    /// Creates a new [`CoordinateSet`] from corners in first row/first column, first row/last
    /// column, last row/last column, last row/first column order
    #[must_use]
    pub const fn new(corners: [ImageCoordinate; 4]) -> Self {
        Self { corners }
    }

    /// Parses a 60 character `IGEOLO` block
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCoordinate`] if any corner fails its grammar
    pub fn parse(representation: CoordinateRepresentation, igeolo: &str) -> Result<Self> {
        let chars: Vec<char> = igeolo.chars().collect();
        if chars.len() != COORDINATE_SET_WIDTH {
            return Err(Error::MalformedCoordinate {
                offset: None,
                message: format!("Incorrect length for coordinate block:{}", chars.len()),
            });
        }
        let mut corners = Vec::with_capacity(4);
        for chunk in chars.chunks(COORDINATE_WIDTH) {
            let text: String = chunk.iter().collect();
            let corner = match representation {
                CoordinateRepresentation::Geographic => {
                    ImageCoordinate::Geographic(parse_dms(text.as_str())?)
                }
                CoordinateRepresentation::DecimalDegrees => {
                    ImageCoordinate::Geographic(parse_decimal_degrees(text.as_str())?)
                }
                CoordinateRepresentation::UtmUpsNorth => {
                    ImageCoordinate::Utm(parse_utm(text.as_str(), GridHemisphere::North)?)
                }
                CoordinateRepresentation::UtmUpsSouth => {
                    ImageCoordinate::Utm(parse_utm(text.as_str(), GridHemisphere::South)?)
                }
                CoordinateRepresentation::Mgrs => ImageCoordinate::Mgrs(parse_mgrs(text.as_str())?),
                CoordinateRepresentation::Geocentric | CoordinateRepresentation::None => {
                    ImageCoordinate::Unparsed(text)
                }
            };
            corners.push(corner);
        }
        let corners: [ImageCoordinate; 4] = corners.try_into().map_err(|_| {
            Error::MalformedCoordinate {
                offset: None,
                message: format!("Incorrect coordinate block: {igeolo}"),
            }
        })?;
        Ok(Self { corners })
    }

    /// The corners in `IGEOLO` order
    #[must_use]
    pub const fn corners(&self) -> &[ImageCoordinate; 4] {
        &self.corners
    }

    /// First row, first column
    #[must_use]
    pub const fn upper_left(&self) -> &ImageCoordinate {
        &self.corners[0]
    }

    /// First row, last column
    #[must_use]
    pub const fn upper_right(&self) -> &ImageCoordinate {
        &self.corners[1]
    }

    /// Last row, last column
    #[must_use]
    pub const fn lower_right(&self) -> &ImageCoordinate {
        &self.corners[2]
    }

    /// Last row, first column
    #[must_use]
    pub const fn lower_left(&self) -> &ImageCoordinate {
        &self.corners[3]
    }

    /// Reassembles the `IGEOLO` text
    #[must_use]
    pub fn source(&self) -> String {
        self.corners.iter().map(ImageCoordinate::source).collect()
    }
}

// Shared front matter for all fixed-width grammars: null and length checks.
fn fixed_input<'a>(text: Option<&'a str>, kind: &str) -> Result<&'a str> {
    let text = text.ok_or_else(|| malformed(format!("Null argument for {kind} parsing")))?;
    let len = text.chars().count();
    if len != COORDINATE_WIDTH {
        return Err(malformed(format!(
            "Incorrect length for {kind} parsing:{len}"
        )));
    }
    Ok(text)
}

fn malformed(message: String) -> Error {
    Error::MalformedCoordinate {
        offset: None,
        message,
    }
}

fn fixed_uint(digits: usize) -> impl FnMut(&str) -> IResult<&str, u32> {
    move |input| {
        map_res(
            take_while_m_n(digits, digits, |c: char| c.is_ascii_digit()),
            str::parse,
        )(input)
    }
}

// Two digit grid zone, or two spaces for the polar areas.
fn grid_zone(input: &str) -> IResult<&str, u8> {
    alt((
        map(tag("  "), |_| 0),
        map_res(
            take_while_m_n(2, 2, |c: char| c.is_ascii_digit()),
            str::parse,
        ),
    ))(input)
}
