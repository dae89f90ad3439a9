use nom::{
    character::complete::satisfy,
    combinator::all_consuming,
    sequence::tuple,
};

use super::{fixed_input, fixed_uint, grid_zone, malformed, MgrsPoint};
use crate::error::Result;

/// Parses a `zzBJKeeeeennnnn` MGRS coordinate
///
/// `zz` is the zone (blank for the polar areas), `B` the latitude band, `JK` the 100km square
/// and the remaining ten digits the easting and northing within that square.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedCoordinate`] for a missing input, a length other than 15,
/// or text that does not follow the grammar above.
pub fn parse_mgrs<'a>(text: impl Into<Option<&'a str>>) -> Result<MgrsPoint> {
    let text = fixed_input(text.into(), "MGRS")?;
    let letter = || satisfy(|c: char| c.is_ascii_uppercase());
    let (_, (zone, band, square_e, square_n, easting, northing)) = all_consuming(tuple((
        grid_zone,
        letter(),
        letter(),
        letter(),
        fixed_uint(5),
        fixed_uint(5),
    )))(text)
    .map_err(|_| malformed(format!("Incorrect MGRS format: {text}")))?;
    if zone > 60 {
        return Err(malformed(format!("Incorrect MGRS zone: {text}")));
    }
    Ok(MgrsPoint {
        zone,
        band,
        square: [square_e, square_n],
        easting,
        northing,
        source: text.to_owned(),
    })
}
