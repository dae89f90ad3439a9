use nom::{combinator::all_consuming, sequence::tuple};

use super::{fixed_input, fixed_uint, grid_zone, malformed, GridHemisphere, UtmPoint};
use crate::error::Result;

/// Parses a `zzeeeeeennnnnnn` UTM/UPS coordinate
///
/// The hemisphere is not part of the text; it comes from the `ICORDS` code that selected this
/// grammar.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedCoordinate`] for a missing input, a length other than 15,
/// or non-numeric zone, easting or northing.
pub fn parse_utm<'a>(
    text: impl Into<Option<&'a str>>,
    hemisphere: GridHemisphere,
) -> Result<UtmPoint> {
    let text = fixed_input(text.into(), "UTM")?;
    let (_, (zone, easting, northing)) =
        all_consuming(tuple((grid_zone, fixed_uint(6), fixed_uint(7))))(text)
            .map_err(|_| malformed(format!("Incorrect UTM format: {text}")))?;
    if zone > 60 {
        return Err(malformed(format!("Incorrect UTM zone: {text}")));
    }
    Ok(UtmPoint {
        zone,
        easting,
        northing,
        hemisphere,
        source: text.to_owned(),
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::parse_utm;
    use crate::coords::GridHemisphere;

    #[test]
    fn valid_utm() {
        let point = parse_utm("556944306197523", GridHemisphere::South).unwrap();
        assert_eq!(point.zone(), 55);
        assert_eq!(point.easting(), 694_430);
        assert_eq!(point.northing(), 6_197_523);
        assert_eq!(point.hemisphere(), GridHemisphere::South);
    }

    #[test]
    fn ups_has_blank_zone() {
        let point = parse_utm("  2000002000000", GridHemisphere::North).unwrap();
        assert_eq!(point.zone(), 0);
    }

    #[test]
    fn letters_in_easting() {
        assert_eq!(
            parse_utm("5569443O6197523", GridHemisphere::North)
                .unwrap_err()
                .to_string(),
            "Incorrect UTM format: 5569443O6197523"
        );
    }
}
