use nom::{
    character::complete::anychar,
    combinator::all_consuming,
    sequence::tuple,
    IResult,
};

use super::{fixed_input, fixed_uint, malformed, GeographicPoint};
use crate::error::Result;

/// Parses a `ddmmssXdddmmssY` geographic coordinate
///
/// `X` is the `N`/`S` hemisphere of the latitude and `Y` the `E`/`W` hemisphere of the
/// longitude.
///
/// # Errors
///
/// Returns [`crate::Error::MalformedCoordinate`] for a missing input, a length other than 15,
/// an invalid hemisphere flag or non-numeric degrees, minutes or seconds.
pub fn parse_dms<'a>(text: impl Into<Option<&'a str>>) -> Result<GeographicPoint> {
    let text = fixed_input(text.into(), "DMS")?;
    let chars: Vec<char> = text.chars().collect();

    let north_south = chars[6];
    if !matches!(north_south, 'N' | 'S') {
        return Err(malformed(format!(
            "Incorrect format for N/S flag while DMS parsing: {north_south}({text})"
        )));
    }
    let east_west = chars[14];
    if !matches!(east_west, 'E' | 'W') {
        return Err(malformed(format!(
            "Incorrect format for E/W flag while DMS parsing: {east_west}({text})"
        )));
    }

    let (_, (latitude, longitude)) = all_consuming(tuple((dms_angle(2), dms_angle(3))))(text)
        .map_err(|_| malformed(format!("Incorrect DMS format: {text}")))?;

    Ok(GeographicPoint::new(latitude, longitude, text))
}

// Degrees, minutes, seconds and the hemisphere letter; negative for S and W.
fn dms_angle(degree_digits: usize) -> impl FnMut(&str) -> IResult<&str, f64> {
    move |input| {
        let (input, (degrees, minutes, seconds, hemisphere)) = tuple((
            fixed_uint(degree_digits),
            fixed_uint(2),
            fixed_uint(2),
            anychar,
        ))(input)?;
        let magnitude =
            f64::from(degrees) + f64::from(minutes) / 60.0 + f64::from(seconds) / 3600.0;
        let sign = if matches!(hemisphere, 'S' | 'W') { -1.0 } else { 1.0 };
        Ok((input, sign * magnitude))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::parse_dms;

    fn message(text: Option<&str>) -> String {
        parse_dms(text).unwrap_err().to_string()
    }

    #[test]
    fn valid_dms() {
        let point = parse_dms("333019S1502203E").unwrap();
        assert!((point.latitude() + 33.5052).abs() < 0.0001);
        assert!((point.longitude() - 150.3675).abs() < 0.0001);
        assert_eq!(point.source(), "333019S1502203E");
    }

    #[test]
    fn western_longitude_is_negative() {
        let point = parse_dms("100000N0453000W").unwrap();
        assert!((point.latitude() - 10.0).abs() < 1e-9);
        assert!((point.longitude() + 45.5).abs() < 1e-9);
    }

    #[test]
    fn null_argument() {
        assert_eq!(message(None), "Null argument for DMS parsing");
    }

    #[test]
    fn bad_length() {
        assert_eq!(
            message(Some("333019S1502203")),
            "Incorrect length for DMS parsing:14"
        );
    }

    #[test]
    fn bad_first_hemisphere() {
        assert_eq!(
            message(Some("333019X1502203E")),
            "Incorrect format for N/S flag while DMS parsing: X(333019X1502203E)"
        );
    }

    #[test]
    fn bad_second_hemisphere() {
        assert_eq!(
            message(Some("333019S1502203Y")),
            "Incorrect format for E/W flag while DMS parsing: Y(333019S1502203Y)"
        );
    }

    #[test]
    fn bad_number() {
        assert_eq!(
            message(Some("333019S1502x03E")),
            "Incorrect DMS format: 333019S1502x03E"
        );
    }
}
