use nom::{
    bytes::complete::take,
    character::complete::one_of,
    combinator::{all_consuming, map_res, recognize, verify},
    sequence::{pair, tuple},
    IResult,
};

use super::{fixed_input, malformed, GeographicPoint};
use crate::error::Result;

/// Parses a `±dd.ddd±ddd.ddd` decimal degrees coordinate
///
/// # Errors
///
/// Returns [`crate::Error::MalformedCoordinate`] for a missing input, a length other than 15,
/// or values that are not signed decimals within range.
pub fn parse_decimal_degrees<'a>(text: impl Into<Option<&'a str>>) -> Result<GeographicPoint> {
    let text = fixed_input(text.into(), "decimal degrees")?;
    let (_, (latitude, longitude)) =
        all_consuming(tuple((signed_decimal(6), signed_decimal(7))))(text)
            .map_err(|_| malformed(format!("Incorrect decimal degrees format: {text}")))?;
    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return Err(malformed(format!(
            "Decimal degrees out of range: {text}"
        )));
    }
    Ok(GeographicPoint::new(latitude, longitude, text))
}

fn signed_decimal(width: usize) -> impl FnMut(&str) -> IResult<&str, f64> {
    move |input| {
        map_res(
            recognize(pair(
                one_of("+-"),
                verify(take(width), |s: &str| {
                    s.chars().all(|c| c.is_ascii_digit() || c == '.')
                        && s.chars().filter(|&c| c == '.').count() <= 1
                }),
            )),
            str::parse::<f64>,
        )(input)
    }
}

#[cfg(test)]
mod test {
    use super::parse_decimal_degrees;

    #[test]
    fn valid_decimal_degrees() {
        let point = parse_decimal_degrees("-33.505+150.367").unwrap();
        assert!((point.latitude() + 33.505).abs() < 1e-9);
        assert!((point.longitude() - 150.367).abs() < 1e-9);
    }

    #[test]
    fn missing_sign_is_rejected() {
        let err = parse_decimal_degrees("033.505+150.367").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Incorrect decimal degrees format: 033.505+150.367"
        );
    }

    #[test]
    fn out_of_range_latitude() {
        assert!(parse_decimal_degrees("+95.000+150.367").is_err());
    }
}
