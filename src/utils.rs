use serde::Deserialize;

use crate::error::AppError::{self, InvalidInput};

/// A coordinate as clients actually send it: a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Number(f64),
    Text(String),
}

pub fn parse_coordinate(raw: &Coordinate, field: &str) -> Result<f64, AppError> {
    let value = match raw {
        Coordinate::Number(value) => *value,
        Coordinate::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| InvalidInput(format!("{field} is not a number: {text:?}")))?,
    };

    if !value.is_finite() {
        return Err(InvalidInput(format!("{field} is not a finite number")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_json_numbers() {
        let lat = parse_coordinate(&Coordinate::Number(47.6), "lat").unwrap();

        assert_eq!(lat, 47.6);
    }

    #[test]
    fn accepts_numeric_strings() {
        let lng = parse_coordinate(&Coordinate::Text(" -122.33 ".to_string()), "lng").unwrap();

        assert_eq!(lng, -122.33);
    }

    #[test]
    fn rejects_unparsable_text() {
        let err = parse_coordinate(&Coordinate::Text("downtown".to_string()), "lat").unwrap_err();

        assert!(err.to_string().contains("lat"));
    }

    #[test]
    fn rejects_non_finite_values() {
        assert!(parse_coordinate(&Coordinate::Text("NaN".to_string()), "lat").is_err());
        assert!(parse_coordinate(&Coordinate::Number(f64::INFINITY), "lng").is_err());
    }

    #[test]
    fn deserializes_both_wire_shapes() {
        let number: Coordinate = serde_json::from_str("47.61").unwrap();
        let text: Coordinate = serde_json::from_str("\"-122.32\"").unwrap();

        assert_eq!(parse_coordinate(&number, "lat").unwrap(), 47.61);
        assert_eq!(parse_coordinate(&text, "lng").unwrap(), -122.32);
    }
}
