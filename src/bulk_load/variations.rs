//! `Type: value, value` variation cells.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variation {
    pub attribute_type: String,
    pub values: Vec<String>,
}

/// Parse a variation cell.
///
/// Exactly one `:` is required and the type must not be blank. Values are
/// trimmed and blanks dropped.
pub fn parse_variation(cell: &str) -> Option<Variation> {
    let mut parts = cell.split(':');
    let (Some(attribute_type), Some(values), None) = (parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let attribute_type = attribute_type.trim();
    if attribute_type.is_empty() {
        return None;
    }

    Some(Variation {
        attribute_type: attribute_type.to_string(),
        values: values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_drops_blanks() {
        let variation = parse_variation("Color: red, green, blue , yellow,,").unwrap();
        assert_eq!(variation.attribute_type, "Color");
        assert_eq!(variation.values, vec!["red", "green", "blue", "yellow"]);
    }

    #[test]
    fn test_parse_requires_single_colon() {
        assert!(parse_variation("Color red, green").is_none());
        assert!(parse_variation("Size: S: M").is_none());
        assert!(parse_variation(" : red").is_none());
    }
}
