//! User-supplied attribute value parsing (spec §4.4).
//!
//! Each `AttrType` accepts one syntax; anything else is a `ParseError`
//! naming both the attribute and the offending string, never a panic.

use crate::archive::{Color, EdgeInsets, Point, Rect, Size, Value};
use crate::error::Error;

/// Type codes shared with the server (spec §6, "subset actually used").
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Int = 3,
    Long = 5,
    Float = 12,
    Double = 13,
    Bool = 14,
    Point = 17,
    Size = 19,
    Rect = 20,
    EdgeInsets = 22,
    Str = 23,
    EnumInt = 24,
    EnumLong = 25,
    Color = 27,
}

impl AttrType {
    pub fn code(self) -> i32 {
        self as i32
    }
}

fn fail(attribute: &str, message: impl Into<String>) -> Error {
    Error::ParseError {
        attribute: attribute.to_string(),
        message: message.into(),
    }
}

/// Parse `raw` according to `attr_type`'s syntax (spec §4.4 bullet list).
pub fn parse_value(raw: &str, attr_type: AttrType, attribute: &str) -> Result<Value, Error> {
    let trimmed = raw.trim();
    match attr_type {
        AttrType::Bool => parse_bool(trimmed, attribute).map(Value::Bool),
        AttrType::Int | AttrType::Long | AttrType::EnumInt | AttrType::EnumLong => trimmed
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| fail(attribute, format!("{trimmed:?} is not a signed integer"))),
        AttrType::Float | AttrType::Double => trimmed
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| fail(attribute, format!("{trimmed:?} is not a decimal number"))),
        AttrType::Str => Ok(Value::Str(raw.to_string())),
        AttrType::Rect => parse_arity(trimmed, 4, attribute).map(|v| {
            Value::Rect(Rect {
                x: v[0],
                y: v[1],
                width: v[2],
                height: v[3],
            })
        }),
        AttrType::Point => parse_arity(trimmed, 2, attribute).map(|v| Value::Point(Point { x: v[0], y: v[1] })),
        AttrType::Size => {
            parse_arity(trimmed, 2, attribute).map(|v| Value::Size(Size { width: v[0], height: v[1] }))
        }
        AttrType::EdgeInsets => parse_arity(trimmed, 4, attribute).map(|v| {
            Value::EdgeInsets(EdgeInsets {
                top: v[0],
                left: v[1],
                bottom: v[2],
                right: v[3],
            })
        }),
        AttrType::Color => parse_color(trimmed, attribute).map(Value::Color),
    }
}

fn parse_bool(trimmed: &str, attribute: &str) -> Result<bool, Error> {
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(fail(attribute, format!("{other:?} is not a boolean"))),
    }
}

fn parse_arity(trimmed: &str, arity: usize, attribute: &str) -> Result<Vec<f64>, Error> {
    let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    if parts.len() != arity {
        return Err(fail(
            attribute,
            format!("expected {arity} comma-separated numbers, got {}", parts.len()),
        ));
    }
    parts
        .iter()
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| fail(attribute, format!("{p:?} is not a number")))
        })
        .collect()
}

fn parse_color(trimmed: &str, attribute: &str) -> Result<Color, Error> {
    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex_color(hex, attribute);
    }
    if trimmed.chars().next().is_some_and(|c| c.is_ascii_hexdigit()) && !trimmed.contains(',') {
        // A bare hex string without `#` is explicitly rejected (spec §4.4).
        if trimmed.chars().all(|c| c.is_ascii_hexdigit()) && matches!(trimmed.len(), 6 | 8) {
            return Err(fail(attribute, "hex colors require a leading '#'"));
        }
    }

    let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(fail(
            attribute,
            "expected '#RRGGBB', '#RRGGBBAA', or 3-4 comma-separated floats in [0,1]",
        ));
    }
    let mut comps = Vec::with_capacity(4);
    for p in &parts {
        let f: f32 = p
            .parse()
            .map_err(|_| fail(attribute, format!("{p:?} is not a number")))?;
        if !(0.0..=1.0).contains(&f) {
            return Err(fail(attribute, format!("{f} is out of range [0,1]")));
        }
        comps.push(f);
    }
    let alpha = if comps.len() == 4 { comps[3] } else { 1.0 };
    Ok(Color {
        r: comps[0],
        g: comps[1],
        b: comps[2],
        a: alpha,
    })
}

fn parse_hex_color(hex: &str, attribute: &str) -> Result<Color, Error> {
    if hex.len() != 6 && hex.len() != 8 {
        return Err(fail(
            attribute,
            format!("hex color must be 6 or 8 digits, got {}", hex.len()),
        ));
    }
    let byte = |s: &str| -> Result<f32, Error> {
        u8::from_str_radix(s, 16)
            .map(|b| b as f32 / 255.0)
            .map_err(|_| fail(attribute, format!("{s:?} is not valid hex")))
    };
    let r = byte(&hex[0..2])?;
    let g = byte(&hex[2..4])?;
    let b = byte(&hex[4..6])?;
    let a = if hex.len() == 8 { byte(&hex[6..8])? } else { 1.0 };
    Ok(Color { r, g, b, a })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn color(v: Value) -> Color {
        match v {
            Value::Color(c) => c,
            other => panic!("expected Color, got {other:?}"),
        }
    }

    #[test]
    fn hex_six_digit_color() {
        let c = color(parse_value("#80FF00", AttrType::Color, "x").unwrap());
        assert!((c.r - 0.502).abs() < 0.005);
        assert!((c.g - 1.0).abs() < 0.005);
        assert!((c.b - 0.0).abs() < 0.005);
        assert!((c.a - 1.0).abs() < 0.005);
    }

    #[test]
    fn three_component_float_color_implies_alpha_one() {
        let c = color(parse_value("1,0,0", AttrType::Color, "x").unwrap());
        assert_eq!((c.r, c.g, c.b, c.a), (1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn four_component_float_color_roundtrip() {
        let c = color(parse_value("0.2,0.4,0.6,0.8", AttrType::Color, "x").unwrap());
        assert!((c.r - 0.2).abs() < 1e-6);
        assert!((c.g - 0.4).abs() < 1e-6);
        assert!((c.b - 0.6).abs() < 1e-6);
        assert!((c.a - 0.8).abs() < 1e-6);
    }

    #[test]
    fn bad_color_is_parse_error() {
        let err = parse_value("bad", AttrType::Color, "backgroundColor").unwrap_err();
        match err {
            Error::ParseError { attribute, .. } => assert_eq!(attribute, "backgroundColor"),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn hex_without_hash_is_rejected() {
        let err = parse_value("80FF00", AttrType::Color, "x").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }

    #[test]
    fn hex_wrong_length_is_rejected() {
        let err = parse_value("#ABC", AttrType::Color, "x").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }

    #[test]
    fn bool_accepts_known_spellings_case_insensitively() {
        for (raw, expect) in [
            ("true", true),
            ("YES", true),
            ("1", true),
            ("false", false),
            ("No", false),
            ("0", false),
        ] {
            let v = parse_value(raw, AttrType::Bool, "x").unwrap();
            assert_eq!(v, Value::Bool(expect));
        }
    }

    #[test]
    fn rect_requires_exactly_four_components() {
        let err = parse_value("1,2,3", AttrType::Rect, "frame").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));

        let v = parse_value("1,2,3,4", AttrType::Rect, "frame").unwrap();
        assert_eq!(
            v,
            Value::Rect(Rect {
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0
            })
        );
    }

    #[test]
    fn string_passes_through_verbatim() {
        let v = parse_value("  spaced  ", AttrType::Str, "text").unwrap();
        assert_eq!(v, Value::Str("  spaced  ".to_string()));
    }
}
