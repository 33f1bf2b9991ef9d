//! Argument parsers and output helpers shared across commands.

use std::path::Path;

use himem::{BoundingBox, LevelRange};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CliError;

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read a JSON document from a file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliError::Input(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| CliError::Input(format!("{}: {}", path.display(), e)))
}

/// Parse `max:min` into a level range, e.g. `2:0`.
pub fn parse_level_range(s: &str) -> Result<LevelRange, String> {
    let (max, min) = s
        .split_once(':')
        .ok_or_else(|| format!("expected MAX:MIN, got '{}'", s))?;
    let max: u32 = max.trim().parse().map_err(|_| format!("bad level '{}'", max))?;
    let min: u32 = min.trim().parse().map_err(|_| format!("bad level '{}'", min))?;
    let range = LevelRange::new(max, min);
    if !range.is_valid() {
        return Err(format!("max level {} is below min level {}", max, min));
    }
    Ok(range)
}

/// Parse `x,y,w,h` into a bounding box.
pub fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| format!("expected X,Y,W,H integers, got '{}'", s))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(BoundingBox::new(*x, *y, *w, *h)),
        _ => Err(format!("expected 4 values in '{}'", s)),
    }
}

/// Parse `a,b,c` into a tile shape.
pub fn parse_shape(s: &str) -> Result<[u32; 3], String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| format!("expected A,B,C integers, got '{}'", s))?;
    match parts.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(format!("expected 3 values in '{}'", s)),
    }
}

/// Parse `key=value`.
pub fn parse_tag(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err("tag key must not be empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_range() {
        assert_eq!(parse_level_range("2:0").unwrap(), LevelRange::new(2, 0));
        assert_eq!(parse_level_range(" 3 : 3 ").unwrap(), LevelRange::single(3));
        assert!(parse_level_range("0:2").is_err());
        assert!(parse_level_range("2").is_err());
        assert!(parse_level_range("a:b").is_err());
    }

    #[test]
    fn test_parse_bbox() {
        assert_eq!(parse_bbox("1,2,3,4").unwrap(), BoundingBox::new(1, 2, 3, 4));
        assert_eq!(parse_bbox("-1, 0, 2, 2").unwrap(), BoundingBox::new(-1, 0, 2, 2));
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("1,2,3,x").is_err());
    }

    #[test]
    fn test_parse_shape_and_tag() {
        assert_eq!(parse_shape("4,64,64").unwrap(), [4, 64, 64]);
        assert!(parse_shape("4,64").is_err());
        assert_eq!(
            parse_tag("task_id=T1").unwrap(),
            ("task_id".to_string(), "T1".to_string())
        );
        assert_eq!(parse_tag("note=a=b").unwrap().1, "a=b");
        assert!(parse_tag("=x").is_err());
        assert!(parse_tag("novalue").is_err());
    }

    #[test]
    fn test_read_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("boxes.json");
        std::fs::write(&path, "[[0,0,2,2]]").unwrap();
        let boxes: Vec<BoundingBox> = read_json_file(&path).unwrap();
        assert_eq!(boxes, vec![BoundingBox::new(0, 0, 2, 2)]);

        let missing = read_json_file::<Vec<BoundingBox>>(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(CliError::Input(_))));
    }
}
