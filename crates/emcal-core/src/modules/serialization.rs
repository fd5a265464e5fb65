use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$}",
        width = width,
        precision = precision
    )
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Serialize `value` as a pretty-printed JSON document ending in a newline.
///
/// serde_json emits the shortest representation that parses back to the same
/// `f64`, so numeric documents written here round-trip exactly.
pub fn write_json_artifact<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|source| std::io::Error::new(std::io::ErrorKind::InvalidData, source))?;
    write_text_artifact(path, &rendered)
}

pub fn read_json_artifact<T: DeserializeOwned>(path: &Path) -> std::io::Result<T> {
    let source = fs::read_to_string(path)?;
    serde_json::from_str(&source)
        .map_err(|source| std::io::Error::new(std::io::ErrorKind::InvalidData, source))
}

#[cfg(test)]
mod tests {
    use super::{
        format_fixed_f64, normalize_text_artifact, read_json_artifact, write_json_artifact,
        write_text_artifact,
    };
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn fixed_width_float_formatting_is_deterministic() {
        assert_eq!(format_fixed_f64(1.23, 13, 5), "      1.23000");
        assert_eq!(format_fixed_f64(1.23, 13, 5), format_fixed_f64(1.23, 13, 5));
    }

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        assert_eq!(
            normalize_text_artifact("alpha\r\nbeta\rgamma"),
            "alpha\nbeta\ngamma\n"
        );
    }

    #[test]
    fn text_writes_are_idempotent() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("rounds.log");
        write_text_artifact(&path, "round 1: 950 events\r\n").expect("first write");
        let first = fs::read(&path).expect("artifact readable");
        write_text_artifact(&path, "round 1: 950 events\r\n").expect("second write");
        assert_eq!(first, fs::read(&path).expect("artifact readable"));
        assert_eq!(first, b"round 1: 950 events\n");
    }

    #[test]
    fn json_artifact_round_trips_floats_exactly() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("scales.json");
        let values = vec![0.1 + 0.2, 1.0 / 3.0, -100.0, 0.0, f64::MIN_POSITIVE];
        write_json_artifact(&path, &values).expect("write succeeds");
        let reloaded: Vec<f64> = read_json_artifact(&path).expect("read succeeds");
        assert_eq!(values, reloaded);
    }
}
