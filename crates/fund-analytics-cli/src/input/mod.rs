//! The JSON document a report command reads, from `--input` or stdin.

use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Read the input document for the `what` report.
///
/// A file named by `--input` wins; otherwise a document piped on stdin is
/// used. An interactive or empty stdin is an error.
pub fn read_document(path: Option<&str>, what: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let (text, origin) = match path {
        Some(p) => {
            let resolved = resolve_path(p)?;
            let text = fs::read_to_string(&resolved)
                .map_err(|e| format!("Failed to read '{}': {}", resolved.display(), e))?;
            (text, resolved.display().to_string())
        }
        None => match read_piped()? {
            Some(text) => (text, "stdin".to_string()),
            None => return Err(format!("--input <file.json> or stdin required for {}", what).into()),
        },
    };
    parse_document(&text, &origin, what)
}

/// Parse `text` as the JSON object every report input is.
pub fn parse_document(text: &str, origin: &str, what: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| format!("Failed to parse {} input from {}: {}", what, origin, e))?;
    if !value.is_object() {
        return Err(format!("{} input from {} must be a JSON object", what, origin).into());
    }
    tracing::debug!(origin, bytes = text.len(), command = what, "input document read");
    Ok(value)
}

fn read_piped() -> io::Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok((!buffer.trim().is_empty()).then_some(buffer))
}

/// Resolve `path` against the working directory and check it is a file.
fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let resolved = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !resolved.exists() {
        return Err(format!("File not found: {}", resolved.display()).into());
    }
    if !resolved.is_file() {
        return Err(format!("Not a file: {}", resolved.display()).into());
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_must_be_an_object() {
        let err = parse_document("[1, 2]", "stdin", "exposure breakdown").unwrap_err();
        assert_eq!(
            err.to_string(),
            "exposure breakdown input from stdin must be a JSON object"
        );
        let doc = parse_document("  {\"nav\": \"100\"}\n", "stdin", "exposure breakdown").unwrap();
        assert_eq!(doc["nav"], "100");
    }

    #[test]
    fn test_parse_error_names_origin() {
        let err = parse_document("{\"nav\":", "book.json", "exposure breakdown").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse exposure breakdown input from book.json"));
    }

    #[test]
    fn test_reads_file_and_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.json");
        fs::write(&path, r#"{"peer_group": "Macro"}"#).unwrap();
        let doc = read_document(path.to_str(), "peer ranking").unwrap();
        assert_eq!(doc["peer_group"], "Macro");

        let err = read_document(dir.path().to_str(), "peer ranking").unwrap_err();
        assert!(err.to_string().starts_with("Not a file"));
        let missing = dir.path().join("nope.json");
        assert!(read_document(missing.to_str(), "peer ranking").is_err());
    }
}
