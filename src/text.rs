//! Structured text output shared by records, record sets and schemas

use crate::error::Result;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

/// Pretty JSON with tab indentation, nested `indent` levels deep.
///
/// The first line is left as is so the output can follow a key in an
/// enclosing document; every following line gets `indent` extra tabs.
pub fn to_text<T: Serialize + ?Sized>(value: &T, indent: usize) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut ser)?;
    let json = String::from_utf8_lossy(&buf);

    let pad = "\t".repeat(indent);
    Ok(json
        .lines()
        .enumerate()
        .map(|(i, line)| if i == 0 { line.to_string() } else { format!("{}{}", pad, line) })
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tab_indentation() {
        let text = to_text(&json!({"id": 7}), 0).unwrap();
        assert_eq!(text, "{\n\t\"id\": 7\n}");
    }

    #[test]
    fn test_nested_indent() {
        let text = to_text(&json!({"id": 7}), 2).unwrap();
        assert_eq!(text, "{\n\t\t\t\"id\": 7\n\t\t}");
    }
}
