use console::Style;
use serde_json::Map;
use serde_json::Value;

const INDENT: &str = "  ";

struct Palette {
    key: Style,
    string: Style,
    number: Style,
    boolean: Style,
    null: Style,
}

impl Palette {
    fn new() -> Self {
        Self {
            key: Style::new().cyan().force_styling(true),
            string: Style::new().green().force_styling(true),
            number: Style::new().yellow().force_styling(true),
            boolean: Style::new().magenta().force_styling(true),
            null: Style::new().dim().force_styling(true),
        }
    }
}

/// Pretty prints a JSON value with two-space indentation. Without color the
/// output is exactly `serde_json::to_string_pretty`.
pub fn render(value: &Value, color: bool) -> String {
    let palette = color.then(Palette::new);
    let mut out = String::new();
    write_value(value, 0, palette.as_ref(), &mut out);
    out
}

fn write_value(value: &Value, indent: usize, palette: Option<&Palette>, out: &mut String) {
    match value {
        Value::Null => push(out, "null", palette.map(|p| &p.null)),
        Value::Bool(b) => push(out, if *b { "true" } else { "false" }, palette.map(|p| &p.boolean)),
        Value::Number(n) => push(out, &n.to_string(), palette.map(|p| &p.number)),
        Value::String(s) => push(out, &quote(s), palette.map(|p| &p.string)),
        Value::Array(items) => write_array(items, indent, palette, out),
        Value::Object(map) => write_object(map, indent, palette, out),
    }
}

fn write_array(items: &[Value], indent: usize, palette: Option<&Palette>, out: &mut String) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }

    out.push_str("[\n");
    for (i, item) in items.iter().enumerate() {
        push_indent(out, indent + 1);
        write_value(item, indent + 1, palette, out);
        if i + 1 < items.len() {
            out.push(',');
        }
        out.push('\n');
    }
    push_indent(out, indent);
    out.push(']');
}

fn write_object(
    map: &Map<String, Value>,
    indent: usize,
    palette: Option<&Palette>,
    out: &mut String,
) {
    if map.is_empty() {
        out.push_str("{}");
        return;
    }

    out.push_str("{\n");
    for (i, (key, value)) in map.iter().enumerate() {
        push_indent(out, indent + 1);
        push(out, &quote(key), palette.map(|p| &p.key));
        out.push_str(": ");
        write_value(value, indent + 1, palette, out);
        if i + 1 < map.len() {
            out.push(',');
        }
        out.push('\n');
    }
    push_indent(out, indent);
    out.push('}');
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn push(out: &mut String, text: &str, style: Option<&Style>) {
    match style {
        Some(style) => out.push_str(&style.apply_to(text).to_string()),
        None => out.push_str(text),
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::document::default_document;

    #[test]
    fn plain_output_matches_serde_pretty() {
        let values = [
            default_document(),
            json!({"nested": {"list": [1, 2.5, null, "x"], "empty": {}, "none": []}}),
            json!([]),
            json!("quote \" and \n newline"),
            json!(-7),
        ];

        for value in values {
            assert_eq!(render(&value, false), serde_json::to_string_pretty(&value).unwrap());
        }
    }

    #[test]
    fn colored_output_keeps_the_text() {
        let value = json!({"ok": true, "n": 3});
        let colored = render(&value, true);

        assert_ne!(colored, render(&value, false));
        assert_eq!(console::strip_ansi_codes(&colored), render(&value, false));
    }
}
