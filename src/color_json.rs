//! Purpose: Render query payloads as pretty JSON with optional ANSI colorization.
//! Exports: `colorize_json`, `Highlight`.
//! Role: Small, pure formatter used by CLI emission paths.
//! Invariants: When color is disabled, output equals serde_json::to_string_pretty.
//! Invariants: ANSI escapes appear only when explicitly enabled.
//! Invariants: Values under date columns (`*_d`) get their own color so epoch seconds stand out.
use serde_json::{Map, Value};

const INDENT: &str = "  ";

// Conservative 8/16-color palette for broad terminal compatibility.
const COLOR_KEY: &str = "36";
const COLOR_STRING: &str = "32";
const COLOR_NUMBER: &str = "33";
const COLOR_DATE: &str = "34";
const COLOR_BOOL: &str = "35";
const COLOR_NULL: &str = "39";
const COLOR_PUNCT: &str = "39";

/// Which values get color, and which object keys hold dates.
#[derive(Clone, Copy, Debug, Default)]
pub struct Highlight<'a> {
    pub use_color: bool,
    pub date_columns: &'a [String],
}

impl<'a> Highlight<'a> {
    pub fn new(use_color: bool) -> Self {
        Self {
            use_color,
            date_columns: &[],
        }
    }

    pub fn with_date_columns(mut self, columns: &'a [String]) -> Self {
        self.date_columns = columns;
        self
    }

    fn is_date_column(&self, key: &str) -> bool {
        self.date_columns.iter().any(|column| column == key)
    }
}

pub fn colorize_json(value: &Value, highlight: Highlight<'_>) -> String {
    let mut out = String::new();
    write_value(value, 0, false, highlight, &mut out);
    out
}

fn write_value(value: &Value, indent: usize, date: bool, hl: Highlight<'_>, out: &mut String) {
    match value {
        Value::Null => push_colored("null", COLOR_NULL, hl, out),
        Value::Bool(val) => {
            let text = if *val { "true" } else { "false" };
            push_colored(text, COLOR_BOOL, hl, out);
        }
        Value::Number(num) => {
            let color = if date { COLOR_DATE } else { COLOR_NUMBER };
            push_colored(&num.to_string(), color, hl, out);
        }
        Value::String(text) => {
            let encoded = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string());
            push_colored(&encoded, COLOR_STRING, hl, out);
        }
        Value::Array(items) => write_array(items, indent, hl, out),
        Value::Object(map) => write_object(map, indent, hl, out),
    }
}

fn write_array(items: &[Value], indent: usize, hl: Highlight<'_>, out: &mut String) {
    if items.is_empty() {
        push_colored("[]", COLOR_PUNCT, hl, out);
        return;
    }
    push_colored("[", COLOR_PUNCT, hl, out);
    out.push('\n');
    for (idx, item) in items.iter().enumerate() {
        push_indent(indent + 1, out);
        write_value(item, indent + 1, false, hl, out);
        if idx + 1 < items.len() {
            push_colored(",", COLOR_PUNCT, hl, out);
        }
        out.push('\n');
    }
    push_indent(indent, out);
    push_colored("]", COLOR_PUNCT, hl, out);
}

fn write_object(map: &Map<String, Value>, indent: usize, hl: Highlight<'_>, out: &mut String) {
    if map.is_empty() {
        push_colored("{}", COLOR_PUNCT, hl, out);
        return;
    }
    push_colored("{", COLOR_PUNCT, hl, out);
    out.push('\n');
    let len = map.len();
    for (idx, (key, value)) in map.iter().enumerate() {
        push_indent(indent + 1, out);
        let encoded = serde_json::to_string(key).unwrap_or_else(|_| "\"\"".to_string());
        push_colored(&encoded, COLOR_KEY, hl, out);
        push_colored(":", COLOR_PUNCT, hl, out);
        out.push(' ');
        write_value(value, indent + 1, hl.is_date_column(key), hl, out);
        if idx + 1 < len {
            push_colored(",", COLOR_PUNCT, hl, out);
        }
        out.push('\n');
    }
    push_indent(indent, out);
    push_colored("}", COLOR_PUNCT, hl, out);
}

fn push_indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

fn push_colored(text: &str, color: &str, hl: Highlight<'_>, out: &mut String) {
    if !hl.use_color {
        out.push_str(text);
        return;
    }
    out.push_str("\u{1b}[");
    out.push_str(color);
    out.push('m');
    out.push_str(text);
    out.push_str("\u{1b}[0m");
}

#[cfg(test)]
mod tests {
    use super::{Highlight, colorize_json};
    use serde_json::json;

    #[test]
    fn plain_output_matches_pretty() {
        let value = json!([
            {"title": "a", "published_d": 1380585600, "tags": [1, true, null]},
            {"title": "b", "nested": {}}
        ]);
        let plain = colorize_json(&value, Highlight::new(false));
        let pretty = serde_json::to_string_pretty(&value).expect("pretty");
        assert_eq!(plain, pretty);
    }

    #[test]
    fn colors_scalars_by_type() {
        let value = json!({"k":"v","n":1,"b":true,"z":null});
        let colored = colorize_json(&value, Highlight::new(true));
        assert!(colored.contains("\u{1b}[36m\"k\"\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[32m\"v\"\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[33m1\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[35mtrue\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[39mnull\u{1b}[0m"));
    }

    #[test]
    fn date_columns_get_date_color() {
        let dates = vec!["published_d".to_string()];
        let value = json!([{"published_d": 1380585600, "views_i": 12}]);
        let colored = colorize_json(&value, Highlight::new(true).with_date_columns(&dates));
        assert!(colored.contains("\u{1b}[34m1380585600\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[33m12\u{1b}[0m"));
    }
}
