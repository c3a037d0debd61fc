//! Translation-call extraction from source code.
//!
//! Tree-sitter grammars cover JS/JSX/TS/TSX; any other configured
//! extension falls back to a regex frame. A file that fails to parse
//! yields no keys rather than failing the batch.

use regex::Regex;
use tree_sitter::{Node, Parser};

use crate::types::SourcePosition;

use super::KeyUsage;

/// Extracts `t('key.path')`-style calls for the configured function names.
pub struct KeyExtractor {
    functions: Vec<String>,
    fallback: Option<Regex>,
}

impl KeyExtractor {
    pub fn new(functions: &[String]) -> Self {
        Self {
            functions: functions.to_vec(),
            fallback: build_fallback_regex(functions),
        }
    }

    /// Extract all key usages from `source`, selecting the grammar by
    /// file extension.
    pub fn extract(&self, source: &str, extension: &str) -> Vec<KeyUsage> {
        let language = match extension.to_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => tree_sitter_javascript::LANGUAGE,
            "ts" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT,
            "tsx" => tree_sitter_typescript::LANGUAGE_TSX,
            _ => return self.extract_with_regex(source),
        };

        let mut parser = Parser::new();
        if parser.set_language(&language.into()).is_err() {
            tracing::warn!("[scanner] grammar rejected for .{extension}, using regex fallback");
            return self.extract_with_regex(source);
        }

        match parser.parse(source, None) {
            Some(tree) => {
                let mut usages = Vec::new();
                self.walk(tree.root_node(), source.as_bytes(), &mut usages);
                usages
            }
            None => {
                tracing::warn!("[scanner] parse failed, no keys extracted");
                Vec::new()
            }
        }
    }

    fn walk(&self, node: Node, source: &[u8], out: &mut Vec<KeyUsage>) {
        if node.kind() == "call_expression"
            && let Some(usage) = self.match_call(node, source)
        {
            out.push(usage);
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, source, out);
        }
    }

    /// Match a call whose callee text equals a configured function name
    /// and whose first argument is a plain string literal.
    fn match_call(&self, node: Node, source: &[u8]) -> Option<KeyUsage> {
        let callee = node.child_by_field_name("function")?;
        let callee_text = callee.utf8_text(source).ok()?;
        if !self.functions.iter().any(|f| f == callee_text) {
            return None;
        }

        let args = node.child_by_field_name("arguments")?;
        let mut cursor = args.walk();
        let mut named = args.named_children(&mut cursor);

        let key_node = named.next()?;
        let key = string_literal(key_node, source)?;

        // Optional second string argument is the authored default text
        let default_text = named.next().and_then(|n| string_literal(n, source));

        let pos = key_node.start_position();
        Some(KeyUsage {
            key,
            default_text,
            position: SourcePosition::new(pos.row as u32 + 1, pos.column as u32),
        })
    }

    fn extract_with_regex(&self, source: &str) -> Vec<KeyUsage> {
        let Some(re) = &self.fallback else {
            return Vec::new();
        };

        let mut usages = Vec::new();
        for (lineno, line) in source.lines().enumerate() {
            for caps in re.captures_iter(line) {
                if let Some(key) = caps.name("key") {
                    usages.push(KeyUsage {
                        key: key.as_str().to_string(),
                        default_text: None,
                        position: SourcePosition::new(lineno as u32 + 1, key.start() as u32),
                    });
                }
            }
        }
        usages
    }
}

/// Literal content of a non-interpolated string node.
fn string_literal(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "string" => {
            let text = node.utf8_text(source).ok()?;
            // Strip the surrounding quotes
            let inner = &text[1..text.len().saturating_sub(1)];
            Some(inner.to_string())
        }
        "template_string" => {
            // Only templates without substitutions are usable as keys
            let mut cursor = node.walk();
            if node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "template_substitution")
            {
                return None;
            }
            let text = node.utf8_text(source).ok()?;
            let inner = &text[1..text.len().saturating_sub(1)];
            Some(inner.to_string())
        }
        _ => None,
    }
}

fn build_fallback_regex(functions: &[String]) -> Option<Regex> {
    if functions.is_empty() {
        return None;
    }

    let names = functions
        .iter()
        .map(|f| regex::escape(f))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r#"(?:^|[^\w.$])(?:{names})\(\s*['"](?P<key>[^'"]+)['"]"#);

    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("[scanner] fallback pattern invalid: {e}");
            None
        }
    }
}
