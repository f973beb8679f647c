//! A minimal statement-level import scanner. It does not build an
//! expression-level syntax tree; it only needs to locate `import` /
//! `from ... import` statements reliably, skip over string literals and
//! comments, and track `TYPE_CHECKING` guards by indentation.

use std::collections::HashSet;
use std::path::Path;

use tracing::warn;

use crate::error::ExtractError;
use crate::module::parent_name;

/// One import statement resolved to a target module, as discovered in a
/// single source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImport {
    pub imported: String,
    pub line_number: usize,
    pub line_contents: String,
    pub is_type_checking: bool,
}

/// Read and decode a source file, tolerating a UTF-8 BOM. Returns `None`
/// (with a warning logged) for anything that is not valid UTF-8, per the
/// "warn and skip" policy for per-file decoding anomalies.
pub fn read_source(path: &Path) -> Result<Option<String>, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    match String::from_utf8(bytes.to_vec()) {
        Ok(text) => Ok(Some(text)),
        Err(_) => {
            warn!(path = %path.display(), "skipping file with non-UTF-8 contents");
            Ok(None)
        }
    }
}

/// Extract every import statement from `source`, belonging to module
/// `importer_name`. `known_modules` is the full inventory of internal
/// module dotted names produced by the scanner, consulted to disambiguate
/// `from X import A` (submodule edge vs. plain attribute/name edge).
pub fn extract_imports(
    path: &Path,
    importer_name: &str,
    source: &str,
    known_modules: &HashSet<String>,
) -> Result<Vec<ExtractedImport>, ExtractError> {
    let lines = logical_lines(path, source)?;
    let mut out = Vec::new();
    let mut type_checking_stack: Vec<usize> = Vec::new();

    for line in &lines {
        let indent = leading_whitespace(&line.text);
        let trimmed = line.text.trim();

        while type_checking_stack
            .last()
            .is_some_and(|&header_indent| indent <= header_indent)
        {
            type_checking_stack.pop();
        }
        let is_type_checking = !type_checking_stack.is_empty();

        if is_type_checking_guard(trimmed) {
            type_checking_stack.push(indent);
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("import ") {
            for target in split_top_level_commas(rest) {
                let module = strip_alias(target.trim());
                if !module.is_empty() {
                    out.push(ExtractedImport {
                        imported: module.to_string(),
                        line_number: line.start_line,
                        line_contents: trimmed.to_string(),
                        is_type_checking,
                    });
                }
            }
            continue;
        }

        if let Some(captures) = parse_from_import(trimmed) {
            let prefix = resolve_relative_prefix(importer_name, captures.dots, captures.module);
            for name in captures.names {
                if name == "*" {
                    out.push(ExtractedImport {
                        imported: prefix.clone(),
                        line_number: line.start_line,
                        line_contents: trimmed.to_string(),
                        is_type_checking,
                    });
                    continue;
                }
                let candidate = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                let imported = if known_modules.contains(&candidate) {
                    candidate
                } else {
                    prefix.clone()
                };
                if !imported.is_empty() {
                    out.push(ExtractedImport {
                        imported,
                        line_number: line.start_line,
                        line_contents: trimmed.to_string(),
                        is_type_checking,
                    });
                }
            }
        }
    }

    Ok(out)
}

fn leading_whitespace(s: &str) -> usize {
    s.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

fn is_type_checking_guard(trimmed: &str) -> bool {
    let Some(cond) = trimmed
        .strip_prefix("if ")
        .and_then(|c| c.strip_suffix(':'))
    else {
        return false;
    };
    let cond = cond.trim();
    cond == "TYPE_CHECKING" || cond.ends_with(".TYPE_CHECKING")
}

fn strip_alias(token: &str) -> &str {
    token.split(" as ").next().unwrap_or(token).trim()
}

fn split_top_level_commas(s: &str) -> Vec<String> {
    s.split(',').map(|p| p.trim().to_string()).collect()
}

struct FromImportParts<'a> {
    dots: usize,
    module: &'a str,
    names: Vec<String>,
}

fn parse_from_import(trimmed: &str) -> Option<FromImportParts<'_>> {
    let rest = trimmed.strip_prefix("from ")?;
    let (module_part, names_part) = split_once_keyword(rest, "import")?;
    let module_part = module_part.trim();

    let dots = module_part.chars().take_while(|c| *c == '.').count();
    let module = module_part[dots..].trim();

    let names_part = names_part.trim().trim_start_matches('(').trim_end_matches(')');
    let names = if names_part.trim() == "*" {
        vec!["*".to_string()]
    } else {
        split_top_level_commas(names_part)
            .into_iter()
            .map(|n| strip_alias(&n).to_string())
            .filter(|n| !n.is_empty())
            .collect()
    };

    Some(FromImportParts {
        dots,
        module,
        names,
    })
}

/// Split `"pkg.sub import a, b"` into `("pkg.sub", "a, b")` on the first
/// top-level occurrence of the `import` keyword (surrounded by whitespace).
fn split_once_keyword<'a>(s: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let bytes = s.as_bytes();
    let kw = keyword.as_bytes();
    let mut i = 0;
    while i + kw.len() <= bytes.len() {
        let at_word_start = i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t';
        let at_word_end = i + kw.len() == bytes.len()
            || bytes[i + kw.len()] == b' '
            || bytes[i + kw.len()] == b'\t';
        if at_word_start && at_word_end && &bytes[i..i + kw.len()] == kw {
            return Some((&s[..i], &s[i + kw.len()..]));
        }
        i += 1;
    }
    None
}

/// Resolve a relative `from` target (`dots` leading dots, `module` suffix)
/// against the importer's own dotted name: a `from .` at depth
/// *k* strips *k* trailing segments from the importer's dotted name before
/// prepending the (optional) module suffix.
fn resolve_relative_prefix(importer_name: &str, dots: usize, module: &str) -> String {
    if dots == 0 {
        return module.to_string();
    }
    let mut prefix = importer_name;
    for _ in 0..dots {
        prefix = parent_name(prefix).unwrap_or("");
    }
    if module.is_empty() {
        prefix.to_string()
    } else if prefix.is_empty() {
        module.to_string()
    } else {
        format!("{prefix}.{module}")
    }
}

// ------------------------------------------------------------------
// Logical-line tokenizer
// ------------------------------------------------------------------

struct LogicalLine {
    text: String,
    start_line: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StringState {
    None,
    Single,
    Double,
    TripleSingle,
    TripleDouble,
}

/// Join continuation lines (inside brackets or via trailing backslash),
/// strip comments, and track physical line numbers, while never splitting
/// inside a string literal. This is intentionally *not* a full tokenizer:
/// it is only precise enough to find statement boundaries for `import`
/// statements.
fn logical_lines(path: &Path, source: &str) -> Result<Vec<LogicalLine>, ExtractError> {
    let mut lines = Vec::new();
    let mut buf = String::new();
    let mut start_line: Option<usize> = None;
    let mut physical_line = 1usize;
    let mut paren_depth: i32 = 0;
    let mut state = StringState::None;

    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match state {
            StringState::None => match c {
                '#' => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    continue;
                }
                '\\' if chars.get(i + 1) == Some(&'\n') => {
                    physical_line += 1;
                    i += 2;
                    continue;
                }
                '\'' | '"' => {
                    let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                    state = match (c, triple) {
                        ('\'', true) => StringState::TripleSingle,
                        ('"', true) => StringState::TripleDouble,
                        ('\'', false) => StringState::Single,
                        _ => StringState::Double,
                    };
                    if start_line.is_none() {
                        start_line = Some(physical_line);
                    }
                    let take = if triple { 3 } else { 1 };
                    buf.extend(std::iter::repeat_n(c, take));
                    i += take;
                    continue;
                }
                '(' | '[' | '{' => {
                    paren_depth += 1;
                    if start_line.is_none() {
                        start_line = Some(physical_line);
                    }
                    buf.push(c);
                }
                ')' | ']' | '}' => {
                    paren_depth -= 1;
                    buf.push(c);
                }
                '\n' => {
                    if paren_depth > 0 {
                        buf.push(' ');
                    } else if !buf.trim().is_empty() {
                        lines.push(LogicalLine {
                            text: std::mem::take(&mut buf),
                            start_line: start_line.take().unwrap_or(physical_line),
                        });
                        buf.clear();
                    } else {
                        buf.clear();
                        start_line = None;
                    }
                    physical_line += 1;
                }
                _ => {
                    if start_line.is_none() && !c.is_whitespace() {
                        start_line = Some(physical_line);
                    } else if start_line.is_none() && (c == ' ' || c == '\t') {
                        // keep accumulating leading whitespace for indent tracking
                    }
                    buf.push(c);
                }
            },
            StringState::Single | StringState::Double => {
                let quote = if state == StringState::Single { '\'' } else { '"' };
                buf.push(c);
                if c == '\\' {
                    i += 1;
                    if let Some(&next) = chars.get(i) {
                        buf.push(next);
                        if next == '\n' {
                            physical_line += 1;
                        }
                    }
                    i += 1;
                    continue;
                } else if c == quote {
                    state = StringState::None;
                } else if c == '\n' {
                    // Unterminated single-line string; tolerate by closing.
                    physical_line += 1;
                    state = StringState::None;
                }
            }
            StringState::TripleSingle | StringState::TripleDouble => {
                let quote = if state == StringState::TripleSingle { '\'' } else { '"' };
                if c == '\\' {
                    buf.push(c);
                    i += 1;
                    if let Some(&next) = chars.get(i) {
                        buf.push(next);
                        if next == '\n' {
                            physical_line += 1;
                        }
                    }
                    i += 1;
                    continue;
                }
                if c == quote && chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                    buf.push(quote);
                    buf.push(quote);
                    buf.push(quote);
                    i += 3;
                    state = StringState::None;
                    continue;
                }
                if c == '\n' {
                    physical_line += 1;
                    buf.push(' ');
                } else {
                    buf.push(c);
                }
            }
        }
        i += 1;
    }
    if !buf.trim().is_empty() {
        lines.push(LogicalLine {
            text: buf,
            start_line: start_line.unwrap_or(physical_line),
        });
    }
    if matches!(state, StringState::TripleSingle | StringState::TripleDouble) {
        return Err(ExtractError::SourceSyntaxError {
            path: path.to_path_buf(),
            line: physical_line,
            message: "unterminated triple-quoted string".to_string(),
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(importer: &str, src: &str, known: &[&str]) -> Vec<ExtractedImport> {
        let known: HashSet<String> = known.iter().map(|s| s.to_string()).collect();
        extract_imports(Path::new("test.py"), importer, src, &known).unwrap()
    }

    #[test]
    fn plain_import() {
        let out = extract("pkg.a", "import pkg.b\n", &["pkg.b"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].imported, "pkg.b");
        assert_eq!(out[0].line_number, 1);
        assert!(!out[0].is_type_checking);
    }

    #[test]
    fn relative_from_import_same_package() {
        let out = extract("pkg.a", "from . import b\n", &["pkg.b"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].imported, "pkg.b");
    }

    #[test]
    fn relative_from_import_two_dots() {
        let out = extract("pkg.x.y", "from ..z import q\n", &["pkg.z.q"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].imported, "pkg.z.q");
    }

    #[test]
    fn relative_from_import_falls_back_to_package_when_not_submodule() {
        let out = extract("pkg.x.y", "from ..z import q\n", &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].imported, "pkg.z");
    }

    #[test]
    fn wildcard_from_import() {
        let out = extract("pkg.a", "from pkg.b import *\n", &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].imported, "pkg.b");
    }

    #[test]
    fn type_checking_guard_flags_nested_imports() {
        let src = "if TYPE_CHECKING:\n    from pkg import b\nx = 1\n";
        let out = extract("pkg.a", src, &[]);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_type_checking);
    }

    #[test]
    fn qualified_type_checking_guard() {
        let src = "if typing.TYPE_CHECKING:\n    import pkg.b\n";
        let out = extract("pkg.a", src, &[]);
        assert!(out[0].is_type_checking);
    }

    #[test]
    fn parenthesized_multiline_from_import() {
        let src = "from pkg import (\n    a,\n    b as c,\n)\n";
        let out = extract("pkg.x", src, &["pkg.a"]);
        let targets: Vec<_> = out.iter().map(|i| i.imported.as_str()).collect();
        assert_eq!(targets, vec!["pkg.a", "pkg"]);
    }

    #[test]
    fn comment_and_string_do_not_confuse_parser() {
        let src = "x = \"import fake\"  # from nope import oops\nimport real\n";
        let out = extract("pkg.x", src, &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].imported, "real");
    }

    #[test]
    fn multiple_plain_imports_on_one_line() {
        let out = extract("pkg.x", "import a.b, c.d as cd\n", &[]);
        let targets: Vec<_> = out.iter().map(|i| i.imported.as_str()).collect();
        assert_eq!(targets, vec!["a.b", "c.d"]);
    }
}
