/// Directive rewriting passes
///
/// Each pass is a text-to-text rewrite; the driver runs them in order:
/// include resolution (see `include.rs`), block declaration extraction,
/// block reference substitution, raw-code translation and interpolation
/// translation. Later passes assume earlier directives are gone.

use std::sync::LazyLock;

use regex::{Captures, NoExpand, Regex};
use stencil_eval::{ISLAND_CLOSE, ISLAND_OPEN};

use crate::blocks::BlockRegistry;

/// Canonical form of the parent placeholder inside a block body
pub const PARENT_PLACEHOLDER: &str = "{{@parent}}";

/// `{{@ include 'path' }}` / `{{@ extend 'path' }}`
pub(crate) static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\{\{@\s*(?:include|extend)\b\s*['"]?(.*?)['"]?\s*\}\}"#).unwrap()
});

/// `{{@ setblock NAME }} body {{@ endsetblock }}`, closest pair wins
static SETBLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\{\{@\s*setblock\b\s*(.*?)\s*\}\}(.*?)\{\{@\s*endsetblock\s*;?\s*\}\}").unwrap()
});

static PARENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{@\s*parent\s*\}\}").unwrap()
});

/// Any remaining `{{@ block NAME }}`
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{@\s*block\b\s*(.*?)\s*\}\}").unwrap()
});

static RAW_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\{\{@\s*(.+?)\s*\}\}").unwrap()
});

static INTERPOLATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{\s*(.+?)\s*\}\}").unwrap()
});

/// Pass 2: register every `setblock` declaration and remove it from the text.
///
/// Declarations are applied left to right, so a later declaration of the
/// same name chains onto (or replaces) an earlier one.
pub fn extract_block_declarations(code: &str, blocks: &mut BlockRegistry) -> String {
    SETBLOCK_RE
        .replace_all(code, |caps: &Captures| {
            let name = &caps[1];
            let body = PARENT_RE.replace_all(&caps[2], NoExpand(PARENT_PLACEHOLDER));
            blocks.declare(name, &body, PARENT_PLACEHOLDER);
            tracing::trace!(block = name, "registered block declaration");
            ""
        })
        .into_owned()
}

/// Pass 3: substitute `{{@ block NAME }}` references.
///
/// Known names are substituted one at a time in registry order; whatever
/// references are left afterwards name unknown blocks and resolve to empty
/// text. Returns the rewritten text and the unknown names, in order.
pub fn substitute_block_references(code: &str, blocks: &BlockRegistry) -> (String, Vec<String>) {
    let mut code = code.to_string();

    for (name, content) in blocks.iter() {
        let pattern = format!(r"(?i:\{{\{{@\s*block)\s+{}\s*\}}\}}", regex::escape(name));
        let Ok(reference) = Regex::new(&pattern) else {
            tracing::warn!(block = name, "block name does not form a valid pattern, skipping");
            continue;
        };
        code = reference.replace_all(&code, NoExpand(content)).into_owned();
    }

    let mut unknown = Vec::new();
    let code = BLOCK_RE
        .replace_all(&code, |caps: &Captures| {
            unknown.push(caps[1].to_string());
            ""
        })
        .into_owned();

    (code, unknown)
}

/// Pass 4: turn `{{@ EXPR }}` into a code island holding EXPR verbatim.
pub fn translate_raw_code(code: &str) -> String {
    RAW_CODE_RE
        .replace_all(code, |caps: &Captures| {
            format!("{} {} {}", ISLAND_OPEN, &caps[1], ISLAND_CLOSE)
        })
        .into_owned()
}

/// Pass 5: turn `{{ EXPR }}` into an echo statement.
///
/// Dot access in EXPR is rewritten to member access and a leading variable
/// name gets the `$` sigil. The rewrite happens inside the replacement, so
/// the pattern never sees its own output.
pub fn translate_interpolations(code: &str) -> String {
    INTERPOLATION_RE
        .replace_all(code, |caps: &Captures| {
            let expr = rewrite_member_access(&caps[1]);
            let sigil = if needs_sigil(&expr) { "$" } else { "" };
            format!("{} echo {}{} {}", ISLAND_OPEN, sigil, expr, ISLAND_CLOSE)
        })
        .into_owned()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Rewrite `a.b.c` to `a->b->c`.
///
/// Dots inside string literals and decimal points in numbers are kept.
pub fn rewrite_member_access(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len() + 8);

    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_run = false;
    let mut run_numeric = false;
    let mut after_member_dot = false;

    for (i, &c) in chars.iter().enumerate() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if is_ident_char(c) {
            if !in_run {
                in_run = true;
                run_numeric = !after_member_dot && c.is_ascii_digit();
            } else if !c.is_ascii_digit() {
                run_numeric = false;
            }
            after_member_dot = false;
            out.push(c);
            continue;
        }

        if c == '.' {
            if in_run && run_numeric {
                // decimal point, the number continues
                out.push(c);
                continue;
            }
            let prev_ok = out.chars().last().is_some_and(|p| is_ident_char(p) || p == ']' || p == ')');
            let next_ok = chars.get(i + 1).copied().is_some_and(is_ident_char);
            if prev_ok && next_ok {
                out.push_str("->");
                in_run = false;
                after_member_dot = true;
                continue;
            }
        }

        if c == '\'' || c == '"' {
            quote = Some(c);
        }
        in_run = false;
        after_member_dot = false;
        out.push(c);
    }

    out
}

/// Whether an interpolated expression starts with a bare variable name.
///
/// Expressions that already carry the sigil, start with a literal, or
/// start with a builtin call are left alone.
fn needs_sigil(expr: &str) -> bool {
    let Some(first) = expr.chars().next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }

    let ident_len = expr.find(|c: char| !is_ident_char(c)).unwrap_or(expr.len());
    let ident = &expr[..ident_len];
    if matches!(ident, "true" | "false" | "null") {
        return false;
    }
    !expr[ident_len..].trim_start().starts_with('(')
}

/// Line (1-based) of the first `{{` left in fully translated text.
///
/// Only literal text is searched; code islands are skipped, including any
/// `{{` or `%>` inside their string literals.
pub fn find_unterminated(code: &str) -> Option<usize> {
    let line_of = |at: usize| code[..at].matches('\n').count() + 1;
    let mut rest = 0;

    while rest < code.len() {
        let text_end = code[rest..].find(ISLAND_OPEN).map_or(code.len(), |i| rest + i);
        if let Some(i) = code[rest..text_end].find("{{") {
            return Some(line_of(rest + i));
        }
        if text_end == code.len() {
            break;
        }
        rest = skip_island(code, text_end + ISLAND_OPEN.len());
    }
    None
}

/// Byte offset just past the `%>` closing the island whose body starts at
/// `start`, or the end of the text for an unclosed island.
fn skip_island(code: &str, start: usize) -> usize {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in code[start..].char_indices() {
        let at = start + i;
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '\'' || c == '"' => quote = Some(c),
            None if code[at..].starts_with(ISLAND_CLOSE) => return at + ISLAND_CLOSE.len(),
            None => {}
        }
    }
    code.len()
}
