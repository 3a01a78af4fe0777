//! Content-line handling for iCalendar text (RFC 5545 §3.1, §3.3.11).
//!
//! Unfolding, splitting `NAME;PARAM=V:value`, text (un)escaping and folding
//! on output. Nothing here knows about components.

/// Maximum line length in octets, not counting the CRLF.
const MAX_LINE_OCTETS: usize = 75;

/// One logical line: `NAME;KEY=VALUE;...:value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    /// Upper-cased property name.
    pub name: String,
    /// Parameters in document order, keys upper-cased, quotes stripped.
    pub params: Vec<(String, String)>,
    pub value: String,
}

impl ContentLine {
    /// Value of parameter `key` (case-insensitive), if present.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// `true` when the line carries `VALUE=DATE`.
    pub fn is_date_value(&self) -> bool {
        self.param("VALUE")
            .is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
    }
}

/// Split input into logical lines, merging folded continuations.
///
/// Accepts CRLF or bare LF. A line starting with a space or tab continues the
/// previous one: that single character is dropped and the rest appended.
pub fn split_lines(input: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for raw in input.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() {
            continue;
        }
        if let Some(continuation) = line.strip_prefix([' ', '\t']) {
            match lines.last_mut() {
                Some(prev) => prev.push_str(continuation),
                None => tracing::trace!("continuation line with nothing to continue"),
            }
        } else {
            lines.push(line.to_string());
        }
    }

    lines
}

/// Parse one logical line. `None` when there is no `:` outside quotes.
pub fn parse_content_line(line: &str) -> Option<ContentLine> {
    let colon = find_unquoted(line, ':')?;
    let (head, value) = (&line[..colon], &line[colon + 1..]);

    let mut parts = split_unquoted(head, ';').into_iter();
    let name = parts.next()?.trim().to_ascii_uppercase();
    if name.is_empty() {
        return None;
    }

    let params = parts
        .filter_map(|p| {
            let (key, val) = p.split_once('=')?;
            let val = val.trim();
            let val = val
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(val);
            Some((key.trim().to_ascii_uppercase(), val.to_string()))
        })
        .collect();

    Some(ContentLine {
        name,
        params,
        value: value.to_string(),
    })
}

fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut quoted = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => quoted = !quoted,
            c if c == needle && !quoted => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(i) = find_unquoted(rest, sep) {
        out.push(&rest[..i]);
        rest = &rest[i + sep.len_utf8()..];
    }
    out.push(rest);
    out
}

/// Undo TEXT escaping: `\,` `\;` `\\` and `\n`/`\N`.
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Escape a TEXT value.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Quote a parameter value when it contains `:`, `;` or `,`.
pub fn escape_param_value(s: &str) -> String {
    let clean: String = s.chars().filter(|c| !matches!(c, '"' | '\r' | '\n')).collect();
    if clean.contains([':', ';', ',']) {
        format!("\"{clean}\"")
    } else {
        clean
    }
}

/// Split a TEXT list on unescaped commas, unescaping and trimming each item.
/// Empty items are dropped.
pub fn split_text_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in value.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ',' {
            items.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    items.push(current);

    items
        .iter()
        .map(|item| unescape_text(item).trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Fold a content line to 75-octet segments and terminate it with CRLF.
///
/// Continuations start with a single space. UTF-8 sequences are never split.
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return format!("{line}\r\n");
    }

    let mut out = String::with_capacity(line.len() + (line.len() / MAX_LINE_OCTETS + 1) * 3);
    let mut rest = line;
    let mut first = true;

    while !rest.is_empty() {
        let budget = if first {
            MAX_LINE_OCTETS
        } else {
            MAX_LINE_OCTETS - 1
        };
        let mut end = budget.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // A single character wider than the budget
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        if !first {
            out.push(' ');
        }
        out.push_str(&rest[..end]);
        out.push_str("\r\n");
        rest = &rest[end..];
        first = false;
    }

    out
}
