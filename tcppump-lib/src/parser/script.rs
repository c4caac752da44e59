use crate::error::{PumpError, Result, Span};

/// One directive parsed out of a script line, with its source position for
/// diagnostics.
#[derive(Debug, Clone)]
pub enum Directive {
    /// A `proto(...):proto(...)` packet expression.
    PacketExpr(String),
    /// `name:` — a jump target. Declares zero items; records the position of
    /// whatever follows.
    Label(String),
    /// `goto name`.
    Goto(String),
    /// `wait(...)` — a bare delay with no packet, honored like any other
    /// timestamped item.
    Wait(String),
    /// `{N}` — opens a loop body that repeats `N` times.
    LoopStart(u32),
    /// `}` — closes the most recently opened loop body.
    LoopEnd,
}

#[derive(Debug, Clone)]
pub struct ScriptLine {
    pub timestamp: Option<u64>,
    pub directives: Vec<(Directive, Span)>,
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn is_label_def(token: &str) -> Option<&str> {
    let token = token.trim();
    if let Some(name) = token.strip_suffix(':') {
        if !name.is_empty() && name.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Some(name);
        }
    }
    None
}

/// Parses a whole script file's text into a sequence of lines, each with its
/// leading timestamp (if any) and its `;`-separated directives.
pub fn parse_script(text: &str) -> Result<Vec<ScriptLine>> {
    let mut out = Vec::new();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let (timestamp, rest) = split_timestamp(line, line_no)?;

        let mut directives = Vec::new();
        for (col, token) in split_instructions(rest) {
            let span = Span::new(line_no, col);
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let directive = parse_directive(token, span)?;
            directives.push((directive, span));
        }
        if directives.is_empty() {
            continue;
        }
        out.push(ScriptLine { timestamp, directives });
    }

    Ok(out)
}

fn split_timestamp(line: &str, line_no: usize) -> Result<(Option<u64>, &str)> {
    if let Some(colon) = line.find(':') {
        let candidate = &line[..colon];
        if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit()) {
            let ts = candidate
                .parse::<u64>()
                .map_err(|_| PumpError::parse("malformed timestamp", Span::new(line_no, 1)))?;
            return Ok((Some(ts), line[colon + 1..].trim()));
        }
    }
    Ok((None, line))
}

fn split_instructions(rest: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut depth = 0i32;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ';' if depth == 0 => {
                out.push((start + 1, &rest[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < rest.len() {
        out.push((start + 1, &rest[start..]));
    }
    out
}

fn parse_directive(token: &str, span: Span) -> Result<Directive> {
    if let Some(name) = is_label_def(token) {
        return Ok(Directive::Label(name.to_string()));
    }
    if let Some(rest) = token.strip_prefix("goto ") {
        return Ok(Directive::Goto(rest.trim().to_string()));
    }
    if token == "}" {
        return Ok(Directive::LoopEnd);
    }
    if let Some(inner) = token.strip_prefix('{') {
        let inner = inner.strip_suffix('}').ok_or_else(|| PumpError::parse("malformed loop header, expected '{N}'", span))?;
        let count: u32 = inner.trim().parse().map_err(|_| PumpError::parse("loop count must be an integer", span))?;
        return Ok(Directive::LoopStart(count));
    }
    if let Some(inner) = token.strip_prefix("wait(") {
        let inner = inner.strip_suffix(')').ok_or_else(|| PumpError::parse("malformed wait(...)", span))?;
        return Ok(Directive::Wait(inner.trim().to_string()));
    }
    Ok(Directive::PacketExpr(token.to_string()))
}
