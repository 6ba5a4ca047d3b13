//! Token writer shared by compact and pretty emission

use crate::config::EmitMode;

/// Accumulates output tokens, inserting only the whitespace the layout
/// asks for plus whatever keeps adjacent tokens from merging
pub struct Writer {
    output: String,
    pretty: bool,
    indent_level: usize,
    last: Option<char>,
    /// A regular expression literal was just written; its flags would
    /// absorb a following word
    after_regex: bool,
    at_line_start: bool,
}

impl Writer {
    pub fn new(mode: EmitMode) -> Self {
        Self {
            output: String::new(),
            pretty: mode == EmitMode::Pretty,
            indent_level: 0,
            last: None,
            after_regex: false,
            at_line_start: true,
        }
    }

    /// Write one token
    pub fn token(&mut self, text: &str) {
        let Some(first) = text.chars().next() else {
            return;
        };
        if self.at_line_start {
            self.emit_indent();
            self.at_line_start = false;
        } else if let Some(last) = self.last {
            if would_merge(last, first) || (self.after_regex && is_word_char(first)) {
                self.output.push(' ');
            }
        }
        self.output.push_str(text);
        self.last = text.chars().last();
        self.after_regex = false;
    }

    /// Write a regular expression literal, `/pattern/flags`
    pub fn regex(&mut self, text: &str) {
        self.token(text);
        self.after_regex = true;
    }

    /// Layout space; pretty mode only
    pub fn space(&mut self) {
        if self.pretty && !self.at_line_start && self.last != Some(' ') {
            self.output.push(' ');
            self.last = Some(' ');
            self.after_regex = false;
        }
    }

    /// End the current line; pretty mode only
    pub fn newline(&mut self) {
        if self.pretty && !self.at_line_start {
            self.output.push('\n');
            self.at_line_start = true;
            self.last = None;
            self.after_regex = false;
        }
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        self.output
    }

    fn emit_indent(&mut self) {
        if self.pretty {
            for _ in 0..self.indent_level {
                self.output.push_str("    ");
            }
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Whether `prev` followed directly by `next` would lex differently
fn would_merge(prev: char, next: char) -> bool {
    (is_word_char(prev) && is_word_char(next))
        || (prev == '+' && next == '+')
        || (prev == '-' && next == '-')
        // `//` and `/*` would open a comment
        || (prev == '/' && matches!(next, '/' | '*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separates_merging_tokens() {
        let mut w = Writer::new(EmitMode::Compact);
        for token in ["let", "x", "=", "-", "-", "y", ";", "return", "(", "a", "+", "++", "b", ")"] {
            w.token(token);
        }
        assert_eq!(w.finish(), "let x=- -y;return(a+ ++b)");
    }

    #[test]
    fn test_regex_is_kept_apart() {
        let mut w = Writer::new(EmitMode::Compact);
        for token in ["a", "/"] {
            w.token(token);
        }
        w.regex("/x/");
        w.token("in");
        w.token("o");
        w.token(";");
        w.regex("/y/g");
        w.token("/");
        w.token("2");
        assert_eq!(w.finish(), "a/ /x/ in o;/y/g/2");

        let mut w = Writer::new(EmitMode::Compact);
        w.regex("/z/");
        w.token("/");
        w.token("*");
        assert_eq!(w.finish(), "/z/ / *");
    }

    #[test]
    fn test_pretty_layout() {
        let mut w = Writer::new(EmitMode::Pretty);
        w.token("if");
        w.space();
        w.token("(");
        w.token("a");
        w.token(")");
        w.space();
        w.token("{");
        w.newline();
        w.indent();
        w.token("b");
        w.token(";");
        w.newline();
        w.dedent();
        w.token("}");
        w.newline();
        assert_eq!(w.finish(), "if (a) {\n    b;\n}\n");
    }

    #[test]
    fn test_compact_ignores_layout() {
        let mut w = Writer::new(EmitMode::Compact);
        w.token("a");
        w.space();
        w.newline();
        w.token("b");
        assert_eq!(w.finish(), "a b");
    }
}
