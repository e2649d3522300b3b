//! Keys and key notation.
//!
//! The core consumes a stream of [`Key`] values. Macros are stored in
//! registers as plain text in Vim's angle-bracket notation, so a recording of
//! `A`, `X`, Escape, `j` becomes the register text `AX<Esc>j` and can be
//! edited like any other text before being played back.
//!
//! | Key | Notation |
//! |-----|----------|
//! | Escape | `<Esc>` |
//! | Enter | `<CR>` (also `<Enter>`) |
//! | Backspace | `<BS>` |
//! | Tab | `<Tab>` |
//! | Ctrl+x | `<C-x>` |
//! | literal `<` | `<lt>` |
//!
//! An unrecognised `<...>` sequence is read literally, char by char.

use std::fmt;

/// One input key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character.
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    /// A control chord, stored lowercase (`<C-r>` is `Ctrl('r')`).
    Ctrl(char),
}

impl Key {
    /// The printable char, if this is one.
    #[inline]
    #[must_use]
    pub const fn as_char(self) -> Option<char> {
        match self {
            Self::Char(c) => Some(c),
            _ => None,
        }
    }

    /// True for a decimal digit key.
    #[inline]
    #[must_use]
    pub const fn is_digit(self) -> bool {
        matches!(self, Self::Char('0'..='9'))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char('<') => f.write_str("<lt>"),
            Self::Char(c) => write!(f, "{c}"),
            Self::Enter => f.write_str("<CR>"),
            Self::Tab => f.write_str("<Tab>"),
            Self::Backspace => f.write_str("<BS>"),
            Self::Escape => f.write_str("<Esc>"),
            Self::Ctrl(c) => write!(f, "<C-{c}>"),
        }
    }
}

/// Parse key notation into keys.
#[must_use]
pub fn parse_keys(text: &str) -> Vec<Key> {
    let chars: Vec<char> = text.chars().collect();
    let mut keys = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '<' {
            if let Some(close) = chars[i + 1..].iter().position(|&c| c == '>') {
                let name: String = chars[i + 1..i + 1 + close].iter().collect();
                if let Some(key) = named_key(&name) {
                    keys.push(key);
                    i += close + 2;
                    continue;
                }
            }
        }
        keys.push(if chars[i] == '\n' {
            Key::Enter
        } else if chars[i] == '\t' {
            Key::Tab
        } else {
            Key::Char(chars[i])
        });
        i += 1;
    }
    keys
}

/// Render keys back into notation. Inverse of [`parse_keys`].
#[must_use]
pub fn keys_to_string(keys: &[Key]) -> String {
    keys.iter().map(ToString::to_string).collect()
}

fn named_key(name: &str) -> Option<Key> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "esc" => Some(Key::Escape),
        "cr" | "enter" | "return" => Some(Key::Enter),
        "bs" | "backspace" => Some(Key::Backspace),
        "tab" => Some(Key::Tab),
        "lt" => Some(Key::Char('<')),
        "space" => Some(Key::Char(' ')),
        _ => {
            let rest = lower.strip_prefix("c-")?;
            let mut chars = rest.chars();
            let c = chars.next()?;
            chars.next().is_none().then_some(Key::Ctrl(c))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_is_chars() {
        assert_eq!(
            parse_keys("dw"),
            vec![Key::Char('d'), Key::Char('w')]
        );
    }

    #[test]
    fn named_keys() {
        assert_eq!(
            parse_keys("AX<Esc>j"),
            vec![Key::Char('A'), Key::Char('X'), Key::Escape, Key::Char('j')]
        );
        assert_eq!(
            parse_keys("<C-r><cr><BS><Tab>"),
            vec![Key::Ctrl('r'), Key::Enter, Key::Backspace, Key::Tab]
        );
    }

    #[test]
    fn unknown_brackets_are_literal() {
        assert_eq!(
            parse_keys("a<b>"),
            vec![Key::Char('a'), Key::Char('<'), Key::Char('b'), Key::Char('>')]
        );
        assert_eq!(parse_keys("<"), vec![Key::Char('<')]);
    }

    #[test]
    fn notation_round_trips_through_lt() {
        let keys = vec![Key::Char('i'), Key::Char('<'), Key::Escape, Key::Ctrl('o')];
        let text = keys_to_string(&keys);
        assert_eq!(text, "i<lt><Esc><C-o>");
        assert_eq!(parse_keys(&text), keys);
    }

    #[test]
    fn raw_newline_is_enter() {
        assert_eq!(parse_keys("o\n"), vec![Key::Char('o'), Key::Enter]);
    }
}
