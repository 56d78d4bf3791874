// src/morse/code.rs  -  Dit/dah symbols and the in-progress code buffer
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MorseSymbol {
    Dit,
    Dah,
}

impl MorseSymbol {
    pub fn as_char(self) -> char {
        match self {
            MorseSymbol::Dit => '.',
            MorseSymbol::Dah => '-',
        }
    }

    /// Accepts the rendered form and the legacy digit form (`1` = dit, `2` = dah)
    /// still found in older layout files.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' | '1' => Some(MorseSymbol::Dit),
            '-' | '2' => Some(MorseSymbol::Dah),
            _         => None,
        }
    }
}

/// Ordered dits/dahs of the character being keyed.  Only ever appended to;
/// emptied in one step by [`CodeBuffer::take`] or [`CodeBuffer::clear`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CodeBuffer {
    symbols: Vec<MorseSymbol>,
}

impl CodeBuffer {
    pub fn new() -> Self { Self::default() }

    /// Parse a code string.  Returns `None` for empty input or any
    /// character that is not a dit or dah.
    pub fn parse(code: &str) -> Option<Self> {
        let symbols = code
            .trim()
            .chars()
            .map(MorseSymbol::from_char)
            .collect::<Option<Vec<_>>>()?;
        if symbols.is_empty() {
            return None;
        }
        Some(Self { symbols })
    }

    pub fn push(&mut self, sym: MorseSymbol) { self.symbols.push(sym); }
    pub fn len(&self) -> usize { self.symbols.len() }
    pub fn is_empty(&self) -> bool { self.symbols.is_empty() }
    pub fn symbols(&self) -> &[MorseSymbol] { &self.symbols }
    pub fn clear(&mut self) { self.symbols.clear(); }

    /// Move the contents out, leaving the buffer empty.
    pub fn take(&mut self) -> CodeBuffer { std::mem::take(self) }

    pub fn starts_with(&self, prefix: &CodeBuffer) -> bool {
        self.symbols.starts_with(&prefix.symbols)
    }

    /// `.`/`-` string used for table lookup.
    pub fn render(&self) -> String {
        self.symbols.iter().map(|s| s.as_char()).collect()
    }
}

impl fmt::Display for CodeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromIterator<MorseSymbol> for CodeBuffer {
    fn from_iter<I: IntoIterator<Item = MorseSymbol>>(iter: I) -> Self {
        Self { symbols: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_legacy_digits() {
        let code = CodeBuffer::parse("1212").unwrap();
        assert_eq!(code.render(), ".-.-");
        assert_eq!(CodeBuffer::parse("..--").unwrap(), CodeBuffer::parse("1122").unwrap());
    }

    #[test]
    fn parse_rejects_garbage_and_empty() {
        assert!(CodeBuffer::parse("").is_none());
        assert!(CodeBuffer::parse("  ").is_none());
        assert!(CodeBuffer::parse(".x-").is_none());
    }

    #[test]
    fn take_leaves_buffer_empty() {
        let mut buf = CodeBuffer::new();
        buf.push(MorseSymbol::Dit);
        buf.push(MorseSymbol::Dah);
        let taken = buf.take();
        assert!(buf.is_empty());
        assert_eq!(taken.to_string(), ".-");
    }

    #[test]
    fn prefix_matching() {
        let full = CodeBuffer::parse("-.-.").unwrap();
        assert!(full.starts_with(&CodeBuffer::parse("-.").unwrap()));
        assert!(full.starts_with(&CodeBuffer::new()));
        assert!(!full.starts_with(&CodeBuffer::parse("..").unwrap()));
    }
}
