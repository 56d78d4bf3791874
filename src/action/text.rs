// src/action/text.rs  -  Typed-text state: abbreviations and the prediction boundary
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Predictive-text engine boundary.  `past` is everything typed so far;
/// the result is ranked best first and may be empty.
pub trait Predictor: Send {
    fn predict(&mut self, past: &str) -> Result<Vec<String>>;
}

/// Abbreviation → expansion table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Abbreviations {
    map: HashMap<String, String>,
}

impl Abbreviations {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, abbr: impl Into<String>, expansion: impl Into<String>) {
        self.map.insert(abbr.into(), expansion.into());
    }

    pub fn get(&self, abbr: &str) -> Option<&str> { self.map.get(abbr).map(String::as_str) }
    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    /// `abbr<TAB>expansion` per line.  Blank lines are skipped, malformed
    /// ones too (with a warning).
    pub fn parse(text: &str) -> Self {
        let mut out = Self::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((abbr, expansion)) if !abbr.trim().is_empty() && !expansion.trim().is_empty() => {
                    out.insert(abbr.trim(), expansion.trim());
                }
                _ => log::warn!("[abbrev] line {}: expected 'abbreviation<TAB>expansion', skipped", n + 1),
            }
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read abbreviation file {}", path.display()))?;
        let out = Self::parse(&text);
        log::info!("[abbrev] {} abbreviation(s) from {}", out.len(), path.display());
        Ok(out)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Abbreviations {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

/// Text typed through dictation layouts.  Only keystroke and prediction
/// actions change it.
pub struct TypeState {
    text:          String,
    abbreviations: Abbreviations,
    /// Character that triggers expansion; `None` checks after every character.
    trigger:       Option<char>,
    predictor:     Option<Box<dyn Predictor>>,
    /// Predictions for the current text, dropped on every change.
    predictions:   Option<Vec<String>>,
}

impl TypeState {
    pub fn new(abbreviations: Abbreviations, trigger: Option<char>) -> Self {
        Self { text: String::new(), abbreviations, trigger, predictor: None, predictions: None }
    }

    pub fn with_predictor(mut self, predictor: Box<dyn Predictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn past_stream(&self) -> &str { &self.text }
    pub fn trigger(&self) -> Option<char> { self.trigger }
    pub fn has_predictor(&self) -> bool { self.predictor.is_some() }
    pub fn abbreviations(&self) -> &Abbreviations { &self.abbreviations }

    pub fn push_char(&mut self, c: char) {
        self.text.push(c);
        self.predictions = None;
    }

    pub fn pop_char(&mut self) -> Option<char> {
        self.predictions = None;
        self.text.pop()
    }

    /// The word being typed: everything after the last whitespace.
    pub fn current_word(&self) -> &str {
        let start = self
            .text
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        &self.text[start..]
    }

    /// Expansion for the current word, with the word's length in chars.
    pub fn pending_expansion(&self) -> Option<(usize, String)> {
        let word = self.current_word();
        if word.is_empty() {
            return None;
        }
        self.abbreviations
            .get(word)
            .map(|exp| (word.chars().count(), exp.to_string()))
    }

    /// Cached prediction list; predictor failures give an empty list.
    pub fn predictions(&mut self) -> &[String] {
        if self.predictions.is_none() {
            let list = match self.predictor.as_mut() {
                Some(p) => p.predict(&self.text).unwrap_or_else(|e| {
                    log::error!("[typestate] prediction failed: {e:#}");
                    vec![]
                }),
                None => vec![],
            };
            log::debug!("[typestate] predictions for {:?}: {list:?}", self.text);
            self.predictions = Some(list);
        }
        self.predictions.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::io::Write;

    struct Counting(usize);

    impl Predictor for Counting {
        fn predict(&mut self, past: &str) -> Result<Vec<String>> {
            self.0 += 1;
            Ok(vec![format!("{past}!")])
        }
    }

    struct Broken;

    impl Predictor for Broken {
        fn predict(&mut self, _past: &str) -> Result<Vec<String>> { Err(anyhow!("model missing")) }
    }

    #[test]
    fn current_word_stops_at_whitespace() {
        let mut ts = TypeState::new(Abbreviations::new(), Some(' '));
        "hello wor".chars().for_each(|c| ts.push_char(c));
        assert_eq!(ts.current_word(), "wor");
        ts.push_char('\n');
        assert_eq!(ts.current_word(), "");
        "x".chars().for_each(|c| ts.push_char(c));
        assert_eq!(ts.current_word(), "x");
    }

    #[test]
    fn expansion_needs_whole_word() {
        let abbr: Abbreviations = [("brb", "be right back")].into_iter().collect();
        let mut ts = TypeState::new(abbr, Some(' '));
        assert_eq!(ts.abbreviations().len(), 1);
        assert!(!ts.has_predictor());
        "xbrb".chars().for_each(|c| ts.push_char(c));
        assert_eq!(ts.pending_expansion(), None);
        " brb".chars().for_each(|c| ts.push_char(c));
        assert_eq!(ts.pending_expansion(), Some((3, "be right back".into())));
        assert_eq!(ts.past_stream(), "xbrb brb");
    }

    #[test]
    fn predictions_are_cached_until_text_changes() {
        let mut ts = TypeState::new(Abbreviations::new(), None).with_predictor(Box::new(Counting(0)));
        assert!(ts.has_predictor());
        "he".chars().for_each(|c| ts.push_char(c));
        assert_eq!(ts.predictions(), ["he!".to_string()]);
        assert_eq!(ts.predictions(), ["he!".to_string()]);
        ts.pop_char();
        assert_eq!(ts.predictions(), ["h!".to_string()]);
    }

    #[test]
    fn failing_or_missing_predictor_gives_nothing() {
        let mut ts = TypeState::new(Abbreviations::new(), None).with_predictor(Box::new(Broken));
        assert!(ts.predictions().is_empty());
        let mut ts = TypeState::new(Abbreviations::new(), None);
        assert!(ts.predictions().is_empty());
    }

    #[test]
    fn abbreviation_file_skips_malformed_lines() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "brb\tbe right back").unwrap();
        writeln!(f, "no tab here").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "ty\tthank you").unwrap();
        let abbr = Abbreviations::load(f.path()).unwrap();
        assert_eq!(abbr.len(), 2);
        assert_eq!(abbr.get("ty"), Some("thank you"));
        assert!(Abbreviations::load(Path::new("/nonexistent/abbr.txt")).is_err());
    }
}
