// src/morse/table.rs  -  ITU Morse code table (seeds the built-in typing layout)

/// Every character the ITU table defines, in the order the built-in
/// typing layout lists them.
pub const ITU_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789.,?/@-()'=+";

/// ITU Morse code for a character (case-insensitive).
pub fn itu_code(c: char) -> Option<&'static str> {
    match c.to_ascii_uppercase() {
        'A' => Some(".-"),    'B' => Some("-..."),  'C' => Some("-.-."),
        'D' => Some("-.."),   'E' => Some("."),      'F' => Some("..-."),
        'G' => Some("--."),   'H' => Some("...."),   'I' => Some(".."),
        'J' => Some(".---"),  'K' => Some("-.-"),    'L' => Some(".-.."),
        'M' => Some("--"),    'N' => Some("-."),     'O' => Some("---"),
        'P' => Some(".--."),  'Q' => Some("--.-"),   'R' => Some(".-."),
        'S' => Some("..."),   'T' => Some("-"),      'U' => Some("..-"),
        'V' => Some("...-"),  'W' => Some(".--"),    'X' => Some("-..-"),
        'Y' => Some("-.--"),  'Z' => Some("--.."),
        '0' => Some("-----"), '1' => Some(".----"),  '2' => Some("..---"),
        '3' => Some("...--"), '4' => Some("....-"),  '5' => Some("....."),
        '6' => Some("-...."), '7' => Some("--..."),  '8' => Some("---.."),
        '9' => Some("----."),
        '.' => Some(".-.-.-"),',' => Some("--..--"), '?' => Some("..--.."),
        '/' => Some("-..-."), '+' => Some(".-.-."),  '=' => Some("-...-"),
        '-' => Some("-....-"),'@' => Some(".--.-."), '(' => Some("-.--."),
        ')' => Some("-.--.-"),'\'' => Some(".----."),
        _   => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_listed_char_has_a_unique_code() {
        let mut seen = HashSet::new();
        for c in ITU_CHARS.chars() {
            let code = itu_code(c).unwrap_or_else(|| panic!("no code for {c:?}"));
            assert!(seen.insert(code), "duplicate code {code} for {c:?}");
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(itu_code('q'), itu_code('Q'));
        assert_eq!(itu_code('~'), None);
    }
}
