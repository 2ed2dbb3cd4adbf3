//! Morse code table.
//!
//! Prosigns are sent as single characters: `=` is BT, `*` is SK, `^` is AR.

pub const DOT: char = '.';
pub const DASH: char = '-';

/// Dots and dashes for `c`, or `None` if it cannot be sent.
/// Letters are case-insensitive.
pub fn code_for(c: char) -> Option<&'static str> {
    let code = match c.to_ascii_uppercase() {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        '/' => "-..-.",
        '?' => "..--..",
        ',' => "--..--",
        '.' => ".-.-.-",
        '-' => "-....-",
        '=' => "-...-",
        ':' => "---...",
        ';' => "-.-.-.",
        '(' => "-.--.",
        ')' => "-.--.-",
        '*' => "...-.-",
        '^' => ".-.-.",
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_are_case_insensitive() {
        assert_eq!(code_for('a'), Some(".-"));
        assert_eq!(code_for('A'), Some(".-"));
        assert_eq!(code_for('q'), Some("--.-"));
    }

    #[test]
    fn prosigns_map_to_their_codes() {
        assert_eq!(code_for('='), Some("-...-"));
        assert_eq!(code_for('*'), Some("...-.-"));
        assert_eq!(code_for('^'), Some(".-.-."));
    }

    #[test]
    fn unknown_characters_have_no_code() {
        assert_eq!(code_for('#'), None);
        assert_eq!(code_for('é'), None);
        assert_eq!(code_for(' '), None);
    }

    #[test]
    fn every_code_is_dots_and_dashes() {
        for c in ('A'..='Z').chain('0'..='9').chain("/?,.-=:;()*^".chars()) {
            let code = code_for(c).unwrap();
            assert!(code.chars().all(|e| e == DOT || e == DASH), "bad code for {c}");
        }
    }
}
