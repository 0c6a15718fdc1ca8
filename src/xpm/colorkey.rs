//! Selecting a color from an XPM `<Colors>` entry
//!
//! After the pixel code, a color table entry has the form `{<key> <color>}+`,
//! where the key names the visual the color is meant for: `m` (mono), `g4`
//! (4-level grayscale), `g` (grayscale), `c` (color), or `s` (a symbolic name,
//! which the loading application may map to a color of its choosing). Color
//! names may contain spaces, so a name runs until the next key or the end of
//! the entry.

use super::source::is_c_space;

/// Maximum length of a color name word, and of an accumulated color name
const MAX_COLOR_NAME_LEN: usize = 128;

/// A caller supplied value for a symbolic color name, matched ignoring ASCII case
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorSymbol {
    pub name: String,
    pub value: String,
}

impl ColorSymbol {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> ColorSymbol {
        ColorSymbol {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Types of visuals for which a color should be used, in increasing priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum XpmVisual {
    Mono,
    Grayscale4,
    Grayscale,
    Color,
    Symbolic,
}

impl XpmVisual {
    fn from_keyword(word: &[u8]) -> Option<XpmVisual> {
        match word {
            b"m" => Some(XpmVisual::Mono),
            b"g4" => Some(XpmVisual::Grayscale4),
            b"g" => Some(XpmVisual::Grayscale),
            b"c" => Some(XpmVisual::Color),
            b"s" => Some(XpmVisual::Symbolic),
            _ => None,
        }
    }
}

/// Find the value given to a symbolic color name
pub fn find_symbol<'a>(symbols: &'a [ColorSymbol], name: &[u8]) -> Option<&'a str> {
    symbols
        .iter()
        .find(|s| s.name.as_bytes().eq_ignore_ascii_case(name))
        .map(|s| s.value.as_str())
}

/// Splits an entry into words of at most [MAX_COLOR_NAME_LEN] bytes
struct Words<'a> {
    rest: &'a [u8],
}

impl<'a> Words<'a> {
    fn next_word(&mut self) -> Option<&'a [u8]> {
        let start = self
            .rest
            .iter()
            .position(|c| !is_c_space(*c))
            .unwrap_or(self.rest.len());
        let rest = &self.rest[start..];
        let len = rest
            .iter()
            .take(MAX_COLOR_NAME_LEN)
            .position(|c| is_c_space(*c))
            .unwrap_or(rest.len().min(MAX_COLOR_NAME_LEN));
        let (word, rest) = rest.split_at(len);
        self.rest = rest;
        if word.is_empty() {
            None
        } else {
            Some(word)
        }
    }

    fn at_end(&self) -> bool {
        self.rest.is_empty()
    }
}

/// Append `word` to `name`, separated by a space, truncating at [MAX_COLOR_NAME_LEN]
fn append_word(name: &mut Vec<u8>, word: &[u8]) {
    if !name.is_empty() && name.len() < MAX_COLOR_NAME_LEN {
        name.push(b' ');
    }
    let space = MAX_COLOR_NAME_LEN.saturating_sub(name.len());
    name.extend_from_slice(&word[..word.len().min(space)]);
}

/// Pick the color name to use from the part of a color table entry after the
/// pixel code.
///
/// The color given for the highest priority key wins. A symbolic name found in
/// `symbols` is substituted and ranks above every other key; one that is not
/// found is ignored. Returns `None` for malformed entries, and also when only
/// an `m` color was given.
pub fn extract_color(entry: &[u8], symbols: &[ColorSymbol]) -> Option<Vec<u8>> {
    let mut words = Words { rest: entry };

    let mut key: Option<XpmVisual> = None;
    let mut color: Vec<u8> = Vec::new();

    let mut best_key = XpmVisual::Mono;
    let mut best_color: Vec<u8> = Vec::new();

    loop {
        let word = words.next_word();
        let new_key = match word {
            None => {
                if color.is_empty() {
                    // key with no color
                    return None;
                }
                // end of entry: finish the last pair
                Some(XpmVisual::Mono)
            }
            // the word after a key is always part of the color name
            Some(_) if key.is_some() && color.is_empty() => None,
            Some(w) => XpmVisual::from_keyword(w),
        };

        let Some(new_key) = new_key else {
            if key.is_none() {
                // color name with no preceding key
                return None;
            }
            if let Some(w) = word {
                append_word(&mut color, w);
            }
            continue;
        };

        match key {
            Some(XpmVisual::Symbolic) => {
                if let Some(value) = find_symbol(symbols, &color) {
                    best_key = XpmVisual::Symbolic;
                    best_color = value.as_bytes().to_vec();
                }
            }
            Some(k) if k > best_key => {
                best_key = k;
                best_color = std::mem::take(&mut color);
            }
            _ => (),
        }
        color.clear();
        key = Some(new_key);
        if words.at_end() {
            break;
        }
    }

    if best_key > XpmVisual::Mono {
        Some(best_color)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(entry: &str, symbols: &[ColorSymbol]) -> Option<String> {
        extract_color(entry.as_bytes(), symbols).map(|c| String::from_utf8(c).unwrap())
    }

    #[test]
    fn single_color_key() {
        assert_eq!(extract(" c #FF0000", &[]), Some("#FF0000".into()));
        assert_eq!(extract("\tc None ", &[]), Some("None".into()));
        assert_eq!(extract(" c antique  white", &[]), Some("antique white".into()));
    }

    #[test]
    fn highest_priority_wins() {
        assert_eq!(extract(" m black g4 gray50 c red", &[]), Some("red".into()));
        assert_eq!(extract(" c red g gray50 m white", &[]), Some("red".into()));
        assert_eq!(extract(" m black g4 gray25", &[]), Some("gray25".into()));
        assert_eq!(extract(" g4 gray25 g gray75", &[]), Some("gray75".into()));
    }

    #[test]
    fn mono_alone_gives_nothing() {
        assert_eq!(extract(" m black", &[]), None);
    }

    #[test]
    fn symbol_overrides_color() {
        let symbols = [
            ColorSymbol::new("active_color_1", "#336699"),
            ColorSymbol::new("inactive_color_1", "gray"),
        ];
        assert_eq!(
            extract(" c #C0C0C0 s Active_Color_1", &symbols),
            Some("#336699".into())
        );
        assert_eq!(
            extract(" s inactive_color_1 c #C0C0C0", &symbols),
            Some("gray".into())
        );
        // unknown symbols are ignored
        assert_eq!(
            extract(" s title_color c #C0C0C0", &symbols),
            Some("#C0C0C0".into())
        );
        assert_eq!(extract(" s title_color", &symbols), None);
    }

    #[test]
    fn key_word_as_color_name() {
        // a word directly after a key is a color name even if it looks like a key
        assert_eq!(extract(" c c", &[]), Some("c".into()));
        let symbols = [ColorSymbol::new("m", "blue")];
        assert_eq!(extract(" s m", &symbols), Some("blue".into()));
    }

    #[test]
    fn malformed_entries() {
        assert_eq!(extract("", &[]), None);
        assert_eq!(extract("   ", &[]), None);
        assert_eq!(extract(" c", &[]), None);
        assert_eq!(extract(" red", &[]), None);
        assert_eq!(extract(" c red g ", &[]), None);
    }

    #[test]
    fn trailing_key_is_dropped() {
        assert_eq!(extract(" c red g", &[]), Some("red".into()));
    }

    #[test]
    fn long_names_are_truncated() {
        let word = "x".repeat(300);
        let color = extract(&format!(" c {}", word), &[]).unwrap();
        assert_eq!(color.len(), MAX_COLOR_NAME_LEN);
    }
}
