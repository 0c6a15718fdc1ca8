//! Color specifications used in the `<Colors>` section of XPM files

use super::x11r6colors::lookup_color;

/// A color resolved from an XPM color table entry, with 16 bits per channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorSpec {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub transparent: bool,
}

impl ColorSpec {
    /// Fully transparent black, used for `None` and for colors which fail to parse
    pub const TRANSPARENT: ColorSpec = ColorSpec {
        red: 0,
        green: 0,
        blue: 0,
        transparent: true,
    };

    pub fn opaque(red: u16, green: u16, blue: u16) -> ColorSpec {
        ColorSpec {
            red,
            green,
            blue,
            transparent: false,
        }
    }

    /// Top 8 bits of each channel, in R,G,B order
    pub fn rgb8(&self) -> [u8; 3] {
        [
            (self.red >> 8) as u8,
            (self.green >> 8) as u8,
            (self.blue >> 8) as u8,
        ]
    }

    /// 0 if transparent, 255 otherwise
    pub fn alpha8(&self) -> u8 {
        if self.transparent {
            0
        } else {
            0xff
        }
    }
}

fn parse_hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Parse a group of 1 to 4 hex digits, and scale it to 16 bits.
///
/// Scaling rounds down: `x * 65535 / 15`, `/ 255` and `/ 4095` for 1, 2 and 3
/// digits; 4 digits are used as is.
fn parse_hex_channel(data: &[u8]) -> Option<u16> {
    let mut x: u32 = 0;
    for c in data {
        x = (x << 4) | parse_hex(*c)? as u32;
    }
    let divisor = match data.len() {
        1 => 15,
        2 => 255,
        3 => 4095,
        4 => return Some(x as u16),
        _ => return None,
    };
    Some((x * 65535 / divisor) as u16)
}

/// Parse the digits of a `#RGB`-style color (without the `#`).
fn parse_hex_color(data: &[u8]) -> Option<ColorSpec> {
    if data.len() % 3 != 0 {
        return None;
    }
    let width = data.len() / 3;
    if !(1..=4).contains(&width) {
        return None;
    }
    let (r, gb) = data.split_at(width);
    let (g, b) = gb.split_at(width);
    Some(ColorSpec::opaque(
        parse_hex_channel(r)?,
        parse_hex_channel(g)?,
        parse_hex_channel(b)?,
    ))
}

/// Parse a color specification: either `#` followed by 3, 6, 9 or 12 hex digits,
/// or an X11 color name (compared ignoring case).
///
/// Returns `None` if the specification is malformed or names an unknown color.
/// `None` (the XPM keyword for a transparent color) is not handled here.
pub fn parse_color(spec: &[u8]) -> Option<ColorSpec> {
    if let Some(hex) = spec.strip_prefix(b"#") {
        parse_hex_color(hex)
    } else {
        lookup_color(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(spec: &[u8]) -> Option<(u16, u16, u16)> {
        parse_color(spec).map(|c| (c.red, c.green, c.blue))
    }

    #[test]
    fn hex_widths() {
        assert_eq!(rgb(b"#F00"), Some((65535, 0, 0)));
        assert_eq!(rgb(b"#0f0"), Some((0, 65535, 0)));
        assert_eq!(rgb(b"#123"), Some((4369, 8738, 13107)));
        assert_eq!(rgb(b"#FF8000"), Some((65535, 32896, 0)));
        assert_eq!(rgb(b"#FFF000800"), Some((65535, 0, 32775)));
        assert_eq!(rgb(b"#FFFF00008000"), Some((65535, 0, 32768)));
        assert_eq!(rgb(b"#123412341234"), Some((0x1234, 0x1234, 0x1234)));
    }

    #[test]
    fn hex_rejected() {
        assert_eq!(rgb(b"#"), None);
        assert_eq!(rgb(b"#FF00"), None);
        assert_eq!(rgb(b"#GG0000"), None);
        assert_eq!(rgb(b"#FF 000"), None);
        assert_eq!(rgb(b"#000000000000000"), None);
    }

    #[test]
    fn named() {
        let c = parse_color(b"Navy Blue").unwrap();
        assert_eq!(c.rgb8(), [0, 0, 128]);
        assert!(!c.transparent);
        assert_eq!(parse_color(b"none"), None);
        assert_eq!(parse_color(b"bluish"), None);
    }

    #[test]
    fn eight_bit_channels() {
        let c = parse_color(b"#FFF000800").unwrap();
        assert_eq!(c.rgb8(), [255, 0, 128]);
        assert_eq!(c.alpha8(), 255);
        assert_eq!(ColorSpec::TRANSPARENT.alpha8(), 0);
    }
}
