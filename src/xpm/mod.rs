//! Decoding of XPM Images
//!
//! XPM (X PixMap) Format is a plain text image format, originally designed to store
//! cursor and icon data. XPM images are valid C code.
//!
//! Window manager themes use XPM images for decoration pieces, with symbolic colors
//! (the `s` key) marking the parts which should follow the user's chosen colors.
//! This decoder therefore accepts a table of [ColorSymbol] values, which take
//! priority over the literal colors given in the file.
//!
//! This is a lenient decoder, matching what themes in the wild have relied upon:
//! - the C syntax around the strings is not validated; the reader only looks for
//!   the word `XPM`, the opening `{`, and then for double-quoted strings
//! - color entries which cannot be resolved (unknown names, malformed hex values,
//!   or only an `m` color) become transparent
//! - body rows which are missing or too short are left blank
//! - pixel codes missing from the color table use the first color table entry
//!
//! Files with an invalid `<Values>` line, or which end before the color table is
//! complete, are rejected.
//!
//! A number of features of the original libXpm are not supported:
//! - XPMEXT extensions
//! - HSV color specifications
//! - Output for non-color visuals
//!
//! # Related Links
//! * <https://www.x.org/docs/XPM/xpm.pdf> - XPM Manual version 3.4i, which specifies the format
//! * <https://en.wikipedia.org/wiki/X_PixMap> - The XPM format on wikipedia
//! * <https://gitlab.freedesktop.org/xorg/app/rgb/raw/master/rgb.txt> - X color names

mod color;
mod colorkey;
mod source;
mod x11r6colors;

pub use color::{parse_color, ColorSpec};
pub use colorkey::{extract_color, find_symbol, ColorSymbol};
pub use source::{StreamSource, XpmSource};
pub use x11r6colors::lookup_color;

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use image::error::{
    DecodingError, ImageError, ImageFormatHint, ImageResult, LimitError, LimitErrorKind,
    ParameterError, ParameterErrorKind,
};
use image::{
    ColorType, DynamicImage, ImageDecoder, LimitSupport, Limits, RgbImage, RgbaImage,
};
use log::debug;

/// Key XPM file properties determined from first line
#[derive(Debug, Clone, Copy)]
struct XpmHeaderInfo {
    width: u32,
    height: u32,
    ncolors: u32,
    /// characters per pixel
    cpp: u32,
    hotspot: Option<(i32, i32)>,
}

/// XPM color table, keyed by pixel code
struct XpmColorTable {
    colors: HashMap<Vec<u8>, ColorSpec>,
    /// Color of the first entry, used for pixel codes that are not in the table
    fallback: ColorSpec,
    /// Whether any entry is transparent
    has_alpha: bool,
}

/// Part of the XPM file in which the input ended
#[derive(Debug, Clone, Copy)]
enum XpmPart {
    Values,
    Colors,
}

#[derive(Debug)]
enum XpmDecodeError {
    EmptyFile,
    MissingPart(XpmPart),
    BadValueCount(usize),
    BadDimensions(i32, i32),
    BadCharsPerPixel(i32),
    BadColorCount(i32),
}

impl fmt::Display for XpmPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Values => f.write_str("<Values> section"),
            Self::Colors => f.write_str("<Colors> section"),
        }
    }
}

impl fmt::Display for XpmDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyFile => f.write_str("File is empty"),
            Self::MissingPart(part) => {
                f.write_fmt(format_args!("Input ended before the {}", part))
            }
            Self::BadValueCount(n) => f.write_fmt(format_args!(
                "Invalid <Values> section: {} integers, expected 4 or 6",
                n
            )),
            Self::BadDimensions(w, h) => {
                f.write_fmt(format_args!("Invalid image dimensions {}x{}", w, h))
            }
            Self::BadCharsPerPixel(c) => f.write_fmt(format_args!(
                "Invalid number of characters per pixel: {} is not in [1,31]",
                c
            )),
            Self::BadColorCount(n) => {
                f.write_fmt(format_args!("Invalid number of colors: {}", n))
            }
        }
    }
}

impl std::error::Error for XpmDecodeError {}

impl From<XpmDecodeError> for ImageError {
    fn from(e: XpmDecodeError) -> ImageError {
        ImageError::Decoding(DecodingError::new(ImageFormatHint::Name("XPM".into()), e))
    }
}

/// Helper trait for the pattern in which, after calling a function returning a Result,
/// one wishes to use an error from a different source.
trait XpmDecoderIoInjectionExt {
    type Value;
    fn apply_after<S: XpmSource + ?Sized>(self, source: &mut S) -> ImageResult<Self::Value>;
}

impl<X> XpmDecoderIoInjectionExt for Result<X, XpmDecodeError> {
    type Value = X;
    fn apply_after<S: XpmSource + ?Sized>(self, source: &mut S) -> ImageResult<Self::Value> {
        if let Some(err) = source.take_io_error() {
            return Err(ImageError::IoError(err));
        }
        match self {
            Self::Ok(x) => Ok(x),
            Self::Err(e) => Err(e.into()),
        }
    }
}

fn insufficient_memory() -> ImageError {
    ImageError::Limits(LimitError::from_kind(LimitErrorKind::InsufficientMemory))
}

/// Parse up to `values.len()` integers from the start of `data`, separated by
/// whitespace and each with an optional sign. Stops at the first word which
/// does not start with an integer, and returns the number of integers read.
fn scan_integers(data: &[u8], values: &mut [i32]) -> usize {
    let mut pos = 0;
    for (count, value) in values.iter_mut().enumerate() {
        while pos < data.len() && source::is_c_space(data[pos]) {
            pos += 1;
        }
        let mut negative = false;
        if let Some(sign @ (b'+' | b'-')) = data.get(pos) {
            negative = *sign == b'-';
            pos += 1;
        }
        let start = pos;
        let mut x: i64 = 0;
        while let Some(c @ b'0'..=b'9') = data.get(pos) {
            x = x * 10 + (*c - b'0') as i64;
            if x > i64::from(i32::MAX) + 1 {
                return count;
            }
            pos += 1;
        }
        if pos == start {
            return count;
        }
        let Ok(v) = i32::try_from(if negative { -x } else { x }) else {
            return count;
        };
        *value = v;
    }
    values.len()
}

/// Read and validate the `<Values>` line:
/// `<width> <height> <ncolors> <cpp> [<x_hotspot> <y_hotspot>]`
fn read_xpm_header<S: XpmSource + ?Sized>(
    source: &mut S,
) -> Result<XpmHeaderInfo, XpmDecodeError> {
    let line = source
        .read_header()
        .ok_or(XpmDecodeError::MissingPart(XpmPart::Values))?;

    let mut values = [0i32; 6];
    let items = scan_integers(line, &mut values);
    if items != 4 && items != 6 {
        return Err(XpmDecodeError::BadValueCount(items));
    }
    let [width, height, ncolors, cpp, x_hot, y_hot] = values;

    if width <= 0 || height <= 0 {
        return Err(XpmDecodeError::BadDimensions(width, height));
    }
    if cpp <= 0 || cpp >= 32 {
        return Err(XpmDecodeError::BadCharsPerPixel(cpp));
    }
    // Bound the size of the color table (codes with terminators, and entries)
    // before anything is allocated for it
    if ncolors <= 0
        || ncolors >= i32::MAX / (cpp + 1)
        || ncolors as usize >= i32::MAX as usize / size_of::<ColorSpec>()
    {
        return Err(XpmDecodeError::BadColorCount(ncolors));
    }

    Ok(XpmHeaderInfo {
        width: width as u32,
        height: height as u32,
        ncolors: ncolors as u32,
        cpp: cpp as u32,
        hotspot: (items == 6).then_some((x_hot, y_hot)),
    })
}

/// Resolve the color for the part of a color table entry after the pixel code
fn resolve_color(entry: &[u8], symbols: &[ColorSymbol]) -> ColorSpec {
    let Some(name) = extract_color(entry, symbols) else {
        debug!(
            "XPM color entry \"{}\" has no usable color, using transparent",
            String::from_utf8_lossy(entry)
        );
        return ColorSpec::TRANSPARENT;
    };
    if name.eq_ignore_ascii_case(b"none") {
        return ColorSpec::TRANSPARENT;
    }
    parse_color(&name).unwrap_or_else(|| {
        debug!(
            "Unknown XPM color \"{}\", using transparent",
            String::from_utf8_lossy(&name)
        );
        ColorSpec::TRANSPARENT
    })
}

/// Read the `<Colors>` section: `ncolors` entries, each starting with a pixel code
fn read_xpm_color_table<S: XpmSource + ?Sized>(
    source: &mut S,
    info: &XpmHeaderInfo,
    symbols: &[ColorSymbol],
) -> Result<XpmColorTable, XpmDecodeError> {
    debug_assert!(x11r6colors::table_is_sorted());

    let cpp = info.cpp as usize;
    // Not reserved from `ncolors`: the table only grows with the entries actually read
    let mut colors = HashMap::new();
    let mut fallback = None;
    let mut has_alpha = false;

    for _col in 0..info.ncolors {
        let row = source
            .read_colormap_row()
            .ok_or(XpmDecodeError::MissingPart(XpmPart::Colors))?;

        // A row shorter than `cpp` gives a short code, which no pixel will match
        let (code, entry) = row.split_at(cpp.min(row.len()));
        let color = resolve_color(entry, symbols);
        has_alpha |= color.transparent;
        if fallback.is_none() {
            fallback = Some(color);
        }
        colors.insert(code.to_vec(), color);
    }

    Ok(XpmColorTable {
        colors,
        fallback: fallback.unwrap_or(ColorSpec::TRANSPARENT),
        has_alpha,
    })
}

/// Read the `<Pixels>` section into `buf`, which holds `height` rows of `width`
/// RGB or RGBA pixels (RGBA iff the color table has transparent entries).
///
/// Rows which are missing or shorter than `width * cpp` are zeroed.
fn read_xpm_body<S: XpmSource + ?Sized>(
    source: &mut S,
    info: &XpmHeaderInfo,
    table: &XpmColorTable,
    buf: &mut [u8],
) {
    let cpp = info.cpp as usize;
    let channels = if table.has_alpha { 4 } else { 3 };
    let row_bytes = info.width as usize * cpp;
    let stride = info.width as usize * channels;

    for (y, out) in buf.chunks_exact_mut(stride).enumerate() {
        let row = match source.read_body_row() {
            Some(row) if row.len() >= row_bytes => row,
            Some(row) => {
                debug!(
                    "XPM row {} is too short ({} < {} bytes), skipping",
                    y,
                    row.len(),
                    row_bytes
                );
                out.fill(0);
                continue;
            }
            None => {
                debug!("XPM row {} is missing, skipping", y);
                out.fill(0);
                continue;
            }
        };

        for (code, pixel) in row[..row_bytes]
            .chunks_exact(cpp)
            .zip(out.chunks_exact_mut(channels))
        {
            let color = table.colors.get(code).unwrap_or(&table.fallback);
            pixel[..3].copy_from_slice(&color.rgb8());
            if channels == 4 {
                pixel[3] = color.alpha8();
            }
        }
    }
}

/// Number of bytes in the decoded image
fn image_bytes(info: &XpmHeaderInfo, has_alpha: bool) -> Option<u64> {
    let channels = if has_alpha { 4 } else { 3 };
    u64::from(info.width)
        .checked_mul(u64::from(info.height))?
        .checked_mul(channels)
}

/// A fully decoded XPM image
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    /// Row major, 3 or 4 bytes per pixel, no padding
    pixels: Vec<u8>,
    has_alpha: bool,
    hotspot: Option<(i32, i32)>,
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether pixels have an alpha byte after R,G,B
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Returns the (x,y) hotspot coordinates of the image, if the image provides them.
    pub fn hotspot(&self) -> Option<(i32, i32)> {
        self.hotspot
    }

    pub fn channels(&self) -> usize {
        if self.has_alpha {
            4
        } else {
            3
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// The pixel at (x,y) as R,G,B,A; alpha is 255 for images without alpha.
    ///
    /// Panics if (x,y) is outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        let channels = self.channels();
        let i = (y as usize * self.width as usize + x as usize) * channels;
        let p = &self.pixels[i..i + channels];
        [p[0], p[1], p[2], if self.has_alpha { p[3] } else { 0xff }]
    }

    /// Convert into an RGB8 or RGBA8 image of the image crate
    pub fn into_dynamic_image(self) -> ImageResult<DynamicImage> {
        let mismatch = || {
            ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            ))
        };
        if self.has_alpha {
            RgbaImage::from_raw(self.width, self.height, self.pixels)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(mismatch)
        } else {
            RgbImage::from_raw(self.width, self.height, self.pixels)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(mismatch)
        }
    }
}

/// Decode a complete XPM image.
///
/// Symbolic colors are looked up in `symbols`. Fails if the `<Values>` line is
/// missing or invalid, if the input ends inside the `<Colors>` section, or if
/// the pixel buffer cannot be allocated.
pub fn decode_xpm<S: XpmSource + ?Sized>(
    source: &mut S,
    symbols: &[ColorSymbol],
) -> ImageResult<DecodedImage> {
    let info = read_xpm_header(source).apply_after(source)?;
    let table = read_xpm_color_table(source, &info, symbols).apply_after(source)?;

    let size = image_bytes(&info, table.has_alpha)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(insufficient_memory)?;
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(size)
        .map_err(|_| insufficient_memory())?;
    pixels.resize(size, 0);

    read_xpm_body(source, &info, &table, &mut pixels);

    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        pixels,
        has_alpha: table.has_alpha,
        hotspot: info.hotspot,
    })
}

/// Open and decode an XPM file. Empty files are rejected.
pub fn load_xpm(path: impl AsRef<Path>, symbols: &[ColorSymbol]) -> ImageResult<DecodedImage> {
    let mut reader = BufReader::new(File::open(path)?);
    if reader.fill_buf()?.is_empty() {
        return Err(XpmDecodeError::EmptyFile.into());
    }
    decode_xpm(&mut StreamSource::new(reader), symbols)
}

/// XPM decoder
///
/// The header and color table are read on construction, as the output color type
/// (RGB8, or RGBA8 if any color is transparent) depends on the color table.
pub struct XpmDecoder<R> {
    source: StreamSource<R>,
    info: XpmHeaderInfo,
    table: XpmColorTable,
}

impl<R> XpmDecoder<R>
where
    R: BufRead,
{
    /// Create a new [XpmDecoder].
    pub fn new(reader: R) -> Result<XpmDecoder<R>, ImageError> {
        XpmDecoder::with_symbols(reader, &[])
    }

    /// Create a new [XpmDecoder] which substitutes the given symbolic colors.
    pub fn with_symbols(
        reader: R,
        symbols: &[ColorSymbol],
    ) -> Result<XpmDecoder<R>, ImageError> {
        let mut source = StreamSource::new(reader);

        let result = read_xpm_header(&mut source).and_then(|info| {
            let table = read_xpm_color_table(&mut source, &info, symbols)?;
            Ok((info, table))
        });
        if result.is_err() {
            debug!("XPM decoding stopped at {}", source.location());
        }
        let (info, table) = result.apply_after(&mut source)?;

        Ok(XpmDecoder {
            source,
            info,
            table,
        })
    }

    /// Returns the (x,y) hotspot coordinates of the image, if the image provides them.
    pub fn hotspot(&self) -> Option<(i32, i32)> {
        self.info.hotspot
    }
}

impl<R: BufRead> ImageDecoder for XpmDecoder<R> {
    fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }
    fn color_type(&self) -> ColorType {
        if self.table.has_alpha {
            ColorType::Rgba8
        } else {
            ColorType::Rgb8
        }
    }
    fn read_image(mut self, buf: &mut [u8]) -> ImageResult<()>
    where
        Self: Sized,
    {
        assert_eq!(
            Some(buf.len() as u64),
            image_bytes(&self.info, self.table.has_alpha),
            "Invalid buffer size"
        );
        read_xpm_body(&mut self.source, &self.info, &self.table, buf);
        Ok(())
    }
    fn read_image_boxed(self: Box<Self>, buf: &mut [u8]) -> ImageResult<()> {
        (*self).read_image(buf)
    }

    fn set_limits(&mut self, limits: Limits) -> ImageResult<()> {
        limits.check_support(&LimitSupport::default())?;
        let (width, height) = self.dimensions();
        limits.check_dimensions(width, height)?;

        let max_image_bytes = image_bytes(&self.info, self.table.has_alpha).ok_or(
            ImageError::Limits(LimitError::from_kind(LimitErrorKind::DimensionError)),
        )?;

        let max_table_bytes = (self.info.ncolors as u64)
            * ((size_of::<ColorSpec>() as u64) + (self.info.cpp as u64));
        let max_bytes = max_image_bytes
            .checked_add(max_table_bytes)
            .ok_or_else(insufficient_memory)?;

        let max_alloc = limits.max_alloc.unwrap_or(u64::MAX);
        if max_alloc < max_bytes {
            return Err(insufficient_memory());
        }
        Ok(())
    }
}
