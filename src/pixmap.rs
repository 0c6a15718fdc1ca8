//! Theme pixmaps: decoded images drawn onto a color surface and a 1-bit mask
//!
//! A [Pixmap] is the in-memory counterpart of a window system pixmap with its
//! shape mask. Drawing goes through the [Drawable] trait, so a window system
//! backend can receive decoded images the same way.

use std::path::Path;

use image::{GrayImage, ImageResult, Luma, Rgb, RgbImage};
use log::{debug, trace, warn};

use crate::xpm::{load_xpm, ColorSymbol, DecodedImage};

/// Mask value of an opaque pixel
const OPAQUE: Luma<u8> = Luma([0xff]);
/// Mask value of a transparent pixel
const CLEAR: Luma<u8> = Luma([0]);

const WHITE: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);

/// A surface with RGB content and a transparency mask
pub trait Drawable {
    fn dimensions(&self) -> (u32, u32);
    fn get_rgb(&self, x: u32, y: u32) -> Rgb<u8>;
    fn put_rgb(&mut self, x: u32, y: u32, color: Rgb<u8>);
    fn put_mask(&mut self, x: u32, y: u32, opaque: bool);
}

/// A color pixmap with its mask. Either both are present, or neither is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pixmap {
    planes: Option<(RgbImage, GrayImage)>,
}

impl Pixmap {
    /// A pixmap with neither color data nor mask
    pub fn empty() -> Pixmap {
        Pixmap { planes: None }
    }

    /// Create a black, fully transparent pixmap. If either dimension is zero,
    /// the pixmap is empty.
    pub fn new(width: u32, height: u32) -> Pixmap {
        trace!("creating pixmap, width={}, height={}", width, height);
        if width < 1 || height < 1 {
            return Pixmap::empty();
        }
        Pixmap {
            planes: Some((RgbImage::new(width, height), GrayImage::new(width, height))),
        }
    }

    /// Load `<dir>/<file>.xpm`, substituting `symbols` for its symbolic colors.
    ///
    /// If `<dir>/<file>.png` exists and has an alpha channel, it is composited
    /// over the decoded image before drawing. The pixmap has the size of the XPM
    /// image.
    pub fn load(
        dir: impl AsRef<Path>,
        file: &str,
        symbols: &[ColorSymbol],
    ) -> ImageResult<Pixmap> {
        let dir = dir.as_ref();
        trace!("loading pixmap {} from {}", file, dir.display());

        let filename = dir.join(format!("{}.xpm", file));
        #[allow(unused_mut)]
        let mut image = match load_xpm(&filename, symbols) {
            Ok(image) => image,
            Err(e) => {
                debug!("{} not loaded: {}", filename.display(), e);
                return Err(e);
            }
        };

        #[cfg(feature = "png")]
        compose_alpha_from_png(&mut image, &dir.join(format!("{}.png", file)));

        let (width, height) = image.dimensions();
        let mut pixmap = Pixmap::new(width, height);
        draw_image(&mut pixmap, &image);
        Ok(pixmap)
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_none()
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    /// The color plane, if the pixmap is not empty
    pub fn pixels(&self) -> Option<&RgbImage> {
        self.planes.as_ref().map(|(p, _)| p)
    }

    /// The mask plane (0 or 255 per pixel), if the pixmap is not empty
    pub fn mask(&self) -> Option<&GrayImage> {
        self.planes.as_ref().map(|(_, m)| m)
    }

    /// Whether the mask marks (x,y) as opaque; `None` outside the pixmap
    pub fn is_opaque(&self, x: u32, y: u32) -> Option<bool> {
        self.mask()?.get_pixel_checked(x, y).map(|m| m.0[0] != 0)
    }
}

impl Drawable for Pixmap {
    fn dimensions(&self) -> (u32, u32) {
        self.pixels().map_or((0, 0), |p| p.dimensions())
    }

    fn get_rgb(&self, x: u32, y: u32) -> Rgb<u8> {
        self.pixels()
            .and_then(|p| p.get_pixel_checked(x, y))
            .copied()
            .unwrap_or(Rgb([0, 0, 0]))
    }

    fn put_rgb(&mut self, x: u32, y: u32, color: Rgb<u8>) {
        if let Some(p) = self
            .planes
            .as_mut()
            .and_then(|(p, _)| p.get_pixel_mut_checked(x, y))
        {
            *p = color;
        }
    }

    fn put_mask(&mut self, x: u32, y: u32, opaque: bool) {
        if let Some(m) = self
            .planes
            .as_mut()
            .and_then(|(_, m)| m.get_pixel_mut_checked(x, y))
        {
            *m = if opaque { OPAQUE } else { CLEAR };
        }
    }
}

/// Region of an image drawn onto a surface: the image's top left corner, cropped
/// to the surface, with the surface centered on it
struct Placement {
    width: u32,
    height: u32,
    dest_x: u32,
    dest_y: u32,
}

impl Placement {
    fn new(image: (u32, u32), dest: (u32, u32)) -> Placement {
        let width = image.0.min(dest.0);
        let height = image.1.min(dest.1);
        Placement {
            width,
            height,
            dest_x: (dest.0 - width) / 2,
            dest_y: (dest.1 - height) / 2,
        }
    }
}

/// Copy `image` onto `dest`, centered if `dest` is larger and cropped if smaller.
///
/// Pixels with alpha 255 are made opaque in the mask, all others transparent.
pub fn draw_image<D: Drawable + ?Sized>(dest: &mut D, image: &DecodedImage) {
    let area = Placement::new(image.dimensions(), dest.dimensions());
    if area.width == 0 || area.height == 0 {
        warn!("Cannot draw onto an empty pixmap");
        return;
    }
    for y in 0..area.height {
        for x in 0..area.width {
            let [r, g, b, a] = image.pixel(x, y);
            dest.put_rgb(area.dest_x + x, area.dest_y + y, Rgb([r, g, b]));
            dest.put_mask(area.dest_x + x, area.dest_y + y, a >= 0xff);
        }
    }
}

/// Blend `image` over the existing content of `dest`, placed as in [draw_image].
/// The mask is left unchanged.
pub fn render_image<D: Drawable + ?Sized>(dest: &mut D, image: &DecodedImage) {
    let area = Placement::new(image.dimensions(), dest.dimensions());
    if area.width == 0 || area.height == 0 {
        warn!("Cannot render onto an empty pixmap");
        return;
    }
    for y in 0..area.height {
        for x in 0..area.width {
            let (dx, dy) = (area.dest_x + x, area.dest_y + y);
            let mut under = dest.get_rgb(dx, dy).0;
            composite_pixel(&mut under, image.pixel(x, y));
            dest.put_rgb(dx, dy, Rgb(under));
        }
    }
}

/// Rounded `x / 255` for `x <= 255 * 255`
fn div255(x: u32) -> u32 {
    (x + 0x80 + ((x + 0x80) >> 8)) >> 8
}

/// Composite `src` over `dst`, which is R,G,B or R,G,B,A
fn composite_pixel(dst: &mut [u8], src: [u8; 4]) {
    let a = src[3] as u32;
    if dst.len() < 4 {
        for (d, s) in dst.iter_mut().zip(src) {
            *d = div255(s as u32 * a + *d as u32 * (0xff - a)) as u8;
        }
        return;
    }
    let under = div255((0xff - a) * dst[3] as u32);
    let total = a + under;
    if total == 0 {
        return;
    }
    for i in 0..3 {
        dst[i] = ((src[i] as u32 * a + dst[i] as u32 * under + total / 2) / total) as u8;
    }
    dst[3] = total as u8;
}

/// Composite the PNG at `path`, if it exists and has an alpha channel, over the
/// top left of `image`. Returns whether anything was composited.
#[cfg(feature = "png")]
pub fn compose_alpha_from_png(image: &mut DecodedImage, path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let alpha = match image::open(path) {
        Ok(alpha) => alpha,
        Err(e) => {
            warn!("{}: {}", path.display(), e);
            return false;
        }
    };
    if !alpha.color().has_alpha() {
        return false;
    }
    let alpha = alpha.to_rgba8();

    let (width, height) = image.dimensions();
    let channels = image.channels();
    let stride = width as usize * channels;
    let overlap_w = width.min(alpha.width()) as usize;
    let overlap_h = height.min(alpha.height());

    let pixels = image.pixels_mut();
    for y in 0..overlap_h {
        let row = &mut pixels[y as usize * stride..][..overlap_w * channels];
        for (x, dst) in row.chunks_exact_mut(channels).enumerate() {
            composite_pixel(dst, alpha.get_pixel(x as u32, y).0);
        }
    }
    true
}

/// Tile `src` over the rectangle of `dst` at (x,y) of the given size, in both
/// color and mask. The tile starts at column `x` and at row 0. An empty `src`
/// fills with opaque white.
pub fn fill(src: &Pixmap, dst: &mut Pixmap, x: i32, y: i32, width: i32, height: i32) {
    trace!("filling pixmap, x={}, y={}, width={}, height={}", x, y, width, height);
    if width < 1 || height < 1 {
        return;
    }
    let (dst_w, dst_h) = dst.dimensions();
    let x0 = x.max(0) as i64;
    let y0 = y.max(0) as i64;
    let x1 = (x as i64 + width as i64).min(dst_w as i64);
    let y1 = (y as i64 + height as i64).min(dst_h as i64);

    for py in y0..y1 {
        for px in x0..x1 {
            let (color, opaque) = match &src.planes {
                Some((tile, mask)) => {
                    let tx = (px - x as i64).rem_euclid(tile.width() as i64) as u32;
                    let ty = py.rem_euclid(tile.height() as i64) as u32;
                    (*tile.get_pixel(tx, ty), mask.get_pixel(tx, ty).0[0] != 0)
                }
                None => (WHITE, true),
            };
            dst.put_rgb(px as u32, py as u32, color);
            dst.put_mask(px as u32, py as u32, opaque);
        }
    }
}

/// A new pixmap of the same size as `src`, filled from it
pub fn duplicate(src: &Pixmap) -> Pixmap {
    trace!("duplicating pixmap, width={}, height={}", src.width(), src.height());
    let mut dst = Pixmap::new(src.width(), src.height());
    fill(src, &mut dst, 0, 0, src.width() as i32, src.height() as i32);
    dst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpm::{decode_xpm, StreamSource};

    fn xpm(data: &str) -> DecodedImage {
        decode_xpm(&mut StreamSource::new(data.as_bytes()), &[]).unwrap()
    }

    /// 2x2 image: red, transparent / green, blue
    fn sample() -> DecodedImage {
        xpm("/* XPM */ static char *x[] = {
\"2 2 4 1\",
\"r c red\", \". c None\", \"g c #00FF00\", \"b c blue\",
\"r.\",
\"gb\"};")
    }

    #[test]
    fn empty_pixmaps() {
        assert!(Pixmap::empty().is_empty());
        assert!(Pixmap::new(0, 5).is_empty());
        assert!(Pixmap::new(5, 0).is_empty());
        assert_eq!(Pixmap::new(3, 2).dimensions(), (3, 2));
        assert_eq!(Pixmap::new(3, 2).is_opaque(0, 0), Some(false));
        assert_eq!(Pixmap::new(3, 2).is_opaque(3, 0), None);
    }

    #[test]
    fn draw_same_size() {
        let mut pm = Pixmap::new(2, 2);
        draw_image(&mut pm, &sample());
        assert_eq!(pm.get_rgb(0, 0), Rgb([255, 0, 0]));
        assert_eq!(pm.get_rgb(0, 1), Rgb([0, 255, 0]));
        assert_eq!(pm.get_rgb(1, 1), Rgb([0, 0, 255]));
        assert_eq!(pm.is_opaque(0, 0), Some(true));
        assert_eq!(pm.is_opaque(1, 0), Some(false));
        assert_eq!(pm.is_opaque(1, 1), Some(true));
    }

    #[test]
    fn draw_centered() {
        let mut pm = Pixmap::new(4, 5);
        draw_image(&mut pm, &sample());
        // image lands at (1, 1)
        assert_eq!(pm.get_rgb(1, 1), Rgb([255, 0, 0]));
        assert_eq!(pm.get_rgb(2, 2), Rgb([0, 0, 255]));
        assert_eq!(pm.get_rgb(0, 0), Rgb([0, 0, 0]));
        assert_eq!(pm.is_opaque(1, 1), Some(true));
        assert_eq!(pm.is_opaque(3, 3), Some(false));
    }

    #[test]
    fn draw_cropped() {
        let mut pm = Pixmap::new(1, 1);
        draw_image(&mut pm, &sample());
        assert_eq!(pm.get_rgb(0, 0), Rgb([255, 0, 0]));

        // wider than the image but not as tall
        let mut pm = Pixmap::new(4, 1);
        draw_image(&mut pm, &sample());
        assert_eq!(pm.get_rgb(1, 0), Rgb([255, 0, 0]));
        assert_eq!(pm.is_opaque(2, 0), Some(false));
    }

    #[test]
    fn draw_without_alpha_is_opaque() {
        let image = xpm("/* XPM */ static char *x[] = { \"1 1 1 1\", \"a c gray50\", \"a\" };");
        let mut pm = Pixmap::new(1, 1);
        draw_image(&mut pm, &image);
        assert_eq!(pm.get_rgb(0, 0), Rgb([127, 127, 127]));
        assert_eq!(pm.is_opaque(0, 0), Some(true));

        let mut empty = Pixmap::empty();
        draw_image(&mut empty, &image);
        assert!(empty.is_empty());
    }

    #[test]
    fn render_blends_over_content() {
        let mut pm = Pixmap::new(2, 2);
        fill(&Pixmap::empty(), &mut pm, 0, 0, 2, 2);
        render_image(&mut pm, &sample());
        assert_eq!(pm.get_rgb(0, 0), Rgb([255, 0, 0]));
        // transparent pixel leaves the white background
        assert_eq!(pm.get_rgb(1, 0), Rgb([255, 255, 255]));
        assert_eq!(pm.is_opaque(1, 0), Some(true));
    }

    #[test]
    fn composite_half_alpha() {
        let mut rgb = [0u8, 0, 0];
        composite_pixel(&mut rgb, [255, 255, 255, 128]);
        assert_eq!(rgb, [128, 128, 128]);

        let mut rgba = [255u8, 0, 0, 0];
        composite_pixel(&mut rgba, [0, 0, 255, 128]);
        assert_eq!(rgba, [0, 0, 255, 128]);

        let mut rgba = [255u8, 0, 0, 255];
        composite_pixel(&mut rgba, [0, 0, 255, 0]);
        assert_eq!(rgba, [255, 0, 0, 255]);

        let mut rgba = [10u8, 20, 30, 0];
        composite_pixel(&mut rgba, [0, 0, 0, 0]);
        assert_eq!(rgba, [10, 20, 30, 0]);
    }

    #[test]
    fn fill_tiles_from_column_origin() {
        let mut tile = Pixmap::new(2, 2);
        draw_image(&mut tile, &sample());

        let mut pm = Pixmap::new(5, 3);
        fill(&tile, &mut pm, 1, 1, 3, 2);
        // untouched outside the rectangle
        assert_eq!(pm.get_rgb(0, 1), Rgb([0, 0, 0]));
        assert_eq!(pm.get_rgb(4, 1), Rgb([0, 0, 0]));
        assert_eq!(pm.get_rgb(1, 0), Rgb([0, 0, 0]));
        // columns start at the tile origin, rows follow the pixmap
        assert_eq!(pm.get_rgb(1, 1), Rgb([0, 255, 0]));
        assert_eq!(pm.get_rgb(2, 1), Rgb([0, 0, 255]));
        assert_eq!(pm.get_rgb(3, 1), Rgb([0, 255, 0]));
        assert_eq!(pm.get_rgb(1, 2), Rgb([255, 0, 0]));
        assert_eq!(pm.is_opaque(2, 2), Some(false));
        assert_eq!(pm.is_opaque(3, 2), Some(true));
    }

    #[test]
    fn fill_is_clipped() {
        let mut pm = Pixmap::new(2, 2);
        fill(&Pixmap::empty(), &mut pm, -1, -1, 10, 10);
        assert!(pm.pixels().unwrap().pixels().all(|p| *p == WHITE));
        assert!(pm.mask().unwrap().pixels().all(|m| *m == OPAQUE));

        let mut pm = Pixmap::new(2, 2);
        fill(&Pixmap::empty(), &mut pm, 0, 0, 0, 2);
        assert_eq!(pm, Pixmap::new(2, 2));
    }

    #[test]
    fn duplicate_copies() {
        let mut pm = Pixmap::new(2, 2);
        draw_image(&mut pm, &sample());
        assert_eq!(duplicate(&pm), pm);
        assert!(duplicate(&Pixmap::empty()).is_empty());
    }
}
