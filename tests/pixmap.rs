use std::path::PathBuf;

use image::{Rgb, Rgba, RgbaImage};
use theme_pixmap::pixmap::{Drawable, Pixmap};
use theme_pixmap::xpm::ColorSymbol;

const BUTTON: &str = "/* XPM */
static char * button_xpm[] = {
\"3 2 3 1\",
\"  c None\",
\"a c #808080 s active_color\",
\"b c black\",
\"a b\",
\"bab\"};
";

/// A fresh, empty theme directory
fn theme_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("theme-pixmap-{}-{}", name, std::process::id()));
    _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn load_xpm_with_symbols() {
    let dir = theme_dir("symbols");
    std::fs::write(dir.join("button.xpm"), BUTTON).unwrap();

    let pm = Pixmap::load(&dir, "button", &[]).unwrap();
    assert_eq!(pm.dimensions(), (3, 2));
    assert_eq!(pm.get_rgb(0, 0), Rgb([128, 128, 128]));
    assert_eq!(pm.is_opaque(0, 0), Some(true));
    assert_eq!(pm.is_opaque(1, 0), Some(false));
    assert_eq!(pm.get_rgb(0, 1), Rgb([0, 0, 0]));

    let symbols = [ColorSymbol::new("Active_Color", "#FF0000")];
    let pm = Pixmap::load(&dir, "button", &symbols).unwrap();
    assert_eq!(pm.get_rgb(0, 0), Rgb([255, 0, 0]));
    assert_eq!(pm.get_rgb(1, 1), Rgb([255, 0, 0]));

    _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn load_missing_or_empty() {
    let dir = theme_dir("missing");
    assert!(Pixmap::load(&dir, "nothing", &[]).is_err());

    std::fs::write(dir.join("empty.xpm"), "").unwrap();
    assert!(Pixmap::load(&dir, "empty", &[]).is_err());

    std::fs::write(dir.join("garbage.xpm"), "not an image").unwrap();
    assert!(Pixmap::load(&dir, "garbage", &[]).is_err());

    _ = std::fs::remove_dir_all(&dir);
}

#[cfg(feature = "png")]
#[test]
fn companion_png_is_composited() {
    let dir = theme_dir("png");
    std::fs::write(dir.join("button.xpm"), BUTTON).unwrap();

    // opaque white over the top left pixel, fully transparent elsewhere, and
    // larger than the XPM image
    let mut overlay = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
    overlay.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
    overlay.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
    overlay.save(dir.join("button.png")).unwrap();

    let pm = Pixmap::load(&dir, "button", &[]).unwrap();
    assert_eq!(pm.dimensions(), (3, 2));
    assert_eq!(pm.get_rgb(0, 0), Rgb([255, 255, 255]));
    // a transparent XPM pixel takes the color and alpha of the PNG
    assert_eq!(pm.get_rgb(1, 0), Rgb([0, 0, 255]));
    assert_eq!(pm.is_opaque(1, 0), Some(true));
    assert_eq!(pm.get_rgb(2, 0), Rgb([0, 0, 0]));

    _ = std::fs::remove_dir_all(&dir);
}

#[cfg(feature = "png")]
#[test]
fn companion_png_without_alpha_is_ignored() {
    let dir = theme_dir("png-rgb");
    std::fs::write(dir.join("button.xpm"), BUTTON).unwrap();
    image::RgbImage::from_pixel(3, 2, Rgb([255, 255, 255]))
        .save(dir.join("button.png"))
        .unwrap();

    let pm = Pixmap::load(&dir, "button", &[]).unwrap();
    assert_eq!(pm.get_rgb(0, 0), Rgb([128, 128, 128]));
    assert_eq!(pm.is_opaque(1, 0), Some(false));

    // an unreadable companion is skipped too
    std::fs::write(dir.join("button.png"), "not a png").unwrap();
    let pm = Pixmap::load(&dir, "button", &[]).unwrap();
    assert_eq!(pm.get_rgb(0, 0), Rgb([128, 128, 128]));

    _ = std::fs::remove_dir_all(&dir);
}
