//! This crate loads window-manager theme pixmaps stored as XPM images.
//!
//! An XPM file is decoded into packed RGB or RGBA pixels, with symbolic colors
//! optionally replaced by a caller supplied table, and then drawn onto a
//! [`pixmap::Pixmap`] together with a transparency mask.
//!
//! ```rust,no_run
//! use theme_pixmap::pixmap::Pixmap;
//! use theme_pixmap::xpm::ColorSymbol;
//!
//! let symbols = [ColorSymbol::new("active_color_1", "#336699")];
//! let pixmap = Pixmap::load("path/to/theme", "title-1-active", &symbols).unwrap();
//! ```
//!
//! XPM images can also be opened through the image crate, once the `register`
//! function has been called at program startup:
//!
//!  ```rust,no_run
//! theme_pixmap::register();
//!
//! let img = image::open("path/to/image.xpm").unwrap();
//! ```

#![forbid(unsafe_code)]

pub mod pixmap;
pub mod xpm;

use image::hooks::{register_decoding_hook, register_format_detection_hook};

static REGISTER: std::sync::Once = std::sync::Once::new();

/// Register the XPM decoder with the image crate.
pub fn register() {
    REGISTER.call_once(|| {
        if register_decoding_hook(
            "xpm".into(),
            Box::new(|r| Ok(Box::new(xpm::XpmDecoder::new(r)?))),
        ) {
            register_format_detection_hook("xpm".into(), b"/* XPM */", None);
        }
    });
}
