use walkdir::WalkDir;

/// Test decoding of all XPM images in `tests/images/` against reference PAM files.
///
/// If a reference PAM file for an image does not exist or does not match,
/// it will be created/overwritten with the newly decoded image.
///
/// To add new test images, simply place them under `tests/images/xpm/`
/// and run `cargo test`.
#[test]
fn test_decoding() {
    theme_pixmap::register();

    let mut errors = vec![];

    for entry in WalkDir::new("tests/images") {
        let entry = entry.unwrap();
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|ext| ext.to_str()) != Some("xpm")
        {
            continue;
        }

        let mut add_error = |e: &str| {
            errors.push(format!("{}: {}", entry.path().display(), e));
        };

        let img = match image::open(entry.path()) {
            Ok(i) => i,
            Err(e) => {
                add_error(&format!("Cannot decode image: {e}"));
                continue;
            }
        };

        let ref_path = entry.path().with_extension("pam");

        let save_reference = || {
            _ = img.save_with_format(&ref_path, image::ImageFormat::Pnm); // save and ignore errors
        };

        if !ref_path.exists() {
            add_error("No reference PAM file found");
            save_reference();
            continue;
        }

        let reference = image::open(&ref_path).unwrap();

        if img != reference {
            add_error("Does not match reference");
            save_reference();
        }
    }

    if !errors.is_empty() {
        panic!("Decoding errors:\n{}", errors.join("\n"));
    }
}

#[test]
fn hotspot_through_decoder() {
    let file = std::fs::File::open("tests/images/xpm/transparent.xpm").unwrap();
    let decoder = theme_pixmap::xpm::XpmDecoder::new(std::io::BufReader::new(file)).unwrap();
    assert_eq!(decoder.hotspot(), Some((1, 1)));
}

#[test]
fn load_matches_decoder() {
    let image = theme_pixmap::xpm::load_xpm("tests/images/xpm/colors.xpm", &[]).unwrap();
    let reference = image::open("tests/images/xpm/colors.pam").unwrap();
    assert_eq!(image.into_dynamic_image().unwrap(), reference);
}
