use super::*;
use crate::foundation::core::Rgba8Premul;

#[test]
fn normalize_rel_path_cleans_and_rejects_escapes() {
    assert_eq!(normalize_rel_path("a/./b//c.png").unwrap(), "a/b/c.png");
    assert_eq!(normalize_rel_path("a\\b.mp4").unwrap(), "a/b.mp4");
    assert!(normalize_rel_path("/abs.png").is_err());
    assert!(normalize_rel_path("../up.png").is_err());
    assert!(normalize_rel_path("./").is_err());
    assert!(normalize_rel_path("").is_err());
}

#[test]
fn fs_loader_resolves_under_root() {
    let loader = FsMediaLoader::new("media");
    assert_eq!(
        loader.resolve("clips/a.mp4").unwrap(),
        PathBuf::from("media").join("clips/a.mp4")
    );
    assert!(loader.resolve("../secret").is_err());
}

#[test]
fn fs_loader_decodes_png_stills() {
    let dir = PathBuf::from("target").join("loader_unit");
    std::fs::create_dir_all(&dir).unwrap();
    let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([0, 255, 0, 255]));
    img.save(dir.join("still.png")).unwrap();

    let loader = FsMediaLoader::new(&dir);
    let still = loader.load_still("still.png").unwrap();
    assert_eq!((still.width, still.height), (3, 2));
    assert_eq!(still.pixel(2, 1), Some([0, 255, 0, 255]));
    assert!(loader.load_still("missing.png").is_err());
}

#[test]
fn memory_loader_serves_registered_media() {
    let frame_fn: FrameFn =
        Arc::new(|_| RasterImage::solid(4, 2, Rgba8Premul::from_straight_rgba(9, 9, 9, 255)));
    let loader = MemoryMediaLoader::new()
        .with_still("logo.png", RasterImage::solid(1, 1, Rgba8Premul::transparent()).unwrap())
        .with_audio(
            "music.wav",
            AudioBuffer::constant(48_000, 2, 2.0, 0.1).unwrap(),
        )
        .with_video("clip.mp4", 4, 2, 3.0, frame_fn);

    assert!(loader.load_still("logo.png").is_ok());
    assert!(loader.load_still("nope.png").is_err());

    let info = loader.probe("clip.mp4").unwrap();
    assert!(info.has_video() && !info.has_audio());
    assert_eq!((info.width, info.height), (4, 2));

    let audio = loader.probe("music.wav").unwrap();
    assert!(audio.has_audio());
    assert!((audio.duration_s - 2.0).abs() < 1e-9);

    let dec = loader.open_video("clip.mp4").unwrap();
    assert_eq!(dec.config().coded_width, 4);
    assert!(loader.open_video("music.wav").is_err());
    assert!(loader.load_audio("music.wav", 48_000).is_ok());
}
