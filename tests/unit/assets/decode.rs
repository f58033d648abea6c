use super::*;

#[test]
fn decode_png_premultiplies() {
    let mut img = image::RgbaImage::new(2, 1);
    img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
    img.put_pixel(1, 0, image::Rgba([255, 255, 255, 128]));
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .unwrap();

    let decoded = decode_image(&bytes).unwrap();
    assert_eq!((decoded.width, decoded.height), (2, 1));
    assert_eq!(decoded.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(decoded.pixel(1, 0), Some([128, 128, 128, 128]));
    assert_eq!(decoded.pixel(2, 0), None);
}

#[test]
fn decode_garbage_is_an_error() {
    assert!(decode_image(b"not an image").is_err());
}

#[test]
fn from_premul_checks_length() {
    assert!(RasterImage::from_premul(2, 2, vec![0; 15]).is_err());
    assert!(RasterImage::from_premul(0, 2, Vec::new()).is_err());
    let solid = RasterImage::solid(3, 2, Rgba8Premul::from_straight_rgba(0, 0, 255, 255)).unwrap();
    assert_eq!(solid.rgba8_premul.len(), 24);
    assert_eq!(solid.pixel(2, 1), Some([0, 0, 255, 255]));
}
