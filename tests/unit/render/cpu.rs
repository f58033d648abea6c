use super::*;

fn close(a: [u8; 4], b: [u8; 4]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 2)
}

fn system_font() -> Option<Vec<u8>> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok())
}

#[test]
fn rejects_zero_size() {
    assert!(CpuSurface::new(0, 4).unwrap_err().is_config());
    let mut s = CpuSurface::new(4, 4).unwrap();
    assert!(s.resize(4, 0).unwrap_err().is_config());
    assert_eq!(s.size(), (4, 4));
}

#[test]
fn clear_color_fills_presented_frame() {
    let mut s = CpuSurface::new(3, 2).unwrap();
    s.clear(Rgba8Premul::from_straight_rgba(0, 0, 255, 255));
    s.present().unwrap();
    let frame = s.read_rgba8().unwrap();
    assert_eq!(frame.data.len(), 3 * 2 * 4);
    assert!(frame.premultiplied);
    assert_eq!(frame.pixel(2, 1), Some([0, 0, 255, 255]));
}

#[test]
fn fill_rect_respects_opacity_and_clip() {
    let mut s = CpuSurface::new(4, 4).unwrap();
    s.clear(Rgba8Premul::transparent());
    let state = DrawState {
        clip: Some(Rect::new(0.0, 0.0, 2.0, 4.0)),
        opacity: 0.5,
        ..DrawState::default()
    };
    s.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::rgb(255, 0, 0), &state);
    s.present().unwrap();

    let frame = s.read_rgba8().unwrap();
    let inside = frame.pixel(0, 1).unwrap();
    assert!(close(inside, [128, 0, 0, 128]), "{inside:?}");
    assert_eq!(frame.pixel(3, 1), Some([0, 0, 0, 0]));
}

#[test]
fn draw_image_stretches_to_destination() {
    let mut s = CpuSurface::new(8, 8).unwrap();
    let img = RasterImage::solid(2, 2, Rgba8Premul::from_straight_rgba(0, 255, 0, 255)).unwrap();
    s.clear(Rgba8Premul::transparent());
    s.draw_image(&img, Rect::new(0.0, 0.0, 8.0, 8.0), &DrawState::default())
        .unwrap();
    s.present().unwrap();

    let frame = s.read_rgba8().unwrap();
    assert!(close(frame.pixel(0, 0).unwrap(), [0, 255, 0, 255]));
    assert!(close(frame.pixel(7, 7).unwrap(), [0, 255, 0, 255]));
}

#[test]
fn each_frame_starts_from_clear() {
    let mut s = CpuSurface::new(2, 2).unwrap();
    s.clear(Rgba8Premul::transparent());
    s.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Color::rgb(255, 255, 255), &DrawState::default());
    s.present().unwrap();

    s.clear(Rgba8Premul::transparent());
    s.present().unwrap();
    assert_eq!(s.read_rgba8().unwrap().pixel(0, 0), Some([0, 0, 0, 0]));
}

#[test]
fn text_without_font_is_skipped() {
    let mut s = CpuSurface::new(16, 16).unwrap();
    s.clear(Rgba8Premul::transparent());
    s.draw_text("hi", Color::rgb(255, 255, 255), 12.0, Point::new(8.0, 8.0), &DrawState::default())
        .unwrap();
    s.present().unwrap();
    assert!(s.read_rgba8().unwrap().data.iter().all(|&b| b == 0));
}

#[test]
fn text_with_font_draws_glyphs() {
    let Some(font) = system_font() else {
        return;
    };
    let mut s = CpuSurface::new(64, 32).unwrap().with_font(&font).unwrap();
    assert!(s.has_font());
    s.clear(Rgba8Premul::transparent());
    s.draw_text("Hi", Color::rgb(255, 255, 255), 20.0, Point::new(32.0, 16.0), &DrawState::default())
        .unwrap();
    s.present().unwrap();
    let frame = s.read_rgba8().unwrap();
    assert!(frame.data.chunks_exact(4).any(|px| px[3] > 0));
}
