use super::*;
use crate::assets::loader::MemoryMediaLoader;
use crate::foundation::core::{Fps, Rgba8Premul};
use crate::render::cpu::CpuSurface;
use crate::render::surface::{DrawCommand, RecordingSurface};
use crate::timeline::model::{Item, MediaClip, Timeline, Track};

fn fps30() -> Fps {
    Fps::whole(30).unwrap()
}

fn recording(w: u32, h: u32) -> Compositor<RecordingSurface> {
    Compositor::new(RecordingSurface::new(w, h).unwrap(), CompositorOpts::default()).unwrap()
}

fn no_frames() -> HashMap<ItemId, Arc<RasterImage>> {
    HashMap::new()
}

fn draws(c: &Compositor<RecordingSurface>) -> Vec<&DrawCommand> {
    c.surface()
        .commands()
        .iter()
        .filter(|cmd| !matches!(cmd, DrawCommand::Clear(_) | DrawCommand::Present))
        .collect()
}

#[test]
fn solid_fills_whole_surface_with_item_color() {
    let tl = Timeline::new(fps30()).with_tracks([
        Track::new("t0", "Main").with_items([Item::solid("s", 0, 20, Color::rgb(128, 0, 128))])
    ]);
    let mut c = recording(640, 360);
    let stats = c.render_frame(&tl.render_plan(10), &no_frames()).unwrap();
    assert_eq!(stats, CompositeStats { drawn: 1, skipped: 0 });

    let cmds = c.surface().commands();
    assert!(matches!(cmds.first(), Some(DrawCommand::Clear(_))));
    assert!(matches!(cmds.last(), Some(DrawCommand::Present)));
    match draws(&c)[..] {
        [DrawCommand::FillRect { rect, color, state }] => {
            assert_eq!(*rect, Rect::new(0.0, 0.0, 640.0, 360.0));
            assert_eq!(*color, Color::rgb(128, 0, 128));
            assert_eq!(state.opacity, 1.0);
            assert!(state.clip.is_none());
        }
        ref other => panic!("unexpected draws {other:?}"),
    }
}

#[test]
fn missing_video_frame_and_still_are_skipped() {
    let tl = Timeline::new(fps30()).with_tracks([Track::new("t0", "Main").with_items([
        Item::video("v", 0, 30, MediaClip::new("clip.mp4", 0.0, 5.0)),
        Item::image("i", 0, 30, "logo.png"),
    ])]);
    let mut c = recording(64, 64);
    let stats = c.render_frame(&tl.render_plan(0), &no_frames()).unwrap();
    assert_eq!(stats, CompositeStats { drawn: 0, skipped: 2 });
    assert!(draws(&c).is_empty());

    c.insert_still("logo.png", RasterImage::solid(2, 2, Rgba8Premul::transparent()).unwrap());
    let frames = HashMap::from([(
        ItemId::new("v"),
        Arc::new(RasterImage::solid(8, 8, Rgba8Premul::transparent()).unwrap()),
    )]);
    let stats = c.render_frame(&tl.render_plan(0), &frames).unwrap();
    assert_eq!(stats.drawn, 2);
    match draws(&c)[..] {
        [DrawCommand::Image { width: 8, dst: d0, .. }, DrawCommand::Image { width: 2, dst: d1, .. }] => {
            assert_eq!(*d0, Rect::new(0.0, 0.0, 64.0, 64.0));
            assert_eq!(d0, d1);
        }
        ref other => panic!("unexpected draws {other:?}"),
    }
}

#[test]
fn text_is_centered_at_configured_size() {
    let tl = Timeline::new(fps30()).with_tracks([Track::new("t0", "Main")
        .with_items([Item::text("t", 0, 10, "Title", Color::rgb(255, 255, 255))])]);
    let mut c = recording(200, 100);
    c.render_frame(&tl.render_plan(0), &no_frames()).unwrap();
    match draws(&c)[..] {
        [DrawCommand::Text { text, size_px, center, .. }] => {
            assert_eq!(text, "Title");
            assert_eq!(*size_px, 48.0);
            assert_eq!(*center, Point::new(100.0, 50.0));
        }
        ref other => panic!("unexpected draws {other:?}"),
    }
}

#[test]
fn crossfade_scales_opacity_and_wipe_clips() {
    let fade = Timeline::new(fps30()).with_tracks([Track::new("t0", "Main").with_items([
        Item::solid("a", 0, 30, Color::rgb(255, 0, 0))
            .with_transition_out(TransitionKind::Crossfade, 11),
        Item::solid("b", 15, 30, Color::rgb(0, 0, 255)),
    ])]);
    let mut c = recording(100, 50);
    // Window [19, 30): frame 24 is halfway.
    c.render_frame(&fade.render_plan(24), &no_frames()).unwrap();
    let outgoing = draws(&c)
        .into_iter()
        .find_map(|cmd| match cmd {
            DrawCommand::FillRect { color, state, .. } if color.r == 255 => Some(*state),
            _ => None,
        })
        .unwrap();
    assert!((outgoing.opacity - 0.5).abs() < 1e-6);

    let wipe = Timeline::new(fps30()).with_tracks([Track::new("t0", "Main").with_items([
        Item::solid("a", 0, 30, Color::rgb(255, 0, 0)).with_transition_out(TransitionKind::Wipe, 11),
        Item::solid("b", 15, 30, Color::rgb(0, 0, 255)),
    ])]);
    c.render_frame(&wipe.render_plan(24), &no_frames()).unwrap();
    let outgoing = draws(&c)
        .into_iter()
        .find_map(|cmd| match cmd {
            DrawCommand::FillRect { color, state, .. } if color.r == 255 => Some(*state),
            _ => None,
        })
        .unwrap();
    assert_eq!(outgoing.opacity, 1.0);
    assert_eq!(outgoing.clip, Some(Rect::new(0.0, 0.0, 50.0, 50.0)));
}

#[test]
fn update_size_validates_and_keeps_stills() {
    let mut c = recording(10, 10);
    c.insert_still("a.png", RasterImage::solid(1, 1, Rgba8Premul::transparent()).unwrap());
    assert!(c.update_size(0, 10).unwrap_err().is_config());
    c.update_size(20, 5).unwrap();
    assert_eq!(c.surface().size(), (20, 5));
    assert!(c.has_still("a.png"));
}

#[test]
fn new_rejects_zero_sized_surface() {
    struct ZeroSurface(RecordingSurface);
    impl DrawSurface for ZeroSurface {
        fn size(&self) -> (u32, u32) {
            (0, 0)
        }
        fn resize(&mut self, w: u32, h: u32) -> CutlineResult<()> {
            self.0.resize(w, h)
        }
        fn clear(&mut self, color: crate::foundation::core::Rgba8Premul) {
            self.0.clear(color)
        }
        fn fill_rect(&mut self, rect: Rect, color: Color, state: &DrawState) {
            self.0.fill_rect(rect, color, state)
        }
        fn draw_image(&mut self, i: &RasterImage, d: Rect, s: &DrawState) -> CutlineResult<()> {
            self.0.draw_image(i, d, s)
        }
        fn draw_text(
            &mut self,
            t: &str,
            c: Color,
            px: f32,
            p: Point,
            s: &DrawState,
        ) -> CutlineResult<()> {
            self.0.draw_text(t, c, px, p, s)
        }
        fn present(&mut self) -> CutlineResult<()> {
            self.0.present()
        }
        fn read_rgba8(&self) -> CutlineResult<FrameRGBA> {
            self.0.read_rgba8()
        }
    }

    let err = Compositor::new(
        ZeroSurface(RecordingSurface::new(1, 1).unwrap()),
        CompositorOpts::default(),
    )
    .err()
    .unwrap();
    assert!(err.is_config());
}

#[test]
fn load_stills_skips_failures() {
    let loader = MemoryMediaLoader::new()
        .with_still("a.png", RasterImage::solid(1, 1, Rgba8Premul::transparent()).unwrap());
    let mut c = recording(4, 4);
    let loaded = c.load_stills(["a.png", "a.png", "missing.png"], &loader);
    assert_eq!(loaded, 1);
    assert!(c.has_still("a.png"));
    assert!(!c.has_still("missing.png"));
}

#[test]
fn cpu_composite_puts_track_zero_on_top() {
    let tl = Timeline::new(fps30()).with_tracks([
        Track::new("top", "Top").with_items([Item::solid("red", 0, 10, Color::rgb(255, 0, 0))]),
        Track::new("bot", "Bottom").with_items([Item::solid("blue", 0, 10, Color::rgb(0, 0, 255))]),
    ]);
    let mut c = Compositor::new(CpuSurface::new(4, 4).unwrap(), CompositorOpts::default()).unwrap();
    c.render_frame(&tl.render_plan(0), &no_frames()).unwrap();
    assert_eq!(c.read_rgba8().unwrap().pixel(1, 1), Some([255, 0, 0, 255]));
}
