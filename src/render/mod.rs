/// Per-frame layer compositing.
pub mod compositor;
/// `vello_cpu` raster surface.
pub mod cpu;
/// Drawing surface boundary and a recording implementation.
pub mod surface;
