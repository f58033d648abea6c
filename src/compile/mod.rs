//! Render-plan compiler: projects a timeline at one frame into layers and audio regions.

/// Plan types and [`plan::compute_render_plan`].
pub mod plan;
