//! Pinhole camera with progressive-accumulation counter.
//!
//! The camera maps normalized image coordinates `(s, t)` to the ray
//! direction `lower_left + s*horizontal + t*vertical - origin`. The
//! viewport triple is recomputed whenever origin or look-at changes.
//!
//! `frame_count` drives progressive refinement. The UI thread is its only
//! writer: incremented on idle ticks, reset to zero on any camera move,
//! sky toggle, or scene edit. The render engine only copies the value into
//! the GPU uniform.

use crate::util::Vec3;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    origin: Vec3,
    look_at: Vec3,
    v_up: Vec3,
    vfov_deg: f32,
    aspect: f32,

    // Derived viewport vectors
    lower_left: Vec3,
    horizontal: Vec3,
    vertical: Vec3,

    frame_count: u32,
}

impl Camera {
    pub fn new(origin: Vec3, look_at: Vec3, v_up: Vec3, vfov_deg: f32, aspect: f32) -> Self {
        let mut camera = Self {
            origin,
            look_at,
            v_up,
            vfov_deg,
            aspect,
            lower_left: Vec3::ZERO,
            horizontal: Vec3::ZERO,
            vertical: Vec3::ZERO,
            frame_count: 0,
        };
        camera.recompute_viewport();
        camera
    }

    fn recompute_viewport(&mut self) {
        let theta = self.vfov_deg.to_radians();
        let h = (theta / 2.0).tan();
        let viewport_height = 2.0 * h;
        let viewport_width = self.aspect * viewport_height;

        // Camera basis: w points away from the view direction.
        let w = (self.origin - self.look_at).normalize();
        let u = self.v_up.cross(w).normalize();
        let v = w.cross(u);

        self.horizontal = u * viewport_width;
        self.vertical = v * viewport_height;
        self.lower_left = self.origin - self.horizontal / 2.0 - self.vertical / 2.0 - w;
    }

    /// Right / up / back basis vectors of the current view.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let w = (self.origin - self.look_at).normalize();
        let u = self.v_up.cross(w).normalize();
        let v = w.cross(u);
        (u, v, w)
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
        self.recompute_viewport();
    }

    pub fn set_look_at(&mut self, look_at: Vec3) {
        self.look_at = look_at;
        self.recompute_viewport();
    }

    /// Translate origin and look-at together, keeping the view direction.
    pub fn translate(&mut self, delta: Vec3) {
        self.origin += delta;
        self.look_at += delta;
        self.recompute_viewport();
    }

    pub fn lower_left(&self) -> Vec3 {
        self.lower_left
    }

    pub fn horizontal(&self) -> Vec3 {
        self.horizontal
    }

    pub fn vertical(&self) -> Vec3 {
        self.vertical
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Next accumulation step. UI thread only, on ticks with no events.
    pub fn advance_frame(&mut self) {
        self.frame_count = self.frame_count.wrapping_add(1);
    }

    /// Restart accumulation. UI thread only, after any camera move, sky
    /// toggle, or scene edit.
    pub fn reset_accumulation(&mut self) {
        self.frame_count = 0;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Vec3::new(-25.0, 30.0, 140.0),
            Vec3::ZERO,
            Vec3::Y,
            20.0,
            16.0 / 9.0,
        )
    }
}
