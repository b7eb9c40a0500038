//! Camera uniform block, std140-style (80 bytes).
//!
//! Layout is contractual with the compute kernel:
//!
//! | Offset | Field        |
//! |--------|--------------|
//! | 0      | origin       |
//! | 16     | lower_left   |
//! | 32     | horizontal   |
//! | 48     | vertical     |
//! | 64     | frame_count  |
//! | 68     | sky_enabled  |
//! | 72     | reserved     |
//!
//! The engine rewrites the whole block every frame from the most recent
//! camera value and sky flag. `frame_count` is copied verbatim; only the UI
//! ever changes it.

use bytemuck::{Pod, Zeroable};

use crate::scene::Camera;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub origin: [f32; 3],
    _pad0: f32,
    pub lower_left: [f32; 3],
    _pad1: f32,
    pub horizontal: [f32; 3],
    _pad2: f32,
    pub vertical: [f32; 3],
    _pad3: f32,
    pub frame_count: u32,
    pub sky_enabled: u32,
    _reserved: [u32; 2],
}

impl CameraUniform {
    pub fn new(camera: &Camera, sky_enabled: bool) -> Self {
        Self {
            origin: camera.origin().to_array(),
            _pad0: 0.0,
            lower_left: camera.lower_left().to_array(),
            _pad1: 0.0,
            horizontal: camera.horizontal().to_array(),
            _pad2: 0.0,
            vertical: camera.vertical().to_array(),
            _pad3: 0.0,
            frame_count: camera.frame_count(),
            sky_enabled: sky_enabled as u32,
            _reserved: [0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_block_is_80_bytes() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
    }

    #[test]
    fn test_field_offsets_match_kernel_contract() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 90.0, 1.0);
        for _ in 0..7 {
            camera.advance_frame();
        }
        let uniform = CameraUniform::new(&camera, true);
        let bytes = bytemuck::bytes_of(&uniform);

        let frame_count = u32::from_le_bytes(bytes[64..68].try_into().unwrap());
        let sky = u32::from_le_bytes(bytes[68..72].try_into().unwrap());
        assert_eq!(frame_count, 7);
        assert_eq!(sky, 1);

        let origin_x = f32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(origin_x, camera.origin().x);
        let lower_left_x = f32::from_le_bytes(bytes[16..20].try_into().unwrap());
        assert_eq!(lower_left_x, camera.lower_left().x);
    }

    #[test]
    fn test_reset_carried_into_uniform() {
        let mut camera = Camera::default();
        camera.advance_frame();
        camera.advance_frame();
        camera.reset_accumulation();
        let uniform = CameraUniform::new(&camera, false);
        assert_eq!(uniform.frame_count, 0);
        assert_eq!(uniform.sky_enabled, 0);
    }
}
