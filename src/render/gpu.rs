//! GPU context owned by the render thread.
//!
//! Holds the device, the compute pipeline, the storage image the kernel
//! accumulates into, the staging buffer frames are read back through, the
//! camera uniform, and the bind group wiring them together. The same image
//! view is bound twice: the kernel reads the previous frame at binding 5
//! and writes the running average at binding 0.
//!
//! Nothing in this module is thread-safe; only the render thread touches it.

use std::path::Path;

use wgpu::util::DeviceExt;

use crate::render::{BuiltScene, CameraUniform};
use crate::util::{Error, Result};

/// Compute kernel workgroup size (must match @workgroup_size in the WGSL).
const WG_SIZE: u32 = 8;

/// Camera uniform block size, contractual with the kernel.
const UNIFORM_SIZE: u64 = std::mem::size_of::<CameraUniform>() as u64;

/// Bindings of the kernel's single bind group.
mod binding {
    /// Storage image the kernel writes (current frame).
    pub const OUTPUT_IMAGE: u32 = 0;
    /// Per-triangle vertex stream.
    pub const VERTICES: u32 = 1;
    /// Per-triangle material stream.
    pub const MATERIALS: u32 = 2;
    /// Flat BVH node array.
    pub const BVH_NODES: u32 = 3;
    /// Camera + accumulation uniform.
    pub const CAMERA: u32 = 4;
    /// Storage image the kernel reads (previous frame). Same view as
    /// `OUTPUT_IMAGE`.
    pub const INPUT_IMAGE: u32 = 5;
}

/// The three device-side scene buffers plus the triangle count.
///
/// A movable bundle owned by the render thread; lives from its upload until
/// the next hot-swap or shutdown. `None` streams were empty and are bound
/// to the engine's dummy buffer instead.
pub struct GpuScene {
    vertices: Option<wgpu::Buffer>,
    materials: Option<wgpu::Buffer>,
    nodes: Option<wgpu::Buffer>,
    pub triangle_count: u32,
}

impl GpuScene {
    /// Release the device buffers. Callers must have made sure no in-flight
    /// work references them (device idle).
    pub fn destroy(self) {
        if let Some(b) = &self.vertices {
            b.destroy();
        }
        if let Some(b) = &self.materials {
            b.destroy();
        }
        if let Some(b) = &self.nodes {
            b.destroy();
        }
    }
}

/// Device, pipeline, and the static resources of the render loop.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,

    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,

    target_view: wgpu::TextureView,
    target: wgpu::Texture,
    staging: wgpu::Buffer,
    uniform: wgpu::Buffer,
    /// Fills storage-buffer slots when a scene stream is empty; a storage
    /// binding may not be absent.
    dummy: wgpu::Buffer,

    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
}

impl GpuContext {
    /// Bring up the device and every static resource.
    ///
    /// The compute kernel is loaded from `shader_path`; failure to read it
    /// is [`Error::ShaderLoad`], any device-side failure is
    /// [`Error::GpuResource`].
    pub fn new(width: u32, height: u32, shader_path: &Path) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or_else(|| Error::GpuResource("no compute-capable adapter".to_string()))?;

        tracing::info!(adapter = %adapter.get_info().name, "acquired GPU adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("beamtrace device"),
            required_features: wgpu::Features::PUSH_CONSTANTS,
            required_limits: wgpu::Limits {
                max_push_constant_size: 4,
                ..wgpu::Limits::default()
            },
            memory_hints: wgpu::MemoryHints::default(),
        }, None))
        .map_err(|e| Error::GpuResource(format!("device creation failed: {e}")))?;

        let source = std::fs::read_to_string(shader_path).map_err(|source| Error::ShaderLoad {
            path: shader_path.to_path_buf(),
            source,
        })?;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("raytrace_kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = Self::create_bind_group_layout(&device);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("raytrace_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::COMPUTE,
                range: 0..4, // u32 triangle count
            }],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("raytrace_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("accumulation_image"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let padded_bytes_per_row = padded_bytes_per_row(width);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera_uniform"),
            size: UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let dummy = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("dummy_storage"),
            contents: &[0u8; 4],
            usage: wgpu::BufferUsages::STORAGE,
        });

        let bind_group = Self::create_bind_group(
            &device,
            &bind_group_layout,
            &target_view,
            &uniform,
            &dummy,
            None,
        );

        tracing::info!(width, height, "GPU context initialized");

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            bind_group,
            target_view,
            target,
            staging,
            uniform,
            dummy,
            width,
            height,
            padded_bytes_per_row,
        })
    }

    fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let storage_buffer = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("raytrace_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: binding::OUTPUT_IMAGE,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                storage_buffer(binding::VERTICES),
                storage_buffer(binding::MATERIALS),
                storage_buffer(binding::BVH_NODES),
                wgpu::BindGroupLayoutEntry {
                    binding: binding::CAMERA,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: binding::INPUT_IMAGE,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::ReadOnly,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        })
    }

    /// Wire the six bindings. Empty scene streams fall back to `dummy`.
    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        target_view: &wgpu::TextureView,
        uniform: &wgpu::Buffer,
        dummy: &wgpu::Buffer,
        scene: Option<&GpuScene>,
    ) -> wgpu::BindGroup {
        let vertices = scene.and_then(|s| s.vertices.as_ref()).unwrap_or(dummy);
        let materials = scene.and_then(|s| s.materials.as_ref()).unwrap_or(dummy);
        let nodes = scene.and_then(|s| s.nodes.as_ref()).unwrap_or(dummy);

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("raytrace_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: binding::OUTPUT_IMAGE,
                    resource: wgpu::BindingResource::TextureView(target_view),
                },
                wgpu::BindGroupEntry {
                    binding: binding::VERTICES,
                    resource: vertices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::MATERIALS,
                    resource: materials.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::BVH_NODES,
                    resource: nodes.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::CAMERA,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: binding::INPUT_IMAGE,
                    resource: wgpu::BindingResource::TextureView(target_view),
                },
            ],
        })
    }

    /// Block until all submitted GPU work has completed.
    pub fn wait_idle(&self) {
        let _ = self.device.poll(wgpu::Maintain::Wait);
    }

    /// Hot-swap the scene buffers.
    ///
    /// Waits for device idle, destroys the old bundle, creates and fills
    /// the new buffers, and rewires the bind group. Empty streams keep the
    /// dummy buffer bound so the bind group stays valid.
    pub fn upload_scene(&mut self, package: &BuiltScene, old: Option<GpuScene>) -> Result<GpuScene> {
        self.wait_idle();
        if let Some(old) = old {
            old.destroy();
        }

        let storage = |label: &str, bytes: &[u8]| -> Option<wgpu::Buffer> {
            if bytes.is_empty() {
                return None;
            }
            Some(
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(label),
                        contents: bytes,
                        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                    }),
            )
        };

        let scene = GpuScene {
            vertices: storage("scene_vertices", package.vertices_bytes()),
            materials: storage("scene_materials", package.materials_bytes()),
            nodes: storage("scene_bvh_nodes", package.nodes_bytes()),
            triangle_count: package.triangle_count,
        };

        self.bind_group = Self::create_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.target_view,
            &self.uniform,
            &self.dummy,
            Some(&scene),
        );

        tracing::info!(triangles = scene.triangle_count, "scene uploaded");
        Ok(scene)
    }

    /// Rewrite the camera uniform. Must happen before the frame's submit so
    /// the dispatch observes it.
    pub fn write_uniform(&self, uniform: &CameraUniform) {
        self.queue
            .write_buffer(&self.uniform, 0, bytemuck::bytes_of(uniform));
    }

    /// Record, submit, and wait for one frame; return its pixels.
    ///
    /// Encodes the compute dispatch followed by the image-to-staging copy,
    /// submits, waits for completion, and copies the staging contents into
    /// a tightly packed RGBA8 buffer.
    pub fn render_frame(&self, triangle_count: u32) -> Result<Vec<u8>> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("raytrace_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.set_push_constants(0, bytemuck::bytes_of(&triangle_count));
            pass.dispatch_workgroups(
                self.width.div_ceil(WG_SIZE),
                self.height.div_ceil(WG_SIZE),
                1,
            );
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(Some(encoder.finish()));

        // Wait for the frame, then map the staging buffer.
        let slice = self.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.wait_idle();
        rx.recv()
            .map_err(|_| Error::GpuResource("readback mapping never completed".into()))?
            .map_err(|e| Error::GpuResource(format!("readback mapping failed: {e}")))?;

        let unpadded = self.width as usize * 4;
        let padded = self.padded_bytes_per_row as usize;
        let mut pixels = vec![0u8; unpadded * self.height as usize];
        {
            let data = slice.get_mapped_range();
            if padded == unpadded {
                pixels.copy_from_slice(&data);
            } else {
                for row in 0..self.height as usize {
                    let src = row * padded;
                    let dst = row * unpadded;
                    pixels[dst..dst + unpadded].copy_from_slice(&data[src..src + unpadded]);
                }
            }
        }
        self.staging.unmap();

        Ok(pixels)
    }
}

/// Buffer-to-texture copies require rows aligned to 256 bytes.
fn padded_bytes_per_row(width: u32) -> u32 {
    let bytes = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (bytes + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_padding() {
        // 1280 * 4 = 5120 is already 256-aligned
        assert_eq!(padded_bytes_per_row(1280), 5120);
        // 100 * 4 = 400 rounds up to 512
        assert_eq!(padded_bytes_per_row(100), 512);
        assert_eq!(padded_bytes_per_row(64), 256);
    }
}
