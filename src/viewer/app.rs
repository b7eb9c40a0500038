//! Main application state and UI.
//!
//! The UI thread owns the scene, the camera, and the accumulation counter.
//! Every edit follows the same discipline: mutate state, reset the counter,
//! submit the camera (and sky flag) to the render engine. On idle ticks the
//! counter is incremented instead - unless a scene build is in flight, in
//! which case it pauses so the first frame against the new scene observes
//! frame zero.

use std::path::PathBuf;
use std::time::Instant;

use egui::{CentralPanel, RichText, ScrollArea, SidePanel};
use glam::{vec3, Vec3};

use crate::bvh::MaterialKind;
use crate::render::{RenderConfig, RenderEngine};
use crate::scene::builder::BuildTask;
use crate::scene::{Camera, ModelInstance, Scene};
use crate::viewer::Settings;

/// Camera translation per keypress, in world units along the camera basis.
const MOVE_FORWARD: f32 = 6.5;
const MOVE_STRAFE: f32 = 5.5;
const MOVE_VERTICAL: f32 = 3.5;

/// Color presets offered in the instance properties panel.
const COLOR_PRESETS: &[(&str, Vec3)] = &[
    ("Grey", Vec3::new(0.5, 0.5, 0.5)),
    ("White", Vec3::new(1.0, 1.0, 1.0)),
    ("Red", Vec3::new(1.0, 0.0, 0.0)),
    ("Green", Vec3::new(0.0, 1.0, 0.0)),
    ("Blue", Vec3::new(0.0, 0.0, 1.0)),
];

fn preset_name(color: Vec3) -> &'static str {
    COLOR_PRESETS
        .iter()
        .find(|(_, c)| *c == color)
        .map(|(name, _)| *name)
        .unwrap_or("Custom...")
}

/// Main viewer application
pub struct TracerApp {
    engine: RenderEngine,
    scene: Scene,
    camera: Camera,

    // Global render controls
    sky_enabled: bool,
    exposure: f32,

    // Scene editing state
    selected: Option<usize>,
    build: Option<BuildTask>,
    build_error: Option<String>,
    fatal_error: Option<String>,

    // Frame display
    frame_tex: Option<egui::TextureHandle>,
    frame_size: (u32, u32),

    // FPS readout
    frames_this_second: u32,
    fps: u32,
    last_fps_update: Instant,

    settings: Settings,
}

impl TracerApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        settings: Settings,
        initial_model: Option<PathBuf>,
    ) -> Self {
        let config = RenderConfig::default();
        let aspect = config.width as f32 / config.height as f32;
        let frame_size = (config.width, config.height);

        let mut engine = RenderEngine::new(config);
        engine.start();

        let camera = Camera::new(vec3(-25.0, 30.0, 140.0), Vec3::ZERO, Vec3::Y, 20.0, aspect);

        let mut scene = Scene::new();
        populate_default_scene(&mut scene);
        if let Some(path) = initial_model {
            let name = display_name_for(&path);
            scene.add(ModelInstance::new(path, name));
        }

        let mut app = Self {
            engine,
            scene,
            camera,
            sky_enabled: settings.sky_enabled,
            exposure: settings.exposure,
            selected: None,
            build: None,
            build_error: None,
            fatal_error: None,
            frame_tex: None,
            frame_size,
            frames_this_second: 0,
            fps: 0,
            last_fps_update: Instant::now(),
            settings,
        };
        app.start_build();
        app
    }

    /// Kick off an ephemeral builder task over a scene snapshot.
    ///
    /// While it runs, the tick increment is paused; the accumulation reset
    /// happens when the result arrives.
    fn start_build(&mut self) {
        if self.build.is_some() {
            tracing::debug!("scene build already in progress; ignoring trigger");
            return;
        }
        tracing::info!("starting scene rebuild");
        self.build = Some(BuildTask::spawn(self.scene.snapshot()));
    }

    /// Poll the in-flight build. Returns true if a completion was handled
    /// (which counts as an accumulation event for this tick).
    fn process_build_result(&mut self) -> bool {
        let Some(task) = &mut self.build else {
            return false;
        };
        let Some(result) = task.try_take() else {
            return false;
        };
        self.build = None;

        match result {
            Ok(package) => {
                // Submit first, then reset, then send the reset counter so
                // the first frame against the new scene sees frame zero.
                self.engine.submit_scene(package);
                self.camera.reset_accumulation();
                self.engine.submit_sky(self.sky_enabled);
                self.engine.submit_camera(self.camera.clone());
            }
            Err(e) => {
                tracing::error!(error = %e, "scene build failed");
                self.build_error = Some(e.to_string());
            }
        }
        true
    }

    /// Translate the camera along its own axes from WASD/QE input.
    /// Returns true when the camera moved.
    fn handle_camera_keys(&mut self, ctx: &egui::Context) -> bool {
        // Typing into a widget must not move the camera.
        if ctx.wants_keyboard_input() {
            return false;
        }

        let (right, _up, back) = self.camera.basis();
        let mut delta = Vec3::ZERO;
        ctx.input(|input| {
            if input.key_pressed(egui::Key::W) {
                delta -= back * MOVE_FORWARD;
            }
            if input.key_pressed(egui::Key::S) {
                delta += back * MOVE_FORWARD;
            }
            if input.key_pressed(egui::Key::A) {
                delta -= right * MOVE_STRAFE;
            }
            if input.key_pressed(egui::Key::D) {
                delta += right * MOVE_STRAFE;
            }
            if input.key_pressed(egui::Key::Q) {
                delta += Vec3::Y * MOVE_VERTICAL;
            }
            if input.key_pressed(egui::Key::E) {
                delta -= Vec3::Y * MOVE_VERTICAL;
            }
        });

        if delta == Vec3::ZERO {
            return false;
        }
        self.camera.translate(delta);
        true
    }

    /// An accumulation-resetting event: zero the counter and push the
    /// current sky flag and camera to the engine.
    fn submit_reset(&mut self) {
        self.camera.reset_accumulation();
        self.engine.submit_sky(self.sky_enabled);
        self.engine.submit_camera(self.camera.clone());
    }

    fn add_model_dialog(&mut self) {
        let mut dialog = rfd::FileDialog::new().add_filter("STL Models", &["stl"]);
        if let Some(dir) = &self.settings.last_model_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.pick_file() else {
            return;
        };

        self.settings.last_model_dir = path.parent().map(|p| p.to_path_buf());
        let name = display_name_for(&path);
        self.scene.add(ModelInstance::new(path, name));
        self.selected = Some(self.scene.len() - 1);
        self.start_build();
    }

    fn remove_selected(&mut self) {
        if let Some(index) = self.selected.take() {
            self.scene.remove(index);
            self.start_build();
        }
    }

    /// Side panel: object list, per-instance properties, global controls.
    /// Returns (rebuild_requested, accumulation_event).
    fn scene_panel(&mut self, ctx: &egui::Context) -> (bool, bool) {
        let mut rebuild = false;
        let mut event = false;

        SidePanel::right("scene_panel")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| {
                ScrollArea::vertical().show(ui, |ui| {
                    ui.heading("Scene");
                    ui.separator();

                    for i in 0..self.scene.len() {
                        let name = self.scene.instances()[i].display_name.clone();
                        if ui
                            .selectable_label(self.selected == Some(i), name)
                            .clicked()
                        {
                            self.selected = Some(i);
                        }
                    }

                    ui.horizontal(|ui| {
                        if ui.button("Add Model...").clicked() {
                            self.add_model_dialog();
                        }
                        if ui.button("Remove").clicked() {
                            self.remove_selected();
                        }
                    });

                    ui.separator();
                    ui.heading("Object Properties");
                    if let Some(index) = self.selected {
                        if instance_properties(ui, self.scene.get_mut(index).unwrap()) {
                            rebuild = true;
                        }
                    } else {
                        ui.label(RichText::new("No object selected").weak());
                    }

                    ui.separator();
                    ui.heading("Global Settings");
                    if ui.checkbox(&mut self.sky_enabled, "Enable Sky").changed() {
                        event = true;
                    }
                    if ui
                        .add(egui::Slider::new(&mut self.exposure, -5.0..=5.0).text("Exposure"))
                        .changed()
                    {
                        // Not wired to the GPU; still restarts refinement so
                        // behavior matches the other global controls.
                        event = true;
                    }

                    ui.separator();
                    ui.label(
                        RichText::new("W/S forward-back, A/D strafe, Q/E up-down").weak(),
                    );
                });
            });

        (rebuild, event)
    }

    fn central_panel(&mut self, ctx: &egui::Context) {
        CentralPanel::default().show(ctx, |ui| {
            let Some(tex) = &self.frame_tex else {
                ui.centered_and_justified(|ui| {
                    ui.label(if self.build.is_some() {
                        "Building scene..."
                    } else {
                        "Waiting for first frame..."
                    });
                });
                return;
            };

            // Fit the frame into the panel, preserving aspect
            let (w, h) = self.frame_size;
            let aspect = w as f32 / h as f32;
            let avail = ui.available_size();
            let size = if avail.x / avail.y > aspect {
                egui::vec2(avail.y * aspect, avail.y)
            } else {
                egui::vec2(avail.x, avail.x / aspect)
            };
            ui.centered_and_justified(|ui| {
                ui.add(egui::Image::new((tex.id(), size)));
            });
        });
    }

    fn error_windows(&mut self, ctx: &egui::Context) {
        if let Some(message) = self.build_error.clone() {
            let mut open = true;
            egui::Window::new("Scene Build Failed")
                .collapsible(false)
                .resizable(false)
                .open(&mut open)
                .show(ctx, |ui| {
                    ui.label(&message);
                    if ui.button("OK").clicked() {
                        self.build_error = None;
                    }
                });
            if !open {
                self.build_error = None;
            }
        }

        if let Some(message) = &self.fatal_error {
            egui::Window::new("Render Engine Stopped")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(message);
                    ui.label("Restart the application to continue.");
                });
        }
    }

    fn drain_frame(&mut self, ctx: &egui::Context) {
        let Some(frame) = self.engine.take_frame() else {
            return;
        };
        let expected = (frame.width * frame.height * 4) as usize;
        if frame.pixels.len() != expected {
            return;
        }

        let image = egui::ColorImage::from_rgba_unmultiplied(
            [frame.width as usize, frame.height as usize],
            &frame.pixels,
        );
        match &mut self.frame_tex {
            Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.frame_tex = Some(ctx.load_texture("frame", image, egui::TextureOptions::LINEAR))
            }
        }
        self.frames_this_second += 1;
    }

    fn update_title(&mut self, ctx: &egui::Context) {
        if self.last_fps_update.elapsed().as_secs_f32() >= 1.0 {
            self.fps = self.frames_this_second;
            self.frames_this_second = 0;
            self.last_fps_update = Instant::now();
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
                "beamtrace | {} FPS | Samples: {}",
                self.fps,
                self.camera.frame_count()
            )));
        }
    }
}

impl eframe::App for TracerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut event = self.process_build_result();

        if self.handle_camera_keys(ctx) {
            self.submit_reset();
            event = true;
        }

        let (rebuild, panel_event) = self.scene_panel(ctx);
        if panel_event {
            self.submit_reset();
            event = true;
        }
        if rebuild {
            self.start_build();
        }

        // Idle tick: advance refinement unless a build is pausing it or an
        // event already submitted frame zero.
        if !event && self.build.is_none() {
            self.camera.advance_frame();
            self.engine.submit_camera(self.camera.clone());
        }

        self.drain_frame(ctx);
        self.central_panel(ctx);

        if !self.engine.is_running() && self.fatal_error.is_none() {
            self.fatal_error = Some(
                self.engine
                    .take_error()
                    .unwrap_or_else(|| "render thread exited".into()),
            );
        }
        self.error_windows(ctx);
        self.update_title(ctx);

        // The engine produces frames continuously; keep the UI ticking.
        ctx.request_repaint();
    }
}

impl Drop for TracerApp {
    fn drop(&mut self) {
        self.settings.sky_enabled = self.sky_enabled;
        self.settings.exposure = self.exposure;
        self.settings.save();
        self.engine.stop();
    }
}

/// Per-instance property widgets. Returns true when "Apply Changes" was
/// clicked.
fn instance_properties(ui: &mut egui::Ui, instance: &mut ModelInstance) -> bool {
    let mut apply = false;

    egui::Grid::new("instance_props").num_columns(2).show(ui, |ui| {
        ui.label("Pos X:");
        ui.add(egui::DragValue::new(&mut instance.position.x).speed(0.5));
        ui.end_row();
        ui.label("Pos Y:");
        ui.add(egui::DragValue::new(&mut instance.position.y).speed(0.5));
        ui.end_row();
        ui.label("Pos Z:");
        ui.add(egui::DragValue::new(&mut instance.position.z).speed(0.5));
        ui.end_row();

        ui.label("Scale:");
        let mut scale = instance.scale.x;
        if ui
            .add(egui::DragValue::new(&mut scale).speed(0.1).range(0.01..=1000.0))
            .changed()
        {
            instance.scale = Vec3::splat(scale);
        }
        ui.end_row();

        ui.label("Color:");
        let current = preset_name(instance.color);
        egui::ComboBox::from_id_salt("color_preset")
            .selected_text(current)
            .show_ui(ui, |ui| {
                for (name, color) in COLOR_PRESETS {
                    if ui.selectable_label(current == *name, *name).clicked() {
                        instance.color = *color;
                    }
                }
                if ui
                    .selectable_label(current == "Custom...", "Custom...")
                    .clicked()
                {
                    // Any non-preset value reveals the RGB row
                    instance.color = Vec3::splat(0.8);
                }
            });
        ui.end_row();

        if preset_name(instance.color) == "Custom..." {
            ui.label("RGB:");
            ui.horizontal(|ui| {
                ui.add(egui::DragValue::new(&mut instance.color.x).speed(0.01).range(0.0..=10.0));
                ui.add(egui::DragValue::new(&mut instance.color.y).speed(0.01).range(0.0..=10.0));
                ui.add(egui::DragValue::new(&mut instance.color.z).speed(0.01).range(0.0..=10.0));
            });
            ui.end_row();
        }

        ui.label("Material:");
        egui::ComboBox::from_id_salt("material_kind")
            .selected_text(instance.material.label())
            .show_ui(ui, |ui| {
                for kind in MaterialKind::ALL {
                    ui.selectable_value(&mut instance.material, kind, kind.label());
                }
            });
        ui.end_row();
    });

    if ui.button("Apply Changes").clicked() {
        apply = true;
    }
    apply
}

fn display_name_for(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Model".into())
}

/// The startup scene: a matte ground plane, a shiny metal car, and an
/// emissive sun high above. Instances whose mesh files are missing are
/// skipped by the builder with a warning.
fn populate_default_scene(scene: &mut Scene) {
    scene.add(
        ModelInstance::new("models/ground_plane.stl", "Ground Plane")
            .at(vec3(0.0, -10.0, 0.0))
            .scaled(vec3(150.0, 1.0, 150.0))
            .colored(vec3(0.5, 0.5, 0.5)),
    );
    scene.add(
        ModelInstance::new("models/car.stl", "Car")
            .at(vec3(0.0, -8.0, 0.0))
            .scaled(Vec3::splat(2.0))
            .colored(vec3(0.6, 0.7, 0.1))
            .with_material(MaterialKind::MetalShiny),
    );
    scene.add(
        ModelInstance::new("models/sun.stl", "Sun")
            .at(vec3(0.0, 220.0, 0.0))
            .scaled(Vec3::splat(0.35))
            .colored(vec3(12.0, 11.0, 9.0))
            .with_material(MaterialKind::Emissive),
    );
}
