//! Background scene builder.
//!
//! Turns a scene snapshot into a [`BuiltScene`] package: loads each
//! instance's mesh, applies the instance transform and material, builds the
//! unified BVH and flattens it. Runs on a worker thread and never touches
//! GPU objects. At most one build task is alive at a time; the UI enforces
//! this with its build-in-progress flag.

use std::sync::mpsc::{channel, Receiver};
use std::thread::{self, JoinHandle};

use crate::bvh::{build_bvh, flatten_bvh, Triangle};
use crate::render::BuiltScene;
use crate::scene::{loader, Scene};
use crate::util::Result;

/// Build a scene snapshot into an upload-ready package.
///
/// Instances whose mesh fails to load are skipped with a warning; a scene
/// where nothing loads is a valid empty package, not an error.
#[tracing::instrument(skip_all, fields(instances = snapshot.len()))]
pub fn build_scene(snapshot: &Scene) -> Result<BuiltScene> {
    let mut triangles: Vec<Triangle> = Vec::new();

    for instance in snapshot.instances() {
        let soup = match loader::load_triangle_soup(instance.mesh_path()) {
            Ok(soup) => soup,
            Err(e) => {
                tracing::warn!(
                    instance = %instance.display_name,
                    error = %e,
                    "skipping instance: mesh failed to load"
                );
                continue;
            }
        };

        triangles.reserve(soup.len());
        for [a, b, c] in soup {
            triangles.push(Triangle::new(
                instance.transform_vertex(a),
                instance.transform_vertex(b),
                instance.transform_vertex(c),
                instance.color,
                instance.material,
            ));
        }
    }

    if triangles.is_empty() {
        tracing::info!("scene built with 0 triangles");
        return Ok(BuiltScene::empty());
    }

    tracing::info!(triangles = triangles.len(), "building BVH");
    let root = build_bvh(&triangles)?;
    let flat = flatten_bvh(&root, &triangles);

    Ok(BuiltScene::from_flat(&flat))
}

/// Handle to an in-flight build task.
///
/// The result arrives once on the receiver; the UI polls it on its tick.
pub struct BuildTask {
    rx: Receiver<Result<BuiltScene>>,
    handle: Option<JoinHandle<()>>,
}

impl BuildTask {
    /// Spawn a builder thread over a scene snapshot.
    pub fn spawn(snapshot: Scene) -> Self {
        let (tx, rx) = channel();
        let handle = thread::Builder::new()
            .name("scene-builder".into())
            .spawn(move || {
                let result = build_scene(&snapshot);
                // The UI may already be gone on shutdown; the result is
                // discarded in that case.
                let _ = tx.send(result);
            })
            .expect("failed to spawn scene-builder thread");

        Self {
            rx,
            handle: Some(handle),
        }
    }

    /// Non-blocking poll for the finished package.
    pub fn try_take(&mut self) -> Option<Result<BuiltScene>> {
        let result = self.rx.try_recv().ok()?;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::MaterialKind;
    use crate::scene::loader::test_support::write_stl;
    use crate::scene::ModelInstance;
    use crate::util::{Aabb, Vec3};
    use glam::vec3;

    /// Two-triangle unit quad in the xz plane.
    const QUAD: [[[f32; 3]; 3]; 2] = [
        [[-1.0, 0.0, -1.0], [1.0, 0.0, -1.0], [1.0, 0.0, 1.0]],
        [[-1.0, 0.0, -1.0], [1.0, 0.0, 1.0], [-1.0, 0.0, 1.0]],
    ];

    #[test]
    fn test_empty_scene_builds_empty_package() {
        let built = build_scene(&Scene::new()).unwrap();
        assert_eq!(built.triangle_count, 0);
        assert!(built.vertices_bytes().is_empty());
        assert!(built.materials_bytes().is_empty());
        assert!(built.nodes_bytes().is_empty());
    }

    #[test]
    fn test_unreadable_mesh_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.stl");
        write_stl(&good, &QUAD);

        let mut scene = Scene::new();
        scene.add(ModelInstance::new(dir.path().join("missing.stl"), "Missing"));
        scene.add(ModelInstance::new(&good, "Good"));

        let built = build_scene(&scene).unwrap();
        assert_eq!(built.triangle_count, 2);
    }

    #[test]
    fn test_transform_applied_scale_then_translate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.stl");
        write_stl(&path, &[[[1.0, 1.0, 1.0], [2.0, 1.0, 1.0], [1.0, 2.0, 1.0]]]);

        let mut scene = Scene::new();
        scene.add(
            ModelInstance::new(&path, "T")
                .at(vec3(100.0, 0.0, -50.0))
                .scaled(vec3(2.0, 3.0, 4.0)),
        );

        let built = build_scene(&scene).unwrap();
        assert_eq!(built.triangle_count, 1);
        // v0 = (1,1,1) * (2,3,4) + (100,0,-50) = (102, 3, -46)
        let v0 = built.vertices[0].v0;
        assert_eq!(v0, [102.0, 3.0, -46.0]);
    }

    #[test]
    fn test_three_instances_with_scale() {
        let dir = tempfile::tempdir().unwrap();
        let plane_path = dir.path().join("plane.stl");
        let car_path = dir.path().join("car.stl");
        let sun_path = dir.path().join("sun.stl");

        write_stl(&plane_path, &QUAD);
        // "car": 4 triangles around the origin
        write_stl(
            &car_path,
            &[
                [[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]],
                [[-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [1.0, 0.0, 0.0]],
            ],
        );
        write_stl(
            &sun_path,
            &[[[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]],
        );

        let mut scene = Scene::new();
        scene.add(
            ModelInstance::new(&plane_path, "Ground Plane")
                .at(vec3(0.0, -10.0, 0.0))
                .scaled(vec3(150.0, 1.0, 150.0)),
        );
        scene.add(
            ModelInstance::new(&car_path, "Car")
                .at(vec3(0.0, -8.0, 0.0))
                .scaled(Vec3::splat(2.0))
                .with_material(MaterialKind::MetalShiny),
        );
        scene.add(
            ModelInstance::new(&sun_path, "Sun")
                .at(vec3(0.0, 220.0, 0.0))
                .scaled(Vec3::splat(0.35))
                .with_material(MaterialKind::Emissive),
        );

        let built = build_scene(&scene).unwrap();
        assert_eq!(built.triangle_count, 2 + 4 + 1);

        // Root bbox (node 0) must contain every transformed vertex
        let root = built.nodes[0];
        let root_box = Aabb::new(Vec3::from(root.bbox_min), Vec3::from(root.bbox_max));
        for tri in &built.vertices {
            for v in [tri.v0, tri.v1, tri.v2] {
                let p = Vec3::from(v);
                assert!(
                    p.cmpge(root_box.min).all() && p.cmple(root_box.max).all(),
                    "{p:?} outside root {root_box:?}"
                );
            }
        }

        // The plane stretches to x = +-150, the sun sits at y = 220
        assert!(root_box.max.x >= 150.0);
        assert!(root_box.min.x <= -150.0);
        assert!(root_box.max.y >= 220.0);
    }

    #[test]
    fn test_material_stream_carries_instance_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.stl");
        write_stl(
            &path,
            &[[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]],
        );

        let mut scene = Scene::new();
        scene.add(
            ModelInstance::new(&path, "Light")
                .colored(vec3(4.0, 3.0, 2.0))
                .with_material(MaterialKind::Emissive),
        );

        let built = build_scene(&scene).unwrap();
        assert_eq!(built.materials[0].color, [4.0, 3.0, 2.0]);
        assert_eq!(built.materials[0].kind, 3.0);
    }
}
