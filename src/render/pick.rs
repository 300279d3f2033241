//! Pointer-to-scene hit testing.
//!
//! Pointer coordinates are unprojected into a world-space ray, tested against
//! the child surfaces of every frame object, and resolved back to the owning
//! object. The backdrop is intentionally not pickable; only frame objects
//! respond to the pointer.

use crate::render::camera::OrbitCamera;
use crate::scene::{SceneObject, SurfacePart};
use glam::{Mat4, Vec2, Vec3};

#[derive(Debug, Clone, Copy)]
pub struct PointerRay {
    pub origin: Vec3,
    pub dir: Vec3,
}

/// Result of a pick: the owning object (never a child surface) and the ray
/// parameter of the nearest struck surface.
#[derive(Debug, Clone, Copy)]
pub struct PickHit {
    pub placement_index: usize,
    pub frame_id: u32,
    pub distance: f32,
}

/// Unproject a screen position into a world-space ray through the camera.
pub fn pointer_ray(screen: Vec2, viewport: Vec2, camera: &OrbitCamera) -> PointerRay {
    let ndc = Vec2::new(
        2.0 * screen.x / viewport.x - 1.0,
        1.0 - 2.0 * screen.y / viewport.y,
    );
    let inverse = camera.view_projection().inverse();
    // Unproject a far-plane point; the ray runs from the eye through it.
    let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
    let origin = camera.eye();
    PointerRay {
        origin,
        dir: (far - origin).normalize(),
    }
}

/// Intersect with a view-facing plane at the given depth. The drag plane is
/// parallel to the backdrop, so its normal is +z.
pub fn intersect_z_plane(ray: &PointerRay, plane_z: f32) -> Option<Vec3> {
    if ray.dir.z.abs() < 1e-6 {
        return None;
    }
    let t = (plane_z - ray.origin.z) / ray.dir.z;
    if t < 0.0 {
        return None;
    }
    Some(ray.origin + ray.dir * t)
}

/// Raycast against every object's child surfaces and resolve the nearest hit
/// to its owning object.
pub fn pick_object(ray: &PointerRay, objects: &[SceneObject]) -> Option<PickHit> {
    let mut nearest: Option<PickHit> = None;
    for object in objects {
        let Some(distance) = intersect_object(ray, object) else {
            continue;
        };
        if nearest.map_or(true, |hit| distance < hit.distance) {
            nearest = Some(PickHit {
                placement_index: object.placement_index,
                frame_id: object.frame_id,
                distance,
            });
        }
    }
    nearest
}

/// Nearest intersection with any child surface of one object, walking the
/// part list so a struck picture plane or border segment still selects the
/// composite.
fn intersect_object(ray: &PointerRay, object: &SceneObject) -> Option<f32> {
    // Transform the ray into object-local space (inverse of translate+rotate).
    let inverse = Mat4::from_rotation_z(-object.rotation_z)
        * Mat4::from_translation(-object.position);
    let origin = inverse.transform_point3(ray.origin);
    let dir = inverse.transform_vector3(ray.dir);

    let mut nearest: Option<f32> = None;
    for part in &object.parts {
        if let Some(t) = intersect_part(origin, dir, part) {
            if nearest.map_or(true, |n| t < n) {
                nearest = Some(t);
            }
        }
    }
    nearest
}

/// Slab test against one part's local box. Flat quads get a small thickness
/// so edge-on rays cannot slip between surfaces.
fn intersect_part(origin: Vec3, dir: Vec3, part: &SurfacePart) -> Option<f32> {
    let half = Vec3::new(
        part.extent.x * 0.5,
        part.extent.y * 0.5,
        (part.extent.z * 0.5).max(1e-4),
    );
    let min = part.offset - half;
    let max = part.offset + half;

    let mut t_min = 0.0f32;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        if d.abs() < 1e-9 {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (t0, t1) = {
            let a = (min[axis] - o) * inv;
            let b = (max[axis] - o) * inv;
            if a < b {
                (a, b)
            } else {
                (b, a)
            }
        };
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

/// Project a world point to screen coordinates; used by interaction tests to
/// aim synthetic pointer events.
#[cfg(test)]
pub fn world_to_screen(world: Vec3, viewport: Vec2, camera: &OrbitCamera) -> Vec2 {
    let ndc = camera.view_projection().project_point3(world);
    Vec2::new(
        (ndc.x + 1.0) * 0.5 * viewport.x,
        (1.0 - ndc.y) * 0.5 * viewport.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::resources::ResourceLedger;
    use crate::scene::{
        FrameDef, FrameDimensionsCm, FrameStyling, PlacementRecord, PlanePosition, WallScene,
        WallSpec,
    };

    fn scene_with_placements(positions: &[(f32, f32)]) -> (WallScene, ResourceLedger) {
        let wall = WallSpec {
            image_url: None,
            width_cm: Some(300.0),
            height_cm: Some(250.0),
        };
        let frames = vec![FrameDef {
            id: 1,
            dimensions: FrameDimensionsCm {
                width: 40.0,
                height: 50.0,
                depth: 2.0,
            },
            styling: FrameStyling::default(),
            picture_image_url: None,
        }];
        let placements: Vec<PlacementRecord> = positions
            .iter()
            .map(|&(x, y)| PlacementRecord {
                frame_id: 1,
                position: PlanePosition { x, y },
                rotation: 0.0,
                scale: 1.0,
            })
            .collect();
        let mut ledger = ResourceLedger::new();
        let mut scene = WallScene::new();
        scene.rebuild(&wall, &frames, &placements, &mut ledger);
        (scene, ledger)
    }

    fn fitted_camera() -> OrbitCamera {
        let mut camera = OrbitCamera::new();
        camera.set_viewport(800, 600);
        camera.fit_to_backdrop(glam::Vec2::new(3.0, 2.5));
        camera
    }

    #[test]
    fn ray_through_center_hits_centered_object() {
        let (scene, _ledger) = scene_with_placements(&[(0.0, 0.0)]);
        let camera = fitted_camera();
        let viewport = Vec2::new(800.0, 600.0);

        let ray = pointer_ray(Vec2::new(400.0, 300.0), viewport, &camera);
        let hit = pick_object(&ray, scene.objects()).expect("center ray should hit");
        assert_eq!(hit.placement_index, 0);
        assert_eq!(hit.frame_id, 1);
    }

    #[test]
    fn ray_outside_object_misses() {
        let (scene, _ledger) = scene_with_placements(&[(0.0, 0.0)]);
        let camera = fitted_camera();
        let viewport = Vec2::new(800.0, 600.0);

        let ray = pointer_ray(Vec2::new(10.0, 10.0), viewport, &camera);
        assert!(pick_object(&ray, scene.objects()).is_none());
    }

    #[test]
    fn child_surface_hit_resolves_to_owner() {
        let (scene, _ledger) = scene_with_placements(&[(0.0, 0.0)]);
        let camera = fitted_camera();
        let viewport = Vec2::new(800.0, 600.0);

        // Aim at the top border segment rather than the picture surface.
        let object = &scene.objects()[0];
        let border_center =
            object.position + Vec3::new(0.0, object.half_extent.y - 0.005, object.half_extent.z);
        let screen = world_to_screen(border_center, viewport, &camera);
        let ray = pointer_ray(screen, viewport, &camera);
        let hit = pick_object(&ray, scene.objects()).expect("border should hit");
        assert_eq!(hit.placement_index, 0);
    }

    #[test]
    fn nearest_of_overlapping_objects_wins() {
        // Two placements close enough to overlap in screen space; both share
        // one depth, so offset the second sideways and aim at the first.
        let (scene, _ledger) = scene_with_placements(&[(0.0, 0.0), (0.1, 0.0)]);
        let camera = fitted_camera();
        let viewport = Vec2::new(800.0, 600.0);

        let first = &scene.objects()[0];
        let left_edge = first.position + Vec3::new(-first.half_extent.x + 0.01, 0.0, 0.0);
        let screen = world_to_screen(left_edge, viewport, &camera);
        let ray = pointer_ray(screen, viewport, &camera);
        let hit = pick_object(&ray, scene.objects()).expect("hit expected");
        assert_eq!(hit.placement_index, 0);
    }

    #[test]
    fn plane_intersection_matches_depth() {
        let camera = fitted_camera();
        let viewport = Vec2::new(800.0, 600.0);
        let ray = pointer_ray(Vec2::new(123.0, 456.0), viewport, &camera);
        let point = intersect_z_plane(&ray, -0.08).expect("plane ahead of camera");
        assert!((point.z - (-0.08)).abs() < 1e-5);
    }

    #[test]
    fn plane_behind_camera_is_rejected() {
        let camera = fitted_camera();
        let viewport = Vec2::new(800.0, 600.0);
        let ray = pointer_ray(Vec2::new(400.0, 300.0), viewport, &camera);
        // The camera sits on +z looking toward -z; a plane far behind it
        // would need a negative ray parameter.
        assert!(intersect_z_plane(&ray, camera.eye().z + 1.0).is_none());
    }

    #[test]
    fn rotated_object_still_hit_at_center() {
        let wall = WallSpec::default();
        let frames = vec![FrameDef {
            id: 2,
            dimensions: FrameDimensionsCm {
                width: 40.0,
                height: 50.0,
                depth: 2.0,
            },
            styling: FrameStyling::default(),
            picture_image_url: None,
        }];
        let placements = vec![PlacementRecord {
            frame_id: 2,
            position: PlanePosition { x: 0.3, y: 0.2 },
            rotation: std::f32::consts::FRAC_PI_4,
            scale: 1.0,
        }];
        let mut ledger = ResourceLedger::new();
        let mut scene = WallScene::new();
        scene.rebuild(&wall, &frames, &placements, &mut ledger);

        let mut camera = OrbitCamera::new();
        camera.set_viewport(800, 600);
        camera.fit_to_backdrop(crate::scene::DEFAULT_BACKDROP_SIZE);
        let viewport = Vec2::new(800.0, 600.0);
        let screen = world_to_screen(scene.objects()[0].position, viewport, &camera);
        let ray = pointer_ray(screen, viewport, &camera);
        assert!(pick_object(&ray, scene.objects()).is_some());
    }
}
