//! Click/drag disambiguation for frame objects.
//!
//! One session runs from pointer-down over a hit object to pointer-up:
//! Idle -> PointerDown(candidate) -> { Dragging | Clicked } -> Idle. Movement
//! below the confirm threshold never touches the object, so micro-jitter on a
//! click cannot move a frame or dirty its stored placement.

use crate::render::camera::OrbitCamera;
use crate::render::pick::{intersect_z_plane, pick_object, pointer_ray};
use crate::scene::WallScene;
use glam::Vec2;

/// Screen-space displacement below which a press-release is a click.
pub const DRAG_THRESHOLD_PX: f32 = 3.0;

/// Events the surrounding application consumes. The engine never persists
/// anything itself; `FrameMoved` is the caller's cue to write the placement
/// back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneEvent {
    FrameSelected {
        frame_id: u32,
        placement_index: usize,
    },
    FrameMoved {
        placement_index: usize,
        x: f32,
        y: f32,
    },
}

/// Transient state for one in-flight gesture.
#[derive(Debug, Clone, Copy)]
struct DragSession {
    placement_index: usize,
    frame_id: u32,
    pointer_down: Vec2,
    plane_z: f32,
    grab_offset: Vec2,
    confirmed: bool,
}

#[derive(Default)]
pub struct InteractionController {
    session: Option<DragSession>,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a candidate is captured; the app suppresses camera orbit
    /// and zoom for the duration.
    pub fn is_capturing(&self) -> bool {
        self.session.is_some()
    }

    /// Raycast the press against all frame objects. On a hit, capture the
    /// candidate and record the grab offset on a drag plane at the object's
    /// depth. Returns true when a candidate was captured.
    pub fn pointer_down(
        &mut self,
        screen: Vec2,
        viewport: Vec2,
        camera: &OrbitCamera,
        scene: &WallScene,
    ) -> bool {
        let ray = pointer_ray(screen, viewport, camera);
        let Some(hit) = pick_object(&ray, scene.objects()) else {
            return false;
        };
        let Some(object) = scene
            .objects()
            .iter()
            .find(|o| o.placement_index == hit.placement_index)
        else {
            return false;
        };
        let plane_z = object.position.z;
        let Some(plane_point) = intersect_z_plane(&ray, plane_z) else {
            return false;
        };

        self.session = Some(DragSession {
            placement_index: hit.placement_index,
            frame_id: hit.frame_id,
            pointer_down: screen,
            plane_z,
            grab_offset: Vec2::new(
                object.position.x - plane_point.x,
                object.position.y - plane_point.y,
            ),
            confirmed: false,
        });
        true
    }

    /// Advance the gesture. Below the threshold nothing moves; once confirmed
    /// the object tracks the drag-plane intersection plus the grab offset,
    /// x/y only.
    pub fn pointer_move(
        &mut self,
        screen: Vec2,
        viewport: Vec2,
        camera: &OrbitCamera,
        scene: &mut WallScene,
    ) {
        let Some(session) = &mut self.session else {
            return;
        };
        if !session.confirmed {
            if (screen - session.pointer_down).length() < DRAG_THRESHOLD_PX {
                return;
            }
            session.confirmed = true;
        }

        let ray = pointer_ray(screen, viewport, camera);
        let Some(plane_point) = intersect_z_plane(&ray, session.plane_z) else {
            return;
        };
        let placement_index = session.placement_index;
        let grab_offset = session.grab_offset;
        if let Some(object) = scene.object_mut(placement_index) {
            object.position.x = plane_point.x + grab_offset.x;
            object.position.y = plane_point.y + grab_offset.y;
        }
    }

    /// End the gesture: a confirmed drag emits `FrameMoved` with coordinates
    /// rounded to 4 decimals, anything else emits `FrameSelected`.
    pub fn pointer_up(&mut self, scene: &WallScene) -> Option<SceneEvent> {
        let session = self.session.take()?;
        if session.confirmed {
            let object = scene
                .objects()
                .iter()
                .find(|o| o.placement_index == session.placement_index)?;
            Some(SceneEvent::FrameMoved {
                placement_index: session.placement_index,
                x: round_position(object.position.x),
                y: round_position(object.position.y),
            })
        } else {
            Some(SceneEvent::FrameSelected {
                frame_id: session.frame_id,
                placement_index: session.placement_index,
            })
        }
    }

    /// Abandon any in-flight session without emitting, e.g. on focus loss or
    /// scene rebuild (indices are only valid within one render pass).
    pub fn cancel(&mut self) {
        self.session = None;
    }
}

/// Round to 4 decimal places so persisted positions stay free of float noise.
fn round_position(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}
