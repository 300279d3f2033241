pub mod resources;
pub mod serialization;

use glam::{Vec2, Vec3};
use resources::{GeometryHandle, ResourceLedger, TextureHandle};

/// Centimeters to scene units; 1 unit = 1 meter.
pub const CM_TO_UNITS: f32 = 0.01;

/// Backdrop size used when the wall has no stored dimensions.
pub const DEFAULT_BACKDROP_SIZE: Vec2 = Vec2::new(8.0, 6.0);

/// Depth of the wall backdrop plane.
pub const BACKDROP_Z: f32 = -0.1;

/// Gap between the backdrop and the rear face of a frame object (1 cm).
pub const WALL_CLEARANCE: f32 = 0.01;

/// Border segment thickness around the picture surface (2 cm).
pub const BORDER_WIDTH: f32 = 0.02;

/// How far the picture surface sits in front of the frame's front plane.
const PICTURE_LIFT: f32 = 0.001;

/// Fill used for any surface without a usable texture.
pub const NEUTRAL_GRAY: [f32; 4] = [0.8, 0.8, 0.8, 1.0];

/// Flat wall color when the wall record carries no image.
pub const WALL_FALLBACK_COLOR: [f32; 4] = [0.93, 0.91, 0.88, 1.0];

const DEFAULT_FRAME_COLOR: [f32; 4] = [0.545, 0.271, 0.075, 1.0];

/// Wall record as stored by the persistence layer. Immutable per render
/// pass; changing it triggers a backdrop rebuild.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WallSpec {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub width_cm: Option<f32>,
    #[serde(default)]
    pub height_cm: Option<f32>,
}

impl WallSpec {
    /// Backdrop size in scene units. Falls back to the default 8x6 rectangle
    /// unless both stored dimensions are positive.
    pub fn backdrop_size(&self) -> Vec2 {
        match (self.width_cm, self.height_cm) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => {
                Vec2::new(w * CM_TO_UNITS, h * CM_TO_UNITS)
            }
            _ => DEFAULT_BACKDROP_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameDimensionsCm {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameStyling {
    #[serde(default = "default_frame_color")]
    pub frame_color: String,
}

fn default_frame_color() -> String {
    "#8B4513".to_string()
}

impl Default for FrameStyling {
    fn default() -> Self {
        Self {
            frame_color: default_frame_color(),
        }
    }
}

/// Read-only frame reference data, looked up by `frame_id`. The caller
/// pre-joins the picture image reference.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameDef {
    pub id: u32,
    pub dimensions: FrameDimensionsCm,
    #[serde(default)]
    pub styling: FrameStyling,
    #[serde(default)]
    pub picture_image_url: Option<String>,
}

/// 2D offset from the wall center, in scene units. A stored `z` member is
/// accepted and ignored; depth is fixed by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlanePosition {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

/// One placed frame instance. Identified by its array index for the lifetime
/// of a render pass; indices are not stable across list mutation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlacementRecord {
    pub frame_id: u32,
    #[serde(default)]
    pub position: PlanePosition,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "default_scale")]
    pub scale: f32,
}

fn default_scale() -> f32 {
    1.0
}

/// Flat color plus optional texture reference for one surface.
#[derive(Debug, Clone)]
pub struct MaterialDesc {
    pub color: [f32; 4],
    pub texture_url: Option<String>,
}

impl MaterialDesc {
    fn flat(color: [f32; 4]) -> Self {
        Self {
            color,
            texture_url: None,
        }
    }
}

/// One child surface of a frame object, in the object's local space.
/// A zero z-extent means a flat quad facing the viewer; otherwise a box.
#[derive(Debug, Clone)]
pub struct SurfacePart {
    pub extent: Vec3,
    pub offset: Vec3,
    pub material: MaterialDesc,
    pub geometry: GeometryHandle,
    pub texture: Option<TextureHandle>,
}

/// The rendered composite for one placement. All child surfaces share the
/// object origin so the whole thing translates as a unit.
#[derive(Debug)]
pub struct SceneObject {
    pub frame_id: u32,
    pub placement_index: usize,
    pub position: Vec3,
    pub rotation_z: f32,
    pub half_extent: Vec3,
    pub parts: Vec<SurfacePart>,
}

impl SceneObject {
    /// Release every resource owned by this object's child surfaces.
    fn dispose(&mut self, ledger: &mut ResourceLedger) {
        for part in &mut self.parts {
            ledger.release_geometry(part.geometry);
            if let Some(texture) = part.texture.take() {
                ledger.release_texture(texture);
            }
        }
        self.parts.clear();
    }
}

#[derive(Debug)]
pub struct Backdrop {
    pub size: Vec2,
    pub material: MaterialDesc,
    pub geometry: GeometryHandle,
    pub texture: Option<TextureHandle>,
}

impl Backdrop {
    fn dispose(&mut self, ledger: &mut ResourceLedger) {
        ledger.release_geometry(self.geometry);
        if let Some(texture) = self.texture.take() {
            ledger.release_texture(texture);
        }
    }
}

/// Scene graph for one wall: backdrop plus the object registry, one entry per
/// current placement. Rebuilt wholesale whenever any input list changes.
#[derive(Default)]
pub struct WallScene {
    backdrop: Option<Backdrop>,
    objects: Vec<SceneObject>,
}

impl WallScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backdrop(&self) -> Option<&Backdrop> {
        self.backdrop.as_ref()
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object_mut(&mut self, index: usize) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.placement_index == index)
    }

    /// Tear down the entire registry, releasing every owned resource.
    pub fn clear(&mut self, ledger: &mut ResourceLedger) {
        for object in &mut self.objects {
            object.dispose(ledger);
        }
        self.objects.clear();
        if let Some(backdrop) = &mut self.backdrop {
            backdrop.dispose(ledger);
        }
        self.backdrop = None;
    }

    /// Full teardown and rebuild from the current input lists. No incremental
    /// patching; rebuild work is proportional to placement count.
    pub fn rebuild(
        &mut self,
        wall: &WallSpec,
        frames: &[FrameDef],
        placements: &[PlacementRecord],
        ledger: &mut ResourceLedger,
    ) {
        self.clear(ledger);

        let size = wall.backdrop_size();
        let material = match &wall.image_url {
            Some(url) => MaterialDesc {
                color: [1.0, 1.0, 1.0, 1.0],
                texture_url: Some(url.clone()),
            },
            None => MaterialDesc::flat(WALL_FALLBACK_COLOR),
        };
        let texture = material
            .texture_url
            .is_some()
            .then(|| ledger.create_texture());
        self.backdrop = Some(Backdrop {
            size,
            material,
            geometry: ledger.create_geometry(),
            texture,
        });

        for (index, placement) in placements.iter().enumerate() {
            let Some(frame) = frames.iter().find(|f| f.id == placement.frame_id) else {
                log::warn!(
                    "placement {} references unknown frame {}; skipping",
                    index,
                    placement.frame_id
                );
                continue;
            };
            self.objects
                .push(build_frame_object(frame, placement, index, ledger));
        }

        log::info!(
            "scene rebuilt: backdrop {:.2}x{:.2}, {} of {} placements",
            size.x,
            size.y,
            self.objects.len(),
            placements.len()
        );
    }
}

/// Compose the picture surface, four border segments, and back panel for one
/// placement. The object's rear face sits `WALL_CLEARANCE` in front of the
/// backdrop.
fn build_frame_object(
    frame: &FrameDef,
    placement: &PlacementRecord,
    placement_index: usize,
    ledger: &mut ResourceLedger,
) -> SceneObject {
    let scale = if placement.scale > 0.0 {
        placement.scale
    } else {
        1.0
    };
    let w = frame.dimensions.width * CM_TO_UNITS * scale;
    let h = frame.dimensions.height * CM_TO_UNITS * scale;
    let d = frame.dimensions.depth * CM_TO_UNITS * scale;

    let border = BORDER_WIDTH.min(w * 0.25).min(h * 0.25);
    let inner_w = (w - 2.0 * border).max(0.0);
    let inner_h = (h - 2.0 * border).max(0.0);

    let frame_color = parse_hex_color(&frame.styling.frame_color).unwrap_or_else(|| {
        log::warn!(
            "frame {}: unparseable color {:?}",
            frame.id,
            frame.styling.frame_color
        );
        DEFAULT_FRAME_COLOR
    });

    let mut parts = Vec::with_capacity(6);

    // Picture surface, flush with the front plane plus a small lift.
    let picture_material = match &frame.picture_image_url {
        Some(url) => MaterialDesc {
            color: [1.0, 1.0, 1.0, 1.0],
            texture_url: Some(url.clone()),
        },
        None => MaterialDesc::flat(NEUTRAL_GRAY),
    };
    let picture_texture = picture_material
        .texture_url
        .is_some()
        .then(|| ledger.create_texture());
    parts.push(SurfacePart {
        extent: Vec3::new(inner_w, inner_h, 0.0),
        offset: Vec3::new(0.0, 0.0, d * 0.5 + PICTURE_LIFT),
        material: picture_material,
        geometry: ledger.create_geometry(),
        texture: picture_texture,
    });

    // Four border segments: full-width top/bottom bars, side bars between.
    let border_extents = [
        (
            Vec3::new(w, border, d),
            Vec3::new(0.0, (h - border) * 0.5, 0.0),
        ),
        (
            Vec3::new(w, border, d),
            Vec3::new(0.0, -(h - border) * 0.5, 0.0),
        ),
        (
            Vec3::new(border, inner_h, d),
            Vec3::new(-(w - border) * 0.5, 0.0, 0.0),
        ),
        (
            Vec3::new(border, inner_h, d),
            Vec3::new((w - border) * 0.5, 0.0, 0.0),
        ),
    ];
    for (extent, offset) in border_extents {
        parts.push(SurfacePart {
            extent,
            offset,
            material: MaterialDesc::flat(frame_color),
            geometry: ledger.create_geometry(),
            texture: None,
        });
    }

    // Back panel covering the full outer footprint, at the rear face.
    parts.push(SurfacePart {
        extent: Vec3::new(w, h, 0.0),
        offset: Vec3::new(0.0, 0.0, -d * 0.5),
        material: MaterialDesc::flat(frame_color),
        geometry: ledger.create_geometry(),
        texture: None,
    });

    SceneObject {
        frame_id: frame.id,
        placement_index,
        position: Vec3::new(
            placement.position.x,
            placement.position.y,
            BACKDROP_Z + WALL_CLEARANCE + d * 0.5,
        ),
        rotation_z: placement.rotation,
        half_extent: Vec3::new(w * 0.5, h * 0.5, d * 0.5),
        parts,
    }
}

/// Parse a `#RRGGBB` color into normalized RGBA.
pub fn parse_hex_color(value: &str) -> Option<[f32; 4]> {
    let hex = value.strip_prefix('#')?;
    // Byte length alone is not enough: a multi-byte character could land a
    // slice below on a non-char boundary.
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame(id: u32) -> FrameDef {
        FrameDef {
            id,
            dimensions: FrameDimensionsCm {
                width: 20.0,
                height: 25.0,
                depth: 2.0,
            },
            styling: FrameStyling::default(),
            picture_image_url: None,
        }
    }

    fn placement_at(frame_id: u32, x: f32, y: f32) -> PlacementRecord {
        PlacementRecord {
            frame_id,
            position: PlanePosition { x, y },
            rotation: 0.0,
            scale: 1.0,
        }
    }

    #[test]
    fn backdrop_size_from_wall_dimensions() {
        let wall = WallSpec {
            image_url: None,
            width_cm: Some(300.0),
            height_cm: Some(250.0),
        };
        assert_eq!(wall.backdrop_size(), Vec2::new(3.0, 2.5));
    }

    #[test]
    fn backdrop_size_falls_back_when_dimensions_missing() {
        assert_eq!(WallSpec::default().backdrop_size(), DEFAULT_BACKDROP_SIZE);
        let zero = WallSpec {
            image_url: None,
            width_cm: Some(0.0),
            height_cm: Some(250.0),
        };
        assert_eq!(zero.backdrop_size(), DEFAULT_BACKDROP_SIZE);
    }

    #[test]
    fn scenario_one_frame_on_measured_wall() {
        let wall = WallSpec {
            image_url: None,
            width_cm: Some(300.0),
            height_cm: Some(250.0),
        };
        let frames = vec![sample_frame(1)];
        let placements = vec![placement_at(1, 0.0, 0.0)];

        let mut ledger = ResourceLedger::new();
        let mut scene = WallScene::new();
        scene.rebuild(&wall, &frames, &placements, &mut ledger);

        let backdrop = scene.backdrop().expect("backdrop built");
        assert_eq!(backdrop.size, Vec2::new(3.0, 2.5));
        assert_eq!(backdrop.material.color, WALL_FALLBACK_COLOR);

        assert_eq!(scene.objects().len(), 1);
        let object = &scene.objects()[0];
        // -0.1 + 0.01 + 0.02/2
        assert!((object.position.z - (-0.08)).abs() < 1e-6);
        // Picture fallback is the neutral gray.
        assert_eq!(object.parts[0].material.color, NEUTRAL_GRAY);
        assert!(object.parts[0].material.texture_url.is_none());
        // Picture + four borders + back panel.
        assert_eq!(object.parts.len(), 6);
    }

    #[test]
    fn dangling_frame_id_is_skipped() {
        let wall = WallSpec::default();
        let frames = vec![sample_frame(1)];
        let placements = vec![
            placement_at(1, 0.0, 0.0),
            placement_at(99, 1.0, 1.0),
            placement_at(1, -1.0, 0.5),
        ];

        let mut ledger = ResourceLedger::new();
        let mut scene = WallScene::new();
        scene.rebuild(&wall, &frames, &placements, &mut ledger);

        assert_eq!(scene.objects().len(), 2);
        let indices: Vec<usize> = scene.objects().iter().map(|o| o.placement_index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn rebuild_releases_every_prior_resource() {
        let wall = WallSpec::default();
        let frames = vec![sample_frame(1)];
        let five: Vec<PlacementRecord> = (0..5)
            .map(|i| placement_at(1, i as f32 * 0.5, 0.0))
            .collect();
        let two: Vec<PlacementRecord> =
            (0..2).map(|i| placement_at(1, i as f32, 0.0)).collect();

        let mut ledger = ResourceLedger::new();
        let mut scene = WallScene::new();
        scene.rebuild(&wall, &frames, &five, &mut ledger);
        assert_eq!(ledger.live_geometry_count(), 1 + 5 * 6);

        scene.rebuild(&wall, &frames, &two, &mut ledger);
        assert_eq!(scene.objects().len(), 2);
        assert_eq!(ledger.live_geometry_count(), 1 + 2 * 6);
        assert_eq!(ledger.live_texture_count(), 0);

        scene.clear(&mut ledger);
        assert_eq!(ledger.live_geometry_count(), 0);
        assert_eq!(ledger.live_texture_count(), 0);
    }

    #[test]
    fn textured_wall_and_picture_register_textures() {
        let wall = WallSpec {
            image_url: Some("walls/living-room.jpg".to_string()),
            width_cm: Some(400.0),
            height_cm: Some(260.0),
        };
        let mut frame = sample_frame(7);
        frame.picture_image_url = Some("pictures/sunset.png".to_string());
        let placements = vec![placement_at(7, 0.2, -0.1)];

        let mut ledger = ResourceLedger::new();
        let mut scene = WallScene::new();
        scene.rebuild(&wall, &[frame], &placements, &mut ledger);

        assert_eq!(ledger.live_texture_count(), 2);
        assert!(scene.backdrop().unwrap().texture.is_some());
        assert!(scene.objects()[0].parts[0].texture.is_some());
    }

    #[test]
    fn placement_scale_applies_to_all_dimensions() {
        let wall = WallSpec::default();
        let frames = vec![sample_frame(1)];
        let placements = vec![PlacementRecord {
            frame_id: 1,
            position: PlanePosition { x: 0.0, y: 0.0 },
            rotation: 0.0,
            scale: 2.0,
        }];

        let mut ledger = ResourceLedger::new();
        let mut scene = WallScene::new();
        scene.rebuild(&wall, &frames, &placements, &mut ledger);

        let object = &scene.objects()[0];
        assert!((object.half_extent.x - 0.2).abs() < 1e-6);
        assert!((object.half_extent.y - 0.25).abs() < 1e-6);
        // Scaled depth feeds the z placement: -0.1 + 0.01 + 0.04/2.
        assert!((object.position.z - (-0.07)).abs() < 1e-6);
    }

    #[test]
    fn hex_color_parsing() {
        assert_eq!(parse_hex_color("#FF0000"), Some([1.0, 0.0, 0.0, 1.0]));
        assert!(parse_hex_color("8B4513").is_none());
        assert!(parse_hex_color("#8B45").is_none());
        assert!(parse_hex_color("#8B451G").is_none());
        // Six bytes but not six ASCII digits; must reject, not panic.
        assert!(parse_hex_color("#a\u{e9}123").is_none());
    }

    #[test]
    fn multibyte_frame_color_falls_back_to_default() {
        let mut frame = sample_frame(4);
        frame.styling.frame_color = "#a\u{e9}123".to_string();
        let placements = vec![placement_at(4, 0.0, 0.0)];

        let mut ledger = ResourceLedger::new();
        let mut scene = WallScene::new();
        scene.rebuild(&WallSpec::default(), &[frame], &placements, &mut ledger);

        assert_eq!(scene.objects().len(), 1);
        // Border segments carry the fallback color.
        assert_eq!(scene.objects()[0].parts[1].material.color, DEFAULT_FRAME_COLOR);
    }
}
