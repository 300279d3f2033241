use crate::scene::{FrameDef, PlacementRecord, WallSpec};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Everything the viewer needs for one wall, shaped the way the wall API
/// serializes it: the wall record, the placement list, and the frame records
/// pre-joined with their picture image references.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct WallDocument {
    pub wall: WallSpec,
    #[serde(default)]
    pub frames: Vec<FrameDef>,
    #[serde(default)]
    pub frame_placements: Vec<PlacementRecord>,
}

pub fn load_document_from_file(path: &Path) -> Result<WallDocument> {
    let json = std::fs::read_to_string(path)?;
    let document: WallDocument = serde_json::from_str(&json)?;
    Ok(document)
}

pub fn save_document_to_file(document: &WallDocument, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(document)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::WallDocument;
    use crate::scene::{PlanePosition, WallSpec};

    #[test]
    fn empty_document_round_trips() {
        let document = WallDocument::default();
        let json = serde_json::to_string_pretty(&document).unwrap();
        let loaded: WallDocument = serde_json::from_str(&json).unwrap();
        assert!(loaded.frames.is_empty());
        assert!(loaded.frame_placements.is_empty());
        assert_eq!(loaded.wall, WallSpec::default());
    }

    #[test]
    fn parses_wall_api_payload() {
        let json = r##"{
            "wall": {
                "image_url": "uploads/walls/7/wall.jpg",
                "width_cm": 300.0,
                "height_cm": 250.0
            },
            "frames": [
                {
                    "id": 12,
                    "dimensions": { "width": 20.0, "height": 25.0, "depth": 2.0 },
                    "styling": { "frame_color": "#112233" },
                    "picture_image_url": "uploads/pictures/12/photo.jpg"
                }
            ],
            "frame_placements": [
                {
                    "frame_id": 12,
                    "position": { "x": 0.5, "y": -0.25, "z": 0 },
                    "rotation": 0.0,
                    "scale": 1.5
                }
            ]
        }"##;

        let document: WallDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.wall.width_cm, Some(300.0));
        assert_eq!(document.frames.len(), 1);
        assert_eq!(document.frames[0].styling.frame_color, "#112233");
        let placement = &document.frame_placements[0];
        assert_eq!(placement.frame_id, 12);
        assert_eq!(placement.position, PlanePosition { x: 0.5, y: -0.25 });
        assert_eq!(placement.scale, 1.5);
    }

    #[test]
    fn placement_defaults_fill_missing_fields() {
        let json = r#"{
            "wall": {},
            "frames": [],
            "frame_placements": [ { "frame_id": 3 } ]
        }"#;
        let document: WallDocument = serde_json::from_str(json).unwrap();
        let placement = &document.frame_placements[0];
        assert_eq!(placement.position, PlanePosition::default());
        assert_eq!(placement.rotation, 0.0);
        assert_eq!(placement.scale, 1.0);
    }

    #[test]
    fn save_load_via_temp_file() {
        let json = r#"{
            "wall": { "width_cm": 180.0, "height_cm": 120.0 },
            "frames": [
                { "id": 1, "dimensions": { "width": 30.0, "height": 40.0, "depth": 3.0 } }
            ],
            "frame_placements": [
                { "frame_id": 1, "position": { "x": -0.3, "y": 0.2 } }
            ]
        }"#;
        let document: WallDocument = serde_json::from_str(json).unwrap();

        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!("wallviz_doc_{}_{}.json", std::process::id(), nonce));

        super::save_document_to_file(&document, &path).unwrap();
        let loaded = super::load_document_from_file(&path).unwrap();
        assert_eq!(loaded.wall.width_cm, Some(180.0));
        assert_eq!(loaded.frames.len(), 1);
        assert_eq!(loaded.frame_placements.len(), 1);

        let _ = std::fs::remove_file(path);
    }
}
