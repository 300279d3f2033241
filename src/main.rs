//! Wallviz - interactive wall visualization
//!
//! Renders a wall document (wall backdrop, frame catalogue, placements) as a
//! 3D scene: click a frame to select it, drag to reposition it on the wall,
//! right-drag to orbit and scroll to zoom. Pass a document path as the first
//! argument, or run without arguments for a built-in sample wall.

mod app;
mod assets;
mod render;
mod scene;

use scene::serialization::{load_document_from_file, WallDocument};
use scene::{FrameDef, FrameDimensionsCm, FrameStyling, PlacementRecord, PlanePosition, WallSpec};
use std::path::Path;

fn sample_document() -> WallDocument {
    WallDocument {
        wall: WallSpec {
            image_url: None,
            width_cm: Some(300.0),
            height_cm: Some(250.0),
        },
        frames: vec![
            FrameDef {
                id: 1,
                dimensions: FrameDimensionsCm {
                    width: 40.0,
                    height: 50.0,
                    depth: 2.0,
                },
                styling: FrameStyling::default(),
                picture_image_url: None,
            },
            FrameDef {
                id: 2,
                dimensions: FrameDimensionsCm {
                    width: 60.0,
                    height: 40.0,
                    depth: 3.0,
                },
                styling: FrameStyling {
                    frame_color: "#1F1F1F".to_string(),
                },
                picture_image_url: None,
            },
        ],
        frame_placements: vec![
            PlacementRecord {
                frame_id: 1,
                position: PlanePosition { x: -0.6, y: 0.2 },
                rotation: 0.0,
                scale: 1.0,
            },
            PlacementRecord {
                frame_id: 2,
                position: PlanePosition { x: 0.5, y: -0.1 },
                rotation: 0.0,
                scale: 1.0,
            },
        ],
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let document = match std::env::args().nth(1) {
        Some(path) => match load_document_from_file(Path::new(&path)) {
            Ok(document) => {
                log::info!("loaded wall document from {}", path);
                document
            }
            Err(err) => {
                log::error!("failed to load {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => {
            log::info!("no document given, using the built-in sample wall");
            sample_document()
        }
    };

    app::run(document);
}
