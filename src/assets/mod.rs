//! Texture image loading.
//!
//! Image references are opaque strings resolved as filesystem paths. Decoding
//! runs on a worker thread so a texture starts out pending and becomes
//! available without blocking the frame loop; a failed decode leaves the
//! owning surface on its neutral fill.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read image at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Decoded RGBA8 pixels ready for upload.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug)]
pub enum TextureState {
    Pending,
    Ready(DecodedImage),
    Failed,
}

impl TextureState {
    pub fn is_pending(&self) -> bool {
        matches!(self, TextureState::Pending)
    }
}

pub struct AssetManager {
    textures: HashMap<String, TextureState>,
    sender: Sender<(String, Result<DecodedImage, AssetError>)>,
    receiver: Receiver<(String, Result<DecodedImage, AssetError>)>,
}

impl AssetManager {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            textures: HashMap::new(),
            sender,
            receiver,
        }
    }

    /// Kick off a decode for `url` unless one is already tracked.
    pub fn request(&mut self, url: &str) {
        if self.textures.contains_key(url) {
            return;
        }
        self.textures.insert(url.to_string(), TextureState::Pending);

        let sender = self.sender.clone();
        let owned = url.to_string();
        std::thread::spawn(move || {
            let result = decode_image(&owned);
            // The receiver may already be gone during teardown.
            let _ = sender.send((owned, result));
        });
    }

    /// Drain finished decodes; returns the urls whose state changed so the
    /// renderer can upload or fall back.
    pub fn poll(&mut self) -> Vec<String> {
        let mut changed = Vec::new();
        while let Ok((url, result)) = self.receiver.try_recv() {
            let state = match result {
                Ok(image) => {
                    log::debug!("texture ready: {} ({}x{})", url, image.width, image.height);
                    TextureState::Ready(image)
                }
                Err(err) => {
                    log::warn!("texture load failed, keeping neutral fill: {}", err);
                    TextureState::Failed
                }
            };
            self.textures.insert(url.clone(), state);
            changed.push(url);
        }
        changed
    }

    pub fn get(&self, url: &str) -> Option<&TextureState> {
        self.textures.get(url)
    }

    pub fn has_pending(&self) -> bool {
        self.textures.values().any(|state| state.is_pending())
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_image(url: &str) -> Result<DecodedImage, AssetError> {
    let path = PathBuf::from(url);
    let bytes = std::fs::read(&path).map_err(|source| AssetError::Read {
        path: url.to_string(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(|source| AssetError::Decode {
        path: url.to_string(),
        source,
    })?;
    let rgba = image.to_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    })
}
