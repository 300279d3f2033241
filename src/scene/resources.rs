//! Ownership ledger for GPU-backed scene resources.
//!
//! Every geometry buffer and texture the scene builder creates is registered
//! here and must be explicitly released when its owning object is removed or
//! replaced. The renderer mirrors live handles into actual GPU objects and
//! evicts whatever the ledger reports as released, so nothing survives a
//! rebuild on either side.

use std::collections::HashSet;

/// Handle to a registered geometry buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(u64);

/// Handle to a registered texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(u64);

impl GeometryHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl TextureHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
pub struct ResourceLedger {
    next_id: u64,
    live_geometries: HashSet<u64>,
    live_textures: HashSet<u64>,
    // Released ids queued for the renderer to destroy its GPU mirrors.
    released_geometries: Vec<u64>,
    released_textures: Vec<u64>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_geometry(&mut self) -> GeometryHandle {
        self.next_id += 1;
        self.live_geometries.insert(self.next_id);
        GeometryHandle(self.next_id)
    }

    pub fn create_texture(&mut self) -> TextureHandle {
        self.next_id += 1;
        self.live_textures.insert(self.next_id);
        TextureHandle(self.next_id)
    }

    /// Release a geometry. Tolerates handles that were already released;
    /// disposal code runs on every exit path and must never panic.
    pub fn release_geometry(&mut self, handle: GeometryHandle) {
        if self.live_geometries.remove(&handle.0) {
            self.released_geometries.push(handle.0);
        } else {
            log::warn!("geometry {} released twice", handle.0);
        }
    }

    pub fn release_texture(&mut self, handle: TextureHandle) {
        if self.live_textures.remove(&handle.0) {
            self.released_textures.push(handle.0);
        } else {
            log::warn!("texture {} released twice", handle.0);
        }
    }

    pub fn live_geometry_count(&self) -> usize {
        self.live_geometries.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.live_textures.len()
    }

    /// Drain ids released since the last call. The renderer destroys the
    /// matching GPU buffers/textures for each id.
    pub fn drain_released(&mut self) -> (Vec<u64>, Vec<u64>) {
        (
            std::mem::take(&mut self.released_geometries),
            std::mem::take(&mut self.released_textures),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ResourceLedger;

    #[test]
    fn create_and_release_balances() {
        let mut ledger = ResourceLedger::new();
        let g = ledger.create_geometry();
        let t = ledger.create_texture();
        assert_eq!(ledger.live_geometry_count(), 1);
        assert_eq!(ledger.live_texture_count(), 1);

        ledger.release_geometry(g);
        ledger.release_texture(t);
        assert_eq!(ledger.live_geometry_count(), 0);
        assert_eq!(ledger.live_texture_count(), 0);

        let (geoms, texs) = ledger.drain_released();
        assert_eq!(geoms, vec![g.id()]);
        assert_eq!(texs, vec![t.id()]);
    }

    #[test]
    fn double_release_is_tolerated() {
        let mut ledger = ResourceLedger::new();
        let g = ledger.create_geometry();
        ledger.release_geometry(g);
        ledger.release_geometry(g);
        assert_eq!(ledger.live_geometry_count(), 0);
        assert_eq!(ledger.drain_released().0.len(), 1);
    }

    #[test]
    fn drain_is_consumed() {
        let mut ledger = ResourceLedger::new();
        let g = ledger.create_geometry();
        ledger.release_geometry(g);
        assert_eq!(ledger.drain_released().0.len(), 1);
        assert!(ledger.drain_released().0.is_empty());
    }
}
