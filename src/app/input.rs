use glam::Vec2;

/// Raw pointer state as reported by the window. Gesture interpretation lives
/// in `interact`; this only remembers what is currently pressed and where.
#[derive(Default, Debug, Clone, Copy)]
pub struct PointerState {
    pub position: Option<Vec2>,
    pub right_down: bool,
}

impl PointerState {
    /// Record a cursor move and return the delta from the previous position.
    pub fn track_motion(&mut self, position: Vec2) -> Vec2 {
        let delta = self
            .position
            .map_or(Vec2::ZERO, |previous| position - previous);
        self.position = Some(position);
        delta
    }

    pub fn clear(&mut self) {
        self.position = None;
        self.right_down = false;
    }
}
