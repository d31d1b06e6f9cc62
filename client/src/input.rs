//! Keyboard sampling into directional input

use macroquad::prelude::*;
use shared::Input;

/// Samples movement keys once per frame and detects debug toggles.
pub struct InputManager {
    prev_key_g: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self { prev_key_g: false }
    }

    /// Returns the current input and whether the ghost marker toggle was
    /// pressed this frame.
    pub fn update(&mut self) -> (Input, bool) {
        // Arrow keys and WASD
        let input = Input {
            left: is_key_down(KeyCode::Left) || is_key_down(KeyCode::A),
            right: is_key_down(KeyCode::Right) || is_key_down(KeyCode::D),
            up: is_key_down(KeyCode::Up) || is_key_down(KeyCode::W),
            down: is_key_down(KeyCode::Down) || is_key_down(KeyCode::S),
        };

        let toggle_ghost = rising_edge(&mut self.prev_key_g, is_key_down(KeyCode::G));

        (input, toggle_ghost)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// True only on the frame a key goes from released to held.
fn rising_edge(previous: &mut bool, current: bool) -> bool {
    let pressed = current && !*previous;
    *previous = current;
    pressed
}
