use crate::connection::JoinState;
use crate::game::RenderEntity;
use crate::session::ClientSession;
use macroquad::prelude::*;
use shared::{SessionId, ENTITY_SIZE};

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub show_ghost: bool,
    pub fake_ping_ms: u64,
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn render(&self, session: &ClientSession, config: &RenderConfig) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        let game = session.game();
        let local_id = game.local_id();

        for entity in game.entities() {
            let color = if Some(entity.id) == local_id {
                GREEN
            } else {
                Color::from_rgba(0, 170, 255, 255)
            };
            self.draw_entity(entity, color);
            self.draw_entity_id(entity);
        }

        if config.show_ghost {
            if let Some((x, y)) = game.ghost() {
                draw_rectangle_lines(x, y, ENTITY_SIZE, ENTITY_SIZE, 2.0, RED);
            }
        }

        self.draw_ui(session, config);
    }

    fn draw_entity(&self, entity: &RenderEntity, color: Color) {
        draw_rectangle(entity.x, entity.y, ENTITY_SIZE, ENTITY_SIZE, color);
        draw_rectangle_lines(entity.x, entity.y, ENTITY_SIZE, ENTITY_SIZE, 2.0, WHITE);
    }

    fn draw_entity_id(&self, entity: &RenderEntity) {
        let SessionId(id) = entity.id;
        draw_text(&id.to_string(), entity.x + 2.0, entity.y - 4.0, 14.0, WHITE);
    }

    fn draw_ui(&self, session: &ClientSession, config: &RenderConfig) {
        let y_start = 10.0;

        let (connection_color, connection_text) = match session.join_state() {
            JoinState::Idle => (GRAY, "IDLE".to_string()),
            JoinState::Pending { attempts, .. } => (YELLOW, format!("JOINING ({})", attempts)),
            JoinState::Joined { session_id } => (GREEN, format!("JOINED {}", session_id)),
            JoinState::Failed { reason } => (RED, format!("FAILED: {}", reason)),
        };
        draw_rectangle(10.0, y_start, 8.0, 8.0, connection_color);
        draw_text(&connection_text, 22.0, y_start + 8.0, 14.0, WHITE);

        draw_text(session.replica().status(), 10.0, y_start + 26.0, 16.0, WHITE);

        let entity_text = format!("{} entities", session.game().len());
        draw_text(&entity_text, 10.0, y_start + 44.0, 12.0, WHITE);

        if config.fake_ping_ms > 0 {
            let ping_text = format!("+{}ms fake ping", config.fake_ping_ms);
            draw_text(&ping_text, 10.0, y_start + 58.0, 12.0, WHITE);
        }

        let ghost_text = if config.show_ghost {
            "G: hide server position"
        } else {
            "G: show server position"
        };
        draw_text(ghost_text, 10.0, self.height - 10.0, 12.0, GRAY);

        // Map border
        draw_rectangle_lines(0.0, 0.0, self.width, self.height, 1.0, DARKGRAY);
    }
}
