//! Timed coin and invincibility effects.
//!
//! Picking up a power-up switches its effect on and restarts its frame
//! counter.  The counter then climbs by one each frame; once it passes the
//! configured maximum the effect switches off again.

use crate::config::GameConfig;
use crate::entities::{PowerUp, PowerUpKind};

#[derive(Clone, Debug, PartialEq)]
pub struct PowerUpState {
    pub coin_active: bool,
    pub coin_frame_count: u32,
    pub invincible_active: bool,
    pub invincible_frame_count: u32,
    coin_max_frames: u32,
    invincible_max_frames: u32,
}

impl PowerUpState {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            coin_active: false,
            coin_frame_count: 0,
            invincible_active: false,
            invincible_frame_count: 0,
            coin_max_frames: config.coin.max_frames,
            invincible_max_frames: config.invincible.max_frames,
        }
    }

    /// Hand the pickup to itself so it can decide which effect it grants.
    pub fn activate(&mut self, power_up: &mut PowerUp) {
        power_up.activate(self);
    }

    pub fn refresh_coin(&mut self) {
        self.coin_frame_count = 0;
        self.coin_active = true;
    }

    pub fn refresh_invincible(&mut self) {
        self.invincible_frame_count = 0;
        self.invincible_active = true;
    }

    /// Advance both timers by one frame.
    pub fn update(&mut self) {
        if self.coin_active {
            if self.coin_frame_count <= self.coin_max_frames {
                self.coin_frame_count += 1;
            } else {
                self.coin_active = false;
                tracing::info!("coin effect expired");
            }
        }
        if self.invincible_active {
            if self.invincible_frame_count <= self.invincible_max_frames {
                self.invincible_frame_count += 1;
            } else {
                self.invincible_active = false;
                tracing::info!("invincibility expired");
            }
        }
    }

    /// Drop both effects.  Used when the taxi is destroyed.
    pub fn reset(&mut self) {
        self.coin_active = false;
        self.coin_frame_count = 0;
        self.invincible_active = false;
        self.invincible_frame_count = 0;
    }

    pub fn is_coin_active(&self) -> bool {
        self.coin_active
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible_active
    }

    /// Frames left before the coin effect runs out, for the HUD.
    pub fn coin_frames_left(&self) -> Option<u32> {
        self.coin_active
            .then(|| self.coin_max_frames.saturating_sub(self.coin_frame_count))
    }

    pub fn invincible_frames_left(&self) -> Option<u32> {
        self.invincible_active
            .then(|| self.invincible_max_frames.saturating_sub(self.invincible_frame_count))
    }
}

impl PowerUp {
    /// Mark this pickup taken and switch on its effect.
    pub fn activate(&mut self, state: &mut PowerUpState) {
        self.taken = true;
        match self.kind {
            PowerUpKind::Coin => state.refresh_coin(),
            PowerUpKind::Invincible => state.refresh_invincible(),
        }
        tracing::info!(kind = ?self.kind, x = self.x, y = self.y, "power-up activated");
    }
}
