//! The damageable-entity collision protocol.
//!
//! Taxi, driver, passengers and cars all embed a [`Body`]: position, collision
//! footprint, health, and the two post-collision counters.  Variant-specific
//! behaviour (how far to bounce, whether invincibility applies) is looked up on
//! the body's [`Role`] instead of being spread over a type hierarchy.

use std::collections::HashSet;

use crate::entities::{Car, Driver, Passenger, Taxi};
use crate::powerup::PowerUpState;

/// Frames after a collision during which the entity cannot collide again.
pub const COLLISION_TIMEOUT_FRAMES: u32 = 200;

/// Leading part of the timeout during which the two entities bounce apart.
pub const SEPARATION_FRAMES: u32 = 10;

pub type EntityId = u32;

/// Weak handle to a damageable entity owned by the world.
///
/// Passengers are addressed by their index (they are never removed); taxis and
/// cars by a unique id, because both get replaced or culled over time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Taxi(EntityId),
    Driver,
    Passenger(usize),
    Car(EntityId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Taxi,
    Driver,
    Passenger,
    Car,
}

impl Role {
    /// Pixels moved per separation frame, as `(x, y)`.  Vehicles only bounce
    /// along the road; people get pushed diagonally.
    pub fn separation_step(self) -> (i32, i32) {
        match self {
            Role::Taxi | Role::Car => (0, 1),
            Role::Driver | Role::Passenger => (2, 2),
        }
    }

    /// Whether an active invincibility power-up shields this entity.
    pub fn honours_invincibility(self) -> bool {
        matches!(self, Role::Taxi | Role::Driver)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WreckReport {
    Pending,
    Reported,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Body {
    pub tag: EntityRef,
    pub role: Role,
    pub x: i32,
    pub y: i32,
    pub radius: f64,
    pub max_health: f64,
    pub health: f64,
    /// Damage dealt to the other party of a collision.
    pub damage: f64,
    pub collision_timeout: u32,
    pub separation_frames: u32,
    pub last_collided_with: Option<EntityRef>,
    wreck: WreckReport,
}

impl Body {
    pub fn new(tag: EntityRef, role: Role, x: i32, y: i32, radius: f64, health: f64, damage: f64) -> Self {
        Self {
            tag,
            role,
            x,
            y,
            radius,
            max_health: health,
            health,
            damage,
            collision_timeout: 0,
            separation_frames: 0,
            last_collided_with: None,
            wreck: WreckReport::Pending,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.health <= 0.0
    }

    pub fn distance_to(&self, x: i32, y: i32) -> f64 {
        let dx = (x - self.x) as f64;
        let dy = (y - self.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn overlaps(&self, other: &Body) -> bool {
        self.distance_to(other.x, other.y) < self.radius + other.radius
    }

    /// Health is kept within `[0, max_health]` whatever is thrown at it.
    pub fn receive_damage(&mut self, damage: f64) {
        self.health = (self.health - damage).clamp(0.0, self.max_health);
    }

    /// Try to collide with `other`.
    ///
    /// A collision is legal when both bodies are still alive, this body is out
    /// of timeout, and the two footprints overlap.  The other party is hit
    /// unless it is under its own timeout.  When `shielded` is set and this
    /// role honours invincibility, this side takes nothing and the call
    /// reports `false`.
    pub fn handle_collision(&mut self, other: &mut Body, shielded: bool) -> bool {
        if self.is_destroyed()
            || other.is_destroyed()
            || self.collision_timeout != 0
            || !self.overlaps(other)
        {
            return false;
        }

        self.last_collided_with = Some(other.tag);
        other.receive_collision(self);

        if shielded && self.role.honours_invincibility() {
            tracing::debug!(entity = ?self.tag, other = ?other.tag, "collision absorbed by invincibility");
            return false;
        }

        self.arm_timeouts();
        self.receive_damage(other.damage);
        tracing::debug!(
            entity = ?self.tag,
            other = ?other.tag,
            health = self.health,
            other_health = other.health,
            "collision"
        );
        true
    }

    /// Receiving end of [`Body::handle_collision`].  A body still under its
    /// own timeout takes nothing, whoever hits it.
    pub fn receive_collision(&mut self, other: &Body) {
        if self.collision_timeout != 0 {
            return;
        }
        self.last_collided_with = Some(other.tag);
        self.arm_timeouts();
        self.receive_damage(other.damage);
    }

    fn arm_timeouts(&mut self) {
        self.collision_timeout = COLLISION_TIMEOUT_FRAMES;
        self.separation_frames = SEPARATION_FRAMES;
    }

    /// Called exactly once per frame.
    pub fn update_timeouts(&mut self) {
        self.separation_frames = self.separation_frames.saturating_sub(1);
        self.collision_timeout = self.collision_timeout.saturating_sub(1);
    }

    pub fn is_separating(&self) -> bool {
        self.separation_frames > 0 && self.separation_frames <= SEPARATION_FRAMES
    }

    /// Step away from the point `(other_x, other_y)` while separating.
    pub fn separate_from(&mut self, other_x: i32, other_y: i32) {
        if !self.is_separating() {
            return;
        }
        let (step_x, step_y) = self.role.separation_step();
        if step_x != 0 {
            self.x += if self.x < other_x { -step_x } else { step_x };
        }
        if step_y != 0 {
            self.y += if self.y < other_y { -step_y } else { step_y };
        }
    }

    /// `true` exactly once: the first time this is asked after health hit 0.
    pub fn take_wreck_report(&mut self) -> bool {
        if self.is_destroyed() && self.wreck == WreckReport::Pending {
            self.wreck = WreckReport::Reported;
            true
        } else {
            false
        }
    }
}

// ── Per-frame pair memo ───────────────────────────────────────────────────────

/// Unordered entity pairs that already collided this frame.
#[derive(Clone, Debug, Default)]
pub struct CollisionMemo {
    resolved: HashSet<(EntityRef, EntityRef)>,
}

impl CollisionMemo {
    fn key(a: EntityRef, b: EntityRef) -> (EntityRef, EntityRef) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn contains(&self, a: EntityRef, b: EntityRef) -> bool {
        self.resolved.contains(&Self::key(a, b))
    }

    /// Returns `false` if the pair was already recorded.
    pub fn record(&mut self, a: EntityRef, b: EntityRef) -> bool {
        self.resolved.insert(Self::key(a, b))
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

// ── Entity-level rules ────────────────────────────────────────────────────────

impl Taxi {
    pub fn handle_collision(&mut self, car: &mut Car, power_ups: &PowerUpState) -> bool {
        self.body.handle_collision(&mut car.body, power_ups.is_invincible())
    }
}

impl Driver {
    /// Only a driver on foot can be run over.
    pub fn handle_collision(&mut self, car: &mut Car, power_ups: &PowerUpState) -> bool {
        if self.in_taxi {
            return false;
        }
        self.body.handle_collision(&mut car.body, power_ups.is_invincible())
    }
}

impl Passenger {
    pub fn handle_collision(&mut self, car: &mut Car) -> bool {
        if self.in_taxi {
            return false;
        }
        self.body.handle_collision(&mut car.body, false)
    }
}

impl Car {
    pub fn handle_collision(&mut self, other: &mut Car) -> bool {
        self.body.handle_collision(&mut other.body, false)
    }
}
