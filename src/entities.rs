//! All game entity types: mostly data, plus the small per-entity rules that
//! only touch the entity itself (walking, ejecting, visibility).
//!
//! Anything that needs two entities at once lives in `collision`, `trip` or
//! `compute`.

use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;

use crate::collision::{Body, EntityId, EntityRef, Role};
use crate::config::{GameConfig, PassengerPlacement};
use crate::powerup::PowerUpState;
use crate::trip::Trip;

// ── Enums ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weather {
    Sunny,
    Raining,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct WeatherSpan {
    pub kind: Weather,
    pub start_frame: u64,
    pub end_frame: u64,
}

/// Why a game stopped.  Polled by the screen layer once per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEnd {
    FramesExhausted,
    TargetReached,
    /// The driverless taxi scrolled off the bottom of the screen.
    TaxiAbandoned,
    DriverDead,
    PassengerDead,
}

/// A one-shot switch: once spent, the guarded action never happens again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Latch {
    Armed,
    Spent,
}

impl Latch {
    /// Spend the latch.  Returns `true` only for the call that spent it.
    pub fn fire(&mut self) -> bool {
        match self {
            Latch::Armed => {
                *self = Latch::Spent;
                true
            }
            Latch::Spent => false,
        }
    }

    pub fn is_spent(self) -> bool {
        self == Latch::Spent
    }
}

// ── Input ─────────────────────────────────────────────────────────────────────

/// Snapshot of the direction keys held during one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl FrameInput {
    pub fn is_down(&self, key: Key) -> bool {
        match key {
            Key::Up => self.up,
            Key::Down => self.down,
            Key::Left => self.left,
            Key::Right => self.right,
        }
    }

    /// Holding "up" scrolls the road.
    pub fn scrolls(&self) -> bool {
        self.up
    }
}

// ── Cars & projectiles ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarKind {
    Other,
    Enemy { fireball_spawn_rate: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Car {
    pub id: EntityId,
    pub body: Body,
    pub kind: CarKind,
    /// Fixed for the car's whole life.  Negative moves up the screen.
    pub velocity_y: i32,
}

impl Car {
    /// Spawn in a random lane at one of the two off-screen bands.  Cars from
    /// the top band drive down the screen, cars from the bottom band drive up.
    pub fn spawn(id: EntityId, enemy: bool, config: &GameConfig, rng: &mut impl Rng) -> Car {
        let (radius, health, damage, min_speed, max_speed, kind) = if enemy {
            let c = &config.enemy_car;
            (
                c.radius,
                c.health,
                c.damage,
                c.min_speed_y,
                c.max_speed_y,
                CarKind::Enemy {
                    fireball_spawn_rate: c.fireball_spawn_rate,
                },
            )
        } else {
            let c = &config.other_car;
            (c.radius, c.health, c.damage, c.min_speed_y, c.max_speed_y, CarKind::Other)
        };

        let lanes = &config.road.lanes;
        let x = lanes[rng.gen_range(0..lanes.len())];
        let from_top = rng.gen_bool(0.5);
        let y = if from_top {
            config.road.spawn_y_top
        } else {
            config.road.spawn_y_bottom
        };
        let speed = rng.gen_range(min_speed..=max_speed);
        let velocity_y = if from_top { speed } else { -speed };

        Car {
            id,
            body: Body::new(EntityRef::Car(id), Role::Car, x, y, radius, health, damage),
            kind,
            velocity_y,
        }
    }

    pub fn is_enemy(&self) -> bool {
        matches!(self.kind, CarKind::Enemy { .. })
    }

    /// One frame of driving.  While under collision timeout the car does not
    /// drive; it only bounces away from `last_hit_at`.
    pub fn advance(&mut self, last_hit_at: Option<(i32, i32)>) {
        self.body.update_timeouts();
        if self.body.collision_timeout > 0 {
            if let Some((x, y)) = last_hit_at {
                self.body.separate_from(x, y);
            }
        } else {
            self.body.y += self.velocity_y;
        }
    }

    /// Enemy cars roll every frame to fire a fireball from where they stand.
    /// A wrecked car never fires.
    pub fn try_fire(&self, rng: &mut impl Rng, roll_max: u32) -> Option<ProjectileSpawn> {
        let CarKind::Enemy { fireball_spawn_rate } = self.kind else {
            return None;
        };
        if !can_spawn(rng, fireball_spawn_rate, roll_max) || self.body.is_destroyed() {
            return None;
        }
        Some(ProjectileSpawn {
            x: self.body.x,
            y: self.body.y,
            spawned_by: self.id,
        })
    }

    pub fn is_visible(&self) -> bool {
        !self.body.is_destroyed()
    }
}

/// Fixed-probability check: roll `1..=roll_max`, succeed on a multiple of `rate`.
pub fn can_spawn(rng: &mut impl Rng, rate: u32, roll_max: u32) -> bool {
    rng.gen_range(1..=roll_max) % rate == 0
}

/// A fireball the orchestrator should add to the world this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProjectileSpawn {
    pub x: i32,
    pub y: i32,
    pub spawned_by: EntityId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Projectile {
    pub x: i32,
    pub y: i32,
    pub radius: f64,
    pub damage: f64,
    pub speed_y: i32,
    /// The enemy car that fired it; never damaged by it.
    pub spawned_by: EntityId,
    pub collided: bool,
}

impl Projectile {
    pub fn from_spawn(spawn: ProjectileSpawn, config: &GameConfig) -> Projectile {
        Projectile {
            x: spawn.x,
            y: spawn.y,
            radius: config.fireball.radius,
            damage: config.fireball.damage,
            speed_y: config.fireball.speed_y,
            spawned_by: spawn.spawned_by,
            collided: false,
        }
    }

    pub fn touches(&self, body: &Body) -> bool {
        body.distance_to(self.x, self.y) < self.radius + body.radius
    }

    pub fn is_off_screen(&self) -> bool {
        self.y <= 0
    }

    pub fn is_spent(&self) -> bool {
        self.collided || self.is_off_screen()
    }

    pub fn is_visible(&self) -> bool {
        !self.is_spent()
    }
}

// ── Taxi, driver, passengers ──────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Taxi {
    pub id: EntityId,
    pub body: Body,
    pub speed_x: i32,
    pub has_driver: bool,
    /// Index into `WorldState::passengers`.  The taxi only points at the
    /// passenger while they ride; it never owns them.
    pub current_passenger: Option<usize>,
}

impl Taxi {
    pub fn new(id: EntityId, x: i32, y: i32, config: &GameConfig) -> Taxi {
        let c = &config.taxi;
        Taxi {
            id,
            body: Body::new(EntityRef::Taxi(id), Role::Taxi, x, y, c.radius, c.health, c.damage),
            speed_x: c.speed_x,
            has_driver: false,
            current_passenger: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current_passenger.is_none()
    }

    pub fn is_visible(&self) -> bool {
        !self.body.is_destroyed()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Driver {
    pub body: Body,
    pub in_taxi: bool,
    pub walk_speed_x: i32,
    pub walk_speed_y: i32,
    pub taxi_get_in_radius: f64,
    pub eject_offset_x: i32,
}

impl Driver {
    pub fn new(x: i32, y: i32, config: &GameConfig) -> Driver {
        let c = &config.driver;
        Driver {
            body: Body::new(EntityRef::Driver, Role::Driver, x, y, c.radius, c.health, 0.0),
            in_taxi: false,
            walk_speed_x: c.walk_speed_x,
            walk_speed_y: c.walk_speed_y,
            taxi_get_in_radius: c.taxi_get_in_radius,
            eject_offset_x: c.eject_offset_x,
        }
    }

    pub fn walk(&mut self, input: &FrameInput) {
        if input.is_down(Key::Up) {
            self.body.y -= self.walk_speed_y;
        }
        if input.is_down(Key::Down) {
            self.body.y += self.walk_speed_y;
        }
        if input.is_down(Key::Left) {
            self.body.x -= self.walk_speed_x;
        }
        if input.is_down(Key::Right) {
            self.body.x += self.walk_speed_x;
        }
    }

    pub fn is_adjacent_to(&self, taxi: &Taxi) -> bool {
        self.body.distance_to(taxi.body.x, taxi.body.y) <= self.taxi_get_in_radius
    }

    pub fn eject(&mut self) {
        self.in_taxi = false;
        self.body.x -= self.eject_offset_x;
    }

    pub fn is_visible(&self) -> bool {
        !self.in_taxi && !self.body.is_destroyed()
    }
}

/// Where a passenger is in their trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TripPhase {
    /// On the kerb, not yet picked up.
    Waiting,
    /// Picked up.  Aboard unless `Passenger::in_taxi` says they were ejected.
    Riding,
    /// Walking from the taxi to the trip-end flag.
    Departing { target_x: i32, target_y: i32 },
    DroppedOff,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Passenger {
    pub body: Body,
    pub detect_radius: f64,
    pub walk_speed_x: i32,
    pub walk_speed_y: i32,
    pub eject_offset_x: i32,
    pub priority: u8,
    /// Priority before weather; the coin effect lowers this one.
    pub original_priority: u8,
    pub has_umbrella: bool,
    pub end_x: i32,
    pub distance_y: i32,
    pub earnings: f64,
    pub penalty: f64,
    pub phase: TripPhase,
    pub in_taxi: bool,
    pub priority_drop: Latch,
    pub penalty_latch: Latch,
    pub payout: Latch,
}

impl Passenger {
    pub fn new(index: usize, placement: &PassengerPlacement, config: &GameConfig) -> Passenger {
        let c = &config.passenger;
        let mut passenger = Passenger {
            body: Body::new(
                EntityRef::Passenger(index),
                Role::Passenger,
                placement.x,
                placement.y,
                c.radius,
                c.health,
                0.0,
            ),
            detect_radius: c.detect_radius,
            walk_speed_x: c.walk_speed_x,
            walk_speed_y: c.walk_speed_y,
            eject_offset_x: c.eject_offset_x,
            priority: placement.priority,
            original_priority: placement.priority,
            has_umbrella: placement.has_umbrella,
            end_x: placement.end_x,
            distance_y: placement.distance_y,
            earnings: 0.0,
            penalty: 0.0,
            phase: TripPhase::Waiting,
            in_taxi: false,
            priority_drop: Latch::Armed,
            penalty_latch: Latch::Armed,
            payout: Latch::Armed,
        };
        passenger.recalculate_earnings(&config.trip);
        passenger
    }

    pub fn is_picked_up(&self) -> bool {
        self.phase != TripPhase::Waiting
    }

    pub fn is_moving_to_flag(&self) -> bool {
        matches!(self.phase, TripPhase::Departing { .. })
    }

    pub fn is_dropped_off(&self) -> bool {
        self.phase == TripPhase::DroppedOff
    }

    /// Picked up, not yet walking off, and not sitting in a taxi.
    pub fn is_waiting_for_reboard(&self) -> bool {
        self.phase == TripPhase::Riding && !self.in_taxi
    }

    /// One walking step toward `(x, y)`; returns `true` once standing on it.
    pub fn step_towards(&mut self, x: i32, y: i32) -> bool {
        self.body.x = approach(self.body.x, x, self.walk_speed_x);
        self.body.y = approach(self.body.y, y, self.walk_speed_y);
        self.body.x == x && self.body.y == y
    }

    pub fn eject(&mut self) {
        self.in_taxi = false;
        self.body.x -= self.eject_offset_x;
    }

    pub fn is_visible(&self) -> bool {
        let on_foot = match self.phase {
            TripPhase::Waiting | TripPhase::Departing { .. } | TripPhase::DroppedOff => true,
            TripPhase::Riding => !self.in_taxi,
        };
        on_foot && !self.body.is_destroyed()
    }
}

/// Move `from` toward `to` by at most `step`, never overshooting.
fn approach(from: i32, to: i32, step: i32) -> i32 {
    if from < to {
        (from + step).min(to)
    } else if from > to {
        (from - step).max(to)
    } else {
        from
    }
}

// ── Flag, power-ups, effects ──────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct TripEndFlag {
    pub x: i32,
    pub y: i32,
    pub radius: f64,
    pub active: bool,
}

impl TripEndFlag {
    pub fn is_visible(&self) -> bool {
        self.active
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerUpKind {
    Coin,
    Invincible,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PowerUp {
    pub x: i32,
    pub y: i32,
    pub radius: f64,
    pub kind: PowerUpKind,
    pub taken: bool,
}

impl PowerUp {
    pub fn new(kind: PowerUpKind, x: i32, y: i32, config: &GameConfig) -> PowerUp {
        let radius = match kind {
            PowerUpKind::Coin => config.coin.radius,
            PowerUpKind::Invincible => config.invincible.radius,
        };
        PowerUp {
            x,
            y,
            radius,
            kind,
            taken: false,
        }
    }

    pub fn touches(&self, body: &Body) -> bool {
        body.distance_to(self.x, self.y) <= self.radius + body.radius
    }

    pub fn is_visible(&self) -> bool {
        !self.taken
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectKind {
    /// Burst shown where two entities collided.
    Smoke,
    /// A car or taxi was destroyed.
    Fire,
    /// A driver or passenger was destroyed.
    Blood,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Effect {
    pub x: i32,
    pub y: i32,
    pub kind: EffectKind,
    pub frames_remaining: u32,
}

impl Effect {
    pub fn new(kind: EffectKind, x: i32, y: i32, config: &GameConfig) -> Effect {
        let frames_remaining = match kind {
            EffectKind::Smoke => config.effects.smoke_ttl,
            EffectKind::Fire => config.effects.fire_ttl,
            EffectKind::Blood => config.effects.blood_ttl,
        };
        Effect {
            x,
            y,
            kind,
            frames_remaining,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.frames_remaining > 0
    }
}

// ── Stats ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct GameStats {
    pub total_score: f64,
    pub remaining_frames: i64,
    pub target_score: f64,
}

// ── Master game state ─────────────────────────────────────────────────────────

/// The entire simulation.  Cloneable so `compute::tick` can hand back a new
/// copy without touching the original.
#[derive(Clone, Debug)]
pub struct WorldState {
    pub config: Arc<GameConfig>,
    pub taxi: Taxi,
    pub driver: Driver,
    pub passengers: Vec<Passenger>,
    pub cars: Vec<Car>,
    pub projectiles: Vec<Projectile>,
    pub power_ups: Vec<PowerUp>,
    pub effects: Vec<Effect>,
    pub power_up_state: PowerUpState,
    /// The latest trip.  Kept after completion for the "last trip" readout.
    pub trip: Option<Trip>,
    pub weather: Vec<WeatherSpan>,
    pub stats: GameStats,
    pub frame: u64,
    /// Next id handed to a spawned taxi or car.
    pub next_id: EntityId,
}

impl WorldState {
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn car(&self, id: EntityId) -> Option<&Car> {
        self.cars.iter().find(|car| car.id == id)
    }

    /// Current position of whatever `entity` refers to, if it still exists.
    pub fn position_of(&self, entity: EntityRef) -> Option<(i32, i32)> {
        match entity {
            EntityRef::Taxi(id) if id == self.taxi.id => Some((self.taxi.body.x, self.taxi.body.y)),
            EntityRef::Taxi(_) => None,
            EntityRef::Driver => Some((self.driver.body.x, self.driver.body.y)),
            EntityRef::Passenger(index) => self.passengers.get(index).map(|p| (p.body.x, p.body.y)),
            EntityRef::Car(id) => self.car(id).map(|car| (car.body.x, car.body.y)),
        }
    }

    pub fn weather_now(&self) -> Weather {
        self.weather
            .iter()
            .find(|span| self.frame >= span.start_frame && self.frame <= span.end_frame)
            .map(|span| span.kind)
            .unwrap_or(Weather::Sunny)
    }

    pub fn is_raining(&self) -> bool {
        self.weather_now() == Weather::Raining
    }
}
