//! Tunable game configuration and level layout, loaded from TOML.
//!
//! [`GameConfig`] mirrors every constant the simulation reads.  Each section
//! carries `#[serde(default)]`, so a TOML file only needs the keys it wants to
//! override:
//!
//! ```toml
//! seed = 7
//!
//! [trip]
//! rate_per_y = 0.1
//! priority_bonus = [20.0, 10.0, 5.0]
//! ```
//!
//! Entities copy what they need out of the config when they are constructed
//! and never look at it again, so a config must be fully validated before the
//! first frame.  [`GameConfig::load`] and [`GameConfig::from_toml_str`] always
//! validate; a hand-built config should go through [`GameConfig::validate`].

use std::path::Path;

use serde::Deserialize;

use crate::entities::{Weather, WeatherSpan};
use crate::error::{
    require_non_negative, require_nonzero, require_positive, require_range, ConfigError,
    ConfigResult,
};

// ── Sections ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: i32,
    pub height: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    /// Centre x-coordinate of each of the three lanes.
    pub lanes: [i32; 3],
    /// Pixels the world moves down per frame while the player scrolls.
    pub scroll_speed: i32,
    /// Spawn y for cars entering from above the screen.
    pub spawn_y_top: i32,
    /// Spawn y for cars entering from below the screen.
    pub spawn_y_bottom: i32,
    /// Cars further than this beyond either spawn band are dropped.
    pub cull_margin: i32,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self {
            lanes: [360, 480, 620],
            scroll_speed: 5,
            spawn_y_top: -50,
            spawn_y_bottom: 768,
            cull_margin: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaxiConfig {
    pub radius: f64,
    pub health: f64,
    pub damage: f64,
    pub speed_x: i32,
    /// Vertical range a replacement taxi is dropped into.
    pub respawn_min_y: i32,
    pub respawn_max_y: i32,
}

impl Default for TaxiConfig {
    fn default() -> Self {
        Self {
            radius: 30.0,
            health: 100.0,
            damage: 100.0,
            speed_x: 5,
            respawn_min_y: 200,
            respawn_max_y: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub radius: f64,
    pub health: f64,
    pub walk_speed_x: i32,
    pub walk_speed_y: i32,
    pub taxi_get_in_radius: f64,
    pub eject_offset_x: i32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            radius: 20.0,
            health: 100.0,
            walk_speed_x: 5,
            walk_speed_y: 5,
            taxi_get_in_radius: 40.0,
            eject_offset_x: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PassengerConfig {
    /// Collision footprint against cars and fireballs.
    pub radius: f64,
    /// How close an idle taxi must be for the passenger to walk over.
    pub detect_radius: f64,
    pub health: f64,
    pub walk_speed_x: i32,
    pub walk_speed_y: i32,
    pub eject_offset_x: i32,
}

impl Default for PassengerConfig {
    fn default() -> Self {
        Self {
            radius: 20.0,
            detect_radius: 100.0,
            health: 100.0,
            walk_speed_x: 1,
            walk_speed_y: 1,
            eject_offset_x: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OtherCarConfig {
    pub radius: f64,
    pub health: f64,
    pub damage: f64,
    pub min_speed_y: i32,
    pub max_speed_y: i32,
}

impl Default for OtherCarConfig {
    fn default() -> Self {
        Self {
            radius: 50.0,
            health: 50.0,
            damage: 50.0,
            min_speed_y: 2,
            max_speed_y: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnemyCarConfig {
    pub radius: f64,
    pub health: f64,
    pub damage: f64,
    pub min_speed_y: i32,
    pub max_speed_y: i32,
    /// One in `fireball_spawn_rate`-ish chance per frame, see [`SpawnConfig::roll_max`].
    pub fireball_spawn_rate: u32,
}

impl Default for EnemyCarConfig {
    fn default() -> Self {
        Self {
            radius: 50.0,
            health: 100.0,
            damage: 100.0,
            min_speed_y: 2,
            max_speed_y: 5,
            fireball_spawn_rate: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FireballConfig {
    pub radius: f64,
    pub damage: f64,
    pub speed_y: i32,
}

impl Default for FireballConfig {
    fn default() -> Self {
        Self {
            radius: 20.0,
            damage: 20.0,
            speed_y: 10,
        }
    }
}

/// Random spawn checks roll `1..=roll_max` and succeed when the roll is a
/// multiple of the rate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub other_car_rate: u32,
    pub enemy_car_rate: u32,
    pub roll_max: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            other_car_rate: 200,
            enemy_car_rate: 400,
            roll_max: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoinConfig {
    pub radius: f64,
    pub max_frames: u32,
}

impl Default for CoinConfig {
    fn default() -> Self {
        Self {
            radius: 30.0,
            max_frames: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InvincibleConfig {
    pub radius: f64,
    pub max_frames: u32,
}

impl Default for InvincibleConfig {
    fn default() -> Self {
        Self {
            radius: 30.0,
            max_frames: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TripConfig {
    pub rate_per_y: f64,
    /// Flat bonus for priority 1, 2 and 3 respectively.
    pub priority_bonus: [f64; 3],
    pub penalty_per_y: f64,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            rate_per_y: 0.1,
            priority_bonus: [20.0, 10.0, 5.0],
            penalty_per_y: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FlagConfig {
    pub radius: f64,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self { radius: 50.0 }
    }
}

/// Lifetime in frames of each temporary visual effect.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub smoke_ttl: u32,
    pub fire_ttl: u32,
    pub blood_ttl: u32,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            smoke_ttl: 20,
            fire_ttl: 20,
            blood_ttl: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GameRulesConfig {
    pub max_frames: u32,
    pub target_score: f64,
}

impl Default for GameRulesConfig {
    fn default() -> Self {
        Self {
            max_frames: 15_000,
            target_score: 500.0,
        }
    }
}

// ── GameConfig ────────────────────────────────────────────────────────────────

/// Every tunable the simulation reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seed for the simulation RNG.  `None` means "seed from entropy".
    pub seed: Option<u64>,
    pub window: WindowConfig,
    pub road: RoadConfig,
    pub taxi: TaxiConfig,
    pub driver: DriverConfig,
    pub passenger: PassengerConfig,
    pub other_car: OtherCarConfig,
    pub enemy_car: EnemyCarConfig,
    pub fireball: FireballConfig,
    pub spawn: SpawnConfig,
    pub coin: CoinConfig,
    pub invincible: InvincibleConfig,
    pub trip: TripConfig,
    pub flag: FlagConfig,
    pub effects: EffectsConfig,
    pub game: GameRulesConfig,
}

impl GameConfig {
    /// Parse and validate a config from TOML text.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: GameConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!(path = %path.display(), "loaded game config");
        Ok(config)
    }

    /// Reject values that would make a random draw empty, a spawn check
    /// divide by zero, or an entity spawn already destroyed.
    pub fn validate(&self) -> ConfigResult<()> {
        require_positive("window.width", self.window.width as f64)?;
        require_positive("window.height", self.window.height as f64)?;
        require_non_negative("road.scroll_speed", self.road.scroll_speed as f64)?;
        require_non_negative("road.cull_margin", self.road.cull_margin as f64)?;

        require_positive("taxi.radius", self.taxi.radius)?;
        require_positive("taxi.health", self.taxi.health)?;
        require_non_negative("taxi.damage", self.taxi.damage)?;
        require_range(
            "taxi.respawn_min_y",
            self.taxi.respawn_min_y,
            self.taxi.respawn_max_y,
        )?;

        require_positive("driver.radius", self.driver.radius)?;
        require_positive("driver.health", self.driver.health)?;
        require_positive("driver.taxi_get_in_radius", self.driver.taxi_get_in_radius)?;

        require_positive("passenger.radius", self.passenger.radius)?;
        require_positive("passenger.detect_radius", self.passenger.detect_radius)?;
        require_positive("passenger.health", self.passenger.health)?;
        require_positive("passenger.walk_speed_x", self.passenger.walk_speed_x as f64)?;
        require_positive("passenger.walk_speed_y", self.passenger.walk_speed_y as f64)?;

        require_positive("other_car.radius", self.other_car.radius)?;
        require_positive("other_car.health", self.other_car.health)?;
        require_non_negative("other_car.damage", self.other_car.damage)?;
        require_range(
            "other_car.min_speed_y",
            self.other_car.min_speed_y,
            self.other_car.max_speed_y,
        )?;

        require_positive("enemy_car.radius", self.enemy_car.radius)?;
        require_positive("enemy_car.health", self.enemy_car.health)?;
        require_non_negative("enemy_car.damage", self.enemy_car.damage)?;
        require_range(
            "enemy_car.min_speed_y",
            self.enemy_car.min_speed_y,
            self.enemy_car.max_speed_y,
        )?;
        require_nonzero("enemy_car.fireball_spawn_rate", self.enemy_car.fireball_spawn_rate)?;

        require_positive("fireball.radius", self.fireball.radius)?;
        require_non_negative("fireball.damage", self.fireball.damage)?;

        require_nonzero("spawn.other_car_rate", self.spawn.other_car_rate)?;
        require_nonzero("spawn.enemy_car_rate", self.spawn.enemy_car_rate)?;
        require_nonzero("spawn.roll_max", self.spawn.roll_max)?;

        require_positive("coin.radius", self.coin.radius)?;
        require_positive("invincible.radius", self.invincible.radius)?;

        require_non_negative("trip.rate_per_y", self.trip.rate_per_y)?;
        for bonus in self.trip.priority_bonus {
            require_non_negative("trip.priority_bonus", bonus)?;
        }
        require_non_negative("trip.penalty_per_y", self.trip.penalty_per_y)?;
        require_positive("flag.radius", self.flag.radius)?;

        require_nonzero("game.max_frames", self.game.max_frames)?;
        require_non_negative("game.target_score", self.game.target_score)?;
        Ok(())
    }
}

// ── Layout ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PassengerPlacement {
    pub x: i32,
    pub y: i32,
    pub priority: u8,
    /// x-coordinate of the trip-end flag.
    pub end_x: i32,
    /// How far up the road (in pixels) the trip-end flag sits from pickup.
    pub distance_y: i32,
    #[serde(default)]
    pub has_umbrella: bool,
}

/// Starting positions of everything that is not spawned at random.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub taxi: Point,
    pub driver: Point,
    pub passengers: Vec<PassengerPlacement>,
    pub coins: Vec<Point>,
    pub invincible_powers: Vec<Point>,
    pub weather: Vec<WeatherSpan>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            taxi: Point { x: 480, y: 500 },
            driver: Point { x: 460, y: 520 },
            passengers: vec![
                PassengerPlacement {
                    x: 250,
                    y: 300,
                    priority: 2,
                    end_x: 620,
                    distance_y: 800,
                    has_umbrella: false,
                },
                PassengerPlacement {
                    x: 760,
                    y: -900,
                    priority: 3,
                    end_x: 360,
                    distance_y: 1200,
                    has_umbrella: true,
                },
                PassengerPlacement {
                    x: 250,
                    y: -2600,
                    priority: 1,
                    end_x: 480,
                    distance_y: 1500,
                    has_umbrella: false,
                },
            ],
            coins: vec![Point { x: 480, y: -400 }, Point { x: 360, y: -2000 }],
            invincible_powers: vec![Point { x: 620, y: -1200 }],
            weather: vec![
                WeatherSpan {
                    kind: Weather::Sunny,
                    start_frame: 0,
                    end_frame: 3000,
                },
                WeatherSpan {
                    kind: Weather::Raining,
                    start_frame: 3001,
                    end_frame: 6000,
                },
                WeatherSpan {
                    kind: Weather::Sunny,
                    start_frame: 6001,
                    end_frame: u64::MAX,
                },
            ],
        }
    }
}

impl Layout {
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let layout: Layout = toml::from_str(contents)?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let layout = Self::from_toml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            passengers = layout.passengers.len(),
            "loaded level layout"
        );
        Ok(layout)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for placement in &self.passengers {
            if !(1..=3).contains(&placement.priority) {
                return Err(ConfigError::Invalid {
                    field: "passengers.priority",
                    value: placement.priority.to_string(),
                    reason: "priority must be 1, 2 or 3",
                });
            }
            require_non_negative("passengers.distance_y", placement.distance_y as f64)?;
        }
        for span in &self.weather {
            if span.start_frame > span.end_frame {
                return Err(ConfigError::Invalid {
                    field: "weather.start_frame",
                    value: format!("{}..={}", span.start_frame, span.end_frame),
                    reason: "a weather span must not end before it starts",
                });
            }
        }
        Ok(())
    }
}
