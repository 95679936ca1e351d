use std::sync::Arc;

use shadow_taxi::collision::{Body, EntityId, EntityRef, Role};
use shadow_taxi::compute::*;
use shadow_taxi::config::{GameConfig, Layout, PassengerPlacement, Point};
use shadow_taxi::entities::*;
use shadow_taxi::trip::TripStatus;

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Defaults, minus random traffic.
fn quiet_config() -> GameConfig {
    let mut config = GameConfig::default();
    config.spawn.other_car_rate = u32::MAX;
    config.spawn.enemy_car_rate = u32::MAX;
    config
}

fn placement(x: i32, y: i32, priority: u8) -> PassengerPlacement {
    PassengerPlacement {
        x,
        y,
        priority,
        end_x: 480,
        distance_y: 300,
        has_umbrella: false,
    }
}

/// Taxi at (480, 500) with the driver already aboard, nothing else on the road.
fn state_with(config: GameConfig, passengers: Vec<PassengerPlacement>) -> WorldState {
    let layout = Layout {
        taxi: Point { x: 480, y: 500 },
        driver: Point { x: 480, y: 500 },
        passengers,
        coins: Vec::new(),
        invincible_powers: Vec::new(),
        weather: Vec::new(),
    };
    let mut state = init_state(Arc::new(config), &layout);
    state.taxi.has_driver = true;
    state.driver.in_taxi = true;
    state
}

fn make_state() -> WorldState {
    state_with(quiet_config(), Vec::new())
}

/// One passenger 50 px ahead of the idle taxi; boards after 50 frames.
fn trip_state(config: GameConfig, priority: u8) -> WorldState {
    state_with(config, vec![placement(480, 450, priority)])
}

fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

fn idle() -> FrameInput {
    FrameInput::default()
}

fn hold_up() -> FrameInput {
    FrameInput {
        up: true,
        ..Default::default()
    }
}

fn run(state: &mut WorldState, input: FrameInput, frames: usize, rng: &mut StdRng) {
    for _ in 0..frames {
        step(state, &input, rng);
    }
}

fn parked_car(state: &mut WorldState, x: i32, y: i32, health: f64, damage: f64) -> EntityId {
    let id = state.allocate_id();
    state.cars.push(Car {
        id,
        body: Body::new(EntityRef::Car(id), Role::Car, x, y, 50.0, health, damage),
        kind: CarKind::Other,
        velocity_y: 0,
    });
    id
}

fn fireball(state: &mut WorldState, x: i32, y: i32, spawned_by: EntityId) {
    let projectile = Projectile::from_spawn(ProjectileSpawn { x, y, spawned_by }, &state.config);
    state.projectiles.push(projectile);
}

fn count_effects(state: &WorldState, kind: EffectKind) -> usize {
    state.effects.iter().filter(|e| e.kind == kind).count()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ── init_state ────────────────────────────────────────────────────────────────

#[test]
fn init_state_from_default_layout() {
    let config = Arc::new(GameConfig::default());
    let s = init_state(Arc::clone(&config), &Layout::default());
    assert_eq!((s.taxi.body.x, s.taxi.body.y), (480, 500));
    assert!(!s.taxi.has_driver);
    assert!(!s.driver.in_taxi);
    assert_eq!(s.passengers.len(), 3);
    assert_eq!(s.power_ups.len(), 3);
    assert_eq!(s.power_ups[0].kind, PowerUpKind::Coin);
    assert_eq!(s.power_ups[2].kind, PowerUpKind::Invincible);
    assert_eq!(s.stats.remaining_frames, 15_000);
    assert_eq!(check_game_end(&s), None);
    assert!(s.cars.is_empty());
    assert!(s.trip.is_none());
    assert!(trip_info(&s).is_none());
}

// ── tick ──────────────────────────────────────────────────────────────────────

#[test]
fn tick_leaves_input_untouched() {
    let s = make_state();
    let mut rng = seeded_rng();
    let next = tick(&s, &idle(), &mut rng);
    assert_eq!(s.frame, 0);
    assert_eq!(next.frame, 1);
    assert_eq!(s.stats.remaining_frames, 15_000);
    assert_eq!(next.stats.remaining_frames, 14_999);
}

#[test]
fn same_seed_same_game() {
    let mut config = GameConfig::default();
    config.spawn.other_car_rate = 10;
    config.spawn.enemy_car_rate = 20;
    let mut a = state_with(config.clone(), vec![placement(360, 200, 2)]);
    let mut b = state_with(config, vec![placement(360, 200, 2)]);
    let (mut rng_a, mut rng_b) = (seeded_rng(), seeded_rng());

    for frame in 0..300 {
        let input = if frame % 3 == 0 { hold_up() } else { idle() };
        step(&mut a, &input, &mut rng_a);
        step(&mut b, &input, &mut rng_b);
    }
    assert_eq!(a.cars, b.cars);
    assert_eq!(a.projectiles, b.projectiles);
    assert_eq!(a.taxi, b.taxi);
    assert_eq!(a.passengers, b.passengers);
    assert_eq!(check_game_end(&a), check_game_end(&b));
}

// ── Taxi & driver ─────────────────────────────────────────────────────────────

#[test]
fn taxi_steers_and_left_wins() {
    let mut s = make_state();
    let mut rng = seeded_rng();
    let left_and_right = FrameInput {
        left: true,
        right: true,
        ..Default::default()
    };
    step(&mut s, &left_and_right, &mut rng);
    assert_eq!(s.taxi.body.x, 475);
    assert_eq!(s.driver.body.x, 475);

    let right = FrameInput {
        right: true,
        ..Default::default()
    };
    run(&mut s, right, 2, &mut rng);
    assert_eq!(s.taxi.body.x, 485);
    assert_eq!(s.taxi.body.y, 500);
}

#[test]
fn driverless_taxi_scrolls_with_the_road() {
    let mut s = make_state();
    s.taxi.has_driver = false;
    s.driver.in_taxi = false;
    s.driver.body.x = 100;
    s.driver.body.y = 100;
    let mut rng = seeded_rng();
    step(&mut s, &hold_up(), &mut rng);
    assert_eq!(s.taxi.body.y, 505);
    // The driver on foot walks up instead.
    assert_eq!(s.driver.body.y, 95);
}

#[test]
fn driver_boards_adjacent_taxi() {
    let mut s = make_state();
    s.taxi.has_driver = false;
    s.driver.in_taxi = false;
    s.driver.body.x = 510;
    let mut rng = seeded_rng();
    step(&mut s, &idle(), &mut rng);
    assert!(s.taxi.has_driver);
    assert!(s.driver.in_taxi);
    assert_eq!((s.driver.body.x, s.driver.body.y), (480, 500));
}

#[test]
fn driver_too_far_stays_on_foot() {
    let mut s = make_state();
    s.taxi.has_driver = false;
    s.driver.in_taxi = false;
    s.driver.body.x = 525;
    let mut rng = seeded_rng();
    step(&mut s, &idle(), &mut rng);
    assert!(!s.taxi.has_driver);
    assert!(s.driver.is_visible());
}

// ── Trips ─────────────────────────────────────────────────────────────────────

#[test]
fn clean_trip_pays_once() {
    let mut s = trip_state(quiet_config(), 2);
    let mut rng = seeded_rng();

    // The passenger walks one pixel per idle frame.
    run(&mut s, idle(), 49, &mut rng);
    assert!(s.trip.is_none());
    assert_eq!(s.passengers[0].body.y, 499);

    step(&mut s, &idle(), &mut rng);
    let trip = s.trip.as_ref().unwrap();
    assert_eq!(trip.status, TripStatus::Ongoing);
    assert_eq!((trip.flag.x, trip.flag.y), (480, 200));
    assert!(s.passengers[0].in_taxi);
    assert_eq!(s.taxi.current_passenger, Some(0));
    assert_eq!(
        trip_info(&s),
        Some(TripInfo::Current {
            expected_earnings: s.passengers[0].earnings,
            priority: 2
        })
    );

    run(&mut s, idle(), 10, &mut rng);
    assert!(s.trip.as_ref().unwrap().is_ongoing());

    // 50 frames of scrolling bring the flag to the taxi.
    run(&mut s, hold_up(), 50, &mut rng);
    assert_eq!(s.trip.as_ref().unwrap().flag.y, 450);
    assert_eq!(s.taxi.body.y, 500);
    assert_eq!(s.passengers[0].body.y, 500);

    step(&mut s, &idle(), &mut rng);
    assert!(s.passengers[0].is_moving_to_flag());
    assert!(!s.passengers[0].in_taxi);
    assert_eq!(s.stats.total_score, 0.0);
    assert_eq!(s.passengers[0].penalty, 0.0);

    step(&mut s, &idle(), &mut rng);
    assert_close(s.stats.total_score, 40.0);
    assert!(s.trip.as_ref().unwrap().is_completed());
    assert_eq!(s.taxi.current_passenger, None);
    match trip_info(&s) {
        Some(TripInfo::Last {
            earnings,
            fare,
            priority,
            penalty,
        }) => {
            assert_close(earnings, 40.0);
            assert_close(fare, 40.0);
            assert_eq!(priority, 2);
            assert_eq!(penalty, 0.0);
        }
        other => panic!("expected last-trip info, got {other:?}"),
    }

    run(&mut s, idle(), 100, &mut rng);
    assert_close(s.stats.total_score, 40.0);
    assert_eq!(s.passengers[0].phase, TripPhase::DroppedOff);
    assert_eq!((s.passengers[0].body.x, s.passengers[0].body.y), (480, 450));
    assert!(!s.trip.as_ref().unwrap().flag.active);
}

#[test]
fn overshooting_the_flag_costs_a_penalty() {
    let mut config = quiet_config();
    config.flag.radius = 30.0;
    let mut s = trip_state(config, 2);
    let mut rng = seeded_rng();

    run(&mut s, idle(), 50, &mut rng);
    run(&mut s, hold_up(), 70, &mut rng);
    assert_eq!(s.trip.as_ref().unwrap().flag.y, 550);

    step(&mut s, &idle(), &mut rng);
    assert!(s.passengers[0].is_moving_to_flag());
    assert_close(s.passengers[0].penalty, 10.0);
    assert_close(s.passengers[0].earnings, 30.0);

    step(&mut s, &idle(), &mut rng);
    assert_close(s.stats.total_score, 30.0);
    assert_close(s.trip.as_ref().unwrap().penalty, 10.0);
    match trip_info(&s) {
        Some(TripInfo::Last {
            earnings,
            fare,
            penalty,
            ..
        }) => {
            assert_close(earnings, 30.0);
            assert_close(fare, 40.0);
            assert_close(penalty, 10.0);
        }
        other => panic!("expected last-trip info, got {other:?}"),
    }
}

#[test]
fn no_second_pickup_during_a_trip() {
    let mut s = state_with(
        quiet_config(),
        vec![placement(480, 450, 2), placement(480, 560, 1)],
    );
    let mut rng = seeded_rng();
    run(&mut s, idle(), 50, &mut rng);
    assert_eq!(s.trip.as_ref().unwrap().passenger, 0);
    let waiting_y = s.passengers[1].body.y;

    run(&mut s, idle(), 20, &mut rng);
    assert_eq!(s.passengers[1].phase, TripPhase::Waiting);
    assert_eq!(s.passengers[1].body.y, waiting_y);
}

#[test]
fn moving_taxi_does_not_pick_up() {
    let mut s = trip_state(quiet_config(), 2);
    let mut rng = seeded_rng();
    let left = FrameInput {
        left: true,
        ..Default::default()
    };
    step(&mut s, &left, &mut rng);
    assert_eq!(s.passengers[0].body.y, 450);
}

#[test]
fn coin_lowers_riding_priority_once() {
    let mut s = trip_state(quiet_config(), 3);
    let mut rng = seeded_rng();
    run(&mut s, idle(), 50, &mut rng);
    assert_eq!(s.passengers[0].priority, 3);

    s.power_up_state.refresh_coin();
    run(&mut s, idle(), 10, &mut rng);
    assert_eq!(s.passengers[0].priority, 2);
    assert_close(s.passengers[0].earnings, 40.0);

    s.power_up_state.refresh_coin();
    run(&mut s, idle(), 10, &mut rng);
    assert_eq!(s.passengers[0].priority, 2);
}

// ── Taxi destruction ──────────────────────────────────────────────────────────

#[test]
fn wrecked_taxi_is_replaced_and_riders_ejected() {
    let mut s = trip_state(quiet_config(), 2);
    let mut rng = seeded_rng();
    run(&mut s, idle(), 50, &mut rng);
    let earnings = s.passengers[0].earnings;
    s.power_up_state.refresh_coin();

    parked_car(&mut s, 480, 500, 1000.0, 100.0);
    step(&mut s, &idle(), &mut rng);

    assert_ne!(s.taxi.id, 0);
    assert!(!s.taxi.has_driver);
    assert_eq!(s.taxi.body.health, s.taxi.body.max_health);
    assert!(s.config.road.lanes.contains(&s.taxi.body.x));
    assert!((200..=400).contains(&s.taxi.body.y));

    assert!(!s.driver.in_taxi);
    assert_eq!(s.driver.body.x, 430);

    let p = &s.passengers[0];
    assert_eq!(p.phase, TripPhase::Riding);
    assert!(!p.in_taxi);
    assert_eq!(p.body.x, 380);
    assert_eq!(p.earnings, earnings);

    let trip = s.trip.as_ref().unwrap();
    assert!(trip.is_ongoing());
    assert_eq!(trip.taxi, s.taxi.id);

    assert!(!s.power_up_state.is_coin_active());
    assert_eq!(count_effects(&s, EffectKind::Fire), 1);
    assert!(!has_game_ended(&s));
}

#[test]
fn ejected_passenger_reboards_new_taxi() {
    let mut s = trip_state(quiet_config(), 2);
    let mut rng = seeded_rng();
    run(&mut s, idle(), 50, &mut rng);
    parked_car(&mut s, 480, 500, 1000.0, 100.0);
    step(&mut s, &idle(), &mut rng);
    s.cars.clear();

    // Driver gets back in and pulls up just below the passenger.
    let (px, py) = (s.passengers[0].body.x, s.passengers[0].body.y);
    s.taxi.has_driver = true;
    s.driver.in_taxi = true;
    s.taxi.body.x = px;
    s.taxi.body.y = py + 10;

    run(&mut s, idle(), 9, &mut rng);
    assert!(!s.passengers[0].in_taxi);
    step(&mut s, &idle(), &mut rng);
    assert!(s.passengers[0].in_taxi);
    assert_eq!(s.taxi.current_passenger, Some(0));
    assert_eq!(s.passengers[0].phase, TripPhase::Riding);
    assert!(s.trip.as_ref().unwrap().is_ongoing());
}

#[test]
fn departing_passenger_is_not_ejected() {
    let mut s = trip_state(quiet_config(), 2);
    let mut rng = seeded_rng();
    run(&mut s, idle(), 50, &mut rng);
    run(&mut s, hold_up(), 50, &mut rng);
    step(&mut s, &idle(), &mut rng);
    assert!(s.passengers[0].is_moving_to_flag());

    // Clips the taxi's corner, clear of the passenger.
    parked_car(&mut s, 520, 560, 1000.0, 100.0);
    step(&mut s, &idle(), &mut rng);

    assert_ne!(s.taxi.id, 0);
    let p = &s.passengers[0];
    assert!(p.is_moving_to_flag());
    assert_eq!(p.body.x, 480);
    assert_close(s.stats.total_score, 40.0);
}

#[test]
fn invincible_taxi_survives_a_ram() {
    let mut s = make_state();
    let mut rng = seeded_rng();
    s.power_up_state.refresh_invincible();
    let car = parked_car(&mut s, 480, 520, 300.0, 100.0);
    step(&mut s, &idle(), &mut rng);

    assert_eq!(s.taxi.id, 0);
    assert_eq!(s.taxi.body.health, 100.0);
    assert_eq!(s.car(car).unwrap().body.health, 200.0);
}

#[test]
fn invincible_taxi_hits_a_parked_car_once() {
    let mut config = quiet_config();
    config.taxi.damage = 10.0;
    let mut s = state_with(config, Vec::new());
    let mut rng = seeded_rng();
    s.power_up_state.refresh_invincible();
    let car = parked_car(&mut s, 480, 500, 1000.0, 50.0);
    run(&mut s, idle(), 5, &mut rng);

    assert_eq!(s.taxi.id, 0);
    assert_eq!(s.taxi.body.health, 100.0);
    assert_eq!(s.car(car).unwrap().body.health, 990.0);
}

// ── Cars & fireballs ──────────────────────────────────────────────────────────

#[test]
fn car_pair_collides_once_per_frame() {
    let mut s = make_state();
    let mut rng = seeded_rng();
    let a = parked_car(&mut s, 360, 100, 100.0, 30.0);
    let b = parked_car(&mut s, 360, 130, 100.0, 30.0);
    step(&mut s, &idle(), &mut rng);

    assert_eq!(s.car(a).unwrap().body.health, 70.0);
    assert_eq!(s.car(b).unwrap().body.health, 70.0);
    assert_eq!(count_effects(&s, EffectKind::Smoke), 1);
}

#[test]
fn colliding_cars_bounce_apart_then_stall() {
    let mut s = make_state();
    let mut rng = seeded_rng();
    let a = parked_car(&mut s, 360, 100, 1000.0, 1.0);
    let b = parked_car(&mut s, 360, 130, 1000.0, 1.0);
    for car in &mut s.cars {
        car.velocity_y = 2;
    }
    step(&mut s, &idle(), &mut rng);
    run(&mut s, idle(), 15, &mut rng);

    let (ya, yb) = (s.car(a).unwrap().body.y, s.car(b).unwrap().body.y);
    assert!(yb - ya > 30);
    // Still under timeout: no driving.
    run(&mut s, idle(), 5, &mut rng);
    assert_eq!(s.car(a).unwrap().body.y, ya);
    assert_eq!(s.car(b).unwrap().body.y, yb);
}

#[test]
fn fireball_spares_its_shooter() {
    let mut s = make_state();
    let mut rng = seeded_rng();
    let shooter = parked_car(&mut s, 360, 300, 100.0, 10.0);
    let victim = parked_car(&mut s, 620, 300, 50.0, 10.0);
    fireball(&mut s, 360, 310, shooter);
    fireball(&mut s, 620, 310, shooter);

    step(&mut s, &idle(), &mut rng);
    assert_eq!(s.car(shooter).unwrap().body.health, 100.0);
    assert_eq!(s.car(victim).unwrap().body.health, 30.0);
    assert_eq!(s.projectiles.len(), 1);
    assert_eq!(s.projectiles[0].y, 300);
}

#[test]
fn fireball_outlives_its_wrecked_shooter() {
    let mut s = make_state();
    let mut rng = seeded_rng();
    let shooter = parked_car(&mut s, 360, 300, 100.0, 10.0);
    s.cars[0].kind = CarKind::Enemy {
        fireball_spawn_rate: 1,
    };
    s.cars[0].body.receive_damage(1000.0);
    let victim = parked_car(&mut s, 620, 300, 50.0, 10.0);
    fireball(&mut s, 620, 310, shooter);

    step(&mut s, &idle(), &mut rng);
    assert_eq!(s.car(victim).unwrap().body.health, 30.0);
    assert!(s.projectiles.is_empty());
}

#[test]
fn fireball_hits_passenger_before_car() {
    let mut s = state_with(quiet_config(), vec![placement(360, 300, 2)]);
    let mut rng = seeded_rng();
    let car = parked_car(&mut s, 360, 370, 50.0, 10.0);
    fireball(&mut s, 360, 345, 999);

    step(&mut s, &idle(), &mut rng);
    assert_eq!(s.passengers[0].body.health, 80.0);
    assert_eq!(s.car(car).unwrap().body.health, 50.0);
    assert!(s.projectiles.is_empty());
}

#[test]
fn fireball_hits_driver_on_foot() {
    let mut s = make_state();
    s.taxi.has_driver = false;
    s.driver.in_taxi = false;
    s.driver.body.x = 100;
    s.driver.body.y = 300;
    let mut rng = seeded_rng();
    fireball(&mut s, 100, 310, 999);
    step(&mut s, &idle(), &mut rng);
    assert_eq!(s.driver.body.health, 80.0);
}

#[test]
fn enemy_fires_every_roll_but_not_once_wrecked() {
    let mut s = make_state();
    let mut rng = seeded_rng();
    let enemy = parked_car(&mut s, 360, 300, 100.0, 10.0);
    s.cars[0].kind = CarKind::Enemy {
        fireball_spawn_rate: 1,
    };
    step(&mut s, &idle(), &mut rng);
    assert_eq!(s.projectiles.len(), 1);
    assert_eq!(s.projectiles[0].spawned_by, enemy);

    s.projectiles.clear();
    s.cars[0].body.receive_damage(1000.0);
    step(&mut s, &idle(), &mut rng);
    assert!(s.projectiles.is_empty());
    assert_eq!(count_effects(&s, EffectKind::Fire), 1);

    run(&mut s, idle(), 5, &mut rng);
    assert!(s.projectiles.is_empty());
    assert_eq!(count_effects(&s, EffectKind::Fire), 1);
}

#[test]
fn random_spawns_enter_from_the_bands() {
    let mut config = quiet_config();
    config.spawn.other_car_rate = 1;
    config.spawn.enemy_car_rate = 1;
    let mut s = state_with(config, Vec::new());
    let mut rng = seeded_rng();
    step(&mut s, &idle(), &mut rng);

    assert_eq!(s.cars.len(), 2);
    assert!(!s.cars[0].is_enemy());
    assert!(s.cars[1].is_enemy());
    assert_ne!(s.cars[0].id, s.cars[1].id);
    for car in &s.cars {
        if car.body.y == s.config.road.spawn_y_top {
            assert!(car.velocity_y > 0);
        } else {
            assert!(car.velocity_y < 0);
        }
    }
}

#[test]
fn cars_far_off_screen_are_culled() {
    let mut s = make_state();
    let mut rng = seeded_rng();
    parked_car(&mut s, 360, 878, 100.0, 10.0);
    parked_car(&mut s, 620, 860, 100.0, 10.0);
    step(&mut s, &idle(), &mut rng);
    assert_eq!(s.cars.len(), 1);
    assert_eq!(s.cars[0].body.y, 860);
}

// ── Power-ups & effects ───────────────────────────────────────────────────────

#[test]
fn staffed_taxi_collects_coin() {
    let mut s = make_state();
    let coin = PowerUp::new(PowerUpKind::Coin, 480, 520, &s.config);
    s.power_ups.push(coin);
    let mut rng = seeded_rng();
    step(&mut s, &idle(), &mut rng);
    assert!(s.power_ups[0].taken);
    assert!(s.power_up_state.is_coin_active());
}

#[test]
fn driverless_taxi_ignores_pickups() {
    let mut s = make_state();
    s.taxi.has_driver = false;
    s.driver.in_taxi = false;
    s.driver.body.x = 100;
    let shield = PowerUp::new(PowerUpKind::Invincible, 480, 500, &s.config);
    s.power_ups.push(shield);
    let mut rng = seeded_rng();
    step(&mut s, &idle(), &mut rng);
    assert!(!s.power_ups[0].taken);
    assert!(!s.power_up_state.is_invincible());
}

#[test]
fn pickups_scroll_with_the_road() {
    let mut s = make_state();
    let coin = PowerUp::new(PowerUpKind::Coin, 620, 100, &s.config);
    s.power_ups.push(coin);
    let mut rng = seeded_rng();
    run(&mut s, hold_up(), 4, &mut rng);
    assert_eq!(s.power_ups[0].y, 120);
}

#[test]
fn coin_effect_runs_out() {
    let mut config = quiet_config();
    config.coin.max_frames = 5;
    let mut s = state_with(config, Vec::new());
    let mut rng = seeded_rng();
    s.power_up_state.refresh_coin();
    run(&mut s, idle(), 6, &mut rng);
    assert!(s.power_up_state.is_coin_active());
    step(&mut s, &idle(), &mut rng);
    assert!(!s.power_up_state.is_coin_active());
}

#[test]
fn effects_fade() {
    let mut s = make_state();
    let smoke = Effect::new(EffectKind::Smoke, 10, 10, &s.config);
    s.effects.push(smoke);
    let mut rng = seeded_rng();
    run(&mut s, idle(), 19, &mut rng);
    assert_eq!(s.effects.len(), 1);
    step(&mut s, &idle(), &mut rng);
    assert!(s.effects.is_empty());
}

// ── Weather ───────────────────────────────────────────────────────────────────

#[test]
fn rain_overrides_priority_while_it_lasts() {
    let wet = placement(100, 100, 3);
    let mut dry = placement(700, 100, 3);
    dry.has_umbrella = true;
    let mut s = state_with(quiet_config(), vec![wet, dry]);
    s.weather = vec![WeatherSpan {
        kind: Weather::Raining,
        start_frame: 0,
        end_frame: 10,
    }];
    let mut rng = seeded_rng();

    step(&mut s, &idle(), &mut rng);
    assert_eq!(s.passengers[0].priority, 1);
    assert_eq!(s.passengers[1].priority, 3);

    run(&mut s, idle(), 11, &mut rng);
    assert!(!s.is_raining());
    assert_eq!(s.passengers[0].priority, 3);
}

// ── Game end ──────────────────────────────────────────────────────────────────

#[test]
fn game_ends_when_frames_run_out() {
    let mut config = quiet_config();
    config.game.max_frames = 3;
    let mut s = state_with(config, Vec::new());
    let mut rng = seeded_rng();
    run(&mut s, idle(), 2, &mut rng);
    assert!(!has_game_ended(&s));
    step(&mut s, &idle(), &mut rng);
    assert_eq!(check_game_end(&s), Some(GameEnd::FramesExhausted));

    // Stopping is the caller's call; stepping on keeps counting.
    run(&mut s, hold_up(), 5, &mut rng);
    assert_eq!(s.frame, 8);
    assert_eq!(s.stats.remaining_frames, -5);
    assert_eq!(check_game_end(&s), Some(GameEnd::FramesExhausted));
}

#[test]
fn game_ends_on_target_score() {
    let mut s = make_state();
    s.stats.total_score = s.stats.target_score;
    let mut rng = seeded_rng();
    step(&mut s, &idle(), &mut rng);
    assert_eq!(check_game_end(&s), Some(GameEnd::TargetReached));
}

#[test]
fn game_ends_when_driver_dies() {
    let mut s = make_state();
    s.driver.in_taxi = false;
    s.driver.body.receive_damage(1000.0);
    let mut rng = seeded_rng();
    step(&mut s, &idle(), &mut rng);
    assert_eq!(check_game_end(&s), Some(GameEnd::DriverDead));
    assert_eq!(count_effects(&s, EffectKind::Blood), 1);
}

#[test]
fn game_ends_when_a_passenger_dies() {
    let mut s = state_with(quiet_config(), vec![placement(100, 100, 1)]);
    s.passengers[0].body.receive_damage(1000.0);
    let mut rng = seeded_rng();
    step(&mut s, &idle(), &mut rng);
    assert_eq!(check_game_end(&s), Some(GameEnd::PassengerDead));
}

#[test]
fn game_ends_when_taxi_is_abandoned() {
    let mut s = make_state();
    s.taxi.has_driver = false;
    s.driver.in_taxi = false;
    s.driver.body.x = 100;
    s.taxi.body.y = 765;
    let mut rng = seeded_rng();
    step(&mut s, &hold_up(), &mut rng);
    assert_eq!(check_game_end(&s), Some(GameEnd::TaxiAbandoned));
}

#[test]
fn deaths_outrank_limits() {
    let mut config = quiet_config();
    config.game.max_frames = 1;
    let mut s = state_with(config, Vec::new());
    s.driver.in_taxi = false;
    s.driver.body.receive_damage(1000.0);
    assert_eq!(check_game_end(&s), Some(GameEnd::DriverDead));
    s.driver.body.receive_damage(-1000.0);
    s.stats.remaining_frames = 0;
    assert_eq!(check_game_end(&s), Some(GameEnd::FramesExhausted));
}
