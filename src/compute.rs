//! Per-frame game logic.
//!
//! [`tick`] takes an immutable reference to the current [`WorldState`] and
//! hands back a new one; [`step`] does the same work in place.  Side effects
//! are limited to the injected RNG and `tracing` events.
//!
//! Stepping never stops on its own.  The end-of-game predicates are polled by
//! the caller, which decides when to stop calling [`step`].
//!
//! The frame runs in a fixed order.  The order is observable: a car that
//! collides with the taxi this frame can still be hit by a fireball later in
//! the same frame.

use std::sync::Arc;

use rand::Rng;

use crate::collision::{CollisionMemo, EntityRef};
use crate::config::{GameConfig, Layout};
use crate::entities::{
    can_spawn, Car, Driver, Effect, EffectKind, FrameInput, GameEnd, GameStats,
    Passenger, PowerUp, PowerUpKind, Projectile, Taxi, TripPhase, WorldState,
};
use crate::powerup::PowerUpState;
use crate::trip::Trip;

// ── Constructors ─────────────────────────────────────────────────────────────

/// Build the opening state: taxi and driver at their start points, passengers
/// and pickups from the layout, no traffic yet.
pub fn init_state(config: Arc<GameConfig>, layout: &Layout) -> WorldState {
    let taxi = Taxi::new(0, layout.taxi.x, layout.taxi.y, &config);
    let driver = Driver::new(layout.driver.x, layout.driver.y, &config);
    let passengers = layout
        .passengers
        .iter()
        .enumerate()
        .map(|(index, placement)| Passenger::new(index, placement, &config))
        .collect();

    let coins = layout
        .coins
        .iter()
        .map(|p| PowerUp::new(PowerUpKind::Coin, p.x, p.y, &config));
    let shields = layout
        .invincible_powers
        .iter()
        .map(|p| PowerUp::new(PowerUpKind::Invincible, p.x, p.y, &config));
    let power_ups = coins.chain(shields).collect();

    WorldState {
        taxi,
        driver,
        passengers,
        cars: Vec::new(),
        projectiles: Vec::new(),
        power_ups,
        effects: Vec::new(),
        power_up_state: PowerUpState::new(&config),
        trip: None,
        weather: layout.weather.clone(),
        stats: GameStats {
            total_score: 0.0,
            remaining_frames: i64::from(config.game.max_frames),
            target_score: config.game.target_score,
        },
        frame: 0,
        next_id: 1,
        config,
    }
}

// ── Per-frame tick ───────────────────────────────────────────────────────────

/// Advance the simulation by one frame.  All randomness comes through `rng`
/// so callers control determinism.
pub fn tick(state: &WorldState, input: &FrameInput, rng: &mut impl Rng) -> WorldState {
    let mut next = state.clone();
    step(&mut next, input, rng);
    next
}

/// In-place version of [`tick`].
pub fn step(state: &mut WorldState, input: &FrameInput, rng: &mut impl Rng) {
    let mut memo = CollisionMemo::default();

    // ── 1. Scroll the flag, pickups and effects ──────────────────────────────
    scroll_world(state, input);

    // ── 2. Close the trip once the passenger heads for the flag ─────────────
    complete_trip(state);

    // ── 3. Taxi, then driver ─────────────────────────────────────────────────
    update_taxi(state, input);
    update_driver(state, input);

    // ── 4. Cars against taxi, driver and passengers ──────────────────────────
    advance_cars(state, rng);
    resolve_car_hits(state, &mut memo);

    // ── 5. Cars against each other ───────────────────────────────────────────
    resolve_car_pairs(state, &mut memo);
    report_wrecks(state);

    // ── 6. Fireballs, then pickups ───────────────────────────────────────────
    update_projectiles(state);
    report_wrecks(state);
    collect_power_ups(state);

    // ── 7. Replace a wrecked taxi ────────────────────────────────────────────
    replace_destroyed_taxi(state, rng);

    // ── 8. New traffic ───────────────────────────────────────────────────────
    spawn_cars(state, rng);

    // ── 9. Boarding ──────────────────────────────────────────────────────────
    reenter_taxi(state);

    // ── 10. Passengers, timers, separation, bookkeeping ──────────────────────
    update_passengers(state, input);
    state.power_up_state.update();
    state.taxi.body.update_timeouts();
    state.driver.body.update_timeouts();
    for passenger in &mut state.passengers {
        passenger.body.update_timeouts();
    }
    separate_people(state);
    age_effects(state);
    cull_cars(state);

    state.stats.remaining_frames -= 1;
    state.frame += 1;
}

// ── Game-end predicates ──────────────────────────────────────────────────────

pub fn is_out_of_frames(state: &WorldState) -> bool {
    state.stats.remaining_frames <= 0
}

pub fn is_target_reached(state: &WorldState) -> bool {
    state.stats.total_score >= state.stats.target_score
}

/// A taxi nobody is driving has scrolled off the bottom of the screen.
pub fn is_taxi_abandoned(state: &WorldState) -> bool {
    !state.taxi.has_driver && state.taxi.body.y > state.config.window.height
}

pub fn is_driver_dead(state: &WorldState) -> bool {
    state.driver.body.is_destroyed()
}

pub fn is_any_passenger_dead(state: &WorldState) -> bool {
    state.passengers.iter().any(|p| p.body.is_destroyed())
}

/// First end condition that holds, deaths before limits.
pub fn check_game_end(state: &WorldState) -> Option<GameEnd> {
    if is_driver_dead(state) {
        Some(GameEnd::DriverDead)
    } else if is_any_passenger_dead(state) {
        Some(GameEnd::PassengerDead)
    } else if is_target_reached(state) {
        Some(GameEnd::TargetReached)
    } else if is_out_of_frames(state) {
        Some(GameEnd::FramesExhausted)
    } else if is_taxi_abandoned(state) {
        Some(GameEnd::TaxiAbandoned)
    } else {
        None
    }
}

pub fn has_game_ended(state: &WorldState) -> bool {
    check_game_end(state).is_some()
}

// ── Trip readout ─────────────────────────────────────────────────────────────

/// What the HUD shows about the current or most recent trip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TripInfo {
    Current {
        expected_earnings: f64,
        priority: u8,
    },
    Last {
        /// What was actually paid.
        earnings: f64,
        /// The paid amount with the penalty added back; this is the figure
        /// the "last trip" readout shows next to the penalty.
        fare: f64,
        priority: u8,
        penalty: f64,
    },
}

pub fn trip_info(state: &WorldState) -> Option<TripInfo> {
    let trip = state.trip.as_ref()?;
    let passenger = state.passengers.get(trip.passenger)?;
    if trip.is_completed() {
        Some(TripInfo::Last {
            earnings: passenger.earnings,
            fare: passenger.earnings + trip.penalty,
            priority: passenger.priority,
            penalty: trip.penalty,
        })
    } else if trip.is_ongoing() {
        Some(TripInfo::Current {
            expected_earnings: passenger.earnings,
            priority: passenger.priority,
        })
    } else {
        None
    }
}

// ── Steps ────────────────────────────────────────────────────────────────────

fn scroll_world(state: &mut WorldState, input: &FrameInput) {
    if !input.scrolls() {
        return;
    }
    let speed = state.config.road.scroll_speed;
    if let Some(trip) = state.trip.as_mut() {
        if trip.flag.active {
            trip.flag.y += speed;
        }
    }
    for power_up in &mut state.power_ups {
        power_up.y += speed;
    }
    for effect in &mut state.effects {
        effect.y += speed;
    }
}

fn complete_trip(state: &mut WorldState) {
    let Some(trip) = state.trip.as_mut() else {
        return;
    };
    if trip.is_completed() {
        return;
    }
    let Some(passenger) = state.passengers.get_mut(trip.passenger) else {
        return;
    };
    if passenger.is_moving_to_flag() || passenger.is_dropped_off() {
        trip.complete(passenger, &mut state.stats);
    }
}

fn update_taxi(state: &mut WorldState, input: &FrameInput) {
    // Forget a passenger who has stepped out.
    if let Some(index) = state.taxi.current_passenger {
        let left = state
            .passengers
            .get(index)
            .map_or(true, |p| p.is_moving_to_flag() || p.is_dropped_off() || !p.in_taxi);
        if left {
            state.taxi.current_passenger = None;
        }
    }

    let taxi = &mut state.taxi;
    if !taxi.has_driver {
        if input.scrolls() {
            taxi.body.y += state.config.road.scroll_speed;
        }
        return;
    }

    let moved = if input.left {
        taxi.body.x -= taxi.speed_x;
        true
    } else if input.right {
        taxi.body.x += taxi.speed_x;
        true
    } else {
        input.scrolls()
    };
    if moved {
        return;
    }

    // Stationary and staffed: serve passengers.
    match state.taxi.current_passenger {
        None => pick_up(state),
        Some(index) => {
            drop_off(state, index);
            check_penalty(state, index);
        }
    }
}

/// An adjacent waiting passenger walks one step toward the idle taxi and
/// starts a trip on arrival.
fn pick_up(state: &mut WorldState) {
    if state.trip.as_ref().is_some_and(Trip::is_ongoing) {
        return;
    }
    let (taxi_x, taxi_y) = (state.taxi.body.x, state.taxi.body.y);
    let Some(index) = state.passengers.iter().position(|p| {
        p.phase == TripPhase::Waiting
            && !p.body.is_destroyed()
            && state.taxi.body.distance_to(p.body.x, p.body.y) <= p.detect_radius
    }) else {
        return;
    };

    let passenger = &mut state.passengers[index];
    if !passenger.step_towards(taxi_x, taxi_y) {
        return;
    }
    passenger.phase = TripPhase::Riding;
    passenger.in_taxi = true;
    state.taxi.current_passenger = Some(index);

    let mut trip = Trip::new(state.taxi.id, index, passenger, &state.config);
    trip.begin(passenger, &state.power_up_state, &state.config.trip);
    state.trip = Some(trip);
}

fn drop_off(state: &mut WorldState, index: usize) {
    let Some(trip) = state.trip.as_ref().filter(|t| t.passenger == index) else {
        return;
    };
    let flag = &trip.flag;
    let taxi = &state.taxi.body;
    let at_flag = taxi.y <= flag.y || taxi.distance_to(flag.x, flag.y) <= flag.radius;
    if !at_flag {
        return;
    }
    let Some(passenger) = state.passengers.get_mut(index) else {
        return;
    };
    if passenger.phase == TripPhase::Riding && passenger.in_taxi {
        passenger.phase = TripPhase::Departing {
            target_x: flag.x,
            target_y: flag.y,
        };
        passenger.in_taxi = false;
        tracing::info!(passenger = index, "passenger left the taxi");
    }
}

fn check_penalty(state: &mut WorldState, index: usize) {
    let Some(trip) = state.trip.as_mut().filter(|t| t.passenger == index) else {
        return;
    };
    if let Some(passenger) = state.passengers.get_mut(index) {
        trip.check_penalty(&state.taxi, passenger, &state.config.trip);
    }
}

fn update_driver(state: &mut WorldState, input: &FrameInput) {
    let driver = &mut state.driver;
    if driver.in_taxi {
        driver.body.x = state.taxi.body.x;
        driver.body.y = state.taxi.body.y;
    } else {
        driver.walk(input);
    }
}

/// Drive every car, then commit the fireballs enemy cars asked for.
fn advance_cars(state: &mut WorldState, rng: &mut impl Rng) {
    let roll_max = state.config.spawn.roll_max;
    let mut spawns = Vec::new();
    for i in 0..state.cars.len() {
        let last_hit_at = state.cars[i]
            .body
            .last_collided_with
            .and_then(|other| state.position_of(other));
        let car = &mut state.cars[i];
        car.advance(last_hit_at);
        if let Some(spawn) = car.try_fire(rng, roll_max) {
            spawns.push(spawn);
        }
    }
    for spawn in spawns {
        tracing::debug!(car = spawn.spawned_by, x = spawn.x, y = spawn.y, "fireball spawned");
        state.projectiles.push(Projectile::from_spawn(spawn, &state.config));
    }
}

fn resolve_car_hits(state: &mut WorldState, memo: &mut CollisionMemo) {
    for ci in 0..state.cars.len() {
        let car_ref = EntityRef::Car(state.cars[ci].id);

        let taxi_ref = state.taxi.body.tag;
        if !memo.contains(taxi_ref, car_ref)
            && state.taxi.handle_collision(&mut state.cars[ci], &state.power_up_state)
        {
            memo.record(taxi_ref, car_ref);
            let (x, y) = (state.taxi.body.x, state.taxi.body.y);
            state.effects.push(Effect::new(EffectKind::Smoke, x, y, &state.config));
        }

        if !memo.contains(EntityRef::Driver, car_ref)
            && state.driver.handle_collision(&mut state.cars[ci], &state.power_up_state)
        {
            memo.record(EntityRef::Driver, car_ref);
            let (x, y) = (state.driver.body.x, state.driver.body.y);
            state.effects.push(Effect::new(EffectKind::Smoke, x, y, &state.config));
        }

        for passenger in &mut state.passengers {
            let passenger_ref = passenger.body.tag;
            if !memo.contains(passenger_ref, car_ref) && passenger.handle_collision(&mut state.cars[ci]) {
                memo.record(passenger_ref, car_ref);
                let (x, y) = (passenger.body.x, passenger.body.y);
                state.effects.push(Effect::new(EffectKind::Smoke, x, y, &state.config));
            }
        }
    }
}

/// Every ordered pair is tried, but a pair that already collided this frame
/// is skipped from the other side.
fn resolve_car_pairs(state: &mut WorldState, memo: &mut CollisionMemo) {
    let count = state.cars.len();
    for i in 0..count {
        for j in 0..count {
            if i == j {
                continue;
            }
            let (a, b) = pair_mut(&mut state.cars, i, j);
            let (a_ref, b_ref) = (a.body.tag, b.body.tag);
            if memo.contains(a_ref, b_ref) {
                continue;
            }
            if a.handle_collision(b) {
                memo.record(a_ref, b_ref);
                let (x, y) = (a.body.x, a.body.y);
                state.effects.push(Effect::new(EffectKind::Smoke, x, y, &state.config));
            }
        }
    }
}

fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(i, j);
    if i < j {
        let (left, right) = items.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

/// Fire for cars, blood for people, once each.  The taxi is handled when it
/// gets replaced.
fn report_wrecks(state: &mut WorldState) {
    for car in &mut state.cars {
        if car.body.take_wreck_report() {
            tracing::debug!(car = car.id, "car destroyed");
            state
                .effects
                .push(Effect::new(EffectKind::Fire, car.body.x, car.body.y, &state.config));
        }
    }
    if state.driver.body.take_wreck_report() {
        tracing::info!("driver killed");
        let (x, y) = (state.driver.body.x, state.driver.body.y);
        state.effects.push(Effect::new(EffectKind::Blood, x, y, &state.config));
    }
    for (index, passenger) in state.passengers.iter_mut().enumerate() {
        if passenger.body.take_wreck_report() {
            tracing::info!(passenger = index, "passenger killed");
            state.effects.push(Effect::new(
                EffectKind::Blood,
                passenger.body.x,
                passenger.body.y,
                &state.config,
            ));
        }
    }
}

/// Move fireballs and apply the first hit of each: passengers, then cars
/// other than the shooter, then the driver, then the taxi.
fn update_projectiles(state: &mut WorldState) {
    for projectile in &mut state.projectiles {
        projectile.y -= projectile.speed_y;
        if projectile.is_spent() {
            continue;
        }

        if let Some(passenger) = state
            .passengers
            .iter_mut()
            .find(|p| p.is_visible() && projectile.touches(&p.body))
        {
            passenger.body.receive_damage(projectile.damage);
            projectile.collided = true;
            tracing::debug!(hit = ?passenger.body.tag, health = passenger.body.health, "fireball hit");
            continue;
        }

        if let Some(car) = state.cars.iter_mut().find(|c| {
            c.id != projectile.spawned_by && c.is_visible() && projectile.touches(&c.body)
        }) {
            car.body.receive_damage(projectile.damage);
            projectile.collided = true;
            tracing::debug!(hit = ?car.body.tag, health = car.body.health, "fireball hit");
            continue;
        }

        if state.driver.is_visible() && projectile.touches(&state.driver.body) {
            state.driver.body.receive_damage(projectile.damage);
            projectile.collided = true;
            tracing::debug!(hit = "driver", health = state.driver.body.health, "fireball hit");
            continue;
        }

        if state.taxi.is_visible() && projectile.touches(&state.taxi.body) {
            state.taxi.body.receive_damage(projectile.damage);
            projectile.collided = true;
            tracing::debug!(hit = "taxi", health = state.taxi.body.health, "fireball hit");
        }
    }
    state.projectiles.retain(|p| !p.is_spent());
}

/// Pickups are taken by a staffed taxi or by the driver on foot.
fn collect_power_ups(state: &mut WorldState) {
    for power_up in state.power_ups.iter_mut().filter(|p| !p.taken) {
        let by_taxi = state.taxi.has_driver && power_up.touches(&state.taxi.body);
        let by_driver = state.driver.is_visible() && power_up.touches(&state.driver.body);
        if by_taxi || by_driver {
            state.power_up_state.activate(power_up);
        }
    }
}

fn replace_destroyed_taxi(state: &mut WorldState, rng: &mut impl Rng) {
    if !state.taxi.body.is_destroyed() {
        return;
    }
    let (x, y) = (state.taxi.body.x, state.taxi.body.y);
    state.effects.push(Effect::new(EffectKind::Fire, x, y, &state.config));

    if state.driver.in_taxi {
        state.driver.eject();
        tracing::info!(x = state.driver.body.x, y = state.driver.body.y, "driver ejected");
    }
    if let Some(index) = state.taxi.current_passenger {
        if let Some(passenger) = state.passengers.get_mut(index) {
            if passenger.phase == TripPhase::Riding && passenger.in_taxi {
                passenger.eject();
                tracing::info!(passenger = index, "passenger ejected");
            }
        }
    }
    state.power_up_state.reset();

    let id = state.allocate_id();
    let lanes = state.config.road.lanes;
    let lane = lanes[rng.gen_range(0..lanes.len())];
    let respawn_y = rng.gen_range(state.config.taxi.respawn_min_y..=state.config.taxi.respawn_max_y);
    state.taxi = Taxi::new(id, lane, respawn_y, &state.config);

    if let Some(trip) = state.trip.as_mut().filter(|t| t.is_ongoing()) {
        trip.rebind_taxi(id);
    }
    tracing::info!(old_x = x, old_y = y, taxi = id, x = lane, y = respawn_y, "taxi destroyed and replaced");
}

fn spawn_cars(state: &mut WorldState, rng: &mut impl Rng) {
    let spawn = &state.config.spawn;
    let (other_rate, enemy_rate, roll_max) = (spawn.other_car_rate, spawn.enemy_car_rate, spawn.roll_max);

    if can_spawn(rng, other_rate, roll_max) {
        spawn_car(state, false, rng);
    }
    if can_spawn(rng, enemy_rate, roll_max) {
        spawn_car(state, true, rng);
    }
}

fn spawn_car(state: &mut WorldState, enemy: bool, rng: &mut impl Rng) {
    let id = state.allocate_id();
    let car = Car::spawn(id, enemy, &state.config, rng);
    tracing::debug!(car = id, enemy, x = car.body.x, y = car.body.y, velocity_y = car.velocity_y, "car spawned");
    state.cars.push(car);
}

/// The driver climbs into a driverless taxi they are standing next to; an
/// ejected passenger walks back to a staffed, empty taxi and climbs in.
fn reenter_taxi(state: &mut WorldState) {
    let taxi = &mut state.taxi;
    let driver = &mut state.driver;
    if !taxi.has_driver && !driver.in_taxi && !driver.body.is_destroyed() && driver.is_adjacent_to(taxi) {
        taxi.has_driver = true;
        driver.in_taxi = true;
        driver.body.x = taxi.body.x;
        driver.body.y = taxi.body.y;
        tracing::info!(taxi = taxi.id, "driver entered taxi");
    }

    if !taxi.has_driver || !taxi.is_empty() {
        return;
    }
    let Some(index) = state.trip.as_ref().filter(|t| t.is_ongoing()).map(|t| t.passenger) else {
        return;
    };
    let Some(passenger) = state.passengers.get_mut(index) else {
        return;
    };
    if !passenger.is_waiting_for_reboard()
        || passenger.body.is_destroyed()
        || taxi.body.distance_to(passenger.body.x, passenger.body.y) > passenger.detect_radius
    {
        return;
    }
    if passenger.step_towards(taxi.body.x, taxi.body.y) {
        passenger.in_taxi = true;
        taxi.current_passenger = Some(index);
        tracing::info!(passenger = index, taxi = taxi.id, "passenger re-boarded");
    }
}

fn update_passengers(state: &mut WorldState, input: &FrameInput) {
    let raining = state.is_raining();
    let coin_active = state.power_up_state.is_coin_active();
    let speed = state.config.road.scroll_speed;
    let (taxi_x, taxi_y) = (state.taxi.body.x, state.taxi.body.y);
    let rates = &state.config.trip;

    for (index, passenger) in state.passengers.iter_mut().enumerate() {
        if input.scrolls() && !passenger.in_taxi {
            passenger.body.y += speed;
            if let TripPhase::Departing { target_y, .. } = &mut passenger.phase {
                *target_y += speed;
            }
        }

        match passenger.phase {
            TripPhase::Riding if passenger.in_taxi => {
                passenger.body.x = taxi_x;
                passenger.body.y = taxi_y;
            }
            TripPhase::Departing { target_x, target_y } => {
                if passenger.step_towards(target_x, target_y) {
                    passenger.phase = TripPhase::DroppedOff;
                    tracing::info!(passenger = index, "passenger dropped off");
                    if let Some(trip) = state.trip.as_mut().filter(|t| t.passenger == index) {
                        trip.flag.active = false;
                    }
                }
            }
            _ => {}
        }

        if passenger.is_picked_up() && coin_active {
            passenger.decrease_priority(rates);
        }
        passenger.apply_weather(raining, rates);
    }
}

fn separate_people(state: &mut WorldState) {
    let taxi_from = state
        .taxi
        .body
        .last_collided_with
        .and_then(|other| state.position_of(other));
    if let Some((x, y)) = taxi_from {
        state.taxi.body.separate_from(x, y);
    }

    let driver_from = state
        .driver
        .body
        .last_collided_with
        .and_then(|other| state.position_of(other));
    if let Some((x, y)) = driver_from {
        state.driver.body.separate_from(x, y);
    }

    for index in 0..state.passengers.len() {
        let from = state.passengers[index]
            .body
            .last_collided_with
            .and_then(|other| state.position_of(other));
        if let Some((x, y)) = from {
            state.passengers[index].body.separate_from(x, y);
        }
    }
}

fn age_effects(state: &mut WorldState) {
    for effect in &mut state.effects {
        effect.frames_remaining = effect.frames_remaining.saturating_sub(1);
    }
    state.effects.retain(Effect::is_visible);
}

/// Drop cars that have driven well past either spawn band.
fn cull_cars(state: &mut WorldState) {
    let road = &state.config.road;
    let (top, bottom) = (road.spawn_y_top - road.cull_margin, road.spawn_y_bottom + road.cull_margin);
    state.cars.retain(|car| (top..=bottom).contains(&car.body.y));
}
