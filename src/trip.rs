//! Trip earnings, penalties and the pickup-to-drop-off lifecycle.
//!
//! A trip starts `NotStarted`, becomes `Ongoing` when the passenger has
//! boarded, and is `Completed` the moment the passenger starts walking to the
//! trip-end flag.  Earnings are paid into the running total exactly once.

use crate::collision::EntityId;
use crate::config::{GameConfig, TripConfig};
use crate::entities::{GameStats, Latch, Passenger, Taxi, TripEndFlag, TripPhase};
use crate::powerup::PowerUpState;

// ── Earnings ──────────────────────────────────────────────────────────────────

/// Flat bonus for a priority level.  Out-of-range priorities earn nothing.
pub fn priority_bonus(priority: u8, rates: &TripConfig) -> f64 {
    match priority {
        1..=3 => rates.priority_bonus[usize::from(priority - 1)],
        _ => 0.0,
    }
}

/// `distance_y * rate + bonus(priority) - penalty`, never below zero.
pub fn calculate_earnings(distance_y: i32, priority: u8, penalty: f64, rates: &TripConfig) -> f64 {
    let earnings = distance_y as f64 * rates.rate_per_y + priority_bonus(priority, rates) - penalty;
    earnings.max(0.0)
}

impl Passenger {
    pub fn recalculate_earnings(&mut self, rates: &TripConfig) {
        self.earnings = calculate_earnings(self.distance_y, self.priority, self.penalty, rates);
    }

    /// Coin effect: lower the priority number by one step, once per
    /// passenger.  Returns whether the priority actually changed.
    pub fn decrease_priority(&mut self, rates: &TripConfig) -> bool {
        if !self.priority_drop.fire() {
            return false;
        }
        let lowered = self.original_priority > 1;
        if lowered {
            self.original_priority -= 1;
        }
        // Rain may be holding the priority at 1 already; never raise it here.
        self.priority = self.priority.min(self.original_priority);
        self.recalculate_earnings(rates);
        lowered
    }

    /// Rain drops an exposed passenger to priority 1 until they are dropped
    /// off; umbrellas keep their own priority.
    pub fn apply_weather(&mut self, raining: bool, rates: &TripConfig) {
        if self.has_umbrella || self.is_dropped_off() {
            return;
        }
        self.priority = if raining { 1 } else { self.original_priority };
        self.recalculate_earnings(rates);
    }

    pub fn set_penalty(&mut self, penalty: f64, rates: &TripConfig) {
        self.penalty = penalty;
        self.penalty_latch = Latch::Spent;
        self.recalculate_earnings(rates);
    }
}

// ── Trip ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TripStatus {
    NotStarted,
    Ongoing,
    Completed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Trip {
    /// Id of the taxi currently serving the trip.  Re-bound when the taxi is
    /// destroyed and replaced.
    pub taxi: EntityId,
    /// Index into `WorldState::passengers`.
    pub passenger: usize,
    pub flag: TripEndFlag,
    pub status: TripStatus,
    pub penalty: f64,
    penalty_rate: f64,
}

impl Trip {
    /// The flag is planted `distance_y` pixels up the road from where the
    /// passenger boarded.
    pub fn new(taxi: EntityId, passenger_index: usize, passenger: &Passenger, config: &GameConfig) -> Trip {
        Trip {
            taxi,
            passenger: passenger_index,
            flag: TripEndFlag {
                x: passenger.end_x,
                y: passenger.body.y - passenger.distance_y,
                radius: config.flag.radius,
                active: false,
            },
            status: TripStatus::NotStarted,
            penalty: 0.0,
            penalty_rate: config.trip.penalty_per_y,
        }
    }

    pub fn begin(&mut self, passenger: &mut Passenger, power_ups: &PowerUpState, rates: &TripConfig) {
        self.flag.active = true;
        self.status = TripStatus::Ongoing;
        if passenger.is_picked_up() && power_ups.is_coin_active() {
            passenger.decrease_priority(rates);
        }
        tracing::info!(
            passenger = self.passenger,
            taxi = self.taxi,
            flag_x = self.flag.x,
            flag_y = self.flag.y,
            expected_earnings = passenger.earnings,
            "trip started"
        );
    }

    /// Charge the passenger once if the taxi overshot the flag by more than
    /// the flag's radius.  Returns `true` on the frame the penalty lands.
    pub fn check_penalty(&mut self, taxi: &Taxi, passenger: &mut Passenger, rates: &TripConfig) -> bool {
        if self.status != TripStatus::Ongoing
            || passenger.penalty_latch.is_spent()
            || passenger.payout.is_spent()
            || taxi.body.y >= self.flag.y
        {
            return false;
        }
        if taxi.body.distance_to(self.flag.x, self.flag.y) <= self.flag.radius {
            return false;
        }

        self.penalty = self.penalty_rate * f64::from((taxi.body.y - self.flag.y).abs());
        passenger.set_penalty(self.penalty, rates);
        tracing::info!(
            passenger = self.passenger,
            penalty = self.penalty,
            earnings = passenger.earnings,
            "trip penalty imposed"
        );
        true
    }

    /// Close the trip and pay out.  Safe to call every frame: the payout
    /// latch on the passenger guarantees the score moves only once.
    pub fn complete(&mut self, passenger: &mut Passenger, stats: &mut GameStats) -> bool {
        self.status = TripStatus::Completed;
        let left_taxi = matches!(passenger.phase, TripPhase::Departing { .. } | TripPhase::DroppedOff);
        if left_taxi && passenger.payout.fire() {
            stats.total_score += passenger.earnings;
            tracing::info!(
                passenger = self.passenger,
                earnings = passenger.earnings,
                penalty = self.penalty,
                total_score = stats.total_score,
                "trip completed"
            );
            return true;
        }
        false
    }

    pub fn rebind_taxi(&mut self, taxi: EntityId) {
        self.taxi = taxi;
    }

    pub fn is_ongoing(&self) -> bool {
        self.status == TripStatus::Ongoing
    }

    pub fn is_completed(&self) -> bool {
        self.status == TripStatus::Completed
    }
}
