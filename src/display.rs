//! Rendering layer: all terminal I/O lives here.
//!
//! Each function receives a mutable writer and an immutable view of the
//! world.  No game logic is performed; this module only maps world pixels to
//! terminal cells and queues the drawing commands.  Anything that reports
//! itself as not visible is skipped.

use std::io::Write;

use crossterm::{
    cursor,
    style::{self, Color, Print},
    terminal, QueueableCommand,
};
use shadow_taxi::compute::{check_game_end, trip_info, TripInfo};
use shadow_taxi::entities::{
    Car, Effect, EffectKind, GameEnd, PowerUp, PowerUpKind, WorldState,
};

// ── Colour palette ────────────────────────────────────────────────────────────

const C_BORDER: Color = Color::DarkBlue;
const C_LANE: Color = Color::DarkGrey;
const C_HUD_SCORE: Color = Color::Yellow;
const C_HUD_HEALTH: Color = Color::Red;
const C_TAXI: Color = Color::Yellow;
const C_DRIVER: Color = Color::White;
const C_PASSENGER: Color = Color::Green;
const C_PASSENGER_UMBRELLA: Color = Color::Magenta;
const C_OTHER_CAR: Color = Color::Blue;
const C_ENEMY_CAR: Color = Color::Red;
const C_FIREBALL: Color = Color::DarkYellow;
const C_FLAG: Color = Color::Green;
const C_COIN: Color = Color::Yellow;
const C_INVINCIBLE: Color = Color::Cyan;
const C_HINT: Color = Color::DarkGrey;
const C_RAIN: Color = Color::Blue;

/// Terminal area the playfield is squeezed into.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub cols: u16,
    pub rows: u16,
}

impl Viewport {
    /// Play area is rows 2..rows-3 and columns 1..cols-2, inside the border.
    fn cell(&self, state: &WorldState, x: i32, y: i32) -> Option<(u16, u16)> {
        let window = &state.config.window;
        if x < 0 || y < 0 || x >= window.width || y >= window.height {
            return None;
        }
        let inner_cols = i64::from(self.cols.saturating_sub(2));
        let inner_rows = i64::from(self.rows.saturating_sub(5));
        let col = 1 + i64::from(x) * inner_cols / i64::from(window.width);
        let row = 2 + i64::from(y) * inner_rows / i64::from(window.height);
        Some((col as u16, row as u16))
    }
}

// ── Public entry point ────────────────────────────────────────────────────────

/// Render one complete frame.
pub fn render<W: Write>(out: &mut W, state: &WorldState, view: Viewport) -> std::io::Result<()> {
    out.queue(terminal::Clear(terminal::ClearType::All))?;

    draw_border(out, view)?;
    draw_lanes(out, state, view)?;
    draw_hud(out, state, view)?;

    if let Some(trip) = state.trip.as_ref().filter(|t| t.flag.is_visible()) {
        put(out, view.cell(state, trip.flag.x, trip.flag.y), C_FLAG, "⚑")?;
    }
    for power_up in state.power_ups.iter().filter(|p| p.is_visible()) {
        draw_power_up(out, state, view, power_up)?;
    }
    for passenger in state.passengers.iter().filter(|p| p.is_visible()) {
        let color = if passenger.has_umbrella {
            C_PASSENGER_UMBRELLA
        } else {
            C_PASSENGER
        };
        let glyph = passenger.priority.to_string();
        put(out, view.cell(state, passenger.body.x, passenger.body.y), color, &glyph)?;
    }
    for car in state.cars.iter().filter(|c| c.is_visible()) {
        draw_car(out, state, view, car)?;
    }
    for projectile in state.projectiles.iter().filter(|p| p.is_visible()) {
        put(out, view.cell(state, projectile.x, projectile.y), C_FIREBALL, "*")?;
    }
    if state.taxi.is_visible() {
        let glyph = if state.taxi.has_driver { "▣" } else { "□" };
        put(out, view.cell(state, state.taxi.body.x, state.taxi.body.y), C_TAXI, glyph)?;
    }
    if state.driver.is_visible() {
        put(out, view.cell(state, state.driver.body.x, state.driver.body.y), C_DRIVER, "@")?;
    }
    for effect in state.effects.iter().filter(|e| e.is_visible()) {
        draw_effect(out, state, view, effect)?;
    }

    draw_trip_info(out, state, view)?;
    draw_controls_hint(out, view)?;

    if let Some(end) = check_game_end(state) {
        draw_game_over(out, state, view, end)?;
    }

    // Park cursor in a harmless spot and flush
    out.queue(style::ResetColor)?;
    out.queue(cursor::MoveTo(0, view.rows.saturating_sub(1)))?;
    out.flush()?;
    Ok(())
}

fn put<W: Write>(out: &mut W, cell: Option<(u16, u16)>, color: Color, glyph: &str) -> std::io::Result<()> {
    if let Some((col, row)) = cell {
        out.queue(cursor::MoveTo(col, row))?;
        out.queue(style::SetForegroundColor(color))?;
        out.queue(Print(glyph))?;
    }
    Ok(())
}

// ── Road ──────────────────────────────────────────────────────────────────────

fn draw_border<W: Write>(out: &mut W, view: Viewport) -> std::io::Result<()> {
    let w = view.cols as usize;
    let bottom = view.rows.saturating_sub(3);

    out.queue(style::SetForegroundColor(C_BORDER))?;
    out.queue(cursor::MoveTo(0, 1))?;
    out.queue(Print(format!("┌{}┐", "─".repeat(w.saturating_sub(2)))))?;
    out.queue(cursor::MoveTo(0, bottom))?;
    out.queue(Print(format!("└{}┘", "─".repeat(w.saturating_sub(2)))))?;

    for row in 2..bottom {
        out.queue(cursor::MoveTo(0, row))?;
        out.queue(Print("│"))?;
        out.queue(cursor::MoveTo(view.cols.saturating_sub(1), row))?;
        out.queue(Print("│"))?;
    }
    Ok(())
}

/// Dotted guide under each lane centre; blue streaks while it rains.
fn draw_lanes<W: Write>(out: &mut W, state: &WorldState, view: Viewport) -> std::io::Result<()> {
    let (color, glyph) = if state.is_raining() { (C_RAIN, "╎") } else { (C_LANE, "·") };
    for &lane in &state.config.road.lanes {
        for y in (0..state.config.window.height).step_by(48) {
            put(out, view.cell(state, lane, y), color, glyph)?;
        }
    }
    Ok(())
}

// ── HUD (row 0) ───────────────────────────────────────────────────────────────

fn draw_hud<W: Write>(out: &mut W, state: &WorldState, view: Viewport) -> std::io::Result<()> {
    out.queue(cursor::MoveTo(1, 0))?;
    out.queue(style::SetForegroundColor(C_HUD_SCORE))?;
    out.queue(Print(format!(
        "Pay:{:>7.2}/{:.0}  Frames:{:>5}",
        state.stats.total_score,
        state.stats.target_score,
        state.stats.remaining_frames.max(0)
    )))?;

    let mut tags = String::new();
    if let Some(frames) = state.power_up_state.coin_frames_left() {
        tags.push_str(&format!("[$ {:>3}] ", frames));
    }
    if let Some(frames) = state.power_up_state.invincible_frames_left() {
        tags.push_str(&format!("[✚ {:>4}] ", frames));
    }
    let health = format!(
        "Taxi:{:.0} Driver:{:.0}",
        state.taxi.body.health, state.driver.body.health
    );
    let right = format!("{}{}", tags, health);
    let rx = view.cols.saturating_sub(right.chars().count() as u16 + 1);
    out.queue(cursor::MoveTo(rx, 0))?;
    if !tags.is_empty() {
        out.queue(style::SetForegroundColor(C_INVINCIBLE))?;
        out.queue(Print(&tags))?;
    }
    out.queue(style::SetForegroundColor(C_HUD_HEALTH))?;
    out.queue(Print(&health))?;
    Ok(())
}

// ── Entities ──────────────────────────────────────────────────────────────────

fn draw_car<W: Write>(out: &mut W, state: &WorldState, view: Viewport, car: &Car) -> std::io::Result<()> {
    let (color, glyph) = if car.is_enemy() {
        (C_ENEMY_CAR, "◆")
    } else {
        (C_OTHER_CAR, "■")
    };
    put(out, view.cell(state, car.body.x, car.body.y), color, glyph)
}

fn draw_power_up<W: Write>(
    out: &mut W,
    state: &WorldState,
    view: Viewport,
    power_up: &PowerUp,
) -> std::io::Result<()> {
    let (color, glyph) = match power_up.kind {
        PowerUpKind::Coin => (C_COIN, "$"),
        PowerUpKind::Invincible => (C_INVINCIBLE, "✚"),
    };
    put(out, view.cell(state, power_up.x, power_up.y), color, glyph)
}

fn draw_effect<W: Write>(out: &mut W, state: &WorldState, view: Viewport, effect: &Effect) -> std::io::Result<()> {
    let (color, glyph) = match effect.kind {
        EffectKind::Smoke => (Color::Grey, "░"),
        EffectKind::Fire => (Color::Red, "✹"),
        EffectKind::Blood => (Color::DarkRed, "✖"),
    };
    put(out, view.cell(state, effect.x, effect.y), color, glyph)
}

// ── Trip info and hints (bottom rows) ─────────────────────────────────────────

fn draw_trip_info<W: Write>(out: &mut W, state: &WorldState, view: Viewport) -> std::io::Result<()> {
    let line = match trip_info(state) {
        Some(TripInfo::Current {
            expected_earnings,
            priority,
        }) => format!("Current trip  expected:{:.1}  priority:{}", expected_earnings, priority),
        Some(TripInfo::Last {
            fare,
            priority,
            penalty,
            ..
        }) => format!(
            "Last trip  fare:{:.1}  priority:{}  penalty:{:.2}",
            fare,
            priority,
            penalty
        ),
        None => return Ok(()),
    };
    out.queue(cursor::MoveTo(1, view.rows.saturating_sub(2)))?;
    out.queue(style::SetForegroundColor(C_HUD_SCORE))?;
    out.queue(Print(line))?;
    Ok(())
}

fn draw_controls_hint<W: Write>(out: &mut W, view: Viewport) -> std::io::Result<()> {
    out.queue(cursor::MoveTo(1, view.rows.saturating_sub(1)))?;
    out.queue(style::SetForegroundColor(C_HINT))?;
    out.queue(Print("↑ : Drive   ← → : Steer   arrows/WASD : Walk when on foot   Q : Quit"))?;
    Ok(())
}

// ── Game-over overlay ─────────────────────────────────────────────────────────

fn draw_game_over<W: Write>(out: &mut W, state: &WorldState, view: Viewport, end: GameEnd) -> std::io::Result<()> {
    let won = end == GameEnd::TargetReached;
    let reason = match end {
        GameEnd::TargetReached => "Target reached!",
        GameEnd::FramesExhausted => "Out of time",
        GameEnd::TaxiAbandoned => "Taxi abandoned",
        GameEnd::DriverDead => "Driver killed",
        GameEnd::PassengerDead => "Passenger killed",
    };
    let box_color = if won { Color::Green } else { Color::Red };
    let lines: &[(&str, Color)] = &[
        ("╔════════════════════╗", box_color),
        (
            if won {
                "║      YOU  WON      ║"
            } else {
                "║    GAME  OVER      ║"
            },
            box_color,
        ),
        ("╚════════════════════╝", box_color),
    ];
    let score_line = format!("Total pay: {:.2}", state.stats.total_score);

    let cx = view.cols / 2;
    let total_rows = lines.len() + 3;
    let start_row = (view.rows / 2).saturating_sub(total_rows as u16 / 2);

    for (i, (msg, color)) in lines.iter().enumerate() {
        let row = start_row + i as u16;
        let col = cx.saturating_sub(msg.chars().count() as u16 / 2);
        out.queue(cursor::MoveTo(col, row))?;
        out.queue(style::SetForegroundColor(*color))?;
        out.queue(Print(*msg))?;
    }

    let rows: [(&str, Color); 3] = [
        (reason, Color::White),
        (score_line.as_str(), Color::Yellow),
        ("R - Play Again  Q - Quit", Color::White),
    ];
    for (i, (msg, color)) in rows.iter().enumerate() {
        let row = start_row + (lines.len() + i) as u16;
        let col = cx.saturating_sub(msg.chars().count() as u16 / 2);
        out.queue(cursor::MoveTo(col, row))?;
        out.queue(style::SetForegroundColor(*color))?;
        out.queue(Print(*msg))?;
    }
    Ok(())
}
