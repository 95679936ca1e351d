//! Terminal front-end for the taxi game.
//!
//! Usage:
//!   shadow_taxi [--config game.toml] [--layout level.toml] [--seed N] [--log taxi.log]

mod display;

use std::collections::HashMap;
use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use crossterm::{
    cursor,
    event::{
        self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    style::{self, Color, Print},
    terminal, ExecutableCommand, QueueableCommand,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use shadow_taxi::compute::{check_game_end, has_game_ended, init_state, step};
use shadow_taxi::config::{GameConfig, Layout};
use shadow_taxi::entities::{FrameInput, WorldState};

use display::Viewport;

const FRAME: Duration = Duration::from_millis(33); // ≈30 FPS

/// A key is considered "held" if its last press/repeat event arrived within
/// this many frames.  Covers terminals that don't emit key-release events:
/// the OS key-repeat rate is ≥ 15 Hz, so a window of 4 frames (≈133 ms) is
/// always refreshed before expiry.
const HOLD_WINDOW: u64 = 4;

#[derive(Parser)]
#[command(name = "shadow_taxi")]
#[command(about = "Drive a taxi up a busy road, deliver passengers, dodge fireballs")]
struct Args {
    /// Game tunables (TOML).  Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Level layout (TOML): start positions, passengers, pickups, weather.
    #[arg(long)]
    layout: Option<PathBuf>,
    /// RNG seed; overrides `seed` from the config file.
    #[arg(long)]
    seed: Option<u64>,
    /// Write tracing output here.  The terminal belongs to the game, so
    /// nothing is logged without it.
    #[arg(long)]
    log: Option<PathBuf>,
}

/// Returns true if `key` was seen within the last `HOLD_WINDOW` frames.
fn is_held(key_frame: &HashMap<KeyCode, u64>, key: &KeyCode, frame: u64) -> bool {
    key_frame
        .get(key)
        .map(|&last| frame.saturating_sub(last) <= HOLD_WINDOW)
        .unwrap_or(false)
}

fn any_held(key_frame: &HashMap<KeyCode, u64>, keys: &[KeyCode], frame: u64) -> bool {
    keys.iter().any(|key| is_held(key_frame, key, frame))
}

fn frame_input(key_frame: &HashMap<KeyCode, u64>, frame: u64) -> FrameInput {
    FrameInput {
        up: any_held(key_frame, &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')], frame),
        down: any_held(key_frame, &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')], frame),
        left: any_held(key_frame, &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')], frame),
        right: any_held(key_frame, &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')], frame),
    }
}

fn viewport() -> std::io::Result<Viewport> {
    let (cols, rows) = terminal::size()?;
    Ok(Viewport { cols, rows })
}

// ── Menu ──────────────────────────────────────────────────────────────────────

enum MenuResult {
    Start,
    Quit,
}

fn show_menu<W: Write>(
    out: &mut W,
    rx: &mpsc::Receiver<Event>,
    config: &GameConfig,
) -> std::io::Result<MenuResult> {
    out.queue(terminal::Clear(terminal::ClearType::All))?;

    let (width, height) = terminal::size()?;
    let cx = width / 2;
    let cy = height / 2;

    let title = "▣  SHADOW  TAXI  ▣";
    out.queue(cursor::MoveTo(
        cx.saturating_sub(title.chars().count() as u16 / 2),
        cy.saturating_sub(6),
    ))?;
    out.queue(style::SetForegroundColor(Color::Yellow))?;
    out.queue(Print(title))?;

    let goal = format!(
        "Earn {:.0} in {} frames",
        config.game.target_score, config.game.max_frames
    );
    out.queue(cursor::MoveTo(
        cx.saturating_sub(goal.chars().count() as u16 / 2),
        cy.saturating_sub(4),
    ))?;
    out.queue(style::SetForegroundColor(Color::White))?;
    out.queue(Print(&goal))?;

    let legend: &[(&str, Color, &str)] = &[
        ("▣", Color::Yellow, " taxi   @ driver on foot"),
        ("1", Color::Green, " passenger (number = priority)"),
        ("⚑", Color::Green, " drop-off flag"),
        ("■", Color::Blue, " traffic   ◆ enemy car   * fireball"),
        ("$", Color::Yellow, " coin: better priority for riders"),
        ("✚", Color::Cyan, " invincibility"),
    ];
    for (i, (sym, color, desc)) in legend.iter().enumerate() {
        let row = cy.saturating_sub(2) + i as u16;
        out.queue(cursor::MoveTo(cx.saturating_sub(18), row))?;
        out.queue(style::SetForegroundColor(*color))?;
        out.queue(Print(sym))?;
        out.queue(style::SetForegroundColor(Color::DarkGrey))?;
        out.queue(Print(*desc))?;
    }

    out.queue(cursor::MoveTo(cx.saturating_sub(18), cy + 5))?;
    out.queue(style::SetForegroundColor(Color::White))?;
    out.queue(Print("ENTER : Start   Q : Quit"))?;

    out.queue(style::ResetColor)?;
    out.flush()?;

    // Block until the user makes a choice
    loop {
        if let Ok(Event::Key(KeyEvent { code, kind, .. })) = rx.recv() {
            if kind == KeyEventKind::Release {
                continue;
            }
            match code {
                KeyCode::Enter | KeyCode::Char(' ') => return Ok(MenuResult::Start),
                KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                    return Ok(MenuResult::Quit);
                }
                _ => {}
            }
        }
    }
}

// ── Game loop ─────────────────────────────────────────────────────────────────

/// Returns `true` → quit program,  `false` → back to menu.
///
/// Input model: a `key_frame` map records the frame number of the last
/// press/repeat event for every key.  Each frame the keys that are still
/// "fresh" (within `HOLD_WINDOW` frames) become one `FrameInput`, so steering
/// and driving can be held together.
fn game_loop<W: Write>(
    out: &mut W,
    state: &mut WorldState,
    rng: &mut ChaCha8Rng,
    rx: &mpsc::Receiver<Event>,
) -> std::io::Result<bool> {
    let mut key_frame: HashMap<KeyCode, u64> = HashMap::new();
    let mut frame: u64 = 0;

    loop {
        let frame_start = Instant::now();
        frame += 1;

        // ── Drain all pending input events (non-blocking) ─────────────────────
        while let Ok(Event::Key(KeyEvent { code, kind, modifiers, .. })) = rx.try_recv() {
            match kind {
                KeyEventKind::Press => {
                    key_frame.insert(code, frame);
                    match code {
                        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                            return Ok(true);
                        }
                        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                            return Ok(true);
                        }
                        KeyCode::Char('r') | KeyCode::Char('R') if has_game_ended(state) => {
                            return Ok(false);
                        }
                        _ => {}
                    }
                }
                KeyEventKind::Repeat => {
                    key_frame.insert(code, frame);
                }
                KeyEventKind::Release => {
                    key_frame.remove(&code);
                }
            }
        }

        // The simulation never halts itself; stop stepping once an end
        // condition holds.
        if !has_game_ended(state) {
            let input = frame_input(&key_frame, frame);
            step(state, &input, rng);
            if let Some(end) = check_game_end(state) {
                tracing::info!(
                    reason = ?end,
                    frame = state.frame,
                    total_score = state.stats.total_score,
                    "game over"
                );
            }
        }

        display::render(out, state, viewport()?)?;

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME {
            std::thread::sleep(FRAME - elapsed);
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log {
        init_logging(path)?;
    }

    let config = match &args.config {
        Some(path) => GameConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => GameConfig::default(),
    };
    let layout = match &args.layout {
        Some(path) => Layout::load(path).with_context(|| format!("loading layout {}", path.display()))?,
        None => Layout::default(),
    };
    let seed = args.seed.or(config.seed).unwrap_or_else(rand::random);
    tracing::info!(seed, "starting");

    let raw_out = stdout();
    let mut out = BufWriter::new(raw_out);

    terminal::enable_raw_mode()?;
    out.execute(terminal::EnterAlternateScreen)?;
    out.execute(cursor::Hide)?;

    // Request key-release (and key-repeat) events from the terminal.
    // Kitty-protocol terminals support this; others fall back gracefully.
    let keyboard_enhanced = out
        .execute(PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::REPORT_EVENT_TYPES,
        ))
        .is_ok();
    if !keyboard_enhanced {
        tracing::warn!("terminal does not report key releases; using a {HOLD_WINDOW}-frame hold window");
    }

    // Blocking event reads live on their own thread so the game loop never
    // waits on I/O.
    let (tx, rx) = mpsc::channel::<Event>();
    thread::spawn(move || {
        while let Ok(ev) = event::read() {
            if tx.send(ev).is_err() {
                break; // receiver dropped → program exiting
            }
        }
    });

    let result = run(&mut out, &rx, Arc::new(config), &layout, seed);

    // Always restore the terminal
    if keyboard_enhanced {
        let _ = out.execute(PopKeyboardEnhancementFlags);
    }
    let _ = out.execute(cursor::Show);
    let _ = out.execute(terminal::LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    result.context("terminal I/O failed")
}

fn run<W: Write>(
    out: &mut W,
    rx: &mpsc::Receiver<Event>,
    config: Arc<GameConfig>,
    layout: &Layout,
    seed: u64,
) -> std::io::Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    loop {
        match show_menu(out, rx, &config)? {
            MenuResult::Quit => break,
            MenuResult::Start => {
                let mut state = init_state(Arc::clone(&config), layout);
                let quit = game_loop(out, &mut state, &mut rng, rx)?;
                tracing::info!(
                    score = state.stats.total_score,
                    frames = state.frame,
                    "game finished"
                );
                if quit {
                    break;
                }
            }
        }
    }
    Ok(())
}
