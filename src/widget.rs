//! Widget lifecycle host
//!
//! `WidgetHost<G>` wraps one `ArcadeGame` with everything a host page needs:
//! lifecycle hooks, keyboard and pointer plumbing, the fixed-timestep loop, delayed
//! actions, settings and the best-score record. Failures stay inside the
//! widget; the host is never brought down by one.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::Serialize;

use crate::highscores::BestScore;
use crate::persistence::KeyValueStore;
use crate::platform::{DelayedTasks, InputMapper, Intents, KeyBindings, Scheduler};
use crate::renderer::{self, Color, DrawList, RenderSurface};
use crate::settings::Settings;
use crate::sim::{GamePhase, GameState, ParticleSystem};
use crate::{Bounds, consts};

/// Widget lifecycle failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    /// The mount point could not provide a drawing surface
    MissingSurface,
    AlreadyInitialized,
    NotInitialized,
    /// `load` received a document that is not valid settings JSON
    InvalidConfig(String),
}

impl fmt::Display for WidgetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetError::MissingSurface => write!(f, "no render surface available"),
            WidgetError::AlreadyInitialized => write!(f, "widget already initialized"),
            WidgetError::NotInitialized => write!(f, "widget not initialized"),
            WidgetError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for WidgetError {}

/// Where a widget gets its drawing surface from
pub trait Mount {
    fn create_surface(&mut self, width: f32, height: f32) -> Option<Box<dyn RenderSurface>>;
}

/// Host lifecycle contract
pub trait GameWidget {
    fn initialize(&mut self, mount: &mut dyn Mount) -> Result<(), WidgetError>;
    /// Apply a settings JSON document
    fn load(&mut self, value: &str) -> Result<(), WidgetError>;
    /// JSON snapshot of what the HUD shows
    fn read(&self) -> String;
    /// Stop the loop and release everything. Safe to call any number of
    /// times, including before `initialize`.
    fn destroy(&mut self);
}

/// One game running on the shared engine
pub trait ArcadeGame {
    /// Deferred action kind for `DelayedTasks`
    type Delayed: Clone + fmt::Debug;

    /// Short name, also the best-score key prefix
    const NAME: &'static str;

    fn bindings() -> KeyBindings {
        KeyBindings::default()
    }

    /// Ticks between held-fire shots
    fn fire_cooldown() -> u32 {
        0
    }

    fn bounds(&self) -> Bounds;

    fn state(&self) -> &GameState;
    fn state_mut(&mut self) -> &mut GameState;

    /// Back to a fresh run in `Ready`
    fn reset(&mut self);

    /// Whether input seen in `Ready` starts the run. The input is not
    /// applied to the game.
    fn is_start_intent(&self, intents: &Intents) -> bool {
        intents.direction.is_some()
            || intents.fire
            || intents.secondary
            || !intents.clicks.is_empty()
    }

    /// One fixed tick of gameplay. Only called while `Running`.
    fn update(&mut self, intents: &Intents, dt_ms: f32, delayed: &mut DelayedTasks<Self::Delayed>);

    /// A delayed action came due
    fn on_delayed(&mut self, action: Self::Delayed, delayed: &mut DelayedTasks<Self::Delayed>);

    fn effects(&self) -> &ParticleSystem;
    fn effects_mut(&mut self) -> &mut ParticleSystem;

    fn render(&self, surface: &mut dyn RenderSurface);

    /// Game-specific HUD fields for `read()`
    fn hud(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

#[derive(Serialize)]
struct HudSnapshot<'a> {
    game: &'a str,
    phase: &'a str,
    score: u64,
    lives: u32,
    level: u32,
    best: u64,
    frames: u64,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    detail: serde_json::Value,
}

/// Lifecycle wrapper around one game instance
pub struct WidgetHost<G: ArcadeGame> {
    game: G,
    input: InputMapper,
    scheduler: Scheduler,
    delayed: DelayedTasks<G::Delayed>,
    settings: Settings,
    best: BestScore,
    store: Box<dyn KeyValueStore>,
    surface: Option<Box<dyn RenderSurface>>,
    fx_rng: Pcg32,
    initialized: bool,
}

impl<G: ArcadeGame> WidgetHost<G> {
    pub fn new(game: G, store: Box<dyn KeyValueStore>) -> Self {
        Self {
            game,
            input: InputMapper::new(G::bindings(), G::fire_cooldown()),
            scheduler: Scheduler::default(),
            delayed: DelayedTasks::new(),
            settings: Settings::default(),
            best: BestScore::default(),
            store,
            surface: None,
            fx_rng: Pcg32::seed_from_u64(0x5eed),
            initialized: false,
        }
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn best_score(&self) -> u64 {
        self.best.score
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn pending_delayed(&self) -> usize {
        self.delayed.len()
    }

    fn apply_settings(&mut self) {
        let cap = self.settings.max_particles();
        let shake = self.settings.effective_screen_shake();
        let density = self.settings.effect_density();
        self.game.effects_mut().configure(cap, shake, density);
    }

    pub fn key_down(&mut self, code: u32) {
        if self.initialized {
            self.input.key_down(code);
        }
    }

    pub fn key_up(&mut self, code: u32) {
        if self.initialized {
            self.input.key_up(code);
        }
    }

    /// Pointer position in field coordinates
    pub fn pointer_move(&mut self, pos: Vec2) {
        if self.initialized {
            self.input.pointer_move(pos);
        }
    }

    pub fn pointer_down(&mut self, pos: Vec2) {
        if self.initialized {
            self.input.pointer_down(pos);
        }
    }

    pub fn pointer_leave(&mut self) {
        if self.initialized {
            self.input.pointer_leave();
        }
    }

    /// Start button: `Ready -> Running`
    pub fn start(&mut self) {
        if self.initialized && self.game.state_mut().start().is_ok() {
            log::info!("{} started", G::NAME);
        }
    }

    /// Pause button: toggles `Running <-> Paused`
    pub fn pause(&mut self) {
        if self.initialized {
            if let Ok(phase) = self.game.state_mut().toggle_pause() {
                log::info!("{} {}", G::NAME, phase.as_str());
            }
        }
    }

    /// Reset button: fresh run, pending delayed actions dropped
    pub fn reset(&mut self) {
        self.delayed.clear();
        self.input.clear();
        self.game.reset();
        self.apply_settings();
        log::info!("{} reset", G::NAME);
        self.render();
    }

    /// Advance by one host frame of `dt` seconds and redraw
    pub fn frame(&mut self, dt: f32) {
        if !self.initialized {
            return;
        }
        let steps = self.scheduler.due(dt);
        let dt_ms = self.scheduler.timestep().dt() * 1000.0;
        for _ in 0..steps {
            self.tick(dt_ms);
        }
        self.render();
    }

    fn tick(&mut self, dt_ms: f32) {
        let phase = self.game.state().phase;
        let intents = self.input.poll(phase);

        match phase {
            GamePhase::Ready => {
                if self.game.is_start_intent(&intents) && self.game.state_mut().start().is_ok() {
                    log::info!("{} started", G::NAME);
                }
            }
            GamePhase::Paused => {
                if intents.pause {
                    let _ = self.game.state_mut().toggle_pause();
                }
                // Frozen: no gameplay, no effects, no delayed actions
                return;
            }
            GamePhase::Running => {
                if intents.pause {
                    let _ = self.game.state_mut().toggle_pause();
                    return;
                }
                self.game.update(&intents, dt_ms, &mut self.delayed);
                self.game.state_mut().count_frame();
                self.run_delayed(dt_ms);
            }
            // Between levels only the scheduled follow-up can move things on
            GamePhase::Won => self.run_delayed(dt_ms),
            GamePhase::GameOver => {}
        }

        self.game.effects_mut().tick();

        if phase != GamePhase::GameOver && self.game.state().is_over() {
            self.on_game_over();
        }
    }

    fn run_delayed(&mut self, dt_ms: f32) {
        for action in self.delayed.advance(dt_ms) {
            log::debug!("{} delayed action {:?}", G::NAME, action);
            self.game.on_delayed(action, &mut self.delayed);
        }
    }

    fn on_game_over(&mut self) {
        self.delayed.clear();
        let score = self.game.state().score();
        let best = self.best.record(self.store.as_mut(), G::NAME, score);
        log::info!("{} game over: score {} (best {})", G::NAME, score, best);
    }

    fn render(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let shake = self.game.effects().shake.offset(&mut self.fx_rng);
        surface.clear(Color::BACKGROUND);
        surface.set_origin(shake);
        self.game.render(surface.as_mut());
        renderer::draw_particles(surface.as_mut(), self.game.effects());
        surface.set_origin(Vec2::ZERO);

        let center = self.game.bounds().center();
        let state = self.game.state();
        match state.phase {
            GamePhase::Ready => renderer::banner(surface.as_mut(), center, "READY", "Press a key to start"),
            GamePhase::Paused => renderer::banner(surface.as_mut(), center, "PAUSED", ""),
            GamePhase::GameOver => {
                let line = format!("Score {}  Best {}", state.score(), self.best.score);
                renderer::banner(surface.as_mut(), center, "GAME OVER", &line);
            }
            GamePhase::Running | GamePhase::Won => {}
        }
    }
}

impl<G: ArcadeGame> GameWidget for WidgetHost<G> {
    fn initialize(&mut self, mount: &mut dyn Mount) -> Result<(), WidgetError> {
        if self.initialized {
            return Err(WidgetError::AlreadyInitialized);
        }
        let bounds = self.game.bounds();
        let Some(surface) = mount.create_surface(bounds.width, bounds.height) else {
            log::error!("{}: {}", G::NAME, WidgetError::MissingSurface);
            return Err(WidgetError::MissingSurface);
        };
        self.surface = Some(surface);
        self.settings = Settings::load(self.store.as_ref());
        self.best = BestScore::load(self.store.as_ref(), G::NAME);
        self.delayed.clear();
        self.input.clear();
        self.game.reset();
        self.apply_settings();
        self.scheduler.start();
        self.initialized = true;
        log::info!("{} initialized ({}x{})", G::NAME, bounds.width, bounds.height);
        self.render();
        Ok(())
    }

    fn load(&mut self, value: &str) -> Result<(), WidgetError> {
        let settings =
            Settings::from_json(value).map_err(|e| WidgetError::InvalidConfig(e.to_string()))?;
        self.settings = settings;
        self.settings.save(self.store.as_mut());
        self.apply_settings();
        Ok(())
    }

    fn read(&self) -> String {
        let state = self.game.state();
        let snapshot = HudSnapshot {
            game: G::NAME,
            phase: state.phase.as_str(),
            score: state.score(),
            lives: state.lives(),
            level: state.level(),
            best: self.best.score,
            frames: state.frame_count,
            detail: self.game.hud(),
        };
        serde_json::to_string(&snapshot).unwrap_or_else(|e| {
            log::warn!("{}: could not serialize HUD: {}", G::NAME, e);
            String::from("{}")
        })
    }

    fn destroy(&mut self) {
        self.scheduler.stop();
        self.delayed.clear();
        self.input.clear();
        self.game.effects_mut().clear();
        self.surface = None;
        if self.initialized {
            log::info!("{} destroyed", G::NAME);
        }
        self.initialized = false;
    }
}

/// Draw list shared between a mount and the test or tool inspecting it
#[derive(Debug, Clone, Default)]
pub struct SharedDrawList(pub Rc<RefCell<DrawList>>);

impl RenderSurface for SharedDrawList {
    fn clear(&mut self, color: Color) {
        self.0.borrow_mut().clear(color);
    }

    fn set_origin(&mut self, origin: Vec2) {
        self.0.borrow_mut().set_origin(origin);
    }

    fn fill_rect(&mut self, pos: Vec2, size: Vec2, color: Color) {
        self.0.borrow_mut().fill_rect(pos, size, color);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.0.borrow_mut().fill_circle(center, radius, color);
    }

    fn line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        self.0.borrow_mut().line(from, to, width, color);
    }

    fn text(&mut self, pos: Vec2, text: &str, size: f32, color: Color) {
        self.0.borrow_mut().text(pos, text, size, color);
    }
}

/// Mount without a page: hands out a shared draw list, or nothing at all
#[derive(Debug, Clone, Default)]
pub struct HeadlessMount {
    pub list: Option<SharedDrawList>,
}

impl HeadlessMount {
    pub fn new() -> Self {
        Self {
            list: Some(SharedDrawList::default()),
        }
    }

    /// A mount point with no surface to offer
    pub fn missing() -> Self {
        Self { list: None }
    }
}

impl Mount for HeadlessMount {
    fn create_surface(&mut self, _width: f32, _height: f32) -> Option<Box<dyn RenderSurface>> {
        self.list
            .as_ref()
            .map(|list| Box::new(list.clone()) as Box<dyn RenderSurface>)
    }
}

/// Frame delta that yields exactly one fixed tick
pub const FRAME_DT: f32 = consts::SIM_DT;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, NullStore};
    use crate::platform::keycode;

    /// Minimal game: scores one point per tick, dies after 10, schedules a
    /// bonus 100 ms after start
    struct Counter {
        state: GameState,
        fx: ParticleSystem,
        bonus_fired: u32,
    }

    #[derive(Debug, Clone)]
    enum CounterDelayed {
        Bonus,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                state: GameState::new(1),
                fx: ParticleSystem::default(),
                bonus_fired: 0,
            }
        }
    }

    impl ArcadeGame for Counter {
        type Delayed = CounterDelayed;
        const NAME: &'static str = "counter";

        fn bounds(&self) -> Bounds {
            Bounds::new(100.0, 100.0)
        }

        fn state(&self) -> &GameState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut GameState {
            &mut self.state
        }

        fn reset(&mut self) {
            self.state = GameState::new(1);
            self.bonus_fired = 0;
        }

        fn update(&mut self, _intents: &Intents, _dt_ms: f32, delayed: &mut DelayedTasks<CounterDelayed>) {
            if self.state.frame_count == 0 {
                delayed.schedule(100.0, CounterDelayed::Bonus);
            }
            self.state.add_score(1);
            if self.state.score() >= 10 {
                let _ = self.state.game_over();
            }
        }

        fn on_delayed(&mut self, _action: CounterDelayed, _delayed: &mut DelayedTasks<CounterDelayed>) {
            self.bonus_fired += 1;
        }

        fn effects(&self) -> &ParticleSystem {
            &self.fx
        }

        fn effects_mut(&mut self) -> &mut ParticleSystem {
            &mut self.fx
        }

        fn render(&self, surface: &mut dyn RenderSurface) {
            surface.text(Vec2::ZERO, &self.state.score().to_string(), 12.0, Color::WHITE);
        }
    }

    fn host() -> WidgetHost<Counter> {
        WidgetHost::new(Counter::new(), Box::new(MemoryStore::new()))
    }

    fn run(host: &mut WidgetHost<Counter>, frames: usize) {
        for _ in 0..frames {
            host.frame(FRAME_DT);
        }
    }

    #[test]
    fn test_missing_surface() {
        let mut host = host();
        assert_eq!(
            host.initialize(&mut HeadlessMount::missing()),
            Err(WidgetError::MissingSurface)
        );
        assert!(!host.is_initialized());
        // Inert, not broken
        host.key_down(keycode::SPACE);
        run(&mut host, 5);
        assert_eq!(host.game().state().phase, GamePhase::Ready);
    }

    #[test]
    fn test_destroy_before_initialize_and_twice() {
        let mut host = host();
        host.destroy();
        host.destroy();
        assert!(!host.is_initialized());
    }

    #[test]
    fn test_first_key_only_starts() {
        let mut host = host();
        host.initialize(&mut HeadlessMount::new()).unwrap();
        host.key_down(keycode::SPACE);
        run(&mut host, 1);
        assert_eq!(host.game().state().phase, GamePhase::Running);
        assert_eq!(host.game().state().score(), 0);
    }

    #[test]
    fn test_game_over_records_best() {
        let mut host = host();
        host.initialize(&mut HeadlessMount::new()).unwrap();
        host.start();
        run(&mut host, 20);
        assert!(host.game().state().is_over());
        assert_eq!(host.best_score(), 10);
        assert!(host.read().contains("\"best\":10"));
    }

    #[test]
    fn test_no_delayed_action_after_destroy() {
        let mut host = host();
        host.initialize(&mut HeadlessMount::new()).unwrap();
        host.start();
        run(&mut host, 2);
        assert_eq!(host.pending_delayed(), 1);
        host.destroy();
        assert_eq!(host.pending_delayed(), 0);
        run(&mut host, 30);
        assert_eq!(host.game().bonus_fired, 0);
    }

    #[test]
    fn test_pause_freezes_gameplay() {
        let mut host = host();
        host.initialize(&mut HeadlessMount::new()).unwrap();
        host.start();
        run(&mut host, 3);
        host.key_down(keycode::ESCAPE);
        run(&mut host, 1);
        let score = host.game().state().score();
        assert_eq!(host.game().state().phase, GamePhase::Paused);
        run(&mut host, 5);
        assert_eq!(host.game().state().score(), score);
        // Escape again unpauses
        host.key_down(keycode::ESCAPE);
        run(&mut host, 1);
        assert_eq!(host.game().state().phase, GamePhase::Running);
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let mut host = host();
        assert!(matches!(host.load("{nope"), Err(WidgetError::InvalidConfig(_))));
        host.load(r#"{"particles":false}"#).unwrap();
        assert_eq!(host.settings().max_particles(), 0);
    }

    #[test]
    fn test_render_draws_into_mount() {
        let mut host = host();
        let mut mount = HeadlessMount::new();
        host.initialize(&mut mount).unwrap();
        let list = mount.list.clone().unwrap();
        assert!(list.0.borrow().texts().any(|t| t == "READY"));
    }

    #[test]
    fn test_settings_do_not_change_game_speed() {
        use crate::games::Frogger;

        let mut seconds_left = Vec::new();
        for doc in [None, Some(r#"{"tick_rate":120,"quality":"High"}"#)] {
            let mut host = WidgetHost::new(Frogger::new(1), Box::new(MemoryStore::new()));
            host.initialize(&mut HeadlessMount::new()).unwrap();
            if let Some(doc) = doc {
                host.load(doc).unwrap();
            }
            host.start();
            for _ in 0..60 {
                host.frame(FRAME_DT);
            }
            seconds_left.push(host.game().time_left());
        }
        assert_eq!(seconds_left, vec![59, 59]);
    }

    #[test]
    fn test_settings_reach_particle_density() {
        let mut host = host();
        host.load(r#"{"quality":"Low"}"#).unwrap();
        let mut rng = Pcg32::seed_from_u64(2);
        host.game_mut()
            .effects_mut()
            .spawn(crate::sim::EffectKind::Burst, Vec2::ZERO, 10, &mut rng);
        assert_eq!(host.game().effects().len(), 4);
    }

    #[test]
    fn test_failing_store_does_not_break_play() {
        let mut host = WidgetHost::new(Counter::new(), Box::new(NullStore));
        host.initialize(&mut HeadlessMount::new()).unwrap();
        host.start();
        run(&mut host, 20);
        assert!(host.game().state().is_over());
        assert_eq!(host.best_score(), 10);
    }
}
