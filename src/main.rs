//! Arcade Cabinet entry point
//!
//! On the web, mounts the game named by the canvas's `data-game` attribute
//! and drives it from `requestAnimationFrame`. Natively, plays a short
//! scripted headless run and prints the widget snapshot.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::f64::consts::TAU;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, KeyboardEvent, MouseEvent};

    use arcade_cabinet::games::{Asteroids, Frogger, MissileCommand, Snake, SpaceInvaders, Tetris};
    use arcade_cabinet::persistence::{KeyValueStore, LocalStorage, NullStore};
    use arcade_cabinet::platform::keycode;
    use arcade_cabinet::renderer::{Color, RenderSurface};
    use arcade_cabinet::sim::GamePhase;
    use arcade_cabinet::widget::{ArcadeGame, Mount};
    use arcade_cabinet::{GameWidget, WidgetHost};

    const CANVAS_ID: &str = "canvas";

    fn css(color: Color) -> String {
        let [r, g, b, a] = color.0;
        format!(
            "rgba({}, {}, {}, {})",
            (r * 255.0) as u8,
            (g * 255.0) as u8,
            (b * 255.0) as u8,
            a
        )
    }

    /// 2D canvas context as a render surface
    struct CanvasSurface {
        ctx: CanvasRenderingContext2d,
        size: Vec2,
        origin: Vec2,
    }

    impl RenderSurface for CanvasSurface {
        fn clear(&mut self, color: Color) {
            self.ctx.set_fill_style_str(&css(color));
            self.ctx
                .fill_rect(0.0, 0.0, self.size.x as f64, self.size.y as f64);
        }

        fn set_origin(&mut self, origin: Vec2) {
            self.origin = origin;
        }

        fn fill_rect(&mut self, pos: Vec2, size: Vec2, color: Color) {
            let p = pos + self.origin;
            self.ctx.set_fill_style_str(&css(color));
            self.ctx
                .fill_rect(p.x as f64, p.y as f64, size.x as f64, size.y as f64);
        }

        fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
            let c = center + self.origin;
            self.ctx.set_fill_style_str(&css(color));
            self.ctx.begin_path();
            let _ = self.ctx.arc(c.x as f64, c.y as f64, radius as f64, 0.0, TAU);
            self.ctx.fill();
        }

        fn line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
            let (a, b) = (from + self.origin, to + self.origin);
            self.ctx.set_stroke_style_str(&css(color));
            self.ctx.set_line_width(width as f64);
            self.ctx.begin_path();
            self.ctx.move_to(a.x as f64, a.y as f64);
            self.ctx.line_to(b.x as f64, b.y as f64);
            self.ctx.stroke();
        }

        fn text(&mut self, pos: Vec2, text: &str, size: f32, color: Color) {
            let p = pos + self.origin;
            self.ctx.set_fill_style_str(&css(color));
            self.ctx.set_font(&format!("{}px monospace", size));
            let _ = self.ctx.fill_text(text, p.x as f64, p.y as f64);
        }
    }

    /// The page canvas
    struct CanvasMount {
        canvas: Option<HtmlCanvasElement>,
    }

    impl Mount for CanvasMount {
        fn create_surface(&mut self, width: f32, height: f32) -> Option<Box<dyn RenderSurface>> {
            let canvas = self.canvas.as_ref()?;
            canvas.set_width(width as u32);
            canvas.set_height(height as u32);
            let ctx = canvas
                .get_context("2d")
                .ok()
                .flatten()?
                .dyn_into::<CanvasRenderingContext2d>()
                .ok()?;
            ctx.set_text_align("center");
            Some(Box::new(CanvasSurface {
                ctx,
                size: Vec2::new(width, height),
                origin: Vec2::ZERO,
            }))
        }
    }

    struct App<G: ArcadeGame> {
        host: WidgetHost<G>,
        last_time: Option<f64>,
    }

    fn find_canvas() -> Option<HtmlCanvasElement> {
        web_sys::window()?
            .document()?
            .get_element_by_id(CANVAS_ID)?
            .dyn_into::<HtmlCanvasElement>()
            .ok()
    }

    fn open_store() -> Box<dyn KeyValueStore> {
        match LocalStorage::open() {
            Ok(storage) => Box::new(storage),
            Err(e) => {
                log::warn!("LocalStorage unavailable ({}), scores will not persist", e);
                Box::new(NullStore)
            }
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"Logger already initialized".into());
        }

        let canvas = find_canvas();
        let name = canvas
            .as_ref()
            .and_then(|c| c.get_attribute("data-game"))
            .unwrap_or_else(|| Snake::NAME.to_string());
        let seed = (now_micros() as u64) ^ 0x9e37_79b9;
        log::info!("Mounting {} (seed {})", name, seed);

        let mut mount = CanvasMount { canvas };
        match name.as_str() {
            "tetris" => launch(Tetris::new(seed), &mut mount),
            "asteroids" => launch(Asteroids::new(seed), &mut mount),
            "frogger" => launch(Frogger::new(seed), &mut mount),
            "spaceinvaders" => launch(SpaceInvaders::new(seed), &mut mount),
            "missilecommand" => launch(MissileCommand::new(seed), &mut mount),
            _ => launch(Snake::new(seed), &mut mount),
        }
    }

    fn now_micros() -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map_or(0.0, |p| p.now() * 1000.0)
    }

    fn launch<G: ArcadeGame + 'static>(game: G, mount: &mut CanvasMount) {
        let mut host = WidgetHost::new(game, open_store());
        if let Err(e) = host.initialize(mount) {
            log::error!("Failed to start {}: {}", G::NAME, e);
            return;
        }
        let app = Rc::new(RefCell::new(App {
            host,
            last_time: None,
        }));
        setup_input_handlers(app.clone());
        if let Some(canvas) = mount.canvas.clone() {
            setup_pointer_handlers(app.clone(), canvas);
        }
        setup_auto_pause(app.clone());
        request_animation_frame(app);
    }

    fn setup_input_handlers<G: ArcadeGame + 'static>(app: Rc<RefCell<App<G>>>) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };

        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let code = event.key_code();
                if matches!(
                    code,
                    keycode::LEFT | keycode::UP | keycode::RIGHT | keycode::DOWN | keycode::SPACE
                ) {
                    event.prevent_default();
                }
                app.borrow_mut().host.key_down(code);
            });
            let _ = document
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                app.borrow_mut().host.key_up(event.key_code());
            });
            let _ = document
                .add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    /// Mouse offset scaled from CSS pixels to field coordinates
    fn field_pos(canvas: &HtmlCanvasElement, event: &MouseEvent) -> Vec2 {
        let css_w = canvas.client_width().max(1) as f32;
        let css_h = canvas.client_height().max(1) as f32;
        Vec2::new(
            event.offset_x() as f32 * canvas.width() as f32 / css_w,
            event.offset_y() as f32 * canvas.height() as f32 / css_h,
        )
    }

    fn setup_pointer_handlers<G: ArcadeGame + 'static>(
        app: Rc<RefCell<App<G>>>,
        canvas: HtmlCanvasElement,
    ) {
        {
            let app = app.clone();
            let canvas_clone = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let pos = field_pos(&canvas_clone, &event);
                app.borrow_mut().host.pointer_move(pos);
            });
            let _ = canvas
                .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        {
            let app = app.clone();
            let canvas_clone = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                event.prevent_default();
                let pos = field_pos(&canvas_clone, &event);
                app.borrow_mut().host.pointer_down(pos);
            });
            let _ = canvas
                .add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                app.borrow_mut().host.pointer_leave();
            });
            let _ = canvas
                .add_event_listener_with_callback("mouseleave", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame<G: ArcadeGame + 'static>(app: Rc<RefCell<App<G>>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(app, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop<G: ArcadeGame + 'static>(app: Rc<RefCell<App<G>>>, time: f64) {
        {
            let mut a = app.borrow_mut();
            if !a.host.is_initialized() {
                return;
            }
            let dt = a.last_time.map_or(0.0, |last| ((time - last) / 1000.0) as f32);
            a.last_time = Some(time);
            a.host.frame(dt);
        }
        request_animation_frame(app);
    }

    fn setup_auto_pause<G: ArcadeGame + 'static>(app: Rc<RefCell<App<G>>>) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        let document_clone = document.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            if document_clone.visibility_state() == web_sys::VisibilityState::Hidden {
                let mut a = app.borrow_mut();
                if a.host.game().state().phase == GamePhase::Running {
                    a.host.pause();
                    log::info!("Auto-paused (tab hidden)");
                }
            }
        });
        let _ = document
            .add_event_listener_with_callback("visibilitychange", closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use arcade_cabinet::games::{Asteroids, Frogger, MissileCommand, Snake, SpaceInvaders, Tetris};

    env_logger::init();
    let name = std::env::args().nth(1).unwrap_or_else(|| "snake".to_string());
    let seed = 42;
    log::info!("Arcade Cabinet (native, headless) running {}", name);

    let snapshot = match name.as_str() {
        "tetris" => demo::run(Tetris::new(seed)),
        "asteroids" => demo::run(Asteroids::new(seed)),
        "frogger" => demo::run(Frogger::new(seed)),
        "spaceinvaders" => demo::run(SpaceInvaders::new(seed)),
        "missilecommand" => demo::run(MissileCommand::new(seed)),
        "snake" => demo::run(Snake::new(seed)),
        other => {
            eprintln!(
                "Unknown game '{}'. Choose snake, tetris, asteroids, frogger, spaceinvaders or missilecommand.",
                other
            );
            std::process::exit(2);
        }
    };
    match snapshot {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Headless run failed: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use arcade_cabinet::persistence::MemoryStore;
    use arcade_cabinet::platform::keycode;
    use arcade_cabinet::widget::{ArcadeGame, FRAME_DT, HeadlessMount};
    use arcade_cabinet::{GameWidget, WidgetError, WidgetHost};

    /// Key presses at fixed frames: (frame, key code)
    const SCRIPT: &[(u32, u32)] = &[
        (0, keycode::UP),
        (10, keycode::UP),
        (40, keycode::LEFT),
        (80, keycode::SPACE),
        (120, keycode::DOWN),
        (200, keycode::RIGHT),
    ];
    const FRAMES: u32 = 600;

    /// Play the scripted run and return the final snapshot
    pub fn run<G: ArcadeGame>(game: G) -> Result<String, WidgetError> {
        let mut host = WidgetHost::new(game, Box::new(MemoryStore::new()));
        let mut mount = HeadlessMount::new();
        host.initialize(&mut mount)?;

        for frame in 0..FRAMES {
            for &(at, code) in SCRIPT {
                if at == frame {
                    host.key_down(code);
                } else if at + 3 == frame {
                    host.key_up(code);
                }
            }
            host.frame(FRAME_DT);
        }

        let snapshot = host.read();
        host.destroy();
        Ok(snapshot)
    }
}
