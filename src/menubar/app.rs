//! Main application logic for the mdpaste menubar app.

use crate::config::Config;
use crate::menubar::menu::build_menu;
use crate::menubar::platform::{self, MacLoginItems, MacNotifications};
use crate::menubar::renderer::Renderer;
use crate::menubar::settings::{render_settings, SETTINGS_HEIGHT, SETTINGS_TITLE, SETTINGS_WIDTH};
use crate::menubar::view::{dispatch, menu_entries, Flow, MenuAction, MenuEntry};
use crate::prefs::{Preferences, TomlFileStore};
use crate::services::WindowService;
use crate::state::{AppState, PreferenceEdit};
use crate::watcher::PreferencesWatcher;
use anyhow::{Context, Result};
use chrono::Utc;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tao::dpi::LogicalSize;
use tao::event::{Event, StartCause, WindowEvent};
use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy};
use tao::platform::macos::{ActivationPolicy, EventLoopExtMacOS};
use tao::window::{Window, WindowBuilder};
use tray_icon::menu::MenuEvent;
use tray_icon::{TrayIcon, TrayIconBuilder};

/// Events posted to the event loop from outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    /// Deferred state work is queued (e.g. a permission reply arrived)
    StatePending,
    /// Raise the settings window; posted so it runs on the next tick
    RaiseSettings,
}

/// The settings window and its egui plumbing.
struct SettingsWindow {
    window: Window,
    renderer: Renderer,
    proxy: EventLoopProxy<UserEvent>,
    visible: bool,
    cursor_pos: egui::Pos2,
    egui_input: egui::RawInput,
    /// When egui requests a future repaint (e.g. for animations), we schedule
    /// a window redraw at this instant.
    next_repaint: Option<Instant>,
}

impl SettingsWindow {
    fn new(event_loop: &EventLoop<UserEvent>, prefs: &Preferences) -> Result<Self> {
        let window = WindowBuilder::new()
            .with_title(SETTINGS_TITLE)
            .with_inner_size(LogicalSize::new(SETTINGS_WIDTH as f64, SETTINGS_HEIGHT as f64))
            .with_resizable(false)
            .with_visible(false)
            .build(event_loop)
            .context("Failed to create settings window")?;

        let mut renderer = Renderer::new(&window)?;
        // Warmup render so the first open is instant
        if let Err(e) = renderer.warmup(|ctx| {
            render_settings(ctx, prefs);
        }) {
            tracing::debug!("Settings warmup render failed: {:#}", e);
        }
        let egui_input = renderer.create_input();

        Ok(Self {
            window,
            renderer,
            proxy: event_loop.create_proxy(),
            visible: false,
            cursor_pos: egui::pos2(0.0, 0.0),
            egui_input,
            next_repaint: None,
        })
    }

    fn show(&mut self) {
        self.visible = true;
        self.window.set_visible(true);
        self.window.request_redraw();
    }

    fn hide(&mut self) {
        self.visible = false;
        self.next_repaint = None;
        self.window.set_visible(false);
    }

    fn request_redraw(&self) {
        if self.visible {
            self.window.request_redraw();
        }
    }

    /// Redraw if a scheduled egui repaint is due.
    fn poll_repaint(&mut self) {
        if let Some(repaint_at) = self.next_repaint {
            if Instant::now() >= repaint_at {
                self.next_repaint = None;
                self.request_redraw();
            }
        }
    }

    fn handle_resize(&mut self, width: u32, height: u32) {
        self.renderer.resize(width, height);
        self.egui_input = self.renderer.create_input();
    }

    fn handle_scale_factor_change(&mut self, scale_factor: f64) {
        self.renderer.set_scale_factor(scale_factor);
        let size = self.window.inner_size();
        self.handle_resize(size.width, size.height);
    }

    fn handle_cursor_move(&mut self, x: f64, y: f64) {
        let scale_factor = self.renderer.scale_factor();
        let pos = egui::pos2(
            x as f32 / scale_factor as f32,
            y as f32 / scale_factor as f32,
        );
        self.cursor_pos = pos;
        self.egui_input.events.push(egui::Event::PointerMoved(pos));
        self.request_redraw();
    }

    fn handle_mouse_input(
        &mut self,
        state: tao::event::ElementState,
        button: tao::event::MouseButton,
    ) {
        let egui_button = match button {
            tao::event::MouseButton::Left => egui::PointerButton::Primary,
            tao::event::MouseButton::Right => egui::PointerButton::Secondary,
            tao::event::MouseButton::Middle => egui::PointerButton::Middle,
            _ => egui::PointerButton::Primary,
        };

        self.egui_input.events.push(egui::Event::PointerButton {
            pos: self.cursor_pos,
            button: egui_button,
            pressed: state == tao::event::ElementState::Pressed,
            modifiers: egui::Modifiers::default(),
        });
        self.request_redraw();
    }

    fn handle_cursor_left(&mut self) {
        self.egui_input.events.push(egui::Event::PointerGone);
        self.request_redraw();
    }

    /// Render one frame and return the edits the user made in it.
    fn redraw(&mut self, prefs: &Preferences) -> Vec<PreferenceEdit> {
        if !self.visible {
            return Vec::new();
        }

        let input = std::mem::replace(&mut self.egui_input, self.renderer.create_input());
        match self.renderer.render(input, |ctx| render_settings(ctx, prefs)) {
            Ok((edits, repaint_after)) => {
                if repaint_after < Duration::from_secs(1) {
                    self.next_repaint = Some(Instant::now() + repaint_after);
                }
                edits
            }
            Err(e) => {
                tracing::warn!("Render error: {:#}", e);
                Vec::new()
            }
        }
    }
}

impl WindowService for SettingsWindow {
    fn supports_foreground_activation(&self) -> bool {
        platform::supports_foreground_activation()
    }

    fn activate_app(&mut self) {
        platform::activate_app();
    }

    fn open_settings(&mut self) {
        self.show();
    }

    fn raise_on_next_tick(&mut self) {
        if self.proxy.send_event(UserEvent::RaiseSettings).is_err() {
            tracing::debug!("Event loop closed before settings could be raised");
        }
    }
}

/// Main menubar application.
pub struct MenubarApp {
    state: AppState,
    tray_icon: TrayIcon,
    settings: SettingsWindow,
    watcher: Option<PreferencesWatcher>,
    /// Entries behind the menu currently installed on the tray icon
    rendered: Vec<MenuEntry>,
    /// Set by the state listener; cleared once the settings window redraws
    dirty: Rc<Cell<bool>>,
    refresh_interval: Duration,
}

impl MenubarApp {
    /// Run the menubar application.
    pub fn run() -> Result<()> {
        tracing::info!("Starting...");

        let config = Config::load();
        let prefs_path = Config::preferences_path()?;
        tracing::info!("Preferences file: {}", prefs_path.display());

        // Create event loop with Accessory policy (no dock icon)
        let mut event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
        event_loop.set_activation_policy(ActivationPolicy::Accessory);

        let mut state = AppState::new(
            Box::new(TomlFileStore::open(&prefs_path)),
            Box::new(MacLoginItems),
            Box::new(MacNotifications),
        );

        // Permission replies arrive on an OS thread; wake the loop so they
        // are applied on the main thread
        let waker_proxy = Mutex::new(event_loop.create_proxy());
        state.set_waker(Arc::new(move || {
            if let Ok(proxy) = waker_proxy.lock() {
                let _ = proxy.send_event(UserEvent::StatePending);
            }
        }));

        let dirty = Rc::new(Cell::new(false));
        {
            let dirty = dirty.clone();
            state.subscribe(move |change| {
                tracing::debug!("State changed: {:?}", change);
                dirty.set(true);
            });
        }

        let settings = SettingsWindow::new(&event_loop, state.preferences())?;

        let rendered = menu_entries(&state, Utc::now());
        let tray_icon = TrayIconBuilder::new()
            .with_menu(Box::new(build_menu(&rendered)))
            .with_tooltip("MarkdownPaste")
            .with_title(&config.menubar.title)
            .build()
            .context("Failed to create tray icon")?;

        let watcher = match PreferencesWatcher::new(&prefs_path) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!("Not watching preferences for outside edits: {:#}", e);
                None
            }
        };

        let mut app = Self {
            state,
            tray_icon,
            settings,
            watcher,
            rendered,
            dirty,
            refresh_interval: config.menubar.refresh_interval(),
        };

        tracing::info!("Tray icon created, entering event loop...");

        event_loop.run(move |event, _event_loop, control_flow| {
            // Poll faster while an egui animation repaint is pending
            let poll_interval = if app.settings.next_repaint.is_some() {
                Duration::from_millis(16)
            } else {
                app.refresh_interval
            };
            *control_flow = ControlFlow::WaitUntil(Instant::now() + poll_interval);

            // Handle menu events
            while let Ok(menu_event) = MenuEvent::receiver().try_recv() {
                let Some(action) = MenuAction::from_id(menu_event.id.0.as_str()) else {
                    continue;
                };
                if app.handle_action(action) == Flow::Exit {
                    tracing::info!("Quit requested");
                    *control_flow = ControlFlow::Exit;
                    return;
                }
            }

            match event {
                Event::NewEvents(StartCause::ResumeTimeReached { .. }) => {
                    app.poll_preferences();
                    app.settings.poll_repaint();
                }

                Event::UserEvent(UserEvent::StatePending) => {
                    app.state.process_pending();
                }

                Event::UserEvent(UserEvent::RaiseSettings) => {
                    if !platform::raise_first_key_window() {
                        tracing::debug!("No visible window to raise");
                    }
                }

                Event::WindowEvent {
                    event: WindowEvent::CloseRequested,
                    ..
                } => {
                    app.settings.hide();
                }

                Event::WindowEvent {
                    event: WindowEvent::Resized(new_size),
                    ..
                } => {
                    app.settings.handle_resize(new_size.width, new_size.height);
                }

                Event::WindowEvent {
                    event: WindowEvent::ScaleFactorChanged { scale_factor, .. },
                    ..
                } => {
                    app.settings.handle_scale_factor_change(scale_factor);
                }

                Event::WindowEvent {
                    event: WindowEvent::CursorMoved { position, .. },
                    ..
                } => {
                    app.settings.handle_cursor_move(position.x, position.y);
                }

                Event::WindowEvent {
                    event: WindowEvent::CursorLeft { .. },
                    ..
                } => {
                    app.settings.handle_cursor_left();
                }

                Event::WindowEvent {
                    event: WindowEvent::MouseInput { state, button, .. },
                    ..
                } => {
                    app.settings.handle_mouse_input(state, button);
                }

                Event::WindowEvent {
                    event:
                        WindowEvent::KeyboardInput {
                            event:
                                tao::event::KeyEvent {
                                    physical_key: tao::keyboard::KeyCode::Escape,
                                    state: tao::event::ElementState::Pressed,
                                    ..
                                },
                            ..
                        },
                    ..
                } => {
                    app.settings.hide();
                }

                Event::RedrawRequested(_) => {
                    app.redraw_settings();
                }

                _ => {}
            }

            app.refresh();
        });
    }

    fn handle_action(&mut self, action: MenuAction) -> Flow {
        dispatch(action, &mut self.state, &mut self.settings)
    }

    /// Reload preferences if the file changed outside the app.
    fn poll_preferences(&mut self) {
        let Some(ref mut watcher) = self.watcher else {
            return;
        };
        if !watcher.poll_changes() {
            return;
        }
        match self.state.reload_preferences() {
            Ok(changes) if !changes.is_empty() => {
                tracing::info!("Reloaded preferences: {:?}", changes);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to reload preferences: {:#}", e),
        }
    }

    fn redraw_settings(&mut self) {
        let prefs = self.state.preferences().clone();
        for edit in self.settings.redraw(&prefs) {
            // The value is kept either way
            if let Err(e) = self.state.apply(edit) {
                tracing::debug!("Settings edit {:?} failed: {:#}", edit, e);
            }
        }
    }

    /// Rebuild the tray menu when its contents changed and redraw the
    /// settings window after state changes.
    fn refresh(&mut self) {
        let entries = menu_entries(&self.state, Utc::now());
        if entries != self.rendered {
            self.tray_icon.set_menu(Some(Box::new(build_menu(&entries))));
            self.rendered = entries;
        }

        if self.dirty.replace(false) {
            self.settings.request_redraw();
        }
    }
}
