use std::fs;
use std::io::Stdout;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::eagle::EagleApi;
use crate::gallery::{load_note_gallery, GalleryLoad};
use crate::tags::SyncOutcome;
use crate::ui;
use crate::watch::{DocumentWatcher, WatchTarget};

pub mod actions;
pub mod state;

pub use actions::{describe_sync, ActionDispatcher, ServerStatus};
pub use state::{AppState, ContextMenuOverlay, GridLayout, LoadStatus};

enum Action {
    Quit,
    SelectLeft,
    SelectRight,
    SelectUp,
    SelectDown,
    OpenItem,
    ContextMenu,
    Reload,
    SyncTags,
}

/// Results posted back to the event loop by background work.
enum WorkerEvent {
    Gallery {
        generation: u64,
        result: Result<GalleryLoad, String>,
    },
    Server(ServerStatus),
    Synced(Result<SyncOutcome, String>),
}

pub struct App {
    pub config: Arc<AppConfig>,
    api: Arc<dyn EagleApi>,
    state: AppState,
    watcher: DocumentWatcher,
    should_quit: bool,
    tick_rate: Duration,
    worker_tx: Sender<WorkerEvent>,
    worker_rx: Receiver<WorkerEvent>,
}

impl App {
    pub fn new(config: Arc<AppConfig>, api: Arc<dyn EagleApi>, target: &Path) -> Result<Self> {
        let target = WatchTarget::from_path(target);
        let watcher = DocumentWatcher::spawn(target).context("starting document watcher")?;
        let (worker_tx, worker_rx) = unbounded();
        let state = AppState::new(config.label.clone());
        Ok(Self {
            config,
            api,
            state,
            watcher,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
            worker_tx,
            worker_rx,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        self.check_server();
        self.request_reload();
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    let width = ui::gallery_inner_width(frame.size());
                    self.state.relayout(width, &self.config.gallery);
                    ui::draw_app(frame, &self.state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        // relayout happens on the next draw
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        if self.watcher.poll() {
            self.request_reload();
        }
        while let Ok(event) = self.worker_rx.try_recv() {
            self.handle_worker_event(event);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.state.context_menu.is_some() {
            match key.code {
                KeyCode::Esc | KeyCode::Char('q') => self.state.close_context_menu(),
                KeyCode::Char('j') | KeyCode::Down => self.state.move_context_selection(1),
                KeyCode::Char('k') | KeyCode::Up => self.state.move_context_selection(-1),
                KeyCode::Enter => {
                    if let Some(link) = self.state.confirm_context_menu() {
                        self.open_link(&link);
                    }
                }
                _ => {}
            }
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('h') | KeyCode::Left => Some(Action::SelectLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(Action::SelectRight),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectUp),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectDown),
            KeyCode::Enter => Some(Action::OpenItem),
            KeyCode::Char('m') if plain => Some(Action::ContextMenu),
            KeyCode::Char('r') if plain => Some(Action::Reload),
            KeyCode::Char('s') if plain => Some(Action::SyncTags),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectLeft => self.state.move_horizontal(-1),
            Action::SelectRight => self.state.move_horizontal(1),
            Action::SelectUp => self.state.move_vertical(-1),
            Action::SelectDown => self.state.move_vertical(1),
            Action::OpenItem => {
                if let Some(link) = self.state.hovered_link() {
                    self.open_link(&link);
                }
            }
            Action::ContextMenu => self.state.open_context_menu(),
            Action::Reload => {
                self.check_server();
                self.request_reload();
            }
            Action::SyncTags => self.request_sync(),
        }
    }

    fn active_document(&mut self) -> Option<PathBuf> {
        let active = self.watcher.active().map(Path::to_path_buf);
        if active.is_none() {
            self.state
                .set_status_message(Some("Waiting for a markdown note to be opened or edited"));
        }
        active
    }

    fn check_server(&self) {
        let api = Arc::clone(&self.api);
        let tx = self.worker_tx.clone();
        thread::spawn(move || {
            let status = ActionDispatcher::new(api.as_ref()).check_server();
            let _ = tx.send(WorkerEvent::Server(status));
        });
    }

    fn request_reload(&mut self) {
        let Some(document) = self.active_document() else {
            return;
        };
        let generation = self.state.begin_load(&document);
        tracing::debug!(generation, document = %document.display(), "reloading gallery");
        let api = Arc::clone(&self.api);
        let config = Arc::clone(&self.config);
        let tx = self.worker_tx.clone();
        thread::spawn(move || {
            let result = fs::read_to_string(&document)
                .map(|text| {
                    load_note_gallery(api.as_ref(), &text, &config.folder_field, &config.gallery)
                })
                .map_err(|err| format!("reading {}: {err}", document.display()));
            let _ = tx.send(WorkerEvent::Gallery { generation, result });
        });
    }

    fn request_sync(&mut self) {
        let Some(document) = self.active_document() else {
            return;
        };
        self.state.set_status_message(Some("Syncing tags…"));
        let api = Arc::clone(&self.api);
        let field = self.config.folder_field.clone();
        let tx = self.worker_tx.clone();
        thread::spawn(move || {
            let result = ActionDispatcher::new(api.as_ref())
                .sync_tags(&document, &field)
                .map_err(|err| format!("{err:#}"));
            let _ = tx.send(WorkerEvent::Synced(result));
        });
    }

    fn handle_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Gallery { generation, result } => match result {
                Ok(load) => {
                    if self.state.finish_load(generation, load) {
                        self.state.set_status_message(None::<String>);
                    }
                }
                Err(message) => {
                    tracing::warn!(%message, "active document unreadable");
                    if self.state.fail_load(generation) {
                        self.state.set_status_message(Some(message));
                    }
                }
            },
            WorkerEvent::Server(status) => self.state.server = status,
            WorkerEvent::Synced(Ok(outcome)) => {
                self.state.set_status_message(Some(describe_sync(&outcome)));
            }
            WorkerEvent::Synced(Err(message)) => {
                tracing::error!(%message, "tag sync failed");
                self.state.set_status_message(Some(message));
            }
        }
    }

    fn open_link(&mut self, link: &str) {
        if let Err(err) = ActionDispatcher::new(self.api.as_ref()).open_link(link) {
            tracing::error!(?err, "failed to open deep link");
            self.state
                .set_status_message(Some(format!("Could not open {link}")));
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}
