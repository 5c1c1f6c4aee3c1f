use std::io::Stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use ratatui::Terminal;

use crate::catalog::{CatalogApi, ProductPayload};
use crate::config::AppConfig;
use crate::export::{self, ExportError};
use crate::search::SortField;
use crate::ui;

pub mod actions;
pub mod state;
pub mod view;

pub use actions::{ActionDispatcher, DispatchError, OperationKind, RemoteEvent};
pub use state::{AppState, DetailOverlay, FormState, LoadState, OverlayState};
pub use view::{render, ViewModel};

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    NextPage,
    PreviousPage,
    GoToPage,
    CyclePageSize,
    SortBy(SortField),
    StartSearch,
    OpenDetail,
    EditSelected,
    NewProduct,
    Export,
    Reload,
}

pub struct App {
    pub config: Arc<AppConfig>,
    state: AppState,
    dispatcher: ActionDispatcher,
    table_state: TableState,
    export_dir: PathBuf,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, api: Arc<dyn CatalogApi>) -> Self {
        let state = AppState::new(config.page_size(), config.view.default_sort);
        let export_dir = config.export.target_dir();
        Self {
            config,
            state,
            dispatcher: ActionDispatcher::new(api),
            table_state: TableState::default(),
            export_dir,
            should_quit: false,
            tick_rate: Duration::from_millis(100),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn run(&mut self) -> Result<()> {
        self.reload();
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            let view = view::render(&self.state);
            terminal
                .draw(|frame| ui::draw_app(frame, &view, &mut self.table_state))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
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
        for event in self.dispatcher.poll() {
            self.state.apply_remote(event);
        }
        self.state.set_busy(self.dispatcher.in_flight());
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if self.state.is_search_active() {
            match key.code {
                KeyCode::Esc => {
                    self.state.cancel_search();
                    return;
                }
                KeyCode::Enter => {
                    self.state.finish_search();
                    return;
                }
                KeyCode::Backspace => {
                    self.state.pop_search_char();
                    return;
                }
                KeyCode::Char(ch) if !has_command_modifier(key) => {
                    self.state.push_search_char(ch);
                    return;
                }
                _ => {}
            }
        }

        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Reload)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Char('l') | KeyCode::Right | KeyCode::PageDown => Some(Action::NextPage),
            KeyCode::Char('h') | KeyCode::Left | KeyCode::PageUp => Some(Action::PreviousPage),
            KeyCode::Char('g') if !has_command_modifier(key) => Some(Action::GoToPage),
            KeyCode::Char('s') if !has_command_modifier(key) => Some(Action::CyclePageSize),
            KeyCode::Char('P') => Some(Action::SortBy(SortField::Price)),
            KeyCode::Char('T') => Some(Action::SortBy(SortField::Title)),
            KeyCode::Char('/') => Some(Action::StartSearch),
            KeyCode::Enter => Some(Action::OpenDetail),
            KeyCode::Char('e') if !has_command_modifier(key) => Some(Action::EditSelected),
            KeyCode::Char('n') if !has_command_modifier(key) => Some(Action::NewProduct),
            KeyCode::Char('x') if !has_command_modifier(key) => Some(Action::Export),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::NextPage => {
                self.state.next_page();
            }
            Action::PreviousPage => {
                self.state.previous_page();
            }
            Action::GoToPage => self.state.open_go_to_page(),
            Action::CyclePageSize => {
                self.state.cycle_page_size();
                let size = self.state.page_size().get();
                self.state
                    .set_status_message(Some(format!("{size} products per page")));
            }
            Action::SortBy(field) => self.state.toggle_sort(field),
            Action::StartSearch => self.state.begin_search(),
            Action::OpenDetail => {
                if !self.state.open_detail() {
                    self.state.set_status_message(Some("No product selected"));
                }
            }
            Action::EditSelected => {
                if self.state.open_detail() && self.state.begin_edit() {
                    self.state.set_status_message(Some(
                        "Editing: Tab next field • Enter save • Esc back",
                    ));
                } else {
                    self.state.set_status_message(Some("No product selected"));
                }
            }
            Action::NewProduct => {
                self.state.open_create();
                self.state.set_status_message(Some(
                    "New product: Tab next field • Enter create • Esc cancel",
                ));
            }
            Action::Export => self.handle_export(),
            Action::Reload => self.reload(),
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        let Some(overlay) = self.state.overlay() else {
            return false;
        };
        match overlay {
            OverlayState::Detail(DetailOverlay { edit: None, .. }) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('q') => self.state.close_overlay(),
                    KeyCode::Char('e') if !has_command_modifier(key) => {
                        if self.state.begin_edit() {
                            self.state.set_status_message(Some(
                                "Editing: Tab next field • Enter save • Esc back",
                            ));
                        }
                    }
                    _ => {}
                }
            }
            OverlayState::Detail(DetailOverlay { edit: Some(_), .. }) => {
                if key.code == KeyCode::Esc {
                    self.state.cancel_edit();
                } else if key.code == KeyCode::Enter {
                    self.submit_update();
                } else {
                    self.handle_form_key(key);
                }
            }
            OverlayState::Create(_) => {
                if key.code == KeyCode::Esc {
                    self.state.close_overlay();
                    self.state.set_status_message(Some("Canceled new product"));
                } else if key.code == KeyCode::Enter {
                    self.submit_create();
                } else {
                    self.handle_form_key(key);
                }
            }
            OverlayState::GoToPage(_) => match key.code {
                KeyCode::Esc => self.state.close_overlay(),
                KeyCode::Enter => self.submit_go_to_page(),
                KeyCode::Backspace => {
                    if let Some(input) = self.state.go_to_page_input_mut() {
                        input.pop();
                    }
                }
                KeyCode::Char(ch) if ch.is_ascii_digit() => {
                    if let Some(input) = self.state.go_to_page_input_mut() {
                        if input.len() < 6 {
                            input.push(ch);
                        }
                    }
                }
                _ => {}
            },
        }
        true
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let Some(form) = self.state.active_form_mut() else {
            return;
        };
        match key.code {
            KeyCode::Tab | KeyCode::Down => form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => form.focus_previous(),
            KeyCode::Backspace => form.pop_char(),
            KeyCode::Char(ch) if !has_command_modifier(key) => form.push_char(ch),
            _ => {}
        }
    }

    fn submit_go_to_page(&mut self) {
        let requested = self
            .state
            .go_to_page_input_mut()
            .and_then(|input| input.parse::<usize>().ok());
        self.state.close_overlay();
        if let Some(page) = requested {
            self.state.go_to_page(page);
        }
    }

    fn submit_create(&mut self) {
        let Some(OverlayState::Create(form)) = self.state.overlay() else {
            return;
        };
        let payload = ProductPayload::for_create(
            form.value(0),
            form.value(1),
            form.value(2),
            form.value(3),
            form.value(4),
        );
        match payload {
            Ok(payload) => self.dispatch(|dispatcher| dispatcher.create(payload), "Creating product…"),
            Err(err) => self.state.set_status_message(Some(format!("Invalid product: {err}"))),
        }
    }

    fn submit_update(&mut self) {
        let Some(OverlayState::Detail(DetailOverlay {
            product_id,
            edit: Some(form),
        })) = self.state.overlay()
        else {
            return;
        };
        let id = *product_id;
        let Some(existing) = self.state.product(id) else {
            self.state.close_overlay();
            self.state
                .set_status_message(Some(format!("Product #{id} is no longer loaded")));
            return;
        };
        match ProductPayload::for_update(existing, form.value(0), form.value(1), form.value(2)) {
            Ok(payload) => {
                self.dispatch(|dispatcher| dispatcher.update(id, payload), "Saving product…")
            }
            Err(err) => self.state.set_status_message(Some(format!("Invalid product: {err}"))),
        }
    }

    fn reload(&mut self) {
        self.state.mark_loading();
        self.dispatch(ActionDispatcher::load, "Loading products…");
    }

    fn dispatch<F>(&mut self, start: F, pending: &str)
    where
        F: FnOnce(&mut ActionDispatcher) -> Result<(), DispatchError>,
    {
        match start(&mut self.dispatcher) {
            Ok(()) => self.state.set_status_message(Some(pending)),
            Err(err) => {
                tracing::warn!(%err, "remote operation not started");
                self.state.set_status_message(Some(err.to_string()));
            }
        }
        self.state.set_busy(self.dispatcher.in_flight());
    }

    fn handle_export(&mut self) {
        let products: Vec<_> = self.state.working_products().collect();
        match export::write_csv(&self.export_dir, products) {
            Ok(path) => {
                let count = self.state.working_len();
                self.state.set_status_message(Some(format!(
                    "Exported {count} products to {}",
                    path.display()
                )));
            }
            Err(ExportError::Empty) => {
                self.state.set_status_message(Some(ExportError::Empty.to_string()));
            }
            Err(err) => {
                tracing::error!(?err, "csv export failed");
                self.state
                    .set_status_message(Some(format!("Export failed: {err}")));
            }
        }
    }
}

fn has_command_modifier(key: KeyEvent) -> bool {
    key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("creating terminal backend")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("leaving alternate screen")?;
    terminal.show_cursor().context("showing cursor")?;
    Ok(())
}
