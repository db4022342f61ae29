// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod form;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use form::{FormKind, FormSubmission, FormUiState};
use nisesales_app::{
    ActiveTab, Activity, ActivityId, BulkReassignRequest, CompanyId, CrmError, CrmResult,
    DropOutcome, FilterColumn, Gesture, ListChange, ListId, ListTab, Menu, Persistence,
    PointerDown, PointerModifiers, RepresentativeTab, ScrollDirection, ScrollTick,
    SelectCondition, UNSET_LABEL, ViewMode, Workspace, accepts_drop, filter_options,
    format_iso_date, format_yen, tab_ids,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use time::{Date, OffsetDateTime};
use tracing::{info, warn};

const IDLE_POLL: Duration = Duration::from_millis(120);
const HALF_PAGE_ROWS: isize = 10;
const FULL_PAGE_ROWS: isize = 20;
const WHEEL_ROWS: isize = 3;
const CHECKBOX_WIDTH: u16 = 3;
const TAB_PADDING: &str = " ";
const TAB_DIVIDER: &str = "|";
const FILTER_MARK_ACTIVE: &str = "▼";

/// What the terminal UI needs from its host: a backend to write through and
/// a few environment facts.
pub trait AppRuntime {
    fn persistence(&mut self) -> &mut dyn Persistence;
    fn user_name(&self) -> &str;
    fn read_import_file(&mut self, path: &str) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("read import file {path}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputKind {
    /// Live search; `previous` comes back on escape.
    Search { previous: String },
    ImportPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InputUiState {
    kind: InputKind,
    buffer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BulkField {
    #[default]
    Representative,
    List,
}

/// Choice 0 is "no change" for both fields; list choice 1 is "unassign".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct BulkFormUiState {
    field: BulkField,
    representative: usize,
    list: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingListDelete {
    id: ListId,
    prompt: String,
}

/// Company detail overlay: the record plus its activity timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DetailUiState {
    company: CompanyId,
    /// Index into the newest-first timeline.
    cursor: usize,
    confirm_delete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TabRegion {
    tab: ActiveTab,
    start: u16,
    end: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GridGeometry {
    header_y: u16,
    body: Rect,
    checkbox_end: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    area: Rect,
    user_name: String,
    cursor: usize,
    scroll: usize,
    status_line: Option<String>,
    status_token: u64,
    help_visible: bool,
    input: Option<InputUiState>,
    filter_column_cursor: Option<usize>,
    filter_option_cursor: usize,
    menu_cursor: usize,
    bulk_form: BulkFormUiState,
    pending_list_delete: Option<PendingListDelete>,
    detail: Option<DetailUiState>,
    form: Option<FormUiState>,
    drag_candidate: Option<CompanyId>,
    drop_hover: Option<ActiveTab>,
}

pub fn run_app<R: AppRuntime>(workspace: &mut Workspace, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen, EnableMouseCapture)
        .context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData {
        user_name: runtime.user_name().to_owned(),
        ..ViewData::default()
    };
    let (internal_tx, internal_rx) = mpsc::channel();

    let mut result = Ok(());
    loop {
        process_internal_events(&mut view_data, &internal_rx);
        advance_autoscroll(workspace, &mut view_data, Instant::now());

        if let Err(error) = terminal.draw(|frame| {
            view_data.area = frame.area();
            render(frame, workspace, &view_data);
        }) {
            result = Err(error).context("draw frame");
            break;
        }

        let timeout = workspace
            .time_until_tick(Instant::now())
            .map_or(IDLE_POLL, |due| due.min(IDLE_POLL));
        let has_event = event::poll(timeout).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(workspace, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Mouse(mouse) => {
                    handle_mouse_event(
                        workspace,
                        runtime,
                        &mut view_data,
                        &internal_tx,
                        mouse,
                        Instant::now(),
                    );
                }
                _ => {}
            }
        }
    }

    workspace.cancel();
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), DisableMouseCapture, terminal::LeaveAlternateScreen)
        .context("leave alternate screen")?;
    result
}

fn process_internal_events(view_data: &mut ViewData, rx: &Receiver<InternalEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.status_line = None;
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status_line = Some(message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn report_error(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>, error: &CrmError) {
    if !error.is_validation() {
        warn!(error = %error, "operation failed");
    }
    emit_status(view_data, internal_tx, error.to_string());
}

fn handle_key_event<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.input.is_some() {
        handle_input_key(workspace, runtime, view_data, internal_tx, key);
    } else if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
    } else if view_data.form.is_some() {
        handle_form_key(workspace, runtime, view_data, internal_tx, key);
    } else if workspace.pending_delete().is_some() {
        handle_delete_confirm_key(workspace, runtime, view_data, internal_tx, key);
    } else if view_data.pending_list_delete.is_some() {
        handle_list_delete_key(workspace, runtime, view_data, internal_tx, key);
    } else if view_data.detail.is_some() {
        handle_detail_key(workspace, runtime, view_data, internal_tx, key);
    } else if let Some(column) = workspace.filters().open_column() {
        handle_filter_options_key(workspace, view_data, internal_tx, column, key);
    } else if view_data.filter_column_cursor.is_some() {
        handle_filter_column_key(workspace, view_data, internal_tx, key);
    } else {
        match workspace.menu() {
            Menu::SelectionOptions => {
                handle_selection_menu_key(workspace, view_data, internal_tx, key);
            }
            Menu::BulkAssign => {
                handle_bulk_form_key(workspace, runtime, view_data, internal_tx, key);
            }
            Menu::Closed => handle_nav_key(workspace, runtime, view_data, internal_tx, key),
        }
    }

    sync_viewport(workspace, view_data);
    false
}

fn handle_nav_key<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if let Some(delta) = cursor_delta_for_key(key) {
        move_cursor(workspace, view_data, delta);
        return;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            view_data.drag_candidate = None;
            if workspace.drag_payload().is_some() {
                workspace.end_drag();
                view_data.drop_hover = None;
                emit_status(view_data, internal_tx, "drag canceled");
            }
            workspace.cancel();
        }
        (KeyCode::Char('?'), _) => view_data.help_visible = true,
        (KeyCode::Char(' '), _) => {
            let visible = workspace.visible_ids();
            if let Some(id) = visible.get(view_data.cursor).copied() {
                workspace.toggle_selected(id);
            }
        }
        (KeyCode::Char('a'), KeyModifiers::NONE) => {
            workspace.toggle_all_visible();
            let count = workspace.selection().len();
            emit_status(view_data, internal_tx, format!("{count} selected"));
        }
        (KeyCode::Char('x'), KeyModifiers::NONE) => {
            workspace.clear_selection();
            emit_status(view_data, internal_tx, "selection cleared");
        }
        (KeyCode::Char('m'), KeyModifiers::NONE) => {
            view_data.menu_cursor = 0;
            if let Err(error) = workspace.open_menu(Menu::SelectionOptions) {
                report_error(view_data, internal_tx, &error);
            }
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            view_data.bulk_form = BulkFormUiState::default();
            if let Err(error) = workspace.open_menu(Menu::BulkAssign) {
                report_error(view_data, internal_tx, &error);
            }
        }
        (KeyCode::Char('D'), _) => {
            if let Err(error) = workspace.request_delete_selected() {
                report_error(view_data, internal_tx, &error);
            }
        }
        (KeyCode::Char('f'), KeyModifiers::NONE) => cycle_tab(workspace, view_data, true),
        (KeyCode::Char('b'), KeyModifiers::NONE) => cycle_tab(workspace, view_data, false),
        (KeyCode::Char('v'), KeyModifiers::NONE) => {
            workspace.toggle_view_mode();
            reset_viewport(view_data);
            let label = view_mode_label(workspace.view_mode());
            emit_status(view_data, internal_tx, format!("view {label}"));
        }
        (KeyCode::Char('/'), _) => {
            let previous = workspace.search().to_owned();
            view_data.input = Some(InputUiState {
                buffer: previous.clone(),
                kind: InputKind::Search { previous },
            });
        }
        (KeyCode::Char('F'), _) => {
            view_data.filter_column_cursor = Some(0);
        }
        (KeyCode::Char('C'), _) => {
            workspace.clear_filters();
            emit_status(view_data, internal_tx, "filters cleared");
        }
        (KeyCode::Char('R'), _) => match workspace.reload(runtime.persistence()) {
            Ok(()) => emit_status(view_data, internal_tx, "reloaded"),
            Err(error) => report_error(view_data, internal_tx, &CrmError::from(error)),
        },
        (KeyCode::Char('I'), _) => {
            view_data.input = Some(InputUiState {
                kind: InputKind::ImportPath,
                buffer: String::new(),
            });
        }
        (KeyCode::Char('X'), _) => delete_active_tab(workspace, runtime, view_data, internal_tx),
        (KeyCode::Enter, _) | (KeyCode::Char('o'), KeyModifiers::NONE) => {
            if let Some(id) = workspace.visible_ids().get(view_data.cursor).copied() {
                view_data.detail = Some(DetailUiState {
                    company: id,
                    cursor: 0,
                    confirm_delete: false,
                });
            }
        }
        (KeyCode::Char('n'), KeyModifiers::NONE) => {
            open_form(workspace, view_data, internal_tx, FormKind::AddCompany);
        }
        (KeyCode::Char('e'), KeyModifiers::NONE) => {
            if let Some(id) = workspace.visible_ids().get(view_data.cursor).copied() {
                open_form(workspace, view_data, internal_tx, FormKind::EditCompany(id));
            }
        }
        (KeyCode::Char('N'), _) => {
            let kind = match workspace.view_mode() {
                ViewMode::ByList => FormKind::AddList,
                ViewMode::ByRepresentative => FormKind::AddRepresentative,
            };
            open_form(workspace, view_data, internal_tx, kind);
        }
        (KeyCode::Char('E'), _) => match workspace.active_tab() {
            ActiveTab::List(ListTab::List(id)) => {
                open_form(workspace, view_data, internal_tx, FormKind::EditList(id));
            }
            ActiveTab::Representative(RepresentativeTab::Representative(id)) => {
                open_form(
                    workspace,
                    view_data,
                    internal_tx,
                    FormKind::EditRepresentative(id),
                );
            }
            _ => emit_status(
                view_data,
                internal_tx,
                "switch to a list or representative tab to edit it",
            ),
        },
        _ => {}
    }
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

fn open_form(
    workspace: &Workspace,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: FormKind,
) {
    match FormUiState::open(kind, workspace.store(), today()) {
        Ok(mut form) => {
            form.preselect_tab(workspace.active_tab(), workspace.store());
            view_data.form = Some(form);
        }
        Err(error) => report_error(view_data, internal_tx, &error),
    }
}

fn handle_form_key<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(mut form) = view_data.form.take() else {
        return;
    };
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            emit_status(view_data, internal_tx, "form canceled");
            return;
        }
        (KeyCode::Enter, _) => match submit_form(workspace, runtime, view_data, &form) {
            Ok(message) => {
                emit_status(view_data, internal_tx, message);
                return;
            }
            Err(error) => {
                let prefix = if error.is_validation() {
                    "form invalid"
                } else {
                    warn!(error = %error, form = form.kind().title(), "form save failed");
                    "save failed"
                };
                emit_status(view_data, internal_tx, format!("{prefix}: {error}"));
            }
        },
        (KeyCode::Tab | KeyCode::Down, _) => form.move_field(1),
        (KeyCode::BackTab | KeyCode::Up, _) => form.move_field(-1),
        (KeyCode::Left, _) => form.cycle_choice(workspace.store(), -1),
        (KeyCode::Right, _) => form.cycle_choice(workspace.store(), 1),
        (KeyCode::Char(' '), _) if form.is_choice_field() => {
            form.cycle_choice(workspace.store(), 1);
        }
        (KeyCode::Char(ch), _) if form.is_choice_field() => {
            let store = workspace.store();
            if let Some(index) = digit_choice(ch, form.choice_count(store)) {
                form.pick_choice(store, index);
            }
        }
        (KeyCode::Char('u'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            form.clear_field();
        }
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            form.push_char(ch);
        }
        (KeyCode::Backspace, _) => form.pop_char(),
        _ => {}
    }
    view_data.form = Some(form);
}

/// Runs the workspace operation behind a submitted form and returns the
/// status message.
fn submit_form<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    form: &FormUiState,
) -> CrmResult<String> {
    let submission = form.submission(workspace.store())?;
    let persistence = runtime.persistence();
    let message = match submission {
        FormSubmission::AddCompany(input) => {
            let id = workspace.add_company(persistence, &input)?;
            if let Some(index) = workspace.visible_ids().iter().position(|row| *row == id) {
                view_data.cursor = index;
            }
            format!("added company {}", input.name)
        }
        FormSubmission::EditCompany(id, patch) => {
            workspace.update_company(persistence, id, &patch)?;
            format!("saved company {}", patch.name.unwrap_or_default())
        }
        FormSubmission::AddActivity(input) => {
            let kind = input.kind.label();
            workspace.add_activity(persistence, input)?;
            if let Some(detail) = view_data.detail.as_mut() {
                detail.cursor = 0;
            }
            format!("added {kind} activity")
        }
        FormSubmission::EditActivity(id, input) => {
            workspace.update_activity(persistence, id, input)?;
            "saved activity".to_owned()
        }
        FormSubmission::AddRepresentative(input) => {
            let id = workspace.add_representative(persistence, &input)?;
            if workspace.view_mode() == ViewMode::ByRepresentative {
                workspace.set_active_tab(ActiveTab::Representative(
                    RepresentativeTab::Representative(id),
                ));
                reset_viewport(view_data);
            }
            format!("added representative {}", input.name)
        }
        FormSubmission::EditRepresentative(id, input) => {
            workspace.update_representative(persistence, id, &input)?;
            format!("saved representative {}", input.name)
        }
        FormSubmission::AddList(input) => {
            let id = workspace.add_list(persistence, &input)?;
            if workspace.view_mode() == ViewMode::ByList {
                workspace.set_active_tab(ActiveTab::List(ListTab::List(id)));
                reset_viewport(view_data);
            }
            format!("added list {}", input.name)
        }
        FormSubmission::EditList(id, input) => {
            workspace.update_list(persistence, id, &input)?;
            format!("saved list {}", input.name)
        }
    };
    info!(form = form.kind().title(), "form saved");
    Ok(message)
}

fn detail_activity_ids(workspace: &Workspace, company: CompanyId) -> Vec<ActivityId> {
    workspace
        .store()
        .activities_for(company)
        .iter()
        .map(|activity| activity.id)
        .collect()
}

fn handle_detail_key<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(mut detail) = view_data.detail.take() else {
        return;
    };
    if workspace.store().company(detail.company).is_none() {
        return;
    }
    let activities = detail_activity_ids(workspace, detail.company);
    let selected = activities.get(detail.cursor).copied();

    if detail.confirm_delete {
        detail.confirm_delete = false;
        match (key.code, selected) {
            (KeyCode::Char('y'), Some(id)) => {
                match workspace.delete_activity(runtime.persistence(), id) {
                    Ok(()) => emit_status(view_data, internal_tx, "deleted activity"),
                    Err(error) => report_error(view_data, internal_tx, &error),
                }
            }
            _ => emit_status(view_data, internal_tx, "delete canceled"),
        }
        let remaining = detail_activity_ids(workspace, detail.company).len();
        detail.cursor = detail.cursor.min(remaining.saturating_sub(1));
        view_data.detail = Some(detail);
        return;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => return,
        (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
            detail.cursor = (detail.cursor + 1).min(activities.len().saturating_sub(1));
        }
        (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
            detail.cursor = detail.cursor.saturating_sub(1);
        }
        (KeyCode::Char('n'), KeyModifiers::NONE) => {
            open_form(
                workspace,
                view_data,
                internal_tx,
                FormKind::AddActivity(detail.company),
            );
        }
        (KeyCode::Char('e'), KeyModifiers::NONE) | (KeyCode::Enter, _) => match selected {
            Some(id) => open_form(workspace, view_data, internal_tx, FormKind::EditActivity(id)),
            None => emit_status(view_data, internal_tx, "no activity to edit"),
        },
        (KeyCode::Char('d'), KeyModifiers::NONE) => {
            if selected.is_some() {
                detail.confirm_delete = true;
            }
        }
        (KeyCode::Char('E'), _) => {
            open_form(
                workspace,
                view_data,
                internal_tx,
                FormKind::EditCompany(detail.company),
            );
        }
        _ => {}
    }
    view_data.detail = Some(detail);
}

fn cursor_delta_for_key(key: KeyEvent) -> Option<isize> {
    match (key.code, key.modifiers) {
        (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => Some(1),
        (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => Some(-1),
        (KeyCode::Char('d'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            Some(HALF_PAGE_ROWS)
        }
        (KeyCode::Char('u'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            Some(-HALF_PAGE_ROWS)
        }
        (KeyCode::PageDown, _) => Some(FULL_PAGE_ROWS),
        (KeyCode::PageUp, _) => Some(-FULL_PAGE_ROWS),
        (KeyCode::Char('g'), KeyModifiers::NONE) => Some(isize::MIN),
        (KeyCode::Char('G'), _) => Some(isize::MAX),
        _ => None,
    }
}

fn move_cursor(workspace: &Workspace, view_data: &mut ViewData, delta: isize) {
    let len = workspace.visible_ids().len();
    if len == 0 {
        view_data.cursor = 0;
        return;
    }
    let next = view_data.cursor.saturating_add_signed(delta);
    view_data.cursor = next.min(len - 1);
}

fn reset_viewport(view_data: &mut ViewData) {
    view_data.cursor = 0;
    view_data.scroll = 0;
}

/// Clamps the cursor to the visible list and scrolls it into view. While
/// auto-scroll runs the viewport belongs to the scroll ticks.
fn sync_viewport(workspace: &Workspace, view_data: &mut ViewData) {
    let len = workspace.visible_ids().len();
    let height = usize::from(grid_geometry(view_data.area).body.height);
    view_data.cursor = view_data.cursor.min(len.saturating_sub(1));
    if !workspace.selection().is_autoscrolling() && height > 0 {
        if view_data.cursor < view_data.scroll {
            view_data.scroll = view_data.cursor;
        } else if view_data.cursor >= view_data.scroll + height {
            view_data.scroll = view_data.cursor + 1 - height;
        }
    }
    view_data.scroll = view_data.scroll.min(len.saturating_sub(height));
}

fn cycle_tab(workspace: &mut Workspace, view_data: &mut ViewData, forward: bool) {
    let tabs = workspace.tabs();
    if tabs.is_empty() {
        return;
    }
    let current = tabs
        .iter()
        .position(|tab| *tab == workspace.active_tab())
        .unwrap_or(0);
    let next = if forward {
        (current + 1) % tabs.len()
    } else {
        (current + tabs.len() - 1) % tabs.len()
    };
    if let Some(tab) = tabs.get(next) {
        workspace.set_active_tab(*tab);
        reset_viewport(view_data);
    }
}

fn delete_active_tab<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match workspace.active_tab() {
        ActiveTab::List(ListTab::List(id)) => {
            let name = workspace.tab_label(workspace.active_tab());
            match workspace.delete_list(runtime.persistence(), id, false) {
                Ok(_) => {
                    reset_viewport(view_data);
                    emit_status(view_data, internal_tx, format!("deleted list {name}"));
                }
                Err(error) if error.is_integrity() => {
                    view_data.pending_list_delete = Some(PendingListDelete {
                        id,
                        prompt: error.to_string(),
                    });
                }
                Err(error) => report_error(view_data, internal_tx, &error),
            }
        }
        ActiveTab::Representative(RepresentativeTab::Representative(id)) => {
            let name = workspace.tab_label(workspace.active_tab());
            match workspace.delete_representative(runtime.persistence(), id) {
                Ok(()) => {
                    reset_viewport(view_data);
                    emit_status(
                        view_data,
                        internal_tx,
                        format!("deleted representative {name}"),
                    );
                }
                Err(error) => report_error(view_data, internal_tx, &error),
            }
        }
        _ => emit_status(
            view_data,
            internal_tx,
            "switch to a list or representative tab to delete it",
        ),
    }
}

fn handle_input_key<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(mut input) = view_data.input.take() else {
        return;
    };
    match key.code {
        KeyCode::Esc => {
            if let InputKind::Search { previous } = input.kind {
                workspace.set_search(previous);
            }
            return;
        }
        KeyCode::Enter => {
            if input.kind == InputKind::ImportPath {
                import_file(workspace, runtime, view_data, internal_tx, input.buffer.trim());
            }
            return;
        }
        KeyCode::Backspace => {
            input.buffer.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            input.buffer.push(ch);
        }
        _ => {}
    }
    if matches!(input.kind, InputKind::Search { .. }) {
        workspace.set_search(input.buffer.clone());
        reset_viewport(view_data);
    }
    view_data.input = Some(input);
}

fn import_file<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    path: &str,
) {
    if path.is_empty() {
        emit_status(view_data, internal_tx, "import canceled: no file given");
        return;
    }
    let text = match runtime.read_import_file(path) {
        Ok(text) => text,
        Err(error) => {
            report_error(view_data, internal_tx, &CrmError::from(error));
            return;
        }
    };
    match workspace.import_csv(runtime.persistence(), &text) {
        Ok(report) => {
            let mut message = report.summary();
            if let Some(first) = report.messages.first() {
                message = format!("{message} ({first})");
            }
            emit_status(view_data, internal_tx, message);
        }
        Err(error) => report_error(view_data, internal_tx, &error),
    }
}

fn handle_delete_confirm_key<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') => match workspace.confirm_delete(runtime.persistence()) {
            Ok(outcome) => emit_status(view_data, internal_tx, outcome.summary("deleted")),
            Err(error) => report_error(view_data, internal_tx, &error),
        },
        KeyCode::Char('n') | KeyCode::Esc => {
            workspace.cancel_delete();
            emit_status(view_data, internal_tx, "delete canceled");
        }
        _ => {}
    }
}

fn handle_list_delete_key<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') => {
            let Some(pending) = view_data.pending_list_delete.take() else {
                return;
            };
            match workspace.delete_list(runtime.persistence(), pending.id, true) {
                Ok(unassigned) => {
                    reset_viewport(view_data);
                    emit_status(
                        view_data,
                        internal_tx,
                        format!("deleted list, {unassigned} unassigned"),
                    );
                }
                Err(error) => report_error(view_data, internal_tx, &error),
            }
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            view_data.pending_list_delete = None;
        }
        _ => {}
    }
}

fn handle_filter_column_key(
    workspace: &mut Workspace,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let cursor = view_data.filter_column_cursor.unwrap_or(0);
    let last = FilterColumn::ALL.len() - 1;
    match key.code {
        KeyCode::Esc => view_data.filter_column_cursor = None,
        KeyCode::Char('j') | KeyCode::Down => {
            view_data.filter_column_cursor = Some((cursor + 1).min(last));
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.filter_column_cursor = Some(cursor.saturating_sub(1));
        }
        KeyCode::Char('c') => {
            let column = FilterColumn::ALL[cursor];
            workspace.clear_filter(column);
            emit_status(
                view_data,
                internal_tx,
                format!("{} filter cleared", column.label()),
            );
        }
        KeyCode::Char('C') => {
            workspace.clear_filters();
            emit_status(view_data, internal_tx, "filters cleared");
        }
        KeyCode::Enter => open_filter_column(workspace, view_data, cursor),
        KeyCode::Char(ch) => {
            if let Some(index) = digit_choice(ch, FilterColumn::ALL.len()) {
                open_filter_column(workspace, view_data, index);
            }
        }
        _ => {}
    }
}

fn open_filter_column(workspace: &mut Workspace, view_data: &mut ViewData, index: usize) {
    let Some(column) = FilterColumn::ALL.get(index).copied() else {
        return;
    };
    workspace.open_filter(column);
    view_data.filter_column_cursor = None;
    view_data.filter_option_cursor = 0;
}

fn handle_filter_options_key(
    workspace: &mut Workspace,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    column: FilterColumn,
    key: KeyEvent,
) {
    let options = filter_options(workspace.store(), column);
    match key.code {
        KeyCode::Esc => workspace.cancel_filter(),
        KeyCode::Enter => {
            workspace.confirm_filter();
            reset_viewport(view_data);
            let shown = workspace.visible_ids().len();
            emit_status(
                view_data,
                internal_tx,
                format!("{} filter applied, {shown} shown", column.label()),
            );
        }
        KeyCode::Char('j') | KeyCode::Down => {
            let last = options.len().saturating_sub(1);
            view_data.filter_option_cursor = (view_data.filter_option_cursor + 1).min(last);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.filter_option_cursor = view_data.filter_option_cursor.saturating_sub(1);
        }
        KeyCode::Char(' ') => {
            if let Some(option) = options.get(view_data.filter_option_cursor) {
                workspace.toggle_filter_value(option.value);
            }
        }
        KeyCode::Char('c') => {
            workspace.clear_filter(column);
            workspace.cancel_filter();
            reset_viewport(view_data);
            emit_status(
                view_data,
                internal_tx,
                format!("{} filter cleared", column.label()),
            );
        }
        _ => {}
    }
}

fn handle_selection_menu_key(
    workspace: &mut Workspace,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let last = SelectCondition::ALL.len() - 1;
    let choice = match key.code {
        KeyCode::Esc => {
            workspace.cancel();
            return;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            view_data.menu_cursor = (view_data.menu_cursor + 1).min(last);
            return;
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.menu_cursor = view_data.menu_cursor.saturating_sub(1);
            return;
        }
        KeyCode::Enter => Some(view_data.menu_cursor),
        KeyCode::Char(ch) => digit_choice(ch, SelectCondition::ALL.len()),
        _ => None,
    };
    let Some(condition) = choice.and_then(|index| SelectCondition::ALL.get(index).copied()) else {
        return;
    };
    workspace.select_by(condition);
    let count = workspace.selection().len();
    emit_status(
        view_data,
        internal_tx,
        format!("{count} selected: {}", condition.label()),
    );
}

fn handle_bulk_form_key<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let form = &mut view_data.bulk_form;
    let choices = match form.field {
        BulkField::Representative => workspace.store().representatives().len() + 1,
        BulkField::List => workspace.store().lists().len() + 2,
    };
    let slot = match form.field {
        BulkField::Representative => &mut form.representative,
        BulkField::List => &mut form.list,
    };
    match key.code {
        KeyCode::Esc => workspace.cancel(),
        KeyCode::Tab | KeyCode::BackTab => {
            form.field = match form.field {
                BulkField::Representative => BulkField::List,
                BulkField::List => BulkField::Representative,
            };
        }
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Char('l') | KeyCode::Right => {
            *slot = (*slot + 1) % choices;
        }
        KeyCode::Char('k') | KeyCode::Up | KeyCode::Char('h') | KeyCode::Left => {
            *slot = (*slot + choices - 1) % choices;
        }
        KeyCode::Enter => {
            let request = bulk_request(workspace, view_data.bulk_form);
            match workspace.bulk_reassign(runtime.persistence(), &request) {
                Ok(outcome) => {
                    emit_status(view_data, internal_tx, outcome.summary("reassigned"));
                }
                Err(error) => report_error(view_data, internal_tx, &error),
            }
        }
        _ => {}
    }
}

fn bulk_request(workspace: &Workspace, form: BulkFormUiState) -> BulkReassignRequest {
    let store = workspace.store();
    let representative_id = form
        .representative
        .checked_sub(1)
        .and_then(|index| store.representatives().get(index))
        .map(|rep| rep.id);
    let list_change = match form.list {
        0 => ListChange::NoChange,
        1 => ListChange::Unassign,
        index => store
            .lists()
            .get(index - 2)
            .map_or(ListChange::NoChange, |list| ListChange::SetTo(list.id)),
    };
    BulkReassignRequest {
        representative_id,
        list_change,
    }
}

fn representative_choice_label(workspace: &Workspace, choice: usize) -> String {
    choice
        .checked_sub(1)
        .and_then(|index| workspace.store().representatives().get(index))
        .map_or_else(|| "no change".to_owned(), |rep| rep.name.clone())
}

fn list_choice_label(workspace: &Workspace, choice: usize) -> String {
    match choice {
        0 => "no change".to_owned(),
        1 => "unassign".to_owned(),
        index => workspace
            .store()
            .lists()
            .get(index - 2)
            .map_or_else(|| "no change".to_owned(), |list| list.name.clone()),
    }
}

fn digit_choice(ch: char, count: usize) -> Option<usize> {
    let digit = usize::try_from(ch.to_digit(10)?).ok()?;
    (1..=count).contains(&digit).then(|| digit - 1)
}

fn overlay_open(workspace: &Workspace, view_data: &ViewData) -> bool {
    view_data.help_visible
        || view_data.input.is_some()
        || view_data.form.is_some()
        || view_data.detail.is_some()
        || view_data.pending_list_delete.is_some()
        || view_data.filter_column_cursor.is_some()
        || workspace.filters().open_column().is_some()
        || workspace.pending_delete().is_some()
        || workspace.menu() != Menu::Closed
}

fn handle_mouse_event<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mouse: MouseEvent,
    now: Instant,
) {
    match mouse.kind {
        MouseEventKind::ScrollDown => scroll_by(workspace, view_data, WHEEL_ROWS),
        MouseEventKind::ScrollUp => scroll_by(workspace, view_data, -WHEEL_ROWS),
        MouseEventKind::Down(MouseButton::Left) if !overlay_open(workspace, view_data) => {
            pointer_pressed(workspace, view_data, mouse);
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            pointer_dragged(workspace, view_data, internal_tx, mouse, now);
        }
        MouseEventKind::Up(MouseButton::Left) => {
            pointer_released(workspace, runtime, view_data, internal_tx, mouse);
        }
        _ => {}
    }
    sync_viewport(workspace, view_data);
}

fn pointer_pressed(workspace: &mut Workspace, view_data: &mut ViewData, mouse: MouseEvent) {
    if let Some(tab) = tab_at(workspace, view_data.area, mouse.column, mouse.row) {
        if workspace.set_active_tab(tab) {
            reset_viewport(view_data);
        }
        return;
    }

    let geometry = grid_geometry(view_data.area);
    let body = geometry.body;
    if mouse.column < body.x || mouse.column >= body.right() {
        return;
    }
    if mouse.row == geometry.header_y {
        if mouse.column < geometry.checkbox_end {
            workspace.toggle_all_visible();
        }
        return;
    }
    if mouse.row < body.y || mouse.row >= body.bottom() {
        return;
    }
    let index = view_data.scroll + usize::from(mouse.row - body.y);
    if index >= workspace.visible_ids().len() {
        return;
    }

    view_data.cursor = index;
    let modifiers = PointerModifiers {
        discrete: mouse.modifiers.contains(KeyModifiers::CONTROL),
        extend: mouse.modifiers.contains(KeyModifiers::SHIFT),
    };
    if let PointerDown::DragCandidate(id) = workspace.pointer_down(index, modifiers) {
        view_data.drag_candidate = Some(id);
    }
}

fn pointer_dragged(
    workspace: &mut Workspace,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mouse: MouseEvent,
    now: Instant,
) {
    if let Some(origin) = view_data.drag_candidate.take()
        && workspace.begin_drag(origin)
    {
        let count = workspace.drag_payload().map_or(0, |payload| payload.len());
        emit_status(
            view_data,
            internal_tx,
            format!("dragging {count} -- drop on a tab, esc cancels"),
        );
    }

    if workspace.drag_payload().is_some() {
        view_data.drop_hover = tab_at(workspace, view_data.area, mouse.column, mouse.row);
        return;
    }

    if workspace.selection().is_range_selecting() {
        let body = grid_geometry(view_data.area).body;
        let row = body_row(body, mouse.row);
        let index = view_data.scroll + usize::from(row);
        if workspace.pointer_move(index) {
            view_data.cursor = index;
        }
        workspace.update_autoscroll(row, body.height, now);
    }
}

fn pointer_released<R: AppRuntime>(
    workspace: &mut Workspace,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    mouse: MouseEvent,
) {
    view_data.drag_candidate = None;
    if workspace.drag_payload().is_some() {
        view_data.drop_hover = None;
        let Some(target) = tab_at(workspace, view_data.area, mouse.column, mouse.row) else {
            workspace.end_drag();
            emit_status(view_data, internal_tx, "drag canceled");
            return;
        };
        match workspace.drop_on(runtime.persistence(), target) {
            Ok(DropOutcome::Applied(outcome)) => {
                let label = workspace.tab_label(target);
                emit_status(
                    view_data,
                    internal_tx,
                    format!("{} to {label}", outcome.summary("moved")),
                );
            }
            Ok(DropOutcome::Ignored) => {
                emit_status(view_data, internal_tx, "drop on a representative to reassign");
            }
            Ok(DropOutcome::NoDrag) => {}
            Err(error) => report_error(view_data, internal_tx, &error),
        }
        return;
    }

    if workspace.selection().is_range_selecting() {
        workspace.pointer_up();
        let count = workspace.selection().len();
        emit_status(view_data, internal_tx, format!("{count} selected"));
    }
}

/// Body-relative row for a pointer that may sit above or below the body.
fn body_row(body: Rect, row: u16) -> u16 {
    row.saturating_sub(body.y)
        .min(body.height.saturating_sub(1))
}

fn scroll_by(workspace: &Workspace, view_data: &mut ViewData, delta: isize) {
    let len = workspace.visible_ids().len();
    let height = usize::from(grid_geometry(view_data.area).body.height);
    let max_scroll = len.saturating_sub(height);
    view_data.scroll = view_data.scroll.saturating_add_signed(delta).min(max_scroll);
    view_data.cursor = view_data
        .cursor
        .clamp(view_data.scroll, view_data.scroll + height.saturating_sub(1));
}

/// Runs due auto-scroll ticks. The viewport moves by the zone speed but
/// stays on the rows that hold the far end of the range; the cursor follows
/// that end.
fn advance_autoscroll(workspace: &mut Workspace, view_data: &mut ViewData, now: Instant) -> bool {
    let Some(tick) = workspace.autoscroll_tick(now) else {
        return false;
    };
    let Some((_, far)) = workspace.selection().range_bounds() else {
        return true;
    };
    let len = workspace.visible_ids().len();
    let height = usize::from(grid_geometry(view_data.area).body.height);
    let rows = scroll_rows(tick);
    let moved = match tick.direction {
        ScrollDirection::Up => view_data.scroll.saturating_sub(rows),
        ScrollDirection::Down => view_data.scroll.saturating_add(rows),
    };
    let lowest = (far + 1).saturating_sub(height).min(far);
    view_data.scroll = moved.clamp(lowest, far).min(len.saturating_sub(height));
    view_data.cursor = far;
    true
}

fn scroll_rows(tick: ScrollTick) -> usize {
    let rows = (tick.speed * tick.ticks as f32).round();
    (rows as usize).max(1)
}

fn screen_chunks(area: Rect) -> [Rect; 3] {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(area);
    [layout[0], layout[1], layout[2]]
}

fn grid_geometry(area: Rect) -> GridGeometry {
    let inner = Block::default()
        .borders(Borders::ALL)
        .inner(screen_chunks(area)[1]);
    GridGeometry {
        header_y: inner.y,
        body: Rect {
            x: inner.x,
            y: inner.y.saturating_add(1),
            width: inner.width,
            height: inner.height.saturating_sub(1),
        },
        checkbox_end: inner.x.saturating_add(CHECKBOX_WIDTH),
    }
}

fn tab_title(workspace: &Workspace, tab: ActiveTab) -> String {
    let count = tab_ids(workspace.store(), tab).len();
    format!("{} {count}", workspace.tab_label(tab))
}

/// Screen columns each tab title occupies, padding included. Mirrors how
/// the tabs widget lays titles out.
fn tab_regions(workspace: &Workspace, area: Rect) -> Vec<TabRegion> {
    let inner = Block::default()
        .borders(Borders::ALL)
        .inner(screen_chunks(area)[0]);
    let padding = text_width(TAB_PADDING);
    let divider = text_width(TAB_DIVIDER);
    let right = inner.right();

    let mut regions = Vec::new();
    let mut x = inner.x;
    for tab in workspace.tabs() {
        if x >= right {
            break;
        }
        let width = text_width(&tab_title(workspace, tab));
        let end = x
            .saturating_add(padding)
            .saturating_add(width)
            .saturating_add(padding)
            .min(right);
        regions.push(TabRegion { tab, start: x, end });
        x = end.saturating_add(divider);
    }
    regions
}

fn text_width(text: &str) -> u16 {
    u16::try_from(Line::from(text).width()).unwrap_or(u16::MAX)
}

fn tab_at(workspace: &Workspace, area: Rect, column: u16, row: u16) -> Option<ActiveTab> {
    let bar = screen_chunks(area)[0];
    if row < bar.y || row >= bar.bottom() {
        return None;
    }
    tab_regions(workspace, area)
        .into_iter()
        .find(|region| column >= region.start && column < region.end)
        .map(|region| region.tab)
}

fn view_mode_label(mode: ViewMode) -> &'static str {
    match mode {
        ViewMode::ByList => "by list",
        ViewMode::ByRepresentative => "by representative",
    }
}

fn render(frame: &mut ratatui::Frame<'_>, workspace: &Workspace, view_data: &ViewData) {
    let [tabs_area, table_area, status_area] = screen_chunks(frame.area());

    render_tabs(frame, tabs_area, workspace, view_data);
    render_table(frame, table_area, workspace, view_data);

    let status_widget = Paragraph::new(status_text(workspace, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status_widget, status_area);

    if workspace.menu() == Menu::SelectionOptions {
        render_overlay(
            frame,
            (48, 36),
            "select",
            render_selection_menu_text(view_data),
        );
    }

    if workspace.menu() == Menu::BulkAssign {
        render_overlay(
            frame,
            (56, 40),
            "reassign",
            render_bulk_form_text(workspace, view_data),
        );
    }

    if view_data.filter_column_cursor.is_some() {
        render_overlay(
            frame,
            (44, 40),
            "filter",
            render_filter_column_text(workspace, view_data),
        );
    }

    if let Some(column) = workspace.filters().open_column() {
        render_overlay(
            frame,
            (52, 60),
            column.label(),
            render_filter_options_text(workspace, view_data, column),
        );
    }

    if let Some(confirmation) = workspace.pending_delete() {
        render_overlay(
            frame,
            (64, 30),
            "delete",
            format!("{}\n\ny delete | n cancel", confirmation.prompt()),
        );
    }

    if let Some(pending) = &view_data.pending_list_delete {
        render_overlay(
            frame,
            (64, 30),
            "delete list",
            format!("{}\n\ny unassign and delete | n cancel", pending.prompt),
        );
    }

    if let Some(detail) = view_data.detail {
        render_overlay(
            frame,
            (76, 70),
            "company",
            render_detail_text(workspace, detail),
        );
    }

    if let Some(form) = &view_data.form {
        render_overlay(
            frame,
            (60, 60),
            form.kind().title(),
            render_form_text(workspace, form),
        );
    }

    if view_data.help_visible {
        render_overlay(frame, (80, 72), "help", help_overlay_text().to_owned());
    }
}

fn render_overlay(frame: &mut ratatui::Frame<'_>, size: (u16, u16), title: &str, body: String) {
    let area = centered_rect(size.0, size.1, frame.area());
    frame.render_widget(Clear, area);
    let overlay =
        Paragraph::new(body).block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(overlay, area);
}

fn render_tabs(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    workspace: &Workspace,
    view_data: &ViewData,
) {
    let tabs = workspace.tabs();
    let selected = tabs
        .iter()
        .position(|tab| *tab == workspace.active_tab())
        .unwrap_or(0);
    let dragging = workspace.drag_payload().is_some();
    let titles = tabs
        .iter()
        .map(|tab| {
            let mut style = Style::default();
            if dragging && !accepts_drop(*tab) {
                style = style.fg(Color::DarkGray);
            }
            if dragging && view_data.drop_hover == Some(*tab) && accepts_drop(*tab) {
                style = style.fg(Color::Black).bg(Color::Magenta);
            }
            Line::styled(tab_title(workspace, *tab), style)
        })
        .collect::<Vec<_>>();

    let mut title = format!("nisesales | {}", view_mode_label(workspace.view_mode()));
    if !view_data.user_name.is_empty() {
        title = format!("{title} | {}", view_data.user_name);
    }
    let widget = Tabs::new(titles)
        .block(Block::default().title(title).borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .padding(TAB_PADDING, TAB_PADDING)
        .divider(TAB_DIVIDER)
        .select(selected);
    frame.render_widget(widget, area);
}

const GRID_COLUMNS: [(&str, Option<FilterColumn>); 8] = [
    ("company", None),
    ("contact", None),
    ("department", None),
    ("position", None),
    ("rep", Some(FilterColumn::Representative)),
    ("list", Some(FilterColumn::List)),
    ("score", Some(FilterColumn::ProspectScore)),
    ("status", Some(FilterColumn::Negotiation)),
];

fn header_label(workspace: &Workspace, label: &str, column: Option<FilterColumn>) -> String {
    match column {
        Some(column) if !workspace.filters().committed().column_is_empty(column) => {
            format!("{label} {FILTER_MARK_ACTIVE}")
        }
        _ => label.to_owned(),
    }
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    workspace: &Workspace,
    view_data: &ViewData,
) {
    let store = workspace.store();
    let companies = workspace.visible_companies();
    let height = usize::from(grid_geometry(frame.area()).body.height);
    let payload = workspace.drag_payload();

    let header_style = Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD);
    let header = Row::new(
        std::iter::once(Cell::from(checkbox(workspace.all_visible_selected())).style(header_style))
            .chain(GRID_COLUMNS.iter().map(|(label, column)| {
                Cell::from(header_label(workspace, label, *column)).style(header_style)
            })),
    );

    let rows = companies
        .iter()
        .enumerate()
        .skip(view_data.scroll)
        .take(height)
        .map(|(index, company)| {
            let selected = workspace.selection().is_selected(company.id);
            let mut style = Style::default();
            if selected {
                style = style.fg(Color::Cyan);
            }
            if payload.is_some_and(|payload| payload.ids().contains(&company.id)) {
                style = style.fg(Color::Magenta);
            }
            if index == view_data.cursor {
                style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
            }
            let score = company
                .prospect_score
                .map_or(UNSET_LABEL, |score| score.as_str());
            let list = company
                .list_id
                .map_or(UNSET_LABEL, |id| store.list_name(Some(id)));
            Row::new(vec![
                Cell::from(checkbox(selected)),
                Cell::from(company.name.clone()),
                Cell::from(company.contact_person.clone()),
                Cell::from(company.department.clone()),
                Cell::from(company.position.clone()),
                Cell::from(store.representative_name(company.representative_id).to_owned()),
                Cell::from(list.to_owned()),
                Cell::from(score),
                Cell::from(store.negotiation_state(company.id).label()),
            ])
            .style(style)
        });

    let widths = std::iter::once(Constraint::Length(CHECKBOX_WIDTH))
        .chain(std::iter::repeat_n(Constraint::Min(8), GRID_COLUMNS.len()))
        .collect::<Vec<_>>();
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(workspace, companies.len()))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn table_title(workspace: &Workspace, shown: usize) -> String {
    let total = workspace.store().companies().len();
    let mut title = format!(
        "companies {shown}/{total} | selected {}",
        workspace.selection().len()
    );
    if !workspace.search().is_empty() {
        title.push_str(&format!(" | search \"{}\"", workspace.search()));
    }
    title
}

fn mode_label(workspace: &Workspace, view_data: &ViewData) -> String {
    if view_data.input.is_some() {
        return "INPUT".to_owned();
    }
    if view_data.form.is_some() {
        return "FORM".to_owned();
    }
    if view_data.detail.is_some() {
        return "DETAIL".to_owned();
    }
    match workspace.gesture() {
        Gesture::Dragging(payload) => format!("DRAG {}", payload.len()),
        Gesture::RangeSelecting => "RANGE".to_owned(),
        Gesture::Idle => "NAV".to_owned(),
    }
}

fn status_text(workspace: &Workspace, view_data: &ViewData) -> String {
    if status_hidden_by_overlay(workspace, view_data) {
        return String::new();
    }
    let mode = mode_label(workspace, view_data);
    if let Some(input) = &view_data.input {
        let prompt = match input.kind {
            InputKind::Search { .. } => "search",
            InputKind::ImportPath => "import csv",
        };
        return format!("{mode} | {prompt}: {}_ | enter ok | esc cancel", input.buffer);
    }
    if let Some(form) = &view_data.form {
        let status = view_data
            .status_line
            .clone()
            .unwrap_or_else(|| form.field_status());
        return format!("{mode} | {status} | tab field | enter save | esc cancel");
    }
    let default = if view_data.detail.is_some() {
        "j/k | n e d activity | E company | esc close"
    } else {
        "j/k g/G | space a x m | r D | f/b v | / F C | o n e | N E X | R I | ? help | ctrl+q"
    };
    match &view_data.status_line {
        Some(status) => format!("{mode} | {status} | {default}"),
        None => format!("{mode} | {default}"),
    }
}

fn status_hidden_by_overlay(workspace: &Workspace, view_data: &ViewData) -> bool {
    view_data.help_visible
        || view_data.filter_column_cursor.is_some()
        || workspace.filters().open_column().is_some()
        || workspace.menu() != Menu::Closed
}

fn cursor_marker(active: bool) -> &'static str {
    if active { "> " } else { "  " }
}

fn render_form_text(workspace: &Workspace, form: &FormUiState) -> String {
    let mut lines = form.render_lines(workspace.store());
    lines.push(String::new());
    lines.push("tab/shift+tab field | type, or ←/→ 1-9 to choose | ctrl+u clear".to_owned());
    lines.push("enter save | esc cancel".to_owned());
    lines.join("\n")
}

fn activity_line(activity: &Activity) -> String {
    let mut line = format!(
        "{} {} {}",
        format_iso_date(activity.date),
        activity.kind.label(),
        activity.title
    );
    if let Some(amount) = activity.amount_yen {
        line.push_str(&format!(" {}", format_yen(amount)));
    }
    if let Some(probability) = activity.probability {
        line.push_str(&format!(" {probability}%"));
    }
    if let Some(outcome) = activity.outcome {
        line.push_str(&format!(" [{}]", outcome.label()));
    }
    if activity.appointment_secured == Some(true) {
        line.push_str(" appointment");
    }
    line
}

fn render_detail_text(workspace: &Workspace, detail: DetailUiState) -> String {
    let store = workspace.store();
    let Some(company) = store.company(detail.company) else {
        return "company no longer exists\n\nesc close".to_owned();
    };
    let score = company
        .prospect_score
        .map_or(UNSET_LABEL, |score| score.as_str());
    let list = company
        .list_id
        .map_or(UNSET_LABEL, |id| store.list_name(Some(id)));
    let mut lines = vec![
        company.name.clone(),
        format!(
            "contact: {} / {} / {}",
            company.contact_person, company.department, company.position
        ),
        format!("email: {} | phone: {}", company.email, company.phone_number),
        format!(
            "rep: {} | list: {list} | score: {score} | {}",
            store.representative_name(company.representative_id),
            store.negotiation_state(company.id).label()
        ),
    ];
    if let Some(memo) = &company.memo {
        lines.push(format!("memo: {memo}"));
    }
    lines.push(String::new());

    let activities = store.activities_for(company.id);
    lines.push(format!("activities ({})", activities.len()));
    if activities.is_empty() {
        lines.push("  none yet".to_owned());
    }
    for (index, activity) in activities.iter().enumerate() {
        lines.push(format!(
            "{}{}",
            cursor_marker(index == detail.cursor),
            activity_line(activity)
        ));
        if !activity.content.is_empty() {
            lines.push(format!("    {}", activity.content));
        }
        if let Some(next) = &activity.next_action {
            let due = activity
                .next_action_date
                .map(|date| format!(" ({})", format_iso_date(date)))
                .unwrap_or_default();
            lines.push(format!("    next: {next}{due}"));
        }
    }
    lines.push(String::new());
    if detail.confirm_delete {
        lines.push("delete the selected activity? y delete | any other key cancels".to_owned());
    } else {
        lines.push("j/k | n add | e edit | d delete | E edit company | esc close".to_owned());
    }
    lines.join("\n")
}

fn render_selection_menu_text(view_data: &ViewData) -> String {
    let mut lines = SelectCondition::ALL
        .iter()
        .enumerate()
        .map(|(index, condition)| {
            format!(
                "{}{} {}",
                cursor_marker(index == view_data.menu_cursor),
                index + 1,
                condition.label()
            )
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    lines.push("j/k | enter or 1-4 select | esc close".to_owned());
    lines.join("\n")
}

fn render_bulk_form_text(workspace: &Workspace, view_data: &ViewData) -> String {
    let form = view_data.bulk_form;
    let count = workspace.selection().len();
    [
        format!(
            "apply to {count} selected compan{}",
            if count == 1 { "y" } else { "ies" }
        ),
        String::new(),
        format!(
            "{}representative: < {} >",
            cursor_marker(form.field == BulkField::Representative),
            representative_choice_label(workspace, form.representative)
        ),
        format!(
            "{}list:           < {} >",
            cursor_marker(form.field == BulkField::List),
            list_choice_label(workspace, form.list)
        ),
        String::new(),
        "tab field | j/k choose | enter apply | esc cancel".to_owned(),
    ]
    .join("\n")
}

fn render_filter_column_text(workspace: &Workspace, view_data: &ViewData) -> String {
    let cursor = view_data.filter_column_cursor.unwrap_or(0);
    let committed = workspace.filters().committed();
    let mut lines = FilterColumn::ALL
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let mark = if committed.column_is_empty(*column) {
                ""
            } else {
                FILTER_MARK_ACTIVE
            };
            format!(
                "{}{} {} {mark}",
                cursor_marker(index == cursor),
                index + 1,
                column.label()
            )
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    lines.push("enter or 1-4 edit | c clear column | C clear all | esc close".to_owned());
    lines.join("\n")
}

fn render_filter_options_text(
    workspace: &Workspace,
    view_data: &ViewData,
    column: FilterColumn,
) -> String {
    let pending = workspace.filters().pending();
    let mut lines = filter_options(workspace.store(), column)
        .into_iter()
        .enumerate()
        .map(|(index, option)| {
            format!(
                "{}{} {} ({})",
                cursor_marker(index == view_data.filter_option_cursor),
                checkbox(pending.contains(option.value)),
                option.label,
                option.count
            )
        })
        .collect::<Vec<_>>();
    if column == FilterColumn::Representative
        && workspace.view_mode() == ViewMode::ByRepresentative
    {
        lines.push("(ignored while viewing by representative)".to_owned());
    }
    lines.push(String::new());
    lines.push("space toggle | enter apply | c clear | esc cancel".to_owned());
    lines.join("\n")
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | esc cancel range/drag/menus | ? help\n\
nav: j/k g/G ctrl+d/u pgup/pgdn | f/b tabs | v list/representative view\n\
select: space row | a all visible | x clear | m select by condition\n\
mouse: drag across rows to select a range (shift keeps, ctrl toggles one)\n\
mouse: drag selected rows onto a tab to move them\n\
bulk: r reassign representative/list | D delete selected\n\
filter: / search | F column filters | C clear filters\n\
data: R reload | I import csv | X delete the list/representative of this tab\n\
records: o/enter company detail | n new company | e edit company\n\
records: N new list/representative | E edit the list/representative of this tab\n\
detail: n add activity | e edit | d delete | E edit company\n\
forms: tab/shift+tab field | ←/→ or 1-9 choose | ctrl+u clear | enter save"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, BulkField, InternalEvent, ViewData, advance_autoscroll,
        digit_choice, grid_geometry, handle_key_event, handle_mouse_event, help_overlay_text,
        process_internal_events, render_detail_text, status_text, tab_regions,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{
        KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    };
    use nisesales_app::{
        ActiveTab, ActivityKind, AutoScrollConfig, CompanyId, FilterColumn, ListId, ListTab, Menu,
        Persistence, RepresentativeId, RepresentativeTab, Workspace, WorkspaceOptions,
    };
    use nisesales_testkit::MemoryPersistence;
    use ratatui::layout::Rect;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[derive(Debug, Default)]
    struct TestRuntime {
        persistence: MemoryPersistence,
        import_text: Option<String>,
    }

    impl AppRuntime for TestRuntime {
        fn persistence(&mut self) -> &mut dyn Persistence {
            &mut self.persistence
        }

        fn user_name(&self) -> &str {
            "tester"
        }

        fn read_import_file(&mut self, path: &str) -> Result<String> {
            self.import_text
                .clone()
                .ok_or_else(|| anyhow!("no such file: {path}"))
        }
    }

    struct Fixture {
        workspace: Workspace,
        runtime: TestRuntime,
        view_data: ViewData,
        sato: RepresentativeId,
        suzuki: RepresentativeId,
        expo: ListId,
        web: ListId,
    }

    impl Fixture {
        /// Six companies, newest first on screen: F, E, D, C, B, A.
        fn new() -> Result<Self> {
            let mut persistence = MemoryPersistence::new();
            let sato = persistence.seed_representative("佐藤")?;
            let suzuki = persistence.seed_representative("鈴木")?;
            let expo = persistence.seed_list("展示会")?;
            let web = persistence.seed_list("Webリード")?;
            let a = persistence.seed_company("A社", sato, Some(expo))?;
            persistence.seed_company("B社", sato, Some(expo))?;
            persistence.seed_company("C社", suzuki, Some(web))?;
            persistence.seed_company("D社", suzuki, None)?;
            persistence.seed_company("E社", sato, None)?;
            persistence.seed_company("F社", suzuki, None)?;
            persistence.seed_activity(a, ActivityKind::Negotiation)?;

            let mut runtime = TestRuntime {
                persistence,
                import_text: None,
            };
            let workspace = Workspace::load(&mut runtime.persistence, WorkspaceOptions::default())?;
            let view_data = ViewData {
                area: Rect::new(0, 0, 120, 30),
                ..ViewData::default()
            };
            Ok(Self {
                workspace,
                runtime,
                view_data,
                sato,
                suzuki,
                expo,
                web,
            })
        }

        fn key(&mut self, code: KeyCode) -> bool {
            self.key_with(code, KeyModifiers::NONE)
        }

        fn key_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            let tx = internal_tx();
            handle_key_event(
                &mut self.workspace,
                &mut self.runtime,
                &mut self.view_data,
                &tx,
                KeyEvent::new(code, modifiers),
            )
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.key(KeyCode::Char(ch));
            }
        }

        fn mouse(&mut self, kind: MouseEventKind, column: u16, row: u16, now: Instant) {
            self.mouse_with(kind, column, row, KeyModifiers::NONE, now);
        }

        fn mouse_with(
            &mut self,
            kind: MouseEventKind,
            column: u16,
            row: u16,
            modifiers: KeyModifiers,
            now: Instant,
        ) {
            let tx = internal_tx();
            handle_mouse_event(
                &mut self.workspace,
                &mut self.runtime,
                &mut self.view_data,
                &tx,
                MouseEvent {
                    kind,
                    column,
                    row,
                    modifiers,
                },
                now,
            );
        }

        /// Screen row of a visible index, assuming it is scrolled into view.
        fn row_y(&self, index: usize) -> u16 {
            let body = grid_geometry(self.view_data.area).body;
            body.y + u16::try_from(index - self.view_data.scroll).unwrap_or(u16::MAX)
        }

        fn body_x(&self) -> u16 {
            grid_geometry(self.view_data.area).body.x + 10
        }

        fn tab_point(&self, tab: ActiveTab) -> Result<(u16, u16)> {
            let region = tab_regions(&self.workspace, self.view_data.area)
                .into_iter()
                .find(|region| region.tab == tab)
                .ok_or_else(|| anyhow!("tab {tab:?} is not on screen"))?;
            Ok((region.start + 1, 1))
        }

        fn visible(&self) -> Vec<CompanyId> {
            self.workspace.visible_ids()
        }

        fn names(&self) -> Vec<String> {
            self.workspace
                .visible_companies()
                .iter()
                .map(|company| company.name.clone())
                .collect()
        }

        fn status(&self) -> String {
            self.view_data.status_line.clone().unwrap_or_default()
        }
    }

    fn internal_tx() -> mpsc::Sender<InternalEvent> {
        let (tx, _rx) = mpsc::channel();
        tx
    }

    fn down() -> MouseEventKind {
        MouseEventKind::Down(MouseButton::Left)
    }

    fn drag() -> MouseEventKind {
        MouseEventKind::Drag(MouseButton::Left)
    }

    fn up() -> MouseEventKind {
        MouseEventKind::Up(MouseButton::Left)
    }

    #[test]
    fn ctrl_q_quits() -> Result<()> {
        let mut fx = Fixture::new()?;
        assert!(!fx.key(KeyCode::Char('q')));
        assert!(fx.key_with(KeyCode::Char('q'), KeyModifiers::CONTROL));
        Ok(())
    }

    #[test]
    fn space_toggles_the_cursor_row() -> Result<()> {
        let mut fx = Fixture::new()?;
        assert_eq!(fx.names()[0], "F社");
        fx.key(KeyCode::Char('j'));
        fx.key(KeyCode::Char(' '));
        let visible = fx.visible();
        assert!(fx.workspace.selection().is_selected(visible[1]));
        assert_eq!(fx.workspace.selection().len(), 1);

        fx.key(KeyCode::Char(' '));
        assert!(fx.workspace.selection().is_empty());
        Ok(())
    }

    #[test]
    fn a_toggles_every_visible_row() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('a'));
        assert_eq!(fx.workspace.selection().len(), 6);
        assert!(fx.workspace.all_visible_selected());
        fx.key(KeyCode::Char('a'));
        assert!(fx.workspace.selection().is_empty());
        Ok(())
    }

    #[test]
    fn tabs_cycle_and_keep_the_selection() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char(' '));
        fx.key(KeyCode::Char('f'));
        assert_eq!(
            fx.workspace.active_tab(),
            ActiveTab::List(ListTab::Unassigned)
        );
        assert_eq!(fx.names(), vec!["F社", "E社", "D社"]);
        assert_eq!(fx.workspace.selection().len(), 1);

        fx.key(KeyCode::Char('b'));
        fx.key(KeyCode::Char('b'));
        assert!(matches!(
            fx.workspace.active_tab(),
            ActiveTab::List(ListTab::List(_))
        ));

        fx.key(KeyCode::Char('v'));
        assert_eq!(
            fx.workspace.active_tab(),
            ActiveTab::Representative(RepresentativeTab::All)
        );
        Ok(())
    }

    #[test]
    fn search_is_live_and_escape_restores_it() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('/'));
        fx.type_text("c社");
        assert_eq!(fx.workspace.search(), "c社");
        assert_eq!(fx.names(), vec!["C社"]);
        assert!(status_text(&fx.workspace, &fx.view_data).contains("search: c社_"));

        fx.key(KeyCode::Esc);
        assert_eq!(fx.workspace.search(), "");
        assert_eq!(fx.visible().len(), 6);

        fx.key(KeyCode::Char('/'));
        fx.type_text("D");
        fx.key(KeyCode::Enter);
        assert_eq!(fx.workspace.search(), "D");
        assert!(fx.view_data.input.is_none());
        Ok(())
    }

    #[test]
    fn filter_editor_applies_pending_values_on_enter() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('F'));
        fx.key(KeyCode::Enter);
        assert_eq!(
            fx.workspace.filters().open_column(),
            Some(FilterColumn::Representative)
        );

        fx.key(KeyCode::Char(' '));
        assert_eq!(fx.visible().len(), 6, "pending values do not filter yet");
        fx.key(KeyCode::Enter);
        assert_eq!(fx.workspace.filters().open_column(), None);
        assert_eq!(fx.names(), vec!["E社", "B社", "A社"]);
        assert!(fx.status().contains("3 shown"));

        fx.key(KeyCode::Char('C'));
        assert_eq!(fx.visible().len(), 6);
        Ok(())
    }

    #[test]
    fn filter_editor_escape_discards_pending_values() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('F'));
        fx.key(KeyCode::Char('4'));
        assert_eq!(
            fx.workspace.filters().open_column(),
            Some(FilterColumn::Negotiation)
        );
        fx.key(KeyCode::Char(' '));
        fx.key(KeyCode::Esc);
        assert!(fx.workspace.filters().committed().is_empty());
        assert!(fx.workspace.filters().pending().is_empty());
        assert_eq!(fx.visible().len(), 6);
        Ok(())
    }

    #[test]
    fn selection_menu_selects_by_condition() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('f'));
        fx.key(KeyCode::Char('m'));
        assert_eq!(fx.workspace.menu(), Menu::SelectionOptions);
        fx.key(KeyCode::Char('4'));
        assert_eq!(fx.workspace.menu(), Menu::Closed);
        assert_eq!(fx.workspace.selection().len(), 3);
        Ok(())
    }

    #[test]
    fn escape_closes_menus_and_keeps_the_selection() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char(' '));
        fx.key(KeyCode::Char('r'));
        assert_eq!(fx.workspace.menu(), Menu::BulkAssign);
        fx.key(KeyCode::Esc);
        assert_eq!(fx.workspace.menu(), Menu::Closed);
        assert_eq!(fx.workspace.selection().len(), 1);
        Ok(())
    }

    #[test]
    fn bulk_form_needs_a_selection() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('r'));
        assert_eq!(fx.workspace.menu(), Menu::Closed);
        assert!(fx.status().contains("select at least one company"));
        Ok(())
    }

    #[test]
    fn bulk_form_reassigns_representative_and_list() -> Result<()> {
        let mut fx = Fixture::new()?;
        let visible = fx.visible();
        fx.key(KeyCode::Char(' '));
        fx.key(KeyCode::Char('j'));
        fx.key(KeyCode::Char(' '));

        fx.key(KeyCode::Char('r'));
        let first_rep = fx.workspace.store().representatives()[0].id;
        let first_list = fx.workspace.store().lists()[0].id;
        fx.key(KeyCode::Char('j'));
        fx.key(KeyCode::Tab);
        assert_eq!(fx.view_data.bulk_form.field, BulkField::List);
        fx.key(KeyCode::Char('j'));
        fx.key(KeyCode::Char('j'));
        fx.key(KeyCode::Enter);

        assert_eq!(fx.workspace.menu(), Menu::Closed);
        assert!(fx.status().starts_with("reassigned 2 companies"));
        for id in &visible[..2] {
            let company = fx.runtime.persistence.company(*id)?;
            assert_eq!(company.representative_id, first_rep);
            assert_eq!(company.list_id, Some(first_list));
        }
        let untouched = fx.runtime.persistence.company(visible[2])?;
        assert_eq!(untouched.representative_id, fx.suzuki);
        assert_eq!(untouched.list_id, None);
        Ok(())
    }

    #[test]
    fn bulk_form_without_a_change_is_refused() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char(' '));
        fx.key(KeyCode::Char('r'));
        fx.key(KeyCode::Enter);
        assert!(fx.status().contains("choose a representative or a list change"));
        assert!(
            fx.runtime
                .persistence
                .writes()
                .iter()
                .all(|write| !write.starts_with("update"))
        );
        Ok(())
    }

    #[test]
    fn delete_requires_confirmation_and_clears_selection() -> Result<()> {
        let mut fx = Fixture::new()?;
        let visible = fx.visible();
        fx.key(KeyCode::Char(' '));
        fx.key(KeyCode::Char('j'));
        fx.key(KeyCode::Char(' '));

        fx.key(KeyCode::Char('D'));
        let prompt = fx
            .workspace
            .pending_delete()
            .map(|confirmation| confirmation.prompt())
            .unwrap_or_default();
        assert!(prompt.contains("F社"));
        assert!(prompt.contains("E社"));

        fx.key(KeyCode::Char('n'));
        assert!(fx.workspace.pending_delete().is_none());
        assert_eq!(fx.runtime.persistence.companies().len(), 6);

        fx.key(KeyCode::Char('D'));
        fx.key(KeyCode::Char('y'));
        assert_eq!(fx.runtime.persistence.companies().len(), 4);
        assert!(fx.workspace.selection().is_empty());
        assert!(!fx.visible().contains(&visible[0]));
        assert_eq!(fx.status(), "deleted 2 companies");
        Ok(())
    }

    #[test]
    fn deleting_a_list_with_members_asks_before_unassigning() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.workspace
            .set_active_tab(ActiveTab::List(ListTab::List(fx.expo)));
        fx.key(KeyCode::Char('X'));
        assert!(fx.view_data.pending_list_delete.is_some());
        assert_eq!(fx.runtime.persistence.lists().len(), 2);

        fx.key(KeyCode::Char('y'));
        assert!(fx.view_data.pending_list_delete.is_none());
        assert_eq!(fx.runtime.persistence.lists().len(), 1);
        assert_eq!(fx.workspace.active_tab(), ActiveTab::List(ListTab::All));
        assert!(
            fx.runtime
                .persistence
                .companies()
                .iter()
                .all(|company| company.list_id != Some(fx.expo))
        );
        assert_eq!(fx.status(), "deleted list, 2 unassigned");
        Ok(())
    }

    #[test]
    fn deleting_an_assigned_representative_is_refused() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('v'));
        fx.workspace
            .set_active_tab(ActiveTab::Representative(RepresentativeTab::Representative(
                fx.sato,
            )));
        fx.key(KeyCode::Char('X'));
        assert!(fx.status().contains("reassign them first"));
        assert_eq!(fx.runtime.persistence.representatives().len(), 2);
        Ok(())
    }

    #[test]
    fn import_reads_the_file_through_the_runtime() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.runtime.import_text = Some(
            "会社名,担当者名,部署,役職,メール,電話,営業担当,見込み,メモ\nG社,,,,,,高橋,5,\nA社,担当者,,,,,,,\n"
                .to_owned(),
        );
        fx.key(KeyCode::Char('I'));
        fx.type_text("companies.csv");
        fx.key(KeyCode::Enter);

        assert!(fx.status().starts_with("imported 1, failed 1"));
        assert_eq!(fx.runtime.persistence.companies().len(), 7);
        assert_eq!(fx.runtime.persistence.representatives().len(), 3);
        Ok(())
    }

    #[test]
    fn import_reports_unreadable_files() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('I'));
        fx.type_text("missing.csv");
        fx.key(KeyCode::Enter);
        assert!(fx.status().contains("no such file: missing.csv"));
        assert_eq!(fx.runtime.persistence.companies().len(), 6);
        Ok(())
    }

    #[test]
    fn pointer_drag_selects_a_contiguous_range() -> Result<()> {
        let mut fx = Fixture::new()?;
        let now = Instant::now();
        let x = fx.body_x();
        let (top, bottom) = (fx.row_y(1), fx.row_y(3));
        fx.mouse(down(), x, top, now);
        fx.mouse(drag(), x, bottom, now);
        assert!(fx.workspace.selection().is_range_selecting());
        assert!(status_text(&fx.workspace, &fx.view_data).starts_with("RANGE"));
        fx.mouse(up(), x, bottom, now);

        let visible = fx.visible();
        let selected = fx.workspace.selection().selected_ids();
        let mut expected = visible[1..=3].to_vec();
        expected.sort();
        assert_eq!(selected, expected);
        assert!(!fx.workspace.selection().is_range_selecting());
        assert_eq!(fx.view_data.cursor, 3);
        Ok(())
    }

    #[test]
    fn shift_extends_and_ctrl_toggles() -> Result<()> {
        let mut fx = Fixture::new()?;
        let now = Instant::now();
        let x = fx.body_x();
        let row0 = fx.row_y(0);
        let row4 = fx.row_y(4);
        let row5 = fx.row_y(5);
        fx.mouse(down(), x, row0, now);
        fx.mouse(up(), x, row0, now);
        fx.mouse_with(down(), x, row4, KeyModifiers::SHIFT, now);
        fx.mouse(drag(), x, row5, now);
        fx.mouse(up(), x, row5, now);
        assert_eq!(fx.workspace.selection().len(), 3);

        fx.mouse_with(down(), x, row4, KeyModifiers::CONTROL, now);
        fx.mouse(up(), x, row4, now);
        assert_eq!(fx.workspace.selection().len(), 2);
        assert!(!fx.workspace.selection().is_selected(fx.visible()[4]));
        Ok(())
    }

    #[test]
    fn header_checkbox_click_toggles_all_visible() -> Result<()> {
        let mut fx = Fixture::new()?;
        let geometry = grid_geometry(fx.view_data.area);
        let now = Instant::now();
        fx.mouse(down(), geometry.body.x, geometry.header_y, now);
        assert_eq!(fx.workspace.selection().len(), 6);
        Ok(())
    }

    #[test]
    fn dragging_a_selection_onto_a_list_tab_moves_it() -> Result<()> {
        let mut fx = Fixture::new()?;
        let visible = fx.visible();
        fx.key(KeyCode::Char(' '));
        fx.key(KeyCode::Char('j'));
        fx.key(KeyCode::Char(' '));

        let now = Instant::now();
        let x = fx.body_x();
        let row = fx.row_y(0);
        fx.mouse(down(), x, row, now);
        assert_eq!(fx.workspace.selection().len(), 2, "pressing a selected row keeps it");

        let (tab_x, tab_y) = fx.tab_point(ActiveTab::List(ListTab::List(fx.web)))?;
        fx.mouse(drag(), tab_x, tab_y, now);
        assert_eq!(
            fx.workspace.drag_payload().map(|payload| payload.len()),
            Some(2)
        );
        assert_eq!(
            fx.view_data.drop_hover,
            Some(ActiveTab::List(ListTab::List(fx.web)))
        );
        fx.mouse(up(), tab_x, tab_y, now);

        assert!(fx.workspace.drag_payload().is_none());
        for id in &visible[..2] {
            assert_eq!(fx.runtime.persistence.company(*id)?.list_id, Some(fx.web));
        }
        assert!(fx.status().starts_with("moved 2 companies"));
        Ok(())
    }

    #[test]
    fn dropping_on_a_representative_tab_keeps_the_list() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('v'));
        fx.key(KeyCode::Char(' '));
        let origin = fx.visible()[0];

        let now = Instant::now();
        let x = fx.body_x();
        let row = fx.row_y(0);
        fx.mouse(down(), x, row, now);
        let target = ActiveTab::Representative(RepresentativeTab::Representative(fx.sato));
        let (tab_x, tab_y) = fx.tab_point(target)?;
        fx.mouse(drag(), tab_x, tab_y, now);
        fx.mouse(up(), tab_x, tab_y, now);

        let moved = fx.runtime.persistence.company(origin)?;
        assert_eq!(moved.representative_id, fx.sato);
        assert_eq!(moved.list_id, None);
        assert!(fx.status().ends_with("to 佐藤"));
        Ok(())
    }

    #[test]
    fn dropping_on_the_representative_all_tab_changes_nothing() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('v'));
        fx.key(KeyCode::Char(' '));
        let now = Instant::now();
        let x = fx.body_x();
        let row = fx.row_y(0);
        fx.mouse(down(), x, row, now);
        let (tab_x, tab_y) =
            fx.tab_point(ActiveTab::Representative(RepresentativeTab::All))?;
        fx.mouse(drag(), tab_x, tab_y, now);
        fx.mouse(up(), tab_x, tab_y, now);

        assert_eq!(fx.status(), "drop on a representative to reassign");
        assert!(
            fx.runtime
                .persistence
                .writes()
                .iter()
                .all(|write| !write.starts_with("update"))
        );
        Ok(())
    }

    #[test]
    fn virtual_tabs_reject_drops() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char(' '));
        let now = Instant::now();
        let x = fx.body_x();
        let row = fx.row_y(0);
        fx.mouse(down(), x, row, now);
        let (tab_x, tab_y) = fx.tab_point(ActiveTab::List(ListTab::Met))?;
        fx.mouse(drag(), tab_x, tab_y, now);
        fx.mouse(up(), tab_x, tab_y, now);

        assert!(fx.status().contains("cannot be moved"));
        assert!(fx.workspace.drag_payload().is_none());
        assert!(
            fx.runtime
                .persistence
                .writes()
                .iter()
                .all(|write| !write.starts_with("update"))
        );
        Ok(())
    }

    #[test]
    fn releasing_a_drag_outside_the_tabs_cancels_it() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char(' '));
        let now = Instant::now();
        let x = fx.body_x();
        let (row0, row2) = (fx.row_y(0), fx.row_y(2));
        fx.mouse(down(), x, row0, now);
        fx.mouse(drag(), x, row2, now);
        assert!(fx.workspace.drag_payload().is_some());
        assert!(!fx.workspace.selection().is_range_selecting());
        fx.mouse(up(), x, row2, now);

        assert!(fx.workspace.drag_payload().is_none());
        assert_eq!(fx.status(), "drag canceled");
        assert_eq!(fx.workspace.selection().len(), 1);
        Ok(())
    }

    #[test]
    fn autoscroll_grows_the_range_while_the_pointer_rests_in_the_margin() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.view_data.area = Rect::new(0, 0, 120, 12);
        let body = grid_geometry(fx.view_data.area).body;
        assert_eq!(body.height, 4);

        let start = Instant::now();
        let x = fx.body_x();
        fx.mouse(down(), x, body.y, start);
        fx.mouse(drag(), x, body.y + 3, start);
        assert_eq!(fx.workspace.selection().len(), 4);
        assert!(fx.workspace.selection().is_autoscrolling());

        assert!(advance_autoscroll(
            &mut fx.workspace,
            &mut fx.view_data,
            start + Duration::from_millis(60)
        ));
        assert_eq!(fx.workspace.selection().len(), 6);
        assert_eq!(fx.view_data.scroll, 2);
        assert_eq!(fx.view_data.cursor, 5);

        fx.mouse(up(), x, body.y + 3, start + Duration::from_millis(70));
        assert!(!fx.workspace.selection().is_autoscrolling());
        assert!(!advance_autoscroll(
            &mut fx.workspace,
            &mut fx.view_data,
            start + Duration::from_millis(200)
        ));
        assert_eq!(fx.workspace.selection().len(), 6);
        Ok(())
    }

    #[test]
    fn autoscroll_keeps_the_far_end_under_the_pointer() -> Result<()> {
        let mut fx = Fixture::new()?;
        for index in 0..10 {
            fx.runtime
                .persistence
                .seed_company(&format!("追加{index}社"), fx.sato, None)?;
        }
        let options = WorkspaceOptions {
            autoscroll: AutoScrollConfig {
                min_speed: 1.0,
                max_speed: 1.0,
                ..AutoScrollConfig::default()
            },
            ..WorkspaceOptions::default()
        };
        fx.workspace = Workspace::load(&mut fx.runtime.persistence, options)?;
        fx.view_data.area = Rect::new(0, 0, 120, 12);
        let body = grid_geometry(fx.view_data.area).body;
        assert_eq!(fx.visible().len(), 16);

        let start = Instant::now();
        let x = fx.body_x();
        fx.mouse(down(), x, body.y, start);
        fx.mouse(drag(), x, body.y + 3, start);
        assert!(advance_autoscroll(
            &mut fx.workspace,
            &mut fx.view_data,
            start + Duration::from_millis(30)
        ));
        assert_eq!(fx.workspace.selection().range_bounds(), Some((0, 6)));
        assert_eq!(fx.view_data.cursor, 6);
        assert_eq!(fx.view_data.scroll, 3, "far end sits on the last body row");

        fx.mouse(drag(), x, body.y + 3, start + Duration::from_millis(35));
        assert_eq!(fx.workspace.selection().len(), 7);
        assert_eq!(fx.workspace.selection().range_bounds(), Some((0, 6)));
        Ok(())
    }

    #[test]
    fn escape_aborts_range_selection_and_autoscroll() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.view_data.area = Rect::new(0, 0, 120, 12);
        let body = grid_geometry(fx.view_data.area).body;
        let start = Instant::now();
        let x = fx.body_x();
        fx.mouse(down(), x, body.y, start);
        fx.mouse(drag(), x, body.y + 3, start);

        fx.key(KeyCode::Esc);
        assert!(!fx.workspace.selection().is_range_selecting());
        assert!(!fx.workspace.selection().is_autoscrolling());
        assert_eq!(fx.workspace.selection().len(), 4);
        Ok(())
    }

    #[test]
    fn tab_regions_follow_display_width() -> Result<()> {
        let fx = Fixture::new()?;
        let regions = tab_regions(&fx.workspace, fx.view_data.area);
        assert_eq!(regions.len(), 6);
        // "すべて 6" is eight columns wide, plus one column of padding each side.
        assert_eq!(regions[0].tab, ActiveTab::List(ListTab::All));
        assert_eq!((regions[0].start, regions[0].end), (1, 11));
        assert_eq!(regions[1].start, 12);
        Ok(())
    }

    #[test]
    fn stale_status_clears_are_ignored() {
        let mut view_data = ViewData {
            status_line: Some("saved".to_owned()),
            status_token: 2,
            ..ViewData::default()
        };
        let (tx, rx) = mpsc::channel();
        tx.send(InternalEvent::ClearStatus { token: 1 })
            .expect("channel open");
        process_internal_events(&mut view_data, &rx);
        assert_eq!(view_data.status_line.as_deref(), Some("saved"));

        tx.send(InternalEvent::ClearStatus { token: 2 })
            .expect("channel open");
        process_internal_events(&mut view_data, &rx);
        assert_eq!(view_data.status_line, None);
    }

    #[test]
    fn overlays_hide_the_status_bar() -> Result<()> {
        let mut fx = Fixture::new()?;
        assert!(status_text(&fx.workspace, &fx.view_data).starts_with("NAV"));
        fx.key(KeyCode::Char('?'));
        assert_eq!(status_text(&fx.workspace, &fx.view_data), "");
        assert!(help_overlay_text().contains("drag selected rows onto a tab"));
        fx.key(KeyCode::Esc);
        assert!(!fx.view_data.help_visible);
        Ok(())
    }

    #[test]
    fn company_detail_manages_the_activity_timeline() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('G'));
        fx.key(KeyCode::Enter);
        let detail = fx
            .view_data
            .detail
            .ok_or_else(|| anyhow!("detail should be open"))?;
        let company = detail.company;
        assert_eq!(fx.names()[5], "A社");
        let text = render_detail_text(&fx.workspace, detail);
        assert!(text.starts_with("A社"));
        assert!(text.contains("activities (1)"));
        assert!(status_text(&fx.workspace, &fx.view_data).starts_with("DETAIL"));

        fx.key(KeyCode::Char('n'));
        assert!(fx.view_data.form.is_some());
        fx.key_with(KeyCode::Char('u'), KeyModifiers::CONTROL);
        fx.type_text("2026-03-01");
        fx.key(KeyCode::Tab);
        fx.key(KeyCode::Char('3'));
        fx.key(KeyCode::Tab);
        fx.key(KeyCode::Tab);
        fx.type_text("折り返し電話");
        fx.key(KeyCode::Enter);
        assert!(fx.view_data.form.is_none());
        assert_eq!(fx.status(), "added 電話 activity");
        let timeline = fx.workspace.store().activities_for(company);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].kind, ActivityKind::Phone);
        assert_eq!(timeline[0].title, "電話記録");
        assert!(fx.view_data.detail.is_some());

        fx.key(KeyCode::Char('d'));
        fx.key(KeyCode::Char('y'));
        assert_eq!(fx.status(), "deleted activity");
        let timeline = fx.workspace.store().activities_for(company);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].kind, ActivityKind::Negotiation);
        assert_eq!(fx.runtime.persistence.activities().len(), 1);

        fx.key(KeyCode::Char('e'));
        for _ in 0..4 {
            fx.key(KeyCode::Tab);
        }
        fx.type_text("500000");
        fx.key(KeyCode::Enter);
        assert_eq!(fx.status(), "saved activity");
        assert_eq!(fx.runtime.persistence.activities()[0].amount_yen, Some(500_000));

        fx.key(KeyCode::Esc);
        assert!(fx.view_data.detail.is_none());
        Ok(())
    }

    #[test]
    fn company_form_adds_and_edits_companies() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('n'));
        fx.key(KeyCode::Enter);
        assert_eq!(fx.status(), "form invalid: company name is required");
        assert!(fx.view_data.form.is_some());
        assert!(status_text(&fx.workspace, &fx.view_data).starts_with("FORM"));

        fx.type_text("G社");
        fx.key(KeyCode::Enter);
        assert_eq!(fx.status(), "added company G社");
        assert_eq!(fx.runtime.persistence.companies().len(), 7);
        assert_eq!(fx.names()[fx.view_data.cursor], "G社");
        let added = fx.visible()[fx.view_data.cursor];
        assert_eq!(fx.runtime.persistence.company(added)?.contact_person, "未設定");

        fx.key(KeyCode::Char('e'));
        fx.key_with(KeyCode::Char('u'), KeyModifiers::CONTROL);
        fx.type_text("H社");
        for _ in 0..7 {
            fx.key(KeyCode::Tab);
        }
        fx.key(KeyCode::Right);
        fx.key(KeyCode::Enter);
        assert_eq!(fx.status(), "saved company H社");
        let first_list = fx.workspace.store().lists()[0].id;
        let saved = fx.runtime.persistence.company(added)?;
        assert_eq!(saved.name, "H社");
        assert_eq!(saved.list_id, Some(first_list));

        fx.key(KeyCode::Char('e'));
        fx.key(KeyCode::Esc);
        assert!(fx.view_data.form.is_none());
        assert_eq!(fx.status(), "form canceled");
        Ok(())
    }

    #[test]
    fn lists_and_representatives_are_added_and_renamed_from_tabs() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('E'));
        assert_eq!(
            fx.status(),
            "switch to a list or representative tab to edit it"
        );

        fx.key(KeyCode::Char('N'));
        fx.type_text("紹介");
        fx.key(KeyCode::Enter);
        assert_eq!(fx.runtime.persistence.lists().len(), 3);
        let ActiveTab::List(ListTab::List(list)) = fx.workspace.active_tab() else {
            return Err(anyhow!("new list tab should be active"));
        };
        fx.key(KeyCode::Char('E'));
        fx.type_text("案件");
        fx.key(KeyCode::Enter);
        assert_eq!(fx.status(), "saved list 紹介案件");
        assert_eq!(fx.workspace.store().list_name(Some(list)), "紹介案件");

        fx.key(KeyCode::Char('v'));
        fx.key(KeyCode::Char('N'));
        fx.type_text("高橋");
        fx.key(KeyCode::Enter);
        assert!(fx.status().contains("representative email is required"));
        fx.key(KeyCode::Tab);
        fx.type_text("takahashi@example.jp");
        fx.key(KeyCode::Enter);
        assert_eq!(fx.runtime.persistence.representatives().len(), 3);
        let ActiveTab::Representative(RepresentativeTab::Representative(rep)) =
            fx.workspace.active_tab()
        else {
            return Err(anyhow!("new representative tab should be active"));
        };

        fx.key(KeyCode::Char('E'));
        fx.key_with(KeyCode::Char('u'), KeyModifiers::CONTROL);
        fx.type_text("高橋一郎");
        fx.key(KeyCode::Enter);
        assert_eq!(fx.workspace.store().representative_name(rep), "高橋一郎");
        assert_eq!(fx.status(), "saved representative 高橋一郎");
        Ok(())
    }

    #[test]
    fn open_overlays_ignore_row_clicks() -> Result<()> {
        let mut fx = Fixture::new()?;
        fx.key(KeyCode::Char('o'));
        let now = Instant::now();
        let x = fx.body_x();
        let row = fx.row_y(2);
        fx.mouse(down(), x, row, now);
        assert!(fx.workspace.selection().is_empty());
        assert_eq!(fx.view_data.cursor, 0);
        Ok(())
    }

    #[test]
    fn digit_choice_is_one_based_and_bounded() {
        assert_eq!(digit_choice('1', 4), Some(0));
        assert_eq!(digit_choice('4', 4), Some(3));
        assert_eq!(digit_choice('5', 4), None);
        assert_eq!(digit_choice('0', 4), None);
        assert_eq!(digit_choice('x', 4), None);
    }
}
