use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{CMDMode, HELP_TEXT, Message, TDConfig, TDError};
use crate::inputter::{InputResult, Inputter};
use crate::screen::TableScreen;
use crate::table::SortDirection;
use crate::ui::{
    CMDLINE_HEIGHT, COLUMN_SPACING, COLUMN_WIDTH_MARGIN, TABLE_BORDER, TABLE_HEADER_HEIGHT,
    UPLOAD_PANEL_HEIGHT,
};
use crate::upload::{
    AssetValue, BatchOutcome, DirectUploadClient, LocalFile, UploadBackend, UploadMode,
    UploaderState,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    UPLOADING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

/// Uploader as shown below the table.
#[derive(Debug, Clone, Default)]
pub struct UploadPanelData {
    pub mode: String,
    pub state: String,
    pub assets: Vec<String>,
}

pub struct UIData {
    pub name: String,
    pub headers: Vec<String>,
    pub widths: Vec<usize>,
    pub rows: Vec<Vec<String>>, // Only the rows inside the viewport
    pub nrows: usize,
    pub total: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub empty_message: String,
    pub show_record: bool,
    pub record: Vec<(String, String)>,
    pub selected_field: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub uploads: Option<UploadPanelData>,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            headers: Vec::new(),
            widths: Vec::new(),
            rows: Vec::new(),
            nrows: 0,
            total: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            empty_message: String::new(),
            show_record: false,
            record: Vec::new(),
            selected_field: 0,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            uploads: None,
            last_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub uploads_height: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize, uploads_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(2 * TABLE_BORDER),
            table_height: ui_height
                .saturating_sub(CMDLINE_HEIGHT + TABLE_HEADER_HEIGHT + 2 * TABLE_BORDER + uploads_height)
                .max(1),
            uploads_height,
            statusline_height: CMDLINE_HEIGHT,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

/// The uploader embedded in the console, plus the draft its callbacks feed.
struct UploadPanel {
    client: DirectUploadClient,
    backend: Arc<UploadBackend>,
    pending: Option<Receiver<BatchOutcome>>,
    draft: Rc<RefCell<AssetValue>>,
    failures: Rc<RefCell<Vec<String>>>,
}

impl UploadPanel {
    fn new(backend: UploadBackend, mode: UploadMode) -> Self {
        let client = DirectUploadClient::new(mode);
        let draft = Rc::new(RefCell::new(client.value()));
        let failures = Rc::new(RefCell::new(Vec::new()));

        let draft_sink = Rc::clone(&draft);
        let failure_sink = Rc::clone(&failures);
        let client = client
            .on_change(move |value| {
                debug!("Asset value is now {} asset(s)", value.assets().len());
                *draft_sink.borrow_mut() = value.clone();
            })
            .on_failure(move |failure| {
                failure_sink
                    .borrow_mut()
                    .push(format!("{}: {}", failure.file_name, failure.error));
            });

        Self {
            client,
            backend: Arc::new(backend),
            pending: None,
            draft,
            failures,
        }
    }

    fn panel_data(&self) -> UploadPanelData {
        let mode = match self.client.mode() {
            UploadMode::Single => "single image",
            UploadMode::Multiple => "multiple images",
        };
        let state = match self.client.state() {
            UploaderState::Idle => "idle".to_string(),
            UploaderState::DraggingOver => "drop files".to_string(),
            UploaderState::Uploading { pending } => format!("uploading {pending} file(s) ..."),
        };
        let assets = self
            .draft
            .borrow()
            .assets()
            .iter()
            .enumerate()
            .map(|(idx, asset)| format!("{}. {} ({})", idx + 1, asset.url, asset.key))
            .collect();
        UploadPanelData {
            mode: mode.to_string(),
            state,
            assets,
        }
    }
}

pub struct Model {
    config: TDConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    screen: Box<dyn TableScreen>,
    uploads: Option<UploadPanel>,
    curser_row: usize,
    offset_row: usize,
    curser_column: usize,
    offset_column: usize,
    record_field: usize,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    search_before: String,
    status_message: String,
}

impl Model {
    /// `backend` enables the upload panel.
    pub fn init(
        config: &TDConfig,
        screen: Box<dyn TableScreen>,
        backend: Option<UploadBackend>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let mode = if config.multiple_uploads {
            UploadMode::Multiple
        } else {
            UploadMode::Single
        };
        let uploads = backend.map(|b| UploadPanel::new(b, mode));
        let uploads_height = if uploads.is_some() { UPLOAD_PANEL_HEIGHT } else { 0 };

        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            screen,
            uploads,
            curser_row: 0,
            offset_row: 0,
            curser_column: 0,
            offset_column: 0,
            record_field: 0,
            uilayout: UILayout::from_values(ui_width, ui_height, uploads_height),
            uidata: UIData::empty(),
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            search_before: String::new(),
            status_message: String::new(),
        };
        model.update_table_data();
        let message = format!("Loaded {} records into {}", model.screen.total(), model.screen.title());
        model.set_status_message(message);
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn is_uploading(&self) -> bool {
        self.status == Status::UPLOADING
    }

    /// The value the uploader last handed to its owner.
    pub fn asset_value(&self) -> Option<AssetValue> {
        self.uploads.as_ref().map(|p| p.draft.borrow().clone())
    }

    pub fn screen(&self) -> &dyn TableScreen {
        self.screen.as_ref()
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TDError> {
        self.poll_upload();

        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.uilayout.table_height)
                    }
                    Message::MoveBeginning => self.select_row(0),
                    Message::MoveEnd => self.select_row(self.screen.len().saturating_sub(1)),
                    Message::Sort => self.sort_current_column(),
                    Message::Search => self.start_search(),
                    Message::Upload => self.start_upload_input(),
                    Message::RemoveAsset => self.remove_asset(),
                    Message::CopyAssets => self.copy_assets(),
                    Message::Refresh => self.refresh(),
                    Message::Enter => self.enter(),
                    Message::Exit => self.exit(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::RawKey(_) => (),
                },
                Modus::RECORD => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_record_selection(1),
                    Message::MoveUp => self.move_record_selection(-1),
                    Message::MoveLeft => self.step_record(-1),
                    Message::MoveRight => self.step_record(1),
                    Message::CopyAssets => self.copy_record_field(),
                    Message::Help => self.show_help(),
                    Message::Exit | Message::Enter => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter | Message::Help => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height, self.uilayout.uploads_height);
        let abs = self.offset_row + self.curser_row;
        self.select_row(abs);
    }

    fn enter(&mut self) {
        let abs = self.offset_row + self.curser_row;
        match self.screen.record_details(abs) {
            Some(details) => {
                trace!("Showing record {abs}");
                self.previous_modus = self.modus;
                self.modus = Modus::RECORD;
                self.record_field = 0;
                self.uidata.record = details;
                self.update_record_data();
            }
            None => self.set_status_message("No record selected"),
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {
                // Esc on the table drops an active search
                if !self.screen.search_term().is_empty() {
                    self.screen.set_search_term("");
                    self.select_row(self.offset_row + self.curser_row);
                    self.set_status_message("Search cleared");
                }
            }
            Modus::RECORD => {
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
                self.uidata.show_record = false;
                self.update_table_data();
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
                self.uidata.last_update = Instant::now();
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
        self.uidata.last_update = Instant::now();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_cmd_input();
        } else if self.cmd_mode == Some(CMDMode::Search) {
            // Live search while typing
            let term = self.last_input.input.clone();
            self.apply_search(&term);
        }
        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.cmd_mode = self.cmd_mode;
        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.last_update = Instant::now();
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode, preset: &str) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.clear();
        self.input.set(preset);
        self.last_input = self.input.get();

        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.cmd_mode = self.cmd_mode;
        self.uidata.last_update = Instant::now();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.uidata.active_cmdinput = false;

        let cmd_input = self.last_input.input.clone();
        let canceled = self.last_input.canceled;
        match self.cmd_mode.take() {
            Some(CMDMode::Search) if canceled => {
                let previous = std::mem::take(&mut self.search_before);
                self.apply_search(&previous);
            }
            Some(CMDMode::Search) => {
                self.apply_search(&cmd_input);
                let message = format!("{} of {} records match", self.screen.len(), self.screen.total());
                self.set_status_message(message);
            }
            Some(_) if canceled => self.set_status_message("Canceled"),
            Some(CMDMode::Upload) => self.start_upload(&cmd_input),
            Some(CMDMode::RemoveAsset) => self.remove_asset_at(&cmd_input),
            None => info!("Cmd mode is none!"),
        }
        self.uidata.cmd_mode = None;
    }

    fn start_search(&mut self) {
        if !self.screen.is_searchable() {
            self.set_status_message("This table has no searchable columns");
            return;
        }
        self.search_before = self.screen.search_term().to_string();
        let preset = self.search_before.clone();
        self.enter_cmd_mode(CMDMode::Search, &preset);
    }

    fn apply_search(&mut self, term: &str) {
        self.screen.set_search_term(term);
        self.select_row(0);
    }

    fn sort_current_column(&mut self) {
        if !self.screen.toggle_sort(self.curser_column) {
            self.set_status_message("Column is not sortable");
            return;
        }
        let message = match self.screen.sort_state() {
            Some(state) => {
                let direction = match state.direction {
                    SortDirection::Ascending => "ascending",
                    SortDirection::Descending => "descending",
                };
                format!("Sorted by {} ({direction})", state.key)
            }
            None => "Sort cleared".to_string(),
        };
        self.set_status_message(message);
        self.select_row(0);
    }

    fn refresh(&mut self) {
        if !self.screen.can_reload() {
            self.set_status_message("Nothing to reload for a local file");
            return;
        }
        let start_time = Instant::now();
        match self.screen.reload() {
            Ok(count) => {
                debug!("Reload took {}ms", start_time.elapsed().as_millis());
                self.set_status_message(format!("Reloaded {count} records"));
            }
            Err(e) => {
                error!("Reload of {} failed: {e}", self.screen.title());
                self.set_status_message(e.to_string());
            }
        }
        self.select_row(self.offset_row + self.curser_row);
    }

    // -------------------- Uploads ---------------------- //

    fn start_upload_input(&mut self) {
        let message = match self.uploads.as_ref() {
            None => "Uploads need an API url (--api-url)",
            Some(panel) if !panel.client.is_accepting_input() => "An upload is still in progress",
            Some(_) => {
                self.enter_cmd_mode(CMDMode::Upload, "");
                return;
            }
        };
        self.set_status_message(message);
    }

    /// `input` holds whitespace separated paths, `~` and `$VAR` are expanded.
    fn start_upload(&mut self, input: &str) {
        let mut files = Vec::new();
        let mut unreadable = Vec::new();
        for raw in input.split_whitespace() {
            let path = match shellexpand::full(raw) {
                Ok(expanded) => PathBuf::from(expanded.as_ref()),
                Err(e) => {
                    unreadable.push(format!("{raw} ({e})"));
                    continue;
                }
            };
            match LocalFile::read(&path) {
                Ok(file) => files.push(file),
                Err(e) => {
                    warn!("Can not read {}: {e}", path.display());
                    unreadable.push(format!("{raw} ({e})"));
                }
            }
        }
        let non_images = files.iter().filter(|f| !f.is_image()).count();

        let Some(panel) = self.uploads.as_mut() else {
            return;
        };
        let mut message = match panel.client.select_files(files) {
            Some(batch) => {
                info!("Uploading {:?}", batch.file_names());
                let count = batch.len();
                let (tx, rx) = mpsc::channel();
                let backend = Arc::clone(&panel.backend);
                thread::spawn(move || {
                    let outcome = backend.run(batch);
                    if tx.send(outcome).is_err() {
                        warn!("Upload finished after the console went away");
                    }
                });
                panel.pending = Some(rx);
                self.status = Status::UPLOADING;
                format!("Uploading {count} file(s) ...")
            }
            None if non_images > 0 => format!("No image to upload, skipped {non_images} non-image file(s)"),
            None => "Nothing to upload".to_string(),
        };
        if !unreadable.is_empty() {
            message = format!("{message}; can not read {}", unreadable.join(", "));
        }
        self.set_status_message(message);
        self.update_uploads_data();
    }

    fn poll_upload(&mut self) {
        let Some(panel) = self.uploads.as_mut() else {
            return;
        };
        let Some(rx) = panel.pending.as_ref() else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                error!("Upload worker stopped without a result");
                BatchOutcome {
                    settled: Vec::new(),
                    rejected: Vec::new(),
                }
            }
        };
        panel.pending = None;
        panel.client.complete(&outcome);
        let failures: Vec<String> = panel.failures.borrow_mut().drain(..).collect();

        self.status = Status::READY;
        let mut message = outcome.summary();
        if let Some(first) = failures.first() {
            message = format!("{message} ({first})");
        }
        info!("Upload batch settled: {message}");
        self.set_status_message(message);
        self.update_uploads_data();
    }

    fn remove_asset(&mut self) {
        let Some(panel) = self.uploads.as_mut() else {
            self.set_status_message("Uploads need an API url (--api-url)");
            return;
        };
        if panel.client.assets().is_empty() {
            self.set_status_message("No uploaded images");
            return;
        }
        match panel.client.mode() {
            UploadMode::Single => {
                let removed = panel.client.remove(0);
                self.set_status_message(if removed {
                    "Removed image"
                } else {
                    "An upload is still in progress"
                });
                self.update_uploads_data();
            }
            UploadMode::Multiple => self.enter_cmd_mode(CMDMode::RemoveAsset, ""),
        }
    }

    fn remove_asset_at(&mut self, input: &str) {
        let Some(panel) = self.uploads.as_mut() else {
            return;
        };
        let message = match input.trim().parse::<usize>() {
            Ok(n) if n >= 1 && panel.client.remove(n - 1) => format!("Removed image {n}"),
            _ => format!("No image number {:?}", input.trim()),
        };
        self.set_status_message(message);
        self.update_uploads_data();
    }

    fn copy_assets(&mut self) {
        let Some(panel) = self.uploads.as_ref() else {
            self.set_status_message("Uploads need an API url (--api-url)");
            return;
        };
        let json = match serde_json::to_string(&*panel.draft.borrow()) {
            Ok(json) => json,
            Err(e) => {
                error!("Can not serialize asset value: {e}");
                return;
            }
        };
        match self.copy_to_clipboard(json) {
            Ok(_) => self.set_status_message("Copied asset value to clipboard"),
            Err(e) => {
                trace!("Error copying to clipboard: {e:?}");
                self.set_status_message(format!("Clipboard unavailable: {e}"));
            }
        }
    }

    fn copy_record_field(&mut self) {
        let Some((_, value)) = self.uidata.record.get(self.record_field).cloned() else {
            return;
        };
        match self.copy_to_clipboard(value) {
            Ok(_) => trace!("Copied field content to clipboard."),
            Err(e) => trace!("Error copying to clipboard: {e:?}"),
        }
    }

    fn copy_to_clipboard(&mut self, text: String) -> Result<(), arboard::Error> {
        if self.clipboard.is_none() {
            self.clipboard = Some(Clipboard::new()?);
        }
        match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(text),
            None => Ok(()),
        }
    }

    // -------------------- Selection ---------------------- //

    fn move_table_selection_up(&mut self, size: usize) {
        let abs = (self.offset_row + self.curser_row).saturating_sub(size.max(1));
        self.select_row(abs);
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let abs = self.offset_row + self.curser_row + size.max(1);
        self.select_row(abs);
    }

    fn move_table_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        if self.curser_column + 1 < self.screen.headers().len() {
            self.curser_column += 1;
        }
        self.update_table_data();
    }

    /// Select the visible row `abs` (clamped), scrolling it into view.
    fn select_row(&mut self, abs: usize) {
        let nrows = self.screen.len();
        let height = self.uilayout.table_height.max(1);
        let abs = abs.min(nrows.saturating_sub(1));
        if abs < self.offset_row {
            self.offset_row = abs;
        } else if abs >= self.offset_row + height {
            self.offset_row = abs + 1 - height;
        }
        self.curser_row = abs - self.offset_row;
        self.update_table_data();
    }

    fn move_record_selection(&mut self, step: isize) {
        let nfields = self.uidata.record.len();
        if nfields == 0 {
            return;
        }
        self.record_field = self
            .record_field
            .saturating_add_signed(step)
            .min(nfields - 1);
        self.update_record_data();
    }

    fn step_record(&mut self, step: isize) {
        let abs = (self.offset_row + self.curser_row).saturating_add_signed(step);
        if abs >= self.screen.len() {
            return;
        }
        self.select_row(abs);
        if let Some(details) = self.screen.record_details(abs) {
            self.uidata.record = details;
            self.record_field = self.record_field.min(self.uidata.record.len().saturating_sub(1));
        }
        self.update_record_data();
    }

    // -------------------- UI data ---------------------- //

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        debug!("Status: {}", self.status_message);
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_update = Instant::now();
    }

    fn update_uploads_data(&mut self) {
        self.uidata.uploads = self.uploads.as_ref().map(UploadPanel::panel_data);
        self.uidata.last_update = Instant::now();
    }

    fn update_record_data(&mut self) {
        self.uidata.show_record = true;
        self.uidata.selected_field = self.record_field;
        self.uidata.abs_selected_row = self.offset_row + self.curser_row;
        self.uidata.last_update = Instant::now();
    }

    fn update_table_data(&mut self) {
        let headers = self.screen.headers();
        let rows = self.screen.render_rows();

        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let cells = rows.iter().map(|r| r.get(idx).map(String::as_str).unwrap_or(""));
                Self::calculate_column_width(header, cells, self.config.max_column_width)
            })
            .collect();

        if self.curser_column >= widths.len() {
            self.curser_column = widths.len().saturating_sub(1);
        }
        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }
        while self.offset_column < self.curser_column
            && widths[self.offset_column..=self.curser_column]
                .iter()
                .map(|w| w + COLUMN_SPACING)
                .sum::<usize>()
                > self.uilayout.table_width
        {
            self.offset_column += 1;
        }

        let rbegin = self.offset_row.min(rows.len());
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, rows.len());
        let cbegin = self.offset_column.min(widths.len());
        trace!(
            "Table: Cr {}, Cc {}, Or {}, Oc {}, Rb {}, Re {}",
            self.curser_row, self.curser_column, self.offset_row, self.offset_column, rbegin, rend
        );

        self.uidata = UIData {
            name: self.screen.title().to_string(),
            headers: headers[cbegin..].to_vec(),
            widths: widths[cbegin..].to_vec(),
            rows: rows[rbegin..rend]
                .iter()
                .map(|r| r.iter().skip(cbegin).cloned().collect())
                .collect(),
            nrows: self.screen.len(),
            total: self.screen.total(),
            selected_row: self.curser_row,
            selected_column: self.curser_column - cbegin,
            abs_selected_row: self.offset_row + self.curser_row,
            empty_message: self.screen.empty_message().to_string(),
            show_record: self.modus == Modus::RECORD,
            record: std::mem::take(&mut self.uidata.record),
            selected_field: self.record_field,
            show_popup: self.uidata.show_popup,
            popup_message: std::mem::take(&mut self.uidata.popup_message),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            uploads: self.uploads.as_ref().map(UploadPanel::panel_data),
            last_update: Instant::now(),
        };
    }

    fn calculate_column_width<'a>(
        header: &str,
        cells: impl Iterator<Item = &'a str>,
        max_column_width: usize,
    ) -> usize {
        let widest = cells.map(|c| c.chars().count()).max().unwrap_or(0);
        let width = std::cmp::max(header.chars().count(), widest) + COLUMN_WIDTH_MARGIN;
        std::cmp::min(width, max_column_width.max(3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_width_is_capped() {
        let cells = ["a", "abcdef"].into_iter();
        assert_eq!(Model::calculate_column_width("Id", cells, 40), 6 + COLUMN_WIDTH_MARGIN);
        let cells = ["x".repeat(100)];
        assert_eq!(
            Model::calculate_column_width("Id", cells.iter().map(String::as_str), 20),
            20
        );
        assert_eq!(Model::calculate_column_width("Name", std::iter::empty(), 40), 4 + COLUMN_WIDTH_MARGIN);
    }

    #[test]
    fn layout_never_underflows() {
        let layout = UILayout::from_values(2, 3, UPLOAD_PANEL_HEIGHT);
        assert_eq!(layout.table_height, 1);
        assert_eq!(layout.table_width, 0);
    }
}
