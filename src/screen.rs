use tracing::{debug, info};

use crate::domain::TDError;
use crate::table::{Record, SortState, TabularView};

pub type Loader<R> = Box<dyn Fn() -> Result<Vec<R>, TDError> + Send>;

/// What the console needs from a table, independent of the record type.
pub trait TableScreen {
    fn title(&self) -> &str;
    fn headers(&self) -> Vec<String>;
    fn render_rows(&self) -> Vec<Vec<String>>;
    fn len(&self) -> usize;
    fn total(&self) -> usize;
    fn empty_message(&self) -> &str;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_searchable(&self) -> bool;
    fn search_term(&self) -> &str;
    fn set_search_term(&mut self, term: &str);

    /// Cycle the sort of the column at `column`. False when it is not sortable.
    fn toggle_sort(&mut self, column: usize) -> bool;
    fn sort_state(&self) -> Option<&SortState>;

    /// Header and rendered value of every column for the visible row `position`.
    fn record_details(&self, position: usize) -> Option<Vec<(String, String)>>;

    fn can_reload(&self) -> bool;

    /// Fetch the records again, returns the new record count.
    fn reload(&mut self) -> Result<usize, TDError>;
}

/// A [`TabularView`] fed by an optional record source.
pub struct CollectionScreen<R> {
    view: TabularView<R>,
    loader: Option<Loader<R>>,
}

impl<R: Record> CollectionScreen<R> {
    pub fn new(view: TabularView<R>) -> Self {
        Self { view, loader: None }
    }

    /// Load the first snapshot through `loader` and keep it for reloads.
    pub fn load(view: TabularView<R>, loader: Loader<R>) -> Result<Self, TDError> {
        let mut screen = Self {
            view,
            loader: Some(loader),
        };
        screen.reload()?;
        Ok(screen)
    }

    pub fn view(&self) -> &TabularView<R> {
        &self.view
    }
}

impl<R: Record> TableScreen for CollectionScreen<R> {
    fn title(&self) -> &str {
        self.view.title()
    }

    fn headers(&self) -> Vec<String> {
        self.view.headers()
    }

    fn render_rows(&self) -> Vec<Vec<String>> {
        self.view.render_rows()
    }

    fn len(&self) -> usize {
        self.view.len()
    }

    fn total(&self) -> usize {
        self.view.records().len()
    }

    fn empty_message(&self) -> &str {
        self.view.empty_message()
    }

    fn is_searchable(&self) -> bool {
        self.view.is_searchable()
    }

    fn search_term(&self) -> &str {
        self.view.search_term()
    }

    fn set_search_term(&mut self, term: &str) {
        self.view.set_search_term(term);
    }

    fn toggle_sort(&mut self, column: usize) -> bool {
        let Some(key) = self.view.columns().get(column).map(|c| c.key.clone()) else {
            return false;
        };
        self.view.set_sort_key(&key)
    }

    fn sort_state(&self) -> Option<&SortState> {
        self.view.sort_state()
    }

    fn record_details(&self, position: usize) -> Option<Vec<(String, String)>> {
        let record = self.view.get(position)?;
        let mut details = vec![("id".to_string(), record.id().to_string())];
        details.extend(
            self.view
                .columns()
                .iter()
                .map(|c| (c.header.clone(), self.view.render_cell(record, c))),
        );
        Some(details)
    }

    fn can_reload(&self) -> bool {
        self.loader.is_some()
    }

    fn reload(&mut self) -> Result<usize, TDError> {
        let Some(loader) = self.loader.as_ref() else {
            debug!("{} has no record source, nothing to reload", self.view.title());
            return Ok(self.view.records().len());
        };
        let records = loader()?;
        let count = records.len();
        self.view.set_records(records);
        info!("Reloaded {}: {count} records", self.view.title());
        Ok(count)
    }
}
