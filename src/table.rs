//! Client-side search and sort over an in-memory collection of records.
//!
//! [`TabularView`] never mutates the records it is given. It keeps a mapping
//! from view position to record index (`rows`) that is rebuilt whenever the
//! records, the search term or the sort state change.

use std::cmp::Ordering;
use std::fmt;

use derive_setters::Setters;
use tracing::trace;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

pub const DEFAULT_EMPTY_MESSAGE: &str = "No data found";

/// A primitive attribute value borrowed from a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Text(&'a str),
    Number(f64),
    Bool(bool),
}

impl Value<'_> {
    /// Text form used for rendering and searching. Numbers use the `f64`
    /// `Display` form: `3`, `3.5`, never an exponent, and `-0` for
    /// negative zero.
    pub fn to_display(&self) -> String {
        match self {
            Value::Text(s) => s.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn kind(&self) -> u8 {
        match self {
            Value::Text(_) => 0,
            Value::Number(_) => 1,
            Value::Bool(_) => 2,
        }
    }
}

/// One row of domain data. `id` must be unique within a collection.
pub trait Record {
    fn id(&self) -> &str;

    /// Attribute lookup by name. `None` means the attribute is absent.
    fn value(&self, key: &str) -> Option<Value<'_>>;
}

pub type Render<R> = fn(&R) -> String;

#[derive(Setters)]
pub struct ColumnDescriptor<R> {
    #[setters(skip)]
    pub key: String,
    #[setters(skip)]
    pub header: String,
    pub sortable: bool,
    #[setters(strip_option)]
    pub render: Option<Render<R>>,
}

impl<R> ColumnDescriptor<R> {
    pub fn new(key: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
            sortable: false,
            render: None,
        }
    }
}

impl<R> Clone for ColumnDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            header: self.header.clone(),
            sortable: self.sortable,
            render: self.render,
        }
    }
}

impl<R> fmt::Debug for ColumnDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("key", &self.key)
            .field("header", &self.header)
            .field("sortable", &self.sortable)
            .field("render", &self.render.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub key: String,
    pub direction: SortDirection,
}

pub struct TabularView<R> {
    title: String,
    records: Vec<R>,
    columns: Vec<ColumnDescriptor<R>>,
    search_keys: Vec<String>,
    search_term: String,
    sort: Option<SortState>,
    empty_message: String,
    rows: Vec<usize>, // Mapping of view position to record index
}

impl<R: Record> TabularView<R> {
    pub fn new(records: Vec<R>, columns: Vec<ColumnDescriptor<R>>) -> Self {
        let mut view = Self {
            title: String::new(),
            records,
            columns,
            search_keys: Vec::new(),
            search_term: String::new(),
            sort: None,
            empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
            rows: Vec::new(),
        };
        view.refresh();
        view
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_search_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_keys = keys.into_iter().map(Into::into).collect();
        self.refresh();
        self
    }

    pub fn with_empty_message(mut self, message: impl Into<String>) -> Self {
        self.empty_message = message.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn columns(&self) -> &[ColumnDescriptor<R>] {
        &self.columns
    }

    pub fn search_keys(&self) -> &[String] {
        &self.search_keys
    }

    /// Replace the collection, e.g. after the record source was refreshed.
    /// Search term and sort state are kept.
    pub fn set_records(&mut self, records: Vec<R>) {
        self.records = records;
        self.refresh();
    }

    pub fn is_searchable(&self) -> bool {
        !self.search_keys.is_empty()
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn set_search_term(&mut self, term: &str) {
        if self.search_term != term {
            self.search_term = term.to_string();
            self.refresh();
        }
    }

    pub fn sort_state(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    /// Header click on `key`: unsorted -> ascending -> descending -> unsorted.
    /// A different key starts over at ascending. Returns false (and changes
    /// nothing) when no sortable column carries `key`.
    pub fn set_sort_key(&mut self, key: &str) -> bool {
        if !self.columns.iter().any(|c| c.sortable && c.key == key) {
            return false;
        }
        self.sort = match self.sort.take() {
            Some(state) if state.key == key => match state.direction {
                SortDirection::Ascending => Some(SortState {
                    key: state.key,
                    direction: SortDirection::Descending,
                }),
                SortDirection::Descending => None,
            },
            _ => Some(SortState {
                key: key.to_string(),
                direction: SortDirection::Ascending,
            }),
        };
        trace!("Sort state for {:?}: {:?}", self.title, self.sort);
        self.refresh();
        true
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn empty_message(&self) -> &str {
        &self.empty_message
    }

    pub fn visible(&self) -> impl Iterator<Item = &R> {
        self.rows.iter().map(|&idx| &self.records[idx])
    }

    pub fn visible_ids(&self) -> Vec<&str> {
        self.visible().map(|r| r.id()).collect()
    }

    pub fn get(&self, position: usize) -> Option<&R> {
        self.rows.get(position).map(|&idx| &self.records[idx])
    }

    /// Column headers, sortable ones carrying their current sort marker.
    pub fn headers(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| {
                if !c.sortable {
                    return c.header.clone();
                }
                let marker = match &self.sort {
                    Some(s) if s.key == c.key => match s.direction {
                        SortDirection::Ascending => "▲",
                        SortDirection::Descending => "▼",
                    },
                    _ => "⇅",
                };
                format!("{} {}", c.header, marker)
            })
            .collect()
    }

    pub fn render_cell(&self, record: &R, column: &ColumnDescriptor<R>) -> String {
        match column.render {
            Some(render) => render(record),
            None => record
                .value(&column.key)
                .map(|v| v.to_display())
                .unwrap_or_default(),
        }
    }

    /// Rendered cells of every visible record, in view order.
    pub fn render_rows(&self) -> Vec<Vec<String>> {
        self.visible()
            .map(|record| {
                self.columns
                    .iter()
                    .map(|c| self.render_cell(record, c))
                    .collect()
            })
            .collect()
    }

    fn refresh(&mut self) {
        let term = self.search_term.to_lowercase();
        let mut rows: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| matches_search(*r, &self.search_keys, &term))
            .map(|(idx, _)| idx)
            .collect();

        if let Some(sort) = &self.sort {
            sort_rows(&mut rows, &self.records, &sort.key, sort.direction);
        }
        trace!(
            "View {:?}: {} of {} records visible",
            self.title,
            rows.len(),
            self.records.len()
        );
        self.rows = rows;
    }
}

/// True when `term_lower` is empty, no keys are configured, or one of the
/// keys holds a text or number containing it (case-insensitive).
pub fn matches_search<R: Record>(record: &R, keys: &[String], term_lower: &str) -> bool {
    if term_lower.is_empty() || keys.is_empty() {
        return true;
    }
    keys.iter().any(|key| match record.value(key) {
        Some(Value::Text(s)) => s.to_lowercase().contains(term_lower),
        Some(Value::Number(n)) => n.to_string().contains(term_lower),
        _ => false,
    })
}

fn sort_rows<R: Record>(rows: &mut [usize], records: &[R], key: &str, direction: SortDirection) {
    // Present values of differing kinds cannot be ordered, only presence can.
    let mut kinds = rows
        .iter()
        .filter_map(|&idx| records[idx].value(key))
        .map(|v| v.kind());
    let consistent = match kinds.next() {
        Some(first) => kinds.all(|k| k == first),
        None => true,
    };

    if consistent {
        rows.sort_by(|&a, &b| {
            compare_values(records[a].value(key), records[b].value(key), direction)
        });
    } else {
        trace!("Column {key} holds mixed value kinds, ordering by presence only");
        rows.sort_by_key(|&idx| records[idx].value(key).is_none());
    }
}

/// Ordering of two attribute values. Missing values go last in both
/// directions; descending reverses the ascending result of present values.
pub fn compare_values(a: Option<Value<'_>>, b: Option<Value<'_>>, direction: SortDirection) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(a), Some(b)) => (a, b),
    };
    let ascending = match (a, b) {
        (Value::Text(a), Value::Text(b)) => locale_cmp(a, b),
        (Value::Number(a), Value::Number(b)) => a.total_cmp(&b),
        (Value::Bool(a), Value::Bool(b)) => b.cmp(&a),
        _ => Ordering::Equal,
    };
    match direction {
        SortDirection::Ascending => ascending,
        SortDirection::Descending => ascending.reverse(),
    }
}

fn collation_key(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Locale-style string ordering: letters first compared without accents and
/// case, then accents, then lower case before upper case.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| b.cmp(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_display_without_exponent() {
        assert_eq!(Value::Number(3.0).to_display(), "3");
        assert_eq!(Value::Number(3.5).to_display(), "3.5");
        assert_eq!(Value::Number(1e21).to_display(), "1000000000000000000000");
        assert_eq!(Value::Number(-0.0).to_display(), "-0");
    }

    struct Row {
        id: String,
        order: Option<f64>,
        question: Option<String>,
        active: Option<bool>,
    }

    impl Record for Row {
        fn id(&self) -> &str {
            &self.id
        }

        fn value(&self, key: &str) -> Option<Value<'_>> {
            match key {
                "order" => self.order.map(Value::Number),
                "question" => self.question.as_deref().map(Value::Text),
                "active" => self.active.map(Value::Bool),
                _ => None,
            }
        }
    }

    fn row(id: &str, order: Option<f64>, question: Option<&str>, active: Option<bool>) -> Row {
        Row {
            id: id.to_string(),
            order,
            question: question.map(str::to_string),
            active,
        }
    }

    fn columns() -> Vec<ColumnDescriptor<Row>> {
        vec![
            ColumnDescriptor::new("order", "#").sortable(true),
            ColumnDescriptor::new("question", "Question").sortable(true),
            ColumnDescriptor::new("active", "Status")
                .sortable(true)
                .render(|r: &Row| match r.active {
                    Some(true) => "Active".to_string(),
                    _ => "Inactive".to_string(),
                }),
        ]
    }

    fn sample() -> Vec<Row> {
        vec![
            row("1", Some(3.0), Some("Zebra crossing?"), Some(true)),
            row("2", Some(1.0), Some("apple season"), Some(false)),
            row("3", None, Some("Mango tours 2024"), None),
            row("4", Some(2.0), None, Some(true)),
            row("5", Some(10.0), Some("Éclair"), Some(false)),
        ]
    }

    #[test]
    fn empty_term_passes_everything() {
        let view = TabularView::new(sample(), columns()).with_search_keys(["question"]);
        assert_eq!(view.visible_ids(), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn no_search_keys_passes_everything() {
        let mut view = TabularView::new(sample(), columns());
        view.set_search_term("zebra");
        assert_eq!(view.len(), 5);
        assert!(!view.is_searchable());
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let mut view = TabularView::new(sample(), columns()).with_search_keys(["question"]);
        view.set_search_term("ZEB");
        assert_eq!(view.visible_ids(), vec!["1"]);
        view.set_search_term("a");
        // Record 4 has no question, record 5 only "Éclair" which holds an "a"
        assert_eq!(view.visible_ids(), vec!["1", "2", "3", "5"]);
    }

    #[test]
    fn search_matches_numbers_by_decimal_form_but_not_bools() {
        let mut view =
            TabularView::new(sample(), columns()).with_search_keys(["order", "active"]);
        view.set_search_term("10");
        assert_eq!(view.visible_ids(), vec!["5"]);
        view.set_search_term("true");
        assert!(view.is_empty());
    }

    #[test]
    fn search_result_is_a_subset_with_a_matching_key() {
        let mut view = TabularView::new(sample(), columns()).with_search_keys(["question"]);
        for term in ["o", "2", "mango", "xyz", "s"] {
            view.set_search_term(term);
            for record in view.visible() {
                let hit = record
                    .question
                    .as_deref()
                    .is_some_and(|q| q.to_lowercase().contains(term));
                assert!(hit, "{} should not match {term}", record.id);
            }
            assert!(view.len() <= view.records().len());
        }
    }

    #[test]
    fn sort_cycles_through_three_states() {
        let mut view = TabularView::new(sample(), columns());
        let original = view.visible_ids().iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert!(view.set_sort_key("order"));
        assert_eq!(view.visible_ids(), vec!["2", "4", "1", "5", "3"]);
        assert!(view.set_sort_key("order"));
        assert_eq!(view.visible_ids(), vec!["5", "1", "4", "2", "3"]);
        assert!(view.set_sort_key("order"));
        assert_eq!(view.sort_state(), None);
        assert_eq!(view.visible_ids(), original);
    }

    #[test]
    fn switching_columns_restarts_at_ascending() {
        let mut view = TabularView::new(sample(), columns());
        view.set_sort_key("order");
        view.set_sort_key("order");
        view.set_sort_key("question");
        assert_eq!(
            view.sort_state(),
            Some(&SortState {
                key: "question".to_string(),
                direction: SortDirection::Ascending
            })
        );
        assert_eq!(view.visible_ids(), vec!["2", "5", "3", "1", "4"]);
    }

    #[test]
    fn missing_values_stay_last_in_both_directions() {
        let mut view = TabularView::new(sample(), columns());
        view.set_sort_key("question");
        let ascending = view.visible_ids().iter().map(|s| s.to_string()).collect::<Vec<_>>();
        view.set_sort_key("question");
        let descending = view.visible_ids().iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(ascending.last().map(String::as_str), Some("4"));
        assert_eq!(descending.last().map(String::as_str), Some("4"));

        let mut present_asc = ascending[..4].to_vec();
        present_asc.reverse();
        assert_eq!(present_asc, descending[..4].to_vec());
    }

    #[test]
    fn booleans_order_true_first() {
        let mut view = TabularView::new(sample(), columns());
        view.set_sort_key("active");
        assert_eq!(view.visible_ids(), vec!["1", "4", "2", "5", "3"]);
    }

    #[test]
    fn unsortable_or_unknown_keys_are_ignored() {
        let cols = vec![ColumnDescriptor::<Row>::new("question", "Question")];
        let mut view = TabularView::new(sample(), cols);
        assert!(!view.set_sort_key("question"));
        assert!(!view.set_sort_key("nope"));
        assert_eq!(view.sort_state(), None);
    }

    #[test]
    fn mixed_kinds_fall_back_to_presence_order() {
        struct Mixed(&'static str, Option<Value<'static>>);
        impl Record for Mixed {
            fn id(&self) -> &str {
                self.0
            }
            fn value(&self, _key: &str) -> Option<Value<'_>> {
                self.1
            }
        }
        let records = vec![
            Mixed("a", Some(Value::Number(5.0))),
            Mixed("b", None),
            Mixed("c", Some(Value::Text("x"))),
            Mixed("d", Some(Value::Number(1.0))),
        ];
        let mut view = TabularView::new(records, vec![ColumnDescriptor::new("v", "V").sortable(true)]);
        view.set_sort_key("v");
        assert_eq!(view.visible_ids(), vec!["a", "c", "d", "b"]);
        view.set_sort_key("v");
        assert_eq!(view.visible_ids(), vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn rendering_uses_render_then_value_then_empty() {
        let view = TabularView::new(sample(), columns());
        let rows = view.render_rows();
        assert_eq!(rows[0], vec!["3", "Zebra crossing?", "Active"]);
        assert_eq!(rows[2], vec!["", "Mango tours 2024", "Inactive"]);
        assert_eq!(rows[3], vec!["2", "", "Active"]);
    }

    #[test]
    fn headers_carry_sort_markers() {
        let mut view = TabularView::new(sample(), columns());
        view.set_sort_key("order");
        assert_eq!(view.headers(), vec!["# ▲", "Question ⇅", "Status ⇅"]);
    }

    #[test]
    fn empty_collection_and_no_columns_are_harmless() {
        let mut view: TabularView<Row> =
            TabularView::new(Vec::new(), Vec::new()).with_empty_message("Nothing here");
        view.set_search_term("x");
        assert!(view.is_empty());
        assert!(view.render_rows().is_empty());
        assert!(view.headers().is_empty());
        assert_eq!(view.empty_message(), "Nothing here");
    }

    #[test]
    fn filter_and_sort_survive_new_records() {
        let mut view = TabularView::new(sample(), columns()).with_search_keys(["question"]);
        view.set_search_term("o");
        view.set_sort_key("order");
        let mut records = sample();
        records.push(row("6", Some(0.5), Some("Boat ride"), Some(true)));
        view.set_records(records);
        assert_eq!(view.visible_ids(), vec!["6", "2", "1", "3"]);
    }

    #[test]
    fn locale_ordering_ignores_case_and_accents_first() {
        assert_eq!(locale_cmp("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_cmp("Éclair", "eclipse"), Ordering::Less);
        assert_eq!(locale_cmp("a", "A"), Ordering::Less);
        assert_eq!(locale_cmp("e", "é"), Ordering::Less);
        assert_eq!(locale_cmp("same", "same"), Ordering::Equal);
    }
}
