use indexmap::IndexMap;
use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;

use crate::app::actions::{OperationKind, RemoteEvent};
use crate::catalog::{CatalogError, Product, ProductPatch};
use crate::pagination::{clamp_page, paginate, PageSize, PageWindow};
use crate::search::{derive, SortField, SortSpec};

const MAX_FIELD_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready { loaded_at: OffsetDateTime },
    Failed { message: String },
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub active: bool,
    pub query: String,
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct FormState {
    pub fields: Vec<FormField>,
    pub focus: usize,
}

pub const CREATE_FIELDS: [&str; 5] = ["Title", "Price", "Description", "Category ID", "Image URL"];
pub const EDIT_FIELDS: [&str; 3] = ["Title", "Price", "Description"];

impl FormState {
    fn with_values(labels: &[&'static str], values: Vec<String>) -> Self {
        let fields = labels
            .iter()
            .zip(values.into_iter().chain(std::iter::repeat(String::new())))
            .map(|(label, value)| FormField {
                label: *label,
                value,
            })
            .collect();
        Self { fields, focus: 0 }
    }

    pub fn create() -> Self {
        Self::with_values(&CREATE_FIELDS, Vec::new())
    }

    pub fn edit(product: &Product) -> Self {
        Self::with_values(
            &EDIT_FIELDS,
            vec![
                product.title.clone(),
                product.price.to_string(),
                product.description.clone(),
            ],
        )
    }

    pub fn value(&self, index: usize) -> &str {
        self.fields
            .get(index)
            .map(|field| field.value.as_str())
            .unwrap_or("")
    }

    pub fn push_char(&mut self, ch: char) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            if field.value.chars().count() < MAX_FIELD_LEN {
                field.value.push(ch);
            }
        }
    }

    pub fn pop_char(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            pop_grapheme(&mut field.value);
        }
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn focus_previous(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetailOverlay {
    pub product_id: i64,
    pub edit: Option<FormState>,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    Detail(DetailOverlay),
    Create(FormState),
    GoToPage(String),
}

#[derive(Debug, Clone)]
pub struct AppState {
    products: IndexMap<i64, Product>,
    working: Vec<usize>,
    page: usize,
    page_size: PageSize,
    search: SearchState,
    sort: SortSpec,
    pub selected: usize,
    load: LoadState,
    overlay: Option<OverlayState>,
    busy: Vec<OperationKind>,
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(page_size: PageSize, sort: SortSpec) -> Self {
        Self {
            products: IndexMap::new(),
            working: Vec::new(),
            page: 1,
            page_size,
            search: SearchState::default(),
            sort,
            selected: 0,
            load: LoadState::Loading,
            overlay: None,
            busy: Vec::new(),
            status_message: None,
        }
    }

    pub fn replace_products(&mut self, products: Vec<Product>) {
        self.products = products.into_iter().map(|p| (p.id, p)).collect();
        self.load = LoadState::Ready {
            loaded_at: now(),
        };
        self.rederive();
    }

    pub fn mark_loading(&mut self) {
        if !matches!(self.load, LoadState::Ready { .. }) {
            self.load = LoadState::Loading;
        }
    }

    pub fn mark_load_failed<S: Into<String>>(&mut self, message: S) {
        self.load = LoadState::Failed {
            message: message.into(),
        };
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn product(&self, id: i64) -> Option<&Product> {
        self.products.get(&id)
    }

    pub fn working_products(&self) -> impl Iterator<Item = &Product> + '_ {
        self.working
            .iter()
            .filter_map(|&idx| self.products.get_index(idx).map(|(_, p)| p))
    }

    pub fn working_len(&self) -> usize {
        self.working.len()
    }

    pub fn insert_created(&mut self, product: Product) {
        self.products.shift_insert(0, product.id, product);
        self.rederive();
    }

    pub fn merge_updated(&mut self, id: i64, patch: ProductPatch) -> bool {
        let Some(product) = self.products.get_mut(&id) else {
            return false;
        };
        product.merge(patch);
        self.rederive();
        true
    }

    fn rederive(&mut self) {
        self.working = derive(self.products.values(), &self.search.query, self.sort);
        self.page = clamp_page(self.page, self.window().total_pages);
        self.clamp_selection();
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.working.len(), self.page, self.page_size.get())
    }

    pub fn page_products(&self) -> Vec<&Product> {
        paginate(&self.working, self.page, self.page_size.get())
            .items
            .iter()
            .filter_map(|&idx| self.products.get_index(idx).map(|(_, p)| p))
            .collect()
    }

    pub fn set_page_size(&mut self, size: PageSize) {
        self.page_size = size;
        self.page = 1;
        self.selected = 0;
        self.rederive();
    }

    pub fn cycle_page_size(&mut self) {
        self.set_page_size(self.page_size.cycle());
    }

    pub fn toggle_sort(&mut self, field: SortField) {
        self.sort.toggle(field);
        self.rederive();
    }

    /// Moves to `page` when it lies inside `[1, total_pages]`; otherwise nothing changes.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if !self.window().can_navigate(page) {
            return false;
        }
        if self.page != page {
            self.page = page;
            self.selected = 0;
        }
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.page + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        match self.page.checked_sub(1) {
            Some(page) => self.go_to_page(page),
            None => false,
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.window().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let current = self.selected as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    fn clamp_selection(&mut self) {
        let len = self.window().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    pub fn selected_product(&self) -> Option<&Product> {
        self.page_products().get(self.selected).copied()
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn search_query(&self) -> &str {
        &self.search.query
    }

    pub fn is_search_active(&self) -> bool {
        self.search.active
    }

    pub fn begin_search(&mut self) {
        self.search.active = true;
    }

    pub fn finish_search(&mut self) {
        self.search.active = false;
    }

    pub fn cancel_search(&mut self) {
        self.search.active = false;
        if !self.search.query.is_empty() {
            self.set_query(String::new());
        }
    }

    pub fn push_search_char(&mut self, ch: char) {
        let mut query = self.search.query.clone();
        query.push(ch);
        self.set_query(query);
    }

    pub fn pop_search_char(&mut self) {
        if self.search.query.is_empty() {
            return;
        }
        let mut query = self.search.query.clone();
        pop_grapheme(&mut query);
        self.set_query(query);
    }

    pub fn set_query<S: Into<String>>(&mut self, query: S) {
        self.search.query = query.into();
        self.page = 1;
        self.selected = 0;
        self.rederive();
    }

    pub fn set_busy(&mut self, busy: Vec<OperationKind>) {
        self.busy = busy;
    }

    pub fn busy(&self) -> &[OperationKind] {
        &self.busy
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn open_detail(&mut self) -> bool {
        let Some(product_id) = self.selected_product().map(|p| p.id) else {
            return false;
        };
        self.overlay = Some(OverlayState::Detail(DetailOverlay {
            product_id,
            edit: None,
        }));
        true
    }

    pub fn detail_overlay(&self) -> Option<&DetailOverlay> {
        match self.overlay.as_ref() {
            Some(OverlayState::Detail(detail)) => Some(detail),
            _ => None,
        }
    }

    pub fn begin_edit(&mut self) -> bool {
        let Some(product_id) = self.detail_overlay().map(|d| d.product_id) else {
            return false;
        };
        let Some(form) = self.product(product_id).map(FormState::edit) else {
            return false;
        };
        if let Some(OverlayState::Detail(detail)) = self.overlay.as_mut() {
            detail.edit = Some(form);
        }
        true
    }

    pub fn cancel_edit(&mut self) {
        if let Some(OverlayState::Detail(detail)) = self.overlay.as_mut() {
            detail.edit = None;
        }
    }

    pub fn open_create(&mut self) {
        self.overlay = Some(OverlayState::Create(FormState::create()));
    }

    pub fn open_go_to_page(&mut self) {
        self.overlay = Some(OverlayState::GoToPage(String::new()));
    }

    pub fn active_form_mut(&mut self) -> Option<&mut FormState> {
        match self.overlay.as_mut() {
            Some(OverlayState::Create(form)) => Some(form),
            Some(OverlayState::Detail(DetailOverlay {
                edit: Some(form), ..
            })) => Some(form),
            _ => None,
        }
    }

    pub fn go_to_page_input_mut(&mut self) -> Option<&mut String> {
        match self.overlay.as_mut() {
            Some(OverlayState::GoToPage(input)) => Some(input),
            _ => None,
        }
    }

    pub fn apply_remote(&mut self, event: RemoteEvent) {
        match event {
            RemoteEvent::Loaded(Ok(products)) => {
                let count = products.len();
                self.replace_products(products);
                if self
                    .detail_overlay()
                    .is_some_and(|d| !self.products.contains_key(&d.product_id))
                {
                    self.close_overlay();
                }
                self.set_status_message(Some(format!("Loaded {count} products")));
            }
            RemoteEvent::Loaded(Err(err)) => {
                tracing::error!(?err, "failed to load products");
                if matches!(self.load, LoadState::Ready { .. }) {
                    self.set_status_message(Some(format!("Reload failed: {}", err.user_message())));
                } else {
                    self.mark_load_failed(format!("Failed to load products: {}", err.user_message()));
                }
            }
            RemoteEvent::Created(Ok(product)) => {
                let id = product.id;
                self.insert_created(product);
                if matches!(self.overlay, Some(OverlayState::Create(_))) {
                    self.close_overlay();
                }
                self.set_status_message(Some(format!("Product #{id} created")));
            }
            RemoteEvent::Created(Err(err)) => {
                tracing::error!(?err, "failed to create product");
                self.set_status_message(Some(format!("Create failed: {}", err.user_message())));
            }
            RemoteEvent::Updated { id, result: Ok(patch) } => {
                if self.merge_updated(id, patch) {
                    if self.detail_overlay().is_some_and(|d| d.product_id == id) {
                        self.close_overlay();
                    }
                    self.set_status_message(Some(format!("Product #{id} updated")));
                } else {
                    self.set_status_message(Some(format!(
                        "Product #{id} updated remotely but is no longer loaded"
                    )));
                }
            }
            RemoteEvent::Updated { id, result: Err(err) } => {
                tracing::error!(?err, id, "failed to update product");
                self.set_status_message(Some(update_failure_message(&err)));
            }
        }
    }
}

fn update_failure_message(err: &CatalogError) -> String {
    if err.is_internal_server_error() {
        format!(
            "Update failed: {} (this record has bad upstream data; try editing a product you created)",
            err.user_message()
        )
    } else {
        format!("Update failed: {}", err.user_message())
    }
}

fn pop_grapheme(text: &mut String) {
    if let Some((idx, _)) = text.grapheme_indices(true).next_back() {
        text.truncate(idx);
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::actions::testing::product;
    use crate::search::SortDirection;
    use assert_matches::assert_matches;

    fn loaded(products: Vec<Product>) -> AppState {
        let mut state = AppState::new(PageSize::Five, SortSpec::default());
        state.replace_products(products);
        state
    }

    fn many(count: i64) -> Vec<Product> {
        (1..=count)
            .map(|id| product(id, &format!("Item {id}"), id as f64))
            .collect()
    }

    fn working_ids(state: &AppState) -> Vec<i64> {
        state.working_products().map(|p| p.id).collect()
    }

    #[test]
    fn search_filters_and_resets_page() {
        let mut state = loaded(vec![product(1, "Cap", 10.0), product(2, "Shirt", 5.0)]);
        state.set_page_size(PageSize::Five);
        state.push_search_char('s');
        state.push_search_char('H');
        assert_eq!(working_ids(&state), vec![2]);
        assert_eq!(state.page(), 1);
        state.pop_search_char();
        state.pop_search_char();
        assert_eq!(working_ids(&state), vec![1, 2]);
    }

    #[test]
    fn query_change_returns_to_first_page() {
        let mut state = loaded(many(12));
        assert!(state.go_to_page(3));
        state.set_query("item");
        assert_eq!(state.page(), 1);
    }

    #[test]
    fn unchanged_query_keeps_page() {
        let mut state = loaded(many(12));
        assert!(state.go_to_page(3));
        state.begin_search();
        state.pop_search_char();
        assert_eq!(state.page(), 3);
        state.cancel_search();
        assert_eq!(state.page(), 3);
        assert!(!state.is_search_active());

        state.begin_search();
        state.push_search_char('i');
        assert_eq!(state.page(), 1);
        state.cancel_search();
        assert_eq!(state.search_query(), "");
        assert_eq!(working_ids(&state).len(), 12);
    }

    #[test]
    fn page_size_change_returns_to_first_page() {
        let mut state = loaded(many(12));
        assert!(state.go_to_page(2));
        state.cycle_page_size();
        assert_eq!(state.page_size(), PageSize::Ten);
        assert_eq!(state.page(), 1);
    }

    #[test]
    fn out_of_range_navigation_is_ignored() {
        let mut state = loaded(many(12));
        assert_eq!(state.window().total_pages, 3);
        assert!(!state.go_to_page(0));
        assert_eq!(state.page(), 1);
        assert!(!state.go_to_page(4));
        assert_eq!(state.page(), 1);
        assert!(!state.previous_page());
        assert!(state.go_to_page(3));
        assert!(!state.next_page());
        assert_eq!(state.page(), 3);
        assert_eq!(
            state.page_products().iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![11, 12]
        );
    }

    #[test]
    fn sort_toggle_reorders_working_set() {
        let mut state = loaded(vec![product(1, "Cap", 10.0), product(2, "Shirt", 5.0)]);
        state.toggle_sort(SortField::Price);
        assert_eq!(working_ids(&state), vec![2, 1]);
        state.toggle_sort(SortField::Price);
        assert_eq!(state.sort().direction, SortDirection::Descending);
        assert_eq!(working_ids(&state), vec![1, 2]);
    }

    #[test]
    fn created_product_is_prepended() {
        let mut state = loaded(vec![product(1, "Cap", 10.0)]);
        state.open_create();
        state.apply_remote(RemoteEvent::Created(Ok(product(9, "Hat", 3.0))));
        assert_eq!(working_ids(&state), vec![9, 1]);
        assert!(state.overlay().is_none());
        assert_eq!(state.status_message.as_deref(), Some("Product #9 created"));
    }

    #[test]
    fn create_failure_keeps_form_open() {
        let mut state = loaded(vec![product(1, "Cap", 10.0)]);
        state.open_create();
        state.apply_remote(RemoteEvent::Created(Err(CatalogError::Status {
            status: 400,
            message: "price must be a positive number".into(),
        })));
        assert_matches!(state.overlay(), Some(OverlayState::Create(_)));
        assert_eq!(state.len(), 1);
        assert!(state
            .status_message
            .as_deref()
            .is_some_and(|m| m.contains("price must be")));
    }

    #[test]
    fn update_merges_and_rederives() {
        let mut state = loaded(vec![product(1, "Cap", 10.0), product(2, "Shirt", 5.0)]);
        state.set_query("cap");
        assert!(state.open_detail());
        assert!(state.begin_edit());
        let patch = ProductPatch {
            title: Some("Beanie".into()),
            price: Some(11.0),
            ..ProductPatch::default()
        };
        state.apply_remote(RemoteEvent::Updated {
            id: 1,
            result: Ok(patch),
        });
        let updated = state.product(1).expect("product");
        assert_eq!(updated.title, "Beanie");
        assert_eq!(updated.description, "Cap description");
        assert!(working_ids(&state).is_empty());
        assert_eq!(state.page(), 1);
        assert!(state.overlay().is_none());
    }

    #[test]
    fn update_failure_leaves_record_untouched() {
        let mut state = loaded(vec![product(1, "Cap", 10.0)]);
        state.apply_remote(RemoteEvent::Updated {
            id: 1,
            result: Err(CatalogError::Status {
                status: 500,
                message: "Internal server error".into(),
            }),
        });
        assert_eq!(state.product(1).map(|p| p.title.as_str()), Some("Cap"));
        let message = state.status_message.clone().unwrap_or_default();
        assert!(message.starts_with("Update failed: Internal server error"));
        assert!(message.contains("bad upstream data"));
    }

    #[test]
    fn initial_load_failure_is_terminal_state() {
        let mut state = AppState::new(PageSize::Ten, SortSpec::default());
        state.apply_remote(RemoteEvent::Loaded(Err(CatalogError::Status {
            status: 503,
            message: "Service Unavailable".into(),
        })));
        assert_matches!(state.load_state(), LoadState::Failed { message } if message.contains("Service Unavailable"));
    }

    #[test]
    fn reload_failure_keeps_previous_collection() {
        let mut state = loaded(vec![product(1, "Cap", 10.0)]);
        state.apply_remote(RemoteEvent::Loaded(Err(CatalogError::Status {
            status: 503,
            message: "Service Unavailable".into(),
        })));
        assert_matches!(state.load_state(), LoadState::Ready { .. });
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn page_is_clamped_when_working_set_shrinks() {
        let mut state = loaded(many(6));
        state.set_query("item");
        assert!(state.go_to_page(2));
        assert_eq!(state.page_products().len(), 1);
        state.apply_remote(RemoteEvent::Updated {
            id: 6,
            result: Ok(ProductPatch {
                title: Some("Renamed".into()),
                ..ProductPatch::default()
            }),
        });
        assert_eq!(state.working_len(), 5);
        assert_eq!(state.window().total_pages, 1);
        assert_eq!(state.page(), 1);
    }

    #[test]
    fn selection_stays_inside_page() {
        let mut state = loaded(many(7));
        state.move_selection(10);
        assert_eq!(state.selected, 4);
        assert!(state.next_page());
        assert_eq!(state.selected, 0);
        state.move_selection(-3);
        assert_eq!(state.selected, 0);
        assert_eq!(state.selected_product().map(|p| p.id), Some(6));
    }

    #[test]
    fn form_editing_and_focus() {
        let mut form = FormState::create();
        form.push_char('H');
        form.push_char('i');
        form.focus_next();
        form.push_char('9');
        form.focus_previous();
        form.pop_char();
        assert_eq!(form.value(0), "H");
        assert_eq!(form.value(1), "9");
        form.focus_previous();
        assert_eq!(form.focus, CREATE_FIELDS.len() - 1);
    }

    #[test]
    fn edit_form_prefills_from_record() {
        let form = FormState::edit(&product(3, "Lamp", 12.5));
        assert_eq!(form.value(0), "Lamp");
        assert_eq!(form.value(1), "12.5");
        assert_eq!(form.value(2), "Lamp description");
        assert_eq!(form.fields.len(), EDIT_FIELDS.len());
    }
}
