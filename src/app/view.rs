use time::OffsetDateTime;

use crate::app::actions::OperationKind;
use crate::app::state::{AppState, FormState, LoadState, OverlayState};
use crate::catalog::format::{
    category_detail, category_label, format_price, normalize_image, sanitize_display,
};
use crate::catalog::Product;
use crate::pagination::page_links;
use crate::search::{SortDirection, SortField};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub search: SearchBar,
    pub sort: SortIndicators,
    pub page_size: usize,
    pub table: TableView,
    pub info: String,
    pub pagination: Option<PaginationView>,
    pub overlay: Option<OverlayView>,
    pub status: Option<String>,
    pub busy: Vec<OperationKind>,
    pub loaded_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchBar {
    pub query: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortIndicator {
    Unsorted,
    Ascending,
    Descending,
}

impl SortIndicator {
    pub fn glyph(self) -> &'static str {
        match self {
            SortIndicator::Unsorted => "↕",
            SortIndicator::Ascending => "▲",
            SortIndicator::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortIndicators {
    pub price: SortIndicator,
    pub title: SortIndicator,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableView {
    Loading,
    Failed(String),
    Empty,
    Rows(Vec<ProductRow>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    pub id: i64,
    pub image_url: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub category: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: usize,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationView {
    pub previous_enabled: bool,
    pub next_enabled: bool,
    pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub id: i64,
    pub title: String,
    pub price: String,
    pub category: String,
    pub description: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    pub title: &'static str,
    pub fields: Vec<(&'static str, String)>,
    pub focus: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayView {
    Detail(DetailView),
    Edit { id: i64, form: FormView },
    Create(FormView),
    GoToPage { input: String, total_pages: usize },
}

pub fn render(state: &AppState) -> ViewModel {
    let window = state.window();
    let search = SearchBar {
        query: state.search_query().to_string(),
        active: state.is_search_active(),
    };
    let sort = SortIndicators {
        price: indicator(state, SortField::Price),
        title: indicator(state, SortField::Title),
    };

    let (table, loaded_at) = match state.load_state() {
        LoadState::Loading => (TableView::Loading, None),
        LoadState::Failed { message } => (TableView::Failed(message.clone()), None),
        LoadState::Ready { loaded_at } => {
            let rows: Vec<ProductRow> = state
                .page_products()
                .into_iter()
                .enumerate()
                .map(|(idx, product)| product_row(product, idx == state.selected))
                .collect();
            let table = if rows.is_empty() {
                TableView::Empty
            } else {
                TableView::Rows(rows)
            };
            (table, Some(*loaded_at))
        }
    };

    let pagination = (window.total_pages > 1).then(|| PaginationView {
        previous_enabled: window.has_previous(),
        next_enabled: window.has_next(),
        links: page_links(window.total_pages, window.page)
            .into_iter()
            .map(|number| PageLink {
                number,
                active: number == window.page,
            })
            .collect(),
    });

    ViewModel {
        search,
        sort,
        page_size: state.page_size().get(),
        table,
        info: window.summary(),
        pagination,
        overlay: overlay_view(state, window.total_pages),
        status: state.status_message.clone(),
        busy: state.busy().to_vec(),
        loaded_at,
    }
}

fn indicator(state: &AppState, field: SortField) -> SortIndicator {
    match state.sort().direction_for(field) {
        None => SortIndicator::Unsorted,
        Some(SortDirection::Ascending) => SortIndicator::Ascending,
        Some(SortDirection::Descending) => SortIndicator::Descending,
    }
}

fn product_row(product: &Product, selected: bool) -> ProductRow {
    ProductRow {
        id: product.id,
        image_url: normalize_image(&product.images),
        title: sanitize_display(&product.title),
        description: sanitize_display(&product.description),
        price: format_price(product.price),
        category: category_label(product),
        selected,
    }
}

fn form_view(title: &'static str, form: &FormState) -> FormView {
    FormView {
        title,
        fields: form
            .fields
            .iter()
            .map(|field| (field.label, field.value.clone()))
            .collect(),
        focus: form.focus,
    }
}

fn overlay_view(state: &AppState, total_pages: usize) -> Option<OverlayView> {
    match state.overlay()? {
        OverlayState::Detail(detail) => {
            let product = state.product(detail.product_id)?;
            Some(match &detail.edit {
                Some(form) => OverlayView::Edit {
                    id: product.id,
                    form: form_view("Edit Product", form),
                },
                None => OverlayView::Detail(DetailView {
                    id: product.id,
                    title: sanitize_display(&product.title),
                    price: format_price(product.price),
                    category: category_detail(product),
                    description: sanitize_display(&product.description),
                    image_url: normalize_image(&product.images),
                }),
            })
        }
        OverlayState::Create(form) => Some(OverlayView::Create(form_view("New Product", form))),
        OverlayState::GoToPage(input) => Some(OverlayView::GoToPage {
            input: input.clone(),
            total_pages,
        }),
    }
}
