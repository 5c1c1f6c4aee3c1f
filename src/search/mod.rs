use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::catalog::Product;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SortField {
    Price,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Active sort; `field == None` keeps collection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSpec {
    pub field: Option<SortField>,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn by(field: SortField, direction: SortDirection) -> Self {
        Self {
            field: Some(field),
            direction,
        }
    }

    /// Re-selecting the active field flips direction; a new field starts ascending.
    pub fn toggle(&mut self, field: SortField) {
        if self.field == Some(field) {
            self.direction = self.direction.flipped();
        } else {
            self.field = Some(field);
            self.direction = SortDirection::Ascending;
        }
    }

    pub fn direction_for(&self, field: SortField) -> Option<SortDirection> {
        (self.field == Some(field)).then_some(self.direction)
    }
}

enum SortKey {
    Price(f64),
    Title(String),
}

impl SortKey {
    fn of(field: SortField, product: &Product) -> Self {
        match field {
            SortField::Price => SortKey::Price(product.price),
            SortField::Title => SortKey::Title(product.title.to_lowercase()),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Price(a), SortKey::Price(b)) => a.total_cmp(b),
            (SortKey::Title(a), SortKey::Title(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Case-insensitive title containment; `needle` must already be lower-cased.
pub fn matches_title(product: &Product, needle: &str) -> bool {
    needle.is_empty() || product.title.to_lowercase().contains(needle)
}

/// Derives the working set: positions (in iteration order) of the products
/// whose title contains `query`, optionally sorted. The sort is stable, so
/// equal keys keep their filtered order.
pub fn derive<'a, I>(products: I, query: &str, sort: SortSpec) -> Vec<usize>
where
    I: IntoIterator<Item = &'a Product>,
{
    let needle = query.to_lowercase();
    let matching = products
        .into_iter()
        .enumerate()
        .filter(|(_, product)| matches_title(product, &needle));

    let Some(field) = sort.field else {
        return matching.map(|(idx, _)| idx).collect();
    };

    let mut keyed: Vec<(usize, SortKey)> = matching
        .map(|(idx, product)| (idx, SortKey::of(field, product)))
        .collect();
    keyed.sort_by(|(_, a), (_, b)| sort.direction.apply(a.compare(b)));
    keyed.into_iter().map(|(idx, _)| idx).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, title: &str, price: f64) -> Product {
        Product {
            id,
            title: title.to_string(),
            price,
            description: String::new(),
            category: None,
            images: Vec::new(),
        }
    }

    fn ids(products: &[Product], positions: &[usize]) -> Vec<i64> {
        positions.iter().map(|&idx| products[idx].id).collect()
    }

    fn sample() -> Vec<Product> {
        vec![product(1, "Cap", 10.0), product(2, "Shirt", 5.0)]
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let products = sample();
        let working = derive(&products, "sh", SortSpec::default());
        assert_eq!(ids(&products, &working), vec![2]);
        let working = derive(&products, "SH", SortSpec::default());
        assert_eq!(ids(&products, &working), vec![2]);
    }

    #[test]
    fn empty_query_keeps_everything_in_order() {
        let products = vec![
            product(3, "b", 1.0),
            product(1, "a", 1.0),
            product(2, "c", 1.0),
        ];
        let working = derive(&products, "", SortSpec::default());
        assert_eq!(ids(&products, &working), vec![3, 1, 2]);
    }

    #[test]
    fn unsorted_filter_preserves_original_order() {
        let products = vec![
            product(1, "Red Shirt", 1.0),
            product(2, "Cap", 1.0),
            product(3, "Blue shirt", 1.0),
            product(4, "T-SHIRT", 1.0),
        ];
        let working = derive(&products, "shirt", SortSpec::default());
        assert_eq!(ids(&products, &working), vec![1, 3, 4]);
    }

    #[test]
    fn price_sort_and_toggle() {
        let products = sample();
        let mut sort = SortSpec::default();
        sort.toggle(SortField::Price);
        assert_eq!(sort.direction, SortDirection::Ascending);
        assert_eq!(ids(&products, &derive(&products, "", sort)), vec![2, 1]);
        sort.toggle(SortField::Price);
        assert_eq!(sort.direction, SortDirection::Descending);
        assert_eq!(ids(&products, &derive(&products, "", sort)), vec![1, 2]);
    }

    #[test]
    fn switching_field_resets_to_ascending() {
        let mut sort = SortSpec::by(SortField::Price, SortDirection::Descending);
        sort.toggle(SortField::Title);
        assert_eq!(sort, SortSpec::by(SortField::Title, SortDirection::Ascending));
        assert_eq!(sort.direction_for(SortField::Price), None);
    }

    #[test]
    fn title_sort_ignores_case() {
        let products = vec![
            product(1, "banana", 1.0),
            product(2, "Apple", 1.0),
            product(3, "cherry", 1.0),
        ];
        let sort = SortSpec::by(SortField::Title, SortDirection::Ascending);
        assert_eq!(ids(&products, &derive(&products, "", sort)), vec![2, 1, 3]);
    }

    #[test]
    fn ties_keep_filtered_order_in_both_directions() {
        let products = vec![
            product(1, "a", 5.0),
            product(2, "b", 3.0),
            product(3, "c", 5.0),
            product(4, "d", 3.0),
        ];
        let asc = SortSpec::by(SortField::Price, SortDirection::Ascending);
        assert_eq!(ids(&products, &derive(&products, "", asc)), vec![2, 4, 1, 3]);
        let desc = SortSpec::by(SortField::Price, SortDirection::Descending);
        assert_eq!(ids(&products, &derive(&products, "", desc)), vec![1, 3, 2, 4]);
    }

    #[test]
    fn reversing_direction_reverses_distinct_keys() {
        let products = vec![
            product(1, "delta", 4.0),
            product(2, "alpha", 9.0),
            product(3, "charlie", 1.0),
            product(4, "bravo", 7.0),
        ];
        for field in [SortField::Price, SortField::Title] {
            let asc = derive(&products, "", SortSpec::by(field, SortDirection::Ascending));
            let mut desc = derive(&products, "", SortSpec::by(field, SortDirection::Descending));
            desc.reverse();
            assert_eq!(asc, desc, "field {field}");
        }
    }

    #[test]
    fn nan_prices_sort_after_numbers() {
        let products = vec![
            product(1, "a", f64::NAN),
            product(2, "b", 1.0),
            product(3, "c", 0.5),
        ];
        let sort = SortSpec::by(SortField::Price, SortDirection::Ascending);
        assert_eq!(ids(&products, &derive(&products, "", sort)), vec![3, 2, 1]);
        let sort = SortSpec::by(SortField::Price, SortDirection::Descending);
        assert_eq!(ids(&products, &derive(&products, "", sort)), vec![1, 2, 3]);
    }
}
