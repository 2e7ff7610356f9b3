//! Catalog filter engine: free-text match, category/attribute filters,
//! sorting, pagination, facet counts and completion suggestions.
//!
//! Everything here is synchronous and runs over one in-memory snapshot of
//! the catalog, so the result list and its facets always agree.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categories::{CategoryDefinition, NEW_ARRIVALS_SLUG};
use crate::classifier::Classifier;
use crate::products::{BasicCategory, Locale, Product};
use crate::CoreError;

pub const DEFAULT_LIMIT: usize = 24;
pub const MAX_LIMIT: usize = 100;
pub const MAX_SUGGESTIONS: usize = 5;

/// Available units per product, summed over all variants.
pub type AvailableStock = HashMap<Uuid, i64>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    PriceAsc,
    PriceDesc,
    Newest,
    Name,
    #[default]
    Featured,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilters {
    /// Category slugs, basic or smart. Unknown slugs are ignored.
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub age_groups: Vec<String>,
    pub brands: Vec<String>,
    pub in_stock_only: bool,
    pub sale_only: bool,
    pub new_only: bool,
    pub sort: SortMode,
}

impl ProductFilters {
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for negative or inverted price bounds.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (label, bound) in [("price_min", self.price_min), ("price_max", self.price_max)] {
            if bound.is_some_and(|b| b.is_sign_negative()) {
                return Err(CoreError::Validation(format!("{label} must be non-negative")));
            }
        }
        if let (Some(min), Some(max)) = (self.price_min, self.price_max) {
            if min > max {
                return Err(CoreError::Validation(format!(
                    "price_min {min} is greater than price_max {max}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub query: String,
    pub filters: ProductFilters,
    pub locale: Locale,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl SearchRequest {
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Per-dimension counts over the query-matched, basic-category-filtered set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facets {
    pub categories: BTreeMap<String, usize>,
    pub sizes: BTreeMap<String, usize>,
    pub colors: BTreeMap<String, usize>,
    pub brands: BTreeMap<String, usize>,
    pub age_groups: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub products: Vec<Product>,
    /// Count after filtering, before pagination.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub facets: Facets,
    pub suggestions: Vec<String>,
}

/// Category slugs of a request, resolved against the registry.
struct CategorySelection<'a> {
    basic: Vec<BasicCategory>,
    smart: Vec<&'a CategoryDefinition>,
}

impl<'a> CategorySelection<'a> {
    fn resolve(classifier: &Classifier<'a>, slugs: &[String]) -> Self {
        let mut basic = Vec::new();
        let mut smart = Vec::new();
        // Stale client category lists may carry retired slugs; skip them.
        for def in slugs.iter().filter_map(|slug| classifier.registry().get(slug)) {
            match def.basic_category() {
                Some(category) => basic.push(category),
                None => smart.push(def),
            }
        }
        Self { basic, smart }
    }
}

/// Runs a catalog search over `products`.
///
/// `stock` is only consulted when `in_stock_only` is set; products missing
/// from it count as sold out.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for malformed filters. No-match
/// conditions are never errors.
pub fn search(
    products: &[Product],
    stock: &AvailableStock,
    classifier: &Classifier<'_>,
    request: &SearchRequest,
) -> Result<SearchResult, CoreError> {
    let filters = &request.filters;
    filters.validate()?;

    let locale = request.locale;
    let query = request.query.trim().to_lowercase();
    let selection = CategorySelection::resolve(classifier, &filters.categories);

    let text_matched: Vec<&Product> = products
        .iter()
        .filter(|p| query.is_empty() || matches_text(p, &query, locale))
        .collect();

    let suggestions = if query.is_empty() {
        Vec::new()
    } else {
        suggest(&text_matched, &query, locale)
    };

    let basic_matched: Vec<&Product> = text_matched
        .into_iter()
        .filter(|p| selection.basic.is_empty() || selection.basic.contains(&p.category))
        .collect();

    let facets = compute_facets(&basic_matched, classifier);

    let mut filtered: Vec<&Product> = basic_matched
        .into_iter()
        .filter(|p| {
            selection.smart.is_empty()
                || selection
                    .smart
                    .iter()
                    .any(|def| def.matches(p, classifier.now()))
        })
        .filter(|p| filters.tags.is_empty() || filters.tags.iter().any(|t| p.has_tag(t)))
        .filter(|p| filters.price_min.is_none_or(|min| p.price >= min))
        .filter(|p| filters.price_max.is_none_or(|max| p.price <= max))
        .filter(|p| filters.sizes.is_empty() || filters.sizes.iter().any(|s| p.has_size(s)))
        .filter(|p| {
            filters.colors.is_empty()
                || p
                    .colors
                    .iter()
                    .any(|c| filters.colors.iter().any(|wanted| c.matches(wanted)))
        })
        .filter(|p| {
            filters.brands.is_empty()
                || p
                    .brand
                    .as_deref()
                    .is_some_and(|b| filters.brands.iter().any(|wanted| same_brand(wanted, b)))
        })
        .filter(|p| {
            filters.age_groups.is_empty()
                || p.age_groups.iter().any(|a| filters.age_groups.contains(a))
        })
        .filter(|p| !filters.sale_only || p.is_sale)
        .filter(|p| {
            !filters.new_only || classifier.belongs_to(p, NEW_ARRIVALS_SLUG)
        })
        .filter(|p| !filters.in_stock_only || stock.get(&p.id).copied().unwrap_or(0) > 0)
        .collect();

    sort_products(&mut filtered, filters.sort, locale);

    let total = filtered.len();
    let limit = request.effective_limit();
    let page = filtered
        .into_iter()
        .skip(request.offset)
        .take(limit)
        .cloned()
        .collect();

    Ok(SearchResult {
        products: page,
        total,
        offset: request.offset,
        limit,
        facets,
        suggestions,
    })
}

fn matches_text(product: &Product, query: &str, locale: Locale) -> bool {
    product.name.get(locale).to_lowercase().contains(query)
        || product.description.get(locale).to_lowercase().contains(query)
        || product
            .sku
            .as_deref()
            .is_some_and(|sku| sku.to_lowercase().contains(query))
}

fn sort_products(products: &mut [&Product], mode: SortMode, locale: Locale) {
    products.sort_by(|a, b| compare(a, b, mode, locale));
}

fn compare(a: &Product, b: &Product, mode: SortMode, locale: Locale) -> Ordering {
    match mode {
        SortMode::PriceAsc => a.price.cmp(&b.price),
        SortMode::PriceDesc => b.price.cmp(&a.price),
        // Missing timestamps sort last; flagged-new items win ties.
        SortMode::Newest => b
            .created_at
            .cmp(&a.created_at)
            .then_with(|| b.is_new.cmp(&a.is_new)),
        SortMode::Name => a
            .name
            .get(locale)
            .to_lowercase()
            .cmp(&b.name.get(locale).to_lowercase()),
        SortMode::Featured => b
            .featured
            .cmp(&a.featured)
            .then_with(|| a.sort_order.cmp(&b.sort_order)),
    }
}

fn compute_facets(products: &[&Product], classifier: &Classifier<'_>) -> Facets {
    let mut facets = Facets::default();
    for product in products {
        for def in classifier.categories_for(product) {
            *facets.categories.entry(def.slug.clone()).or_default() += 1;
        }
        // Count each product once per value even if it repeats a size or color.
        let sizes: BTreeSet<&String> = product.sizes.iter().collect();
        for size in sizes {
            *facets.sizes.entry(size.clone()).or_default() += 1;
        }
        let colors: BTreeSet<String> = product.colors.iter().map(|c| c.facet_key()).collect();
        for color in colors {
            *facets.colors.entry(color).or_default() += 1;
        }
        if let Some(brand) = product.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            // First spelling seen names the bucket.
            let key = facets
                .brands
                .keys()
                .find(|k| same_brand(k, brand))
                .cloned()
                .unwrap_or_else(|| brand.to_string());
            *facets.brands.entry(key).or_default() += 1;
        }
        let ages: BTreeSet<&String> = product.age_groups.iter().collect();
        for age in ages {
            *facets.age_groups.entry(age.clone()).or_default() += 1;
        }
    }
    facets
}

fn same_brand(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Prefix matches on the locale name first, then substring matches, then
/// tags. Distinct, at most [`MAX_SUGGESTIONS`].
fn suggest(products: &[&Product], query: &str, locale: Locale) -> Vec<String> {
    let names: Vec<&str> = products.iter().map(|p| p.name.get(locale)).collect();
    let prefixed = names
        .iter()
        .filter(|n| n.to_lowercase().starts_with(query));
    let containing = names.iter().filter(|n| {
        let lower = n.to_lowercase();
        !lower.starts_with(query) && lower.contains(query)
    });
    let tags = products
        .iter()
        .flat_map(|p| p.tags.iter().map(String::as_str))
        .filter(|t| t.to_lowercase().contains(query));

    let mut out: Vec<String> = Vec::new();
    for candidate in prefixed.copied().chain(containing.copied()).chain(tags) {
        if out.len() == MAX_SUGGESTIONS {
            break;
        }
        if !out.iter().any(|s| s == candidate) {
            out.push(candidate.to_string());
        }
    }
    out
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;
