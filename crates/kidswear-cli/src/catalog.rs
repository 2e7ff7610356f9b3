//! Category listing and catalog search commands.

use clap::{Args, ValueEnum};
use kidswear_core::{
    AppConfig, CategoryKind, CategoryRegistry, Locale, ProductFilters, SearchRequest, SortMode,
};
use kidswear_services::{CatalogStore, Services};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SortArg {
    PriceAsc,
    PriceDesc,
    Newest,
    Name,
    Featured,
}

impl From<SortArg> for SortMode {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::PriceAsc => SortMode::PriceAsc,
            SortArg::PriceDesc => SortMode::PriceDesc,
            SortArg::Newest => SortMode::Newest,
            SortArg::Name => SortMode::Name,
            SortArg::Featured => SortMode::Featured,
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct SearchArgs {
    /// Free text matched against names, descriptions and tags
    #[arg(default_value = "")]
    pub query: String,
    /// Category slug, basic or smart (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<String>,
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[arg(long = "size")]
    pub sizes: Vec<String>,
    /// Color hex code (`#1E40AF`) or name in any locale
    #[arg(long = "color")]
    pub colors: Vec<String>,
    #[arg(long = "brand")]
    pub brands: Vec<String>,
    #[arg(long = "age-group")]
    pub age_groups: Vec<String>,
    #[arg(long)]
    pub price_min: Option<Decimal>,
    #[arg(long)]
    pub price_max: Option<Decimal>,
    #[arg(long)]
    pub in_stock: bool,
    #[arg(long)]
    pub sale: bool,
    #[arg(long = "new")]
    pub new_only: bool,
    #[arg(long, value_enum, default_value = "featured")]
    pub sort: SortArg,
    /// he, ar or en
    #[arg(long, default_value = "he")]
    pub locale: Locale,
    #[arg(long, default_value = "20")]
    pub limit: usize,
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

impl SearchArgs {
    pub(crate) fn into_request(self) -> SearchRequest {
        SearchRequest {
            query: self.query,
            filters: ProductFilters {
                categories: self.categories,
                tags: self.tags,
                price_min: self.price_min,
                price_max: self.price_max,
                sizes: self.sizes,
                colors: self.colors,
                age_groups: self.age_groups,
                brands: self.brands,
                in_stock_only: self.in_stock,
                sale_only: self.sale,
                new_only: self.new_only,
                sort: self.sort.into(),
            },
            locale: self.locale,
            offset: self.offset,
            limit: Some(self.limit),
        }
    }
}

pub(crate) fn run_categories(config: &AppConfig, kind: Option<CategoryKind>) {
    let registry = CategoryRegistry::new(config.category_rules());
    for category in registry
        .all()
        .iter()
        .filter(|c| kind.is_none_or(|k| c.kind == k))
    {
        let kind = match category.kind {
            CategoryKind::Smart => "smart",
            CategoryKind::Basic => "basic",
        };
        println!(
            "{:<18} {:<6} {}",
            category.slug,
            kind,
            category.name.get(Locale::En)
        );
    }
}

pub(crate) async fn run_search<S: CatalogStore>(
    services: &Services<S>,
    args: SearchArgs,
) -> anyhow::Result<()> {
    let request = args.into_request();
    let locale = request.locale;
    let result = services.catalog.search(&request).await?;

    println!(
        "{} match(es), showing {}-{}",
        result.total,
        result.offset + usize::from(!result.products.is_empty()),
        result.offset + result.products.len()
    );
    for product in &result.products {
        println!(
            "{:<16} {:>8} {}",
            product.sku.as_deref().unwrap_or("-"),
            product.price,
            product.name.get(locale)
        );
    }

    if !result.facets.categories.is_empty() {
        let counts: Vec<String> = result
            .facets
            .categories
            .iter()
            .map(|(slug, n)| format!("{slug}={n}"))
            .collect();
        println!("categories: {}", counts.join(", "));
    }
    if !result.suggestions.is_empty() {
        println!("did you mean: {}", result.suggestions.join(" | "));
    }
    Ok(())
}
