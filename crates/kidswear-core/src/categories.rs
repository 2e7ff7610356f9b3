//! Declarative category definitions.
//!
//! Every category slug has exactly one predicate, and it lives here. Page
//! filtering, catalog search and admin validation all resolve categories
//! through [`CategoryRegistry`]; none of them re-derive membership inline.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::products::{BasicCategory, LocalizedText, Product};
use crate::CoreError;

pub const NEW_ARRIVALS_SLUG: &str = "new-drops";
pub const DEALS_SLUG: &str = "smart-deals";
pub const OCCASION_SLUG: &str = "special-moments";
pub const COZY_SLUG: &str = "cozy-corner";
pub const BABY_ESSENTIALS_SLUG: &str = "baby-essentials";
pub const TOP_PICKS_SLUG: &str = "top-picks";

const OCCASION_TAGS: &[&str] = &[
    "holiday", "party", "wedding", "festive", "eid", "occasion", "formal",
];
const COZY_TAGS: &[&str] = &["pajamas", "sleepwear", "cozy", "loungewear", "home"];
const BABY_ESSENTIAL_TAGS: &[&str] = &["essentials", "bodysuit", "newborn", "basics"];

/// Membership rule. Receives the evaluation instant so date windows are
/// deterministic for a given request.
pub type Predicate = Arc<dyn Fn(&Product, DateTime<Utc>) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Smart,
    Basic,
}

/// Tunables the built-in smart categories are parameterised by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryRules {
    pub new_arrival_days: i64,
    pub deals_min_discount_percent: Decimal,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            new_arrival_days: 30,
            deals_min_discount_percent: Decimal::from(30),
        }
    }
}

#[derive(Clone, Serialize)]
pub struct CategoryDefinition {
    pub slug: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub kind: CategoryKind,
    /// Basic categories this definition may be assigned alongside.
    pub compatible_with: Vec<BasicCategory>,
    /// Advisory only: drives admin warnings, never membership.
    pub required_tags: Vec<String>,
    pub sort_order: i32,
    #[serde(skip)]
    basic: Option<BasicCategory>,
    #[serde(skip)]
    predicate: Predicate,
}

impl std::fmt::Debug for CategoryDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryDefinition")
            .field("slug", &self.slug)
            .field("kind", &self.kind)
            .field("compatible_with", &self.compatible_with)
            .field("required_tags", &self.required_tags)
            .field("sort_order", &self.sort_order)
            .finish_non_exhaustive()
    }
}

impl CategoryDefinition {
    /// A basic category: membership is equality on `Product::category`.
    #[must_use]
    pub fn basic(
        slug: &str,
        category: BasicCategory,
        name: LocalizedText,
        description: LocalizedText,
        sort_order: i32,
    ) -> Self {
        Self {
            slug: slug.to_string(),
            name,
            description,
            kind: CategoryKind::Basic,
            compatible_with: vec![category],
            required_tags: Vec::new(),
            sort_order,
            basic: Some(category),
            predicate: Arc::new(move |p: &Product, _: DateTime<Utc>| p.category == category),
        }
    }

    #[must_use]
    pub fn smart(
        slug: &str,
        name: LocalizedText,
        description: LocalizedText,
        compatible_with: Vec<BasicCategory>,
        required_tags: &[&str],
        sort_order: i32,
        predicate: Predicate,
    ) -> Self {
        Self {
            slug: slug.to_string(),
            name,
            description,
            kind: CategoryKind::Smart,
            compatible_with,
            required_tags: required_tags.iter().map(|t| (*t).to_string()).collect(),
            sort_order,
            basic: None,
            predicate,
        }
    }

    /// The basic category this definition stands for, if it is a basic one.
    #[must_use]
    pub fn basic_category(&self) -> Option<BasicCategory> {
        self.basic
    }

    #[must_use]
    pub fn is_smart(&self) -> bool {
        self.kind == CategoryKind::Smart
    }

    #[must_use]
    pub fn matches(&self, product: &Product, now: DateTime<Utc>) -> bool {
        (self.predicate)(product, now)
    }
}

/// Immutable, ordered set of category definitions.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    definitions: Vec<CategoryDefinition>,
}

impl CategoryRegistry {
    /// Builds the storefront's built-in registry.
    #[must_use]
    pub fn new(rules: CategoryRules) -> Self {
        Self::from_definitions(builtin_definitions(rules))
            .unwrap_or_else(|e| unreachable!("built-in categories are consistent: {e}"))
    }

    /// Builds a registry from explicit definitions.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] on duplicate slugs, or when the basic
    /// definitions do not cover every [`BasicCategory`] exactly once.
    pub fn from_definitions(mut definitions: Vec<CategoryDefinition>) -> Result<Self, CoreError> {
        let mut slugs = HashSet::new();
        for def in &definitions {
            if !slugs.insert(def.slug.as_str()) {
                return Err(CoreError::Validation(format!(
                    "duplicate category slug '{}'",
                    def.slug
                )));
            }
        }
        for category in BasicCategory::ALL {
            let count = definitions
                .iter()
                .filter(|d| d.basic == Some(category))
                .count();
            if count != 1 {
                return Err(CoreError::Validation(format!(
                    "expected exactly one basic definition for '{category}', found {count}"
                )));
            }
        }

        // Basic first, then smart; each by declared order.
        definitions.sort_by_key(|d| (d.kind == CategoryKind::Smart, d.sort_order));
        Ok(Self { definitions })
    }

    #[must_use]
    pub fn all(&self) -> &[CategoryDefinition] {
        &self.definitions
    }

    /// Looks up a definition; unknown slugs yield `None`.
    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&CategoryDefinition> {
        self.definitions.iter().find(|d| d.slug == slug)
    }

    pub fn smart(&self) -> impl Iterator<Item = &CategoryDefinition> {
        self.definitions.iter().filter(|d| d.kind == CategoryKind::Smart)
    }

    pub fn basic(&self) -> impl Iterator<Item = &CategoryDefinition> {
        self.definitions.iter().filter(|d| d.kind == CategoryKind::Basic)
    }

    /// The basic definition for a product's category. Always present.
    #[must_use]
    pub fn basic_for(&self, category: BasicCategory) -> &CategoryDefinition {
        self.basic()
            .find(|d| d.basic == Some(category))
            .unwrap_or_else(|| unreachable!("registry covers every basic category"))
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::new(CategoryRules::default())
    }
}

fn lt(he: &str, ar: &str, en: &str) -> LocalizedText {
    LocalizedText {
        he: he.to_string(),
        ar: ar.to_string(),
        en: en.to_string(),
    }
}

fn builtin_definitions(rules: CategoryRules) -> Vec<CategoryDefinition> {
    use BasicCategory::{Baby, Boys, Girls, Unisex};

    let window = Duration::days(rules.new_arrival_days);
    let min_discount = rules.deals_min_discount_percent;

    vec![
        CategoryDefinition::basic(
            "boys-zone",
            Boys,
            lt("בנים", "أولاد", "Boys"),
            lt("בגדי בנים", "ملابس أولاد", "Clothing for boys"),
            1,
        ),
        CategoryDefinition::basic(
            "girls-zone",
            Girls,
            lt("בנות", "بنات", "Girls"),
            lt("בגדי בנות", "ملابس بنات", "Clothing for girls"),
            2,
        ),
        CategoryDefinition::basic(
            "baby-zone",
            Baby,
            lt("תינוקות", "رضع", "Baby"),
            lt("בגדי תינוקות", "ملابس الرضع", "Clothing for babies"),
            3,
        ),
        CategoryDefinition::basic(
            "unisex-zone",
            Unisex,
            lt("יוניסקס", "للجنسين", "Unisex"),
            lt("מתאים לכולם", "مناسب للجميع", "Clothing for everyone"),
            4,
        ),
        CategoryDefinition::smart(
            NEW_ARRIVALS_SLUG,
            lt("חדש באתר", "وصل حديثاً", "New Drops"),
            lt("הפריטים החדשים ביותר", "أحدث القطع", "The latest arrivals"),
            BasicCategory::ALL.to_vec(),
            &[],
            1,
            Arc::new(move |p: &Product, now: DateTime<Utc>| {
                p.is_new || p.created_at.is_some_and(|at| at <= now && now - at <= window)
            }),
        ),
        CategoryDefinition::smart(
            DEALS_SLUG,
            lt("מבצעים חכמים", "عروض ذكية", "Smart Deals"),
            lt("הנחות עמוקות", "خصومات كبيرة", "Deep discounts"),
            BasicCategory::ALL.to_vec(),
            &[],
            2,
            Arc::new(move |p: &Product, _: DateTime<Utc>| {
                p.is_sale && p.discount_percent().is_some_and(|d| d >= min_discount)
            }),
        ),
        CategoryDefinition::smart(
            OCCASION_SLUG,
            lt("רגעים מיוחדים", "لحظات مميزة", "Special Moments"),
            lt("בגדי חג ואירועים", "ملابس المناسبات", "Holiday and occasion wear"),
            BasicCategory::ALL.to_vec(),
            OCCASION_TAGS,
            3,
            Arc::new(|p: &Product, _: DateTime<Utc>| p.has_any_tag(OCCASION_TAGS)),
        ),
        CategoryDefinition::smart(
            COZY_SLUG,
            lt("פינה חמימה", "ركن دافئ", "Cozy Corner"),
            lt("פיג'מות ובגדי בית", "بيجامات وملابس منزلية", "Pajamas and loungewear"),
            BasicCategory::ALL.to_vec(),
            COZY_TAGS,
            4,
            Arc::new(|p: &Product, _: DateTime<Utc>| p.has_any_tag(COZY_TAGS)),
        ),
        CategoryDefinition::smart(
            BABY_ESSENTIALS_SLUG,
            lt("בסיס לתינוק", "أساسيات الرضع", "Baby Essentials"),
            lt("בגדי יסוד לתינוקות", "ملابس أساسية للرضع", "Everyday basics for babies"),
            vec![Baby],
            BABY_ESSENTIAL_TAGS,
            5,
            Arc::new(|p: &Product, _: DateTime<Utc>| {
                p.category == Baby && p.has_any_tag(BABY_ESSENTIAL_TAGS)
            }),
        ),
        CategoryDefinition::smart(
            TOP_PICKS_SLUG,
            lt("הנבחרים שלנו", "اختياراتنا", "Top Picks"),
            lt("פריטים מומלצים", "قطع مختارة", "Featured favourites"),
            vec![Boys, Girls, Baby, Unisex],
            &[],
            6,
            Arc::new(|p: &Product, _: DateTime<Utc>| p.featured),
        ),
    ]
}
