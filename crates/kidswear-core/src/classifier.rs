use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::categories::{CategoryDefinition, CategoryRegistry};
use crate::products::{BasicCategory, Product};

/// Evaluates category membership against one registry at one instant.
///
/// Build one per request: every product in that request is then judged
/// against the same clock, so date-window categories cannot flip mid-listing.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    registry: &'a CategoryRegistry,
    now: DateTime<Utc>,
}

impl<'a> Classifier<'a> {
    #[must_use]
    pub fn new(registry: &'a CategoryRegistry, now: DateTime<Utc>) -> Self {
        Self { registry, now }
    }

    #[must_use]
    pub fn registry(&self) -> &'a CategoryRegistry {
        self.registry
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// `false` for unknown slugs.
    #[must_use]
    pub fn belongs_to(&self, product: &Product, slug: &str) -> bool {
        self.registry
            .get(slug)
            .is_some_and(|def| def.matches(product, self.now))
    }

    /// The product's basic category followed by every smart category it
    /// currently qualifies for, in registry order.
    #[must_use]
    pub fn categories_for(&self, product: &Product) -> Vec<&'a CategoryDefinition> {
        let mut found = vec![self.registry.basic_for(product.category)];
        found.extend(
            self.registry
                .smart()
                .filter(|def| def.matches(product, self.now)),
        );
        found
    }

    /// Order-preserving subset of `products` in the category. Unknown slugs
    /// yield an empty subset.
    #[must_use]
    pub fn filter_by_category<'p>(&self, products: &'p [Product], slug: &str) -> Vec<&'p Product> {
        let Some(def) = self.registry.get(slug) else {
            return Vec::new();
        };
        products
            .iter()
            .filter(|p| def.matches(p, self.now))
            .collect()
    }
}

/// Outcome of checking a proposed category assignment in the admin UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CategoryRegistry {
    /// Checks smart-category assignments against a basic category and tag
    /// list.
    ///
    /// Incompatible or unknown smart categories are errors. A smart category
    /// whose required tags are all absent is only a warning: the product may
    /// still be saved, and its runtime membership is decided by the predicate.
    #[must_use]
    pub fn validate_assignment(
        &self,
        basic: BasicCategory,
        smart_slugs: &[String],
        tags: &[String],
    ) -> CategoryValidation {
        let mut result = CategoryValidation::default();
        let lowered: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();

        for slug in smart_slugs {
            let Some(def) = self.get(slug) else {
                result.errors.push(format!("unknown category '{slug}'"));
                continue;
            };
            if !def.is_smart() {
                result
                    .errors
                    .push(format!("'{slug}' is a basic category, not a smart one"));
                continue;
            }
            if !def.compatible_with.contains(&basic) {
                result.errors.push(format!(
                    "smart category '{slug}' cannot be combined with basic category '{basic}'"
                ));
            }
            if !def.required_tags.is_empty()
                && !def
                    .required_tags
                    .iter()
                    .any(|req| lowered.contains(&req.to_lowercase()))
            {
                result.warnings.push(format!(
                    "smart category '{slug}' expects one of the tags [{}]",
                    def.required_tags.join(", ")
                ));
            }
        }

        result.valid = result.errors.is_empty();
        result
    }
}
