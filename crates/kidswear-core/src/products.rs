use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Storefront display language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    He,
    Ar,
    En,
}

impl FromStr for Locale {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "he" => Ok(Locale::He),
            "ar" => Ok(Locale::Ar),
            "en" => Ok(Locale::En),
            _ => Err(CoreError::UnknownValue {
                kind: "locale",
                value: s.to_string(),
            }),
        }
    }
}

/// Text carried in all three storefront languages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub he: String,
    pub ar: String,
    pub en: String,
}

impl LocalizedText {
    #[must_use]
    pub fn get(&self, locale: Locale) -> &str {
        match locale {
            Locale::He => &self.he,
            Locale::Ar => &self.ar,
            Locale::En => &self.en,
        }
    }

    /// Returns the first locale whose value is blank, if any.
    #[must_use]
    pub fn first_blank(&self) -> Option<Locale> {
        [Locale::He, Locale::Ar, Locale::En]
            .into_iter()
            .find(|l| self.get(*l).trim().is_empty())
    }

    /// Case-insensitive match of `needle` against any of the three values.
    #[must_use]
    pub fn matches_any(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [&self.he, &self.ar, &self.en]
            .into_iter()
            .any(|v| v.to_lowercase() == needle)
    }
}

/// The single, exclusive database-level classification of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasicCategory {
    Boys,
    Girls,
    Baby,
    Unisex,
}

impl BasicCategory {
    pub const ALL: [BasicCategory; 4] = [
        BasicCategory::Boys,
        BasicCategory::Girls,
        BasicCategory::Baby,
        BasicCategory::Unisex,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BasicCategory::Boys => "boys",
            BasicCategory::Girls => "girls",
            BasicCategory::Baby => "baby",
            BasicCategory::Unisex => "unisex",
        }
    }
}

impl std::fmt::Display for BasicCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BasicCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BasicCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::UnknownValue {
                kind: "category",
                value: s.to_string(),
            })
    }
}

/// A color option of a product, with its own gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorVariant {
    pub name: LocalizedText,
    /// `#RRGGBB`.
    pub hex: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ColorVariant {
    /// Matches a requested color against the hex code or any localized name.
    #[must_use]
    pub fn matches(&self, requested: &str) -> bool {
        self.hex.eq_ignore_ascii_case(requested.trim()) || self.name.matches_any(requested.trim())
    }

    /// Key used for facet counts.
    #[must_use]
    pub fn facet_key(&self) -> String {
        self.name.en.trim().to_lowercase()
    }
}

/// Admin-entered discount: either a bare number (`40`) or a percent string (`"40%"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiscountValue {
    Number(f64),
    Text(String),
}

impl DiscountValue {
    /// The discount as a percentage, or `None` if it cannot be interpreted.
    #[must_use]
    pub fn percent(&self) -> Option<Decimal> {
        let value = match self {
            DiscountValue::Number(n) => Decimal::try_from(*n).ok()?,
            DiscountValue::Text(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        };
        (value >= Decimal::ZERO && value <= Decimal::ONE_HUNDRED).then_some(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    pub category: BasicCategory,
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<ColorVariant>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub age_groups: Vec<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_sale: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub discount: Option<DiscountValue>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Checks the catalog invariants a product must satisfy before it is stored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(locale) = self.name.first_blank() {
            return Err(CoreError::Validation(format!(
                "product name is missing for locale {locale:?}"
            )));
        }
        if let Some(locale) = self.description.first_blank() {
            return Err(CoreError::Validation(format!(
                "product description is missing for locale {locale:?}"
            )));
        }
        if self.price.is_sign_negative() {
            return Err(CoreError::Validation(format!(
                "price must be non-negative, got {}",
                self.price
            )));
        }
        if let Some(original) = self.original_price {
            if original <= self.price {
                return Err(CoreError::Validation(format!(
                    "original price {original} must exceed price {}",
                    self.price
                )));
            }
        }
        if self.sizes.iter().all(|s| s.trim().is_empty()) {
            return Err(CoreError::Validation(
                "product must list at least one size".to_string(),
            ));
        }
        if let Some(color) = self.colors.iter().find(|c| !is_hex_color(&c.hex)) {
            return Err(CoreError::Validation(format!(
                "color '{}' has invalid hex '{}'",
                color.name.en, color.hex
            )));
        }
        Ok(())
    }

    /// Whole-percent discount, derived from `original_price` when set,
    /// otherwise from the admin-entered `discount`.
    #[must_use]
    pub fn discount_percent(&self) -> Option<Decimal> {
        if let Some(original) = self.original_price {
            if original > Decimal::ZERO && original > self.price {
                let pct = (original - self.price) * Decimal::ONE_HUNDRED / original;
                return Some(pct.round_dp_with_strategy(0, RoundingStrategy::ToZero));
            }
        }
        self.discount
            .as_ref()
            .and_then(DiscountValue::percent)
            .map(|p| p.round_dp_with_strategy(0, RoundingStrategy::ToZero))
    }

    /// Case-insensitive tag membership.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == tag)
    }

    #[must_use]
    pub fn has_any_tag(&self, tags: &[&str]) -> bool {
        tags.iter().any(|t| self.has_tag(t))
    }

    #[must_use]
    pub fn color(&self, index: i32) -> Option<&ColorVariant> {
        usize::try_from(index).ok().and_then(|i| self.colors.get(i))
    }

    #[must_use]
    pub fn has_size(&self, size: &str) -> bool {
        self.sizes.iter().any(|s| s == size)
    }
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|rest| rest.len() == 6 && rest.chars().all(|c| c.is_ascii_hexdigit()))
}
