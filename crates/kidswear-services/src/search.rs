//! Catalog search and category lookups over the live store.

use std::sync::Arc;

use chrono::Utc;
use kidswear_core::{
    search, BasicCategory, CategoryDefinition, CategoryRegistry, CategoryValidation, Classifier,
    Product, SearchRequest, SearchResult,
};
use uuid::Uuid;

use crate::store::CatalogStore;
use crate::ServiceError;

pub struct CatalogSearch<S> {
    store: Arc<S>,
    registry: Arc<CategoryRegistry>,
}

impl<S> Clone for CatalogSearch<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: CatalogStore> CatalogSearch<S> {
    #[must_use]
    pub fn new(store: Arc<S>, registry: Arc<CategoryRegistry>) -> Self {
        Self { store, registry }
    }

    #[must_use]
    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Runs one search. Products and stock are read once, so the page and its
    /// facets always describe the same snapshot.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for malformed filters;
    /// [`ServiceError::Unavailable`] if the store cannot be reached.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResult, ServiceError> {
        request.filters.validate()?;
        let products = self.store.list_active_products().await?;
        let stock = if request.filters.in_stock_only {
            self.store.available_by_product().await?
        } else {
            kidswear_core::AvailableStock::new()
        };

        let classifier = Classifier::new(&self.registry, Utc::now());
        let result = search(&products, &stock, &classifier, request)?;
        tracing::debug!(
            query = %request.query,
            total = result.total,
            returned = result.products.len(),
            "catalog search"
        );
        Ok(result)
    }

    /// Every category the product currently belongs to: its basic category
    /// plus each smart category whose rule holds right now.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown or inactive product.
    pub async fn categories_for(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<CategoryDefinition>, ServiceError> {
        let product = self.product(product_id).await?;
        let classifier = Classifier::new(&self.registry, Utc::now());
        Ok(classifier
            .categories_for(&product)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Active products in one category, in catalog order. Unknown slugs
    /// yield an empty list.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unavailable`] if the store cannot be reached.
    pub async fn products_in(&self, slug: &str) -> Result<Vec<Product>, ServiceError> {
        let products = self.store.list_active_products().await?;
        let classifier = Classifier::new(&self.registry, Utc::now());
        Ok(classifier
            .filter_by_category(&products, slug)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Admin check of a proposed category assignment.
    #[must_use]
    pub fn validate_assignment(
        &self,
        basic: BasicCategory,
        smart_slugs: &[String],
        tags: &[String],
    ) -> CategoryValidation {
        self.registry.validate_assignment(basic, smart_slugs, tags)
    }

    /// Like [`Self::validate_assignment`], but errors become a failure.
    ///
    /// # Errors
    ///
    /// [`ServiceError::ConfigurationInvalid`] listing every hard error.
    pub fn require_valid_assignment(
        &self,
        basic: BasicCategory,
        smart_slugs: &[String],
        tags: &[String],
    ) -> Result<CategoryValidation, ServiceError> {
        let validation = self.validate_assignment(basic, smart_slugs, tags);
        if validation.valid {
            Ok(validation)
        } else {
            Err(ServiceError::ConfigurationInvalid(validation.errors))
        }
    }

    async fn product(&self, id: Uuid) -> Result<Product, ServiceError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {id}")))
    }
}
