//! Product catalog service.

use std::collections::HashSet;

use chrono::Utc;
use copperbay_core::ProductId;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use super::{Page, named_not_found};
use crate::error::{AppError, Result};
use crate::models::{Product, ReturnPolicy, ShippingProfile, Variant, Warranty};
use crate::store::{Collection, DEFAULT_PAGE_SIZE, Filter, ListQuery, ResourceStore, Sort};

/// Catalog reads and writes. Products are soft-deleted only; carts and
/// checkouts keep referencing deactivated products read-only.
pub struct ProductService<'a> {
    products: Collection<'a, Product>,
}

/// Client-settable fields for a new product. Variants arrive fully formed,
/// including their ids (catalog feeds assign them upstream).
#[derive(Debug, Deserialize)]
pub struct ProductDraft {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub shipping: Option<ShippingProfile>,
    #[serde(default)]
    pub warranty: Option<Warranty>,
    #[serde(default)]
    pub return_policy: Option<ReturnPolicy>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Partial update; absent fields keep their stored values. The sku is the
/// catalog key and cannot change.
#[derive(Debug, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub categories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub variants: Option<Vec<Variant>>,
    pub shipping: Option<ShippingProfile>,
    pub warranty: Option<Warranty>,
    pub return_policy: Option<ReturnPolicy>,
    pub is_active: Option<bool>,
}

/// Query parameters for the product list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl<'a> ProductService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn ResourceStore) -> Self {
        Self {
            products: Collection::new(store),
        }
    }

    /// Create a product after validating the draft.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` with one message per violated field,
    /// or `AppError::Conflict` when the sku is already taken.
    #[instrument(skip(self, draft), fields(sku = %draft.sku))]
    pub async fn create(&self, draft: ProductDraft) -> Result<Product> {
        let mut errors = Vec::new();
        if draft.sku.trim().is_empty() {
            errors.push("sku is required".to_owned());
        }
        if draft.name.trim().is_empty() {
            errors.push("name is required".to_owned());
        }
        if draft.variants.is_empty() {
            errors.push("at least one variant is required".to_owned());
        }
        errors.extend(validate_variants(&draft.variants));
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        if self
            .products
            .find_one(Filter::equals("sku", draft.sku.clone()))
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Product with sku '{}' already exists",
                draft.sku
            )));
        }

        let now = Utc::now();
        let product = Product {
            id: ProductId::generate(),
            sku: draft.sku,
            name: draft.name,
            brand: draft.brand,
            description: draft.description,
            categories: draft.categories,
            tags: draft.tags,
            images: draft.images,
            variants: draft.variants,
            shipping: draft.shipping,
            warranty: draft.warranty,
            return_policy: draft.return_policy,
            is_active: draft.is_active,
            created_at: now,
            updated_at: now,
        };
        self.products.insert(&product).await?;
        Ok(product)
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    pub async fn get(&self, id: &str) -> Result<Product> {
        self.products
            .require(id)
            .await
            .map_err(|e| named_not_found(e, "Product not found"))
    }

    /// List products, newest first, optionally narrowed by category or brand.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` on backend failure.
    pub async fn list(&self, params: &ProductListParams) -> Result<Page<Product>> {
        let mut query = ListQuery::new().sort(Sort::desc("created_at")).page(
            params.page.unwrap_or(1),
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(category) = &params.category {
            query = query.filter(Filter::contains("categories", category.clone()));
        }
        if let Some(brand) = &params.brand {
            query = query.filter(Filter::equals("brand", brand.clone()));
        }

        let (items, total) = self.products.page(&query).await?;
        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    /// Apply a partial update to the mutable fields.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve, or
    /// `AppError::Validation` when a supplied field is invalid.
    #[instrument(skip(self, update), fields(product_id = %id))]
    pub async fn update(&self, id: &str, update: ProductUpdate) -> Result<Product> {
        let mut product = self.get(id).await?;

        if let Some(variants) = &update.variants {
            let mut errors = Vec::new();
            if variants.is_empty() {
                errors.push("at least one variant is required".to_owned());
            }
            errors.extend(validate_variants(variants));
            if !errors.is_empty() {
                return Err(AppError::Validation(errors));
            }
        }
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("name cannot be empty"));
            }
            product.name = name;
        }
        if let Some(brand) = update.brand {
            product.brand = Some(brand);
        }
        if let Some(description) = update.description {
            product.description = Some(description);
        }
        if let Some(categories) = update.categories {
            product.categories = categories;
        }
        if let Some(tags) = update.tags {
            product.tags = tags;
        }
        if let Some(images) = update.images {
            product.images = images;
        }
        if let Some(variants) = update.variants {
            product.variants = variants;
        }
        if let Some(shipping) = update.shipping {
            product.shipping = Some(shipping);
        }
        if let Some(warranty) = update.warranty {
            product.warranty = Some(warranty);
        }
        if let Some(return_policy) = update.return_policy {
            product.return_policy = Some(return_policy);
        }
        if let Some(is_active) = update.is_active {
            product.is_active = is_active;
        }
        product.updated_at = Utc::now();

        self.products.save(&product).await?;
        Ok(product)
    }

    /// Deactivate a product without removing it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn deactivate(&self, id: &str) -> Result<()> {
        self.products
            .soft_delete(id)
            .await
            .map_err(|e| named_not_found(e, "Product not found"))
    }

    /// The variants of one product.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    pub async fn variants(&self, id: &str) -> Result<Vec<Variant>> {
        Ok(self.get(id).await?.variants)
    }
}

fn validate_variants(variants: &[Variant]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for variant in variants {
        let id = variant.variant_id.as_str();
        if id.trim().is_empty() {
            errors.push("variant_id is required".to_owned());
        } else if !seen.insert(id) {
            errors.push(format!("duplicate variant_id '{id}'"));
        }
        if variant.price.amount < Decimal::ZERO {
            errors.push(format!("variant '{id}' price must be non-negative"));
        }
        if let Some(msrp) = variant.price.msrp
            && msrp < Decimal::ZERO
        {
            errors.push(format!("variant '{id}' msrp must be non-negative"));
        }
    }
    errors
}
