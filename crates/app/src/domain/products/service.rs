//! Products Service

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use mockall::automock;
use tracing::info;
use vitrine::{
    discounts::Discount,
    products::{Product, ProductUuid},
    stock::{Size, StockLevel},
};

use crate::domain::{
    products::{CatalogError, data::NewProduct, repository::MemoryProductsRepository},
    stock::StockLedger,
};

pub struct MemoryProductsService {
    repository: MemoryProductsRepository,
    ledger: Arc<dyn StockLedger>,
}

impl fmt::Debug for MemoryProductsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryProductsService")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl MemoryProductsService {
    #[must_use]
    pub fn new(ledger: Arc<dyn StockLedger>) -> Self {
        Self {
            repository: MemoryProductsRepository::new(),
            ledger,
        }
    }
}

#[async_trait]
impl ProductsService for MemoryProductsService {
    #[tracing::instrument(
        name = "products.service.create_product",
        skip(self, product),
        fields(product_uuid = %product.uuid, sizes = product.stock.len()),
        err
    )]
    async fn create_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        let created = Product {
            uuid: product.uuid,
            name: product.name,
            category: product.category,
            base_price: product.base_price,
            catalog_discount: product.catalog_discount,
        };

        created.validate()?;

        if !self.repository.insert(created.clone()) {
            return Err(CatalogError::AlreadyExists);
        }

        for stock in product.stock {
            self.ledger
                .set_on_hand(created.uuid, stock.size, stock.on_hand)
                .await?;
        }

        info!(product_uuid = %created.uuid, "created product");

        Ok(created)
    }

    async fn get_product(&self, product: ProductUuid) -> Result<Product, CatalogError> {
        self.repository.get(product).ok_or(CatalogError::NotFound)
    }

    async fn list_products(&self) -> Vec<Product> {
        self.repository.list()
    }

    #[tracing::instrument(
        name = "products.service.update_catalog_discount",
        skip(self),
        fields(product_uuid = %product),
        err
    )]
    async fn update_catalog_discount(
        &self,
        product: ProductUuid,
        discount: Option<Discount>,
    ) -> Result<Product, CatalogError> {
        let updated = self
            .repository
            .update(product, |product| {
                product.catalog_discount = discount;

                product.validate()
            })
            .ok_or(CatalogError::NotFound)??;

        info!("updated catalog discount");

        Ok(updated)
    }

    async fn set_stock(
        &self,
        product: ProductUuid,
        size: Size,
        on_hand: u32,
    ) -> Result<StockLevel, CatalogError> {
        if self.repository.get(product).is_none() {
            return Err(CatalogError::NotFound);
        }

        Ok(self.ledger.set_on_hand(product, size, on_hand).await?)
    }
}

#[automock]
#[async_trait]
pub trait ProductsService: Send + Sync {
    /// Creates a product and records its opening stock per size.
    async fn create_product(&self, product: NewProduct) -> Result<Product, CatalogError>;

    async fn get_product(&self, product: ProductUuid) -> Result<Product, CatalogError>;

    /// Every product, ordered by name.
    async fn list_products(&self) -> Vec<Product>;

    /// Replace (or clear) the product's own catalog discount.
    async fn update_catalog_discount(
        &self,
        product: ProductUuid,
        discount: Option<Discount>,
    ) -> Result<Product, CatalogError>;

    /// Replace the physical count of one size, e.g. after a stock take.
    async fn set_stock(
        &self,
        product: ProductUuid,
        size: Size,
        on_hand: u32,
    ) -> Result<StockLevel, CatalogError>;
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;
    use vitrine::discounts::DiscountError;

    use super::*;
    use crate::{domain::products::data::SizeStock, test::TestContext};

    fn new_product(base_price: u64, catalog_discount: Option<Discount>) -> NewProduct {
        NewProduct {
            uuid: ProductUuid::new(),
            name: "Vestido Midi Floral".to_string(),
            category: Some("vestidos".to_string()),
            base_price,
            catalog_discount,
            stock: vec![
                SizeStock {
                    size: Size::new("p"),
                    on_hand: 2,
                },
                SizeStock {
                    size: Size::new("M"),
                    on_hand: 5,
                },
            ],
        }
    }

    #[tokio::test]
    async fn create_product_records_stock_per_size() -> TestResult {
        let ctx = TestContext::new();

        let product = ctx.products.create_product(new_product(19_990, None)).await?;

        assert_eq!(ctx.ledger.available(product.uuid, Size::new("P")).await, 2);
        assert_eq!(ctx.ledger.available(product.uuid, Size::new("M")).await, 5);
        assert_eq!(ctx.products.get_product(product.uuid).await?, product);

        Ok(())
    }

    #[tokio::test]
    async fn create_product_rejects_duplicate_uuid() -> TestResult {
        let ctx = TestContext::new();
        let product = new_product(19_990, None);

        ctx.products.create_product(product.clone()).await?;

        let result = ctx.products.create_product(product).await;

        assert!(
            matches!(result, Err(CatalogError::AlreadyExists)),
            "expected AlreadyExists, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn create_product_rejects_fixed_discount_above_price() -> TestResult {
        let ctx = TestContext::new();

        let result = ctx
            .products
            .create_product(new_product(5_000, Some(Discount::AmountOff(5_000))))
            .await;

        assert!(
            matches!(
                result,
                Err(CatalogError::InvalidDiscount(DiscountError::AmountNotBelowPrice { .. }))
            ),
            "expected AmountNotBelowPrice, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn update_catalog_discount_validates_before_storing() -> TestResult {
        let ctx = TestContext::new();
        let product = ctx.products.create_product(new_product(10_000, None)).await?;

        let updated = ctx
            .products
            .update_catalog_discount(
                product.uuid,
                Some(Discount::PercentageOff(Decimal::from(15))),
            )
            .await?;

        assert_eq!(updated.current_price()?, 8_500);

        let result = ctx
            .products
            .update_catalog_discount(
                product.uuid,
                Some(Discount::PercentageOff(Decimal::from(95))),
            )
            .await;

        assert!(
            matches!(result, Err(CatalogError::InvalidDiscount(_))),
            "expected InvalidDiscount, got {result:?}"
        );
        assert_eq!(ctx.products.get_product(product.uuid).await?, updated);

        Ok(())
    }

    #[tokio::test]
    async fn missing_products_are_not_found() -> TestResult {
        let ctx = TestContext::new();

        let result = ctx.products.get_product(ProductUuid::new()).await;

        assert!(
            matches!(result, Err(CatalogError::NotFound)),
            "expected NotFound, got {result:?}"
        );

        let result = ctx
            .products
            .set_stock(ProductUuid::new(), Size::new("M"), 3)
            .await;

        assert!(
            matches!(result, Err(CatalogError::NotFound)),
            "expected NotFound, got {result:?}"
        );

        Ok(())
    }
}
