//! App Context

use std::{fmt, sync::Arc};

use crate::{
    clock::Clock,
    domain::{
        checkout::{CheckoutService, CheckoutSettings, Checkouts, Holds, StoreCheckoutService},
        live::{LiveEventsService, MemoryLiveEventsService},
        live_carts::{LiveCartsService, StoreLiveCartsService},
        payments::{PaidEventSink, PaymentGateway, PaymentsService, StorePaymentsService},
        pricing::{PricingService, StorePricingService},
        products::{MemoryProductsService, ProductsService},
        promotions::{MemoryPromotionsService, PromotionsService},
        reservations::{MemoryReservationManager, ReservationManager},
        stock::{MemoryStockLedger, StockLedger},
    },
    sweeper::ExpirySweeper,
};

/// Every service of the store, wired around one ledger and one clock.
#[derive(Clone)]
pub struct AppContext {
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<dyn StockLedger>,
    pub reservations: Arc<dyn ReservationManager>,
    pub products: Arc<dyn ProductsService>,
    pub promotions: Arc<dyn PromotionsService>,
    pub live: Arc<dyn LiveEventsService>,
    pub pricing: Arc<dyn PricingService>,
    pub checkouts: Checkouts,
    pub holds: Holds,
    pub checkout: Arc<dyn CheckoutService>,
    pub live_carts: Arc<dyn LiveCartsService>,
    pub payments: Arc<dyn PaymentsService>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("clock", &self.clock)
            .field("checkouts", &self.checkouts)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build the in-memory store with a fresh ledger.
    #[must_use]
    pub fn in_memory(
        clock: Arc<dyn Clock>,
        settings: CheckoutSettings,
        gateway: Arc<dyn PaymentGateway>,
        sink: Arc<dyn PaidEventSink>,
    ) -> Self {
        Self::with_ledger(
            Arc::new(MemoryStockLedger::new()),
            clock,
            settings,
            gateway,
            sink,
        )
    }

    /// Build the in-memory store around an existing ledger.
    #[must_use]
    pub fn with_ledger(
        ledger: Arc<dyn StockLedger>,
        clock: Arc<dyn Clock>,
        settings: CheckoutSettings,
        gateway: Arc<dyn PaymentGateway>,
        sink: Arc<dyn PaidEventSink>,
    ) -> Self {
        let reservations: Arc<dyn ReservationManager> = Arc::new(MemoryReservationManager::new(
            Arc::clone(&ledger),
            Arc::clone(&clock),
        ));
        let products: Arc<dyn ProductsService> =
            Arc::new(MemoryProductsService::new(Arc::clone(&ledger)));
        let promotions: Arc<dyn PromotionsService> = Arc::new(MemoryPromotionsService::new(
            Arc::clone(&products),
            Arc::clone(&clock),
        ));
        let live: Arc<dyn LiveEventsService> =
            Arc::new(MemoryLiveEventsService::new(Arc::clone(&products)));
        let pricing: Arc<dyn PricingService> = Arc::new(StorePricingService::new(
            Arc::clone(&products),
            Arc::clone(&promotions),
            Arc::clone(&live),
            Arc::clone(&ledger),
            Arc::clone(&clock),
        ));

        let checkouts = Checkouts::new();
        let holds = Holds::new(Arc::clone(&reservations), Arc::clone(&clock));

        let checkout: Arc<dyn CheckoutService> = Arc::new(StoreCheckoutService::new(
            checkouts.clone(),
            holds.clone(),
            Arc::clone(&pricing),
            Arc::clone(&live),
            gateway,
            settings,
        ));
        let live_carts: Arc<dyn LiveCartsService> = Arc::new(StoreLiveCartsService::new(
            Arc::clone(&checkouts.live_carts),
            Arc::clone(&reservations),
            Arc::clone(&clock),
        ));
        let payments: Arc<dyn PaymentsService> = Arc::new(StorePaymentsService::new(
            checkouts.clone(),
            holds.clone(),
            sink,
            Arc::clone(&clock),
        ));

        Self {
            clock,
            ledger,
            reservations,
            products,
            promotions,
            live,
            pricing,
            checkouts,
            holds,
            checkout,
            live_carts,
            payments,
        }
    }

    /// Sweeper over this context's holds, expiring up to `batch` per sweep.
    #[must_use]
    pub fn sweeper(&self, batch: usize) -> ExpirySweeper {
        ExpirySweeper::new(
            Arc::clone(&self.reservations),
            self.checkouts.clone(),
            self.holds.clone(),
            Arc::clone(&self.clock),
            batch,
        )
    }
}
