//! Holds behind a checkout's lines.
//!
//! Everything here works on a checkout the caller has already locked, so
//! the lines can't change underneath.

use std::{fmt, sync::Arc};

use jiff::{SignedDuration, Timestamp};
use tracing::{info, warn};
use vitrine::{
    lifecycle::{Transition, TransitionError},
    products::ProductUuid,
    stock::{Size, StockError},
};

use crate::{
    clock::Clock,
    domain::{
        checkout::{CheckoutError, Reservable, data::OutOfStockLine},
        reservations::{
            ReservationError, ReservationManager,
            records::{Reservation, ReservationOwner},
        },
    },
};

/// One hold to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldRequest {
    pub owner: ReservationOwner,
    pub product: ProductUuid,
    pub size: Size,
    pub quantity: u32,
}

/// The request at `index` failed; every earlier hold was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldFailure {
    pub index: usize,
    pub error: ReservationError,
}

impl From<HoldFailure> for CheckoutError {
    fn from(failure: HoldFailure) -> Self {
        match failure.error {
            ReservationError::Stock(StockError::InsufficientStock {
                product,
                size,
                requested,
                available,
            }) => Self::InsufficientStock {
                line: failure.index,
                product,
                size,
                requested,
                available,
            },
            ReservationError::Stock(StockError::InvalidQuantity) => Self::InvalidQuantity {
                line: failure.index,
            },
            error => Self::Reservation(error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Revalidation {
    /// Lapsed holds taken again
    pub reacquired: usize,
    pub out_of_stock: Vec<OutOfStockLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settlement {
    pub settled: usize,
    /// Line index and why it could not be settled
    pub failed: Vec<(usize, ReservationError)>,
}

#[derive(Clone)]
pub struct Holds {
    reservations: Arc<dyn ReservationManager>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Holds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holds")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Holds {
    #[must_use]
    pub fn new(reservations: Arc<dyn ReservationManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            reservations,
            clock,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Take every hold or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`HoldFailure`] naming the first request that failed.
    pub async fn reserve_all(
        &self,
        requests: Vec<HoldRequest>,
        ttl: SignedDuration,
    ) -> Result<Vec<Reservation>, HoldFailure> {
        let mut taken: Vec<Reservation> = Vec::with_capacity(requests.len());

        for (index, request) in requests.into_iter().enumerate() {
            let result = self
                .reservations
                .reserve(
                    request.owner,
                    request.product,
                    request.size,
                    request.quantity,
                    ttl,
                )
                .await;

            match result {
                Ok(reservation) => taken.push(reservation),
                Err(error) => {
                    self.rollback(&taken).await;

                    return Err(HoldFailure { index, error });
                }
            }
        }

        Ok(taken)
    }

    /// Make sure every revivable line is backed by a live hold. A hold past
    /// its TTL is released and taken again once; when that fails the line
    /// is marked out of stock.
    pub async fn revalidate<T: Reservable>(&self, checkout: &mut T) -> Revalidation {
        let now = self.clock.now();
        let ttl = checkout.reservation_ttl();
        let mut revalidation = Revalidation::default();

        for hold in checkout.revivable() {
            let current = self.reservations.get(hold.reservation).await;

            if current.as_ref().is_some_and(|reservation| reservation.is_live(now)) {
                continue;
            }

            if current.is_some() {
                // Lapsed but not swept yet: give it back before taking again.
                if let Err(error) = self.reservations.release(hold.reservation).await {
                    warn!(reservation_uuid = %hold.reservation, %error, "failed to release lapsed hold");
                }
            }

            let result = match checkout.reservation_owner(hold.index) {
                Some(owner) => {
                    self.reservations
                        .reserve(owner, hold.product, hold.size.clone(), hold.quantity, ttl)
                        .await
                }
                None => Err(ReservationError::NotFound),
            };

            match result {
                Ok(reservation) => {
                    checkout.set_reservation(hold.index, reservation.uuid, reservation.expires_at);
                    revalidation.reacquired += 1;
                }
                Err(error) => {
                    let available = match error {
                        ReservationError::Stock(StockError::InsufficientStock {
                            available, ..
                        }) => available,
                        _ => 0,
                    };

                    info!(
                        reference = %checkout.reference(),
                        line = hold.index,
                        %error,
                        "lapsed hold could not be taken again"
                    );

                    checkout.mark_out_of_stock(hold.index);
                    revalidation.out_of_stock.push(OutOfStockLine {
                        line: hold.index,
                        product: hold.product,
                        size: hold.size,
                        requested: hold.quantity,
                        available,
                    });
                }
            }
        }

        revalidation
    }

    /// Give back holds taken for a checkout that never got stored.
    pub async fn rollback(&self, reservations: &[Reservation]) {
        let uuids = reservations.iter().map(|reservation| reservation.uuid).collect();

        self.reservations.release_all(uuids).await;
    }

    /// Release every line's hold. Returns the holds this call gave back.
    pub async fn release<T: Reservable>(&self, checkout: &T) -> Vec<Reservation> {
        let holds = checkout.holds().into_iter().map(|hold| hold.reservation).collect();

        self.reservations.release_all(holds).await
    }

    /// Move the checkout to a terminal stage and give its stock back.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the checkout can't take `transition`;
    /// nothing is released then.
    pub async fn close<T: Reservable>(
        &self,
        checkout: &mut T,
        transition: Transition,
    ) -> Result<Vec<Reservation>, TransitionError> {
        // Collected first: terminal transitions move items out of their holding states.
        let holds: Vec<_> = checkout.holds().into_iter().map(|hold| hold.reservation).collect();

        checkout.transition(transition, self.clock.now())?;

        Ok(self.reservations.release_all(holds).await)
    }

    /// Push every hold's expiry out by the checkout's TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::ReservationExpired`] when a hold already lapsed.
    pub async fn renew<T: Reservable>(&self, checkout: &mut T) -> Result<Vec<Reservation>, CheckoutError> {
        let ttl = checkout.reservation_ttl();
        let mut renewed = Vec::new();

        for hold in checkout.holds() {
            let reservation = self
                .reservations
                .renew(hold.reservation, ttl)
                .await
                .map_err(|error| match error {
                    ReservationError::Lapsed | ReservationError::NotActive(_) => {
                        CheckoutError::ReservationExpired
                    }
                    other => CheckoutError::Reservation(other),
                })?;

            checkout.set_reservation(hold.index, reservation.uuid, reservation.expires_at);
            renewed.push(reservation);
        }

        Ok(renewed)
    }

    /// Turn every hold into a permanent decrement. A hold the sweeper got to
    /// first is taken again and settled right away.
    pub async fn settle<T: Reservable>(&self, checkout: &mut T) -> Settlement {
        let ttl = checkout.reservation_ttl();
        let mut settlement = Settlement::default();

        for hold in checkout.holds() {
            let result = match self.reservations.finalize(hold.reservation).await {
                Err(ReservationError::NotActive(_) | ReservationError::NotFound) => {
                    let retaken = match checkout.reservation_owner(hold.index) {
                        Some(owner) => {
                            self.reservations
                                .reserve(owner, hold.product, hold.size.clone(), hold.quantity, ttl)
                                .await
                        }
                        None => Err(ReservationError::NotFound),
                    };

                    match retaken {
                        Ok(reservation) => {
                            checkout.set_reservation(
                                hold.index,
                                reservation.uuid,
                                reservation.expires_at,
                            );

                            self.reservations.finalize(reservation.uuid).await
                        }
                        Err(error) => Err(error),
                    }
                }
                other => other,
            };

            match result {
                Ok(_) => settlement.settled += 1,
                Err(error) => {
                    warn!(
                        reference = %checkout.reference(),
                        line = hold.index,
                        %error,
                        "failed to settle hold"
                    );

                    settlement.failed.push((hold.index, error));
                }
            }
        }

        settlement
    }
}
