//! Reservation Manager
//!
//! Time-limited holds on stock. A hold commits stock in the ledger when it is
//! created and gives it back exactly once: on release, on expiry, or by
//! turning into a permanent decrement when the owner pays.
//!
//! Whoever flips a reservation out of `Active` (under its map entry) is the
//! only caller allowed to touch the ledger for it, which keeps concurrent
//! sweeps, releases and payments from double counting.
//!
//! Reservations that stopped being active stay queryable for a retention
//! window and are forgotten by the next sweep after it.

use std::{
    collections::{BTreeSet, VecDeque},
    fmt,
    sync::Arc,
};

use async_trait::async_trait;
use dashmap::DashMap;
use jiff::{SignedDuration, Timestamp};
use mockall::automock;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{Span, debug, info, warn};
use vitrine::{
    products::ProductUuid,
    stock::{Size, StockError, StockKey},
};

use crate::{
    clock::Clock,
    domain::{
        reservations::{
            ReservationError,
            records::{Reservation, ReservationOwner, ReservationState, ReservationUuid},
        },
        stock::StockLedger,
    },
};

/// How long a released, expired or finalized reservation is kept.
pub const DEFAULT_RETENTION: SignedDuration = SignedDuration::from_hours(1);

pub struct MemoryReservationManager {
    ledger: Arc<dyn StockLedger>,
    clock: Arc<dyn Clock>,
    reservations: DashMap<ReservationUuid, Reservation>,
    by_key: DashMap<StockKey, SmallVec<[ReservationUuid; 4]>>,
    expiry_index: Mutex<BTreeSet<(Timestamp, ReservationUuid)>>,
    reclaimed: Mutex<Vec<Reservation>>,
    /// Inactive reservations in the order they left `Active`
    retired: Mutex<VecDeque<(Timestamp, ReservationUuid)>>,
}

impl fmt::Debug for MemoryReservationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryReservationManager")
            .field("reservations", &self.reservations.len())
            .finish_non_exhaustive()
    }
}

impl MemoryReservationManager {
    #[must_use]
    pub fn new(ledger: Arc<dyn StockLedger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            clock,
            reservations: DashMap::new(),
            by_key: DashMap::new(),
            expiry_index: Mutex::new(BTreeSet::new()),
            reclaimed: Mutex::new(Vec::new()),
            retired: Mutex::new(VecDeque::new()),
        }
    }

    fn retire(&self, uuid: ReservationUuid) {
        self.retired.lock().push_back((self.clock.now(), uuid));
    }

    /// Drop reservations that have been inactive for longer than the
    /// retention window. Returns how many were dropped.
    fn forget_retired(&self, now: Timestamp) -> usize {
        let Ok(cutoff) = now.checked_sub(DEFAULT_RETENTION) else {
            return 0;
        };

        let mut forgotten = 0;
        let mut retired = self.retired.lock();

        while let Some((retired_at, uuid)) = retired.front().copied() {
            if retired_at > cutoff {
                break;
            }

            retired.pop_front();

            let removed = self
                .reservations
                .remove_if(&uuid, |_, reservation| reservation.state != ReservationState::Active);

            forgotten += usize::from(removed.is_some());
        }

        forgotten
    }

    /// Flip an active reservation to `next`. With `lapsed_by`, only flips if
    /// the TTL has run out by then. Returns the snapshot to the caller that won.
    fn deactivate(
        &self,
        uuid: ReservationUuid,
        next: ReservationState,
        lapsed_by: Option<Timestamp>,
    ) -> Option<Reservation> {
        let mut reservation = self.reservations.get_mut(&uuid)?;

        if reservation.state != ReservationState::Active {
            return None;
        }

        if lapsed_by.is_some_and(|now| now < reservation.expires_at) {
            return None;
        }

        reservation.state = next;

        let snapshot = reservation.clone();

        drop(reservation);
        self.retire(uuid);

        Some(snapshot)
    }

    fn unindex(&self, reservation: &Reservation) {
        self.expiry_index
            .lock()
            .remove(&(reservation.expires_at, reservation.uuid));

        let key = reservation.stock_key();

        if let Some(mut holds) = self.by_key.get_mut(&key) {
            holds.retain(|uuid| *uuid != reservation.uuid);
        }

        self.by_key.remove_if(&key, |_, holds| holds.is_empty());
    }

    async fn give_back(&self, reservation: &Reservation) {
        let result = self
            .ledger
            .release(
                reservation.product,
                reservation.size.clone(),
                reservation.quantity,
            )
            .await;

        if let Err(error) = result {
            warn!(
                reservation_uuid = %reservation.uuid,
                %error,
                "failed to give reserved stock back to the ledger"
            );
        }
    }

    /// Expire holds on `key` that are past their TTL but not yet swept.
    async fn reclaim_lapsed(&self, key: &StockKey, now: Timestamp) -> usize {
        let candidates: SmallVec<[ReservationUuid; 4]> = self
            .by_key
            .get(key)
            .map(|holds| holds.value().clone())
            .unwrap_or_default();

        let mut reclaimed = 0;

        for uuid in candidates {
            let Some(reservation) = self.deactivate(uuid, ReservationState::Expired, Some(now))
            else {
                continue;
            };

            self.unindex(&reservation);
            self.give_back(&reservation).await;

            debug!(
                reservation_uuid = %reservation.uuid,
                owner = %reservation.owner,
                "reclaimed lapsed reservation"
            );

            self.reclaimed.lock().push(reservation);

            reclaimed += 1;
        }

        reclaimed
    }
}

fn ensure_ttl(ttl: SignedDuration) -> Result<(), ReservationError> {
    if ttl <= SignedDuration::ZERO {
        return Err(ReservationError::InvalidTtl);
    }

    Ok(())
}

#[async_trait]
impl ReservationManager for MemoryReservationManager {
    #[tracing::instrument(
        name = "reservations.service.reserve",
        skip_all,
        fields(
            owner = %owner,
            product_uuid = %product,
            size = %size,
            quantity = quantity,
            reservation_uuid = tracing::field::Empty
        ),
        err
    )]
    async fn reserve(
        &self,
        owner: ReservationOwner,
        product: ProductUuid,
        size: Size,
        quantity: u32,
        ttl: SignedDuration,
    ) -> Result<Reservation, ReservationError> {
        ensure_ttl(ttl)?;

        let now = self.clock.now();
        let expires_at = now
            .checked_add(ttl)
            .map_err(|_err| ReservationError::InvalidTtl)?;

        let key = StockKey::new(product, size.clone());

        if let Err(error) = self.ledger.commit(product, size.clone(), quantity).await {
            let starved = matches!(error, StockError::InsufficientStock { .. });

            if !starved || self.reclaim_lapsed(&key, now).await == 0 {
                return Err(error.into());
            }

            self.ledger.commit(product, size.clone(), quantity).await?;
        }

        let reservation = Reservation {
            uuid: ReservationUuid::new(),
            owner,
            product,
            size,
            quantity,
            created_at: now,
            expires_at,
            state: ReservationState::Active,
        };

        self.reservations
            .insert(reservation.uuid, reservation.clone());
        self.expiry_index
            .lock()
            .insert((expires_at, reservation.uuid));
        self.by_key.entry(key).or_default().push(reservation.uuid);

        Span::current().record(
            "reservation_uuid",
            tracing::field::display(reservation.uuid),
        );

        info!(reservation_uuid = %reservation.uuid, %expires_at, "reserved stock");

        Ok(reservation)
    }

    #[tracing::instrument(
        name = "reservations.service.renew",
        skip(self),
        fields(reservation_uuid = %reservation),
        err
    )]
    async fn renew(
        &self,
        reservation: ReservationUuid,
        ttl: SignedDuration,
    ) -> Result<Reservation, ReservationError> {
        ensure_ttl(ttl)?;

        let now = self.clock.now();
        let requested = now
            .checked_add(ttl)
            .map_err(|_err| ReservationError::InvalidTtl)?;

        let (previous, renewed) = {
            let mut entry = self
                .reservations
                .get_mut(&reservation)
                .ok_or(ReservationError::NotFound)?;

            match entry.state {
                ReservationState::Active => {}
                ReservationState::Finalized => return Err(ReservationError::AlreadyFinalized),
                state => return Err(ReservationError::NotActive(state)),
            }

            if entry.expires_at <= now {
                return Err(ReservationError::Lapsed);
            }

            let previous = entry.expires_at;

            entry.expires_at = previous.max(requested);

            (previous, entry.clone())
        };

        if renewed.expires_at != previous {
            let mut index = self.expiry_index.lock();

            index.remove(&(previous, reservation));
            index.insert((renewed.expires_at, reservation));
        }

        info!(expires_at = %renewed.expires_at, "renewed reservation");

        Ok(renewed)
    }

    #[tracing::instrument(
        name = "reservations.service.release",
        skip(self),
        fields(reservation_uuid = %reservation),
        err
    )]
    async fn release(
        &self,
        reservation: ReservationUuid,
    ) -> Result<Option<Reservation>, ReservationError> {
        let Some(released) = self.deactivate(reservation, ReservationState::Released, None) else {
            if self.reservations.contains_key(&reservation) {
                return Ok(None);
            }

            return Err(ReservationError::NotFound);
        };

        self.unindex(&released);
        self.give_back(&released).await;

        info!(owner = %released.owner, "released reservation");

        Ok(Some(released))
    }

    async fn release_all(&self, reservations: Vec<ReservationUuid>) -> Vec<Reservation> {
        let mut released = Vec::with_capacity(reservations.len());

        for reservation in reservations {
            match self.release(reservation).await {
                Ok(Some(reservation)) => released.push(reservation),
                Ok(None) => {}
                Err(ReservationError::NotFound) => {
                    debug!(reservation_uuid = %reservation, "reservation already forgotten");
                }
                Err(error) => {
                    warn!(reservation_uuid = %reservation, %error, "failed to release reservation");
                }
            }
        }

        released
    }

    #[tracing::instrument(
        name = "reservations.service.finalize",
        skip(self),
        fields(reservation_uuid = %reservation),
        err
    )]
    async fn finalize(&self, reservation: ReservationUuid) -> Result<Reservation, ReservationError> {
        let finalized = {
            let mut entry = self
                .reservations
                .get_mut(&reservation)
                .ok_or(ReservationError::NotFound)?;

            match entry.state {
                ReservationState::Active => {}
                ReservationState::Finalized => return Err(ReservationError::AlreadyFinalized),
                state => return Err(ReservationError::NotActive(state)),
            }

            entry.state = ReservationState::Finalized;

            entry.clone()
        };

        let settled = self
            .ledger
            .settle(
                finalized.product,
                finalized.size.clone(),
                finalized.quantity,
            )
            .await;

        if let Err(error) = settled {
            if let Some(mut entry) = self.reservations.get_mut(&reservation) {
                entry.state = ReservationState::Active;
            }

            return Err(error.into());
        }

        self.unindex(&finalized);
        self.retire(finalized.uuid);

        info!(owner = %finalized.owner, "finalized reservation");

        Ok(finalized)
    }

    async fn get(&self, reservation: ReservationUuid) -> Option<Reservation> {
        self.reservations
            .get(&reservation)
            .map(|entry| entry.value().clone())
    }

    #[tracing::instrument(
        name = "reservations.service.sweep_expired",
        skip(self),
        fields(swept = tracing::field::Empty)
    )]
    async fn sweep_expired(&self, limit: usize) -> Vec<Reservation> {
        let now = self.clock.now();

        let due: Vec<(Timestamp, ReservationUuid)> = self
            .expiry_index
            .lock()
            .iter()
            .take_while(|(expires_at, _)| *expires_at <= now)
            .take(limit.max(1))
            .copied()
            .collect();

        let mut swept = std::mem::take(&mut *self.reclaimed.lock());

        for entry in due {
            let (_, uuid) = entry;

            if let Some(reservation) = self.deactivate(uuid, ReservationState::Expired, Some(now)) {
                self.unindex(&reservation);
                self.give_back(&reservation).await;

                swept.push(reservation);
            } else {
                self.expiry_index.lock().remove(&entry);
            }
        }

        Span::current().record("swept", swept.len());

        if !swept.is_empty() {
            info!(count = swept.len(), "expired lapsed reservations");
        }

        let forgotten = self.forget_retired(now);

        if forgotten > 0 {
            debug!(forgotten, "forgot inactive reservations");
        }

        swept
    }
}

#[automock]
#[async_trait]
pub trait ReservationManager: Send + Sync {
    /// Commit stock and record a hold that lapses after `ttl`.
    async fn reserve(
        &self,
        owner: ReservationOwner,
        product: ProductUuid,
        size: Size,
        quantity: u32,
        ttl: SignedDuration,
    ) -> Result<Reservation, ReservationError>;

    /// Push a live hold's expiry to at least `now + ttl`.
    async fn renew(
        &self,
        reservation: ReservationUuid,
        ttl: SignedDuration,
    ) -> Result<Reservation, ReservationError>;

    /// Give a hold back. `Ok(None)` when it was already inactive.
    async fn release(
        &self,
        reservation: ReservationUuid,
    ) -> Result<Option<Reservation>, ReservationError>;

    /// Release several holds, logging failures. Returns the ones released by this call.
    async fn release_all(&self, reservations: Vec<ReservationUuid>) -> Vec<Reservation>;

    /// Turn a hold into a permanent stock decrement.
    async fn finalize(&self, reservation: ReservationUuid) -> Result<Reservation, ReservationError>;

    async fn get(&self, reservation: ReservationUuid) -> Option<Reservation>;

    /// Expire up to `limit` lapsed holds, plus any reclaimed inline by
    /// `reserve` since the last sweep. Each hold is returned by exactly one
    /// sweep. Inactive holds past their retention are forgotten.
    async fn sweep_expired(&self, limit: usize) -> Vec<Reservation>;
}
