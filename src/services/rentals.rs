//! Rental engine: rent and return as single atomic custody transitions.
//!
//! Every operation runs in one store transaction. The umbrella row is locked
//! first, then its open rental record, and all checks happen under those
//! locks. Any error before `commit` drops the transaction, which rolls it back.

use std::sync::Arc;

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        rental::{NewRental, RentReceipt, RentalCommand, RentalRecord, ReturnReceipt},
        umbrella::{UmbrellaStatus, UmbrellaSummary},
    },
    repository::store::FleetStore,
};

#[derive(Clone)]
pub struct RentalService {
    store: Arc<dyn FleetStore>,
}

impl RentalService {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self { store }
    }

    /// Hand a docked umbrella to `user_id`
    pub async fn rent(&self, user_id: &str, command: &RentalCommand) -> AppResult<RentReceipt> {
        let mut tx = self.store.begin().await?;

        let umbrella = tx
            .lock_umbrella(&command.umbrella_id)
            .await?
            .ok_or_else(|| umbrella_not_found(&command.umbrella_id))?;

        if !tx.station_exists(command.station_id).await? {
            return Err(station_not_found(command.station_id));
        }

        if umbrella.status != UmbrellaStatus::Available {
            return Err(AppError::NotAvailable(
                "This umbrella is no longer available".to_string(),
            ));
        }
        if !umbrella.is_docked_at(command.station_id) {
            return Err(AppError::NotAvailable(format!(
                "This umbrella is not docked at station {}",
                command.station_id
            )));
        }

        tx.mark_rented(&command.umbrella_id, user_id).await?;

        let rent_time = Utc::now();
        let rent_id = tx
            .open_rental(&NewRental {
                user_id: user_id.to_string(),
                station_id: command.station_id,
                umbrella_id: command.umbrella_id.clone(),
                rent_time,
            })
            .await?;

        tx.commit().await?;

        tracing::info!(
            user_id,
            station_id = command.station_id,
            umbrella_id = %command.umbrella_id,
            rent_id,
            "Umbrella rented"
        );

        Ok(RentReceipt { rent_id, rent_time })
    }

    /// Dock an umbrella at `command.station_id`, closing its open rental.
    ///
    /// When the ledger has no open record but the umbrella is still marked
    /// rented, custody is restored anyway and the anomaly is logged.
    pub async fn return_umbrella(
        &self,
        user_id: &str,
        command: &RentalCommand,
    ) -> AppResult<ReturnReceipt> {
        let mut tx = self.store.begin().await?;

        let umbrella = tx
            .lock_umbrella(&command.umbrella_id)
            .await?
            .ok_or_else(|| umbrella_not_found(&command.umbrella_id))?;

        if !tx.station_exists(command.station_id).await? {
            return Err(station_not_found(command.station_id));
        }

        let now = Utc::now();
        let receipt = match tx.lock_open_rental(&command.umbrella_id).await? {
            Some(open) => {
                // Never close a record before it was opened, even with clock skew.
                let return_time = now.max(open.rent_time);
                tx.close_rental(open.rent_id, command.station_id, return_time)
                    .await?;

                ReturnReceipt {
                    rent_id: Some(open.rent_id),
                    return_time,
                    reconciled: false,
                }
            }
            None if umbrella.status == UmbrellaStatus::Available => {
                return Err(AppError::AlreadyReturned(
                    "This umbrella has already been returned".to_string(),
                ));
            }
            None => {
                tracing::warn!(
                    target: "umbrella_server::reconcile",
                    user_id,
                    station_id = command.station_id,
                    umbrella_id = %command.umbrella_id,
                    last_user_id = ?umbrella.last_user_id,
                    "Umbrella is rented but has no open rental record, restoring custody"
                );

                ReturnReceipt {
                    rent_id: None,
                    return_time: now,
                    reconciled: true,
                }
            }
        };

        tx.mark_available(&command.umbrella_id, command.station_id)
            .await?;
        tx.commit().await?;

        tracing::info!(
            user_id,
            station_id = command.station_id,
            umbrella_id = %command.umbrella_id,
            rent_id = ?receipt.rent_id,
            "Umbrella returned"
        );

        Ok(receipt)
    }

    /// Umbrella the user holds right now, read from committed state
    pub async fn current_rental(&self, user_id: &str) -> AppResult<Option<String>> {
        self.store.current_rental(user_id).await
    }

    pub async fn history(&self, user_id: &str) -> AppResult<Vec<RentalRecord>> {
        self.store.rental_history(user_id).await
    }

    /// Umbrellas docked at a station
    pub async fn available_at(&self, station_id: i32) -> AppResult<Vec<UmbrellaSummary>> {
        if !self.store.station_exists(station_id).await? {
            return Err(station_not_found(station_id));
        }
        self.store.available_umbrellas(station_id).await
    }
}

fn umbrella_not_found(umbrella_id: &str) -> AppError {
    AppError::NotFound(format!("Umbrella {} not found", umbrella_id))
}

fn station_not_found(station_id: i32) -> AppError {
    AppError::NotFound(format!("Station {} not found", station_id))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        models::umbrella::Umbrella,
        repository::memory::{FleetSnapshot, MemoryFleetStore},
    };

    const ALICE: &str = "alice@example.com";
    const BOB: &str = "bob@example.com";

    fn fleet() -> MemoryFleetStore {
        MemoryFleetStore::builder()
            .station(1)
            .station(2)
            .umbrella(Umbrella::docked("U1", 1))
            .umbrella(Umbrella::docked("U2", 1))
            .umbrella(Umbrella::docked("U3", 2))
            .lock_timeout(Duration::from_millis(100))
            .build()
    }

    fn service(store: &MemoryFleetStore) -> RentalService {
        RentalService::new(Arc::new(store.clone()))
    }

    fn command(station_id: i32, umbrella_id: &str) -> RentalCommand {
        RentalCommand {
            station_id,
            umbrella_id: umbrella_id.to_string(),
        }
    }

    fn assert_consistent(snapshot: &FleetSnapshot) {
        assert!(
            snapshot.violations().is_empty(),
            "violations: {:?}",
            snapshot.violations()
        );
    }

    #[tokio::test]
    async fn rent_then_return_restores_custody() {
        let store = fleet();
        let rentals = service(&store);

        let receipt = rentals.rent(ALICE, &command(1, "U1")).await.unwrap();

        let snapshot = store.snapshot().unwrap();
        let umbrella = &snapshot.umbrellas["U1"];
        assert_eq!(umbrella.status, UmbrellaStatus::Rented);
        assert_eq!(umbrella.station_id, None);
        assert_eq!(umbrella.last_user_id.as_deref(), Some(ALICE));
        assert_eq!(snapshot.open_rentals_for("U1").len(), 1);
        assert_consistent(&snapshot);

        let returned = rentals
            .return_umbrella(ALICE, &command(2, "U1"))
            .await
            .unwrap();
        assert_eq!(returned.rent_id, Some(receipt.rent_id));
        assert!(!returned.reconciled);

        let snapshot = store.snapshot().unwrap();
        let umbrella = &snapshot.umbrellas["U1"];
        assert_eq!(umbrella.status, UmbrellaStatus::Available);
        assert_eq!(umbrella.station_id, Some(2));

        let record = snapshot
            .rentals
            .iter()
            .find(|r| r.rent_id == receipt.rent_id)
            .unwrap();
        assert_eq!(record.station_id, 2);
        assert!(record.return_time.unwrap() >= record.rent_time);
        assert_consistent(&snapshot);
    }

    #[tokio::test]
    async fn concurrent_rents_of_one_umbrella_have_one_winner() {
        let store = fleet();
        let rentals = service(&store);

        let first = {
            let rentals = rentals.clone();
            tokio::spawn(async move { rentals.rent(ALICE, &command(1, "U1")).await })
        };
        let second = {
            let rentals = rentals.clone();
            tokio::spawn(async move { rentals.rent(BOB, &command(1, "U1")).await })
        };

        let results = vec![first.await.unwrap(), second.await.unwrap()];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let losers = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::NotAvailable(_))))
            .count();
        assert_eq!((winners, losers), (1, 1));

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.umbrellas["U1"].status, UmbrellaStatus::Rented);
        assert_eq!(snapshot.rentals.len(), 1);
        assert_consistent(&snapshot);
    }

    #[tokio::test]
    async fn many_concurrent_renters_keep_custody_consistent() {
        let store = fleet();
        let rentals = service(&store);

        let mut handles = Vec::new();
        for i in 0..16 {
            let rentals = rentals.clone();
            let user = format!("user{}@example.com", i);
            let umbrella = if i % 2 == 0 { "U1" } else { "U2" };
            handles.push(tokio::spawn(async move {
                rentals.rent(&user, &command(1, umbrella)).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(AppError::NotAvailable(_)) => {}
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }

        assert_eq!(succeeded, 2);
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.rentals.len(), 2);
        assert_consistent(&snapshot);
    }

    #[tokio::test]
    async fn unknown_umbrella_changes_nothing() {
        let store = fleet();
        let rentals = service(&store);
        let before = store.snapshot().unwrap();

        let err = rentals.rent(ALICE, &command(1, "NOPE")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let after = store.snapshot().unwrap();
        assert_eq!(before.umbrellas, after.umbrellas);
        assert_eq!(before.rentals, after.rentals);
    }

    #[tokio::test]
    async fn unknown_station_is_not_found() {
        let store = fleet();
        let rentals = service(&store);

        let err = rentals.rent(ALICE, &command(9, "U1")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        rentals.rent(ALICE, &command(1, "U1")).await.unwrap();
        let err = rentals
            .return_umbrella(ALICE, &command(9, "U1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(
            store.snapshot().unwrap().umbrellas["U1"].status,
            UmbrellaStatus::Rented
        );
    }

    #[tokio::test]
    async fn renting_from_the_wrong_station_is_refused() {
        let store = fleet();
        let rentals = service(&store);

        let err = rentals.rent(ALICE, &command(2, "U1")).await.unwrap_err();
        assert!(matches!(err, AppError::NotAvailable(_)));
        assert!(store.snapshot().unwrap().rentals.is_empty());
    }

    #[tokio::test]
    async fn renting_twice_is_refused() {
        let store = fleet();
        let rentals = service(&store);

        rentals.rent(ALICE, &command(1, "U1")).await.unwrap();
        let err = rentals.rent(ALICE, &command(1, "U1")).await.unwrap_err();
        assert!(matches!(err, AppError::NotAvailable(_)));
        assert_eq!(store.snapshot().unwrap().rentals.len(), 1);
    }

    #[tokio::test]
    async fn second_return_reports_already_returned() {
        let store = fleet();
        let rentals = service(&store);

        rentals.rent(ALICE, &command(1, "U1")).await.unwrap();
        rentals
            .return_umbrella(ALICE, &command(1, "U1"))
            .await
            .unwrap();
        let after_first = store.snapshot().unwrap();

        let err = rentals
            .return_umbrella(ALICE, &command(2, "U1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyReturned(_)));

        let after_second = store.snapshot().unwrap();
        assert_eq!(after_first.umbrellas, after_second.umbrellas);
        assert_eq!(after_first.rentals, after_second.rentals);
    }

    #[tokio::test]
    async fn concurrent_returns_have_one_winner() {
        let store = fleet();
        let rentals = service(&store);
        rentals.rent(ALICE, &command(1, "U1")).await.unwrap();

        let first = {
            let rentals = rentals.clone();
            tokio::spawn(async move { rentals.return_umbrella(ALICE, &command(1, "U1")).await })
        };
        let second = {
            let rentals = rentals.clone();
            tokio::spawn(async move { rentals.return_umbrella(ALICE, &command(2, "U1")).await })
        };

        let results = vec![first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(AppError::AlreadyReturned(_))))
                .count(),
            1
        );
        assert_consistent(&store.snapshot().unwrap());
    }

    #[tokio::test]
    async fn rented_umbrella_without_ledger_entry_is_reconciled() {
        let store = MemoryFleetStore::builder()
            .station(1)
            .umbrella(Umbrella::rented("U1", ALICE))
            .build();
        let rentals = service(&store);

        let receipt = rentals
            .return_umbrella(BOB, &command(1, "U1"))
            .await
            .unwrap();
        assert!(receipt.reconciled);
        assert_eq!(receipt.rent_id, None);

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.umbrellas["U1"].status, UmbrellaStatus::Available);
        assert_eq!(snapshot.umbrellas["U1"].station_id, Some(1));
        assert!(snapshot.rentals.is_empty());
        assert_consistent(&snapshot);
    }

    #[tokio::test]
    async fn return_closes_the_most_recent_open_record() {
        let rent_time = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let store = MemoryFleetStore::builder()
            .station(1)
            .station(2)
            .umbrella(Umbrella::rented("U1", ALICE))
            .rental(RentalRecord {
                rent_id: 1,
                user_id: ALICE.to_string(),
                station_id: 1,
                umbrella_id: "U1".to_string(),
                rent_time,
                return_time: None,
            })
            .build();
        let rentals = service(&store);

        let receipt = rentals
            .return_umbrella(ALICE, &command(2, "U1"))
            .await
            .unwrap();
        assert_eq!(receipt.rent_id, Some(1));
        assert!(receipt.return_time >= rent_time);
        assert_consistent(&store.snapshot().unwrap());
    }

    #[tokio::test]
    async fn stale_open_record_blocks_rent_as_storage_failure() {
        let store = MemoryFleetStore::builder()
            .station(1)
            .umbrella(Umbrella::docked("U1", 1))
            .rental(RentalRecord {
                rent_id: 1,
                user_id: BOB.to_string(),
                station_id: 1,
                umbrella_id: "U1".to_string(),
                rent_time: Utc::now(),
                return_time: None,
            })
            .build();
        let rentals = service(&store);
        let before = store.snapshot().unwrap();

        let err = rentals.rent(ALICE, &command(1, "U1")).await.unwrap_err();
        assert!(matches!(err, AppError::Constraint(_)));
        assert_eq!(err.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);

        let after = store.snapshot().unwrap();
        assert_eq!(before.umbrellas, after.umbrellas);
        assert_eq!(before.rentals, after.rentals);
    }

    #[tokio::test]
    async fn held_lock_surfaces_as_lock_timeout() {
        let store = fleet();
        let rentals = service(&store);

        let mut blocker = store.begin().await.unwrap();
        blocker.lock_umbrella("U1").await.unwrap();

        let err = rentals.rent(ALICE, &command(1, "U1")).await.unwrap_err();
        assert!(matches!(err, AppError::LockTimeout));
        assert_eq!(err.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);

        drop(blocker);
        rentals.rent(ALICE, &command(1, "U1")).await.unwrap();
    }

    #[tokio::test]
    async fn different_umbrellas_do_not_block_each_other() {
        let store = fleet();
        let rentals = service(&store);

        let mut blocker = store.begin().await.unwrap();
        blocker.lock_umbrella("U1").await.unwrap();

        rentals.rent(ALICE, &command(1, "U2")).await.unwrap();
        rentals.rent(BOB, &command(2, "U3")).await.unwrap();
        drop(blocker);
    }

    #[tokio::test]
    async fn cancelled_rent_leaves_no_trace() {
        let store = fleet();
        let rentals = service(&store);

        let mut blocker = store.begin().await.unwrap();
        blocker.lock_umbrella("U1").await.unwrap();

        // The rent is parked on the row lock when the caller goes away.
        let pending = {
            let rentals = rentals.clone();
            tokio::spawn(async move { rentals.rent(ALICE, &command(1, "U1")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        drop(blocker);

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.umbrellas["U1"].status, UmbrellaStatus::Available);
        assert!(snapshot.rentals.is_empty());

        rentals.rent(BOB, &command(1, "U1")).await.unwrap();
    }

    #[tokio::test]
    async fn session_view_follows_commits() {
        let store = fleet();
        let rentals = service(&store);

        assert_eq!(rentals.current_rental(ALICE).await.unwrap(), None);

        rentals.rent(ALICE, &command(1, "U2")).await.unwrap();
        assert_eq!(
            rentals.current_rental(ALICE).await.unwrap().as_deref(),
            Some("U2")
        );
        assert_eq!(rentals.current_rental(BOB).await.unwrap(), None);

        rentals
            .return_umbrella(ALICE, &command(2, "U2"))
            .await
            .unwrap();
        assert_eq!(rentals.current_rental(ALICE).await.unwrap(), None);

        let history = rentals.history(ALICE).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].is_open());
    }

    #[tokio::test]
    async fn station_listing_shows_docked_umbrellas_only() {
        let store = fleet();
        let rentals = service(&store);

        rentals.rent(ALICE, &command(1, "U1")).await.unwrap();

        let docked: Vec<String> = rentals
            .available_at(1)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.umbrella_id)
            .collect();
        assert_eq!(docked, vec!["U2".to_string()]);

        assert!(matches!(
            rentals.available_at(42).await,
            Err(AppError::NotFound(_))
        ));
    }
}
