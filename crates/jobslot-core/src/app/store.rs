//! ReservationStore - 予約プロトコル
//!
//! ```text
//! (absent) --reserve--> reserved --complete--> (absent)
//!                           |
//!                           +------error----> error   (blocks reserve until cleared)
//! ```
//!
//! The store holds no lock of its own. Whether `reserve` wins is decided
//! entirely by the medium's conditional insert, which is what makes the
//! protocol hold across processes and hosts.

use std::sync::Arc;

use crate::domain::{
    JobKey, JobRecord, KeyHash, Namespace, RecordFilter, Reservation, ReservationError,
    StatusCounts, check_work_unit, compute_key_hash,
};
use crate::ports::{Clock, IdentitySource, InsertOutcome, JobTable};

/// Validate the work unit before anything is hashed or stored.
fn slot(work_unit: &str, key: &JobKey) -> Result<KeyHash, ReservationError> {
    check_work_unit(work_unit)?;
    compute_key_hash(key)
}

/// Reservation protocol over the job table of one namespace.
pub struct ReservationStore {
    namespace: Namespace,
    table: Arc<dyn JobTable>,
    identity: Arc<dyn IdentitySource>,
    clock: Arc<dyn Clock>,
}

impl ReservationStore {
    pub fn new(
        namespace: Namespace,
        table: Arc<dyn JobTable>,
        identity: Arc<dyn IdentitySource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            namespace,
            table,
            identity,
            clock,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Try to claim the unit of work `(work_unit, key)`.
    ///
    /// Returns [`Reservation::Acquired`] if this caller now owns it, or
    /// [`Reservation::AlreadyTaken`] if a record already exists (reserved
    /// by another worker, errored, or ignored). Every other failure is an
    /// error.
    pub async fn reserve(
        &self,
        work_unit: &str,
        key: &JobKey,
    ) -> Result<Reservation, ReservationError> {
        let key_hash = slot(work_unit, key)?;
        let record = JobRecord::reserved(
            work_unit,
            key_hash.clone(),
            &self.identity.identity(),
            self.clock.now(),
        );

        let outcome = match self.table.insert(record).await? {
            InsertOutcome::Inserted => Reservation::Acquired,
            InsertOutcome::Duplicate => Reservation::AlreadyTaken,
        };
        tracing::trace!(
            namespace = %self.namespace,
            work_unit,
            %key_hash,
            ?outcome,
            "reserve"
        );
        Ok(outcome)
    }

    /// Report success: the reservation is forgotten.
    ///
    /// Idempotent; completing an unreserved key is a no-op.
    pub async fn complete(&self, work_unit: &str, key: &JobKey) -> Result<(), ReservationError> {
        let key_hash = slot(work_unit, key)?;
        let removed = self.table.delete(work_unit, &key_hash).await?;
        tracing::trace!(namespace = %self.namespace, work_unit, %key_hash, removed, "complete");
        Ok(())
    }

    /// Report failure: the reservation is replaced by an error record that
    /// keeps blocking `reserve` for this key.
    pub async fn error(
        &self,
        work_unit: &str,
        key: &JobKey,
        message: &str,
        stack: Option<&str>,
    ) -> Result<(), ReservationError> {
        let key_hash = slot(work_unit, key)?;
        let record = JobRecord::errored(
            work_unit,
            key_hash.clone(),
            key.to_json(),
            message,
            stack,
            &self.identity.identity(),
            self.clock.now(),
        );
        self.table.replace(record).await?;
        tracing::trace!(namespace = %self.namespace, work_unit, %key_hash, "error recorded");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Operator surface
    // ------------------------------------------------------------------

    /// Current record of `(work_unit, key)`, if any.
    pub async fn get(
        &self,
        work_unit: &str,
        key: &JobKey,
    ) -> Result<Option<JobRecord>, ReservationError> {
        let key_hash = slot(work_unit, key)?;
        Ok(self.table.get(work_unit, &key_hash).await?)
    }

    pub async fn list(&self, filter: &RecordFilter) -> Result<Vec<JobRecord>, ReservationError> {
        Ok(self.table.list(filter).await?)
    }

    pub async fn counts(&self) -> Result<StatusCounts, ReservationError> {
        let mut counts = StatusCounts::default();
        for record in self.table.list(&RecordFilter::all()).await? {
            counts.add(record.status);
        }
        Ok(counts)
    }

    /// Remove any record of `(work_unit, key)` so it can be reserved again.
    ///
    /// This is how an errored or stale reservation is retried. Returns
    /// whether a record was removed.
    pub async fn clear(&self, work_unit: &str, key: &JobKey) -> Result<bool, ReservationError> {
        let key_hash = slot(work_unit, key)?;
        let removed = self.table.delete(work_unit, &key_hash).await?;
        if removed {
            tracing::info!(namespace = %self.namespace, work_unit, %key_hash, "cleared job record");
        }
        Ok(removed)
    }

    /// Mark `(work_unit, key)` as permanently skipped.
    pub async fn ignore(&self, work_unit: &str, key: &JobKey) -> Result<(), ReservationError> {
        let key_hash = slot(work_unit, key)?;
        let record = JobRecord::ignored(
            work_unit,
            key_hash.clone(),
            key.to_json(),
            &self.identity.identity(),
            self.clock.now(),
        );
        self.table.replace(record).await?;
        tracing::info!(namespace = %self.namespace, work_unit, %key_hash, "marked job as ignored");
        Ok(())
    }

    /// Delete every record matching `filter`, without confirmation.
    pub async fn purge(&self, filter: &RecordFilter) -> Result<u64, ReservationError> {
        let removed = self.table.delete_where(filter).await?;
        tracing::info!(namespace = %self.namespace, ?filter, removed, "purged job records");
        Ok(removed)
    }

    /// Drop the namespace's job table.
    ///
    /// Any store still holding the table (including this one) fails with a
    /// storage error afterwards; a fresh registry declares it again.
    pub async fn drop_table(&self) -> Result<(), ReservationError> {
        self.table.drop_table().await?;
        tracing::info!(namespace = %self.namespace, "dropped job table");
        Ok(())
    }
}
