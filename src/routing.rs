//! The donation-routing state machine.
//!
//! Everything that decides *which* NGO sees a request and *when* a record
//! changes state lives here. Storage is plain persistence underneath, and
//! the notifier is a best-effort collaborator: delivery failure never rolls
//! back or retries a transition.

use sqlx::SqliteConnection;
use std::sync::Arc;

use crate::db::models::{DonationInput, DonationRecord, DonationStatus, Ngo};
use crate::db::{self, DbPool};
use crate::emails;
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Decline,
}

impl Decision {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accept" => Some(Self::Accept),
            "decline" => Some(Self::Decline),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("request not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Result of submitting a donation.
#[derive(Debug)]
pub struct Submission {
    pub record: DonationRecord,
    pub message: String,
    pub notification_attempted: bool,
}

/// Result of an accept/decline signal.
#[derive(Debug)]
pub enum ResponseOutcome {
    Accepted { message: String },
    Forwarded { message: String },
    Exhausted { message: String },
    /// The record was already in an absorbing state. Reported, not applied.
    AlreadyProcessed,
}

impl ResponseOutcome {
    pub fn message(&self) -> &str {
        match self {
            Self::Accepted { message }
            | Self::Forwarded { message }
            | Self::Exhausted { message } => message,
            Self::AlreadyProcessed => "Request already processed.",
        }
    }
}

/// Picks the NGO a fresh donation goes to: the first NGO (ascending id)
/// whose location matches, else the first NGO in the directory so no
/// donation is dropped over an unmatched location string. `None` only when
/// the directory is empty.
pub async fn select_initial_ngo(
    conn: &mut SqliteConnection,
    location: &str,
) -> anyhow::Result<Option<Ngo>> {
    if let Some(ngo) = db::first_ngo_in_location(&mut *conn, location).await? {
        return Ok(Some(ngo));
    }
    db::first_ngo(&mut *conn).await
}

#[derive(Clone)]
pub struct RoutingEngine {
    pool: DbPool,
    notifier: Arc<dyn Notifier>,
    base_url: String,
}

impl RoutingEngine {
    pub fn new(pool: DbPool, notifier: Arc<dyn Notifier>, base_url: String) -> Self {
        Self {
            pool,
            notifier,
            base_url,
        }
    }

    /// Persists a new donation request and routes it to its first NGO.
    ///
    /// The record creation, NGO selection, assignment, and contact event are
    /// one transaction; the email goes out after commit so delivery can
    /// neither block nor roll back the state change.
    pub async fn submit_donation(&self, input: DonationInput) -> Result<Submission, RoutingError> {
        let mut tx = self.pool.begin().await?;
        let id = db::create_request(&mut *tx, &input).await?;

        let Some(ngo) = select_initial_ngo(&mut tx, &input.location).await? else {
            db::set_status(&mut *tx, id, DonationStatus::NoNgoAvailable).await?;
            db::append_event(&mut *tx, id, "No NGOs found in the requested location.").await?;
            let record = db::get_request(&mut *tx, id)
                .await?
                .ok_or(RoutingError::NotFound)?;
            tx.commit().await?;
            tracing::warn!(request_id = id, "no NGOs registered; request parked");
            return Ok(Submission {
                record,
                message: "Request saved, but no NGOs are available in your area.".to_string(),
                notification_attempted: false,
            });
        };

        let contacted = vec![ngo.name.clone()];
        db::update_routing_state(
            &mut *tx,
            id,
            DonationStatus::WaitingForResponse,
            &ngo.name,
            &contacted,
        )
        .await?;
        db::append_event(
            &mut *tx,
            id,
            &format!("Email sent to NGO {} requesting pickup.", ngo.name),
        )
        .await?;
        let record = db::get_request(&mut *tx, id)
            .await?
            .ok_or(RoutingError::NotFound)?;
        tx.commit().await?;

        // Prefer the registered profile for contact details in the alert;
        // fall back to the snapshot the donor typed in.
        let profile = db::find_restaurant_by_name(&self.pool, &input.restaurant).await?;
        let (subject, body) =
            emails::assignment_alert(&ngo, &record, profile.as_ref(), &self.base_url);
        let notification_attempted = self.notifier.send(&ngo.email, &subject, &body).await;

        tracing::info!(
            request_id = id,
            ngo = %ngo.name,
            notified = notification_attempted,
            "donation routed"
        );
        Ok(Submission {
            record,
            message: format!("Request saved. Contacted NGO: {}", ngo.name),
            notification_attempted,
        })
    }

    /// Applies an accept/decline signal to a record.
    ///
    /// The precondition check and every mutation run in one transaction, so
    /// two concurrent signals for the same record cannot both observe the
    /// pre-mutation state: the loser re-reads the committed state and is
    /// reported as already processed (or re-routes from the updated
    /// contacted set).
    pub async fn record_response(
        &self,
        request_id: i64,
        decision: Decision,
    ) -> Result<ResponseOutcome, RoutingError> {
        let mut tx = self.pool.begin().await?;
        let record = db::get_request(&mut *tx, request_id)
            .await?
            .ok_or(RoutingError::NotFound)?;

        // Pending never escapes the submit transaction, so anything other
        // than WaitingForResponse here is an absorbing state.
        if record.status != DonationStatus::WaitingForResponse {
            return Ok(ResponseOutcome::AlreadyProcessed);
        }

        match decision {
            Decision::Accept => self.finalize_accept(tx, record).await,
            Decision::Decline => self.forward_or_exhaust(tx, record).await,
        }
    }

    async fn finalize_accept(
        &self,
        mut tx: sqlx::Transaction<'_, sqlx::Sqlite>,
        record: DonationRecord,
    ) -> Result<ResponseOutcome, RoutingError> {
        let current = record.ngo_assigned.clone();
        db::set_status(&mut *tx, record.id, DonationStatus::Accepted).await?;
        db::append_event(&mut *tx, record.id, &format!("Request ACCEPTED by NGO {current}."))
            .await?;
        tx.commit().await?;

        let ngo = db::find_ngo_by_name(&self.pool, &current).await?;
        let (subject, body) = emails::acceptance_notice(&record, ngo.as_ref());
        let notified = self.notifier.send(&record.email, &subject, &body).await;

        // The donor-notification event is appended whether or not delivery
        // succeeded; the attempt itself is part of the audit trail.
        db::append_event(
            &self.pool,
            record.id,
            &format!("Email sent to donor ({}) with pickup confirmation.", record.email),
        )
        .await?;

        tracing::info!(request_id = record.id, ngo = %current, notified, "donation accepted");
        Ok(ResponseOutcome::Accepted {
            message: format!("Successfully accepted by {current}."),
        })
    }

    async fn forward_or_exhaust(
        &self,
        mut tx: sqlx::Transaction<'_, sqlx::Sqlite>,
        record: DonationRecord,
    ) -> Result<ResponseOutcome, RoutingError> {
        let current = record.ngo_assigned.clone();

        // Candidates share the record's location, in stable directory
        // order. An NGO in the contacted set has been asked once already
        // and is never asked again for this record.
        let candidates = db::ngos_in_location(&mut *tx, &record.location).await?;
        let next = candidates
            .into_iter()
            .find(|ngo| !record.contacted.iter().any(|seen| seen == &ngo.name));

        let Some(next) = next else {
            db::set_status(&mut *tx, record.id, DonationStatus::DeclinedNoNgosLeft).await?;
            db::append_event(
                &mut *tx,
                record.id,
                &format!(
                    "Request DECLINED by {current}. No more NGOs available in {}.",
                    record.location
                ),
            )
            .await?;
            db::append_event(
                &mut *tx,
                record.id,
                &format!("Email sent to donor ({}) that no NGOs are available.", record.email),
            )
            .await?;
            tx.commit().await?;

            let (subject, body) = emails::exhaustion_notice(&record);
            let notified = self.notifier.send(&record.email, &subject, &body).await;
            tracing::info!(request_id = record.id, notified, "donation exhausted all NGOs");
            return Ok(ResponseOutcome::Exhausted {
                message: "Declined. No other NGOs available.".to_string(),
            });
        };

        let mut contacted = record.contacted.clone();
        contacted.push(next.name.clone());
        db::update_routing_state(
            &mut *tx,
            record.id,
            DonationStatus::WaitingForResponse,
            &next.name,
            &contacted,
        )
        .await?;
        db::append_event(
            &mut *tx,
            record.id,
            &format!("Request DECLINED by {current}. Forwarding to {}.", next.name),
        )
        .await?;
        db::append_event(
            &mut *tx,
            record.id,
            &format!("Email sent to NGO {} requesting pickup.", next.name),
        )
        .await?;
        tx.commit().await?;

        let (subject, body) = emails::forwarded_alert(&next, &record, &self.base_url);
        let notified = self.notifier.send(&next.email, &subject, &body).await;

        tracing::info!(
            request_id = record.id,
            declined_by = %current,
            forwarded_to = %next.name,
            notified,
            "donation forwarded"
        );
        Ok(ResponseOutcome::Forwarded {
            message: format!("Declined. Forwarded to {}.", next.name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_selection_prefers_exact_location() {
        let pool = db::init_memory_pool().await.expect("init pool");
        db::insert_ngo(&pool, "Far Aid", "Guindy", "far@example.org", "1").await.expect("insert");
        db::insert_ngo(&pool, "Near Aid", "Tambaram", "near@example.org", "2").await.expect("insert");

        let mut conn = pool.acquire().await.expect("acquire");
        let ngo = select_initial_ngo(&mut conn, "Tambaram")
            .await
            .expect("select")
            .expect("some");
        assert_eq!(ngo.name, "Near Aid");
    }

    #[tokio::test]
    async fn initial_selection_falls_back_to_first_ngo() {
        let pool = db::init_memory_pool().await.expect("init pool");
        db::insert_ngo(&pool, "Far Aid", "Guindy", "far@example.org", "1").await.expect("insert");
        db::insert_ngo(&pool, "Other Aid", "Pallavaram", "o@example.org", "2").await.expect("insert");

        let mut conn = pool.acquire().await.expect("acquire");
        let ngo = select_initial_ngo(&mut conn, "Nowhere")
            .await
            .expect("select")
            .expect("some");
        assert_eq!(ngo.name, "Far Aid");
    }

    #[tokio::test]
    async fn initial_selection_reports_empty_directory() {
        let pool = db::init_memory_pool().await.expect("init pool");
        let mut conn = pool.acquire().await.expect("acquire");
        let ngo = select_initial_ngo(&mut conn, "Tambaram").await.expect("select");
        assert!(ngo.is_none());
    }
}
