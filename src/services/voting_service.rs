use chrono::NaiveDate;
use std::sync::Arc;
use tracing::instrument;

use crate::models::{RepositoryError, ServiceError, ServiceResult, Vote, Voter};
use crate::observability::{Metrics, VoteOutcome};
use crate::repositories::{RestaurantRepository, VoteRepository};
use crate::services::clock::{Clock, VotingWindow};

/// Daily vote state machine.
///
/// Per (voter, day): no vote -> voted. Creation never overwrites; a vote may
/// change restaurant only strictly before the cutoff of its own day. "Today"
/// is always derived from the injected clock, never from the caller.
pub struct VotingService {
    restaurants: Arc<dyn RestaurantRepository>,
    votes: Arc<dyn VoteRepository>,
    clock: Arc<dyn Clock>,
    window: VotingWindow,
    metrics: Option<Arc<Metrics>>,
}

impl VotingService {
    pub fn new(
        restaurants: Arc<dyn RestaurantRepository>,
        votes: Arc<dyn VoteRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            restaurants,
            votes,
            clock,
            window: VotingWindow::default(),
            metrics: None,
        }
    }

    /// Create a new VotingService that records vote outcomes
    pub fn new_with_metrics(
        restaurants: Arc<dyn RestaurantRepository>,
        votes: Arc<dyn VoteRepository>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(restaurants, votes, clock)
        }
    }

    pub fn window(&self) -> VotingWindow {
        self.window
    }

    /// Current day in the reference timezone
    pub fn today(&self) -> NaiveDate {
        self.window.today(self.clock.now())
    }

    /// Vote of `voter` on `date`, defaulting to today
    #[instrument(skip(self), fields(user = %voter, date = ?date))]
    pub async fn get_vote_for_date(
        &self,
        voter: &Voter,
        date: Option<NaiveDate>,
    ) -> ServiceResult<Vote> {
        let result = self.find_vote(voter, date).await;
        self.record("get", &result);
        result
    }

    async fn find_vote(&self, voter: &Voter, date: Option<NaiveDate>) -> ServiceResult<Vote> {
        let date = date.unwrap_or_else(|| self.today());

        match self.votes.find_by_user_and_date(voter.email(), date).await? {
            Some(vote) => Ok(vote),
            None => {
                crate::info_with_trace!(date = %date, "No vote found");
                Err(ServiceError::VoteNotFound {
                    user: voter.email().to_string(),
                    date,
                })
            }
        }
    }

    /// Cast today's vote. Fails if one already exists, whatever the time.
    #[instrument(skip(self), fields(user = %voter, restaurant_id = restaurant_id))]
    pub async fn create_vote(&self, voter: &Voter, restaurant_id: i64) -> ServiceResult<Vote> {
        let result = self.insert_vote(voter, restaurant_id).await;
        self.record("create", &result);
        result
    }

    async fn insert_vote(&self, voter: &Voter, restaurant_id: i64) -> ServiceResult<Vote> {
        self.require_restaurant(restaurant_id).await?;

        let now = self.clock.now();
        let today = self.window.today(now);

        if self
            .votes
            .find_by_user_and_date(voter.email(), today)
            .await?
            .is_some()
        {
            crate::warn_with_trace!(date = %today, "Vote already submitted today");
            return Err(ServiceError::already_voted(restaurant_id));
        }

        // The store's uniqueness check decides races that pass the lookup above
        match self
            .votes
            .create(Vote::new(voter, restaurant_id, today, now))
            .await
        {
            Ok(vote) => {
                crate::info_with_trace!(vote_id = %vote.id, date = %today, "Vote created");
                Ok(vote)
            }
            Err(RepositoryError::ConstraintViolation { .. }) => {
                crate::warn_with_trace!(date = %today, "Concurrent vote won the race");
                Err(ServiceError::already_voted(restaurant_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move today's vote to another restaurant, strictly before the cutoff.
    #[instrument(skip(self), fields(user = %voter, restaurant_id = restaurant_id))]
    pub async fn update_vote(&self, voter: &Voter, restaurant_id: i64) -> ServiceResult<Vote> {
        let result = self.change_vote(voter, restaurant_id).await;
        self.record("update", &result);
        result
    }

    async fn change_vote(&self, voter: &Voter, restaurant_id: i64) -> ServiceResult<Vote> {
        self.require_restaurant(restaurant_id).await?;

        let today = self.today();

        let mut vote = match self.votes.find_by_user_and_date(voter.email(), today).await? {
            Some(vote) => vote,
            None => {
                crate::warn_with_trace!(date = %today, "Update requested without a vote today");
                return Err(ServiceError::not_voted_yet());
            }
        };

        // Cutoff is judged on a fresh clock read taken right before the write
        let now = self.clock.now();
        if self.window.today(now) != vote.date {
            return Err(ServiceError::not_voted_yet());
        }
        if !self.window.is_before_cutoff(now) {
            crate::warn_with_trace!(
                cutoff = %self.window.cutoff(),
                "Vote change rejected after cutoff"
            );
            return Err(ServiceError::cutoff_passed(restaurant_id, self.window.cutoff()));
        }

        vote.change_restaurant(restaurant_id, now);

        match self.votes.update(vote).await {
            Ok(vote) => {
                crate::info_with_trace!(vote_id = %vote.id, "Vote updated");
                Ok(vote)
            }
            Err(RepositoryError::NotFound) => Err(ServiceError::not_voted_yet()),
            Err(e) => Err(e.into()),
        }
    }

    /// Number of votes a restaurant received on `date`, defaulting to today
    #[instrument(skip(self), fields(restaurant_id = restaurant_id, date = ?date))]
    pub async fn get_total_votes_for_restaurant(
        &self,
        restaurant_id: i64,
        date: Option<NaiveDate>,
    ) -> ServiceResult<u64> {
        let result = self.count_votes(restaurant_id, date).await;
        self.record("total", &result);
        result
    }

    async fn count_votes(&self, restaurant_id: i64, date: Option<NaiveDate>) -> ServiceResult<u64> {
        self.require_restaurant(restaurant_id).await?;

        let date = date.unwrap_or_else(|| self.today());
        let total = self
            .votes
            .count_by_restaurant_and_date(restaurant_id, date)
            .await?;

        crate::info_with_trace!(date = %date, total = total, "Counted votes");
        Ok(total)
    }

    async fn require_restaurant(&self, restaurant_id: i64) -> ServiceResult<()> {
        if self.restaurants.exists(restaurant_id).await? {
            Ok(())
        } else {
            crate::warn_with_trace!(restaurant_id = restaurant_id, "Restaurant not found");
            Err(ServiceError::RestaurantNotFound { id: restaurant_id })
        }
    }

    fn record<T>(&self, operation: &str, result: &ServiceResult<T>) {
        let Some(metrics) = &self.metrics else {
            return;
        };

        let outcome = match result {
            Ok(_) => VoteOutcome::Success,
            Err(ServiceError::VoteConflict { .. }) => VoteOutcome::Conflict,
            Err(e) if e.is_not_found() => VoteOutcome::NotFound,
            Err(_) => VoteOutcome::Error,
        };
        metrics.record_vote_operation(operation, outcome);
    }
}
