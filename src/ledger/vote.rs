use log::debug;
use mongodb::error::Error as DbError;
use thiserror::Error;

use crate::model::{
    common::{ConstituencyId, ElectionId, PartyId},
    db::{constituency::Constituency, election::Election, vote::Vote},
    mongodb::{is_duplicate_key_error, u32_id_filter},
};

use super::{LifecycleError, Ledger, VoterToken};

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Invalid vote: {0}")]
    Validation(String),
    #[error("Already voted in constituency {constituency_id} of election {election_id}")]
    AlreadyVoted {
        election_id: ElectionId,
        constituency_id: ConstituencyId,
    },
    #[error("{0}")]
    InvalidReference(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl Ledger {
    /// Record one vote for `party_id` in the given constituency of a running election.
    ///
    /// Each voter may vote once per constituency per election. The voter is only
    /// ever stored as a [`VoterToken`].
    pub async fn cast_vote(
        &self,
        election_id: ElectionId,
        constituency_id: ConstituencyId,
        party_id: PartyId,
        raw_voter_id: &str,
    ) -> Result<Vote, VoteError> {
        let raw_voter_id = raw_voter_id.trim();
        if raw_voter_id.is_empty() {
            return Err(VoteError::Validation("voter ID is empty".to_string()));
        }

        // Only running elections get a lock, so unknown IDs cannot create them.
        self.running_election(election_id).await?;
        // Keep the election from ending until this vote is recorded.
        let _shared = self.locks.shared(election_id).await;
        let election = self.running_election(election_id).await?;
        if !election.constituencies.contains(&constituency_id) {
            return Err(VoteError::InvalidReference(format!(
                "Constituency {constituency_id} is not part of election {election_id}"
            )));
        }
        let constituency = self
            .store
            .coll::<Constituency>()
            .find_one(u32_id_filter(constituency_id), None)
            .await?
            .ok_or_else(|| {
                VoteError::InvalidReference(format!("Constituency {constituency_id} not found"))
            })?;
        if constituency.candidate_for(party_id).is_none() {
            return Err(VoteError::InvalidReference(format!(
                "Party {party_id} has no candidate in constituency {constituency_id}"
            )));
        }

        let vote = Vote::new(
            election_id,
            constituency_id,
            party_id,
            VoterToken::derive(raw_voter_id, &self.token_key),
        );
        let already_voted = VoteError::AlreadyVoted {
            election_id,
            constituency_id,
        };

        // The unique index decides; this only saves a failed insert.
        let votes = self.store.coll::<Vote>();
        if votes.count_documents(vote.voter_filter(), None).await? > 0 {
            return Err(already_voted);
        }
        match votes.insert_one(&vote, None).await {
            Ok(_) => {
                debug!("Recorded vote in constituency {constituency_id} of election {election_id}");
                Ok(vote)
            }
            Err(e) if is_duplicate_key_error(&e) => Err(already_voted),
            Err(e) => Err(e.into()),
        }
    }

    async fn running_election(&self, election_id: ElectionId) -> Result<Election, VoteError> {
        let election = self
            .store
            .coll::<Election>()
            .find_one(u32_id_filter(election_id), None)
            .await?
            .ok_or_else(|| VoteError::InvalidReference(format!("Election {election_id} not found")))?;
        if !election.state.accepts_votes() {
            return Err(LifecycleError::NotAcceptingVotes {
                election_id,
                state: election.state,
            }
            .into());
        }
        Ok(election)
    }
}
