use std::collections::BTreeMap;

use mongodb::{bson::doc, error::Error as DbError, ClientSession};

use crate::model::{
    common::{ConstituencyId, ElectionId, PartyId},
    db::{tally::Tally, vote::Vote},
};

use super::Ledger;

/// Count the votes for each party in each constituency of the given election.
///
/// Votes from other elections are ignored. The result is ordered by constituency, then party.
pub fn tally_votes<'a>(
    election_id: ElectionId,
    votes: impl IntoIterator<Item = &'a Vote>,
) -> Vec<Tally> {
    let mut counts: BTreeMap<(ConstituencyId, PartyId), u64> = BTreeMap::new();
    for vote in votes {
        if vote.election_id == election_id {
            *counts
                .entry((vote.constituency_id, vote.party_id))
                .or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|((constituency_id, party_id), votes)| Tally {
            election_id,
            constituency_id,
            party_id,
            votes,
        })
        .collect()
}

impl Ledger {
    /// Recompute the stored tallies of an election from its votes, in its own transaction.
    ///
    /// Running this again without new votes leaves the same tallies.
    pub async fn aggregate(&self, election_id: ElectionId) -> Result<Vec<Tally>, DbError> {
        let mut session = self.store.start_transaction().await?;
        let tallies = self.aggregate_in(election_id, &mut session).await?;
        session.commit_transaction().await?;
        Ok(tallies)
    }

    /// Replace the stored tallies of an election within the given session's transaction.
    pub(super) async fn aggregate_in(
        &self,
        election_id: ElectionId,
        session: &mut ClientSession,
    ) -> Result<Vec<Tally>, DbError> {
        let filter = doc! { "election_id": election_id };

        let mut cursor = self
            .store
            .coll::<Vote>()
            .find_with_session(filter.clone(), None, session)
            .await?;
        let mut votes = Vec::new();
        while let Some(vote) = cursor.next(session).await {
            votes.push(vote?);
        }
        let tallies = tally_votes(election_id, &votes);

        let tally_coll = self.store.coll::<Tally>();
        tally_coll
            .delete_many_with_session(filter, None, session)
            .await?;
        if !tallies.is_empty() {
            tally_coll
                .insert_many_with_session(&tallies, None, session)
                .await?;
        }
        Ok(tallies)
    }
}
