use std::collections::{BTreeSet, HashMap};

use mongodb::{bson::doc, error::Error as DbError};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::results::{rank_results, ResultEntry, ResultNames},
    common::{ElectionId, ElectionState},
    db::{citizen::Citizen, constituency::Constituency, election::Election, party::Party, tally::Tally},
    mongodb::u32_id_filter,
};

use super::Ledger;

impl Ledger {
    /// The ranked results of an ended election.
    ///
    /// Elections that have not ended have no results yet.
    pub async fn get_results(&self, election_id: ElectionId) -> Result<Vec<ResultEntry>> {
        let election = self
            .store
            .coll::<Election>()
            .find_one(u32_id_filter(election_id), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        if election.state != ElectionState::Ended {
            return Err(Error::not_found(format!("Results for election {election_id}")));
        }
        Ok(self.results_of(&election).await?)
    }

    /// Rank the stored tallies of the given election.
    pub async fn results_of(&self, election: &Election) -> std::result::Result<Vec<ResultEntry>, DbError> {
        let tallies: Vec<Tally> = self
            .store
            .coll::<Tally>()
            .find(doc! { "election_id": election.id }, None)
            .await?
            .try_collect()
            .await?;
        let names = self.result_names(election).await?;
        Ok(rank_results(&tallies, &names))
    }

    /// Look up the names needed to present the results of the given election.
    pub async fn result_names(&self, election: &Election) -> std::result::Result<ResultNames, DbError> {
        let constituencies: Vec<Constituency> = self
            .store
            .coll::<Constituency>()
            .find(doc! { "_id": { "$in": election.constituencies.clone() } }, None)
            .await?
            .try_collect()
            .await?;

        let candidates = constituencies.iter().flat_map(|c| c.candidates.iter());
        let party_ids: BTreeSet<_> = candidates.clone().map(|c| c.party_id).collect();
        let citizen_ids: BTreeSet<_> = candidates.map(|c| c.citizen_id).collect();

        let parties: HashMap<_, _> = self
            .store
            .coll::<Party>()
            .find(doc! { "_id": { "$in": party_ids.into_iter().collect::<Vec<_>>() } }, None)
            .await?
            .map_ok(|party| (party.id, party.name))
            .try_collect()
            .await?;
        let citizens: HashMap<_, _> = self
            .store
            .coll::<Citizen>()
            .find(doc! { "_id": { "$in": citizen_ids.into_iter().collect::<Vec<_>>() } }, None)
            .await?
            .map_ok(|citizen| (citizen.id, citizen.name))
            .try_collect()
            .await?;

        Ok(ResultNames {
            constituencies: constituencies.into_iter().map(|c| (c.id, c)).collect(),
            parties,
            citizens,
        })
    }
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{http::Status, local::asynchronous::Client};

    use super::*;
    use crate::ledger::fixtures::{
        ledger, seed_election, CANDIDATE_A, CANDIDATE_B, CONSTITUENCY, ELECTION, PARTY_A, PARTY_B,
    };
    use crate::model::mongodb::Coll;

    #[backend_test]
    async fn ranked_by_votes(client: Client, db: Database) {
        let ledger = ledger(&client);
        seed_election(&db, ElectionState::Started).await;

        for voter in ["v1", "v2", "v3"] {
            ledger
                .cast_vote(ELECTION, CONSTITUENCY, PARTY_A, voter)
                .await
                .unwrap();
        }
        for voter in ["v4", "v5", "v6", "v7", "v8"] {
            ledger
                .cast_vote(ELECTION, CONSTITUENCY, PARTY_B, voter)
                .await
                .unwrap();
        }
        ledger.end_election(ELECTION).await.unwrap();

        let results = ledger.get_results(ELECTION).await.unwrap();
        let ranked: Vec<_> = results
            .iter()
            .map(|entry| (entry.party_id, entry.votes))
            .collect();
        assert_eq!(ranked, vec![(PARTY_B, 5), (PARTY_A, 3)]);
        assert_eq!(
            results[0].candidate_name.as_deref(),
            Some(format!("Candidate {CANDIDATE_B}").as_str())
        );
        assert_eq!(
            results[1].candidate_name.as_deref(),
            Some(format!("Candidate {CANDIDATE_A}").as_str())
        );
        assert_eq!(results[0].party_name, format!("Party {PARTY_B}"));
    }

    #[backend_test]
    async fn aggregation_is_idempotent(client: Client, db: Database, tallies: Coll<Tally>) {
        let ledger = ledger(&client);
        seed_election(&db, ElectionState::Started).await;
        for (voter, party_id) in [("v1", PARTY_A), ("v2", PARTY_B), ("v3", PARTY_B)] {
            ledger
                .cast_vote(ELECTION, CONSTITUENCY, party_id, voter)
                .await
                .unwrap();
        }
        ledger.end_election(ELECTION).await.unwrap();
        let first = ledger.get_results(ELECTION).await.unwrap();

        let recomputed = ledger.aggregate(ELECTION).await.unwrap();
        let second = ledger.get_results(ELECTION).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(recomputed.len(), 2);

        let stored = tallies
            .count_documents(doc! { "election_id": ELECTION }, None)
            .await
            .unwrap();
        assert_eq!(stored, 2);
    }

    #[backend_test]
    async fn no_votes_no_results(client: Client, db: Database) {
        let ledger = ledger(&client);
        seed_election(&db, ElectionState::Started).await;
        ledger.end_election(ELECTION).await.unwrap();

        assert!(ledger.get_results(ELECTION).await.unwrap().is_empty());
    }

    #[backend_test]
    async fn results_hidden_until_ended(client: Client, db: Database) {
        let ledger = ledger(&client);
        seed_election(&db, ElectionState::Started).await;
        ledger
            .cast_vote(ELECTION, CONSTITUENCY, PARTY_A, "v1")
            .await
            .unwrap();

        let err = ledger.get_results(ELECTION).await.unwrap_err();
        assert!(matches!(err, Error::Status(s, _) if s == Status::NotFound));

        let err = ledger.get_results(ELECTION + 1).await.unwrap_err();
        assert!(matches!(err, Error::Status(s, _) if s == Status::NotFound));
    }
}
