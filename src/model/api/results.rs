use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CitizenId, ConstituencyId, ElectionId, PartyId},
    db::{constituency::Constituency, election::Election, tally::Tally},
};

/// One party's result in one constituency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub constituency_id: ConstituencyId,
    pub constituency_name: String,
    pub party_id: PartyId,
    pub party_name: String,
    /// Name of the party's candidate, if they are still on record.
    pub candidate_name: Option<String>,
    pub votes: u64,
}

/// Names needed to present an election's tallies.
#[derive(Debug, Default)]
pub struct ResultNames {
    pub constituencies: HashMap<ConstituencyId, Constituency>,
    pub parties: HashMap<PartyId, String>,
    pub citizens: HashMap<CitizenId, String>,
}

impl ResultNames {
    fn constituency_name(&self, id: ConstituencyId) -> String {
        self.constituencies
            .get(&id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("Constituency {id}"))
    }

    fn party_name(&self, id: PartyId) -> String {
        self.parties
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Party {id}"))
    }

    fn candidate_name(&self, constituency_id: ConstituencyId, party_id: PartyId) -> Option<String> {
        let candidate = self
            .constituencies
            .get(&constituency_id)?
            .candidate_for(party_id)?;
        self.citizens.get(&candidate.citizen_id).cloned()
    }
}

/// Present tallies as results, ranked by constituency, then by votes (highest first),
/// then by party.
pub fn rank_results(tallies: &[Tally], names: &ResultNames) -> Vec<ResultEntry> {
    let mut results: Vec<_> = tallies
        .iter()
        .map(|tally| ResultEntry {
            constituency_id: tally.constituency_id,
            constituency_name: names.constituency_name(tally.constituency_id),
            party_id: tally.party_id,
            party_name: names.party_name(tally.party_id),
            candidate_name: names.candidate_name(tally.constituency_id, tally.party_id),
            votes: tally.votes,
        })
        .collect();
    results.sort_by(|a, b| {
        a.constituency_id
            .cmp(&b.constituency_id)
            .then(b.votes.cmp(&a.votes))
            .then(a.party_id.cmp(&b.party_id))
    });
    results
}

/// A constituency's ranked results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstituencyResults {
    pub id: ConstituencyId,
    pub name: String,
    pub results: Vec<ResultEntry>,
}

/// An ended election with its results, grouped by constituency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastElection {
    pub id: ElectionId,
    pub name: String,
    pub ended_at: Option<DateTime<Utc>>,
    pub constituencies: Vec<ConstituencyResults>,
}

impl PastElection {
    /// Group ranked results under each of the election's constituencies, in election order.
    ///
    /// Constituencies without votes are listed with no results.
    pub fn new(election: Election, names: &ResultNames, ranked: Vec<ResultEntry>) -> Self {
        let mut by_constituency: HashMap<ConstituencyId, Vec<ResultEntry>> = HashMap::new();
        for entry in ranked {
            by_constituency
                .entry(entry.constituency_id)
                .or_default()
                .push(entry);
        }
        let constituencies = election
            .constituencies
            .iter()
            .map(|&id| ConstituencyResults {
                id,
                name: names.constituency_name(id),
                results: by_constituency.remove(&id).unwrap_or_default(),
            })
            .collect();
        Self {
            id: election.id,
            name: election.name,
            ended_at: election.ended_at,
            constituencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::constituency::Candidate;

    fn tally(constituency_id: ConstituencyId, party_id: PartyId, votes: u64) -> Tally {
        Tally {
            election_id: 1,
            constituency_id,
            party_id,
            votes,
        }
    }

    fn names() -> ResultNames {
        let mut names = ResultNames::default();
        names.constituencies.insert(
            1,
            Constituency::example(
                1,
                vec![
                    Candidate {
                        party_id: 1,
                        citizen_id: 10,
                    },
                    Candidate {
                        party_id: 2,
                        citizen_id: 20,
                    },
                ],
            ),
        );
        names.constituencies.insert(2, Constituency::example(2, vec![]));
        names.parties.insert(1, "Reds".to_string());
        names.parties.insert(2, "Blues".to_string());
        names.citizens.insert(10, "Robin".to_string());
        names.citizens.insert(20, "Kit".to_string());
        names
    }

    fn ranking(results: &[ResultEntry]) -> Vec<(ConstituencyId, PartyId, u64)> {
        results
            .iter()
            .map(|r| (r.constituency_id, r.party_id, r.votes))
            .collect()
    }

    #[test]
    fn most_votes_first() {
        let results = rank_results(&[tally(1, 1, 3), tally(1, 2, 5)], &names());
        assert_eq!(ranking(&results), vec![(1, 2, 5), (1, 1, 3)]);
        assert_eq!(results[0].party_name, "Blues");
        assert_eq!(results[0].candidate_name.as_deref(), Some("Kit"));
        assert_eq!(results[0].constituency_name, "Constituency 1");
    }

    #[test]
    fn grouped_by_constituency_then_ties_by_party() {
        let tallies = [tally(2, 2, 4), tally(1, 2, 1), tally(2, 1, 4), tally(1, 1, 7)];
        let results = rank_results(&tallies, &names());
        assert_eq!(
            ranking(&results),
            vec![(1, 1, 7), (1, 2, 1), (2, 1, 4), (2, 2, 4)]
        );
    }

    #[test]
    fn missing_names_fall_back() {
        let results = rank_results(&[tally(3, 9, 1)], &names());
        assert_eq!(results[0].constituency_name, "Constituency 3");
        assert_eq!(results[0].party_name, "Party 9");
        assert_eq!(results[0].candidate_name, None);
    }

    #[test]
    fn past_election_lists_every_constituency() {
        let names = names();
        let mut election = Election::new(1, "By-election".to_string(), None, vec![2, 1]);
        election.state = crate::model::common::ElectionState::Ended;
        let ranked = rank_results(&[tally(1, 1, 3), tally(1, 2, 5)], &names);

        let past = PastElection::new(election, &names, ranked);
        let layout: Vec<_> = past
            .constituencies
            .iter()
            .map(|c| (c.id, c.results.len()))
            .collect();
        assert_eq!(layout, vec![(2, 0), (1, 2)]);
        assert_eq!(past.constituencies[1].results[0].party_id, 2);
    }
}
