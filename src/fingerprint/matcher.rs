//! Time-coherence voting over query and database hash sets.

use std::collections::HashMap;

use super::hasher::Couple;

/// A ranked candidate: the song, its modal time offset, and the vote count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub song_id: String,
    pub offset_ms: i32,
    pub count: usize,
}

/// Vote on `db_anchor - query_anchor` offsets and rank candidates.
///
/// A genuine match concentrates votes on a single offset. Candidates are
/// returned sorted by vote count descending; equal counts order by song id
/// so results are deterministic.
pub fn vote(
    query_hashes: &HashMap<u32, u32>,
    db_hashes: &HashMap<u32, Vec<Couple>>,
) -> Vec<Match> {
    let mut votes: HashMap<&str, HashMap<i32, usize>> = HashMap::new();
    for (hash, &query_anchor) in query_hashes {
        let Some(couples) = db_hashes.get(hash) else {
            continue;
        };
        for couple in couples {
            let offset = couple.anchor_time_ms as i32 - query_anchor as i32;
            *votes
                .entry(couple.song_id.as_str())
                .or_default()
                .entry(offset)
                .or_insert(0) += 1;
        }
    }

    let mut matches: Vec<Match> = votes
        .into_iter()
        .filter_map(|(song_id, offsets)| {
            let (offset_ms, count) = best_offset(&offsets)?;
            Some(Match {
                song_id: song_id.to_string(),
                offset_ms,
                count,
            })
        })
        .collect();
    matches.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.song_id.cmp(&b.song_id)));
    matches
}

/// Modal offset for one song; ties prefer the smaller offset.
fn best_offset(offsets: &HashMap<i32, usize>) -> Option<(i32, usize)> {
    let mut best: Option<(i32, usize)> = None;
    for (&offset, &count) in offsets {
        if count == 0 {
            continue;
        }
        match best {
            Some((best_off, best_count))
                if count < best_count || (count == best_count && offset >= best_off) => {}
            _ => best = Some((offset, count)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::hasher::pack_address;

    fn couple(song_id: &str, anchor_time_ms: u32) -> Couple {
        Couple {
            song_id: song_id.to_string(),
            anchor_time_ms,
        }
    }

    #[test]
    fn aligned_couples_concentrate_votes_on_one_offset() {
        let h1 = pack_address(10, 20, 100).unwrap();
        let h2 = pack_address(30, 40, 200).unwrap();
        let h3 = pack_address(50, 60, 300).unwrap();
        let query = HashMap::from([(h1, 0u32), (h2, 500), (h3, 1_000)]);
        let db = HashMap::from([
            (h1, vec![couple("song", 5_000)]),
            (h2, vec![couple("song", 5_500)]),
            (h3, vec![couple("song", 6_000)]),
        ]);
        let matches = vote(&query, &db);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].song_id, "song");
        assert_eq!(matches[0].offset_ms, 5_000);
        assert_eq!(matches[0].count, 3);
    }

    #[test]
    fn hashes_missing_from_the_database_are_ignored() {
        let h1 = pack_address(10, 20, 100).unwrap();
        let h2 = pack_address(30, 40, 200).unwrap();
        let query = HashMap::from([(h1, 0u32), (h2, 100)]);
        let db = HashMap::from([(h1, vec![couple("song", 40)])]);
        let matches = vote(&query, &db);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].count, 1);
        assert_eq!(matches[0].offset_ms, 40);
    }

    #[test]
    fn ranking_is_non_increasing_in_vote_count() {
        let hashes: Vec<u32> = (0..6)
            .map(|i| pack_address(10 + i, 100 + i, 500).unwrap())
            .collect();
        let query: HashMap<u32, u32> = hashes.iter().map(|&h| (h, 0u32)).collect();
        let mut db: HashMap<u32, Vec<Couple>> = HashMap::new();
        // "alpha" collects 4 aligned votes, "beta" 2.
        for &hash in &hashes[..4] {
            db.entry(hash).or_default().push(couple("alpha", 900));
        }
        for &hash in &hashes[4..] {
            db.entry(hash).or_default().push(couple("beta", 300));
        }
        let matches = vote(&query, &db);
        assert_eq!(matches.len(), 2);
        for pair in matches.windows(2) {
            assert!(pair[0].count >= pair[1].count);
        }
        assert_eq!(matches[0].song_id, "alpha");
        assert_eq!(matches[0].count, 4);
    }

    #[test]
    fn equal_counts_rank_by_song_id_for_determinism() {
        let h1 = pack_address(10, 20, 100).unwrap();
        let h2 = pack_address(30, 40, 200).unwrap();
        let query = HashMap::from([(h1, 0u32), (h2, 0u32)]);
        let db = HashMap::from([
            (h1, vec![couple("zebra", 10)]),
            (h2, vec![couple("aardvark", 10)]),
        ]);
        let matches = vote(&query, &db);
        assert_eq!(matches[0].song_id, "aardvark");
        assert_eq!(matches[1].song_id, "zebra");
    }

    #[test]
    fn negative_offsets_are_representable() {
        let h1 = pack_address(10, 20, 100).unwrap();
        let query = HashMap::from([(h1, 8_000u32)]);
        let db = HashMap::from([(h1, vec![couple("song", 2_000)])]);
        let matches = vote(&query, &db);
        assert_eq!(matches[0].offset_ms, -6_000);
    }

    #[test]
    fn empty_inputs_produce_no_matches() {
        assert!(vote(&HashMap::new(), &HashMap::new()).is_empty());
        let h1 = pack_address(10, 20, 100).unwrap();
        let db = HashMap::from([(h1, vec![couple("song", 10)])]);
        assert!(vote(&HashMap::new(), &db).is_empty());
    }
}
