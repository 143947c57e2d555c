//! Combinatorial hash construction over peak constellations.
//!
//! Each peak anchors up to [`FAN_OUT`] later peaks. An accepted pair packs
//! into a 32-bit address:
//!
//! ```text
//! [ anchor_freq : 9 ][ target_freq : 9 ][ delta_ms : 14 ]
//! ```
//!
//! Pairs whose time delta falls outside `[MIN_DELTA_MS, MAX_DELTA_MS]` or
//! whose frequency indices exceed nine bits are rejected without consuming
//! fan-out budget.

use std::collections::HashMap;

use super::peaks::Peak;

const FREQ_BITS: u32 = 9;
const DELTA_BITS: u32 = 14;
const FREQ_MASK: u32 = (1 << FREQ_BITS) - 1;
const DELTA_MASK: u32 = (1 << DELTA_BITS) - 1;

/// Targets paired with each anchor peak.
pub const FAN_OUT: usize = 6;
/// Minimum anchor-to-target delta in milliseconds.
pub const MIN_DELTA_MS: u32 = 10;
/// Maximum anchor-to-target delta in milliseconds.
pub const MAX_DELTA_MS: u32 = 15_000;

/// One stored occurrence of a hash: the owning song and its anchor time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Couple {
    pub song_id: String,
    pub anchor_time_ms: u32,
}

/// Pack an address from its components, or reject out-of-range values.
pub fn pack_address(anchor_freq: u32, target_freq: u32, delta_ms: u32) -> Option<u32> {
    if !(MIN_DELTA_MS..=MAX_DELTA_MS).contains(&delta_ms) {
        return None;
    }
    if anchor_freq > FREQ_MASK || target_freq > FREQ_MASK {
        return None;
    }
    Some((anchor_freq << (DELTA_BITS + FREQ_BITS)) | (target_freq << DELTA_BITS) | (delta_ms & DELTA_MASK))
}

/// Unpack an address into `(anchor_freq, target_freq, delta_ms)`.
pub fn unpack_address(hash: u32) -> (u32, u32, u32) {
    (
        (hash >> (DELTA_BITS + FREQ_BITS)) & FREQ_MASK,
        (hash >> DELTA_BITS) & FREQ_MASK,
        hash & DELTA_MASK,
    )
}

/// Build the address for an anchor/target peak pair.
pub fn create_address(anchor: &Peak, target: &Peak) -> Option<u32> {
    let delta_ms = ((target.time - anchor.time) * 1000.0).round();
    if delta_ms < 0.0 {
        return None;
    }
    pack_address(anchor.freq_idx as u32, target.freq_idx as u32, delta_ms as u32)
}

/// Structural validation for hashes arriving from external clients.
///
/// Rejects deltas outside the representable pairing range and degenerate
/// pairs where anchor and target frequencies coincide.
pub fn is_valid_wire_hash(hash: u32) -> bool {
    let (anchor_freq, target_freq, delta_ms) = unpack_address(hash);
    if !(MIN_DELTA_MS..=MAX_DELTA_MS).contains(&delta_ms) {
        return false;
    }
    anchor_freq != target_freq
}

/// Produce ingest fingerprints: every accepted pair contributes a couple
/// carrying `song_id` and the anchor time rounded to milliseconds.
pub fn fingerprint_peaks(peaks: &[Peak], song_id: &str) -> HashMap<u32, Vec<Couple>> {
    let sorted = time_sorted(peaks);
    let mut fingerprints: HashMap<u32, Vec<Couple>> = HashMap::new();
    for_each_pair(&sorted, |anchor, address| {
        fingerprints.entry(address).or_default().push(Couple {
            song_id: song_id.to_string(),
            anchor_time_ms: anchor_time_ms(anchor),
        });
    });
    fingerprints
}

/// Produce query hashes mapping each address to its anchor time.
///
/// When the same address is produced by several anchors, the first one wins.
pub fn query_hashes(peaks: &[Peak]) -> HashMap<u32, u32> {
    let sorted = time_sorted(peaks);
    let mut hashes: HashMap<u32, u32> = HashMap::new();
    for_each_pair(&sorted, |anchor, address| {
        hashes.entry(address).or_insert_with(|| anchor_time_ms(anchor));
    });
    hashes
}

fn anchor_time_ms(anchor: &Peak) -> u32 {
    (anchor.time * 1000.0).round() as u32
}

fn time_sorted(peaks: &[Peak]) -> Vec<Peak> {
    let mut sorted = peaks.to_vec();
    sorted.sort_by_key(|p| (p.time_idx, p.freq_idx));
    sorted
}

/// Walk anchors in time order, calling `emit` for each accepted pair.
/// Rejected targets do not advance the fan-out counter.
fn for_each_pair(sorted: &[Peak], mut emit: impl FnMut(&Peak, u32)) {
    for i in 0..sorted.len() {
        let anchor = &sorted[i];
        let mut paired = 0usize;
        for target in &sorted[i + 1..] {
            if paired >= FAN_OUT {
                break;
            }
            if let Some(address) = create_address(anchor, target) {
                emit(anchor, address);
                paired += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_at(time_idx: usize, freq_idx: usize, time: f32) -> Peak {
        Peak {
            time_idx,
            freq_idx,
            time,
            freq: 0.0,
            mag_db: 0.0,
        }
    }

    #[test]
    fn address_round_trips_through_pack_and_unpack() {
        for &(a, t, d) in &[(0u32, 0u32, 10u32), (511, 511, 15_000), (100, 200, 1_500), (37, 402, 16)] {
            let hash = pack_address(a, t, d).unwrap();
            assert_eq!(unpack_address(hash), (a, t, d));
        }
    }

    #[test]
    fn packed_layout_matches_shift_arithmetic() {
        let hash = pack_address(100, 200, 1_500).unwrap();
        assert_eq!(hash, (100 << 23) | (200 << 14) | 1_500);
    }

    #[test]
    fn out_of_range_components_are_rejected() {
        assert_eq!(pack_address(512, 0, 100), None);
        assert_eq!(pack_address(0, 512, 100), None);
        assert_eq!(pack_address(0, 0, 9), None);
        assert_eq!(pack_address(0, 0, 15_001), None);
    }

    #[test]
    fn pair_deltas_outside_bounds_emit_nothing() {
        let anchor = peak_at(0, 10, 0.0);
        let too_close = peak_at(0, 20, 0.005);
        let too_far = peak_at(700, 20, 16.0);
        assert_eq!(create_address(&anchor, &too_close), None);
        assert_eq!(create_address(&anchor, &too_far), None);
        let in_range = peak_at(5, 20, 1.5);
        let hash = create_address(&anchor, &in_range).unwrap();
        assert_eq!(unpack_address(hash), (10, 20, 1_500));
    }

    #[test]
    fn hash_output_is_independent_of_sample_rate_given_fixed_peaks() {
        let peaks = vec![
            peak_at(0, 10, 0.0),
            peak_at(2, 30, 0.046),
            peak_at(9, 70, 0.209),
            peak_at(30, 120, 0.696),
        ];
        let a = fingerprint_peaks(&peaks, "song");
        let b = fingerprint_peaks(&peaks, "song");
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn rejected_targets_do_not_consume_fan_out_budget() {
        // One anchor, six targets too close to pair, then six valid ones.
        let mut peaks = vec![peak_at(0, 10, 0.0)];
        for i in 0..6 {
            peaks.push(peak_at(0, 20 + i, 0.001));
        }
        for i in 0..6 {
            peaks.push(peak_at(10 + i, 100 + i, 0.25 + i as f32 * 0.05));
        }
        let fingerprints = fingerprint_peaks(&peaks, "s");
        let from_first_anchor = fingerprints
            .values()
            .flatten()
            .filter(|c| c.anchor_time_ms == 0)
            .count();
        assert_eq!(from_first_anchor, 6);
    }

    #[test]
    fn fan_out_stops_after_six_accepted_pairs() {
        let mut peaks = vec![peak_at(0, 10, 0.0)];
        for i in 0..10 {
            peaks.push(peak_at(10 + i, 50 + i, 0.25 + i as f32 * 0.05));
        }
        let fingerprints = fingerprint_peaks(&peaks, "s");
        let from_first_anchor = fingerprints
            .values()
            .flatten()
            .filter(|c| c.anchor_time_ms == 0)
            .count();
        assert_eq!(from_first_anchor, 6);
    }

    #[test]
    fn query_map_keeps_the_first_anchor_for_duplicate_addresses() {
        // Two anchors produce the same (freq, freq, delta) signature.
        let peaks = vec![
            peak_at(0, 10, 0.0),
            peak_at(4, 20, 0.1),
            peak_at(100, 10, 2.5),
            peak_at(104, 20, 2.6),
        ];
        let hashes = query_hashes(&peaks);
        let duplicated = pack_address(10, 20, 100).unwrap();
        assert_eq!(hashes.get(&duplicated), Some(&0));
    }

    #[test]
    fn wire_validation_rejects_equal_frequencies_and_bad_deltas() {
        assert!(!is_valid_wire_hash(pack_address(100, 100, 500).unwrap()));
        assert!(!is_valid_wire_hash(0));
        assert!(!is_valid_wire_hash((1 << 23) | (2 << 14) | 5));
        assert!(!is_valid_wire_hash((1 << 23) | (2 << 14) | 15_500));
        assert!(is_valid_wire_hash(pack_address(100, 200, 1_500).unwrap()));
    }

    #[test]
    fn ingest_couples_carry_rounded_anchor_times() {
        let peaks = vec![peak_at(43, 10, 0.9984), peak_at(50, 20, 1.1609)];
        let fingerprints = fingerprint_peaks(&peaks, "abc");
        let couples: Vec<&Couple> = fingerprints.values().flatten().collect();
        assert_eq!(couples.len(), 1);
        assert_eq!(couples[0].song_id, "abc");
        assert_eq!(couples[0].anchor_time_ms, 998);
    }
}
