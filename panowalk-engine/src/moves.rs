//! Legal move computation
//!
//! The neighbour list for (panorama, geofence): links whose target is in
//! the whitelist, duplicate targets collapsed (first wins), ordered by
//! absolute heading ascending so ids are stable for identical state.
//! Virtual links are legal moves like native ones.

use std::collections::{HashMap, HashSet};

use panowalk_core::{haversine_meters, relative_direction, AvailableMove, PanoId, PanoMetadata};

/// Compute the moves offered to the agent at its current pose.
///
/// `locations` supplies target coordinates for distance labelling; targets
/// without a known location fall back to the link's own recorded distance,
/// if any.
pub fn available_moves(
    meta: &PanoMetadata,
    fence: &HashSet<PanoId>,
    agent_heading: f64,
    current_location: Option<(f64, f64)>,
    locations: &HashMap<PanoId, (f64, f64)>,
) -> Vec<AvailableMove> {
    let mut seen = HashSet::new();
    let mut legal: Vec<_> = meta
        .links
        .iter()
        .filter(|link| fence.contains(&link.pano_id))
        .filter(|link| seen.insert(link.pano_id.clone()))
        .collect();

    legal.sort_by(|a, b| {
        a.heading
            .partial_cmp(&b.heading)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    legal
        .into_iter()
        .enumerate()
        .map(|(idx, link)| {
            let distance = match (current_location, locations.get(&link.pano_id)) {
                (Some((lat1, lng1)), Some((lat2, lng2))) => {
                    Some(round_tenth(haversine_meters(lat1, lng1, *lat2, *lng2)))
                }
                _ => link.distance_meters,
            };
            AvailableMove {
                id: idx as u32 + 1,
                pano_id: link.pano_id.clone(),
                direction: relative_direction(link.heading, agent_heading),
                distance,
                heading: link.heading,
                is_virtual: link.is_virtual,
            }
        })
        .collect()
}

fn round_tenth(meters: f64) -> f64 {
    (meters * 10.0).round() / 10.0
}
