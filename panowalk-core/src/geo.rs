//! Geodesy and relative-direction math
//!
//! Distances are straight-line Haversine metres. Direction labels follow
//! the benchmark's fixed vocabulary: the four cardinals are exact angles,
//! everything in between is a quadrant word plus an integer degree offset.

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Straight-line distance in metres between two WGS84 coordinates.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Normalize any angle into `[0, 360)`.
pub fn normalize_heading(deg: f64) -> f64 {
    let r = deg % 360.0;
    if r < 0.0 {
        r + 360.0
    } else {
        r
    }
}

/// Clockwise angle from the agent's heading to a link's heading, in
/// `[0, 360)`.
pub fn relative_angle(link_heading: f64, agent_heading: f64) -> f64 {
    normalize_heading(link_heading - agent_heading)
}

/// Convert a relative angle into the human-readable direction label.
///
/// The cardinal words appear only at exactly 0/90/180/270; open intervals
/// get a quadrant word with the offset printed as an integer degree
/// (rounded half away from zero).
pub fn direction_label(relative: f64) -> String {
    let delta = normalize_heading(relative);

    if delta == 0.0 {
        return "front".to_string();
    }
    if delta == 90.0 {
        return "right".to_string();
    }
    if delta == 180.0 {
        return "back".to_string();
    }
    if delta == 270.0 {
        return "left".to_string();
    }

    // f64::round rounds half away from zero, which is the convention here.
    if delta < 90.0 {
        format!("front-right {}°", delta.round() as i64)
    } else if delta < 180.0 {
        format!("right-back {}°", (delta - 90.0).round() as i64)
    } else if delta < 270.0 {
        format!("left-back {}°", (270.0 - delta).round() as i64)
    } else {
        format!("front-left {}°", (360.0 - delta).round() as i64)
    }
}

/// Label for a link as seen from the agent's current heading.
pub fn relative_direction(link_heading: f64, agent_heading: f64) -> String {
    direction_label(relative_angle(link_heading, agent_heading))
}
