use crate::geo::{distance_km, LatLon};
use crate::pool::Target;
use serde::{Deserialize, Serialize};

/// Points available for a guess on the exact spot
pub const MAX_DISTANCE_POINTS: u32 = 100;

/// Points per second left on the round clock
pub const POINTS_PER_SECOND: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub distance_km: f64,
    pub distance_points: u32,
    pub time_points: u32,
    pub round_score: u32,
}

impl RoundResult {
    /// Result of a round that ended without a guess
    pub fn missed() -> Self {
        Self {
            distance_km: f64::INFINITY,
            distance_points: 0,
            time_points: 0,
            round_score: 0,
        }
    }

    pub fn was_guessed(&self) -> bool {
        self.distance_km.is_finite()
    }
}

/// One point lost per 100 m, never below zero
pub fn distance_points(distance_km: f64) -> u32 {
    if !distance_km.is_finite() {
        return 0;
    }
    let points = MAX_DISTANCE_POINTS as f64 - (distance_km * 10.0).floor();
    points.clamp(0.0, MAX_DISTANCE_POINTS as f64) as u32
}

pub fn time_points(secs_remaining: u32) -> u32 {
    secs_remaining.saturating_mul(POINTS_PER_SECOND)
}

pub fn score_round(target: &Target, guess: Option<LatLon>, secs_remaining: u32) -> RoundResult {
    match guess {
        Some(guess) => {
            let distance_km = distance_km(target.location, guess);
            let distance_points = distance_points(distance_km);
            let time_points = time_points(secs_remaining);
            RoundResult {
                distance_km,
                distance_points,
                time_points,
                round_score: distance_points.saturating_add(time_points),
            }
        }
        None => RoundResult::missed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_points_close_to_target() {
        assert_eq!(distance_points(0.0), 100);
        assert_eq!(distance_points(0.05), 100);
        assert_eq!(distance_points(0.0999), 100);
    }

    #[test]
    fn test_points_drop_per_100m() {
        assert_eq!(distance_points(0.1), 99);
        assert_eq!(distance_points(0.55), 95);
        assert_eq!(distance_points(5.0), 50);
        assert_eq!(distance_points(9.95), 1);
    }

    #[test]
    fn test_no_points_from_10km() {
        assert_eq!(distance_points(10.0), 0);
        assert_eq!(distance_points(42.0), 0);
        assert_eq!(distance_points(f64::INFINITY), 0);
        assert_eq!(distance_points(f64::NAN), 0);
    }

    #[test]
    fn test_distance_points_non_increasing() {
        let mut previous = distance_points(0.0);
        for step in 1..=1200 {
            let points = distance_points(step as f64 * 0.01);
            assert!(points <= previous, "points rose at {step}");
            previous = points;
        }
    }

    #[test]
    fn test_time_points() {
        assert_eq!(time_points(30), 60);
        assert_eq!(time_points(0), 0);
    }

    #[test]
    fn test_time_points_saturate_on_huge_clock() {
        assert_eq!(time_points(3_000_000_000), u32::MAX);

        let target = Target::new("Aurakatu", LatLon::new(60.4518, 22.2666));
        let result = score_round(&target, Some(target.location), u32::MAX);
        assert_eq!(result.time_points, u32::MAX);
        assert_eq!(result.round_score, u32::MAX);
    }

    #[test]
    fn test_score_round_on_target() {
        let target = Target::new("Aurakatu", LatLon::new(60.4518, 22.2666));
        let result = score_round(&target, Some(target.location), 30);
        assert_eq!(result.distance_km, 0.0);
        assert_eq!(result.distance_points, 100);
        assert_eq!(result.time_points, 60);
        assert_eq!(result.round_score, 160);
        assert!(result.was_guessed());
    }

    #[test]
    fn test_score_round_without_guess() {
        let target = Target::new("Aurakatu", LatLon::new(60.4518, 22.2666));
        let result = score_round(&target, None, 12);
        assert_eq!(result, RoundResult::missed());
        assert!(!result.was_guessed());
    }
}
