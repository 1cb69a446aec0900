//! Easing curves
//!
//! Named shaping curves that map normalized time to a blend coefficient.
//! Every variant pins `apply(0.0) == 0.0` and `apply(1.0) == 1.0`.

use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::curve::Curve;

/// Built-in easing curve
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    EaseInQuart,
    EaseOutQuart,
    EaseInOutQuart,
    EaseInSine,
    EaseOutSine,
    EaseInOutSine,
    EaseInExpo,
    EaseOutExpo,
    EaseInOutExpo,
    /// CSS-style cubic bezier with control points (x1, y1) and (x2, y2)
    CubicBezier(f32, f32, f32, f32),
}

/// Names accepted by [`Easing::from_str`], in declaration order.
pub const EASING_NAMES: &[&str] = &[
    "linear",
    "ease-in-quad",
    "ease-out-quad",
    "ease-in-out-quad",
    "ease-in-cubic",
    "ease-out-cubic",
    "ease-in-out-cubic",
    "ease-in-quart",
    "ease-out-quart",
    "ease-in-out-quart",
    "ease-in-sine",
    "ease-out-sine",
    "ease-in-out-sine",
    "ease-in-expo",
    "ease-out-expo",
    "ease-in-out-expo",
];

impl Easing {
    /// Shorthand for the CSS `ease` timing function
    pub const EASE: Easing = Easing::CubicBezier(0.25, 0.1, 0.25, 1.0);

    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f32) -> f32 {
        match *self {
            Easing::Linear => t,
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOutQuad => in_out(t, 2),
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOutCubic => in_out(t, 3),
            Easing::EaseInQuart => t.powi(4),
            Easing::EaseOutQuart => 1.0 - (1.0 - t).powi(4),
            Easing::EaseInOutQuart => in_out(t, 4),
            Easing::EaseInSine => 1.0 - (t * PI / 2.0).cos(),
            Easing::EaseOutSine => (t * PI / 2.0).sin(),
            Easing::EaseInOutSine => -((PI * t).cos() - 1.0) / 2.0,
            Easing::EaseInExpo => {
                if t <= 0.0 {
                    0.0
                } else {
                    2f32.powf(10.0 * t - 10.0)
                }
            }
            Easing::EaseOutExpo => {
                if t >= 1.0 {
                    1.0
                } else {
                    1.0 - 2f32.powf(-10.0 * t)
                }
            }
            Easing::EaseInOutExpo => {
                if t <= 0.0 {
                    0.0
                } else if t >= 1.0 {
                    1.0
                } else if t < 0.5 {
                    2f32.powf(20.0 * t - 10.0) / 2.0
                } else {
                    (2.0 - 2f32.powf(-20.0 * t + 10.0)) / 2.0
                }
            }
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier_ease(t, x1, y1, x2, y2),
        }
    }
}

/// Symmetric polynomial in-out of the given order.
fn in_out(t: f32, order: i32) -> f32 {
    if t < 0.5 {
        2f32.powi(order - 1) * t.powi(order)
    } else {
        1.0 - (-2.0 * t + 2.0).powi(order) / 2.0
    }
}

impl Curve for Easing {
    fn evaluate(&self, t: f32) -> f32 {
        self.apply(t)
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Easing::Linear => "linear",
            Easing::EaseInQuad => "ease-in-quad",
            Easing::EaseOutQuad => "ease-out-quad",
            Easing::EaseInOutQuad => "ease-in-out-quad",
            Easing::EaseInCubic => "ease-in-cubic",
            Easing::EaseOutCubic => "ease-out-cubic",
            Easing::EaseInOutCubic => "ease-in-out-cubic",
            Easing::EaseInQuart => "ease-in-quart",
            Easing::EaseOutQuart => "ease-out-quart",
            Easing::EaseInOutQuart => "ease-in-out-quart",
            Easing::EaseInSine => "ease-in-sine",
            Easing::EaseOutSine => "ease-out-sine",
            Easing::EaseInOutSine => "ease-in-out-sine",
            Easing::EaseInExpo => "ease-in-expo",
            Easing::EaseOutExpo => "ease-out-expo",
            Easing::EaseInOutExpo => "ease-in-out-expo",
            Easing::CubicBezier(x1, y1, x2, y2) => {
                return write!(f, "cubic-bezier({x1}, {y1}, {x2}, {y2})");
            }
        };
        f.write_str(name)
    }
}

/// Error returned when a curve name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown easing curve `{0}`")]
pub struct UnknownEasing(pub String);

impl FromStr for Easing {
    type Err = UnknownEasing;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let easing = match name {
            "linear" => Easing::Linear,
            "ease" => Easing::EASE,
            "ease-in-quad" => Easing::EaseInQuad,
            "ease-out-quad" => Easing::EaseOutQuad,
            "ease-in-out-quad" => Easing::EaseInOutQuad,
            "ease-in-cubic" => Easing::EaseInCubic,
            "ease-out-cubic" => Easing::EaseOutCubic,
            "ease-in-out-cubic" => Easing::EaseInOutCubic,
            "ease-in-quart" => Easing::EaseInQuart,
            "ease-out-quart" => Easing::EaseOutQuart,
            "ease-in-out-quart" => Easing::EaseInOutQuart,
            "ease-in-sine" => Easing::EaseInSine,
            "ease-out-sine" => Easing::EaseOutSine,
            "ease-in-out-sine" => Easing::EaseInOutSine,
            "ease-in-expo" => Easing::EaseInExpo,
            "ease-out-expo" => Easing::EaseOutExpo,
            "ease-in-out-expo" => Easing::EaseInOutExpo,
            _ => return parse_cubic_bezier(name).ok_or_else(|| UnknownEasing(s.to_string())),
        };
        Ok(easing)
    }
}

/// Parses `cubic-bezier(x1, y1, x2, y2)`.
fn parse_cubic_bezier(s: &str) -> Option<Easing> {
    let args = s.strip_prefix("cubic-bezier(")?.strip_suffix(')')?;
    let mut points = args.split(',').map(|p| p.trim().parse::<f32>());
    let mut next = || points.next()?.ok();
    let (x1, y1, x2, y2) = (next()?, next()?, next()?, next()?);
    if points.next().is_some() {
        return None;
    }
    Some(Easing::CubicBezier(x1, y1, x2, y2))
}

/// Cubic bezier easing (CSS semantics).
///
/// Inverts x(p) = t with Newton-Raphson, falling back to bisection when the
/// slope flattens out, then samples y(p). Runs in f64 so long cycles sampled
/// at high rates stay smooth.
fn cubic_bezier_ease(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    let target = f64::from(t);
    let (x1, y1, x2, y2) = (
        f64::from(x1),
        f64::from(y1),
        f64::from(x2),
        f64::from(y2),
    );

    let p = solve_newton(target, x1, x2).unwrap_or_else(|| solve_bisect(target, x1, x2));
    bezier_sample(p, y1, y2) as f32
}

fn solve_newton(target: f64, x1: f64, x2: f64) -> Option<f64> {
    let mut p = target;
    for _ in 0..8 {
        let err = bezier_sample(p, x1, x2) - target;
        if err.abs() < 1e-7 {
            return Some(p);
        }
        let slope = bezier_slope(p, x1, x2);
        if slope.abs() < 1e-7 {
            return None;
        }
        p -= err / slope;
    }
    None
}

fn solve_bisect(target: f64, x1: f64, x2: f64) -> f64 {
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    let mut p = target;
    for _ in 0..30 {
        let x = bezier_sample(p, x1, x2);
        if (x - target).abs() < 1e-7 {
            break;
        }
        if x < target {
            lo = p;
        } else {
            hi = p;
        }
        p = (lo + hi) * 0.5;
    }
    p
}

/// One bezier coordinate at parameter `p`, endpoints fixed at 0 and 1.
#[inline]
fn bezier_sample(p: f64, c1: f64, c2: f64) -> f64 {
    let a = 1.0 - 3.0 * c2 + 3.0 * c1;
    let b = 3.0 * c2 - 6.0 * c1;
    let c = 3.0 * c1;
    ((a * p + b) * p + c) * p
}

#[inline]
fn bezier_slope(p: f64, c1: f64, c2: f64) -> f64 {
    let a = 1.0 - 3.0 * c2 + 3.0 * c1;
    let b = 3.0 * c2 - 6.0 * c1;
    let c = 3.0 * c1;
    (3.0 * a * p + 2.0 * b) * p + c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_named() -> Vec<Easing> {
        EASING_NAMES.iter().map(|n| n.parse().unwrap()).collect()
    }

    #[test]
    fn test_endpoints_are_pinned() {
        let mut curves = all_named();
        curves.push(Easing::EASE);
        curves.push(Easing::CubicBezier(0.68, -0.6, 0.32, 1.6));
        for easing in curves {
            assert!(easing.apply(0.0).abs() < 1e-5, "{easing} at 0");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-5, "{easing} at 1");
        }
    }

    #[test]
    fn test_in_out_is_symmetric_at_midpoint() {
        for easing in [
            Easing::EaseInOutQuad,
            Easing::EaseInOutCubic,
            Easing::EaseInOutQuart,
            Easing::EaseInOutSine,
            Easing::EaseInOutExpo,
        ] {
            assert!((easing.apply(0.5) - 0.5).abs() < 1e-5, "{easing}");
        }
    }

    #[test]
    fn test_linear_bezier_matches_identity() {
        let easing = Easing::CubicBezier(0.0, 0.0, 1.0, 1.0);
        for i in 1..10 {
            let t = i as f32 / 10.0;
            assert!((easing.apply(t) - t).abs() < 1e-4);
        }
    }

    #[test]
    fn test_bezier_overshoot_is_preserved() {
        let back = Easing::CubicBezier(0.34, 1.56, 0.64, 1.0);
        let peak = (1..100)
            .map(|i| back.apply(i as f32 / 100.0))
            .fold(f32::MIN, f32::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn test_names_round_trip_through_display() {
        for easing in all_named() {
            assert_eq!(easing.to_string().parse::<Easing>().unwrap(), easing);
        }
    }

    #[test]
    fn test_parse_cubic_bezier() {
        assert_eq!(
            "cubic-bezier(0.1, 0.2, 0.3, 0.4)".parse::<Easing>().unwrap(),
            Easing::CubicBezier(0.1, 0.2, 0.3, 0.4)
        );
        assert!("cubic-bezier(0.1, 0.2, 0.3)".parse::<Easing>().is_err());
        assert_eq!(
            "bounce".parse::<Easing>(),
            Err(UnknownEasing("bounce".to_string()))
        );
    }
}
