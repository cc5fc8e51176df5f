// cs-core/src/units.rs

use uom::si::f64::{
    Angle as UomAngle, AngularVelocity as UomAngularVelocity, Ratio as UomRatio, Time as UomTime,
};

// Public canonical unit types (SI, f64)
pub type Angle = UomAngle;
pub type AngularVelocity = UomAngularVelocity;
pub type Ratio = UomRatio;
pub type Time = UomTime;

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

#[inline]
pub fn deg(v: f64) -> Angle {
    use uom::si::angle::degree;
    Angle::new::<degree>(v)
}

#[inline]
pub fn rpm(v: f64) -> AngularVelocity {
    use uom::si::angular_velocity::revolution_per_minute;
    AngularVelocity::new::<revolution_per_minute>(v)
}

#[inline]
pub fn percent(v: f64) -> Ratio {
    use uom::si::ratio::percent;
    Ratio::new::<percent>(v)
}

#[inline]
pub fn to_rpm(w: AngularVelocity) -> f64 {
    use uom::si::angular_velocity::revolution_per_minute;
    w.get::<revolution_per_minute>()
}

#[inline]
pub fn to_deg_per_s(w: AngularVelocity) -> f64 {
    use uom::si::angular_velocity::degree_per_second;
    w.get::<degree_per_second>()
}

#[inline]
pub fn to_seconds(t: Time) -> f64 {
    use uom::si::time::second;
    t.get::<second>()
}

#[inline]
pub fn to_degrees(a: Angle) -> f64 {
    use uom::si::angle::degree;
    a.get::<degree>()
}

#[inline]
pub fn to_percent(r: Ratio) -> f64 {
    use uom::si::ratio::percent;
    r.get::<percent>()
}

pub mod constants {
    /// Crank degrees in one four-stroke engine cycle.
    pub const DEG_PER_CYCLE: f64 = 720.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_smoke() {
        let _t = s(0.1);
        let _a = deg(90.0);
        let _w = rpm(3000.0);
        let _r = percent(50.0);
    }

    #[test]
    fn rpm_to_degrees_per_second() {
        // 1 rev/min = 360 deg / 60 s = 6 deg/s
        assert!((to_deg_per_s(rpm(1.0)) - 6.0).abs() < 1e-9);
        assert!((to_rpm(rpm(3000.0)) - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn percent_round_trip() {
        assert!((to_percent(percent(42.5)) - 42.5).abs() < 1e-12);
    }
}
