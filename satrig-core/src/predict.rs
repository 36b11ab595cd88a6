//! Pass prediction: scans the orbit model for visibility windows and
//! refines their boundaries by bisection.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

use crate::orbit::{EphemerisError, NoradId, OrbitModel, SatElements};

const MAX_BISECT_ITERATIONS: u32 = 32;

/// One visibility window of a satellite over the station.
///
/// `aos <= tca <= los` always; the ordering is strict unless the matching
/// `clipped_*` flag marks a boundary truncated by the search window.
#[derive(Debug, Clone, Serialize)]
pub struct PassWindow {
    pub norad_id: NoradId,
    pub satellite: String,
    /// Acquisition of signal, the rise time.
    pub aos: DateTime<Utc>,
    /// Time of closest approach, the culmination.
    pub tca: DateTime<Utc>,
    /// Loss of signal, the set time.
    pub los: DateTime<Utc>,
    pub max_elevation_deg: f64,
    pub aos_azimuth_deg: f64,
    pub tca_azimuth_deg: f64,
    pub los_azimuth_deg: f64,
    /// The pass was already in progress when the search window opened.
    pub clipped_aos: bool,
    /// The pass was still in progress when the search window closed.
    pub clipped_los: bool,
}

impl PassWindow {
    pub fn duration(&self) -> Duration {
        self.los - self.aos
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.aos && at <= self.los
    }
}

/// Visibility search over an [`OrbitModel`].
///
/// Sampling walks the window at a fixed step, so passes shorter than one
/// step can be missed; LEO passes run minutes, the default 30 s step does
/// not skip them.
#[derive(Debug, Clone)]
pub struct PassPredictor {
    model: OrbitModel,
    step: Duration,
    boundary_tolerance: Duration,
}

impl PassPredictor {
    pub fn new(model: OrbitModel) -> Self {
        Self {
            model,
            step: Duration::seconds(30),
            boundary_tolerance: Duration::seconds(1),
        }
    }

    /// Replace the default 30 s sampling step.
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = clamp_step(step);
        self
    }

    pub fn model(&self) -> &OrbitModel {
        &self.model
    }

    /// All passes of `sat` between `start` and `end`, in chronological
    /// order. An empty result is a normal outcome.
    pub fn find_passes(
        &self,
        sat: &SatElements,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<PassWindow>, EphemerisError> {
        let step = clamp_step(step);
        let raw = scan_passes(
            |t| self.model.state_at(sat, t).map(|sv| sv.elevation_deg),
            start,
            end,
            step,
            self.boundary_tolerance,
        )?;
        raw.into_iter()
            .map(|r| {
                Ok(PassWindow {
                    norad_id: sat.norad_id(),
                    satellite: sat.name().to_string(),
                    aos: r.aos,
                    tca: r.tca,
                    los: r.los,
                    max_elevation_deg: r.max_elevation_deg,
                    aos_azimuth_deg: self.model.state_at(sat, r.aos)?.azimuth_deg,
                    tca_azimuth_deg: self.model.state_at(sat, r.tca)?.azimuth_deg,
                    los_azimuth_deg: self.model.state_at(sat, r.los)?.azimuth_deg,
                    clipped_aos: r.clipped_aos,
                    clipped_los: r.clipped_los,
                })
            })
            .collect()
    }

    /// First pass of `sat` at or after `from`, looking `horizon` ahead
    /// with the predictor's own step. A pass already in progress at
    /// `from` is returned clipped.
    pub fn next_pass(
        &self,
        sat: &SatElements,
        from: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<Option<PassWindow>, EphemerisError> {
        Ok(self
            .find_passes(sat, from, from + horizon, self.step)?
            .into_iter()
            .next())
    }
}

fn clamp_step(step: Duration) -> Duration {
    let min = Duration::seconds(1);
    if step < min {
        warn!(step_ms = step.num_milliseconds(), "scan step clamped to 1s");
        min
    } else {
        step
    }
}

struct RawPass {
    aos: DateTime<Utc>,
    tca: DateTime<Utc>,
    los: DateTime<Utc>,
    max_elevation_deg: f64,
    clipped_aos: bool,
    clipped_los: bool,
}

struct ActivePass {
    aos: DateTime<Utc>,
    clipped_aos: bool,
    peak_at: DateTime<Utc>,
    peak_el: f64,
}

/// Walk `[start, end]` at `step` looking for sign changes of the sampled
/// elevation, refining each crossing by bisection. A sample of exactly
/// zero counts as below the horizon.
fn scan_passes<E>(
    mut elevation_at: E,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    tolerance: Duration,
) -> Result<Vec<RawPass>, EphemerisError>
where
    E: FnMut(DateTime<Utc>) -> Result<f64, EphemerisError>,
{
    let mut passes = Vec::new();
    if end <= start {
        return Ok(passes);
    }

    let mut active: Option<ActivePass> = None;
    let mut prev: Option<(DateTime<Utc>, f64)> = None;
    let mut t = start;
    loop {
        let el = elevation_at(t)?;
        if el > 0.0 {
            if let Some(a) = active.as_mut() {
                if el > a.peak_el {
                    a.peak_el = el;
                    a.peak_at = t;
                }
            } else {
                let (aos, clipped_aos) = match prev {
                    None => (t, true),
                    Some((pt, pel)) if pel <= 0.0 => {
                        (bisect(&mut elevation_at, pt, t, true, tolerance)?, false)
                    }
                    Some(_) => (t, false),
                };
                active = Some(ActivePass {
                    aos,
                    clipped_aos,
                    peak_at: t,
                    peak_el: el,
                });
            }
        } else if let Some(a) = active.take() {
            let los = match prev {
                Some((pt, _)) => bisect(&mut elevation_at, pt, t, false, tolerance)?,
                None => t,
            };
            passes.push(finish_pass(&mut elevation_at, a, los, false, step)?);
        }
        prev = Some((t, el));
        if t >= end {
            break;
        }
        t = (t + step).min(end);
    }

    if let Some(a) = active.take() {
        passes.push(finish_pass(&mut elevation_at, a, end, true, step)?);
    }
    Ok(passes)
}

fn finish_pass<E>(
    elevation_at: &mut E,
    a: ActivePass,
    los: DateTime<Utc>,
    clipped_los: bool,
    step: Duration,
) -> Result<RawPass, EphemerisError>
where
    E: FnMut(DateTime<Utc>) -> Result<f64, EphemerisError>,
{
    let (tca, max_elevation_deg) = refine_peak(elevation_at, a.aos, los, a.peak_at, a.peak_el, step)?;
    Ok(RawPass {
        aos: a.aos,
        tca,
        los,
        max_elevation_deg,
        clipped_aos: a.clipped_aos,
        clipped_los,
    })
}

/// Fit a parabola through the peak sample and its neighbours and move the
/// culmination to its vertex. Falls back to the raw sample when the pass
/// is too short to have both neighbours.
fn refine_peak<E>(
    elevation_at: &mut E,
    aos: DateTime<Utc>,
    los: DateTime<Utc>,
    peak_at: DateTime<Utc>,
    peak_el: f64,
    step: Duration,
) -> Result<(DateTime<Utc>, f64), EphemerisError>
where
    E: FnMut(DateTime<Utc>) -> Result<f64, EphemerisError>,
{
    let before = peak_at - step;
    let after = peak_at + step;
    if before <= aos || after >= los {
        return Ok((peak_at, peak_el));
    }

    let e1 = elevation_at(before)?;
    let e3 = elevation_at(after)?;
    let denom = e1 - 2.0 * peak_el + e3;
    if denom.abs() < 1e-12 {
        return Ok((peak_at, peak_el));
    }
    // vertex offset in units of step, in (-1, 1) when the middle sample
    // really is the largest
    let offset = 0.5 * (e1 - e3) / denom;
    let shift = Duration::milliseconds((step.num_milliseconds() as f64 * offset).round() as i64);
    let mut tca = peak_at + shift;
    if tca <= aos || tca >= los {
        tca = peak_at;
    }
    let max_el = elevation_at(tca)?.max(peak_el);
    Ok((tca, max_el))
}

/// Narrow a horizon crossing bracketed by `lo` and `hi` down to
/// `tolerance`, returning the bracket midpoint.
fn bisect<E>(
    elevation_at: &mut E,
    mut lo: DateTime<Utc>,
    mut hi: DateTime<Utc>,
    rising: bool,
    tolerance: Duration,
) -> Result<DateTime<Utc>, EphemerisError>
where
    E: FnMut(DateTime<Utc>) -> Result<f64, EphemerisError>,
{
    for _ in 0..MAX_BISECT_ITERATIONS {
        if hi - lo <= tolerance {
            break;
        }
        let mid = lo + (hi - lo) / 2;
        let above = elevation_at(mid)? > 0.0;
        if above == rising {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Ok(lo + (hi - lo) / 2)
}
