//! The tracking control loop: one beat per tick, operator commands in
//! between, and the rig never left on a stale frequency for longer than
//! one tick period.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::session::{ArmedSatellite, LinkHealth, TrackingSession, TrackingState, TrackingStatus};
use crate::clock::Clock;
use crate::doppler::{DopplerEngine, DopplerResult, snap_to_step};
use crate::orbit::SatElements;
use crate::predict::{PassPredictor, PassWindow};
use crate::radio::{RadioControl, RadioError, RadioStatus};
use crate::station::{ConfigurationError, Link};

/// Per-link command shaping.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkTuning {
    /// Tuning grid of the rig, Hz. Zero disables the grid.
    pub step_hz: u64,
    /// Remainders below this round down onto the grid, the rest round up.
    pub threshold_hz: u64,
}

/// Controller parameters. `Default` gives the values used on the bench:
/// 1 s ticks, 750 ms radio deadline, 10 Hz minimum retune.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub tick_interval: Duration,
    /// Deadline for a single radio round trip. Keep it under the tick
    /// interval or a dead rig will stall the beat.
    pub radio_timeout: Duration,
    /// Smallest frequency change worth a command when no grid is set.
    pub min_step_hz: u64,
    /// Consecutive command failures before the link reports degraded.
    pub max_consecutive_failures: u32,
    /// How far ahead the controller looks for the next pass.
    pub pass_horizon: Duration,
    pub uplink_tuning: LinkTuning,
    pub downlink_tuning: LinkTuning,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            radio_timeout: Duration::from_millis(750),
            min_step_hz: 10,
            max_consecutive_failures: 5,
            pass_horizon: Duration::from_secs(24 * 3600),
            uplink_tuning: LinkTuning::default(),
            downlink_tuning: LinkTuning::default(),
        }
    }
}

impl TrackingConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigurationError::ZeroTickInterval);
        }
        if self.radio_timeout.is_zero() {
            return Err(ConfigurationError::ZeroRadioTimeout);
        }
        for (link, tuning) in [
            (Link::Uplink, self.uplink_tuning),
            (Link::Downlink, self.downlink_tuning),
        ] {
            if tuning.step_hz > 0 && tuning.threshold_hz > tuning.step_hz {
                return Err(ConfigurationError::InvalidTuning {
                    link,
                    step_hz: tuning.step_hz,
                    threshold_hz: tuning.threshold_hz,
                });
            }
        }
        Ok(())
    }
}

/// Operator-side commands, delivered over the controller's channel and
/// applied between ticks.
#[derive(Debug, Clone)]
pub enum OperatorCommand {
    /// Designate a satellite. Tracking starts on its own when the next
    /// pass opens. Re-arming while a session runs closes that session.
    Arm(Arc<SatElements>),
    /// Drop the armed satellite and any active session.
    Disarm,
    /// Keep the session alive but stop sending rig commands.
    Pause,
    Resume,
    /// End the active session. The satellite stays armed and the
    /// controller schedules its next pass, skipping the rest of this one.
    Cancel,
}

struct Armed {
    sat: Arc<SatElements>,
    window: Option<PassWindow>,
    /// Floor for the next pass search, set by cancel.
    not_before: Option<DateTime<Utc>>,
    /// Backoff marker after an empty or failed search.
    retry_after: Option<DateTime<Utc>>,
}

/// Drives one radio through the passes of one armed satellite.
///
/// Single-writer by construction: the controller owns the radio and is
/// itself owned by the loop task, so no frequency command can race
/// another. Everyone else watches the published [`TrackingStatus`].
pub struct TrackingController<R, C> {
    predictor: PassPredictor,
    engine: DopplerEngine,
    radio: R,
    clock: C,
    cfg: TrackingConfig,
    state: TrackingState,
    session: Option<TrackingSession>,
    armed: Option<Armed>,
    consecutive_failures: u32,
    link_health: LinkHealth,
    status_tx: watch::Sender<TrackingStatus>,
}

impl<R: RadioControl, C: Clock> TrackingController<R, C> {
    pub fn new(
        predictor: PassPredictor,
        engine: DopplerEngine,
        radio: R,
        clock: C,
        cfg: TrackingConfig,
    ) -> Result<(Self, watch::Receiver<TrackingStatus>), ConfigurationError> {
        cfg.validate()?;
        let (status_tx, status_rx) = watch::channel(TrackingStatus::idle(clock.now()));
        Ok((
            Self {
                predictor,
                engine,
                radio,
                clock,
                cfg,
                state: TrackingState::Idle,
                session: None,
                armed: None,
                consecutive_failures: 0,
                link_health: LinkHealth::Ok,
                status_tx,
            },
            status_rx,
        ))
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn session(&self) -> Option<&TrackingSession> {
        self.session.as_ref()
    }

    pub fn link_health(&self) -> LinkHealth {
        self.link_health
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackingStatus> {
        self.status_tx.subscribe()
    }

    /// Run until the command channel closes. Commands queued at the same
    /// time as a tick win, so a cancel is observed within one tick and
    /// never interrupts a radio call already in flight.
    pub async fn run(mut self, mut commands: mpsc::Receiver<OperatorCommand>) {
        let mut ticker = tokio::time::interval(self.cfg.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(tick = ?self.cfg.tick_interval, "tracking controller started");
        loop {
            tokio::select! {
                biased;
                cmd = commands.recv() => {
                    match cmd {
                        Some(cmd) => self.apply_command(cmd),
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
        info!("tracking controller stopped");
    }

    /// Apply one operator command and publish the resulting status.
    pub fn apply_command(&mut self, cmd: OperatorCommand) {
        match cmd {
            OperatorCommand::Arm(sat) => {
                if self.session.is_some() {
                    self.close_session("retargeted");
                }
                info!(satellite = %sat.name(), norad_id = sat.norad_id(), "armed");
                self.armed = Some(Armed {
                    sat,
                    window: None,
                    not_before: None,
                    retry_after: None,
                });
            }
            OperatorCommand::Disarm => {
                if self.session.is_some() {
                    self.close_session("disarmed");
                }
                if self.armed.take().is_some() {
                    info!("disarmed");
                }
            }
            OperatorCommand::Pause => {
                if self.state == TrackingState::Tracking {
                    info!("tracking paused, rig commands suppressed");
                    self.state = TrackingState::Paused;
                }
            }
            OperatorCommand::Resume => {
                if self.state == TrackingState::Paused {
                    info!("tracking resumed");
                    self.state = TrackingState::Tracking;
                }
            }
            OperatorCommand::Cancel => {
                if let Some(s) = &self.session {
                    // reschedule past this window instead of re-entering
                    // it; the margin clears the bisected LOS boundary
                    let floor = s.window.los + chrono::Duration::seconds(1);
                    if let Some(a) = self.armed.as_mut() {
                        a.window = None;
                        a.not_before = Some(floor);
                        a.retry_after = None;
                    }
                }
                self.close_session("cancelled");
            }
        }
        self.publish(self.clock.now());
    }

    /// One beat of the loop.
    pub async fn tick(&mut self) {
        let now = self.clock.now();
        self.refresh_window(now);
        match self.state {
            TrackingState::Idle => self.tick_idle(now),
            TrackingState::Tracking | TrackingState::Paused => self.tick_active(now).await,
        }
        self.publish(now);
    }

    /// Keep the armed target's pass schedule current.
    fn refresh_window(&mut self, now: DateTime<Utc>) {
        let horizon = chrono::Duration::from_std(self.cfg.pass_horizon)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        let Some(armed) = self.armed.as_mut() else {
            return;
        };
        if armed.window.as_ref().is_some_and(|w| now <= w.los) {
            return;
        }
        if armed.retry_after.is_some_and(|t| now < t) {
            return;
        }
        let start = armed.not_before.map_or(now, |nb| nb.max(now));
        match self.predictor.next_pass(&armed.sat, start, horizon) {
            Ok(Some(w)) => {
                info!(
                    satellite = %armed.sat.name(),
                    aos = %w.aos,
                    los = %w.los,
                    max_elevation = format!("{:.1}", w.max_elevation_deg),
                    in_progress = w.clipped_aos,
                    "pass scheduled"
                );
                armed.window = Some(w);
                armed.not_before = None;
                armed.retry_after = None;
            }
            Ok(None) => {
                armed.window = None;
                armed.retry_after = Some(now + chrono::Duration::seconds(60));
                debug!(satellite = %armed.sat.name(), "no pass inside horizon");
            }
            Err(e) => {
                armed.retry_after = Some(now + chrono::Duration::seconds(5));
                warn!(error = %e, "pass search failed");
            }
        }
    }

    fn tick_idle(&mut self, now: DateTime<Utc>) {
        let Some(armed) = self.armed.as_ref() else {
            return;
        };
        let Some(window) = armed.window.as_ref() else {
            return;
        };
        if !window.contains(now) {
            return;
        }
        let session = TrackingSession::new(window.clone(), now);
        info!(
            session = %session.id,
            satellite = %session.satellite,
            los = %window.los,
            max_elevation = format!("{:.1}", window.max_elevation_deg),
            "pass open, tracking"
        );
        self.session = Some(session);
        self.state = TrackingState::Tracking;
        self.consecutive_failures = 0;
        self.link_health = LinkHealth::Ok;
    }

    async fn tick_active(&mut self, now: DateTime<Utc>) {
        let Some(sat) = self.armed.as_ref().map(|a| Arc::clone(&a.sat)) else {
            self.close_session("armed target lost");
            return;
        };
        let los = {
            let Some(session) = self.session.as_mut() else {
                self.state = TrackingState::Idle;
                return;
            };
            session.ticks += 1;
            session.last_update = Some(now);
            session.window.los
        };

        if now > los {
            self.close_session("scheduled LOS");
            return;
        }

        // Fresh sample every tick; a failing provider costs this tick only.
        let state = match self.predictor.model().state_at(&sat, now) {
            Ok(sv) => sv,
            Err(e) => {
                warn!(error = %e, "ephemeris query failed, tick skipped");
                return;
            }
        };
        if !state.elevation_deg.is_finite() || !state.range_rate_m_s.is_finite() {
            warn!(at = %now, "non-finite state vector, tick skipped");
            return;
        }

        // The model outranks the schedule on visibility.
        if state.elevation_deg < 0.0 {
            self.close_session("below horizon");
            return;
        }

        let doppler = self.engine.correct(&state);
        if let Some(session) = self.session.as_mut() {
            session.last_doppler = Some(doppler);
        }

        if self.state == TrackingState::Paused {
            debug!(
                elevation = format!("{:.1}", state.elevation_deg),
                downlink = doppler.downlink_hz,
                uplink = doppler.uplink_hz,
                "paused, holding"
            );
            return;
        }

        // Probe once per tick before tuning; a dead rig then costs one
        // timeout per tick instead of one per link.
        if let Err(e) = self.poll_radio().await {
            warn!(error = %e, "rig status poll failed");
            self.note_failure();
            return;
        }

        self.drive_link(Link::Downlink, &doppler).await;
        self.drive_link(Link::Uplink, &doppler).await;
    }

    async fn drive_link(&mut self, link: Link, doppler: &DopplerResult) {
        let hz = self.shaped_frequency(link, doppler);
        if !self.should_send(link, hz) {
            return;
        }
        match self.send_frequency(link, hz).await {
            Ok(()) => {
                debug!(%link, hz, "frequency applied");
                if let Some(session) = self.session.as_mut() {
                    session.set_applied(link, hz);
                    session.commands_sent += 1;
                }
                self.note_success();
            }
            Err(e) => {
                warn!(%link, hz, error = %e, "frequency command failed, retrying next tick");
                if let Some(session) = self.session.as_mut() {
                    session.command_failures += 1;
                }
                self.note_failure();
            }
        }
    }

    /// Doppler-corrected (or nominal, per the plan) frequency rounded
    /// onto the link's tuning grid.
    fn shaped_frequency(&self, link: Link, doppler: &DopplerResult) -> u64 {
        let plan = self.engine.plan();
        let hz = if plan.correction_enabled(link) {
            match link {
                Link::Uplink => doppler.uplink_hz,
                Link::Downlink => doppler.downlink_hz,
            }
        } else {
            plan.nominal(link)
        };
        let tuning = self.tuning(link);
        snap_to_step(hz.round() as u64, tuning.step_hz, tuning.threshold_hz)
    }

    fn tuning(&self, link: Link) -> LinkTuning {
        match link {
            Link::Uplink => self.cfg.uplink_tuning,
            Link::Downlink => self.cfg.downlink_tuning,
        }
    }

    /// A command goes out only when the shaped frequency moved: onto a
    /// different grid slot, or by at least `min_step_hz` without a grid.
    fn should_send(&self, link: Link, hz: u64) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        let Some(last) = session.applied(link) else {
            return true;
        };
        if self.tuning(link).step_hz > 0 {
            hz != last
        } else {
            hz.abs_diff(last) >= self.cfg.min_step_hz.max(1)
        }
    }

    async fn poll_radio(&mut self) -> Result<RadioStatus, RadioError> {
        match tokio::time::timeout(self.cfg.radio_timeout, self.radio.status()).await {
            Ok(result) => result,
            Err(_) => Err(RadioError::Timeout),
        }
    }

    async fn send_frequency(&mut self, link: Link, hz: u64) -> Result<(), RadioError> {
        match tokio::time::timeout(self.cfg.radio_timeout, self.radio.set_frequency(link, hz)).await
        {
            Ok(result) => result,
            Err(_) => Err(RadioError::Timeout),
        }
    }

    fn note_success(&mut self) {
        self.consecutive_failures = 0;
        if self.link_health == LinkHealth::Degraded {
            info!("rig link recovered");
            self.link_health = LinkHealth::Ok;
        }
    }

    fn note_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.link_health == LinkHealth::Ok
            && self.consecutive_failures >= self.cfg.max_consecutive_failures
        {
            warn!(
                failures = self.consecutive_failures,
                "rig link degraded, tracking continues"
            );
            self.link_health = LinkHealth::Degraded;
        }
    }

    fn close_session(&mut self, reason: &str) {
        if let Some(s) = self.session.take() {
            info!(
                session = %s.id,
                satellite = %s.satellite,
                reason,
                ticks = s.ticks,
                commands = s.commands_sent,
                failures = s.command_failures,
                "tracking session closed"
            );
        }
        self.state = TrackingState::Idle;
        self.consecutive_failures = 0;
        self.link_health = LinkHealth::Ok;
    }

    fn publish(&self, now: DateTime<Utc>) {
        let next_aos_in_s = self
            .armed
            .as_ref()
            .and_then(|a| a.window.as_ref())
            .filter(|w| w.aos > now)
            .map(|w| (w.aos - now).num_seconds());
        self.status_tx.send_replace(TrackingStatus {
            state: self.state,
            link_health: self.link_health,
            armed: self.armed.as_ref().map(|a| ArmedSatellite {
                norad_id: a.sat.norad_id(),
                name: a.sat.name().to_string(),
            }),
            session: self.session.clone(),
            next_aos_in_s,
            updated_at: now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::orbit::OrbitModel;
    use crate::orbit::testdata::iss;
    use crate::station::{FrequencyPlan, GroundStation};
    use chrono::TimeZone;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    #[derive(Clone, Default)]
    struct MockRadio {
        sent: Arc<Mutex<Vec<(Link, u64)>>>,
        fail_sets: Arc<AtomicBool>,
        gate: Option<Arc<Notify>>,
        gate_used: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl RadioControl for MockRadio {
        async fn set_frequency(&mut self, link: Link, hz: u64) -> Result<(), RadioError> {
            if let Some(gate) = &self.gate {
                if !self.gate_used.swap(true, Ordering::SeqCst) {
                    gate.notified().await;
                }
            }
            if self.fail_sets.load(Ordering::SeqCst) {
                return Err(RadioError::Rejected("simulated".into()));
            }
            self.sent.lock().unwrap().push((link, hz));
            Ok(())
        }

        async fn status(&mut self) -> Result<RadioStatus, RadioError> {
            let last = self.sent.lock().unwrap().last().map(|(_, hz)| *hz);
            Ok(RadioStatus { frequency_hz: last })
        }
    }

    /// Radio that never answers, to exercise the timeout path.
    struct StuckRadio;

    #[async_trait::async_trait]
    impl RadioControl for StuckRadio {
        async fn set_frequency(&mut self, _link: Link, _hz: u64) -> Result<(), RadioError> {
            std::future::pending().await
        }

        async fn status(&mut self) -> Result<RadioStatus, RadioError> {
            std::future::pending().await
        }
    }

    fn station() -> GroundStation {
        GroundStation::new(30.25, 120.17, 20.0).unwrap()
    }

    fn predictor() -> PassPredictor {
        PassPredictor::new(OrbitModel::new(station()))
    }

    fn engine() -> DopplerEngine {
        DopplerEngine::new(FrequencyPlan::new(435_000_000.0, 145_900_000.0).unwrap())
    }

    fn fixture<R: RadioControl>(
        radio: R,
        cfg: TrackingConfig,
        at: DateTime<Utc>,
    ) -> (
        TrackingController<R, ManualClock>,
        ManualClock,
        watch::Receiver<TrackingStatus>,
    ) {
        let clock = ManualClock::new(at);
        let (controller, status) =
            TrackingController::new(predictor(), engine(), radio, clock.clone(), cfg).unwrap();
        (controller, clock, status)
    }

    /// First pass that is not already in progress and at least five
    /// minutes out, so tests can place the clock on either side of AOS.
    fn upcoming_window(from: DateTime<Utc>) -> PassWindow {
        let predictor = predictor();
        let sat = iss();
        let mut from = from;
        loop {
            let w = predictor
                .next_pass(&sat, from, chrono::Duration::hours(48))
                .unwrap()
                .unwrap();
            if !w.clipped_aos && w.aos - from >= chrono::Duration::seconds(300) {
                return w;
            }
            from = w.los + chrono::Duration::seconds(60);
        }
    }

    fn epoch_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 13, 20, 0, 0).unwrap()
    }

    async fn enter_tracking(
        c: &mut TrackingController<MockRadio, ManualClock>,
        clock: &ManualClock,
        w: &PassWindow,
    ) {
        c.apply_command(OperatorCommand::Arm(Arc::new(iss())));
        clock.set(w.aos + chrono::Duration::seconds(30));
        c.tick().await;
        assert_eq!(c.state(), TrackingState::Tracking);
        clock.advance(chrono::Duration::seconds(1));
        c.tick().await;
    }

    #[tokio::test]
    async fn test_arm_waits_for_aos_then_tracks() {
        let w = upcoming_window(epoch_start());
        let radio = MockRadio::default();
        let (mut c, clock, status) = fixture(
            radio.clone(),
            TrackingConfig::default(),
            w.aos - chrono::Duration::seconds(120),
        );

        c.apply_command(OperatorCommand::Arm(Arc::new(iss())));
        c.tick().await;
        assert_eq!(c.state(), TrackingState::Idle);
        let snap = status.borrow().clone();
        let countdown = snap.next_aos_in_s.unwrap();
        assert!((118..=122).contains(&countdown), "countdown {countdown}");
        assert_eq!(snap.armed.unwrap().norad_id, 25544);
        assert!(radio.sent.lock().unwrap().is_empty());

        // transition happens on the tick that lands inside the window
        clock.set(w.aos + chrono::Duration::seconds(30));
        c.tick().await;
        assert_eq!(c.state(), TrackingState::Tracking);
        assert!(c.session().is_some());

        // first rig commands go out on the next beat
        clock.advance(chrono::Duration::seconds(1));
        c.tick().await;
        let sent = radio.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, Link::Downlink);
        assert_eq!(sent[1].0, Link::Uplink);
        // Doppler at 145.9 MHz never exceeds ~4 kHz
        assert!((sent[0].1 as i64 - 145_900_000).unsigned_abs() < 4_500);
        assert!((sent[1].1 as i64 - 435_000_000).unsigned_abs() < 13_000);

        let snap = status.borrow().clone();
        let session = snap.session.unwrap();
        assert_eq!(session.applied_downlink_hz, Some(sent[0].1));
        assert_eq!(session.applied_uplink_hz, Some(sent[1].1));
        assert_eq!(session.commands_sent, 2);
    }

    #[tokio::test]
    async fn test_unchanged_frequency_is_not_resent() {
        let w = upcoming_window(epoch_start());
        let radio = MockRadio::default();
        let (mut c, clock, _status) = fixture(
            radio.clone(),
            TrackingConfig::default(),
            w.aos - chrono::Duration::seconds(60),
        );
        enter_tracking(&mut c, &clock, &w).await;
        let baseline = radio.sent.lock().unwrap().len();
        assert_eq!(baseline, 2);

        // 10 ms of drift is well under the 10 Hz minimum step
        clock.advance(chrono::Duration::milliseconds(10));
        c.tick().await;
        assert_eq!(radio.sent.lock().unwrap().len(), baseline);

        // a few seconds moves the correction past the deadband
        clock.advance(chrono::Duration::seconds(10));
        c.tick().await;
        assert!(radio.sent.lock().unwrap().len() > baseline);
    }

    #[tokio::test]
    async fn test_grid_snapping_applies_to_sent_frequencies() {
        let w = upcoming_window(epoch_start());
        let radio = MockRadio::default();
        let cfg = TrackingConfig {
            downlink_tuning: LinkTuning {
                step_hz: 5_000,
                threshold_hz: 2_500,
            },
            ..TrackingConfig::default()
        };
        let (mut c, clock, _status) =
            fixture(radio.clone(), cfg, w.aos - chrono::Duration::seconds(60));
        enter_tracking(&mut c, &clock, &w).await;
        let sent = radio.sent.lock().unwrap().clone();
        let downlink = sent.iter().find(|(l, _)| *l == Link::Downlink).unwrap();
        assert_eq!(downlink.1 % 5_000, 0, "downlink {} not on grid", downlink.1);
    }

    #[tokio::test]
    async fn test_pause_holds_commands_but_keeps_computing() {
        let w = upcoming_window(epoch_start());
        let radio = MockRadio::default();
        let (mut c, clock, status) = fixture(
            radio.clone(),
            TrackingConfig::default(),
            w.aos - chrono::Duration::seconds(60),
        );
        enter_tracking(&mut c, &clock, &w).await;
        let baseline = radio.sent.lock().unwrap().len();

        c.apply_command(OperatorCommand::Pause);
        assert_eq!(c.state(), TrackingState::Paused);
        clock.advance(chrono::Duration::seconds(5));
        c.tick().await;
        assert_eq!(radio.sent.lock().unwrap().len(), baseline);
        let snap = status.borrow().clone();
        assert_eq!(snap.state, TrackingState::Paused);
        // the correction pipeline keeps running while paused
        assert_eq!(snap.session.unwrap().last_doppler.unwrap().at, clock.now());

        c.apply_command(OperatorCommand::Resume);
        clock.advance(chrono::Duration::seconds(5));
        c.tick().await;
        assert!(radio.sent.lock().unwrap().len() > baseline);
    }

    #[tokio::test]
    async fn test_below_horizon_closes_session_before_scheduled_los() {
        let w = upcoming_window(epoch_start());
        let radio = MockRadio::default();
        let (mut c, clock, _status) = fixture(radio.clone(), TrackingConfig::default(), w.aos);

        // hand the controller a window that overstays the real pass
        let mut stretched = w.clone();
        stretched.los = w.los + chrono::Duration::minutes(20);
        c.armed = Some(Armed {
            sat: Arc::new(iss()),
            window: Some(stretched.clone()),
            not_before: None,
            retry_after: None,
        });
        c.session = Some(TrackingSession::new(stretched, clock.now()));
        c.state = TrackingState::Tracking;

        clock.set(w.los + chrono::Duration::minutes(5));
        c.tick().await;
        assert_eq!(c.state(), TrackingState::Idle);
        assert!(c.session().is_none());
        assert!(radio.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_link_degrades_after_consecutive_failures_and_recovers() {
        let w = upcoming_window(epoch_start());
        let radio = MockRadio::default();
        let cfg = TrackingConfig {
            max_consecutive_failures: 3,
            ..TrackingConfig::default()
        };
        let (mut c, clock, status) =
            fixture(radio.clone(), cfg, w.aos - chrono::Duration::seconds(60));
        c.apply_command(OperatorCommand::Arm(Arc::new(iss())));
        clock.set(w.aos + chrono::Duration::seconds(30));
        c.tick().await;
        assert_eq!(c.state(), TrackingState::Tracking);

        radio.fail_sets.store(true, Ordering::SeqCst);
        clock.advance(chrono::Duration::seconds(1));
        c.tick().await; // two failed link commands
        assert_eq!(c.link_health(), LinkHealth::Ok);
        clock.advance(chrono::Duration::seconds(1));
        c.tick().await; // four
        assert_eq!(c.link_health(), LinkHealth::Degraded);
        assert_eq!(c.state(), TrackingState::Tracking, "failures never stop tracking");
        assert_eq!(status.borrow().link_health, LinkHealth::Degraded);
        assert!(c.session().unwrap().command_failures >= 3);

        radio.fail_sets.store(false, Ordering::SeqCst);
        clock.advance(chrono::Duration::seconds(1));
        c.tick().await;
        assert_eq!(c.link_health(), LinkHealth::Ok);
        assert!(!radio.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_radio_timeout_is_a_failure_not_a_hang() {
        let w = upcoming_window(epoch_start());
        let cfg = TrackingConfig {
            max_consecutive_failures: 1,
            ..TrackingConfig::default()
        };
        let (mut c, clock, _status) =
            fixture(StuckRadio, cfg, w.aos - chrono::Duration::seconds(60));
        c.apply_command(OperatorCommand::Arm(Arc::new(iss())));
        clock.set(w.aos + chrono::Duration::seconds(30));
        c.tick().await;
        assert_eq!(c.state(), TrackingState::Tracking);

        clock.advance(chrono::Duration::seconds(1));
        // the stuck status poll must resolve via the timeout
        c.tick().await;
        assert_eq!(c.link_health(), LinkHealth::Degraded);
        assert_eq!(c.state(), TrackingState::Tracking);
    }

    #[tokio::test]
    async fn test_cancel_keeps_armed_and_skips_rest_of_pass() {
        let w = upcoming_window(epoch_start());
        let radio = MockRadio::default();
        let (mut c, clock, status) = fixture(
            radio.clone(),
            TrackingConfig::default(),
            w.aos - chrono::Duration::seconds(60),
        );
        enter_tracking(&mut c, &clock, &w).await;

        c.apply_command(OperatorCommand::Cancel);
        assert_eq!(c.state(), TrackingState::Idle);
        assert!(c.session().is_none());
        assert!(status.borrow().armed.is_some());

        // next tick reschedules beyond the cancelled window
        let sent_before = radio.sent.lock().unwrap().len();
        clock.advance(chrono::Duration::seconds(1));
        c.tick().await;
        assert_eq!(c.state(), TrackingState::Idle);
        assert_eq!(radio.sent.lock().unwrap().len(), sent_before);
        let snap = status.borrow().clone();
        let countdown = snap.next_aos_in_s.expect("a later pass must be scheduled");
        assert!(countdown > 0);
    }

    #[tokio::test]
    async fn test_disarm_clears_target_and_session() {
        let w = upcoming_window(epoch_start());
        let radio = MockRadio::default();
        let (mut c, clock, status) = fixture(
            radio.clone(),
            TrackingConfig::default(),
            w.aos - chrono::Duration::seconds(60),
        );
        enter_tracking(&mut c, &clock, &w).await;

        c.apply_command(OperatorCommand::Disarm);
        assert_eq!(c.state(), TrackingState::Idle);
        assert!(c.session().is_none());
        let snap = status.borrow().clone();
        assert!(snap.armed.is_none());
        assert!(snap.next_aos_in_s.is_none());

        let sent_before = radio.sent.lock().unwrap().len();
        clock.advance(chrono::Duration::seconds(1));
        c.tick().await;
        assert_eq!(c.state(), TrackingState::Idle);
        assert_eq!(radio.sent.lock().unwrap().len(), sent_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_never_interrupts_an_inflight_command() {
        let w = upcoming_window(epoch_start());
        let gate = Arc::new(Notify::new());
        let radio = MockRadio {
            gate: Some(gate.clone()),
            ..MockRadio::default()
        };
        let cfg = TrackingConfig {
            // keep virtual time from expiring the gated command
            radio_timeout: Duration::from_secs(300),
            ..TrackingConfig::default()
        };
        let (mut c, _clock, status) =
            fixture(radio.clone(), cfg, w.aos + chrono::Duration::seconds(30));
        c.apply_command(OperatorCommand::Arm(Arc::new(iss())));

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(c.run(rx));

        // wait for the loop to enter the pass and block inside the radio
        while !radio.gate_used.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status.borrow().state, TrackingState::Tracking);

        tx.send(OperatorCommand::Cancel).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // command is queued but the in-flight radio call is untouched
        assert_eq!(status.borrow().state, TrackingState::Tracking);
        assert!(radio.sent.lock().unwrap().is_empty());

        gate.notify_one();
        let mut status_wait = status.clone();
        while status_wait.borrow().state != TrackingState::Idle {
            status_wait.changed().await.unwrap();
        }
        // the blocked downlink and the follow-up uplink both completed
        assert_eq!(radio.sent.lock().unwrap().len(), 2);
        assert!(status_wait.borrow().armed.is_some());

        drop(tx);
        handle.await.unwrap();
    }

    #[test]
    fn test_config_validation() {
        let mut cfg = TrackingConfig::default();
        cfg.tick_interval = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = TrackingConfig::default();
        cfg.radio_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = TrackingConfig::default();
        cfg.uplink_tuning = LinkTuning {
            step_hz: 1_000,
            threshold_hz: 2_000,
        };
        assert!(cfg.validate().is_err());

        assert!(TrackingConfig::default().validate().is_ok());
    }
}
