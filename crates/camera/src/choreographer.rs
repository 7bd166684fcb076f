//! Cinematic camera sequencing with idle orbit.
//!
//! Phases run `GlobalView → FlyingToRegion → LandingSequence → IdleOrbit` on
//! the first region, and `FlyingToRegion → IdleOrbit` on later switches.
//! Pointer interaction moves to `UserControlled`; release returns to
//! `IdleOrbit`. Orbit suspension is flag-based: the frame loop checks the
//! `rotating` cell and the `interacting` flag every tick.

use foundation::geo::LngLat;
use foundation::time::Time;
use foundation::view::CameraPose;
use runtime::observable::{Observable, Subscription};
use runtime::timers::{TimerId, TimerQueue};
use scene::surface::MapSurface;
use tracing::debug;

/// Bearing increment per rendered frame while orbiting, degrees.
pub const DEFAULT_ORBIT_DEG_PER_FRAME: f64 = 0.04;

/// Duration of the tilt/turn/zoom landing after the first approach.
pub const DEFAULT_LANDING_DURATION_S: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChoreographyConfig {
    pub approach_duration_s: f64,
    pub landing_duration_s: f64,
    pub landing_pitch_deg: f64,
    pub landing_bearing_delta_deg: f64,
    /// Street-scale zoom reached at the end of the landing.
    pub landing_zoom: f64,
    pub region_switch_duration_s: f64,
    pub orbit_deg_per_frame: f64,
}

impl Default for ChoreographyConfig {
    fn default() -> Self {
        Self {
            approach_duration_s: 3.0,
            landing_duration_s: DEFAULT_LANDING_DURATION_S,
            landing_pitch_deg: 60.0,
            landing_bearing_delta_deg: 35.0,
            landing_zoom: 17.0,
            region_switch_duration_s: 2.5,
            orbit_deg_per_frame: DEFAULT_ORBIT_DEG_PER_FRAME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPhase {
    GlobalView,
    FlyingToRegion,
    LandingSequence,
    IdleOrbit,
    UserControlled,
}

impl CameraPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            CameraPhase::GlobalView => "global_view",
            CameraPhase::FlyingToRegion => "flying_to_region",
            CameraPhase::LandingSequence => "landing_sequence",
            CameraPhase::IdleOrbit => "idle_orbit",
            CameraPhase::UserControlled => "user_controlled",
        }
    }

    pub fn in_transit(self) -> bool {
        matches!(self, CameraPhase::FlyingToRegion | CameraPhase::LandingSequence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    BeginLanding { center: LngLat },
    Settle,
}

#[derive(Debug)]
pub struct Choreographer {
    config: ChoreographyConfig,
    phase: CameraPhase,
    timers: TimerQueue<Step>,
    /// Only the most recently armed step may fire.
    pending: Option<TimerId>,
    rotating: Observable<bool>,
    interacting: bool,
    /// Rotation switched off by the user; arrival and release keep it off.
    paused: bool,
    landed_once: bool,
}

impl Choreographer {
    pub fn new(config: ChoreographyConfig) -> Self {
        Self {
            config,
            phase: CameraPhase::GlobalView,
            timers: TimerQueue::new(),
            pending: None,
            rotating: Observable::new(false),
            interacting: false,
            paused: false,
            landed_once: false,
        }
    }

    pub fn config(&self) -> ChoreographyConfig {
        self.config
    }

    pub fn phase(&self) -> CameraPhase {
        self.phase
    }

    pub fn is_rotating(&self) -> bool {
        self.rotating.get()
    }

    /// Push notifications of the rotation flag for UI code.
    pub fn subscribe_rotating(&self) -> Subscription<bool> {
        self.rotating.subscribe()
    }

    /// Explicit user toggle of the idle rotation.
    pub fn set_rotating(&mut self, on: bool) {
        self.paused = !on;
        self.rotating.set(on);
    }

    pub fn is_interacting(&self) -> bool {
        self.interacting
    }

    /// Scan-cycle promotion only runs once the camera has arrived.
    pub fn allows_scan(&self) -> bool {
        matches!(self.phase, CameraPhase::IdleOrbit | CameraPhase::UserControlled)
    }

    pub fn next_deadline(&self) -> Option<Time> {
        self.timers.next_deadline()
    }

    /// Starts the approach to a resolved region.
    pub fn enter_region(&mut self, now: Time, center: LngLat, zoom: f64, surface: &mut impl MapSurface) {
        self.cancel_pending();
        self.rotating.set(false);
        let bearing = surface.camera().bearing;
        let pose = CameraPose::new(center, zoom, 0.0, bearing);

        if self.landed_once {
            surface.fly_to(pose, self.config.region_switch_duration_s);
            self.arm(now, self.config.region_switch_duration_s, Step::Settle);
        } else {
            surface.fly_to(pose, self.config.approach_duration_s);
            self.arm(now, self.config.approach_duration_s, Step::BeginLanding { center });
        }
        self.set_phase(CameraPhase::FlyingToRegion);
    }

    pub fn fire_due(&mut self, now: Time, surface: &mut impl MapSurface) {
        while let Some((id, step)) = self.timers.pop_due(now) {
            if self.pending != Some(id) {
                continue;
            }
            self.pending = None;
            match step {
                Step::BeginLanding { center } => {
                    let bearing = surface.camera().bearing + self.config.landing_bearing_delta_deg;
                    let pose = CameraPose::new(
                        center,
                        self.config.landing_zoom,
                        self.config.landing_pitch_deg,
                        bearing,
                    );
                    surface.fly_to(pose, self.config.landing_duration_s);
                    self.arm(now, self.config.landing_duration_s, Step::Settle);
                    self.set_phase(CameraPhase::LandingSequence);
                }
                Step::Settle => {
                    self.landed_once = true;
                    if self.interacting {
                        self.set_phase(CameraPhase::UserControlled);
                    } else {
                        self.rotating.set(!self.paused);
                        self.set_phase(CameraPhase::IdleOrbit);
                    }
                }
            }
        }
    }

    /// Pointer pressed on the map. Interrupts any flight in progress.
    pub fn on_pointer_down(&mut self, surface: &mut impl MapSurface) {
        self.interacting = true;
        match self.phase {
            CameraPhase::FlyingToRegion | CameraPhase::LandingSequence => {
                surface.stop_camera();
                self.cancel_pending();
                self.landed_once = true;
                self.set_phase(CameraPhase::UserControlled);
            }
            CameraPhase::IdleOrbit => self.set_phase(CameraPhase::UserControlled),
            CameraPhase::GlobalView | CameraPhase::UserControlled => {}
        }
    }

    /// Pointer released. Orbit resumes from wherever the user left the bearing.
    pub fn on_pointer_up(&mut self) {
        if !self.interacting {
            return;
        }
        self.interacting = false;
        if self.phase == CameraPhase::UserControlled {
            self.rotating.set(!self.paused);
            self.set_phase(CameraPhase::IdleOrbit);
        }
    }

    /// Per-frame orbit step. Returns whether the camera moved.
    pub fn on_frame(&mut self, surface: &mut impl MapSurface) -> bool {
        if self.phase != CameraPhase::IdleOrbit || self.interacting || !self.rotating.get() {
            return false;
        }
        let pose = surface.camera();
        surface.jump_to(pose.with_bearing(pose.bearing + self.config.orbit_deg_per_frame));
        true
    }

    fn arm(&mut self, now: Time, delay_s: f64, step: Step) {
        self.cancel_pending();
        self.pending = Some(self.timers.arm(now, delay_s, step));
    }

    fn cancel_pending(&mut self) {
        if let Some(id) = self.pending.take() {
            self.timers.cancel(id);
        }
    }

    fn set_phase(&mut self, phase: CameraPhase) {
        if self.phase != phase {
            debug!(from = self.phase.as_str(), to = phase.as_str(), "camera phase");
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraPhase, ChoreographyConfig, Choreographer};
    use foundation::geo::LngLat;
    use foundation::time::Time;
    use foundation::view::CameraPose;
    use scene::surface::{HeadlessSurface, MapSurface};

    fn centre() -> LngLat {
        LngLat::new(-76.8, 40.4)
    }

    fn landed(surface: &mut HeadlessSurface) -> Choreographer {
        let mut c = Choreographer::new(ChoreographyConfig::default());
        c.enter_region(Time(0.0), centre(), 11.0, surface);
        c.fire_due(Time(3.0), surface);
        c.fire_due(Time(7.5), surface);
        assert_eq!(c.phase(), CameraPhase::IdleOrbit);
        c
    }

    #[test]
    fn first_region_runs_approach_then_landing_then_orbit() {
        let mut s = HeadlessSurface::new(800.0, 600.0);
        let mut c = Choreographer::new(ChoreographyConfig::default());
        assert!(!c.allows_scan());

        c.enter_region(Time(0.0), centre(), 11.0, &mut s);
        assert_eq!(c.phase(), CameraPhase::FlyingToRegion);
        assert_eq!(s.flights()[0], (CameraPose::new(centre(), 11.0, 0.0, 0.0), 3.0));

        c.fire_due(Time(3.0), &mut s);
        assert_eq!(c.phase(), CameraPhase::LandingSequence);
        let (landing, duration) = s.flights()[1];
        assert_eq!(duration, 4.5);
        assert_eq!(landing.zoom, 17.0);
        assert_eq!(landing.pitch, 60.0);
        assert_eq!(landing.bearing, 35.0);
        assert!(!c.is_rotating());

        c.fire_due(Time(7.5), &mut s);
        assert_eq!(c.phase(), CameraPhase::IdleOrbit);
        assert!(c.is_rotating());
        assert!(c.allows_scan());
    }

    #[test]
    fn orbit_advances_bearing_each_frame_unless_suspended() {
        let mut s = HeadlessSurface::new(800.0, 600.0);
        let mut c = landed(&mut s);
        let before = s.camera().bearing;

        assert!(c.on_frame(&mut s));
        assert!(c.on_frame(&mut s));
        assert!((s.camera().bearing - (before + 0.08)).abs() < 1e-9);

        c.on_pointer_down(&mut s);
        assert_eq!(c.phase(), CameraPhase::UserControlled);
        assert!(!c.on_frame(&mut s));
        assert!(c.allows_scan());

        // The user turned the map while dragging; orbit continues from there.
        s.set_camera(s.camera().with_bearing(200.0));
        c.on_pointer_up();
        assert!(c.on_frame(&mut s));
        assert!((s.camera().bearing - 200.04).abs() < 1e-9);

        c.set_rotating(false);
        assert!(!c.on_frame(&mut s));
    }

    #[test]
    fn region_switch_skips_the_landing() {
        let mut s = HeadlessSurface::new(800.0, 600.0);
        let mut c = landed(&mut s);
        let other = LngLat::new(-77.2, 40.2);

        c.enter_region(Time(10.0), other, 12.0, &mut s);
        assert_eq!(c.phase(), CameraPhase::FlyingToRegion);
        assert!(!c.allows_scan());
        let (pose, _) = *s.flights().last().unwrap();
        assert_eq!(pose.center, other);
        assert_eq!(pose.zoom, 12.0);
        assert_eq!(pose.pitch, 0.0);

        c.fire_due(Time(12.5), &mut s);
        assert_eq!(c.phase(), CameraPhase::IdleOrbit);
        assert_eq!(s.flights().len(), 3);
    }

    #[test]
    fn pointer_during_flight_interrupts_and_stale_steps_are_ignored() {
        let mut s = HeadlessSurface::new(800.0, 600.0);
        let mut c = Choreographer::new(ChoreographyConfig::default());
        c.enter_region(Time(0.0), centre(), 11.0, &mut s);

        c.on_pointer_down(&mut s);
        assert_eq!(s.stops(), 1);
        assert_eq!(c.phase(), CameraPhase::UserControlled);

        c.fire_due(Time(10.0), &mut s);
        assert_eq!(c.phase(), CameraPhase::UserControlled);
        assert_eq!(s.flights().len(), 1);

        c.on_pointer_up();
        assert_eq!(c.phase(), CameraPhase::IdleOrbit);
        assert!(c.is_rotating());
    }

    #[test]
    fn subscribers_see_rotation_changes() {
        let mut s = HeadlessSurface::new(800.0, 600.0);
        let mut c = landed(&mut s);
        let mut rx = c.subscribe_rotating();
        assert!(*rx.borrow_and_update());
        c.set_rotating(false);
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
    }
}
