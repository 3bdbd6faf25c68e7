//! Device adaptor capability trait
//!
//! One implementation per backend family (hybris, sysfs/IIO, evdev). The
//! backend supplies the hardware hooks; the provided methods carry the
//! shared lifecycle and arbitration so every family behaves identically.

use contracts::{DataRange, SessionId};
use metrics::gauge;
use tracing::{debug, info, instrument, warn};

use crate::arbitration::{evaluate_interval_requests, Arbitration};
use crate::state::AdaptorCore;

/// One physical sensor source
pub trait DeviceAdaptor: Send + Sync {
    /// Shared state embedded in the backend
    fn core(&self) -> &AdaptorCore;

    /// Bring hardware up. Returning `false` leaves the adaptor stopped.
    fn start_hardware(&self) -> bool;

    /// Stop hardware delivery
    fn stop_hardware(&self);

    /// Program an arbitrated interval. Backends skip unchanged values.
    fn apply_interval(&self, interval_ms: u32, winner: Option<SessionId>) -> bool;

    /// Interval currently programmed, in milliseconds
    fn interval(&self) -> u32;

    /// Called once when the first channel requests this adaptor
    fn start_adaptor(&self) -> bool {
        true
    }

    /// Called once when the last channel releases this adaptor
    fn stop_adaptor(&self) {}

    fn name(&self) -> &str {
        self.core().name().as_str()
    }

    fn is_valid(&self) -> bool {
        self.core().is_valid()
    }

    fn is_running(&self) -> bool {
        self.core().is_running()
    }

    /// Register one more started logical channel.
    ///
    /// Hardware is only touched when the count goes from 0 to 1.
    #[instrument(name = "adaptor_start_sensor", skip(self), fields(adaptor = %self.name()))]
    fn start_sensor(&self) -> bool {
        let core = self.core();
        if !core.is_valid() {
            warn!("refusing to start invalid adaptor");
            return false;
        }
        let Some(entry) = core.primary_entry() else {
            warn!("adaptor has no adapted sensor");
            return false;
        };

        let _lifecycle = core.lifecycle();
        let refs = entry.add_reference();
        debug!(refs, "start requested");
        if refs == 1 {
            core.run_state().should_be_running = true;
            self.evaluate_sensor();
        }
        true
    }

    /// Drop one started logical channel; hardware stops at zero
    #[instrument(name = "adaptor_stop_sensor", skip(self), fields(adaptor = %self.name()))]
    fn stop_sensor(&self) {
        let Some(entry) = self.core().primary_entry() else {
            return;
        };
        let _lifecycle = self.core().lifecycle();
        match entry.remove_reference() {
            None => debug!("stop requested while not started"),
            Some(0) => {
                self.core().run_state().should_be_running = false;
                self.evaluate_sensor();
            }
            Some(refs) => debug!(refs, "adaptor still referenced"),
        }
    }

    /// Enter device-wide standby; `false` if already there
    fn standby(&self) -> bool {
        {
            let mut state = self.core().run_state();
            if state.in_standby {
                return false;
            }
            state.in_standby = true;
        }
        debug!(adaptor = %self.name(), "entering standby");
        self.evaluate_sensor();
        true
    }

    /// Leave standby; `false` if not in standby
    fn resume(&self) -> bool {
        {
            let mut state = self.core().run_state();
            if !state.in_standby {
                return false;
            }
            state.in_standby = false;
        }
        debug!(adaptor = %self.name(), "resuming from standby");
        self.evaluate_sensor();
        true
    }

    /// Reconcile hardware with `should_be_running AND (override OR NOT standby)`
    fn evaluate_sensor(&self) {
        let core = self.core();
        let standby_override = core.standby_override();
        let mut state = core.run_state();
        let allowed = standby_override || !state.in_standby;
        let target = state.should_be_running && allowed;
        if target == state.hardware_running {
            return;
        }

        if target {
            if !core.is_valid() {
                warn!(adaptor = %core.name(), "cannot start invalid adaptor");
                return;
            }
            if self.start_hardware() {
                state.hardware_running = true;
                core.mark_running(true);
                info!(adaptor = %core.name(), "hardware started");
            } else {
                warn!(adaptor = %core.name(), "hardware failed to start");
            }
        } else {
            self.stop_hardware();
            state.hardware_running = false;
            core.mark_running(false);
            info!(adaptor = %core.name(), "hardware stopped");
        }
    }

    /// Record a session's interval request and re-arbitrate
    fn set_interval(&self, value_ms: u32, session: SessionId) -> bool {
        self.core().update_requests(|r| {
            r.intervals.insert(session, value_ms);
        });
        debug!(adaptor = %self.name(), %session, value_ms, "interval requested");
        self.reevaluate_interval()
    }

    /// Forget a session's interval request and re-arbitrate
    fn remove_interval_request(&self, session: SessionId) -> bool {
        let removed = self
            .core()
            .update_requests(|r| r.intervals.remove(&session).is_some());
        if !removed {
            return true;
        }
        self.reevaluate_interval()
    }

    fn evaluate_interval_requests(&self) -> Arbitration {
        let core = self.core();
        let default_interval = core.default_interval();
        core.update_requests(|r| evaluate_interval_requests(&r.intervals, default_interval))
    }

    /// Push the current arbitration result to the backend
    fn reevaluate_interval(&self) -> bool {
        let arb = self.evaluate_interval_requests();
        debug!(
            adaptor = %self.name(),
            interval_ms = arb.interval_ms,
            winner = arb.winner_id(),
            "interval arbitrated"
        );
        let ok = self.apply_interval(arb.interval_ms, arb.winner);
        if ok {
            gauge!("sensord_adaptor_interval_ms", "adaptor" => self.name().to_string())
                .set(f64::from(arb.interval_ms));
        } else {
            warn!(adaptor = %self.name(), interval_ms = arb.interval_ms, "backend rejected interval");
        }
        ok
    }

    /// Record a session's standby override and re-evaluate the run state
    fn set_standby_override(&self, session: SessionId, value: bool) -> bool {
        self.core().update_requests(|r| {
            r.standby_overrides.insert(session, value);
        });
        self.evaluate_sensor();
        true
    }

    /// Queue a data range request; the range must be one the adaptor offers
    fn request_data_range(&self, session: SessionId, range: DataRange) -> bool {
        let core = self.core();
        if !core.available_data_ranges().contains(&range) {
            warn!(adaptor = %self.name(), %session, ?range, "data range not available");
            return false;
        }
        core.update_requests(|r| r.data_ranges.request(session, range));
        true
    }

    fn remove_data_range_request(&self, session: SessionId) {
        self.core().update_requests(|r| r.data_ranges.remove(session));
    }

    /// Drop every request a closing session made
    fn remove_session(&self, session: SessionId) {
        let had_interval = self.core().update_requests(|r| {
            let had = r.intervals.contains_key(&session);
            r.remove_session(session);
            had
        });
        if had_interval {
            self.reevaluate_interval();
        }
        self.evaluate_sensor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;

    use contracts::TimedUnsigned;

    use crate::ring_buffer::RingBuffer;

    struct CountingAdaptor {
        core: AdaptorCore,
        starts: AtomicUsize,
        stops: AtomicUsize,
        interval: AtomicU32,
    }

    impl CountingAdaptor {
        fn new(default_interval: u32) -> Self {
            let core = AdaptorCore::new("testadaptor");
            core.set_adapted_sensor("test", "test output", Arc::new(RingBuffer::<TimedUnsigned>::new(1)));
            core.set_default_interval(default_interval);
            core.introduce_available_data_range(DataRange::new(0.0, 100.0, 1.0));
            Self {
                core,
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                interval: AtomicU32::new(0),
            }
        }
    }

    impl DeviceAdaptor for CountingAdaptor {
        fn core(&self) -> &AdaptorCore {
            &self.core
        }

        fn start_hardware(&self) -> bool {
            self.starts.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn stop_hardware(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn apply_interval(&self, interval_ms: u32, _winner: Option<SessionId>) -> bool {
            self.interval.store(interval_ms, Ordering::SeqCst);
            true
        }

        fn interval(&self) -> u32 {
            self.interval.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_n_starts_need_n_stops() {
        let adaptor = CountingAdaptor::new(10);
        for _ in 0..3 {
            assert!(adaptor.start_sensor());
        }
        assert_eq!(adaptor.starts.load(Ordering::SeqCst), 1);

        adaptor.stop_sensor();
        adaptor.stop_sensor();
        assert!(adaptor.is_running());
        assert_eq!(adaptor.stops.load(Ordering::SeqCst), 0);

        adaptor.stop_sensor();
        assert!(!adaptor.is_running());
        assert_eq!(adaptor.stops.load(Ordering::SeqCst), 1);

        adaptor.stop_sensor();
        assert_eq!(adaptor.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_standby_pauses_and_resume_restarts() {
        let adaptor = CountingAdaptor::new(10);
        adaptor.start_sensor();
        assert!(adaptor.standby());
        assert!(!adaptor.standby());
        assert!(!adaptor.is_running());

        assert!(adaptor.resume());
        assert!(adaptor.is_running());
        assert_eq!(adaptor.starts.load(Ordering::SeqCst), 2);
        assert!(!adaptor.resume());
    }

    #[test]
    fn test_standby_override_keeps_running() {
        let adaptor = CountingAdaptor::new(10);
        adaptor.set_standby_override(SessionId(1), true);
        adaptor.start_sensor();
        adaptor.standby();
        assert!(adaptor.is_running());

        adaptor.remove_session(SessionId(1));
        assert!(!adaptor.is_running());
    }

    #[test]
    fn test_standby_before_start_defers_hardware() {
        let adaptor = CountingAdaptor::new(10);
        adaptor.standby();
        adaptor.start_sensor();
        assert!(!adaptor.is_running());
        assert_eq!(adaptor.starts.load(Ordering::SeqCst), 0);
        adaptor.resume();
        assert!(adaptor.is_running());
    }

    #[test]
    fn test_invalid_adaptor_never_starts() {
        let adaptor = CountingAdaptor::new(10);
        adaptor.core().set_valid(false);
        assert!(!adaptor.start_sensor());
        assert_eq!(adaptor.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_interval_scenario() {
        let adaptor = CountingAdaptor::new(10);
        adaptor.set_interval(50, SessionId(1));
        adaptor.set_interval(20, SessionId(2));
        adaptor.set_interval(0, SessionId(3));
        assert_eq!(adaptor.interval(), 20);
        assert_eq!(adaptor.evaluate_interval_requests().winner, Some(SessionId(2)));

        adaptor.remove_interval_request(SessionId(2));
        assert_eq!(adaptor.interval(), 50);

        adaptor.remove_interval_request(SessionId(1));
        assert_eq!(adaptor.interval(), 10);
        assert_eq!(adaptor.evaluate_interval_requests().winner_id(), -1);
    }

    #[test]
    fn test_concurrent_start_stop_keeps_hardware_in_step() {
        let adaptor = Arc::new(CountingAdaptor::new(10));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let adaptor = Arc::clone(&adaptor);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        adaptor.start_sensor();
                        adaptor.stop_sensor();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let entry = adaptor.core().primary_entry().unwrap();
        assert_eq!(entry.reference_count(), 0);
        assert!(!adaptor.is_running());
        assert_eq!(
            adaptor.starts.load(Ordering::SeqCst),
            adaptor.stops.load(Ordering::SeqCst)
        );

        adaptor.start_sensor();
        assert!(adaptor.is_running());
        assert_eq!(entry.reference_count(), 1);
    }

    #[test]
    fn test_data_range_must_be_advertised() {
        let adaptor = CountingAdaptor::new(10);
        assert!(!adaptor.request_data_range(SessionId(1), DataRange::new(0.0, 1.0, 1.0)));
        assert!(adaptor.request_data_range(SessionId(1), DataRange::new(0.0, 100.0, 1.0)));
    }
}
