//! The host loop for a day-stepped simulation.
//!
//! `Context` owns every piece of shared world state (through data plugins)
//! and a time-ordered queue of plans. Daily processes are periodic plans with
//! a period of one day; ties at the same time are broken by `ExecutionPhase`,
//! which is how the crate guarantees that the mobility machine establishes
//! each day's locations and baseline weights before any layer-editing
//! intervention runs, and that both finish before the host's transmission
//! step reads the layers.
use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::rc::Rc;

use log::trace;

use crate::plan::{PlanId, Queue};
use crate::HashMap;

/// A type that can provide a data container to be held by `Context`
pub trait DataPlugin: Any {
    type DataContainer;

    fn create_data_container() -> Self::DataContainer;
}

/// Defines a new type for storing data in `Context`.
#[macro_export]
macro_rules! define_data_plugin {
    ($data_plugin:ident, $data_container:ty, $default: expr) => {
        #[derive(Copy, Clone)]
        struct $data_plugin;

        impl $crate::context::DataPlugin for $data_plugin {
            type DataContainer = $data_container;

            fn create_data_container() -> Self::DataContainer {
                $default
            }
        }
    };
}
pub use define_data_plugin;

/// The relative order of plans scheduled for the same time.
///
/// * `First` - processes that establish the day's state (mobility)
/// * `Normal` - processes that edit that state (layer interventions)
/// * `Last` - processes that consume it (the host's transmission step)
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExecutionPhase {
    First,
    Normal,
    Last,
}

type Callback = dyn FnOnce(&mut Context);

struct PlanData {
    callback: Box<Callback>,
    periodic: bool,
}

pub struct Context {
    plan_queue: Queue<PlanData, ExecutionPhase>,
    callback_queue: VecDeque<Box<Callback>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
    periodic_plans_pending: usize,
    shutdown_requested: bool,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            callback_queue: VecDeque::new(),
            data_plugins: HashMap::default(),
            current_time: 0.0,
            periodic_plans_pending: 0,
            shutdown_requested: false,
        }
    }

    /// Add a plan to run at `time` in the `Normal` phase.
    ///
    /// # Panics
    ///
    /// Panics if `time` is not finite or is earlier than the current time.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) -> PlanId {
        self.add_plan_with_phase(time, callback, ExecutionPhase::Normal)
    }

    /// Add a plan to run at `time` in the given phase.
    ///
    /// # Panics
    ///
    /// Panics if `time` is not finite or is earlier than the current time.
    pub fn add_plan_with_phase(
        &mut self,
        time: f64,
        callback: impl FnOnce(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) -> PlanId {
        self.enqueue(time, Box::new(callback), phase, false)
    }

    /// Add a plan that runs every `period` starting at the current time.
    ///
    /// A periodic plan keeps rescheduling itself for as long as there are
    /// non-periodic plans left in the queue, so a model that only has daily
    /// processes must schedule its end (see [`Context::execute_days`]).
    ///
    /// # Panics
    ///
    /// Panics if `period` is not finite and positive.
    pub fn add_periodic_plan_with_phase(
        &mut self,
        period: f64,
        callback: impl Fn(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) {
        assert!(
            period.is_finite() && period > 0.0,
            "Period must be greater than 0"
        );
        let time = self.current_time;
        self.schedule_periodic(time, period, Rc::new(callback), phase);
    }

    /// Registers a process that runs once per simulated day in `phase`.
    pub fn add_daily_process(
        &mut self,
        callback: impl Fn(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) {
        self.add_periodic_plan_with_phase(1.0, callback, phase);
    }

    fn schedule_periodic(
        &mut self,
        time: f64,
        period: f64,
        callback: Rc<dyn Fn(&mut Context)>,
        phase: ExecutionPhase,
    ) {
        let next = Box::new(move |context: &mut Context| {
            callback(context);
            // Only keep going while something other than periodic plans is
            // waiting; otherwise the loop would never drain.
            if context.plan_queue_len() > context.periodic_plans_pending {
                let next_time = context.current_time + period;
                context.schedule_periodic(next_time, period, callback, phase);
            }
        });
        self.enqueue(time, next, phase, true);
    }

    fn enqueue(
        &mut self,
        time: f64,
        callback: Box<Callback>,
        phase: ExecutionPhase,
        periodic: bool,
    ) -> PlanId {
        assert!(
            time.is_finite() && time >= self.current_time,
            "Invalid time value"
        );
        trace!("adding plan at {time} ({phase:?})");
        if periodic {
            self.periodic_plans_pending += 1;
        }
        self.plan_queue
            .add_plan(time, PlanData { callback, periodic }, phase)
    }

    fn plan_queue_len(&self) -> usize {
        self.plan_queue.len()
    }

    pub fn cancel_plan(&mut self, id: &PlanId) {
        trace!("canceling plan {id:?}");
        self.plan_queue.cancel_plan(id);
    }

    /// Queue a callback to run before the next plan.
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    /// Returns the data container for `plugin`, creating it on first use.
    #[allow(clippy::needless_pass_by_value)]
    pub fn get_data_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            .expect("TypeId does not match data container type")
    }

    /// Returns the data container for `plugin`, or `None` if nothing has
    /// created it yet.
    #[allow(clippy::needless_pass_by_value)]
    #[must_use]
    pub fn get_data<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|container| container.downcast_ref::<T::DataContainer>())
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// The current simulated day, or `None` when the host is between whole
    /// days. Day triggers compare against this value, so a trigger whose day
    /// is never reached as a whole number silently never fires.
    #[must_use]
    pub fn get_current_day(&self) -> Option<u32> {
        let time = self.current_time;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        if time >= 0.0 && time.fract() == 0.0 && time <= f64::from(u32::MAX) {
            Some(time as u32)
        } else {
            None
        }
    }

    /// Stop executing after the current plan completes.
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at {}", self.current_time);
        self.shutdown_requested = true;
    }

    /// Run plans in time order until the queue is empty or `shutdown` is
    /// called.
    pub fn execute(&mut self) {
        trace!("entering event loop");
        self.shutdown_requested = false;
        loop {
            if self.shutdown_requested {
                break;
            }

            if let Some(callback) = self.callback_queue.pop_front() {
                callback(self);
                continue;
            }

            match self.plan_queue.get_next_plan() {
                Some(plan) => {
                    if plan.data.periodic {
                        self.periodic_plans_pending -= 1;
                    }
                    self.current_time = plan.time;
                    (plan.data.callback)(self);
                }
                None => break,
            }
        }
        trace!("exiting event loop at {}", self.current_time);
    }

    /// Run days `0..n_days` (relative to the current day) and stop before the
    /// next day begins.
    pub fn execute_days(&mut self, n_days: u32) {
        let end = self.current_time.floor() + f64::from(n_days);
        // `First` plus an id older than any rescheduled daily process puts
        // this ahead of everything on the end day.
        self.add_plan_with_phase(end, Context::shutdown, ExecutionPhase::First);
        self.execute();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
