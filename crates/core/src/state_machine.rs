//! The state machine executor.
//!
//! A machine is a table of states, each a triple of optional block trees
//! (entry, step, exit). One logical executor drives it by calling
//! `step()`; time comes from the global time element, which the executor
//! (or platform glue) writes before each step. Stepping performs no
//! allocation and no I/O.

use tracing::{debug, trace};

use crate::element::{AnyElement, Element};
use crate::error::{Error, Result};
use crate::expression::{Expr, StatsRef};

/// Reserved state id meaning "no state"; never a valid state id.
pub const NO_STATE: u32 = 0;

/// An atomic runtime operation.
#[derive(Debug)]
pub enum Action {
    /// Evaluate `expr` and write the result to `element` (safe-cast to
    /// the element's kind).
    Assignment { element: AnyElement, expr: Expr },
    /// Request a change of current state at the end of this step.
    Transition(u32),
}

impl Action {
    /// Execute the action, returning the destination state id when the
    /// action requests a transition.
    pub fn execute(&self) -> Option<u32> {
        match self {
            Action::Assignment { element, expr } => {
                element.write_f64(expr.evaluate());
                None
            }
            Action::Transition(dest) => Some(*dest),
        }
    }
}

/// One statement in a label: an optional guard selecting nested
/// if/else blocks, an optional action, and the next statement in
/// sequence.
#[derive(Debug, Default)]
pub struct Block {
    pub guard: Option<Expr>,
    pub if_block: Option<Box<Block>>,
    pub else_block: Option<Box<Block>>,
    pub action: Option<Action>,
    pub next: Option<Box<Block>>,
}

/// One state: entry runs on the first step in the state, step on every
/// step, exit on the step that leaves the state.
#[derive(Debug)]
pub struct State {
    pub id: u32,
    pub entry: Option<Block>,
    pub step: Option<Block>,
    pub exit: Option<Block>,
}

/// Input to [`StateMachine::create`].
#[derive(Debug)]
pub struct Config {
    /// Externally visible current state. Written at the start of every
    /// step, so after a transition step it still reads the old state
    /// until the next step runs.
    pub state_elem: Element<u32>,
    /// Nanoseconds since entering the current state; written every step.
    pub state_time_elem: Element<u64>,
    /// Current wall time; the source of truth for time. Read-only from
    /// the machine's perspective.
    pub global_time_elem: Element<u64>,
    /// State table. The initial state is whichever id `state_elem`
    /// holds at create time.
    pub states: Vec<State>,
    /// Every rolling-stats instance referenced by the machine's
    /// expressions; each is updated exactly once per step.
    pub stats: Vec<StatsRef>,
}

/// A compiled, validated state machine.
#[derive(Debug)]
pub struct StateMachine {
    state_elem: Element<u32>,
    state_time_elem: Element<u64>,
    global_time_elem: Element<u64>,
    states: Vec<State>,
    stats: Vec<StatsRef>,
    current: usize,
    time_state_start: Option<u64>,
    time_last_step: Option<u64>,
}

impl StateMachine {
    /// Validate a config and build the machine.
    ///
    /// Checks: at least one state (`Null`), ids nonzero
    /// (`SmStateReserved`) and unique (`SmStateDupe`), every transition
    /// destination present in the table (`SmState`), no transitions in
    /// exit blocks (`SmTransExit`), and the initial state (read from
    /// the state element) present in the table (`SmState`).
    pub fn create(config: Config) -> Result<StateMachine> {
        if config.states.is_empty() {
            return Err(Error::Null);
        }

        for (idx, state) in config.states.iter().enumerate() {
            if state.id == NO_STATE {
                return Err(Error::SmStateReserved);
            }
            if config.states[..idx].iter().any(|s| s.id == state.id) {
                return Err(Error::SmStateDupe);
            }
        }

        for state in &config.states {
            for block in [&state.entry, &state.step].into_iter().flatten() {
                let mut result = Ok(());
                visit_transitions(block, &mut |dest| {
                    if !config.states.iter().any(|s| s.id == dest) {
                        result = Err(Error::SmState);
                    }
                });
                result?;
            }
            if let Some(block) = &state.exit {
                let mut result = Ok(());
                visit_transitions(block, &mut |_| result = Err(Error::SmTransExit));
                result?;
            }
        }

        let initial = config.state_elem.read();
        let current = config
            .states
            .iter()
            .position(|s| s.id == initial)
            .ok_or(Error::SmState)?;

        debug!(
            states = config.states.len(),
            stats = config.stats.len(),
            initial,
            "state machine created"
        );

        Ok(StateMachine {
            state_elem: config.state_elem,
            state_time_elem: config.state_time_elem,
            global_time_elem: config.global_time_elem,
            states: config.states,
            stats: config.stats,
            current,
            time_state_start: None,
            time_last_step: None,
        })
    }

    /// Execute one step at the time currently held by the global time
    /// element.
    ///
    /// Fails with `SmNonMonotonicTime`, leaving all state untouched,
    /// when the time is less than the previous step's; equal times are
    /// permitted.
    pub fn step(&mut self) -> Result<()> {
        let now = self.global_time_elem.read();
        if let Some(last) = self.time_last_step {
            if now < last {
                return Err(Error::SmNonMonotonicTime);
            }
        }

        let start = *self.time_state_start.get_or_insert(now);
        self.state_time_elem.write(now - start);
        // The state element reflects the state this step runs in: after
        // a transition step it still reads the old state until the next
        // step begins.
        self.state_elem.write(self.states[self.current].id);
        self.time_last_step = Some(now);
        let first_step_in_state = start == now;

        // Rolling windows advance before any label runs, so expressions
        // in this step's labels observe the current element values.
        for stats in &self.stats {
            stats.borrow_mut().update();
        }

        let mut pending = NO_STATE;
        {
            let state = &self.states[self.current];

            if first_step_in_state {
                if let Some(block) = &state.entry {
                    execute_block(block, &mut pending);
                }
            }

            if pending == NO_STATE {
                if let Some(block) = &state.step {
                    execute_block(block, &mut pending);
                }
            }

            if pending != NO_STATE {
                if let Some(block) = &state.exit {
                    // Exit blocks contain no transitions; the pending
                    // destination cannot change here.
                    let mut sink = NO_STATE;
                    execute_block(block, &mut sink);
                }
            }
        }

        if pending != NO_STATE {
            trace!(from = self.states[self.current].id, to = pending, "transition");
            self.current = self
                .states
                .iter()
                .position(|s| s.id == pending)
                .ok_or(Error::Unreachable)?;
            self.time_state_start = None;
        }

        Ok(())
    }

    /// Id of the current state.
    pub fn current_state_id(&self) -> u32 {
        self.states[self.current].id
    }

    /// Handle to the global time element, for the driving executor.
    pub fn global_time_element(&self) -> Element<u64> {
        self.global_time_elem.clone()
    }

    /// Handle to the state element.
    pub fn state_element(&self) -> Element<u32> {
        self.state_elem.clone()
    }
}

/// Run a statement chain until it ends or an action latches a pending
/// transition. The first transition in source order wins; nothing after
/// it executes.
fn execute_block(block: &Block, pending: &mut u32) {
    let mut block = Some(block);
    while let Some(b) = block {
        if *pending != NO_STATE {
            break;
        }

        let take_if = match &b.guard {
            Some(guard) => guard.evaluate_bool(),
            None => true,
        };
        if take_if {
            if let Some(if_block) = &b.if_block {
                execute_block(if_block, pending);
            }
        } else if let Some(else_block) = &b.else_block {
            execute_block(else_block, pending);
        }

        if *pending != NO_STATE {
            break;
        }

        if let Some(action) = &b.action {
            if let Some(dest) = action.execute() {
                *pending = dest;
            }
        }

        block = b.next.as_deref();
    }
}

/// Call `f` with the destination of every transition action in the
/// block tree.
fn visit_transitions(block: &Block, f: &mut impl FnMut(u32)) {
    if let Some(Action::Transition(dest)) = &block.action {
        f(*dest);
    }
    for nested in [&block.if_block, &block.else_block, &block.next]
        .into_iter()
        .flatten()
    {
        visit_transitions(nested, f);
    }
}
