//! Maintainer state machine.
//!
//! Kept free of I/O so the transition table can be tested on its own. The
//! maintainer feeds it triggers and carries out the returned effects.

use std::fmt;

/// What the maintainer does when its held key is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// Losing the key after acquisition is fatal.
    Lock,
    /// Losing the key is reported and the maintainer re-registers.
    Presence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaintainerState {
    Idle,
    Acquiring,
    Held,
    Retrying,
    Released,
    Failed,
}

impl MaintainerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Failed)
    }
}

impl fmt::Display for MaintainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Held => "held",
            Self::Retrying => "retrying",
            Self::Released => "released",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Start,
    AcquireSucceeded,
    AcquireFailed,
    SessionLost,
    RetryTimerFired,
    RecreateSucceeded,
    RecreateFailed,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start a background acquire on the current session.
    BeginAcquire,
    /// Close the readiness signal.
    SignalReady,
    /// Arm the retry timer for one retry interval.
    ArmRetry,
    /// Replace the session with a fresh one.
    Recreate,
    /// Report the loss on the presence channel.
    NotifyLost,
    /// Destroy the session and exit with a lock-lost error.
    FailLockLost,
    /// Destroy the session and exit cleanly.
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: MaintainerState,
    pub effects: &'static [Effect],
}

impl Transition {
    const fn to(next: MaintainerState, effects: &'static [Effect]) -> Self {
        Self { next, effects }
    }
}

/// Next state and effects for `trigger` arriving in `state`.
///
/// Triggers that make no sense in a state leave it unchanged with no
/// effects; stale acquire results after a shutdown land here.
pub fn transition(policy: LockPolicy, state: MaintainerState, trigger: Trigger) -> Transition {
    use Effect::*;
    use MaintainerState::*;

    match (state, trigger) {
        (s, Trigger::Shutdown) if !s.is_terminal() => Transition::to(Released, &[Release]),

        (Idle, Trigger::Start) => Transition::to(Acquiring, &[BeginAcquire]),

        (Acquiring, Trigger::AcquireSucceeded) => Transition::to(Held, &[SignalReady]),
        (Acquiring, Trigger::AcquireFailed | Trigger::SessionLost) => {
            Transition::to(Retrying, &[ArmRetry])
        },

        (Held, Trigger::SessionLost) => match policy {
            LockPolicy::Lock => Transition::to(Failed, &[FailLockLost]),
            LockPolicy::Presence => Transition::to(Retrying, &[NotifyLost, ArmRetry]),
        },

        (Retrying, Trigger::RetryTimerFired) => Transition::to(Retrying, &[Recreate]),
        (Retrying, Trigger::RecreateSucceeded) => Transition::to(Acquiring, &[BeginAcquire]),
        (Retrying, Trigger::RecreateFailed) => Transition::to(Retrying, &[ArmRetry]),

        (s, _) => Transition::to(s, &[]),
    }
}
