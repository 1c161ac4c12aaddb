//! Mirrored-flag bookkeeping.
//!
//! The trunk mirrors promiscuous and all-multicast mode onto every member,
//! but it must not fight the physical driver: a flag the driver set
//! independently is never cleared by the trunk. Each port therefore tracks,
//! per flag, whether the trunk caused the current setting.
//!
//! The transition logic is a pure function so it can be tested in isolation.

/// Whether the trunk is responsible for a flag currently being set on a
/// member interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagOrigin {
    /// The trunk did not set this flag; either it is clear, or the
    /// physical layer set it on its own.
    #[default]
    NotSetByTrunk,
    /// The trunk set this flag and must clear it on detach.
    SetByTrunk,
}

/// The underlying driver call a transition requires, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagAction {
    /// Invoke the driver's set path.
    Set,
    /// Invoke the driver's clear path.
    Clear,
}

/// Computes the new origin marker and the driver action (invoked exactly
/// once per real change) for one mirrored flag.
///
/// `currently_set` is the flag's live value on the member interface and
/// `desired` is the trunk's wanted state.
pub fn flag_transition(
    origin: FlagOrigin,
    currently_set: bool,
    desired: bool,
) -> (FlagOrigin, Option<FlagAction>) {
    match (origin, currently_set, desired) {
        // Wanted and already set: if the trunk caused it, nothing changes;
        // if the driver set it independently, the trunk stays out of it.
        (origin, true, true) => (origin, None),

        // Wanted but clear: the trunk sets it and records responsibility.
        (_, false, true) => (FlagOrigin::SetByTrunk, Some(FlagAction::Set)),

        // Unwanted and trunk-caused: clear and drop responsibility.
        (FlagOrigin::SetByTrunk, true, false) => {
            (FlagOrigin::NotSetByTrunk, Some(FlagAction::Clear))
        }

        // Unwanted but the driver owns it (or it is already clear):
        // leave the interface alone.
        (FlagOrigin::NotSetByTrunk, _, false) => (FlagOrigin::NotSetByTrunk, None),

        // Trunk-caused marker with the flag already clear means the driver
        // cleared it underneath us; just drop the marker.
        (FlagOrigin::SetByTrunk, false, false) => (FlagOrigin::NotSetByTrunk, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_when_clear() {
        assert_eq!(
            flag_transition(FlagOrigin::NotSetByTrunk, false, true),
            (FlagOrigin::SetByTrunk, Some(FlagAction::Set))
        );
    }

    #[test]
    fn test_independent_set_is_left_alone() {
        // Driver already holds the flag: trunk takes no responsibility...
        assert_eq!(
            flag_transition(FlagOrigin::NotSetByTrunk, true, true),
            (FlagOrigin::NotSetByTrunk, None)
        );
        // ...and therefore never clears it.
        assert_eq!(
            flag_transition(FlagOrigin::NotSetByTrunk, true, false),
            (FlagOrigin::NotSetByTrunk, None)
        );
    }

    #[test]
    fn test_clear_only_when_trunk_caused() {
        assert_eq!(
            flag_transition(FlagOrigin::SetByTrunk, true, false),
            (FlagOrigin::NotSetByTrunk, Some(FlagAction::Clear))
        );
    }

    #[test]
    fn test_no_double_set() {
        // Trunk already set it; asking again is a no-op.
        assert_eq!(
            flag_transition(FlagOrigin::SetByTrunk, true, true),
            (FlagOrigin::SetByTrunk, None)
        );
    }

    #[test]
    fn test_driver_cleared_underneath() {
        assert_eq!(
            flag_transition(FlagOrigin::SetByTrunk, false, false),
            (FlagOrigin::NotSetByTrunk, None)
        );
    }
}
