use std::collections::BTreeMap;

/// Global turn counter plus the actions waiting for a future turn.
///
/// Actions are handed back to the caller by [`TurnNotifier::advance`] instead of
/// being invoked here, so a fired action can register follow-ups without
/// re-entering the notifier. Follow-ups always land on a later turn.
#[derive(Debug)]
pub struct TurnNotifier<A> {
    current_turn: u64,
    next_sequence: u64,
    pending: BTreeMap<u64, Vec<PendingTurn<A>>>,
}

#[derive(Debug)]
struct PendingTurn<A> {
    sequence: u64,
    action: A,
}

impl<A> Default for TurnNotifier<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> TurnNotifier<A> {
    pub fn new() -> Self {
        Self {
            current_turn: 0,
            next_sequence: 0,
            pending: BTreeMap::new(),
        }
    }

    pub fn current_turn(&self) -> u64 {
        self.current_turn
    }

    /// Registers `action` for turn `current + turns` and returns that target turn.
    /// A delay of zero still waits for the next [`advance`](Self::advance).
    pub fn notify_in_turns(&mut self, turns: u64, action: A) -> u64 {
        let target = self.current_turn.saturating_add(turns);
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.pending
            .entry(target)
            .or_default()
            .push(PendingTurn { sequence, action });
        target
    }

    /// Moves to the next turn and returns every action whose target turn has been
    /// reached, in registration order. Returned actions are no longer pending.
    pub fn advance(&mut self) -> Vec<A> {
        self.current_turn = self.current_turn.saturating_add(1);
        let later = self
            .pending
            .split_off(&self.current_turn.saturating_add(1));
        let due = std::mem::replace(&mut self.pending, later);

        let mut fired = due.into_values().flatten().collect::<Vec<_>>();
        fired.sort_by_key(|entry| entry.sequence);
        fired.into_iter().map(|entry| entry.action).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Turns left until the earliest pending action fires.
    pub fn turns_until_next(&self) -> Option<u64> {
        self.pending
            .keys()
            .next()
            .map(|target| target.saturating_sub(self.current_turn).max(1))
    }

    /// Drops every pending action matching `predicate`; returns how many were dropped.
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&A) -> bool) -> usize {
        let before = self.pending_count();
        for entries in self.pending.values_mut() {
            entries.retain(|entry| !predicate(&entry.action));
        }
        self.pending.retain(|_, entries| !entries.is_empty());
        before - self.pending_count()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_exactly_n_advances() {
        let mut notifier = TurnNotifier::new();
        notifier.notify_in_turns(3, "late");

        assert!(notifier.advance().is_empty());
        assert!(notifier.advance().is_empty());
        assert_eq!(notifier.advance(), vec!["late"]);
        assert!(notifier.advance().is_empty());
        assert_eq!(notifier.pending_count(), 0);
    }

    #[test]
    fn zero_and_one_both_fire_on_next_advance() {
        let mut notifier = TurnNotifier::new();
        notifier.notify_in_turns(0, 0);
        notifier.notify_in_turns(1, 1);

        assert_eq!(notifier.advance(), vec![0, 1]);
        assert_eq!(notifier.current_turn(), 1);
    }

    #[test]
    fn same_turn_fires_in_registration_order() {
        let mut notifier = TurnNotifier::new();
        notifier.notify_in_turns(2, "a");
        notifier.advance();
        notifier.notify_in_turns(1, "b");
        notifier.notify_in_turns(0, "c");

        assert_eq!(notifier.advance(), vec!["a", "b", "c"]);
    }

    #[test]
    fn registration_during_dispatch_waits_for_later_turn() {
        let mut notifier = TurnNotifier::new();
        notifier.notify_in_turns(1, "first");

        let fired = notifier.advance();
        assert_eq!(fired, vec!["first"]);
        for _ in fired {
            notifier.notify_in_turns(0, "follow_up");
        }
        assert_eq!(notifier.pending_count(), 1);
        assert_eq!(notifier.advance(), vec!["follow_up"]);
    }

    #[test]
    fn turns_until_next_reports_earliest_target() {
        let mut notifier = TurnNotifier::new();
        assert_eq!(notifier.turns_until_next(), None);
        notifier.notify_in_turns(5, ());
        notifier.notify_in_turns(2, ());
        assert_eq!(notifier.turns_until_next(), Some(2));
    }

    #[test]
    fn cancel_where_drops_only_matching_actions() {
        let mut notifier = TurnNotifier::new();
        notifier.notify_in_turns(1, 10);
        notifier.notify_in_turns(1, 11);
        notifier.notify_in_turns(4, 12);

        assert_eq!(notifier.cancel_where(|value| value % 2 == 0), 2);
        assert_eq!(notifier.advance(), vec![11]);
        assert_eq!(notifier.pending_count(), 0);
    }
}
