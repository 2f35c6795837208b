//! Two-Phase Optimistic Values
//!
//! A value that can be changed tentatively while the durable write is in
//! flight, then either confirmed or reverted to the last confirmed
//! snapshot. Used for profile edits (avatar, banner, details) that the UI
//! shows immediately.

/// Confirmed value plus at most one staged change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimistic<T> {
    confirmed: T,
    tentative: Option<T>,
}

impl<T: Clone> Optimistic<T> {
    /// Start from a confirmed value.
    pub fn new(value: T) -> Self {
        Self { confirmed: value, tentative: None }
    }

    /// The value callers should display: the staged one if any.
    pub fn current(&self) -> &T {
        self.tentative.as_ref().unwrap_or(&self.confirmed)
    }

    /// Last confirmed value.
    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    /// Whether a change is staged.
    pub fn is_pending(&self) -> bool {
        self.tentative.is_some()
    }

    /// Stage a change derived from the current value. A second `apply`
    /// before confirm/revert builds on the staged value; the rollback point
    /// stays the last confirmed one.
    pub fn apply<F>(&mut self, change: F) -> &T
    where
        F: FnOnce(&mut T),
    {
        let mut next = self.current().clone();
        change(&mut next);
        self.tentative.insert(next)
    }

    /// Commit the staged change. Returns `false` if nothing was staged.
    pub fn confirm(&mut self) -> bool {
        match self.tentative.take() {
            Some(value) => {
                self.confirmed = value;
                true
            }
            None => false,
        }
    }

    /// Drop the staged change. Returns `false` if nothing was staged.
    pub fn revert(&mut self) -> bool {
        self.tentative.take().is_some()
    }

    /// Replace the confirmed value outright (e.g. a fresh document
    /// snapshot from the store). Any staged change is discarded.
    pub fn reset(&mut self, value: T) {
        self.confirmed = value;
        self.tentative = None;
    }
}

impl<T: Clone + Default> Default for Optimistic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_then_confirm() {
        let mut v = Optimistic::new(String::from("old.png"));
        v.apply(|s| *s = "new.png".into());
        assert_eq!(v.current(), "new.png");
        assert_eq!(v.confirmed(), "old.png");
        assert!(v.is_pending());

        assert!(v.confirm());
        assert_eq!(v.confirmed(), "new.png");
        assert!(!v.is_pending());
    }

    #[test]
    fn test_apply_then_revert_restores_snapshot() {
        let mut v = Optimistic::new(vec![1, 2]);
        v.apply(|xs| xs.push(3));
        v.apply(|xs| xs.push(4));
        assert_eq!(v.current(), &vec![1, 2, 3, 4]);

        assert!(v.revert());
        assert_eq!(v.current(), &vec![1, 2]);
    }

    #[test]
    fn test_confirm_and_revert_without_stage() {
        let mut v = Optimistic::new(0u8);
        assert!(!v.confirm());
        assert!(!v.revert());
    }

    #[test]
    fn test_reset_discards_stage() {
        let mut v = Optimistic::new(1);
        v.apply(|x| *x = 2);
        v.reset(10);
        assert_eq!(*v.current(), 10);
        assert!(!v.is_pending());
    }
}
