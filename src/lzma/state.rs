//! Coder state machine.
//!
//! The state remembers the kinds of the last few symbols (literal, match,
//! rep, short rep). It selects the `is_match`/`is_rep*` probabilities and
//! whether a literal is coded against the byte at `rep0`.

use super::NUM_STATES;

/// One of the 12 coder states. States below 7 follow a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct State(u8);

impl State {
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_char(self) -> bool {
        self.0 < 7
    }

    #[inline]
    pub fn update_char(&mut self) {
        self.0 = match self.0 {
            0..=3 => 0,
            4..=9 => self.0 - 3,
            _ => self.0 - 6,
        };
    }

    #[inline]
    pub fn update_match(&mut self) {
        self.0 = if self.0 < 7 { 7 } else { 10 };
    }

    #[inline]
    pub fn update_rep(&mut self) {
        self.0 = if self.0 < 7 { 8 } else { 11 };
    }

    #[inline]
    pub fn update_short_rep(&mut self) {
        self.0 = if self.0 < 7 { 9 } else { 11 };
    }
}

const _: () = assert!(NUM_STATES == 12);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_stay_in_range() {
        for s in 0..NUM_STATES as u8 {
            let mut a = State(s);
            a.update_char();
            assert!(a.is_char());
            let mut b = State(s);
            b.update_match();
            let mut c = State(s);
            c.update_rep();
            let mut d = State(s);
            d.update_short_rep();
            for st in [b, c, d] {
                assert!(!st.is_char());
                assert!(st.index() < NUM_STATES);
            }
        }
    }

    #[test]
    fn test_literal_after_match() {
        let mut s = State::new();
        s.update_match();
        assert_eq!(s.index(), 7);
        s.update_char();
        assert_eq!(s.index(), 4);
        s.update_char();
        assert_eq!(s.index(), 1);
        s.update_char();
        assert_eq!(s.index(), 0);

        let mut s = State(11);
        s.update_char();
        assert_eq!(s.index(), 5);
    }
}
