//! Clamped pointer over the ordered question list.

/// Position within an assessment's questions.
///
/// Every move clamps to `[0, len - 1]`; there is no wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigator {
    index: usize,
    len: usize,
}

impl Navigator {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.len
    }

    pub fn next(&mut self) -> usize {
        self.go_to(self.index.saturating_add(1))
    }

    pub fn prev(&mut self) -> usize {
        self.go_to(self.index.saturating_sub(1))
    }

    pub fn go_to(&mut self, index: usize) -> usize {
        self.index = index.min(self.len.saturating_sub(1));
        self.index
    }
}
