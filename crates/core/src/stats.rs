//! Bounded-window rolling statistics over an inner expression.

use crate::expression::Expr;

/// Largest accepted window size. Enforced by the expression compiler;
/// re-checked here as a debug assertion.
pub const MAX_WINDOW: usize = 10_000;

/// A bounded window of the last N evaluations of an inner expression.
///
/// Both arrays are allocated once at construction; `update` performs no
/// allocation. All statistics are defined to be 0 before the first
/// update.
#[derive(Debug)]
pub struct ExpressionStats {
    expr: Expr,
    ring: Box<[f64]>,
    scratch: Box<[f64]>,
    count: usize,
    head: usize,
}

impl ExpressionStats {
    /// Create a window of capacity `window` over `expr`.
    pub fn new(expr: Expr, window: usize) -> ExpressionStats {
        debug_assert!(window >= 1 && window <= MAX_WINDOW);
        ExpressionStats {
            expr,
            ring: vec![0.0; window].into_boxed_slice(),
            scratch: vec![0.0; window].into_boxed_slice(),
            count: 0,
            head: 0,
        }
    }

    /// Window capacity N.
    pub fn window(&self) -> usize {
        self.ring.len()
    }

    /// Number of live values, saturating at the capacity.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Evaluate the inner expression once and append the value,
    /// overwriting the oldest value once the window is full.
    pub fn update(&mut self) {
        let value = self.expr.evaluate();
        self.ring[self.head] = value;
        self.head = (self.head + 1) % self.ring.len();
        if self.count < self.ring.len() {
            self.count += 1;
        }
    }

    fn live(&self) -> &[f64] {
        &self.ring[..self.count]
    }

    /// Mean of the live window.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.live().iter().sum::<f64>() / (self.count as f64)
    }

    /// Median of the live window; the average of the two middle values
    /// when the count is even. Sorts into the scratch array.
    pub fn median(&mut self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let scratch = &mut self.scratch[..self.count];
        scratch.copy_from_slice(&self.ring[..self.count]);
        scratch.sort_unstable_by(f64::total_cmp);
        if self.count % 2 == 1 {
            scratch[self.count / 2]
        } else {
            (scratch[self.count / 2 - 1] + scratch[self.count / 2]) / 2.0
        }
    }

    /// Smallest value in the live window.
    pub fn min(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.live().iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest value in the live window.
    pub fn max(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.live()
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// `max - min` over the live window.
    pub fn range(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.max() - self.min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{AnyElement, new_store};
    use crate::scalar::ElementType;

    fn elem_stats(window: usize) -> (AnyElement, ExpressionStats) {
        let store = new_store(8);
        let elem = AnyElement::new(ElementType::Float64, store, 0);
        let stats = ExpressionStats::new(Expr::Elem(elem.clone()), window);
        (elem, stats)
    }

    #[test]
    fn test_zero_before_first_update() {
        let (_, mut stats) = elem_stats(4);
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.median(), 0.0);
        assert_eq!(stats.min(), 0.0);
        assert_eq!(stats.max(), 0.0);
        assert_eq!(stats.range(), 0.0);
    }

    #[test]
    fn test_window_saturates() {
        let (elem, mut stats) = elem_stats(2);
        for v in [3.0, 5.0, 7.0] {
            elem.write_f64(v);
            stats.update();
        }
        // Oldest value (3) fell out of the window.
        assert_eq!(stats.count(), 2);
        assert_eq!(stats.mean(), 6.0);
        assert_eq!(stats.min(), 5.0);
        assert_eq!(stats.max(), 7.0);
        assert_eq!(stats.range(), 2.0);
    }

    #[test]
    fn test_partial_window() {
        let (elem, mut stats) = elem_stats(4);
        elem.write_f64(10.0);
        stats.update();
        assert_eq!(stats.count(), 1);
        assert_eq!(stats.mean(), 10.0);
        assert_eq!(stats.median(), 10.0);
        assert_eq!(stats.range(), 0.0);
    }

    #[test]
    fn test_median_even_and_odd() {
        let (elem, mut stats) = elem_stats(4);
        for v in [9.0, 1.0, 5.0] {
            elem.write_f64(v);
            stats.update();
        }
        assert_eq!(stats.median(), 5.0);
        elem.write_f64(3.0);
        stats.update();
        // Sorted window is [1, 3, 5, 9]; median is (3 + 5) / 2.
        assert_eq!(stats.median(), 4.0);
    }

    #[test]
    fn test_summarizes_last_n_evaluations() {
        let (elem, mut stats) = elem_stats(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            elem.write_f64(v);
            stats.update();
        }
        assert_eq!(stats.min(), 3.0);
        assert_eq!(stats.max(), 5.0);
        assert_eq!(stats.mean(), 4.0);
        assert_eq!(stats.median(), 4.0);
        assert_eq!(stats.range(), stats.max() - stats.min());
    }
}
