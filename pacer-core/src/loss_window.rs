use crate::defaults::DEFAULT_LOSS_WINDOW_SPAN;
use thiserror::Error;

/// smallest span, in sequence numbers, the window can track
pub const MIN_SPAN: u16 = 8;
/// largest span, in sequence numbers, the window can track
pub const MAX_SPAN: u16 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LossWindowError {
    #[error("Loss window span must be a multiple of 8 in [{MIN_SPAN}, {MAX_SPAN}], got {0}")]
    InvalidSpan(u16),
}

/// Sliding bitmap over the most recent sequence numbers.
///
/// The window keeps one bit per sequence number for the last `span`
/// numbers below (and including) the highest one received so far. When
/// the high-water mark advances, the bits of the numbers leaving the
/// window are inspected: a number which was never marked received is
/// counted as lost. Arrivals that are late but still inside the window
/// simply set their bit, so moderate reordering does not count as loss.
///
/// Sequence numbers wrap around at `u32::MAX`.
///
/// ```
/// # use pacer_core::LossWindow;
/// let mut window = LossWindow::new(8).unwrap();
/// for seq in (0..20).filter(|seq| *seq != 2) {
///     window.notify_received(seq);
/// }
/// assert_eq!(window.lost(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct LossWindow {
    bitmap: Vec<u8>,
    highest: Option<u32>,
    /// position of `highest` on a line that does not wrap
    position: u64,
    lost: u32,
}

/// first position handed out, far enough from zero that the tracked
/// numbers below it never underflow
const ORIGIN: u64 = 1 << 32;

impl LossWindow {
    pub fn new(span: u16) -> Result<Self, LossWindowError> {
        let mut window = Self {
            bitmap: Vec::new(),
            highest: None,
            position: ORIGIN,
            lost: 0,
        };
        window.set_bitmap_size(span)?;
        Ok(window)
    }

    /// number of sequence numbers tracked by the window
    pub fn bitmap_size(&self) -> u16 {
        (self.bitmap.len() * 8) as u16
    }

    /// Resize the window.
    ///
    /// The bitmap is reset: numbers that were still being tracked can no
    /// longer be reported lost. The lost counter and the high-water mark
    /// are preserved.
    pub fn set_bitmap_size(&mut self, span: u16) -> Result<(), LossWindowError> {
        if !(MIN_SPAN..=MAX_SPAN).contains(&span) || span % 8 != 0 {
            return Err(LossWindowError::InvalidSpan(span));
        }
        self.bitmap = vec![0xff; usize::from(span / 8)];
        Ok(())
    }

    /// cumulative count of numbers that left the window unreceived
    #[inline]
    pub fn lost(&self) -> u32 {
        self.lost
    }

    /// the high-water mark, `None` until something was received
    #[inline]
    pub fn highest(&self) -> Option<u32> {
        self.highest
    }

    #[inline]
    fn span(&self) -> u32 {
        (self.bitmap.len() * 8) as u32
    }

    #[inline]
    fn slot(&self, position: u64) -> (usize, u8) {
        let index = (position % u64::from(self.span())) as usize;
        (index / 8, 0x80 >> (index % 8))
    }

    #[inline]
    fn bit(&self, position: u64) -> bool {
        let (byte, mask) = self.slot(position);
        self.bitmap[byte] & mask != 0
    }

    #[inline]
    fn set_bit(&mut self, position: u64, value: bool) {
        let (byte, mask) = self.slot(position);
        if value {
            self.bitmap[byte] |= mask;
        } else {
            self.bitmap[byte] &= !mask;
        }
    }

    pub fn notify_received(&mut self, seq: u32) {
        let Some(highest) = self.highest else {
            // the session starts at `0`: everything before `seq` is due
            let ahead = seq.wrapping_add(1);
            if ahead < (1 << 31) {
                self.advance(self.position - u64::from(ahead), ahead);
            }
            self.highest = Some(seq);
            self.set_bit(self.position, true);
            return;
        };

        let ahead = seq.wrapping_sub(highest);
        let behind = highest.wrapping_sub(seq);
        if ahead != 0 && ahead < (1 << 31) {
            self.advance(self.position, ahead);
            self.position += u64::from(ahead);
            self.highest = Some(seq);
            self.set_bit(self.position, true);
        } else if behind < self.span() {
            self.set_bit(self.position - u64::from(behind), true);
        } else {
            tracing::trace!(seq, highest, "arrival older than the loss window");
        }
    }

    /// move the high-water mark `distance` numbers past `from`
    fn advance(&mut self, from: u64, distance: u32) {
        let span = self.span();

        if distance >= span {
            // every tracked number leaves the window, plus the ones that
            // were skipped without ever entering it
            let pending: u32 = self.bitmap.iter().map(|byte| byte.count_zeros()).sum();
            self.record_lost(pending.saturating_add(distance - span));
            self.bitmap.fill(0);
            return;
        }

        for step in 1..=u64::from(distance) {
            let position = from + step;
            if !self.bit(position) {
                self.record_lost(1);
            }
            self.set_bit(position, false);
        }
    }

    fn record_lost(&mut self, count: u32) {
        if count > 0 {
            tracing::trace!(count, "sequence numbers left the loss window unreceived");
        }
        self.lost = self.lost.saturating_add(count);
    }
}

impl Default for LossWindow {
    fn default() -> Self {
        Self {
            bitmap: vec![0xff; usize::from(DEFAULT_LOSS_WINDOW_SPAN / 8)],
            highest: None,
            position: ORIGIN,
            lost: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_validation() {
        assert!(LossWindow::new(8).is_ok());
        assert!(LossWindow::new(256).is_ok());
        assert_eq!(LossWindow::new(0).unwrap_err(), LossWindowError::InvalidSpan(0));
        assert_eq!(LossWindow::new(12).unwrap_err(), LossWindowError::InvalidSpan(12));
        assert_eq!(LossWindow::new(264).unwrap_err(), LossWindowError::InvalidSpan(264));
        assert_eq!(
            LossWindow::new(12).unwrap_err().to_string(),
            "Loss window span must be a multiple of 8 in [8, 256], got 12"
        );
    }

    #[test]
    fn default_span() {
        assert_eq!(LossWindow::default().bitmap_size(), 32);
    }

    #[test]
    fn bitmap_size() {
        let mut window = LossWindow::new(32).unwrap();
        assert_eq!(window.bitmap_size(), 32);
        window.set_bitmap_size(64).unwrap();
        assert_eq!(window.bitmap_size(), 64);
        assert!(window.set_bitmap_size(65).is_err());
        assert_eq!(window.bitmap_size(), 64);
    }

    #[test]
    fn no_gaps() {
        let mut window = LossWindow::new(32).unwrap();
        for seq in 0..1_000 {
            window.notify_received(seq);
        }
        assert_eq!(window.lost(), 0);
        assert_eq!(window.highest(), Some(999));
    }

    #[test]
    fn single_gap_ages_out() {
        let mut window = LossWindow::new(8).unwrap();
        for seq in (0..=6).filter(|seq| *seq != 2) {
            window.notify_received(seq);
        }
        // still inside the window: not counted yet
        assert_eq!(window.lost(), 0);

        for seq in 7..=20 {
            window.notify_received(seq);
        }
        assert_eq!(window.lost(), 1);
    }

    #[test]
    fn reordering_inside_window_is_not_loss() {
        let mut window = LossWindow::new(16).unwrap();
        for seq in [0, 1, 3, 4, 2, 6, 5, 7] {
            window.notify_received(seq);
        }
        for seq in 8..100 {
            window.notify_received(seq);
        }
        assert_eq!(window.lost(), 0);
    }

    #[test]
    fn late_arrival_outside_window_is_ignored() {
        let mut window = LossWindow::new(8).unwrap();
        for seq in (0..30).filter(|seq| *seq != 3) {
            window.notify_received(seq);
        }
        assert_eq!(window.lost(), 1);

        window.notify_received(3);
        assert_eq!(window.lost(), 1);
        assert_eq!(window.highest(), Some(29));
    }

    #[test]
    fn duplicates_are_harmless() {
        let mut window = LossWindow::new(8).unwrap();
        for seq in [0, 0, 1, 1, 2, 2] {
            window.notify_received(seq);
        }
        for seq in 3..40 {
            window.notify_received(seq);
        }
        assert_eq!(window.lost(), 0);
    }

    #[test]
    fn large_jump() {
        let mut window = LossWindow::new(8).unwrap();
        window.notify_received(0);
        window.notify_received(100);
        // 1..=99 were never received; 93..=99 are still tracked
        assert_eq!(window.lost(), 92);

        for seq in 101..=108 {
            window.notify_received(seq);
        }
        assert_eq!(window.lost(), 99);
    }

    #[test]
    fn first_arrival_late_in_sequence() {
        let mut window = LossWindow::new(8).unwrap();
        window.notify_received(3);
        for seq in 4..=11 {
            window.notify_received(seq);
        }
        // 0, 1 and 2 aged out without being received
        assert_eq!(window.lost(), 3);
    }

    #[test]
    fn wraps_around() {
        let mut window = LossWindow::new(8).unwrap();
        let mut seq = u32::MAX - 20;
        window.notify_received(seq);
        assert_eq!(window.lost(), 0);

        for _ in 0..40 {
            seq = seq.wrapping_add(1);
            if seq != 1 {
                window.notify_received(seq);
            }
        }
        assert_eq!(window.lost(), 1);
        assert_eq!(window.highest(), Some(19));
    }

    #[test]
    fn wraps_around_with_uneven_span() {
        let mut window = LossWindow::new(24).unwrap();
        let mut seq = u32::MAX - 50;
        for _ in 0..100 {
            if seq != 3 {
                window.notify_received(seq);
            }
            seq = seq.wrapping_add(1);
        }
        assert_eq!(window.lost(), 1);
        assert_eq!(window.highest(), Some(48));
    }

    #[test]
    fn resize_keeps_counter() {
        let mut window = LossWindow::new(8).unwrap();
        for seq in (0..20).filter(|seq| *seq != 5) {
            window.notify_received(seq);
        }
        assert_eq!(window.lost(), 1);
        window.set_bitmap_size(16).unwrap();
        assert_eq!(window.lost(), 1);
        assert_eq!(window.highest(), Some(19));
    }
}
