//! Text-mode line-ending translation.
//!
//! In text mode, reads fold any of CR, LF, or CR LF into a single LF;
//! writes expand LF to the platform line separator (LF on POSIX, CR LF
//! on Windows). The translator keeps at most one raw look-ahead byte;
//! seeks and direction switches reset it.

/// Platform line separator used on text-mode writes.
#[cfg(windows)]
pub const LINE_SEP: &[u8] = b"\r\n";
#[cfg(not(windows))]
pub const LINE_SEP: &[u8] = b"\n";

/// Read-side translation state.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextState {
    /// Raw byte fetched by CR look-ahead but not yet delivered.
    pending: Option<u8>,
}

impl TextState {
    /// Take the buffered look-ahead byte, if any.
    pub fn take_pending(&mut self) -> Option<u8> {
        self.pending.take()
    }

    /// Stash a look-ahead byte that was not consumed by CR folding.
    pub fn set_pending(&mut self, byte: u8) {
        debug_assert!(self.pending.is_none());
        self.pending = Some(byte);
    }

    /// Forget translation state (seek or direction switch).
    pub fn reset(&mut self) {
        self.pending = None;
    }
}

/// Fold a raw byte plus optional look-ahead into a logical text byte.
///
/// Returns `(logical_byte, lookahead_needed)`. A CR requires one byte of
/// look-ahead to decide whether a following LF is part of the same line
/// ending; the caller fetches it and calls [`fold_crlf`].
pub fn needs_lookahead(raw: u8) -> bool {
    raw == b'\r'
}

/// Resolve a CR given the following raw byte (if any at eof).
///
/// Returns the byte to push back, if the look-ahead was not an LF.
pub fn fold_crlf(lookahead: Option<u8>) -> Option<u8> {
    match lookahead {
        Some(b'\n') | None => None,
        Some(other) => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cr_needs_lookahead() {
        assert!(needs_lookahead(b'\r'));
        assert!(!needs_lookahead(b'\n'));
        assert!(!needs_lookahead(b'a'));
    }

    #[test]
    fn test_crlf_consumes_lf() {
        assert_eq!(fold_crlf(Some(b'\n')), None);
    }

    #[test]
    fn test_lone_cr_pushes_back_next() {
        assert_eq!(fold_crlf(Some(b'x')), Some(b'x'));
    }

    #[test]
    fn test_cr_at_eof_folds_silently() {
        assert_eq!(fold_crlf(None), None);
    }

    #[test]
    fn test_pending_roundtrip() {
        let mut t = TextState::default();
        assert_eq!(t.take_pending(), None);
        t.set_pending(7);
        assert_eq!(t.take_pending(), Some(7));
        assert_eq!(t.take_pending(), None);
    }
}
