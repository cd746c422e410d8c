use bytes::BytesMut;

/// Upper bound on one assembled message. Room snapshots from large
/// multiworlds can be a few megabytes; anything beyond this is treated as
/// garbage and dropped.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    TooLarge { max: usize, got: usize },
    InvalidUtf8,
}

impl std::fmt::Display for SegmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentError::TooLarge { max, got } => {
                write!(f, "message too large: max {max}, got {got}")
            }
            SegmentError::InvalidUtf8 => write!(f, "message is not valid utf-8"),
        }
    }
}

impl std::error::Error for SegmentError {}

/// Buffers raw segment bytes until the terminal segment arrives.
///
/// Bytes (not `str`) are buffered so a multi-byte character split across two
/// segments still decodes once the message is complete.
#[derive(Debug)]
pub struct SegmentAssembler {
    buf: BytesMut,
    max_len: usize,
}

impl Default for SegmentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentAssembler {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
            max_len: DEFAULT_MAX_MESSAGE,
        }
    }

    pub fn max_len(mut self, max: usize) -> Self {
        self.max_len = max.max(1);
        self
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn is_idle(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append one segment.
    ///
    /// Returns:
    /// - `Ok(None)` while the message is still incomplete,
    /// - `Ok(Some(text))` once `last` is set,
    /// - `Err(..)` if the message overflowed or did not decode. The buffer is
    ///   reset in both error cases so the next message starts clean.
    pub fn push(&mut self, data: &[u8], last: bool) -> Result<Option<String>, SegmentError> {
        let got = self.buf.len() + data.len();
        if got > self.max_len {
            self.buf.clear();
            return Err(SegmentError::TooLarge {
                max: self.max_len,
                got,
            });
        }

        self.buf.extend_from_slice(data);
        if !last {
            return Ok(None);
        }

        let raw = self.buf.split().freeze();
        match std::str::from_utf8(&raw) {
            Ok(s) => Ok(Some(s.to_string())),
            Err(_) => Err(SegmentError::InvalidUtf8),
        }
    }

    pub fn push_text(&mut self, text: &str, last: bool) -> Result<Option<String>, SegmentError> {
        self.push(text.as_bytes(), last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSG: &str = r#"[{"cmd":"Print","text":"hello there"}]"#;

    #[test]
    fn three_partials_match_one_terminal() {
        let mut one = SegmentAssembler::new();
        let whole = one.push_text(MSG, true).unwrap().unwrap();

        let mut three = SegmentAssembler::new();
        assert_eq!(three.push_text(&MSG[..10], false).unwrap(), None);
        assert_eq!(three.push_text(&MSG[10..25], false).unwrap(), None);
        assert_eq!(three.buffered(), 25);
        let joined = three.push_text(&MSG[25..], true).unwrap().unwrap();

        assert_eq!(whole, joined);
        assert!(three.is_idle());
    }

    #[test]
    fn split_multibyte_character_survives() {
        let text = "[AP] caf\u{e9}";
        let bytes = text.as_bytes();
        let cut = bytes.len() - 1; // inside the two-byte e-acute

        let mut a = SegmentAssembler::new();
        assert_eq!(a.push(&bytes[..cut], false).unwrap(), None);
        assert_eq!(a.push(&bytes[cut..], true).unwrap().as_deref(), Some(text));
    }

    #[test]
    fn empty_terminal_segment_flushes() {
        let mut a = SegmentAssembler::new();
        a.push_text("[]", false).unwrap();
        assert_eq!(a.push(b"", true).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn overflow_resets_buffer() {
        let mut a = SegmentAssembler::new().max_len(8);
        a.push_text("12345", false).unwrap();
        let err = a.push_text("6789", false).unwrap_err();
        assert_eq!(err, SegmentError::TooLarge { max: 8, got: 9 });
        assert!(a.is_idle());

        assert_eq!(a.push_text("ok", true).unwrap().as_deref(), Some("ok"));
    }

    #[test]
    fn invalid_utf8_is_reported_and_cleared() {
        let mut a = SegmentAssembler::new();
        assert_eq!(a.push(&[0xff, 0xfe], true).unwrap_err(), SegmentError::InvalidUtf8);
        assert!(a.is_idle());
    }
}
