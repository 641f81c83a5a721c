//! PKCS#1 v1.5 encryption-block construction: the conforming layout
//! `00 02 || PS || 00 || D` plus the deliberately damaged variants used to
//! exercise padding oracles, and the strict unpadder.

use rand::{thread_rng, Rng};
use thiserror::Error;

/// Mandatory minimum length of the random padding string PS.
pub const MIN_PAD_LEN: usize = 8;

/// Header, minimum PS and delimiter: the bytes a cleartext can never use.
const OVERHEAD: usize = MIN_PAD_LEN + 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaddingError {
    #[error("cleartext of {len} bytes exceeds the {max} bytes this key width allows")]
    CleartextTooLong { len: usize, max: usize },
    #[error("pad overlay {index}..{end} leaves the valid padding region of a {k} byte message")]
    PadOutOfBounds { index: usize, end: usize, k: usize },
    #[error("message is not PKCS#1 v1.5 conforming")]
    NotConforming,
    #[error("unknown padding variant {0}, expected 1-5")]
    UnknownVariant(u8),
}

/// Builds `k`-byte PKCS#1 v1.5 messages for a key width of `k` bytes.
#[derive(Debug, Clone, Copy)]
pub struct Pkcs1v15 {
    k: usize,
}

impl Pkcs1v15 {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Key width in bytes.
    pub fn width(&self) -> usize {
        self.k
    }

    fn delimiter_index(&self, cleartext: &[u8]) -> usize {
        self.k - cleartext.len() - 1
    }

    /// `00 02 || PS || 00 || D` with every PS byte random and nonzero.
    pub fn conforming_message(&self, cleartext: &[u8]) -> Result<Vec<u8>, PaddingError> {
        if cleartext.len() + OVERHEAD > self.k {
            return Err(PaddingError::CleartextTooLong {
                len: cleartext.len(),
                max: self.k.saturating_sub(OVERHEAD),
            });
        }
        let mut rng = thread_rng();
        let pad_len = self.k - cleartext.len() - 3;
        let mut message = Vec::with_capacity(self.k);
        message.push(0x00);
        message.push(0x02);
        message.extend((0..pad_len).map(|_| rng.gen_range(1..=255_u8)));
        message.push(0x00);
        message.extend_from_slice(cleartext);
        Ok(message)
    }

    /// Conforming at the header level, but with `extra` additional `00`
    /// bytes overlaid into PS/D. With `index: None` the overlay anchors at
    /// the delimiter: backward into PS when `pad_back`, forward into the
    /// payload otherwise.
    pub fn conforming_consecutive_null_bytes(
        &self,
        cleartext: &[u8],
        index: Option<usize>,
        extra: usize,
        pad_back: bool,
    ) -> Result<Vec<u8>, PaddingError> {
        let mut message = self.conforming_message(cleartext)?;
        let delimiter = self.delimiter_index(cleartext);
        let start = match index {
            Some(index) => index,
            None if pad_back => delimiter.saturating_sub(extra),
            None => delimiter + 1,
        };
        let end = start + extra;
        // The overlay must stay past the header and inside the message
        if start < 2 || end > self.k {
            return Err(PaddingError::PadOutOfBounds {
                index: start,
                end,
                k: self.k,
            });
        }
        for byte in &mut message[start..end] {
            *byte = 0x00;
        }
        Ok(message)
    }

    /// Replaces the leading `00 02` with an arbitrary two-byte header.
    pub fn non_conforming_message_header(
        &self,
        cleartext: &[u8],
        header: [u8; 2],
    ) -> Result<Vec<u8>, PaddingError> {
        let mut message = self.conforming_message(cleartext)?;
        message[0] = header[0];
        message[1] = header[1];
        Ok(message)
    }

    /// Zeroes one byte inside the eight mandatory padding bytes.
    pub fn non_conforming_padding_length(
        &self,
        cleartext: &[u8],
        byte_index: usize,
    ) -> Result<Vec<u8>, PaddingError> {
        if byte_index >= MIN_PAD_LEN {
            return Err(PaddingError::PadOutOfBounds {
                index: 2 + byte_index,
                end: 2 + byte_index + 1,
                k: self.k,
            });
        }
        let mut message = self.conforming_message(cleartext)?;
        message[2 + byte_index] = 0x00;
        Ok(message)
    }

    /// Overwrites the `00` delimiter with a nonzero byte.
    pub fn non_conforming_no_delimiter(
        &self,
        cleartext: &[u8],
        replacement: u8,
    ) -> Result<Vec<u8>, PaddingError> {
        let mut message = self.conforming_message(cleartext)?;
        let delimiter = self.delimiter_index(cleartext);
        message[delimiter] = replacement;
        Ok(message)
    }

    /// The numeric selectors the command-line test client exposes.
    pub fn variant(&self, selector: u8, cleartext: &[u8]) -> Result<Vec<u8>, PaddingError> {
        match selector {
            1 => self.conforming_message(cleartext),
            2 => self.conforming_consecutive_null_bytes(cleartext, None, 2, true),
            3 => self.non_conforming_message_header(cleartext, [0x00, 0x01]),
            4 => self.non_conforming_padding_length(cleartext, 3),
            5 => self.non_conforming_no_delimiter(cleartext, 0xff),
            other => Err(PaddingError::UnknownVariant(other)),
        }
    }

    /// Strict inverse of [`conforming_message`]: checks the header, at
    /// least eight nonzero padding bytes and the delimiter, and returns
    /// the payload.
    ///
    /// [`conforming_message`]: Self::conforming_message
    pub fn unpad(&self, message: &[u8]) -> Result<Vec<u8>, PaddingError> {
        if self.k < OVERHEAD || message.len() != self.k {
            return Err(PaddingError::NotConforming);
        }
        if message[0] != 0x00 || message[1] != 0x02 {
            return Err(PaddingError::NotConforming);
        }
        let delimiter = message[2..]
            .iter()
            .position(|&byte| byte == 0x00)
            .map(|offset| offset + 2)
            .ok_or(PaddingError::NotConforming)?;
        if delimiter < 2 + MIN_PAD_LEN {
            return Err(PaddingError::NotConforming);
        }
        Ok(message[delimiter + 1..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: usize = 128;

    #[test]
    fn conforming_layout() {
        let pkcs1 = Pkcs1v15::new(K);
        let payload = [0x41_u8; 20];
        let message = pkcs1.conforming_message(&payload).unwrap();
        assert_eq!(message.len(), K);
        assert_eq!(&message[..2], &[0x00, 0x02]);
        // no 0x00 anywhere in PS
        assert!(message[2..K - payload.len() - 1].iter().all(|&b| b != 0x00));
        // delimiter exactly where the payload starts
        assert_eq!(message[K - payload.len() - 1], 0x00);
        assert_eq!(&message[K - payload.len()..], &payload);
    }

    #[test]
    fn cleartext_length_boundary() {
        let pkcs1 = Pkcs1v15::new(K);
        let exact = vec![0x42_u8; K - 11];
        assert!(pkcs1.conforming_message(&exact).is_ok());
        let too_long = vec![0x42_u8; K - 10];
        assert_eq!(
            pkcs1.conforming_message(&too_long),
            Err(PaddingError::CleartextTooLong {
                len: K - 10,
                max: K - 11
            })
        );
    }

    #[test]
    fn round_trip() {
        let pkcs1 = Pkcs1v15::new(K);
        for len in [0, 1, 37, K - 11] {
            let payload = vec![0x5a_u8; len];
            let message = pkcs1.conforming_message(&payload).unwrap();
            assert_eq!(pkcs1.unpad(&message).unwrap(), payload);
        }
    }

    #[test]
    fn unpad_rejects_short_padding() {
        let pkcs1 = Pkcs1v15::new(16);
        // delimiter after only 5 padding bytes
        let message = [0x00, 0x02, 9, 9, 9, 9, 9, 0x00, 1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(pkcs1.unpad(&message), Err(PaddingError::NotConforming));
    }

    #[test]
    fn consecutive_nulls_extend_the_delimiter_run() {
        let pkcs1 = Pkcs1v15::new(K);
        let payload = [0x41_u8; 16];
        let extra = 3;
        let message = pkcs1
            .conforming_consecutive_null_bytes(&payload, None, extra, true)
            .unwrap();
        let delimiter = K - payload.len() - 1;
        for byte in &message[delimiter - extra..=delimiter] {
            assert_eq!(*byte, 0x00);
        }
        // still header-conforming
        assert_eq!(&message[..2], &[0x00, 0x02]);
    }

    #[test]
    fn consecutive_nulls_at_explicit_index() {
        let pkcs1 = Pkcs1v15::new(K);
        let message = pkcs1
            .conforming_consecutive_null_bytes(&[0x41; 4], Some(40), 4, false)
            .unwrap();
        assert_eq!(&message[40..44], &[0x00; 4]);
    }

    #[test]
    fn consecutive_nulls_overlay_bounds() {
        let pkcs1 = Pkcs1v15::new(16);
        assert_eq!(
            pkcs1.conforming_consecutive_null_bytes(&[0x41; 2], Some(1), 2, false),
            Err(PaddingError::PadOutOfBounds {
                index: 1,
                end: 3,
                k: 16
            })
        );
        assert!(matches!(
            pkcs1.conforming_consecutive_null_bytes(&[0x41; 2], Some(15), 4, false),
            Err(PaddingError::PadOutOfBounds { .. })
        ));
    }

    #[test]
    fn wrong_header_variant() {
        let pkcs1 = Pkcs1v15::new(K);
        let message = pkcs1
            .non_conforming_message_header(&[0x41; 8], [0x00, 0x01])
            .unwrap();
        assert_eq!(&message[..2], &[0x00, 0x01]);
        // everything after the header still parses as padding + payload
        let mut fixed = message.clone();
        fixed[1] = 0x02;
        assert_eq!(pkcs1.unpad(&fixed).unwrap(), vec![0x41; 8]);
    }

    #[test]
    fn null_inside_mandatory_padding_variant() {
        let pkcs1 = Pkcs1v15::new(K);
        let message = pkcs1
            .non_conforming_padding_length(&[0x41; 8], 3)
            .unwrap();
        assert_eq!(message[5], 0x00);
        assert_eq!(pkcs1.unpad(&message), Err(PaddingError::NotConforming));
        assert!(matches!(
            pkcs1.non_conforming_padding_length(&[0x41; 8], 8),
            Err(PaddingError::PadOutOfBounds { .. })
        ));
    }

    #[test]
    fn missing_delimiter_variant() {
        let pkcs1 = Pkcs1v15::new(K);
        let payload = [0x41_u8; 8];
        let message = pkcs1
            .non_conforming_no_delimiter(&payload, 0xff)
            .unwrap();
        let delimiter = K - payload.len() - 1;
        assert_eq!(message[delimiter], 0xff);
        // the payload is all nonzero, so no delimiter remains anywhere
        assert_eq!(pkcs1.unpad(&message), Err(PaddingError::NotConforming));
    }

    #[test]
    fn variant_dispatch() {
        let pkcs1 = Pkcs1v15::new(K);
        for selector in 1..=5 {
            assert!(pkcs1.variant(selector, &[0x41; 4]).is_ok());
        }
        assert_eq!(
            pkcs1.variant(6, &[0x41; 4]),
            Err(PaddingError::UnknownVariant(6))
        );
    }
}
