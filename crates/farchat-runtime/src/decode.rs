//! Streaming Text Decoding
//!
//! Network chunks can split a multi-byte character; the decoder holds the
//! incomplete tail until the rest arrives.

use std::pin::Pin;

use futures::{Stream, StreamExt};

use farchat_core::{FarchatError, Result};

/// Stream of decoded text chunks
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Incremental UTF-8 decoder. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much of the buffered input as forms complete characters
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            let err = match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => err,
            };

            let valid = err.valid_up_to();
            out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));

            match err.error_len() {
                Some(len) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid + len);
                }
                None => {
                    self.pending.drain(..valid);
                    break;
                }
            }
        }

        out
    }

    /// Flush whatever is left at end of stream
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Turn a byte stream into a text stream, dropping empty chunks.
///
/// A transport error ends the stream after being yielded once.
pub fn decode_utf8<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let state = (Box::pin(bytes), Utf8Decoder::default(), false);

    Box::pin(futures::stream::unfold(
        state,
        |(mut inner, mut decoder, finished)| async move {
            if finished {
                return None;
            }

            loop {
                match inner.next().await {
                    Some(Ok(chunk)) => {
                        let text = decoder.push(chunk.as_ref());
                        if !text.is_empty() {
                            return Some((Ok(text), (inner, decoder, false)));
                        }
                    }
                    Some(Err(e)) => {
                        let err = FarchatError::Http(e.to_string());
                        return Some((Err(err), (inner, decoder, true)));
                    }
                    None => {
                        let rest = decoder.finish();
                        return (!rest.is_empty()).then(|| (Ok(rest), (inner, decoder, true)));
                    }
                }
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multibyte_character() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.push(b"caf"), "caf");
        assert_eq!(decoder.push(&[0xC3]), "");
        assert_eq!(decoder.push(&[0xA9, b'!']), "\u{e9}!");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.push(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_tail_is_flushed_lossily() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.push(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[tokio::test]
    async fn test_decode_stream() {
        let chunks: Vec<std::result::Result<Vec<u8>, String>> = vec![
            Ok(b"FAR ".to_vec()),
            Ok(vec![0xC2]),
            Ok(vec![0xA7, b'1']),
        ];
        let text: Vec<String> = decode_utf8(futures::stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(text, vec!["FAR ".to_string(), "\u{a7}1".to_string()]);
    }

    #[tokio::test]
    async fn test_decode_stream_stops_after_error() {
        let chunks: Vec<std::result::Result<Vec<u8>, String>> = vec![
            Ok(b"partial".to_vec()),
            Err("connection reset".into()),
            Ok(b"never".to_vec()),
        ];
        let items: Vec<Result<String>> = decode_utf8(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(FarchatError::Http(_))));
    }
}
