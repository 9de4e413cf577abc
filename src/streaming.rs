//! Response relay for proxied bodies.
//!
//! Upstream frames are forwarded as soon as they arrive. Frames larger than the
//! configured chunk size are split (zero-copy) so no single write exceeds it;
//! smaller frames are never held back waiting to fill a chunk.

use async_stream::stream;
use bytes::Bytes;
use futures_util::Stream;

pub fn relay_chunks<S, E>(
    body: S,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let chunk_size = chunk_size.max(1);

    stream! {
        use futures_util::StreamExt;

        let mut body = std::pin::pin!(body);
        let mut relayed: u64 = 0;

        while let Some(frame) = body.next().await {
            match frame {
                Ok(mut chunk) => {
                    while chunk.len() > chunk_size {
                        let head = chunk.split_to(chunk_size);
                        relayed += head.len() as u64;
                        yield Ok(head);
                    }
                    if !chunk.is_empty() {
                        relayed += chunk.len() as u64;
                        yield Ok(chunk);
                    }
                }
                Err(e) => {
                    // No replay: the caller sees a truncated body
                    tracing::warn!(error = %e, relayed, "Upstream stream interrupted");
                    yield Err(std::io::Error::other(e.to_string()));
                    break;
                }
            }
        }

        tracing::debug!(relayed, "Upstream relay closed");
    }
}
