//! New-block feed.
//!
//! Block hashes from the node are forwarded into a bounded channel that
//! the decision loop consumes. The forwarder never waits on the loop: when
//! the channel is full the block is dropped, since the loop only ever
//! wants the next block after its current cycle.

use ethers::types::H256;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use crate::types::BlockEvent;

/// Why [`forward_blocks`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEnd {
    /// The upstream stream finished (filter expired, connection lost).
    StreamEnded,
    /// The decision loop dropped its receiver.
    ReceiverGone,
}

/// Pump block hashes from `stream` into `tx` until either side ends.
pub async fn forward_blocks<S>(stream: S, tx: &mpsc::Sender<BlockEvent>) -> FeedEnd
where
    S: Stream<Item = H256>,
{
    futures::pin_mut!(stream);
    while let Some(hash) = stream.next().await {
        match tx.try_send(BlockEvent::new(hash)) {
            Ok(()) => trace!(block = ?hash, "Block forwarded"),
            Err(TrySendError::Full(_)) => {
                debug!(block = ?hash, "Decision loop busy, dropping block")
            }
            Err(TrySendError::Closed(_)) => return FeedEnd::ReceiverGone,
        }
    }
    FeedEnd::StreamEnded
}
