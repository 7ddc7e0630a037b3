use thiserror::Error;

/// Upstream contract violations detected during placement. Ordinary placement
/// failures (no room, offscreen, behind the camera) are not errors.
#[derive(Debug, Error, PartialEq)]
pub enum PlacementError {
    #[error("symbol {symbol_index} of bucket {bucket_instance_id} has no cross-tile id")]
    ZeroCrossTileId {
        bucket_instance_id: u32,
        symbol_index: usize,
    },
    #[error("bucket was never assigned an instance id")]
    ZeroBucketInstanceId,
    #[error("{kind} opacity vertex count {opacity} does not match layout vertex count {expected}")]
    OpacityLengthMismatch {
        kind: &'static str,
        opacity: usize,
        expected: usize,
    },
    #[error("previous placement has no recorded placement change time")]
    MissingPlacementChangeTime,
    #[error("viewport-y ordering requires the whole bucket in a single part")]
    SortedPartNotAtStart,
}
