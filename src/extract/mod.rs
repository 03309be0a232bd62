//! Single-frame extraction at a scanned offset.
//!
//! Two bounding policies are supported. `Unbounded` hands the decoder
//! everything from the signature to the container end and relies on it to
//! stop at the frame's end marker. `Windowed` restricts the input to the
//! location's `end_offset` and discards blocks below the minimum size
//! before any decode is attempted.

pub mod decoder;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scanner::FrameLocation;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundPolicy {
    #[default]
    Unbounded,
    Windowed,
}

impl BoundPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundPolicy::Unbounded => "unbounded",
            BoundPolicy::Windowed => "windowed",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("frame offset {offset} is outside the container ({len} bytes)")]
    OutOfRange { offset: u64, len: u64 },
    #[error("block of {size} bytes is below the {min} byte minimum")]
    BelowMinimum { size: u64, min: u64 },
    #[error("decode error: {0}")]
    Decode(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct FrameExtractor {
    policy: BoundPolicy,
    min_block_size: u64,
}

impl FrameExtractor {
    pub fn new(policy: BoundPolicy, min_block_size: u64) -> Self {
        Self {
            policy,
            min_block_size,
        }
    }

    pub fn policy(&self) -> BoundPolicy {
        self.policy
    }

    /// The input bytes handed to the decoder for this location.
    pub fn frame_input<'a>(
        &self,
        data: &'a [u8],
        location: &FrameLocation,
    ) -> Result<&'a [u8], ExtractError> {
        let len = data.len() as u64;
        if location.start_offset >= len {
            return Err(ExtractError::OutOfRange {
                offset: location.start_offset,
                len,
            });
        }
        let start = location.start_offset as usize;
        match self.policy {
            BoundPolicy::Unbounded => Ok(&data[start..]),
            BoundPolicy::Windowed => {
                let end = location.end_offset.unwrap_or(len).min(len).max(location.start_offset);
                let size = end - location.start_offset;
                if size < self.min_block_size {
                    return Err(ExtractError::BelowMinimum {
                        size,
                        min: self.min_block_size,
                    });
                }
                Ok(&data[start..end as usize])
            }
        }
    }

    pub fn decode(&self, input: &[u8]) -> Result<Vec<u8>, ExtractError> {
        Ok(decoder::decode_single_frame(input)?)
    }

    pub fn extract(&self, data: &[u8], location: &FrameLocation) -> Result<Vec<u8>, ExtractError> {
        let input = self.frame_input(data, location)?;
        self.decode(input)
    }
}
