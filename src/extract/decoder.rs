use std::io::{self, Read};

use zstd::stream::read::Decoder;

/// Decodes the first frame in `input`. Bytes after the frame's end are left
/// unread; a frame cut short reports `UnexpectedEof`.
pub fn decode_single_frame(input: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = Decoder::with_buffer(input)?.single_frame();
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
