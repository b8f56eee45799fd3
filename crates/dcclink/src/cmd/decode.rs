use std::io::Read;

use dcclink_frame::{Frame, FrameError, FrameReader, MAX_FRAME_PAYLOAD};
use tracing::debug;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let file = std::fs::File::open(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;
    let max = args.max_payload.unwrap_or(MAX_FRAME_PAYLOAD);

    let (frames, trailing) = decode_all(std::io::BufReader::new(file), max)?;
    print_frames(&frames, format);

    if trailing > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{trailing} trailing bytes do not form a complete frame"),
        ));
    }
    Ok(SUCCESS)
}

/// Decode every complete frame in a capture. Returns the frames and the
/// number of bytes left over after the last one.
fn decode_all(capture: impl Read, max: usize) -> CliResult<(Vec<Frame>, usize)> {
    let mut reader = FrameReader::with_max_payload(capture, max);
    let mut frames = Vec::new();
    loop {
        match reader.next_frame() {
            Ok(Some(frame)) => {
                debug!(stream = frame.stream, len = frame.payload.len(), "decoded frame");
                frames.push(frame);
            }
            Ok(None) => return Ok((frames, 0)),
            Err(FrameError::ConnectionClosed) => return Ok((frames, reader.pending())),
            Err(err) => {
                return Err(frame_error(&format!("frame {} is corrupt", frames.len()), err));
            }
        }
    }
}
