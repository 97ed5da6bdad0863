use crate::{FrameError, HEADER_LEN, MAX_ARGS, MAX_MSG, read_u32};

/// Parse one request payload into its argument vector.
///
/// `body` must be exactly the payload announced by the frame header. The
/// parse succeeds iff the `argc` prefix fits, every argument length fits and
/// the arguments consume the payload exactly.
pub fn parse_request(body: &[u8]) -> Result<Vec<Vec<u8>>, FrameError> {
    let argc = read_u32(body, 0)?;
    if argc as usize > MAX_ARGS {
        return Err(FrameError::TooManyArgs(argc));
    }

    let mut args = Vec::with_capacity(argc as usize);
    let mut pos = 4;
    for _ in 0..argc {
        let len = read_u32(body, pos)? as usize;
        let arg = body.get(pos + 4..pos + 4 + len).ok_or(FrameError::Truncated)?;
        args.push(arg.to_vec());
        pos += 4 + len;
    }

    if pos != body.len() {
        return Err(FrameError::TrailingBytes(body.len() - pos));
    }
    Ok(args)
}

/// Build a complete request frame, header included.
///
/// Fails when the payload would exceed [`MAX_MSG`]; nothing that large is
/// worth putting on the wire since the server tears the connection down on
/// over-length frames.
pub fn encode_request<A: AsRef<[u8]>>(args: &[A]) -> Result<Vec<u8>, FrameError> {
    let payload_len = 4 + args.iter().map(|a| 4 + a.as_ref().len()).sum::<usize>();
    if payload_len > MAX_MSG {
        return Err(FrameError::Oversize(payload_len));
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload_len);
    frame.extend_from_slice(&(payload_len as u32).to_le_bytes());
    frame.extend_from_slice(&(args.len() as u32).to_le_bytes());
    for arg in args {
        let arg = arg.as_ref();
        frame.extend_from_slice(&(arg.len() as u32).to_le_bytes());
        frame.extend_from_slice(arg);
    }
    Ok(frame)
}
