use crate::{FrameError, read_u32};

const TAG_NIL: u8 = b'0';
const TAG_ERR: u8 = b'1';
const TAG_STR: u8 = b'2';
const TAG_INT: u8 = b'3';
const TAG_ARR: u8 = b'4';

/// Error codes carried in ERR replies. Opaque to clients beyond display.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrCode {
    Unknown = 1,
    TooBig = 2,
    Type = 3,
    Arg = 4,
}

/// One reply value, modeled exactly as the wire's tagged union.
///
/// Arrays are variadic and heterogeneous; decoding recurses structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Err { code: u32, msg: Vec<u8> },
    Str(Vec<u8>),
    Int(i64),
    Arr(Vec<Reply>),
}

impl Reply {
    /// ERR reply with one of the well-known codes.
    pub fn err(code: ErrCode, msg: &str) -> Self {
        Self::Err { code: code as u32, msg: msg.as_bytes().to_vec() }
    }

    /// Append the serialized form to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Nil => out.push(TAG_NIL),
            Self::Err { code, msg } => {
                out.push(TAG_ERR);
                out.extend_from_slice(&code.to_le_bytes());
                out.extend_from_slice(&(msg.len() as u32).to_le_bytes());
                out.extend_from_slice(msg);
            }
            Self::Str(val) => {
                out.push(TAG_STR);
                out.extend_from_slice(&(val.len() as u32).to_le_bytes());
                out.extend_from_slice(val);
            }
            Self::Int(val) => {
                out.push(TAG_INT);
                out.extend_from_slice(&val.to_le_bytes());
            }
            Self::Arr(elems) => {
                out.push(TAG_ARR);
                out.extend_from_slice(&(elems.len() as u32).to_le_bytes());
                for elem in elems {
                    elem.encode(out);
                }
            }
        }
    }

    /// Decode one reply payload, requiring it to be consumed exactly.
    pub fn decode(body: &[u8]) -> Result<Self, FrameError> {
        let (reply, used) = Self::decode_at(body, 0)?;
        if used != body.len() {
            return Err(FrameError::TrailingBytes(body.len() - used));
        }
        Ok(reply)
    }

    /// Decode one value starting at `pos`, returning it and the position one
    /// past its last byte. ARR recurses over `count` children.
    fn decode_at(body: &[u8], pos: usize) -> Result<(Self, usize), FrameError> {
        let tag = *body.get(pos).ok_or(FrameError::Truncated)?;
        match tag {
            TAG_NIL => Ok((Self::Nil, pos + 1)),
            TAG_ERR => {
                let code = read_u32(body, pos + 1)?;
                let len = read_u32(body, pos + 5)? as usize;
                let msg = body.get(pos + 9..pos + 9 + len).ok_or(FrameError::Truncated)?;
                Ok((Self::Err { code, msg: msg.to_vec() }, pos + 9 + len))
            }
            TAG_STR => {
                let len = read_u32(body, pos + 1)? as usize;
                let val = body.get(pos + 5..pos + 5 + len).ok_or(FrameError::Truncated)?;
                Ok((Self::Str(val.to_vec()), pos + 5 + len))
            }
            TAG_INT => {
                let bytes = body
                    .get(pos + 1..pos + 9)
                    .ok_or(FrameError::Truncated)?
                    .try_into()
                    .expect("slice is 8 bytes");
                Ok((Self::Int(i64::from_le_bytes(bytes)), pos + 9))
            }
            TAG_ARR => {
                let count = read_u32(body, pos + 1)?;
                let mut elems = Vec::with_capacity(count as usize);
                let mut at = pos + 5;
                for _ in 0..count {
                    let (elem, next) = Self::decode_at(body, at)?;
                    elems.push(elem);
                    at = next;
                }
                Ok((Self::Arr(elems), at))
            }
            other => Err(FrameError::UnknownTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(reply: &Reply) {
        let mut buf = Vec::new();
        reply.encode(&mut buf);
        assert_eq!(&Reply::decode(&buf).unwrap(), reply);
    }

    #[test]
    fn all_tags_roundtrip() {
        roundtrip(&Reply::Nil);
        roundtrip(&Reply::err(ErrCode::Arg, "key don't exists"));
        roundtrip(&Reply::Str(b"".to_vec()));
        roundtrip(&Reply::Str(b"\x00binary\xff".to_vec()));
        roundtrip(&Reply::Int(0));
        roundtrip(&Reply::Int(i64::MIN));
        roundtrip(&Reply::Arr(vec![]));
    }

    #[test]
    fn nested_arrays_roundtrip() {
        roundtrip(&Reply::Arr(vec![
            Reply::Str(b"alice".to_vec()),
            Reply::Arr(vec![Reply::Int(-7), Reply::Nil]),
            Reply::err(ErrCode::TooBig, "response is too big."),
        ]));
    }

    #[test]
    fn wire_layout_is_fixed() {
        let mut buf = Vec::new();
        Reply::Int(2).encode(&mut buf);
        assert_eq!(buf, [b'3', 2, 0, 0, 0, 0, 0, 0, 0]);

        buf.clear();
        Reply::err(ErrCode::Unknown, "Unknown cmd").encode(&mut buf);
        let mut expect = vec![b'1', 1, 0, 0, 0, 11, 0, 0, 0];
        expect.extend_from_slice(b"Unknown cmd");
        assert_eq!(buf, expect);
    }

    #[test]
    fn truncated_child_rejected() {
        let mut buf = Vec::new();
        Reply::Arr(vec![Reply::Int(1), Reply::Int(2)]).encode(&mut buf);
        buf.truncate(buf.len() - 1);
        assert_eq!(Reply::decode(&buf), Err(FrameError::Truncated));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut buf = Vec::new();
        Reply::Nil.encode(&mut buf);
        buf.push(0);
        assert_eq!(Reply::decode(&buf), Err(FrameError::TrailingBytes(1)));
    }

    #[test]
    fn unknown_tag_rejected() {
        assert_eq!(Reply::decode(&[b'9']), Err(FrameError::UnknownTag(b'9')));
    }
}
