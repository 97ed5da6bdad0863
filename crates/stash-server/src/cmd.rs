use stash_store::{SortedSet, StrStore};
use stash_wire::{ErrCode, HEADER_LEN, MAX_MSG, Reply};
use tracing::{debug, warn};

/// Both stores, owned by the event loop and handed to the dispatcher by
/// reference for the duration of one command.
#[derive(Debug)]
pub struct Db {
    pub strings: StrStore,
    pub zset: SortedSet,
}

impl Db {
    pub fn new(max_level: usize) -> Self {
        Self { strings: StrStore::new(), zset: SortedSet::new(max_level) }
    }
}

/// Run one command and serialize its reply body.
///
/// A body that would not fit the frame limit is replaced wholesale by an
/// ERR(TOO_BIG); the connection survives either way.
pub(crate) fn execute_to_bytes(args: &[Vec<u8>], db: &mut Db) -> Vec<u8> {
    let mut body = Vec::new();
    execute(args, db).encode(&mut body);
    if HEADER_LEN + body.len() > MAX_MSG {
        warn!(len = body.len(), "reply over frame limit");
        body.clear();
        Reply::err(ErrCode::TooBig, "response is too big.").encode(&mut body);
    }
    body
}

/// Case-insensitive verb match.
#[inline]
fn verb(arg: &[u8], word: &str) -> bool {
    arg.eq_ignore_ascii_case(word.as_bytes())
}

/// Whole-argument signed decimal score. Anything else is a type error.
fn parse_score(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

/// Recognize the command tuple and invoke the store. Arity is exact; an
/// unknown verb and a wrong arity collapse into the same error.
fn execute(args: &[Vec<u8>], db: &mut Db) -> Reply {
    match args {
        [c] if verb(c, "keys") => {
            debug!(cmd = "keys", "execute");
            let mut keys: Vec<Reply> =
                db.strings.keys().map(|k| Reply::Str(k.to_vec())).collect();
            keys.extend(db.zset.members().map(|m| Reply::Str(m.to_vec())));
            Reply::Arr(keys)
        }
        [c, t, key] if verb(c, "get") && verb(t, "str") => {
            debug!(cmd = "get", "execute");
            match db.strings.get(key) {
                Some(val) => Reply::Str(val.to_vec()),
                None => Reply::Nil,
            }
        }
        [c, t, key, val] if verb(c, "set") && verb(t, "str") => {
            debug!(cmd = "set", "execute");
            db.strings.set(key, val);
            Reply::Nil
        }
        [c, t, key] if verb(c, "del") && verb(t, "str") => {
            debug!(cmd = "del", "execute");
            Reply::Int(i64::from(db.strings.del(key)))
        }
        [c, t, score, member] if verb(c, "zadd") && verb(t, "zset") => {
            debug!(cmd = "zadd", "execute");
            let Some(score) = parse_score(score) else {
                return Reply::err(ErrCode::Type, "expect score number");
            };
            if db.zset.insert(score, member) {
                Reply::Int(1)
            } else {
                Reply::err(ErrCode::Arg, "key or value already exists")
            }
        }
        [c, t, member] if verb(c, "zrem") && verb(t, "zset") => {
            debug!(cmd = "zrem", "execute");
            Reply::Int(i64::from(db.zset.remove(member)))
        }
        [c, t, member] if verb(c, "zscore") && verb(t, "zset") => {
            debug!(cmd = "zscore", "execute");
            match db.zset.score(member) {
                Some(score) => Reply::Int(score),
                None => Reply::err(ErrCode::Arg, "key don't exists"),
            }
        }
        [c, t] if verb(c, "zcard") && verb(t, "zset") => {
            debug!(cmd = "zcard", "execute");
            Reply::Int(db.zset.card() as i64)
        }
        _ => {
            warn!(argc = args.len(), "unknown cmd");
            Reply::err(ErrCode::Unknown, "Unknown cmd")
        }
    }
}
