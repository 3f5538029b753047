//! Binary encode/decode for boundary messages.
//!
//! Each message is encoded into a scratch buffer first and then written
//! with a `u32` length prefix, so a reader always consumes whole messages
//! and can tell a clean end of stream from a truncated one.

use std::io::{Read, Write};

use charlie_core::{ConfigMap, FrameBuffer, PluginFailure};

use crate::error::WireError;
use crate::message::{Envelope, Rejection, Request, Response};
use crate::{MAGIC, MAX_MESSAGE_LEN, PROTOCOL_VERSION};

// ── Tags ────────────────────────────────────────────────────────

const REQ_MANIFEST: u8 = 0;
const REQ_BIND: u8 = 1;
const REQ_SPAWN: u8 = 2;
const REQ_REMOVE: u8 = 3;
const REQ_TITLE: u8 = 4;
const REQ_DESCR: u8 = 5;
const REQ_CONFIG: u8 = 6;
const REQ_META: u8 = 7;
const REQ_INIT: u8 = 8;
const REQ_UPDATE: u8 = 9;
const REQ_RENDER: u8 = 10;
const REQ_LOG: u8 = 11;
const REQ_END: u8 = 12;
const REQ_SHUTDOWN: u8 = 13;

const RESP_DONE: u8 = 0;
const RESP_SPAWNED: u8 = 1;
const RESP_TEXT: u8 = 2;
const RESP_FRAME: u8 = 3;
const RESP_TYPES: u8 = 4;
const RESP_FAILED: u8 = 5;
const RESP_REJECTED: u8 = 6;

const REJ_TYPE_NOT_FOUND: u8 = 0;
const REJ_NOT_BOUND: u8 = 1;
const REJ_ALREADY_BOUND: u8 = 2;
const REJ_UNKNOWN_INSTANCE: u8 = 3;
const REJ_SPAWN_FAILED: u8 = 4;

// ── Primitive writers ───────────────────────────────────────────

fn put_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, b: &[u8]) {
    put_u32(buf, b.len() as u32);
    buf.extend_from_slice(b);
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

fn put_bool(buf: &mut Vec<u8>, v: bool) {
    put_u8(buf, u8::from(v));
}

fn put_opt_str(buf: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            put_u8(buf, 1);
            put_str(buf, s);
        }
        None => put_u8(buf, 0),
    }
}

fn put_str_list<'a>(buf: &mut Vec<u8>, items: impl ExactSizeIterator<Item = &'a String>) {
    put_u32(buf, items.len() as u32);
    for s in items {
        put_str(buf, s);
    }
}

// ── Primitive readers ───────────────────────────────────────────

/// Cursor over a decoded message body.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], WireError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| WireError::MalformedMessage {
                detail: format!("truncated {what}: need {n} bytes at offset {}", self.pos),
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, what: &str) -> Result<u8, WireError> {
        Ok(self.take(1, what)?[0])
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u32(&mut self, what: &str) -> Result<u32, WireError> {
        self.array(what).map(u32::from_le_bytes)
    }

    fn u64(&mut self, what: &str) -> Result<u64, WireError> {
        self.array(what).map(u64::from_le_bytes)
    }

    fn i64(&mut self, what: &str) -> Result<i64, WireError> {
        self.array(what).map(i64::from_le_bytes)
    }

    fn bool(&mut self, what: &str) -> Result<bool, WireError> {
        match self.u8(what)? {
            0 => Ok(false),
            1 => Ok(true),
            flag => Err(WireError::MalformedMessage {
                detail: format!("invalid {what} flag: {flag}"),
            }),
        }
    }

    fn bytes(&mut self, what: &str) -> Result<Vec<u8>, WireError> {
        let len = self.u32(what)? as usize;
        Ok(self.take(len, what)?.to_vec())
    }

    fn string(&mut self, what: &str) -> Result<String, WireError> {
        String::from_utf8(self.bytes(what)?).map_err(|e| WireError::MalformedMessage {
            detail: format!("invalid UTF-8 in {what}: {e}"),
        })
    }

    fn opt_string(&mut self, what: &str) -> Result<Option<String>, WireError> {
        if self.bool(what)? {
            Ok(Some(self.string(what)?))
        } else {
            Ok(None)
        }
    }

    fn str_list(&mut self, what: &str) -> Result<Vec<String>, WireError> {
        let count = self.u32(what)? as usize;
        // Each entry needs at least its 4-byte length prefix.
        let mut out = Vec::with_capacity(count.min(self.remaining() / 4));
        for _ in 0..count {
            out.push(self.string(what)?);
        }
        Ok(out)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn finish(self) -> Result<(), WireError> {
        if self.remaining() != 0 {
            return Err(WireError::MalformedMessage {
                detail: format!("{} trailing bytes", self.remaining()),
            });
        }
        Ok(())
    }
}

// ── Framing ─────────────────────────────────────────────────────

fn write_framed(w: &mut dyn Write, body: &[u8]) -> Result<(), WireError> {
    let len = u32::try_from(body.len())
        .ok()
        .filter(|&len| len <= MAX_MESSAGE_LEN)
        .ok_or(WireError::MessageTooLarge {
            len: body.len().min(u32::MAX as usize) as u32,
        })?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(body)?;
    w.flush()?;
    Ok(())
}

/// Read one length-prefixed body. `Ok(None)` on clean end of stream.
fn read_framed(r: &mut dyn Read) -> Result<Option<Vec<u8>>, WireError> {
    // Read the length prefix byte-by-byte to distinguish clean EOF
    // (zero bytes available) from truncation (1-3 bytes before EOF).
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        match r.read(&mut len_buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(WireError::MalformedMessage {
                    detail: format!("truncated length prefix: got {filled} of 4 bytes"),
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(WireError::Io(e)),
        }
    }
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_MESSAGE_LEN {
        return Err(WireError::MessageTooLarge { len });
    }
    let mut body = vec![0u8; len as usize];
    r.read_exact(&mut body)?;
    Ok(Some(body))
}

// ── Handshake ───────────────────────────────────────────────────

/// Announce the protocol. Written once by the module before serving.
pub fn write_hello(w: &mut dyn Write) -> Result<(), WireError> {
    w.write_all(&MAGIC)?;
    w.write_all(&[PROTOCOL_VERSION])?;
    w.flush()?;
    Ok(())
}

/// Validate the module's protocol announcement.
pub fn read_hello(r: &mut dyn Read) -> Result<(), WireError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(WireError::InvalidMagic { found: magic });
    }
    let mut version = [0u8; 1];
    r.read_exact(&mut version)?;
    if version[0] != PROTOCOL_VERSION {
        return Err(WireError::UnsupportedVersion { found: version[0] });
    }
    Ok(())
}

// ── Requests ────────────────────────────────────────────────────

fn encode_request(buf: &mut Vec<u8>, req: &Request) {
    match req {
        Request::Manifest => put_u8(buf, REQ_MANIFEST),
        Request::Bind { type_id } => {
            put_u8(buf, REQ_BIND);
            put_str(buf, type_id);
        }
        Request::Spawn => put_u8(buf, REQ_SPAWN),
        Request::Remove { instance } => {
            put_u8(buf, REQ_REMOVE);
            put_u32(buf, *instance);
        }
        Request::Title { instance } => {
            put_u8(buf, REQ_TITLE);
            put_u32(buf, *instance);
        }
        Request::Descr { instance } => {
            put_u8(buf, REQ_DESCR);
            put_u32(buf, *instance);
        }
        Request::Config { instance } => {
            put_u8(buf, REQ_CONFIG);
            put_u32(buf, *instance);
        }
        Request::Meta { instance } => {
            put_u8(buf, REQ_META);
            put_u32(buf, *instance);
        }
        Request::Init { instance, config } => {
            put_u8(buf, REQ_INIT);
            put_u32(buf, *instance);
            put_u32(buf, config.len() as u32);
            for (key, value) in config {
                put_str(buf, key);
                put_str(buf, value);
            }
        }
        Request::Update { instance, delta_ms } => {
            put_u8(buf, REQ_UPDATE);
            put_u32(buf, *instance);
            put_i64(buf, *delta_ms);
        }
        Request::Render {
            instance,
            width,
            height,
        } => {
            put_u8(buf, REQ_RENDER);
            put_u32(buf, *instance);
            put_u32(buf, *width);
            put_u32(buf, *height);
        }
        Request::Log { instance } => {
            put_u8(buf, REQ_LOG);
            put_u32(buf, *instance);
        }
        Request::End { instance } => {
            put_u8(buf, REQ_END);
            put_u32(buf, *instance);
        }
        Request::Shutdown => put_u8(buf, REQ_SHUTDOWN),
    }
}

fn decode_request(r: &mut Reader<'_>) -> Result<Request, WireError> {
    let tag = r.u8("request tag")?;
    let req = match tag {
        REQ_MANIFEST => Request::Manifest,
        REQ_BIND => Request::Bind {
            type_id: r.string("type id")?,
        },
        REQ_SPAWN => Request::Spawn,
        REQ_REMOVE => Request::Remove {
            instance: r.u32("instance")?,
        },
        REQ_TITLE => Request::Title {
            instance: r.u32("instance")?,
        },
        REQ_DESCR => Request::Descr {
            instance: r.u32("instance")?,
        },
        REQ_CONFIG => Request::Config {
            instance: r.u32("instance")?,
        },
        REQ_META => Request::Meta {
            instance: r.u32("instance")?,
        },
        REQ_INIT => {
            let instance = r.u32("instance")?;
            let count = r.u32("config length")? as usize;
            let mut config = ConfigMap::with_capacity(count.min(r.remaining() / 8));
            for _ in 0..count {
                let key = r.string("config key")?;
                let value = r.string("config value")?;
                config.insert(key, value);
            }
            Request::Init { instance, config }
        }
        REQ_UPDATE => Request::Update {
            instance: r.u32("instance")?,
            delta_ms: r.i64("delta")?,
        },
        REQ_RENDER => Request::Render {
            instance: r.u32("instance")?,
            width: r.u32("width")?,
            height: r.u32("height")?,
        },
        REQ_LOG => Request::Log {
            instance: r.u32("instance")?,
        },
        REQ_END => Request::End {
            instance: r.u32("instance")?,
        },
        REQ_SHUTDOWN => Request::Shutdown,
        tag => return Err(WireError::UnknownTag { what: "request", tag }),
    };
    Ok(req)
}

/// Write one request envelope and flush.
pub fn write_request(w: &mut dyn Write, env: &Envelope<Request>) -> Result<(), WireError> {
    let mut buf = Vec::with_capacity(32);
    put_u64(&mut buf, env.seq);
    encode_request(&mut buf, &env.body);
    write_framed(w, &buf)
}

/// Read one request envelope. `Ok(None)` when the host closed the stream.
pub fn read_request(r: &mut dyn Read) -> Result<Option<Envelope<Request>>, WireError> {
    let Some(body) = read_framed(r)? else {
        return Ok(None);
    };
    let mut reader = Reader::new(&body);
    let seq = reader.u64("sequence number")?;
    let req = decode_request(&mut reader)?;
    reader.finish()?;
    Ok(Some(Envelope::new(seq, req)))
}

// ── Responses ───────────────────────────────────────────────────

fn encode_failure(buf: &mut Vec<u8>, failure: &PluginFailure) {
    put_str(buf, &failure.message);
    put_str_list(buf, failure.causes.iter());
    put_bool(buf, failure.panicked);
}

fn decode_failure(r: &mut Reader<'_>) -> Result<PluginFailure, WireError> {
    Ok(PluginFailure {
        message: r.string("failure message")?,
        causes: r.str_list("failure causes")?,
        panicked: r.bool("panicked")?,
    })
}

fn encode_rejection(buf: &mut Vec<u8>, rejection: &Rejection) {
    match rejection {
        Rejection::TypeNotFound { type_id } => {
            put_u8(buf, REJ_TYPE_NOT_FOUND);
            put_str(buf, type_id);
        }
        Rejection::NotBound => put_u8(buf, REJ_NOT_BOUND),
        Rejection::AlreadyBound { type_id } => {
            put_u8(buf, REJ_ALREADY_BOUND);
            put_str(buf, type_id);
        }
        Rejection::UnknownInstance { instance } => {
            put_u8(buf, REJ_UNKNOWN_INSTANCE);
            put_u32(buf, *instance);
        }
        Rejection::SpawnFailed { reason } => {
            put_u8(buf, REJ_SPAWN_FAILED);
            put_str(buf, reason);
        }
    }
}

fn decode_rejection(r: &mut Reader<'_>) -> Result<Rejection, WireError> {
    let rejection = match r.u8("rejection tag")? {
        REJ_TYPE_NOT_FOUND => Rejection::TypeNotFound {
            type_id: r.string("type id")?,
        },
        REJ_NOT_BOUND => Rejection::NotBound,
        REJ_ALREADY_BOUND => Rejection::AlreadyBound {
            type_id: r.string("type id")?,
        },
        REJ_UNKNOWN_INSTANCE => Rejection::UnknownInstance {
            instance: r.u32("instance")?,
        },
        REJ_SPAWN_FAILED => Rejection::SpawnFailed {
            reason: r.string("reason")?,
        },
        tag => return Err(WireError::UnknownTag { what: "rejection", tag }),
    };
    Ok(rejection)
}

fn encode_response(buf: &mut Vec<u8>, resp: &Response) {
    match resp {
        Response::Done => put_u8(buf, RESP_DONE),
        Response::Spawned { instance } => {
            put_u8(buf, RESP_SPAWNED);
            put_u32(buf, *instance);
        }
        Response::Text(text) => {
            put_u8(buf, RESP_TEXT);
            put_opt_str(buf, text.as_deref());
        }
        Response::Frame(frame) => {
            put_u8(buf, RESP_FRAME);
            match frame {
                Some(frame) => {
                    put_u8(buf, 1);
                    put_u32(buf, frame.width());
                    put_u32(buf, frame.height());
                    put_bytes(buf, frame.pixels());
                }
                None => put_u8(buf, 0),
            }
        }
        Response::Types(types) => {
            put_u8(buf, RESP_TYPES);
            put_str_list(buf, types.iter());
        }
        Response::Failed(failure) => {
            put_u8(buf, RESP_FAILED);
            encode_failure(buf, failure);
        }
        Response::Rejected(rejection) => {
            put_u8(buf, RESP_REJECTED);
            encode_rejection(buf, rejection);
        }
    }
}

fn decode_response(r: &mut Reader<'_>) -> Result<Response, WireError> {
    let resp = match r.u8("response tag")? {
        RESP_DONE => Response::Done,
        RESP_SPAWNED => Response::Spawned {
            instance: r.u32("instance")?,
        },
        RESP_TEXT => Response::Text(r.opt_string("text")?),
        RESP_FRAME => {
            if r.bool("frame presence")? {
                let width = r.u32("frame width")?;
                let height = r.u32("frame height")?;
                let pixels = r.bytes("frame pixels")?;
                let frame = FrameBuffer::from_pixels(width, height, pixels).map_err(|e| {
                    WireError::MalformedMessage {
                        detail: format!("bad frame: {e}"),
                    }
                })?;
                Response::Frame(Some(frame))
            } else {
                Response::Frame(None)
            }
        }
        RESP_TYPES => Response::Types(r.str_list("type ids")?),
        RESP_FAILED => Response::Failed(decode_failure(r)?),
        RESP_REJECTED => Response::Rejected(decode_rejection(r)?),
        tag => return Err(WireError::UnknownTag { what: "response", tag }),
    };
    Ok(resp)
}

/// Write one response envelope and flush.
pub fn write_response(w: &mut dyn Write, env: &Envelope<Response>) -> Result<(), WireError> {
    let mut buf = Vec::with_capacity(match &env.body {
        Response::Frame(Some(frame)) => frame.pixels().len() + 32,
        _ => 64,
    });
    put_u64(&mut buf, env.seq);
    encode_response(&mut buf, &env.body);
    write_framed(w, &buf)
}

/// Read one response envelope. `Ok(None)` when the module closed the stream.
pub fn read_response(r: &mut dyn Read) -> Result<Option<Envelope<Response>>, WireError> {
    let Some(body) = read_framed(r)? else {
        return Ok(None);
    };
    let mut reader = Reader::new(&body);
    let seq = reader.u64("sequence number")?;
    let resp = decode_response(&mut reader)?;
    reader.finish()?;
    Ok(Some(Envelope::new(seq, resp)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip_request(req: Request) -> Request {
        let mut buf = Vec::new();
        write_request(&mut buf, &Envelope::new(7, req)).unwrap();
        let env = read_request(&mut Cursor::new(buf)).unwrap().unwrap();
        assert_eq!(env.seq, 7);
        env.body
    }

    fn round_trip_response(resp: Response) -> Response {
        let mut buf = Vec::new();
        write_response(&mut buf, &Envelope::new(u64::MAX, resp)).unwrap();
        let env = read_response(&mut Cursor::new(buf)).unwrap().unwrap();
        assert_eq!(env.seq, u64::MAX);
        env.body
    }

    #[test]
    fn init_preserves_config_order() {
        let mut config = ConfigMap::new();
        config.insert("Zeta".into(), "1".into());
        config.insert("Alpha".into(), "two words".into());
        let req = Request::Init {
            instance: 3,
            config: config.clone(),
        };
        match round_trip_request(req) {
            Request::Init {
                instance,
                config: decoded,
            } => {
                assert_eq!(instance, 3);
                let keys: Vec<_> = decoded.keys().cloned().collect();
                assert_eq!(keys, vec!["Zeta", "Alpha"]);
                assert_eq!(decoded, config);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn negative_delta_survives() {
        let req = Request::Update {
            instance: 0,
            delta_ms: -20,
        };
        assert_eq!(round_trip_request(req.clone()), req);
    }

    #[test]
    fn frame_response_round_trips() {
        let mut frame = FrameBuffer::new(3, 2).unwrap();
        frame.set_pixel(2, 1, [1, 2, 3, 4]);
        let resp = Response::Frame(Some(frame));
        assert_eq!(round_trip_response(resp.clone()), resp);
        assert_eq!(
            round_trip_response(Response::Frame(None)),
            Response::Frame(None)
        );
    }

    #[test]
    fn failure_response_keeps_chain() {
        let failure = PluginFailure {
            message: "update failed".into(),
            causes: vec!["grid too small".into(), "width was 0".into()],
            panicked: true,
        };
        let resp = Response::Failed(failure);
        assert_eq!(round_trip_response(resp.clone()), resp);
    }

    #[test]
    fn rejection_response_round_trips() {
        for rejection in [
            Rejection::TypeNotFound {
                type_id: "nope".into(),
            },
            Rejection::NotBound,
            Rejection::AlreadyBound {
                type_id: "life".into(),
            },
            Rejection::UnknownInstance { instance: 9 },
            Rejection::SpawnFailed {
                reason: "no threads".into(),
            },
        ] {
            let resp = Response::Rejected(rejection);
            assert_eq!(round_trip_response(resp.clone()), resp);
        }
    }

    #[test]
    fn clean_eof_is_none() {
        let mut empty = Cursor::new(Vec::<u8>::new());
        assert!(read_request(&mut empty).unwrap().is_none());
        assert!(read_response(&mut empty).unwrap().is_none());
    }

    #[test]
    fn truncated_length_prefix_is_malformed() {
        let mut partial = Cursor::new(vec![5u8, 0]);
        assert!(matches!(
            read_request(&mut partial),
            Err(WireError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn truncated_body_is_io_error() {
        let mut buf = Vec::new();
        write_request(&mut buf, &Envelope::new(1, Request::Spawn)).unwrap();
        buf.pop();
        assert!(matches!(
            read_request(&mut Cursor::new(buf)),
            Err(WireError::Io(_))
        ));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_MESSAGE_LEN + 1).to_le_bytes());
        assert!(matches!(
            read_response(&mut Cursor::new(buf)),
            Err(WireError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn unknown_tag_is_reported() {
        let mut body = Vec::new();
        put_u64(&mut body, 1);
        put_u8(&mut body, 200);
        let mut buf = Vec::new();
        write_framed(&mut buf, &body).unwrap();
        assert!(matches!(
            read_request(&mut Cursor::new(buf)),
            Err(WireError::UnknownTag {
                what: "request",
                tag: 200
            })
        ));
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let mut body = Vec::new();
        put_u64(&mut body, 1);
        put_u8(&mut body, REQ_SPAWN);
        put_u8(&mut body, 0xFF);
        let mut buf = Vec::new();
        write_framed(&mut buf, &body).unwrap();
        assert!(matches!(
            read_request(&mut Cursor::new(buf)),
            Err(WireError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn inconsistent_frame_is_malformed() {
        let mut body = Vec::new();
        put_u64(&mut body, 1);
        put_u8(&mut body, RESP_FRAME);
        put_u8(&mut body, 1);
        put_u32(&mut body, 2);
        put_u32(&mut body, 2);
        put_bytes(&mut body, &[0; 3]);
        let mut buf = Vec::new();
        write_framed(&mut buf, &body).unwrap();
        assert!(matches!(
            read_response(&mut Cursor::new(buf)),
            Err(WireError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn hello_round_trips_and_rejects_garbage() {
        let mut buf = Vec::new();
        write_hello(&mut buf).unwrap();
        read_hello(&mut Cursor::new(buf)).unwrap();

        let err = read_hello(&mut Cursor::new(b"HTTP/".to_vec())).unwrap_err();
        assert!(matches!(err, WireError::InvalidMagic { .. }));

        let mut old = MAGIC.to_vec();
        old.push(PROTOCOL_VERSION + 1);
        let err = read_hello(&mut Cursor::new(old)).unwrap_err();
        assert!(matches!(err, WireError::UnsupportedVersion { .. }));
    }

    #[test]
    fn several_messages_share_a_stream() {
        let mut buf = Vec::new();
        for seq in 0..3u64 {
            write_request(&mut buf, &Envelope::new(seq, Request::Log { instance: 1 })).unwrap();
        }
        let mut cursor = Cursor::new(buf);
        for seq in 0..3u64 {
            let env = read_request(&mut cursor).unwrap().unwrap();
            assert_eq!(env.seq, seq);
        }
        assert!(read_request(&mut cursor).unwrap().is_none());
    }

    mod fuzz {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_bodies_never_panic(body in proptest::collection::vec(any::<u8>(), 0..256)) {
                let mut buf = Vec::new();
                write_framed(&mut buf, &body).unwrap();
                let _ = read_request(&mut Cursor::new(buf.clone()));
                let _ = read_response(&mut Cursor::new(buf));
            }
        }
    }
}
