//! Frame a message on the wire as a one-byte frame length, the packed [rpc_pb::Frame] (size +
//! crc32c of the body), and then the body itself. Blocking reads make this considerably simpler
//! than the epoll-driven incremental parsing a higher-throughput server would need.

use std::io::{Read, Write};

use buffertk::{stack_pack, Unpackable};

use rpc_pb::Frame;

pub const MAX_FRAME_LEN: usize = 32;

pub fn write_message<W: Write>(w: &mut W, body: &[u8]) -> Result<(), rpc_pb::Error> {
    let frame = Frame::from_buffer(body);
    let frame_bytes = stack_pack(frame).to_vec();
    if frame_bytes.len() > MAX_FRAME_LEN {
        return Err(io_failure("frame header overflowed its maximum size"));
    }
    w.write_all(&[frame_bytes.len() as u8])
        .map_err(|e| io_failure(&e.to_string()))?;
    w.write_all(&frame_bytes)
        .map_err(|e| io_failure(&e.to_string()))?;
    w.write_all(body).map_err(|e| io_failure(&e.to_string()))?;
    w.flush().map_err(|e| io_failure(&e.to_string()))
}

pub fn read_message<R: Read>(r: &mut R) -> Result<Vec<u8>, rpc_pb::Error> {
    let mut frame_len = [0u8; 1];
    r.read_exact(&mut frame_len)
        .map_err(|e| io_failure(&e.to_string()))?;
    let mut frame_buf = vec![0u8; frame_len[0] as usize];
    r.read_exact(&mut frame_buf)
        .map_err(|e| io_failure(&e.to_string()))?;
    let (frame, _) = Frame::unpack(&frame_buf).map_err(|e| rpc_pb::Error::SerializationError {
        core: Default::default(),
        err: e,
        context: "unpacking frame header".to_string(),
    })?;
    let mut body = vec![0u8; frame.size as usize];
    r.read_exact(&mut body)
        .map_err(|e| io_failure(&e.to_string()))?;
    if crc32c::crc32c(&body) != frame.crc32c {
        return Err(io_failure("frame crc32c mismatch"));
    }
    Ok(body)
}

fn io_failure(what: &str) -> rpc_pb::Error {
    rpc_pb::Error::TransportFailure {
        core: Default::default(),
        what: what.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_message() {
        let body = b"hello, paxos".to_vec();
        let mut wire = Vec::new();
        write_message(&mut wire, &body).unwrap();
        let got = read_message(&mut &wire[..]).unwrap();
        assert_eq!(body, got);
    }

    #[test]
    fn round_trips_an_empty_message() {
        let mut wire = Vec::new();
        write_message(&mut wire, &[]).unwrap();
        let got = read_message(&mut &wire[..]).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn rejects_a_corrupted_body() {
        let body = b"hello, paxos".to_vec();
        let mut wire = Vec::new();
        write_message(&mut wire, &body).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0xff;
        assert!(read_message(&mut &wire[..]).is_err());
    }
}
