//! Bulk file transport between ranks.
//!
//! A transfer is a `u64` byte length followed by the file contents in chunks
//! of at most the configured buffer size, each sent with an immediate send
//! and waited on before the next. Lengths always travel as `u64`, never as
//! native-width integers: endpoints may be heterogeneous. An empty or
//! missing file is a legal transfer of length 0.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use log::debug;
use mpi::traits::*;

use super::{Fabric, FabricError};

/// Upper bound on a single chunk on the wire.
pub const MAX_CHUNK_BYTES: usize = 128 * 1024 * 1024;

const TAG_LEN: i32 = 0;
const TAG_DATA: i32 = 1;

/// Stream the file at `path` to `dest`. A file that cannot be opened is sent
/// as length 0, so the receiver never hangs on a missing run.
pub fn send_file(
    fabric: &Fabric,
    path: &Path,
    dest: usize,
    chunk_bytes: usize,
) -> Result<(), FabricError> {
    let dest_process = fabric.world().process_at_rank(dest as i32);
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            debug!("send_file: cannot open {}: {err}", path.display());
            dest_process.send_with_tag(&0u64, TAG_LEN);
            return Ok(());
        }
    };
    let len = file.metadata()?.len();
    dest_process.send_with_tag(&len, TAG_LEN);
    if len == 0 {
        return Ok(());
    }

    let chunk_bytes = chunk_bytes.clamp(1, MAX_CHUNK_BYTES);
    let mut buf = vec![0u8; chunk_bytes.min(len as usize)];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(buf.len() as u64) as usize;
        file.read_exact(&mut buf[..n])?;
        mpi::request::scope(|scope| {
            dest_process
                .immediate_send_with_tag(scope, &buf[..n], TAG_DATA)
                .wait();
        });
        remaining -= n as u64;
    }
    Ok(())
}

/// Receive a file from `source`, appending exactly the announced number of
/// bytes to `out`. Returns the byte length received.
pub fn recv_file(
    fabric: &Fabric,
    source: usize,
    out: &mut impl Write,
    chunk_bytes: usize,
) -> Result<u64, FabricError> {
    let source_process = fabric.world().process_at_rank(source as i32);
    let (len, _status) = source_process.receive_with_tag::<u64>(TAG_LEN);
    if len == 0 {
        return Ok(0);
    }

    let chunk_bytes = chunk_bytes.clamp(1, MAX_CHUNK_BYTES);
    let mut buf = vec![0u8; chunk_bytes.min(len as usize)];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(buf.len() as u64) as usize;
        let status = source_process.receive_into_with_tag(&mut buf[..n], TAG_DATA);
        let got = status.count(u8::equivalent_datatype());
        if got as usize != n {
            return Err(FabricError::Transport(format!(
                "short chunk from rank {source}: expected {n} bytes, got {got}"
            )));
        }
        out.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    Ok(len)
}
