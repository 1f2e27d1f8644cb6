use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

use crate::config::config_dir;
use crate::domain::event::Event;

/// Largest frame accepted from a client.
const MAX_FRAME: usize = 4 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Dispatch { event: Event },
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub ok: bool,
    pub message: Option<String>,
}

pub fn socket_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("daemon.sock"))
}

fn write_frame<W: Write>(w: &mut W, data: &[u8]) -> Result<()> {
    // length-prefix
    w.write_all(&(data.len() as u32).to_be_bytes())?;
    w.write_all(data)?;
    w.flush()?;
    Ok(())
}

fn read_frame<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let n = u32::from_be_bytes(len_buf) as usize;
    if n > MAX_FRAME {
        anyhow::bail!("frame of {n} bytes is too large");
    }
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(unix)]
pub fn send(req: &Request) -> Result<Response> {
    send_to(&socket_path()?, req)
}

#[cfg(unix)]
pub fn send_to(path: &Path, req: &Request) -> Result<Response> {
    let mut s = UnixStream::connect(path)?;
    write_frame(&mut s, &serde_json::to_vec(req)?)?;
    Ok(serde_json::from_slice(&read_frame(&mut s)?)?)
}

#[cfg(not(unix))]
pub fn send(_req: &Request) -> Result<Response> {
    Ok(Response {
        ok: false,
        message: Some("IPC not supported on this platform".into()),
    })
}

/// Answer one request, forwarding events to the engine's queue.
fn handle(req: Request, events: &Sender<Event>) -> Response {
    match req {
        Request::Ping => Response {
            ok: true,
            message: Some("pong".into()),
        },
        Request::Dispatch { event } => match events.send(event) {
            Ok(()) => Response {
                ok: true,
                message: None,
            },
            Err(_) => Response {
                ok: false,
                message: Some("daemon is shutting down".into()),
            },
        },
    }
}

#[cfg(unix)]
fn serve_connection(mut stream: UnixStream, events: &Sender<Event>) -> Result<()> {
    let frame = read_frame(&mut stream)?;
    let resp = match serde_json::from_slice::<Request>(&frame) {
        Ok(req) => handle(req, events),
        Err(e) => Response {
            ok: false,
            message: Some(format!("bad request: {e}")),
        },
    };
    write_frame(&mut stream, &serde_json::to_vec(&resp)?)
}

/// Listen on `path` in a background thread. Connections are served one
/// at a time; the engine itself never runs on this thread.
#[cfg(unix)]
pub fn serve(path: &Path, events: Sender<Event>) -> Result<()> {
    if path.exists() {
        // left over from a previous run
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    debug!("Listening on {}", path.display());

    std::thread::spawn(move || {
        for conn in listener.incoming() {
            match conn {
                Ok(stream) => {
                    if let Err(e) = serve_connection(stream, &events) {
                        warn!("IPC connection failed: {e}");
                    }
                }
                Err(e) => warn!("IPC accept failed: {e}"),
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn serve(_path: &Path, _events: Sender<Event>) -> Result<()> {
    anyhow::bail!("IPC not supported on this platform")
}
