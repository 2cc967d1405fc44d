//! Live Blender document
//!
//! Blender runs in background mode on the input file with the bundled bridge
//! script. Every [`Document`] call is one request/response round trip.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use super::protocol::{Envelope, Hello, Request, Response, HELLO_ID, PROTOCOL_VERSION};
use crate::document::{BlockInfo, Category, Document, LinkParent, ReloadRequest, Reloaded};
use crate::error::{FeatherError, Result};
use crate::header::BlendVersion;

const BRIDGE_SCRIPT: &str = include_str!("../../bridge/feather_bridge.py");

/// Lines of stderr kept for failure reports
const STDERR_TAIL_LINES: usize = 40;

/// How long Blender gets to exit after `quit`
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// How long the stderr reader gets to drain after the host exits
const STDERR_DRAIN: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Launch settings for [`BlenderHost`]
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Blender executable
    pub executable: PathBuf,
    /// Per-request timeout (startup and file loading included)
    pub timeout: Duration,
}

struct Session {
    child: Child,
    stdin: ChildStdin,
    responses: Receiver<String>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    stderr_reader: JoinHandle<()>,
    next_id: u64,
    timeout: Duration,
}

/// A document living inside a Blender process
pub struct BlenderHost {
    session: RefCell<Session>,
    hello: Hello,
    // Deleted when the host is dropped
    _script: NamedTempFile,
}

impl BlenderHost {
    /// Start Blender on `input` and wait for the bridge to greet us
    pub fn launch(input: &Path, options: &HostOptions) -> Result<Self> {
        let script = write_bridge_script()?;

        debug!(
            executable = %options.executable.display(),
            input = %input.display(),
            "launch_blender"
        );
        let mut command = Command::new(&options.executable);
        command
            .arg("--background")
            .arg("--factory-startup")
            .arg(input)
            .arg("--python")
            .arg(script.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Ctrl-C goes to feather only; the batch stops between files
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut child = command.spawn().map_err(|e| {
            FeatherError::io_operation("launch", options.executable.display(), e)
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FeatherError::Other("blender stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FeatherError::Other("blender stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FeatherError::Other("blender stderr unavailable".to_string()))?;

        let (tx, responses) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
                if line.starts_with(super::protocol::RESPONSE_MARKER) {
                    if tx.send(line).is_err() {
                        break;
                    }
                } else {
                    trace!(target: "feather_core::blender", "{}", line);
                }
            }
        });

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let tail = Arc::clone(&stderr_tail);
        let stderr_reader = thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                trace!(target: "feather_core::blender", "stderr: {}", line);
                if let Ok(mut tail) = tail.lock() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        });

        let mut session = Session {
            child,
            stdin,
            responses,
            stderr_tail,
            stderr_reader,
            next_id: HELLO_ID + 1,
            timeout: options.timeout,
        };

        let hello: Hello = match session
            .await_response(HELLO_ID, "hello")
            .and_then(|response| response.into_result("hello"))
        {
            Ok(hello) => hello,
            Err(e) => {
                session.kill();
                return Err(e);
            }
        };
        if hello.protocol != PROTOCOL_VERSION {
            session.kill();
            return Err(FeatherError::host(
                "hello",
                format!(
                    "bridge speaks protocol {}, expected {}",
                    hello.protocol, PROTOCOL_VERSION
                ),
            ));
        }
        debug!(blender = %hello.blender, file_version = %hello.file_version, "bridge_ready");

        Ok(Self {
            session: RefCell::new(session),
            hello,
            _script: script,
        })
    }

    /// Versions reported by the running Blender
    pub fn hello(&self) -> &Hello {
        &self.hello
    }

    fn call<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        self.session.borrow_mut().call(&request)
    }
}

impl Session {
    fn call<T: DeserializeOwned>(&mut self, request: &Request) -> Result<T> {
        let id = self.next_id;
        self.next_id += 1;
        let op = request.op();

        let line = Envelope { id, request }.to_line()?;
        trace!(id, op, "request");
        if let Err(e) = self
            .stdin
            .write_all(line.as_bytes())
            .and_then(|()| self.stdin.flush())
        {
            debug!(error = %e, op, "write to bridge failed");
            return Err(self.exited(Instant::now() + self.timeout));
        }

        self.await_response(id, op)?.into_result(op)
    }

    fn await_response(&mut self, id: u64, op: &str) -> Result<Response> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.responses.recv_timeout(remaining) {
                Ok(line) => match Response::parse_line(&line) {
                    Some(Ok(response)) if response.id == id => return Ok(response),
                    Some(Ok(response)) => {
                        warn!(expected = id, got = response.id, "stale bridge response");
                    }
                    Some(Err(e)) => warn!(error = %e, "malformed bridge response"),
                    None => {}
                },
                Err(RecvTimeoutError::Timeout) => {
                    self.kill();
                    return Err(FeatherError::Timeout {
                        operation: op.to_string(),
                        secs: self.timeout.as_secs(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(self.exited(deadline)),
            }
        }
    }

    /// Collect exit status and stderr once the bridge has gone away.
    ///
    /// A host that closed its output but is still running at `deadline` is killed.
    fn exited(&mut self, deadline: Instant) -> FeatherError {
        let status = loop {
            match self.child.try_wait() {
                Ok(Some(status)) => break status.to_string(),
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Ok(None) => {
                    warn!("host closed its output but kept running; killing");
                    self.kill();
                    break "killed after closing its output".to_string();
                }
                Err(e) => break format!("unknown ({e})"),
            }
        };

        let drain_until = Instant::now() + STDERR_DRAIN;
        while !self.stderr_reader.is_finished() && Instant::now() < drain_until {
            thread::sleep(POLL_INTERVAL);
        }
        let stderr = self
            .stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();
        FeatherError::HostExited { status, stderr }
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!(error = %e, "kill blender");
        }
        let _ = self.child.wait();
    }

    fn shutdown(&mut self) {
        if self.call::<()>(&Request::Quit).is_err() {
            self.kill();
            return;
        }
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(%status, "blender exited");
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                _ => {
                    warn!("blender did not exit after quit; killing");
                    self.kill();
                    return;
                }
            }
        }
    }
}

impl Drop for BlenderHost {
    fn drop(&mut self) {
        self.session.get_mut().shutdown();
    }
}

fn write_bridge_script() -> Result<NamedTempFile> {
    let mut script = tempfile::Builder::new()
        .prefix("feather-bridge-")
        .suffix(".py")
        .tempfile()?;
    script.write_all(BRIDGE_SCRIPT.as_bytes())?;
    script.flush()?;
    Ok(script)
}

impl Document for BlenderHost {
    fn blocks(&self, category: Category) -> Result<Vec<BlockInfo>> {
        self.call(Request::Blocks { category })
    }

    fn active_scene(&self) -> Result<Option<String>> {
        self.call(Request::ActiveScene)
    }

    fn collection_children(&self, collection: &str) -> Result<Vec<String>> {
        self.call(Request::CollectionChildren {
            name: collection.to_string(),
        })
    }

    fn collection_objects(&self, collection: &str) -> Result<Vec<String>> {
        self.call(Request::CollectionObjects {
            name: collection.to_string(),
        })
    }

    fn scene_root_children(&self, scene: &str) -> Result<Vec<String>> {
        self.call(Request::SceneRootChildren {
            scene: scene.to_string(),
        })
    }

    fn scene_root_objects(&self, scene: &str) -> Result<Vec<String>> {
        self.call(Request::SceneRootObjects {
            scene: scene.to_string(),
        })
    }

    fn purge_orphans(&mut self) -> Result<usize> {
        self.call(Request::PurgeOrphans)
    }

    fn remove_block(&mut self, category: Category, name: &str) -> Result<()> {
        self.call(Request::RemoveBlock {
            category,
            name: name.to_string(),
        })
    }

    fn clear_fake_user(&mut self, category: Category, name: &str) -> Result<()> {
        self.call(Request::ClearFakeUser {
            category,
            name: name.to_string(),
        })
    }

    fn link_collection(&mut self, parent: &LinkParent, child: &str) -> Result<()> {
        self.call(Request::LinkCollection {
            parent: parent.clone(),
            child: child.to_string(),
        })
    }

    fn link_object(&mut self, parent: &LinkParent, object: &str) -> Result<()> {
        self.call(Request::LinkObject {
            parent: parent.clone(),
            object: object.to_string(),
        })
    }

    fn unlink_collection(&mut self, parent: &LinkParent, child: &str) -> Result<()> {
        self.call(Request::UnlinkCollection {
            parent: parent.clone(),
            child: child.to_string(),
        })
    }

    fn unlink_object(&mut self, parent: &LinkParent, object: &str) -> Result<()> {
        self.call(Request::UnlinkObject {
            parent: parent.clone(),
            object: object.to_string(),
        })
    }

    fn save_as(&mut self, path: &Path, compress: bool) -> Result<()> {
        self.call(Request::SaveAs {
            path: absolute(path)?,
            compress,
        })
    }

    fn reset_empty(&mut self, placeholder: &str) -> Result<()> {
        self.call(Request::ResetEmpty {
            placeholder: placeholder.to_string(),
        })
    }

    fn load_by_reference(&mut self, path: &Path, request: &ReloadRequest) -> Result<Reloaded> {
        self.call(Request::LoadByReference {
            path: absolute(path)?,
            request: *request,
        })
    }
}

/// Blender resolves relative paths against its own notion of the current file
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Ask an executable for its version via `--version`
pub fn probe_version(executable: &Path) -> Result<BlendVersion> {
    let output = Command::new(executable)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| FeatherError::io_operation("run", executable.display(), e))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_version_banner(&stdout).ok_or_else(|| {
        FeatherError::invalid_value(
            "Blender executable (no version banner)",
            executable.display(),
        )
    })
}

/// `Blender 4.5.1 LTS` -> 4.5; the banner is the first line starting with "Blender "
fn parse_version_banner(stdout: &str) -> Option<BlendVersion> {
    let banner = stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Blender "))?;
    let number = banner.split_whitespace().next()?;
    let mut parts = number.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some(BlendVersion::new(major, minor))
}
