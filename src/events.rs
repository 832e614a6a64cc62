use std::{
    ffi::OsString,
    io::{BufRead, BufReader, Read},
    net::Shutdown,
    os::unix::net::UnixStream,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};
use tracing::{debug, info, trace, warn};

use crate::scheduler::UpdateScheduler;
use crate::types::{UiMsg, SPECIAL_PREFIX};

const CHANGE_EVENTS: [&str; 5] = [
    "openwindow>>",
    "closewindow>>",
    "movewindow>>",
    "createworkspace>>",
    "destroyworkspace>>",
];

/// Longest event line accepted, newline included.
const MAX_LINE_LEN: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// A normal workspace became active.
    Workspace(String),
    /// Normalized to `special:<name>`; empty when the special workspace closed.
    ActiveSpecial(String),
    /// Window or workspace membership may have changed.
    Changed,
}

pub fn parse_event(line: &str) -> Option<WorkspaceEvent> {
    if let Some(args) = line.strip_prefix("workspace>>") {
        return Some(WorkspaceEvent::Workspace(first_field(args).to_string()));
    }
    if let Some(args) = line.strip_prefix("activespecial>>") {
        return Some(WorkspaceEvent::ActiveSpecial(special_name(first_field(args))));
    }
    CHANGE_EVENTS
        .iter()
        .any(|prefix| line.starts_with(prefix))
        .then_some(WorkspaceEvent::Changed)
}

fn first_field(args: &str) -> &str {
    let args = args.trim();
    match args.split_once(',') {
        Some((first, _)) => first.trim(),
        None => args,
    }
}

fn special_name(name: &str) -> String {
    if name.is_empty() || name.starts_with(SPECIAL_PREFIX) {
        name.to_string()
    } else {
        format!("{SPECIAL_PREFIX}{name}")
    }
}

/// `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/.socket2.sock`.
pub fn socket_path(runtime_dir: Option<OsString>, signature: Option<OsString>) -> Option<PathBuf> {
    let runtime_dir = runtime_dir.filter(|dir| !dir.is_empty())?;
    let signature = signature.filter(|sig| !sig.is_empty())?;
    Some(
        PathBuf::from(runtime_dir)
            .join("hypr")
            .join(signature)
            .join(".socket2.sock"),
    )
}

/// Reads newline-terminated events until end of stream, a read error, or `stop`.
/// A trailing partial line is dropped, as is any line over `MAX_LINE_LEN`.
pub fn pump<R: BufRead>(mut reader: R, stop: &AtomicBool, scheduler: &UpdateScheduler) {
    let mut buf = Vec::with_capacity(4096);
    while !stop.load(Ordering::SeqCst) {
        if !read_line(&mut reader, &mut buf) {
            break;
        }
        let Some(line) = buf.strip_suffix(b"\n") else {
            if buf.len() < MAX_LINE_LEN {
                debug!(len = buf.len(), "dropping partial event line");
                break;
            }
            debug!("dropping oversized event line");
            if !discard_line(&mut reader, &mut buf) {
                break;
            }
            continue;
        };
        let line = String::from_utf8_lossy(line);
        match parse_event(&line) {
            Some(WorkspaceEvent::Workspace(name)) => {
                scheduler.send(UiMsg::ActiveWorkspace(name));
                scheduler.request_update();
            }
            Some(WorkspaceEvent::ActiveSpecial(name)) => {
                scheduler.send(UiMsg::ActiveSpecial(name));
                scheduler.request_update();
            }
            Some(WorkspaceEvent::Changed) => scheduler.request_update(),
            None => trace!(%line, "ignored event"),
        }
    }
}

/// Reads at most `MAX_LINE_LEN` bytes up to a newline into `buf`.
/// False at end of stream or on a read error.
fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> bool {
    buf.clear();
    match (&mut *reader).take(MAX_LINE_LEN as u64).read_until(b'\n', buf) {
        Ok(0) => false,
        Ok(_) => true,
        Err(err) => {
            debug!("event stream read failed: {err}");
            false
        }
    }
}

/// Skips the rest of an oversized line. False if the stream ends first.
fn discard_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> bool {
    loop {
        if !read_line(reader, buf) {
            return false;
        }
        if buf.ends_with(b"\n") {
            return true;
        }
    }
}

/// Background thread following the compositor's event socket.
///
/// Dropping the listener sets the stop flag, shuts the socket down so a
/// blocked read returns, and joins the thread.
pub struct EventListener {
    stop: Arc<AtomicBool>,
    stream: Arc<Mutex<Option<UnixStream>>>,
    handle: Option<JoinHandle<()>>,
}

impl EventListener {
    /// `None` when the environment does not name a compositor instance.
    pub fn from_env(scheduler: UpdateScheduler) -> Option<Self> {
        let path = socket_path(
            std::env::var_os("XDG_RUNTIME_DIR"),
            std::env::var_os("HYPRLAND_INSTANCE_SIGNATURE"),
        );
        match path {
            Some(path) => Some(Self::spawn(path, scheduler)),
            None => {
                info!("no Hyprland instance in environment, not following events");
                None
            }
        }
    }

    pub fn spawn(path: PathBuf, scheduler: UpdateScheduler) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stream = Arc::new(Mutex::new(None));
        let thread_stop = stop.clone();
        let thread_stream = stream.clone();
        let handle = match thread::Builder::new()
            .name("hypr-events".to_string())
            .spawn(move || listen(path, thread_stop, thread_stream, scheduler))
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!("spawn event thread: {err}");
                None
            }
        };
        Self {
            stop,
            stream,
            handle,
        }
    }

    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(stream) = lock_slot(&self.stream).take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock_slot(slot: &Mutex<Option<UnixStream>>) -> std::sync::MutexGuard<'_, Option<UnixStream>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn listen(
    path: PathBuf,
    stop: Arc<AtomicBool>,
    slot: Arc<Mutex<Option<UnixStream>>>,
    scheduler: UpdateScheduler,
) {
    let stream = match UnixStream::connect(&path) {
        Ok(stream) => stream,
        Err(err) => {
            info!("event socket {} unavailable: {err}", path.display());
            return;
        }
    };
    match stream.try_clone() {
        Ok(handle) => *lock_slot(&slot) = Some(handle),
        Err(err) => {
            warn!("clone event socket: {err}");
            return;
        }
    }
    if stop.load(Ordering::SeqCst) {
        return;
    }

    info!("following events on {}", path.display());
    scheduler.request_update();
    pump(BufReader::new(stream), &stop, &scheduler);
    info!("event stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{Cursor, Write},
        os::unix::net::UnixListener,
        sync::mpsc,
        time::Duration,
    };
    use tempfile::tempdir;

    fn run(input: &str) -> Vec<UiMsg> {
        let (tx, rx) = mpsc::channel();
        let scheduler = UpdateScheduler::new(tx);
        pump(Cursor::new(input.as_bytes().to_vec()), &AtomicBool::new(false), &scheduler);
        rx.try_iter().collect()
    }

    #[test]
    fn test_workspace_takes_first_field() {
        assert_eq!(
            parse_event("workspace>>3,other"),
            Some(WorkspaceEvent::Workspace("3".to_string()))
        );
        assert_eq!(
            parse_event("workspace>> web \r"),
            Some(WorkspaceEvent::Workspace("web".to_string()))
        );
    }

    #[test]
    fn test_active_special_is_prefixed_once() {
        assert_eq!(
            parse_event("activespecial>>foo"),
            Some(WorkspaceEvent::ActiveSpecial("special:foo".to_string()))
        );
        assert_eq!(
            parse_event("activespecial>>special:foo,DP-1"),
            Some(WorkspaceEvent::ActiveSpecial("special:foo".to_string()))
        );
        assert_eq!(
            parse_event("activespecial>>,DP-1"),
            Some(WorkspaceEvent::ActiveSpecial(String::new()))
        );
    }

    #[test]
    fn test_change_events_and_unknown_lines() {
        for line in [
            "openwindow>>80a6f50,2,kitty,Kitty",
            "closewindow>>80a6f50",
            "movewindow>>80a6f50,4",
            "createworkspace>>5",
            "destroyworkspace>>5",
        ] {
            assert_eq!(parse_event(line), Some(WorkspaceEvent::Changed), "{line}");
        }
        assert_eq!(parse_event("workspacev2>>3,3"), None);
        assert_eq!(parse_event("activewindow>>kitty,~"), None);
        assert_eq!(parse_event(""), None);
    }

    #[test]
    fn test_pump_sends_state_before_render() {
        let msgs = run("activewindow>>kitty,~\nworkspace>>2,DP-1\nopenwindow>>a,2,foot,foot\n");
        assert_eq!(
            msgs,
            vec![UiMsg::ActiveWorkspace("2".to_string()), UiMsg::Render]
        );
    }

    #[test]
    fn test_pump_drops_partial_line() {
        assert_eq!(run("closewindow>>abc"), Vec::new());
    }

    #[test]
    fn test_pump_skips_oversized_line() {
        let mut input = "x".repeat(MAX_LINE_LEN * 2 + 10);
        input.push_str("openwindow>>tail\nworkspace>>3\n");
        assert_eq!(
            run(&input),
            vec![UiMsg::ActiveWorkspace("3".to_string()), UiMsg::Render]
        );

        let mut input = "workspace>>".to_string();
        input.push_str(&"7".repeat(MAX_LINE_LEN - "workspace>>".len() - 1));
        input.push('\n');
        assert_eq!(run(&input).len(), 2);
    }

    #[test]
    fn test_pump_honours_stop() {
        let (tx, rx) = mpsc::channel();
        let scheduler = UpdateScheduler::new(tx);
        let input = Cursor::new(b"workspace>>1\n".to_vec());
        pump(input, &AtomicBool::new(true), &scheduler);
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_pump_survives_invalid_utf8() {
        let (tx, rx) = mpsc::channel();
        let scheduler = UpdateScheduler::new(tx);
        let mut input = b"activewindow>>\xff\xfe\n".to_vec();
        input.extend_from_slice(b"activespecial>>term\n");
        pump(Cursor::new(input), &AtomicBool::new(false), &scheduler);
        let msgs: Vec<UiMsg> = rx.try_iter().collect();
        assert_eq!(
            msgs,
            vec![UiMsg::ActiveSpecial("special:term".to_string()), UiMsg::Render]
        );
    }

    #[test]
    fn test_socket_path_requires_both_values() {
        assert_eq!(
            socket_path(Some("/run/user/1000".into()), Some("abc".into())),
            Some(PathBuf::from("/run/user/1000/hypr/abc/.socket2.sock"))
        );
        assert_eq!(socket_path(None, Some("abc".into())), None);
        assert_eq!(socket_path(Some("/run/user/1000".into()), Some("".into())), None);
    }

    #[test]
    fn test_missing_socket_exits_quietly() {
        let dir = tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let mut listener = EventListener::spawn(dir.path().join("none.sock"), UpdateScheduler::new(tx));
        listener.shutdown();
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_shutdown_unblocks_open_connection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".socket2.sock");
        let server = UnixListener::bind(&path).unwrap();
        let (tx, rx) = mpsc::channel();
        let scheduler = UpdateScheduler::new(tx);
        let mut listener = EventListener::spawn(path, scheduler.clone());

        let (mut peer, _) = server.accept().unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(UiMsg::Render));

        scheduler.begin_render();
        peer.write_all(b"workspace>>4,DP-2\n").unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(UiMsg::ActiveWorkspace("4".to_string()))
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(UiMsg::Render));

        // The peer stays connected; shutdown must not wait for it.
        listener.shutdown();
        drop(peer);
    }
}
