use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::SerialError;
use crate::protocol::{SerialProtocol, StatusLevel};

type Callback = Box<dyn FnMut(StatusLevel) + Send>;

fn parse_status(word: &str) -> StatusLevel {
    match word.trim() {
        "ALARM" => StatusLevel::Alarm,
        "DIAGNOSTIC" => StatusLevel::Diagnostic,
        "NORMAL" => StatusLevel::Normal,
        _ => StatusLevel::PowerOff,
    }
}

/// Decodes the optional third `addr:status:hexpayload` segment carrying an
/// inventory response. Malformed hex is dropped rather than erroring, the
/// same way an unparseable `addr:status` line is silently skipped below.
fn parse_hex_payload(word: &str) -> Option<Vec<u8>> {
    let word = word.trim();
    if word.is_empty() || word.len() % 2 != 0 {
        return None;
    }
    (0..word.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&word[i..i + 2], 16).ok())
        .collect()
}

/// Drives the RS-232/485 link on a dedicated background thread: the thread
/// owns the read half of the port and continuously parses `addr:status`
/// lines, updating shared node state and firing any pending completion
/// callback for that node. The foreground half (this struct) only ever
/// writes.
///
/// This is the idiomatic std equivalent of the cooperative single-threaded
/// event loop the link protocol used originally: one thread per pre-stage
/// invocation, joined on every exit path via `close`/`Drop`, instead of an
/// async runtime this workspace has no other use for.
pub struct ThreadedSerialProtocol {
    writer: Box<dyn serialport::SerialPort>,
    statuses: Arc<Mutex<HashMap<u8, StatusLevel>>>,
    payloads: Arc<Mutex<HashMap<u8, Vec<u8>>>>,
    pending: Arc<Mutex<HashMap<u8, Vec<Callback>>>>,
    cancel: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl ThreadedSerialProtocol {
    pub fn open(device_name: &str, baud_rate: u32) -> Result<Self, SerialError> {
        let port = serialport::new(device_name, baud_rate)
            .timeout(Duration::from_millis(200))
            .open()
            .map_err(|source| SerialError::Open {
                port: device_name.to_string(),
                source,
            })?;

        let reader_port = port.try_clone().map_err(|source| SerialError::Open {
            port: device_name.to_string(),
            source,
        })?;

        let statuses: Arc<Mutex<HashMap<u8, StatusLevel>>> = Arc::new(Mutex::new(HashMap::new()));
        let payloads: Arc<Mutex<HashMap<u8, Vec<u8>>>> = Arc::new(Mutex::new(HashMap::new()));
        let pending: Arc<Mutex<HashMap<u8, Vec<Callback>>>> = Arc::new(Mutex::new(HashMap::new()));
        let cancel = Arc::new(AtomicBool::new(false));

        let reader = std::thread::spawn({
            let statuses = Arc::clone(&statuses);
            let payloads = Arc::clone(&payloads);
            let pending = Arc::clone(&pending);
            let cancel = Arc::clone(&cancel);
            move || read_loop(reader_port, statuses, payloads, pending, cancel)
        });

        Ok(Self {
            writer: port,
            statuses,
            payloads,
            pending,
            cancel,
            reader: Some(reader),
        })
    }

    fn write_line(&mut self, addr: u8, request: &str) -> Result<(), SerialError> {
        let line = format!("{addr}:{request}\n");
        self.writer.write_all(line.as_bytes())?;
        Ok(())
    }

    fn poll_until(
        &self,
        deadline: Instant,
        mut done: impl FnMut(&HashMap<u8, StatusLevel>) -> bool,
    ) -> bool {
        loop {
            if done(&self.statuses.lock().expect("status lock poisoned")) {
                return true;
            }
            if Instant::now() >= deadline || self.cancel.load(Ordering::Relaxed) {
                return false;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    fn poll_for_payload(&self, addr: u8, deadline: Instant) -> Option<Vec<u8>> {
        loop {
            if let Some(bytes) = self.payloads.lock().expect("payload lock poisoned").get(&addr) {
                return Some(bytes.clone());
            }
            if Instant::now() >= deadline || self.cancel.load(Ordering::Relaxed) {
                return None;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

fn read_loop(
    port: Box<dyn serialport::SerialPort>,
    statuses: Arc<Mutex<HashMap<u8, StatusLevel>>>,
    payloads: Arc<Mutex<HashMap<u8, Vec<u8>>>>,
    pending: Arc<Mutex<HashMap<u8, Vec<Callback>>>>,
    cancel: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(port);
    let mut line = String::new();
    while !cancel.load(Ordering::Relaxed) {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let mut fields = line.trim().splitn(3, ':');
                let (Some(addr_str), Some(status_str)) = (fields.next(), fields.next()) else {
                    continue;
                };
                let Ok(addr) = addr_str.parse::<u8>() else {
                    continue;
                };
                let status = parse_status(status_str);
                statuses
                    .lock()
                    .expect("status lock poisoned")
                    .insert(addr, status);
                if let Some(payload) = fields.next().and_then(parse_hex_payload) {
                    payloads.lock().expect("payload lock poisoned").insert(addr, payload);
                }
                if let Some(callbacks) = pending.lock().expect("pending lock poisoned").remove(&addr) {
                    for mut cb in callbacks {
                        cb(status);
                    }
                }
            }
            // A read timeout is expected churn, not an error; keep polling
            // so `cancel` gets checked promptly.
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                log::warn!("serial read loop stopping: {e}");
                break;
            }
        }
    }
}

impl SerialProtocol for ThreadedSerialProtocol {
    fn attach_node(&mut self, addr: u8) -> Result<(), SerialError> {
        self.statuses
            .lock()
            .expect("status lock poisoned")
            .entry(addr)
            .or_insert(StatusLevel::PowerOff);
        Ok(())
    }

    fn wait_for_status(&mut self, addr: u8, timeout: Duration) -> Result<StatusLevel, SerialError> {
        let deadline = Instant::now() + timeout;
        let reached = self.poll_until(deadline, |statuses| {
            !matches!(statuses.get(&addr), None | Some(StatusLevel::PowerOff))
        });
        if self.cancel.load(Ordering::Relaxed) {
            return Err(SerialError::Cancelled);
        }
        if !reached {
            return Err(SerialError::NodeTimeout {
                addr,
                status: "non-POWER_OFF",
                waited: timeout,
            });
        }
        Ok(*self
            .statuses
            .lock()
            .expect("status lock poisoned")
            .get(&addr)
            .expect("just confirmed present"))
    }

    fn send_request_and_wait(
        &mut self,
        addr: u8,
        request: &str,
        timeout: Duration,
    ) -> Result<StatusLevel, SerialError> {
        let before = *self
            .statuses
            .lock()
            .expect("status lock poisoned")
            .get(&addr)
            .unwrap_or(&StatusLevel::PowerOff);
        self.write_line(addr, request)?;

        let deadline = Instant::now() + timeout;
        let changed = self.poll_until(deadline, |statuses| {
            statuses.get(&addr).is_some_and(|s| *s != before)
        });
        if self.cancel.load(Ordering::Relaxed) {
            return Err(SerialError::Cancelled);
        }
        if !changed {
            return Err(SerialError::NodeTimeout {
                addr,
                status: "updated",
                waited: timeout,
            });
        }
        Ok(*self
            .statuses
            .lock()
            .expect("status lock poisoned")
            .get(&addr)
            .expect("just confirmed present"))
    }

    fn send_request(
        &mut self,
        addr: u8,
        request: &str,
        on_complete: Callback,
    ) -> Result<(), SerialError> {
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .entry(addr)
            .or_default()
            .push(on_complete);
        self.write_line(addr, request)
    }

    fn send_request_and_read(
        &mut self,
        addr: u8,
        request: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, SerialError> {
        self.payloads.lock().expect("payload lock poisoned").remove(&addr);
        self.write_line(addr, request)?;

        let deadline = Instant::now() + timeout;
        let payload = self.poll_for_payload(addr, deadline);
        if self.cancel.load(Ordering::Relaxed) {
            return Err(SerialError::Cancelled);
        }
        payload.ok_or(SerialError::NodeTimeout {
            addr,
            status: "inventory response",
            waited: timeout,
        })
    }

    fn status(&self, addr: u8) -> StatusLevel {
        *self
            .statuses
            .lock()
            .expect("status lock poisoned")
            .get(&addr)
            .unwrap_or(&StatusLevel::PowerOff)
    }

    fn close(&mut self) -> Result<(), SerialError> {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for ThreadedSerialProtocol {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
