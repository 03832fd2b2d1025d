//! Output sinks (component F). Per the Non-goals, the only sink built into
//! this crate is a minimal stdout-JSON dev sink for manual smoke-testing;
//! MQTT/InfluxDB/HTTP/etc. sinks are external collaborators that would
//! consume the same [`Record`] stream.
//!
//! Grounded on the teacher's `export` module's "serialize one record, one
//! line, flush eagerly" approach, swapped from KAT's CSV/plaintext export
//! format to line-delimited JSON via `serde_json`.

use crate::data::Record;
use crate::dispatch::DropOldestQueue;
use std::io::Write;

/// Drain `inbox` until the sender side disconnects and the queue is empty,
/// writing one JSON object per line to `out`. Runs on its own thread in
/// `main.rs`, downstream of the dispatch thread.
pub fn run_stdout_json(inbox: &DropOldestQueue<Record>, out: &mut dyn Write, should_stop: &mut dyn FnMut() -> bool) {
    loop {
        match inbox.try_pop() {
            Some(record) => {
                if let Err(err) = write_record(out, &record) {
                    tracing::warn!(%err, "stdout sink write failed");
                }
            }
            None => {
                if should_stop() {
                    return;
                }
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
        }
    }
}

fn write_record(out: &mut dyn Write, record: &Record) -> std::io::Result<()> {
    match serde_json::to_string(record) {
        Ok(line) => {
            writeln!(out, "{line}")?;
            out.flush()
        }
        Err(err) => {
            tracing::warn!(%err, "record failed to serialize, dropping");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_json_line_per_record() {
        let queue: DropOldestQueue<Record> = DropOldestQueue::new(4);
        let mut r = Record::new();
        r.push("model", "Test-Model");
        r.push("id", 7u32);
        queue.push(r);

        let mut buf = Vec::new();
        let mut popped_once = false;
        run_stdout_json(&queue, &mut buf, &mut || {
            let stop = popped_once;
            popped_once = true;
            stop
        });

        let out = String::from_utf8(buf).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("\"model\":\"Test-Model\""));
    }

    #[test]
    fn stops_once_queue_is_empty_and_should_stop_fires() {
        let queue: DropOldestQueue<Record> = DropOldestQueue::new(4);
        let mut buf = Vec::new();
        run_stdout_json(&queue, &mut buf, &mut || true);
        assert!(buf.is_empty());
    }
}
