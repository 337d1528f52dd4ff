//! Lazy full-table scan
//!
//! A worker thread owns the scan's connection and statement and hands rows
//! over a bounded channel, so at most one row is read ahead. The connection
//! closes exactly once: when the scan is exhausted, on [`EntityCursor::abort`],
//! or when the cursor is dropped.

#![allow(clippy::result_large_err)]

use crate::errors::{from_io, from_rusqlite, Result};
use crate::row::{check_projection, hydrate};
use entorm_core::{Entity, Profile};
use rusqlite::Connection;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Forward-only, single-pass sequence of hydrated rows
pub struct EntityCursor<T> {
    table: String,
    receiver: Option<Receiver<Result<T>>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Entity> EntityCursor<T> {
    pub(crate) fn open(conn: Connection, profile: Arc<Profile<T>>, sql: String) -> Result<Self> {
        let (sender, receiver) = mpsc::sync_channel(1);
        let table = profile.table_name().to_string();
        let worker = thread::Builder::new()
            .name(format!("entorm-scan-{}", table))
            .spawn(move || {
                scan(&conn, &*profile, &sql, &sender);
                drop(conn);
                tracing::debug!(table = profile.table_name(), "scan connection closed");
            })
            .map_err(|e| from_io("read_all", e))?;

        Ok(Self {
            table,
            receiver: Some(receiver),
            worker: Some(worker),
        })
    }
}

impl<T> EntityCursor<T> {
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Stop the scan and release its connection
    pub fn abort(mut self) {
        self.close();
    }

    fn close(&mut self) {
        // Dropping the receiver fails the worker's next send
        self.receiver.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(table = %self.table, "scan worker panicked");
            }
        }
    }
}

impl<T> Iterator for EntityCursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let received = self.receiver.as_ref()?.recv();
        match received {
            Ok(item) => Some(item),
            Err(_) => {
                self.close();
                None
            }
        }
    }
}

impl<T> Drop for EntityCursor<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> std::fmt::Debug for EntityCursor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCursor")
            .field("table", &self.table)
            .field("open", &self.worker.is_some())
            .finish()
    }
}

fn scan<T: Entity>(conn: &Connection, profile: &Profile<T>, sql: &str, sender: &SyncSender<Result<T>>) {
    let outcome = (|| -> Result<()> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| from_rusqlite(e).with_table(profile.table_name()).with_sql(sql))?;
        check_projection(&stmt, profile)?;
        let mut rows = stmt.query([]).map_err(from_rusqlite)?;
        while let Some(row) = rows.next().map_err(from_rusqlite)? {
            let item = hydrate(profile, row);
            let failed = item.is_err();
            if sender.send(item).is_err() {
                tracing::debug!(table = profile.table_name(), "scan abandoned");
                return Ok(());
            }
            if failed {
                return Ok(());
            }
        }
        Ok(())
    })();
    if let Err(err) = outcome {
        let _ = sender.send(Err(err));
    }
}
