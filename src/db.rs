//! Reservation ledger
//!
//! Completed bookings are appended here; lookups and cancellations match on
//! phone number, date text and time text.

mod schema;

pub use schema::*;

use crate::state_machine::state::{BookingId, Reservation};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Booking id already exists: {0}")]
    DuplicateBooking(String),
    #[error("No active reservation for {phone} on {date} at {time}")]
    ReservationNotFound {
        phone: String,
        date: String,
        time: String,
    },
    #[error("Could not create database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Failure reported by the reservation ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger refused the request; the message is safe to show the user
    #[error("{0}")]
    Rejected(String),
    /// The ledger could not be reached or failed internally
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ReservationNotFound { .. } => LedgerError::Rejected(
                "No matching reservation was found for that phone number, date and time."
                    .to_string(),
            ),
            DbError::DuplicateBooking(id) => {
                LedgerError::Rejected(format!("Booking {id} was already recorded."))
            }
            other => LedgerError::Unavailable(other.to_string()),
        }
    }
}

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Reservation Operations ====================

    /// Append a confirmed booking
    pub fn add_reservation(&self, reservation: &Reservation) -> DbResult<BookingId> {
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO reservations (booking_id, booked_at, customer_name, phone, booking_date,
                                       booking_time, party_size, special_requests, display_name,
                                       user_id, status, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, '')",
            params![
                reservation.booking_id.as_str(),
                reservation.created_at.to_rfc3339(),
                reservation.customer_name.as_str(),
                reservation.phone.as_str(),
                reservation.date.to_string(),
                reservation.time.to_string(),
                reservation.party_size.get(),
                reservation.special_requests,
                reservation.display_name,
                reservation.user_id,
                ReservationStatus::Confirmed.as_str(),
            ],
        );

        match result {
            Ok(_) => Ok(reservation.booking_id.clone()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DbError::DuplicateBooking(reservation.booking_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Active bookings for a phone number, newest first
    pub fn find_active_by_phone(&self, phone: &str) -> DbResult<Vec<ReservationRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT booking_id, customer_name, phone, booking_date, booking_time, party_size,
                    special_requests, status, booked_at
             FROM reservations
             WHERE phone = ?1 AND status NOT IN ('cancelled', 'no_show')
             ORDER BY booked_at DESC",
        )?;

        let rows = stmt.query_map(params![phone], parse_record_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Cancel the newest active booking matching phone, date and time
    pub fn cancel_reservation(
        &self,
        phone: &str,
        date: &str,
        time: &str,
        now: DateTime<Utc>,
    ) -> DbResult<CancelReceipt> {
        let conn = self.conn();
        let found = conn.query_row(
            "SELECT booking_id, customer_name FROM reservations
             WHERE phone = ?1 AND booking_date = ?2 AND booking_time = ?3
               AND status NOT IN ('cancelled', 'no_show')
             ORDER BY booked_at DESC
             LIMIT 1",
            params![phone, date, time],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        );

        let (booking_id, customer_name) = match found {
            Ok(hit) => hit,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(DbError::ReservationNotFound {
                    phone: phone.to_string(),
                    date: date.to_string(),
                    time: time.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let note = format!("cancelled at {}", now.format("%Y-%m-%d %H:%M:%S"));
        conn.execute(
            "UPDATE reservations
             SET status = ?1,
                 note = CASE WHEN note = '' THEN ?2 ELSE note || '; ' || ?2 END
             WHERE booking_id = ?3",
            params![ReservationStatus::Cancelled.as_str(), note, booking_id],
        )?;

        Ok(CancelReceipt {
            booking_id,
            customer_name,
            date: date.to_string(),
            time: time.to_string(),
        })
    }

    /// Look up one booking by id
    #[allow(dead_code)] // Used in tests
    pub fn get_reservation(&self, booking_id: &str) -> DbResult<Option<ReservationRecord>> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT booking_id, customer_name, phone, booking_date, booking_time, party_size,
                    special_requests, status, booked_at
             FROM reservations WHERE booking_id = ?1",
            params![booking_id],
            parse_record_row,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReservationRecord> {
    let status: String = row.get(7)?;
    Ok(ReservationRecord {
        booking_id: row.get(0)?,
        customer_name: row.get(1)?,
        phone: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        party_size: row.get(5)?,
        special_requests: row.get(6)?,
        status: status.parse().unwrap_or(ReservationStatus::Confirmed),
        created_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
