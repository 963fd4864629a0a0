//! Properties store tests.
//!
//! Shared test functions take `&dyn PolicyRepo` and run against an in-memory
//! SQLite database migrated with the real migration files.

mod policies;
