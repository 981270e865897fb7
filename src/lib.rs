//! linkcal
//!
//! The cloud document server shared by the `linkcal-server` binary and the
//! end-to-end tests of the calendar host.

pub mod server;
