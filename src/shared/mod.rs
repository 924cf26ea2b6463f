// Building blocks shared by the subcommands: the fix engine, its sentence
// codecs, and the host stand-ins for the tracker board.
pub mod acquire;
pub mod buffer;
pub mod checksum;
pub mod field;
pub mod gga;
pub mod lock;
pub mod position;
pub mod replay;
pub mod reserve;
pub mod serial;
pub mod signal;
pub mod ubx;
pub mod watchdog;
