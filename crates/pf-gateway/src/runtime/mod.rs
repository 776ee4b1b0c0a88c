//! The Session Conductor and Backup Scheduler (spec §4.E / §4.G):
//! per-connection orchestration and periodic store snapshotting.

pub mod backup;
pub mod conductor;
