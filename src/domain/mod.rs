//! Domain types for packet-injection jobs.

mod injection;
mod params;

pub use injection::{Injection, InjectionState, PacketType, UnknownPacketType};
pub use params::ResolvedParams;
