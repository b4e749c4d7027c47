//! Thread-safety bounds shared by every bridge trait.
//!
//! Bridge implementations are held by the controller task, which a
//! multi-threaded runtime may move between workers, so every capability must
//! be `Send + Sync`. The marker keeps trait declarations short and gives hosts a
//! single place to look up the requirement.

/// Marker trait implemented for every `Send + Sync` type.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}
