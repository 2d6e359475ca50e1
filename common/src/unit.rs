//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing an entity expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;

/// Marker type describing a failed attempt.
#[derive(Clone, Copy, Debug)]
pub struct Failure;

/// Marker type describing a successful redemption.
#[derive(Clone, Copy, Debug)]
pub struct Redemption;

/// Marker type describing a planned future event.
#[derive(Clone, Copy, Debug)]
pub struct Schedule;
