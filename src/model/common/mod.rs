mod election;

pub use election::ElectionState;

/// Citizens are numbered sequentially.
pub type CitizenId = u32;
/// Parties are numbered sequentially.
pub type PartyId = u32;
/// Constituencies are numbered sequentially.
pub type ConstituencyId = u32;
/// Elections are numbered sequentially.
pub type ElectionId = u32;
