pub mod ballot;
pub mod election;
pub mod id;
pub mod policy;

pub use ballot::Ballot;
pub use election::{Election, ElectionResult};
pub use id::{BallotId, ElectionId};
pub use policy::Policy;
