pub mod exclusion;
pub mod operator;
pub mod priority;

pub use exclusion::MessageExclusionSet;
pub use operator::ProbeOperator;
pub use priority::Priority;
