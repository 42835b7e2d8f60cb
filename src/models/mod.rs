//! Data models

pub mod threat_score;
pub mod feedback;
pub mod observation;
pub mod device_group;
pub mod randomization;

pub use threat_score::*;
pub use feedback::*;
pub use observation::*;
pub use device_group::*;
pub use randomization::*;
