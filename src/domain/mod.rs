//! Domain layer: entities, value objects, pure rules and the ports the
//! application layer talks to.

pub mod activity;
pub mod calendar;
pub mod challenge;
pub mod delinquency;
pub mod enrollment;
pub mod money;
pub mod ownership;
pub mod ports;
pub mod ranking;

pub type OwnerId = u64;
pub type ChallengeId = u64;
pub type AthleteId = u64;
pub type EnrollmentId = u64;
pub type InstallmentId = u64;
pub type ActivityId = u64;
