pub use super::activities::Entity as Activities;
pub use super::pair_invitations::Entity as PairInvitations;
pub use super::rewards::Entity as Rewards;
pub use super::tasks::Entity as Tasks;
pub use super::user_pairs::Entity as UserPairs;
pub use super::user_profiles::Entity as UserProfiles;
pub use super::user_scores::Entity as UserScores;
