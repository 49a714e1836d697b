pub mod activities;
pub mod pair_invitations;
pub mod prelude;
pub mod rewards;
pub mod tasks;
pub mod user_pairs;
pub mod user_profiles;
pub mod user_scores;
