pub mod activity_repository;
pub mod pairing_repository;
pub mod profile_repository;
pub mod reward_repository;
pub mod score_repository;
pub mod task_repository;

pub use activity_repository::ActivityRepository;
pub use pairing_repository::PairingRepository;
pub use profile_repository::ProfileRepository;
pub use reward_repository::RewardRepository;
pub use score_repository::ScoreRepository;
pub use task_repository::TaskRepository;
