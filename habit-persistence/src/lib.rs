pub mod connection;
pub mod entities;
pub mod error;
pub mod ledger;
pub mod repositories;
pub mod watch;

pub use error::{DataError, RecordKind};
pub use ledger::{ActivityReversal, Ledger, RewardClaim, TaskCompletion};
pub use watch::{ChangeBus, ChangeEvent, Subscription, SubscriptionEvent};

use sea_orm::DatabaseConnection;

use repositories::{
    ActivityRepository, PairingRepository, ProfileRepository, RewardRepository, ScoreRepository,
    TaskRepository,
};

/// Every gateway surface over one database connection, wired to a shared
/// change bus so any committed write refreshes the matching
/// subscriptions.
pub struct Store {
    pub tasks: TaskRepository,
    pub rewards: RewardRepository,
    pub activities: ActivityRepository,
    pub scores: ScoreRepository,
    pub profiles: ProfileRepository,
    pub pairing: PairingRepository,
    pub ledger: Ledger,
    bus: ChangeBus,
}

impl Store {
    pub fn new(db: DatabaseConnection, bus_capacity: usize) -> Self {
        let bus = ChangeBus::new(bus_capacity);
        Self {
            tasks: TaskRepository::new(db.clone(), bus.clone()),
            rewards: RewardRepository::new(db.clone(), bus.clone()),
            activities: ActivityRepository::new(db.clone(), bus.clone()),
            scores: ScoreRepository::new(db.clone(), bus.clone()),
            profiles: ProfileRepository::new(db.clone(), bus.clone()),
            pairing: PairingRepository::new(db.clone(), bus.clone()),
            ledger: Ledger::new(db, bus.clone()),
            bus,
        }
    }

    pub fn change_bus(&self) -> &ChangeBus {
        &self.bus
    }
}
