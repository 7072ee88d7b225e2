// Services module - business logic layer

pub mod clock;
pub mod menu_service;
pub mod restaurant_service;
pub mod voting_service;

pub use clock::{Clock, FixedClock, SystemClock, VotingWindow};
pub use menu_service::{default_menu, MenuService};
pub use restaurant_service::{default_restaurants, RestaurantService};
pub use voting_service::VotingService;
