use serde::{Deserialize, Serialize};

/// A place users can vote for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub address: String,
}

/// Request model for creating a restaurant (seeding only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRestaurantRequest {
    pub name: String,
    pub address: String,
}

impl Restaurant {
    pub fn new(id: i64, request: CreateRestaurantRequest) -> Self {
        Self {
            id,
            name: request.name.trim().to_string(),
            address: request.address.trim().to_string(),
        }
    }

    /// Restaurants are unique on (name, address).
    pub fn same_place_as(&self, other: &Restaurant) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.address.eq_ignore_ascii_case(&other.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restaurant_new_trims_fields() {
        let restaurant = Restaurant::new(
            1,
            CreateRestaurantRequest {
                name: "  Pelmennaya ".to_string(),
                address: " Tverskaya 1 ".to_string(),
            },
        );

        assert_eq!(restaurant.name, "Pelmennaya");
        assert_eq!(restaurant.address, "Tverskaya 1");
    }

    #[test]
    fn test_same_place_as() {
        let a = Restaurant {
            id: 1,
            name: "Kebab".to_string(),
            address: "Arbat 5".to_string(),
        };
        let b = Restaurant {
            id: 2,
            name: "KEBAB".to_string(),
            address: "arbat 5".to_string(),
        };
        let c = Restaurant {
            id: 3,
            name: "Kebab".to_string(),
            address: "Arbat 7".to_string(),
        };

        assert!(a.same_place_as(&b));
        assert!(!a.same_place_as(&c));
    }
}
