use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::vote_date;

/// One item on a restaurant's menu for one day.
///
/// A restaurant lists a dish name at most once per day; names compare
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub id: String,
    pub restaurant_id: i64,
    pub date: NaiveDate,
    pub name: String,
    /// Price in minor currency units
    pub price: i64,
}

/// Request model for adding a dish to today's menu
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDishRequest {
    pub name: String,
    pub price: i64,
}

impl Dish {
    pub fn new(restaurant_id: i64, date: NaiveDate, request: CreateDishRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            restaurant_id,
            date,
            name: request.name.trim().to_string(),
            price: request.price,
        }
    }

    /// Key the per-day uniqueness of a dish name rests on
    pub fn menu_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn to_response(&self) -> DishResponse {
        DishResponse {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
            restaurant_id: self.restaurant_id,
            date: self.date,
        }
    }
}

/// Dish as returned by the menu endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishResponse {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub restaurant_id: i64,
    #[serde(with = "vote_date")]
    pub date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, price: i64) -> CreateDishRequest {
        CreateDishRequest {
            name: name.to_string(),
            price,
        }
    }

    #[test]
    fn test_dish_new_trims_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let dish = Dish::new(2, date, request("  Borscht ", 350));

        assert_eq!(dish.name, "Borscht");
        assert_eq!(dish.menu_key(), "borscht");
        assert_eq!(dish.restaurant_id, 2);
        assert!(Uuid::parse_str(&dish.id).is_ok());
    }

    #[test]
    fn test_response_wire_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let dish = Dish::new(2, date, request("Borscht", 350));
        let json = serde_json::to_value(dish.to_response()).unwrap();

        assert_eq!(json["name"], "Borscht");
        assert_eq!(json["price"], 350);
        assert_eq!(json["restaurantId"], 2);
        assert_eq!(json["date"], "05.03.2024");
    }
}
