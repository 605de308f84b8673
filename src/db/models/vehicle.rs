//! Vehicle listing model.
//!
//! A vehicle is a listing while `status = "available"`. The status flips to
//! `"sold"` exactly once, when the seller confirms a booking, and never
//! transitions back.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle states for a vehicle listing.
pub mod vehicle_status {
    pub const AVAILABLE: &str = "available";
    pub const SOLD: &str = "sold";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: String,
    pub seller_id: String,
    pub brand: String,
    pub model: String,
    pub year: i64,
    pub price: i64,
    pub vehicle_type: String,
    pub condition: String,
    pub mileage: i64,
    pub description: String,
    /// JSON array of image URLs, in upload order
    pub images: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub status: String,
    pub created_at: String,
}

impl Vehicle {
    /// Decode the images column into a URL list. A malformed column is
    /// treated as empty rather than failing the whole response.
    pub fn image_urls(&self) -> Vec<String> {
        serde_json::from_str(&self.images).unwrap_or_default()
    }

    pub fn to_response(&self) -> VehicleResponse {
        VehicleResponse {
            id: self.id.clone(),
            seller_id: self.seller_id.clone(),
            brand: self.brand.clone(),
            model: self.model.clone(),
            year: self.year,
            price: self.price,
            vehicle_type: self.vehicle_type.clone(),
            condition: self.condition.clone(),
            mileage: self.mileage,
            description: self.description.clone(),
            images: self.image_urls(),
            contact_name: self.contact_name.clone(),
            contact_phone: self.contact_phone.clone(),
            status: self.status.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// API view of a vehicle, with the images column decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleResponse {
    pub id: String,
    pub seller_id: String,
    pub brand: String,
    pub model: String,
    pub year: i64,
    pub price: i64,
    pub vehicle_type: String,
    pub condition: String,
    pub mileage: i64,
    pub description: String,
    pub images: Vec<String>,
    pub contact_name: String,
    pub contact_phone: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateVehicleRequest {
    pub brand: String,
    pub model: String,
    pub year: i64,
    pub price: i64,
    pub vehicle_type: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub mileage: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

/// Query-string filters for the public listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct VehicleFilter {
    pub brand: Option<String>,
    pub vehicle_type: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_year: Option<i64>,
    pub max_year: Option<i64>,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle_with_images(images: &str) -> Vehicle {
        Vehicle {
            id: "v1".into(),
            seller_id: "u1".into(),
            brand: "Toyota".into(),
            model: "Corolla".into(),
            year: 2018,
            price: 10000,
            vehicle_type: "sedan".into(),
            condition: "used".into(),
            mileage: 42000,
            description: String::new(),
            images: images.into(),
            contact_name: String::new(),
            contact_phone: String::new(),
            status: vehicle_status::AVAILABLE.into(),
            created_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn image_urls_decodes_json_array() {
        let v = vehicle_with_images(r#"["/uploads/a.jpg","/uploads/b.jpg"]"#);
        assert_eq!(v.image_urls(), vec!["/uploads/a.jpg", "/uploads/b.jpg"]);
    }

    #[test]
    fn image_urls_tolerates_garbage() {
        let v = vehicle_with_images("not json");
        assert!(v.image_urls().is_empty());
    }
}
